use recipe_box_recipes::SyncError;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum RecipeBoxError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("recipe sync failed: {0}")]
    Sync(#[from] SyncError),
    #[error("logging setup failed: {0}")]
    Logging(String),
}

pub type RecipeBoxResult<T> = Result<T, RecipeBoxError>;
