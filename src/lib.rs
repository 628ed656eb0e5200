//! Recipe Box
//!
//! Session-scoped synchronization of recipes and saved recipes between a
//! hosted store and the view layer.

pub mod config;
pub mod errors;
pub mod session;
pub mod telemetry;

use std::path::Path;

pub use config::{AppConfig, ConfigError, LoadedConfig, LoggingConfig};
pub use errors::{RecipeBoxError, RecipeBoxResult};
pub use session::RecipeSession;

pub use recipe_box_core_types::{IdError, RecipeId, UserId};
pub use recipe_box_identity::{IdentityResolver, IdentityState, InMemoryIdentity};
pub use recipe_box_recipes::{
    views, Difficulty, InMemoryRecipeStore, Recipe, RecipeDraft, RecipeForm, RecipeService,
    RecipeStore, SyncError, SyncEvent, SyncPolicy, VisibilityMode,
};

/// Loads configuration and installs logging; the usual first call of a host.
pub fn bootstrap(config_path: Option<&Path>) -> RecipeBoxResult<LoadedConfig> {
    let loaded = config::load_config(config_path)?;
    telemetry::init_logging(&loaded.config.logging)
        .map_err(|err| RecipeBoxError::Logging(format!("{err:#}")))?;
    Ok(loaded)
}
