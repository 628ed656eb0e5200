use serde::{Deserialize, Serialize};

use crate::model::{RecipeId, UserId};

/// Change notifications for views that render from the service state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncEvent {
    Reloaded {
        identity: UserId,
        recipes: usize,
        saved: usize,
    },
    Cleared,
    RecipeAdded(RecipeId),
    RecipeUpdated(RecipeId),
    SavedChanged { recipe: RecipeId, saved: bool },
    LoadFailed { what: LoadTarget, reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadTarget {
    Recipes,
    Saved,
}
