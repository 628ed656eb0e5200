pub mod api;
pub mod errors;
pub mod events;
pub mod form;
pub mod metrics;
pub mod model;
pub mod policy;
mod state;
pub mod store;
pub mod subscription;
pub mod views;

pub use api::{RecipeService, RecipeSync, RecipeSyncBuilder, ReloadTicket};
pub use errors::{StoreError, StoreErrorKind, StoreResult, SyncError, SyncResult};
pub use events::{LoadTarget, SyncEvent};
pub use form::RecipeForm;
pub use model::{
    Difficulty, NewRecipeRow, Recipe, RecipeDraft, RecipeId, RecipeRow, SavedAssociation,
    SyncSnapshot, SyncStatus, UserId,
};
pub use policy::{SyncPolicy, VisibilityMode, MAX_EVENT_CAPACITY};
pub use store::{InMemoryRecipeStore, RecipeStore, StoreOp};
pub use subscription::IdentitySubscription;
