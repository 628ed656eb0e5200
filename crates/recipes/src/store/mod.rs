//! Persistence contract consumed by the synchronization service.

pub mod memory;

use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::StoreResult;
use crate::model::{NewRecipeRow, RecipeDraft, RecipeId, RecipeRow, UserId};

pub use memory::InMemoryRecipeStore;

/// Row-level operations against the recipes and saved-recipes collections.
#[async_trait]
pub trait RecipeStore: Send + Sync {
    /// All recipe rows, newest `created_at` first.
    async fn list_recipes(&self) -> StoreResult<Vec<RecipeRow>>;
    /// Persists a new row; the store assigns `id` and `created_at`.
    async fn insert_recipe(&self, payload: NewRecipeRow) -> StoreResult<RecipeRow>;
    async fn update_recipe(&self, id: &RecipeId, changes: RecipeDraft) -> StoreResult<()>;
    async fn list_saved_for(&self, user: &UserId) -> StoreResult<HashSet<RecipeId>>;
    /// Idempotent: saving an already saved pair succeeds.
    async fn insert_saved(&self, recipe: &RecipeId, user: &UserId) -> StoreResult<()>;
    /// Idempotent: deleting a missing pair succeeds.
    async fn delete_saved(&self, recipe: &RecipeId, user: &UserId) -> StoreResult<()>;
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum StoreOp {
    ListRecipes,
    InsertRecipe,
    UpdateRecipe,
    ListSaved,
    InsertSaved,
    DeleteSaved,
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreOp::ListRecipes => "list_recipes",
            StoreOp::InsertRecipe => "insert_recipe",
            StoreOp::UpdateRecipe => "update_recipe",
            StoreOp::ListSaved => "list_saved_for",
            StoreOp::InsertSaved => "insert_saved",
            StoreOp::DeleteSaved => "delete_saved",
        };
        f.write_str(name)
    }
}
