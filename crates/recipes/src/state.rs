use std::collections::HashSet;

use crate::model::{Recipe, RecipeId, SyncSnapshot, UserId};

/// Mutable session state. Lives behind the service's lock; never held across
/// a store round trip.
#[derive(Debug)]
pub(crate) struct SyncState {
    pub identity: Option<UserId>,
    /// Bumped on every accepted identity change; loads carry the value they
    /// were issued under.
    pub generation: u64,
    /// `None` until the first resolved identity has been applied.
    pub cursor: Option<Option<UserId>>,
    pub recipes: Vec<Recipe>,
    pub saved: HashSet<RecipeId>,
    pub loading: bool,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            identity: None,
            generation: 0,
            cursor: None,
            recipes: Vec::new(),
            saved: HashSet::new(),
            loading: true,
        }
    }
}

impl SyncState {
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    pub fn replace_recipes(&mut self, mut recipes: Vec<Recipe>) {
        recipes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.recipes = recipes;
    }

    /// Prepends unless a recipe with the same id is already held.
    pub fn prepend(&mut self, recipe: Recipe) -> bool {
        if self.recipes.iter().any(|existing| existing.id == recipe.id) {
            return false;
        }
        self.recipes.insert(0, recipe);
        true
    }

    pub fn find_mut(&mut self, id: &RecipeId) -> Option<&mut Recipe> {
        self.recipes.iter_mut().find(|recipe| recipe.id == *id)
    }

    pub fn clear(&mut self) {
        self.recipes.clear();
        self.saved.clear();
        self.loading = false;
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            identity: self.identity.clone(),
            recipes: self.recipes.clone(),
            saved_recipe_ids: self.saved.clone(),
            loading: self.loading,
        }
    }
}
