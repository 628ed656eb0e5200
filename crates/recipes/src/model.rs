use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::SyncError;
pub use recipe_box_core_types::{RecipeId, UserId};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        };
        f.write_str(label)
    }
}

impl FromStr for Difficulty {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(SyncError::InvalidDraft(format!(
                "unknown difficulty '{other}'"
            ))),
        }
    }
}

/// Author-editable fields of a recipe.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeDraft {
    pub title: String,
    pub description: String,
    pub image: String,
    pub ingredients: Vec<String>,
    pub steps: Vec<String>,
    pub cook_time: u32,
    pub difficulty: Difficulty,
    pub author: String,
    pub is_public: bool,
}

impl RecipeDraft {
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.title.trim().is_empty() {
            return Err(SyncError::InvalidDraft("title must not be blank".into()));
        }
        if self.cook_time == 0 {
            return Err(SyncError::InvalidDraft(
                "cook time must be at least one minute".into(),
            ));
        }
        Ok(())
    }
}

/// Persisted shape of a recipe as returned by the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeRow {
    pub id: RecipeId,
    pub owner_id: UserId,
    pub title: String,
    pub description: String,
    pub image: String,
    pub ingredients: Vec<String>,
    pub steps: Vec<String>,
    pub cook_time: u32,
    pub difficulty: Difficulty,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub is_public: bool,
}

/// Insert payload; the store fills in `id` and `created_at`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecipeRow {
    pub owner_id: UserId,
    #[serde(flatten)]
    pub draft: RecipeDraft,
}

impl NewRecipeRow {
    pub fn new(owner_id: UserId, draft: RecipeDraft) -> Self {
        Self { owner_id, draft }
    }

    pub fn into_row(self, id: RecipeId, created_at: DateTime<Utc>) -> RecipeRow {
        let RecipeDraft {
            title,
            description,
            image,
            ingredients,
            steps,
            cook_time,
            difficulty,
            author,
            is_public,
        } = self.draft;
        RecipeRow {
            id,
            owner_id: self.owner_id,
            title,
            description,
            image,
            ingredients,
            steps,
            cook_time,
            difficulty,
            author,
            created_at,
            is_public,
        }
    }
}

/// Recipe as held in session state. `is_owner` is derived per viewer and never
/// written back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub title: String,
    pub description: String,
    pub image: String,
    pub ingredients: Vec<String>,
    pub steps: Vec<String>,
    pub cook_time: u32,
    pub difficulty: Difficulty,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub is_owner: bool,
    pub is_public: bool,
}

impl Recipe {
    pub fn from_row(row: RecipeRow, viewer: Option<&UserId>) -> Self {
        let is_owner = viewer.is_some_and(|viewer| *viewer == row.owner_id);
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            image: row.image,
            ingredients: row.ingredients,
            steps: row.steps,
            cook_time: row.cook_time,
            difficulty: row.difficulty,
            author: row.author,
            created_at: row.created_at,
            is_owner,
            is_public: row.is_public,
        }
    }

    /// Overwrites the mutable fields; `id`, `created_at` and `is_owner` stay.
    pub fn apply_draft(&mut self, draft: &RecipeDraft) {
        self.title = draft.title.clone();
        self.description = draft.description.clone();
        self.image = draft.image.clone();
        self.ingredients = draft.ingredients.clone();
        self.steps = draft.steps.clone();
        self.cook_time = draft.cook_time;
        self.difficulty = draft.difficulty;
        self.author = draft.author.clone();
        self.is_public = draft.is_public;
    }

    pub fn to_draft(&self) -> RecipeDraft {
        RecipeDraft {
            title: self.title.clone(),
            description: self.description.clone(),
            image: self.image.clone(),
            ingredients: self.ingredients.clone(),
            steps: self.steps.clone(),
            cook_time: self.cook_time,
            difficulty: self.difficulty,
            author: self.author.clone(),
            is_public: self.is_public,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SavedAssociation {
    pub user_id: UserId,
    pub recipe_id: RecipeId,
}

impl SavedAssociation {
    pub fn new(user_id: UserId, recipe_id: RecipeId) -> Self {
        Self { user_id, recipe_id }
    }
}

/// Point-in-time copy of the service state for rendering or diagnostics.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncSnapshot {
    pub identity: Option<UserId>,
    pub recipes: Vec<Recipe>,
    pub saved_recipe_ids: HashSet<RecipeId>,
    pub loading: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncStatus {
    pub identity: Option<UserId>,
    pub recipes: usize,
    pub saved: usize,
    pub loading: bool,
    pub generation: u64,
    pub reloads: u64,
    pub skipped_reloads: u64,
    pub stale_discards: u64,
    pub store_failures: u64,
    pub mutations: u64,
}
