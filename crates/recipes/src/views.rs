//! Stateless list helpers for views rendering from the service state.

use std::collections::HashSet;

use thiserror::Error;

use crate::model::{Recipe, RecipeId};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ViewError {
    #[error("recipe {0} not found")]
    NotFound(RecipeId),
    #[error("recipe {0} belongs to another cook")]
    NotOwner(RecipeId),
}

/// Case-insensitive title match; a blank query keeps everything.
pub fn search_by_title<'a>(recipes: &'a [Recipe], query: &str) -> Vec<&'a Recipe> {
    let needle = query.trim().to_lowercase();
    recipes
        .iter()
        .filter(|recipe| needle.is_empty() || recipe.title.to_lowercase().contains(&needle))
        .collect()
}

pub fn owned(recipes: &[Recipe]) -> Vec<&Recipe> {
    recipes.iter().filter(|recipe| recipe.is_owner).collect()
}

pub fn saved<'a>(recipes: &'a [Recipe], saved_ids: &HashSet<RecipeId>) -> Vec<&'a Recipe> {
    recipes
        .iter()
        .filter(|recipe| saved_ids.contains(&recipe.id))
        .collect()
}

pub fn find<'a>(recipes: &'a [Recipe], id: &RecipeId) -> Option<&'a Recipe> {
    recipes.iter().find(|recipe| recipe.id == *id)
}

/// Gate used before offering an edit form.
pub fn editable<'a>(recipes: &'a [Recipe], id: &RecipeId) -> Result<&'a Recipe, ViewError> {
    let recipe = find(recipes, id).ok_or_else(|| ViewError::NotFound(id.clone()))?;
    if !recipe.is_owner {
        return Err(ViewError::NotOwner(id.clone()));
    }
    Ok(recipe)
}
