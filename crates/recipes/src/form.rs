//! Normalisation of raw recipe form input into a [`RecipeDraft`].

use serde::{Deserialize, Serialize};

use crate::model::{Difficulty, Recipe, RecipeDraft};

pub const DEFAULT_COOK_TIME: u32 = 30;
pub const DEFAULT_AUTHOR: &str = "John Smith";
pub const DEFAULT_IMAGE_URL: &str =
    "https://images.pexels.com/photos/1640777/pexels-photo-1640777.jpeg?auto=compress&cs=tinysrgb&w=800";

/// Text exactly as entered; list fields hold one entry per line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipeForm {
    pub title: String,
    pub description: String,
    pub image: String,
    pub ingredients: String,
    pub steps: String,
    pub cook_time: String,
    pub difficulty: Difficulty,
    pub author: String,
    pub is_public: bool,
}

impl Default for RecipeForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            image: String::new(),
            ingredients: String::new(),
            steps: String::new(),
            cook_time: String::new(),
            difficulty: Difficulty::Easy,
            author: DEFAULT_AUTHOR.to_string(),
            is_public: true,
        }
    }
}

impl RecipeForm {
    /// Pre-fills the form for editing an existing recipe.
    pub fn from_recipe(recipe: &Recipe) -> Self {
        Self {
            title: recipe.title.clone(),
            description: recipe.description.clone(),
            image: recipe.image.clone(),
            ingredients: recipe.ingredients.join("\n"),
            steps: recipe.steps.join("\n"),
            cook_time: recipe.cook_time.to_string(),
            difficulty: recipe.difficulty,
            author: recipe.author.clone(),
            is_public: recipe.is_public,
        }
    }

    pub fn into_draft(self) -> RecipeDraft {
        let image = if self.image.trim().is_empty() {
            DEFAULT_IMAGE_URL.to_string()
        } else {
            self.image.trim().to_string()
        };
        let author = if self.author.trim().is_empty() {
            DEFAULT_AUTHOR.to_string()
        } else {
            self.author.trim().to_string()
        };
        RecipeDraft {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            image,
            ingredients: split_lines(&self.ingredients),
            steps: split_lines(&self.steps),
            cook_time: parse_cook_time(&self.cook_time),
            difficulty: self.difficulty,
            author,
            is_public: self.is_public,
        }
    }
}

fn split_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reads the leading integer, so `"12 min"` is 12. Anything without a
/// positive leading integer falls back to [`DEFAULT_COOK_TIME`].
fn parse_cook_time(raw: &str) -> u32 {
    let raw = raw.trim_start();
    let (negative, rest) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let digits = &rest[..end];
    if negative || digits.is_empty() {
        return DEFAULT_COOK_TIME;
    }
    match digits.parse::<u32>() {
        Ok(0) => DEFAULT_COOK_TIME,
        Ok(minutes) => minutes,
        // Only overflow is left at this point.
        Err(_) => u32::MAX,
    }
}
