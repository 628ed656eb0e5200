use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::errors::{StoreError, StoreErrorKind, StoreResult};
use crate::model::{NewRecipeRow, RecipeDraft, RecipeId, RecipeRow, SavedAssociation, UserId};
use crate::store::{RecipeStore, StoreOp};

#[derive(Clone, Debug)]
enum Failure {
    Always(StoreErrorKind),
    Once(StoreErrorKind),
}

/// Process-local store with injectable failures and latency.
#[derive(Default)]
pub struct InMemoryRecipeStore {
    rows: RwLock<Vec<RecipeRow>>,
    saved: RwLock<HashSet<SavedAssociation>>,
    failures: Mutex<HashMap<StoreOp, Failure>>,
    delays: Mutex<HashMap<StoreOp, Duration>>,
    calls: Mutex<Vec<StoreOp>>,
    last_created: Mutex<Option<DateTime<Utc>>>,
}

impl InMemoryRecipeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_rows(rows: Vec<RecipeRow>) -> Arc<Self> {
        let store = Self::default();
        *store.rows.write() = rows;
        Arc::new(store)
    }

    /// Seeds a row directly, bypassing call accounting.
    pub fn seed_row(&self, row: RecipeRow) {
        self.rows.write().push(row);
    }

    pub fn seed_saved(&self, user: &UserId, recipe: &RecipeId) {
        self.saved
            .write()
            .insert(SavedAssociation::new(user.clone(), recipe.clone()));
    }

    pub fn rows(&self) -> Vec<RecipeRow> {
        self.rows.read().clone()
    }

    pub fn saved_for(&self, user: &UserId) -> HashSet<RecipeId> {
        self.saved
            .read()
            .iter()
            .filter(|assoc| assoc.user_id == *user)
            .map(|assoc| assoc.recipe_id.clone())
            .collect()
    }

    /// Every call to `op` fails with `kind` until [`recover`](Self::recover).
    pub fn fail(&self, op: StoreOp, kind: StoreErrorKind) {
        self.failures.lock().insert(op, Failure::Always(kind));
    }

    pub fn fail_once(&self, op: StoreOp, kind: StoreErrorKind) {
        self.failures.lock().insert(op, Failure::Once(kind));
    }

    pub fn recover(&self, op: StoreOp) {
        self.failures.lock().remove(&op);
    }

    /// Latency applied to each later call of `op`; `Duration::ZERO` clears it.
    pub fn set_delay(&self, op: StoreOp, delay: Duration) {
        let mut delays = self.delays.lock();
        if delay.is_zero() {
            delays.remove(&op);
        } else {
            delays.insert(op, delay);
        }
    }

    pub fn calls(&self) -> Vec<StoreOp> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_of(&self, op: StoreOp) -> usize {
        self.calls.lock().iter().filter(|call| **call == op).count()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().clear();
    }

    async fn enter(&self, op: StoreOp) -> StoreResult<()> {
        self.calls.lock().push(op);
        let delay = self.delays.lock().get(&op).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failure = {
            let mut failures = self.failures.lock();
            match failures.get(&op).cloned() {
                Some(Failure::Once(kind)) => {
                    failures.remove(&op);
                    Some(kind)
                }
                Some(Failure::Always(kind)) => Some(kind),
                None => None,
            }
        };
        match failure {
            Some(kind) => {
                debug!(%op, error = %kind, "injected store failure");
                Err(StoreError::new(kind))
            }
            None => Ok(()),
        }
    }

    /// Creation timestamps are strictly increasing so ordering is total.
    fn next_created_at(&self) -> DateTime<Utc> {
        let mut last = self.last_created.lock();
        let mut now = Utc::now();
        if let Some(prev) = *last {
            if now <= prev {
                now = prev + chrono::Duration::microseconds(1);
            }
        }
        *last = Some(now);
        now
    }
}

#[async_trait]
impl RecipeStore for InMemoryRecipeStore {
    async fn list_recipes(&self) -> StoreResult<Vec<RecipeRow>> {
        self.enter(StoreOp::ListRecipes).await?;
        let mut rows = self.rows.read().clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn insert_recipe(&self, payload: NewRecipeRow) -> StoreResult<RecipeRow> {
        self.enter(StoreOp::InsertRecipe).await?;
        let row = payload.into_row(RecipeId::generate(), self.next_created_at());
        self.rows.write().push(row.clone());
        Ok(row)
    }

    async fn update_recipe(&self, id: &RecipeId, changes: RecipeDraft) -> StoreResult<()> {
        self.enter(StoreOp::UpdateRecipe).await?;
        let mut rows = self.rows.write();
        let row = rows
            .iter_mut()
            .find(|row| row.id == *id)
            .ok_or(StoreError::new(StoreErrorKind::NotFound))?;
        row.title = changes.title;
        row.description = changes.description;
        row.image = changes.image;
        row.ingredients = changes.ingredients;
        row.steps = changes.steps;
        row.cook_time = changes.cook_time;
        row.difficulty = changes.difficulty;
        row.author = changes.author;
        row.is_public = changes.is_public;
        Ok(())
    }

    async fn list_saved_for(&self, user: &UserId) -> StoreResult<HashSet<RecipeId>> {
        self.enter(StoreOp::ListSaved).await?;
        Ok(self.saved_for(user))
    }

    async fn insert_saved(&self, recipe: &RecipeId, user: &UserId) -> StoreResult<()> {
        self.enter(StoreOp::InsertSaved).await?;
        self.saved
            .write()
            .insert(SavedAssociation::new(user.clone(), recipe.clone()));
        Ok(())
    }

    async fn delete_saved(&self, recipe: &RecipeId, user: &UserId) -> StoreResult<()> {
        self.enter(StoreOp::DeleteSaved).await?;
        self.saved
            .write()
            .remove(&SavedAssociation::new(user.clone(), recipe.clone()));
        Ok(())
    }
}
