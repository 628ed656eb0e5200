use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tracing::{debug, info, warn};

use recipe_box_identity::IdentityState;

use crate::errors::{StoreError, SyncError, SyncResult};
use crate::events::{LoadTarget, SyncEvent};
use crate::metrics::SyncMetrics;
use crate::model::{
    NewRecipeRow, Recipe, RecipeDraft, RecipeId, SyncSnapshot, SyncStatus, UserId,
};
use crate::policy::SyncPolicy;
use crate::state::SyncState;
use crate::store::RecipeStore;

/// Session-scoped recipe state and the operations that mutate it.
#[async_trait]
pub trait RecipeService: Send + Sync {
    /// Applies the state transition for an identity notification and returns
    /// the reload it calls for, if any. Must be called in notification order.
    fn accept_identity(&self, identity: IdentityState) -> Option<ReloadTicket>;
    async fn reload(&self, ticket: ReloadTicket);

    /// Applies an identity notification, reloading when the identity changed.
    async fn on_identity(&self, identity: IdentityState) {
        if let Some(ticket) = self.accept_identity(identity) {
            self.reload(ticket).await;
        }
    }

    async fn load(&self) -> SyncResult<usize>;
    async fn load_saved(&self) -> SyncResult<usize>;
    fn is_saved(&self, recipe_id: &RecipeId) -> bool;
    /// Flips membership and returns the new state.
    async fn toggle_saved(&self, recipe_id: &RecipeId) -> SyncResult<bool>;
    async fn set_saved(&self, recipe_id: &RecipeId, saved: bool) -> SyncResult<bool>;
    async fn add_recipe(&self, draft: RecipeDraft) -> SyncResult<Recipe>;
    async fn update_recipe(&self, id: &RecipeId, draft: RecipeDraft) -> SyncResult<()>;
    fn recipes(&self) -> Vec<Recipe>;
    fn recipe(&self, id: &RecipeId) -> Option<Recipe>;
    fn saved_recipe_ids(&self) -> HashSet<RecipeId>;
    fn loading(&self) -> bool;
    fn identity(&self) -> Option<UserId>;
    fn snapshot(&self) -> SyncSnapshot;
    fn status(&self) -> SyncStatus;
    fn subscribe(&self) -> broadcast::Receiver<SyncEvent>;
}

/// A reload issued for one identity; stale once the generation moves on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReloadTicket {
    generation: u64,
    user: UserId,
}

impl ReloadTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }
}

#[derive(Clone)]
pub struct RecipeSyncBuilder {
    store: Arc<dyn RecipeStore>,
    policy: SyncPolicy,
}

impl RecipeSyncBuilder {
    pub fn new(store: Arc<dyn RecipeStore>) -> Self {
        Self {
            store,
            policy: SyncPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: SyncPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> Arc<RecipeSync> {
        Arc::new(RecipeSync::new(self.store, self.policy))
    }
}

pub struct RecipeSync {
    store: Arc<dyn RecipeStore>,
    policy: SyncPolicy,
    metrics: SyncMetrics,
    state: RwLock<SyncState>,
    events: broadcast::Sender<SyncEvent>,
    gates: DashMap<RecipeId, Arc<AsyncMutex<()>>>,
}

impl RecipeSync {
    pub fn new(store: Arc<dyn RecipeStore>, policy: SyncPolicy) -> Self {
        let (events, _) = broadcast::channel(policy.channel_capacity());
        Self {
            store,
            policy,
            metrics: SyncMetrics::default(),
            state: RwLock::new(SyncState::default()),
            events,
            gates: DashMap::new(),
        }
    }

    pub fn policy(&self) -> &SyncPolicy {
        &self.policy
    }

    fn emit(&self, event: SyncEvent) {
        // No receivers is fine; views subscribe lazily.
        let _ = self.events.send(event);
    }

    fn session(&self) -> Option<(u64, UserId)> {
        let state = self.state.read();
        state
            .identity
            .clone()
            .map(|user| (state.generation, user))
    }

    fn require_user(&self) -> SyncResult<UserId> {
        match self.session() {
            Some((_, user)) => Ok(user),
            None => {
                debug!("mutation rejected: no authenticated identity");
                Err(SyncError::NotAuthenticated)
            }
        }
    }

    fn store_failed(&self, op: &str, err: StoreError) -> SyncError {
        self.metrics.record_store_failure();
        warn!(op, error = %err, "store call failed; local state unchanged");
        SyncError::Store(err)
    }

    /// Runs `op` while holding the single-flight gate for `recipe_id`.
    async fn gated<T, F>(&self, recipe_id: &RecipeId, op: F) -> T
    where
        F: Future<Output = T>,
    {
        let gate = self
            .gates
            .entry(recipe_id.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let release = GateRelease {
            gates: &self.gates,
            recipe_id,
            gate,
        };
        let _held = release.gate.lock().await;
        op.await
    }

    async fn fetch_recipes(&self, generation: u64, user: &UserId) -> SyncResult<usize> {
        let rows = match self.store.list_recipes().await {
            Ok(rows) => rows,
            Err(err) => {
                if !self.state.read().is_current(generation) {
                    return Err(self.superseded(LoadTarget::Recipes, generation));
                }
                self.emit(SyncEvent::LoadFailed {
                    what: LoadTarget::Recipes,
                    reason: err.to_string(),
                });
                return Err(self.store_failed("list_recipes", err));
            }
        };
        let visibility = self.policy.visibility;
        let recipes: Vec<Recipe> = rows
            .into_iter()
            .filter(|row| visibility.admits(row, user))
            .map(|row| Recipe::from_row(row, Some(user)))
            .collect();
        let count = recipes.len();
        let applied = {
            let mut state = self.state.write();
            if state.is_current(generation) {
                state.replace_recipes(recipes);
                true
            } else {
                false
            }
        };
        if !applied {
            return Err(self.superseded(LoadTarget::Recipes, generation));
        }
        debug!(user = %user, count, "recipes loaded");
        Ok(count)
    }

    async fn fetch_saved(&self, generation: u64, user: &UserId) -> SyncResult<usize> {
        let saved = match self.store.list_saved_for(user).await {
            Ok(saved) => saved,
            Err(err) => {
                if !self.state.read().is_current(generation) {
                    return Err(self.superseded(LoadTarget::Saved, generation));
                }
                self.emit(SyncEvent::LoadFailed {
                    what: LoadTarget::Saved,
                    reason: err.to_string(),
                });
                return Err(self.store_failed("list_saved_for", err));
            }
        };
        let count = saved.len();
        let applied = {
            let mut state = self.state.write();
            if state.is_current(generation) {
                state.saved = saved;
                true
            } else {
                false
            }
        };
        if !applied {
            return Err(self.superseded(LoadTarget::Saved, generation));
        }
        debug!(user = %user, count, "saved recipes loaded");
        Ok(count)
    }

    fn superseded(&self, what: LoadTarget, generation: u64) -> SyncError {
        self.metrics.record_stale_discard();
        debug!(?what, generation, "discarding result of superseded load");
        SyncError::Superseded
    }

    async fn write_saved(
        &self,
        recipe_id: &RecipeId,
        user: &UserId,
        saved: bool,
    ) -> SyncResult<bool> {
        let outcome = if saved {
            self.store.insert_saved(recipe_id, user).await
        } else {
            self.store.delete_saved(recipe_id, user).await
        };
        if let Err(err) = outcome {
            let op = if saved { "insert_saved" } else { "delete_saved" };
            return Err(self.store_failed(op, err));
        }
        self.metrics.record_mutation();
        let applied = {
            let mut state = self.state.write();
            if state.identity.as_ref() == Some(user) {
                if saved {
                    state.saved.insert(recipe_id.clone());
                } else {
                    state.saved.remove(recipe_id);
                }
                true
            } else {
                false
            }
        };
        if applied {
            self.emit(SyncEvent::SavedChanged {
                recipe: recipe_id.clone(),
                saved,
            });
        } else {
            debug!(recipe_id = %recipe_id, "identity changed during save; local set left alone");
        }
        Ok(saved)
    }
}

/// Drops the map entry for a recipe once no caller holds or awaits its gate,
/// including when the gated future is cancelled.
struct GateRelease<'a> {
    gates: &'a DashMap<RecipeId, Arc<AsyncMutex<()>>>,
    recipe_id: &'a RecipeId,
    gate: Arc<AsyncMutex<()>>,
}

impl Drop for GateRelease<'_> {
    fn drop(&mut self) {
        // Two references remain when idle: the map entry and this guard.
        self.gates.remove_if(self.recipe_id, |_, entry| {
            Arc::ptr_eq(entry, &self.gate) && Arc::strong_count(entry) == 2
        });
    }
}

#[async_trait]
impl RecipeService for RecipeSync {
    fn accept_identity(&self, identity: IdentityState) -> Option<ReloadTicket> {
        if !identity.ready {
            let mut state = self.state.write();
            state.generation += 1;
            state.cursor = None;
            state.loading = true;
            debug!("identity unresolved; waiting");
            return None;
        }

        let user = identity.user;
        let generation = {
            let mut state = self.state.write();
            if state.cursor.as_ref() == Some(&user) {
                None
            } else {
                state.generation += 1;
                state.cursor = Some(user.clone());
                let switched = state.identity != user;
                state.identity = user.clone();
                match user {
                    Some(_) => {
                        // Another account's rows must not survive a failed reload.
                        if switched {
                            state.recipes.clear();
                            state.saved.clear();
                        }
                        state.loading = true;
                    }
                    None => state.clear(),
                }
                Some(state.generation)
            }
        };
        let Some(generation) = generation else {
            self.metrics.record_skipped_reload();
            debug!(user = ?user, "identity unchanged; skipping reload");
            return None;
        };
        let Some(user) = user else {
            info!("signed out; session state cleared");
            self.emit(SyncEvent::Cleared);
            return None;
        };
        self.metrics.record_reload();
        Some(ReloadTicket { generation, user })
    }

    async fn reload(&self, ticket: ReloadTicket) {
        let ReloadTicket { generation, user } = ticket;
        info!(user = %user, generation, "reloading recipes for identity");
        let (recipes, saved) = tokio::join!(
            self.fetch_recipes(generation, &user),
            self.fetch_saved(generation, &user)
        );

        let settled = {
            let mut state = self.state.write();
            if state.is_current(generation) {
                state.loading = false;
                Some((state.recipes.len(), state.saved.len()))
            } else {
                None
            }
        };
        match settled {
            Some((recipes_held, saved_held)) => {
                debug!(
                    recipes_ok = recipes.is_ok(),
                    saved_ok = saved.is_ok(),
                    "reload settled"
                );
                self.emit(SyncEvent::Reloaded {
                    identity: user,
                    recipes: recipes_held,
                    saved: saved_held,
                });
            }
            None => debug!(generation, "reload superseded before settling"),
        }
    }

    async fn load(&self) -> SyncResult<usize> {
        match self.session() {
            Some((generation, user)) => self.fetch_recipes(generation, &user).await,
            None => Ok(0),
        }
    }

    async fn load_saved(&self) -> SyncResult<usize> {
        match self.session() {
            Some((generation, user)) => self.fetch_saved(generation, &user).await,
            None => Ok(0),
        }
    }

    fn is_saved(&self, recipe_id: &RecipeId) -> bool {
        self.state.read().saved.contains(recipe_id)
    }

    async fn toggle_saved(&self, recipe_id: &RecipeId) -> SyncResult<bool> {
        let user = self.require_user()?;
        self.gated(recipe_id, async {
            let target = !self.is_saved(recipe_id);
            self.write_saved(recipe_id, &user, target).await
        })
        .await
    }

    async fn set_saved(&self, recipe_id: &RecipeId, saved: bool) -> SyncResult<bool> {
        let user = self.require_user()?;
        self.gated(recipe_id, self.write_saved(recipe_id, &user, saved))
            .await
    }

    async fn add_recipe(&self, draft: RecipeDraft) -> SyncResult<Recipe> {
        let user = self.require_user()?;
        draft.validate()?;
        let row = match self
            .store
            .insert_recipe(NewRecipeRow::new(user.clone(), draft))
            .await
        {
            Ok(row) => row,
            Err(err) => return Err(self.store_failed("insert_recipe", err)),
        };
        self.metrics.record_mutation();

        let recipe = Recipe::from_row(row, Some(&user));
        let applied = {
            let mut state = self.state.write();
            state.identity.as_ref() == Some(&user) && state.prepend(recipe.clone())
        };
        if applied {
            self.emit(SyncEvent::RecipeAdded(recipe.id.clone()));
        }
        info!(recipe_id = %recipe.id, "recipe created");
        Ok(recipe)
    }

    async fn update_recipe(&self, id: &RecipeId, draft: RecipeDraft) -> SyncResult<()> {
        draft.validate()?;
        self.gated(id, async {
            if let Err(err) = self.store.update_recipe(id, draft.clone()).await {
                return Err(self.store_failed("update_recipe", err));
            }
            self.metrics.record_mutation();
            let patched = {
                let mut state = self.state.write();
                match state.find_mut(id) {
                    Some(recipe) => {
                        recipe.apply_draft(&draft);
                        true
                    }
                    None => false,
                }
            };
            if patched {
                self.emit(SyncEvent::RecipeUpdated(id.clone()));
            } else {
                debug!(recipe_id = %id, "updated recipe is not held locally");
            }
            Ok(())
        })
        .await
    }

    fn recipes(&self) -> Vec<Recipe> {
        self.state.read().recipes.clone()
    }

    fn recipe(&self, id: &RecipeId) -> Option<Recipe> {
        self.state
            .read()
            .recipes
            .iter()
            .find(|recipe| recipe.id == *id)
            .cloned()
    }

    fn saved_recipe_ids(&self) -> HashSet<RecipeId> {
        self.state.read().saved.clone()
    }

    fn loading(&self) -> bool {
        self.state.read().loading
    }

    fn identity(&self) -> Option<UserId> {
        self.state.read().identity.clone()
    }

    fn snapshot(&self) -> SyncSnapshot {
        self.state.read().snapshot()
    }

    fn status(&self) -> SyncStatus {
        let state = self.state.read();
        SyncStatus {
            identity: state.identity.clone(),
            recipes: state.recipes.len(),
            saved: state.saved.len(),
            loading: state.loading,
            generation: state.generation,
            reloads: self.metrics.reloads(),
            skipped_reloads: self.metrics.skipped_reloads(),
            stale_discards: self.metrics.stale_discards(),
            store_failures: self.metrics.store_failures(),
            mutations: self.metrics.mutations(),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }
}
