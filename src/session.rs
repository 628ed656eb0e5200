use std::sync::Arc;

use recipe_box_identity::IdentityResolver;
use recipe_box_recipes::{
    IdentitySubscription, RecipeService, RecipeStore, RecipeSync, RecipeSyncBuilder, SyncPolicy,
};
use tracing::info;

use crate::config::AppConfig;

/// One client's recipe state, wired to its identity resolver.
///
/// Views receive the service through [`RecipeSession::service`]; ending the
/// session detaches it from the resolver.
pub struct RecipeSession {
    service: Arc<RecipeSync>,
    subscription: Option<IdentitySubscription>,
}

impl RecipeSession {
    /// Must be called inside a tokio runtime.
    pub fn start(
        policy: SyncPolicy,
        store: Arc<dyn RecipeStore>,
        resolver: Arc<dyn IdentityResolver>,
    ) -> Self {
        let service = RecipeSyncBuilder::new(store).with_policy(policy).build();
        let subscription = IdentitySubscription::attach(service.clone(), resolver);
        info!("recipe session started");
        Self {
            service,
            subscription: Some(subscription),
        }
    }

    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn RecipeStore>,
        resolver: Arc<dyn IdentityResolver>,
    ) -> Self {
        Self::start(config.sync.clone(), store, resolver)
    }

    pub fn service(&self) -> Arc<dyn RecipeService> {
        self.service.clone()
    }

    pub fn is_attached(&self) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(IdentitySubscription::is_active)
    }

    /// Stops following identity changes. State already loaded stays readable.
    pub fn end(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.detach();
            info!("recipe session ended");
        }
    }
}

impl Drop for RecipeSession {
    fn drop(&mut self) {
        self.end();
    }
}
