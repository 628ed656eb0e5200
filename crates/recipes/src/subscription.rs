use std::sync::Arc;

use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, warn};

use recipe_box_identity::IdentityResolver;

use crate::api::RecipeService;

/// Keeps a service in step with an identity resolver for the lifetime of a
/// session. Dropping it stops the listener and any reload still running.
pub struct IdentitySubscription {
    task: JoinHandle<()>,
}

impl IdentitySubscription {
    /// Applies the resolver's current state right away, then every change.
    ///
    /// State transitions are applied in notification order on the listener
    /// task; the fetches run on their own tasks so a newer identity never waits
    /// behind an older, slower load. The service discards whatever the older
    /// load returns.
    pub fn attach(
        service: Arc<dyn RecipeService>,
        resolver: Arc<dyn IdentityResolver>,
    ) -> Self {
        let mut rx = resolver.subscribe();
        let task = tokio::spawn(async move {
            let mut reloads = JoinSet::new();
            let initial = rx.borrow_and_update().clone();
            if let Some(ticket) = service.accept_identity(initial) {
                let service = service.clone();
                reloads.spawn(async move { service.reload(ticket).await });
            }
            loop {
                tokio::select! {
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let next = rx.borrow_and_update().clone();
                        if let Some(ticket) = service.accept_identity(next) {
                            let service = service.clone();
                            reloads.spawn(async move { service.reload(ticket).await });
                        }
                    }
                    Some(joined) = reloads.join_next(), if !reloads.is_empty() => {
                        if let Err(err) = joined {
                            if err.is_panic() {
                                warn!(error = %err, "identity reload panicked");
                            }
                        }
                    }
                }
            }
            while reloads.join_next().await.is_some() {}
            debug!("identity resolver closed; subscription finished");
        });
        Self { task }
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn detach(self) {}
}

impl Drop for IdentitySubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
