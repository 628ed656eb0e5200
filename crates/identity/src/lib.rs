use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use recipe_box_core_types::UserId;

/// Identity as published by the authentication provider.
///
/// `ready == false` means the provider has not resolved the session yet; the
/// `user` field is meaningless until it flips.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct IdentityState {
    pub user: Option<UserId>,
    pub ready: bool,
}

impl IdentityState {
    pub fn unresolved() -> Self {
        Self {
            user: None,
            ready: false,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            user: None,
            ready: true,
        }
    }

    pub fn signed_in(user: impl Into<UserId>) -> Self {
        Self {
            user: Some(user.into()),
            ready: true,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.ready && self.user.is_some()
    }
}

/// Source of identity updates consumed by the synchronization service.
pub trait IdentityResolver: Send + Sync {
    fn current(&self) -> IdentityState;
    fn subscribe(&self) -> watch::Receiver<IdentityState>;
}

/// In-process resolver for tests and embedded hosts that drive sign-in
/// themselves.
pub struct InMemoryIdentity {
    sender: watch::Sender<IdentityState>,
}

impl InMemoryIdentity {
    pub fn new() -> Arc<Self> {
        Self::with_state(IdentityState::unresolved())
    }

    pub fn with_state(initial: IdentityState) -> Arc<Self> {
        let (sender, _) = watch::channel(initial);
        Arc::new(Self { sender })
    }

    /// Publishes `next`; subscribers are only woken when it differs from the
    /// current state.
    pub fn set(&self, next: IdentityState) -> bool {
        let changed = self.sender.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next.clone();
            true
        });
        if changed {
            debug!(user = ?next.user, ready = next.ready, "identity changed");
        }
        changed
    }

    pub fn sign_in(&self, user: impl Into<UserId>) -> bool {
        self.set(IdentityState::signed_in(user))
    }

    pub fn sign_out(&self) -> bool {
        self.set(IdentityState::anonymous())
    }
}

impl IdentityResolver for InMemoryIdentity {
    fn current(&self) -> IdentityState {
        self.sender.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<IdentityState> {
        self.sender.subscribe()
    }
}
