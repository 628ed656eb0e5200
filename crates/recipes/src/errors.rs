use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreErrorKind {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("not authorized: {0}")]
    Unauthorized(String),
    #[error("constraint violated: {0}")]
    Constraint(String),
    #[error("record not found")]
    NotFound,
    #[error("internal error: {0}")]
    Internal(String),
}

/// Any failure reported by the persistence collaborator.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error(transparent)]
pub struct StoreError(pub StoreErrorKind);

impl StoreError {
    pub fn new(kind: StoreErrorKind) -> Self {
        Self(kind)
    }

    pub fn kind(&self) -> &StoreErrorKind {
        &self.0
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self(StoreErrorKind::Unavailable(message.into()))
    }
}

impl From<StoreErrorKind> for StoreError {
    fn from(kind: StoreErrorKind) -> Self {
        StoreError(kind)
    }
}

/// Outcome of a synchronization operation as seen by the view layer.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("no authenticated identity")]
    NotAuthenticated,
    #[error("invalid recipe draft: {0}")]
    InvalidDraft(String),
    #[error("result discarded: identity changed while the request was in flight")]
    Superseded,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<StoreErrorKind> for SyncError {
    fn from(kind: StoreErrorKind) -> Self {
        SyncError::Store(StoreError(kind))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
pub type SyncResult<T> = Result<T, SyncError>;
