use serde::{Deserialize, Serialize};

use crate::model::{RecipeRow, UserId};

/// Which rows a viewer gets to see after a load.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityMode {
    /// Every row the store returns, regardless of `is_public`.
    #[default]
    All,
    /// Public rows plus the viewer's own private ones.
    PublicAndOwn,
}

impl VisibilityMode {
    pub fn admits(&self, row: &RecipeRow, viewer: &UserId) -> bool {
        match self {
            VisibilityMode::All => true,
            VisibilityMode::PublicAndOwn => row.is_public || row.owner_id == *viewer,
        }
    }
}

impl std::str::FromStr for VisibilityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "all" => Ok(VisibilityMode::All),
            "public_and_own" => Ok(VisibilityMode::PublicAndOwn),
            other => Err(format!("unknown visibility mode '{other}'")),
        }
    }
}

/// Upper bound on the event channel; tokio allocates every slot up front.
pub const MAX_EVENT_CAPACITY: usize = 1 << 16;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyncPolicy {
    pub visibility: VisibilityMode,
    pub event_capacity: usize,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            visibility: VisibilityMode::All,
            event_capacity: 64,
        }
    }
}

impl SyncPolicy {
    /// `event_capacity` clamped to `1..=MAX_EVENT_CAPACITY`.
    pub fn channel_capacity(&self) -> usize {
        self.event_capacity.clamp(1, MAX_EVENT_CAPACITY)
    }
}
