use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Combination, HeroRate};

pub type SnapshotId = i64;

/// One persisted observation of a combination's hero table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub timestamp: DateTime<Utc>,
    pub combination: Combination,
    pub content_digest: String,
    /// Ordered by hero id
    pub hero_rates: Vec<HeroRate>,
}

impl Snapshot {
    pub fn hero(&self, hero_id: &str) -> Option<&HeroRate> {
        self.hero_rates.iter().find(|h| h.hero_id == hero_id)
    }
}

/// Snapshot row without its hero table, as returned by list queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub id: SnapshotId,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub combination: Combination,
    pub content_digest: String,
    pub hero_count: i64,
}

/// Result of an insert attempt under the one-per-day invariant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Created(SnapshotId),
    /// A snapshot for this combination already exists on that day
    AlreadyExists,
}

impl InsertOutcome {
    pub fn snapshot_id(&self) -> Option<SnapshotId> {
        match self {
            InsertOutcome::Created(id) => Some(*id),
            InsertOutcome::AlreadyExists => None,
        }
    }
}

/// Recognized list filters. Every axis is optional; `limit` caps the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotFilter {
    pub mode: Option<super::Mode>,
    pub input: Option<super::Input>,
    pub region: Option<super::Region>,
    pub tier: Option<super::Tier>,
    pub map: Option<super::MapName>,
    pub limit: i64,
}

impl SnapshotFilter {
    pub const DEFAULT_LIMIT: i64 = 30;
}

impl Default for SnapshotFilter {
    fn default() -> Self {
        Self {
            mode: None,
            input: None,
            region: None,
            tier: None,
            map: None,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}
