use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::Combination;
use crate::error::{Result, TrackerError};

pub type RunId = i64;

/// Lifecycle status of an orchestration pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Partial,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }

    /// Aggregate status from per-run counters.
    ///
    /// Failed iff every combination failed; Success iff nothing failed and no
    /// table was suspiciously small; Partial otherwise. A cancelled run is
    /// always Partial.
    pub fn from_counts(total: usize, failed: usize, partial: usize, cancelled: bool) -> Self {
        if cancelled {
            RunStatus::Partial
        } else if total > 0 && failed == total {
            RunStatus::Failed
        } else if failed == 0 && partial == 0 {
            RunStatus::Success
        } else {
            RunStatus::Partial
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = TrackerError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw {
            "running" => Ok(RunStatus::Running),
            "success" => Ok(RunStatus::Success),
            "partial" => Ok(RunStatus::Partial),
            "failed" => Ok(RunStatus::Failed),
            other => Err(TrackerError::Internal(format!("unknown run status '{other}'"))),
        }
    }
}

/// A combination that failed during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunError {
    pub combination: Combination,
    pub message: String,
}

/// Metadata about one orchestration pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: RunId,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub snapshots_created: u32,
    pub snapshots_skipped: u32,
    pub partial_count: u32,
    pub errors: Vec<RunError>,
    pub duration_ms: Option<i64>,
}

/// Storage-level health summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub total_snapshots: i64,
    pub oldest_timestamp: Option<DateTime<Utc>>,
    pub newest_timestamp: Option<DateTime<Utc>>,
    pub last_run: Option<RunRecord>,
    /// Database size in bytes, write-ahead log included
    pub storage_size: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_counts() {
        assert_eq!(RunStatus::from_counts(96, 96, 0, false), RunStatus::Failed);
        assert_eq!(RunStatus::from_counts(96, 0, 0, false), RunStatus::Success);
        assert_eq!(RunStatus::from_counts(96, 3, 0, false), RunStatus::Partial);
        assert_eq!(RunStatus::from_counts(96, 0, 2, false), RunStatus::Partial);
        assert_eq!(RunStatus::from_counts(0, 0, 0, false), RunStatus::Success);
    }

    #[test]
    fn test_cancelled_run_is_partial() {
        assert_eq!(RunStatus::from_counts(96, 0, 0, true), RunStatus::Partial);
        assert_eq!(RunStatus::from_counts(10, 10, 0, true), RunStatus::Partial);
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            RunStatus::Running,
            RunStatus::Success,
            RunStatus::Partial,
            RunStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<RunStatus>().unwrap(), status);
        }
        assert!(!RunStatus::Running.is_terminal());
    }
}
