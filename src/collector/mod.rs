//! Snapshot acquisition pipeline
//!
//! Fetches hero rate tables per combination, normalizes and fingerprints them,
//! decides whether anything changed, and hands new snapshots to the store.

pub mod change_detector;
pub mod normalizer;
pub mod orchestrator;
pub mod retry;

pub use change_detector::{ChangeDetector, Decision, DecisionReason};
pub use normalizer::{canonical_hero_id, digest, normalize, NormalizedTable};
pub use orchestrator::{
    CombinationOutcome, OrchestratorConfig, RunOrchestrator, RunSummary, SkipReason,
};
pub use retry::{retry_with_backoff, with_retry, RetryPolicy};
