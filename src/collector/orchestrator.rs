//! Run orchestrator
//!
//! Walks the combination space one combination at a time:
//! fetch (with retry) → normalize → decide → persist. Failures are recorded
//! per combination and never stop the run. A run ends with exactly one
//! terminal update of its record.

use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::adapters::{RateProvider, SnapshotStore};
use crate::collector::change_detector::{ChangeDetector, DecisionReason};
use crate::collector::normalizer::normalize;
use crate::collector::retry::{with_retry, RetryPolicy};
use crate::config::ScraperConfig;
use crate::coordination::CancelToken;
use crate::domain::{
    Combination, CombinationSpace, InsertOutcome, RunError, RunId, RunRecord, RunStatus,
    SnapshotId,
};
use crate::error::{Result, TrackerError};

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub retry: RetryPolicy,
    /// Pause between consecutive combinations, whatever their outcome
    pub request_delay: Duration,
    /// Tables with fewer heroes are flagged as partial data
    pub min_heroes: usize,
    pub materiality_threshold: Option<f64>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from(&ScraperConfig::default())
    }
}

impl From<&ScraperConfig> for OrchestratorConfig {
    fn from(config: &ScraperConfig) -> Self {
        Self {
            retry: config.retry_policy(),
            request_delay: config.request_delay(),
            min_heroes: config.min_heroes,
            materiality_threshold: config.materiality_threshold,
        }
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// Why a fetched table did not produce a new snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Change detector found nothing new
    Unchanged(DecisionReason),
    /// A snapshot for this combination is already stored today
    AlreadyStoredToday,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CombinationOutcome {
    Persisted { snapshot_id: SnapshotId, partial: bool },
    Skipped { reason: SkipReason, partial: bool },
    Failed { message: String },
}

impl CombinationOutcome {
    pub fn is_partial(&self) -> bool {
        match self {
            CombinationOutcome::Persisted { partial, .. }
            | CombinationOutcome::Skipped { partial, .. } => *partial,
            CombinationOutcome::Failed { .. } => false,
        }
    }
}

/// Aggregate result of one run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub run_id: RunId,
    pub status: RunStatus,
    /// Size of the configured combination space
    pub total: usize,
    /// Combinations actually attempted
    pub processed: usize,
    pub created: u32,
    pub skipped: u32,
    pub failed: u32,
    pub partial: u32,
    pub errors: Vec<RunError>,
    pub duration: Duration,
    pub cancelled: bool,
    /// False when the terminal run record could not be written
    pub recorded: bool,
}

impl RunSummary {
    pub fn log(&self) {
        info!("========================================");
        info!("Run {} finished: {}", self.run_id, self.status);
        info!("  Combinations: {}/{}", self.processed, self.total);
        info!("  Snapshots created: {}", self.created);
        info!("  Skipped (unchanged): {}", self.skipped);
        info!("  Failed: {}", self.failed);
        info!("  Partial data warnings: {}", self.partial);
        info!("  Duration: {:.1}s", self.duration.as_secs_f64());
        if self.cancelled {
            warn!("  Run was cancelled before completing the combination space");
        }
        if !self.recorded {
            warn!("  Run record {} was left in the running state", self.run_id);
        }
        for err in &self.errors {
            warn!("  {} -> {}", err.combination, err.message);
        }
        info!("========================================");
    }
}

#[derive(Default)]
struct RunTally {
    processed: usize,
    created: u32,
    skipped: u32,
    partial: u32,
    errors: Vec<RunError>,
}

impl RunTally {
    fn record(&mut self, combination: &Combination, outcome: CombinationOutcome) {
        self.processed += 1;
        if outcome.is_partial() {
            self.partial += 1;
        }
        match outcome {
            CombinationOutcome::Persisted { .. } => self.created += 1,
            CombinationOutcome::Skipped { .. } => self.skipped += 1,
            CombinationOutcome::Failed { message } => self.errors.push(RunError {
                combination: combination.clone(),
                message,
            }),
        }
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

pub struct RunOrchestrator {
    provider: Arc<dyn RateProvider>,
    store: SnapshotStore,
    space: CombinationSpace,
    config: OrchestratorConfig,
    detector: ChangeDetector,
    cancel: CancelToken,
}

impl RunOrchestrator {
    pub fn new(
        provider: Arc<dyn RateProvider>,
        store: SnapshotStore,
        space: CombinationSpace,
        config: OrchestratorConfig,
    ) -> Self {
        let detector = ChangeDetector::new(config.materiality_threshold);
        Self {
            provider,
            store,
            space,
            config,
            detector,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run one pass over the combination space.
    ///
    /// Only a failure to open the run record is an error. If the terminal
    /// update fails, the summary is still returned with `recorded == false`.
    pub async fn run(&self) -> Result<RunSummary> {
        let combinations = self.space.combinations();
        let total = combinations.len();
        let started_at = Utc::now();
        let clock = Instant::now();

        let run_id = self.store.start_run(started_at).await?;
        info!("Starting run {} over {} combinations", run_id, total);

        let mut tally = RunTally::default();
        let mut cancelled = false;

        for (index, combination) in combinations.iter().enumerate() {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            debug!("[{}/{}] {}", index + 1, total, combination);
            let outcome = match self.process(combination).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("{} failed: {}", combination, e);
                    CombinationOutcome::Failed {
                        message: e.to_string(),
                    }
                }
            };
            tally.record(combination, outcome);

            if index + 1 < total && !self.cancel.sleep(self.config.request_delay).await {
                cancelled = true;
                break;
            }
        }

        let failed = tally.errors.len();
        let status = RunStatus::from_counts(
            tally.processed,
            failed,
            tally.partial as usize,
            cancelled,
        );
        let duration = clock.elapsed();

        let record = RunRecord {
            id: run_id,
            started_at,
            completed_at: Some(Utc::now()),
            status,
            snapshots_created: tally.created,
            snapshots_skipped: tally.skipped,
            partial_count: tally.partial,
            errors: tally.errors.clone(),
            duration_ms: Some(i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)),
        };
        let recorded = match self.store.complete_run(&record).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to record the end of run {}: {}", run_id, e);
                false
            }
        };

        let summary = RunSummary {
            run_id,
            status,
            total,
            processed: tally.processed,
            created: tally.created,
            skipped: tally.skipped,
            failed: failed as u32,
            partial: tally.partial,
            errors: tally.errors,
            duration,
            cancelled,
            recorded,
        };
        summary.log();
        Ok(summary)
    }

    /// Fetch, normalize, decide and persist a single combination
    pub async fn process(&self, combination: &Combination) -> Result<CombinationOutcome> {
        let label = combination.to_string();
        let raw = with_retry(self.config.retry, &label, || {
            self.provider.fetch_rates(combination)
        })
        .await?;

        if raw.is_empty() {
            return Err(TrackerError::EmptyTable(label));
        }

        let table = normalize(raw)?;
        if table.is_empty() {
            return Err(TrackerError::EmptyTable(label));
        }

        let partial = table.len() < self.config.min_heroes;
        if partial {
            warn!(
                "{}: only {} heroes (expected at least {}), data may be partial",
                combination,
                table.len(),
                self.config.min_heroes
            );
        }

        let latest = self.store.latest(combination).await?;
        let decision = self
            .detector
            .should_persist(&table.hero_rates, &table.digest, latest.as_ref());
        if !decision.persist {
            debug!("{}: skipped ({})", combination, decision.reason);
            return Ok(CombinationOutcome::Skipped {
                reason: SkipReason::Unchanged(decision.reason),
                partial,
            });
        }

        let today = Utc::now().date_naive();
        if self.store.exists(combination, &table.digest, today).await? {
            debug!("{}: identical snapshot already stored today", combination);
            return Ok(CombinationOutcome::Skipped {
                reason: SkipReason::AlreadyStoredToday,
                partial,
            });
        }

        match self
            .store
            .insert(combination, &table.digest, &table.hero_rates)
            .await?
        {
            InsertOutcome::Created(snapshot_id) => {
                info!(
                    "{}: stored snapshot {} ({} heroes, {})",
                    combination,
                    snapshot_id,
                    table.len(),
                    decision.reason
                );
                Ok(CombinationOutcome::Persisted {
                    snapshot_id,
                    partial,
                })
            }
            InsertOutcome::AlreadyExists => {
                debug!("{}: a snapshot already exists today", combination);
                Ok(CombinationOutcome::Skipped {
                    reason: SkipReason::AlreadyStoredToday,
                    partial,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockRateProvider;
    use crate::domain::{HeroRate, Input, MapName, Mode, Region, Tier};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn small_space() -> CombinationSpace {
        CombinationSpace {
            modes: vec![Mode::Competitive],
            inputs: vec![Input::Pc],
            regions: vec![Region::Americas, Region::Europe],
            tiers: vec![Tier::All],
            maps: vec![MapName::all_maps()],
        }
    }

    fn test_config() -> OrchestratorConfig {
        OrchestratorConfig {
            retry: RetryPolicy::new(3, Duration::from_millis(5)),
            request_delay: Duration::from_millis(1),
            min_heroes: 2,
            materiality_threshold: None,
        }
    }

    fn table() -> Vec<HeroRate> {
        vec![
            HeroRate::new("Mercy", Some(20.0), Some(49.0)),
            HeroRate::new("Ana", Some(10.0), Some(51.0)),
        ]
    }

    #[tokio::test]
    async fn test_all_combinations_failing_marks_run_failed() {
        let store = SnapshotStore::in_memory().await.unwrap();
        let mut provider = MockRateProvider::new();
        provider
            .expect_fetch_rates()
            .times(2)
            .returning(|_| Err(TrackerError::MalformedResponse("rates missing".into())));

        let orchestrator =
            RunOrchestrator::new(Arc::new(provider), store.clone(), small_space(), test_config());
        let summary = orchestrator.run().await.unwrap();

        assert_eq!(summary.status, RunStatus::Failed);
        assert_eq!(summary.created, 0);
        assert_eq!(summary.errors.len(), 2);

        let run = store.last_run().await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.errors.len(), 2);
        assert!(run.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_unchanged_since_previous_day_creates_nothing() {
        let store = SnapshotStore::in_memory().await.unwrap();
        let yesterday = Utc::now() - chrono::Duration::days(1);
        let normalized = normalize(table()).unwrap();
        for combination in small_space().combinations() {
            store
                .insert_at(&combination, &normalized.digest, &normalized.hero_rates, yesterday)
                .await
                .unwrap();
        }

        let mut provider = MockRateProvider::new();
        provider.expect_fetch_rates().times(2).returning(|_| Ok(table()));

        let orchestrator =
            RunOrchestrator::new(Arc::new(provider), store.clone(), small_space(), test_config());
        let summary = orchestrator.run().await.unwrap();

        assert_eq!(summary.status, RunStatus::Success);
        assert_eq!(summary.created, 0);
        assert_eq!(summary.skipped, 2);
        assert_eq!(store.health().await.unwrap().total_snapshots, 2);
    }

    #[tokio::test]
    async fn test_first_run_persists_every_combination() {
        let store = SnapshotStore::in_memory().await.unwrap();
        let mut provider = MockRateProvider::new();
        provider.expect_fetch_rates().returning(|_| Ok(table()));

        let orchestrator =
            RunOrchestrator::new(Arc::new(provider), store.clone(), small_space(), test_config());
        let summary = orchestrator.run().await.unwrap();

        assert_eq!(summary.status, RunStatus::Success);
        assert_eq!(summary.created, 2);

        let latest = store.latest(&small_space().combinations()[0]).await.unwrap().unwrap();
        assert_eq!(latest.hero_rates[0].hero_id, "ana");

        // A second run the same day finds nothing new
        let mut provider = MockRateProvider::new();
        provider.expect_fetch_rates().returning(|_| Ok(table()));
        let again = RunOrchestrator::new(Arc::new(provider), store, small_space(), test_config())
            .run()
            .await
            .unwrap();
        assert_eq!(again.created, 0);
        assert_eq!(again.status, RunStatus::Success);
    }

    #[tokio::test]
    async fn test_small_table_is_partial_not_failed() {
        let store = SnapshotStore::in_memory().await.unwrap();
        let mut provider = MockRateProvider::new();
        provider
            .expect_fetch_rates()
            .returning(|_| Ok(vec![HeroRate::new("ana", Some(10.0), Some(51.0))]));

        let orchestrator =
            RunOrchestrator::new(Arc::new(provider), store, small_space(), test_config());
        let summary = orchestrator.run().await.unwrap();

        assert_eq!(summary.status, RunStatus::Partial);
        assert_eq!(summary.created, 2);
        assert_eq!(summary.partial, 2);
        assert!(summary.errors.is_empty());
    }

    #[tokio::test]
    async fn test_empty_table_is_a_failure() {
        let store = SnapshotStore::in_memory().await.unwrap();
        let mut provider = MockRateProvider::new();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        provider.expect_fetch_rates().returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(Vec::new())
            } else {
                Ok(table())
            }
        });

        let orchestrator =
            RunOrchestrator::new(Arc::new(provider), store, small_space(), test_config());
        let summary = orchestrator.run().await.unwrap();

        assert_eq!(summary.status, RunStatus::Partial);
        assert_eq!(summary.created, 1);
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].message.contains("Empty hero table"));
        // Empty tables are terminal and never retried
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let store = SnapshotStore::in_memory().await.unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let mut provider = MockRateProvider::new();
        provider.expect_fetch_rates().returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(TrackerError::RateLimited("HTTP 429".into()))
            } else {
                Ok(table())
            }
        });

        let orchestrator =
            RunOrchestrator::new(Arc::new(provider), store, small_space(), test_config());
        let summary = orchestrator.run().await.unwrap();

        assert_eq!(summary.status, RunStatus::Success);
        assert_eq!(summary.created, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cancellation_stops_between_combinations() {
        let store = SnapshotStore::in_memory().await.unwrap();
        let cancel = CancelToken::new();

        // Cancel while the first combination is in flight
        let in_flight = cancel.clone();
        let mut provider = MockRateProvider::new();
        provider.expect_fetch_rates().times(1).returning(move |_| {
            in_flight.cancel();
            Ok(table())
        });

        let orchestrator =
            RunOrchestrator::new(Arc::new(provider), store.clone(), small_space(), test_config())
                .with_cancel_token(cancel);
        let summary = orchestrator.run().await.unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.created, 1);
        assert_eq!(summary.status, RunStatus::Partial);
        assert_eq!(
            store.last_run().await.unwrap().unwrap().status,
            RunStatus::Partial
        );
    }

    /// Provider that closes the store under the orchestrator before failing
    struct StoreClosingProvider {
        store: SnapshotStore,
    }

    #[async_trait::async_trait]
    impl RateProvider for StoreClosingProvider {
        async fn fetch_rates(&self, _combination: &Combination) -> Result<Vec<HeroRate>> {
            self.store.close().await;
            Err(TrackerError::MalformedResponse("rates missing".into()))
        }
    }

    #[tokio::test]
    async fn test_summary_survives_failed_terminal_update() {
        let store = SnapshotStore::in_memory().await.unwrap();
        let provider = StoreClosingProvider {
            store: store.clone(),
        };

        let orchestrator =
            RunOrchestrator::new(Arc::new(provider), store, small_space(), test_config());
        let summary = orchestrator.run().await.unwrap();

        assert!(!summary.recorded);
        assert_eq!(summary.status, RunStatus::Failed);
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.errors.len(), 2);
    }

    #[tokio::test]
    async fn test_completed_run_is_recorded() {
        let store = SnapshotStore::in_memory().await.unwrap();
        let mut provider = MockRateProvider::new();
        provider.expect_fetch_rates().returning(|_| Ok(table()));

        let orchestrator =
            RunOrchestrator::new(Arc::new(provider), store.clone(), small_space(), test_config());
        let summary = orchestrator.run().await.unwrap();

        assert!(summary.recorded);
        let run = store.last_run().await.unwrap().unwrap();
        assert_eq!(run.id, summary.run_id);
        assert_eq!(run.status, RunStatus::Success);
    }
}
