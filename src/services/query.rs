//! Read-only queries over stored snapshots
//!
//! "No data" is never an error here: missing snapshots produce empty results.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::adapters::SnapshotStore;
use crate::domain::{
    Combination, HealthReport, HeroRate, Metric, Snapshot, SnapshotFilter, SnapshotId,
    SnapshotSummary,
};
use crate::error::{Result, TrackerError};

/// Default look-back window for comparisons
pub const DEFAULT_COMPARE_DAYS: i64 = 7;

/// Highest-ranked heroes of one snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopHeroes {
    pub metric: Metric,
    pub entries: Vec<HeroRate>,
    /// Timestamp of the snapshot ranked; `None` when nothing is stored
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatePoint {
    pub pick_rate: Option<f64>,
    pub win_rate: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// One hero across the oldest and newest snapshot of a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub hero_id: String,
    pub start: Option<RatePoint>,
    pub end: Option<RatePoint>,
}

#[derive(Clone)]
pub struct QueryService {
    store: SnapshotStore,
}

impl QueryService {
    pub fn new(store: SnapshotStore) -> Self {
        Self { store }
    }

    /// Top `n` heroes by `metric` in the latest snapshot (or the latest on `as_of`).
    ///
    /// Heroes without a value for the metric are excluded. Ties keep the
    /// snapshot's hero-id order.
    pub async fn top_n(
        &self,
        combination: &Combination,
        metric: Metric,
        n: usize,
        as_of: Option<NaiveDate>,
    ) -> Result<TopHeroes> {
        let snapshot = match as_of {
            Some(day) => self.store.latest_on(combination, day).await?,
            None => self.store.latest(combination).await?,
        };

        let Some(snapshot) = snapshot else {
            debug!("No snapshot for {} (as of {:?})", combination, as_of);
            return Ok(TopHeroes {
                metric,
                entries: Vec::new(),
                timestamp: None,
            });
        };

        Ok(TopHeroes {
            metric,
            entries: rank(snapshot.hero_rates, metric, n),
            timestamp: Some(snapshot.timestamp),
        })
    }

    /// Start/end comparison over `[from, to]`, defaulting to the last seven days.
    ///
    /// Every hero present in either snapshot appears once, ordered by hero id.
    pub async fn compare(
        &self,
        combination: &Combination,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<ComparisonRow>> {
        let to = to.unwrap_or_else(Utc::now);
        let from = from.unwrap_or_else(|| to - Duration::days(DEFAULT_COMPARE_DAYS));
        if from > to {
            return Err(TrackerError::Validation(format!(
                "compare window starts after it ends ({from} > {to})"
            )));
        }

        let start = self.store.first_in_range(combination, from, to).await?;
        let end = self.store.last_in_range(combination, from, to).await?;

        Ok(outer_join(start.as_ref(), end.as_ref()))
    }

    pub async fn list_snapshots(&self, filter: &SnapshotFilter) -> Result<Vec<SnapshotSummary>> {
        self.store.list(filter).await
    }

    /// A snapshot with its hero rows
    pub async fn snapshot(&self, id: SnapshotId) -> Result<Snapshot> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| TrackerError::NotFound(format!("Snapshot {id} not found")))
    }

    pub async fn health(&self) -> Result<HealthReport> {
        self.store.health().await
    }
}

fn rank(hero_rates: Vec<HeroRate>, metric: Metric, n: usize) -> Vec<HeroRate> {
    let mut ranked: Vec<HeroRate> = hero_rates
        .into_iter()
        .filter(|h| h.metric(metric).is_some())
        .collect();
    // Stable sort keeps input order among equal values
    ranked.sort_by(|a, b| {
        let a = a.metric(metric).unwrap_or(f64::NEG_INFINITY);
        let b = b.metric(metric).unwrap_or(f64::NEG_INFINITY);
        b.total_cmp(&a)
    });
    ranked.truncate(n);
    ranked
}

fn outer_join(start: Option<&Snapshot>, end: Option<&Snapshot>) -> Vec<ComparisonRow> {
    let mut rows: BTreeMap<&str, ComparisonRow> = BTreeMap::new();

    if let Some(snapshot) = start {
        for hero in &snapshot.hero_rates {
            rows.entry(hero.hero_id.as_str())
                .or_insert_with(|| empty_row(&hero.hero_id))
                .start = Some(point(hero, snapshot.timestamp));
        }
    }
    if let Some(snapshot) = end {
        for hero in &snapshot.hero_rates {
            rows.entry(hero.hero_id.as_str())
                .or_insert_with(|| empty_row(&hero.hero_id))
                .end = Some(point(hero, snapshot.timestamp));
        }
    }

    rows.into_values().collect()
}

fn empty_row(hero_id: &str) -> ComparisonRow {
    ComparisonRow {
        hero_id: hero_id.to_string(),
        start: None,
        end: None,
    }
}

fn point(hero: &HeroRate, timestamp: DateTime<Utc>) -> RatePoint {
    RatePoint {
        pick_rate: hero.pick_rate,
        win_rate: hero.win_rate,
        timestamp,
    }
}
