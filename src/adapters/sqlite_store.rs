use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{QueryBuilder, Row, Sqlite};
use std::collections::HashSet;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::config::DatabaseConfig;
use crate::domain::{
    Combination, HealthReport, HeroRate, InsertOutcome, MapName, RunError, RunId, RunRecord,
    RunStatus, Snapshot, SnapshotFilter, SnapshotId, SnapshotSummary,
};
use crate::error::{Result, TrackerError};

const SNAPSHOT_COLUMNS: &str = "id, timestamp_ms, mode, input, region, tier, map, hash";

/// Bounded retry budget for SQLite lock contention
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusyRetry {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for BusyRetry {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_millis(200),
        }
    }
}

/// SQLite storage for snapshots, hero rows and run records
#[derive(Clone)]
pub struct SnapshotStore {
    pool: SqlitePool,
    busy_retry: BusyRetry,
}

impl SnapshotStore {
    /// Open (creating if needed) the database described by `config` and run migrations
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        ensure_parent_dir(&config.url)?;

        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        info!("Connected to SQLite at {}", config.url);

        let store = Self::from_pool(pool).with_busy_budget(BusyRetry {
            attempts: config.busy_retry_attempts.max(1),
            delay: Duration::from_millis(config.busy_retry_delay_ms),
        });
        store.migrate().await?;
        Ok(store)
    }

    /// Private in-memory database, already migrated.
    ///
    /// A single long-lived connection keeps the database alive.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self::from_pool(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Create a store from an existing connection pool
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            busy_retry: BusyRetry::default(),
        }
    }

    pub fn with_busy_budget(mut self, busy_retry: BusyRetry) -> Self {
        self.busy_retry = busy_retry;
        self
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        debug!("Database migrations completed");
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ==================== Snapshots ====================

    /// True if `combination` already has a snapshot with `digest` on `day`
    #[instrument(skip(self, combination, digest), fields(combination = %combination))]
    pub async fn exists(&self, combination: &Combination, digest: &str, day: NaiveDate) -> Result<bool> {
        let day = day.to_string();
        self.with_busy_retry("exists", || async {
            let row = sqlx::query(
                r#"
                SELECT id FROM snapshots
                WHERE mode = ? AND input = ? AND region = ? AND tier = ? AND map = ?
                  AND day = ? AND hash = ?
                "#,
            )
            .bind(combination.mode.as_str())
            .bind(combination.input.as_str())
            .bind(combination.region.as_str())
            .bind(combination.tier.as_str())
            .bind(combination.map.as_str())
            .bind(day.as_str())
            .bind(digest)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row.is_some())
        })
        .await
    }

    /// Insert a snapshot observed now
    pub async fn insert(
        &self,
        combination: &Combination,
        digest: &str,
        hero_rates: &[HeroRate],
    ) -> Result<InsertOutcome> {
        self.insert_at(combination, digest, hero_rates, Utc::now()).await
    }

    /// Insert a snapshot and all of its hero rows in one transaction.
    ///
    /// A second snapshot for the same combination on the same UTC day is
    /// rejected by the unique index and reported as `AlreadyExists`.
    #[instrument(skip(self, combination, digest, hero_rates), fields(combination = %combination, heroes = hero_rates.len()))]
    pub async fn insert_at(
        &self,
        combination: &Combination,
        digest: &str,
        hero_rates: &[HeroRate],
        observed_at: DateTime<Utc>,
    ) -> Result<InsertOutcome> {
        validate_table(hero_rates)?;

        let result = self
            .with_busy_retry("insert", || {
                self.insert_once(combination, digest, hero_rates, observed_at)
            })
            .await;

        match result {
            Ok(id) => {
                debug!("Inserted snapshot {} ({} heroes)", id, hero_rates.len());
                Ok(InsertOutcome::Created(id))
            }
            Err(TrackerError::Database(sqlx::Error::Database(db_err)))
                if db_err.is_unique_violation() =>
            {
                debug!("Snapshot for {} on {} already exists", combination, observed_at.date_naive());
                Ok(InsertOutcome::AlreadyExists)
            }
            Err(e) => Err(e),
        }
    }

    async fn insert_once(
        &self,
        combination: &Combination,
        digest: &str,
        hero_rates: &[HeroRate],
        observed_at: DateTime<Utc>,
    ) -> Result<SnapshotId> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO snapshots (timestamp_ms, day, mode, input, region, tier, map, hash, created_at_ms)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(observed_at.timestamp_millis())
        .bind(observed_at.date_naive().to_string())
        .bind(combination.mode.as_str())
        .bind(combination.input.as_str())
        .bind(combination.region.as_str())
        .bind(combination.tier.as_str())
        .bind(combination.map.as_str())
        .bind(digest)
        .bind(Utc::now().timestamp_millis())
        .fetch_one(&mut *tx)
        .await?;

        let snapshot_id: i64 = row.try_get("id")?;

        for hero in hero_rates {
            sqlx::query(
                r#"
                INSERT INTO hero_stats (snapshot_id, hero, pick_rate, win_rate)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(snapshot_id)
            .bind(&hero.hero_id)
            .bind(hero.pick_rate)
            .bind(hero.win_rate)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(snapshot_id)
    }

    /// Most recent snapshot for a combination
    pub async fn latest(&self, combination: &Combination) -> Result<Option<Snapshot>> {
        self.find_one(combination, None, None, true).await
    }

    /// Most recent snapshot for a combination taken on `day`
    pub async fn latest_on(&self, combination: &Combination, day: NaiveDate) -> Result<Option<Snapshot>> {
        self.find_one(combination, Some(day), None, true).await
    }

    /// Oldest snapshot within `[from, to]`
    pub async fn first_in_range(
        &self,
        combination: &Combination,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<Snapshot>> {
        self.find_one(combination, None, Some((from, to)), false).await
    }

    /// Newest snapshot within `[from, to]`
    pub async fn last_in_range(
        &self,
        combination: &Combination,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<Snapshot>> {
        self.find_one(combination, None, Some((from, to)), true).await
    }

    async fn find_one(
        &self,
        combination: &Combination,
        day: Option<NaiveDate>,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
        newest: bool,
    ) -> Result<Option<Snapshot>> {
        let row = self
            .with_busy_retry("find snapshot", || async {
                let mut qb = combination_query(combination);
                if let Some(day) = day {
                    qb.push(" AND day = ").push_bind(day.to_string());
                }
                if let Some((from, to)) = window {
                    qb.push(" AND timestamp_ms BETWEEN ")
                        .push_bind(from.timestamp_millis())
                        .push(" AND ")
                        .push_bind(to.timestamp_millis());
                }
                qb.push(if newest {
                    " ORDER BY timestamp_ms DESC, id DESC LIMIT 1"
                } else {
                    " ORDER BY timestamp_ms ASC, id ASC LIMIT 1"
                });
                Ok(qb.build().fetch_optional(&self.pool).await?)
            })
            .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    /// Snapshots within `[from, to]`, oldest first
    pub async fn range(
        &self,
        combination: &Combination,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Snapshot>> {
        let rows = self
            .with_busy_retry("range", || async {
                let mut qb = combination_query(combination);
                qb.push(" AND timestamp_ms BETWEEN ")
                    .push_bind(from.timestamp_millis())
                    .push(" AND ")
                    .push_bind(to.timestamp_millis())
                    .push(" ORDER BY timestamp_ms ASC, id ASC");
                Ok(qb.build().fetch_all(&self.pool).await?)
            })
            .await?;

        let mut snapshots = Vec::with_capacity(rows.len());
        for row in &rows {
            snapshots.push(self.hydrate(row).await?);
        }
        Ok(snapshots)
    }

    /// Snapshot rows matching `filter`, newest first
    pub async fn list(&self, filter: &SnapshotFilter) -> Result<Vec<SnapshotSummary>> {
        let rows = self
            .with_busy_retry("list", || async {
                let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                    r#"
                    SELECT s.id, s.timestamp_ms, s.mode, s.input, s.region, s.tier, s.map, s.hash,
                           (SELECT COUNT(*) FROM hero_stats h WHERE h.snapshot_id = s.id) AS hero_count
                    FROM snapshots s
                    WHERE 1=1
                    "#,
                );
                if let Some(mode) = filter.mode {
                    qb.push(" AND s.mode = ").push_bind(mode.as_str());
                }
                if let Some(input) = filter.input {
                    qb.push(" AND s.input = ").push_bind(input.as_str());
                }
                if let Some(region) = filter.region {
                    qb.push(" AND s.region = ").push_bind(region.as_str());
                }
                if let Some(tier) = filter.tier {
                    qb.push(" AND s.tier = ").push_bind(tier.as_str());
                }
                if let Some(map) = &filter.map {
                    qb.push(" AND s.map = ").push_bind(map.as_str().to_string());
                }
                qb.push(" ORDER BY s.timestamp_ms DESC, s.id DESC LIMIT ")
                    .push_bind(filter.limit.max(0));
                Ok(qb.build().fetch_all(&self.pool).await?)
            })
            .await?;

        rows.iter()
            .map(|row| {
                Ok(SnapshotSummary {
                    id: row.try_get("id")?,
                    timestamp: millis_to_utc(row.try_get("timestamp_ms")?)?,
                    combination: combination_from_row(row)?,
                    content_digest: row.try_get("hash")?,
                    hero_count: row.try_get("hero_count")?,
                })
            })
            .collect()
    }

    /// A single snapshot with its hero rows
    pub async fn get(&self, id: SnapshotId) -> Result<Option<Snapshot>> {
        let row = self
            .with_busy_retry("get snapshot", || async {
                let sql = format!("SELECT {SNAPSHOT_COLUMNS} FROM snapshots WHERE id = ?");
                Ok(sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?)
            })
            .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    async fn hydrate(&self, row: &SqliteRow) -> Result<Snapshot> {
        let id: i64 = row.try_get("id")?;
        let hero_rates = self.hero_rates(id).await?;
        Ok(Snapshot {
            id,
            timestamp: millis_to_utc(row.try_get("timestamp_ms")?)?,
            combination: combination_from_row(row)?,
            content_digest: row.try_get("hash")?,
            hero_rates,
        })
    }

    async fn hero_rates(&self, snapshot_id: SnapshotId) -> Result<Vec<HeroRate>> {
        let rows = self
            .with_busy_retry("hero rows", || async {
                Ok(sqlx::query(
                    r#"
                    SELECT hero, pick_rate, win_rate
                    FROM hero_stats
                    WHERE snapshot_id = ?
                    ORDER BY hero ASC
                    "#,
                )
                .bind(snapshot_id)
                .fetch_all(&self.pool)
                .await?)
            })
            .await?;

        rows.iter()
            .map(|row| {
                Ok(HeroRate {
                    hero_id: row.try_get("hero")?,
                    pick_rate: row.try_get("pick_rate")?,
                    win_rate: row.try_get("win_rate")?,
                })
            })
            .collect()
    }

    // ==================== Runs ====================

    /// Record the start of a run
    pub async fn start_run(&self, started_at: DateTime<Utc>) -> Result<RunId> {
        self.with_busy_retry("start run", || async {
            let row = sqlx::query(
                r#"
                INSERT INTO scraper_runs (started_at_ms, status)
                VALUES (?, ?)
                RETURNING id
                "#,
            )
            .bind(started_at.timestamp_millis())
            .bind(RunStatus::Running.as_str())
            .fetch_one(&self.pool)
            .await?;
            Ok(row.try_get("id")?)
        })
        .await
    }

    /// Apply the single terminal update of a run
    #[instrument(skip(self, record), fields(run_id = record.id, status = %record.status))]
    pub async fn complete_run(&self, record: &RunRecord) -> Result<()> {
        if !record.status.is_terminal() {
            return Err(TrackerError::Validation(format!(
                "run {} cannot complete with status {}",
                record.id, record.status
            )));
        }

        let errors = if record.errors.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&record.errors)?)
        };
        let completed_at = record.completed_at.unwrap_or_else(Utc::now);

        let updated = self
            .with_busy_retry("complete run", || async {
                let result = sqlx::query(
                    r#"
                    UPDATE scraper_runs
                    SET completed_at_ms = ?,
                        status = ?,
                        snapshots_created = ?,
                        snapshots_skipped = ?,
                        partial_count = ?,
                        errors = ?,
                        duration_ms = ?
                    WHERE id = ? AND status = 'running'
                    "#,
                )
                .bind(completed_at.timestamp_millis())
                .bind(record.status.as_str())
                .bind(i64::from(record.snapshots_created))
                .bind(i64::from(record.snapshots_skipped))
                .bind(i64::from(record.partial_count))
                .bind(errors.as_deref())
                .bind(record.duration_ms)
                .bind(record.id)
                .execute(&self.pool)
                .await?;
                Ok(result.rows_affected())
            })
            .await?;

        if updated == 0 {
            return Err(TrackerError::Validation(format!(
                "run {} is unknown or already completed",
                record.id
            )));
        }
        Ok(())
    }

    /// Most recently started run
    pub async fn last_run(&self) -> Result<Option<RunRecord>> {
        let row = self
            .with_busy_retry("last run", || async {
                Ok(sqlx::query(
                    r#"
                    SELECT id, started_at_ms, completed_at_ms, status, snapshots_created,
                           snapshots_skipped, partial_count, errors, duration_ms
                    FROM scraper_runs
                    ORDER BY started_at_ms DESC, id DESC
                    LIMIT 1
                    "#,
                )
                .fetch_optional(&self.pool)
                .await?)
            })
            .await?;

        row.map(|r| run_from_row(&r)).transpose()
    }

    // ==================== Health ====================

    pub async fn health(&self) -> Result<HealthReport> {
        let (total, oldest, newest, size, main_file) = self
            .with_busy_retry("health", || async {
                let stats = sqlx::query(
                    r#"
                    SELECT COUNT(*) AS total_snapshots,
                           MIN(timestamp_ms) AS oldest_ms,
                           MAX(timestamp_ms) AS newest_ms
                    FROM snapshots
                    "#,
                )
                .fetch_one(&self.pool)
                .await?;

                let size: i64 = sqlx::query_scalar(
                    "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
                )
                .fetch_one(&self.pool)
                .await?;

                let main_file: Option<String> = sqlx::query_scalar(
                    "SELECT file FROM pragma_database_list WHERE name = 'main'",
                )
                .fetch_optional(&self.pool)
                .await?;

                let total: i64 = stats.try_get("total_snapshots")?;
                let oldest: Option<i64> = stats.try_get("oldest_ms")?;
                let newest: Option<i64> = stats.try_get("newest_ms")?;
                Ok((total, oldest, newest, size, main_file))
            })
            .await?;

        // Pages not yet checkpointed still sit in the -wal file
        let size = size + wal_file_size(main_file.as_deref()).await;

        Ok(HealthReport {
            total_snapshots: total,
            oldest_timestamp: oldest.map(millis_to_utc).transpose()?,
            newest_timestamp: newest.map(millis_to_utc).transpose()?,
            last_run: self.last_run().await?,
            storage_size: size,
        })
    }

    // ==================== Lock contention ====================

    /// Retry `operation` while SQLite reports lock contention, up to the busy budget.
    async fn with_busy_retry<T, F, Fut>(&self, label: &str, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        retry_on_busy(self.busy_retry, label, operation).await
    }
}

async fn retry_on_busy<T, F, Fut>(budget: BusyRetry, label: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = budget.attempts.max(1);
    for attempt in 1..=attempts {
        match operation().await {
            Err(TrackerError::Database(ref e)) if is_busy(e) => {
                if attempt == attempts {
                    break;
                }
                warn!(
                    "{}: database busy (attempt {}/{}), retrying in {}ms",
                    label,
                    attempt,
                    attempts,
                    budget.delay.as_millis()
                );
                tokio::time::sleep(budget.delay).await;
            }
            other => return other,
        }
    }

    Err(TrackerError::StorageBusy { attempts })
}

/// SQLITE_BUSY / SQLITE_LOCKED (including extended codes) or pool exhaustion
fn is_busy(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db_err) => db_err
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .map_or(false, |code| matches!(code & 0xff, 5 | 6)),
        _ => false,
    }
}

/// Length of the write-ahead log next to `main_file`; zero for in-memory
/// databases or when no log exists.
async fn wal_file_size(main_file: Option<&str>) -> i64 {
    let Some(main_file) = main_file.filter(|f| !f.is_empty()) else {
        return 0;
    };
    match tokio::fs::metadata(format!("{main_file}-wal")).await {
        Ok(meta) => i64::try_from(meta.len()).unwrap_or(i64::MAX),
        Err(_) => 0,
    }
}

fn validate_table(hero_rates: &[HeroRate]) -> Result<()> {
    if hero_rates.is_empty() {
        return Err(TrackerError::Validation(
            "refusing to store an empty hero table".to_string(),
        ));
    }
    let mut seen = HashSet::with_capacity(hero_rates.len());
    for hero in hero_rates {
        if hero.hero_id.is_empty() {
            return Err(TrackerError::Validation("hero id must not be empty".to_string()));
        }
        if !seen.insert(hero.hero_id.as_str()) {
            return Err(TrackerError::Validation(format!(
                "duplicate hero '{}' in table",
                hero.hero_id
            )));
        }
    }
    Ok(())
}

fn combination_query(combination: &Combination) -> QueryBuilder<'static, Sqlite> {
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {SNAPSHOT_COLUMNS} FROM snapshots WHERE mode = "));
    qb.push_bind(combination.mode.as_str())
        .push(" AND input = ")
        .push_bind(combination.input.as_str())
        .push(" AND region = ")
        .push_bind(combination.region.as_str())
        .push(" AND tier = ")
        .push_bind(combination.tier.as_str())
        .push(" AND map = ")
        .push_bind(combination.map.as_str().to_string());
    qb
}

fn combination_from_row(row: &SqliteRow) -> Result<Combination> {
    let mode: String = row.try_get("mode")?;
    let input: String = row.try_get("input")?;
    let region: String = row.try_get("region")?;
    let tier: String = row.try_get("tier")?;
    let map: String = row.try_get("map")?;

    Ok(Combination {
        mode: mode.parse().map_err(corrupt)?,
        input: input.parse().map_err(corrupt)?,
        region: region.parse().map_err(corrupt)?,
        tier: tier.parse().map_err(corrupt)?,
        map: MapName::new(&map).map_err(corrupt)?,
    })
}

fn run_from_row(row: &SqliteRow) -> Result<RunRecord> {
    let status: String = row.try_get("status")?;
    let errors: Option<String> = row.try_get("errors")?;
    let errors: Vec<RunError> = match errors {
        Some(raw) => serde_json::from_str(&raw)?,
        None => Vec::new(),
    };
    let completed_at: Option<i64> = row.try_get("completed_at_ms")?;

    Ok(RunRecord {
        id: row.try_get("id")?,
        started_at: millis_to_utc(row.try_get("started_at_ms")?)?,
        completed_at: completed_at.map(millis_to_utc).transpose()?,
        status: status.parse()?,
        snapshots_created: count_from_row(row, "snapshots_created")?,
        snapshots_skipped: count_from_row(row, "snapshots_skipped")?,
        partial_count: count_from_row(row, "partial_count")?,
        errors,
        duration_ms: row.try_get("duration_ms")?,
    })
}

fn count_from_row(row: &SqliteRow, column: &str) -> Result<u32> {
    let value: i64 = row.try_get(column)?;
    u32::try_from(value).map_err(|_| TrackerError::Internal(format!("{column} out of range: {value}")))
}

fn corrupt(e: TrackerError) -> TrackerError {
    TrackerError::Internal(format!("corrupt snapshot row: {e}"))
}

fn millis_to_utc(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| TrackerError::Internal(format!("invalid timestamp {ms}")))
}

/// Create the directory holding a file-backed database
fn ensure_parent_dir(url: &str) -> Result<()> {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() || path.contains(":memory:") {
        return Ok(());
    }
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
