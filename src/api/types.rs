use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    Combination, HealthReport, Input, MapName, Mode, Region, SnapshotFilter, Tier,
};
use crate::error::{Result, TrackerError};

/// Default number of heroes returned by `/api/top`
pub const DEFAULT_TOP_LIMIT: usize = 10;

// ============================================================================
// Query Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct SnapshotQuery {
    pub mode: Option<String>,
    pub input: Option<String>,
    pub region: Option<String>,
    pub tier: Option<String>,
    pub map: Option<String>,
    pub limit: Option<i64>,
}

impl SnapshotQuery {
    pub fn to_filter(&self) -> Result<SnapshotFilter> {
        Ok(SnapshotFilter {
            mode: parse_opt::<Mode>(&self.mode)?,
            input: parse_opt::<Input>(&self.input)?,
            region: parse_opt::<Region>(&self.region)?,
            tier: parse_opt::<Tier>(&self.tier)?,
            map: self.map.as_deref().map(MapName::new).transpose()?,
            limit: self.limit.unwrap_or(SnapshotFilter::DEFAULT_LIMIT).max(0),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TopQuery {
    pub mode: Option<String>,
    pub input: Option<String>,
    pub region: Option<String>,
    pub tier: Option<String>,
    pub map: Option<String>,
    pub metric: Option<String>,
    pub limit: Option<usize>,
    /// `YYYY-MM-DD`; latest snapshot on that day
    pub date: Option<String>,
}

impl TopQuery {
    pub fn combination(&self) -> Result<Combination> {
        required_combination(&self.mode, &self.input, &self.region, &self.tier, &self.map)
    }

    pub fn as_of(&self) -> Result<Option<NaiveDate>> {
        self.date.as_deref().map(parse_day).transpose()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CompareQuery {
    pub mode: Option<String>,
    pub input: Option<String>,
    pub region: Option<String>,
    pub tier: Option<String>,
    pub map: Option<String>,
    /// RFC 3339 timestamp or `YYYY-MM-DD` (start of day)
    pub from: Option<String>,
    /// RFC 3339 timestamp or `YYYY-MM-DD` (end of day)
    pub to: Option<String>,
}

impl CompareQuery {
    pub fn combination(&self) -> Result<Combination> {
        required_combination(&self.mode, &self.input, &self.region, &self.tier, &self.map)
    }

    pub fn window(&self) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
        let from = self
            .from
            .as_deref()
            .map(|raw| parse_instant(raw, NaiveTime::default()))
            .transpose()?;
        let end_of_day = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or_default();
        let to = self
            .to
            .as_deref()
            .map(|raw| parse_instant(raw, end_of_day))
            .transpose()?;
        Ok((from, to))
    }
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(flatten)]
    pub report: HealthReport,
    pub uptime_seconds: i64,
}

// ============================================================================
// Parsing helpers
// ============================================================================

fn parse_opt<T>(raw: &Option<String>) -> Result<Option<T>>
where
    T: std::str::FromStr<Err = TrackerError>,
{
    raw.as_deref().map(str::parse).transpose()
}

fn required_combination(
    mode: &Option<String>,
    input: &Option<String>,
    region: &Option<String>,
    tier: &Option<String>,
    map: &Option<String>,
) -> Result<Combination> {
    let (Some(mode), Some(input), Some(region), Some(tier)) = (mode, input, region, tier) else {
        return Err(TrackerError::Validation(
            "Missing required parameters: mode, input, region, tier".to_string(),
        ));
    };

    let map = match map.as_deref() {
        Some(map) => MapName::new(map)?,
        None => MapName::all_maps(),
    };

    Ok(Combination::new(
        mode.parse()?,
        input.parse()?,
        region.parse()?,
        tier.parse()?,
        map,
    ))
}

fn parse_day(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| TrackerError::Validation(format!("invalid date '{raw}'; expected YYYY-MM-DD")))
}

/// A full timestamp, or a bare date resolved to `time_of_day` (UTC)
fn parse_instant(raw: &str, time_of_day: NaiveTime) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    let day = parse_day(raw)?;
    Ok(Utc.from_utc_datetime(&day.and_time(time_of_day)))
}
