use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Result, TrackerError};

/// One hero's rates for a combination.
///
/// `None` means the provider reported no statistic (insufficient sample),
/// which is distinct from a rate of `0.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeroRate {
    pub hero_id: String,
    pub pick_rate: Option<f64>,
    pub win_rate: Option<f64>,
}

impl HeroRate {
    pub fn new(hero_id: impl Into<String>, pick_rate: Option<f64>, win_rate: Option<f64>) -> Self {
        Self {
            hero_id: hero_id.into(),
            pick_rate,
            win_rate,
        }
    }

    pub fn metric(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::PickRate => self.pick_rate,
            Metric::WinRate => self.win_rate,
        }
    }
}

/// Ranking metric for top-N queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    PickRate,
    WinRate,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::PickRate => "pick_rate",
            Metric::WinRate => "win_rate",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Metric {
    type Err = TrackerError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim() {
            "pick_rate" | "pickRate" | "pick-rate" => Ok(Metric::PickRate),
            "win_rate" | "winRate" | "win-rate" => Ok(Metric::WinRate),
            _ => Err(TrackerError::Validation(
                "Invalid metric. Must be pick_rate or win_rate".to_string(),
            )),
        }
    }
}
