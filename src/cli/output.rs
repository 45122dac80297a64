//! Output formatting for query commands.
//!
//! Supports two modes: human-readable tables (default) and JSON (--json).

use serde::Serialize;
use tabled::{Table, Tabled};

use crate::domain::{HeroRate, SnapshotSummary};
use crate::error::Result;
use crate::services::ComparisonRow;

/// Output mode for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Table,
    Json,
}

impl OutputMode {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Table
        }
    }
}

/// Print rows as a table, or the serializable source as JSON.
pub fn print_items<R: Tabled, S: Serialize + ?Sized>(
    rows: &[R],
    source: &S,
    mode: OutputMode,
) -> Result<()> {
    match mode {
        OutputMode::Table => {
            if rows.is_empty() {
                println!("(no results)");
            } else {
                println!("{}", Table::new(rows));
            }
        }
        OutputMode::Json => print_item(source)?,
    }
    Ok(())
}

/// Print a single item as pretty JSON.
pub fn print_item<T: Serialize + ?Sized>(item: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(item)?);
    Ok(())
}

fn rate(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

#[derive(Debug, Tabled)]
pub struct SnapshotRow {
    pub id: i64,
    pub timestamp: String,
    pub combination: String,
    pub heroes: i64,
    pub digest: String,
}

impl From<&SnapshotSummary> for SnapshotRow {
    fn from(s: &SnapshotSummary) -> Self {
        Self {
            id: s.id,
            timestamp: s.timestamp.format("%Y-%m-%d %H:%M").to_string(),
            combination: s.combination.to_string(),
            heroes: s.hero_count,
            digest: s.content_digest.chars().take(12).collect(),
        }
    }
}

#[derive(Debug, Tabled)]
pub struct HeroRow {
    pub rank: usize,
    pub hero: String,
    pub pick_rate: String,
    pub win_rate: String,
}

impl HeroRow {
    pub fn ranked(heroes: &[HeroRate]) -> Vec<Self> {
        heroes
            .iter()
            .enumerate()
            .map(|(i, h)| Self {
                rank: i + 1,
                hero: h.hero_id.clone(),
                pick_rate: rate(h.pick_rate),
                win_rate: rate(h.win_rate),
            })
            .collect()
    }
}

#[derive(Debug, Tabled)]
pub struct CompareRow {
    pub hero: String,
    pub pick_start: String,
    pub pick_end: String,
    pub win_start: String,
    pub win_end: String,
}

impl From<&ComparisonRow> for CompareRow {
    fn from(row: &ComparisonRow) -> Self {
        Self {
            hero: row.hero_id.clone(),
            pick_start: rate(row.start.as_ref().and_then(|p| p.pick_rate)),
            pick_end: rate(row.end.as_ref().and_then(|p| p.pick_rate)),
            win_start: rate(row.start.as_ref().and_then(|p| p.win_rate)),
            win_end: rate(row.end.as_ref().and_then(|p| p.win_rate)),
        }
    }
}
