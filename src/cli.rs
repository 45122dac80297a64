pub mod output;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use std::sync::Arc;
use tracing::info;

use crate::adapters::{start_api_server, HttpRateProvider, SnapshotStore};
use crate::collector::{OrchestratorConfig, RunOrchestrator, RunSummary};
use crate::config::AppConfig;
use crate::coordination::{cancel_on_signal, CancelToken};
use crate::domain::{
    Combination, Input, MapName, Metric, Mode, Region, SnapshotFilter, SnapshotId, Tier,
};
use crate::error::Result;
use crate::services::QueryService;
use output::{CompareRow, HeroRow, OutputMode, SnapshotRow};

#[derive(Parser)]
#[command(name = "herowatch")]
#[command(author = "Herowatch Team")]
#[command(version = "0.1.0")]
#[command(about = "Hero pick/win rate snapshot tracker", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding default.toml and environment overrides
    #[arg(short, long, default_value = "config", env = "HEROWATCH_CONFIG_DIR")]
    pub config_dir: String,

    /// Print query results as JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch every configured combination once and store what changed
    Scrape,
    /// Serve the read-only JSON API
    Serve {
        /// Listen port (defaults to api.port)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Storage summary and last run
    Health,
    /// Top heroes by metric in the latest snapshot
    Top {
        #[command(flatten)]
        combination: CombinationArgs,
        #[arg(long, default_value = "pick_rate")]
        metric: Metric,
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Use the latest snapshot taken on this day (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Compare the oldest and newest snapshot in a window
    Compare {
        #[command(flatten)]
        combination: CombinationArgs,
        /// Window start (RFC 3339); defaults to seven days before `to`
        #[arg(long)]
        from: Option<DateTime<Utc>>,
        /// Window end (RFC 3339); defaults to now
        #[arg(long)]
        to: Option<DateTime<Utc>>,
    },
    /// List stored snapshots, newest first
    Snapshots {
        #[arg(long)]
        mode: Option<Mode>,
        #[arg(long)]
        input: Option<Input>,
        #[arg(long)]
        region: Option<Region>,
        #[arg(long)]
        tier: Option<Tier>,
        #[arg(long)]
        map: Option<MapName>,
        #[arg(short, long, default_value = "30")]
        limit: i64,
    },
    /// Show one snapshot with its hero rows
    Show { id: SnapshotId },
    /// Print the configured combination space
    Combinations,
}

/// A fully specified combination
#[derive(Args, Debug, Clone)]
pub struct CombinationArgs {
    #[arg(long)]
    pub mode: Mode,
    #[arg(long)]
    pub input: Input,
    #[arg(long)]
    pub region: Region,
    #[arg(long)]
    pub tier: Tier,
    #[arg(long, default_value = MapName::ALL_MAPS)]
    pub map: MapName,
}

impl CombinationArgs {
    pub fn combination(&self) -> Combination {
        Combination::new(self.mode, self.input, self.region, self.tier, self.map.clone())
    }
}

/// Run one scrape pass. Ctrl+C stops the run between combinations.
pub async fn run_scrape(config: &AppConfig) -> Result<RunSummary> {
    let space = config.scraper.combination_space()?;
    let store = SnapshotStore::connect(&config.database).await?;
    let provider = Arc::new(HttpRateProvider::new(&config.provider)?);

    info!(
        "Scraping {} combinations ({}ms between requests)",
        space.len(),
        config.scraper.request_delay_ms
    );

    let cancel = CancelToken::new();
    let signal_task = cancel_on_signal(cancel.clone());

    let orchestrator = RunOrchestrator::new(
        provider,
        store.clone(),
        space,
        OrchestratorConfig::from(&config.scraper),
    )
    .with_cancel_token(cancel);

    let summary = orchestrator.run().await;
    signal_task.abort();
    store.close().await;
    summary
}

pub async fn run_serve(config: &AppConfig, port: Option<u16>) -> Result<()> {
    let store = SnapshotStore::connect(&config.database).await?;
    start_api_server(QueryService::new(store.clone()), port.unwrap_or(config.api.port)).await?;
    store.close().await;
    Ok(())
}

/// Read-only commands
pub async fn run_query(command: &Commands, config: &AppConfig, mode: OutputMode) -> Result<()> {
    if let Commands::Combinations = command {
        return print_combinations(config, mode);
    }

    let store = SnapshotStore::connect(&config.database).await?;
    let query = QueryService::new(store.clone());

    match command {
        Commands::Health => output::print_item(&query.health().await?)?,
        Commands::Top {
            combination,
            metric,
            limit,
            date,
        } => {
            let top = query
                .top_n(&combination.combination(), *metric, *limit, *date)
                .await?;
            match top.timestamp {
                Some(ts) if mode == OutputMode::Table => {
                    println!("{} by {} as of {}", combination.combination(), metric, ts)
                }
                None if mode == OutputMode::Table => println!("No snapshot stored yet"),
                _ => {}
            }
            output::print_items(&HeroRow::ranked(&top.entries), &top, mode)?;
        }
        Commands::Compare {
            combination,
            from,
            to,
        } => {
            let rows = query.compare(&combination.combination(), *from, *to).await?;
            let table: Vec<CompareRow> = rows.iter().map(CompareRow::from).collect();
            output::print_items(&table, &rows, mode)?;
        }
        Commands::Snapshots {
            mode: game_mode,
            input,
            region,
            tier,
            map,
            limit,
        } => {
            let filter = SnapshotFilter {
                mode: *game_mode,
                input: *input,
                region: *region,
                tier: *tier,
                map: map.clone(),
                limit: *limit,
            };
            let snapshots = query.list_snapshots(&filter).await?;
            let table: Vec<SnapshotRow> = snapshots.iter().map(SnapshotRow::from).collect();
            output::print_items(&table, &snapshots, mode)?;
        }
        Commands::Show { id } => {
            let snapshot = query.snapshot(*id).await?;
            if mode == OutputMode::Table {
                println!(
                    "Snapshot {} | {} | {}",
                    snapshot.id, snapshot.combination, snapshot.timestamp
                );
                println!("Digest: {}", snapshot.content_digest);
            }
            let rows = HeroRow::ranked(&snapshot.hero_rates);
            output::print_items(&rows, &snapshot, mode)?;
        }
        Commands::Scrape | Commands::Serve { .. } | Commands::Combinations => {}
    }

    store.close().await;
    Ok(())
}

fn print_combinations(config: &AppConfig, mode: OutputMode) -> Result<()> {
    let space = config.scraper.combination_space()?;
    let combinations = space.combinations();
    match mode {
        OutputMode::Json => output::print_item(&combinations)?,
        OutputMode::Table => {
            for combination in &combinations {
                println!("{combination}");
            }
            println!("{} combinations", combinations.len());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_top_command() {
        let cli = Cli::try_parse_from([
            "herowatch", "top", "--mode", "competitive", "--input", "PC", "--region", "Europe",
            "--tier", "Diamond", "--metric", "win_rate", "--limit", "5",
        ])
        .unwrap();

        match cli.command {
            Commands::Top {
                combination,
                metric,
                limit,
                date,
            } => {
                assert_eq!(
                    combination.combination(),
                    Combination::all_maps(Mode::Competitive, Input::Pc, Region::Europe, Tier::Diamond)
                );
                assert_eq!(metric, Metric::WinRate);
                assert_eq!(limit, 5);
                assert!(date.is_none());
            }
            _ => panic!("expected top command"),
        }
    }

    #[test]
    fn test_invalid_tier_is_rejected_by_parser() {
        let result = Cli::try_parse_from([
            "herowatch", "top", "--mode", "competitive", "--input", "PC", "--region", "Europe",
            "--tier", "Champion",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_snapshots_filters() {
        let cli = Cli::try_parse_from(["herowatch", "--json", "snapshots", "--tier", "gold"]).unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Snapshots { tier, limit, mode, .. } => {
                assert_eq!(tier, Some(Tier::Gold));
                assert_eq!(limit, 30);
                assert!(mode.is_none());
            }
            _ => panic!("expected snapshots command"),
        }
    }
}
