pub mod adapters;
pub mod api;
pub mod cli;
pub mod collector;
pub mod config;
pub mod coordination;
pub mod domain;
pub mod error;
pub mod services;

pub use adapters::{HttpRateProvider, RateProvider, SnapshotStore};
pub use collector::{RunOrchestrator, RunSummary};
pub use config::AppConfig;
pub use coordination::CancelToken;
pub use error::{Result, TrackerError};
pub use services::QueryService;
