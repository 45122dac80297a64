use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::collector::RetryPolicy;
use crate::domain::{map_catalog, CombinationSpace, Input, MapName, Mode, Region, Tier};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Rates endpoint, queried with input/map/region/role/rq/tier parameters
    pub base_url: String,
    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Role filter sent to the provider
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_role() -> String {
    "All".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://overwatch.blizzard.com/en-us/rates/data/".to_string(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            role: default_role(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    /// Attempts per combination, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base backoff delay; attempt n waits base * 3^n
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Fixed pause between combinations
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    /// Tables smaller than this are flagged as partial data
    #[serde(default = "default_min_heroes")]
    pub min_heroes: usize,
    /// Per-hero change (percentage points) below which a table counts as unchanged.
    /// Unset means digest-only deduplication.
    #[serde(default)]
    pub materiality_threshold: Option<f64>,
    #[serde(default)]
    pub modes: Option<Vec<String>>,
    #[serde(default)]
    pub inputs: Option<Vec<String>>,
    #[serde(default)]
    pub regions: Option<Vec<String>>,
    #[serde(default)]
    pub tiers: Option<Vec<String>>,
    /// Map slugs; `["all"]` expands to the full catalog
    #[serde(default = "default_maps")]
    pub maps: Vec<String>,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    5000
}

fn default_request_delay_ms() -> u64 {
    2000
}

fn default_min_heroes() -> usize {
    30
}

fn default_maps() -> Vec<String> {
    vec![MapName::ALL_MAPS.to_string()]
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            request_delay_ms: default_request_delay_ms(),
            min_heroes: default_min_heroes(),
            materiality_threshold: None,
            modes: None,
            inputs: None,
            regions: None,
            tiers: None,
            maps: default_maps(),
        }
    }
}

impl ScraperConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    /// Resolve the configured axes into a combination space
    pub fn combination_space(&self) -> crate::error::Result<CombinationSpace> {
        fn parse_axis<T: std::str::FromStr<Err = crate::error::TrackerError>>(
            values: &Option<Vec<String>>,
            all: &[T],
        ) -> crate::error::Result<Vec<T>>
        where
            T: Clone,
        {
            match values {
                None => Ok(all.to_vec()),
                Some(list) => list.iter().map(|v| v.parse()).collect(),
            }
        }

        let maps = if self.maps.iter().any(|m| m.eq_ignore_ascii_case("all")) {
            map_catalog()
        } else {
            self.maps
                .iter()
                .map(|m| MapName::new(m))
                .collect::<crate::error::Result<Vec<_>>>()?
        };

        Ok(CombinationSpace {
            modes: parse_axis(&self.modes, &Mode::ALL)?,
            inputs: parse_axis(&self.inputs, &Input::ALL)?,
            regions: parse_axis(&self.regions, &Region::ALL)?,
            tiers: parse_axis(&self.tiers, &Tier::ALL)?,
            maps,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection URL
    pub url: String,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// SQLite busy handler timeout per statement
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Attempts for an operation hitting lock contention
    #[serde(default = "default_busy_retry_attempts")]
    pub busy_retry_attempts: u32,
    /// Pause between lock-contention retries
    #[serde(default = "default_busy_retry_delay_ms")]
    pub busy_retry_delay_ms: u64,
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout_ms() -> u64 {
    250
}

fn default_busy_retry_attempts() -> u32 {
    5
}

fn default_busy_retry_delay_ms() -> u64 {
    200
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/herowatch.db".to_string(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
            busy_retry_attempts: default_busy_retry_attempts(),
            busy_retry_delay_ms: default_busy_retry_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Directory for the daily rotating `scraper.log`; unset disables file logging
    #[serde(default)]
    pub dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_port")]
    pub port: u16,
}

fn default_api_port() -> u16 {
    3001
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            scraper: ScraperConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig {
                level: default_log_level(),
                json: false,
                dir: None,
            },
            api: ApiConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("provider.base_url", ProviderConfig::default().base_url)?
            .set_default("database.url", DatabaseConfig::default().url)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("HEROWATCH_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (HEROWATCH_DATABASE__URL, etc.)
            .add_source(
                Environment::with_prefix("HEROWATCH")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.provider.base_url.trim().is_empty() {
            errors.push("provider.base_url must not be empty".to_string());
        }

        if self.provider.timeout_secs == 0 {
            errors.push("provider.timeout_secs must be positive".to_string());
        }

        if self.scraper.max_attempts == 0 {
            errors.push("scraper.max_attempts must be at least 1".to_string());
        }

        if let Some(threshold) = self.scraper.materiality_threshold {
            if !threshold.is_finite() || threshold < 0.0 {
                errors.push(format!(
                    "scraper.materiality_threshold must be a non-negative number, got {threshold}"
                ));
            }
        }

        match self.scraper.combination_space() {
            Ok(space) if space.is_empty() => {
                errors.push("scraper axes produce no combinations".to_string())
            }
            Ok(_) => {}
            Err(e) => errors.push(e.to_string()),
        }

        if self.database.max_connections == 0 {
            errors.push("database.max_connections must be positive".to_string());
        }

        if self.database.busy_retry_attempts == 0 {
            errors.push("database.busy_retry_attempts must be at least 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
