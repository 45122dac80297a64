//! Hero rate provider client
//!
//! The provider's rates endpoint is queried once per combination and returns
//! `{"rates":[{"id": ..., "cells": {"pickrate": ..., "winrate": ...}}]}`.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::domain::{Combination, HeroRate};
use crate::error::{Result, TrackerError};

/// Source of current hero rate tables.
///
/// Calls are idempotent and may be retried.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RateProvider: Send + Sync {
    async fn fetch_rates(&self, combination: &Combination) -> Result<Vec<HeroRate>>;
}

#[derive(Debug, Deserialize)]
struct RatesResponse {
    rates: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RateRow {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    cells: Option<RateCells>,
}

#[derive(Debug, Default, Deserialize)]
struct RateCells {
    #[serde(default)]
    pickrate: Option<f64>,
    #[serde(default)]
    winrate: Option<f64>,
}

/// HTTP client for the public rates endpoint
pub struct HttpRateProvider {
    client: reqwest::Client,
    base_url: String,
    role: String,
}

impl HttpRateProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            role: config.role.clone(),
        })
    }

    fn query_params(&self, combination: &Combination) -> Vec<(&'static str, String)> {
        vec![
            ("input", combination.input.as_str().to_string()),
            ("map", combination.map.as_str().to_string()),
            ("region", combination.region.as_str().to_string()),
            ("role", self.role.clone()),
            ("rq", combination.mode.rq().to_string()),
            ("tier", combination.tier.as_str().to_string()),
        ]
    }
}

#[async_trait]
impl RateProvider for HttpRateProvider {
    async fn fetch_rates(&self, combination: &Combination) -> Result<Vec<HeroRate>> {
        debug!("Fetching rates for {}", combination);

        let response = self
            .client
            .get(&self.base_url)
            .query(&self.query_params(combination))
            .send()
            .await?;

        check_status(response.status())?;

        let body = response.text().await?;
        parse_rates(&body)
    }
}

/// Map an HTTP status onto the retry classification
fn check_status(status: StatusCode) -> Result<()> {
    if status.is_success() {
        Ok(())
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        Err(TrackerError::RateLimited(format!("HTTP {}", status.as_u16())))
    } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        Err(TrackerError::ProviderUnavailable(format!("HTTP {}", status.as_u16())))
    } else {
        Err(TrackerError::MalformedResponse(format!(
            "unexpected HTTP status {}",
            status
        )))
    }
}

/// Parse a rates payload. Missing cells or rates become `None`; rows without
/// an id are dropped. An empty array is returned as-is.
fn parse_rates(body: &str) -> Result<Vec<HeroRate>> {
    let response: RatesResponse = serde_json::from_str(body)
        .map_err(|e| TrackerError::MalformedResponse(format!("invalid JSON: {e}")))?;

    let rows = match response.rates {
        Some(serde_json::Value::Array(rows)) => rows,
        Some(_) => {
            return Err(TrackerError::MalformedResponse(
                "rates is not an array".to_string(),
            ))
        }
        None => {
            return Err(TrackerError::MalformedResponse(
                "rates field missing".to_string(),
            ))
        }
    };

    let mut hero_rates = Vec::with_capacity(rows.len());
    for row in rows {
        let row: RateRow = serde_json::from_value(row)
            .map_err(|e| TrackerError::MalformedResponse(format!("invalid rate row: {e}")))?;
        let Some(id) = row.id else { continue };
        let cells = row.cells.unwrap_or_default();
        hero_rates.push(HeroRate::new(id, cells.pickrate, cells.winrate));
    }

    Ok(hero_rates)
}
