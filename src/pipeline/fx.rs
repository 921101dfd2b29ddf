use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Error, Debug)]
pub enum FxError {
    #[error("rate lookup failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("no USD rate published for {0}")]
    Missing(String),
}

/// Source of USD exchange rates. The live client hits a public rate API;
/// `StaticFxRates` serves the fallback table directly (tests, mock mode).
#[async_trait::async_trait]
pub trait FxRateSource: Send + Sync {
    /// USD value of one unit of `currency`.
    async fn usd_rate(&self, currency: &str) -> std::result::Result<f64, FxError>;
}

/// Approximate rates used whenever the live lookup fails. Part of the
/// documented pipeline behavior: given a dead FX service, conversion is still
/// deterministic (100 EUR is always 110.00 USD). Unlisted currencies convert
/// at 1.0.
static FALLBACK_RATES: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    HashMap::from([
        ("EUR", 1.1),
        ("GBP", 1.25),
        ("JPY", 0.0067),
        ("CNY", 0.14),
    ])
});

pub fn fallback_rate(currency: &str) -> f64 {
    *FALLBACK_RATES.get(currency).unwrap_or(&1.0)
}

const EXCHANGE_RATE_URL: &str = "https://api.exchangerate-api.com/v4/latest";

pub struct LiveFxClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct RatesResponse {
    rates: HashMap<String, f64>,
}

impl LiveFxClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: EXCHANGE_RATE_URL.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl FxRateSource for LiveFxClient {
    #[instrument(skip(self))]
    async fn usd_rate(&self, currency: &str) -> std::result::Result<f64, FxError> {
        let response = self
            .client
            .get(format!("{}/{}", self.base_url, currency))
            .send()
            .await?
            .error_for_status()?;
        let parsed: RatesResponse = response.json().await?;
        let rate = parsed
            .rates
            .get("USD")
            .copied()
            .ok_or_else(|| FxError::Missing(currency.to_string()))?;
        debug!(currency, rate, "fetched live FX rate");
        Ok(rate)
    }
}

/// Serves the static fallback table as the primary source.
pub struct StaticFxRates;

#[async_trait::async_trait]
impl FxRateSource for StaticFxRates {
    async fn usd_rate(&self, currency: &str) -> std::result::Result<f64, FxError> {
        Ok(fallback_rate(currency))
    }
}
