use crate::config::SourcesConfig;
use crate::domain::{Marketplace, RawListing, Region};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub mod aliexpress;
pub mod amazon;
pub mod ebay;
pub mod mock;

pub use aliexpress::AliexpressAdapter;
pub use amazon::AmazonAdapter;
pub use ebay::EbayAdapter;
pub use mock::MockMarketplace;

/// Per-source failure classification. Every variant is contained at the
/// fan-out boundary: the source is excluded from the batch and the error
/// never reaches the caller.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("source not configured: {0}")]
    Unavailable(String),

    #[error("source timed out after {0:?}")]
    Timeout(Duration),

    #[error("unexpected response shape: {0}")]
    Protocol(String),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// One marketplace integration: translates our query into the third-party
/// request and the third-party response into `RawListing`s. Parsing happens
/// against strictly typed response structs right at this edge, so nothing
/// downstream ever sees a raw third-party JSON shape. No cross-source logic
/// lives here.
#[async_trait::async_trait]
pub trait MarketplaceApi: Send + Sync {
    fn marketplace(&self) -> Marketplace;

    async fn search(
        &self,
        query: &str,
        region: Region,
    ) -> std::result::Result<Vec<RawListing>, SourceError>;
}

/// Builds the adapter set for the fan-out coordinator. With `use_mock` the
/// registry is three synthetic marketplaces; otherwise the real integrations
/// are constructed with credentials pulled from the environment (an adapter
/// with missing credentials still registers and reports `Unavailable` per
/// call, matching the containment contract).
pub fn build_adapters(config: &SourcesConfig) -> Vec<Arc<dyn MarketplaceApi>> {
    if config.use_mock {
        info!("using mock marketplace adapters");
        return Marketplace::ALL
            .iter()
            .map(|&marketplace| Arc::new(MockMarketplace::new(marketplace)) as Arc<dyn MarketplaceApi>)
            .collect();
    }

    let client = reqwest::Client::new();
    vec![
        Arc::new(AmazonAdapter::from_env(client.clone())),
        Arc::new(EbayAdapter::from_env(client.clone())),
        Arc::new(AliexpressAdapter::from_env(client)),
    ]
}

/// Reads a credential from the environment, treating empty and
/// "your_…_here" placeholder values as absent.
pub(crate) fn env_credential(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.starts_with("your_"))
}
