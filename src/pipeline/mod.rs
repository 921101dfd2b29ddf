use crate::config::Config;
use crate::domain::{Marketplace, Product, Region, Reviews, Shipping, TrueCost, Vendor};
use crate::error::{DealscanError, Result};
use crate::pipeline::arbitrage::CostRanker;
use crate::pipeline::fanout::FanOutCoordinator;
use crate::pipeline::fx::{FxRateSource, LiveFxClient, StaticFxRates};
use crate::pipeline::normalize::Normalizer;
use crate::pipeline::trust::{filter_trusted, DEFAULT_MIN_TRUST};
use crate::sources::{build_adapters, MarketplaceApi};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

pub mod arbitrage;
pub mod fanout;
pub mod fx;
pub mod normalize;
pub mod rate_limiter;
pub mod trends;
pub mod trust;

/// A single search invocation: what to look for, where the buyer is, and how
/// strict the trust filter should be.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub region: Region,
    pub min_trust_score: f64,
    pub top_n: usize,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            region: Region::Us,
            min_trust_score: DEFAULT_MIN_TRUST,
            top_n: 10,
        }
    }
}

/// Outcome of one pipeline run, with the ranked products still in their
/// domain shape so the composition root can persist them before rendering
/// the API response.
#[derive(Debug)]
pub struct SearchReport {
    pub products: Vec<Product>,
    pub covered: Vec<Marketplace>,
    pub total_found: usize,
    pub trusted_count: usize,
    pub scan_time: Duration,
    pub min_trust_score: f64,
}

impl SearchReport {
    pub fn into_response(self) -> SearchResponse {
        let message = if self.products.is_empty() {
            Some("No products found".to_string())
        } else {
            None
        };
        SearchResponse {
            results: self.products.into_iter().map(ProductView::from).collect(),
            scan_time: format!("{:.2}s", self.scan_time.as_secs_f64()),
            marketplaces_covered: self.covered.iter().map(|m| m.as_str().to_string()).collect(),
            message,
            total_found: self.total_found,
            trusted_count: self.trusted_count,
            filters: FilterEcho {
                min_trust_score: self.min_trust_score,
            },
        }
    }
}

/// One ranked result as the search endpoint renders it. `price` is the
/// landed true cost, not the sticker price.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    pub id: String,
    pub title: String,
    pub price: Option<TrueCost>,
    pub vendor: Vendor,
    pub marketplace: Marketplace,
    pub image_url: Option<String>,
    pub url: String,
    pub shipping: Shipping,
    pub reviews: Reviews,
}

impl From<Product> for ProductView {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            title: product.title,
            price: product.true_cost,
            vendor: product.vendor,
            marketplace: product.metadata.marketplace,
            image_url: product.metadata.image_url,
            url: product.metadata.url,
            shipping: product.shipping,
            reviews: product.reviews,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterEcho {
    pub min_trust_score: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<ProductView>,
    pub scan_time: String,
    pub marketplaces_covered: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub total_found: usize,
    pub trusted_count: usize,
    pub filters: FilterEcho,
}

/// The single entry point: fan-out, normalize, trust-filter, rank. All
/// per-source failures are contained below this; anything else propagates
/// out of `run` for the surface layer to map onto the response contract.
pub struct SearchPipeline {
    coordinator: FanOutCoordinator,
    normalizer: Normalizer,
    ranker: CostRanker,
}

impl SearchPipeline {
    pub fn new(coordinator: FanOutCoordinator, normalizer: Normalizer, ranker: CostRanker) -> Self {
        Self {
            coordinator,
            normalizer,
            ranker,
        }
    }

    #[instrument(skip(self, request), fields(query = %request.query, region = %request.region))]
    pub async fn run(&self, request: &SearchRequest) -> Result<SearchReport> {
        if request.query.trim().is_empty() {
            return Err(DealscanError::Validation("search query is required".into()));
        }

        let batch = self.coordinator.search(&request.query, request.region).await;
        if batch.listings.is_empty() {
            info!(covered = batch.covered.len(), "no listings from any source");
            return Ok(SearchReport {
                products: Vec::new(),
                covered: batch.covered,
                total_found: 0,
                trusted_count: 0,
                scan_time: batch.elapsed,
                min_trust_score: request.min_trust_score,
            });
        }

        let products = self
            .normalizer
            .batch_normalize(&batch.listings, request.region)
            .await;
        let total_found = products.len();

        let verdict = filter_trusted(products, request.min_trust_score);
        let trusted_count = verdict.trusted.len();

        let ranked = self.ranker.rank_top_deals(verdict.trusted, request.top_n);

        counter!("dealscan_searches_total").increment(1);
        histogram!("dealscan_search_results").record(ranked.len() as f64);
        info!(
            total_found,
            trusted_count,
            returned = ranked.len(),
            "search pipeline complete"
        );

        Ok(SearchReport {
            products: ranked,
            covered: batch.covered,
            total_found,
            trusted_count,
            scan_time: batch.elapsed,
            min_trust_score: request.min_trust_score,
        })
    }

    pub fn ranker(&self) -> &CostRanker {
        &self.ranker
    }
}

/// Composition root for the pipeline: adapters, FX source and stage
/// components wired from configuration. Mock mode swaps in synthetic
/// marketplaces and the static FX table.
pub fn build_pipeline(config: &Config) -> SearchPipeline {
    let adapters: Vec<Arc<dyn MarketplaceApi>> = build_adapters(&config.sources);
    let fx: Arc<dyn FxRateSource> = if config.sources.use_mock {
        Arc::new(StaticFxRates)
    } else {
        Arc::new(LiveFxClient::new(reqwest::Client::new()))
    };

    let coordinator = FanOutCoordinator::new(
        adapters,
        &config.sources,
        Duration::from_millis(config.search.per_source_timeout_ms),
        Duration::from_millis(config.search.overall_deadline_ms),
    );
    SearchPipeline::new(coordinator, Normalizer::new(fx), CostRanker::new())
}
