use crate::domain::{
    round2, LocalPrice, Marketplace, Price, Product, ProductMetadata, RawListing, Region, Reviews,
    Shipping, ShippingCost, Vendor,
};
use crate::pipeline::fx::{fallback_rate, FxRateSource};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{instrument, warn};

pub const MAX_TITLE_LEN: usize = 200;

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid price: {0}")]
    InvalidPrice(f64),
}

/// Currency conversion with a per-converter memo so a batch hits the FX
/// source at most once per distinct non-USD currency. A failed lookup
/// degrades to the static fallback table, so conversion never fails.
pub struct CurrencyConverter {
    source: Arc<dyn FxRateSource>,
    cache: Mutex<HashMap<String, f64>>,
}

impl CurrencyConverter {
    pub fn new(source: Arc<dyn FxRateSource>) -> Self {
        Self {
            source,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub async fn to_usd(&self, amount: f64, currency: &str) -> f64 {
        if currency == "USD" {
            return amount;
        }
        let rate = self.rate(currency).await;
        amount * rate
    }

    async fn rate(&self, currency: &str) -> f64 {
        let mut cache = self.cache.lock().await;
        if let Some(&rate) = cache.get(currency) {
            return rate;
        }
        let rate = match self.source.usd_rate(currency).await {
            Ok(rate) => rate,
            Err(err) => {
                warn!(currency, error = %err, "FX lookup failed, using fallback rate");
                fallback_rate(currency)
            }
        };
        cache.insert(currency.to_string(), rate);
        rate
    }
}

/// Static per-marketplace shipping estimate with a cross-region surcharge.
/// A heuristic approximation, not a live carrier lookup; the trait seam is
/// where a real carrier API would plug in.
pub trait ShippingEstimator: Send + Sync {
    fn estimate(&self, marketplace: Marketplace, region: Region) -> Shipping;
}

pub struct StaticShippingEstimator;

impl ShippingEstimator for StaticShippingEstimator {
    fn estimate(&self, marketplace: Marketplace, region: Region) -> Shipping {
        let (mut cost, mut days) = match marketplace {
            Marketplace::Amazon => (0.0, 2),
            Marketplace::Ebay => (5.0, 5),
            Marketplace::Aliexpress => (0.0, 14),
        };

        // Shipping out of the marketplace's home region costs extra unless
        // the marketplace ships worldwide from one catalog.
        if !region.is_us() && !marketplace.ships_globally() {
            cost += 10.0;
            days += 3;
        }

        Shipping {
            cost: ShippingCost { usd: cost },
            estimated_days: days,
        }
    }
}

/// Converts adapter output into canonical `Product` records, applying the
/// documented fallbacks for incomplete source data.
pub struct Normalizer {
    converter: CurrencyConverter,
    shipping: Box<dyn ShippingEstimator>,
}

impl Normalizer {
    pub fn new(fx: Arc<dyn FxRateSource>) -> Self {
        Self {
            converter: CurrencyConverter::new(fx),
            shipping: Box::new(StaticShippingEstimator),
        }
    }

    pub fn with_shipping(fx: Arc<dyn FxRateSource>, shipping: Box<dyn ShippingEstimator>) -> Self {
        Self {
            converter: CurrencyConverter::new(fx),
            shipping,
        }
    }

    /// Normalizes one listing. Pure aside from the (memoized) FX lookup.
    pub async fn normalize(
        &self,
        listing: &RawListing,
        region: Region,
    ) -> std::result::Result<Product, NormalizeError> {
        if listing.external_id.trim().is_empty() {
            return Err(NormalizeError::MissingField("externalId"));
        }
        if !listing.price.is_finite() || listing.price < 0.0 {
            return Err(NormalizeError::InvalidPrice(listing.price));
        }

        let marketplace = listing.marketplace;
        let usd = round2(self.converter.to_usd(listing.price, &listing.currency).await);

        Ok(Product {
            id: Product::compute_id(marketplace, &listing.external_id),
            title: normalize_title(&listing.title),
            price: Price {
                usd,
                local: LocalPrice {
                    amount: listing.price,
                    currency: listing.currency.clone(),
                },
            },
            vendor: Vendor {
                name: listing
                    .seller_name
                    .clone()
                    .unwrap_or_else(|| marketplace.as_str().to_string()),
                marketplace,
                rating: listing.seller_rating.unwrap_or(0.0),
                trust_score: 0.0,
            },
            shipping: self.shipping.estimate(marketplace, region),
            reviews: Reviews {
                count: listing.review_count.unwrap_or(0),
                avg_rating: listing.rating.unwrap_or(0.0),
                quality_score: 0.0,
            },
            true_cost: None,
            metadata: ProductMetadata {
                marketplace,
                region,
                external_id: listing.external_id.clone(),
                url: listing.url.clone(),
                image_url: listing.image_url.clone(),
                condition: listing.condition,
            },
        })
    }

    /// Normalizes a batch, preserving input order. Policy on a bad listing
    /// is skip-and-log, uniformly: one malformed listing never aborts the
    /// batch.
    #[instrument(skip(self, listings), fields(count = listings.len()))]
    pub async fn batch_normalize(&self, listings: &[RawListing], region: Region) -> Vec<Product> {
        let mut products = Vec::with_capacity(listings.len());
        for listing in listings {
            match self.normalize(listing, region).await {
                Ok(product) => products.push(product),
                Err(err) => {
                    warn!(
                        marketplace = %listing.marketplace,
                        external_id = %listing.external_id,
                        error = %err,
                        "skipping listing that failed normalization"
                    );
                }
            }
        }
        products
    }
}

/// Trims, collapses internal whitespace runs and caps the length. Never
/// fails; always returns a string.
pub fn normalize_title(title: &str) -> String {
    let collapsed = title.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(MAX_TITLE_LEN).collect()
}
