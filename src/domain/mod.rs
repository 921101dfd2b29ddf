use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Marketplaces the aggregator can search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Marketplace {
    Amazon,
    Ebay,
    Aliexpress,
}

impl Marketplace {
    pub const ALL: [Marketplace; 3] = [
        Marketplace::Amazon,
        Marketplace::Ebay,
        Marketplace::Aliexpress,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Marketplace::Amazon => "amazon",
            Marketplace::Ebay => "ebay",
            Marketplace::Aliexpress => "aliexpress",
        }
    }

    /// Whether the marketplace ships worldwide from a single catalog, in
    /// which case no cross-region shipping surcharge applies.
    pub const fn ships_globally(self) -> bool {
        matches!(self, Marketplace::Aliexpress)
    }
}

impl std::fmt::Display for Marketplace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Marketplace {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "amazon" => Ok(Marketplace::Amazon),
            "ebay" => Ok(Marketplace::Ebay),
            "aliexpress" => Ok(Marketplace::Aliexpress),
            other => Err(format!("unknown marketplace: {other}")),
        }
    }
}

/// Broad region buckets used for locale lookup, shipping surcharges and tax
/// estimation. Anything we do not recognize lands in `Other`, which behaves
/// like a non-US region with the default tax rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Region {
    Us,
    Eu,
    Asia,
    Other,
}

impl Region {
    /// Parses a caller-supplied region string. Unknown values map to
    /// `Other` rather than failing; "US" is the documented default.
    pub fn parse(value: &str) -> Region {
        match value.trim().to_ascii_uppercase().as_str() {
            "US" | "" => Region::Us,
            "EU" => Region::Eu,
            "ASIA" => Region::Asia,
            _ => Region::Other,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Region::Us => "US",
            Region::Eu => "EU",
            Region::Asia => "ASIA",
            Region::Other => "OTHER",
        }
    }

    pub const fn is_us(self) -> bool {
        matches!(self, Region::Us)
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for Region {
    fn default() -> Self {
        Region::Us
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    New,
    Used,
}

impl Default for Condition {
    fn default() -> Self {
        Condition::New
    }
}

/// A listing as one marketplace adapter reports it, already parsed out of the
/// third-party response shape but not yet normalized. Lives for one search
/// cycle only and is never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawListing {
    pub marketplace: Marketplace,
    pub external_id: String,
    pub title: String,
    pub price: f64,
    /// ISO 4217 currency code of `price`.
    pub currency: String,
    pub image_url: Option<String>,
    pub url: String,
    /// Product rating on a 0..5 scale, when the marketplace reports one.
    pub rating: Option<f64>,
    pub review_count: Option<u32>,
    pub seller_name: Option<String>,
    pub seller_rating: Option<f64>,
    #[serde(default)]
    pub condition: Condition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalPrice {
    pub amount: f64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Price {
    /// USD price rounded to 2 decimal places.
    pub usd: f64,
    pub local: LocalPrice,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vendor {
    pub name: String,
    pub marketplace: Marketplace,
    /// Seller rating on a 0..5 scale, 0 when unreported.
    pub rating: f64,
    /// Composite [0,1] reliability score. 0.0 until the trust scorer runs;
    /// that sentinel is not a real score.
    pub trust_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingCost {
    pub usd: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipping {
    pub cost: ShippingCost,
    pub estimated_days: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reviews {
    pub count: u32,
    pub avg_rating: f64,
    pub quality_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdown {
    pub base_price: f64,
    pub shipping: f64,
    pub taxes: f64,
    pub conversion_fee: f64,
}

/// Landed USD cost of acquiring the product: base price plus shipping,
/// estimated taxes and currency conversion fee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrueCost {
    pub total: f64,
    pub breakdown: CostBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductMetadata {
    pub marketplace: Marketplace,
    pub region: Region,
    pub external_id: String,
    pub url: String,
    pub image_url: Option<String>,
    pub condition: Condition,
}

/// Canonical normalized product record. Produced by the normalizer, enriched
/// by the trust scorer (`vendor.trust_score`) and the cost ranker
/// (`true_cost`), then handed to the caller or a persistence layer keyed by
/// `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Stable content hash of (marketplace, external id); identical input
    /// always yields the identical id, which is what makes upsert-by-id
    /// possible downstream.
    pub id: String,
    pub title: String,
    pub price: Price,
    pub vendor: Vendor,
    pub shipping: Shipping,
    pub reviews: Reviews,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub true_cost: Option<TrueCost>,
    pub metadata: ProductMetadata,
}

impl Product {
    /// Deterministic product id: hex-encoded SHA-256 of
    /// `"{marketplace}-{external_id}"`.
    pub fn compute_id(marketplace: Marketplace, external_id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(marketplace.as_str().as_bytes());
        hasher.update(b"-");
        hasher.update(external_id.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// One observed true cost for a product, read back from external storage for
/// trend estimation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub true_cost: f64,
    pub marketplace: Marketplace,
    pub vendor: String,
}

/// Rounds half away from zero to 2 decimal places. Used everywhere a USD
/// amount is materialized so the pipeline rounds consistently.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Rounds half away from zero to 1 decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Rounds half away from zero to 3 decimal places.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_id_is_deterministic() {
        let a = Product::compute_id(Marketplace::Amazon, "B0ABC123");
        let b = Product::compute_id(Marketplace::Amazon, "B0ABC123");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn product_id_distinguishes_marketplaces() {
        let amazon = Product::compute_id(Marketplace::Amazon, "123");
        let ebay = Product::compute_id(Marketplace::Ebay, "123");
        assert_ne!(amazon, ebay);
    }

    #[test]
    fn region_parse_falls_back_to_other() {
        assert_eq!(Region::parse("us"), Region::Us);
        assert_eq!(Region::parse("EU"), Region::Eu);
        assert_eq!(Region::parse("asia"), Region::Asia);
        assert_eq!(Region::parse("LATAM"), Region::Other);
        assert_eq!(Region::parse(""), Region::Us);
    }

    #[test]
    fn marketplace_round_trips_through_str() {
        for marketplace in Marketplace::ALL {
            assert_eq!(marketplace.as_str().parse::<Marketplace>().unwrap(), marketplace);
        }
    }

    #[test]
    fn rounding_is_consistent() {
        assert_eq!(round2(10.004), 10.0);
        assert_eq!(round2(10.006), 10.01);
        assert_eq!(round2(-10.006), -10.01);
        assert_eq!(round1(19.96), 20.0);
        assert_eq!(round3(0.6666), 0.667);
    }
}
