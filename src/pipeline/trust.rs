use crate::domain::{round3, Marketplace, Product, Reviews, Vendor};
use tracing::instrument;

pub const DEFAULT_MIN_TRUST: f64 = 0.6;

const WEIGHT_RATING: f64 = 0.4;
const WEIGHT_REVIEW_VOLUME: f64 = 0.3;
const WEIGHT_HISTORICAL: f64 = 0.2;
const WEIGHT_RESPONSE_TIME: f64 = 0.1;

/// Composite [0,1] vendor reliability estimate: a weighted blend of seller
/// rating, review volume, and per-marketplace historical/responsiveness
/// heuristics. Rounded to 3 decimal places.
pub fn trust_score(vendor: &Vendor, reviews: &Reviews) -> f64 {
    let score = rating_score(vendor.rating) * WEIGHT_RATING
        + review_volume_score(reviews.count) * WEIGHT_REVIEW_VOLUME
        + historical_reliability(vendor.marketplace) * WEIGHT_HISTORICAL
        + response_time_factor(vendor.marketplace) * WEIGHT_RESPONSE_TIME;
    round3(score)
}

fn rating_score(rating: f64) -> f64 {
    if rating <= 0.0 {
        return 0.0;
    }
    (rating / 5.0).min(1.0)
}

/// Logarithmic saturation: a handful of reviews should not dominate the
/// signal the way raw counts would. Reaches 1.0 at 1000 reviews.
fn review_volume_score(count: u32) -> f64 {
    if count == 0 {
        return 0.0;
    }
    if count >= 1000 {
        return 1.0;
    }
    ((f64::from(count) + 1.0).log10() / 3.0).clamp(0.0, 1.0)
}

/// Placeholder for a per-vendor performance database; until one exists this
/// is a marketplace-level table with a neutral default.
fn historical_reliability(marketplace: Marketplace) -> f64 {
    match marketplace {
        Marketplace::Amazon => 0.9,
        Marketplace::Ebay => 0.7,
        Marketplace::Aliexpress => 0.6,
    }
}

fn response_time_factor(marketplace: Marketplace) -> f64 {
    match marketplace {
        Marketplace::Amazon => 0.95,
        Marketplace::Ebay => 0.80,
        Marketplace::Aliexpress => 0.60,
    }
}

/// Outcome of trust filtering. Every product in *both* lists carries its
/// computed `vendor.trust_score`, so callers inspecting rejected products
/// still see a valid score.
#[derive(Debug)]
pub struct TrustVerdict {
    pub trusted: Vec<Product>,
    pub rejected: Vec<Product>,
}

/// Scores every product and partitions on `min_score`. The trusted set is
/// exactly the products with `trust_score >= min_score`; empty input yields
/// an empty verdict.
#[instrument(skip(products), fields(count = products.len()))]
pub fn filter_trusted(products: Vec<Product>, min_score: f64) -> TrustVerdict {
    let mut trusted = Vec::new();
    let mut rejected = Vec::new();
    for mut product in products {
        let score = trust_score(&product.vendor, &product.reviews);
        product.vendor.trust_score = score;
        if score >= min_score {
            trusted.push(product);
        } else {
            rejected.push(product);
        }
    }
    TrustVerdict { trusted, rejected }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Condition, LocalPrice, Price, ProductMetadata, Region, Shipping, ShippingCost,
    };

    fn product(marketplace: Marketplace, rating: f64, review_count: u32) -> Product {
        Product {
            id: Product::compute_id(marketplace, "x"),
            title: "Widget".to_string(),
            price: Price {
                usd: 10.0,
                local: LocalPrice {
                    amount: 10.0,
                    currency: "USD".to_string(),
                },
            },
            vendor: Vendor {
                name: "seller".to_string(),
                marketplace,
                rating,
                trust_score: 0.0,
            },
            shipping: Shipping {
                cost: ShippingCost { usd: 0.0 },
                estimated_days: 2,
            },
            reviews: Reviews {
                count: review_count,
                avg_rating: rating,
                quality_score: 0.0,
            },
            true_cost: None,
            metadata: ProductMetadata {
                marketplace,
                region: Region::Us,
                external_id: "x".to_string(),
                url: "https://example.com".to_string(),
                image_url: None,
                condition: Condition::New,
            },
        }
    }

    #[test]
    fn score_is_always_within_bounds() {
        let cases = [
            (Marketplace::Amazon, 5.0, 100_000),
            (Marketplace::Amazon, 0.0, 0),
            (Marketplace::Ebay, 9.9, 50),
            (Marketplace::Aliexpress, 1.0, 1),
        ];
        for (marketplace, rating, count) in cases {
            let p = product(marketplace, rating, count);
            let score = trust_score(&p.vendor, &p.reviews);
            assert!((0.0..=1.0).contains(&score), "score {score} out of bounds");
        }
    }

    #[test]
    fn perfect_amazon_vendor_scores_the_component_maximum() {
        let p = product(Marketplace::Amazon, 5.0, 1000);
        // 1.0*0.4 + 1.0*0.3 + 0.9*0.2 + 0.95*0.1
        assert_eq!(trust_score(&p.vendor, &p.reviews), 0.975);
    }

    #[test]
    fn absent_rating_contributes_zero() {
        let p = product(Marketplace::Aliexpress, 0.0, 0);
        // 0 + 0 + 0.6*0.2 + 0.6*0.1
        assert_eq!(trust_score(&p.vendor, &p.reviews), 0.18);
    }

    #[test]
    fn review_volume_saturates_logarithmically() {
        assert_eq!(review_volume_score(0), 0.0);
        assert_eq!(review_volume_score(1000), 1.0);
        assert_eq!(review_volume_score(100_000), 1.0);
        let hundred = review_volume_score(100);
        assert!(hundred > 0.6 && hundred < 0.7, "got {hundred}");
    }

    #[test]
    fn filter_partitions_exactly_on_threshold() {
        let strong = product(Marketplace::Amazon, 5.0, 1000); // 0.975
        let weak = product(Marketplace::Aliexpress, 1.0, 2); // well below 0.6
        let verdict = filter_trusted(vec![strong, weak], 0.6);

        assert_eq!(verdict.trusted.len(), 1);
        assert_eq!(verdict.rejected.len(), 1);
        assert_eq!(verdict.trusted[0].vendor.trust_score, 0.975);
        // rejected products still carry a computed score
        assert!(verdict.rejected[0].vendor.trust_score > 0.0);
        assert!(verdict.rejected[0].vendor.trust_score < 0.6);
    }

    #[test]
    fn empty_input_yields_empty_verdict() {
        let verdict = filter_trusted(Vec::new(), 0.6);
        assert!(verdict.trusted.is_empty());
        assert!(verdict.rejected.is_empty());
    }
}
