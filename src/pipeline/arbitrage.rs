use crate::domain::{round1, round2, CostBreakdown, Product, Region, TrueCost};
use serde::Serialize;
use tracing::instrument;

/// Flat spread modeled for settling a non-USD purchase.
pub const CONVERSION_FEE_RATE: f64 = 0.025;

/// Regional tax estimate as a flat rate by broad region bucket. An
/// approximation, not jurisdiction-accurate; the trait seam is where a real
/// tax API would plug in.
pub trait TaxEstimator: Send + Sync {
    fn rate(&self, region: Region) -> f64;
}

pub struct StaticTaxEstimator;

impl TaxEstimator for StaticTaxEstimator {
    fn rate(&self, region: Region) -> f64 {
        match region {
            Region::Us => 0.08,
            Region::Eu => 0.20,
            Region::Asia | Region::Other => 0.10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Savings {
    pub amount: f64,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceComparison {
    pub lowest_price: f64,
    pub highest_price: f64,
    pub average_price: f64,
}

/// The cheapest qualifying product plus how much it saves against the most
/// expensive qualifying one.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BestDeal {
    pub product: Product,
    pub savings: Savings,
    pub comparison: PriceComparison,
}

/// Ranks products by landed ("true") USD cost.
pub struct CostRanker {
    taxes: Box<dyn TaxEstimator>,
}

impl Default for CostRanker {
    fn default() -> Self {
        Self::new()
    }
}

impl CostRanker {
    pub fn new() -> Self {
        Self {
            taxes: Box::new(StaticTaxEstimator),
        }
    }

    pub fn with_taxes(taxes: Box<dyn TaxEstimator>) -> Self {
        Self { taxes }
    }

    /// base price + shipping + estimated taxes + conversion fee, total
    /// rounded to 2 decimal places. Every component is non-negative, so the
    /// total never drops below the base price.
    pub fn true_cost(&self, product: &Product) -> TrueCost {
        let base_price = product.price.usd;
        let shipping = product.shipping.cost.usd;
        let taxes = base_price * self.taxes.rate(product.metadata.region);
        let conversion_fee = if product.price.local.currency != "USD" {
            base_price * CONVERSION_FEE_RATE
        } else {
            0.0
        };

        TrueCost {
            total: round2(base_price + shipping + taxes + conversion_fee),
            breakdown: CostBreakdown {
                base_price,
                shipping,
                taxes: round2(taxes),
                conversion_fee: round2(conversion_fee),
            },
        }
    }

    fn attach_costs(&self, products: &mut [Product]) {
        for product in products.iter_mut() {
            product.true_cost = Some(self.true_cost(product));
        }
    }

    fn sort_ascending(products: &mut [Product]) {
        // sort_by is stable: equal totals keep their original relative order
        products.sort_by(|a, b| {
            let a = a.true_cost.as_ref().map(|c| c.total).unwrap_or(f64::MAX);
            let b = b.true_cost.as_ref().map(|c| c.total).unwrap_or(f64::MAX);
            a.total_cmp(&b)
        });
    }

    /// Top `n` products, cheapest true cost first, each with `true_cost`
    /// populated.
    #[instrument(skip(self, products), fields(count = products.len()))]
    pub fn rank_top_deals(&self, mut products: Vec<Product>, n: usize) -> Vec<Product> {
        self.attach_costs(&mut products);
        Self::sort_ascending(&mut products);
        products.truncate(n);
        products
    }

    /// Best deal with savings relative to the most expensive qualifying
    /// product. Empty input yields `None`, not an error.
    pub fn find_best_deal(&self, mut products: Vec<Product>) -> Option<BestDeal> {
        if products.is_empty() {
            return None;
        }
        self.attach_costs(&mut products);
        Self::sort_ascending(&mut products);

        let total = |p: &Product| p.true_cost.as_ref().map(|c| c.total).unwrap_or(0.0);
        let lowest = total(products.first()?);
        let highest = total(products.last()?);
        let average = round2(products.iter().map(|p| total(p)).sum::<f64>() / products.len() as f64);

        let amount = highest - lowest;
        let percent = if highest > 0.0 {
            amount / highest * 100.0
        } else {
            0.0
        };

        Some(BestDeal {
            product: products.into_iter().next()?,
            savings: Savings {
                amount: round2(amount),
                percent: round1(percent),
            },
            comparison: PriceComparison {
                lowest_price: lowest,
                highest_price: highest,
                average_price: average,
            },
        })
    }
}
