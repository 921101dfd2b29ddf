use crate::domain::{Marketplace, PricePoint, Product};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Persistence boundary for ranked products and their observed costs. The
/// pipeline itself never writes; the surface layer upserts after ranking,
/// keyed by the stable product id, and the trend estimator reads history
/// back out.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Insert-or-replace by `Product.id`.
    async fn upsert_products(&self, products: &[Product]) -> Result<()>;

    /// Appends one price observation per product that has a computed true
    /// cost.
    async fn record_price_points(&self, products: &[Product], observed_at: DateTime<Utc>) -> Result<()>;

    async fn get_product(&self, id: &str) -> Result<Option<Product>>;

    /// Observed costs for a product since `since`, oldest first, optionally
    /// restricted to one marketplace.
    async fn price_history(
        &self,
        product_id: &str,
        since: DateTime<Utc>,
        marketplace: Option<Marketplace>,
    ) -> Result<Vec<PricePoint>>;
}

/// In-memory storage implementation for development/testing.
#[derive(Default)]
pub struct InMemoryStorage {
    products: Arc<Mutex<HashMap<String, Product>>>,
    history: Arc<Mutex<HashMap<String, Vec<PricePoint>>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn upsert_products(&self, products: &[Product]) -> Result<()> {
        let mut store = self.products.lock().unwrap();
        for product in products {
            store.insert(product.id.clone(), product.clone());
        }
        debug!(count = products.len(), "upserted products");
        Ok(())
    }

    async fn record_price_points(&self, products: &[Product], observed_at: DateTime<Utc>) -> Result<()> {
        let mut history = self.history.lock().unwrap();
        for product in products {
            let Some(cost) = &product.true_cost else { continue };
            history.entry(product.id.clone()).or_default().push(PricePoint {
                timestamp: observed_at,
                true_cost: cost.total,
                marketplace: product.metadata.marketplace,
                vendor: product.vendor.name.clone(),
            });
        }
        Ok(())
    }

    async fn get_product(&self, id: &str) -> Result<Option<Product>> {
        let store = self.products.lock().unwrap();
        Ok(store.get(id).cloned())
    }

    async fn price_history(
        &self,
        product_id: &str,
        since: DateTime<Utc>,
        marketplace: Option<Marketplace>,
    ) -> Result<Vec<PricePoint>> {
        let history = self.history.lock().unwrap();
        let mut points: Vec<PricePoint> = history
            .get(product_id)
            .map(|points| {
                points
                    .iter()
                    .filter(|p| p.timestamp >= since)
                    .filter(|p| marketplace.map_or(true, |m| p.marketplace == m))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        points.sort_by_key(|p| p.timestamp);
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Condition, CostBreakdown, LocalPrice, Price, ProductMetadata, Region, Reviews, Shipping,
        ShippingCost, TrueCost, Vendor,
    };
    use chrono::Duration;

    fn product(total: f64) -> Product {
        Product {
            id: Product::compute_id(Marketplace::Amazon, "B00TEST"),
            title: "Widget".to_string(),
            price: Price {
                usd: total,
                local: LocalPrice {
                    amount: total,
                    currency: "USD".to_string(),
                },
            },
            vendor: Vendor {
                name: "seller".to_string(),
                marketplace: Marketplace::Amazon,
                rating: 4.0,
                trust_score: 0.8,
            },
            shipping: Shipping {
                cost: ShippingCost { usd: 0.0 },
                estimated_days: 2,
            },
            reviews: Reviews {
                count: 5,
                avg_rating: 4.0,
                quality_score: 0.0,
            },
            true_cost: Some(TrueCost {
                total,
                breakdown: CostBreakdown {
                    base_price: total,
                    shipping: 0.0,
                    taxes: 0.0,
                    conversion_fee: 0.0,
                },
            }),
            metadata: ProductMetadata {
                marketplace: Marketplace::Amazon,
                region: Region::Us,
                external_id: "B00TEST".to_string(),
                url: "https://example.com".to_string(),
                image_url: None,
                condition: Condition::New,
            },
        }
    }

    #[tokio::test]
    async fn upsert_replaces_by_stable_id() {
        let storage = InMemoryStorage::new();
        let first = product(100.0);
        let mut second = product(90.0);
        second.title = "Widget v2".to_string();

        storage.upsert_products(&[first]).await.unwrap();
        storage.upsert_products(&[second.clone()]).await.unwrap();

        let stored = storage.get_product(&second.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Widget v2");
    }

    #[tokio::test]
    async fn history_is_filtered_and_ordered() {
        let storage = InMemoryStorage::new();
        let item = product(100.0);
        let now = Utc::now();

        storage
            .record_price_points(&[product(100.0)], now - Duration::days(10))
            .await
            .unwrap();
        storage
            .record_price_points(&[product(90.0)], now - Duration::days(5))
            .await
            .unwrap();
        storage
            .record_price_points(&[product(95.0)], now - Duration::days(60))
            .await
            .unwrap();

        let history = storage
            .price_history(&item.id, now - Duration::days(30), None)
            .await
            .unwrap();
        let costs: Vec<f64> = history.iter().map(|p| p.true_cost).collect();
        assert_eq!(costs, vec![100.0, 90.0]);

        let none = storage
            .price_history(&item.id, now - Duration::days(30), Some(Marketplace::Ebay))
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
