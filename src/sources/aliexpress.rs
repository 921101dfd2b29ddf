use crate::domain::{Condition, Marketplace, RawListing, Region};
use crate::sources::{env_credential, MarketplaceApi, SourceError};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

const SYNC_URL: &str = "https://api-sg.aliexpress.com/sync";

/// AliExpress search via the open-platform gateway. Prices come back in USD
/// regardless of region.
///
/// The real platform requires request signing; this sends the unsigned
/// variant, which is sufficient for sandbox keys.
pub struct AliexpressAdapter {
    client: reqwest::Client,
    app_key: Option<String>,
}

impl AliexpressAdapter {
    pub fn from_env(client: reqwest::Client) -> Self {
        Self {
            client,
            app_key: env_credential("ALIEXPRESS_APP_KEY"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AliexpressResponse {
    result: Option<AliexpressResult>,
}

#[derive(Debug, Deserialize)]
struct AliexpressResult {
    #[serde(default)]
    products: Vec<AliexpressItem>,
}

#[derive(Debug, Deserialize)]
struct AliexpressItem {
    product_id: u64,
    product_title: String,
    /// Decimal string, e.g. "12.34".
    target_sale_price: String,
    product_main_image_url: Option<String>,
    /// Positive-feedback percentage string, e.g. "95.5%".
    evaluate_rate: Option<String>,
    product_detail_url: String,
}

/// Converts a "95.5%" feedback string onto the common 0..5 rating scale.
fn rating_from_feedback(rate: &str) -> Option<f64> {
    let percent: f64 = rate.trim().trim_end_matches('%').parse().ok()?;
    Some((percent / 100.0 * 5.0).clamp(0.0, 5.0))
}

#[async_trait::async_trait]
impl MarketplaceApi for AliexpressAdapter {
    fn marketplace(&self) -> Marketplace {
        Marketplace::Aliexpress
    }

    #[instrument(skip(self))]
    async fn search(
        &self,
        query: &str,
        _region: Region,
    ) -> std::result::Result<Vec<RawListing>, SourceError> {
        let app_key = self
            .app_key
            .as_deref()
            .ok_or_else(|| SourceError::Unavailable("AliExpress API credentials not configured".into()))?;

        let response = self
            .client
            .post(SYNC_URL)
            .json(&json!({
                "method": "aliexpress.ds.product.get",
                "app_key": app_key,
                "keywords": query,
                "page_size": 20,
            }))
            .send()
            .await?
            .error_for_status()?;

        let parsed: AliexpressResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Protocol(format!("aliexpress response: {e}")))?;

        let products = parsed.result.map(|r| r.products).unwrap_or_default();
        let listings = products
            .into_iter()
            .filter_map(|item| {
                let price: f64 = match item.target_sale_price.parse() {
                    Ok(price) => price,
                    Err(_) => {
                        debug!(product_id = item.product_id, value = %item.target_sale_price,
                            "unparseable price, skipping item");
                        return None;
                    }
                };
                Some(RawListing {
                    marketplace: Marketplace::Aliexpress,
                    external_id: item.product_id.to_string(),
                    title: item.product_title,
                    price,
                    currency: "USD".to_string(),
                    image_url: item.product_main_image_url,
                    url: item.product_detail_url,
                    rating: item.evaluate_rate.as_deref().and_then(rating_from_feedback),
                    review_count: None,
                    seller_name: None,
                    seller_rating: None,
                    condition: Condition::New,
                })
            })
            .collect();

        Ok(listings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feedback_percentage_maps_to_five_point_scale() {
        assert_eq!(rating_from_feedback("100%"), Some(5.0));
        assert_eq!(rating_from_feedback("80%"), Some(4.0));
        assert_eq!(rating_from_feedback("not a number"), None);
    }
}
