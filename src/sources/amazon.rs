use crate::domain::{Condition, Marketplace, RawListing, Region};
use crate::sources::{env_credential, MarketplaceApi, SourceError};
use serde::Deserialize;
use tracing::{debug, instrument};

const RAINFOREST_URL: &str = "https://api.rainforestapi.com/request";

/// Amazon search via the Rainforest API.
pub struct AmazonAdapter {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl AmazonAdapter {
    pub fn from_env(client: reqwest::Client) -> Self {
        Self {
            client,
            api_key: env_credential("RAINFOREST_API_KEY"),
        }
    }

    /// Amazon storefront domain for a region; unknown regions use the US
    /// storefront.
    fn domain(region: Region) -> &'static str {
        match region {
            Region::Eu => "amazon.de",
            Region::Asia => "amazon.co.jp",
            Region::Us | Region::Other => "amazon.com",
        }
    }
}

#[derive(Debug, Deserialize)]
struct RainforestResponse {
    #[serde(default)]
    search_results: Vec<RainforestItem>,
}

#[derive(Debug, Deserialize)]
struct RainforestItem {
    asin: String,
    title: String,
    price: Option<RainforestPrice>,
    image: Option<String>,
    link: String,
    rating: Option<f64>,
    ratings_total: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RainforestPrice {
    value: f64,
    currency: String,
}

#[async_trait::async_trait]
impl MarketplaceApi for AmazonAdapter {
    fn marketplace(&self) -> Marketplace {
        Marketplace::Amazon
    }

    #[instrument(skip(self))]
    async fn search(
        &self,
        query: &str,
        region: Region,
    ) -> std::result::Result<Vec<RawListing>, SourceError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| SourceError::Unavailable("Rainforest API key not configured".into()))?;

        let response = self
            .client
            .get(RAINFOREST_URL)
            .query(&[
                ("api_key", api_key),
                ("type", "search"),
                ("amazon_domain", Self::domain(region)),
                ("search_term", query),
                ("max_page", "1"),
            ])
            .send()
            .await?
            .error_for_status()?;

        let parsed: RainforestResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Protocol(format!("rainforest response: {e}")))?;

        let listings = parsed
            .search_results
            .into_iter()
            .filter_map(|item| {
                let price = match item.price {
                    Some(price) => price,
                    None => {
                        debug!(asin = %item.asin, "skipping item without a price");
                        return None;
                    }
                };
                Some(RawListing {
                    marketplace: Marketplace::Amazon,
                    external_id: item.asin,
                    title: item.title,
                    price: price.value,
                    currency: price.currency,
                    image_url: item.image,
                    url: item.link,
                    rating: item.rating,
                    review_count: item.ratings_total,
                    seller_name: None,
                    seller_rating: None,
                    condition: Condition::New,
                })
            })
            .collect();

        Ok(listings)
    }
}
