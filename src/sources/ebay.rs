use crate::domain::{Condition, Marketplace, RawListing, Region};
use crate::sources::{env_credential, MarketplaceApi, SourceError};
use serde::Deserialize;
use tracing::{debug, instrument};

const TOKEN_URL: &str = "https://api.ebay.com/identity/v1/oauth2/token";
const BROWSE_SEARCH_URL: &str = "https://api.ebay.com/buy/browse/v1/item_summary/search";

/// eBay search via the Buy Browse API with client-credentials OAuth.
pub struct EbayAdapter {
    client: reqwest::Client,
    client_id: Option<String>,
    client_secret: Option<String>,
}

impl EbayAdapter {
    pub fn from_env(client: reqwest::Client) -> Self {
        Self {
            client,
            client_id: env_credential("EBAY_CLIENT_ID"),
            client_secret: env_credential("EBAY_CLIENT_SECRET"),
        }
    }

    /// eBay marketplace id for a region; unknown regions use EBAY_US.
    fn marketplace_id(region: Region) -> &'static str {
        match region {
            Region::Eu => "EBAY_DE",
            Region::Asia => "EBAY_JP",
            Region::Us | Region::Other => "EBAY_US",
        }
    }

    /// Fetches an application access token. A production deployment would
    /// cache this until expiry; one token per search keeps the adapter
    /// stateless.
    async fn access_token(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> std::result::Result<String, SourceError> {
        let response = self
            .client
            .post(TOKEN_URL)
            .basic_auth(client_id, Some(client_secret))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials&scope=https://api.ebay.com/oauth/api_scope")
            .send()
            .await?
            .error_for_status()?;

        let token: EbayTokenResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Protocol(format!("ebay token response: {e}")))?;
        Ok(token.access_token)
    }
}

#[derive(Debug, Deserialize)]
struct EbayTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EbaySearchResponse {
    #[serde(default)]
    item_summaries: Vec<EbayItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EbayItem {
    item_id: String,
    title: String,
    price: Option<EbayPrice>,
    image: Option<EbayImage>,
    condition: Option<String>,
    item_web_url: String,
}

#[derive(Debug, Deserialize)]
struct EbayPrice {
    /// The Browse API reports amounts as decimal strings.
    value: String,
    currency: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EbayImage {
    image_url: String,
}

#[async_trait::async_trait]
impl MarketplaceApi for EbayAdapter {
    fn marketplace(&self) -> Marketplace {
        Marketplace::Ebay
    }

    #[instrument(skip(self))]
    async fn search(
        &self,
        query: &str,
        region: Region,
    ) -> std::result::Result<Vec<RawListing>, SourceError> {
        let (client_id, client_secret) = match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => (id.clone(), secret.clone()),
            _ => {
                return Err(SourceError::Unavailable(
                    "eBay API credentials not configured".into(),
                ))
            }
        };

        let token = self.access_token(&client_id, &client_secret).await?;

        let response = self
            .client
            .get(BROWSE_SEARCH_URL)
            .bearer_auth(token)
            .header("X-EBAY-C-MARKETPLACE-ID", Self::marketplace_id(region))
            .query(&[("q", query), ("limit", "20")])
            .send()
            .await?
            .error_for_status()?;

        let parsed: EbaySearchResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Protocol(format!("ebay search response: {e}")))?;

        let listings = parsed
            .item_summaries
            .into_iter()
            .filter_map(|item| {
                let price = item.price?;
                let amount: f64 = match price.value.parse() {
                    Ok(amount) => amount,
                    Err(_) => {
                        debug!(item_id = %item.item_id, value = %price.value, "unparseable price, skipping item");
                        return None;
                    }
                };
                let condition = match item.condition.as_deref() {
                    Some(c) if c.eq_ignore_ascii_case("used") => Condition::Used,
                    _ => Condition::New,
                };
                Some(RawListing {
                    marketplace: Marketplace::Ebay,
                    external_id: item.item_id,
                    title: item.title,
                    price: amount,
                    currency: price.currency,
                    image_url: item.image.map(|i| i.image_url),
                    url: item.item_web_url,
                    rating: None,
                    review_count: None,
                    seller_name: None,
                    seller_rating: None,
                    condition,
                })
            })
            .collect();

        Ok(listings)
    }
}
