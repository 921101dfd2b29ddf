use crate::domain::{Condition, Marketplace, RawListing, Region};
use crate::sources::{MarketplaceApi, SourceError};
use rand::Rng;
use tracing::instrument;

/// Synthetic marketplace used when no API credentials are configured, and in
/// tests and demos. Shapes mirror what the real adapters emit: eBay-flavored
/// listings carry seller ratings and used condition, EU-region listings are
/// priced in EUR so currency conversion gets exercised.
pub struct MockMarketplace {
    marketplace: Marketplace,
}

impl MockMarketplace {
    pub fn new(marketplace: Marketplace) -> Self {
        Self { marketplace }
    }

    fn variants(&self) -> &'static [&'static str] {
        match self.marketplace {
            Marketplace::Amazon => &["Pro 256GB", "Max 512GB", "Standard Edition"],
            Marketplace::Ebay => &["(Renewed)", "Open Box", "Bundle with Case"],
            Marketplace::Aliexpress => &["Global Version", "Budget Variant"],
        }
    }

    fn seller(&self, index: usize) -> (&'static str, f64, u32) {
        const SELLERS: [(&str, f64, u32); 4] = [
            ("Prime Electronics", 4.8, 2850),
            ("TechDeals Premium", 4.6, 1920),
            ("GlobalTech Store", 4.2, 640),
            ("Bargain Basement", 3.1, 12),
        ];
        SELLERS[index % SELLERS.len()]
    }
}

#[async_trait::async_trait]
impl MarketplaceApi for MockMarketplace {
    fn marketplace(&self) -> Marketplace {
        self.marketplace
    }

    #[instrument(skip(self))]
    async fn search(
        &self,
        query: &str,
        region: Region,
    ) -> std::result::Result<Vec<RawListing>, SourceError> {
        let mut rng = rand::thread_rng();
        let base_price: f64 = rng.gen_range(80.0..1200.0);
        let currency = if region == Region::Eu && self.marketplace == Marketplace::Ebay {
            "EUR"
        } else {
            "USD"
        };

        let listings = self
            .variants()
            .iter()
            .enumerate()
            .map(|(index, variant)| {
                let (seller, seller_rating, review_count) = self.seller(index);
                let jitter: f64 = rng.gen_range(-0.15..0.25);
                RawListing {
                    marketplace: self.marketplace,
                    external_id: format!("{}-{}-{}", self.marketplace, query.len(), index),
                    title: format!("{query} {variant}"),
                    price: (base_price * (1.0 + jitter)).max(1.0),
                    currency: currency.to_string(),
                    image_url: Some(format!("https://img.example.com/{}/{index}.jpg", self.marketplace)),
                    url: format!("https://{}.example.com/item/{index}", self.marketplace),
                    rating: Some(seller_rating),
                    review_count: Some(review_count),
                    seller_name: Some(seller.to_string()),
                    seller_rating: Some(seller_rating),
                    condition: if *variant == "(Renewed)" {
                        Condition::Used
                    } else {
                        Condition::New
                    },
                }
            })
            .collect();

        Ok(listings)
    }
}
