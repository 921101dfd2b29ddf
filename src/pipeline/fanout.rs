use crate::config::SourcesConfig;
use crate::domain::{Marketplace, RawListing, Region};
use crate::pipeline::rate_limiter::SourceLimiter;
use crate::sources::{MarketplaceApi, SourceError};
use metrics::{counter, histogram};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

/// Union of all sources that answered in time, plus the identifiers of those
/// sources. An empty batch is a valid terminal state, not an error.
#[derive(Debug)]
pub struct SearchBatch {
    pub listings: Vec<RawListing>,
    pub covered: Vec<Marketplace>,
    pub elapsed: Duration,
}

/// Issues every adapter call concurrently, each behind its own rate limiter
/// and timeout. One slow or broken source never blocks or fails the batch:
/// its outcome is recorded and the source is simply absent from `covered`.
pub struct FanOutCoordinator {
    adapters: Vec<Arc<dyn MarketplaceApi>>,
    limiters: HashMap<Marketplace, SourceLimiter>,
    per_source_timeout: Duration,
    overall_deadline: Duration,
}

impl FanOutCoordinator {
    pub fn new(
        adapters: Vec<Arc<dyn MarketplaceApi>>,
        sources: &SourcesConfig,
        per_source_timeout: Duration,
        overall_deadline: Duration,
    ) -> Self {
        let limiters = adapters
            .iter()
            .map(|adapter| {
                (
                    adapter.marketplace(),
                    SourceLimiter::new(
                        Duration::from_millis(sources.min_interval_ms),
                        sources.max_concurrent,
                    ),
                )
            })
            .collect();
        Self {
            adapters,
            limiters,
            per_source_timeout,
            overall_deadline,
        }
    }

    #[instrument(skip(self))]
    pub async fn search(&self, query: &str, region: Region) -> SearchBatch {
        let started = Instant::now();
        let deadline = started + self.overall_deadline;

        let mut tasks = JoinSet::new();
        for adapter in &self.adapters {
            let adapter = Arc::clone(adapter);
            let limiter = self.limiters[&adapter.marketplace()].clone();
            let timeout = self.per_source_timeout;
            let query = query.to_string();
            tasks.spawn(async move {
                let marketplace = adapter.marketplace();
                let _permit = limiter.acquire().await;
                let outcome = tokio::time::timeout(timeout, adapter.search(&query, region)).await;
                let result = match outcome {
                    Ok(result) => result,
                    Err(_) => Err(SourceError::Timeout(timeout)),
                };
                (marketplace, result)
            });
        }

        let mut listings = Vec::new();
        let mut covered = Vec::new();
        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((marketplace, Ok(found))))) => {
                    info!(source = %marketplace, count = found.len(), "source responded");
                    counter!("dealscan_source_success_total", "source" => marketplace.as_str())
                        .increment(1);
                    covered.push(marketplace);
                    listings.extend(found);
                }
                Ok(Some(Ok((marketplace, Err(err))))) => {
                    // Contained here; per-source failures never propagate.
                    warn!(source = %marketplace, error = %err, "source excluded from batch");
                    counter!("dealscan_source_failure_total", "source" => marketplace.as_str())
                        .increment(1);
                }
                Ok(Some(Err(join_err))) => {
                    error!(error = %join_err, "source task panicked");
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        pending = tasks.len(),
                        "overall deadline expired, returning completed sources"
                    );
                    counter!("dealscan_fanout_deadline_expired_total").increment(1);
                    tasks.abort_all();
                    break;
                }
            }
        }

        let elapsed = started.elapsed();
        histogram!("dealscan_fanout_duration_seconds").record(elapsed.as_secs_f64());
        SearchBatch {
            listings,
            covered,
            elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Condition;

    struct StaticSource {
        marketplace: Marketplace,
        titles: Vec<&'static str>,
    }

    #[async_trait::async_trait]
    impl MarketplaceApi for StaticSource {
        fn marketplace(&self) -> Marketplace {
            self.marketplace
        }

        async fn search(
            &self,
            _query: &str,
            _region: Region,
        ) -> std::result::Result<Vec<RawListing>, SourceError> {
            Ok(self
                .titles
                .iter()
                .enumerate()
                .map(|(index, title)| RawListing {
                    marketplace: self.marketplace,
                    external_id: format!("{index}"),
                    title: title.to_string(),
                    price: 10.0,
                    currency: "USD".to_string(),
                    image_url: None,
                    url: "https://example.com".to_string(),
                    rating: None,
                    review_count: None,
                    seller_name: None,
                    seller_rating: None,
                    condition: Condition::New,
                })
                .collect())
        }
    }

    struct FailingSource;

    #[async_trait::async_trait]
    impl MarketplaceApi for FailingSource {
        fn marketplace(&self) -> Marketplace {
            Marketplace::Ebay
        }

        async fn search(
            &self,
            _query: &str,
            _region: Region,
        ) -> std::result::Result<Vec<RawListing>, SourceError> {
            Err(SourceError::Unavailable("no credentials".into()))
        }
    }

    struct HangingSource;

    #[async_trait::async_trait]
    impl MarketplaceApi for HangingSource {
        fn marketplace(&self) -> Marketplace {
            Marketplace::Aliexpress
        }

        async fn search(
            &self,
            _query: &str,
            _region: Region,
        ) -> std::result::Result<Vec<RawListing>, SourceError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }
    }

    struct DelayedSource {
        marketplace: Marketplace,
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl MarketplaceApi for DelayedSource {
        fn marketplace(&self) -> Marketplace {
            self.marketplace
        }

        async fn search(
            &self,
            _query: &str,
            _region: Region,
        ) -> std::result::Result<Vec<RawListing>, SourceError> {
            tokio::time::sleep(self.delay).await;
            Ok(vec![RawListing {
                marketplace: self.marketplace,
                external_id: "1".to_string(),
                title: "Widget".to_string(),
                price: 10.0,
                currency: "USD".to_string(),
                image_url: None,
                url: "https://example.com".to_string(),
                rating: None,
                review_count: None,
                seller_name: None,
                seller_rating: None,
                condition: Condition::New,
            }])
        }
    }

    fn coordinator(adapters: Vec<Arc<dyn MarketplaceApi>>) -> FanOutCoordinator {
        let sources = SourcesConfig {
            min_interval_ms: 0,
            max_concurrent: 1,
            use_mock: false,
        };
        FanOutCoordinator::new(
            adapters,
            &sources,
            Duration::from_millis(200),
            Duration::from_millis(500),
        )
    }

    #[tokio::test]
    async fn one_failing_source_does_not_block_the_rest() {
        let coordinator = coordinator(vec![
            Arc::new(StaticSource {
                marketplace: Marketplace::Amazon,
                titles: vec!["Widget A", "Widget B"],
            }),
            Arc::new(FailingSource),
        ]);

        let batch = coordinator.search("widget", Region::Us).await;
        assert_eq!(batch.listings.len(), 2);
        assert_eq!(batch.covered, vec![Marketplace::Amazon]);
    }

    #[tokio::test]
    async fn timed_out_source_is_excluded() {
        let coordinator = coordinator(vec![
            Arc::new(StaticSource {
                marketplace: Marketplace::Amazon,
                titles: vec!["Widget A"],
            }),
            Arc::new(HangingSource),
        ]);

        let batch = coordinator.search("widget", Region::Us).await;
        assert_eq!(batch.covered, vec![Marketplace::Amazon]);
        assert_eq!(batch.listings.len(), 1);
    }

    #[tokio::test]
    async fn zero_successful_sources_is_an_empty_batch_not_an_error() {
        let coordinator = coordinator(vec![Arc::new(FailingSource)]);
        let batch = coordinator.search("widget", Region::Us).await;
        assert!(batch.listings.is_empty());
        assert!(batch.covered.is_empty());
    }

    #[tokio::test]
    async fn expired_deadline_returns_completed_sources_only() {
        // Per-source budget is generous; only the overall deadline can cut
        // the slow source off.
        let sources = SourcesConfig {
            min_interval_ms: 0,
            max_concurrent: 1,
            use_mock: false,
        };
        let coordinator = FanOutCoordinator::new(
            vec![
                Arc::new(DelayedSource {
                    marketplace: Marketplace::Amazon,
                    delay: Duration::from_millis(10),
                }),
                Arc::new(DelayedSource {
                    marketplace: Marketplace::Ebay,
                    delay: Duration::from_millis(400),
                }),
            ],
            &sources,
            Duration::from_millis(2000),
            Duration::from_millis(150),
        );

        let batch = coordinator.search("widget", Region::Us).await;
        assert_eq!(batch.covered, vec![Marketplace::Amazon]);
        assert_eq!(batch.listings.len(), 1);
        assert!(batch.elapsed < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn within_source_order_is_preserved() {
        let coordinator = coordinator(vec![Arc::new(StaticSource {
            marketplace: Marketplace::Amazon,
            titles: vec!["first", "second", "third"],
        })]);

        let batch = coordinator.search("widget", Region::Us).await;
        let titles: Vec<_> = batch.listings.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["first", "second", "third"]);
    }
}
