use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

/// Per-source rate limiter protecting third-party API quotas: enforces a
/// minimum interval between calls to the same marketplace plus a
/// max-in-flight cap (one, by default). This is the only shared mutable
/// state in the pipeline; one limiter is scoped to one source.
#[derive(Clone)]
pub struct SourceLimiter {
    inner: Arc<Inner>,
}

struct Inner {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
    sem: Arc<Semaphore>,
}

/// Held for the duration of the guarded call; dropping it releases the
/// concurrency slot.
pub struct LimiterPermit {
    _permit: OwnedSemaphorePermit,
}

impl SourceLimiter {
    pub fn new(min_interval: Duration, max_concurrent: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                min_interval,
                last_call: Mutex::new(None),
                sem: Arc::new(Semaphore::new(max_concurrent.max(1))),
            }),
        }
    }

    /// Waits for a concurrency slot, then for the inter-call interval to
    /// elapse. The returned permit must be kept alive across the guarded
    /// request.
    pub async fn acquire(&self) -> LimiterPermit {
        let permit = self
            .inner
            .sem
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore closed");

        loop {
            let wait = {
                let mut last_call = self.inner.last_call.lock().await;
                let now = Instant::now();
                match *last_call {
                    Some(last) if now.duration_since(last) < self.inner.min_interval => {
                        self.inner.min_interval - now.duration_since(last)
                    }
                    _ => {
                        *last_call = Some(now);
                        Duration::ZERO
                    }
                }
            };
            if wait.is_zero() {
                break;
            }
            tokio::time::sleep(wait).await;
        }

        LimiterPermit { _permit: permit }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enforces_min_interval_between_calls() {
        let limiter = SourceLimiter::new(Duration::from_millis(50), 1);
        let started = Instant::now();

        let _first = limiter.acquire().await;
        drop(_first);
        let _second = limiter.acquire().await;

        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn concurrency_is_capped_at_one() {
        let limiter = SourceLimiter::new(Duration::ZERO, 1);
        let held = limiter.acquire().await;

        let second = limiter.clone();
        let attempt = tokio::time::timeout(Duration::from_millis(20), second.acquire()).await;
        assert!(attempt.is_err(), "second acquire should block while permit is held");

        drop(held);
        let attempt = tokio::time::timeout(Duration::from_millis(100), limiter.acquire()).await;
        assert!(attempt.is_ok());
    }
}
