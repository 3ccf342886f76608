//! Result cache
//!
//! Latest result per key, fed from a bridge's result channel. Error results
//! are cached as well so a rejected pair fails fast instead of timing out.

use crate::bridge::{ProviderResult, SubscriptionKey};
use crate::telemetry::{set_gauge, GaugeMetric};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{mpsc, Notify, RwLock};
use tokio::task::JoinHandle;

/// Cache errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("No result for {key} within {timeout:?}")]
    Timeout {
        key: SubscriptionKey,
        timeout: Duration,
    },
}

/// A result with the local time it arrived
#[derive(Debug, Clone, Serialize)]
pub struct CachedResult {
    pub result: ProviderResult,
    pub received_at: DateTime<Utc>,
    #[serde(skip)]
    stored_at: Instant,
}

impl CachedResult {
    fn new(result: ProviderResult) -> Self {
        Self {
            result,
            received_at: Utc::now(),
            stored_at: Instant::now(),
        }
    }

    fn is_fresh(&self, max_age: Duration) -> bool {
        self.stored_at.elapsed() <= max_age
    }
}

/// Latest result per subscription key
pub struct ResultCache {
    entries: RwLock<HashMap<SubscriptionKey, CachedResult>>,
    updated: Notify,
    max_age: Duration,
    provider: &'static str,
}

impl ResultCache {
    /// Create a cache whose entries expire after `max_age`
    pub fn new(max_age: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            updated: Notify::new(),
            max_age,
            provider: "all",
        }
    }

    /// Label the cache's metrics with a provider name
    pub fn provider(mut self, name: &'static str) -> Self {
        self.provider = name;
        self
    }

    /// Store a result, replacing any older one for the same key
    pub async fn insert(&self, result: ProviderResult) {
        let key = result.key().clone();
        let size = {
            let mut entries = self.entries.write().await;
            entries.insert(key, CachedResult::new(result));
            entries.len()
        };
        set_gauge(GaugeMetric::CachedResults, self.provider, size as f64);
        self.updated.notify_waiters();
    }

    /// Latest fresh result for `key`
    pub async fn get(&self, key: &SubscriptionKey) -> Option<CachedResult> {
        self.entries
            .read()
            .await
            .get(key)
            .filter(|entry| entry.is_fresh(self.max_age))
            .cloned()
    }

    /// Number of entries, fresh or not
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Wait until a fresh result for `key` is available
    pub async fn wait_for(
        &self,
        key: &SubscriptionKey,
        timeout: Duration,
    ) -> Result<CachedResult, CacheError> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let notified = self.updated.notified();
            tokio::pin!(notified);
            // Register before checking so an insert in between is not missed
            notified.as_mut().enable();

            if let Some(entry) = self.get(key).await {
                return Ok(entry);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(CacheError::Timeout {
                    key: key.clone(),
                    timeout,
                });
            }
        }
    }

    /// Drain `results` into the cache until the channel closes
    pub fn spawn_ingest(
        self: &Arc<Self>,
        mut results: mpsc::Receiver<ProviderResult>,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(result) = results.recv().await {
                tracing::trace!(key = %result.key(), error = result.is_error(), "Caching result");
                cache.insert(result).await;
            }
            tracing::debug!("Result channel closed, ingest stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{ErrorResult, NormalizedResult};
    use tokio_test::assert_ok;

    fn eth_usd() -> SubscriptionKey {
        SubscriptionKey::new("ETH", "USD")
    }

    fn price(value: f64) -> ProviderResult {
        ProviderResult::Price(NormalizedResult::new(eth_usd(), value).unwrap())
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let cache = ResultCache::new(Duration::from_secs(60));
        assert!(cache.get(&eth_usd()).await.is_none());

        cache.insert(price(1.0)).await;
        cache.insert(price(2.0)).await;

        let entry = cache.get(&eth_usd()).await.unwrap();
        assert_eq!(entry.result, price(2.0));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_stale_entries_are_hidden() {
        let cache = ResultCache::new(Duration::from_millis(20));
        cache.insert(price(1.0)).await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cache.get(&eth_usd()).await.is_none());
        assert!(!cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_wait_for_times_out() {
        let cache = ResultCache::new(Duration::from_secs(60));
        let err = cache
            .wait_for(&eth_usd(), Duration::from_millis(30))
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_wait_for_wakes_on_insert() {
        let cache = Arc::new(ResultCache::new(Duration::from_secs(60)));
        let (tx, rx) = mpsc::channel(4);
        let ingest = cache.spawn_ingest(rx);

        let waiter = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.wait_for(&eth_usd(), Duration::from_secs(5)).await })
        };

        tx.send(price(1595.5)).await.unwrap();
        let entry = assert_ok!(waiter.await.unwrap());
        assert_eq!(entry.result, price(1595.5));

        drop(tx);
        ingest.await.unwrap();
    }

    mod gauge_capture {
        use metrics::{
            Counter, Gauge, GaugeFn, Histogram, Key, KeyName, Metadata, Recorder, SharedString,
            Unit,
        };
        use std::sync::{Arc, Mutex};

        /// Records the last value set on one gauge
        pub struct LastGauge {
            pub name: &'static str,
            pub value: Arc<Mutex<Option<f64>>>,
        }

        struct Slot(Arc<Mutex<Option<f64>>>);

        impl GaugeFn for Slot {
            fn increment(&self, _value: f64) {}
            fn decrement(&self, _value: f64) {}
            fn set(&self, value: f64) {
                *self.0.lock().unwrap() = Some(value);
            }
        }

        impl Recorder for LastGauge {
            fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
            fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
            fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

            fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
                Counter::noop()
            }

            fn register_gauge(&self, key: &Key, _: &Metadata<'_>) -> Gauge {
                if key.name() == self.name {
                    Gauge::from_arc(Arc::new(Slot(Arc::clone(&self.value))))
                } else {
                    Gauge::noop()
                }
            }

            fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
                Histogram::noop()
            }
        }
    }

    #[test]
    fn test_insert_sets_cached_results_gauge() {
        let recorder = gauge_capture::LastGauge {
            name: GaugeMetric::CachedResults.name(),
            value: Default::default(),
        };
        let cache = ResultCache::new(Duration::from_secs(60)).provider("test");

        metrics::with_local_recorder(&recorder, || {
            tokio_test::block_on(async {
                cache.insert(price(1.0)).await;
                cache.insert(price(2.0)).await;
                cache
                    .insert(ProviderResult::Error(ErrorResult::invalid_pair(
                        SubscriptionKey::new("BTC", "XYZ"),
                    )))
                    .await;
            })
        });

        assert_eq!(*recorder.value.lock().unwrap(), Some(2.0));
    }

    #[tokio::test]
    async fn test_error_results_are_cached() {
        let cache = ResultCache::new(Duration::from_secs(60));
        let key = SubscriptionKey::new("ETH", "XYZ");
        cache
            .insert(ProviderResult::Error(ErrorResult::invalid_pair(key.clone())))
            .await;

        let entry = assert_ok!(cache.wait_for(&key, Duration::from_millis(10)).await);
        assert!(entry.result.is_error());
    }
}
