//! Periodic REST polling into the result channel

use super::HttpPriceSource;
use crate::bridge::{ProviderResult, SubscriptionKey};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

/// Polls a fixed set of keys on an interval
pub struct PricePoller {
    source: Arc<dyn HttpPriceSource>,
    keys: Vec<SubscriptionKey>,
    interval: Duration,
    results: mpsc::Sender<ProviderResult>,
}

impl PricePoller {
    pub fn new(
        source: Arc<dyn HttpPriceSource>,
        keys: Vec<SubscriptionKey>,
        interval: Duration,
        results: mpsc::Sender<ProviderResult>,
    ) -> Self {
        Self {
            source,
            keys,
            interval,
            results,
        }
    }

    /// Fetch every key once, delivering what comes back
    ///
    /// Returns false once the result channel is closed.
    pub async fn poll_once(&self) -> bool {
        for key in &self.keys {
            match self.source.fetch(key).await {
                Ok(result) => match self.results.try_send(result) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(
                            provider = self.source.provider(),
                            %key,
                            "Result channel full, dropping result"
                        );
                    }
                    Err(TrySendError::Closed(_)) => return false,
                },
                Err(e) => {
                    tracing::warn!(
                        provider = self.source.provider(),
                        %key,
                        error = %e,
                        "Price request failed"
                    );
                }
            }
        }
        true
    }

    /// Poll until the result channel closes
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.poll_once().await {
                        break;
                    }
                }
                _ = self.results.closed() => break,
            }
        }
        tracing::info!(
            provider = self.source.provider(),
            "Result channel closed, poller stopped"
        );
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{ErrorResult, NormalizedResult};
    use crate::rest::RestError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HttpPriceSource for FixedSource {
        fn provider(&self) -> &'static str {
            "fixed"
        }

        async fn fetch(&self, key: &SubscriptionKey) -> Result<ProviderResult, RestError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match key.quote() {
                "USD" => Ok(ProviderResult::Price(
                    NormalizedResult::new(key.clone(), 10.0).unwrap(),
                )),
                "XYZ" => Ok(ProviderResult::Error(ErrorResult::invalid_pair(key.clone()))),
                _ => Err(RestError::UnexpectedResponse("boom".into())),
            }
        }
    }

    #[tokio::test]
    async fn test_poll_once_delivers_results_and_skips_failures() {
        let source = Arc::new(FixedSource {
            calls: AtomicUsize::new(0),
        });
        let (tx, mut rx) = mpsc::channel(8);
        let poller = PricePoller::new(
            source.clone(),
            vec![
                SubscriptionKey::new("ETH", "USD"),
                SubscriptionKey::new("ETH", "EUR"),
                SubscriptionKey::new("ETH", "XYZ"),
            ],
            Duration::from_secs(60),
            tx,
        );

        assert!(poller.poll_once().await);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);

        assert!(!rx.recv().await.unwrap().is_error());
        assert!(rx.recv().await.unwrap().is_error());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_run_stops_when_channel_closes() {
        let source = Arc::new(FixedSource {
            calls: AtomicUsize::new(0),
        });
        let (tx, rx) = mpsc::channel(8);
        drop(rx);

        let handle = PricePoller::new(
            source,
            vec![SubscriptionKey::new("ETH", "USD")],
            Duration::from_millis(10),
            tx,
        )
        .spawn();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_stops_between_ticks_when_receiver_dropped() {
        let source = Arc::new(FixedSource {
            calls: AtomicUsize::new(0),
        });
        let (tx, mut rx) = mpsc::channel(8);

        let handle = PricePoller::new(
            source.clone(),
            vec![SubscriptionKey::new("ETH", "USD")],
            Duration::from_secs(3600),
            tx,
        )
        .spawn();

        // First tick fires immediately; the next one is an hour away
        assert!(rx.recv().await.is_some());
        drop(rx);

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("poller kept waiting for the next tick")
            .unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }
}
