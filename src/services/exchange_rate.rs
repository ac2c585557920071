//! UGX/USDT exchange rates (read-only collaborator)
//!
//! Rates are display data fetched from an upstream source with a short
//! in-process cache; when the upstream is unreachable the last known or
//! configured fallback rates are served instead of an error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;

/// UGX per 1 USDT.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsdtRates {
    pub buy: f64,
    pub sell: f64,
}

#[async_trait]
pub trait RateProvider: Send + Sync {
    async fn fetch_rates(&self) -> anyhow::Result<UsdtRates>;
    fn name(&self) -> &'static str;
}

/// Fixed rates, used as the fallback and in tests.
#[derive(Debug, Clone)]
pub struct FixedRateProvider {
    pub rates: UsdtRates,
}

impl Default for FixedRateProvider {
    fn default() -> Self {
        Self {
            rates: UsdtRates {
                buy: 3700.0,
                sell: 3650.0,
            },
        }
    }
}

#[async_trait]
impl RateProvider for FixedRateProvider {
    async fn fetch_rates(&self) -> anyhow::Result<UsdtRates> {
        Ok(self.rates)
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

/// Fetches `{buy, sell}` from an upstream JSON endpoint.
pub struct HttpRateProvider {
    client: reqwest::Client,
    url: String,
}

impl HttpRateProvider {
    pub fn new(url: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl RateProvider for HttpRateProvider {
    async fn fetch_rates(&self) -> anyhow::Result<UsdtRates> {
        let response = self.client.get(&self.url).send().await?;
        let rates = response.error_for_status()?.json::<UsdtRates>().await?;
        Ok(rates)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

pub struct ExchangeRateService {
    provider: Arc<dyn RateProvider>,
    fallback: UsdtRates,
    cache_ttl: Duration,
    cached: Mutex<Option<(UsdtRates, Instant)>>,
}

impl ExchangeRateService {
    pub fn new(provider: Arc<dyn RateProvider>, cache_ttl: Duration) -> Self {
        Self {
            provider,
            fallback: FixedRateProvider::default().rates,
            cache_ttl,
            cached: Mutex::new(None),
        }
    }

    pub fn with_fallback(mut self, fallback: UsdtRates) -> Self {
        self.fallback = fallback;
        self
    }

    pub async fn current_rates(&self) -> UsdtRates {
        let mut cached = self.cached.lock().await;
        if let Some((rates, fetched_at)) = *cached {
            if fetched_at.elapsed() < self.cache_ttl {
                return rates;
            }
        }

        match self.provider.fetch_rates().await {
            Ok(rates) => {
                *cached = Some((rates, Instant::now()));
                rates
            }
            Err(e) => {
                warn!(provider = self.provider.name(), error = %e, "rate fetch failed");
                // Serve the stale value if we ever had one.
                cached
                    .as_ref()
                    .map(|(rates, _)| *rates)
                    .unwrap_or(self.fallback)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl RateProvider for CountingProvider {
        async fn fetch_rates(&self) -> anyhow::Result<UsdtRates> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("upstream down");
            }
            Ok(UsdtRates {
                buy: 3800.0,
                sell: 3750.0,
            })
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    #[tokio::test]
    async fn rates_are_cached_within_the_ttl() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let service = ExchangeRateService::new(
            Arc::clone(&provider) as Arc<dyn RateProvider>,
            Duration::from_secs(60),
        );

        let first = service.current_rates().await;
        let second = service.current_rates().await;
        assert_eq!(first, second);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn provider_failure_falls_back_to_configured_rates() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let service = ExchangeRateService::new(
            Arc::clone(&provider) as Arc<dyn RateProvider>,
            Duration::from_secs(60),
        );

        let rates = service.current_rates().await;
        assert_eq!(rates, FixedRateProvider::default().rates);
    }
}
