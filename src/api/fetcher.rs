use crate::config::BinanceConfig;
use crate::error::{AppError, Result};
use crate::models::Kline;

use super::{KlineSource, RateLimiter};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub quota_cooldown: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &BinanceConfig) -> Self {
        Self {
            max_retries: config.max_retries.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            quota_cooldown: Duration::from_secs(config.quota_cooldown_secs),
        }
    }

    /// 第 `attempt` 次 (从1开始) 失败后的等待时间：线性退避，超限时再加冷却
    pub fn delay_after(&self, attempt: u32, quota_exceeded: bool) -> Duration {
        let backoff = self.backoff_base * attempt;
        if quota_exceeded {
            backoff + self.quota_cooldown
        } else {
            backoff
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&BinanceConfig::default())
    }
}

/// Wraps a [`KlineSource`] with shared pacing and bounded retry.
pub struct RetryingFetcher<S> {
    source: S,
    rate_limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
}

impl<S: KlineSource> RetryingFetcher<S> {
    pub fn new(source: S, rate_limiter: Arc<RateLimiter>, policy: RetryPolicy) -> Self {
        Self {
            source,
            rate_limiter,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub async fn fetch(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Kline>> {
        let max_retries = self.policy.max_retries.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.rate_limiter.wait().await;

            let err = match self.source.fetch_klines(symbol, interval, limit).await {
                Ok(klines) => return Ok(klines),
                Err(e) => e,
            };

            // 最后一次失败直接返回，超限冷却只用于还有下一次尝试的情况
            if attempt >= max_retries {
                return Err(AppError::FetchExhausted {
                    symbol: symbol.to_string(),
                    interval: interval.to_string(),
                    attempts: attempt,
                    source: Box::new(err),
                });
            }

            let quota = err.is_quota_exceeded();
            let delay = self.policy.delay_after(attempt, quota);
            warn!(
                "{} {} attempt {}/{} failed{}: {}; retrying in {:?}",
                symbol,
                interval,
                attempt,
                max_retries,
                if quota { " (quota exceeded)" } else { "" },
                err,
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }
}
