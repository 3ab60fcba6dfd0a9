mod binance;
mod fetcher;
mod rate_limiter;

pub use binance::BinanceClient;
pub use fetcher::{RetryPolicy, RetryingFetcher};
pub use rate_limiter::{min_spacing, RateLimiter};

use crate::error::Result;
use crate::models::Kline;
use async_trait::async_trait;

/// K线数据源；生产环境为 [`BinanceClient`]
#[async_trait]
pub trait KlineSource: Send + Sync {
    async fn fetch_klines(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Kline>>;
}
