use crate::config::BinanceConfig;
use crate::error::{AppError, Result};
use crate::models::Kline;

use super::KlineSource;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use std::time::Duration;

pub struct BinanceClient {
    client: reqwest::Client,
    config: BinanceConfig,
}

impl BinanceClient {
    pub fn new(config: BinanceConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("confluence/0.1"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// 获取现货K线数据 (单次请求，不重试)
    pub async fn get_klines(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Kline>> {
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.config.base_url.trim_end_matches('/'),
            symbol,
            interval,
            limit
        );

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();

            // 429: 超出权重, 418: 超限后被临时封禁
            if status == 429 || status == 418 {
                return Err(AppError::QuotaExceeded { status, body });
            }

            return Err(AppError::Upstream { status, body });
        }

        let data: Vec<Vec<serde_json::Value>> = response.json().await?;
        data.iter()
            .map(|item| Kline::from_binance_response(item))
            .collect()
    }
}

#[async_trait]
impl KlineSource for BinanceClient {
    async fn fetch_klines(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Kline>> {
        self.get_klines(symbol, interval, limit).await
    }
}
