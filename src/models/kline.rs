use crate::error::{AppError, Result};
use serde_json::Value;

/// K线字段数量 (Binance /klines 定长数组)
const KLINE_FIELDS: usize = 12;

#[derive(Debug, Clone, PartialEq)]
pub struct Kline {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub close_time: i64,
    pub quote_volume: f64,
    pub trades: u64,
    pub taker_buy_base_volume: f64,
    pub taker_buy_quote_volume: f64,
}

impl Kline {
    pub fn from_binance_response(data: &[Value]) -> Result<Self> {
        if data.len() < KLINE_FIELDS {
            return Err(AppError::InvalidKline(format!(
                "expected {} fields, got {}",
                KLINE_FIELDS,
                data.len()
            )));
        }

        let parse_f64 = |name: &str, v: &Value| -> Result<f64> {
            v.as_str()
                .ok_or_else(|| AppError::InvalidKline(format!("{name}: expected string")))?
                .parse()
                .map_err(|_| AppError::InvalidKline(format!("{name}: failed to parse float")))
        };
        let parse_i64 = |name: &str, v: &Value| -> Result<i64> {
            v.as_i64()
                .ok_or_else(|| AppError::InvalidKline(format!("{name}: expected integer")))
        };

        Ok(Kline {
            open_time: parse_i64("open_time", &data[0])?,
            open: parse_f64("open", &data[1])?,
            high: parse_f64("high", &data[2])?,
            low: parse_f64("low", &data[3])?,
            close: parse_f64("close", &data[4])?,
            volume: parse_f64("volume", &data[5])?,
            close_time: parse_i64("close_time", &data[6])?,
            quote_volume: parse_f64("quote_volume", &data[7])?,
            trades: data[8]
                .as_u64()
                .ok_or_else(|| AppError::InvalidKline("trades: expected integer".to_string()))?,
            taker_buy_base_volume: parse_f64("taker_buy_base_volume", &data[9])?,
            taker_buy_quote_volume: parse_f64("taker_buy_quote_volume", &data[10])?,
        })
    }
}
