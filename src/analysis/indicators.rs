use crate::config::AnalysisConfig;
use crate::error::{AppError, Result};
use crate::models::{Condition, Kline, TimeframeResult};

pub struct IndicatorEngine {
    ema_period: usize,
    baseline_period: usize,
    buffer_ratio: f64,
}

impl IndicatorEngine {
    pub fn new(ema_period: usize, baseline_period: usize, buffer_ratio: f64) -> Self {
        Self {
            ema_period,
            baseline_period,
            buffer_ratio,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.ema_period, config.baseline_period, config.buffer_ratio)
    }

    /// 最少需要的K线数量
    pub fn required_len(&self) -> usize {
        self.ema_period.max(self.baseline_period)
    }

    pub fn calculate(&self, klines: &[Kline]) -> Result<TimeframeResult> {
        if klines.len() < self.required_len() {
            return Err(AppError::InsufficientData {
                required: self.required_len(),
                actual: klines.len(),
            });
        }

        let closes: Vec<f64> = klines.iter().map(|k| k.close).collect();
        let trend_value = ema(&closes, self.ema_period).ok_or(AppError::InsufficientData {
            required: self.ema_period,
            actual: closes.len(),
        })?;
        let baseline_value =
            baseline(klines, self.baseline_period).ok_or(AppError::InsufficientData {
                required: self.baseline_period,
                actual: klines.len(),
            })?;

        let price = closes[closes.len() - 1];
        let buffer = price * self.buffer_ratio;

        Ok(TimeframeResult {
            trend_value,
            baseline_value,
            trend_condition: Condition::classify(price, trend_value, buffer),
            baseline_condition: Condition::classify(price, baseline_value, buffer),
        })
    }
}

/// Latest EMA value, seeded with the SMA of the first `period` samples.
pub fn ema(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    Some(
        values[period..]
            .iter()
            .fold(seed, |prev, &v| (v - prev) * multiplier + prev),
    )
}

/// 基准线: 最近 `period` 根K线 (最高价 + 最低价) / 2
pub fn baseline(klines: &[Kline], period: usize) -> Option<f64> {
    if period == 0 || klines.len() < period {
        return None;
    }

    let window = &klines[klines.len() - period..];
    let highest = window.iter().map(|k| k.high).fold(f64::MIN, f64::max);
    let lowest = window.iter().map(|k| k.low).fold(f64::MAX, f64::min);

    Some((highest + lowest) / 2.0)
}
