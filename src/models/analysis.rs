use indexmap::IndexMap;
use std::fmt;

/// 价格相对参考线的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    Above,
    Below,
    None,
}

impl Condition {
    /// `buffer` 之内视为无方向
    pub fn classify(price: f64, value: f64, buffer: f64) -> Self {
        if price > value + buffer {
            Condition::Above
        } else if price < value - buffer {
            Condition::Below
        } else {
            Condition::None
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Condition::Above => "above",
            Condition::Below => "below",
            Condition::None => "none",
        };
        f.write_str(label)
    }
}

/// 单个时间周期的指标结果
#[derive(Debug, Clone, PartialEq)]
pub struct TimeframeResult {
    pub trend_value: f64,
    pub baseline_value: f64,
    pub trend_condition: Condition,
    pub baseline_condition: Condition,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub below_all_trend: bool,
    pub below_all_baseline: bool,
    pub below_all_both: bool,
    pub above_all_trend: bool,
    pub above_all_baseline: bool,
    pub above_all_both: bool,
}

impl Summary {
    pub fn alert_state(&self) -> AlertState {
        AlertState {
            above_all_both: self.above_all_both,
            below_all_both: self.below_all_both,
        }
    }

    pub fn is_aligned(&self) -> bool {
        self.above_all_both || self.below_all_both
    }
}

#[derive(Debug, Clone)]
pub struct InstrumentAnalysis {
    pub symbol: String,
    pub current_price: f64,
    pub timeframes: IndexMap<String, TimeframeResult>,
    pub summary: Summary,
}

/// 去重用的最近一次状态，两个字段总是一起替换
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertState {
    pub above_all_both: bool,
    pub below_all_both: bool,
}
