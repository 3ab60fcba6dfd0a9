use crate::models::{Condition, InstrumentAnalysis, Summary, TimeframeResult};
use indexmap::IndexMap;

/// 汇总所有时间周期: 全部在上方 / 全部在下方
pub fn aggregate(
    symbol: &str,
    current_price: f64,
    timeframes: IndexMap<String, TimeframeResult>,
) -> InstrumentAnalysis {
    debug_assert!(!timeframes.is_empty(), "aggregate needs at least one timeframe");

    let all = |pred: fn(&TimeframeResult) -> bool| timeframes.values().all(pred);

    let summary = Summary {
        below_all_trend: all(|r| r.trend_condition == Condition::Below),
        below_all_baseline: all(|r| r.baseline_condition == Condition::Below),
        below_all_both: all(|r| {
            r.trend_condition == Condition::Below && r.baseline_condition == Condition::Below
        }),
        above_all_trend: all(|r| r.trend_condition == Condition::Above),
        above_all_baseline: all(|r| r.baseline_condition == Condition::Above),
        above_all_both: all(|r| {
            r.trend_condition == Condition::Above && r.baseline_condition == Condition::Above
        }),
    };

    InstrumentAnalysis {
        symbol: symbol.to_string(),
        current_price,
        timeframes,
        summary,
    }
}
