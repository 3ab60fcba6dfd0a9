use crate::models::{Condition, InstrumentAnalysis};

fn arrow(condition: Condition) -> &'static str {
    match condition {
        Condition::Above => "▲",
        Condition::Below => "▼",
        Condition::None => "•",
    }
}

fn timeframe_lines(analysis: &InstrumentAnalysis) -> String {
    analysis
        .timeframes
        .iter()
        .map(|(label, r)| {
            format!(
                "{:<4} EMA {:.4} {}  Base {:.4} {}",
                label,
                r.trend_value,
                arrow(r.trend_condition),
                r.baseline_value,
                arrow(r.baseline_condition)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// 报警消息 (标记模式，*粗体*)
pub fn format_alert(analysis: &InstrumentAnalysis) -> String {
    // 只在 above_all_both / below_all_both 时发送
    let direction = if analysis.summary.above_all_both {
        "ABOVE"
    } else {
        "BELOW"
    };

    format!(
        "*{}* {} EMA + baseline on all timeframes\nPrice: {:.4}\n{}",
        analysis.symbol,
        direction,
        analysis.current_price,
        timeframe_lines(analysis)
    )
}

/// 按需分析的完整报告
pub fn format_analysis(analysis: &InstrumentAnalysis) -> String {
    let s = &analysis.summary;
    let flag = |b: bool| if b { "yes" } else { "no" };

    format!(
        "*{}* @ {:.4}\n{}\nAbove all: EMA {} / base {} / both {}\nBelow all: EMA {} / base {} / both {}",
        analysis.symbol,
        analysis.current_price,
        timeframe_lines(analysis),
        flag(s.above_all_trend),
        flag(s.above_all_baseline),
        flag(s.above_all_both),
        flag(s.below_all_trend),
        flag(s.below_all_baseline),
        flag(s.below_all_both),
    )
}
