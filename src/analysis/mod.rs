mod aggregator;
mod indicators;

pub use aggregator::aggregate;
pub use indicators::{baseline, ema, IndicatorEngine};
