mod analysis;
mod kline;

pub use analysis::{AlertState, Condition, InstrumentAnalysis, Summary, TimeframeResult};
pub use kline::Kline;
