use crate::analysis::{aggregate, IndicatorEngine};
use crate::api::{KlineSource, RateLimiter, RetryingFetcher};
use crate::config::{SchedulerConfig, Settings};
use crate::error::{AppError, Result};
use crate::models::InstrumentAnalysis;
use crate::notification::{format_alert, FormatMode, Notifier};
use crate::state::{AlertDeduplicator, Subscribers};

use chrono::Utc;
use futures::future::try_join_all;
use indexmap::IndexMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// 距离下一轮扫描还需等待的时间；扫描超时则立即开始下一轮
pub fn next_wait(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

#[derive(Debug, Default)]
pub struct SweepReport {
    pub analyses: Vec<InstrumentAnalysis>,
    /// (symbol, error message)
    pub skipped: Vec<(String, String)>,
    /// 本轮触发报警的交易对数量
    pub alerts: usize,
}

pub struct Scheduler<S> {
    fetcher: RetryingFetcher<S>,
    engine: IndicatorEngine,
    notifier: Arc<dyn Notifier>,
    dedup: Arc<AlertDeduplicator>,
    subscribers: Arc<Subscribers>,
    symbols: Vec<String>,
    timeframes: Vec<String>,
    kline_limit: u32,
    config: SchedulerConfig,
    last_sweep_start: Mutex<Option<Instant>>,
    last_force_check: Mutex<Option<Instant>>,
}

impl<S: KlineSource> Scheduler<S> {
    pub fn new(
        fetcher: RetryingFetcher<S>,
        engine: IndicatorEngine,
        notifier: Arc<dyn Notifier>,
        dedup: Arc<AlertDeduplicator>,
        subscribers: Arc<Subscribers>,
        settings: &Settings,
    ) -> Self {
        Self {
            fetcher,
            engine,
            notifier,
            dedup,
            subscribers,
            symbols: settings.universe.symbols.clone(),
            timeframes: settings.analysis.timeframes.clone(),
            kline_limit: settings.binance.kline_limit,
            config: settings.scheduler.clone(),
            last_sweep_start: Mutex::new(None),
            last_force_check: Mutex::new(None),
        }
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn fetcher(&self) -> &RetryingFetcher<S> {
        &self.fetcher
    }

    pub async fn last_sweep_start(&self) -> Option<Instant> {
        *self.last_sweep_start.lock().await
    }

    /// Runs sweeps forever, one per interval. The interval is measured from
    /// the start of the previous sweep, so sweep duration does not accumulate.
    pub async fn run(&self) {
        let interval = self.config.interval();

        if !self.config.run_on_startup {
            *self.last_sweep_start.lock().await = Some(Instant::now());
        }

        loop {
            if let Some(start) = self.last_sweep_start().await {
                let wait = next_wait(interval, start.elapsed());
                if wait.is_zero() {
                    warn!("Previous sweep overran the {:?} interval, starting immediately", interval);
                } else {
                    info!("Next sweep in {}s", wait.as_secs());
                    tokio::time::sleep(wait).await;
                }
            }

            *self.last_sweep_start.lock().await = Some(Instant::now());
            let report = self.run_sweep().await;
            info!(
                "Sweep completed: {} analyzed, {} skipped, {} alerts",
                report.analyses.len(),
                report.skipped.len(),
                report.alerts
            );
        }
    }

    /// 手动触发扫描；全进程共用一个冷却时间
    pub async fn force_check(&self) -> Result<SweepReport> {
        let cooldown = self.config.force_check_cooldown();
        {
            let mut last = self.last_force_check.lock().await;
            if let Some(prev) = *last {
                let elapsed = prev.elapsed();
                if elapsed < cooldown {
                    let remaining = cooldown - elapsed;
                    return Err(AppError::ForceCheckCooldown {
                        remaining_secs: remaining.as_secs().max(1),
                    });
                }
            }
            *last = Some(Instant::now());
        }

        info!("Forced sweep requested");
        Ok(self.run_sweep().await)
    }

    /// One pass over the universe in batches. Failures are logged per
    /// instrument and never abort the sweep.
    pub async fn run_sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let batch_size = self.config.batch_size.max(1);
        let batches: Vec<&[String]> = self.symbols.chunks(batch_size).collect();
        let total = batches.len();

        info!(
            "Starting sweep: {} symbols in {} batches of {}",
            self.symbols.len(),
            total,
            batch_size
        );

        for (index, batch) in batches.into_iter().enumerate() {
            for (pos, symbol) in batch.iter().enumerate() {
                match self.analyze_coin(symbol).await {
                    Ok(analysis) => {
                        if self.dedup.should_alert(symbol, &analysis).await
                            && analysis.summary.is_aligned()
                        {
                            self.dispatch(&analysis).await;
                            report.alerts += 1;
                        }
                        report.analyses.push(analysis);
                    }
                    Err(e) => {
                        warn!("Failed to analyze {}: {}", symbol, e);
                        report.skipped.push((symbol.clone(), e.to_string()));
                    }
                }

                let delay = self.config.instrument_delay();
                if !delay.is_zero() && pos + 1 < batch.len() {
                    tokio::time::sleep(delay).await;
                }
            }

            info!(
                "Batch {}/{} done: {} analyzed, {} skipped",
                index + 1,
                total,
                report.analyses.len(),
                report.skipped.len()
            );

            if index + 1 < total {
                tokio::time::sleep(self.config.batch_delay()).await;
            }
        }

        report
    }

    /// 单个交易对：并发获取各周期K线 → 指标 → 汇总。不影响去重状态
    pub async fn analyze_coin(&self, symbol: &str) -> Result<InstrumentAnalysis> {
        let results = try_join_all(self.timeframes.iter().map(|interval| async move {
            let klines = self.fetcher.fetch(symbol, interval, self.kline_limit).await?;
            let result = self.engine.calculate(&klines)?;
            let price = klines.last().map(|k| k.close).unwrap_or_default();
            Ok::<_, AppError>((interval.clone(), result, price))
        }))
        .await?;

        let current_price = results.first().map(|(_, _, p)| *p).unwrap_or_default();
        let timeframes: IndexMap<_, _> = results
            .into_iter()
            .map(|(interval, result, _)| (interval, result))
            .collect();

        Ok(aggregate(symbol, current_price, timeframes))
    }

    pub async fn analyze_many(&self, symbols: &[String]) -> Vec<(String, Result<InstrumentAnalysis>)> {
        let mut out = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            out.push((symbol.clone(), self.analyze_coin(symbol).await));
        }
        out
    }

    fn rate_limiter(&self) -> &RateLimiter {
        self.fetcher.rate_limiter()
    }

    async fn dispatch(&self, analysis: &InstrumentAnalysis) {
        let body = format_alert(analysis);
        let recipients = self.subscribers.active_ids().await;
        info!(
            "ALERT: {} aligned across all timeframes, notifying {} subscribers",
            analysis.symbol,
            recipients.len()
        );

        for chat_id in recipients {
            self.rate_limiter().wait().await;
            match self.notifier.send_text(&chat_id, &body, FormatMode::Markup).await {
                Ok(_) => self.subscribers.record_alert(&chat_id, Utc::now()).await,
                Err(e) => error!("Failed to notify {}: {}", chat_id, e),
            }
        }
    }
}
