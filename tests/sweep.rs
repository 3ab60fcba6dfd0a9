use async_trait::async_trait;
use confluence::analysis::IndicatorEngine;
use confluence::api::{KlineSource, RateLimiter, RetryPolicy, RetryingFetcher};
use confluence::config::Settings;
use confluence::error::{AppError, Result};
use confluence::models::{Condition, Kline};
use confluence::notification::{FormatMode, Notifier};
use confluence::scheduler::Scheduler;
use confluence::state::{AlertDeduplicator, Subscribers};

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn kline(close: f64) -> Kline {
    Kline {
        open_time: 0,
        open: close,
        high: close,
        low: close,
        close,
        volume: 1.0,
        close_time: 0,
        quote_volume: close,
        trades: 1,
        taker_buy_base_volume: 0.5,
        taker_buy_quote_volume: close / 2.0,
    }
}

fn rising(len: usize) -> Vec<Kline> {
    (1..=len).map(|i| kline(100.0 + i as f64)).collect()
}

/// 上涨K线 (`flat` 时为横盘)；`failing` 中的交易对总是失败，前 `flaky` 次请求失败
struct FakeSource {
    calls: AtomicU32,
    failing: HashSet<String>,
    flaky: u32,
    flat: AtomicBool,
}

impl FakeSource {
    fn new() -> Self {
        Self {
            calls: AtomicU32::new(0),
            failing: HashSet::new(),
            flaky: 0,
            flat: AtomicBool::new(false),
        }
    }

    fn failing(symbol: &str) -> Self {
        Self {
            failing: [symbol.to_string()].into_iter().collect(),
            ..Self::new()
        }
    }

    fn flaky(failures: u32) -> Self {
        Self {
            flaky: failures,
            ..Self::new()
        }
    }
}

#[async_trait]
impl KlineSource for FakeSource {
    async fn fetch_klines(&self, symbol: &str, _interval: &str, limit: u32) -> Result<Vec<Kline>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing.contains(symbol) || n <= self.flaky {
            return Err(AppError::Upstream {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        if self.flat.load(Ordering::SeqCst) {
            return Ok(vec![kline(100.0); limit as usize]);
        }
        Ok(rising(limit as usize))
    }
}

/// 记录成功发送的消息；`reject` 中的 chat id 发送失败
#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    reject: HashSet<String>,
}

impl RecordingNotifier {
    fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_text(&self, chat_id: &str, body: &str, _mode: FormatMode) -> Result<String> {
        if self.reject.contains(chat_id) {
            return Err(AppError::Notification(format!("{chat_id} unreachable")));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((chat_id.to_string(), body.to_string()));
        Ok(sent.len().to_string())
    }

    async fn edit_text(&self, _chat_id: &str, _message_id: &str, _body: &str) -> Result<()> {
        Ok(())
    }
}

fn settings(symbols: &[&str], timeframes: &[&str]) -> Settings {
    let mut settings = Settings::default();
    settings.universe.symbols = symbols.iter().map(|s| s.to_string()).collect();
    settings.analysis.timeframes = timeframes.iter().map(|s| s.to_string()).collect();
    settings.scheduler.batch_size = 5;
    settings.scheduler.batch_delay_ms = 2000;
    settings
}

fn fetcher(source: FakeSource, max_retries: u32) -> RetryingFetcher<FakeSource> {
    RetryingFetcher::new(
        source,
        Arc::new(RateLimiter::with_spacing(Duration::ZERO)),
        RetryPolicy {
            max_retries,
            backoff_base: Duration::from_millis(1000),
            quota_cooldown: Duration::from_secs(5),
        },
    )
}

struct Harness {
    scheduler: Scheduler<FakeSource>,
    notifier: Arc<RecordingNotifier>,
    subscribers: Arc<Subscribers>,
}

fn harness(source: FakeSource, settings: &Settings, subscribers: &[&str]) -> Harness {
    harness_with(source, settings, subscribers, RecordingNotifier::default())
}

fn harness_with(
    source: FakeSource,
    settings: &Settings,
    subscribers: &[&str],
    notifier: RecordingNotifier,
) -> Harness {
    let notifier = Arc::new(notifier);
    let subscribers = Arc::new(Subscribers::with_active(subscribers.iter().copied()));
    let scheduler = Scheduler::new(
        fetcher(source, 3),
        IndicatorEngine::from_config(&settings.analysis),
        notifier.clone(),
        Arc::new(AlertDeduplicator::new()),
        subscribers.clone(),
        settings,
    );

    Harness {
        scheduler,
        notifier,
        subscribers,
    }
}

#[tokio::test(start_paused = true)]
async fn rising_market_alerts_once() {
    let settings = settings(&["BTCUSDT"], &["1h"]);
    let h = harness(FakeSource::new(), &settings, &["chat-1"]);

    let first = h.scheduler.run_sweep().await;

    assert_eq!(first.analyses.len(), 1);
    let analysis = &first.analyses[0];
    let frame = &analysis.timeframes["1h"];
    assert_eq!(frame.trend_condition, Condition::Above);
    assert_eq!(frame.baseline_condition, Condition::Above);
    assert!(analysis.summary.above_all_both);
    assert!(!analysis.summary.below_all_both);
    assert_eq!(first.alerts, 1);
    assert_eq!(h.notifier.count(), 1);

    let second = h.scheduler.run_sweep().await;
    assert_eq!(second.alerts, 0);
    assert_eq!(h.notifier.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn alert_goes_only_to_active_subscribers() {
    let settings = settings(&["BTCUSDT"], &["1h", "4h"]);
    let h = harness(FakeSource::new(), &settings, &["chat-1", "chat-2"]);
    h.subscribers.toggle("chat-2").await;

    h.scheduler.run_sweep().await;

    let sent = h.notifier.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "chat-1");
    assert!(sent[0].1.contains("BTCUSDT"));

    let active = h.subscribers.status("chat-1").await.unwrap();
    assert!(active.last_alert.is_some());
    let inactive = h.subscribers.status("chat-2").await.unwrap();
    assert!(inactive.last_alert.is_none());
}

#[tokio::test(start_paused = true)]
async fn failed_delivery_does_not_block_other_subscribers() {
    let settings = settings(&["BTCUSDT", "ETHUSDT"], &["1h"]);
    let notifier = RecordingNotifier {
        reject: ["chat-a".to_string()].into_iter().collect(),
        ..RecordingNotifier::default()
    };
    let h = harness_with(FakeSource::new(), &settings, &["chat-a", "chat-b"], notifier);

    let report = h.scheduler.run_sweep().await;

    assert_eq!(report.alerts, 2);
    let delivered: Vec<String> = h
        .notifier
        .sent
        .lock()
        .unwrap()
        .iter()
        .map(|(chat_id, _)| chat_id.clone())
        .collect();
    assert_eq!(delivered, vec!["chat-b", "chat-b"]);

    assert!(h.subscribers.status("chat-a").await.unwrap().last_alert.is_none());
    assert!(h.subscribers.status("chat-b").await.unwrap().last_alert.is_some());
}

#[tokio::test(start_paused = true)]
async fn re_entering_alignment_alerts_again() {
    let settings = settings(&["BTCUSDT"], &["1h"]);
    let h = harness(FakeSource::new(), &settings, &["chat-1"]);
    let mut alerts = Vec::new();

    alerts.push(h.scheduler.run_sweep().await.alerts);

    // 横盘: 不再全周期一致，状态回到中性但不发送
    h.scheduler.fetcher().source().flat.store(true, Ordering::SeqCst);
    let neutral = h.scheduler.run_sweep().await;
    assert!(!neutral.analyses[0].summary.is_aligned());
    alerts.push(neutral.alerts);

    h.scheduler.fetcher().source().flat.store(false, Ordering::SeqCst);
    alerts.push(h.scheduler.run_sweep().await.alerts);

    assert_eq!(alerts, vec![1, 0, 1]);
    assert_eq!(h.notifier.count(), 2);
}

#[tokio::test(start_paused = true)]
async fn fetch_recovers_after_two_failures() {
    let fetcher = fetcher(FakeSource::flaky(2), 3);

    let klines = fetcher.fetch("BTCUSDT", "1h", 200).await.unwrap();

    assert_eq!(klines.len(), 200);
    assert_eq!(fetcher.source().calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn failing_instrument_is_skipped() {
    let settings = settings(&["AUSDT", "BUSDT", "CUSDT", "DUSDT", "EUSDT"], &["1h"]);
    let h = harness(FakeSource::failing("CUSDT"), &settings, &[]);

    let report = h.scheduler.run_sweep().await;

    assert_eq!(report.analyses.len(), 4);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].0, "CUSDT");
    assert!(report.skipped[0].1.contains("giving up after 3 attempts"));
    let symbols: Vec<&str> = report.analyses.iter().map(|a| a.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["AUSDT", "BUSDT", "DUSDT", "EUSDT"]);
}

#[tokio::test(start_paused = true)]
async fn batches_are_separated_by_delay() {
    let mut settings = settings(&["AUSDT", "BUSDT", "CUSDT"], &["1h"]);
    settings.scheduler.batch_size = 1;
    let h = harness(FakeSource::new(), &settings, &[]);

    let start = tokio::time::Instant::now();
    let report = h.scheduler.run_sweep().await;

    assert_eq!(report.analyses.len(), 3);
    // 三个批次之间两次暂停，最后一批之后不等待
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(4000));
    assert!(elapsed < Duration::from_millis(6000));
}

#[tokio::test(start_paused = true)]
async fn run_sweeps_once_per_interval() {
    let mut settings = settings(&["BTCUSDT"], &["1h"]);
    settings.scheduler.interval_minutes = 60;
    let h = harness(FakeSource::new(), &settings, &[]);

    let window = Duration::from_secs(3 * 3600 + 60);
    let _ = tokio::time::timeout(window, h.scheduler.run()).await;

    // t = 0, 1h, 2h, 3h
    let calls = h.scheduler_calls();
    assert_eq!(calls, 4);
}

#[tokio::test(start_paused = true)]
async fn force_check_is_rate_limited() {
    let settings = settings(&["BTCUSDT"], &["1h"]);
    let h = harness(FakeSource::new(), &settings, &[]);

    assert!(h.scheduler.force_check().await.is_ok());

    let err = h.scheduler.force_check().await.unwrap_err();
    assert!(matches!(err, AppError::ForceCheckCooldown { .. }));

    tokio::time::advance(Duration::from_secs(15 * 60)).await;
    assert!(h.scheduler.force_check().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn analyze_many_reports_per_symbol() {
    let settings = settings(&["BTCUSDT"], &["1h"]);
    let h = harness(FakeSource::failing("BADUSDT"), &settings, &["chat-1"]);

    let results = h
        .scheduler
        .analyze_many(&["BTCUSDT".to_string(), "BADUSDT".to_string()])
        .await;

    assert!(results[0].1.is_ok());
    assert!(results[1].1.as_ref().unwrap_err().to_string().contains("503"));
    // 按需分析不触发报警
    assert_eq!(h.notifier.count(), 0);
}

impl Harness {
    fn scheduler_calls(&self) -> u32 {
        self.scheduler.fetcher().source().calls.load(Ordering::SeqCst)
    }
}
