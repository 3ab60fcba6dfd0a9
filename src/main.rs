use confluence::analysis::IndicatorEngine;
use confluence::api::{BinanceClient, RateLimiter, RetryPolicy, RetryingFetcher};
use confluence::config::Settings;
use confluence::notification::{EmailNotifier, LogNotifier, Notifier};
use confluence::scheduler::Scheduler;
use confluence::state::{AlertDeduplicator, Subscribers};

use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("confluence=info".parse()?),
        )
        .init();

    info!("Confluence starting - multi-timeframe EMA + baseline alignment alerts");

    let settings = Settings::load()?;
    info!(
        "Configuration loaded: {} symbols, timeframes {:?}, every {} minutes",
        settings.universe.symbols.len(),
        settings.analysis.timeframes,
        settings.scheduler.interval_minutes
    );

    let rate_limiter = Arc::new(RateLimiter::new(
        settings.binance.weight_per_minute,
        settings.binance.safety_factor,
    ));
    info!("Request spacing: {:?}", rate_limiter.min_spacing());

    let fetcher = RetryingFetcher::new(
        BinanceClient::new(settings.binance.clone())?,
        rate_limiter,
        RetryPolicy::from_config(&settings.binance),
    );

    let notifier: Arc<dyn Notifier> = match settings.email.clone() {
        Some(email) => Arc::new(EmailNotifier::new(email)?),
        None => {
            warn!("EMAIL_USERNAME not set, alerts will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let subscribers = Arc::new(Subscribers::with_active(
        settings.notification.subscribers.iter().cloned(),
    ));

    let scheduler = Scheduler::new(
        fetcher,
        IndicatorEngine::from_config(&settings.analysis),
        notifier,
        Arc::new(AlertDeduplicator::new()),
        subscribers,
        &settings,
    );

    tokio::select! {
        _ = scheduler.run() => {}
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
    }

    Ok(())
}
