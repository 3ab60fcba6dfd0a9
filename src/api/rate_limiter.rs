use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovRateLimiter,
};
use nonzero_ext::nonzero;
use std::time::Duration;

/// 共享的请求节流器：每次请求之间至少间隔 `min_spacing`
pub struct RateLimiter {
    limiter: GovRateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    min_spacing: Duration,
}

impl RateLimiter {
    /// spacing = 60_000ms * safety_factor / weight_per_minute
    pub fn new(weight_per_minute: u32, safety_factor: f64) -> Self {
        Self::with_spacing(min_spacing(weight_per_minute, safety_factor))
    }

    pub fn with_spacing(min_spacing: Duration) -> Self {
        let period = min_spacing.max(Duration::from_nanos(1));
        // with_period only rejects a zero period
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(nonzero!(1_000_000u32)))
            .allow_burst(nonzero!(1u32));

        Self {
            limiter: GovRateLimiter::direct(quota),
            min_spacing,
        }
    }

    pub fn min_spacing(&self) -> Duration {
        self.min_spacing
    }

    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }
}

pub fn min_spacing(weight_per_minute: u32, safety_factor: f64) -> Duration {
    let budget = weight_per_minute.max(1) as f64;
    let nanos = 60_000_000_000.0 * safety_factor.max(0.0) / budget;
    Duration::from_nanos(nanos.round() as u64)
}
