use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub binance: BinanceConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub universe: UniverseConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
    #[serde(skip)]
    pub email: Option<EmailConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BinanceConfig {
    pub base_url: String,
    pub kline_limit: u32,
    pub max_retries: u32,
    /// 每分钟请求权重预算
    pub weight_per_minute: u32,
    pub safety_factor: f64,
    pub backoff_base_ms: u64,
    pub quota_cooldown_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.binance.com".to_string(),
            kline_limit: 200,
            max_retries: 3,
            weight_per_minute: 1200,
            safety_factor: 1.5,
            backoff_base_ms: 1000,
            quota_cooldown_secs: 5,
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    pub ema_period: usize,      // 155
    pub baseline_period: usize, // 55
    pub buffer_ratio: f64,      // 0.1%
    pub timeframes: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            ema_period: 155,
            baseline_period: 55,
            buffer_ratio: 0.001,
            timeframes: vec!["1h".to_string(), "4h".to_string(), "1d".to_string()],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    pub interval_minutes: u64,
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    #[serde(default)]
    pub instrument_delay_ms: u64,
    pub force_check_cooldown_minutes: u64,
    #[serde(default = "default_true")]
    pub run_on_startup: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 60,
            batch_size: 5,
            batch_delay_ms: 2000,
            instrument_delay_ms: 0,
            force_check_cooldown_minutes: 15,
            run_on_startup: true,
        }
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn instrument_delay(&self) -> Duration {
        Duration::from_millis(self.instrument_delay_ms)
    }

    pub fn force_check_cooldown(&self) -> Duration {
        Duration::from_secs(self.force_check_cooldown_minutes * 60)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct UniverseConfig {
    pub symbols: Vec<String>,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()],
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct NotificationConfig {
    #[serde(default)]
    pub subscribers: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EmailConfig {
    pub smtp_server: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

impl EmailConfig {
    /// SMTP 凭据只从环境变量读取；缺少用户名时返回 None
    pub fn from_env() -> Option<Self> {
        let username = env::var("EMAIL_USERNAME").ok().filter(|v| !v.is_empty())?;
        let password = env::var("EMAIL_PASSWORD").ok()?;
        let from = env::var("EMAIL_FROM").unwrap_or_else(|_| username.clone());

        Some(Self {
            smtp_server: env::var("EMAIL_SMTP_SERVER")
                .unwrap_or_else(|_| "smtp.163.com".to_string()),
            smtp_port: env::var("EMAIL_SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(994),
            username,
            password,
            from,
        })
    }
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(
                Environment::with_prefix("CONFLUENCE")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("universe.symbols")
                    .with_list_parse_key("analysis.timeframes")
                    .with_list_parse_key("notification.subscribers")
                    .try_parsing(true),
            )
            .build()?;

        let mut settings: Settings = config.try_deserialize()?;
        settings.email = EmailConfig::from_env();
        settings.validate()?;

        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Message(msg.to_string()));

        if self.analysis.timeframes.is_empty() {
            return invalid("analysis.timeframes must not be empty");
        }
        if self.universe.symbols.is_empty() {
            return invalid("universe.symbols must not be empty");
        }
        if self.scheduler.batch_size == 0 {
            return invalid("scheduler.batch_size must be at least 1");
        }
        if self.binance.max_retries == 0 {
            return invalid("binance.max_retries must be at least 1");
        }
        if self.binance.weight_per_minute == 0 {
            return invalid("binance.weight_per_minute must be at least 1");
        }
        if self.binance.safety_factor <= 0.0 {
            return invalid("binance.safety_factor must be positive");
        }

        let window = self.analysis.ema_period.max(self.analysis.baseline_period);
        if (self.binance.kline_limit as usize) < window {
            return Err(ConfigError::Message(format!(
                "binance.kline_limit ({}) is shorter than the indicator window ({})",
                self.binance.kline_limit, window
            )));
        }

        Ok(())
    }
}
