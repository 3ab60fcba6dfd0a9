use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Binance API error: status {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Binance quota exceeded: status {status}: {body}")]
    QuotaExceeded { status: u16, body: String },

    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("{symbol} {interval}: giving up after {attempts} attempts: {source}")]
    FetchExhausted {
        symbol: String,
        interval: String,
        attempts: u32,
        #[source]
        source: Box<AppError>,
    },

    #[error("Insufficient kline data: need {required}, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Invalid kline data: {0}")]
    InvalidKline(String),

    #[error("Notification failed: {0}")]
    Notification(String),

    #[error("Force check is cooling down, retry in {remaining_secs}s")]
    ForceCheckCooldown { remaining_secs: u64 },

    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl AppError {
    /// Binance 用 429/418 和 -1003 表示请求权重超限
    pub fn is_quota_exceeded(&self) -> bool {
        match self {
            AppError::QuotaExceeded { .. } => true,
            AppError::FetchExhausted { source, .. } => source.is_quota_exceeded(),
            other => {
                let text = other.to_string().to_lowercase();
                text.contains("-1003") || text.contains("too many requests")
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
