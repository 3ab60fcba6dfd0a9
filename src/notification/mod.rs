mod email;
mod format;

pub use email::EmailNotifier;
pub use format::{format_alert, format_analysis};

use crate::error::Result;
use async_trait::async_trait;
use tracing::info;

/// 消息格式：纯文本或受限标记 (仅粗体)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatMode {
    Plain,
    Markup,
}

/// Delivery channel for subscriber messages. Returns the id of the sent message.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, chat_id: &str, body: &str, mode: FormatMode) -> Result<String>;

    async fn edit_text(&self, chat_id: &str, message_id: &str, body: &str) -> Result<()>;
}

/// Writes messages to the log; used when no transport credentials are configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_text(&self, chat_id: &str, body: &str, _mode: FormatMode) -> Result<String> {
        info!("[notify {}]\n{}", chat_id, body);
        Ok(String::new())
    }

    async fn edit_text(&self, chat_id: &str, message_id: &str, body: &str) -> Result<()> {
        info!("[edit {} #{}]\n{}", chat_id, message_id, body);
        Ok(())
    }
}
