use crate::config::EmailConfig;
use crate::error::{AppError, Result};

use super::{FormatMode, Notifier};
use async_trait::async_trait;
use chrono::Local;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// 邮件通道：chat_id 即收件地址
pub struct EmailNotifier {
    config: EmailConfig,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig) -> Result<Self> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());

        let tls_params = TlsParameters::new(config.smtp_server.clone())
            .map_err(|e| AppError::Notification(format!("TLS params error: {}", e)))?;

        // 465/994 为隐式 TLS，其余端口走 STARTTLS
        let tls = if config.smtp_port == 465 || config.smtp_port == 994 {
            Tls::Wrapper(tls_params)
        } else {
            Tls::Required(tls_params)
        };

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_server)
            .port(config.smtp_port)
            .tls(tls)
            .credentials(creds)
            .build();

        Ok(Self { config, mailer })
    }

    async fn deliver(&self, to: &str, subject: String, body: String, mode: FormatMode) -> Result<String> {
        let from_addr = format!("Confluence <{}>", self.config.from);
        let to_addr = format!("<{}>", to);

        let (content_type, body) = match mode {
            FormatMode::Plain => (ContentType::TEXT_PLAIN, body.replace('*', "")),
            FormatMode::Markup => (ContentType::TEXT_HTML, markup_to_html(&body)),
        };

        let email = Message::builder()
            .from(
                from_addr
                    .parse()
                    .map_err(|e| AppError::Notification(format!("Invalid from address: {}", e)))?,
            )
            .to(to_addr
                .parse()
                .map_err(|e| AppError::Notification(format!("Invalid to address: {}", e)))?)
            .subject(subject)
            .header(content_type)
            .body(body)
            .map_err(|e| AppError::Notification(e.to_string()))?;

        let response = self
            .mailer
            .send(email)
            .await
            .map_err(|e| AppError::Notification(format!("Send failed: {}", e)))?;

        Ok(response.message().collect::<Vec<_>>().join(" "))
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send_text(&self, chat_id: &str, body: &str, mode: FormatMode) -> Result<String> {
        let headline = body.lines().next().unwrap_or_default().replace('*', "");
        let subject = format!("{} - {}", headline, Local::now().format("%Y-%m-%d %H:%M"));
        self.deliver(chat_id, subject, body.to_string(), mode).await
    }

    /// 邮件无法修改，改为发送一封更新邮件
    async fn edit_text(&self, chat_id: &str, message_id: &str, body: &str) -> Result<()> {
        let subject = format!("Update to {}", message_id);
        self.deliver(chat_id, subject, body.to_string(), FormatMode::Markup)
            .await
            .map(|_| ())
    }
}

/// `*bold*` -> `<b>bold</b>`, everything else escaped and kept verbatim.
fn markup_to_html(body: &str) -> String {
    let escaped = body
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");

    let mut html = String::with_capacity(escaped.len() + 32);
    let mut bold = false;
    for ch in escaped.chars() {
        if ch == '*' {
            html.push_str(if bold { "</b>" } else { "<b>" });
            bold = !bold;
        } else {
            html.push(ch);
        }
    }
    if bold {
        html.push_str("</b>");
    }

    format!(
        "<html><body><pre style=\"font-family: monospace;\">{}</pre></body></html>",
        html
    )
}
