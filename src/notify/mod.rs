//! Telegram notifications with bounded retry
//!
//! Delivery goes through a [`Transport`] so the retry policy can be tested
//! without the network. Transient failures (timeouts, 429, 5xx) are retried
//! with exponential backoff up to a configured attempt count; permanent
//! failures (bad token, bad chat id) are surfaced immediately.


use crate::config::RunMode;
use crate::error::{AdvisorError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use rand::Rng;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Outbound message owned by the notifier until delivered or exhausted.
#[derive(Debug, Clone)]
pub struct NotificationMessage {
    pub chat_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub delivery_attempts: u32,
}

/// One delivery attempt to the external channel.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(&self, chat_id: &str, text: &str) -> Result<()>;
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

/// Telegram Bot API transport.
pub struct TelegramTransport {
    http: Client,
    bot_token: String,
}

impl TelegramTransport {
    pub fn new(bot_token: String) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { http, bot_token }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn deliver(&self, chat_id: &str, text: &str) -> Result<()> {
        let url = format!("{TELEGRAM_API}/bot{}/sendMessage", self.bot_token);
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: "HTML",
        };

        let response = self.http.post(&url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdvisorError::Telegram {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Sends human-readable updates to the configured chat.
#[derive(Clone)]
pub struct Notifier {
    transport: Option<Arc<dyn Transport>>,
    chat_id: String,
    prefix: String,
    max_attempts: u32,
    backoff_base: Duration,
}

impl Notifier {
    pub fn new(bot_token: String, chat_id: String, mode: RunMode) -> Self {
        Self::with_transport(Arc::new(TelegramTransport::new(bot_token)), chat_id, mode)
    }

    /// Build a notifier over an arbitrary transport (used by tests).
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        chat_id: impl Into<String>,
        mode: RunMode,
    ) -> Self {
        let prefix = if mode.is_shadow() {
            "[SHADOW] ".to_string()
        } else {
            String::new()
        };
        Self {
            transport: Some(transport),
            chat_id: chat_id.into(),
            prefix,
            max_attempts: 3,
            backoff_base: Duration::from_secs(2),
        }
    }

    /// No-op notifier for setups without Telegram credentials.
    pub fn disabled() -> Self {
        Self {
            transport: None,
            chat_id: String::new(),
            prefix: String::new(),
            max_attempts: 3,
            backoff_base: Duration::from_secs(2),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    /// Wrap text into a message addressed to the configured chat.
    pub fn message(&self, text: &str) -> NotificationMessage {
        NotificationMessage {
            chat_id: self.chat_id.clone(),
            text: format!("{}{}", self.prefix, text),
            created_at: Utc::now(),
            delivery_attempts: 0,
        }
    }

    /// Attempt delivery. `Ok(true)` delivered, `Ok(false)` not delivered
    /// (transient retry budget ran out, or notifications are disabled),
    /// `Err` permanent failure.
    pub async fn send(&self, message: &mut NotificationMessage) -> Result<bool> {
        let Some(transport) = &self.transport else {
            tracing::debug!("Notifications disabled, dropping message");
            return Ok(false);
        };

        loop {
            message.delivery_attempts += 1;
            match transport.deliver(&message.chat_id, &message.text).await {
                Ok(()) => {
                    tracing::debug!(
                        attempts = message.delivery_attempts,
                        "Notification delivered"
                    );
                    return Ok(true);
                }
                Err(e) if e.is_transient() => {
                    if message.delivery_attempts >= self.max_attempts {
                        tracing::warn!(
                            attempts = message.delivery_attempts,
                            "Giving up on notification after transient failures: {e}"
                        );
                        return Ok(false);
                    }
                    let backoff = self.backoff_for(message.delivery_attempts);
                    tracing::warn!(
                        attempt = message.delivery_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        "Transient notification failure, retrying: {e}"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    tracing::error!("Permanent notification failure: {e}");
                    return Err(e);
                }
            }
        }
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = self.backoff_base * 2u32.saturating_pow(attempt.saturating_sub(1));
        let jitter = Duration::from_millis(rand::rng().random_range(0..500));
        exp + jitter
    }

    /// Fire-and-track convenience for one-off texts.
    pub async fn notify(&self, text: &str) -> Result<bool> {
        let mut message = self.message(text);
        self.send(&mut message).await
    }

    pub async fn startup(&self, mode: RunMode) -> Result<bool> {
        let mode_line = match mode {
            RunMode::Production => "Production mode: real tips and results.",
            RunMode::Shadow => "Shadow mode: outcomes are simulated.",
        };
        self.notify(&format!(
            "<b>🚀 Betting Advisor</b>\n\n\
            The scheduler is up and will deliver daily tips and results.\n\
            {mode_line}"
        ))
        .await
    }

    pub async fn shutdown(&self) -> Result<bool> {
        self.notify("<b>🛑 Betting Advisor</b>\n\nThe scheduler is shutting down.")
            .await
    }

    pub async fn error(&self, context: &str, detail: &str) -> Result<bool> {
        self.notify(&format!("<b>❌ {context}</b>\n\n<code>{detail}</code>"))
            .await
    }
}
