//! Telegram delivery of session progress messages

use async_trait::async_trait;
use autoattend_core::{AttendError, AttendResult, ChatId, ErrorContext, Notifier, TelegramConfig};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("autoattend/", env!("CARGO_PKG_VERSION"));

/// Build an HTTP client for the Bot API with the configured request timeout
pub fn create_http_client(config: &TelegramConfig) -> AttendResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| AttendError::Transport {
            message: format!("Failed to create HTTP client: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("http_client").with_operation("create_client"),
        })
}

/// Map a failed request to a transport error
///
/// The request URL embeds the bot token, so it is stripped before the
/// error is formatted anywhere.
pub fn transport_error(error: reqwest::Error, operation: &str) -> AttendError {
    let error = error.without_url();
    AttendError::Transport {
        message: format!("Bot API call failed: {}", error),
        source: Some(Box::new(error)),
        context: ErrorContext::new("telegram")
            .with_operation(operation)
            .with_suggestion("Check network connectivity and the bot token"),
    }
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a ChatId,
    text: &'a str,
}

/// Plain-text `sendMessage` notifier used by session workers
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig, api_token: &str) -> AttendResult<Self> {
        Ok(Self {
            client: create_http_client(config)?,
            endpoint: config.method_url(api_token, "sendMessage"),
        })
    }

    /// Deliver one message, surfacing any failure
    pub async fn send(&self, target: &ChatId, text: &str) -> AttendResult<()> {
        self.client
            .post(&self.endpoint)
            .json(&SendMessage {
                chat_id: target,
                text,
            })
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| transport_error(e, "send_message"))?;

        debug!(target = %target, "Notification delivered");
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, target: &ChatId, text: &str) {
        if let Err(e) = self.send(target, text).await {
            warn!(target = %target, error = %e, "Failed to deliver notification");
        }
    }
}
