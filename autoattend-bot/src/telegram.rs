//! Telegram Bot API client: long polling, replies and callback answers
//!
//! Only the handful of methods and fields the bot uses are modeled; unknown
//! fields in responses are ignored.

use autoattend_core::{AttendError, AttendResult, ChatId, ErrorContext, TelegramConfig};
use autoattend_session::{create_http_client, transport_error};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ReplyMarkup {
    Keyboard(ReplyKeyboardMarkup),
    Inline(InlineKeyboardMarkup),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyKeyboardMarkup {
    pub keyboard: Vec<Vec<KeyboardButton>>,
    pub resize_keyboard: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyboardButton {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

#[derive(Debug, Serialize)]
struct GetUpdates<'a> {
    offset: i64,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a ChatId,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a ReplyMarkup>,
}

#[derive(Debug, Serialize)]
struct AnswerCallbackQuery<'a> {
    callback_query_id: &'a str,
    text: &'a str,
}

/// Bot API client bound to one token
#[derive(Clone)]
pub struct TelegramClient {
    client: reqwest::Client,
    config: TelegramConfig,
    token: String,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> AttendResult<Self> {
        Ok(Self {
            client: create_http_client(config)?,
            config: config.clone(),
            token: config.api_token.clone(),
        })
    }

    async fn call<P, R>(&self, method: &str, params: &P) -> AttendResult<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.config.method_url(&self.token, method))
            .json(params)
            .send()
            .await
            .map_err(|e| transport_error(e, method))?;

        let body: ApiResponse<R> = response
            .json()
            .await
            .map_err(|e| transport_error(e, method))?;

        match body {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse {
                description,
                error_code,
                ..
            } => Err(AttendError::Transport {
                message: format!(
                    "{} rejected ({}): {}",
                    method,
                    error_code.map_or_else(|| "no code".to_string(), |c| c.to_string()),
                    description.unwrap_or_default()
                ),
                source: None,
                context: ErrorContext::new("telegram").with_operation(method),
            }),
        }
    }

    /// Long-poll for updates after `offset`
    pub async fn get_updates(&self, offset: i64) -> AttendResult<Vec<Update>> {
        let updates: Vec<Update> = self
            .call(
                "getUpdates",
                &GetUpdates {
                    offset,
                    timeout: self.config.poll_timeout_secs,
                    allowed_updates: &["message", "callback_query"],
                },
            )
            .await?;

        if !updates.is_empty() {
            debug!(count = updates.len(), offset, "Received updates");
        }
        Ok(updates)
    }

    pub async fn send_message(
        &self,
        chat_id: &ChatId,
        text: &str,
        reply_markup: Option<&ReplyMarkup>,
    ) -> AttendResult<()> {
        let _: IgnoredAny = self
            .call(
                "sendMessage",
                &SendMessage {
                    chat_id,
                    text,
                    reply_markup,
                },
            )
            .await?;
        Ok(())
    }

    /// Show a short toast to the user who pressed an inline button
    pub async fn answer_callback_query(&self, callback_query_id: &str, text: &str) -> AttendResult<()> {
        let _: IgnoredAny = self
            .call(
                "answerCallbackQuery",
                &AnswerCallbackQuery {
                    callback_query_id,
                    text,
                },
            )
            .await?;
        Ok(())
    }
}
