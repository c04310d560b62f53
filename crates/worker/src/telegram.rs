//! Telegram Bot API client used for channel alerts.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub const TELEGRAM_API: &str = "https://api.telegram.org";
pub const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Body of a `sendMessage` call.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SendMessage {
    pub chat_id: String,
    pub text: String,
    pub parse_mode: &'static str,
    pub disable_web_page_preview: bool,
}

impl SendMessage {
    pub fn markdown(chat_id: &str, text: String) -> Self {
        Self {
            chat_id: chat_id.to_string(),
            text,
            parse_mode: "Markdown",
            disable_web_page_preview: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("telegram transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[async_trait]
pub trait ChatSender: Send + Sync {
    async fn send_message(
        &self,
        bot_token: &str,
        message: &SendMessage,
    ) -> Result<ChatResponse, TelegramError>;
}

#[derive(Clone)]
pub struct TelegramClient {
    client: reqwest::Client,
}

impl TelegramClient {
    pub fn new(timeout: Duration) -> Result<Self, TelegramError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| TelegramError::Transport(Box::new(err)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ChatSender for TelegramClient {
    async fn send_message(
        &self,
        bot_token: &str,
        message: &SendMessage,
    ) -> Result<ChatResponse, TelegramError> {
        let response = self
            .client
            .post(send_message_url(bot_token))
            .json(message)
            .send()
            .await
            // The URL carries the bot token.
            .map_err(|err| TelegramError::Transport(Box::new(err.without_url())))?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(ChatResponse { status, body })
    }
}

fn send_message_url(bot_token: &str) -> String {
    format!("{TELEGRAM_API}/bot{bot_token}/sendMessage")
}
