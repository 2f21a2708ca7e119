use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{FailureNotifier, SenderError};
use crate::scheduler::prober::ProbeError;

const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Pushes failure notices through the Telegram Bot API. The owner id of a
/// target is the chat id of the user who registered it.
pub struct TelegramNotifier {
    client: Client,
    bot_token: String,
    api_url: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: impl Into<String>) -> Result<Self, SenderError> {
        let bot_token = bot_token.into();
        if bot_token.trim().is_empty() {
            return Err(SenderError::InvalidConfiguration(
                "Telegram bot token is empty".to_string(),
            ));
        }
        Ok(Self {
            client: Client::new(),
            bot_token,
            api_url: TELEGRAM_API_URL.to_string(),
        })
    }

    /// Points the notifier at another Bot API host, e.g. a local mock.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn format_message(url: &str, error: &ProbeError) -> String {
        format!(
            "<code>⚠️{}</code>\n\n<u>{}</u>",
            escape_html(url),
            escape_html(&error.to_string())
        )
    }
}

/// Escapes the characters Telegram's HTML parse mode treats as markup.
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[derive(Serialize)]
struct TelegramMessage<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'a str,
}

#[async_trait]
impl FailureNotifier for TelegramNotifier {
    async fn send_failure_notice(
        &self,
        owner_id: i64,
        url: &str,
        error: &ProbeError,
    ) -> Result<(), SenderError> {
        let api_url = format!("{}/bot{}/sendMessage", self.api_url, self.bot_token);
        let text = Self::format_message(url, error);
        let payload = TelegramMessage {
            chat_id: owner_id,
            text: &text,
            parse_mode: "HTML",
        };

        let response = self.client.post(&api_url).json(&payload).send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(SenderError::SendFailed(format!(
                "Telegram API returned non-success status: {status}. Body: {error_body}"
            )));
        }

        Ok(())
    }
}
