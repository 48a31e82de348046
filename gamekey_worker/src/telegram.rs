use std::sync::Arc;

use gamekey_engine::traits::{Notification, Notifier, NotifierError};
use log::*;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::TelegramConfig;

/// Delivers notifications as plain chat messages through the Telegram Bot API. Recipients are chat ids, which for
/// private chats are the customers' Telegram user ids.
#[derive(Clone)]
pub struct TelegramNotifier {
    config: TelegramConfig,
    client: Arc<Client>,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct BotApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> Result<Self, NotifierError> {
        let client = Client::builder().build().map_err(|e| NotifierError::NotConfigured(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn admin_chat_id(&self) -> Option<&str> {
        self.config.admin_chat_id.as_deref()
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.config.api_url, self.config.bot_token.reveal())
    }

    /// Sends `text` to the chat as-is.
    pub async fn send_text(&self, chat_id: &str, text: &str) -> Result<(), NotifierError> {
        if self.config.bot_token.reveal().is_empty() {
            return Err(NotifierError::NotConfigured("No bot token".into()));
        }
        let failed = |reason: String| NotifierError::DeliveryFailed { recipient: chat_id.to_string(), reason };
        let body = SendMessage { chat_id, text, disable_web_page_preview: true };
        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| failed(e.without_url().to_string()))?;
        let status = response.status();
        let result = response.json::<BotApiResponse>().await.map_err(|e| failed(e.without_url().to_string()))?;
        if !result.ok {
            let reason = result.description.unwrap_or_else(|| format!("HTTP {status}"));
            return Err(failed(reason));
        }
        trace!("📬️ Message delivered to chat {chat_id}");
        Ok(())
    }
}

impl Notifier for TelegramNotifier {
    async fn notify(&self, recipient: &str, notification: &Notification) -> Result<(), NotifierError> {
        debug!("📬️ Sending notification to {recipient}");
        self.send_text(recipient, &notification.to_string()).await
    }
}
