//! Telegram channel: long-poll getUpdates or webhook, sendMessage via Bot API.

use crate::channels::handle::{ChannelError, ChannelHandle};
use crate::channels::inbound::InboundEvent;
use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const LONG_POLL_TIMEOUT: u64 = 30;
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(2);
/// Bound on any Bot API call; must outlast a getUpdates long poll.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(LONG_POLL_TIMEOUT + 15);

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

/// Telegram update payload (getUpdates result item or webhook POST body).
#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramMessage {
    pub chat: TelegramChat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

impl TelegramUpdate {
    /// Event for a text message; `None` for updates without text (stickers, joins, edits).
    pub fn into_event(self) -> Option<InboundEvent> {
        let msg = self.message?;
        let text = msg.text?;
        Some(InboundEvent::from_text(msg.chat.id.to_string(), text))
    }
}

/// Telegram channel connector.
pub struct TelegramChannel {
    id: String,
    token: Secret<String>,
    api_base: String,
    running: AtomicBool,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(token: Secret<String>, api_base: Option<&str>) -> Result<Self, ChannelError> {
        Self::with_request_timeout(token, api_base, REQUEST_TIMEOUT)
    }

    /// Like [`TelegramChannel::new`] with a custom per-request timeout.
    pub fn with_request_timeout(
        token: Secret<String>,
        api_base: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            id: "telegram".to_string(),
            token,
            api_base: api_base
                .unwrap_or(TELEGRAM_API_BASE)
                .trim_end_matches('/')
                .to_string(),
            running: AtomicBool::new(false),
            client,
        })
    }

    fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token.expose_secret(), method)
    }

    /// POST a Bot API method and check `ok`. Errors never carry the URL (it contains the token).
    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<Option<T>, ChannelError> {
        let res = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::Request(e.without_url()))?;
        let status = res.status();
        let data: ApiResponse<T> = res
            .json()
            .await
            .map_err(|e| ChannelError::Request(e.without_url()))?;
        if !status.is_success() || !data.ok {
            return Err(ChannelError::Api(format!(
                "{} failed: {} {}",
                method,
                status,
                data.description.unwrap_or_default()
            )));
        }
        Ok(data.result)
    }

    /// Start the getUpdates long-poll loop and forward events to the gateway. Returns a handle to await on shutdown.
    pub fn start_inbound(
        self: Arc<Self>,
        inbound_tx: mpsc::Sender<InboundEvent>,
    ) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        log::info!("telegram channel: starting getUpdates long-poll loop");
        tokio::spawn(async move {
            run_get_updates_loop(self, inbound_tx).await;
        })
    }

    /// Call getUpdates (long poll). Returns (updates, next_offset).
    async fn get_updates(
        &self,
        offset: Option<i64>,
    ) -> Result<(Vec<TelegramUpdate>, Option<i64>), ChannelError> {
        let mut body = serde_json::json!({ "timeout": LONG_POLL_TIMEOUT });
        if let Some(off) = offset {
            body["offset"] = serde_json::Value::from(off);
        }
        let updates: Vec<TelegramUpdate> =
            self.call("getUpdates", &body).await?.unwrap_or_default();
        let next_offset = updates.iter().map(|u| u.update_id).max().map(|id| id + 1);
        Ok((updates, next_offset))
    }

    /// Set webhook URL (and optional secret). Telegram then POSTs updates to the URL instead of getUpdates.
    pub async fn set_webhook(&self, url: &str, secret: Option<&str>) -> Result<(), ChannelError> {
        let mut body = serde_json::json!({ "url": url });
        if let Some(s) = secret {
            body["secret_token"] = serde_json::Value::String(s.to_string());
        }
        self.call::<serde_json::Value>("setWebhook", &body).await?;
        Ok(())
    }

    /// Remove webhook so the bot can use getUpdates again.
    pub async fn delete_webhook(&self) -> Result<(), ChannelError> {
        self.call::<serde_json::Value>("deleteWebhook", &serde_json::json!({}))
            .await?;
        Ok(())
    }

    /// Send a text message to a chat via sendMessage.
    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        let body = serde_json::json!({ "chat_id": chat_id, "text": text });
        self.call::<serde_json::Value>("sendMessage", &body).await?;
        Ok(())
    }
}

async fn run_get_updates_loop(
    channel: Arc<TelegramChannel>,
    inbound_tx: mpsc::Sender<InboundEvent>,
) {
    let mut offset: Option<i64> = None;
    while channel.running() {
        match channel.get_updates(offset).await {
            Ok((updates, next)) => {
                if next.is_some() {
                    offset = next;
                }
                for event in updates.into_iter().filter_map(TelegramUpdate::into_event) {
                    if inbound_tx.send(event).await.is_err() {
                        log::debug!("telegram: inbound channel closed, stopping loop");
                        return;
                    }
                }
            }
            Err(e) => {
                log::warn!("telegram getUpdates error: {}", e);
                tokio::time::sleep(POLL_ERROR_BACKOFF).await;
            }
        }
    }
    log::info!("telegram channel: getUpdates loop stopped");
}

#[async_trait]
impl ChannelHandle for TelegramChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        TelegramChannel::send_message(self, chat_id, text).await
    }
}
