//! Gateway HTTP server and startup sequence.

use crate::channels::{ChannelHandle, InboundEvent, TelegramChannel, TelegramUpdate};
use crate::config::{DeliveryMode, Settings};
use crate::inference::{InferenceBackend, InferenceClient};
use crate::relay::{Normalizer, RelayGateway};
use crate::secrets::{ChainSecretStore, EnvSecretStore, FileSecretStore, SecretStore};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const WEBHOOK_SECRET_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";
const INBOUND_QUEUE: usize = 64;

/// Shared state for the HTTP handlers. Immutable after startup.
#[derive(Clone)]
pub struct GatewayState {
    pub settings: Arc<Settings>,
    pub relay: RelayGateway<dyn InferenceBackend>,
    /// Where replies are sent.
    pub channel: Arc<dyn ChannelHandle>,
}

/// Relay wired to the configured inference service.
pub fn build_relay(settings: &Settings) -> Result<RelayGateway<dyn InferenceBackend>> {
    let client = InferenceClient::new(&settings.api_url, settings.timeout)
        .context("building inference http client")?;
    let backend: Arc<dyn InferenceBackend> = Arc::new(client);
    Ok(RelayGateway::new(
        backend,
        Normalizer::new(settings.min_confidence),
    ))
}

/// Secret lookup: the secrets directory when configured, then the environment.
fn secret_store(settings: &Settings) -> ChainSecretStore {
    let mut stores: Vec<Box<dyn SecretStore>> = Vec::new();
    if let Some(ref dir) = settings.secrets_dir {
        stores.push(Box::new(FileSecretStore::new(dir.clone())));
    }
    stores.push(Box::new(EnvSecretStore));
    ChainSecretStore::new(stores)
}

/// Routes: `GET /` health; `POST /webhook` only in webhook mode.
pub fn router(state: GatewayState) -> Router {
    let mut app = Router::new().route("/", get(health_http));
    if matches!(state.settings.mode, DeliveryMode::Webhook { .. }) {
        app = app.route("/webhook", post(telegram_webhook));
    }
    app.with_state(state)
}

/// Run the bot with resolved settings. Startup order: fetch the bot token, build the channel
/// and relay, register the webhook or start polling, then serve HTTP until SIGINT/SIGTERM.
/// Any startup failure returns before traffic is served.
pub async fn run_gateway(settings: Settings) -> Result<()> {
    let token = secret_store(&settings)
        .get(&settings.token_secret)
        .await
        .with_context(|| format!("fetching bot credential {}", settings.token_secret))?;
    let telegram = Arc::new(
        TelegramChannel::new(token, Some(settings.telegram_api_base.as_str()))
            .context("building telegram http client")?,
    );
    let relay = build_relay(&settings)?;
    let settings = Arc::new(settings);
    let state = GatewayState {
        settings: settings.clone(),
        relay: relay.clone(),
        channel: telegram.clone(),
    };

    let mut poll_task: Option<JoinHandle<()>> = None;
    match settings.webhook_endpoint() {
        Some(url) => {
            if let Err(e) = telegram
                .set_webhook(&url, settings.webhook_secret.as_deref())
                .await
            {
                log::error!("telegram set_webhook failed: {}", e);
            } else {
                log::info!("telegram webhook set to {}", url);
            }
        }
        None => {
            if let Err(e) = telegram.delete_webhook().await {
                log::debug!("telegram delete_webhook before polling: {}", e);
            }
            let (inbound_tx, inbound_rx) = mpsc::channel::<InboundEvent>(INBOUND_QUEUE);
            poll_task = Some(telegram.clone().start_inbound(inbound_tx));
            tokio::spawn(process_inbound(relay, telegram.clone(), inbound_rx));
        }
    }

    let app = router(state);
    let bind_addr = format!("{}:{}", settings.bind, settings.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!(
        "gateway listening on {} ({} mode)",
        bind_addr,
        settings.mode.name()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(telegram, poll_task, settings.mode.clone()))
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Handle polled events, one task per message so a slow answer does not hold up other chats.
async fn process_inbound(
    relay: RelayGateway<dyn InferenceBackend>,
    channel: Arc<TelegramChannel>,
    mut inbound_rx: mpsc::Receiver<InboundEvent>,
) {
    while let Some(event) = inbound_rx.recv().await {
        let relay = relay.clone();
        let channel = channel.clone();
        tokio::spawn(async move {
            if let Err(e) = relay.dispatch(&event, channel.as_ref()).await {
                log::warn!("inbound: reply to chat {} failed: {}", event.chat_id(), e);
            }
        });
    }
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
/// Stops the long-poll loop or removes the webhook, then awaits the poll task.
async fn shutdown_signal(
    telegram: Arc<TelegramChannel>,
    poll_task: Option<JoinHandle<()>>,
    mode: DeliveryMode,
) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, stopping telegram channel");

    telegram.stop();
    if let DeliveryMode::Webhook { .. } = mode {
        if let Err(e) = telegram.delete_webhook().await {
            log::debug!("telegram delete_webhook on shutdown: {}", e);
        }
    }
    if let Some(h) = poll_task {
        // Don't wait out the current long poll.
        h.abort();
        let _ = h.await;
    }
    log::info!("telegram channel stopped");
}

/// POST /webhook — validates the Telegram update, relays it and sends the reply before answering.
/// 403 for a bad secret or malformed payload, 500 when the reply could not be delivered.
async fn telegram_webhook(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if let Some(ref expected) = state.settings.webhook_secret {
        let provided = headers
            .get(WEBHOOK_SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !constant_time_eq(provided, expected) {
            log::warn!("webhook: secret token mismatch");
            return StatusCode::FORBIDDEN;
        }
    }
    let update: TelegramUpdate = match serde_json::from_slice(&body) {
        Ok(u) => u,
        Err(e) => {
            log::warn!("webhook: rejecting malformed payload: {}", e);
            return StatusCode::FORBIDDEN;
        }
    };
    if update.update_id == 0 {
        log::warn!("webhook: rejecting payload without update_id");
        return StatusCode::FORBIDDEN;
    }
    let Some(event) = update.into_event() else {
        return StatusCode::OK;
    };
    match state.relay.dispatch(&event, state.channel.as_ref()).await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            log::error!("webhook: reply to chat {} failed: {}", event.chat_id(), e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Constant-time string comparison.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// GET / returns a simple health JSON for liveness checks.
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "mode": state.settings.mode.name(),
        "port": state.settings.port,
    }))
}
