//! Integration test: serve the gateway router on a free port with a mock inference service
//! and a recording channel, then POST Telegram updates to /webhook.
//! Does not require Telegram.

use askbot::channels::{ChannelError, ChannelHandle};
use askbot::config::{Config, Settings};
use askbot::gateway::{self, GatewayState};
use askbot::relay::{GREETING_REPLY, RETRY_LATER_REPLY, USAGE_REPLY};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

#[derive(Default)]
struct RecordingChannel {
    sent: Mutex<Vec<(String, String)>>,
    fail: bool,
}

#[async_trait]
impl ChannelHandle for RecordingChannel {
    fn id(&self) -> &str {
        "recording"
    }

    fn stop(&self) {}

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        if self.fail {
            return Err(ChannelError::Api("sendMessage failed: 400".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((chat_id.to_string(), text.to_string()));
        Ok(())
    }
}

struct TestGateway {
    url: String,
    channel: Arc<RecordingChannel>,
    client: reqwest::Client,
}

impl TestGateway {
    async fn start(api_url: &str, webhook_secret: Option<&str>, fail_send: bool) -> Self {
        let mut config = Config::default();
        config.telegram.webhook_secret = webhook_secret.map(str::to_string);
        config.inference.timeout_secs = 2;
        let api_url = api_url.to_string();
        let settings = Settings::resolve_with(&config, |k| match k {
            "API_URL" => Some(api_url.clone()),
            "WEBHOOK_URL" => Some("https://bot.example.com".to_string()),
            _ => None,
        })
        .expect("settings");
        let channel = Arc::new(RecordingChannel {
            fail: fail_send,
            ..Default::default()
        });
        let state = GatewayState {
            relay: gateway::build_relay(&settings).expect("relay"),
            settings: Arc::new(settings),
            channel: channel.clone(),
        };
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local_addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, gateway::router(state)).await;
        });
        Self {
            url: format!("http://{}", addr),
            channel,
            client: reqwest::Client::new(),
        }
    }

    async fn post_webhook(&self, body: &str) -> reqwest::StatusCode {
        self.post_webhook_with(body, None).await
    }

    async fn post_webhook_with(&self, body: &str, secret: Option<&str>) -> reqwest::StatusCode {
        let mut req = self
            .client
            .post(format!("{}/webhook", self.url))
            .header("content-type", "application/json")
            .body(body.to_string());
        if let Some(s) = secret {
            req = req.header("X-Telegram-Bot-Api-Secret-Token", s);
        }
        req.send().await.expect("post webhook").status()
    }

    fn sent(&self) -> Vec<(String, String)> {
        self.channel.sent.lock().unwrap().clone()
    }
}

fn text_update(update_id: i64, chat_id: i64, text: &str) -> String {
    serde_json::json!({
        "update_id": update_id,
        "message": { "message_id": 1, "chat": { "id": chat_id, "type": "private" }, "text": text }
    })
    .to_string()
}

#[tokio::test]
async fn health_reports_mode_and_port() {
    let gw = TestGateway::start("http://127.0.0.1:9", None, false).await;
    let json: serde_json::Value = gw
        .client
        .get(format!("{}/", gw.url))
        .send()
        .await
        .expect("get health")
        .json()
        .await
        .expect("parse JSON");
    assert_eq!(json.get("runtime").and_then(|v| v.as_str()), Some("running"));
    assert_eq!(json.get("mode").and_then(|v| v.as_str()), Some("webhook"));
    assert_eq!(json.get("port").and_then(|v| v.as_u64()), Some(8080));
}

#[tokio::test]
async fn webhook_relays_answer_to_chat() {
    let mut api = mockito::Server::new_async().await;
    let mock = api
        .mock("POST", "/answer")
        .match_body(mockito::Matcher::Json(serde_json::json!({
            "context": "Paris is the capital of France.",
            "question": "What is the capital of France?"
        })))
        .with_status(200)
        .with_body(r#"{"answer":"Paris"}"#)
        .create_async()
        .await;
    let gw = TestGateway::start(&api.url(), None, false).await;

    let status = gw
        .post_webhook(&text_update(
            1001,
            42,
            "Paris is the capital of France. | What is the capital of France?",
        ))
        .await;
    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(gw.sent(), vec![("42".to_string(), "Answer: Paris".to_string())]);
    mock.assert_async().await;
}

#[tokio::test]
async fn webhook_relays_application_error() {
    let mut api = mockito::Server::new_async().await;
    let _mock = api
        .mock("POST", "/answer")
        .with_status(200)
        .with_body(r#"{"error":"no answer found"}"#)
        .create_async()
        .await;
    let gw = TestGateway::start(&api.url(), None, false).await;

    gw.post_webhook(&text_update(1002, 7, "ctx | q")).await;
    assert_eq!(
        gw.sent(),
        vec![("7".to_string(), "Error: no answer found".to_string())]
    );
}

#[tokio::test]
async fn usage_and_greeting_skip_inference() {
    let mut api = mockito::Server::new_async().await;
    let mock = api
        .mock("POST", "/answer")
        .expect(0)
        .create_async()
        .await;
    let gw = TestGateway::start(&api.url(), None, false).await;

    gw.post_webhook(&text_update(1, 5, "no delimiter")).await;
    gw.post_webhook(&text_update(2, 5, "/start")).await;
    assert_eq!(
        gw.sent(),
        vec![
            ("5".to_string(), USAGE_REPLY.to_string()),
            ("5".to_string(), GREETING_REPLY.to_string()),
        ]
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn unreachable_service_gets_retry_later() {
    let dead = format!("http://127.0.0.1:{}", free_port());
    let gw = TestGateway::start(&dead, None, false).await;

    let status = gw.post_webhook(&text_update(3, 9, "ctx | q")).await;
    assert_eq!(status, reqwest::StatusCode::OK);
    let sent = gw.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1, RETRY_LATER_REPLY);
    assert!(!sent[0].1.contains("127.0.0.1"));
}

#[tokio::test]
async fn malformed_payloads_are_forbidden() {
    let gw = TestGateway::start("http://127.0.0.1:9", None, false).await;
    for body in [
        "not json",
        "{}",
        r#"{"update_id":0,"message":{"chat":{"id":1},"text":"a|b"}}"#,
        r#"{"message":{"chat":{"id":1},"text":"a|b"}}"#,
    ] {
        assert_eq!(
            gw.post_webhook(body).await,
            reqwest::StatusCode::FORBIDDEN,
            "body: {}",
            body
        );
    }
    assert!(gw.sent().is_empty());
}

#[tokio::test]
async fn update_without_text_is_acknowledged() {
    let gw = TestGateway::start("http://127.0.0.1:9", None, false).await;
    let status = gw
        .post_webhook(r#"{"update_id":55,"message":{"chat":{"id":1},"sticker":{}}}"#)
        .await;
    assert_eq!(status, reqwest::StatusCode::OK);
    assert!(gw.sent().is_empty());
}

#[tokio::test]
async fn secret_token_is_checked() {
    let gw = TestGateway::start("http://127.0.0.1:9", Some("s3cret"), false).await;
    let body = text_update(8, 1, "hello");
    assert_eq!(
        gw.post_webhook(&body).await,
        reqwest::StatusCode::FORBIDDEN
    );
    assert_eq!(
        gw.post_webhook_with(&body, Some("wrong")).await,
        reqwest::StatusCode::FORBIDDEN
    );
    assert_eq!(
        gw.post_webhook_with(&body, Some("s3cret")).await,
        reqwest::StatusCode::OK
    );
    assert_eq!(gw.sent(), vec![("1".to_string(), USAGE_REPLY.to_string())]);
}

#[tokio::test]
async fn failed_delivery_is_500() {
    let gw = TestGateway::start("http://127.0.0.1:9", None, true).await;
    let status = gw.post_webhook(&text_update(9, 1, "/start")).await;
    assert_eq!(status, reqwest::StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn concurrent_updates_get_independent_replies() {
    let mut api = mockito::Server::new_async().await;
    let _mock = api
        .mock("POST", "/answer")
        .with_status(200)
        .with_body(r#"{"answer":"ok"}"#)
        .expect(16)
        .create_async()
        .await;
    let gw = Arc::new(TestGateway::start(&api.url(), None, false).await);

    let mut tasks = Vec::new();
    for i in 0..16i64 {
        let gw = gw.clone();
        tasks.push(tokio::spawn(async move {
            gw.post_webhook(&text_update(100 + i, i, &format!("c{} | q{}", i, i)))
                .await
        }));
    }
    for t in tasks {
        assert_eq!(t.await.expect("join"), reqwest::StatusCode::OK);
    }
    let mut chats = Vec::new();
    for (chat_id, reply) in gw.sent() {
        assert_eq!(reply, "Answer: ok");
        chats.push(chat_id);
    }
    chats.sort_by_key(|c| c.parse::<i64>().unwrap_or(-1));
    let expected: Vec<String> = (0..16).map(|i| i.to_string()).collect();
    assert_eq!(chats, expected);
}
