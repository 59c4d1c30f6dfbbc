mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use common::{router, text_update, update_json, RecordingChat, Sent, TOKEN};
use kinobot::config::PollingConfig;
use kinobot::ingest::{webhook_app, Poller};
use kinobot::tg::ChatApi;
use tower::ServiceExt;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn empty_tmdb() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"results": []})))
        .mount(&server)
        .await;
    server
}

fn post(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

async fn body_text(resp: axum::response::Response) -> String {
    let bytes = to_bytes(resp.into_body(), 1024).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn webhook_update_is_dispatched_and_acknowledged() {
    let server = empty_tmdb().await;
    let chat = Arc::new(RecordingChat::default());
    let app = webhook_app(router(&chat, &server.uri(), false), TOKEN, None);

    let body = update_json(1, 77, "/film zzzznotarealtitle").to_string();
    let resp = app.oneshot(post(&format!("/{TOKEN}"), body)).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_text(resp).await, "ok");
    assert_eq!(chat.sent(), vec![Sent::Text { chat: 77, text: "Фильм не найден".into() }]);
}

#[tokio::test]
async fn malformed_body_is_acknowledged_and_dropped() {
    let server = empty_tmdb().await;
    let chat = Arc::new(RecordingChat::default());
    let app = webhook_app(router(&chat, &server.uri(), false), TOKEN, None);

    let resp = app.oneshot(post(&format!("/{TOKEN}"), "{not json")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(chat.sent().is_empty());
}

#[tokio::test]
async fn unknown_command_is_still_acknowledged() {
    let server = empty_tmdb().await;
    let chat = Arc::new(RecordingChat::default());
    let app = webhook_app(router(&chat, &server.uri(), false), TOKEN, None);

    let resp = app.oneshot(post(&format!("/{TOKEN}"), update_json(2, 1, "/vote").to_string())).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(chat.sent().is_empty());
}

#[tokio::test]
async fn wrong_token_path_is_rejected() {
    let server = empty_tmdb().await;
    let chat = Arc::new(RecordingChat::default());
    let app = webhook_app(router(&chat, &server.uri(), false), TOKEN, None);

    let resp = app.oneshot(post("/not-the-token", update_json(1, 1, "/start").to_string())).await.unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(chat.sent().is_empty());
}

#[tokio::test]
async fn secret_header_is_checked_when_configured() {
    let server = empty_tmdb().await;
    let chat = Arc::new(RecordingChat::default());
    let app = webhook_app(router(&chat, &server.uri(), false), TOKEN, Some("s3cr3t"));

    let resp = app
        .clone()
        .oneshot(post(&format!("/{TOKEN}"), update_json(1, 5, "/start").to_string()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let mut req = post(&format!("/{TOKEN}"), update_json(1, 5, "/start").to_string());
    req.headers_mut().insert("X-Telegram-Bot-Api-Secret-Token", "s3cr3t".parse().unwrap());
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(chat.sent().len(), 1);
}

#[tokio::test]
async fn health_endpoint_answers() {
    let server = empty_tmdb().await;
    let chat = Arc::new(RecordingChat::default());
    let app = webhook_app(router(&chat, &server.uri(), false), TOKEN, None);

    let resp = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn poller_handles_batch_in_order_and_advances_offset() {
    let server = empty_tmdb().await;
    let chat = Arc::new(RecordingChat::default());
    chat.push_batch(vec![text_update(10, 1, "/film"), text_update(11, 2, "/tv")]);
    let api: Arc<dyn ChatApi> = chat.clone();
    let mut poller = Poller::new(api, router(&chat, &server.uri(), false), PollingConfig::default());

    assert_eq!(poller.poll_once().await.unwrap(), 2);
    assert_eq!(poller.poll_once().await.unwrap(), 0);

    assert_eq!(*chat.offsets.lock().unwrap(), vec![None, Some(12)]);
    let sent = chat.sent();
    assert!(matches!(&sent[..], [Sent::Text { chat: 1, .. }, Sent::Text { chat: 2, .. }]));
}

#[tokio::test]
async fn oversized_update_id_does_not_wrap_offset() {
    let server = empty_tmdb().await;
    let chat = Arc::new(RecordingChat::default());
    chat.push_batch(vec![text_update(41, 1, "/start")]);
    chat.push_batch(vec![text_update(u32::MAX, 2, "/start")]);
    let api: Arc<dyn ChatApi> = chat.clone();
    let mut poller = Poller::new(api, router(&chat, &server.uri(), false), PollingConfig::default());

    assert_eq!(poller.poll_once().await.unwrap(), 1);
    assert_eq!(poller.poll_once().await.unwrap(), 1);
    assert_eq!(poller.poll_once().await.unwrap(), 0);

    // id вне диапазона i32 обработан, но offset остаётся прежним, а не уходит в минус
    assert_eq!(*chat.offsets.lock().unwrap(), vec![None, Some(42), Some(42)]);
    assert_eq!(chat.sent().len(), 2);
}

#[tokio::test]
async fn poller_stops_on_shutdown() {
    let server = empty_tmdb().await;
    let chat = Arc::new(RecordingChat::default());
    chat.push_batch(vec![text_update(1, 3, "/start")]);
    let api: Arc<dyn ChatApi> = chat.clone();
    let cfg = PollingConfig { idle_delay: Duration::from_millis(10), ..PollingConfig::default() };
    let poller = Poller::new(api, router(&chat, &server.uri(), false), cfg);

    tokio::time::timeout(Duration::from_secs(5), poller.run(tokio::time::sleep(Duration::from_millis(100))))
        .await
        .expect("poller must stop on shutdown");

    assert_eq!(chat.sent().len(), 1);
    assert!(chat.offsets.lock().unwrap().len() >= 2);
}
