//! Real transports against a local axum relay.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures_util::StreamExt;
use relayfeed::transport::poll::{HttpSource, StatusSource};
use relayfeed::transport::stream::{StreamConnector, WsConnector};
use relayfeed::{ConnectionState, FailureReason, Feed, FeedConfig, FeedMode};
use serde_json::json;
use tokio::net::TcpListener;

const PASSWORD: &str = "youshallnotpass";

fn authorized(headers: &HeaderMap) -> bool {
    headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) == Some(PASSWORD)
}

async fn stats(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({
        "players": 3,
        "playingPlayers": 2,
        "uptime": 120_000,
        "memory": { "used": 512, "free": 512, "allocated": 1024, "reservable": 2048 },
        "cpu": { "cores": 4, "systemLoad": 0.5, "lavalinkLoad": 0.1 }
    }))
    .into_response()
}

async fn rejected() -> Json<serde_json::Value> {
    Json(json!({ "success": false, "error": "node offline" }))
}

async fn ws_handler(ws: WebSocketUpgrade, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    ws.on_upgrade(push_frames)
}

async fn push_frames(mut socket: WebSocket) {
    for players in [1, 2] {
        let frame = json!({ "success": true, "data": { "players": players } }).to_string();
        if socket.send(Message::Text(frame)).await.is_err() {
            return;
        }
    }
    let _ = socket.send(Message::Text("not json".into())).await;
    let _ = socket.send(Message::Close(None)).await;
}

async fn spawn_relay() -> SocketAddr {
    let app = Router::new()
        .route("/stats", get(stats))
        .route("/version", get(|| async { "4.0.8" }))
        .route("/rejected", get(rejected))
        .route("/ws", get(ws_handler));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn config(url: &str, password: Option<&str>) -> FeedConfig {
    let mut cfg = FeedConfig::from_url(url).unwrap();
    cfg.password = password.map(str::to_string);
    cfg
}

#[tokio::test]
async fn http_fetch_and_probe() {
    let addr = spawn_relay().await;
    let cfg = config(&format!("http://{addr}"), Some(PASSWORD));
    assert_eq!(cfg.mode, FeedMode::Poll);
    let source = HttpSource::new(&cfg).unwrap();
    assert!(source.has_probe());
    source.probe().await.unwrap();

    let payload = source.fetch().await.unwrap();
    assert_eq!(payload["players"], 3);
}

#[tokio::test]
async fn http_wrong_password_is_http_error() {
    let addr = spawn_relay().await;
    let source = HttpSource::new(&config(&format!("http://{addr}"), Some("nope"))).unwrap();
    let err = source.fetch().await.unwrap_err();
    assert_eq!(err, FailureReason::HttpStatus(401));
    assert_eq!(err.tag(), "http-error:401");
}

#[tokio::test]
async fn http_envelope_rejection_surfaces_message() {
    let addr = spawn_relay().await;
    let source = HttpSource::new(&config(&format!("http://{addr}/rejected"), None)).unwrap();
    assert!(!source.has_probe());
    let err = source.fetch().await.unwrap_err();
    assert_eq!(err, FailureReason::Rejected("node offline".into()));
}

#[tokio::test]
async fn http_unreachable_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let source = HttpSource::new(&config(&format!("http://{addr}/stats"), None)).unwrap();
    let err = source.fetch().await.unwrap_err();
    assert_eq!(err.tag(), "transport-error", "{err}");
}

#[tokio::test]
async fn ws_frames_decode_until_close() {
    let addr = spawn_relay().await;
    let cfg = config(&format!("ws://{addr}/ws"), Some(PASSWORD));
    assert_eq!(cfg.mode, FeedMode::Stream);
    let connector = WsConnector::new(&cfg).unwrap();
    let frames: Vec<_> = connector.connect().await.unwrap().collect().await;

    assert_eq!(frames.len(), 3, "{frames:?}");
    assert_eq!(frames[0].as_ref().unwrap()["players"], 1);
    assert_eq!(frames[1].as_ref().unwrap()["players"], 2);
    assert_eq!(frames[2].as_ref().unwrap_err().tag(), "parse-error");
}

#[tokio::test]
async fn ws_handshake_rejection_is_http_error() {
    let addr = spawn_relay().await;
    let connector = WsConnector::new(&config(&format!("ws://{addr}/ws"), None)).unwrap();
    let err = connector.connect().await.err().unwrap();
    assert_eq!(err, FailureReason::HttpStatus(401));
}

#[tokio::test]
async fn feed_polls_real_relay_to_online() {
    let addr = spawn_relay().await;
    let mut cfg = config(&format!("http://{addr}/"), Some(PASSWORD));
    cfg.poll_interval_ms = 50;
    let mut feed = Feed::new();
    let mut rx = feed.watch_state();
    feed.start(cfg).unwrap();

    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == ConnectionState::Online))
        .await
        .expect("feed reached online")
        .unwrap();
    feed.stop();
    assert_eq!(feed.state(), ConnectionState::Offline);
}
