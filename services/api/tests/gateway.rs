//! End-to-end tests for the live session gateway.
//!
//! The real router is served on an ephemeral port with the echo runtime and
//! driven by a WebSocket client, so every message travels the full path:
//! decode, queue, runtime, classify, encode.

use std::{path::PathBuf, sync::Arc, time::Duration};

use frontdesk_api::{
    config::{Config, RuntimeKind},
    router::create_router,
    state::AppState,
};
use frontdesk_core::{InMemorySessionService, SessionKey, SessionService, runtime::echo::EchoRuntime};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::{net::TcpListener, time::timeout};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message};

type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

const APP_NAME: &str = "frontdesk-it";

fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        app_name: APP_NAME.to_string(),
        runtime: RuntimeKind::Echo,
        gemini_api_key: None,
        live_model: "unused".to_string(),
        toolbox_url: "http://localhost:5000".to_string(),
        toolset: "frontdesk".to_string(),
        log_level: tracing::Level::DEBUG,
        prompts_path: PathBuf::from("./prompts"),
    }
}

async fn start_test_server() -> (String, Arc<AppState>) {
    let state = Arc::new(AppState {
        sessions: Arc::new(InMemorySessionService::new()),
        runtime: Arc::new(EchoRuntime),
        config: Arc::new(test_config()),
    });
    let app = create_router(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("127.0.0.1:{}", addr.port()), state)
}

async fn connect(addr: &str, user_id: &str, session_id: &str) -> Client {
    let url = format!("ws://{addr}/ws/{user_id}/{session_id}");
    let (ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    ws
}

async fn send_json(ws: &mut Client, msg: Value) {
    ws.send(Message::Text(msg.to_string().into())).await.unwrap();
}

async fn recv_json(ws: &mut Client) -> Value {
    let msg = timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timed out waiting for server message")
        .expect("socket ended")
        .unwrap();
    serde_json::from_str(msg.to_text().unwrap()).unwrap()
}

/// Reads until the server closes the socket, returning any data frames seen.
async fn recv_until_closed(ws: &mut Client) -> Vec<Value> {
    let mut seen = Vec::new();
    loop {
        let next = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("server did not close the socket");
        match next {
            Some(Ok(Message::Text(text))) => seen.push(serde_json::from_str(&text).unwrap()),
            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return seen,
            Some(Ok(_)) => {}
        }
    }
}

#[tokio::test]
async fn test_text_is_echoed_as_agent_text() {
    let (addr, _) = start_test_server().await;
    let mut ws = connect(&addr, "u1", "s1").await;

    send_json(&mut ws, json!({"type": "text", "text": "Saya mau daftar"})).await;

    assert_eq!(
        recv_json(&mut ws).await,
        json!({"type": "agent.text", "text": "Saya mau daftar"})
    );
}

#[tokio::test]
async fn test_audio_round_trips_as_agent_audio() {
    let (addr, _) = start_test_server().await;
    let mut ws = connect(&addr, "u1", "s1").await;

    send_json(&mut ws, json!({"type": "audio.chunk", "dataB64": "AAECAwQF"})).await;

    assert_eq!(
        recv_json(&mut ws).await,
        json!({"type": "agent.audio", "format": "pcm16", "sampleRate": 24000, "dataB64": "AAECAwQF"})
    );
}

#[tokio::test]
async fn test_malformed_messages_keep_the_session_open() {
    let (addr, _) = start_test_server().await;
    let mut ws = connect(&addr, "u1", "s1").await;

    ws.send(Message::Text("{ not json".into())).await.unwrap();
    send_json(&mut ws, json!({"type": "audio.chunk", "dataB64": "***"})).await;
    send_json(&mut ws, json!({"type": "video.frame"})).await;
    send_json(&mut ws, json!({"type": "text", "text": ""})).await;
    send_json(&mut ws, json!({"type": "text", "text": "still here"})).await;

    assert_eq!(
        recv_json(&mut ws).await,
        json!({"type": "agent.text", "text": "still here"})
    );
}

#[tokio::test]
async fn test_session_stop_drains_and_closes() {
    let (addr, state) = start_test_server().await;
    let mut ws = connect(&addr, "u2", "s9").await;

    send_json(&mut ws, json!({"type": "text", "text": "one"})).await;
    send_json(&mut ws, json!({"type": "text", "text": "two"})).await;
    send_json(&mut ws, json!({"type": "session.stop"})).await;

    // Requests queued before the stop are still answered before the close.
    assert_eq!(
        recv_until_closed(&mut ws).await,
        vec![
            json!({"type": "agent.text", "text": "one"}),
            json!({"type": "agent.text", "text": "two"}),
        ]
    );

    let key = SessionKey::new(APP_NAME, "u2", "s9");
    assert!(state.sessions.get_session(&key).await.is_some());
}

#[tokio::test]
async fn test_reconnect_reuses_the_session() {
    let (addr, state) = start_test_server().await;

    for _ in 0..2 {
        let mut ws = connect(&addr, "u1", "same").await;
        send_json(&mut ws, json!({"type": "session.stop"})).await;
        recv_until_closed(&mut ws).await;
    }
    let mut other = connect(&addr, "u1", "other").await;
    send_json(&mut other, json!({"type": "session.stop"})).await;
    recv_until_closed(&mut other).await;

    assert_eq!(state.sessions.session_count().await, 2);
}

#[tokio::test]
async fn test_health_reports_app_name() {
    let (addr, _) = start_test_server().await;

    let body: Value = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body, json!({"status": "healthy", "service": APP_NAME}));
}
