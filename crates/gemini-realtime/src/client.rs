//! Connection handling for the Gemini Live WebSocket.

use crate::types::{ClientMessage, ServerMessage, Setup};
use anyhow::{Context, Result, bail};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message as WsMessage,
};
use tracing::{debug, info, warn};

pub const LIVE_API_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

type LiveSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// The write half of a Live connection.
pub struct LiveSender {
    sink: SplitSink<LiveSocket, WsMessage>,
}

impl LiveSender {
    pub async fn send(&mut self, msg: &ClientMessage) -> Result<()> {
        let payload = serde_json::to_string(msg)?;
        self.sink.send(WsMessage::Text(payload.into())).await?;
        Ok(())
    }

    /// Sends a close frame. The server answers by ending the read half.
    pub async fn close(&mut self) -> Result<()> {
        self.sink.close().await?;
        Ok(())
    }
}

/// The read half of a Live connection.
pub struct LiveReceiver {
    stream: SplitStream<LiveSocket>,
}

impl LiveReceiver {
    /// Returns the next decoded server frame, or `None` once the socket is closed.
    ///
    /// Gemini sends JSON in both text and binary frames; both are accepted.
    pub async fn next_message(&mut self) -> Option<Result<ServerMessage>> {
        while let Some(frame) = self.stream.next().await {
            let decoded = match frame {
                Ok(WsMessage::Text(text)) => decode(text.as_str()),
                Ok(WsMessage::Binary(data)) => std::str::from_utf8(&data)
                    .context("Gemini sent a non UTF-8 binary frame")
                    .and_then(decode),
                Ok(WsMessage::Close(close_frame)) => {
                    info!(?close_frame, "Gemini Live connection closed by server.");
                    return None;
                }
                Ok(_) => continue,
                Err(e) => return Some(Err(e).context("Error reading from Gemini Live WebSocket")),
            };
            return Some(decoded);
        }
        None
    }
}

fn decode(text: &str) -> Result<ServerMessage> {
    serde_json::from_str(text)
        .with_context(|| format!("Failed to parse Gemini Live message: {}", text))
}

/// Opens a Live session against the public Gemini endpoint.
pub async fn connect(api_key: &str, setup: Setup) -> Result<(LiveSender, LiveReceiver)> {
    connect_to(&endpoint(api_key), setup).await
}

/// The Gemini Live URL authenticated with `api_key`.
pub fn endpoint(api_key: &str) -> String {
    format!("{}?key={}", LIVE_API_URL, api_key)
}

/// Opens a Live session at `url`: connects, sends `setup`, and waits for
/// `setupComplete`.
pub async fn connect_to(url: &str, setup: Setup) -> Result<(LiveSender, LiveReceiver)> {
    let model = setup.model.clone();

    let (ws_stream, _) = connect_async(url)
        .await
        .context("Failed to connect to Gemini Live WebSocket")?;
    let (sink, stream) = ws_stream.split();
    let mut sender = LiveSender { sink };
    let mut receiver = LiveReceiver { stream };
    info!(%model, "Connected to Gemini Live WebSocket.");

    sender.send(&ClientMessage::Setup(setup)).await?;

    loop {
        match receiver.next_message().await {
            Some(Ok(msg)) if msg.setup_complete.is_some() => {
                debug!("Gemini Live setup complete.");
                return Ok((sender, receiver));
            }
            Some(Ok(msg)) => warn!(?msg, "Ignoring message received before setup completed."),
            Some(Err(e)) => return Err(e),
            None => bail!("Gemini Live closed the connection during setup"),
        }
    }
}
