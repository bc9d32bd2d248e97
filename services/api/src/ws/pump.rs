//! The two per-connection pumps.
//!
//! The upstream pump moves client messages into the request queue, the
//! downstream pump moves agent events out to the client. Neither is cancelled
//! from outside: each one notices its own end condition and returns.

use super::{
    classify::classify,
    protocol::{ClientMessage, INPUT_AUDIO_MIME},
};
use axum::extract::ws::Message;
use base64::{Engine, engine::general_purpose::STANDARD};
use frontdesk_core::{AgentEvent, Content, LiveRequestQueue, QueueError};
use futures_util::{FutureExt, Sink, SinkExt, Stream, StreamExt};
use std::{
    fmt::Display,
    panic::{self, AssertUnwindSafe},
};
use tracing::{debug, error, info, warn};

/// Why the upstream pump stopped reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamExit {
    /// The client sent `session.stop`.
    Stopped,
    /// The client transport closed or failed.
    Disconnected,
    /// The request queue no longer accepts requests.
    QueueClosed,
}

/// Why the downstream pump stopped writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownstreamExit {
    /// The agent event stream ended.
    StreamEnded,
    /// The agent event stream yielded an error.
    StreamError,
    /// The client transport refused a write.
    ClientGone,
}

/// Reads client frames in order and turns each decoded message into one
/// queue operation.
pub async fn run_upstream<S>(mut socket_rx: S, queue: &LiveRequestQueue) -> UpstreamExit
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    while let Some(frame) = socket_rx.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(data)) => {
                warn!(len = data.len(), "Ignoring binary frame from client");
                continue;
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => continue,
            Ok(Message::Close(_)) => {
                info!("Client sent close frame.");
                return UpstreamExit::Disconnected;
            }
            Err(e) => {
                warn!(error = %e, "Error receiving from client WebSocket");
                return UpstreamExit::Disconnected;
            }
        };

        let msg = match ClientMessage::decode(text.as_str()) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "Dropping undecodable client message");
                continue;
            }
        };

        let sent = match msg {
            ClientMessage::AudioChunk { data_b64 } => match STANDARD.decode(data_b64.as_bytes()) {
                Ok(pcm) => {
                    debug!(bytes = pcm.len(), "Forwarding audio chunk");
                    queue.send_media(pcm, INPUT_AUDIO_MIME)
                }
                Err(e) => {
                    warn!(error = %e, "Dropping audio chunk with malformed base64");
                    continue;
                }
            },
            ClientMessage::Text { text } if text.is_empty() => continue,
            ClientMessage::Text { text } => {
                debug!(chars = text.chars().count(), "Forwarding text message");
                queue.send_content(Content::user_text(text))
            }
            ClientMessage::SessionStop => {
                info!("Client requested session stop.");
                return UpstreamExit::Stopped;
            }
            ClientMessage::Unknown => {
                debug!("Ignoring client message of unknown type");
                continue;
            }
        };

        if let Err(e) = sent {
            match e {
                QueueError::Closed => info!("Request queue closed; upstream pump exiting."),
                QueueError::Disconnected => warn!(error = %e, "Upstream pump exiting"),
            }
            return UpstreamExit::QueueClosed;
        }
    }
    UpstreamExit::Disconnected
}

/// Writes one wire message per classifiable event, in arrival order.
///
/// The client sink is closed on every exit path, a panic while pumping
/// included, so the client learns the session is over. A panic is re-raised
/// after the close and surfaces as the task's `JoinError`.
pub async fn run_downstream<E, W>(mut events: E, mut socket_tx: W) -> DownstreamExit
where
    E: Stream<Item = anyhow::Result<AgentEvent>> + Unpin,
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    let pumped = AssertUnwindSafe(pump_events(&mut events, &mut socket_tx))
        .catch_unwind()
        .await;

    if let Err(e) = socket_tx.close().await {
        debug!(error = %e, "Client socket already closed");
    }
    match pumped {
        Ok(exit) => exit,
        Err(panic) => {
            error!("Downstream pump panicked; client socket closed");
            panic::resume_unwind(panic)
        }
    }
}

async fn pump_events<E, W>(events: &mut E, socket_tx: &mut W) -> DownstreamExit
where
    E: Stream<Item = anyhow::Result<AgentEvent>> + Unpin,
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    loop {
        let event = match events.next().await {
            Some(Ok(event)) => event,
            Some(Err(e)) => {
                error!(error = ?e, "Agent event stream failed");
                return DownstreamExit::StreamError;
            }
            None => return DownstreamExit::StreamEnded,
        };

        if event.is_empty() {
            debug!(
                turn_complete = event.turn_complete,
                interrupted = event.interrupted,
                "Agent event without payload"
            );
            continue;
        }
        let Some(msg) = classify(&event) else {
            continue;
        };
        let encoded = match msg.encode() {
            Ok(encoded) => encoded,
            Err(e) => {
                error!(error = %e, "Failed to encode server message");
                continue;
            }
        };
        if let Err(e) = socket_tx.send(Message::Text(encoded.into())).await {
            info!(error = %e, "Client stopped accepting messages");
            return DownstreamExit::ClientGone;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frontdesk_core::{ActionResult, Blob, LiveRequest, Part, Transcription};
    use futures::{channel::mpsc, stream};
    use serde_json::{Value, json};
    use std::task::Poll;

    fn text_frame(json: &str) -> Result<Message, axum::Error> {
        Ok(Message::Text(json.to_string().into()))
    }

    fn drain(rx: &mut frontdesk_core::LiveRequestReceiver) -> Vec<LiveRequest> {
        let mut out = Vec::new();
        while let Some(Some(req)) = futures::FutureExt::now_or_never(rx.recv()) {
            out.push(req);
        }
        out
    }

    async fn sent_json(rx: mpsc::UnboundedReceiver<Message>) -> Vec<Value> {
        rx.map(|msg| match msg {
            Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("unexpected frame {other:?}"),
        })
        .collect()
        .await
    }

    #[tokio::test]
    async fn test_text_then_stop() {
        let (queue, mut rx) = LiveRequestQueue::channel();
        let frames = stream::iter(vec![
            text_frame(r#"{"type":"text","text":"hello"}"#),
            text_frame(r#"{"type":"session.stop"}"#),
            text_frame(r#"{"type":"text","text":"never read"}"#),
        ]);

        assert_eq!(run_upstream(frames, &queue).await, UpstreamExit::Stopped);
        assert_eq!(
            drain(&mut rx),
            vec![LiveRequest::Content(Content::user_text("hello"))]
        );
        assert!(!queue.is_closed());
    }

    #[tokio::test]
    async fn test_audio_chunks_are_decoded() {
        let (queue, mut rx) = LiveRequestQueue::channel();
        let frames = stream::iter(vec![text_frame(
            r#"{"type":"audio.chunk","dataB64":"AAECAw=="}"#,
        )]);

        assert_eq!(run_upstream(frames, &queue).await, UpstreamExit::Disconnected);
        assert_eq!(
            drain(&mut rx),
            vec![LiveRequest::Realtime(Blob::new(
                vec![0u8, 1, 2, 3],
                "audio/pcm;rate=16000"
            ))]
        );
    }

    #[tokio::test]
    async fn test_bad_messages_do_not_stop_the_pump() {
        let (queue, mut rx) = LiveRequestQueue::channel();
        let frames = stream::iter(vec![
            text_frame(r#"{"type":"audio.chunk","dataB64":"%%%not-base64"}"#),
            text_frame("{ this is not json"),
            text_frame(r#"{"type":"video.frame"}"#),
            text_frame(r#"{"type":"text","text":""}"#),
            Ok(Message::Binary(vec![1u8, 2].into())),
            text_frame(r#"{"type":"text","text":"still here"}"#),
        ]);

        assert_eq!(run_upstream(frames, &queue).await, UpstreamExit::Disconnected);
        assert_eq!(
            drain(&mut rx),
            vec![LiveRequest::Content(Content::user_text("still here"))]
        );
    }

    #[tokio::test]
    async fn test_close_frame_ends_upstream() {
        let (queue, mut rx) = LiveRequestQueue::channel();
        let frames = stream::iter(vec![
            Ok(Message::Close(None)),
            text_frame(r#"{"type":"text","text":"after close"}"#),
        ]);

        assert_eq!(run_upstream(frames, &queue).await, UpstreamExit::Disconnected);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_upstream_exits_when_queue_closed() {
        let (queue, _rx) = LiveRequestQueue::channel();
        queue.close();
        let frames = stream::iter(vec![
            text_frame(r#"{"type":"text","text":"late"}"#),
            text_frame(r#"{"type":"text","text":"later"}"#),
        ]);

        assert_eq!(run_upstream(frames, &queue).await, UpstreamExit::QueueClosed);
    }

    #[tokio::test]
    async fn test_downstream_preserves_order_and_skips_empty_events() {
        let events = stream::iter(vec![
            Ok(AgentEvent {
                input_transcription: Some(Transcription {
                    text: "halo".into(),
                    finished: true,
                }),
                ..Default::default()
            }),
            Ok(AgentEvent::default()),
            Ok(AgentEvent::from_content(Content::model(vec![Part::InlineData(
                Blob::new(vec![0u8, 1], "audio/pcm;rate=24000"),
            )]))),
            Ok(AgentEvent::from_actions(vec![ActionResult {
                tool: "issue_ticket".into(),
                response: r#"{"queue_no": 3}"#.into(),
            }])),
        ]);
        let (tx, rx) = mpsc::unbounded();

        assert_eq!(run_downstream(events, tx).await, DownstreamExit::StreamEnded);
        assert_eq!(
            sent_json(rx).await,
            vec![
                json!({"type": "asr.final", "text": "halo"}),
                json!({"type": "agent.audio", "format": "pcm16", "sampleRate": 24000, "dataB64": "AAE="}),
                json!({"type": "queue.issued", "queueNo": 3, "etaMinutes": 0}),
            ]
        );
    }

    #[tokio::test]
    async fn test_downstream_stops_on_stream_error() {
        let events = stream::iter(vec![
            Ok(AgentEvent::from_content(Content::model(vec![Part::Text(
                "before".into(),
            )]))),
            Err(anyhow::anyhow!("upstream socket reset")),
            Ok(AgentEvent::from_content(Content::model(vec![Part::Text(
                "after".into(),
            )]))),
        ]);
        let (tx, rx) = mpsc::unbounded();

        assert_eq!(run_downstream(events, tx).await, DownstreamExit::StreamError);
        assert_eq!(
            sent_json(rx).await,
            vec![json!({"type": "agent.text", "text": "before"})]
        );
    }

    #[tokio::test]
    async fn test_downstream_stops_when_client_is_gone() {
        let events = stream::iter(vec![Ok(AgentEvent::from_content(Content::model(vec![
            Part::Text("anyone there?".into()),
        ])))]);
        let (tx, rx) = mpsc::unbounded::<Message>();
        drop(rx);

        assert_eq!(run_downstream(events, tx).await, DownstreamExit::ClientGone);
    }

    #[tokio::test]
    async fn test_downstream_closes_client_when_it_panics() {
        let events = stream::poll_fn(|_| -> Poll<Option<anyhow::Result<AgentEvent>>> {
            panic!("event stream bug")
        });
        let (tx, rx) = mpsc::unbounded();

        let pump = tokio::spawn(run_downstream(events, tx));

        assert!(sent_json(rx).await.is_empty());
        assert!(pump.await.unwrap_err().is_panic());
    }
}
