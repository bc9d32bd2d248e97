//! An [`AgentRuntime`] backed by the Gemini Live API.
//!
//! Each `run_live` call opens one Live connection. A background task forwards
//! queued requests (and our tool responses) to Gemini; the returned stream
//! reads server frames, runs tool calls, and yields [`AgentEvent`]s. When the
//! request queue is closed the forwarder closes the socket, Gemini ends the
//! read half, and the event stream finishes.

use super::{AgentRuntime, EventStream};
use crate::{
    event::{self, AGENT_AUTHOR, ActionResult, AgentEvent, Content, Part, Transcription},
    queue::{LiveRequest, LiveRequestReceiver},
    session::SessionHandle,
    toolbox::ToolExecutor,
};
use anyhow::Result;
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use futures::stream;
use gemini_realtime::{
    LiveReceiver, LiveSender,
    types::{
        self as wire, AudioTranscriptionConfig, ClientContent, ClientMessage, FunctionResponse,
        GenerationConfig, RealtimeInput, ResponseModality, ServerMessage, SessionResumptionConfig,
        Setup, Tool, ToolCall, ToolResponse,
    },
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, error, info, warn};

pub struct GeminiLiveRuntime {
    endpoint: String,
    model: String,
    system_instruction: String,
    tools: Arc<dyn ToolExecutor>,
}

impl GeminiLiveRuntime {
    /// # Arguments
    ///
    /// * `model` - Live model id, with or without the `models/` prefix.
    /// * `system_instruction` - Prompt sent at setup; skipped when empty.
    /// * `tools` - Executor for the functions the model may call.
    pub fn new(
        api_key: String,
        model: String,
        system_instruction: String,
        tools: Arc<dyn ToolExecutor>,
    ) -> Self {
        Self {
            endpoint: gemini_realtime::endpoint(&api_key),
            model,
            system_instruction,
            tools,
        }
    }

    /// Points the runtime at another Live endpoint, e.g. a local server.
    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = url.into();
        self
    }

    fn setup(&self, resumption_handle: Option<String>) -> Setup {
        let model = if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        };
        let declarations = self.tools.declarations();
        Setup {
            model,
            generation_config: GenerationConfig {
                response_modalities: vec![ResponseModality::Audio],
            },
            system_instruction: (!self.system_instruction.is_empty()).then(|| wire::Content {
                role: None,
                parts: vec![wire::Part::text(self.system_instruction.clone())],
            }),
            tools: if declarations.is_empty() {
                vec![]
            } else {
                vec![Tool {
                    function_declarations: declarations,
                }]
            },
            input_audio_transcription: Some(AudioTranscriptionConfig::default()),
            output_audio_transcription: Some(AudioTranscriptionConfig::default()),
            session_resumption: Some(SessionResumptionConfig {
                handle: resumption_handle,
            }),
        }
    }
}

#[async_trait]
impl AgentRuntime for GeminiLiveRuntime {
    async fn run_live(
        &self,
        session: SessionHandle,
        requests: LiveRequestReceiver,
    ) -> Result<EventStream> {
        let handle = session.resumption_handle();
        if handle.is_some() {
            info!(session = %session.key(), "Resuming Gemini Live session from stored handle");
        }
        let (sender, receiver) =
            gemini_realtime::connect_to(&self.endpoint, self.setup(handle)).await?;

        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        tokio::spawn(forward_requests(sender, requests, reply_rx).in_current_span());

        let events = LiveEvents {
            receiver,
            session,
            tools: self.tools.clone(),
            reply_tx,
            failed: false,
        };
        Ok(Box::pin(stream::unfold(events, |mut events| async move {
            let item = events.next_event().await?;
            Some((item, events))
        })))
    }
}

/// Writes queued requests and tool responses to Gemini until the queue closes.
async fn forward_requests(
    mut sender: LiveSender,
    mut requests: LiveRequestReceiver,
    mut replies: mpsc::UnboundedReceiver<ClientMessage>,
) {
    loop {
        let msg = tokio::select! {
            request = requests.recv() => match request {
                Some(request) => to_client_message(request),
                None => break,
            },
            Some(reply) = replies.recv() => reply,
        };
        if let Err(e) = sender.send(&msg).await {
            error!(error = ?e, "Failed to forward request to Gemini Live");
            break;
        }
    }
    debug!("Request queue finished, closing Gemini Live connection");
    if let Err(e) = sender.close().await {
        debug!(error = ?e, "Gemini Live connection was already closed");
    }
}

fn to_client_message(request: LiveRequest) -> ClientMessage {
    match request {
        LiveRequest::Realtime(blob) => ClientMessage::RealtimeInput(RealtimeInput {
            audio: Some(wire::Blob {
                mime_type: blob.mime_type,
                data: STANDARD.encode(&blob.data),
            }),
        }),
        LiveRequest::Content(content) => ClientMessage::ClientContent(ClientContent {
            turns: vec![wire::Content {
                role: Some(content.role.unwrap_or_else(|| "user".to_string())),
                parts: content.parts.into_iter().map(to_wire_part).collect(),
            }],
            turn_complete: true,
        }),
    }
}

fn to_wire_part(part: Part) -> wire::Part {
    match part {
        Part::Text(text) => wire::Part::text(text),
        Part::InlineData(blob) => wire::Part {
            text: None,
            inline_data: Some(wire::Blob {
                mime_type: blob.mime_type,
                data: STANDARD.encode(&blob.data),
            }),
        },
    }
}

struct LiveEvents {
    receiver: LiveReceiver,
    session: SessionHandle,
    tools: Arc<dyn ToolExecutor>,
    reply_tx: mpsc::UnboundedSender<ClientMessage>,
    failed: bool,
}

impl LiveEvents {
    async fn next_event(&mut self) -> Option<Result<AgentEvent>> {
        if self.failed {
            return None;
        }
        loop {
            let msg = match self.receiver.next_message().await? {
                Ok(msg) => msg,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            };

            if let Some(update) = &msg.session_resumption_update {
                if update.resumable {
                    if let Some(handle) = &update.new_handle {
                        self.session.set_resumption_handle(Some(handle.clone()));
                    }
                }
            }
            if let Some(go_away) = &msg.go_away {
                warn!(time_left = ?go_away.time_left, "Gemini Live will close the connection soon");
            }
            if let Some(cancelled) = &msg.tool_call_cancellation {
                debug!(ids = ?cancelled.ids, "Gemini Live cancelled tool calls");
            }

            let mut event = to_agent_event(&msg);
            if let Some(call) = msg.tool_call {
                let (responses, actions) = run_tool_calls(self.tools.as_ref(), call).await;
                let reply = ClientMessage::ToolResponse(ToolResponse {
                    function_responses: responses,
                });
                if self.reply_tx.send(reply).is_err() {
                    warn!("Request forwarder has stopped; dropping tool response");
                }
                event
                    .get_or_insert_with(|| AgentEvent::from_actions(Vec::new()))
                    .actions = actions;
            }
            if let Some(event) = event {
                return Some(Ok(event));
            }
        }
    }
}

/// Converts the content part of a server frame into an event.
fn to_agent_event(msg: &ServerMessage) -> Option<AgentEvent> {
    let content = msg.server_content.as_ref()?;
    let parts: Vec<Part> = content
        .model_turn
        .iter()
        .flat_map(|turn| turn.parts.iter())
        .filter_map(|part| {
            if let Some(blob) = &part.inline_data {
                match STANDARD.decode(&blob.data) {
                    Ok(data) => Some(Part::InlineData(event::Blob::new(
                        data,
                        blob.mime_type.clone(),
                    ))),
                    Err(e) => {
                        warn!(error = %e, "Dropping inline data with invalid base64");
                        None
                    }
                }
            } else {
                part.text.clone().map(Part::Text)
            }
        })
        .collect();
    let transcription = |t: &wire::Transcription| Transcription {
        text: t.text.clone(),
        finished: t.finished.unwrap_or(false),
    };

    Some(AgentEvent {
        author: Some(AGENT_AUTHOR.to_string()),
        content: content.model_turn.as_ref().map(|_| Content::model(parts)),
        input_transcription: content.input_transcription.as_ref().map(transcription),
        output_transcription: content.output_transcription.as_ref().map(transcription),
        actions: Vec::new(),
        turn_complete: content.turn_complete.unwrap_or(false),
        interrupted: content.interrupted.unwrap_or(false),
    })
}

/// Runs every function call in `call`, in order.
///
/// Returns the responses to send back to Gemini and the matching action
/// results to surface on the event. A failing tool answers with an error
/// object rather than aborting the remaining calls.
async fn run_tool_calls(
    tools: &dyn ToolExecutor,
    call: ToolCall,
) -> (Vec<FunctionResponse>, Vec<ActionResult>) {
    let mut responses = Vec::with_capacity(call.function_calls.len());
    let mut actions = Vec::with_capacity(call.function_calls.len());
    for function in call.function_calls {
        let args = function.args.unwrap_or_else(|| json!({}));
        let (response, payload) = match tools.invoke(&function.name, args).await {
            Ok(result) => {
                info!(tool = %function.name, "Tool call completed");
                (json!({ "result": result }), result)
            }
            Err(e) => {
                warn!(tool = %function.name, error = ?e, "Tool call failed");
                let error = json!({ "error": e.to_string() });
                (error.clone(), error.to_string())
            }
        };
        responses.push(FunctionResponse {
            id: function.id,
            name: function.name.clone(),
            response,
        });
        actions.push(ActionResult {
            tool: function.name,
            response: payload,
        });
    }
    (responses, actions)
}
