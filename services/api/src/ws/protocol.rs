//! Defines the WebSocket message protocol between the browser client and the API server.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// MIME type attached to microphone audio forwarded to the agent.
pub const INPUT_AUDIO_MIME: &str = "audio/pcm;rate=16000";
/// Sample rate of the agent's synthesized speech.
pub const OUTPUT_SAMPLE_RATE: u32 = 24000;
pub const OUTPUT_AUDIO_FORMAT: &str = "pcm16";

/// Messages sent from the client (browser) to the server.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// A chunk of microphone audio, base64 encoded PCM16 mono at 16 kHz.
    #[serde(rename = "audio.chunk")]
    AudioChunk {
        #[serde(rename = "dataB64", default)]
        data_b64: String,
    },
    /// A typed message from the user.
    #[serde(rename = "text")]
    Text {
        #[serde(default)]
        text: String,
    },
    /// The client is ending the session.
    #[serde(rename = "session.stop")]
    SessionStop,
    /// Any message type this server does not know. Ignored.
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    pub fn decode(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Messages sent from the server to the client (browser).
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// A chunk of the agent's voice.
    #[serde(rename = "agent.audio")]
    AgentAudio {
        format: String,
        #[serde(rename = "sampleRate")]
        sample_rate: u32,
        #[serde(rename = "dataB64")]
        data_b64: String,
    },
    /// Text produced by the agent.
    #[serde(rename = "agent.text")]
    AgentText { text: String },
    /// An in-progress transcription of the user's speech.
    #[serde(rename = "asr.partial")]
    AsrPartial { text: String },
    /// A finished transcription of the user's speech.
    #[serde(rename = "asr.final")]
    AsrFinal { text: String },
    /// A transcription of what the agent said aloud.
    #[serde(rename = "agent.transcript")]
    AgentTranscript { text: String },
    /// A queue ticket issued by one of the agent's tools.
    #[serde(rename = "queue.issued")]
    QueueIssued {
        #[serde(rename = "queueNo")]
        queue_no: Value,
        #[serde(rename = "etaMinutes")]
        eta_minutes: Number,
    },
}

impl ServerMessage {
    /// Wraps raw PCM16 agent audio.
    pub fn agent_audio(pcm: &[u8]) -> Self {
        Self::AgentAudio {
            format: OUTPUT_AUDIO_FORMAT.to_string(),
            sample_rate: OUTPUT_SAMPLE_RATE,
            data_b64: STANDARD.encode(pcm),
        }
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
