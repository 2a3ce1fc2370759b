//! Defines the WebSocket message protocol between the client and the relay.

use serde::{Deserialize, Serialize};

/// Messages sent from the client to the relay. Clients may alternatively
/// send raw binary frames carrying PCM16 audio; those bypass this enum.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// One audio frame: base64 PCM16 plus its declared sample rate.
    AudioChunk {
        #[serde(rename = "sampleRate")]
        sample_rate: Option<u32>,
        audio: String,
    },
    /// End of the user utterance; triggers response generation.
    Commit,
    /// Reserved; currently a no-op.
    Control,
}

/// Messages sent from the relay to the client. This is the complete
/// outbound set; no other shapes are emitted.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Liveness heartbeat, sent on a fixed interval.
    Ping,
    /// A transcript notice; carries the recorded file name when the flushed
    /// window was persisted to disk.
    Transcript {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
    },
    /// An incremental delta of assistant text.
    Partial { text: String },
    /// The final assistant reply for one turn.
    LlmResponse {
        #[serde(skip_serializing_if = "Option::is_none")]
        transcript: Option<String>,
        response: String,
    },
}
