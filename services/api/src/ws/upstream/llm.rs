//! Adapter for the realtime LLM socket.
//!
//! Speaks the append/commit/response.create protocol: the session is
//! configured once after connect, client audio is appended as base64, and a
//! client commit triggers input finalization plus response creation. Server
//! VAD turn detection is disabled so the explicit commit is the only
//! turn-end trigger. Incremental deltas and finalized responses are
//! normalized into `LlmEvent`s; readiness flips only once the provider
//! acknowledges session creation.

use super::{LegCommand, LegHandle, LlmEvent, leg_channel};
use crate::{audio, config::Config};
use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, protocol::Message as WsMessage},
};
use tracing::{debug, info, warn};

const SESSION_INSTRUCTIONS: &str =
    "You are a concise voice assistant. Answer briefly; your reply will be spoken aloud.";

// Wire types for the realtime socket, kept local to the adapter.
mod realtime_wire {
    use serde::{Deserialize, Serialize};

    #[derive(Serialize)]
    pub(super) struct SessionConfig {
        pub modalities: Vec<String>,
        pub instructions: String,
        pub input_audio_format: String,
        /// Always serialized as `null`: server VAD stays off so the client
        /// commit is the only turn-end trigger.
        pub turn_detection: Option<serde_json::Value>,
    }

    #[derive(Serialize)]
    #[serde(tag = "type")]
    pub(super) enum ClientEvent {
        #[serde(rename = "session.update")]
        SessionUpdate { session: SessionConfig },
        #[serde(rename = "input_audio_buffer.append")]
        InputAudioBufferAppend { audio: String },
        #[serde(rename = "input_audio_buffer.commit")]
        InputAudioBufferCommit,
        #[serde(rename = "response.create")]
        ResponseCreate,
        #[serde(rename = "response.cancel")]
        ResponseCancel,
    }

    #[derive(Deserialize, Debug)]
    #[serde(tag = "type")]
    pub(super) enum ServerEvent {
        #[serde(rename = "session.created")]
        SessionCreated,
        #[serde(rename = "session.updated")]
        SessionUpdated,
        #[serde(rename = "response.text.delta")]
        ResponseTextDelta {
            response_id: Option<String>,
            delta: String,
        },
        #[serde(rename = "response.audio_transcript.delta")]
        ResponseAudioTranscriptDelta {
            response_id: Option<String>,
            delta: String,
        },
        #[serde(rename = "response.text.done")]
        ResponseTextDone {
            response_id: Option<String>,
            text: String,
        },
        #[serde(rename = "response.audio_transcript.done")]
        ResponseAudioTranscriptDone {
            response_id: Option<String>,
            transcript: String,
        },
        #[serde(rename = "response.done")]
        ResponseDone { response: ResponseSummary },
        #[serde(rename = "error")]
        Error { error: ErrorDetail },
        #[serde(other)]
        Other,
    }

    #[derive(Deserialize, Debug)]
    pub(super) struct ResponseSummary {
        pub id: Option<String>,
    }

    #[derive(Deserialize, Debug)]
    pub(super) struct ErrorDetail {
        pub message: String,
    }
}

use realtime_wire::{ClientEvent, ServerEvent, SessionConfig};

/// Spawns the realtime LLM leg task for one session.
pub fn spawn_llm_leg(config: Arc<Config>, events: mpsc::Sender<LlmEvent>) -> LegHandle {
    let (tx, rx, ready) = leg_channel();
    let task_ready = ready.clone();
    let task = tokio::spawn(async move {
        if let Err(e) = run(&config, rx, &task_ready, &events).await {
            warn!(error = ?e, "LLM leg failed.");
        }
        task_ready.store(false, Ordering::Release);
        let _ = events.send(LlmEvent::Closed).await;
    });
    LegHandle::new("llm", tx, ready, task)
}

async fn run(
    config: &Config,
    mut rx: mpsc::Receiver<LegCommand>,
    ready: &AtomicBool,
    events: &mpsc::Sender<LlmEvent>,
) -> Result<()> {
    let mut request = config.realtime_url.as_str().into_client_request()?;
    request.headers_mut().insert(
        "Authorization",
        format!("Bearer {}", config.openai_api_key).parse()?,
    );
    request
        .headers_mut()
        .insert("OpenAI-Beta", "realtime=v1".parse()?);

    let (ws_stream, _) = connect_async(request)
        .await
        .context("Failed to connect to realtime LLM WebSocket")?;
    let (mut llm_tx, mut llm_rx) = ws_stream.split();
    info!("Connected to realtime LLM socket.");

    let session_update = ClientEvent::SessionUpdate {
        session: SessionConfig {
            modalities: vec!["text".to_string()],
            instructions: SESSION_INSTRUCTIONS.to_string(),
            input_audio_format: "pcm16".to_string(),
            turn_detection: None,
        },
    };
    llm_tx
        .send(WsMessage::Text(
            serde_json::to_string(&session_update)?.into(),
        ))
        .await?;

    loop {
        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(cmd) => {
                    let event = match cmd {
                        LegCommand::Audio(data) => ClientEvent::InputAudioBufferAppend {
                            audio: audio::encode_base64_pcm(&data),
                        },
                        LegCommand::FinalizeInput => ClientEvent::InputAudioBufferCommit,
                        LegCommand::CreateResponse => ClientEvent::ResponseCreate,
                        LegCommand::CancelResponse => ClientEvent::ResponseCancel,
                    };
                    llm_tx
                        .send(WsMessage::Text(serde_json::to_string(&event)?.into()))
                        .await?;
                }
                // The session is gone; tear the socket down.
                None => break,
            },
            msg = llm_rx.next() => match msg {
                Some(Ok(WsMessage::Text(text))) => {
                    let server_event = match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(event) => event,
                        Err(e) => {
                            debug!("Unparseable realtime message: {e}");
                            continue;
                        }
                    };
                    let forwarded = match server_event {
                        ServerEvent::SessionCreated | ServerEvent::SessionUpdated => {
                            if !ready.swap(true, Ordering::AcqRel) {
                                info!("Realtime LLM session established.");
                            }
                            None
                        }
                        ServerEvent::ResponseTextDelta { response_id, delta }
                        | ServerEvent::ResponseAudioTranscriptDelta { response_id, delta } => {
                            Some(LlmEvent::Delta { response_id, text: delta })
                        }
                        ServerEvent::ResponseTextDone { response_id, text } => {
                            Some(LlmEvent::Final { response_id, text })
                        }
                        ServerEvent::ResponseAudioTranscriptDone { response_id, transcript } => {
                            Some(LlmEvent::Final { response_id, text: transcript })
                        }
                        // Completion marker; duplicates of an already-relayed
                        // final are suppressed downstream by response id.
                        ServerEvent::ResponseDone { response } => Some(LlmEvent::Final {
                            response_id: response.id,
                            text: String::new(),
                        }),
                        ServerEvent::Error { error } => {
                            warn!("Realtime LLM error event: {}", error.message);
                            None
                        }
                        ServerEvent::Other => None,
                    };
                    if let Some(event) = forwarded {
                        if events.send(event).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    warn!(?frame, "Realtime LLM socket closed by server.");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Error reading from realtime LLM socket: {e}");
                    break;
                }
                None => break,
            },
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::realtime_wire::*;

    #[test]
    fn session_update_disables_turn_detection() {
        let event = ClientEvent::SessionUpdate {
            session: SessionConfig {
                modalities: vec!["text".to_string()],
                instructions: "hi".to_string(),
                input_audio_format: "pcm16".to_string(),
                turn_detection: None,
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"session.update""#));
        assert!(json.contains(r#""turn_detection":null"#));
    }

    #[test]
    fn commit_pair_serializes_to_the_wire_names() {
        assert_eq!(
            serde_json::to_string(&ClientEvent::InputAudioBufferCommit).unwrap(),
            r#"{"type":"input_audio_buffer.commit"}"#
        );
        assert_eq!(
            serde_json::to_string(&ClientEvent::ResponseCreate).unwrap(),
            r#"{"type":"response.create"}"#
        );
        assert_eq!(
            serde_json::to_string(&ClientEvent::ResponseCancel).unwrap(),
            r#"{"type":"response.cancel"}"#
        );
    }

    #[test]
    fn parses_transcript_done_with_response_id() {
        let event: ServerEvent = serde_json::from_str(
            r#"{"type":"response.audio_transcript.done","response_id":"resp_1",
                "transcript":"hello there"}"#,
        )
        .unwrap();
        match event {
            ServerEvent::ResponseAudioTranscriptDone {
                response_id,
                transcript,
            } => {
                assert_eq!(response_id.as_deref(), Some("resp_1"));
                assert_eq!(transcript, "hello there");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unknown_event_types_fall_through() {
        let event: ServerEvent =
            serde_json::from_str(r#"{"type":"rate_limits.updated","rate_limits":[]}"#).unwrap();
        assert!(matches!(event, ServerEvent::Other));
    }
}
