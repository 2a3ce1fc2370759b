//! Manages the client WebSocket lifecycle: the per-session dispatcher loop.
//!
//! One task per connection wires the audio assembler, transcript gate, and
//! turn controller to the upstream legs, relays normalized messages back to
//! the client, and emits a liveness heartbeat so idle-connection reapers in
//! intermediary infrastructure do not drop the socket. No failure on an
//! upstream or client boundary is allowed to escape this loop.

use super::{
    protocol::{ClientMessage, ServerMessage},
    upstream::{self, LegCommand, LegHandle, LlmEvent, SttEvent},
};
use crate::{
    audio,
    config::{Config, Framing, LlmMode},
    state::AppState,
};
use anyhow::Result;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use relay_core::{
    assembler::{AudioFrame, FrameAssembler, FramingMode},
    gate::TranscriptGate,
    turn::{LlmInstruction, TurnController},
    wav,
};
use std::{sync::Arc, time::Duration};
use tokio::{sync::mpsc, task::JoinHandle, time::MissedTickBehavior};
use tracing::{Instrument, debug, error, info, instrument, warn};
use uuid::Uuid;

/// How often the client receives a `{"type":"ping"}`, independent of traffic.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(8);

/// Assumed until the client declares a rate on an audio chunk.
const DEFAULT_SAMPLE_RATE: u32 = 16_000;

/// Reply relayed when a chat completion fails outright.
const FALLBACK_REPLY: &str = "I'm sorry, I couldn't process that.";

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Entry point for a new connection: registers the session, runs the
/// dispatcher loop, and unregisters on the way out.
#[instrument(name = "ws_session", skip_all, fields(session_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id = Uuid::new_v4();
    tracing::Span::current().record("session_id", &session_id.to_string());
    info!("Client connected.");

    if let Ok(mut sessions) = state.sessions.lock() {
        sessions.insert(session_id);
    }

    let session_span = tracing::info_span!("relay_session", %session_id);
    run_session(state.clone(), socket).instrument(session_span).await;

    if let Ok(mut sessions) = state.sessions.lock() {
        sessions.remove(&session_id);
    }
    info!("Client disconnected; session discarded.");
}

/// The main event loop for an active session.
///
/// Inbound client messages are processed in arrival order; the heartbeat,
/// STT events, and LLM events are multiplexed into the same single task, so
/// the session needs no internal locking.
async fn run_session(state: Arc<AppState>, socket: WebSocket) {
    let (mut socket_tx, mut socket_rx) = socket.split();

    let (stt_events_tx, mut stt_events) = mpsc::channel(64);
    let (llm_events_tx, mut llm_events) = mpsc::channel(64);

    let framing = match state.config.framing {
        Framing::PassThrough => FramingMode::PassThrough,
        Framing::Windowed => FramingMode::Windowed {
            window_seconds: state.config.window_seconds,
        },
    };
    let mut assembler = FrameAssembler::new(framing, DEFAULT_SAMPLE_RATE);
    let mut gate = TranscriptGate::new();
    let mut turn = TurnController::new();

    let stt = upstream::stt::spawn_stt_leg(
        state.config.clone(),
        assembler.sample_rate(),
        stt_events_tx,
    );
    let llm = match state.config.llm_mode {
        LlmMode::Realtime => Some(upstream::llm::spawn_llm_leg(
            state.config.clone(),
            llm_events_tx.clone(),
        )),
        LlmMode::Chat => None,
    };

    // In-flight chat completion, if any; aborted on interruption.
    let mut pending_chat: Option<JoinHandle<()>> = None;
    // File name of the most recent recorded window, attached to the next
    // final transcript notice.
    let mut last_recording: Option<String> = None;

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    heartbeat.tick().await; // the first tick is immediate

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                safe_send(&mut socket_tx, ServerMessage::Ping).await;
            },
            msg = socket_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let parsed = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(parsed) => parsed,
                            Err(e) => {
                                warn!("Dropping malformed client message: {e}");
                                continue;
                            }
                        };
                        match parsed {
                            ClientMessage::AudioChunk { sample_rate, audio } => {
                                ingest_client_audio(
                                    audio::decode_base64_pcm(&audio),
                                    sample_rate,
                                    &state.config,
                                    &mut assembler,
                                    &mut turn,
                                    &stt,
                                    llm.as_ref(),
                                    &mut pending_chat,
                                    &mut last_recording,
                                );
                            }
                            ClientMessage::Commit => {
                                if let Some(leg) = &llm {
                                    // Finalize-then-request, back-to-back.
                                    for instruction in turn.on_commit() {
                                        leg.send(match instruction {
                                            LlmInstruction::FinalizeInput => LegCommand::FinalizeInput,
                                            LlmInstruction::CreateResponse => LegCommand::CreateResponse,
                                            LlmInstruction::CancelResponse => LegCommand::CancelResponse,
                                        });
                                    }
                                } else {
                                    debug!("Commit is a no-op in chat mode.");
                                }
                            }
                            ClientMessage::Control => {
                                debug!("Ignoring reserved control message.");
                            }
                        }
                    }
                    // Raw binary frames are the pass-through audio encoding.
                    Some(Ok(Message::Binary(data))) => {
                        ingest_client_audio(
                            data.to_vec(),
                            None,
                            &state.config,
                            &mut assembler,
                            &mut turn,
                            &stt,
                            llm.as_ref(),
                            &mut pending_chat,
                            &mut last_recording,
                        );
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client sent close frame.");
                        break;
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                    Some(Err(e)) => {
                        error!("Error receiving from client WebSocket: {e}");
                        break;
                    }
                    None => break,
                }
            },
            Some(event) = stt_events.recv() => {
                match event {
                    SttEvent::Transcript(event) if !event.is_final => {
                        safe_send(&mut socket_tx, ServerMessage::Transcript {
                            text: event.text,
                            filename: None,
                        }).await;
                    }
                    SttEvent::Transcript(event) => {
                        if let Some(text) = gate.accept(event) {
                            let filename = last_recording.take();
                            safe_send(&mut socket_tx, ServerMessage::Transcript {
                                text: text.clone(),
                                filename,
                            }).await;
                            if llm.is_none() {
                                // Chat mode: one completion per accepted
                                // transcript, off the loop so the heartbeat
                                // keeps running while the model thinks.
                                turn.on_assistant_delta();
                                if let Some(handle) = pending_chat.take() {
                                    handle.abort();
                                }
                                pending_chat = Some(spawn_chat_turn(
                                    state.clone(),
                                    text,
                                    llm_events_tx.clone(),
                                ));
                            }
                        }
                    }
                    SttEvent::Closed => {
                        warn!("STT leg closed; session degraded.");
                    }
                }
            },
            Some(event) = llm_events.recv() => {
                match event {
                    LlmEvent::Delta { text, .. } => {
                        turn.on_assistant_delta();
                        safe_send(&mut socket_tx, ServerMessage::Partial { text }).await;
                    }
                    LlmEvent::Final { response_id, text } => {
                        if turn.on_assistant_final(response_id.as_deref()) && !text.is_empty() {
                            safe_send(&mut socket_tx, ServerMessage::LlmResponse {
                                transcript: None,
                                response: text,
                            }).await;
                        }
                    }
                    LlmEvent::ChatCompleted { transcript, response } => {
                        turn.on_assistant_final(None);
                        pending_chat = None;
                        safe_send(&mut socket_tx, ServerMessage::LlmResponse {
                            transcript: Some(transcript),
                            response,
                        }).await;
                    }
                    LlmEvent::Closed => {
                        warn!("LLM leg closed; session degraded.");
                    }
                }
            },
            else => break,
        }
    }

    if let Some(handle) = pending_chat.take() {
        handle.abort();
    }
    stt.close();
    if let Some(leg) = &llm {
        leg.close();
    }
}

/// Runs one decoded client audio payload through the interruption check and
/// the assembler, forwarding a flushed batch to the upstream legs.
#[allow(clippy::too_many_arguments)]
fn ingest_client_audio(
    bytes: Vec<u8>,
    declared_rate: Option<u32>,
    config: &Config,
    assembler: &mut FrameAssembler,
    turn: &mut TurnController,
    stt: &LegHandle,
    llm: Option<&LegHandle>,
    pending_chat: &mut Option<JoinHandle<()>>,
    last_recording: &mut Option<String>,
) {
    if bytes.is_empty() {
        debug!("Dropping audio chunk with empty payload.");
        return;
    }

    if turn.on_client_audio().is_some() {
        // Fire-and-forget: the turn controller has already returned to Idle.
        match llm {
            Some(leg) => {
                leg.send(LegCommand::CancelResponse);
            }
            None => {
                if let Some(handle) = pending_chat.take() {
                    handle.abort();
                    info!("Interrupted in-flight chat completion.");
                }
            }
        }
    }

    let rate = declared_rate.unwrap_or(assembler.sample_rate());
    let Some(batch) = assembler.ingest(AudioFrame::new(bytes, rate)) else {
        return;
    };

    if let Some(dir) = &config.record_dir {
        let path = dir.join(format!("audio_{}.wav", Uuid::new_v4()));
        match std::fs::write(&path, wav::encode_wav(&batch.bytes, batch.sample_rate)) {
            Ok(()) => *last_recording = Some(path.to_string_lossy().into_owned()),
            Err(e) => warn!("Failed to write recording: {e}"),
        }
    }

    let payload = Bytes::from(batch.bytes);
    stt.send(LegCommand::Audio(payload.clone()));
    if let Some(leg) = llm {
        leg.send(LegCommand::Audio(payload));
    }
}

/// Spawns one chat-mode turn: completion request in, `ChatCompleted` out.
fn spawn_chat_turn(
    state: Arc<AppState>,
    transcript: String,
    events: mpsc::Sender<LlmEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let response = match state.llm_client.complete(&transcript).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Chat completion failed: {e}");
                FALLBACK_REPLY.to_string()
            }
        };
        let _ = events
            .send(LlmEvent::ChatCompleted {
                transcript,
                response,
            })
            .await;
    })
}

/// Serializes and sends one `ServerMessage` to the client.
async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}

/// A send failure (socket already closing) is contained to a log line; it
/// must never propagate out of the dispatcher loop.
async fn safe_send(socket_tx: &mut SplitSink<WebSocket, Message>, msg: ServerMessage) {
    if let Err(e) = send_msg(socket_tx, msg).await {
        warn!("Client send failed: {e}");
    }
}
