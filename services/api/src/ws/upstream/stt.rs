//! Adapter for a streaming speech-to-text socket.
//!
//! Connects to a Deepgram-style listen endpoint, forwards raw PCM16 frames,
//! and normalizes the provider's result messages into `TranscriptEvent`s.
//! This file is the only place the provider's event names and payload shapes
//! are known.

use super::{LegCommand, LegHandle, SttEvent, leg_channel};
use crate::config::Config;
use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use relay_core::gate::TranscriptEvent;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, protocol::Message as WsMessage},
};
use tracing::{debug, info, warn};

// Wire types for the listen socket, kept local to the adapter.
mod listen_wire {
    use serde::Deserialize;

    #[derive(Deserialize, Debug)]
    pub(super) struct ListenMessage {
        #[serde(rename = "type")]
        pub kind: Option<String>,
        pub is_final: Option<bool>,
        /// Start offset of the utterance in seconds; stable across repeated
        /// finalizations of the same segment.
        pub start: Option<f64>,
        pub channel: Option<Channel>,
    }

    #[derive(Deserialize, Debug)]
    pub(super) struct Channel {
        pub alternatives: Vec<Alternative>,
    }

    #[derive(Deserialize, Debug)]
    pub(super) struct Alternative {
        pub transcript: String,
    }
}

/// Spawns the STT leg task for one session.
pub fn spawn_stt_leg(
    config: Arc<Config>,
    sample_rate: u32,
    events: mpsc::Sender<SttEvent>,
) -> LegHandle {
    let (tx, rx, ready) = leg_channel();
    let task_ready = ready.clone();
    let task = tokio::spawn(async move {
        if let Err(e) = run(&config, sample_rate, rx, &task_ready, &events).await {
            warn!(error = ?e, "STT leg failed.");
        }
        task_ready.store(false, Ordering::Release);
        let _ = events.send(SttEvent::Closed).await;
    });
    LegHandle::new("stt", tx, ready, task)
}

/// Connects, configures, and proxies the listen socket until either side
/// goes away. Configuration is passed as opaque query parameters.
async fn run(
    config: &Config,
    sample_rate: u32,
    mut rx: mpsc::Receiver<LegCommand>,
    ready: &AtomicBool,
    events: &mpsc::Sender<SttEvent>,
) -> Result<()> {
    let url = format!(
        "{}?model={}&language={}&encoding=linear16&sample_rate={}&channels=1&vad_events=true&punctuate=true&interim_results=false",
        config.stt_url, config.stt_model, config.stt_language, sample_rate
    );
    let mut request = url.into_client_request()?;
    request.headers_mut().insert(
        "Authorization",
        format!("Token {}", config.stt_api_key).parse()?,
    );

    let (ws_stream, _) = connect_async(request)
        .await
        .context("Failed to connect to STT WebSocket")?;
    let (mut stt_tx, mut stt_rx) = ws_stream.split();
    ready.store(true, Ordering::Release);
    info!("Connected to STT socket.");

    loop {
        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(LegCommand::Audio(data)) => {
                    stt_tx.send(WsMessage::Binary(data)).await?;
                }
                Some(other) => debug!(?other, "Command not applicable to the STT leg."),
                // The session is gone; tear the socket down.
                None => break,
            },
            msg = stt_rx.next() => match msg {
                Some(Ok(WsMessage::Text(text))) => {
                    if let Some(event) = parse_listen_message(&text) {
                        if events.send(SttEvent::Transcript(event)).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    warn!(?frame, "STT socket closed by server.");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Error reading from STT socket: {e}");
                    break;
                }
                None => break,
            },
        }
    }
    Ok(())
}

/// Translates one provider message into the internal transcript shape.
/// Anything that is not a transcript result is dropped here.
fn parse_listen_message(text: &str) -> Option<TranscriptEvent> {
    let msg: listen_wire::ListenMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            debug!("Unparseable STT message: {e}");
            return None;
        }
    };
    if msg.kind.as_deref() != Some("Results") {
        return None;
    }
    let transcript = msg.channel?.alternatives.into_iter().next()?.transcript;
    Some(TranscriptEvent {
        text: transcript,
        // Keyed by utterance start so repeated finalizations of the same
        // segment dedup in the gate.
        utterance_id: msg.start.map(|s| format!("{s:.3}")),
        is_final: msg.is_final.unwrap_or(false),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_final_result() {
        let event = parse_listen_message(
            r#"{"type":"Results","is_final":true,"start":1.52,
                "channel":{"alternatives":[{"transcript":"hello world"}]}}"#,
        )
        .unwrap();
        assert_eq!(event.text, "hello world");
        assert_eq!(event.utterance_id.as_deref(), Some("1.520"));
        assert!(event.is_final);
    }

    #[test]
    fn interim_results_are_not_final() {
        let event = parse_listen_message(
            r#"{"type":"Results","is_final":false,"start":0.0,
                "channel":{"alternatives":[{"transcript":"hel"}]}}"#,
        )
        .unwrap();
        assert!(!event.is_final);
    }

    #[test]
    fn non_result_messages_are_dropped() {
        assert!(parse_listen_message(r#"{"type":"Metadata","request_id":"abc"}"#).is_none());
        assert!(parse_listen_message(r#"{"type":"UtteranceEnd","last_word_end":2.1}"#).is_none());
        assert!(parse_listen_message("not json").is_none());
    }

    #[test]
    fn repeated_finalizations_share_an_utterance_id() {
        let a = parse_listen_message(
            r#"{"type":"Results","is_final":true,"start":3.0,
                "channel":{"alternatives":[{"transcript":"same words"}]}}"#,
        )
        .unwrap();
        let b = parse_listen_message(
            r#"{"type":"Results","is_final":true,"start":3.0,
                "channel":{"alternatives":[{"transcript":"same words"}]}}"#,
        )
        .unwrap();
        assert_eq!(a.utterance_id, b.utterance_id);
    }
}
