//! Relay Core Library Crate
//!
//! Provider-agnostic logic for the voice relay pipeline. Everything in this
//! crate is either pure (no I/O) or a thin client trait, so the whole
//! turn-taking pipeline can be exercised in unit tests without a socket:
//!
//! - `assembler`: batches inbound PCM16 audio into provider-ready windows.
//! - `gate`: filters and deduplicates finalized transcripts.
//! - `turn`: the turn-taking state machine (interruption, commit protocol).
//! - `wav`: canonical RIFF/WAVE encoding for recorded audio windows.
//! - `llm`: the request/response LLM client used in chat mode.

pub mod assembler;
pub mod gate;
pub mod llm;
pub mod turn;
pub mod wav;
