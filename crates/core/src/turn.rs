//! The turn-taking state machine governing whose turn it is to speak.

use tracing::debug;

/// Whether the assistant is currently producing a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// Listening; new client audio is the normal case.
    Idle,
    /// An assistant response is in flight; new client audio interrupts it.
    AssistantSpeaking,
}

/// Instructions the controller issues to the LLM leg. The dispatcher forwards
/// these verbatim; the leg adapter translates them to provider events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmInstruction {
    /// Mark the buffered user input as complete.
    FinalizeInput,
    /// Ask the provider to generate a response.
    CreateResponse,
    /// Best-effort cancel of the in-flight response.
    CancelResponse,
}

/// Per-session turn controller.
///
/// Lives for the session's duration; there is no terminal state. Also owns
/// the at-most-one-relayed-final-per-response-id invariant, since the same
/// finalization can arrive on multiple provider event types.
#[derive(Debug, Default)]
pub struct TurnController {
    speaking: bool,
    last_final_response_id: Option<String>,
}

impl TurnController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TurnState {
        if self.speaking {
            TurnState::AssistantSpeaking
        } else {
            TurnState::Idle
        }
    }

    /// An assistant text/audio delta arrived: the assistant is now speaking.
    pub fn on_assistant_delta(&mut self) {
        self.speaking = true;
    }

    /// An assistant final event arrived. Returns whether this final may be
    /// relayed to the client (duplicates of an already-relayed response id
    /// are suppressed). Either way the assistant is done speaking.
    pub fn on_assistant_final(&mut self, response_id: Option<&str>) -> bool {
        self.speaking = false;
        if let Some(id) = response_id {
            if self.last_final_response_id.as_deref() == Some(id) {
                debug!(response_id = %id, "Suppressing duplicate final response.");
                return false;
            }
            self.last_final_response_id = Some(id.to_string());
        }
        true
    }

    /// New client audio arrived. While the assistant is speaking this is an
    /// interruption: exactly one cancel instruction is issued and the
    /// controller returns to `Idle` optimistically, without waiting for the
    /// cancel to be acknowledged. In `Idle` it is a no-op.
    pub fn on_client_audio(&mut self) -> Option<LlmInstruction> {
        if self.speaking {
            self.speaking = false;
            debug!("Client audio interrupts assistant response.");
            Some(LlmInstruction::CancelResponse)
        } else {
            None
        }
    }

    /// The client committed its utterance. The two instructions are always
    /// issued back-to-back in this order and never reordered.
    pub fn on_commit(&self) -> [LlmInstruction; 2] {
        [LlmInstruction::FinalizeInput, LlmInstruction::CreateResponse]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        assert_eq!(TurnController::new().state(), TurnState::Idle);
    }

    #[test]
    fn delta_moves_to_speaking_and_final_returns_to_idle() {
        let mut turn = TurnController::new();
        turn.on_assistant_delta();
        assert_eq!(turn.state(), TurnState::AssistantSpeaking);
        assert!(turn.on_assistant_final(Some("resp-1")));
        assert_eq!(turn.state(), TurnState::Idle);
    }

    #[test]
    fn client_audio_while_speaking_cancels_exactly_once() {
        let mut turn = TurnController::new();
        turn.on_assistant_delta();
        assert_eq!(turn.on_client_audio(), Some(LlmInstruction::CancelResponse));
        assert_eq!(turn.state(), TurnState::Idle);
        // Already idle: further audio emits no cancel.
        assert_eq!(turn.on_client_audio(), None);
        assert_eq!(turn.on_client_audio(), None);
    }

    #[test]
    fn client_audio_while_idle_is_a_no_op() {
        let mut turn = TurnController::new();
        assert_eq!(turn.on_client_audio(), None);
        assert_eq!(turn.state(), TurnState::Idle);
    }

    #[test]
    fn duplicate_final_response_id_is_suppressed() {
        let mut turn = TurnController::new();
        turn.on_assistant_delta();
        assert!(turn.on_assistant_final(Some("resp-1")));
        assert!(!turn.on_assistant_final(Some("resp-1")));
        assert!(turn.on_assistant_final(Some("resp-2")));
    }

    #[test]
    fn finals_without_id_are_always_relayed() {
        let mut turn = TurnController::new();
        assert!(turn.on_assistant_final(None));
        assert!(turn.on_assistant_final(None));
    }

    #[test]
    fn commit_yields_finalize_then_create() {
        let turn = TurnController::new();
        assert_eq!(
            turn.on_commit(),
            [LlmInstruction::FinalizeInput, LlmInstruction::CreateResponse]
        );
    }
}
