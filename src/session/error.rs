use thiserror::Error;

use crate::audio::AudioError;
use crate::dialogue::DialogueError;

use super::lifecycle::CallPhase;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CallError {
    #[error("failed to start call: {0}")]
    Start(DialogueError),
    #[error("failed to submit turn: {0}")]
    Turn(DialogueError),
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error("conversation id is already assigned")]
    ConversationAlreadyAssigned,
    #[error("{action} is not allowed while {phase:?}")]
    InvalidPhase {
        action: &'static str,
        phase: CallPhase,
    },
}

impl CallError {
    pub fn invalid_phase(action: &'static str, phase: CallPhase) -> Self {
        Self::InvalidPhase { action, phase }
    }
}

pub type CallResult<T> = Result<T, CallError>;
