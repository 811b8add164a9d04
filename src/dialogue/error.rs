use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DialogueError {
    #[error("dialogue transport failed: {0}")]
    Transport(String),
    #[error("dialogue service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode dialogue response: {0}")]
    Decode(String),
    #[error("dialogue request timed out after {0:?}")]
    Timeout(Duration),
    #[error("failed to read recording {path:?}: {message}")]
    Artifact { path: PathBuf, message: String },
}

impl DialogueError {
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport(message.into())
    }

    pub fn decode<S: Into<String>>(message: S) -> Self {
        Self::Decode(message.into())
    }

    /// 日志与去向中使用的稳定分类名。
    pub fn kind(&self) -> &'static str {
        match self {
            DialogueError::Transport(_) => "transport",
            DialogueError::Status { .. } => "status",
            DialogueError::Decode(_) => "decode",
            DialogueError::Timeout(_) => "timeout",
            DialogueError::Artifact { .. } => "artifact",
        }
    }
}

pub type DialogueResult<T> = Result<T, DialogueError>;
