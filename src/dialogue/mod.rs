//! 远端对话服务客户端：开始通话、提交一轮录音、结束并取回反馈。

mod client;
mod error;
mod types;


pub use client::{DialogueService, HttpDialogueClient};
pub use error::{DialogueError, DialogueResult};
pub use types::{
    ConversationId, EndCallRequest, FeedbackReport, GrammarCorrection, ScoreGrade,
    StartCallRequest, StartCallResponse, TurnResponse,
};
