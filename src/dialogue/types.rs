//! 对话服务的线上数据结构。

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::DialogueError;

/// 服务端分配的会话标识，一通电话只赋值一次。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartCallRequest {
    pub user_id: String,
    pub scenario: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartCallResponse {
    pub conversation_id: ConversationId,
    pub initial_ai_text: String,
    #[serde(default)]
    pub initial_ai_audio_b64: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnResponse {
    #[serde(default)]
    pub user_text: String,
    #[serde(default)]
    pub ai_text: String,
    #[serde(default)]
    pub ai_audio_b64: Option<String>,
}

impl TurnResponse {
    /// 非空的 AI 语音载荷。
    pub fn ai_audio(&self) -> Option<&str> {
        self.ai_audio_b64
            .as_deref()
            .map(str::trim)
            .filter(|audio| !audio.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndCallRequest {
    pub conv_id: ConversationId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarCorrection {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub correction: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreGrade {
    Excellent,
    Good,
    NeedsPractice,
}

impl ScoreGrade {
    pub fn label(&self) -> &'static str {
        match self {
            ScoreGrade::Excellent => "Excellent",
            ScoreGrade::Good => "Good",
            ScoreGrade::NeedsPractice => "Needs Practice",
        }
    }
}

/// 通话结束后服务端返回的评估结果。
///
/// 除展示所需字段外，原始 JSON 一并保留，便于原样转交给反馈页。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedbackReport {
    pub scenario: String,
    pub user_transcript: Vec<String>,
    pub ai_transcript: Vec<String>,
    pub grammar_errors: Vec<GrammarCorrection>,
    pub score: Option<f64>,
    pub encouragement: String,
    #[serde(skip)]
    pub raw: Value,
}

impl FeedbackReport {
    /// 从响应体解析；顶层必须是 JSON 对象。
    pub fn from_json(value: Value) -> Result<Self, DialogueError> {
        if !value.is_object() {
            return Err(DialogueError::decode("feedback body is not a JSON object"));
        }
        let mut report: FeedbackReport = serde_json::from_value(value.clone())
            .map_err(|err| DialogueError::decode(err.to_string()))?;
        report.raw = value;
        Ok(report)
    }

    pub fn score_or_zero(&self) -> f64 {
        self.score.unwrap_or(0.0)
    }

    pub fn grade(&self) -> ScoreGrade {
        let score = self.score_or_zero();
        if score >= 90.0 {
            ScoreGrade::Excellent
        } else if score >= 75.0 {
            ScoreGrade::Good
        } else {
            ScoreGrade::NeedsPractice
        }
    }

    /// 用户发言数占 AI 发言数的百分比（四舍五入）。
    pub fn participation_percent(&self) -> u32 {
        let ai = self.ai_transcript.len().max(1) as f64;
        ((self.user_transcript.len() as f64 / ai) * 100.0).round() as u32
    }

    pub fn exchange_count(&self) -> usize {
        self.ai_transcript.len().max(self.user_transcript.len())
    }

    /// 用本次通话的情景标题覆盖服务端返回值。
    pub fn with_scenario<S: Into<String>>(mut self, scenario: S) -> Self {
        self.scenario = scenario.into();
        self
    }
}
