//! 通话生命周期广播负载定义。

use std::time::{Duration, SystemTime};

/// 通话状态机的阶段划分。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallPhase {
    Ringing,
    Connecting,
    Active,
    Ending,
    Ended,
}

impl CallPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallPhase::Ringing => "ringing",
            CallPhase::Connecting => "connecting",
            CallPhase::Active => "active",
            CallPhase::Ending => "ending",
            CallPhase::Ended => "ended",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CallPhase::Ended)
    }
}

/// 生命周期事件的附加信息。
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CallLifecyclePayload {
    #[default]
    None,
    Connected(ConnectedPayload),
    TurnCompleted(TurnPayload),
    Ended(EndedPayload),
}

/// 接通时服务端分配的会话信息。
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectedPayload {
    pub conversation_id: String,
    pub scenario: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnPayload {
    pub turn_count: u32,
    pub max_turns: u32,
}

/// 结束阶段的去向摘要。
#[derive(Debug, Clone, PartialEq)]
pub struct EndedPayload {
    pub destination: &'static str,
    pub reason: Option<String>,
    pub duration: Duration,
}

/// 生命周期事件。
#[derive(Debug, Clone)]
pub struct CallLifecycleUpdate {
    pub session_key: String,
    pub phase: CallPhase,
    pub issued_at: SystemTime,
    pub payload: CallLifecyclePayload,
}

impl CallLifecycleUpdate {
    /// 构造一个空载荷的事件。
    pub fn new<S: Into<String>>(session_key: S, phase: CallPhase) -> Self {
        Self {
            session_key: session_key.into(),
            phase,
            issued_at: SystemTime::now(),
            payload: CallLifecyclePayload::None,
        }
    }

    /// 声明通话已接通。
    pub fn connected<S: Into<String>>(
        session_key: S,
        conversation_id: impl Into<String>,
        scenario: impl Into<String>,
    ) -> Self {
        Self {
            payload: CallLifecyclePayload::Connected(ConnectedPayload {
                conversation_id: conversation_id.into(),
                scenario: scenario.into(),
            }),
            ..Self::new(session_key, CallPhase::Active)
        }
    }

    pub fn turn_completed<S: Into<String>>(session_key: S, turn_count: u32, max_turns: u32) -> Self {
        Self {
            payload: CallLifecyclePayload::TurnCompleted(TurnPayload {
                turn_count,
                max_turns,
            }),
            ..Self::new(session_key, CallPhase::Active)
        }
    }

    /// 声明通话结束并携带去向。
    pub fn ended<S: Into<String>>(
        session_key: S,
        destination: &'static str,
        reason: Option<String>,
        duration: Duration,
    ) -> Self {
        Self {
            payload: CallLifecyclePayload::Ended(EndedPayload {
                destination,
                reason,
                duration,
            }),
            ..Self::new(session_key, CallPhase::Ended)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warn,
    Error,
}

/// 面向用户的非致命提示。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallNotice {
    pub level: NoticeLevel,
    pub message: String,
}

impl CallNotice {
    pub fn info<S: Into<String>>(message: S) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warn<S: Into<String>>(message: S) -> Self {
        Self {
            level: NoticeLevel::Warn,
            message: message.into(),
        }
    }

    pub fn error<S: Into<String>>(message: S) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}
