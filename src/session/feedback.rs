//! 通话结束后的去向。

use std::fmt;
use std::time::Duration;

use tracing::info;

pub use crate::dialogue::{FeedbackReport, ScoreGrade};

/// 没有反馈可展示、直接回到首页的原因。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HomeReason {
    /// 响铃阶段拒接。
    Declined,
    /// 服务端尚未分配会话。
    NoConversation,
    /// 用户一句话都没说完。
    NothingSpoken,
    /// 结束请求失败，携带错误分类。
    EndFailed(&'static str),
    /// 界面在通话结束前卸载，不经过导航。
    TornDown,
}

impl HomeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            HomeReason::Declined => "declined",
            HomeReason::NoConversation => "no_conversation",
            HomeReason::NothingSpoken => "nothing_spoken",
            HomeReason::EndFailed(kind) => kind,
            HomeReason::TornDown => "torn_down",
        }
    }
}

impl fmt::Display for HomeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HomeReason::EndFailed(kind) => write!(f, "end_failed:{kind}"),
            other => f.write_str(other.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallDestination {
    Feedback {
        report: FeedbackReport,
        scenario: String,
        duration: Duration,
    },
    Home {
        reason: HomeReason,
    },
}

impl CallDestination {
    pub fn home(reason: HomeReason) -> Self {
        Self::Home { reason }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CallDestination::Feedback { .. } => "feedback",
            CallDestination::Home { .. } => "home",
        }
    }

    pub fn is_feedback(&self) -> bool {
        matches!(self, CallDestination::Feedback { .. })
    }

    pub fn home_reason(&self) -> Option<&HomeReason> {
        match self {
            CallDestination::Home { reason } => Some(reason),
            CallDestination::Feedback { .. } => None,
        }
    }
}

/// 导航协作方，每通电话恰好被调用一次。
pub trait CallNavigator: Send + Sync {
    fn navigate(&self, destination: &CallDestination);
}

/// 只记录日志的导航实现，用于终端驱动与无界面环境。
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNavigator;

impl CallNavigator for LoggingNavigator {
    fn navigate(&self, destination: &CallDestination) {
        match destination {
            CallDestination::Feedback {
                report,
                scenario,
                duration,
            } => info!(
                target: "call_session",
                scenario = %scenario,
                score = report.score_or_zero(),
                grade = report.grade().label(),
                duration_secs = duration.as_secs(),
                "navigating to feedback"
            ),
            CallDestination::Home { reason } => info!(
                target: "call_session",
                reason = %reason,
                "navigating home"
            ),
        }
    }
}
