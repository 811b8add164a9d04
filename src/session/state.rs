//! 通话状态机本体，只由 `CallController` 持有和修改。

use std::time::{Duration, Instant};

use crate::dialogue::ConversationId;

use super::error::{CallError, CallResult};
use super::lifecycle::CallPhase;

/// 结束路径的独占令牌：进入 `Ending` 时取得，到达 `Ended` 时交还。
///
/// 不可克隆，同一时刻至多存在一个。
#[derive(Debug)]
#[must_use = "an ending guard must be returned through finish_ending"]
pub struct EndingGuard {
    _private: (),
}

#[derive(Debug)]
pub struct CallState {
    phase: CallPhase,
    conversation_id: Option<ConversationId>,
    turn_count: u32,
    max_turns: u32,
    connected_at: Option<Instant>,
    frozen_duration: Option<Duration>,
    ending_held: bool,
    listening: bool,
    outcome_delivered: bool,
}

impl CallState {
    pub fn new(max_turns: u32) -> Self {
        Self {
            phase: CallPhase::Ringing,
            conversation_id: None,
            turn_count: 0,
            max_turns: max_turns.max(1),
            connected_at: None,
            frozen_duration: None,
            ending_held: false,
            listening: false,
            outcome_delivered: false,
        }
    }

    pub fn phase(&self) -> CallPhase {
        self.phase
    }

    pub fn conversation_id(&self) -> Option<&ConversationId> {
        self.conversation_id.as_ref()
    }

    pub fn turn_count(&self) -> u32 {
        self.turn_count
    }

    pub fn max_turns(&self) -> u32 {
        self.max_turns
    }

    pub fn limit_reached(&self) -> bool {
        self.turn_count >= self.max_turns
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn set_listening(&mut self, listening: bool) {
        self.listening = listening;
    }

    pub fn is_ending(&self) -> bool {
        self.ending_held
    }

    /// 执行一次合法的阶段迁移；`Ending` 只能经由 [`CallState::begin_ending`] 进入。
    pub fn transition(&mut self, to: CallPhase) -> CallResult<CallPhase> {
        let from = self.phase;
        let allowed = matches!(
            (from, to),
            (CallPhase::Ringing, CallPhase::Connecting)
                | (CallPhase::Ringing, CallPhase::Ended)
                | (CallPhase::Connecting, CallPhase::Active)
                | (CallPhase::Connecting, CallPhase::Ringing)
                | (CallPhase::Connecting, CallPhase::Ended)
                | (CallPhase::Active, CallPhase::Ended)
        );
        if !allowed {
            return Err(CallError::invalid_phase(to.as_str(), from));
        }

        if from == CallPhase::Active {
            self.freeze_duration();
        }
        if to == CallPhase::Active {
            self.connected_at = Some(Instant::now());
        }
        self.phase = to;
        Ok(from)
    }

    pub fn assign_conversation(&mut self, id: ConversationId) -> CallResult<()> {
        if self.conversation_id.is_some() {
            return Err(CallError::ConversationAlreadyAssigned);
        }
        self.conversation_id = Some(id);
        Ok(())
    }

    /// 计入一轮用户发言，返回新的轮数；已达上限时不再增加。
    pub fn record_turn(&mut self) -> u32 {
        if self.turn_count < self.max_turns {
            self.turn_count += 1;
        }
        self.turn_count
    }

    pub fn begin_ending(&mut self) -> Option<EndingGuard> {
        if self.ending_held || self.phase != CallPhase::Active {
            return None;
        }
        self.freeze_duration();
        self.ending_held = true;
        self.listening = false;
        self.phase = CallPhase::Ending;
        Some(EndingGuard { _private: () })
    }

    pub fn finish_ending(&mut self, guard: EndingGuard) {
        let EndingGuard { .. } = guard;
        self.ending_held = false;
        self.phase = CallPhase::Ended;
    }

    /// 标记去向已交付，仅第一次返回 `true`。
    pub fn claim_outcome(&mut self) -> bool {
        if self.outcome_delivered {
            return false;
        }
        self.outcome_delivered = true;
        true
    }

    /// 接通时长，离开 `Active` 后冻结。
    pub fn duration(&self) -> Duration {
        if let Some(frozen) = self.frozen_duration {
            return frozen;
        }
        self.connected_at
            .map(|started| started.elapsed())
            .unwrap_or_default()
    }

    fn freeze_duration(&mut self) {
        if self.frozen_duration.is_none() {
            self.frozen_duration = Some(self.duration());
        }
    }
}
