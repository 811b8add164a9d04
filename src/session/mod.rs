//! 练习来电会话控制器。
//!
//! `CallController` 持有通话状态机、音频管理器与对话服务，所有用户动作都经
//! [`CallController::dispatch`] 进入。阶段迁移的副作用（铃声、网络请求、播放）
//! 在对应方法中显式列出。

pub mod error;
pub mod feedback;
pub mod lifecycle;
pub mod scenario;
pub mod state;
pub mod transcript;

#[cfg(test)]
mod tests;

pub use error::{CallError, CallResult};
pub use feedback::{CallDestination, CallNavigator, HomeReason, LoggingNavigator};
pub use lifecycle::{CallLifecycleUpdate, CallNotice, CallPhase, NoticeLevel};
pub use scenario::Scenario;
pub use state::{CallState, EndingGuard};
pub use transcript::{Message, Speaker, Transcript};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::audio::{AudioDevice, AudioError, AudioManager, AudioRole, RecordingArtifact};
use crate::config::CallConfig;
use crate::dialogue::{ConversationId, DialogueService, StartCallRequest};
use crate::telemetry::events::{record_call_outcome, record_call_phase, record_call_turn};

const TARGET: &str = "call_session";
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// 控制器接受的用户动作。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    Answer,
    Decline,
    StartRecording,
    StopRecording,
    SubmitTurn(RecordingArtifact),
    HangUp,
    Teardown,
}

/// [`CallController::dispatch`] 的处理结果。
#[derive(Debug, Clone, PartialEq)]
pub enum CallReaction {
    /// 动作在当前阶段无效，未产生任何副作用。
    Ignored,
    Connected,
    RecordingStarted,
    Turn(TurnOutcome),
    Finished(CallDestination),
    TornDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoConversation,
    NotActive,
    LimitReached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Skipped(SkipReason),
    Completed { turn_count: u32, limit_reached: bool },
}

/// 供界面渲染的只读快照。
#[derive(Debug, Clone, PartialEq)]
pub struct CallSnapshot {
    pub session_key: String,
    pub phase: CallPhase,
    pub scenario: String,
    pub conversation_id: Option<String>,
    pub turn_count: u32,
    pub max_turns: u32,
    pub duration: Duration,
    pub is_loading: bool,
    pub is_listening: bool,
    pub is_ai_speaking: bool,
    pub is_recording: bool,
    pub has_ringtone: bool,
    pub held_audio: Vec<AudioRole>,
}

impl CallSnapshot {
    /// 进度条取值，范围 `0.0..=1.0`。
    pub fn progress(&self) -> f32 {
        if self.max_turns == 0 {
            return 0.0;
        }
        (self.turn_count as f32 / self.max_turns as f32).min(1.0)
    }

    pub fn duration_secs(&self) -> u64 {
        self.duration.as_secs()
    }
}

enum HangUpPlan {
    Ignore,
    Decline,
    LocalOnly,
    Remote {
        guard: EndingGuard,
        conversation: Option<ConversationId>,
        turn_count: u32,
    },
}

struct ControllerInner {
    session_key: String,
    config: CallConfig,
    scenario: Scenario,
    state: Mutex<CallState>,
    transcript: Mutex<Transcript>,
    audio: AudioManager,
    service: Arc<dyn DialogueService>,
    navigator: Arc<dyn CallNavigator>,
    submit_gate: tokio::sync::Mutex<()>,
    auto_end: Mutex<Option<JoinHandle<()>>>,
    lifecycle_tx: broadcast::Sender<CallLifecycleUpdate>,
    notice_tx: broadcast::Sender<CallNotice>,
    outcome_tx: watch::Sender<Option<CallDestination>>,
    torn_down: AtomicBool,
}

#[derive(Clone)]
pub struct CallController {
    inner: Arc<ControllerInner>,
}

impl std::fmt::Debug for CallController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallController")
            .field("session_key", &self.inner.session_key)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl CallController {
    /// 构造处于 `Ringing` 阶段的控制器，不触碰音频设备。
    ///
    /// `scenario` 为空时从内置情景中随机挑选一个，此后整通电话不再变化。
    pub fn new(
        config: CallConfig,
        scenario: Option<Scenario>,
        device: Arc<dyn AudioDevice>,
        service: Arc<dyn DialogueService>,
        navigator: Arc<dyn CallNavigator>,
    ) -> Self {
        let scenario = scenario.unwrap_or_else(scenario::pick_random);
        let session_key = format!("call-{:08x}", rand::random::<u32>());
        let (lifecycle_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (notice_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (outcome_tx, _) = watch::channel(None);

        info!(
            target: TARGET,
            session_key = %session_key,
            scenario = %scenario.title,
            "incoming practice call"
        );

        Self {
            inner: Arc::new(ControllerInner {
                session_key,
                state: Mutex::new(CallState::new(config.max_turns)),
                config,
                scenario,
                transcript: Mutex::new(Transcript::new()),
                audio: AudioManager::new(device),
                service,
                navigator,
                submit_gate: tokio::sync::Mutex::new(()),
                auto_end: Mutex::new(None),
                lifecycle_tx,
                notice_tx,
                outcome_tx,
                torn_down: AtomicBool::new(false),
            }),
        }
    }

    /// 构造控制器，初始化音频并开始响铃。
    pub async fn open(
        config: CallConfig,
        scenario: Option<Scenario>,
        device: Arc<dyn AudioDevice>,
        service: Arc<dyn DialogueService>,
        navigator: Arc<dyn CallNavigator>,
    ) -> Self {
        let controller = Self::new(config, scenario, device, service, navigator);
        controller.start().await;
        controller
    }

    /// 申请麦克风权限并开始响铃。
    pub async fn start(&self) {
        if !self.inner.audio.init().await {
            self.notify(CallNotice::warn(
                "Microphone permission is required to speak during the call",
            ));
        }
        self.emit(CallLifecycleUpdate::new(
            self.session_key(),
            CallPhase::Ringing,
        ));
        self.ring().await;
    }

    pub fn session_key(&self) -> &str {
        &self.inner.session_key
    }

    pub fn scenario(&self) -> &Scenario {
        &self.inner.scenario
    }

    pub fn config(&self) -> &CallConfig {
        &self.inner.config
    }

    pub fn phase(&self) -> CallPhase {
        self.state().phase()
    }

    pub fn subscribe_lifecycle(&self) -> broadcast::Receiver<CallLifecycleUpdate> {
        self.inner.lifecycle_tx.subscribe()
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<CallNotice> {
        self.inner.notice_tx.subscribe()
    }

    pub fn transcript(&self) -> Transcript {
        self.transcript_guard().clone()
    }

    pub fn outcome(&self) -> Option<CallDestination> {
        self.inner.outcome_tx.borrow().clone()
    }

    /// 等待本通电话的最终去向。
    ///
    /// 通话被 [`CallController::teardown`] 中止时得到 `Home(TornDown)`。
    pub async fn wait_for_outcome(&self) -> CallDestination {
        let mut receiver = self.inner.outcome_tx.subscribe();
        let destination = match receiver.wait_for(Option::is_some).await {
            Ok(destination) => destination
                .clone()
                .unwrap_or_else(|| CallDestination::home(HomeReason::TornDown)),
            Err(_) => CallDestination::home(HomeReason::TornDown),
        };
        destination
    }

    pub fn snapshot(&self) -> CallSnapshot {
        let state = self.state();
        let audio = &self.inner.audio;
        CallSnapshot {
            session_key: self.inner.session_key.clone(),
            phase: state.phase(),
            scenario: self.inner.scenario.title.clone(),
            conversation_id: state.conversation_id().map(|id| id.as_str().to_string()),
            turn_count: state.turn_count(),
            max_turns: state.max_turns(),
            duration: state.duration(),
            is_loading: state.phase() == CallPhase::Connecting,
            is_listening: state.is_listening(),
            is_ai_speaking: audio.is_speaking(),
            is_recording: audio.is_recording(),
            has_ringtone: audio.has_ringtone(),
            held_audio: audio.held_roles(),
        }
    }

    /// 单一入口：把用户动作映射到状态机操作。
    pub async fn dispatch(&self, event: CallEvent) -> CallResult<CallReaction> {
        debug!(target: TARGET, ?event, phase = ?self.phase(), "dispatching call event");
        match event {
            CallEvent::Answer => Ok(if self.answer().await? {
                CallReaction::Connected
            } else {
                CallReaction::Ignored
            }),
            CallEvent::Decline => Ok(self.decline().await.into()),
            CallEvent::StartRecording => Ok(if self.start_recording().await? {
                CallReaction::RecordingStarted
            } else {
                CallReaction::Ignored
            }),
            CallEvent::StopRecording => self.stop_recording().await.map(CallReaction::Turn),
            CallEvent::SubmitTurn(artifact) => {
                self.submit_turn(artifact).await.map(CallReaction::Turn)
            }
            CallEvent::HangUp => Ok(self.hang_up().await.into()),
            CallEvent::Teardown => {
                self.teardown().await;
                Ok(CallReaction::TornDown)
            }
        }
    }

    /// 接听：`Ringing → Connecting`，请求服务端开始会话。
    ///
    /// 成功进入 `Active` 返回 `Ok(true)`；当前阶段不允许接听返回 `Ok(false)`；
    /// 开始失败时回到 `Ringing` 并重新响铃，用户可再次接听。
    pub async fn answer(&self) -> CallResult<bool> {
        {
            let mut state = self.state();
            if state.phase() != CallPhase::Ringing || self.is_torn_down() {
                debug!(target: TARGET, phase = ?state.phase(), "answer ignored");
                return Ok(false);
            }
            self.move_to(&mut state, CallPhase::Connecting)?;
        }
        self.inner.audio.release_ringtone().await;

        let request = StartCallRequest {
            user_id: self.inner.config.user_id.clone(),
            scenario: self.inner.scenario.title.clone(),
        };
        let started = self.inner.service.start_call(request).await;

        let started = match started {
            Ok(started) => started,
            Err(err) => {
                warn!(target: TARGET, %err, "failed to start call");
                let reverted = {
                    let mut state = self.state();
                    state.phase() == CallPhase::Connecting
                        && self.move_to(&mut state, CallPhase::Ringing).is_ok()
                };
                if reverted {
                    self.notify(CallNotice::error("Could not connect the call. Try again."));
                    self.ring().await;
                }
                return Err(CallError::Start(err));
            }
        };

        let initial_audio = {
            let mut state = self.state();
            if state.phase() != CallPhase::Connecting {
                info!(
                    target: TARGET,
                    phase = ?state.phase(),
                    "call left connecting before the service answered"
                );
                return Ok(false);
            }
            state.assign_conversation(started.conversation_id.clone())?;
            state.transition(CallPhase::Active)?;
            self.transcript_guard().push_ai(
                started.initial_ai_text.clone(),
                started.initial_ai_audio_b64.clone(),
            );
            record_call_phase(&self.inner.session_key, CallPhase::Active.as_str());
            self.emit(CallLifecycleUpdate::connected(
                self.session_key(),
                started.conversation_id.as_str(),
                self.inner.scenario.title.clone(),
            ));
            started.initial_ai_audio_b64
        };

        info!(
            target: TARGET,
            conversation_id = %started.conversation_id,
            "call connected"
        );

        match initial_audio.as_deref().map(str::trim) {
            Some(audio) if !audio.is_empty() => self.play_ai_audio(audio).await,
            _ => warn!(target: TARGET, "initial AI line has no audio"),
        }
        Ok(true)
    }

    /// 拒接：`Ringing → Ended`，不发起任何远端请求。
    pub async fn decline(&self) -> Option<CallDestination> {
        {
            let mut state = self.state();
            if state.phase() != CallPhase::Ringing {
                debug!(target: TARGET, phase = ?state.phase(), "decline ignored");
                return None;
            }
            self.move_to(&mut state, CallPhase::Ended).ok()?;
        }
        self.inner.audio.release_ringtone().await;
        self.inner.audio.teardown().await;
        self.finish(CallDestination::home(HomeReason::Declined))
    }

    /// 开始录音。无麦克风权限时发出提示并返回 `Ok(false)`。
    pub async fn start_recording(&self) -> CallResult<bool> {
        if self.phase() != CallPhase::Active {
            debug!(target: TARGET, "recording ignored outside an active call");
            return Ok(false);
        }

        match self.inner.audio.start_recording().await {
            Ok(started) => Ok(started),
            Err(AudioError::PermissionDenied) => {
                self.notify(CallNotice::warn(
                    "Microphone permission is required to record your answer",
                ));
                Ok(false)
            }
            Err(err) => {
                warn!(target: TARGET, %err, "failed to start recording");
                self.notify(CallNotice::error("Could not start recording"));
                Err(err.into())
            }
        }
    }

    /// 结束录音并把录音作为一轮发言提交。
    pub async fn stop_recording(&self) -> CallResult<TurnOutcome> {
        let artifact = self.inner.audio.stop_recording().await?;
        self.submit_turn(artifact).await
    }

    /// 提交一轮用户录音。
    ///
    /// 同一时刻只处理一轮：后到的提交等待上一轮（含 AI 语音播放）完成。
    /// 达到轮数上限后不再播放 AI 回复，并安排自动挂断。
    pub async fn submit_turn(&self, artifact: RecordingArtifact) -> CallResult<TurnOutcome> {
        let _gate = self.inner.submit_gate.lock().await;

        let conversation = {
            let mut state = self.state();
            let Some(conversation) = state.conversation_id().cloned() else {
                warn!(target: TARGET, "no conversation id available; turn skipped");
                return Ok(TurnOutcome::Skipped(SkipReason::NoConversation));
            };
            if state.phase() != CallPhase::Active {
                debug!(target: TARGET, phase = ?state.phase(), "turn ignored outside an active call");
                return Ok(TurnOutcome::Skipped(SkipReason::NotActive));
            }
            if state.limit_reached() {
                debug!(target: TARGET, "turn limit reached; turn skipped");
                return Ok(TurnOutcome::Skipped(SkipReason::LimitReached));
            }
            state.set_listening(true);
            conversation
        };

        let turn = match self
            .inner
            .service
            .process_audio(&conversation, &artifact)
            .await
        {
            Ok(turn) => turn,
            Err(err) => {
                self.state().set_listening(false);
                warn!(
                    target: TARGET,
                    %err,
                    conversation_id = %conversation,
                    "failed to process turn"
                );
                self.notify(CallNotice::warn(
                    "We couldn't hear that. Please try speaking again.",
                ));
                return Err(CallError::Turn(err));
            }
        };

        let (turn_count, max_turns, limit_reached) = {
            let mut state = self.state();
            state.set_listening(false);
            if state.phase() != CallPhase::Active {
                info!(
                    target: TARGET,
                    phase = ?state.phase(),
                    "turn response arrived after the call ended"
                );
                return Ok(TurnOutcome::Skipped(SkipReason::NotActive));
            }

            let turn_count = state.record_turn();
            let limit_reached = state.limit_reached();
            {
                let mut transcript = self.transcript_guard();
                transcript.push_user(turn.user_text.clone());
                if !limit_reached {
                    transcript.push_ai(turn.ai_text.clone(), turn.ai_audio_b64.clone());
                }
            }
            self.emit(CallLifecycleUpdate::turn_completed(
                self.session_key(),
                turn_count,
                state.max_turns(),
            ));
            (turn_count, state.max_turns(), limit_reached)
        };

        record_call_turn(&self.inner.session_key, turn_count, max_turns, limit_reached);

        if limit_reached {
            info!(
                target: TARGET,
                turn_count, max_turns, "reached maximum turns; ending call after user message"
            );
            self.schedule_auto_end();
        } else {
            match turn.ai_audio() {
                Some(audio) => self.play_ai_audio(audio).await,
                None => warn!(target: TARGET, turn_count, "turn response has no AI audio"),
            }
        }

        Ok(TurnOutcome::Completed {
            turn_count,
            limit_reached,
        })
    }

    /// 挂断。重复调用或已在结束中时返回 `None`，不会产生第二次远端请求或导航。
    pub async fn hang_up(&self) -> Option<CallDestination> {
        let plan = {
            let mut state = self.state();
            match state.phase() {
                CallPhase::Ending | CallPhase::Ended => HangUpPlan::Ignore,
                CallPhase::Ringing => HangUpPlan::Decline,
                CallPhase::Connecting => match self.move_to(&mut state, CallPhase::Ended) {
                    Ok(()) => HangUpPlan::LocalOnly,
                    Err(_) => HangUpPlan::Ignore,
                },
                CallPhase::Active => match state.begin_ending() {
                    Some(guard) => {
                        record_call_phase(&self.inner.session_key, CallPhase::Ending.as_str());
                        self.emit(CallLifecycleUpdate::new(self.session_key(), CallPhase::Ending));
                        HangUpPlan::Remote {
                            guard,
                            conversation: state.conversation_id().cloned(),
                            turn_count: state.turn_count(),
                        }
                    }
                    None => HangUpPlan::Ignore,
                },
            }
        };

        let (guard, conversation, turn_count) = match plan {
            HangUpPlan::Ignore => {
                debug!(target: TARGET, phase = ?self.phase(), "hang up ignored");
                return None;
            }
            HangUpPlan::Decline => return self.decline().await,
            HangUpPlan::LocalOnly => {
                self.inner.audio.teardown().await;
                return self.finish(CallDestination::home(HomeReason::NoConversation));
            }
            HangUpPlan::Remote {
                guard,
                conversation,
                turn_count,
            } => (guard, conversation, turn_count),
        };

        self.cancel_auto_end();
        self.inner.audio.teardown().await;
        info!(target: TARGET, turn_count, "ending call");

        let destination = match (turn_count, conversation) {
            (0, _) => CallDestination::home(HomeReason::NothingSpoken),
            (_, None) => {
                warn!(target: TARGET, "no conversation id available; ending call locally only");
                CallDestination::home(HomeReason::NoConversation)
            }
            (_, Some(conversation)) => self.request_feedback(&conversation).await,
        };

        self.state().finish_ending(guard);
        record_call_phase(&self.inner.session_key, CallPhase::Ended.as_str());
        self.finish(destination)
    }

    /// 界面卸载：释放全部音频句柄，未结束的通话直接置为 `Ended`。
    ///
    /// 被中止的通话以 `Home(TornDown)` 作为最终去向发布给等待方，但不调用导航；
    /// 已在 `Ending` 的挂断流程照常完成并导航。
    pub async fn teardown(&self) {
        self.inner.torn_down.store(true, Ordering::SeqCst);
        self.cancel_auto_end();
        let abandoned = {
            let mut state = self.state();
            let live = matches!(
                state.phase(),
                CallPhase::Ringing | CallPhase::Connecting | CallPhase::Active
            );
            if live && self.move_to(&mut state, CallPhase::Ended).is_ok() {
                self.emit(CallLifecycleUpdate::new(self.session_key(), CallPhase::Ended));
                state.claim_outcome().then(|| state.duration())
            } else {
                None
            }
        };
        self.inner.audio.teardown().await;

        if let Some(duration) = abandoned {
            let destination = CallDestination::home(HomeReason::TornDown);
            record_call_outcome(
                &self.inner.session_key,
                destination.label(),
                Some(HomeReason::TornDown.as_str()),
                duration,
            );
            self.inner.outcome_tx.send_replace(Some(destination));
        }
        debug!(target: TARGET, "call controller torn down");
    }

    async fn request_feedback(&self, conversation: &ConversationId) -> CallDestination {
        let timeout = self.inner.config.end_call_timeout();
        let result =
            tokio::time::timeout(timeout, self.inner.service.end_call(conversation)).await;

        match result {
            Ok(Ok(report)) => {
                let duration = Duration::from_secs(self.state().duration().as_secs());
                let scenario = self.inner.scenario.title.clone();
                info!(target: TARGET, "call ended successfully; navigating to feedback");
                CallDestination::Feedback {
                    report: report.with_scenario(scenario.clone()),
                    scenario,
                    duration,
                }
            }
            Ok(Err(err)) => {
                warn!(target: TARGET, %err, kind = err.kind(), "backend error ending call");
                CallDestination::home(HomeReason::EndFailed(err.kind()))
            }
            Err(_) => {
                warn!(
                    target: TARGET,
                    timeout_ms = timeout.as_millis() as u64,
                    "end call request timed out"
                );
                CallDestination::home(HomeReason::EndFailed("timeout"))
            }
        }
    }

    async fn ring(&self) {
        if self.is_torn_down() || self.phase() != CallPhase::Ringing {
            return;
        }

        match self.inner.audio.acquire_ringtone().await {
            Ok(_) => {}
            Err(err) => {
                warn!(target: TARGET, %err, "failed to play ringtone");
                return;
            }
        }

        // 加载期间可能已接听或拒接
        if self.phase() != CallPhase::Ringing {
            self.inner.audio.release_ringtone().await;
        }
    }

    async fn play_ai_audio(&self, payload: &str) {
        if let Err(err) = self.inner.audio.play_speech(payload).await {
            warn!(target: TARGET, %err, "failed to play AI audio");
            self.notify(CallNotice::warn("Could not play the AI response audio"));
        }
    }

    fn schedule_auto_end(&self) {
        if self.is_torn_down() {
            return;
        }

        let delay = self.inner.config.auto_end_delay();
        let mut slot = self.auto_end_slot();
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        let controller = self.clone();
        *slot = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // 先摘下自己的句柄，避免挂断流程把正在执行的自己取消
            controller.auto_end_slot().take();
            controller.hang_up().await;
        }));
    }

    fn cancel_auto_end(&self) {
        if let Some(handle) = self.auto_end_slot().take() {
            handle.abort();
        }
    }

    fn finish(&self, destination: CallDestination) -> Option<CallDestination> {
        let duration = {
            let mut state = self.state();
            if !state.claim_outcome() {
                return None;
            }
            state.duration()
        };

        let reason = destination.home_reason().map(ToString::to_string);
        record_call_outcome(
            &self.inner.session_key,
            destination.label(),
            reason.as_deref(),
            duration,
        );
        self.emit(CallLifecycleUpdate::ended(
            self.session_key(),
            destination.label(),
            reason,
            duration,
        ));

        self.inner.navigator.navigate(&destination);
        self.inner.outcome_tx.send_replace(Some(destination.clone()));
        Some(destination)
    }

    fn move_to(&self, state: &mut CallState, to: CallPhase) -> CallResult<()> {
        let from = state.transition(to)?;
        debug!(target: TARGET, ?from, ?to, "call phase changed");
        record_call_phase(&self.inner.session_key, to.as_str());
        if to != CallPhase::Ended {
            self.emit(CallLifecycleUpdate::new(self.session_key(), to));
        }
        Ok(())
    }

    fn emit(&self, update: CallLifecycleUpdate) {
        if self.inner.lifecycle_tx.send(update).is_err() {
            debug!(target: TARGET, "no lifecycle subscribers");
        }
    }

    fn notify(&self, notice: CallNotice) {
        if self.inner.notice_tx.send(notice).is_err() {
            debug!(target: TARGET, "no notice subscribers");
        }
    }

    fn is_torn_down(&self) -> bool {
        self.inner.torn_down.load(Ordering::SeqCst)
    }

    fn state(&self) -> MutexGuard<'_, CallState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn transcript_guard(&self) -> MutexGuard<'_, Transcript> {
        self.inner
            .transcript
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn auto_end_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.inner
            .auto_end
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl From<Option<CallDestination>> for CallReaction {
    fn from(destination: Option<CallDestination>) -> Self {
        match destination {
            Some(destination) => CallReaction::Finished(destination),
            None => CallReaction::Ignored,
        }
    }
}
