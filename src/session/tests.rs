use super::*;
use crate::audio::{ClipId, ClipSource, PlayMode};
use crate::dialogue::{
    DialogueError, DialogueResult, FeedbackReport, StartCallResponse, TurnResponse,
};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::Mutex as StdMutex;
use tokio::sync::Notify;
use tokio::time::timeout;

const PIZZA: &str = "🍕 Pizza Order Mix-up";

#[derive(Default)]
struct ServiceState {
    starts: Vec<StartCallRequest>,
    turns: Vec<String>,
    ends: Vec<String>,
    start_results: VecDeque<DialogueResult<StartCallResponse>>,
    turn_results: VecDeque<DialogueResult<TurnResponse>>,
    end_result: Option<DialogueResult<FeedbackReport>>,
    start_delay: Duration,
    end_delay: Duration,
}

#[derive(Default)]
struct MockService {
    state: StdMutex<ServiceState>,
}

impl MockService {
    fn with(configure: impl FnOnce(&mut ServiceState)) -> Arc<Self> {
        let service = Self::default();
        configure(&mut service.state.lock().unwrap());
        Arc::new(service)
    }

    fn start_count(&self) -> usize {
        self.state.lock().unwrap().starts.len()
    }

    fn turn_count(&self) -> usize {
        self.state.lock().unwrap().turns.len()
    }

    fn end_count(&self) -> usize {
        self.state.lock().unwrap().ends.len()
    }
}

fn started(id: &str, text: &str, audio: Option<&str>) -> StartCallResponse {
    StartCallResponse {
        conversation_id: ConversationId::new(id),
        initial_ai_text: text.to_string(),
        initial_ai_audio_b64: audio.map(str::to_string),
    }
}

fn turn(user: &str, ai: &str, audio: Option<&str>) -> TurnResponse {
    TurnResponse {
        user_text: user.to_string(),
        ai_text: ai.to_string(),
        ai_audio_b64: audio.map(str::to_string),
    }
}

#[async_trait]
impl DialogueService for MockService {
    async fn start_call(&self, request: StartCallRequest) -> DialogueResult<StartCallResponse> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.starts.push(request);
            state.start_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.state
            .lock()
            .unwrap()
            .start_results
            .pop_front()
            .unwrap_or_else(|| Ok(started("c1", "Hi there", Some("SUQz"))))
    }

    async fn process_audio(
        &self,
        conversation: &ConversationId,
        _recording: &RecordingArtifact,
    ) -> DialogueResult<TurnResponse> {
        let mut state = self.state.lock().unwrap();
        state.turns.push(conversation.to_string());
        let index = state.turns.len();
        state.turn_results.pop_front().unwrap_or_else(|| {
            Ok(turn(
                &format!("user line {index}"),
                &format!("ai line {index}"),
                Some("SUQz"),
            ))
        })
    }

    async fn end_call(&self, conversation: &ConversationId) -> DialogueResult<FeedbackReport> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.ends.push(conversation.to_string());
            state.end_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.state
            .lock()
            .unwrap()
            .end_result
            .clone()
            .unwrap_or_else(|| {
                FeedbackReport::from_json(serde_json::json!({
                    "scenario": "server title",
                    "userTranscript": ["hello"],
                    "aiTranscript": ["Hi there"],
                    "score": 88
                }))
            })
    }
}

#[derive(Default)]
struct MockDevice {
    next_id: AtomicU64,
    loaded: StdMutex<HashSet<ClipId>>,
    sources: StdMutex<Vec<ClipSource>>,
    deny_permission: bool,
    fail_stop: bool,
    hold_playback: bool,
    finished: Notify,
    recording: AtomicBool,
}

impl MockDevice {
    fn loaded_count(&self) -> usize {
        self.loaded.lock().unwrap().len()
    }

    fn speech_loads(&self) -> usize {
        self.sources
            .lock()
            .unwrap()
            .iter()
            .filter(|source| matches!(source, ClipSource::Encoded(_)))
            .count()
    }

    fn ringtone_loads(&self) -> usize {
        self.sources
            .lock()
            .unwrap()
            .iter()
            .filter(|source| matches!(source, ClipSource::Ringtone))
            .count()
    }
}

#[async_trait]
impl AudioDevice for MockDevice {
    async fn request_record_permission(&self) -> Result<bool, AudioError> {
        Ok(!self.deny_permission)
    }

    async fn load(&self, source: ClipSource, _mode: PlayMode) -> Result<ClipId, AudioError> {
        let clip = ClipId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.sources.lock().unwrap().push(source);
        self.loaded.lock().unwrap().insert(clip);
        Ok(clip)
    }

    async fn play(&self, clip: ClipId) -> Result<(), AudioError> {
        if self.loaded.lock().unwrap().contains(&clip) {
            Ok(())
        } else {
            Err(AudioError::NotLoaded(clip))
        }
    }

    async fn wait_finished(&self, clip: ClipId) -> Result<(), AudioError> {
        if self.hold_playback {
            loop {
                let notified = self.finished.notified();
                if !self.loaded.lock().unwrap().contains(&clip) {
                    break;
                }
                notified.await;
            }
        }
        Ok(())
    }

    async fn is_loaded(&self, clip: ClipId) -> bool {
        self.loaded.lock().unwrap().contains(&clip)
    }

    async fn stop(&self, _clip: ClipId) -> Result<(), AudioError> {
        if self.fail_stop {
            return Err(AudioError::playback("device busy"));
        }
        Ok(())
    }

    async fn unload(&self, clip: ClipId) -> Result<(), AudioError> {
        self.loaded.lock().unwrap().remove(&clip);
        self.finished.notify_waiters();
        Ok(())
    }

    async fn start_recording(&self) -> Result<(), AudioError> {
        self.recording.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop_recording(&self) -> Result<RecordingArtifact, AudioError> {
        self.recording.store(false, Ordering::SeqCst);
        Ok(RecordingArtifact::new(PathBuf::from("/tmp/recording.m4a")))
    }

    async fn discard_recording(&self) -> Result<(), AudioError> {
        self.recording.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingNavigator {
    destinations: StdMutex<Vec<CallDestination>>,
}

impl RecordingNavigator {
    fn visits(&self) -> Vec<CallDestination> {
        self.destinations.lock().unwrap().clone()
    }
}

impl CallNavigator for RecordingNavigator {
    fn navigate(&self, destination: &CallDestination) {
        self.destinations.lock().unwrap().push(destination.clone());
    }
}

fn test_config(max_turns: u32) -> CallConfig {
    CallConfig {
        max_turns,
        end_call_timeout_ms: 500,
        auto_end_delay_ms: 10,
        ..CallConfig::default()
    }
}

fn pizza() -> Scenario {
    Scenario::new(PIZZA, "Wrong pizza delivered", ["Hello, this is Mario's Pizza."])
}

fn artifact() -> RecordingArtifact {
    RecordingArtifact::new("/tmp/recording.m4a")
}

async fn open_call(
    config: CallConfig,
    service: Arc<MockService>,
    device: Arc<MockDevice>,
) -> (CallController, Arc<RecordingNavigator>) {
    let navigator = Arc::new(RecordingNavigator::default());
    let controller = CallController::open(
        config,
        Some(pizza()),
        device,
        service,
        navigator.clone(),
    )
    .await;
    (controller, navigator)
}

async fn connected_call(
    config: CallConfig,
    service: Arc<MockService>,
    device: Arc<MockDevice>,
) -> (CallController, Arc<RecordingNavigator>) {
    let (controller, navigator) = open_call(config, service, device).await;
    assert!(controller.answer().await.expect("answer succeeds"));
    (controller, navigator)
}

#[tokio::test]
async fn answer_connects_and_records_initial_line() {
    let service = MockService::with(|state| {
        state
            .start_results
            .push_back(Ok(started("c1", "Hi there", Some("AAA"))));
    });
    let device = Arc::new(MockDevice::default());
    let (controller, _) = open_call(test_config(5), service.clone(), device.clone()).await;
    let mut notices = controller.subscribe_notices();
    assert!(controller.snapshot().has_ringtone);

    assert!(controller.answer().await.expect("answer succeeds"));

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, CallPhase::Active);
    assert_eq!(snapshot.conversation_id.as_deref(), Some("c1"));
    assert_eq!(snapshot.turn_count, 0);
    assert!(!snapshot.has_ringtone);
    assert!(snapshot.held_audio.is_empty());
    let transcript = controller.transcript();
    assert_eq!(transcript.ai_lines().collect::<Vec<_>>(), vec!["Hi there"]);
    assert_eq!(transcript.user_len(), 0);

    // "AAA" is not valid base64; playback fails without leaving the call
    let notice = notices.try_recv().expect("playback notice");
    assert_eq!(notice.level, NoticeLevel::Warn);
    assert_eq!(device.speech_loads(), 0);
    assert_eq!(service.start_count(), 1);
}

#[tokio::test]
async fn start_request_carries_user_and_fixed_scenario() {
    let service = MockService::with(|_| {});
    let device = Arc::new(MockDevice::default());
    let (controller, _) = connected_call(test_config(5), service.clone(), device).await;

    let request = service.state.lock().unwrap().starts[0].clone();
    assert_eq!(request.scenario, PIZZA);
    assert_eq!(request.user_id, controller.config().user_id);

    controller.submit_turn(artifact()).await.expect("turn");
    assert_eq!(controller.scenario().title, PIZZA);
    assert_eq!(controller.snapshot().scenario, PIZZA);
}

#[tokio::test]
async fn failed_start_returns_to_ringing_and_allows_retry() {
    let service = MockService::with(|state| {
        state
            .start_results
            .push_back(Err(DialogueError::Status {
                status: 503,
                body: "down".into(),
            }));
    });
    let device = Arc::new(MockDevice::default());
    let (controller, _) = open_call(test_config(5), service.clone(), device.clone()).await;
    let mut notices = controller.subscribe_notices();

    let err = controller.answer().await.expect_err("start fails");
    assert!(matches!(err, CallError::Start(DialogueError::Status { status: 503, .. })));

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, CallPhase::Ringing);
    assert!(!snapshot.is_loading);
    assert!(snapshot.has_ringtone);
    assert_eq!(device.ringtone_loads(), 2);
    assert_eq!(notices.try_recv().expect("notice").level, NoticeLevel::Error);

    assert!(controller.answer().await.expect("retry succeeds"));
    assert_eq!(controller.phase(), CallPhase::Active);
    assert_eq!(service.start_count(), 2);
    assert!(!controller.snapshot().has_ringtone);
}

#[tokio::test]
async fn decline_never_contacts_service() {
    let service = MockService::with(|_| {});
    let device = Arc::new(MockDevice::default());
    let (controller, navigator) = open_call(test_config(5), service.clone(), device.clone()).await;

    let destination = controller.decline().await.expect("decline delivers");

    assert_eq!(destination, CallDestination::home(HomeReason::Declined));
    assert_eq!(controller.phase(), CallPhase::Ended);
    assert_eq!(service.start_count(), 0);
    assert_eq!(device.loaded_count(), 0);
    assert!(controller.snapshot().held_audio.is_empty());
    assert_eq!(navigator.visits().len(), 1);

    assert!(!controller.answer().await.expect("answer after end is inert"));
    assert!(controller.decline().await.is_none());
    assert_eq!(service.start_count(), 0);
}

#[tokio::test]
async fn turns_increment_and_limit_triggers_auto_end() {
    let service = MockService::with(|_| {});
    let device = Arc::new(MockDevice::default());
    let (controller, navigator) =
        connected_call(test_config(5), service.clone(), device.clone()).await;
    assert_eq!(device.speech_loads(), 1);

    for expected in 1..=4 {
        let outcome = controller.submit_turn(artifact()).await.expect("turn");
        assert_eq!(
            outcome,
            TurnOutcome::Completed {
                turn_count: expected,
                limit_reached: false
            }
        );
        assert_eq!(controller.snapshot().turn_count, expected);
    }
    assert_eq!(device.speech_loads(), 5);

    let last = controller.submit_turn(artifact()).await.expect("final turn");
    assert_eq!(
        last,
        TurnOutcome::Completed {
            turn_count: 5,
            limit_reached: true
        }
    );
    // no playback for the final turn
    assert_eq!(device.speech_loads(), 5);

    let destination = timeout(Duration::from_secs(2), controller.wait_for_outcome())
        .await
        .expect("auto end fires");
    assert!(destination.is_feedback());
    assert_eq!(controller.phase(), CallPhase::Ended);
    assert_eq!(service.end_count(), 1);
    assert_eq!(navigator.visits().len(), 1);

    let transcript = controller.transcript();
    assert_eq!(transcript.user_len(), 5);
    assert_eq!(transcript.ai_len(), 5);
    assert_eq!(controller.snapshot().turn_count, 5);
}

#[tokio::test]
async fn turn_count_never_exceeds_limit() {
    let service = MockService::with(|_| {});
    let device = Arc::new(MockDevice::default());
    let config = CallConfig {
        auto_end_delay_ms: 300,
        ..test_config(2)
    };
    let (controller, _) = connected_call(config, service.clone(), device).await;

    controller.submit_turn(artifact()).await.expect("turn 1");
    controller.submit_turn(artifact()).await.expect("turn 2");
    let extra = controller.submit_turn(artifact()).await.expect("extra turn");

    assert_eq!(extra, TurnOutcome::Skipped(SkipReason::LimitReached));
    assert_eq!(service.turn_count(), 2);
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.turn_count, 2);
    assert_eq!(snapshot.progress(), 1.0);

    controller.teardown().await;
}

#[tokio::test]
async fn submit_without_conversation_is_skipped() {
    let service = MockService::with(|_| {});
    let device = Arc::new(MockDevice::default());
    let (controller, _) = open_call(test_config(5), service.clone(), device).await;

    let outcome = controller.submit_turn(artifact()).await.expect("skip is not an error");

    assert_eq!(outcome, TurnOutcome::Skipped(SkipReason::NoConversation));
    assert_eq!(service.turn_count(), 0);
    assert_eq!(controller.phase(), CallPhase::Ringing);
}

#[tokio::test]
async fn submit_failure_is_recoverable() {
    let service = MockService::with(|state| {
        state
            .turn_results
            .push_back(Err(DialogueError::transport("connection reset")));
    });
    let device = Arc::new(MockDevice::default());
    let (controller, _) = connected_call(test_config(5), service.clone(), device).await;
    let mut notices = controller.subscribe_notices();

    let err = controller.submit_turn(artifact()).await.expect_err("turn fails");
    assert!(matches!(err, CallError::Turn(DialogueError::Transport(_))));

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, CallPhase::Active);
    assert_eq!(snapshot.turn_count, 0);
    assert!(!snapshot.is_listening);
    assert_eq!(controller.transcript().user_len(), 0);
    assert_eq!(notices.try_recv().expect("notice").level, NoticeLevel::Warn);

    let retry = controller.submit_turn(artifact()).await.expect("retry");
    assert_eq!(
        retry,
        TurnOutcome::Completed {
            turn_count: 1,
            limit_reached: false
        }
    );
}

#[tokio::test]
async fn missing_ai_audio_still_counts_turn() {
    let service = MockService::with(|state| {
        state
            .turn_results
            .push_back(Ok(turn("hello", "hi again", None)));
    });
    let device = Arc::new(MockDevice::default());
    let (controller, _) = connected_call(test_config(5), service, device.clone()).await;

    let outcome = controller.submit_turn(artifact()).await.expect("turn");

    assert_eq!(
        outcome,
        TurnOutcome::Completed {
            turn_count: 1,
            limit_reached: false
        }
    );
    assert_eq!(device.speech_loads(), 1);
    assert_eq!(
        controller.transcript().ai_lines().collect::<Vec<_>>(),
        vec!["Hi there", "hi again"]
    );
}

#[tokio::test]
async fn concurrent_submits_are_processed_in_order() {
    let service = MockService::with(|state| {
        state.start_results.push_back(Ok(started("c1", "Hi there", None)));
    });
    let device = Arc::new(MockDevice {
        hold_playback: true,
        ..MockDevice::default()
    });
    let (controller, _) = connected_call(test_config(5), service.clone(), device.clone()).await;

    let first = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.submit_turn(artifact()).await })
    };
    timeout(Duration::from_secs(1), async {
        while !controller.snapshot().is_ai_speaking {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("first reply starts playing");

    let second = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.submit_turn(artifact()).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(service.turn_count(), 1);
    assert!(!second.is_finished());

    controller.inner.audio.release_playback().await;
    let first = timeout(Duration::from_secs(1), first)
        .await
        .expect("first turn finishes")
        .expect("task joins")
        .expect("first turn");

    timeout(Duration::from_secs(1), async {
        while service.turn_count() < 2 || !controller.snapshot().is_ai_speaking {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("second reply starts playing");
    assert_eq!(device.loaded_count(), 1);
    controller.inner.audio.release_playback().await;
    let second = timeout(Duration::from_secs(1), second)
        .await
        .expect("second turn finishes")
        .expect("task joins")
        .expect("second turn");

    assert_eq!(
        (first, second),
        (
            TurnOutcome::Completed {
                turn_count: 1,
                limit_reached: false
            },
            TurnOutcome::Completed {
                turn_count: 2,
                limit_reached: false
            }
        )
    );
    assert_eq!(
        controller.transcript().user_lines().collect::<Vec<_>>(),
        vec!["user line 1", "user line 2"]
    );
}

#[tokio::test]
async fn hang_up_while_connecting_ends_locally() {
    let service = MockService::with(|state| {
        state.start_delay = Duration::from_millis(100);
    });
    let device = Arc::new(MockDevice::default());
    let (controller, navigator) = open_call(test_config(5), service.clone(), device.clone()).await;

    let answering = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.answer().await })
    };
    timeout(Duration::from_secs(1), async {
        while controller.phase() != CallPhase::Connecting {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("call starts connecting");

    let destination = controller.hang_up().await.expect("local exit");
    assert_eq!(destination, CallDestination::home(HomeReason::NoConversation));

    let answered = timeout(Duration::from_secs(1), answering)
        .await
        .expect("late start resolves")
        .expect("task joins")
        .expect("late start is not an error");
    assert!(!answered);

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, CallPhase::Ended);
    assert!(snapshot.conversation_id.is_none());
    assert!(snapshot.held_audio.is_empty());
    assert_eq!(device.loaded_count(), 0);
    assert_eq!(device.speech_loads(), 0);
    assert!(controller.transcript().is_empty());
    assert_eq!(service.end_count(), 0);
    assert_eq!(navigator.visits(), vec![destination]);
}

#[tokio::test]
async fn teardown_while_connecting_releases_everything() {
    let service = MockService::with(|state| {
        state.start_delay = Duration::from_millis(100);
    });
    let device = Arc::new(MockDevice::default());
    let (controller, navigator) = open_call(test_config(5), service, device.clone()).await;

    let answering = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.answer().await })
    };
    timeout(Duration::from_secs(1), async {
        while controller.phase() != CallPhase::Connecting {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("call starts connecting");

    controller.teardown().await;
    let answered = timeout(Duration::from_secs(1), answering)
        .await
        .expect("late start resolves")
        .expect("task joins")
        .expect("late start is not an error");

    assert!(!answered);
    assert!(controller.snapshot().held_audio.is_empty());
    assert!(controller.snapshot().conversation_id.is_none());
    assert_eq!(device.loaded_count(), 0);
    assert!(navigator.visits().is_empty());
}

#[tokio::test]
async fn teardown_resolves_outcome_waiters() {
    let service = MockService::with(|_| {});
    let device = Arc::new(MockDevice::default());
    let (controller, navigator) = connected_call(test_config(5), service.clone(), device).await;

    let waiter = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.wait_for_outcome().await })
    };
    controller.teardown().await;

    let destination = timeout(Duration::from_secs(2), waiter)
        .await
        .expect("waiter resolves after teardown")
        .expect("task joins");
    assert_eq!(destination, CallDestination::home(HomeReason::TornDown));
    assert_eq!(controller.outcome(), Some(destination));
    assert_eq!(controller.phase(), CallPhase::Ended);
    assert!(navigator.visits().is_empty());
    assert_eq!(service.end_count(), 0);

    controller.teardown().await;
    assert!(controller.hang_up().await.is_none());
}

#[tokio::test]
async fn teardown_during_ending_keeps_feedback() {
    let service = MockService::with(|state| {
        state.end_delay = Duration::from_millis(50);
    });
    let device = Arc::new(MockDevice::default());
    let (controller, navigator) = connected_call(test_config(5), service.clone(), device).await;
    controller.submit_turn(artifact()).await.expect("turn");

    let ending = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.hang_up().await })
    };
    timeout(Duration::from_secs(1), async {
        while controller.phase() != CallPhase::Ending {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("call starts ending");
    controller.teardown().await;

    let destination = timeout(Duration::from_secs(1), controller.wait_for_outcome())
        .await
        .expect("feedback delivered");
    assert!(destination.is_feedback());
    assert!(ending.await.expect("task joins").is_some());
    assert_eq!(navigator.visits().len(), 1);
    assert_eq!(service.end_count(), 1);
}

#[tokio::test]
async fn hang_up_twice_sends_one_end_request() {
    let service = MockService::with(|state| {
        state.end_delay = Duration::from_millis(30);
    });
    let device = Arc::new(MockDevice::default());
    let (controller, navigator) = connected_call(test_config(5), service.clone(), device).await;
    controller.submit_turn(artifact()).await.expect("turn");

    let (first, second) = tokio::join!(controller.hang_up(), controller.hang_up());

    let delivered: Vec<_> = [first, second].into_iter().flatten().collect();
    assert_eq!(delivered.len(), 1);
    assert!(delivered[0].is_feedback());
    assert_eq!(service.end_count(), 1);
    assert_eq!(navigator.visits().len(), 1);
    assert!(controller.hang_up().await.is_none());
}

#[tokio::test]
async fn feedback_carries_session_scenario_and_duration() {
    let service = MockService::with(|_| {});
    let device = Arc::new(MockDevice::default());
    let (controller, _) = connected_call(test_config(5), service, device).await;
    controller.submit_turn(artifact()).await.expect("turn");

    let destination = controller.hang_up().await.expect("feedback");

    match destination {
        CallDestination::Feedback {
            report,
            scenario,
            duration,
        } => {
            assert_eq!(scenario, PIZZA);
            assert_eq!(report.scenario, PIZZA);
            assert_eq!(report.score, Some(88.0));
            assert_eq!(duration.subsec_nanos(), 0);
        }
        other => panic!("unexpected destination: {other:?}"),
    }
}

#[tokio::test]
async fn end_timeout_falls_back_home() {
    let service = MockService::with(|state| {
        state.end_delay = Duration::from_secs(2);
    });
    let device = Arc::new(MockDevice::default());
    let config = CallConfig {
        end_call_timeout_ms: 50,
        ..test_config(5)
    };
    let (controller, navigator) = connected_call(config, service.clone(), device.clone()).await;
    controller.submit_turn(artifact()).await.expect("turn");

    let destination = controller.hang_up().await.expect("fallback delivered");

    assert_eq!(
        destination,
        CallDestination::home(HomeReason::EndFailed("timeout"))
    );
    assert_eq!(controller.phase(), CallPhase::Ended);
    assert_eq!(service.end_count(), 1);
    assert_eq!(device.loaded_count(), 0);
    assert_eq!(navigator.visits(), vec![destination]);
}

#[tokio::test]
async fn end_failure_status_falls_back_home() {
    let service = MockService::with(|state| {
        state.end_result = Some(Err(DialogueError::Status {
            status: 500,
            body: "boom".into(),
        }));
    });
    let device = Arc::new(MockDevice::default());
    let (controller, _) = connected_call(test_config(5), service, device).await;
    controller.submit_turn(artifact()).await.expect("turn");

    let destination = controller.hang_up().await.expect("fallback delivered");

    assert_eq!(
        destination,
        CallDestination::home(HomeReason::EndFailed("status"))
    );
    assert_eq!(controller.outcome(), Some(destination));
}

#[tokio::test]
async fn hang_up_before_speaking_skips_remote_end() {
    let service = MockService::with(|_| {});
    let device = Arc::new(MockDevice::default());
    let (controller, navigator) = connected_call(test_config(5), service.clone(), device).await;

    let destination = controller.hang_up().await.expect("local exit");

    assert_eq!(destination, CallDestination::home(HomeReason::NothingSpoken));
    assert_eq!(service.end_count(), 0);
    assert_eq!(controller.phase(), CallPhase::Ended);
    assert_eq!(navigator.visits().len(), 1);
}

#[tokio::test]
async fn teardown_while_ringing_releases_ringtone() {
    let service = MockService::with(|_| {});
    let device = Arc::new(MockDevice {
        fail_stop: true,
        ..MockDevice::default()
    });
    let (controller, navigator) = open_call(test_config(5), service, device.clone()).await;
    assert_eq!(controller.snapshot().held_audio, vec![AudioRole::Ringtone]);

    controller.teardown().await;

    assert!(controller.snapshot().held_audio.is_empty());
    assert_eq!(device.loaded_count(), 0);
    assert_eq!(controller.phase(), CallPhase::Ended);
    assert!(navigator.visits().is_empty());
}

#[tokio::test]
async fn teardown_interrupts_ai_playback() {
    let service = MockService::with(|_| {});
    let device = Arc::new(MockDevice {
        hold_playback: true,
        ..MockDevice::default()
    });
    let (controller, _) = open_call(test_config(5), service, device.clone()).await;

    let answering = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.answer().await })
    };
    timeout(Duration::from_secs(1), async {
        while !controller.snapshot().is_ai_speaking {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("initial line starts playing");
    assert_eq!(controller.snapshot().held_audio, vec![AudioRole::Playback]);

    controller.teardown().await;
    timeout(Duration::from_secs(1), answering)
        .await
        .expect("answer finishes after teardown")
        .expect("task joins")
        .expect("answer succeeded");

    assert!(controller.snapshot().held_audio.is_empty());
    assert_eq!(device.loaded_count(), 0);
}

#[tokio::test]
async fn recording_without_permission_is_inert() {
    let service = MockService::with(|_| {});
    let device = Arc::new(MockDevice {
        deny_permission: true,
        ..MockDevice::default()
    });
    let (controller, _) = connected_call(test_config(5), service, device.clone()).await;
    let mut notices = controller.subscribe_notices();

    assert!(!controller.start_recording().await.expect("permission denial is not an error"));
    assert_eq!(notices.try_recv().expect("notice").level, NoticeLevel::Warn);
    assert!(!device.recording.load(Ordering::SeqCst));
    assert!(!controller.snapshot().is_recording);
}

#[tokio::test]
async fn recorded_turn_is_submitted() {
    let service = MockService::with(|_| {});
    let device = Arc::new(MockDevice::default());
    let (controller, _) = connected_call(test_config(5), service.clone(), device).await;

    assert!(controller.start_recording().await.expect("recording starts"));
    assert!(controller.snapshot().is_recording);
    let outcome = controller.stop_recording().await.expect("turn submitted");

    assert_eq!(
        outcome,
        TurnOutcome::Completed {
            turn_count: 1,
            limit_reached: false
        }
    );
    assert_eq!(service.turn_count(), 1);
    assert!(!controller.snapshot().is_recording);
}

#[tokio::test]
async fn lifecycle_updates_follow_transitions() {
    let service = MockService::with(|_| {});
    let device = Arc::new(MockDevice::default());
    let (controller, _) = open_call(test_config(5), service, device).await;
    let mut updates = controller.subscribe_lifecycle();

    controller.answer().await.expect("answer");
    controller.submit_turn(artifact()).await.expect("turn");
    controller.hang_up().await.expect("ended");

    let mut phases = Vec::new();
    while let Ok(update) = updates.try_recv() {
        assert_eq!(update.session_key, controller.session_key());
        phases.push((update.phase, update.payload));
    }

    assert!(matches!(phases[0], (CallPhase::Connecting, lifecycle::CallLifecyclePayload::None)));
    assert!(matches!(phases[1], (CallPhase::Active, lifecycle::CallLifecyclePayload::Connected(_))));
    assert!(matches!(
        phases[2],
        (CallPhase::Active, lifecycle::CallLifecyclePayload::TurnCompleted(_))
    ));
    assert_eq!(phases[3].0, CallPhase::Ending);
    assert!(matches!(phases[4], (CallPhase::Ended, lifecycle::CallLifecyclePayload::Ended(_))));
    assert_eq!(phases.len(), 5);
}

#[tokio::test]
async fn dispatch_routes_events() {
    let service = MockService::with(|_| {});
    let device = Arc::new(MockDevice::default());
    let (controller, _) = open_call(test_config(5), service.clone(), device).await;

    let reaction = controller.dispatch(CallEvent::Decline).await.expect("decline");
    assert_eq!(
        reaction,
        CallReaction::Finished(CallDestination::home(HomeReason::Declined))
    );

    for event in [CallEvent::Answer, CallEvent::Decline, CallEvent::HangUp] {
        assert_eq!(
            controller.dispatch(event).await.expect("inert"),
            CallReaction::Ignored
        );
    }
    assert_eq!(
        controller.dispatch(CallEvent::Teardown).await.expect("teardown"),
        CallReaction::TornDown
    );
    assert_eq!(service.start_count(), 0);
}
