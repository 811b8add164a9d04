use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

pub(crate) const TARGET: &str = "telemetry::call";
pub(crate) const EVENT_PHASE: &str = "call_phase";
pub(crate) const EVENT_TURN: &str = "call_turn";
pub(crate) const EVENT_OUTCOME: &str = "call_outcome";
pub(crate) const EVENT_AUDIO_RELEASE: &str = "audio_release_failed";

#[derive(Debug, Serialize)]
pub struct CallPhaseEvent<'a> {
    pub session_key: &'a str,
    pub phase: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CallTurnEvent<'a> {
    pub session_key: &'a str,
    pub turn_count: u32,
    pub max_turns: u32,
    pub limit_reached: bool,
}

#[derive(Debug, Serialize)]
pub struct CallOutcomeEvent<'a> {
    pub session_key: &'a str,
    pub destination: &'static str,
    pub reason: Option<&'a str>,
    pub duration_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct AudioReleaseEvent<'a> {
    pub role: &'static str,
    pub error: &'a str,
}

pub fn record_call_phase(session_key: &str, phase: &'static str) {
    let event = CallPhaseEvent { session_key, phase };

    match serde_json::to_string(&event) {
        Ok(payload) => info!(
            target: TARGET,
            event = EVENT_PHASE,
            session_key = event.session_key,
            phase = event.phase,
            payload = %payload
        ),
        Err(err) => warn!(
            target: TARGET,
            event = EVENT_PHASE,
            %err,
            "failed to encode call phase event"
        ),
    }
}

pub fn record_call_turn(session_key: &str, turn_count: u32, max_turns: u32, limit_reached: bool) {
    let event = CallTurnEvent {
        session_key,
        turn_count,
        max_turns,
        limit_reached,
    };

    match serde_json::to_string(&event) {
        Ok(payload) => info!(
            target: TARGET,
            event = EVENT_TURN,
            session_key = event.session_key,
            turn_count = event.turn_count,
            max_turns = event.max_turns,
            limit_reached = event.limit_reached,
            payload = %payload
        ),
        Err(err) => warn!(
            target: TARGET,
            event = EVENT_TURN,
            %err,
            "failed to encode call turn event"
        ),
    }
}

pub fn record_call_outcome(
    session_key: &str,
    destination: &'static str,
    reason: Option<&str>,
    duration: Duration,
) {
    let event = CallOutcomeEvent {
        session_key,
        destination,
        reason,
        duration_ms: duration_to_ms(duration),
    };

    match serde_json::to_string(&event) {
        Ok(payload) => info!(
            target: TARGET,
            event = EVENT_OUTCOME,
            session_key = event.session_key,
            destination = event.destination,
            reason = event.reason,
            duration_ms = event.duration_ms,
            payload = %payload
        ),
        Err(err) => warn!(
            target: TARGET,
            event = EVENT_OUTCOME,
            %err,
            "failed to encode call outcome event"
        ),
    }
}

pub fn record_audio_release_failure(role: &'static str, error: &str) {
    let event = AudioReleaseEvent { role, error };

    match serde_json::to_string(&event) {
        Ok(payload) => warn!(
            target: TARGET,
            event = EVENT_AUDIO_RELEASE,
            role = event.role,
            error = event.error,
            payload = %payload
        ),
        Err(err) => warn!(
            target: TARGET,
            event = EVENT_AUDIO_RELEASE,
            %err,
            "failed to encode audio release event"
        ),
    }
}

fn duration_to_ms(duration: Duration) -> u64 {
    duration.as_millis().min(u64::MAX as u128) as u64
}
