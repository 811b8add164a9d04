//! 通话音频资源管理。
//!
//! 每种角色（铃声、AI 播放、录音）同一时刻最多持有一个句柄，
//! 释放一律尽力而为：失败只记日志，句柄引用照常清空。

pub mod device;
#[cfg(feature = "device-audio")]
pub mod rodio_device;
pub mod speech;

pub use device::{
    AudioDevice, AudioError, ClipId, ClipSource, PlayMode, RecordingArtifact, SilentAudioDevice,
};
#[cfg(feature = "device-audio")]
pub use rodio_device::RodioAudioDevice;
pub use speech::decode_speech;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::telemetry::events::record_audio_release_failure;

const TARGET: &str = "audio_manager";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioRole {
    Ringtone,
    Playback,
    Recording,
}

impl AudioRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioRole::Ringtone => "ringtone",
            AudioRole::Playback => "playback",
            AudioRole::Recording => "recording",
        }
    }
}

/// 管理器持有的音频资源。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioHandle {
    pub role: AudioRole,
    /// 录音没有设备剪辑，恒为 `None`。
    pub clip: Option<ClipId>,
    pub loaded: bool,
}

impl AudioHandle {
    fn clip(role: AudioRole, clip: ClipId) -> Self {
        Self {
            role,
            clip: Some(clip),
            loaded: true,
        }
    }

    fn recording() -> Self {
        Self {
            role: AudioRole::Recording,
            clip: None,
            loaded: true,
        }
    }
}

#[derive(Debug, Default)]
struct HandleSlots {
    ringtone: Option<AudioHandle>,
    playback: Option<AudioHandle>,
    recording: Option<AudioHandle>,
}

impl HandleSlots {
    fn slot_mut(&mut self, role: AudioRole) -> &mut Option<AudioHandle> {
        match role {
            AudioRole::Ringtone => &mut self.ringtone,
            AudioRole::Playback => &mut self.playback,
            AudioRole::Recording => &mut self.recording,
        }
    }
}

pub struct AudioManager {
    device: Arc<dyn AudioDevice>,
    slots: Mutex<HandleSlots>,
    playback_gate: tokio::sync::Mutex<()>,
    record_permission: AtomicBool,
    speaking: AtomicBool,
    closed: AtomicBool,
}

impl std::fmt::Debug for AudioManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioManager")
            .field("held", &self.held_roles())
            .field("speaking", &self.is_speaking())
            .finish_non_exhaustive()
    }
}

impl AudioManager {
    pub fn new(device: Arc<dyn AudioDevice>) -> Self {
        Self {
            device,
            slots: Mutex::new(HandleSlots::default()),
            playback_gate: tokio::sync::Mutex::new(()),
            record_permission: AtomicBool::new(false),
            speaking: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// 初始化音频子系统并申请麦克风权限，返回是否获得授权。
    pub async fn init(&self) -> bool {
        let granted = match self.device.request_record_permission().await {
            Ok(granted) => granted,
            Err(err) => {
                warn!(target: TARGET, %err, "failed to request microphone permission");
                false
            }
        };

        self.record_permission.store(granted, Ordering::SeqCst);
        if !granted {
            warn!(target: TARGET, "microphone permission denied; recording disabled");
        }
        granted
    }

    pub fn has_record_permission(&self) -> bool {
        self.record_permission.load(Ordering::SeqCst)
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    pub fn is_recording(&self) -> bool {
        self.slots().recording.is_some()
    }

    pub fn has_ringtone(&self) -> bool {
        self.slots().ringtone.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn held_roles(&self) -> Vec<AudioRole> {
        let slots = self.slots();
        [&slots.ringtone, &slots.playback, &slots.recording]
            .into_iter()
            .flatten()
            .map(|handle| handle.role)
            .collect()
    }

    /// 获取并循环播放铃声。已有铃声或管理器已关闭时返回 `Ok(false)`。
    pub async fn acquire_ringtone(&self) -> Result<bool, AudioError> {
        if self.is_closed() || self.has_ringtone() {
            return Ok(false);
        }

        let clip = self
            .device
            .load(ClipSource::Ringtone, PlayMode::Looping)
            .await?;

        let installed = {
            let mut slots = self.slots();
            if slots.ringtone.is_some() || self.is_closed() {
                false
            } else {
                slots.ringtone = Some(AudioHandle::clip(AudioRole::Ringtone, clip));
                true
            }
        };

        if !installed {
            debug!(target: TARGET, %clip, "ringtone slot taken concurrently; discarding clip");
            self.release_clip(AudioRole::Ringtone, clip).await;
            return Ok(false);
        }

        if let Err(err) = self.device.play(clip).await {
            self.release_ringtone().await;
            return Err(err);
        }

        info!(target: TARGET, %clip, "ringtone started");
        Ok(true)
    }

    pub async fn release_ringtone(&self) {
        self.release_role(AudioRole::Ringtone).await;
    }

    pub async fn release_playback(&self) {
        self.release_role(AudioRole::Playback).await;
    }

    /// 解码并播放一段 AI 语音，直到播放结束（或被释放）才返回。
    ///
    /// 同一时刻只允许一段 AI 语音处于加载状态，后到的语音排队等待。
    pub async fn play_speech(&self, payload: &str) -> Result<(), AudioError> {
        let bytes = decode_speech(payload)?;

        let _gate = self.playback_gate.lock().await;
        if self.is_closed() {
            debug!(target: TARGET, "audio manager closed; skipping speech playback");
            return Ok(());
        }

        let clip = self
            .device
            .load(ClipSource::Encoded(bytes), PlayMode::Once)
            .await?;
        {
            let mut slots = self.slots();
            slots.playback = Some(AudioHandle::clip(AudioRole::Playback, clip));
        }
        if self.is_closed() {
            self.release_playback().await;
            return Ok(());
        }

        self.speaking.store(true, Ordering::SeqCst);
        let result = match self.device.play(clip).await {
            Ok(()) => self.device.wait_finished(clip).await,
            Err(err) => Err(err),
        };
        self.speaking.store(false, Ordering::SeqCst);

        let still_current = {
            let mut slots = self.slots();
            if slots.playback.and_then(|handle| handle.clip) == Some(clip) {
                slots.playback = None;
                true
            } else {
                false
            }
        };
        if still_current {
            self.release_clip(AudioRole::Playback, clip).await;
        }

        result
    }

    /// 开始录音；未授权时返回 [`AudioError::PermissionDenied`]，已在录音时返回 `Ok(false)`。
    pub async fn start_recording(&self) -> Result<bool, AudioError> {
        if !self.has_record_permission() {
            return Err(AudioError::PermissionDenied);
        }
        if self.is_closed() || self.is_recording() {
            return Ok(false);
        }

        self.device.start_recording().await?;
        {
            let mut slots = self.slots();
            slots.recording = Some(AudioHandle::recording());
        }
        if self.is_closed() {
            self.release_role(AudioRole::Recording).await;
            return Ok(false);
        }

        info!(target: TARGET, "recording started");
        Ok(true)
    }

    pub async fn stop_recording(&self) -> Result<RecordingArtifact, AudioError> {
        let handle = self.slots().recording.take();
        if handle.is_none() {
            return Err(AudioError::recording("no recording in progress"));
        }

        let artifact = self.device.stop_recording().await?;
        info!(
            target: TARGET,
            path = %artifact.path().display(),
            "recording finished"
        );
        Ok(artifact)
    }

    /// 关闭管理器并释放所有句柄，释放错误一律吞掉。
    pub async fn teardown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        for role in [AudioRole::Ringtone, AudioRole::Playback, AudioRole::Recording] {
            self.release_role(role).await;
        }
        self.speaking.store(false, Ordering::SeqCst);
        debug!(target: TARGET, "audio manager torn down");
    }

    async fn release_role(&self, role: AudioRole) {
        let handle = self.slots().slot_mut(role).take();
        let Some(handle) = handle else {
            return;
        };

        match handle.clip {
            Some(clip) => self.release_clip(role, clip).await,
            None => {
                if let Err(err) = self.device.discard_recording().await {
                    debug!(target: TARGET, %err, "failed to discard recording");
                    record_audio_release_failure(role.as_str(), &err.to_string());
                }
            }
        }
    }

    async fn release_clip(&self, role: AudioRole, clip: ClipId) {
        if !self.device.is_loaded(clip).await {
            debug!(target: TARGET, %clip, role = role.as_str(), "clip already unloaded");
            return;
        }

        if let Err(err) = self.device.stop(clip).await {
            warn!(target: TARGET, %err, %clip, role = role.as_str(), "failed to stop clip");
            record_audio_release_failure(role.as_str(), &err.to_string());
        }
        if let Err(err) = self.device.unload(clip).await {
            warn!(target: TARGET, %err, %clip, role = role.as_str(), "failed to unload clip");
            record_audio_release_failure(role.as_str(), &err.to_string());
        }
    }

    fn slots(&self) -> MutexGuard<'_, HandleSlots> {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
