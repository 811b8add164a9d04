//! 音频设备抽象。
//!
//! `AudioManager` 只通过 [`AudioDevice`] 访问真实硬件，便于在无声卡环境和测试中替换。

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// 设备侧已加载音频的标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClipId(u64);

impl ClipId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "clip-{}", self.0)
    }
}

/// 待加载的音频来源。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipSource {
    /// 来电铃声，由设备决定具体素材。
    Ringtone,
    /// 已解码的语音文件内容（mp3/wav 等容器格式）。
    Encoded(Bytes),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayMode {
    Once,
    Looping,
}

/// 一次录音结束后留在本地的音频文件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingArtifact {
    path: PathBuf,
}

impl RecordingArtifact {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "recording.m4a".to_string())
    }

    pub fn mime_type(&self) -> &'static str {
        let extension = self
            .path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase());
        match extension.as_deref() {
            Some("wav") => "audio/wav",
            Some("mp3") => "audio/mpeg",
            Some("ogg") => "audio/ogg",
            Some("webm") => "audio/webm",
            _ => "audio/m4a",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AudioError {
    #[error("microphone permission denied")]
    PermissionDenied,
    #[error("{0} is not loaded")]
    NotLoaded(ClipId),
    #[error("audio decode failed: {message}")]
    Decode { message: String },
    #[error("audio playback failed: {message}")]
    Playback { message: String },
    #[error("audio recording failed: {message}")]
    Recording { message: String },
    #[error("audio device unavailable: {message}")]
    Unavailable { message: String },
}

impl AudioError {
    pub fn decode<S: Into<String>>(message: S) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn playback<S: Into<String>>(message: S) -> Self {
        Self::Playback {
            message: message.into(),
        }
    }

    pub fn recording<S: Into<String>>(message: S) -> Self {
        Self::Recording {
            message: message.into(),
        }
    }

    pub fn unavailable<S: Into<String>>(message: S) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait AudioDevice: Send + Sync {
    async fn request_record_permission(&self) -> Result<bool, AudioError>;

    /// 加载音频但不开始播放。
    async fn load(&self, source: ClipSource, mode: PlayMode) -> Result<ClipId, AudioError>;

    async fn play(&self, clip: ClipId) -> Result<(), AudioError>;

    /// 等待单次播放结束；剪辑被停止或卸载时同样立即返回。
    async fn wait_finished(&self, clip: ClipId) -> Result<(), AudioError>;

    async fn is_loaded(&self, clip: ClipId) -> bool;

    async fn stop(&self, clip: ClipId) -> Result<(), AudioError>;

    async fn unload(&self, clip: ClipId) -> Result<(), AudioError>;

    async fn start_recording(&self) -> Result<(), AudioError>;

    async fn stop_recording(&self) -> Result<RecordingArtifact, AudioError>;

    /// 丢弃进行中的录音，不产出文件。
    async fn discard_recording(&self) -> Result<(), AudioError>;
}

/// 不发声的设备：播放立即完成，不支持录音。
///
/// 用于无声卡环境，录音由外部录制后通过 `submit_turn` 直接提交。
#[derive(Debug, Default)]
pub struct SilentAudioDevice {
    next_id: AtomicU64,
    loaded: Mutex<HashSet<ClipId>>,
}

impl SilentAudioDevice {
    pub fn new() -> Self {
        Self::default()
    }

    fn loaded(&self) -> std::sync::MutexGuard<'_, HashSet<ClipId>> {
        self.loaded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl AudioDevice for SilentAudioDevice {
    async fn request_record_permission(&self) -> Result<bool, AudioError> {
        Ok(true)
    }

    async fn load(&self, _source: ClipSource, _mode: PlayMode) -> Result<ClipId, AudioError> {
        let clip = ClipId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.loaded().insert(clip);
        Ok(clip)
    }

    async fn play(&self, clip: ClipId) -> Result<(), AudioError> {
        if self.loaded().contains(&clip) {
            Ok(())
        } else {
            Err(AudioError::NotLoaded(clip))
        }
    }

    async fn wait_finished(&self, _clip: ClipId) -> Result<(), AudioError> {
        Ok(())
    }

    async fn is_loaded(&self, clip: ClipId) -> bool {
        self.loaded().contains(&clip)
    }

    async fn stop(&self, _clip: ClipId) -> Result<(), AudioError> {
        Ok(())
    }

    async fn unload(&self, clip: ClipId) -> Result<(), AudioError> {
        if self.loaded().remove(&clip) {
            Ok(())
        } else {
            Err(AudioError::NotLoaded(clip))
        }
    }

    async fn start_recording(&self) -> Result<(), AudioError> {
        Err(AudioError::unavailable("silent device has no microphone"))
    }

    async fn stop_recording(&self) -> Result<RecordingArtifact, AudioError> {
        Err(AudioError::unavailable("silent device has no microphone"))
    }

    async fn discard_recording(&self) -> Result<(), AudioError> {
        Ok(())
    }
}
