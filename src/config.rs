//! 练习来电的运行配置。
//!
//! 默认值与线上服务保持一致，可通过 `RINGAPP_*` 环境变量覆盖。

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BACKEND_URL: &str = "https://ringapp-backend-production.up.railway.app";
pub const DEFAULT_USER_ID: &str = "68e1891a053b036af73ed31d";
pub const DEFAULT_MAX_TURNS: u32 = 5;

const DEFAULT_END_CALL_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_AUTO_END_DELAY_MS: u64 = 1_500;

const ENV_BACKEND_URL: &str = "RINGAPP_BACKEND_URL";
const ENV_USER_ID: &str = "RINGAPP_USER_ID";
const ENV_MAX_TURNS: &str = "RINGAPP_MAX_TURNS";
const ENV_END_TIMEOUT_MS: &str = "RINGAPP_END_TIMEOUT_MS";
const ENV_AUTO_END_DELAY_MS: &str = "RINGAPP_AUTO_END_DELAY_MS";
const ENV_RINGTONE: &str = "RINGAPP_RINGTONE";
const ENV_RECORDING_DIR: &str = "RINGAPP_RECORDING_DIR";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// 单通练习来电的配置项。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// 对话服务的根地址，不含末尾斜杠。
    pub backend_url: String,
    pub user_id: String,
    /// 一通电话允许的用户发言轮数，达到后自动挂断。
    pub max_turns: u32,
    /// 结束请求的超时时间（毫秒）。
    pub end_call_timeout_ms: u64,
    /// 最后一轮发言展示多久后自动挂断（毫秒）。
    pub auto_end_delay_ms: u64,
    /// 自定义铃声文件；缺省时由设备合成。
    pub ringtone_path: Option<PathBuf>,
    /// 录音文件的落盘目录。
    pub recording_dir: PathBuf,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            user_id: DEFAULT_USER_ID.to_string(),
            max_turns: DEFAULT_MAX_TURNS,
            end_call_timeout_ms: DEFAULT_END_CALL_TIMEOUT_MS,
            auto_end_delay_ms: DEFAULT_AUTO_END_DELAY_MS,
            ringtone_path: None,
            recording_dir: std::env::temp_dir().join("ringapp"),
        }
    }
}

impl CallConfig {
    /// 读取进程环境变量并覆盖默认值。
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_BACKEND_URL) {
            config.backend_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(user_id) = lookup(ENV_USER_ID) {
            config.user_id = user_id.trim().to_string();
        }
        if let Some(value) = lookup(ENV_MAX_TURNS) {
            config.max_turns = parse_number(ENV_MAX_TURNS, &value)?;
        }
        if let Some(value) = lookup(ENV_END_TIMEOUT_MS) {
            config.end_call_timeout_ms = parse_number(ENV_END_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_AUTO_END_DELAY_MS) {
            config.auto_end_delay_ms = parse_number(ENV_AUTO_END_DELAY_MS, &value)?;
        }
        if let Some(path) = lookup(ENV_RINGTONE).filter(|value| !value.trim().is_empty()) {
            config.ringtone_path = Some(PathBuf::from(path));
        }
        if let Some(dir) = lookup(ENV_RECORDING_DIR).filter(|value| !value.trim().is_empty()) {
            config.recording_dir = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend_url.trim().is_empty() {
            return Err(ConfigError::Invalid("backend_url cannot be empty".into()));
        }
        if self.max_turns == 0 {
            return Err(ConfigError::Invalid("max_turns must be at least 1".into()));
        }
        if self.end_call_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "end_call_timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn end_call_timeout(&self) -> Duration {
        Duration::from_millis(self.end_call_timeout_ms)
    }

    pub fn auto_end_delay(&self) -> Duration {
        Duration::from_millis(self.auto_end_delay_ms)
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        })
}
