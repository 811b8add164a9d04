//! 观测性初始化。

pub mod events;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

const ENV_LOG_FORMAT: &str = "RINGAPP_LOG_FORMAT";

/// 安装全局 tracing 订阅者；重复调用时静默忽略。
///
/// `RINGAPP_LOG_FORMAT=json` 时输出 JSON 行，否则为可读文本。
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(ENV_LOG_FORMAT)
        .map(|value| value.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let (text_layer, json_layer) = if json {
        (None, Some(fmt::layer().json().with_target(true)))
    } else {
        (Some(fmt::layer().with_target(true)), None)
    };

    if Registry::default()
        .with(env_filter)
        .with(text_layer)
        .with(json_layer)
        .try_init()
        .is_err()
    {
        tracing::debug!(target: "telemetry", "global subscriber already installed");
    }
}
