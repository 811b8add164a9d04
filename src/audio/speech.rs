//! AI 语音载荷解码。

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;

use super::device::AudioError;

/// 将服务端返回的 base64 语音解码为可播放的字节。
///
/// 兼容 `data:audio/mp3;base64,` 形式的 data URI 前缀。
pub fn decode_speech(payload: &str) -> Result<Bytes, AudioError> {
    let trimmed = payload.trim();
    let encoded = match trimmed.split_once(";base64,") {
        Some((prefix, body)) if prefix.starts_with("data:") => body,
        _ => trimmed,
    };

    if encoded.is_empty() {
        return Err(AudioError::decode("speech payload is empty"));
    }

    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map(Bytes::from)
        .map_err(|err| AudioError::decode(err.to_string()))
}
