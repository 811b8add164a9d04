//! Ringapp Core Library
//!
//! 练习来电的会话控制器：响铃、接通、有限轮次的语音对话，以及结束后的反馈去向。

pub mod audio;
pub mod config;
pub mod dialogue;
pub mod session;
pub mod telemetry;
