use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::error::{DialogueError, DialogueResult};
use super::types::{
    ConversationId, EndCallRequest, FeedbackReport, StartCallRequest, StartCallResponse,
    TurnResponse,
};
use crate::audio::RecordingArtifact;
use crate::config::CallConfig;

const TARGET: &str = "dialogue_client";

const START_CALL_PATH: &str = "/start_call";
const PROCESS_AUDIO_PATH: &str = "/process_audio";
const END_CALL_PATH: &str = "/end_call";

/// 远端对话服务的三个操作，均不做客户端重试。
#[async_trait]
pub trait DialogueService: Send + Sync {
    async fn start_call(&self, request: StartCallRequest) -> DialogueResult<StartCallResponse>;

    async fn process_audio(
        &self,
        conversation: &ConversationId,
        recording: &RecordingArtifact,
    ) -> DialogueResult<TurnResponse>;

    async fn end_call(&self, conversation: &ConversationId) -> DialogueResult<FeedbackReport>;
}

#[derive(Debug, Clone)]
pub struct HttpDialogueClient {
    base_url: String,
    http: reqwest::Client,
    end_call_timeout: Duration,
}

impl HttpDialogueClient {
    pub fn new<S: Into<String>>(base_url: S, end_call_timeout: Duration) -> DialogueResult<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|err| DialogueError::transport(err.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            end_call_timeout,
        })
    }

    pub fn from_config(config: &CallConfig) -> DialogueResult<Self> {
        Self::new(config.backend_url.clone(), config.end_call_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_body(response: reqwest::Response) -> DialogueResult<Value> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DialogueError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| DialogueError::transport(err.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|err| DialogueError::decode(err.to_string()))
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> DialogueResult<T> {
        let value = Self::read_body(response).await?;
        serde_json::from_value(value).map_err(|err| DialogueError::decode(err.to_string()))
    }

    async fn request_feedback(&self, conversation: &ConversationId) -> DialogueResult<FeedbackReport> {
        let body = EndCallRequest {
            conv_id: conversation.clone(),
        };
        let response = self
            .http
            .post(self.endpoint(END_CALL_PATH))
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;
        let value = Self::read_body(response).await?;
        FeedbackReport::from_json(value)
    }
}

#[async_trait]
impl DialogueService for HttpDialogueClient {
    async fn start_call(&self, request: StartCallRequest) -> DialogueResult<StartCallResponse> {
        debug!(target: TARGET, scenario = %request.scenario, "requesting new conversation");
        let response = self
            .http
            .post(self.endpoint(START_CALL_PATH))
            .json(&request)
            .send()
            .await
            .map_err(map_send_error)?;
        let started: StartCallResponse = Self::read_json(response).await?;
        info!(
            target: TARGET,
            conversation_id = %started.conversation_id,
            "conversation started"
        );
        Ok(started)
    }

    async fn process_audio(
        &self,
        conversation: &ConversationId,
        recording: &RecordingArtifact,
    ) -> DialogueResult<TurnResponse> {
        let audio = tokio::fs::read(recording.path())
            .await
            .map_err(|err| DialogueError::Artifact {
                path: recording.path().to_path_buf(),
                message: err.to_string(),
            })?;
        let part = Part::bytes(audio)
            .file_name(recording.file_name())
            .mime_str(recording.mime_type())
            .map_err(|err| DialogueError::transport(err.to_string()))?;
        let form = Form::new()
            .text("conv_id", conversation.as_str().to_string())
            .part("audio", part);

        let response = self
            .http
            .post(self.endpoint(PROCESS_AUDIO_PATH))
            .multipart(form)
            .send()
            .await
            .map_err(map_send_error)?;
        let turn: TurnResponse = Self::read_json(response).await?;
        debug!(
            target: TARGET,
            conversation_id = %conversation,
            has_audio = turn.ai_audio().is_some(),
            "turn processed"
        );
        Ok(turn)
    }

    async fn end_call(&self, conversation: &ConversationId) -> DialogueResult<FeedbackReport> {
        match tokio::time::timeout(self.end_call_timeout, self.request_feedback(conversation)).await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    target: TARGET,
                    conversation_id = %conversation,
                    timeout_ms = self.end_call_timeout.as_millis() as u64,
                    "end call request timed out"
                );
                Err(DialogueError::Timeout(self.end_call_timeout))
            }
        }
    }
}

fn map_send_error(err: reqwest::Error) -> DialogueError {
    if err.is_decode() {
        DialogueError::decode(err.to_string())
    } else {
        DialogueError::transport(err.to_string())
    }
}
