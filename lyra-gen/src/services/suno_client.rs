//! Music provider client
//!
//! Provider jobs follow a two-phase protocol: `submit(job) -> task_id` now,
//! and a callback (or a poll through [`MusicProvider::fetch_music_task`])
//! later that carries the result. [`MusicProvider`] is the seam the
//! orchestrator talks to; [`SunoClient`] is the HTTP implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("lyra-gen/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Provider client errors
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Provider rejected request (code {code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Provider response carried no task ID")]
    MissingTaskId,
}

/// Lyrics generation request
#[derive(Debug, Clone, PartialEq)]
pub struct LyricsJob {
    pub prompt: String,
    pub callback_url: String,
}

/// Music generation request (custom mode: we supply the lyrics)
#[derive(Debug, Clone, PartialEq)]
pub struct MusicJob {
    pub lyrics: String,
    pub style: Option<String>,
    pub title: Option<String>,
    pub model: String,
    pub instrumental: bool,
    pub callback_url: String,
}

/// Provider-side state of a music task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    TextReady,
    FirstReady,
    Succeeded,
    Failed,
}

impl TaskState {
    fn from_provider(status: &str) -> Self {
        match status {
            "SUCCESS" => TaskState::Succeeded,
            "FIRST_SUCCESS" => TaskState::FirstReady,
            "TEXT_SUCCESS" => TaskState::TextReady,
            "CREATE_TASK_FAILED"
            | "GENERATE_AUDIO_FAILED"
            | "CALLBACK_EXCEPTION"
            | "SENSITIVE_WORD_ERROR" => TaskState::Failed,
            _ => TaskState::Pending,
        }
    }
}

/// Snapshot of a provider task fetched by polling
#[derive(Debug, Clone)]
pub struct TaskSnapshot {
    pub task_id: String,
    pub state: TaskState,
    /// Raw track objects, same shape as callback tracks
    pub tracks: Vec<Value>,
    pub error_message: Option<String>,
}

/// External music/lyrics generation capability
#[async_trait]
pub trait MusicProvider: Send + Sync {
    /// Start a lyrics job; returns the provider task ID
    async fn submit_lyrics(&self, job: &LyricsJob) -> Result<String, ProviderError>;

    /// Start a music job; returns the provider task ID
    async fn submit_music(&self, job: &MusicJob) -> Result<String, ProviderError>;

    /// Poll a music task
    async fn fetch_music_task(&self, task_id: &str) -> Result<TaskSnapshot, ProviderError>;
}

/// `{ code, msg, data }` wrapper every provider response uses
#[derive(Debug, Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LyricsRequestBody<'a> {
    prompt: &'a str,
    call_back_url: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequestBody<'a> {
    custom_mode: bool,
    instrumental: bool,
    model: &'a str,
    prompt: &'a str,
    style: &'a str,
    title: &'a str,
    call_back_url: &'a str,
}

/// Suno HTTP API client
pub struct SunoClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SunoClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and unwrap the provider envelope into its `data`
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, ProviderError> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(status.as_u16(), error_text));
        }

        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        if envelope.code != 200 {
            return Err(ProviderError::Rejected {
                code: envelope.code,
                message: envelope.msg.unwrap_or_default(),
            });
        }

        Ok(envelope.data.unwrap_or(Value::Null))
    }

    fn task_id_from(data: &Value) -> Result<String, ProviderError> {
        data.get("taskId")
            .or_else(|| data.get("task_id"))
            .and_then(Value::as_str)
            .filter(|t| !t.trim().is_empty())
            .map(str::to_string)
            .ok_or(ProviderError::MissingTaskId)
    }
}

#[async_trait]
impl MusicProvider for SunoClient {
    async fn submit_lyrics(&self, job: &LyricsJob) -> Result<String, ProviderError> {
        let body = LyricsRequestBody {
            prompt: &job.prompt,
            call_back_url: &job.callback_url,
        };

        tracing::debug!(callback_url = %job.callback_url, "Submitting lyrics job");
        let data = self
            .send(self.http_client.post(self.url("/api/v1/lyrics")).json(&body))
            .await?;
        let task_id = Self::task_id_from(&data)?;

        tracing::info!(task_id = %task_id, "Lyrics job accepted by provider");
        Ok(task_id)
    }

    async fn submit_music(&self, job: &MusicJob) -> Result<String, ProviderError> {
        let body = GenerateRequestBody {
            custom_mode: true,
            instrumental: job.instrumental,
            model: &job.model,
            prompt: &job.lyrics,
            style: job.style.as_deref().unwrap_or(""),
            title: job.title.as_deref().unwrap_or(""),
            call_back_url: &job.callback_url,
        };

        tracing::debug!(model = %job.model, callback_url = %job.callback_url, "Submitting music job");
        let data = self
            .send(self.http_client.post(self.url("/api/v1/generate")).json(&body))
            .await?;
        let task_id = Self::task_id_from(&data)?;

        tracing::info!(task_id = %task_id, "Music job accepted by provider");
        Ok(task_id)
    }

    async fn fetch_music_task(&self, task_id: &str) -> Result<TaskSnapshot, ProviderError> {
        let data = self
            .send(
                self.http_client
                    .get(self.url("/api/v1/generate/record-info"))
                    .query(&[("taskId", task_id)]),
            )
            .await?;

        let state = data
            .get("status")
            .and_then(Value::as_str)
            .map(TaskState::from_provider)
            .unwrap_or(TaskState::Pending);

        let tracks = data
            .pointer("/response/sunoData")
            .or_else(|| data.pointer("/response/data"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let error_message = data
            .get("errorMessage")
            .and_then(Value::as_str)
            .filter(|m| !m.trim().is_empty())
            .map(str::to_string);

        Ok(TaskSnapshot {
            task_id: task_id.to_string(),
            state,
            tracks,
            error_message,
        })
    }
}
