//! Inbound provider callback payloads
//!
//! Only the envelope is typed here. Track entries stay as raw JSON until
//! the track normalizer turns them into [`Variant`](super::Variant)s.

use serde::Deserialize;
use serde_json::Value;

/// Marker telling how far the provider job has progressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackType {
    /// Text (lyrics) generated, audio pending
    Text,
    /// First track ready (stream URLs, possibly no final audio)
    First,
    /// All tracks ready
    Complete,
    /// Provider gave up
    Error,
    #[serde(other)]
    Unknown,
}

impl CallbackType {
    /// Provider says audio for this job is worth processing
    pub fn signals_audio(&self) -> bool {
        matches!(self, CallbackType::First | CallbackType::Complete)
    }
}

/// `{ code, msg, data: { task_id, callbackType, data: [...] } }`
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackEnvelope {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub data: Option<CallbackData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackData {
    #[serde(default, alias = "taskId")]
    pub task_id: Option<String>,
    #[serde(default, rename = "callbackType", alias = "callback_type")]
    pub callback_type: Option<CallbackType>,
    #[serde(default)]
    pub data: Option<Vec<Value>>,
}

impl CallbackEnvelope {
    pub fn task_id(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|d| d.task_id.as_deref())
            .filter(|t| !t.trim().is_empty())
    }

    pub fn callback_type(&self) -> CallbackType {
        self.data
            .as_ref()
            .and_then(|d| d.callback_type)
            .unwrap_or(CallbackType::Unknown)
    }

    pub fn tracks(&self) -> &[Value] {
        self.data
            .as_ref()
            .and_then(|d| d.data.as_deref())
            .unwrap_or(&[])
    }

    /// Provider-reported failure, if this callback carries one
    pub fn failure_message(&self) -> Option<String> {
        let code_failed = matches!(self.code, Some(code) if code != 200);
        if code_failed || self.callback_type() == CallbackType::Error {
            Some(
                self.msg
                    .clone()
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "Provider reported a generation error".to_string()),
            )
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_music_callback() {
        let body = r#"{
            "code": 200,
            "msg": "All generated successfully.",
            "data": {
                "callbackType": "complete",
                "task_id": "task-9",
                "data": [{"id": "a"}, {"id": "b"}]
            }
        }"#;
        let env: CallbackEnvelope = serde_json::from_str(body).unwrap();
        assert_eq!(env.task_id(), Some("task-9"));
        assert_eq!(env.callback_type(), CallbackType::Complete);
        assert_eq!(env.tracks().len(), 2);
        assert_eq!(env.failure_message(), None);
    }

    #[test]
    fn test_unknown_callback_type_and_missing_data() {
        let env: CallbackEnvelope =
            serde_json::from_str(r#"{"data": {"callbackType": "weird"}}"#).unwrap();
        assert_eq!(env.callback_type(), CallbackType::Unknown);
        assert!(env.tracks().is_empty());
        assert_eq!(env.task_id(), None);
    }

    #[test]
    fn test_error_callback_message() {
        let env: CallbackEnvelope = serde_json::from_str(
            r#"{"code": 400, "msg": "Sensitive word detected", "data": {"task_id": "t", "callbackType": "error"}}"#,
        )
        .unwrap();
        assert_eq!(env.failure_message().as_deref(), Some("Sensitive word detected"));
    }

    #[test]
    fn test_signals_audio() {
        assert!(CallbackType::First.signals_audio());
        assert!(CallbackType::Complete.signals_audio());
        assert!(!CallbackType::Text.signals_audio());
        assert!(!CallbackType::Unknown.signals_audio());
    }
}
