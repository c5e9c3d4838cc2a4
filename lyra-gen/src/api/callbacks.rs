//! Provider callback endpoints
//!
//! Always answer 200. Success or failure is reported in the body
//! (`{ ok, songId?, status?, warning?, error? }`).

use axum::{
    body::Bytes,
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::models::{CallbackEnvelope, Phase, SongStatus};
use crate::services::ReconcileOutcome;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackQuery {
    pub song_id: Option<String>,
}

/// Acknowledgement returned to the provider
#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CallbackAck {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub song_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SongStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CallbackAck {
    fn warning(song_id: Option<String>, warning: &str) -> Self {
        Self {
            ok: false,
            song_id,
            warning: Some(warning.to_string()),
            ..Default::default()
        }
    }

    fn error(song_id: Option<String>, error: String) -> Self {
        Self {
            ok: false,
            song_id,
            error: Some(error),
            ..Default::default()
        }
    }
}

/// POST /api/callbacks/suno/lyrics
pub async fn lyrics_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    body: Bytes,
) -> Json<CallbackAck> {
    Json(handle_callback(&state, Phase::Lyrics, query.song_id, &body).await)
}

/// POST /api/callbacks/suno/music
pub async fn music_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    body: Bytes,
) -> Json<CallbackAck> {
    Json(handle_callback(&state, Phase::Music, query.song_id, &body).await)
}

async fn handle_callback(
    state: &AppState,
    phase: Phase,
    url_song_id: Option<String>,
    body: &[u8],
) -> CallbackAck {
    let envelope: CallbackEnvelope = match serde_json::from_slice(body) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(
                phase = %phase,
                song_id = url_song_id.as_deref().unwrap_or(""),
                error = %e,
                payload = %String::from_utf8_lossy(body),
                "Unparseable provider callback"
            );
            return CallbackAck::error(url_song_id, format!("Invalid callback payload: {}", e));
        }
    };

    let task_id = envelope.task_id();

    let song_id = match state
        .correlator
        .resolve_song_id(url_song_id.as_deref(), task_id)
        .await
    {
        Ok(Some(song_id)) => song_id,
        Ok(None) => {
            tracing::warn!(
                phase = %phase,
                task_id = task_id.unwrap_or(""),
                "Orphaned provider callback"
            );
            return CallbackAck::warning(None, "song not found");
        }
        Err(e) => {
            tracing::error!(
                phase = %phase,
                task_id = task_id.unwrap_or(""),
                error = %e,
                payload = %String::from_utf8_lossy(body),
                "Callback correlation failed"
            );
            return CallbackAck::error(url_song_id, e.to_string());
        }
    };

    let result = if let Some(message) = envelope.failure_message() {
        state
            .reconciler
            .record_provider_error(&song_id, task_id, phase, &message)
            .await
    } else {
        match phase {
            Phase::Lyrics => {
                state
                    .reconciler
                    .apply_lyrics(&song_id, task_id, envelope.tracks(), envelope.callback_type())
                    .await
            }
            Phase::Music => {
                state
                    .reconciler
                    .reconcile(&song_id, task_id, envelope.tracks(), envelope.callback_type())
                    .await
            }
        }
    };

    match result {
        Ok(ReconcileOutcome::Applied { status, .. }) => CallbackAck {
            ok: true,
            song_id: Some(song_id),
            status: Some(status),
            ..Default::default()
        },
        Ok(ReconcileOutcome::NotYet) => CallbackAck {
            ok: true,
            song_id: Some(song_id),
            warning: Some("no results yet".to_string()),
            ..Default::default()
        },
        Ok(ReconcileOutcome::Stale) => CallbackAck {
            ok: true,
            song_id: Some(song_id),
            warning: Some("stale callback ignored".to_string()),
            ..Default::default()
        },
        Err(crate::error::GenError::SongNotFound(_)) => {
            tracing::warn!(
                phase = %phase,
                song_id = %song_id,
                task_id = task_id.unwrap_or(""),
                "Callback names an unknown song"
            );
            CallbackAck::warning(Some(song_id), "song not found")
        }
        Err(e) => {
            tracing::error!(
                phase = %phase,
                song_id = %song_id,
                task_id = task_id.unwrap_or(""),
                error = %e,
                payload = %String::from_utf8_lossy(body),
                "Callback reconciliation failed"
            );
            CallbackAck::error(Some(song_id), e.to_string())
        }
    }
}
