//! Song endpoints (session required)
//!
//! Songs are visible to their owner only; anyone else gets 404 so song IDs
//! can't be enumerated.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::api::session::SessionUser;
use crate::db::{songs, variants};
use crate::error::{ApiError, ApiResult};
use crate::models::{NewSong, Phase, Song, Variant};
use crate::services::ReconcileOutcome;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSongRequest {
    pub prompt: String,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub instrumental: bool,
}

#[derive(Debug, Deserialize)]
pub struct RetryRequest {
    pub phase: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectLyricsRequest {
    pub variant_index: i64,
}

/// Song plus its audio variants
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongDetail {
    #[serde(flatten)]
    pub song: Song,
    pub variants: Vec<Variant>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub song_id: String,
    pub task_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectLyricsResponse {
    pub task_id: String,
    pub song: Song,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub updated: bool,
    pub song: SongDetail,
}

/// POST /api/songs
pub async fn create_song(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    payload: Result<Json<CreateSongRequest>, JsonRejection>,
) -> ApiResult<Json<Song>> {
    let Json(request) = payload?;
    if request.prompt.trim().is_empty() {
        return Err(ApiError::BadRequest("prompt must not be empty".into()));
    }

    let song = state
        .orchestrator
        .create_song(NewSong {
            user_id: user.user_id,
            conversation_id: request.conversation_id,
            title: request.title,
            lyrics_prompt: request.prompt,
            style: request.style,
            instrumental: request.instrumental,
        })
        .await?;

    Ok(Json(song))
}

/// GET /api/songs
pub async fn list_songs(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
) -> ApiResult<Json<Vec<Song>>> {
    let songs = songs::list_songs_for_user(&state.db, &user.user_id).await?;
    Ok(Json(songs))
}

/// GET /api/songs/:id
pub async fn get_song(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(song_id): Path<String>,
) -> ApiResult<Json<SongDetail>> {
    Ok(Json(load_owned_detail(&state, &user, &song_id).await?))
}

/// POST /api/songs/:id/retry
pub async fn retry_phase(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(song_id): Path<String>,
    payload: Result<Json<RetryRequest>, JsonRejection>,
) -> ApiResult<Json<TaskResponse>> {
    let Json(request) = payload?;
    let phase: Phase = request.phase.parse().map_err(ApiError::BadRequest)?;
    ensure_owner(&state, &user, &song_id).await?;

    let task_id = state.retry_tracker.retry(&song_id, phase).await?;
    Ok(Json(TaskResponse { song_id, task_id }))
}

/// POST /api/songs/:id/select-lyrics
pub async fn select_lyrics(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(song_id): Path<String>,
    payload: Result<Json<SelectLyricsRequest>, JsonRejection>,
) -> ApiResult<Json<SelectLyricsResponse>> {
    let Json(request) = payload?;
    let song = ensure_owner(&state, &user, &song_id).await?;

    let index = usize::try_from(request.variant_index).map_err(|_| {
        ApiError::BadRequest(format!(
            "Lyrics variant index {} out of range ({} variants)",
            request.variant_index,
            song.lyrics_variants.len()
        ))
    })?;

    let (song, task_id) = state.orchestrator.select_lyrics_variant(&song_id, index).await?;
    Ok(Json(SelectLyricsResponse { task_id, song }))
}

/// POST /api/songs/:id/refresh
pub async fn refresh_song(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(song_id): Path<String>,
) -> ApiResult<Json<RefreshResponse>> {
    ensure_owner(&state, &user, &song_id).await?;

    let outcome = state.orchestrator.refresh(&song_id).await?;
    let song = load_owned_detail(&state, &user, &song_id).await?;

    Ok(Json(RefreshResponse {
        updated: matches!(outcome, ReconcileOutcome::Applied { .. }),
        song,
    }))
}

/// POST /api/songs/:id/complete
pub async fn complete_song(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(song_id): Path<String>,
) -> ApiResult<Json<Song>> {
    ensure_owner(&state, &user, &song_id).await?;
    Ok(Json(state.orchestrator.complete_song(&song_id).await?))
}

async fn ensure_owner(state: &AppState, user: &SessionUser, song_id: &str) -> ApiResult<Song> {
    match songs::load_song(&state.db, song_id).await? {
        Some(song) if song.user_id == user.user_id => Ok(song),
        _ => Err(ApiError::NotFound(format!("Song not found: {}", song_id))),
    }
}

async fn load_owned_detail(state: &AppState, user: &SessionUser, song_id: &str) -> ApiResult<SongDetail> {
    let song = ensure_owner(state, user, song_id).await?;
    let variants = variants::list_variants(&state.db, song_id).await?;
    Ok(SongDetail { song, variants })
}
