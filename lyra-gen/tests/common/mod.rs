//! Shared test fixtures: fake provider, in-memory app state, payload builders

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use lyra_gen::models::{NewSong, Song};
use lyra_gen::services::{LyricsJob, MusicJob, MusicProvider, ProviderError, TaskSnapshot};
use lyra_gen::AppState;
use serde_json::{json, Value};
use tower::util::ServiceExt;

pub const ADMIN_TOKEN: &str = "admin-secret";
pub const USER: &str = "user-1";

/// Provider double: records every submission, hands out sequential task
/// IDs and fails on demand.
#[derive(Default)]
pub struct FakeProvider {
    pub lyrics_jobs: Mutex<Vec<LyricsJob>>,
    pub music_jobs: Mutex<Vec<MusicJob>>,
    counter: AtomicU32,
    fail: AtomicBool,
    snapshot: Mutex<Option<TaskSnapshot>>,
}

impl FakeProvider {
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    pub fn set_snapshot(&self, snapshot: TaskSnapshot) {
        *self.snapshot.lock().unwrap() = Some(snapshot);
    }

    pub fn lyrics_submissions(&self) -> usize {
        self.lyrics_jobs.lock().unwrap().len()
    }

    pub fn music_submissions(&self) -> usize {
        self.music_jobs.lock().unwrap().len()
    }

    pub fn last_music_job(&self) -> Option<MusicJob> {
        self.music_jobs.lock().unwrap().last().cloned()
    }

    fn next_task(&self, prefix: &str) -> Result<String, ProviderError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProviderError::Rejected {
                code: 429,
                message: "insufficient credits".into(),
            });
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("{}-task-{}", prefix, n))
    }
}

#[async_trait]
impl MusicProvider for FakeProvider {
    async fn submit_lyrics(&self, job: &LyricsJob) -> Result<String, ProviderError> {
        self.lyrics_jobs.lock().unwrap().push(job.clone());
        self.next_task("lyrics")
    }

    async fn submit_music(&self, job: &MusicJob) -> Result<String, ProviderError> {
        self.music_jobs.lock().unwrap().push(job.clone());
        self.next_task("music")
    }

    async fn fetch_music_task(&self, task_id: &str) -> Result<TaskSnapshot, ProviderError> {
        self.snapshot
            .lock()
            .unwrap()
            .clone()
            .filter(|s| s.task_id == task_id)
            .ok_or_else(|| ProviderError::Api(404, format!("unknown task {}", task_id)))
    }
}

/// App state over an in-memory database; session signatures disabled
pub async fn test_state() -> (AppState, Arc<FakeProvider>) {
    let pool = lyra_common::db::init_memory_database().await.unwrap();
    state_with_pool(pool)
}

pub fn state_with_pool(pool: sqlx::SqlitePool) -> (AppState, Arc<FakeProvider>) {
    let provider = Arc::new(FakeProvider::default());
    let state = AppState::new(
        pool,
        provider.clone(),
        "http://lyra.test",
        "V4_5",
        0,
        Some(ADMIN_TOKEN.to_string()),
    );
    (state, provider)
}

pub fn app(state: &AppState) -> Router {
    lyra_gen::build_router(state.clone())
}

pub fn new_song(prompt: &str) -> NewSong {
    NewSong {
        user_id: USER.to_string(),
        lyrics_prompt: prompt.to_string(),
        style: Some("dream pop".to_string()),
        title: Some("Night Drive".to_string()),
        ..Default::default()
    }
}

pub async fn load(state: &AppState, song_id: &str) -> Song {
    lyra_gen::db::songs::load_song(&state.db, song_id)
        .await
        .unwrap()
        .expect("song exists")
}

/// Created song whose lyrics callback delivered two variants
pub async fn song_with_lyrics(state: &AppState) -> Song {
    let song = state.orchestrator.create_song(new_song("city rain")).await.unwrap();
    let task_id = song.generation_progress.lyrics.task_id.clone();
    let tracks = lyrics_tracks();
    state
        .reconciler
        .apply_lyrics(
            &song.id,
            task_id.as_deref(),
            tracks.as_array().unwrap(),
            lyra_gen::models::CallbackType::Complete,
        )
        .await
        .unwrap();
    load(state, &song.id).await
}

/// Song that has a submitted music job
pub async fn song_generating_music(state: &AppState) -> (Song, String) {
    let song = song_with_lyrics(state).await;
    let (song, task_id) = state.orchestrator.select_lyrics_variant(&song.id, 0).await.unwrap();
    (song, task_id)
}

pub fn lyrics_tracks() -> Value {
    json!([
        { "text": "[Verse]\nNeon on the wet street", "title": "Neon", "status": "complete" },
        { "text": "[Verse]\nHeadlights in the rain", "title": "Headlights", "status": "complete" }
    ])
}

pub fn music_tracks() -> Value {
    json!([
        {
            "id": "8f1c2a9e-3b4d-4e5f-8a6b-7c8d9e0f1a2b",
            "audio_url": "https://cdn.example/a.mp3",
            "source_audio_url": "https://src.example/a.mp3",
            "stream_audio_url": "https://cdn.example/a.m3u8",
            "source_stream_audio_url": "https://src.example/a.m3u8",
            "image_url": "https://cdn.example/a.jpg",
            "prompt": "[Verse]\nNeon on the wet street",
            "model_name": "chirp-v4-5",
            "title": "Night Drive",
            "tags": "dream pop",
            "createTime": 1700000000000i64,
            "duration": 198.4
        },
        {
            "id": "b2c3d4e5-f6a7-4b8c-9d0e-1f2a3b4c5d6e",
            "audio_url": "https://cdn.example/b.mp3",
            "stream_audio_url": "https://cdn.example/b.m3u8",
            "image_url": "https://cdn.example/b.jpg",
            "title": "Night Drive",
            "duration": 201.0
        }
    ])
}

pub fn callback_body(task_id: &str, callback_type: &str, tracks: Value) -> Value {
    json!({
        "code": 200,
        "msg": "All generated successfully.",
        "data": {
            "callbackType": callback_type,
            "task_id": task_id,
            "data": tracks
        }
    })
}

pub fn error_body(task_id: &str, message: &str) -> Value {
    json!({
        "code": 501,
        "msg": message,
        "data": { "callbackType": "error", "task_id": task_id, "data": null }
    })
}

/// Send a request; returns status and JSON body (Null when empty)
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Request carrying a session cookie for `user` (secret 0 trusts the user part)
pub fn authed(method: &str, uri: &str, user: &str, body: Option<&Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("cookie", format!("lyra_session={}", lyra_common::api::sign_session(user, 0)));
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn post_callback(state: &AppState, phase: &str, song_id: Option<&str>, body: &Value) -> Value {
    let uri = match song_id {
        Some(id) => format!("/api/callbacks/suno/{}?songId={}", phase, id),
        None => format!("/api/callbacks/suno/{}", phase),
    };
    let (status, ack) = send(app(state), post_json(&uri, body)).await;
    assert_eq!(status, StatusCode::OK, "callbacks always answer 200");
    ack
}
