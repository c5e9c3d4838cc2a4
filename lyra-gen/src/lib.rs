//! lyra-gen library interface
//!
//! Generation lifecycle manager: starts lyrics and music jobs with the
//! provider and reconciles its asynchronous callbacks into song state.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult, GenError};
pub use crate::services::ProviderError;

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::services::{
    CallbackReconciler, CallbackUrls, GenerationOrchestrator, MusicProvider, RetryTracker,
    TaskCorrelator,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub orchestrator: GenerationOrchestrator,
    pub reconciler: CallbackReconciler,
    pub correlator: TaskCorrelator,
    pub retry_tracker: RetryTracker,
    /// Session cookie signing secret (0 disables signature checks)
    pub session_secret: i64,
    /// Enables `/api/admin` routes when set
    pub admin_token: Option<String>,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Wire the services around one pool and one provider
    pub fn new(
        db: SqlitePool,
        provider: Arc<dyn MusicProvider>,
        public_base_url: &str,
        model: impl Into<String>,
        session_secret: i64,
        admin_token: Option<String>,
    ) -> Self {
        let orchestrator = GenerationOrchestrator::new(
            db.clone(),
            provider,
            CallbackUrls::new(public_base_url),
            model,
        );

        Self {
            reconciler: CallbackReconciler::new(db.clone()),
            correlator: TaskCorrelator::new(db.clone()),
            retry_tracker: RetryTracker::new(db.clone(), orchestrator.clone()),
            orchestrator,
            db,
            session_secret,
            admin_token,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
///
/// Song routes sit behind the session middleware; provider callbacks,
/// health and admin routes do not.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    let protected = Router::new()
        .route("/api/songs", post(api::create_song).get(api::list_songs))
        .route("/api/songs/:id", get(api::get_song))
        .route("/api/songs/:id/retry", post(api::retry_phase))
        .route("/api/songs/:id/select-lyrics", post(api::select_lyrics))
        .route("/api/songs/:id/refresh", post(api::refresh_song))
        .route("/api/songs/:id/complete", post(api::complete_song))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::session_middleware,
        ));

    let public = Router::new()
        .route("/api/callbacks/suno/lyrics", post(api::lyrics_callback))
        .route("/api/callbacks/suno/music", post(api::music_callback))
        .route("/api/admin/backfill", post(api::backfill))
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .with_state(state)
}
