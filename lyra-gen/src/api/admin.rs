//! Administrative endpoints
//!
//! Gated by the `x-admin-token` header. With no admin token configured the
//! routes answer 404 as if they did not exist.

use axum::{extract::State, http::HeaderMap, Json};

use crate::error::{ApiError, ApiResult};
use crate::services::{run_backfill, BackfillReport};
use crate::AppState;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

fn authorize(state: &AppState, headers: &HeaderMap) -> ApiResult<()> {
    let Some(expected) = state.admin_token.as_deref().filter(|t| !t.is_empty()) else {
        return Err(ApiError::NotFound("Not found".into()));
    };

    let provided = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if provided != expected {
        tracing::warn!("Rejected admin request with bad token");
        return Err(ApiError::Unauthorized("Invalid admin token".into()));
    }
    Ok(())
}

/// POST /api/admin/backfill
pub async fn backfill(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Json<BackfillReport>> {
    authorize(&state, &headers)?;
    let report = run_backfill(&state.db, &state.reconciler).await?;
    Ok(Json(report))
}
