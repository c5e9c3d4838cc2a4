//! Session cookie middleware
//!
//! User-facing routes require `lyra_session=<userId>.<signature>`. The
//! verified user ID is handed to handlers as `Extension<SessionUser>`.

use axum::{
    extract::{Request, State},
    http::header::COOKIE,
    middleware::Next,
    response::Response,
};
use lyra_common::api::auth::{find_cookie, verify_session, SESSION_COOKIE};
use tracing::warn;

use crate::error::ApiError;
use crate::AppState;

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub user_id: String,
}

/// Session middleware for protected routes
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let cookie = request
        .headers()
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|header| find_cookie(header, SESSION_COOKIE))
        .unwrap_or("");

    let user_id = verify_session(cookie, state.session_secret).map_err(|e| {
        warn!(path = %request.uri().path(), error = %e, "Rejected session");
        ApiError::Unauthorized(e.to_string())
    })?;

    request.extensions_mut().insert(SessionUser { user_id });
    Ok(next.run(request).await)
}
