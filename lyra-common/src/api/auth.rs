//! Session cookie signing and verification
//!
//! A session cookie value has the shape `<user_id>.<signature>` where the
//! signature is the lowercase hex SHA-256 of `<user_id>:<secret>`.
//! The secret is an i64 stored in the settings table under
//! `session_secret`. The special value 0 disables signature checking: the
//! cookie value before the last `.` (or the whole value) is trusted as the
//! user ID.
//!
//! Everything here is framework-free; the axum extractor lives in the
//! service crate.

use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

/// Settings key holding the session secret
pub const SESSION_SECRET_KEY: &str = "session_secret";

/// Cookie name carrying the session
pub const SESSION_COOKIE: &str = "lyra_session";

/// Session validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("Missing session cookie")]
    Missing,

    #[error("Malformed session cookie")]
    Malformed,

    #[error("Invalid session signature")]
    InvalidSignature,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// Load the session secret, generating and storing one on first use
pub async fn load_session_secret(db: &SqlitePool) -> Result<i64, SessionError> {
    let result: Option<(String,)> =
        sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(SESSION_SECRET_KEY)
            .fetch_optional(db)
            .await
            .map_err(|e| SessionError::DatabaseError(e.to_string()))?;

    match result {
        Some((value,)) => value
            .trim()
            .parse::<i64>()
            .map_err(|e| SessionError::DatabaseError(format!("Invalid i64: {}", e))),
        None => initialize_session_secret(db).await,
    }
}

/// Generate a random non-zero secret and store it
async fn initialize_session_secret(db: &SqlitePool) -> Result<i64, SessionError> {
    use rand::Rng;

    let mut rng = rand::thread_rng();
    let secret: i64 = loop {
        let val = rng.gen::<i64>();
        if val != 0 {
            break val;
        }
    };

    sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
        .bind(SESSION_SECRET_KEY)
        .bind(secret.to_string())
        .execute(db)
        .await
        .map_err(|e| SessionError::DatabaseError(e.to_string()))?;

    Ok(secret)
}

fn signature(user_id: &str, secret: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update(b":");
    hasher.update(secret.to_string().as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Build a cookie value for `user_id`
pub fn sign_session(user_id: &str, secret: i64) -> String {
    format!("{}.{}", user_id, signature(user_id, secret))
}

/// Verify a cookie value and return the user ID it carries
pub fn verify_session(cookie_value: &str, secret: i64) -> Result<String, SessionError> {
    let value = cookie_value.trim();
    if value.is_empty() {
        return Err(SessionError::Missing);
    }

    if secret == 0 {
        let user_id = value.rsplit_once('.').map_or(value, |(user_id, _)| user_id);
        if user_id.is_empty() {
            return Err(SessionError::Malformed);
        }
        return Ok(user_id.to_string());
    }

    let (user_id, provided) = value.rsplit_once('.').ok_or(SessionError::Malformed)?;
    if user_id.is_empty() || provided.is_empty() {
        return Err(SessionError::Malformed);
    }

    if provided != signature(user_id, secret) {
        return Err(SessionError::InvalidSignature);
    }

    Ok(user_id.to_string())
}

/// Find a cookie by name in a raw `Cookie` header
pub fn find_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then_some(value)
    })
}
