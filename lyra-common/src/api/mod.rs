//! API helpers shared by HTTP services

pub mod auth;

pub use auth::{load_session_secret, sign_session, verify_session, SessionError};
