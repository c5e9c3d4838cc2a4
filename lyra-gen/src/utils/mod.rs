//! Utility modules

pub mod db_retry;

pub use db_retry::{retry_on_conflict, Transient, DEFAULT_MAX_WAIT_MS};
