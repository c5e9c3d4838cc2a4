//! # Lyra Common Library
//!
//! Shared code for the Lyra services including:
//! - Error type shared by storage and configuration code
//! - Bootstrap configuration loading and root folder resolution
//! - Database initialization and schema
//! - Session cookie signing
//! - UUID and timestamp helpers

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
