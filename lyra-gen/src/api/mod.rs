//! HTTP API handlers for lyra-gen

pub mod admin;
pub mod callbacks;
pub mod health;
pub mod session;
pub mod songs;

pub use admin::backfill;
pub use callbacks::{lyrics_callback, music_callback};
pub use health::health_routes;
pub use session::{session_middleware, SessionUser};
pub use songs::{complete_song, create_song, get_song, list_songs, refresh_song, retry_phase, select_lyrics};
