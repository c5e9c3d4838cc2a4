//! Domain models for the generation lifecycle

pub mod callback;
pub mod progress;
pub mod song;
pub mod variant;

pub use callback::{CallbackData, CallbackEnvelope, CallbackType};
pub use progress::{GenerationProgress, Phase, PhaseProgress};
pub use song::{LyricsVariant, NewSong, Song, SongStatus};
pub use variant::{TrackMedia, Variant};
