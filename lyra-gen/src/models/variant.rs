//! Variant (track) model

use serde::{Deserialize, Serialize};

/// Media fields shared by a variant and its song's primary mirror
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackMedia {
    pub audio_url: Option<String>,
    pub stream_audio_url: Option<String>,
    pub source_audio_url: Option<String>,
    pub source_stream_audio_url: Option<String>,
    pub image_url: Option<String>,
    pub duration_seconds: Option<f64>,
    pub model_name: Option<String>,
    pub prompt: Option<String>,
}

impl TrackMedia {
    /// Carries something playable (final or preview)
    pub fn has_audio(&self) -> bool {
        self.audio_url.is_some() || self.stream_audio_url.is_some()
    }
}

/// One rendered audio asset belonging to a song
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    /// Stable across repeated callbacks for the same underlying track
    pub track_id: String,
    pub song_id: String,
    /// ID the provider assigned, when it sent one
    pub provider_id: Option<String>,
    pub title: Option<String>,
    #[serde(flatten)]
    pub media: TrackMedia,
    pub tags: Option<String>,
    /// Position among sibling variants; 0 is primary
    pub order: u32,
    /// Creation time reported by the provider
    pub created_at: Option<String>,
}
