//! Song aggregate and its status state machine
//!
//! ```text
//! pending ──start lyrics──▶ generating_lyrics ──lyrics callback──▶ lyrics_ready
//! lyrics_ready ──select variant──▶ generating_music ──music callback──▶ ready
//! ready ──mark complete──▶ complete
//! generating_* ──provider error──▶ failed ──retry──▶ generating_*
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{GenerationProgress, Phase, TrackMedia};

/// Song status (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SongStatus {
    Pending,
    GeneratingLyrics,
    LyricsReady,
    GeneratingMusic,
    Ready,
    Failed,
    Complete,
}

impl SongStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SongStatus::Pending => "pending",
            SongStatus::GeneratingLyrics => "generating_lyrics",
            SongStatus::LyricsReady => "lyrics_ready",
            SongStatus::GeneratingMusic => "generating_music",
            SongStatus::Ready => "ready",
            SongStatus::Failed => "failed",
            SongStatus::Complete => "complete",
        }
    }

    /// Status a song holds while `phase` has an outstanding provider job
    pub fn in_progress(phase: Phase) -> Self {
        match phase {
            Phase::Lyrics => SongStatus::GeneratingLyrics,
            Phase::Music => SongStatus::GeneratingMusic,
        }
    }

    /// Audio has been delivered
    pub fn has_final_audio(&self) -> bool {
        matches!(self, SongStatus::Ready | SongStatus::Complete)
    }
}

impl fmt::Display for SongStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SongStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SongStatus::Pending),
            "generating_lyrics" => Ok(SongStatus::GeneratingLyrics),
            "lyrics_ready" => Ok(SongStatus::LyricsReady),
            "generating_music" => Ok(SongStatus::GeneratingMusic),
            "ready" => Ok(SongStatus::Ready),
            "failed" => Ok(SongStatus::Failed),
            "complete" => Ok(SongStatus::Complete),
            other => Err(format!("Unknown song status: {}", other)),
        }
    }
}

/// One candidate lyric text offered to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LyricsVariant {
    pub variant_index: u32,
    #[serde(default)]
    pub title: Option<String>,
    pub text: String,
    #[serde(default)]
    pub selected: bool,
}

/// Fields supplied by the user when committing to a generation
#[derive(Debug, Clone, Default)]
pub struct NewSong {
    pub user_id: String,
    pub conversation_id: Option<String>,
    pub title: Option<String>,
    pub lyrics_prompt: String,
    pub style: Option<String>,
    pub instrumental: bool,
}

/// Song aggregate root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub id: String,
    pub public_id: Option<String>,
    pub user_id: String,
    pub conversation_id: Option<String>,
    pub title: Option<String>,
    pub lyrics_prompt: String,
    pub style: Option<String>,
    pub instrumental: bool,
    pub status: SongStatus,
    pub suno_task_id: Option<String>,

    /// Mirrors the primary (first) variant
    #[serde(flatten)]
    pub media: TrackMedia,

    /// Last normalized track array, serialized
    pub callback_data: Option<String>,

    pub lyrics: Option<String>,
    pub lyrics_variants: Vec<LyricsVariant>,
    pub generation_progress: GenerationProgress,
    pub error_message: Option<String>,

    /// Bumped on every write; guards compare-and-set updates
    pub revision: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Song {
    /// Create a song in `pending`
    pub fn new(new_song: NewSong) -> Self {
        let now = lyra_common::time::now_rfc3339();
        let id = lyra_common::uuid_utils::generate().to_string();
        let public_id = id.split('-').next().map(str::to_string);

        Self {
            id,
            public_id,
            user_id: new_song.user_id,
            conversation_id: new_song.conversation_id,
            title: new_song.title,
            lyrics_prompt: new_song.lyrics_prompt,
            style: new_song.style,
            instrumental: new_song.instrumental,
            status: SongStatus::Pending,
            suno_task_id: None,
            media: TrackMedia::default(),
            callback_data: None,
            lyrics: None,
            lyrics_variants: Vec::new(),
            generation_progress: GenerationProgress::default(),
            error_message: None,
            revision: 0,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Mark lyrics variant `index` as the chosen one and copy its text.
    ///
    /// Returns false when `index` is out of range (song left untouched).
    pub fn select_lyrics_variant(&mut self, index: usize) -> bool {
        let Some(text) = self.lyrics_variants.get(index).map(|v| v.text.clone()) else {
            return false;
        };
        for (i, variant) in self.lyrics_variants.iter_mut().enumerate() {
            variant.selected = i == index;
        }
        self.lyrics = Some(text);
        true
    }

    /// Currently selected lyrics variant, if any
    pub fn selected_lyrics_variant(&self) -> Option<&LyricsVariant> {
        self.lyrics_variants.iter().find(|v| v.selected)
    }

    /// Enter the in-progress status for `phase` and reset its bookkeeping
    pub fn begin_phase(&mut self, phase: Phase, now: &str) {
        self.status = SongStatus::in_progress(phase);
        self.error_message = None;
        self.generation_progress.phase_mut(phase).begin(now);
    }

    /// Record a fatal error for `phase`
    pub fn fail_phase(&mut self, phase: Phase, message: &str) {
        self.status = SongStatus::Failed;
        self.error_message = Some(message.to_string());
        self.generation_progress.phase_mut(phase).error = Some(message.to_string());
    }
}
