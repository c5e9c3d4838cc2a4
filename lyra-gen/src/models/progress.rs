//! Per-phase generation bookkeeping
//!
//! Stored on the song as one JSON document with a `lyrics` and a `music`
//! entry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the two independent generation sub-processes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Lyrics,
    Music,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Lyrics => "lyrics",
            Phase::Music => "music",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lyrics" => Ok(Phase::Lyrics),
            "music" => Ok(Phase::Music),
            other => Err(format!("Unknown phase: {} (expected \"lyrics\" or \"music\")", other)),
        }
    }
}

/// Bookkeeping for a single phase
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseProgress {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
}

impl PhaseProgress {
    /// Reset for a fresh provider submission
    pub fn begin(&mut self, now: &str) {
        self.task_id = None;
        self.started_at = Some(now.to_string());
        self.completed_at = None;
        self.error = None;
    }

    /// Stamp completion unless this attempt was already stamped.
    ///
    /// Timestamps are RFC 3339 in a fixed format, so string order is time order.
    pub fn complete(&mut self, now: &str) {
        let stale = match (&self.completed_at, &self.started_at) {
            (None, _) => true,
            (Some(done), Some(started)) => done < started,
            (Some(_), None) => false,
        };
        if stale {
            self.completed_at = Some(now.to_string());
        }
        self.error = None;
    }
}

/// Both phases of a song
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationProgress {
    #[serde(default)]
    pub lyrics: PhaseProgress,
    #[serde(default)]
    pub music: PhaseProgress,
}

impl GenerationProgress {
    pub fn phase(&self, phase: Phase) -> &PhaseProgress {
        match phase {
            Phase::Lyrics => &self.lyrics,
            Phase::Music => &self.music,
        }
    }

    pub fn phase_mut(&mut self, phase: Phase) -> &mut PhaseProgress {
        match phase {
            Phase::Lyrics => &mut self.lyrics,
            Phase::Music => &mut self.music,
        }
    }
}
