//! Phase retry guard
//!
//! A retry is a guarded state transition: the retry-count check and its
//! increment happen in the same conflict-checked transaction, so two
//! concurrent retries for one song can never both pass a count of 2.

use sqlx::SqlitePool;

use crate::db::songs;
use crate::error::{GenError, GenResult};
use crate::models::{Phase, Song, SongStatus};
use crate::services::orchestrator::{load_required, GenerationOrchestrator};
use crate::utils::{retry_on_conflict, DEFAULT_MAX_WAIT_MS};

/// Maximum retries per phase
pub const MAX_RETRIES: u32 = 3;

/// Reject a retry when the phase has used its budget
pub fn check_retry_allowed(song: &Song, phase: Phase) -> GenResult<()> {
    if song.generation_progress.phase(phase).retry_count >= MAX_RETRIES {
        return Err(GenError::RetryLimitExceeded {
            phase,
            max: MAX_RETRIES,
        });
    }
    Ok(())
}

/// Content the phase needs before it can be resubmitted
fn check_phase_inputs(song: &Song, phase: Phase) -> GenResult<()> {
    match phase {
        Phase::Lyrics if song.lyrics_prompt.trim().is_empty() => Err(GenError::InvalidState(
            "Song has no lyrics prompt to retry with".into(),
        )),
        Phase::Music if song.lyrics.as_deref().map_or(true, |l| l.trim().is_empty()) => {
            Err(GenError::InvalidState("Song has no selected lyrics to retry with".into()))
        }
        _ => Ok(()),
    }
}

/// Retries failed (or unsatisfying) phases within the retry budget
#[derive(Clone)]
pub struct RetryTracker {
    db: SqlitePool,
    orchestrator: GenerationOrchestrator,
}

impl RetryTracker {
    pub fn new(db: SqlitePool, orchestrator: GenerationOrchestrator) -> Self {
        Self { db, orchestrator }
    }

    /// Retry `phase` of song `song_id`; returns the new provider task ID.
    ///
    /// A submission failure keeps the consumed retry, marks the song
    /// `failed` with the phase error and returns the provider error.
    pub async fn retry(&self, song_id: &str, phase: Phase) -> GenResult<String> {
        let song = retry_on_conflict("retry phase", DEFAULT_MAX_WAIT_MS, || async move {
            let mut tx = self.db.begin().await?;
            let mut song = load_required(&mut tx, song_id).await?;

            check_retry_allowed(&song, phase)?;
            check_phase_inputs(&song, phase)?;

            song.generation_progress.phase_mut(phase).retry_count += 1;
            song.begin_phase(phase, &lyra_common::time::now_rfc3339());
            songs::update_song(&mut *tx, &mut song).await?;
            tx.commit().await?;
            Ok::<_, GenError>(song)
        })
        .await?;

        let attempt = song.generation_progress.phase(phase).retry_count;
        tracing::info!(song_id = %song_id, phase = %phase, attempt, max = MAX_RETRIES, "Retrying phase");

        match self.orchestrator.submit_phase(&song, phase).await {
            Ok(task_id) => {
                self.orchestrator.record_submission(song_id, phase, &task_id).await?;
                Ok(task_id)
            }
            Err(e) => {
                self.orchestrator
                    .record_submission_failure(song_id, phase, &e.to_string(), SongStatus::Failed)
                    .await?;
                Err(GenError::Provider(e))
            }
        }
    }
}
