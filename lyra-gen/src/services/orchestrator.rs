//! Generation orchestrator
//!
//! Entry points that start provider jobs. Each phase start is split into
//! three steps so no transaction is held across network I/O:
//!
//! 1. transition the song to the phase's in-progress status (conflict-checked)
//! 2. submit the job to the provider
//! 3. record the returned task ID, or record the failure
//!
//! A failed submission never leaves a song claiming an in-flight job.

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::db::songs;
use crate::error::{GenError, GenResult};
use crate::models::{CallbackType, NewSong, Phase, Song, SongStatus};
use crate::services::callback_reconciler::{CallbackReconciler, ReconcileOutcome};
use crate::services::suno_client::{LyricsJob, MusicJob, MusicProvider, ProviderError, TaskState};
use crate::utils::{retry_on_conflict, DEFAULT_MAX_WAIT_MS};

/// Builds provider callback URLs that carry the song ID
#[derive(Debug, Clone)]
pub struct CallbackUrls {
    base: String,
}

impl CallbackUrls {
    pub fn new(public_base_url: &str) -> Self {
        Self {
            base: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn for_phase(&self, phase: Phase, song_id: &str) -> String {
        format!("{}/api/callbacks/suno/{}?songId={}", self.base, phase, song_id)
    }
}

/// Starts and restarts generation phases
#[derive(Clone)]
pub struct GenerationOrchestrator {
    db: SqlitePool,
    provider: Arc<dyn MusicProvider>,
    reconciler: CallbackReconciler,
    callbacks: CallbackUrls,
    model: String,
}

impl GenerationOrchestrator {
    pub fn new(
        db: SqlitePool,
        provider: Arc<dyn MusicProvider>,
        callbacks: CallbackUrls,
        model: impl Into<String>,
    ) -> Self {
        Self {
            reconciler: CallbackReconciler::new(db.clone()),
            db,
            provider,
            callbacks,
            model: model.into(),
        }
    }

    /// Create a `pending` song and start its lyrics phase.
    ///
    /// A rejected lyrics submission is not an error here: the song comes
    /// back `failed` with the lyrics error recorded, ready for retry.
    pub async fn create_song(&self, new_song: NewSong) -> GenResult<Song> {
        if new_song.lyrics_prompt.trim().is_empty() {
            return Err(lyra_common::Error::InvalidInput("prompt must not be empty".into()).into());
        }

        let song = Song::new(new_song);
        songs::insert_song(&self.db, &song).await?;
        tracing::info!(song_id = %song.id, user_id = %song.user_id, "Song created");

        self.start_lyrics(&song.id).await
    }

    /// `pending -> generating_lyrics`, then submit the lyrics job
    pub async fn start_lyrics(&self, song_id: &str) -> GenResult<Song> {
        let song = retry_on_conflict("start lyrics", DEFAULT_MAX_WAIT_MS, || async move {
            let mut tx = self.db.begin().await?;
            let mut song = load_required(&mut tx, song_id).await?;
            if song.status != SongStatus::Pending {
                return Err(GenError::InvalidState(format!(
                    "Cannot start lyrics for song in status {}",
                    song.status
                )));
            }
            song.begin_phase(Phase::Lyrics, &lyra_common::time::now_rfc3339());
            songs::update_song(&mut *tx, &mut song).await?;
            tx.commit().await?;
            Ok::<_, GenError>(song)
        })
        .await?;

        match self.submit_phase(&song, Phase::Lyrics).await {
            Ok(task_id) => self.record_submission(song_id, Phase::Lyrics, &task_id).await,
            Err(e) => {
                self.record_submission_failure(song_id, Phase::Lyrics, &e.to_string(), SongStatus::Failed)
                    .await
            }
        }
    }

    /// Choose lyrics variant `index` and start music generation.
    ///
    /// If the music submission fails the song returns to the status it had
    /// before the selection (normally `lyrics_ready`) with the error recorded,
    /// and the provider error is returned.
    pub async fn select_lyrics_variant(&self, song_id: &str, index: usize) -> GenResult<(Song, String)> {
        let (song, previous_status) =
            retry_on_conflict("select lyrics variant", DEFAULT_MAX_WAIT_MS, || async move {
                let mut tx = self.db.begin().await?;
                let mut song = load_required(&mut tx, song_id).await?;

                let previous_status = song.status;
                if !matches!(
                    previous_status,
                    SongStatus::LyricsReady | SongStatus::Ready | SongStatus::Complete
                ) {
                    return Err(GenError::InvalidState(format!(
                        "Cannot select lyrics for song in status {}",
                        previous_status
                    )));
                }

                let len = song.lyrics_variants.len();
                if !song.select_lyrics_variant(index) {
                    return Err(GenError::VariantOutOfRange { index, len });
                }
                song.begin_phase(Phase::Music, &lyra_common::time::now_rfc3339());
                songs::update_song(&mut *tx, &mut song).await?;
                tx.commit().await?;
                Ok((song, previous_status))
            })
            .await?;

        tracing::info!(song_id = %song_id, variant_index = index, "Lyrics variant selected");

        match self.submit_phase(&song, Phase::Music).await {
            Ok(task_id) => {
                let song = self.record_submission(song_id, Phase::Music, &task_id).await?;
                Ok((song, task_id))
            }
            Err(e) => {
                self.record_submission_failure(song_id, Phase::Music, &e.to_string(), previous_status)
                    .await?;
                Err(GenError::Provider(e))
            }
        }
    }

    /// Submit the provider job for `phase` using the song's current content
    pub async fn submit_phase(&self, song: &Song, phase: Phase) -> Result<String, ProviderError> {
        let callback_url = self.callbacks.for_phase(phase, &song.id);
        tracing::debug!(song_id = %song.id, phase = %phase, "Submitting provider job");

        match phase {
            Phase::Lyrics => {
                self.provider
                    .submit_lyrics(&LyricsJob {
                        prompt: song.lyrics_prompt.clone(),
                        callback_url,
                    })
                    .await
            }
            Phase::Music => {
                self.provider
                    .submit_music(&MusicJob {
                        lyrics: song.lyrics.clone().unwrap_or_default(),
                        style: song.style.clone(),
                        title: song.title.clone(),
                        model: self.model.clone(),
                        instrumental: song.instrumental,
                        callback_url,
                    })
                    .await
            }
        }
    }

    /// Persist the task ID the provider returned for `phase`.
    ///
    /// Failing here leaves a live provider job with no local record, so the
    /// task ID is logged and returned in `GenError::UnrecordedTask`.
    pub async fn record_submission(&self, song_id: &str, phase: Phase, task_id: &str) -> GenResult<Song> {
        let song = retry_on_conflict("record submission", DEFAULT_MAX_WAIT_MS, || async move {
            let mut tx = self.db.begin().await?;
            let mut song = load_required(&mut tx, song_id).await?;
            song.generation_progress.phase_mut(phase).task_id = Some(task_id.to_string());
            song.suno_task_id = Some(task_id.to_string());
            songs::update_song(&mut *tx, &mut song).await?;
            tx.commit().await?;
            Ok::<_, GenError>(song)
        })
        .await
        .map_err(|e| {
            tracing::error!(
                song_id = %song_id,
                phase = %phase,
                task_id = %task_id,
                error = %e,
                "Provider accepted job but task ID was not recorded"
            );
            GenError::UnrecordedTask {
                phase,
                task_id: task_id.to_string(),
                source: Box::new(e),
            }
        })?;

        tracing::info!(song_id = %song_id, phase = %phase, task_id = %task_id, "Provider job submitted");
        Ok(song)
    }

    /// Record a rejected submission and move the song to `next_status`.
    ///
    /// Only applies while the song is still in the phase's in-progress
    /// status; anything newer wins.
    pub async fn record_submission_failure(
        &self,
        song_id: &str,
        phase: Phase,
        message: &str,
        next_status: SongStatus,
    ) -> GenResult<Song> {
        tracing::warn!(song_id = %song_id, phase = %phase, error = %message, "Provider submission failed");

        retry_on_conflict("record submission failure", DEFAULT_MAX_WAIT_MS, || async move {
            let mut tx = self.db.begin().await?;
            let mut song = load_required(&mut tx, song_id).await?;
            if song.status != SongStatus::in_progress(phase) {
                return Ok(song);
            }
            song.fail_phase(phase, message);
            song.status = next_status;
            songs::update_song(&mut *tx, &mut song).await?;
            tx.commit().await?;
            Ok(song)
        })
        .await
    }

    /// Poll the provider for the song's music task and reconcile the result.
    pub async fn refresh(&self, song_id: &str) -> GenResult<ReconcileOutcome> {
        let song = songs::load_song(&self.db, song_id)
            .await?
            .ok_or_else(|| GenError::SongNotFound(song_id.to_string()))?;

        let task_id = song
            .generation_progress
            .music
            .task_id
            .clone()
            .ok_or_else(|| GenError::InvalidState("Song has no music task to refresh".into()))?;

        let snapshot = self.provider.fetch_music_task(&task_id).await?;
        tracing::debug!(song_id = %song_id, task_id = %task_id, state = ?snapshot.state, "Fetched provider task");

        let callback_type = match snapshot.state {
            TaskState::Pending => return Ok(ReconcileOutcome::NotYet),
            TaskState::Failed => {
                let message = snapshot
                    .error_message
                    .unwrap_or_else(|| "Provider reported a generation error".to_string());
                return self
                    .reconciler
                    .record_provider_error(song_id, Some(&task_id), Phase::Music, &message)
                    .await;
            }
            TaskState::TextReady => CallbackType::Text,
            TaskState::FirstReady => CallbackType::First,
            TaskState::Succeeded => CallbackType::Complete,
        };

        self.reconciler
            .reconcile(song_id, Some(&task_id), &snapshot.tracks, callback_type)
            .await
    }

    /// `ready -> complete` (idempotent on an already complete song)
    pub async fn complete_song(&self, song_id: &str) -> GenResult<Song> {
        retry_on_conflict("complete song", DEFAULT_MAX_WAIT_MS, || async move {
            let mut tx = self.db.begin().await?;
            let mut song = load_required(&mut tx, song_id).await?;
            match song.status {
                SongStatus::Complete => return Ok(song),
                SongStatus::Ready => {}
                other => {
                    return Err(GenError::InvalidState(format!(
                        "Only a ready song can be completed (status {})",
                        other
                    )))
                }
            }
            song.status = SongStatus::Complete;
            songs::update_song(&mut *tx, &mut song).await?;
            tx.commit().await?;
            tracing::info!(song_id = %song_id, "Song marked complete");
            Ok(song)
        })
        .await
    }
}

pub(crate) async fn load_required(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    song_id: &str,
) -> GenResult<Song> {
    songs::load_song(&mut **tx, song_id)
        .await?
        .ok_or_else(|| GenError::SongNotFound(song_id.to_string()))
}
