//! Callback reconciliation
//!
//! Merges provider callbacks into persisted song and variant state. Every
//! merge is one transaction: load the song, upsert variants, write the song
//! back with a revision check. A lost race re-runs the whole merge, so
//! callbacks for the same song can arrive in any order, any number of times.

use serde_json::Value;
use sqlx::SqlitePool;

use crate::db::{songs, variants};
use crate::error::{GenError, GenResult};
use crate::models::{CallbackType, Phase, Song, SongStatus, Variant};
use crate::services::track_normalizer;
use crate::utils::{retry_on_conflict, DEFAULT_MAX_WAIT_MS};

/// What a callback did to the song
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// State merged (possibly a no-op write when nothing changed)
    Applied { variants: usize, status: SongStatus },
    /// Nothing worth processing yet
    NotYet,
    /// Callback superseded by newer state; acknowledged and ignored
    Stale,
}

/// Applies provider callbacks to songs
#[derive(Clone)]
pub struct CallbackReconciler {
    db: SqlitePool,
}

impl CallbackReconciler {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Merge a music callback carrying `raw_tracks` into song `song_id`.
    pub async fn reconcile(
        &self,
        song_id: &str,
        task_id: Option<&str>,
        raw_tracks: &[Value],
        callback_type: CallbackType,
    ) -> GenResult<ReconcileOutcome> {
        let normalized = track_normalizer::normalize_all(raw_tracks, song_id);

        let has_audio = normalized.iter().any(|v| v.media.has_audio());
        if normalized.is_empty() || !(callback_type.signals_audio() || has_audio) {
            tracing::debug!(
                song_id = %song_id,
                callback_type = ?callback_type,
                tracks = raw_tracks.len(),
                "Callback carries no audio yet"
            );
            return Ok(ReconcileOutcome::NotYet);
        }

        let outcome = retry_on_conflict("reconcile music callback", DEFAULT_MAX_WAIT_MS, || {
            self.apply_tracks(song_id, task_id, &normalized, callback_type)
        })
        .await?;

        match &outcome {
            ReconcileOutcome::Applied { variants, status } => tracing::info!(
                song_id = %song_id,
                task_id = task_id.unwrap_or(""),
                variants,
                status = %status,
                "Music callback reconciled"
            ),
            ReconcileOutcome::Stale => tracing::info!(
                song_id = %song_id,
                task_id = task_id.unwrap_or(""),
                "Ignoring interim callback for song with final audio"
            ),
            ReconcileOutcome::NotYet => {}
        }

        Ok(outcome)
    }

    async fn apply_tracks(
        &self,
        song_id: &str,
        task_id: Option<&str>,
        normalized: &[Variant],
        callback_type: CallbackType,
    ) -> GenResult<ReconcileOutcome> {
        let mut tx = self.db.begin().await?;

        let song = songs::load_song(&mut *tx, song_id)
            .await?
            .ok_or_else(|| GenError::SongNotFound(song_id.to_string()))?;

        let is_complete = callback_type == CallbackType::Complete;
        let same_task = task_id.map_or(true, |t| song.suno_task_id.as_deref() == Some(t));
        if !is_complete && song.status.has_final_audio() && same_task {
            return Ok(ReconcileOutcome::Stale);
        }

        let current_task = task_id.or(song.suno_task_id.as_deref());
        upsert_all(&mut tx, normalized, current_task).await?;

        let mut updated = song.clone();
        if let Some(primary) = normalized.first() {
            updated.media = primary.media.clone();
        }
        updated.status = match (is_complete, song.status) {
            (true, SongStatus::Complete) => SongStatus::Complete,
            (true, _) => SongStatus::Ready,
            (false, _) => SongStatus::GeneratingMusic,
        };

        let progress = updated.generation_progress.phase_mut(Phase::Music);
        if let Some(task_id) = task_id {
            progress.task_id = Some(task_id.to_string());
        }
        if is_complete {
            progress.complete(&lyra_common::time::now_rfc3339());
        }

        updated.callback_data = Some(snapshot(normalized)?);
        if let Some(task_id) = task_id {
            updated.suno_task_id = Some(task_id.to_string());
        }
        updated.error_message = None;

        let status = updated.status;
        write_if_changed(&mut tx, &song, updated).await?;
        tx.commit().await?;

        Ok(ReconcileOutcome::Applied {
            variants: normalized.len(),
            status,
        })
    }

    /// Merge a lyrics callback into song `song_id`.
    pub async fn apply_lyrics(
        &self,
        song_id: &str,
        task_id: Option<&str>,
        raw_tracks: &[Value],
        callback_type: CallbackType,
    ) -> GenResult<ReconcileOutcome> {
        if callback_type != CallbackType::Complete {
            return Ok(ReconcileOutcome::NotYet);
        }

        let lyrics = track_normalizer::normalize_lyrics(raw_tracks);
        if lyrics.is_empty() {
            tracing::warn!(song_id = %song_id, "Lyrics callback carried no lyric text");
            return Ok(ReconcileOutcome::NotYet);
        }

        let outcome = retry_on_conflict("reconcile lyrics callback", DEFAULT_MAX_WAIT_MS, || {
            let lyrics = lyrics.clone();
            async move {
                let mut tx = self.db.begin().await?;
                let song = songs::load_song(&mut *tx, song_id)
                    .await?
                    .ok_or_else(|| GenError::SongNotFound(song_id.to_string()))?;

                let awaiting = match song.status {
                    SongStatus::Pending | SongStatus::GeneratingLyrics => true,
                    SongStatus::Failed => {
                        task_id.is_some()
                            && song.generation_progress.lyrics.task_id.as_deref() == task_id
                    }
                    _ => false,
                };
                if !awaiting {
                    return Ok(ReconcileOutcome::Stale);
                }

                let count = lyrics.len();
                let mut updated = song.clone();
                updated.lyrics_variants = lyrics;
                updated.status = SongStatus::LyricsReady;
                updated.error_message = None;

                let progress = updated.generation_progress.phase_mut(Phase::Lyrics);
                if let Some(task_id) = task_id {
                    progress.task_id = Some(task_id.to_string());
                    updated.suno_task_id = Some(task_id.to_string());
                }
                progress.complete(&lyra_common::time::now_rfc3339());

                write_if_changed(&mut tx, &song, updated).await?;
                tx.commit().await?;

                Ok::<_, GenError>(ReconcileOutcome::Applied {
                    variants: count,
                    status: SongStatus::LyricsReady,
                })
            }
        })
        .await?;

        match &outcome {
            ReconcileOutcome::Applied { variants, .. } => tracing::info!(
                song_id = %song_id,
                task_id = task_id.unwrap_or(""),
                variants,
                "Lyrics callback reconciled"
            ),
            _ => tracing::info!(
                song_id = %song_id,
                task_id = task_id.unwrap_or(""),
                "Ignoring lyrics callback for song no longer awaiting lyrics"
            ),
        }

        Ok(outcome)
    }

    /// Record a provider-reported failure for `phase`.
    ///
    /// Only a song still waiting on that phase is failed; an error for a job
    /// that was superseded or already finished is stale.
    pub async fn record_provider_error(
        &self,
        song_id: &str,
        task_id: Option<&str>,
        phase: Phase,
        message: &str,
    ) -> GenResult<ReconcileOutcome> {
        let outcome = retry_on_conflict("record provider error", DEFAULT_MAX_WAIT_MS, || async move {
            let mut tx = self.db.begin().await?;
            let song = songs::load_song(&mut *tx, song_id)
                .await?
                .ok_or_else(|| GenError::SongNotFound(song_id.to_string()))?;

            if song.status != SongStatus::in_progress(phase) {
                return Ok(ReconcileOutcome::Stale);
            }
            let current_task = song.generation_progress.phase(phase).task_id.as_deref();
            if let (Some(incoming), Some(current)) = (task_id, current_task) {
                if incoming != current {
                    return Ok(ReconcileOutcome::Stale);
                }
            }

            let mut updated = song.clone();
            updated.fail_phase(phase, message);
            write_if_changed(&mut tx, &song, updated).await?;
            tx.commit().await?;

            Ok::<_, GenError>(ReconcileOutcome::Applied {
                variants: 0,
                status: SongStatus::Failed,
            })
        })
        .await?;

        if matches!(outcome, ReconcileOutcome::Applied { .. }) {
            tracing::warn!(
                song_id = %song_id,
                task_id = task_id.unwrap_or(""),
                phase = %phase,
                error = %message,
                "Provider reported generation failure"
            );
        }

        Ok(outcome)
    }

    /// Rebuild variant rows and primary fields from the stored callback
    /// snapshot. Status, task ID and progress are left alone.
    ///
    /// Returns the number of variants written.
    pub async fn backfill_song(&self, song_id: &str) -> GenResult<usize> {
        retry_on_conflict("backfill song", DEFAULT_MAX_WAIT_MS, || async move {
            let mut tx = self.db.begin().await?;
            let song = songs::load_song(&mut *tx, song_id)
                .await?
                .ok_or_else(|| GenError::SongNotFound(song_id.to_string()))?;

            let raw = stored_tracks(&song)?;
            let normalized = track_normalizer::normalize_all(&raw, song_id);
            if normalized.is_empty() {
                return Ok(0);
            }

            upsert_all(&mut tx, &normalized, song.suno_task_id.as_deref()).await?;

            let mut updated = song.clone();
            if let Some(primary) = normalized.first() {
                updated.media = primary.media.clone();
            }
            write_if_changed(&mut tx, &song, updated).await?;
            tx.commit().await?;

            Ok(normalized.len())
        })
        .await
    }
}

async fn upsert_all(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    normalized: &[Variant],
    task_id: Option<&str>,
) -> GenResult<()> {
    for variant in normalized {
        if !variants::upsert_variant(&mut **tx, variant, task_id).await? {
            tracing::warn!(
                song_id = %variant.song_id,
                track_id = %variant.track_id,
                "Track ID already belongs to another song, skipping"
            );
        }
    }
    Ok(())
}

/// Compare-and-set the song only when the merge changed something, so a
/// replayed callback leaves revision and `updated_at` untouched.
async fn write_if_changed(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    original: &Song,
    mut updated: Song,
) -> GenResult<()> {
    if updated != *original {
        songs::update_song(&mut **tx, &mut updated).await?;
    }
    Ok(())
}

fn snapshot(normalized: &[Variant]) -> GenResult<String> {
    serde_json::to_string(normalized).map_err(|e| {
        GenError::Common(lyra_common::Error::Internal(format!(
            "Failed to serialize callback snapshot: {}",
            e
        )))
    })
}

fn stored_tracks(song: &Song) -> GenResult<Vec<Value>> {
    let data = song.callback_data.as_deref().unwrap_or("").trim();
    if data.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(data).map_err(|e| {
        GenError::Common(lyra_common::Error::InvalidInput(format!(
            "Stored callback data for song {} is not a track array: {}",
            song.id, e
        )))
    })
}
