//! Callback-to-song correlation
//!
//! A provider callback names its song in one of two ways: the `songId`
//! query parameter baked into the callback URL when the job was submitted,
//! or the provider task ID, looked up against `songs.suno_task_id`. The URL
//! wins when both are present; the task lookup covers callbacks that race
//! ahead of, or arrive without, the URL linkage.

use sqlx::SqlitePool;

use crate::db::songs;

/// Read-only resolver from callback identifiers to a song ID
#[derive(Clone)]
pub struct TaskCorrelator {
    db: SqlitePool,
}

impl TaskCorrelator {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Returns `None` for an orphaned callback; callers acknowledge and log it.
    pub async fn resolve_song_id(
        &self,
        url_song_id: Option<&str>,
        task_id: Option<&str>,
    ) -> lyra_common::Result<Option<String>> {
        if let Some(song_id) = non_blank(url_song_id) {
            return Ok(Some(song_id.to_string()));
        }

        let Some(task_id) = non_blank(task_id) else {
            return Ok(None);
        };

        let resolved = songs::find_song_id_by_task(&self.db, task_id).await?;
        if let Some(ref song_id) = resolved {
            tracing::debug!(task_id = %task_id, song_id = %song_id, "Resolved song from task ID");
        }
        Ok(resolved)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
