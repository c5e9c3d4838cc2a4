//! Variant backfill
//!
//! Replays stored callback snapshots for songs that have `callback_data` but
//! no variant rows. Safe to run repeatedly: track IDs are stable, so a
//! second run finds no candidates and a concurrent callback merges cleanly.

use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::songs;
use crate::error::GenResult;
use crate::services::callback_reconciler::CallbackReconciler;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub scanned: usize,
    pub backfilled: usize,
    pub failed: usize,
}

/// Backfill every candidate song; per-song failures are counted, not fatal
pub async fn run_backfill(db: &SqlitePool, reconciler: &CallbackReconciler) -> GenResult<BackfillReport> {
    let candidates = songs::list_backfill_candidates(db).await?;
    let mut report = BackfillReport {
        scanned: candidates.len(),
        ..Default::default()
    };

    tracing::info!(candidates = report.scanned, "Starting variant backfill");

    for song_id in &candidates {
        match reconciler.backfill_song(song_id).await {
            Ok(0) => {
                tracing::debug!(song_id = %song_id, "Stored snapshot held no tracks");
            }
            Ok(written) => {
                tracing::debug!(song_id = %song_id, variants = written, "Backfilled song");
                report.backfilled += 1;
            }
            Err(e) => {
                tracing::warn!(song_id = %song_id, error = %e, "Backfill failed for song");
                report.failed += 1;
            }
        }
    }

    tracing::info!(
        scanned = report.scanned,
        backfilled = report.backfilled,
        failed = report.failed,
        "Variant backfill finished"
    );
    Ok(report)
}
