//! Callback reconciliation: idempotence, primary mirroring, ordering guards
//! and backfill replay.

mod common;

use common::*;
use lyra_gen::db::variants;
use lyra_gen::models::{CallbackType, Phase, SongStatus};
use lyra_gen::services::ReconcileOutcome;
use serde_json::json;

#[tokio::test]
async fn test_reconcile_twice_is_idempotent() {
    let (state, _provider) = test_state().await;
    let (song, task_id) = song_generating_music(&state).await;
    let tracks = music_tracks();
    let tracks = tracks.as_array().unwrap();

    let first = state
        .reconciler
        .reconcile(&song.id, Some(&task_id), tracks, CallbackType::Complete)
        .await
        .unwrap();
    assert_eq!(
        first,
        ReconcileOutcome::Applied { variants: 2, status: SongStatus::Ready }
    );
    let after_first = load(&state, &song.id).await;
    let variants_first = variants::list_variants(&state.db, &song.id).await.unwrap();

    state
        .reconciler
        .reconcile(&song.id, Some(&task_id), tracks, CallbackType::Complete)
        .await
        .unwrap();
    let after_second = load(&state, &song.id).await;
    let variants_second = variants::list_variants(&state.db, &song.id).await.unwrap();

    assert_eq!(after_first, after_second, "replay must not touch the song row");
    assert_eq!(variants_first, variants_second);
    assert_eq!(variants::count_variants(&state.db, &song.id).await.unwrap(), 2);
}

#[tokio::test]
async fn test_primary_fields_mirror_first_variant() {
    let (state, _provider) = test_state().await;
    let (song, task_id) = song_generating_music(&state).await;
    let tracks = music_tracks();

    state
        .reconciler
        .reconcile(&song.id, Some(&task_id), tracks.as_array().unwrap(), CallbackType::Complete)
        .await
        .unwrap();

    let song = load(&state, &song.id).await;
    let stored = variants::list_variants(&state.db, &song.id).await.unwrap();

    assert_eq!(stored[0].order, 0);
    assert_eq!(stored[1].order, 1);
    assert_eq!(song.media, stored[0].media);
    assert_eq!(song.media.audio_url.as_deref(), Some("https://cdn.example/a.mp3"));
    assert_eq!(song.media.duration_seconds, Some(198.4));
    assert_eq!(song.suno_task_id.as_deref(), Some(task_id.as_str()));
    assert!(song.error_message.is_none());
    assert!(song.generation_progress.music.completed_at.is_some());

    let snapshot: Vec<serde_json::Value> =
        serde_json::from_str(song.callback_data.as_deref().unwrap()).unwrap();
    assert_eq!(snapshot.len(), 2);
}

#[tokio::test]
async fn test_smaller_payload_clears_stale_primary_fields() {
    let (state, _provider) = test_state().await;
    let (song, task_id) = song_generating_music(&state).await;

    state
        .reconciler
        .reconcile(&song.id, Some(&task_id), music_tracks().as_array().unwrap(), CallbackType::Complete)
        .await
        .unwrap();

    let regenerated = json!([{
        "id": "8f1c2a9e-3b4d-4e5f-8a6b-7c8d9e0f1a2b",
        "audio_url": "https://cdn.example/a2.mp3"
    }]);
    state
        .reconciler
        .reconcile(&song.id, Some(&task_id), regenerated.as_array().unwrap(), CallbackType::Complete)
        .await
        .unwrap();

    let song = load(&state, &song.id).await;
    assert_eq!(song.media.audio_url.as_deref(), Some("https://cdn.example/a2.mp3"));
    assert!(song.media.image_url.is_none());
    assert!(song.media.source_audio_url.is_none());
    assert!(song.media.duration_seconds.is_none());

    // Previously stored variants are kept
    assert_eq!(variants::count_variants(&state.db, &song.id).await.unwrap(), 2);
}

#[tokio::test]
async fn test_callback_without_audio_is_not_yet() {
    let (state, _provider) = test_state().await;
    let (song, task_id) = song_generating_music(&state).await;

    let no_tracks = state
        .reconciler
        .reconcile(&song.id, Some(&task_id), &[], CallbackType::Complete)
        .await
        .unwrap();
    assert_eq!(no_tracks, ReconcileOutcome::NotYet);

    let silent = json!([{ "id": "x", "title": "pending" }]);
    let text_only = state
        .reconciler
        .reconcile(&song.id, Some(&task_id), silent.as_array().unwrap(), CallbackType::Text)
        .await
        .unwrap();
    assert_eq!(text_only, ReconcileOutcome::NotYet);

    assert_eq!(load(&state, &song.id).await.status, SongStatus::GeneratingMusic);
    assert_eq!(variants::count_variants(&state.db, &song.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_marker_less_preview_is_processed() {
    let (state, _provider) = test_state().await;
    let (song, task_id) = song_generating_music(&state).await;

    let preview = json!([{ "id": "p1", "stream_audio_url": "https://cdn.example/p.m3u8" }]);
    let outcome = state
        .reconciler
        .reconcile(&song.id, Some(&task_id), preview.as_array().unwrap(), CallbackType::Unknown)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ReconcileOutcome::Applied { variants: 1, status: SongStatus::GeneratingMusic }
    );
    let song = load(&state, &song.id).await;
    assert_eq!(song.media.stream_audio_url.as_deref(), Some("https://cdn.example/p.m3u8"));
    assert!(song.generation_progress.music.completed_at.is_none());
}

#[tokio::test]
async fn test_late_preview_never_overwrites_final_audio() {
    let (state, _provider) = test_state().await;
    let (song, task_id) = song_generating_music(&state).await;

    state
        .reconciler
        .reconcile(&song.id, Some(&task_id), music_tracks().as_array().unwrap(), CallbackType::Complete)
        .await
        .unwrap();
    let ready = load(&state, &song.id).await;

    let preview = json!([{
        "id": "8f1c2a9e-3b4d-4e5f-8a6b-7c8d9e0f1a2b",
        "stream_audio_url": "https://cdn.example/early.m3u8"
    }]);
    let outcome = state
        .reconciler
        .reconcile(&song.id, Some(&task_id), preview.as_array().unwrap(), CallbackType::First)
        .await
        .unwrap();

    assert_eq!(outcome, ReconcileOutcome::Stale);
    assert_eq!(load(&state, &song.id).await, ready);
}

#[tokio::test]
async fn test_complete_callback_keeps_complete_status() {
    let (state, _provider) = test_state().await;
    let (song, task_id) = song_generating_music(&state).await;
    let tracks = music_tracks();

    state
        .reconciler
        .reconcile(&song.id, Some(&task_id), tracks.as_array().unwrap(), CallbackType::Complete)
        .await
        .unwrap();
    state.orchestrator.complete_song(&song.id).await.unwrap();

    state
        .reconciler
        .reconcile(&song.id, Some(&task_id), tracks.as_array().unwrap(), CallbackType::Complete)
        .await
        .unwrap();

    assert_eq!(load(&state, &song.id).await.status, SongStatus::Complete);
}

#[tokio::test]
async fn test_duplicate_lyrics_callback_is_stale() {
    let (state, _provider) = test_state().await;
    let song = song_with_lyrics(&state).await;
    let task_id = song.generation_progress.lyrics.task_id.clone();

    state.orchestrator.select_lyrics_variant(&song.id, 1).await.unwrap();

    let outcome = state
        .reconciler
        .apply_lyrics(
            &song.id,
            task_id.as_deref(),
            lyrics_tracks().as_array().unwrap(),
            CallbackType::Complete,
        )
        .await
        .unwrap();

    assert_eq!(outcome, ReconcileOutcome::Stale);
    let song = load(&state, &song.id).await;
    assert_eq!(song.status, SongStatus::GeneratingMusic);
    assert!(song.lyrics_variants[1].selected);
}

#[tokio::test]
async fn test_provider_error_only_fails_waiting_phase() {
    let (state, _provider) = test_state().await;
    let (song, task_id) = song_generating_music(&state).await;

    // Lyrics error while music is running: stale
    let stale = state
        .reconciler
        .record_provider_error(&song.id, None, Phase::Lyrics, "boom")
        .await
        .unwrap();
    assert_eq!(stale, ReconcileOutcome::Stale);

    // Error for another music task: stale
    let superseded = state
        .reconciler
        .record_provider_error(&song.id, Some("old-task"), Phase::Music, "boom")
        .await
        .unwrap();
    assert_eq!(superseded, ReconcileOutcome::Stale);

    let applied = state
        .reconciler
        .record_provider_error(&song.id, Some(&task_id), Phase::Music, "Audio generation failed")
        .await
        .unwrap();
    assert_eq!(
        applied,
        ReconcileOutcome::Applied { variants: 0, status: SongStatus::Failed }
    );

    let song = load(&state, &song.id).await;
    assert_eq!(song.status, SongStatus::Failed);
    assert_eq!(song.error_message.as_deref(), Some("Audio generation failed"));
    assert_eq!(
        song.generation_progress.music.error.as_deref(),
        Some("Audio generation failed")
    );
}

#[tokio::test]
async fn test_unknown_song_is_reported() {
    let (state, _provider) = test_state().await;
    let err = state
        .reconciler
        .reconcile("missing", Some("t"), music_tracks().as_array().unwrap(), CallbackType::Complete)
        .await
        .unwrap_err();
    assert!(matches!(err, lyra_gen::GenError::SongNotFound(_)));
}

#[tokio::test]
async fn test_backfill_restores_variants_from_snapshot() {
    let (state, _provider) = test_state().await;
    let (song, task_id) = song_generating_music(&state).await;

    state
        .reconciler
        .reconcile(&song.id, Some(&task_id), music_tracks().as_array().unwrap(), CallbackType::Complete)
        .await
        .unwrap();
    let before = variants::list_variants(&state.db, &song.id).await.unwrap();

    // Simulate a period where variant rows were never written
    sqlx::query("DELETE FROM song_variants WHERE song_id = ?")
        .bind(&song.id)
        .execute(&state.db)
        .await
        .unwrap();

    let report = lyra_gen::services::run_backfill(&state.db, &state.reconciler)
        .await
        .unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.backfilled, 1);
    assert_eq!(report.failed, 0);

    let after = variants::list_variants(&state.db, &song.id).await.unwrap();
    assert_eq!(after.len(), before.len());
    for (a, b) in after.iter().zip(before.iter()) {
        assert_eq!(a.track_id, b.track_id);
        assert_eq!(a.provider_id, b.provider_id);
        assert_eq!(a.media, b.media);
        assert_eq!(a.order, b.order);
    }

    // Nothing left to do on a second run
    let again = lyra_gen::services::run_backfill(&state.db, &state.reconciler)
        .await
        .unwrap();
    assert_eq!(again.scanned, 0);
}

#[tokio::test]
async fn test_backfill_counts_corrupt_snapshots() {
    let (state, _provider) = test_state().await;
    let song = state.orchestrator.create_song(new_song("broken")).await.unwrap();

    sqlx::query("UPDATE songs SET callback_data = 'not json' WHERE id = ?")
        .bind(&song.id)
        .execute(&state.db)
        .await
        .unwrap();

    let report = lyra_gen::services::run_backfill(&state.db, &state.reconciler)
        .await
        .unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.failed, 1);
}

fn second_take_tracks() -> serde_json::Value {
    json!([
        {
            "id": "0d9e8f7a-6b5c-4d3e-8f2a-1b0c9d8e7f6a",
            "audio_url": "https://cdn.example/take2-a.mp3",
            "stream_audio_url": "https://cdn.example/take2-a.m3u8",
            "image_url": "https://cdn.example/take2-a.jpg",
            "duration": 187.0
        },
        {
            "id": "1e2f3a4b-5c6d-4e7f-8a9b-0c1d2e3f4a5b",
            "audio_url": "https://cdn.example/take2-b.mp3",
            "duration": 190.5
        }
    ])
}

#[tokio::test]
async fn test_reselect_keeps_primary_mirroring_current_task() {
    let (state, _provider) = test_state().await;
    let (song, first_task) = song_generating_music(&state).await;

    state
        .reconciler
        .reconcile(&song.id, Some(&first_task), music_tracks().as_array().unwrap(), CallbackType::Complete)
        .await
        .unwrap();

    let (_, second_task) = state.orchestrator.select_lyrics_variant(&song.id, 1).await.unwrap();
    assert_ne!(first_task, second_task);

    state
        .reconciler
        .reconcile(&song.id, Some(&second_task), second_take_tracks().as_array().unwrap(), CallbackType::Complete)
        .await
        .unwrap();

    let song = load(&state, &song.id).await;
    let stored = variants::list_variants(&state.db, &song.id).await.unwrap();

    // Earlier takes are kept, after the current task's tracks
    assert_eq!(stored.len(), 4);
    assert_eq!(song.media, stored[0].media);
    assert_eq!(stored[0].media.audio_url.as_deref(), Some("https://cdn.example/take2-a.mp3"));
    assert_eq!(stored[1].media.audio_url.as_deref(), Some("https://cdn.example/take2-b.mp3"));
    assert_eq!(stored[2].media.audio_url.as_deref(), Some("https://cdn.example/a.mp3"));
    assert_eq!(stored[3].media.audio_url.as_deref(), Some("https://cdn.example/b.mp3"));
}

#[tokio::test]
async fn test_music_retry_keeps_primary_mirroring_current_task() {
    let (state, _provider) = test_state().await;
    let (song, first_task) = song_generating_music(&state).await;

    state
        .reconciler
        .reconcile(&song.id, Some(&first_task), music_tracks().as_array().unwrap(), CallbackType::Complete)
        .await
        .unwrap();

    let retry_task = state.retry_tracker.retry(&song.id, Phase::Music).await.unwrap();
    state
        .reconciler
        .reconcile(&song.id, Some(&retry_task), second_take_tracks().as_array().unwrap(), CallbackType::Complete)
        .await
        .unwrap();

    let song = load(&state, &song.id).await;
    let stored = variants::list_variants(&state.db, &song.id).await.unwrap();

    assert_eq!(song.suno_task_id.as_deref(), Some(retry_task.as_str()));
    assert_eq!(song.media, stored[0].media);
    assert_eq!(stored[0].order, 0);
    assert_eq!(stored[1].order, 1);
    assert_eq!(stored[1].media.audio_url.as_deref(), Some("https://cdn.example/take2-b.mp3"));
}
