//! Variant persistence
//!
//! Variants are keyed by `track_id` and only ever upserted, never deleted,
//! so replaying a callback updates rows in place.

use sqlx::{sqlite::SqliteRow, Executor, Row, Sqlite};
use lyra_common::Result;

use crate::models::{TrackMedia, Variant};

/// Insert or update a variant by `track_id`, tagging it with the provider
/// task that produced it.
///
/// Returns false when the track ID already belongs to a different song;
/// that row is left untouched.
pub async fn upsert_variant<'e, E>(
    executor: E,
    variant: &Variant,
    task_id: Option<&str>,
) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO song_variants (
            track_id, song_id, task_id, provider_id, title,
            audio_url, stream_audio_url, source_audio_url, source_stream_audio_url,
            image_url, duration_seconds, model_name, prompt, tags,
            variant_order, provider_created_at, inserted_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(track_id) DO UPDATE SET
            task_id = COALESCE(excluded.task_id, song_variants.task_id),
            provider_id = excluded.provider_id,
            title = excluded.title,
            audio_url = excluded.audio_url,
            stream_audio_url = excluded.stream_audio_url,
            source_audio_url = excluded.source_audio_url,
            source_stream_audio_url = excluded.source_stream_audio_url,
            image_url = excluded.image_url,
            duration_seconds = excluded.duration_seconds,
            model_name = excluded.model_name,
            prompt = excluded.prompt,
            tags = excluded.tags,
            variant_order = excluded.variant_order,
            provider_created_at = excluded.provider_created_at
        WHERE song_variants.song_id = excluded.song_id
        "#,
    )
    .bind(&variant.track_id)
    .bind(&variant.song_id)
    .bind(task_id)
    .bind(&variant.provider_id)
    .bind(&variant.title)
    .bind(&variant.media.audio_url)
    .bind(&variant.media.stream_audio_url)
    .bind(&variant.media.source_audio_url)
    .bind(&variant.media.source_stream_audio_url)
    .bind(&variant.media.image_url)
    .bind(variant.media.duration_seconds)
    .bind(&variant.media.model_name)
    .bind(&variant.media.prompt)
    .bind(&variant.tags)
    .bind(variant.order as i64)
    .bind(&variant.created_at)
    .bind(lyra_common::time::now_rfc3339())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Variants of a song, primary first.
///
/// Tracks from the song's current provider task come first in provider
/// order; tracks kept from earlier tasks follow.
pub async fn list_variants<'e, E>(executor: E, song_id: &str) -> Result<Vec<Variant>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        r#"
        SELECT v.track_id, v.song_id, v.provider_id, v.title,
               v.audio_url, v.stream_audio_url, v.source_audio_url, v.source_stream_audio_url,
               v.image_url, v.duration_seconds, v.model_name, v.prompt, v.tags,
               v.variant_order, v.provider_created_at
        FROM song_variants v
        JOIN songs s ON s.id = v.song_id
        WHERE v.song_id = ?
        ORDER BY CASE WHEN v.task_id IS s.suno_task_id THEN 0 ELSE 1 END,
                 v.variant_order,
                 v.inserted_at DESC
        "#,
    )
    .bind(song_id)
    .fetch_all(executor)
    .await?;

    rows.iter().map(variant_from_row).collect()
}

pub async fn count_variants<'e, E>(executor: E, song_id: &str) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM song_variants WHERE song_id = ?")
        .bind(song_id)
        .fetch_one(executor)
        .await?;
    Ok(count)
}

fn variant_from_row(row: &SqliteRow) -> Result<Variant> {
    let order: i64 = row.try_get("variant_order")?;
    Ok(Variant {
        track_id: row.try_get("track_id")?,
        song_id: row.try_get("song_id")?,
        provider_id: row.try_get("provider_id")?,
        title: row.try_get("title")?,
        media: TrackMedia {
            audio_url: row.try_get("audio_url")?,
            stream_audio_url: row.try_get("stream_audio_url")?,
            source_audio_url: row.try_get("source_audio_url")?,
            source_stream_audio_url: row.try_get("source_stream_audio_url")?,
            image_url: row.try_get("image_url")?,
            duration_seconds: row.try_get("duration_seconds")?,
            model_name: row.try_get("model_name")?,
            prompt: row.try_get("prompt")?,
        },
        tags: row.try_get("tags")?,
        order: order.max(0) as u32,
        created_at: row.try_get("provider_created_at")?,
    })
}
