//! Song persistence
//!
//! Every write after the initial insert goes through [`update_song`], a
//! compare-and-set on `revision`. Callers read the song inside a
//! transaction, mutate it in memory and write it back; if another writer
//! committed in between, the update matches zero rows and returns
//! [`Error::Conflict`] so the caller can re-run the whole read-modify-write.

use sqlx::{sqlite::SqliteRow, Executor, Row, Sqlite};
use lyra_common::{Error, Result};

use crate::models::{GenerationProgress, LyricsVariant, Song, SongStatus, TrackMedia};

macro_rules! song_columns {
    () => {
        "id, public_id, user_id, conversation_id, title, lyrics_prompt, style, instrumental, \
         status, suno_task_id, audio_url, stream_audio_url, source_audio_url, \
         source_stream_audio_url, image_url, duration_seconds, model_name, prompt, \
         callback_data, lyrics, lyrics_variants, generation_progress, error_message, \
         revision, created_at, updated_at"
    };
}

/// Insert a freshly created song
pub async fn insert_song<'e, E>(executor: E, song: &Song) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let lyrics_variants = to_json(&song.lyrics_variants, "lyrics_variants")?;
    let progress = to_json(&song.generation_progress, "generation_progress")?;

    sqlx::query(concat!(
        "INSERT INTO songs (",
        song_columns!(),
        ") VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    ))
    .bind(&song.id)
    .bind(&song.public_id)
    .bind(&song.user_id)
    .bind(&song.conversation_id)
    .bind(&song.title)
    .bind(&song.lyrics_prompt)
    .bind(&song.style)
    .bind(song.instrumental)
    .bind(song.status.as_str())
    .bind(&song.suno_task_id)
    .bind(&song.media.audio_url)
    .bind(&song.media.stream_audio_url)
    .bind(&song.media.source_audio_url)
    .bind(&song.media.source_stream_audio_url)
    .bind(&song.media.image_url)
    .bind(song.media.duration_seconds)
    .bind(&song.media.model_name)
    .bind(&song.media.prompt)
    .bind(&song.callback_data)
    .bind(&song.lyrics)
    .bind(lyrics_variants)
    .bind(progress)
    .bind(&song.error_message)
    .bind(song.revision)
    .bind(&song.created_at)
    .bind(&song.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// Load a song by ID
pub async fn load_song<'e, E>(executor: E, song_id: &str) -> Result<Option<Song>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(concat!("SELECT ", song_columns!(), " FROM songs WHERE id = ?"))
        .bind(song_id)
        .fetch_optional(executor)
        .await?;

    row.map(|r| song_from_row(&r)).transpose()
}

/// Write `song` back if nobody else wrote it since it was read.
///
/// On success `song.revision` and `song.updated_at` are advanced to match
/// the stored row. Returns [`Error::Conflict`] when the revision moved.
pub async fn update_song<'e, E>(executor: E, song: &mut Song) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let lyrics_variants = to_json(&song.lyrics_variants, "lyrics_variants")?;
    let progress = to_json(&song.generation_progress, "generation_progress")?;
    let updated_at = lyra_common::time::now_rfc3339();

    let result = sqlx::query(
        r#"
        UPDATE songs SET
            public_id = ?,
            conversation_id = ?,
            title = ?,
            lyrics_prompt = ?,
            style = ?,
            instrumental = ?,
            status = ?,
            suno_task_id = ?,
            audio_url = ?,
            stream_audio_url = ?,
            source_audio_url = ?,
            source_stream_audio_url = ?,
            image_url = ?,
            duration_seconds = ?,
            model_name = ?,
            prompt = ?,
            callback_data = ?,
            lyrics = ?,
            lyrics_variants = ?,
            generation_progress = ?,
            error_message = ?,
            revision = revision + 1,
            updated_at = ?
        WHERE id = ? AND revision = ?
        "#,
    )
    .bind(&song.public_id)
    .bind(&song.conversation_id)
    .bind(&song.title)
    .bind(&song.lyrics_prompt)
    .bind(&song.style)
    .bind(song.instrumental)
    .bind(song.status.as_str())
    .bind(&song.suno_task_id)
    .bind(&song.media.audio_url)
    .bind(&song.media.stream_audio_url)
    .bind(&song.media.source_audio_url)
    .bind(&song.media.source_stream_audio_url)
    .bind(&song.media.image_url)
    .bind(song.media.duration_seconds)
    .bind(&song.media.model_name)
    .bind(&song.media.prompt)
    .bind(&song.callback_data)
    .bind(&song.lyrics)
    .bind(lyrics_variants)
    .bind(progress)
    .bind(&song.error_message)
    .bind(&updated_at)
    .bind(&song.id)
    .bind(song.revision)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::Conflict(format!(
            "song {} changed since revision {}",
            song.id, song.revision
        )));
    }

    song.revision += 1;
    song.updated_at = updated_at;
    Ok(())
}

/// First song whose persisted task ID equals `task_id`
pub async fn find_song_id_by_task<'e, E>(executor: E, task_id: &str) -> Result<Option<String>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let id: Option<String> = sqlx::query_scalar(
        "SELECT id FROM songs WHERE suno_task_id = ? ORDER BY updated_at DESC LIMIT 1",
    )
    .bind(task_id)
    .fetch_optional(executor)
    .await?;

    Ok(id)
}

/// Songs owned by `user_id`, newest first
pub async fn list_songs_for_user<'e, E>(executor: E, user_id: &str) -> Result<Vec<Song>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(concat!(
        "SELECT ",
        song_columns!(),
        " FROM songs WHERE user_id = ? ORDER BY created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(executor)
    .await?;

    rows.iter().map(song_from_row).collect()
}

/// Songs holding a callback snapshot but no persisted variants
pub async fn list_backfill_candidates<'e, E>(executor: E) -> Result<Vec<String>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let ids: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT s.id FROM songs s
        WHERE s.callback_data IS NOT NULL
          AND s.callback_data != ''
          AND NOT EXISTS (SELECT 1 FROM song_variants v WHERE v.song_id = s.id)
        ORDER BY s.created_at
        "#,
    )
    .fetch_all(executor)
    .await?;

    Ok(ids)
}

fn song_from_row(row: &SqliteRow) -> Result<Song> {
    let status: String = row.try_get("status")?;
    let status: SongStatus = status.parse().map_err(Error::Internal)?;

    let lyrics_variants: String = row.try_get("lyrics_variants")?;
    let lyrics_variants: Vec<LyricsVariant> = from_json(&lyrics_variants, "lyrics_variants")?;

    let progress: String = row.try_get("generation_progress")?;
    let generation_progress: GenerationProgress = from_json(&progress, "generation_progress")?;

    Ok(Song {
        id: row.try_get("id")?,
        public_id: row.try_get("public_id")?,
        user_id: row.try_get("user_id")?,
        conversation_id: row.try_get("conversation_id")?,
        title: row.try_get("title")?,
        lyrics_prompt: row.try_get("lyrics_prompt")?,
        style: row.try_get("style")?,
        instrumental: row.try_get("instrumental")?,
        status,
        suno_task_id: row.try_get("suno_task_id")?,
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
        callback_data: row.try_get("callback_data")?,
        lyrics: row.try_get("lyrics")?,
        lyrics_variants,
        generation_progress,
        error_message: row.try_get("error_message")?,
        revision: row.try_get("revision")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn to_json<T: serde::Serialize>(value: &T, column: &str) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| Error::Internal(format!("Failed to serialize {}: {}", column, e)))
}

/// Empty or `null` columns decode to the type's default
fn from_json<T>(value: &str, column: &str) -> Result<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    if value.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str::<Option<T>>(value)
        .map(Option::unwrap_or_default)
        .map_err(|e| Error::Internal(format!("Failed to deserialize {}: {}", column, e)))
}
