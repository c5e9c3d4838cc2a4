//! Track normalizer
//!
//! Turns the loosely-typed track objects a provider sends (snake_case or
//! camelCase keys, numbers as strings, empty strings for "not yet") into
//! canonical [`Variant`]s. Pure: no I/O and no failure path. Anything
//! malformed becomes `None`.
//!
//! Track IDs: a provider ID that is already a well-formed UUID is kept
//! verbatim. Otherwise the ID is derived (UUIDv5) from
//! `(song_id, provider_id or "", index)`, so normalizing the same payload
//! twice yields the same `track_id` and duplicate deliveries update the
//! existing variant row instead of inserting a new one.

use lyra_common::uuid_utils::{self, TRACK_NAMESPACE};
use serde_json::{Map, Value};

use crate::models::{LyricsVariant, TrackMedia, Variant};

const ID_KEYS: &[&str] = &["id", "trackId", "track_id"];
const PROVIDER_ID_KEYS: &[&str] = &["providerId", "provider_id"];
const TITLE_KEYS: &[&str] = &["title"];
const AUDIO_KEYS: &[&str] = &["audio_url", "audioUrl"];
const STREAM_KEYS: &[&str] = &["stream_audio_url", "streamAudioUrl"];
const SOURCE_AUDIO_KEYS: &[&str] = &["source_audio_url", "sourceAudioUrl"];
const SOURCE_STREAM_KEYS: &[&str] = &["source_stream_audio_url", "sourceStreamAudioUrl"];
const IMAGE_KEYS: &[&str] = &["image_url", "imageUrl", "source_image_url", "sourceImageUrl"];
const DURATION_SECONDS_KEYS: &[&str] = &["duration_seconds", "durationSeconds"];
const DURATION_KEYS: &[&str] = &["duration"];
const MODEL_KEYS: &[&str] = &["model_name", "modelName", "model"];
const PROMPT_KEYS: &[&str] = &["prompt"];
const TAGS_KEYS: &[&str] = &["tags"];
const CREATED_KEYS: &[&str] = &["createTime", "create_time", "createdAt", "created_at"];
const LYRICS_TEXT_KEYS: &[&str] = &["text", "lyrics"];

/// Normalize one raw track at position `index` of a callback
pub fn normalize(raw: &Value, index: usize, song_id: &str) -> Variant {
    let empty = Map::new();
    let obj = raw.as_object().unwrap_or(&empty);

    let raw_id = string_field(obj, ID_KEYS);
    let track_id = resolve_track_id(raw_id.as_deref(), index, song_id);
    // Re-normalizing a stored variant keeps the provider's original ID
    let provider_id = string_field(obj, PROVIDER_ID_KEYS).or(raw_id);

    let duration_seconds =
        number_field(obj, DURATION_SECONDS_KEYS).or_else(|| number_field(obj, DURATION_KEYS));

    Variant {
        track_id,
        song_id: song_id.to_string(),
        provider_id,
        title: string_field(obj, TITLE_KEYS),
        media: TrackMedia {
            audio_url: string_field(obj, AUDIO_KEYS),
            stream_audio_url: string_field(obj, STREAM_KEYS),
            source_audio_url: string_field(obj, SOURCE_AUDIO_KEYS),
            source_stream_audio_url: string_field(obj, SOURCE_STREAM_KEYS),
            image_url: string_field(obj, IMAGE_KEYS),
            duration_seconds,
            model_name: string_field(obj, MODEL_KEYS),
            prompt: string_field(obj, PROMPT_KEYS),
        },
        tags: tags_field(obj),
        order: index as u32,
        created_at: created_field(obj),
    }
}

/// Normalize every raw track, keeping the callback's own ordering
pub fn normalize_all(raw_tracks: &[Value], song_id: &str) -> Vec<Variant> {
    raw_tracks
        .iter()
        .enumerate()
        .map(|(index, raw)| normalize(raw, index, song_id))
        .collect()
}

/// Extract lyric candidates from a lyrics callback.
///
/// Entries without usable text are dropped; indices stay contiguous.
pub fn normalize_lyrics(raw_tracks: &[Value]) -> Vec<LyricsVariant> {
    let empty = Map::new();
    raw_tracks
        .iter()
        .filter_map(|raw| {
            let obj = raw.as_object().unwrap_or(&empty);
            let text = string_field(obj, LYRICS_TEXT_KEYS)?;
            Some((string_field(obj, TITLE_KEYS), text))
        })
        .enumerate()
        .map(|(i, (title, text))| LyricsVariant {
            variant_index: i as u32,
            title,
            text,
            selected: false,
        })
        .collect()
}

fn resolve_track_id(provider_id: Option<&str>, index: usize, song_id: &str) -> String {
    match provider_id {
        Some(id) if uuid_utils::is_well_formed(id) => id.to_string(),
        other => uuid_utils::derive(
            &TRACK_NAMESPACE,
            &[song_id, other.unwrap_or(""), &index.to_string()],
        )
        .to_string(),
    }
}

/// First key present with a non-null value
fn pick<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

fn string_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    match pick(obj, keys)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    let n = match pick(obj, keys)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    (n.is_finite() && n >= 0.0).then_some(n)
}

fn tags_field(obj: &Map<String, Value>) -> Option<String> {
    match pick(obj, TAGS_KEYS)? {
        Value::Array(items) => {
            let tags: Vec<&str> = items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect();
            (!tags.is_empty()).then(|| tags.join(", "))
        }
        _ => string_field(obj, TAGS_KEYS),
    }
}

/// Epoch milliseconds become RFC 3339; strings are kept as sent
fn created_field(obj: &Map<String, Value>) -> Option<String> {
    match pick(obj, CREATED_KEYS)? {
        Value::Number(n) => n
            .as_i64()
            .and_then(lyra_common::time::epoch_millis_to_rfc3339),
        _ => string_field(obj, CREATED_KEYS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SONG: &str = "9b2f1c1e-2d7e-4c6b-9d55-0d7a3c1f0a01";

    #[test]
    fn test_uuid_provider_id_used_verbatim() {
        let raw = json!({"id": "67e55044-10b1-426f-9247-bb680e5fe0c8"});
        let v = normalize(&raw, 3, SONG);
        assert_eq!(v.track_id, "67e55044-10b1-426f-9247-bb680e5fe0c8");
        assert_eq!(v.order, 3);
    }

    #[test]
    fn test_non_uuid_id_is_derived_deterministically() {
        let raw = json!({"id": "suno-123", "audio_url": "https://cdn/a.mp3"});
        let a = normalize(&raw, 0, SONG);
        let b = normalize(&raw, 0, SONG);
        assert_eq!(a.track_id, b.track_id);
        assert_ne!(a.track_id, "suno-123");
        assert!(uuid_utils::is_well_formed(&a.track_id));
        assert_eq!(a.provider_id.as_deref(), Some("suno-123"));
    }

    #[test]
    fn test_missing_id_depends_on_song_and_index() {
        let raw = json!({"title": "x"});
        let a = normalize(&raw, 0, SONG);
        let b = normalize(&raw, 1, SONG);
        let c = normalize(&raw, 0, "other-song");
        assert_ne!(a.track_id, b.track_id);
        assert_ne!(a.track_id, c.track_id);
        assert_eq!(a.track_id, normalize(&raw, 0, SONG).track_id);
    }

    #[test]
    fn test_snake_and_camel_keys() {
        let snake = json!({
            "audio_url": "https://cdn/a.mp3",
            "stream_audio_url": "https://cdn/a.stream",
            "source_audio_url": "https://src/a.mp3",
            "source_stream_audio_url": "https://src/a.stream",
            "image_url": "https://cdn/a.jpg",
            "model_name": "chirp-v4",
            "prompt": "[Verse] hello",
            "tags": "synthwave",
            "duration": 182.5
        });
        let camel = json!({
            "audioUrl": "https://cdn/a.mp3",
            "streamAudioUrl": "https://cdn/a.stream",
            "sourceAudioUrl": "https://src/a.mp3",
            "sourceStreamAudioUrl": "https://src/a.stream",
            "imageUrl": "https://cdn/a.jpg",
            "modelName": "chirp-v4",
            "prompt": "[Verse] hello",
            "tags": "synthwave",
            "duration": 182.5
        });
        let a = normalize(&snake, 0, SONG);
        let b = normalize(&camel, 0, SONG);
        assert_eq!(a, b);
        assert_eq!(a.media.audio_url.as_deref(), Some("https://cdn/a.mp3"));
        assert_eq!(a.media.duration_seconds, Some(182.5));
    }

    #[test]
    fn test_duration_prefers_explicit_seconds() {
        let raw = json!({"duration_seconds": 120, "duration": 999});
        assert_eq!(normalize(&raw, 0, SONG).media.duration_seconds, Some(120.0));

        let raw = json!({"duration": "95.25"});
        assert_eq!(normalize(&raw, 0, SONG).media.duration_seconds, Some(95.25));

        let raw = json!({"duration": "n/a"});
        assert_eq!(normalize(&raw, 0, SONG).media.duration_seconds, None);
    }

    #[test]
    fn test_empty_and_malformed_fields_become_none() {
        let raw = json!({
            "audio_url": "",
            "stream_audio_url": "   ",
            "image_url": {"nested": true},
            "title": null
        });
        let v = normalize(&raw, 0, SONG);
        assert_eq!(v.media, TrackMedia::default());
        assert_eq!(v.title, None);
        assert!(!v.media.has_audio());
    }

    #[test]
    fn test_non_object_track_degrades() {
        let v = normalize(&json!("garbage"), 2, SONG);
        assert_eq!(v.media, TrackMedia::default());
        assert_eq!(v.order, 2);
        assert!(uuid_utils::is_well_formed(&v.track_id));
    }

    #[test]
    fn test_create_time_epoch_millis() {
        let raw = json!({"createTime": 1_700_000_000_000i64});
        assert_eq!(
            normalize(&raw, 0, SONG).created_at.as_deref(),
            Some("2023-11-14T22:13:20.000Z")
        );
    }

    #[test]
    fn test_tags_array_joined() {
        let raw = json!({"tags": ["pop", " upbeat ", ""]});
        assert_eq!(normalize(&raw, 0, SONG).tags.as_deref(), Some("pop, upbeat"));
    }

    #[test]
    fn test_serialized_variant_renormalizes_to_itself() {
        let raw = json!({"id": "suno-1", "audio_url": "https://cdn/a.mp3", "duration": 10});
        let first = normalize(&raw, 1, SONG);
        let stored = serde_json::to_value(&first).unwrap();
        let second = normalize(&stored, 1, SONG);
        assert_eq!(second.track_id, first.track_id);
        assert_eq!(second.media, first.media);
        assert_eq!(second.provider_id.as_deref(), Some("suno-1"));
    }

    #[test]
    fn test_normalize_lyrics_skips_empty_text() {
        let raw = vec![
            json!({"text": "Verse one", "title": "Night Drive", "status": "complete"}),
            json!({"text": "", "status": "failed"}),
            json!({"text": "Verse two"}),
        ];
        let lyrics = normalize_lyrics(&raw);
        assert_eq!(lyrics.len(), 2);
        assert_eq!(lyrics[0].variant_index, 0);
        assert_eq!(lyrics[0].title.as_deref(), Some("Night Drive"));
        assert_eq!(lyrics[1].variant_index, 1);
        assert_eq!(lyrics[1].text, "Verse two");
        assert!(lyrics.iter().all(|l| !l.selected));
    }
}
