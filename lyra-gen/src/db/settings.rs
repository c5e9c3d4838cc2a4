//! Settings database operations

use sqlx::SqlitePool;
use lyra_common::Result;

/// Settings key for the provider API key
pub const SUNO_API_KEY: &str = "suno_api_key";

/// Get Suno API key from database
///
/// **Returns:** Some(key) if set, None otherwise
pub async fn get_suno_api_key(db: &SqlitePool) -> Result<Option<String>> {
    lyra_common::db::get_setting(db, SUNO_API_KEY).await
}

/// Set Suno API key in database
pub async fn set_suno_api_key(db: &SqlitePool, key: &str) -> Result<()> {
    lyra_common::db::set_setting(db, SUNO_API_KEY, key).await
}
