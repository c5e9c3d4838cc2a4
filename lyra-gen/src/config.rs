//! Configuration resolution for lyra-gen
//!
//! Bootstrap settings resolve CLI/ENV → TOML → compiled defaults. The Suno
//! API key resolves Database → ENV → TOML.

use lyra_common::config::{CompiledDefaults, TomlConfig};
use lyra_common::{Error, Result};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::db::settings;

/// Environment variable for the Suno API key
pub const ENV_SUNO_API_KEY: &str = "LYRA_SUNO_API_KEY";

/// Values supplied on the command line (or their clap `env` fallbacks)
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub root_folder: Option<PathBuf>,
    pub port: Option<u16>,
    pub bind: Option<String>,
    pub public_base_url: Option<String>,
    pub admin_token: Option<String>,
    pub suno_base_url: Option<String>,
}

/// Fully resolved bootstrap configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub root_folder: PathBuf,
    pub port: u16,
    pub bind: String,
    /// Base URL the provider uses to reach our callback endpoints
    pub public_base_url: String,
    pub admin_token: Option<String>,
    pub suno_base_url: String,
    pub suno_model: String,
}

impl ServiceConfig {
    pub fn resolve(cli: &CliOverrides, toml: &TomlConfig) -> Self {
        let defaults = CompiledDefaults::for_current_platform();

        let root_folder = lyra_common::config::resolve_root_folder(cli.root_folder.as_deref(), toml);
        let port = cli.port.or(toml.port).unwrap_or(defaults.port);
        let bind = first_set(&[cli.bind.as_deref(), toml.bind.as_deref()])
            .unwrap_or(defaults.bind);
        let public_base_url = first_set(&[
            cli.public_base_url.as_deref(),
            toml.public_base_url.as_deref(),
        ])
        .unwrap_or_else(|| format!("http://{}:{}", bind, port));
        let admin_token = first_set(&[cli.admin_token.as_deref(), toml.admin_token.as_deref()]);
        let suno_base_url = first_set(&[
            cli.suno_base_url.as_deref(),
            toml.suno.base_url.as_deref(),
        ])
        .unwrap_or(defaults.suno_base_url);
        let suno_model = first_set(&[toml.suno.model.as_deref()]).unwrap_or(defaults.suno_model);

        Self {
            root_folder,
            port,
            bind,
            public_base_url,
            admin_token,
            suno_base_url,
            suno_model,
        }
    }
}

fn first_set(candidates: &[Option<&str>]) -> Option<String> {
    candidates
        .iter()
        .flatten()
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

/// Where the Suno API key was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Database,
    Environment,
    Toml,
}

/// Resolve the Suno API key from 3-tier configuration
///
/// **Priority:** Database → ENV → TOML
pub async fn resolve_suno_api_key(db: &SqlitePool, toml_config: &TomlConfig) -> Result<(String, KeySource)> {
    let db_key = settings::get_suno_api_key(db).await?.filter(|k| is_valid_key(k));
    let env_key = std::env::var(ENV_SUNO_API_KEY).ok().filter(|k| is_valid_key(k));
    let toml_key = toml_config.suno.api_key.clone().filter(|k| is_valid_key(k));

    let sources: Vec<&str> = [
        db_key.as_ref().map(|_| "database"),
        env_key.as_ref().map(|_| "environment"),
        toml_key.as_ref().map(|_| "TOML"),
    ]
    .into_iter()
    .flatten()
    .collect();

    if sources.len() > 1 {
        warn!(
            "Suno API key found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    if let Some(key) = db_key {
        info!("Suno API key loaded from database");
        return Ok((key, KeySource::Database));
    }
    if let Some(key) = env_key {
        info!("Suno API key loaded from environment variable");
        return Ok((key, KeySource::Environment));
    }
    if let Some(key) = toml_key {
        info!("Suno API key loaded from TOML config");
        return Ok((key, KeySource::Toml));
    }

    Err(Error::Config(format!(
        "Suno API key not configured. Please configure using one of:\n\
         1. Environment: {}=your-key-here\n\
         2. TOML config: ~/.config/lyra/lyra-gen.toml ([suno] api_key = \"your-key\")",
        ENV_SUNO_API_KEY
    )))
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Copy a key found in ENV/TOML into the database (authoritative) and the
/// TOML file (best-effort backup).
pub async fn migrate_key_to_database(
    key: &str,
    source: KeySource,
    db: &SqlitePool,
    toml_path: &Path,
) -> Result<()> {
    settings::set_suno_api_key(db, key).await?;
    info!(?source, "Suno API key migrated to database");

    if source == KeySource::Toml {
        return Ok(());
    }

    let mut config = lyra_common::config::load_toml_config(toml_path);
    config.suno.api_key = Some(key.to_string());
    if let Err(e) = lyra_common::config::write_toml_config(&config, toml_path) {
        warn!("TOML write failed (database write succeeded): {}", e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_set_skips_blank() {
        assert_eq!(first_set(&[None, Some("  "), Some("x")]), Some("x".into()));
        assert_eq!(first_set(&[None, Some("")]), None);
    }

    #[test]
    fn test_resolve_cli_overrides_toml() {
        let mut toml = TomlConfig::default();
        toml.port = Some(6000);
        toml.bind = Some("0.0.0.0".into());
        toml.admin_token = Some("from-toml".into());

        let cli = CliOverrides {
            port: Some(7000),
            root_folder: Some(PathBuf::from("/tmp/lyra-test")),
            ..Default::default()
        };
        let config = ServiceConfig::resolve(&cli, &toml);

        assert_eq!(config.port, 7000);
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.admin_token.as_deref(), Some("from-toml"));
        assert_eq!(config.public_base_url, "http://0.0.0.0:7000");
        assert_eq!(config.root_folder, PathBuf::from("/tmp/lyra-test"));
    }

    #[test]
    fn test_resolve_defaults() {
        let cli = CliOverrides {
            root_folder: Some(PathBuf::from("/tmp/lyra-test")),
            ..Default::default()
        };
        let config = ServiceConfig::resolve(&cli, &TomlConfig::default());
        let defaults = CompiledDefaults::for_current_platform();

        assert_eq!(config.port, defaults.port);
        assert_eq!(config.suno_base_url, defaults.suno_base_url);
        assert_eq!(config.suno_model, defaults.suno_model);
        assert!(config.admin_token.is_none());
    }
}
