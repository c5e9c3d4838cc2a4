//! lyra-gen - Generation lifecycle microservice
//!
//! Starts lyrics/music jobs with the Suno API and reconciles the provider's
//! webhook callbacks into song state.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lyra_common::config::{LoggingConfig, RootFolderInitializer};
use lyra_gen::config::{CliOverrides, KeySource, ServiceConfig};
use lyra_gen::services::SunoClient;
use lyra_gen::AppState;

/// Command-line arguments for lyra-gen
#[derive(Parser, Debug)]
#[command(name = "lyra-gen")]
#[command(about = "Song generation lifecycle service for Lyra")]
#[command(version)]
struct Args {
    /// Root folder holding the database
    #[arg(short, long, env = "LYRA_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "LYRA_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "LYRA_BIND")]
    bind: Option<String>,

    /// Bootstrap TOML file (default: ~/.config/lyra/lyra-gen.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Public base URL the provider calls back on
    #[arg(long, env = "LYRA_PUBLIC_BASE_URL")]
    public_base_url: Option<String>,

    /// Token for /api/admin routes (unset disables them)
    #[arg(long, env = "LYRA_ADMIN_TOKEN", hide_env_values = true)]
    admin_token: Option<String>,

    /// Suno API base URL
    #[arg(long, env = "LYRA_SUNO_BASE_URL")]
    suno_base_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_path = args
        .config
        .clone()
        .or_else(|| lyra_common::config::default_config_path("lyra-gen"));
    let toml_config = toml_path
        .as_deref()
        .map(lyra_common::config::load_toml_config)
        .unwrap_or_default();

    init_tracing(&toml_config.logging)?;

    info!(
        "Starting lyra-gen v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    if let Some(path) = &toml_path {
        info!("Config file: {}", path.display());
    }

    let config = ServiceConfig::resolve(
        &CliOverrides {
            root_folder: args.root_folder,
            port: args.port,
            bind: args.bind,
            public_base_url: args.public_base_url,
            admin_token: args.admin_token,
            suno_base_url: args.suno_base_url,
        },
        &toml_config,
    );

    let initializer = RootFolderInitializer::new(config.root_folder.clone());
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let db = lyra_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;

    let session_secret = lyra_common::api::load_session_secret(&db)
        .await
        .context("Failed to load session secret")?;

    let (api_key, source) = lyra_gen::config::resolve_suno_api_key(&db, &toml_config).await?;
    if source != KeySource::Database {
        if let Some(path) = &toml_path {
            lyra_gen::config::migrate_key_to_database(&api_key, source, &db, path).await?;
        }
    }

    let provider = SunoClient::new(&config.suno_base_url, api_key)
        .context("Failed to build Suno client")?;
    info!("Suno API: {} (model {})", config.suno_base_url, config.suno_model);
    info!("Callbacks: {}/api/callbacks/suno/...", config.public_base_url);
    if config.admin_token.is_none() {
        info!("Admin routes disabled (no admin token)");
    }

    let state = AppState::new(
        db,
        Arc::new(provider),
        &config.public_base_url,
        config.suno_model.clone(),
        session_secret,
        config.admin_token.clone(),
    );
    let app = lyra_gen::build_router(state).layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins over the TOML level; optional file output alongside stdout
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("{},tower_http=info", logging.level)))
        .context("Invalid log level")?;

    let file_layer = match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
