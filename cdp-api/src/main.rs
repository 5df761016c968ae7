//! cdp-api - deep populate content service
//!
//! Serves populated (`deep`) and sanitized (`custom`) content queries over a
//! read-only content store. Everything is read from the root folder:
//! `cdp.db`, `schemas/` and the optional `config.toml`.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use cdp_api::{build_router, db, AppState};
use cdp_common::config::{resolve_root_folder, RootFolder, ROOT_FOLDER_ENV};
use cdp_common::{SchemaRegistry, Settings};
use clap::Parser;
use tracing::{error, info, warn};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "cdp-api")]
#[command(about = "Deep populate content service")]
#[command(version)]
struct Args {
    /// Root folder holding cdp.db, schemas/ and config.toml (overrides CDP_ROOT_FOLDER)
    #[arg(short, long)]
    root_folder: Option<String>,

    /// HTTP server port
    #[arg(short, long, env = "CDP_PORT", default_value = "5730")]
    port: u16,

    /// Address to bind
    #[arg(long, env = "CDP_BIND", default_value = "127.0.0.1")]
    bind: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Build identification before any slow startup work
    info!(
        "Starting deep populate service (cdp-api) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let root_folder = RootFolder::new(resolve_root_folder(
        args.root_folder.as_deref(),
        ROOT_FOLDER_ENV,
    ));
    root_folder.ensure_directory_exists()?;
    info!("Root folder: {}", root_folder.path().display());

    let settings = Settings::load(&root_folder.settings_path())?;
    info!(
        "Settings: default depth {} (max {}), {} unnecessary fields, creator fields {}",
        settings.default_depth,
        settings.max_depth,
        settings.unnecessary_fields.len(),
        if settings.skip_creator_fields { "skipped" } else { "populated" }
    );

    let schemas = load_schemas(&root_folder)?;

    let db_path = root_folder.database_path();
    info!("Content store: {}", db_path.display());
    if !db_path.exists() {
        // Create an empty store so the service starts; the server itself never writes
        db::init_store(&db_path).await?.close().await;
    }

    let pool = match db::connect_readonly(&db_path).await {
        Ok(pool) => {
            info!("✓ Connected to content store (read-only)");
            pool
        }
        Err(e) => {
            error!("Failed to connect to content store: {}", e);
            return Err(e);
        }
    };

    let state = AppState::new(pool, schemas, settings);
    info!(
        "✓ {} content types registered",
        state.schemas.content_types().len()
    );
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", args.bind, args.port))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("cdp-api listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Load schemas from the root folder; a missing schema directory leaves only
/// the built-in models
fn load_schemas(root_folder: &RootFolder) -> Result<SchemaRegistry> {
    let schema_dir = root_folder.schema_dir();
    let schemas = if schema_dir.is_dir() {
        SchemaRegistry::load_dir(&schema_dir)
            .with_context(|| format!("Failed to load schemas from {}", schema_dir.display()))?
    } else {
        warn!(
            "Schema directory {} not found, only built-in models available",
            schema_dir.display()
        );
        SchemaRegistry::with_builtins()
    };

    // Dangling targets fail lazily, when a plan reaches them
    for (owner, attribute, target) in schemas.dangling_targets() {
        warn!("{}.{} targets unknown model {}", owner, attribute, target);
    }

    Ok(schemas)
}
