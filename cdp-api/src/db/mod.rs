//! Content store access layer
//!
//! All content lives in one `entries` table keyed by `(model_uid, id)`. The
//! `document` column holds the attribute values as JSON; publication and
//! audit timestamps live in dedicated columns.

use anyhow::{Context, Result};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

mod entries;
pub use entries::{count_by_model, count_entries, fetch_by_ids, fetch_entries, insert_entry, Entry, SqlValue};

/// Connect to the content store in read-only mode
///
/// The HTTP surface never writes; `mode=ro` enforces it at the SQLite level.
pub async fn connect_readonly(db_path: &Path) -> Result<SqlitePool> {
    if !db_path.exists() {
        anyhow::bail!(
            "Content store not found: {}\nRun with an initialized root folder or create it with init_store.",
            db_path.display()
        );
    }

    let db_url = format!("sqlite://{}?mode=ro", db_path.display());

    let pool = SqlitePool::connect(&db_url)
        .await
        .context("Failed to connect to content store in read-only mode")?;

    Ok(pool)
}

/// Open (creating if needed) a writable content store and ensure its schema
pub async fn init_store(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await
        .with_context(|| format!("Failed to open content store {}", db_path.display()))?;

    if newly_created {
        info!("Initialized new content store: {}", db_path.display());
    } else {
        info!("Opened existing content store: {}", db_path.display());
    }

    create_entries_table(&pool).await?;

    Ok(pool)
}

/// Create the entries table and its indexes (idempotent)
pub async fn create_entries_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entries (
            model_uid TEXT NOT NULL,
            id INTEGER NOT NULL,
            document TEXT NOT NULL CHECK (json_valid(document)),
            published_at TEXT,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            PRIMARY KEY (model_uid, id)
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create entries table")?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_entries_published ON entries (model_uid, published_at)",
    )
    .execute(pool)
    .await
    .context("Failed to create entries index")?;

    Ok(())
}
