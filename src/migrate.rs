//! Database schema migrations (idempotent).
//!
//! Creates the `cats`, `tags` and `cat_tags` tables. External ids and tag
//! names carry UNIQUE constraints so overlapping ingestion runs cannot
//! create duplicates; the store treats a conflict as "already exists".

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Connect to the configured database, apply the schema, and close.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Apply the schema to an open pool. Safe to call repeatedly.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cats (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            cat_id TEXT NOT NULL UNIQUE,
            width INTEGER NOT NULL CHECK (width > 0),
            height INTEGER NOT NULL CHECK (height > 0),
            image_path TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tags (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // No ON DELETE CASCADE: a tag outlives its last cat.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cat_tags (
            cat_id INTEGER NOT NULL,
            tag_id INTEGER NOT NULL,
            PRIMARY KEY (cat_id, tag_id),
            FOREIGN KEY (cat_id) REFERENCES cats(id),
            FOREIGN KEY (tag_id) REFERENCES tags(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_cat_tags_tag_id ON cat_tags(tag_id)")
        .execute(pool)
        .await?;

    Ok(())
}
