//! SQLite-backed [`Store`] implementation.
//!
//! Timestamps are stored as whole Unix seconds. Tag inserts commit on their own;
//! a cat and its `cat_tags` rows are written in one transaction.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use cat_harvest_core::models::{Cat, CatPage, NewCat, NewTag, Tag};
use cat_harvest_core::store::{page_offset, InsertOutcome, Store, StoreError, TagInsert};

use crate::config::Config;
use crate::{db, migrate};

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connects to the configured database and makes sure the schema exists.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn tags_for(&self, cat_id: i64) -> Result<Vec<Tag>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT t.id, t.name, t.created_at
            FROM tags t
            JOIN cat_tags ct ON ct.tag_id = t.id
            WHERE ct.cat_id = ?
            ORDER BY t.id ASC
            "#,
        )
        .bind(cat_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter().map(row_to_tag).collect()
    }

    async fn load_cat(&self, row: &SqliteRow) -> Result<Cat, StoreError> {
        let id: i64 = row.try_get("id").map_err(decode)?;
        let created_at: i64 = row.try_get("created_at").map_err(decode)?;
        Ok(Cat {
            id,
            cat_id: row.try_get("cat_id").map_err(decode)?,
            width: row.try_get("width").map_err(decode)?,
            height: row.try_get("height").map_err(decode)?,
            image_path: row.try_get("image_path").map_err(decode)?,
            created: from_ts(created_at)?,
            tags: self.tags_for(id).await?,
        })
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn decode(err: sqlx::Error) -> StoreError {
    StoreError::Decode(err.to_string())
}

fn from_ts(ts: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp(ts, 0)
        .ok_or_else(|| StoreError::Decode(format!("timestamp out of range: {}", ts)))
}

fn row_to_tag(row: &SqliteRow) -> Result<Tag, StoreError> {
    let created_at: i64 = row.try_get("created_at").map_err(decode)?;
    Ok(Tag {
        id: row.try_get("id").map_err(decode)?,
        name: row.try_get("name").map_err(decode)?,
        created: from_ts(created_at)?,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn cat_exists(&self, cat_id: &str) -> Result<bool, StoreError> {
        let found: Option<i64> = sqlx::query_scalar("SELECT id FROM cats WHERE cat_id = ?")
            .bind(cat_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        Ok(found.is_some())
    }

    async fn find_tag(&self, name: &str) -> Result<Option<Tag>, StoreError> {
        let row = sqlx::query("SELECT id, name, created_at FROM tags WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.as_ref().map(row_to_tag).transpose()
    }

    async fn insert_tag(&self, tag: &NewTag) -> Result<TagInsert, StoreError> {
        let created = sqlx::query(
            r#"
            INSERT INTO tags (name, created_at) VALUES (?, ?)
            ON CONFLICT(name) DO NOTHING
            RETURNING id, name, created_at
            "#,
        )
        .bind(&tag.name)
        .bind(tag.created.timestamp())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        if let Some(row) = created {
            return Ok(TagInsert::Created(row_to_tag(&row)?));
        }

        self.find_tag(&tag.name)
            .await?
            .map(TagInsert::Existing)
            .ok_or_else(|| StoreError::Backend(format!("tag '{}' missing after insert", tag.name)))
    }

    async fn insert_cat(&self, cat: &NewCat, tag_ids: &[i64]) -> Result<InsertOutcome, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let inserted: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO cats (cat_id, width, height, image_path, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(cat_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&cat.cat_id)
        .bind(cat.width)
        .bind(cat.height)
        .bind(&cat.image_path)
        .bind(cat.created.timestamp())
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend)?;

        let Some(id) = inserted else {
            tx.rollback().await.map_err(backend)?;
            return Ok(InsertOutcome::AlreadyExists);
        };

        for tag_id in tag_ids {
            sqlx::query("INSERT OR IGNORE INTO cat_tags (cat_id, tag_id) VALUES (?, ?)")
                .bind(id)
                .bind(*tag_id)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
        }

        tx.commit().await.map_err(backend)?;
        Ok(InsertOutcome::Inserted { id })
    }

    async fn get_cat(&self, id: i64) -> Result<Option<Cat>, StoreError> {
        let row = sqlx::query(
            "SELECT id, cat_id, width, height, image_path, created_at FROM cats WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            Some(row) => Ok(Some(self.load_cat(&row).await?)),
            None => Ok(None),
        }
    }

    async fn list_cats(
        &self,
        tag: Option<&str>,
        page: u32,
        page_size: u32,
    ) -> Result<CatPage, StoreError> {
        let offset = page_offset(page, page_size)?;

        const TAG_FILTER: &str = r#"
            ? IS NULL OR EXISTS (
                SELECT 1 FROM cat_tags ct
                JOIN tags t ON t.id = ct.tag_id
                WHERE ct.cat_id = c.id AND t.name = ?
            )
        "#;

        let total_count: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM cats c WHERE {}", TAG_FILTER))
                .bind(tag)
                .bind(tag)
                .fetch_one(&self.pool)
                .await
                .map_err(backend)?;

        let rows = sqlx::query(&format!(
            "SELECT c.id, c.cat_id, c.width, c.height, c.image_path, c.created_at \
             FROM cats c WHERE {} ORDER BY c.id ASC LIMIT ? OFFSET ?",
            TAG_FILTER
        ))
        .bind(tag)
        .bind(tag)
        .bind(page_size as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut cats = Vec::with_capacity(rows.len());
        for row in &rows {
            cats.push(self.load_cat(row).await?);
        }

        Ok(CatPage { total_count, cats })
    }
}
