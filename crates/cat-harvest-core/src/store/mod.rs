//! Storage abstraction for cat-harvest.
//!
//! The [`Store`] trait defines every persistence operation the ingestion
//! pipeline and the query service need, so the SQLite backend and the
//! in-memory backend are interchangeable.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//! Timestamps are kept at whole-second precision by every backend: the
//! `created` value read back is the stored value with sub-seconds dropped.

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Cat, CatPage, NewCat, NewTag, Tag};

/// Errors surfaced by a [`Store`] backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not execute a statement or commit.
    #[error("store backend error: {0}")]
    Backend(String),

    /// A row could not be turned back into a model.
    #[error("stored row could not be decoded: {0}")]
    Decode(String),

    /// `page` or `page_size` was zero.
    #[error("page and page size must be >= 1 (got page={page}, page_size={page_size})")]
    InvalidPage { page: u32, page_size: u32 },
}

/// Result of [`Store::insert_cat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The cat was written; carries its surrogate id.
    Inserted { id: i64 },
    /// A cat with the same external id already exists. Nothing was written.
    AlreadyExists,
}

/// Result of [`Store::insert_tag`].
#[derive(Debug, Clone, PartialEq)]
pub enum TagInsert {
    /// This call wrote the row.
    Created(Tag),
    /// A tag with that name was already stored; nothing was written.
    Existing(Tag),
}

impl TagInsert {
    pub fn is_created(&self) -> bool {
        matches!(self, TagInsert::Created(_))
    }

    pub fn into_tag(self) -> Tag {
        match self {
            TagInsert::Created(tag) | TagInsert::Existing(tag) => tag,
        }
    }
}

/// Abstract storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`cat_exists`](Store::cat_exists) | Point lookup by external id |
/// | [`find_tag`](Store::find_tag) | Exact-name tag lookup |
/// | [`insert_tag`](Store::insert_tag) | Create a tag, or return the one with that name |
/// | [`insert_cat`](Store::insert_cat) | Write a cat and its tag links in one commit |
/// | [`get_cat`](Store::get_cat) | Cat with tags by surrogate id |
/// | [`list_cats`](Store::list_cats) | Offset page, optionally filtered by tag name |
#[async_trait]
pub trait Store: Send + Sync {
    /// Whether a cat with this external id is already stored.
    async fn cat_exists(&self, cat_id: &str) -> Result<bool, StoreError>;

    /// Looks up a tag by exact (case-sensitive) name.
    async fn find_tag(&self, name: &str) -> Result<Option<Tag>, StoreError>;

    /// Inserts a tag and commits it immediately.
    ///
    /// If a tag with the same name exists (for example, created by an
    /// overlapping run), that tag is returned as [`TagInsert::Existing`]
    /// instead of failing.
    async fn insert_tag(&self, tag: &NewTag) -> Result<TagInsert, StoreError>;

    /// Inserts a cat together with its tag associations as one commit.
    ///
    /// Duplicate ids in `tag_ids` are linked once. A unique-id conflict
    /// yields [`InsertOutcome::AlreadyExists`] rather than an error.
    async fn insert_cat(&self, cat: &NewCat, tag_ids: &[i64]) -> Result<InsertOutcome, StoreError>;

    /// Fetches a cat and its tags by surrogate id.
    async fn get_cat(&self, id: i64) -> Result<Option<Cat>, StoreError>;

    /// Returns the total number of matching cats and the requested page,
    /// ordered by surrogate id.
    async fn list_cats(
        &self,
        tag: Option<&str>,
        page: u32,
        page_size: u32,
    ) -> Result<CatPage, StoreError>;
}

/// Rejects zero page numbers and sizes, and computes the row offset.
pub fn page_offset(page: u32, page_size: u32) -> Result<i64, StoreError> {
    if page == 0 || page_size == 0 {
        return Err(StoreError::InvalidPage { page, page_size });
    }
    Ok((page as i64 - 1).saturating_mul(page_size as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offset() {
        assert_eq!(page_offset(1, 10).unwrap(), 0);
        assert_eq!(page_offset(3, 25).unwrap(), 50);
        assert!(matches!(
            page_offset(0, 10),
            Err(StoreError::InvalidPage { page: 0, .. })
        ));
        assert!(page_offset(1, 0).is_err());
    }

    #[test]
    fn test_page_offset_does_not_overflow() {
        assert_eq!(page_offset(u32::MAX, u32::MAX).unwrap(), i64::MAX);
    }
}
