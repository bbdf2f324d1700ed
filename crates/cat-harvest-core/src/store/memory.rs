//! In-memory [`Store`] implementation for tests and embedding.
//!
//! Uses `Vec`s behind a single `std::sync::RwLock`. Ids are assigned
//! sequentially from 1, mirroring SQLite `AUTOINCREMENT`.

use std::collections::BTreeSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::SubsecRound;

use crate::models::{Cat, CatPage, NewCat, NewTag, Tag};

use super::{page_offset, InsertOutcome, Store, StoreError, TagInsert};

struct StoredCat {
    id: i64,
    cat: NewCat,
}

#[derive(Default)]
struct Inner {
    cats: Vec<StoredCat>,
    tags: Vec<Tag>,
    links: BTreeSet<(i64, i64)>,
}

impl Inner {
    fn tags_for(&self, cat_id: i64) -> Vec<Tag> {
        self.tags
            .iter()
            .filter(|t| self.links.contains(&(cat_id, t.id)))
            .cloned()
            .collect()
    }

    fn to_cat(&self, stored: &StoredCat) -> Cat {
        Cat {
            id: stored.id,
            cat_id: stored.cat.cat_id.clone(),
            width: stored.cat.width,
            height: stored.cat.height,
            image_path: stored.cat.image_path.clone(),
            created: stored.cat.created,
            tags: self.tags_for(stored.id),
        }
    }

    fn has_tag(&self, cat_id: i64, name: &str) -> bool {
        self.tags
            .iter()
            .any(|t| t.name == name && self.links.contains(&(cat_id, t.id)))
    }
}

/// In-memory store.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored cats.
    pub fn cat_count(&self) -> usize {
        self.read().map(|i| i.cats.len()).unwrap_or(0)
    }

    /// Number of stored tags.
    pub fn tag_count(&self) -> usize {
        self.read().map(|i| i.tags.len()).unwrap_or(0)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn cat_exists(&self, cat_id: &str) -> Result<bool, StoreError> {
        Ok(self.read()?.cats.iter().any(|c| c.cat.cat_id == cat_id))
    }

    async fn find_tag(&self, name: &str) -> Result<Option<Tag>, StoreError> {
        Ok(self.read()?.tags.iter().find(|t| t.name == name).cloned())
    }

    async fn insert_tag(&self, tag: &NewTag) -> Result<TagInsert, StoreError> {
        let mut inner = self.write()?;
        if let Some(existing) = inner.tags.iter().find(|t| t.name == tag.name) {
            return Ok(TagInsert::Existing(existing.clone()));
        }
        let stored = Tag {
            id: inner.tags.len() as i64 + 1,
            name: tag.name.clone(),
            created: tag.created.trunc_subsecs(0),
        };
        inner.tags.push(stored.clone());
        Ok(TagInsert::Created(stored))
    }

    async fn insert_cat(&self, cat: &NewCat, tag_ids: &[i64]) -> Result<InsertOutcome, StoreError> {
        let mut inner = self.write()?;
        if inner.cats.iter().any(|c| c.cat.cat_id == cat.cat_id) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        if let Some(missing) = tag_ids
            .iter()
            .find(|id| !inner.tags.iter().any(|t| t.id == **id))
        {
            return Err(StoreError::Backend(format!(
                "tag {} does not exist",
                missing
            )));
        }
        let id = inner.cats.len() as i64 + 1;
        let mut cat = cat.clone();
        cat.created = cat.created.trunc_subsecs(0);
        inner.cats.push(StoredCat { id, cat });
        for tag_id in tag_ids {
            inner.links.insert((id, *tag_id));
        }
        Ok(InsertOutcome::Inserted { id })
    }

    async fn get_cat(&self, id: i64) -> Result<Option<Cat>, StoreError> {
        let inner = self.read()?;
        Ok(inner
            .cats
            .iter()
            .find(|c| c.id == id)
            .map(|c| inner.to_cat(c)))
    }

    async fn list_cats(
        &self,
        tag: Option<&str>,
        page: u32,
        page_size: u32,
    ) -> Result<CatPage, StoreError> {
        let offset = page_offset(page, page_size)?;
        let inner = self.read()?;
        let matching: Vec<&StoredCat> = inner
            .cats
            .iter()
            .filter(|c| tag.map_or(true, |name| inner.has_tag(c.id, name)))
            .collect();

        let cats = matching
            .iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(page_size as usize)
            .map(|c| inner.to_cat(c))
            .collect();

        Ok(CatPage {
            total_count: matching.len() as i64,
            cats,
        })
    }
}
