//! Read-side queries over stored cats.
//!
//! [`CatQuery`] wraps a [`Store`] for the HTTP handlers and the `get` /
//! `list` CLI commands. A missing cat is `Ok(None)`; store failures stay
//! errors so callers can tell the two apart.

use std::sync::Arc;

use anyhow::{bail, Result};

use cat_harvest_core::models::{Cat, CatPage};
use cat_harvest_core::store::{Store, StoreError};

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Clone)]
pub struct CatQuery {
    store: Arc<dyn Store>,
}

impl CatQuery {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn get_cat(&self, id: i64) -> Result<Option<Cat>, StoreError> {
        self.store.get_cat(id).await
    }

    /// One page of cats. An empty `tag` means no filter; any other value is
    /// matched exactly, whitespace included.
    pub async fn list_cats(
        &self,
        tag: Option<&str>,
        page: u32,
        page_size: u32,
    ) -> Result<CatPage, StoreError> {
        let tag = tag.filter(|t| !t.is_empty());
        self.store.list_cats(tag, page, page_size).await
    }
}

/// CLI entry point for `cat-harvest get <id>`.
pub async fn run_get(config: &Config, id: i64) -> Result<()> {
    if id <= 0 {
        bail!("Invalid cat id: {} (must be >= 1)", id);
    }

    let store = Arc::new(SqliteStore::open(config).await?);
    let found = CatQuery::new(store.clone()).get_cat(id).await?;
    store.pool().close().await;

    let Some(cat) = found else {
        bail!("cat not found: {}", id);
    };

    println!("--- Cat ---");
    print_cat(&cat);
    Ok(())
}

/// CLI entry point for `cat-harvest list`.
pub async fn run_list(
    config: &Config,
    tag: Option<String>,
    page: u32,
    page_size: u32,
) -> Result<()> {
    if page == 0 || page_size == 0 {
        bail!("--page and --page-size must be >= 1");
    }

    let store = Arc::new(SqliteStore::open(config).await?);
    let result = CatQuery::new(store.clone())
        .list_cats(tag.as_deref(), page, page_size)
        .await;
    store.pool().close().await;
    let page_data = result?;

    if page_data.cats.is_empty() {
        println!("No cats found. (total: {})", page_data.total_count);
        return Ok(());
    }

    println!(
        "page {} ({} of {} cats)",
        page,
        page_data.cats.len(),
        page_data.total_count
    );
    for cat in &page_data.cats {
        println!();
        print_cat(cat);
    }
    Ok(())
}

fn print_cat(cat: &Cat) {
    let tags: Vec<&str> = cat.tags.iter().map(|t| t.name.as_str()).collect();
    println!("id:         {}", cat.id);
    println!("cat_id:     {}", cat.cat_id);
    println!("size:       {}x{}", cat.width, cat.height);
    println!("image_path: {}", cat.image_path);
    println!("created:    {}", cat.created.to_rfc3339());
    println!("tags:       {}", tags.join(", "));
}
