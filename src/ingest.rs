//! Ingestion pipeline orchestration.
//!
//! One run fetches a single batch from the upstream [`ImageSource`] and walks
//! it in response order:
//!
//! ```text
//! search ─► exists? ─► validate ─► tags ─► image ─► insert cat + links
//!            │skip       │skip      │per-tag skip  │sentinel on failure
//! ```
//!
//! Tags are committed one at a time as they are created; a cat and its
//! tag links form one commit. A store failure stops the run, and everything
//! committed before it stays. Nothing escapes [`Ingestor::ingest`] as an
//! error: every failure becomes an [`IngestOutcome`].

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use cat_harvest_core::models::{Candidate, NewCat, NewTag};
use cat_harvest_core::store::{InsertOutcome, Store, StoreError};
use cat_harvest_core::tags::temperament_tags;
use cat_harvest_core::validate::{validate_cat, validate_tag};

use crate::config::Config;
use crate::images::{ImageDir, IMAGE_SAVE_FAILED};
use crate::sqlite_store::SqliteStore;
use crate::upstream::{CatApiClient, ImageSource, UpstreamError};

/// Counters accumulated over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    /// Candidates returned by the upstream.
    pub fetched: usize,
    /// Cats written.
    pub inserted: usize,
    /// Candidates whose external id was already stored.
    pub skipped_existing: usize,
    /// Candidates that failed cat validation.
    pub skipped_invalid: usize,
    /// Tags written by this run. A tag another run wrote first is not counted.
    pub tags_created: usize,
    pub tags_rejected: usize,
    /// Cats stored with the failure sentinel instead of an image path.
    pub images_failed: usize,
}

/// Result of one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The upstream returned no candidates; nothing was written.
    Empty,
    Success(IngestReport),
    /// The upstream could not be reached or answered with an error status.
    UpstreamFailure { message: String },
    /// A commit failed; the run stopped after `report`.
    StoreFailure { message: String, report: IngestReport },
    /// Cancellation was signalled before the run finished.
    Aborted { report: IngestReport },
    Unexpected { message: String },
}

impl IngestOutcome {
    /// Stable machine-readable status.
    pub fn status(&self) -> &'static str {
        match self {
            IngestOutcome::Empty => "empty",
            IngestOutcome::Success(_) => "success",
            IngestOutcome::UpstreamFailure { .. } => "upstream_failure",
            IngestOutcome::StoreFailure { .. } => "store_failure",
            IngestOutcome::Aborted { .. } => "aborted",
            IngestOutcome::Unexpected { .. } => "unexpected",
        }
    }

    /// Human-readable summary for callers.
    pub fn message(&self) -> &'static str {
        match self {
            IngestOutcome::Empty => "No cats found in API response.",
            IngestOutcome::Success(_) => "Fetched and stored new cats.",
            IngestOutcome::UpstreamFailure { .. } => {
                "Failed to fetch cats from the API. Please try again later."
            }
            IngestOutcome::StoreFailure { .. } => {
                "Failed to save cat data. Please try again later."
            }
            IngestOutcome::Aborted { .. } => "Fetching cats was cancelled before it finished.",
            IngestOutcome::Unexpected { .. } => "An error occurred while processing cat data.",
        }
    }

    pub fn report(&self) -> Option<&IngestReport> {
        match self {
            IngestOutcome::Success(report)
            | IngestOutcome::StoreFailure { report, .. }
            | IngestOutcome::Aborted { report } => Some(report),
            _ => None,
        }
    }

    /// Underlying error text, when the run failed.
    pub fn error(&self) -> Option<&str> {
        match self {
            IngestOutcome::UpstreamFailure { message }
            | IngestOutcome::StoreFailure { message, .. }
            | IngestOutcome::Unexpected { message } => Some(message),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, IngestOutcome::Success(_))
    }
}

#[derive(Debug, Error)]
enum IngestError {
    #[error(transparent)]
    Upstream(UpstreamError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("cancelled")]
    Cancelled,

    #[error("{0}")]
    Unexpected(String),
}

impl From<UpstreamError> for IngestError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Decode(_) => IngestError::Unexpected(err.to_string()),
            other => IngestError::Upstream(other),
        }
    }
}

/// Cooperative cancellation signal for an ingestion run.
///
/// Raised by sending `true` on the paired `watch::Sender`. A dropped sender
/// never cancels.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    rx: Option<watch::Receiver<bool>>,
}

impl Cancellation {
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx: Some(rx) }
    }

    /// A signal that is never raised.
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    async fn cancelled(&self) {
        if let Some(rx) = &self.rx {
            let mut rx = rx.clone();
            let raised = rx.wait_for(|raised| *raised).await.is_ok();
            if raised {
                return;
            }
        }
        std::future::pending::<()>().await
    }

    /// Runs `fut` to completion unless cancellation wins first, in which
    /// case `fut` is dropped and `None` is returned.
    pub async fn guard<F: Future>(&self, fut: F) -> Option<F::Output> {
        if self.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => None,
            out = fut => Some(out),
        }
    }
}

async fn guarded<T, E>(
    cancel: &Cancellation,
    fut: impl Future<Output = std::result::Result<T, E>>,
) -> std::result::Result<T, IngestError>
where
    IngestError: From<E>,
{
    match cancel.guard(fut).await {
        Some(result) => Ok(result?),
        None => Err(IngestError::Cancelled),
    }
}

/// Runs ingestion against a store, an image source and an image directory.
#[derive(Clone)]
pub struct Ingestor {
    store: Arc<dyn Store>,
    source: Arc<dyn ImageSource>,
    images: ImageDir,
}

impl Ingestor {
    pub fn new(store: Arc<dyn Store>, source: Arc<dyn ImageSource>, images: ImageDir) -> Self {
        Self {
            store,
            source,
            images,
        }
    }

    /// Runs one ingestion with no cancellation.
    pub async fn ingest(&self) -> IngestOutcome {
        self.ingest_until(Cancellation::never()).await
    }

    /// Runs one ingestion, stopping early once `cancel` is raised.
    pub async fn ingest_until(&self, cancel: Cancellation) -> IngestOutcome {
        let mut report = IngestReport::default();
        let result = self.run(&cancel, &mut report).await;

        let outcome = match result {
            Ok(()) if report.fetched == 0 => IngestOutcome::Empty,
            Ok(()) => IngestOutcome::Success(report),
            Err(IngestError::Upstream(e)) => {
                error!(error = %e, "upstream fetch failed");
                IngestOutcome::UpstreamFailure {
                    message: e.to_string(),
                }
            }
            Err(IngestError::Store(e)) => {
                error!(error = %e, inserted = report.inserted, "store failure, run stopped");
                IngestOutcome::StoreFailure {
                    message: e.to_string(),
                    report,
                }
            }
            Err(IngestError::Cancelled) => {
                warn!(inserted = report.inserted, "ingestion cancelled");
                IngestOutcome::Aborted { report }
            }
            Err(IngestError::Unexpected(message)) => {
                error!(error = %message, "ingestion failed");
                IngestOutcome::Unexpected { message }
            }
        };

        info!(status = outcome.status(), "ingestion finished");
        outcome
    }

    async fn run(
        &self,
        cancel: &Cancellation,
        report: &mut IngestReport,
    ) -> std::result::Result<(), IngestError> {
        let candidates = guarded(cancel, self.source.search()).await?;
        report.fetched = candidates.len();
        info!(count = candidates.len(), "fetched candidates");

        for candidate in &candidates {
            self.ingest_candidate(candidate, cancel, report).await?;
        }
        Ok(())
    }

    async fn ingest_candidate(
        &self,
        candidate: &Candidate,
        cancel: &Cancellation,
        report: &mut IngestReport,
    ) -> std::result::Result<(), IngestError> {
        if guarded(cancel, self.store.cat_exists(&candidate.id)).await? {
            debug!(cat_id = %candidate.id, "already stored, skipping");
            report.skipped_existing += 1;
            return Ok(());
        }

        let mut cat = NewCat::from_candidate(candidate, Utc::now());
        if let Err(errors) = validate_cat(&cat) {
            warn!(cat_id = %candidate.id, errors = %errors, "invalid cat, skipping");
            report.skipped_invalid += 1;
            return Ok(());
        }

        let tag_ids = self.resolve_tags(candidate, cancel, report).await?;
        cat.image_path = self.fetch_image(candidate, cancel, report).await?;

        match guarded(cancel, self.store.insert_cat(&cat, &tag_ids)).await? {
            InsertOutcome::Inserted { id } => {
                debug!(cat_id = %cat.cat_id, id, tags = tag_ids.len(), "stored cat");
                report.inserted += 1;
            }
            InsertOutcome::AlreadyExists => {
                debug!(cat_id = %cat.cat_id, "stored concurrently, skipping");
                report.skipped_existing += 1;
            }
        }
        Ok(())
    }

    /// Finds or creates a tag for every temperament token and returns the
    /// ids to link, without duplicates.
    async fn resolve_tags(
        &self,
        candidate: &Candidate,
        cancel: &Cancellation,
        report: &mut IngestReport,
    ) -> std::result::Result<Vec<i64>, IngestError> {
        let mut ids = Vec::new();

        for name in temperament_tags(&candidate.breeds) {
            let tag = match guarded(cancel, self.store.find_tag(&name)).await? {
                Some(tag) => tag,
                None => {
                    let new_tag = NewTag::new(name, Utc::now());
                    if let Err(errors) = validate_tag(&new_tag) {
                        warn!(cat_id = %candidate.id, tag = %new_tag.name, errors = %errors, "invalid tag, skipping");
                        report.tags_rejected += 1;
                        continue;
                    }
                    let inserted = guarded(cancel, self.store.insert_tag(&new_tag)).await?;
                    if inserted.is_created() {
                        report.tags_created += 1;
                    }
                    inserted.into_tag()
                }
            };

            if !ids.contains(&tag.id) {
                ids.push(tag.id);
            }
        }

        Ok(ids)
    }

    /// Downloads and saves the candidate's image, falling back to the
    /// sentinel on failure.
    async fn fetch_image(
        &self,
        candidate: &Candidate,
        cancel: &Cancellation,
        report: &mut IngestReport,
    ) -> std::result::Result<String, IngestError> {
        let saved = match cancel.guard(self.source.download(&candidate.url)).await {
            None => return Err(IngestError::Cancelled),
            Some(Err(e)) => Err(e.to_string()),
            Some(Ok(bytes)) => match cancel.guard(self.images.save(&candidate.url, &bytes)).await {
                None => return Err(IngestError::Cancelled),
                Some(result) => result.map_err(|e| e.to_string()),
            },
        };

        match saved {
            Ok(path) => Ok(path.display().to_string()),
            Err(e) => {
                warn!(cat_id = %candidate.id, url = %candidate.url, error = %e, "image not saved");
                report.images_failed += 1;
                Ok(IMAGE_SAVE_FAILED.to_string())
            }
        }
    }
}

/// Builds the production ingestor: SQLite store, TheCatAPI client and the
/// configured image directory.
pub async fn build_ingestor(config: &Config) -> Result<(Ingestor, Arc<SqliteStore>)> {
    let store = Arc::new(SqliteStore::open(config).await?);
    let source = Arc::new(CatApiClient::new(&config.upstream)?);
    let ingestor = Ingestor::new(
        store.clone(),
        source,
        ImageDir::new(config.images.dir.clone()),
    );
    Ok((ingestor, store))
}

/// CLI entry point for `cat-harvest fetch`.
pub async fn run_fetch(config: &Config) -> Result<()> {
    let (ingestor, store) = build_ingestor(config).await?;
    let outcome = ingestor.ingest().await;

    println!("fetch: {}", outcome.status());
    println!("  {}", outcome.message());
    if let Some(report) = outcome.report() {
        println!("  fetched: {}", report.fetched);
        println!("  inserted: {}", report.inserted);
        println!("  skipped (existing): {}", report.skipped_existing);
        println!("  skipped (invalid): {}", report.skipped_invalid);
        println!("  tags created: {}", report.tags_created);
        println!("  tags rejected: {}", report.tags_rejected);
        println!("  images failed: {}", report.images_failed);
    }
    if let Some(err) = outcome.error() {
        println!("  error: {}", err);
    }

    store.pool().close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_status_and_message() {
        let report = IngestReport {
            fetched: 2,
            inserted: 1,
            ..Default::default()
        };
        let ok = IngestOutcome::Success(report.clone());
        assert_eq!(ok.status(), "success");
        assert_eq!(ok.message(), "Fetched and stored new cats.");
        assert_eq!(ok.report(), Some(&report));
        assert!(ok.error().is_none());
        assert!(ok.is_success());

        let empty = IngestOutcome::Empty;
        assert_eq!(empty.status(), "empty");
        assert_eq!(empty.message(), "No cats found in API response.");
        assert!(empty.report().is_none());

        let failed = IngestOutcome::StoreFailure {
            message: "disk full".into(),
            report,
        };
        assert_eq!(failed.status(), "store_failure");
        assert_eq!(failed.error(), Some("disk full"));
        assert!(failed.report().is_some());
    }

    #[test]
    fn test_decode_error_maps_to_unexpected() {
        let err: IngestError = UpstreamError::Decode("bad json".into()).into();
        assert!(matches!(err, IngestError::Unexpected(_)));

        let err: IngestError = UpstreamError::Transport("refused".into()).into();
        assert!(matches!(err, IngestError::Upstream(_)));
    }

    #[tokio::test]
    async fn test_cancellation_guard() {
        let never = Cancellation::never();
        assert_eq!(never.guard(async { 7 }).await, Some(7));

        let (tx, rx) = watch::channel(false);
        let cancel = Cancellation::new(rx);
        assert!(!cancel.is_cancelled());
        assert_eq!(cancel.guard(async { 1 }).await, Some(1));

        tx.send(true).unwrap();
        assert!(cancel.is_cancelled());
        assert_eq!(cancel.guard(async { 2 }).await, None);
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_pending_future() {
        let (tx, rx) = watch::channel(false);
        let cancel = Cancellation::new(rx);
        let handle = tokio::spawn(async move {
            cancel
                .guard(std::future::pending::<()>())
                .await
        });
        tokio::task::yield_now().await;
        tx.send(true).unwrap();
        assert_eq!(handle.await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_dropped_sender_never_cancels() {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        let cancel = Cancellation::new(rx);
        assert_eq!(cancel.guard(async { 3 }).await, Some(3));
    }
}
