//! Core data models used throughout cat-harvest.
//!
//! [`Candidate`] is what the upstream image API returns. [`NewCat`] and
//! [`NewTag`] are records the pipeline builds before persistence, and
//! [`Cat`] / [`Tag`] are what the store hands back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One upstream search result: a cat image plus breed metadata.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Candidate {
    pub id: String,
    pub url: String,
    pub width: i64,
    pub height: i64,
    #[serde(default)]
    pub breeds: Vec<Breed>,
}

/// Breed metadata attached to a [`Candidate`].
///
/// Only the temperament string matters for tagging; it is a
/// comma-separated list such as `"Calm, Friendly, Playful"`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Breed {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub temperament: String,
}

/// A cat record that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCat {
    pub cat_id: String,
    pub width: i64,
    pub height: i64,
    pub image_path: String,
    pub created: DateTime<Utc>,
}

impl NewCat {
    /// Builds an unsaved cat from an upstream candidate. The image path is
    /// empty until the image has been downloaded.
    pub fn from_candidate(candidate: &Candidate, created: DateTime<Utc>) -> Self {
        Self {
            cat_id: candidate.id.clone(),
            width: candidate.width,
            height: candidate.height,
            image_path: String::new(),
            created,
        }
    }
}

/// A tag record that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTag {
    pub name: String,
    pub created: DateTime<Utc>,
}

impl NewTag {
    pub fn new(name: impl Into<String>, created: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            created,
        }
    }
}

/// A persisted tag.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub created: DateTime<Utc>,
}

/// A persisted cat with its tags loaded.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Cat {
    pub id: i64,
    pub cat_id: String,
    pub width: i64,
    pub height: i64,
    pub image_path: String,
    pub created: DateTime<Utc>,
    pub tags: Vec<Tag>,
}

/// One page of cats plus the total number of matching cats.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CatPage {
    pub total_count: i64,
    pub cats: Vec<Cat>,
}
