//! Field validation for records about to be persisted.
//!
//! Validators collect every failing rule instead of stopping at the first
//! one, so a rejected record can be logged with all of its problems.

use std::fmt;

use thiserror::Error;

use crate::models::{NewCat, NewTag};

/// Shortest accepted tag name, in characters.
pub const TAG_NAME_MIN_LEN: usize = 2;
/// Longest accepted tag name, in characters.
pub const TAG_NAME_MAX_LEN: usize = 50;

/// A single failed rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub field: &'static str,
    pub message: String,
}

/// All rules a record failed. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", join_messages(.0))]
pub struct ValidationErrors(Vec<ValidationFailure>);

impl ValidationErrors {
    pub fn failures(&self) -> &[ValidationFailure] {
        &self.0
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|f| f.field == field)
    }
}

fn join_messages(failures: &[ValidationFailure]) -> String {
    failures
        .iter()
        .map(|f| f.message.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Default)]
struct Collector(Vec<ValidationFailure>);

impl Collector {
    fn check(&mut self, ok: bool, field: &'static str, message: impl fmt::Display) {
        if !ok {
            self.0.push(ValidationFailure {
                field,
                message: message.to_string(),
            });
        }
    }

    fn finish(self) -> Result<(), ValidationErrors> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(self.0))
        }
    }
}

/// Checks a cat: external id present, strictly positive dimensions.
pub fn validate_cat(cat: &NewCat) -> Result<(), ValidationErrors> {
    let mut c = Collector::default();
    c.check(!cat.cat_id.trim().is_empty(), "cat_id", "CatId is required.");
    c.check(cat.width > 0, "width", "Width must be greater than 0.");
    c.check(cat.height > 0, "height", "Height must be greater than 0.");
    c.finish()
}

/// Checks a tag name: present and between 2 and 50 characters.
pub fn validate_tag(tag: &NewTag) -> Result<(), ValidationErrors> {
    let mut c = Collector::default();
    let len = tag.name.chars().count();
    if tag.name.trim().is_empty() {
        c.check(false, "name", "Tag name is required.");
    } else {
        c.check(
            len <= TAG_NAME_MAX_LEN,
            "name",
            format_args!("Tag name must be at most {} characters.", TAG_NAME_MAX_LEN),
        );
        c.check(
            len >= TAG_NAME_MIN_LEN,
            "name",
            format_args!("Tag name must be at least {} characters.", TAG_NAME_MIN_LEN),
        );
    }
    c.finish()
}
