//! # cat-harvest core
//!
//! Shared logic for cat-harvest: data models, validation rules, tag
//! extraction from breed temperament text, and the storage abstraction.
//!
//! This crate contains no sqlx, reqwest, or filesystem I/O. The SQLite
//! backend, the upstream HTTP client and the ingestion pipeline live in the
//! `cat-harvest` application crate.

pub mod models;
pub mod store;
pub mod tags;
pub mod validate;
