//! # Cat Harvest
//!
//! Ingests cat images and breed metadata from a TheCatAPI-compatible
//! service, tags each cat from its breed temperament, stores everything in
//! SQLite, and serves paginated reads over a JSON HTTP API.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────┐
//! │  Upstream   │──▶│  Ingestion   │──▶│  SQLite  │
//! │  image API  │   │ dedupe+tags  │   │cats/tags │
//! └─────────────┘   └──────┬───────┘   └────┬─────┘
//!                          ▼                │
//!                    ┌──────────┐     ┌─────┴─────┐
//!                    │ CatImages│     ▼           ▼
//!                    └──────────┘ ┌───────┐  ┌────────┐
//!                                 │  CLI  │  │  HTTP  │
//!                                 └───────┘  └────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! cat-harvest init                      # create database
//! cat-harvest fetch                     # ingest one batch
//! cat-harvest list --tag Playful        # browse
//! cat-harvest serve                     # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite implementation of the store trait |
//! | [`upstream`] | Upstream image API client |
//! | [`images`] | Local image directory |
//! | [`ingest`] | Ingestion pipeline |
//! | [`query`] | Get-by-id and paginated listing |
//! | [`server`] | HTTP API server |
//!
//! Models, validation, tag extraction and the `Store` trait live in the
//! `cat-harvest-core` crate.

pub mod config;
pub mod db;
pub mod images;
pub mod ingest;
pub mod migrate;
pub mod query;
pub mod server;
pub mod sqlite_store;
pub mod upstream;
