//! # Sluice
//!
//! Ingests social platform accounts and normalizes every record into a
//! uniform [`ContentItem`](domain::ContentItem), either continuously or as a
//! bounded backfill of one UTC day.
//!
//! ## Architecture
//!
//! ```text
//! SessionManager → FetchStrategy → ContentNormalizer → day buckets → CacheStore
//! ```
//!
//! - [`session`]: cookie/login authentication under a bounded retry policy
//! - [`fetch`]: timeline scan and keyword search behind one paging contract
//! - [`normalizer`]: raw records to content items, with bounded reshare and
//!   quote resolution
//! - [`source`]: backfill and continuous polling over the pieces above
//! - [`cache`]: TTL cache with cursors, in memory or in SQLite
//!
//! ## Quick Start
//!
//! ```bash
//! # Everything from 2 January 2024 (UTC)
//! sluice backfill --date 2024-01-02
//!
//! # New items since the last run
//! sluice fetch
//!
//! # Keep polling every 30 minutes
//! sluice poll --interval 30m
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together the cache, the
/// remote client and the source.
pub mod app;

/// TTL key/value cache and cursor storage.
pub mod cache;

/// Command-line interface using clap.
///
/// - `fetch` - Items newer than the last run
/// - `backfill --date YYYY-MM-DD` - One UTC day
/// - `poll --interval 30m` - Poll until interrupted
/// - `cache purge` - Drop expired cache entries
pub mod cli;

/// Configuration loaded from `~/.config/sluice/config.toml`.
pub mod config;

/// Interval polling loop.
pub mod daemon;

/// Core domain models.
///
/// - [`RawRecord`](domain::RawRecord): validated platform record
/// - [`ContentItem`](domain::ContentItem): normalized output
/// - [`FetchWindow`](domain::FetchWindow): half-open time window
pub mod domain;

/// Fetch strategies: timeline scan and search.
pub mod fetch;

/// Raw record to content item conversion.
pub mod normalizer;

/// Cache-first profile and avatar lookup.
pub mod profile;

/// Remote platform capabilities and the HTTP bridge client.
pub mod remote;

/// Authentication and retry.
pub mod session;

/// Content sources: backfill and continuous polling.
pub mod source;
