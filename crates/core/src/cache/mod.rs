//! SQLite-backed storage for versioned cache stores and deferred tasks.
//!
//! This module provides the persistent side of the interception layer using
//! SQLite with async access via tokio-rusqlite. It supports:
//!
//! - Named stores holding one snapshot per request key (last write wins)
//! - All-or-nothing batch population for precache installs
//! - Whole-store deletion, cascading to every entry
//! - Pending deferred task registrations with attempt tracking
//! - Automatic schema migrations and WAL mode for concurrent access

pub mod connection;
pub mod hash;
pub mod migrations;
pub mod stores;
pub mod tasks;

pub use crate::Error;

pub use connection::CacheDb;
pub use stores::Snapshot;
pub use tasks::TaskRecord;
