//! Core types and shared functionality for harbor.
//!
//! This crate provides:
//! - Versioned cache stores with a SQLite backend
//! - Persistence for deferred task registrations
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDb, Snapshot, TaskRecord};
pub use config::{AppConfig, ConfigError, StoreNames};
pub use error::Error;
