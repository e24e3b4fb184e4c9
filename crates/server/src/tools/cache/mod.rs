//! Cache inspection tools.
//!
//! Read-only views of the store; only the lifecycle deletes.

pub mod get;
pub mod stores;

pub use get::{CacheGetParams, get_impl};
pub use stores::stores_impl;
