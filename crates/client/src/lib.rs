//! Client side of harbor: the interception and caching layer.
//!
//! This crate provides the network fetcher, both retrieval strategies and
//! their dispatcher, the version lifecycle, the deferred task queue, the
//! notification dispatcher, and the [`Worker`] that routes host events to
//! all of them.

pub mod fetch;
pub mod lifecycle;
pub mod notify;
pub mod strategy;
pub mod tasks;
pub mod worker;

#[cfg(test)]
mod testing;

pub use fetch::{Destination, FetchClient, FetchConfig, Fetcher, Request, RequestMode, Response, ResponseSource};
pub use lifecycle::{LifecycleManager, VersionState};
pub use notify::{ClickOutcome, Notification, NotificationDispatcher, NotificationSink, TracingSink};
pub use strategy::{Dispatcher, Strategy, StrategyContext};
pub use tasks::{Backoff, SYNC_PREDICTIONS, TaskHandler, TaskOutcome, TaskQueue, UPDATE_PREDICTIONS};
pub use worker::{ControlMessage, Event, EventOutcome, Worker, WorkerState};
