//! # NewsRelay Scheduler
//!
//! Polling, deduplication and delivery pipeline.
//!
//! ## Architecture
//! ```text
//! Scheduler
//!   ├── trigger_once(entity)          → on-demand cycle
//!   └── register_recurring(entity)    → daily triggers (09:00, 18:00, ...)
//!         └── each firing spawns a cycle
//!
//! Dispatcher::run_cycle (serialised per entity)
//!   fetch → load seen → diff → append seen → chunk → deliver
//!                                                     ├── preamble (broadcast)
//!                                                     └── pages, in order
//! ```

pub mod chunk;
pub mod cron;
pub mod diff;
pub mod dispatch;
pub mod engine;
pub mod failure_log;
pub mod lanes;
pub mod persistence;
pub mod store;

pub use chunk::chunk;
pub use diff::diff;
pub use dispatch::Dispatcher;
pub use engine::Scheduler;
pub use failure_log::FailureLog;
pub use lanes::EntityLanes;
pub use persistence::SqliteSeenStore;
pub use store::{DryRunSeenStore, FileSeenStore, SeenStore};
