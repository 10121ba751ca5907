// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod app;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod detect;
pub mod fetch;
pub mod pipeline;
pub mod report;
pub mod snapshot;
pub mod store;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use catalog::{Catalog, Source, SourceKind};
pub use detect::{detect, ChangeKind, ChangeRecord};
pub use pipeline::{Monitor, RunMode, RunOutcome};
pub use snapshot::{Entry, Snapshot};
