//! Sync Engine (C7) — bounded outbound queue between LocalStore and
//! CloudStore, with coalescing, backoff, dead-lettering, startup sync,
//! and a periodic drift scanner.

mod dead_letter;
mod engine;
mod operation;

pub use dead_letter::DeadLetterLog;
pub use engine::{SyncConfig, SyncEngine, SyncError};
pub use operation::{coalesce, OpKind, SyncOperation};
