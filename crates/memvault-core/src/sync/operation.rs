//! Sync queue entries and the coalescing rules that keep the queue
//! bounded under bursty writes (§4.6).

use crate::memory::Memory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Create,
    Update,
    Delete,
}

/// One outbound mutation, queued for the Sync Engine's worker loop.
#[derive(Debug, Clone)]
pub struct SyncOperation {
    pub op: OpKind,
    pub hash: String,
    pub payload: Option<Memory>,
    pub enqueued_at: i64,
    pub attempts: u32,
    /// When true, the cloud write must preserve `created_at`/`updated_at`
    /// from `payload` rather than stamping server-side time (startup
    /// sync replays and drift-scan corrections both need this).
    pub preserve_timestamps: bool,
}

impl SyncOperation {
    pub fn new(op: OpKind, hash: String, payload: Option<Memory>, now: i64) -> Self {
        Self {
            op,
            hash,
            payload,
            enqueued_at: now,
            attempts: 0,
            preserve_timestamps: false,
        }
    }
}

/// Result of coalescing `incoming` into a `pending` op for the same hash.
#[derive(Debug, Clone, PartialEq)]
pub enum Coalesced {
    /// A single op replaces both.
    Merged(SyncOperation),
    /// The pair cancels out (CREATE followed by DELETE never left the cloud).
    Cancelled,
    /// Neither merges nor cancels: both stay queued as separate ops, in
    /// order (a DELETE followed by a CREATE is a recreate).
    Distinct(SyncOperation, SyncOperation),
}

/// Merge `incoming` into `pending`, both for the same content_hash, per
/// the coalescing table in §4.6.
pub fn coalesce(pending: SyncOperation, incoming: SyncOperation) -> Coalesced {
    use OpKind::*;
    match (pending.op, incoming.op) {
        (Create, Update) => Coalesced::Merged(SyncOperation {
            op: Create,
            payload: incoming.payload.or(pending.payload),
            ..pending
        }),
        (Create, Delete) => Coalesced::Cancelled,
        (Update, Update) => Coalesced::Merged(SyncOperation {
            op: Update,
            payload: incoming.payload.or(pending.payload),
            ..pending
        }),
        (Update, Delete) => Coalesced::Merged(SyncOperation {
            op: Delete,
            payload: None,
            ..pending
        }),
        // A CREATE after a pending DELETE is a recreate: keep the DELETE
        // and push the CREATE as a new, distinct op rather than merging
        // or letting it silently cancel the DELETE.
        (Delete, Create) => Coalesced::Distinct(pending, incoming),
        (Delete, _) => Coalesced::Merged(pending),
        // Not reachable via normal `store()`/`delete()` calls (a pending
        // CREATE or UPDATE can't receive another CREATE for the same
        // hash), kept exhaustive defensively: treat as a duplicate.
        (Create, Create) | (Update, Create) => Coalesced::Merged(pending),
    }
}
