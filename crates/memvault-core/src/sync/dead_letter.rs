//! Dead-letter persistence
//!
//! Ops that exhaust `MAX_ATTEMPTS`, or are rejected outright by the
//! cloud, are appended here as one JSON line per op so a restart can
//! reload and re-enqueue them (§4.6 "Cancellation / shutdown").

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use super::operation::{OpKind, SyncOperation};
use crate::memory::Memory;

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct DeadLetterRecord {
    op: String,
    hash: String,
    payload: Option<Memory>,
    enqueued_at: i64,
    attempts: u32,
    preserve_timestamps: bool,
}

impl From<&SyncOperation> for DeadLetterRecord {
    fn from(op: &SyncOperation) -> Self {
        Self {
            op: match op.op {
                OpKind::Create => "create".into(),
                OpKind::Update => "update".into(),
                OpKind::Delete => "delete".into(),
            },
            hash: op.hash.clone(),
            payload: op.payload.clone(),
            enqueued_at: op.enqueued_at,
            attempts: op.attempts,
            preserve_timestamps: op.preserve_timestamps,
        }
    }
}

impl From<DeadLetterRecord> for SyncOperation {
    fn from(record: DeadLetterRecord) -> Self {
        let op = match record.op.as_str() {
            "create" => OpKind::Create,
            "delete" => OpKind::Delete,
            _ => OpKind::Update,
        };
        Self {
            op,
            hash: record.hash,
            payload: record.payload,
            enqueued_at: record.enqueued_at,
            attempts: record.attempts,
            preserve_timestamps: record.preserve_timestamps,
        }
    }
}

pub struct DeadLetterLog {
    path: PathBuf,
}

impl DeadLetterLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn append(&self, op: &SyncOperation) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let record = DeadLetterRecord::from(op);
        let line = serde_json::to_string(&record)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Read and clear all entries, for replay on restart.
    pub fn drain(&self) -> std::io::Result<Vec<SyncOperation>> {
        if !self.path.exists() {
            return Ok(vec![]);
        }
        let file = std::fs::File::open(&self.path)?;
        let reader = std::io::BufReader::new(file);
        let mut ops = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(record) = serde_json::from_str::<DeadLetterRecord>(&line) {
                ops.push(record.into());
            }
        }
        std::fs::remove_file(&self.path)?;
        Ok(ops)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_then_drain_round_trips_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let log = DeadLetterLog::new(dir.path().join("dead_letters.jsonl"));

        let op = SyncOperation::new(OpKind::Delete, "abc123".into(), None, 42);
        log.append(&op).unwrap();

        let drained = log.drain().unwrap();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].hash, "abc123");
        assert!(!log.path().exists());
    }

    #[test]
    fn drain_on_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = DeadLetterLog::new(dir.path().join("missing.jsonl"));
        assert!(log.drain().unwrap().is_empty());
    }
}
