use crate::msg::WriteRecord;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Write-ahead-log failure surfaced to the dispatcher.
#[derive(Debug, Error)]
pub enum WalError {
    #[error("wal append rejected: {0}")]
    Rejected(String),
    #[error("wal i/o: {0}")]
    Io(#[from] std::io::Error),
}

/// Durability seam of the write path: every surviving record is appended
/// here before its handler runs. Implementations decide what durable means;
/// this crate only guarantees the call order.
pub trait Wal: Send + Sync {
    fn append(&self, node_id: u32, record: &WriteRecord) -> Result<(), WalError>;
}

impl<W: Wal + ?Sized> Wal for Arc<W> {
    fn append(&self, node_id: u32, record: &WriteRecord) -> Result<(), WalError> {
        (**self).append(node_id, record)
    }
}

/// In-memory log. Handy for tests and single-process deployments; appended
/// records are kept in arrival order and never evicted.
#[derive(Debug, Default)]
pub struct MemWal {
    entries: Mutex<Vec<(u32, WriteRecord)>>,
}

impl MemWal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything appended so far.
    pub fn entries(&self) -> Vec<(u32, WriteRecord)> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Appended records for one node, in append order.
    pub fn entries_for(&self, node_id: u32) -> Vec<WriteRecord> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(id, _)| *id == node_id)
            .map(|(_, record)| record.clone())
            .collect()
    }
}

impl Wal for MemWal {
    fn append(&self, node_id: u32, record: &WriteRecord) -> Result<(), WalError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((node_id, record.clone()));
        Ok(())
    }
}
