use crate::msg::MsgKind;
use crate::msg::WriteRecord;
use crate::node::{NodeStatus, StorageNode};
use crate::wal::{Wal, WalError};
use log::{debug, trace};
use std::sync::Arc;
use thiserror::Error;

/// Result of a successfully applied write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteAck {
    pub affected_rows: u32,
}

/// Errors surfaced by the write path.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The node refuses writes in its current lifecycle state.
    #[error("node {node} is not accepting writes")]
    NotActive { node: u32 },
    /// A queue item carried a tag no handler exists for.
    #[error("no write handler for tag {0}")]
    Unhandled(i32),
    #[error(transparent)]
    Codec(#[from] crate::msg::CodecError),
    #[error(transparent)]
    Wal(#[from] WalError),
    #[error(transparent)]
    Queue(#[from] fairq::QueueError),
}

/// Per-kind write handlers; the application side of the dispatch table.
///
/// Handlers run on the pump thread, after the record has been appended to
/// the WAL, and never under any queue or set mutex.
pub trait WriteHandlers: Send + Sync {
    fn on_submit(&self, node: &StorageNode, body: &[u8]) -> Result<WriteAck, WriteError>;
    fn on_create_table(&self, node: &StorageNode, body: &[u8]) -> Result<WriteAck, WriteError>;
    fn on_drop_table(&self, node: &StorageNode, body: &[u8]) -> Result<WriteAck, WriteError>;
    fn on_alter_table(&self, node: &StorageNode, body: &[u8]) -> Result<WriteAck, WriteError>;

    /// Super-table drop. Acknowledged without acting until the storage
    /// engine grows the operation; override to wire it up.
    fn on_drop_stable(&self, node: &StorageNode, body: &[u8]) -> Result<WriteAck, WriteError> {
        let _ = body;
        debug!("node {}: drop-stable acknowledged without action", node.id());
        Ok(WriteAck::default())
    }
}

impl<T: WriteHandlers + ?Sized> WriteHandlers for Arc<T> {
    fn on_submit(&self, node: &StorageNode, body: &[u8]) -> Result<WriteAck, WriteError> {
        (**self).on_submit(node, body)
    }
    fn on_create_table(&self, node: &StorageNode, body: &[u8]) -> Result<WriteAck, WriteError> {
        (**self).on_create_table(node, body)
    }
    fn on_drop_table(&self, node: &StorageNode, body: &[u8]) -> Result<WriteAck, WriteError> {
        (**self).on_drop_table(node, body)
    }
    fn on_alter_table(&self, node: &StorageNode, body: &[u8]) -> Result<WriteAck, WriteError> {
        (**self).on_alter_table(node, body)
    }
    fn on_drop_stable(&self, node: &StorageNode, body: &[u8]) -> Result<WriteAck, WriteError> {
        (**self).on_drop_stable(node, body)
    }
}

/// Applies write records to a node: lifecycle gate, version gate, WAL
/// append, then the kind's handler.
pub struct WriteDispatcher<D, W> {
    handlers: D,
    wal: W,
}

impl<D: WriteHandlers, W: Wal> WriteDispatcher<D, W> {
    pub fn new(handlers: D, wal: W) -> Self {
        Self { handlers, wal }
    }

    /// Processes one record against `node`.
    ///
    /// Client records (version 0) get the node's next version. Replayed
    /// records at or below the node's version were already applied and are
    /// dropped, reported as `Ok(None)` — no WAL append, no handler call.
    /// Every surviving record reaches the WAL before its handler.
    pub fn process(
        &self,
        node: &StorageNode,
        record: &mut WriteRecord,
    ) -> Result<Option<WriteAck>, WriteError> {
        let status = node.status();
        if status == NodeStatus::Closing || status == NodeStatus::Deleting {
            return Err(WriteError::NotActive { node: node.id() });
        }

        if record.version == 0 {
            // From a client: the node orders it.
            if status != NodeStatus::Ready {
                return Err(WriteError::NotActive { node: node.id() });
            }
            record.version = node.advance_version();
        } else {
            // From WAL replay or a forwarding peer. Versions at or below
            // the node's were already applied.
            if record.version <= node.version() {
                trace!(
                    "node {}: stale {:?} v{} dropped (node at v{})",
                    node.id(),
                    record.kind,
                    record.version,
                    node.version()
                );
                return Ok(None);
            }
            node.adopt_version(record.version);
        }

        self.wal.append(node.id(), record)?;

        let ack = match record.kind {
            MsgKind::Submit => self.handlers.on_submit(node, &record.body)?,
            MsgKind::CreateTable => self.handlers.on_create_table(node, &record.body)?,
            MsgKind::DropTable => self.handlers.on_drop_table(node, &record.body)?,
            MsgKind::AlterTable => self.handlers.on_alter_table(node, &record.body)?,
            MsgKind::DropStable => self.handlers.on_drop_stable(node, &record.body)?,
        };
        trace!(
            "node {}: {:?} v{} applied, {} rows",
            node.id(),
            record.kind,
            record.version,
            ack.affected_rows
        );
        Ok(Some(ack))
    }
}
