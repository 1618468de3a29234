//! Storage-node write path over `fairq` queues.
//!
//! Producers (RPC threads, WAL replay) encode a [`WriteRecord`] into a
//! queue item and enqueue it on a node's write queue; a [`WritePump`]
//! drains the registered nodes round-robin, gates each record by node
//! lifecycle and version, appends it to the [`Wal`], and dispatches to the
//! application's [`WriteHandlers`].
//!
//! # Example
//!
//! ```
//! use fairq_write::{
//!     MemWal, MsgKind, NodeStatus, StorageNode, WriteAck, WriteError,
//!     WriteHandlers, WritePump, WriteRecord,
//! };
//!
//! struct Tables;
//!
//! impl WriteHandlers for Tables {
//!     fn on_submit(&self, _node: &StorageNode, body: &[u8]) -> Result<WriteAck, WriteError> {
//!         Ok(WriteAck { affected_rows: body.len() as u32 / 16 })
//!     }
//!     fn on_create_table(&self, _: &StorageNode, _: &[u8]) -> Result<WriteAck, WriteError> {
//!         Ok(WriteAck::default())
//!     }
//!     fn on_drop_table(&self, _: &StorageNode, _: &[u8]) -> Result<WriteAck, WriteError> {
//!         Ok(WriteAck::default())
//!     }
//!     fn on_alter_table(&self, _: &StorageNode, _: &[u8]) -> Result<WriteAck, WriteError> {
//!         Ok(WriteAck::default())
//!     }
//! }
//!
//! let pump = WritePump::new(Tables, MemWal::new());
//! let node = StorageNode::new(1);
//! node.set_status(NodeStatus::Ready);
//! pump.register(&node).unwrap();
//!
//! pump.submit(&node, &WriteRecord::client(MsgKind::Submit, vec![0; 32])).unwrap();
//! assert!(pump.pump_one().unwrap());
//! assert_eq!(node.version(), 1);
//! ```

mod dispatch;
mod msg;
mod node;
mod pump;
mod wal;

pub use dispatch::{WriteAck, WriteDispatcher, WriteError, WriteHandlers};
pub use msg::{CodecError, MsgKind, WriteRecord};
pub use node::{NodeStatus, StorageNode};
pub use pump::WritePump;
pub use wal::{MemWal, Wal, WalError};
