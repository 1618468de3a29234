//! fairq — typed item queues with fair round-robin queue sets.
//!
//! The in-process message substrate of a storage node: RPC threads allocate
//! an [`Item`], fill its payload, and enqueue it onto a per-node [`Queue`];
//! a worker drains many queues through one [`QueueSet`], which polls its
//! members round-robin and maintains an aggregate depth counter.
//!
//! # Key properties
//!
//! - Per-queue FIFO under any number of concurrent producers and consumers
//! - O(1) bulk drain into a [`Batch`], iterated without further locking
//! - Fair round-robin polling across queue-set members
//! - Lock-free depth observability (`depth` / `aggregate_depth`)
//!
//! Nothing at this layer blocks or waits: readers poll, and signalling or
//! backpressure belongs to callers. Durability is a collaborator concern —
//! queued items vanish with the process.
//!
//! # Example
//!
//! ```
//! use fairq::{Item, Queue, QueueSet};
//!
//! let queue = Queue::new();
//! let set = QueueSet::new();
//! set.affiliate(&queue, "node-1").unwrap();
//!
//! let mut item = Item::alloc(4);
//! item.copy_from_slice(&7u32.to_le_bytes());
//! queue.enqueue(1, item).unwrap();
//!
//! let (tag, item, owner) = set.poll().unwrap();
//! assert_eq!(tag, 1);
//! assert_eq!(owner, "node-1");
//! assert_eq!(&item[..], 7u32.to_le_bytes());
//! ```

mod batch;
mod invariants;
mod item;
mod qset;
mod queue;

pub use batch::Batch;
pub use item::Item;
pub use qset::QueueSet;
pub use queue::{Queue, QueueError};
