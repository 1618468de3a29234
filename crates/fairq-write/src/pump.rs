use crate::dispatch::{WriteDispatcher, WriteError, WriteHandlers};
use crate::msg::{MsgKind, WriteRecord};
use crate::node::StorageNode;
use crate::wal::Wal;
use crossbeam_utils::Backoff;
use fairq::{Batch, Item, QueueError, QueueSet};
use log::trace;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The write-side consumer: one queue set over the registered nodes' write
/// queues, drained round-robin and dispatched.
///
/// Producers call [`submit`](WritePump::submit) from any thread; one pump
/// thread (or a pool sharing the pump through clones of its set) calls
/// [`pump_one`](WritePump::pump_one), [`pump_batch`](WritePump::pump_batch)
/// or [`run`](WritePump::run).
pub struct WritePump<D, W> {
    set: QueueSet<Arc<StorageNode>>,
    dispatcher: WriteDispatcher<D, W>,
}

impl<D: WriteHandlers, W: Wal> WritePump<D, W> {
    pub fn new(handlers: D, wal: W) -> Self {
        Self {
            set: QueueSet::new(),
            dispatcher: WriteDispatcher::new(handlers, wal),
        }
    }

    /// Affiliates `node`'s write queue with the pump, with the node itself
    /// as the handle polls hand back.
    pub fn register(&self, node: &Arc<StorageNode>) -> Result<(), QueueError> {
        self.set.affiliate(node.write_queue(), Arc::clone(node))
    }

    /// Detaches `node`'s write queue. Queued items stay on the node's queue.
    pub fn deregister(&self, node: &Arc<StorageNode>) {
        self.set.detach(node.write_queue());
    }

    /// Producer contract: encode `record` into a fresh item and enqueue it
    /// on `node`'s write queue under its kind's tag.
    pub fn submit(&self, node: &StorageNode, record: &WriteRecord) -> Result<(), WriteError> {
        let item = record.encode_item()?;
        node.write_queue().enqueue(record.kind.tag(), item)?;
        Ok(())
    }

    /// Polls one record round-robin and dispatches it. `Ok(false)` when
    /// every registered queue was empty.
    pub fn pump_one(&self) -> Result<bool, WriteError> {
        let Some((tag, item, node)) = self.set.poll() else {
            return Ok(false);
        };
        self.dispatch_item(tag, &item, &node)?;
        Ok(true)
    }

    /// Drains the next non-empty queue into `batch` and dispatches every
    /// record in it. Returns the number of records drained; the batch comes
    /// back empty even when a handler fails partway.
    pub fn pump_batch(&self, batch: &mut Batch) -> Result<usize, WriteError> {
        let Some((drained, node)) = self.set.poll_batch(batch) else {
            return Ok(0);
        };
        trace!("node {}: draining {} queued writes", node.id(), drained);
        let result: Result<(), WriteError> = (|| {
            while let Some((tag, item)) = batch.next() {
                self.dispatch_item(tag, item, &node)?;
            }
            Ok(())
        })();
        batch.clear();
        result.map(|()| drained)
    }

    /// Runs until `stop` is raised, backing off while idle. Returns the
    /// total number of records pumped.
    pub fn run(&self, stop: &AtomicBool) -> Result<u64, WriteError> {
        let mut batch = Batch::new();
        let backoff = Backoff::new();
        let mut total = 0u64;
        while !stop.load(Ordering::Acquire) {
            let n = self.pump_batch(&mut batch)?;
            if n == 0 {
                backoff.snooze();
            } else {
                total += n as u64;
                backoff.reset();
            }
        }
        Ok(total)
    }

    /// Total queued writes across registered nodes.
    #[inline]
    pub fn depth(&self) -> usize {
        self.set.aggregate_depth()
    }

    /// Number of registered nodes.
    pub fn node_count(&self) -> usize {
        self.set.member_count()
    }

    fn dispatch_item(&self, tag: i32, item: &Item, node: &StorageNode) -> Result<(), WriteError> {
        MsgKind::from_tag(tag).ok_or(WriteError::Unhandled(tag))?;
        let mut record = WriteRecord::decode_item(item)?;
        self.dispatcher.process(node, &mut record)?;
        Ok(())
    }
}
