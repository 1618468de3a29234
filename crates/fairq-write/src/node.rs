use fairq::Queue;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

/// Lifecycle states of a storage node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeStatus {
    Init = 0,
    Ready = 1,
    Closing = 2,
    Deleting = 3,
}

impl NodeStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => NodeStatus::Ready,
            2 => NodeStatus::Closing,
            3 => NodeStatus::Deleting,
            _ => NodeStatus::Init,
        }
    }
}

/// One storage node: its write queue plus the monotone version that orders
/// every write applied to it.
///
/// The write queue's affiliation handle is the node itself, so a pump that
/// polls many nodes gets the owner back with each item.
pub struct StorageNode {
    id: u32,
    status: AtomicU8,
    version: AtomicU64,
    wqueue: Queue<Arc<StorageNode>>,
}

impl StorageNode {
    /// Creates a node in `Init` state with version 0 and an empty write
    /// queue.
    pub fn new(id: u32) -> Arc<Self> {
        Arc::new(Self {
            id,
            status: AtomicU8::new(NodeStatus::Init as u8),
            version: AtomicU64::new(0),
            wqueue: Queue::new(),
        })
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn status(&self) -> NodeStatus {
        NodeStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn set_status(&self, status: NodeStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    /// The version of the last write adopted by this node.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Assigns the next version to a client write.
    pub(crate) fn advance_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Adopts a replayed record's version.
    pub(crate) fn adopt_version(&self, version: u64) {
        self.version.store(version, Ordering::Release);
    }

    /// The node's write queue.
    #[inline]
    pub fn write_queue(&self) -> &Queue<Arc<StorageNode>> {
        &self.wqueue
    }

    /// Marks the node closing and tears down its write queue, detaching it
    /// from any pump it was registered with and releasing queued items.
    pub fn close(&self) {
        self.set_status(NodeStatus::Closing);
        self.wqueue.close();
    }
}

impl fmt::Debug for StorageNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageNode")
            .field("id", &self.id)
            .field("status", &self.status())
            .field("version", &self.version())
            .field("queued", &self.wqueue.depth())
            .finish()
    }
}
