use std::fmt;
use std::ops::{Deref, DerefMut};

/// One queued message: an integer type tag plus an owned payload blob.
///
/// `Box<Item>` is the external handle. The handle dereferences straight to
/// the payload bytes, so callers index and slice it like the raw buffer an
/// upstream RPC layer would hand them; the tag and the queue link ride in
/// the same node. The allocation belongs to whoever currently holds the box
/// — producer, queue, batch, then consumer — and dropping the box releases
/// it.
pub struct Item {
    pub(crate) tag: i32,
    pub(crate) next: Option<Box<Item>>,
    payload: Box<[u8]>,
}

impl Item {
    /// Allocates an item with a zero-initialised payload of `size` bytes.
    ///
    /// The item is not yet on any queue.
    pub fn alloc(size: usize) -> Box<Item> {
        Box::new(Item {
            tag: 0,
            next: None,
            payload: vec![0u8; size].into_boxed_slice(),
        })
    }

    /// Allocates an item and copies `bytes` into its payload.
    pub fn from_bytes(bytes: &[u8]) -> Box<Item> {
        let mut item = Self::alloc(bytes.len());
        item.copy_from_slice(bytes);
        item
    }

    /// The type tag assigned by the enqueuing producer (0 until enqueued).
    #[inline]
    pub fn tag(&self) -> i32 {
        self.tag
    }
}

impl Deref for Item {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        &self.payload
    }
}

impl DerefMut for Item {
    #[inline]
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.payload
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("tag", &self.tag)
            .field("len", &self.payload.len())
            .finish()
    }
}

/// Releases a whole chain without recursing through the `next` links; the
/// default box drop would otherwise use one stack frame per node.
pub(crate) fn drop_chain(head: Box<Item>) {
    let mut node = Some(head);
    while let Some(mut n) = node {
        node = n.next.take();
    }
}
