use crate::item::{drop_chain, Item};
use std::ptr;

/// Snapshot of a drained run of items, iterated without further locking.
///
/// A batch owns the run handed to it by [`Queue::drain`](crate::Queue::drain)
/// or [`QueueSet::poll_batch`](crate::QueueSet::poll_batch).
/// [`next`](Batch::next) lends out each item in FIFO order,
/// [`reset`](Batch::reset) rewinds for a second pass (validate, then
/// commit), and [`clear`](Batch::clear) — or dropping the batch — releases
/// every item still held. Only the consumer that drained the run may
/// iterate it; the batch itself takes no locks.
pub struct Batch {
    head: Option<Box<Item>>,
    /// Next node to yield; null when exhausted or empty.
    cursor: *mut Item,
    count: usize,
    item_size: usize,
}

// SAFETY: `cursor` only ever points into the box chain owned by `head`, so
// the batch may move between threads together with its run. Iteration needs
// `&mut self`, which keeps it single-threaded.
unsafe impl Send for Batch {}

impl Batch {
    /// Creates an empty batch, ready to receive a drained run.
    pub fn new() -> Self {
        Self {
            head: None,
            cursor: ptr::null_mut(),
            count: 0,
            item_size: 0,
        }
    }

    /// Number of items captured at drain time.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true when the batch holds no run.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The drained queue's advertised item size at drain time.
    #[inline]
    pub fn item_size(&self) -> usize {
        self.item_size
    }

    /// Lends the next item of the run together with its type tag. Returns
    /// `None` once the run is exhausted.
    pub fn next(&mut self) -> Option<(i32, &mut Item)> {
        if self.cursor.is_null() {
            return None;
        }
        // SAFETY: the cursor points at a live node of the chain owned by
        // `self.head`; boxed nodes keep stable addresses while linked, and
        // `&mut self` guarantees exclusive access for the lent lifetime.
        let node = unsafe { &mut *self.cursor };
        self.cursor = node
            .next
            .as_deref_mut()
            .map_or(ptr::null_mut(), |n| n as *mut Item);
        let tag = node.tag;
        Some((tag, node))
    }

    /// Rewinds the cursor to the start of the run for another pass.
    pub fn reset(&mut self) {
        self.cursor = self
            .head
            .as_deref_mut()
            .map_or(ptr::null_mut(), |n| n as *mut Item);
    }

    /// Releases every item still held by the batch.
    pub fn clear(&mut self) {
        self.cursor = ptr::null_mut();
        self.count = 0;
        self.item_size = 0;
        if let Some(head) = self.head.take() {
            drop_chain(head);
        }
    }

    /// Replaces the contents with a freshly drained run. A prior run still
    /// held is released first.
    pub(crate) fn load(&mut self, mut head: Box<Item>, count: usize, item_size: usize) {
        #[cfg(debug_assertions)]
        {
            let mut walked = 0usize;
            let mut node = Some(&*head);
            while let Some(item) = node {
                walked += 1;
                node = item.next.as_deref();
            }
            debug_assert_eq!(walked, count, "drained run length disagrees with count");
        }
        self.clear();
        self.cursor = &mut *head;
        self.head = Some(head);
        self.count = count;
        self.item_size = item_size;
    }
}

impl Default for Batch {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Batch {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Queue;

    fn loaded_queue(n: u32) -> Queue {
        let queue = Queue::new();
        for i in 0..n {
            let mut item = Item::alloc(4);
            item.copy_from_slice(&i.to_le_bytes());
            queue.enqueue(i as i32, item).unwrap();
        }
        queue
    }

    #[test]
    fn test_drain_then_iterate() {
        let queue = loaded_queue(10);
        let mut batch = Batch::new();
        assert_eq!(queue.drain(&mut batch), 10);
        assert_eq!(queue.depth(), 0);
        assert_eq!(batch.len(), 10);

        for i in 0..10u32 {
            let (tag, item) = batch.next().unwrap();
            assert_eq!(tag, i as i32);
            assert_eq!(&item[..], i.to_le_bytes());
        }
        assert!(batch.next().is_none());
    }

    #[test]
    fn test_reset_replays_run() {
        let queue = loaded_queue(5);
        let mut batch = Batch::new();
        queue.drain(&mut batch);

        // First pass: validate.
        let mut seen = 0;
        while batch.next().is_some() {
            seen += 1;
        }
        assert_eq!(seen, 5);

        // Second pass: commit.
        batch.reset();
        for i in 0..5u32 {
            let (_, item) = batch.next().unwrap();
            assert_eq!(&item[..], i.to_le_bytes());
        }
        assert!(batch.next().is_none());
    }

    #[test]
    fn test_load_replaces_previous_run() {
        let mut batch = Batch::new();
        loaded_queue(3).drain(&mut batch);
        loaded_queue(7).drain(&mut batch);
        assert_eq!(batch.len(), 7);
        let mut seen = 0;
        while batch.next().is_some() {
            seen += 1;
        }
        assert_eq!(seen, 7);
    }

    #[test]
    fn test_clear_empties_batch() {
        let mut batch = Batch::new();
        loaded_queue(4).drain(&mut batch);
        batch.clear();
        assert!(batch.is_empty());
        assert!(batch.next().is_none());
        batch.reset();
        assert!(batch.next().is_none());
    }

    #[test]
    fn test_new_batch_is_empty() {
        let mut batch = Batch::new();
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
        assert!(batch.next().is_none());
    }
}
