use crate::invariants::{debug_assert_aggregate_covers, debug_assert_links_consistent};
use crate::item::{drop_chain, Item};
use crate::qset::SetShared;
use crate::Batch;
use crossbeam_utils::CachePadded;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use thiserror::Error;

// =============================================================================
// LOCKING & COUNTING PROTOCOL
// =============================================================================
//
// Every queue carries one mutex guarding its list links, its count and its
// affiliation. A queue set carries its own mutex guarding the member list
// and the round-robin cursor. Whenever both must be held the order is always
//
//     set mutex -> queue mutex
//
// (affiliate, detach, close). enqueue/dequeue/drain touch only the queue
// mutex and update the owning set's aggregate counter with relaxed atomic
// add/sub; taking the set mutex for every item would double the lock
// traffic on the hot path. Readers of `depth` and `aggregate_depth` may
// therefore observe values that lag the lists by an in-flight update; the
// counters are exact at any point where all mutexes could be held at once.
//
// The `depth` mirror outside the mutex exists only for observability. The
// authoritative count lives in `QueueState` and changes only under the lock.
//
// Critical sections are bounded list-head manipulations; no caller code ever
// runs under a queue or set mutex.
// =============================================================================

/// Error types for queue operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The queue has been closed; a rejected item is released.
    #[error("queue is closed")]
    Closed,
    /// The queue already belongs to a queue set.
    #[error("queue is already affiliated with a queue set")]
    AlreadyAffiliated,
}

/// FIFO of typed items, safe under concurrent producers and consumers.
///
/// `Queue` is a cheap cloneable handle; clones share the same underlying
/// queue. `H` is the affiliation handle a [`QueueSet`](crate::QueueSet)
/// stores for this queue and hands back alongside polled items.
pub struct Queue<H = ()> {
    pub(crate) inner: Arc<QueueInner<H>>,
}

pub(crate) struct QueueInner<H> {
    /// Lock-free mirror of the item count, for [`Queue::depth`].
    pub(crate) depth: CachePadded<AtomicUsize>,
    state: Mutex<QueueState<H>>,
}

pub(crate) struct QueueState<H> {
    pub(crate) head: Option<Box<Item>>,
    /// Interior pointer to the last node of the `head` chain; null iff empty.
    tail: *mut Item,
    pub(crate) count: usize,
    pub(crate) item_size: usize,
    pub(crate) closed: bool,
    pub(crate) attach: Option<Attachment<H>>,
}

/// Affiliation back-reference: non-owning, cleared on detach. The set's
/// member list holds the owning link.
pub(crate) struct Attachment<H> {
    pub(crate) set: Weak<SetShared<H>>,
    pub(crate) ahandle: H,
}

// SAFETY: `tail` is an interior pointer into the box chain owned by `head`
// and is only read or written while the state mutex is held, so moving the
// state between threads cannot race on it.
unsafe impl<H: Send> Send for QueueState<H> {}

impl<H> QueueInner<H> {
    /// Locks the queue state, absorbing poisoning: every mutation leaves the
    /// links structurally valid before the guard is released, so a panicking
    /// peer cannot hand us a torn list.
    pub(crate) fn lock(&self) -> MutexGuard<'_, QueueState<H>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<H> QueueState<H> {
    fn push_back(&mut self, tag: i32, mut item: Box<Item>) {
        debug_assert_links_consistent!(self.head.is_none(), self.tail.is_null(), self.count);
        item.tag = tag;
        item.next = None;
        let raw: *mut Item = &mut *item;
        if self.tail.is_null() {
            self.head = Some(item);
        } else {
            // SAFETY: `tail` points at the last node of the chain owned by
            // `head`; boxed nodes keep stable addresses until unlinked.
            unsafe { (*self.tail).next = Some(item) };
        }
        self.tail = raw;
        self.count += 1;
    }

    pub(crate) fn pop_front(&mut self) -> Option<(i32, Box<Item>)> {
        debug_assert_links_consistent!(self.head.is_none(), self.tail.is_null(), self.count);
        let mut node = self.head.take()?;
        self.head = node.next.take();
        if self.head.is_none() {
            self.tail = ptr::null_mut();
        }
        self.count -= 1;
        Some((node.tag, node))
    }

    /// Steals the whole chain, leaving the queue empty. Returns the old
    /// head and the number of items transferred, or `None` when empty.
    pub(crate) fn take_all(&mut self) -> Option<(Box<Item>, usize)> {
        let head = self.head.take()?;
        let n = self.count;
        self.tail = ptr::null_mut();
        self.count = 0;
        Some((head, n))
    }

    /// Adds `n` items to the owning set's aggregate count, if affiliated.
    pub(crate) fn credit_set(&self, n: usize) {
        if let Some(attach) = &self.attach {
            if let Some(set) = attach.set.upgrade() {
                set.aggregate.fetch_add(n, Ordering::Relaxed);
            }
        }
    }

    /// Subtracts `n` items from the owning set's aggregate count, if
    /// affiliated.
    pub(crate) fn debit_set(&self, n: usize) {
        if n == 0 {
            return;
        }
        if let Some(attach) = &self.attach {
            if let Some(set) = attach.set.upgrade() {
                let prev = set.aggregate.fetch_sub(n, Ordering::Relaxed);
                debug_assert_aggregate_covers!(prev, n);
            }
        }
    }
}

impl<H> Drop for QueueState<H> {
    fn drop(&mut self) {
        if let Some(head) = self.head.take() {
            drop_chain(head);
        }
    }
}

impl<H> Queue<H> {
    /// Creates an empty standalone queue.
    pub fn new() -> Self {
        Self::with_item_size(0)
    }

    /// Creates an empty queue advertising `item_size` bytes per payload.
    /// The size is informational and reported through drained batches.
    pub fn with_item_size(item_size: usize) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                depth: CachePadded::new(AtomicUsize::new(0)),
                state: Mutex::new(QueueState {
                    head: None,
                    tail: ptr::null_mut(),
                    count: 0,
                    item_size,
                    closed: false,
                    attach: None,
                }),
            }),
        }
    }

    /// Appends `item` under the given type tag.
    ///
    /// Enqueues on the same queue are serialised by its mutex and reach
    /// consumers in lock-acquisition order. On a closed queue the item is
    /// released and [`QueueError::Closed`] returned.
    pub fn enqueue(&self, tag: i32, item: Box<Item>) -> Result<(), QueueError> {
        let mut state = self.inner.lock();
        if state.closed {
            return Err(QueueError::Closed);
        }
        state.push_back(tag, item);
        state.credit_set(1);
        self.inner.depth.store(state.count, Ordering::Relaxed);
        Ok(())
    }

    /// Removes the oldest item, transferring ownership to the caller.
    /// Returns `None` when the queue is empty.
    pub fn dequeue(&self) -> Option<(i32, Box<Item>)> {
        let mut state = self.inner.lock();
        let (tag, item) = state.pop_front()?;
        state.debit_set(1);
        self.inner.depth.store(state.count, Ordering::Relaxed);
        Some((tag, item))
    }

    /// Moves every queued item into `batch` in one step and returns how
    /// many were transferred.
    ///
    /// The transfer is atomic: producers blocked on the mutex observe an
    /// empty queue afterwards and no consumer can see a partial run. When
    /// the queue is empty, `batch` is left untouched and 0 is returned.
    pub fn drain(&self, batch: &mut Batch) -> usize {
        let mut state = self.inner.lock();
        let Some((head, n)) = state.take_all() else {
            return 0;
        };
        state.debit_set(n);
        self.inner.depth.store(0, Ordering::Relaxed);
        let item_size = state.item_size;
        drop(state);
        batch.load(head, n, item_size);
        n
    }

    /// Current item count. Reads without the mutex and may lag in-flight
    /// operations by one update; suitable for metrics.
    #[inline]
    pub fn depth(&self) -> usize {
        self.inner.depth.load(Ordering::Relaxed)
    }

    /// Returns true when no items are queued (same staleness as `depth`).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.depth() == 0
    }

    /// The advertised per-item payload size (0 when unspecified).
    pub fn item_size(&self) -> usize {
        self.inner.lock().item_size
    }

    /// Returns true if this queue currently belongs to a queue set.
    pub fn is_affiliated(&self) -> bool {
        self.inner.lock().attach.is_some()
    }

    /// Tears the queue down: detaches it from its set if affiliated, then
    /// releases every remaining item and rejects further enqueues.
    pub fn close(&self) {
        // The set mutex must come before the queue mutex, so the
        // back-reference is read in its own critical section first.
        let set = {
            let state = self.inner.lock();
            state.attach.as_ref().and_then(|a| a.set.upgrade())
        };
        if let Some(set) = set {
            set.detach_inner(&self.inner);
        }
        let mut state = self.inner.lock();
        state.closed = true;
        if let Some((head, n)) = state.take_all() {
            // Settles the aggregate if a racing re-affiliation slipped in
            // between the detach above and this lock; a no-op otherwise.
            state.debit_set(n);
            drop_chain(head);
        }
        self.inner.depth.store(0, Ordering::Relaxed);
    }
}

impl<H> Default for Queue<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> Clone for Queue<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
