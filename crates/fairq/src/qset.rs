use crate::invariants::{debug_assert_aggregate_covers, debug_assert_cursor_bounded};
use crate::item::Item;
use crate::queue::{Attachment, Queue, QueueError, QueueInner};
use crate::Batch;
use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Fair round-robin multiplexer over affiliated queues.
///
/// A set groups queues so one worker (or pool) can drain many logical
/// streams: [`poll`](QueueSet::poll) visits members round-robin and returns
/// the first item found together with the member's affiliation handle, and
/// [`aggregate_depth`](QueueSet::aggregate_depth) tracks the total item
/// count across members without taking a lock. A queue belongs to at most
/// one set at a time; the set holds the owning membership link while the
/// queue keeps a non-owning back-reference (see the protocol note in
/// `queue.rs`).
///
/// `QueueSet` is a cheap cloneable handle; clones share the same set.
/// Dropping the last handle releases the set — detach the members first, or
/// their items simply stop counting toward any aggregate.
pub struct QueueSet<H = ()> {
    inner: Arc<SetShared<H>>,
}

pub(crate) struct SetShared<H> {
    /// Total items across members, maintained with relaxed add/sub from
    /// under each member queue's own mutex.
    pub(crate) aggregate: CachePadded<AtomicUsize>,
    members: Mutex<Members<H>>,
}

struct Members<H> {
    queues: Vec<Queue<H>>,
    /// Index of the next member to inspect. Advanced on every poll attempt,
    /// hit or miss, so a busy neighbour cannot starve the others.
    cursor: usize,
}

impl<H> QueueSet<H> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SetShared {
                aggregate: CachePadded::new(AtomicUsize::new(0)),
                members: Mutex::new(Members {
                    queues: Vec::new(),
                    cursor: 0,
                }),
            }),
        }
    }

    /// Affiliates `queue` with this set, recording `ahandle` to be handed
    /// back by polls that dequeue from it.
    ///
    /// Fails without touching the set when the queue already belongs to a
    /// set (this one included) or has been closed. The queue's current
    /// items are added to the aggregate count.
    pub fn affiliate(&self, queue: &Queue<H>, ahandle: H) -> Result<(), QueueError> {
        let mut members = self.inner.lock_members();
        // Lock order is always set -> queue.
        let mut state = queue.inner.lock();
        if state.attach.is_some() {
            return Err(QueueError::AlreadyAffiliated);
        }
        if state.closed {
            return Err(QueueError::Closed);
        }
        state.attach = Some(Attachment {
            set: Arc::downgrade(&self.inner),
            ahandle,
        });
        self.inner.aggregate.fetch_add(state.count, Ordering::Relaxed);
        drop(state);
        members.queues.push(queue.clone());
        Ok(())
    }

    /// Removes `queue` from the set, subtracts its items from the aggregate
    /// and clears its back-reference. No-op when the queue is not a member.
    pub fn detach(&self, queue: &Queue<H>) {
        self.inner.detach_inner(&queue.inner);
    }

    /// Number of member queues.
    pub fn member_count(&self) -> usize {
        self.inner.lock_members().queues.len()
    }

    /// Total item count across members. Lock-free; exact whenever all
    /// mutexes could be held, otherwise possibly mid-update.
    #[inline]
    pub fn aggregate_depth(&self) -> usize {
        self.inner.aggregate.load(Ordering::Relaxed)
    }
}

impl<H: Clone> QueueSet<H> {
    /// Dequeues one item from the next non-empty member, round-robin.
    ///
    /// Inspects at most one full pass over the membership, advancing the
    /// cursor on every attempt regardless of outcome. Returns the tag, the
    /// item and the member's affiliation handle, or `None` when every
    /// member was empty at its inspection instant — a best-effort fair
    /// read, not a linearized emptiness check.
    pub fn poll(&self) -> Option<(i32, Box<Item>, H)> {
        for _ in 0..self.member_count() {
            let member = self.inner.advance_cursor()?;
            let mut state = member.lock();
            // A member detached since the cursor captured it has had its
            // count settled already; leave its items to the new owner.
            let Some(attach) = state.attach.as_ref() else {
                continue;
            };
            if !std::ptr::eq(attach.set.as_ptr(), Arc::as_ptr(&self.inner)) {
                continue;
            }
            let ahandle = attach.ahandle.clone();
            let Some((tag, item)) = state.pop_front() else {
                continue;
            };
            state.debit_set(1);
            member.depth.store(state.count, Ordering::Relaxed);
            return Some((tag, item, ahandle));
        }
        None
    }

    /// Drains the next non-empty member into `batch`, round-robin.
    ///
    /// Same traversal as [`poll`](QueueSet::poll), stopping at the first
    /// non-empty member; fairness carries over through the advancing
    /// cursor. `batch` is left untouched when every member was empty.
    pub fn poll_batch(&self, batch: &mut Batch) -> Option<(usize, H)> {
        for _ in 0..self.member_count() {
            let member = self.inner.advance_cursor()?;
            let mut state = member.lock();
            let Some(attach) = state.attach.as_ref() else {
                continue;
            };
            if !std::ptr::eq(attach.set.as_ptr(), Arc::as_ptr(&self.inner)) {
                continue;
            }
            let ahandle = attach.ahandle.clone();
            let Some((head, n)) = state.take_all() else {
                continue;
            };
            state.debit_set(n);
            member.depth.store(0, Ordering::Relaxed);
            let item_size = state.item_size;
            drop(state);
            batch.load(head, n, item_size);
            return Some((n, ahandle));
        }
        None
    }
}

impl<H> SetShared<H> {
    fn lock_members(&self) -> MutexGuard<'_, Members<H>> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Captures the member under the cursor and advances the cursor one
    /// step. Returns `None` when the set has no members.
    fn advance_cursor(&self) -> Option<Arc<QueueInner<H>>> {
        let mut members = self.lock_members();
        if members.queues.is_empty() {
            return None;
        }
        if members.cursor >= members.queues.len() {
            members.cursor = 0;
        }
        let member = Arc::clone(&members.queues[members.cursor].inner);
        members.cursor += 1;
        Some(member)
    }

    pub(crate) fn detach_inner(&self, queue: &Arc<QueueInner<H>>) {
        let mut members = self.lock_members();
        let Some(idx) = members
            .queues
            .iter()
            .position(|m| Arc::ptr_eq(&m.inner, queue))
        else {
            return;
        };
        members.queues.remove(idx);
        // Keep the cursor on the removed member's successor so fairness
        // survives detach; removal shifts the successor into `idx`.
        if members.cursor > idx {
            members.cursor -= 1;
        }
        if members.cursor >= members.queues.len() {
            members.cursor = 0;
        }
        debug_assert_cursor_bounded!(members.cursor, members.queues.len());

        let mut state = queue.lock();
        if state.attach.take().is_some() {
            let prev = self.aggregate.fetch_sub(state.count, Ordering::Relaxed);
            debug_assert_aggregate_covers!(prev, state.count);
        }
    }
}

impl<H> Default for QueueSet<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> Clone for QueueSet<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
