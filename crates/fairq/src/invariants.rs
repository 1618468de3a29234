//! Debug assertion macros for queue and queue-set invariants.
//!
//! Active only in debug builds; release builds compile them away. Each
//! macro states one structural property the mutation paths must preserve.

/// Assert that the empty markers agree: no head node, a null tail pointer
/// and a zero count must all coincide.
///
/// Used in: `push_back()` / `pop_front()` before touching the links.
macro_rules! debug_assert_links_consistent {
    ($head_none:expr, $tail_null:expr, $count:expr) => {
        debug_assert!(
            $head_none == $tail_null && $head_none == ($count == 0),
            "queue links out of sync: head_none={} tail_null={} count={}",
            $head_none,
            $tail_null,
            $count
        )
    };
}

/// Assert the round-robin cursor stays inside the member list (or the list
/// is empty).
///
/// Used in: `detach_inner()` after cursor repair.
macro_rules! debug_assert_cursor_bounded {
    ($cursor:expr, $len:expr) => {
        debug_assert!(
            $len == 0 || $cursor < $len,
            "round-robin cursor {} outside member list of {}",
            $cursor,
            $len
        )
    };
}

/// Assert an aggregate decrement was covered by the counter's prior value.
/// The aggregate equals the sum of member counts at quiescence, so a
/// subtraction can never underflow unless the accounting drifted.
///
/// Used in: every `fetch_sub` on a set's aggregate count.
macro_rules! debug_assert_aggregate_covers {
    ($prev:expr, $n:expr) => {
        debug_assert!(
            $prev >= $n,
            "aggregate depth underflow: subtracting {} from {}",
            $n,
            $prev
        )
    };
}

pub(crate) use debug_assert_aggregate_covers;
pub(crate) use debug_assert_cursor_bounded;
pub(crate) use debug_assert_links_consistent;
