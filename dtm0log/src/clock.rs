//! Transaction ids and the external clock-order capability.
//!
//! A [`Tid`] is an opaque, structured identity. Its total order is not a
//! property of the bytes alone -- spec.md treats the comparator as an
//! externally supplied capability (`ClockSource`) because in a real DTM0
//! deployment the order two ids compare in can depend on synchronization
//! state the log itself has no business knowing about. `Tid` only carries
//! enough structure (a physical timestamp, an originating node, and a
//! per-node event counter) for a default, synchronization-free clock to be
//! useful in tests and for single-process callers that don't have a fancier
//! clock source of their own.

use serde::{Deserialize, Serialize};

/// Totally ordered result of comparing two [`Tid`]s under a [`ClockSource`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TidOrdering {
    Lt,
    Eq,
    Gt,
}

impl From<core::cmp::Ordering> for TidOrdering {
    fn from(o: core::cmp::Ordering) -> Self {
        match o {
            core::cmp::Ordering::Less => TidOrdering::Lt,
            core::cmp::Ordering::Equal => TidOrdering::Eq,
            core::cmp::Ordering::Greater => TidOrdering::Gt,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Tid {
    phys: u64,
    node: u64,
    event: u64,
}

impl Tid {
    /// The reserved "before the first record" sentinel: conventionally the
    /// max-physical-timestamp value (mirrors `dtm0_log_iter_tid0` in the
    /// original BE log, which sets `dti_ts.dts_phys = ~0`). Never a legal
    /// record id; `tid_invariant` rejects it.
    pub const ITER_ZERO: Tid = Tid { phys: u64::MAX, node: 0, event: 0 };

    pub fn new(phys: u64, node: u64, event: u64) -> Self { Tid { phys, node, event } }

    pub fn is_sentinel(&self) -> bool { self.phys == u64::MAX }
}

/// Rejects the iter-zero sentinel and any other structurally malformed id.
/// A failing `tid_invariant` is a programming error at the call site (a
/// caller handed the log a `Tid` it never should have constructed), not a
/// recoverable `LogError`.
pub fn tid_invariant(t: &Tid) -> bool { !t.is_sentinel() }

/// A comparator over `Tid`s, total and stable across the lifetime of the
/// log that borrows it (spec.md S5: "the log borrows the clock; lifetime of
/// clock >= lifetime of log; never owned").
pub trait ClockSource {
    fn cmp(&self, a: &Tid, b: &Tid) -> TidOrdering;
}

/// A synchronization-free clock that simply orders `Tid`s by their fields
/// lexicographically (timestamp, then node, then event counter). Adequate
/// as the default clock for a single process and for tests; a real
/// deployment with actual clock skew across nodes would supply its own
/// `ClockSource`.
#[derive(Clone, Copy, Debug, Default)]
pub struct PhysicalClock;

impl ClockSource for PhysicalClock {
    fn cmp(&self, a: &Tid, b: &Tid) -> TidOrdering { (a.phys, a.node, a.event).cmp(&(b.phys, b.node, b.event)).into() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn iter_zero_is_rejected() {
        assert!(!tid_invariant(&Tid::ITER_ZERO));
        assert!(tid_invariant(&Tid::new(1, 0, 0)));
    }

    #[test]
    fn physical_clock_orders_by_timestamp_then_node_then_event() {
        let clock = PhysicalClock;
        let a = Tid::new(1, 0, 0);
        let b = Tid::new(2, 0, 0);
        assert_eq!(clock.cmp(&a, &b), TidOrdering::Lt);
        assert_eq!(clock.cmp(&b, &a), TidOrdering::Gt);
        assert_eq!(clock.cmp(&a, &a), TidOrdering::Eq);

        let c = Tid::new(1, 1, 0);
        assert_eq!(clock.cmp(&a, &c), TidOrdering::Lt);
    }
}
