//! Pre-declared resource accounting for log mutations (spec.md S4.3).
//!
//! Every mutation that touches the backing store must have its cost
//! computed and reserved up front, before the mutation is attempted --
//! mirrors `m0_be_dtm0_log_credit` and its per-operation helpers
//! (`log_rec_partial_insert_credit`, `log_rec_full_insert_credit`,
//! `log_rec_del_credit`, `log_create_credit`, `log_destroy_credit`) in the
//! original BE log. A `Credit` is additive: summing the credit of two
//! operations bounds (never underestimates) the cost of doing both.
//!
//! Insert is pre-charged as the worst case of update (spec.md S4.3): the
//! `Persistent`/`Executed` shapes below are exactly as expensive whether
//! the call ends up inserting a brand new record or merging into an
//! existing one, and are chosen purely by whether this call's payload is
//! present -- never by looking at whether the record already exists,
//! which would make credit computation stateful with respect to the
//! list's current contents.

use crate::descriptor::TxDescriptor;
use crate::record::LogRecord;

/// Units of backing-store work: a count of discrete operations and an
/// upper bound on bytes touched. Bytes is a conservative estimate (the
/// serialized size of the record plus a fixed per-record overhead), not an
/// exact accounting -- same relationship the original has to its `m0_be_tx_credit`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Credit {
    pub ops: u64,
    pub bytes: u64,
}

impl Credit {
    pub const ZERO: Credit = Credit { ops: 0, bytes: 0 };

    pub fn new(ops: u64, bytes: u64) -> Self { Credit { ops, bytes } }

    pub fn add(self, other: Credit) -> Credit {
        Credit { ops: self.ops + other.ops, bytes: self.bytes + other.bytes }
    }
}

impl std::ops::Add for Credit {
    type Output = Credit;
    fn add(self, rhs: Credit) -> Credit { Credit::add(self, rhs) }
}

impl std::iter::Sum for Credit {
    fn sum<I: Iterator<Item = Credit>>(iter: I) -> Credit { iter.fold(Credit::ZERO, Credit::add) }
}

/// Fixed bookkeeping overhead charged per physical record regardless of
/// descriptor size (header, the VecDeque slot, allocator metadata).
const RECORD_OVERHEAD_BYTES: u64 = 64;

/// Rough per-participant footprint used to size a descriptor's byte
/// credit; avoids requiring `TxDescriptor` to carry an exact wire encoder
/// just to answer "how big is this roughly going to be".
const PARTICIPANT_BYTES: u64 = 24;

fn descriptor_bytes(desc: &TxDescriptor) -> u64 {
    RECORD_OVERHEAD_BYTES + desc.participants.len() as u64 * PARTICIPANT_BYTES
}

/// `log_create_credit`: one allocation for the log header itself.
pub fn create_credit() -> Credit { Credit::new(1, RECORD_OVERHEAD_BYTES) }

/// `log_rec_partial_insert_credit`: the cost of an upsert carrying no
/// payload -- record, participant array, and list linkage, but no
/// payload buffer.
pub fn persistent_credit(desc: &TxDescriptor) -> Credit { Credit::new(1, descriptor_bytes(desc)) }

/// `log_rec_full_insert_credit`: `persistent_credit` plus the payload
/// buffer this call is attaching.
pub fn executed_credit(desc: &TxDescriptor, payload_bytes: u64) -> Credit {
    persistent_credit(desc) + Credit::new(1, payload_bytes)
}

/// `log_rec_del_credit`: freeing one record, including whatever payload
/// it had attached.
pub fn prune_credit(record: &LogRecord) -> Credit {
    Credit::new(1, descriptor_bytes(&record.descriptor) + record.payload().len() as u64)
}

/// `log_destroy_credit`. The original leaves this a `TODO` ("charge for
/// contained records") and instead only charges for the header; here we
/// resolve that by actually summing the per-record free cost of every
/// record still present, since `destroy` genuinely does free every one of
/// them (SPEC_FULL.md S.7 decision).
pub fn destroy_credit(records: &[LogRecord]) -> Credit {
    let freed: Credit = records.iter().map(prune_credit).sum();
    Credit::new(1, RECORD_OVERHEAD_BYTES) + freed
}

/// Mirrors the original's `M0_DTML_*` dispatcher. `Redo` is intentionally
/// absent: the original's switch has a corresponding case that is
/// unreachable in practice (SPEC_FULL.md S.7), and carrying dead variants
/// forward would just be inherited dead code.
#[derive(Clone, Debug)]
pub enum CreditOp<'a> {
    Create,
    Destroy { records: &'a [LogRecord] },
    Persistent { descriptor: &'a TxDescriptor },
    Executed { descriptor: &'a TxDescriptor, payload_bytes: u64 },
    Prune { record: &'a LogRecord },
}

pub fn credit_for(op: &CreditOp<'_>) -> Credit {
    match op {
        CreditOp::Create => create_credit(),
        CreditOp::Destroy { records } => destroy_credit(records),
        CreditOp::Persistent { descriptor } => persistent_credit(descriptor),
        CreditOp::Executed { descriptor, payload_bytes } => executed_credit(descriptor, *payload_bytes),
        CreditOp::Prune { record } => prune_credit(record),
    }
}
