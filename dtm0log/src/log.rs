//! The log facade: volatile and persistent modes behind one type
//! (spec.md S3, S5).

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::clock::{tid_invariant, ClockSource, Tid, TidOrdering};
use crate::credit::{credit_for, Credit, CreditOp};
use crate::descriptor::TxDescriptor;
use crate::error::LogError;
use crate::iter::LogIter;
use crate::list::RecordList;
use crate::record::LogRecord;
use crate::segment::{Addr, BackingTx, Segment};

/// Ambient configuration. Carries only a tracing target today; kept as a
/// struct (rather than a bare `&str`) so future knobs -- a record-count
/// soft limit, say -- don't force a signature change at every call site.
#[derive(Clone, Debug)]
pub struct LogConfig {
    pub trace_target: &'static str,
}

impl Default for LogConfig {
    fn default() -> Self { LogConfig { trace_target: "dtm0log" } }
}

/// The segment addresses backing one persisted record. `record` covers the
/// descriptor/participant-array allocation made at insert time and never
/// moves afterward; `payload` is `None` until (and unless) a payload buffer
/// is attached, at which point it gets its own allocation -- spec.md S4.4's
/// merge-in-place path never reallocates the record itself, only
/// re-captures it, so the two addresses have independent lifetimes.
struct RecordAddrs {
    record: Addr,
    payload: Option<Addr>,
}

struct PersistentState {
    records: RecordList,
    addrs: HashMap<Tid, RecordAddrs>,
    segment: Box<dyn Segment + Send>,
}

enum LogBody {
    Volatile(RecordList),
    Persistent(PersistentState),
}

impl LogBody {
    fn records(&self) -> &RecordList {
        match self {
            LogBody::Volatile(r) => r,
            LogBody::Persistent(p) => &p.records,
        }
    }

    fn records_mut(&mut self) -> &mut RecordList {
        match self {
            LogBody::Volatile(r) => r,
            LogBody::Persistent(p) => &mut p.records,
        }
    }

    fn is_persistent(&self) -> bool { matches!(self, LogBody::Persistent(_)) }
}

/// An ordered, deduplicating log of transaction descriptors, in either
/// volatile (in-memory only) or persistent (segment-backed) mode. The
/// clock is borrowed, never owned: spec.md S5 requires the clock to
/// outlive the log, which the `'c` lifetime enforces at compile time.
pub struct Log<'c> {
    clock: &'c dyn ClockSource,
    config: LogConfig,
    body: Mutex<LogBody>,
}

impl<'c> Log<'c> {
    pub fn new_volatile(clock: &'c dyn ClockSource) -> Self { Self::new_volatile_with(clock, LogConfig::default()) }

    pub fn new_volatile_with(clock: &'c dyn ClockSource, config: LogConfig) -> Self {
        Log { clock, config, body: Mutex::new(LogBody::Volatile(RecordList::new())) }
    }

    /// `m0_be_dtm0_log_create`: brings a persistent log into existence
    /// over `segment`. Charges [`crate::credit::create_credit`] against
    /// `tx`, same shape as the original allocating the log header before
    /// any record exists.
    pub fn create_persistent(
        clock: &'c dyn ClockSource,
        segment: Box<dyn Segment + Send>,
        tx: &mut dyn BackingTx,
    ) -> Result<Self, LogError> {
        Self::create_persistent_with(clock, segment, tx, LogConfig::default())
    }

    pub fn create_persistent_with(
        clock: &'c dyn ClockSource,
        mut segment: Box<dyn Segment + Send>,
        tx: &mut dyn BackingTx,
        config: LogConfig,
    ) -> Result<Self, LogError> {
        let credit = credit_for(&CreditOp::Create);
        let addr = segment.alloc(credit.bytes)?;
        tx.capture(addr, credit);
        let body = LogBody::Persistent(PersistentState { records: RecordList::new(), addrs: HashMap::new(), segment });
        Ok(Log { clock, config, body: Mutex::new(body) })
    }

    /// `tid_cmp`: the clock-order comparator this log was bound to at
    /// construction (spec.md S4.1). Exposed so callers outside the log --
    /// the transaction engine deciding how to order a TID it hasn't
    /// inserted yet, say -- can compare against the same total order the
    /// log itself uses, without reaching into a second clock instance.
    pub fn tid_cmp(&self, a: Tid, b: Tid) -> TidOrdering { self.clock.cmp(&a, &b) }

    pub fn lock(&self) -> LogGuard<'_, 'c> {
        LogGuard { log: self, body: self.body.lock().expect("dtm0log mutex poisoned") }
    }

    /// `m0_be_dtm0_log_clear`: wipes every record from a volatile log.
    /// Precondition (spec.md S4.7): every record must already be fully
    /// PERSISTENT -- a client clears its local log only after remote
    /// durability has been confirmed, so clearing past a record some
    /// participant hasn't finished is the same protocol violation `prune`
    /// rejects. Acquires and releases the lock internally: unlike every
    /// other mutating operation, `clear` is a whole-list operation with a
    /// simple enough contract that it doesn't need a [`LogGuard`].
    ///
    /// Calling this on a persistent log is a caller bug -- persistent
    /// storage must be released through [`Log::destroy_persistent`] so
    /// its segment space is actually freed, not silently dropped.
    pub fn clear(&self) -> Result<(), LogError> {
        let mut body = self.body.lock().expect("dtm0log mutex poisoned");
        match &mut *body {
            LogBody::Volatile(records) => {
                if !records.iter().all(|r| r.is_fully_persistent()) {
                    return Err(LogError::protocol_violation(
                        "clear requires every record to be fully persistent",
                    ));
                }
                let cleared = records.len();
                *records = RecordList::new();
                debug!(target: self.config.trace_target, cleared, "log cleared");
                Ok(())
            }
            LogBody::Persistent(_) => panic!("clear() is volatile-only; use destroy_persistent for persistent logs"),
        }
    }

    /// `m0_be_dtm0_log_destroy`: frees every remaining record and the log
    /// header itself. Charges [`crate::credit::destroy_credit`], which
    /// (unlike the original's `TODO`) accounts for every record still
    /// present, not just the header.
    pub fn destroy_persistent(self, tx: &mut dyn BackingTx) -> Result<(), LogError> {
        let mut body = self.body.into_inner().expect("dtm0log mutex poisoned");
        match &mut body {
            LogBody::Persistent(state) => {
                let records: Vec<LogRecord> = std::mem::take(&mut state.records).into_inner().into_iter().collect();
                let credit = credit_for(&CreditOp::Destroy { records: &records });
                for record in &records {
                    if let Some(addrs) = state.addrs.remove(&record.id()) {
                        state.segment.free(addrs.record);
                        if let Some(payload_addr) = addrs.payload {
                            state.segment.free(payload_addr);
                        }
                    }
                }
                tx.capture(Addr(0), credit);
                Ok(())
            }
            LogBody::Volatile(_) => panic!("destroy_persistent() called on a volatile log"),
        }
    }
}

/// Exclusive access to the log's body, held for the duration of every
/// mutating or read-consistent operation. All such operations are
/// methods on `LogGuard` rather than on `Log` itself: holding one is a
/// compile-time proof the mutex is locked, replacing the original's
/// `M0_PRE(m0_mutex_is_locked(...))` runtime assertion with a type the
/// caller simply cannot avoid acquiring first.
pub struct LogGuard<'g, 'c> {
    log: &'g Log<'c>,
    body: MutexGuard<'g, LogBody>,
}

impl<'g, 'c> LogGuard<'g, 'c> {
    pub fn len(&self) -> usize { self.body.records().len() }

    pub fn is_empty(&self) -> bool { self.body.records().is_empty() }

    /// `m0_be_dtm0_log_find`.
    pub fn find(&self, id: Tid) -> Option<&TxDescriptor> {
        debug_assert!(tid_invariant(&id));
        self.body.records().find(id).map(|r| &r.descriptor)
    }

    /// `m0_be_dtm0_log_update` (which dispatches to `dtm0_log__insert` for
    /// a first sighting or `dtm0_log__set` to merge into an existing
    /// record). Validates `desc`, merges or inserts, attaches `payload` if
    /// none is attached yet, and for a persistent log captures the
    /// resulting credit against `tx`.
    ///
    /// Credit is chosen by whether `payload` is empty, never by whether a
    /// record with this id already exists (spec.md S4.3: insert is
    /// pre-charged as the worst case of update, so the two calls that
    /// could merge into the same existing record -- one with a payload,
    /// one without -- must reserve different amounts regardless of what's
    /// already in the list).
    ///
    /// `tx` is required whenever the log is persistent; omitting it there
    /// is a caller bug (spec.md S6: the caller opens the backing
    /// transaction around the call), not a reportable error.
    ///
    /// Persistent-mode storage behavior follows spec.md S4.4 exactly:
    /// inserting a never-before-seen id allocates the record (participant
    /// array plus payload buffer, if any) in one shot; merging into an
    /// existing record allocates **nothing** for the record itself, only
    /// re-captures its existing address, and allocates a payload buffer
    /// only the first time one is attached (`dtm0_log__set` in the
    /// original never calls `M0_BE_ALLOC_*` on the merge path at all). A
    /// second `update` to the same `Tid` must not leak a second address.
    pub fn update(&mut self, desc: &TxDescriptor, payload: &[u8], tx: Option<&mut dyn BackingTx>) -> Result<Credit, LogError> {
        desc.validate()?;
        debug_assert!(tid_invariant(&desc.id));

        let credit = if payload.is_empty() {
            credit_for(&CreditOp::Persistent { descriptor: desc })
        } else {
            credit_for(&CreditOp::Executed { descriptor: desc, payload_bytes: payload.len() as u64 })
        };

        // Determine the shape of this call -- insert, or merge with/without
        // a newly-attaching payload -- without mutating anything yet. A
        // merge that would regress a participant's state is rejected here
        // (via a dry-run apply on a clone), before any segment storage is
        // touched or the list is mutated.
        let merge_shape = match self.body.records().find(desc.id) {
            Some(record) => {
                let mut trial = record.descriptor.clone();
                trial.apply(desc)?;
                Some(record.payload().is_empty() && !payload.is_empty())
            }
            None => None,
        };

        let mut tx = tx;
        if let LogBody::Persistent(state) = &mut *self.body {
            debug_assert!(tx.is_some(), "persistent log mutation requires a backing transaction");
            match merge_shape {
                None => {
                    let addr = state.segment.alloc(credit.bytes)?;
                    state.addrs.insert(desc.id, RecordAddrs { record: addr, payload: None });
                    if let Some(tx) = tx.as_deref_mut() {
                        tx.capture(addr, credit);
                    }
                }
                Some(newly_attaching_payload) => {
                    let record_addr = state
                        .addrs
                        .get(&desc.id)
                        .expect("every tracked record has an address")
                        .record;
                    let recapture = credit_for(&CreditOp::Persistent { descriptor: desc });
                    if let Some(tx) = tx.as_deref_mut() {
                        tx.capture(record_addr, recapture);
                    }
                    if newly_attaching_payload {
                        let payload_credit = Credit::new(1, payload.len() as u64);
                        let payload_addr = state.segment.alloc(payload_credit.bytes)?;
                        state
                            .addrs
                            .get_mut(&desc.id)
                            .expect("just read above")
                            .payload = Some(payload_addr);
                        if let Some(tx) = tx.as_deref_mut() {
                            tx.capture(payload_addr, payload_credit);
                        }
                    }
                }
            }
        }

        match self.body.records_mut().find_mut(desc.id) {
            Some(record) => {
                record.descriptor.apply(desc).expect("merge already validated above");
                record.attach_payload_if_absent(payload);
            }
            None => self.body.records_mut().push_tail(LogRecord::new(desc.clone(), payload.to_vec())),
        }

        debug!(target: self.log.config.trace_target, id = ?desc.id, ops = credit.ops, "log record updated");
        Ok(credit)
    }

    /// `m0_be_dtm0_plog_can_prune`: true iff `id` names a record and every
    /// record from the head through it (inclusive) is fully PERSISTENT.
    pub fn can_prune(&self, id: Tid) -> bool {
        let mut discard = Credit::ZERO;
        self.can_prune_with_credit(id, &mut discard)
    }

    /// `plog_can_prune(log, id, &credits) -> bool` (spec.md S4.6): the
    /// non-mutating half of a persistent prune. Walks the prefix exactly
    /// as `can_prune` does, but also accumulates
    /// [`crate::credit::prune_credit`] for every record that would be
    /// removed into `credits` -- so a caller can size the backing
    /// transaction's credit bucket *before* calling `prune`, rather than
    /// discovering the cost only as a side effect of the mutation itself.
    /// Returns the same boolean `can_prune` does; `credits` is left
    /// untouched (not zeroed) when this returns `false`, so callers that
    /// accumulate across several prefixes can keep adding to one bucket.
    pub fn can_prune_with_credit(&self, id: Tid, credits: &mut Credit) -> bool {
        let records = self.body.records();
        let mut accumulated = Credit::ZERO;
        let mut found = false;
        for record in records.iter() {
            if !record.is_fully_persistent() {
                return false;
            }
            accumulated = accumulated + credit_for(&CreditOp::Prune { record });
            if record.id() == id {
                found = true;
                break;
            }
        }
        if found {
            *credits = *credits + accumulated;
        }
        found
    }

    /// `m0_be_dtm0_plog_prune` / `m0_be_dtm0_log_prune`: consumes the
    /// contiguous prefix ending at `id`. Returns [`LogError::NotFound`] if
    /// `id` is absent, [`LogError::ProtocolViolation`] if some record in
    /// the prefix is not yet fully PERSISTENT -- pruning past an
    /// in-flight transaction would silently lose its state.
    pub fn prune(&mut self, id: Tid, tx: Option<&mut dyn BackingTx>) -> Result<Credit, LogError> {
        if self.body.records().find(id).is_none() {
            return Err(LogError::NotFound);
        }
        if !self.can_prune(id) {
            return Err(LogError::protocol_violation("prune target follows a non-persistent record"));
        }

        let mut removed = Vec::new();
        loop {
            let record = self.body.records_mut().pop_head().expect("prefix verified by can_prune");
            let was_target = record.id() == id;
            removed.push(record);
            if was_target {
                break;
            }
        }

        let credit: Credit = removed.iter().map(|r| credit_for(&CreditOp::Prune { record: r })).sum();

        if let LogBody::Persistent(state) = &mut *self.body {
            let mut tx = tx;
            for record in &removed {
                let record_credit = credit_for(&CreditOp::Prune { record });
                if let Some(addrs) = state.addrs.remove(&record.id()) {
                    state.segment.free(addrs.record);
                    if let Some(payload_addr) = addrs.payload {
                        state.segment.free(payload_addr);
                    }
                    if let Some(tx) = tx.as_deref_mut() {
                        tx.capture(addrs.record, record_credit);
                    }
                }
            }
        }

        debug!(target: self.log.config.trace_target, id = ?id, pruned = removed.len(), "prefix pruned");
        Ok(credit)
    }

    /// `m0_be_dtm0_volatile_log_insert`: places an already-prepared
    /// record directly into the list, bypassing the merge/credit path in
    /// [`LogGuard::update`]. Volatile-mode-only escape hatch -- a caller
    /// that already owns a fully formed record (e.g. replaying from
    /// another log) and does not need per-mutation credit accounting.
    pub fn insert_prepared(&mut self, record: LogRecord) {
        debug_assert!(!self.body.is_persistent(), "insert_prepared is a volatile-mode escape hatch");
        self.body.records_mut().push_tail(record);
    }

    /// `m0_be_dtm0_volatile_log_del`: removes a record by id from
    /// anywhere in the list, bypassing the prefix-only rule `prune`
    /// enforces.
    pub fn remove_prepared(&mut self, id: Tid) -> Option<LogRecord> {
        debug_assert!(!self.body.is_persistent(), "remove_prepared is a volatile-mode escape hatch");
        self.body.records_mut().remove(id)
    }

    /// `m0_be_dtm0_log_iter_init` / `_next`: an iterator over every record
    /// in insertion order (spec.md S5: not TID order), starting from the
    /// sentinel before the first. Borrows `self` immutably, so the borrow
    /// checker -- not a runtime assertion -- rules out mutation of the log
    /// while iterating.
    pub fn iter(&self) -> LogIter<'_> { LogIter::new(self.body.records()) }
}
