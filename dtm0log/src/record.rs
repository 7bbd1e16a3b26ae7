//! The physical unit stored in the log (spec.md S3, S4.2).

use crate::clock::Tid;
use crate::descriptor::{ParticipantState, TxDescriptor};

/// One transaction's descriptor, plus its opaque payload (the serialized
/// request body, possibly never attached). Deliberately does not carry a
/// raw link field the way the original `dtm0_log_rec`/`dtm0_plog_rec`
/// does -- the shared container (`list.rs`) keys lookups and walks on
/// [`LogRecord::id`] instead of on node identity, so no intrusive pointer
/// is needed.
#[derive(Clone, Debug, PartialEq)]
pub struct LogRecord {
    pub descriptor: TxDescriptor,
    payload: Vec<u8>,
}

impl LogRecord {
    pub fn new(descriptor: TxDescriptor, payload: Vec<u8>) -> Self { LogRecord { descriptor, payload } }

    pub fn id(&self) -> Tid { self.descriptor.id }

    pub fn payload(&self) -> &[u8] { &self.payload }

    /// Attaches `payload` if (and only if) none is attached yet -- a
    /// payload, once non-empty, is immutable (spec.md S3: "payload attach
    /// is one-shot -- never overwritten"). A caller handing in a payload
    /// for an already-attached record is silently ignored, matching
    /// `dtm0_log__set`'s "attach payload to log if it is not attached".
    pub fn attach_payload_if_absent(&mut self, payload: &[u8]) {
        if self.payload.is_empty() && !payload.is_empty() {
            self.payload = payload.to_vec();
        }
    }

    /// True once every participant has reached PERSISTENT -- the condition
    /// `m0_be_dtm0_plog_can_prune` checks per-record before allowing a
    /// prefix prune to consume it.
    pub fn is_fully_persistent(&self) -> bool { self.descriptor.all_in_state(ParticipantState::Persistent) }
}
