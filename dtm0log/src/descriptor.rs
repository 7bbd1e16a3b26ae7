//! Transaction descriptors and the monotone participant-state merge
//! (spec.md S4.1).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::clock::Tid;
use crate::error::LogError;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct ParticipantId(pub u64);

/// States advance monotonically per participant; declaration order is the
/// monotonic order (`IN_PROGRESS < EXECUTED < PERSISTENT`), so `derive(Ord)`
/// gives us the spec's ordering for free.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum ParticipantState {
    InProgress,
    Executed,
    Persistent,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub state: ParticipantState,
}

/// `{id, participants}`. Invariant: the participant list is non-empty and
/// participant ids are unique (checked by `validate`, not by construction --
/// descriptors often arrive pre-built from wire decoding in the real
/// system, so validation has to be a callable step, not a type-level
/// guarantee).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TxDescriptor {
    pub id: Tid,
    pub participants: Vec<Participant>,
}

impl TxDescriptor {
    pub fn new(id: Tid, participants: Vec<Participant>) -> Self { TxDescriptor { id, participants } }

    pub fn validate(&self) -> Result<(), LogError> {
        if self.participants.is_empty() {
            return Err(LogError::protocol_violation("transaction descriptor has no participants"));
        }
        let mut seen = BTreeSet::new();
        for p in &self.participants {
            if !seen.insert(p.id) {
                return Err(LogError::protocol_violation("duplicate participant id in descriptor"));
            }
        }
        Ok(())
    }

    fn participant_mut(&mut self, id: ParticipantId) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.id == id)
    }

    /// Merges `src` into `self`: for each participant present in both,
    /// advances `self`'s state to `src`'s (never regresses -- a `src` state
    /// strictly behind what we already hold is the protocol violation
    /// spec.md S4.1 calls out, reported rather than silently absorbed).
    /// Participants present only in `src` are added. Idempotent and
    /// commutative over repeated observations of one `Tid`, same as the
    /// BE-side `m0_dtm0_tx_desc_apply`.
    ///
    /// Precondition: `self.id == src.id`. Violating this is a caller bug,
    /// not a `LogError`.
    pub fn apply(&mut self, src: &TxDescriptor) -> Result<(), LogError> {
        debug_assert_eq!(self.id, src.id, "desc_apply requires matching transaction ids");

        // Validate every participant before committing any of them --
        // a regression discovered halfway through must leave `self`
        // untouched, not half-merged.
        for incoming in &src.participants {
            if let Some(existing) = self.participants.iter().find(|p| p.id == incoming.id) {
                if incoming.state < existing.state {
                    return Err(LogError::protocol_violation(format!(
                        "participant {:?} regressed from {:?} to {:?}",
                        incoming.id, existing.state, incoming.state
                    )));
                }
            }
        }

        for incoming in &src.participants {
            match self.participant_mut(incoming.id) {
                Some(existing) => existing.state = incoming.state,
                None => self.participants.push(*incoming),
            }
        }
        Ok(())
    }

    /// `desc_state_eq`: true iff every participant is in state `state`.
    pub fn all_in_state(&self, state: ParticipantState) -> bool {
        self.participants.iter().all(|p| p.state == state)
    }
}
