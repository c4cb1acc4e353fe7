//! Replication checkpoint vector.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// Highest source offset merged so far, per source broker.
///
/// Indexed by broker id. Slots only ever grow, and the vector only ever gets
/// longer: a broker id not seen before extends it with zeroes.
#[derive(
    BorshDeserialize, BorshSerialize, Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize,
)]
pub struct CheckpointVector(
    /// Highest merged offset, indexed by broker id.
    Vec<u64>,
);

/// Outcome of [`CheckpointVector::advance`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum CheckpointAdvance {
    /// The write carried no usable broker id; the vector is untouched.
    Unattributed,
    /// The slot moved forward from `previous`.
    Advanced {
        /// Slot value before the call.
        previous: u64,
    },
    /// The offset was already covered by the slot, which stays at `covered`.
    Redelivered {
        /// Slot value, at or beyond the incoming offset.
        covered: u64,
    },
}

impl CheckpointVector {
    /// An empty vector.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// A vector with the given slots.
    #[must_use]
    pub const fn from_offsets(offsets: Vec<u64>) -> Self {
        Self(offsets)
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no broker has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Slots, indexed by broker id.
    #[must_use]
    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }

    /// Highest offset recorded for `broker_id`, if it has a slot.
    #[must_use]
    pub fn offset_for(&self, broker_id: i32) -> Option<u64> {
        usize::try_from(broker_id)
            .ok()
            .and_then(|index| self.0.get(index).copied())
    }

    /// Whether `offset` from `broker_id` has already been merged.
    #[must_use]
    pub fn covers(&self, offset: u64, broker_id: i32) -> bool {
        self.offset_for(broker_id)
            .is_some_and(|recorded| recorded >= offset)
    }

    /// Records that `offset` from `broker_id` has been merged.
    ///
    /// A negative broker id means the origin of the write is unknown, in which
    /// case nothing is recorded. Otherwise the slot becomes the larger of its
    /// current value and `offset`.
    pub fn advance(&mut self, offset: u64, broker_id: i32) -> CheckpointAdvance {
        let Ok(index) = usize::try_from(broker_id) else {
            return CheckpointAdvance::Unattributed;
        };

        let extended = index >= self.0.len();
        if extended {
            self.0.resize(index.saturating_add(1), 0);
        }

        let Some(slot) = self.0.get_mut(index) else {
            return CheckpointAdvance::Unattributed;
        };

        if extended || offset > *slot {
            let previous = *slot;
            *slot = offset.max(previous);
            CheckpointAdvance::Advanced { previous }
        } else {
            CheckpointAdvance::Redelivered { covered: *slot }
        }
    }
}

impl From<Vec<u64>> for CheckpointVector {
    fn from(offsets: Vec<u64>) -> Self {
        Self(offsets)
    }
}
