//! Deterministic tie-break for writes carrying equal timestamps.
//!
//! The higher timestamp always wins. When timestamps are equal, the winner is
//! picked from the content of the two candidates, never from the source
//! offset or the region, since only the content is seen identically by every
//! replica observing the tie.
//!
//! Content order is the lexicographic order of the canonical (borsh) bytes of
//! the candidates. An absent value, i.e. a delete, orders above every present
//! value, so deletes win ties. The order is total and antisymmetric, which is
//! what makes replicas converge whichever side of the tie they hold.

#[cfg(test)]
#[path = "tests/comparator.rs"]
mod tests;

use core::cmp::Ordering;

use crate::value::{FieldValue, Record};

/// Which side of a conflict survives.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Winner {
    /// The incoming write replaces the current state.
    Incoming,
    /// The current state is kept; the incoming write carries no news.
    Current,
}

/// Orders two records by content. `None` stands for a deleted record.
#[must_use]
pub fn compare_records(a: Option<&Record>, b: Option<&Record>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(left), Some(right)) => left.to_bytes().cmp(&right.to_bytes()),
    }
}

/// Orders two field values by content.
#[must_use]
pub fn compare_fields(a: &FieldValue, b: &FieldValue) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    a.to_bytes().cmp(&b.to_bytes())
}

/// Orders two field slots by content. `None` stands for a field cleared by a
/// delete.
#[must_use]
pub fn compare_field_slots(a: Option<&FieldValue>, b: Option<&FieldValue>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(left), Some(right)) => compare_fields(left, right),
    }
}

/// Last-writer-wins decision.
///
/// `tie_break` is only consulted on equal timestamps and must order the
/// incoming candidate against the current one. The incoming side wins a tie
/// only when it orders strictly greater; identical content keeps the current
/// state.
pub fn resolve<F>(current_timestamp: u64, incoming_timestamp: u64, tie_break: F) -> Winner
where
    F: FnOnce() -> Ordering,
{
    match incoming_timestamp.cmp(&current_timestamp) {
        Ordering::Greater => Winner::Incoming,
        Ordering::Less => Winner::Current,
        Ordering::Equal => match tie_break() {
            Ordering::Greater => Winner::Incoming,
            Ordering::Equal | Ordering::Less => Winner::Current,
        },
    }
}
