//! Per-field resolution.
//!
//! The dispatcher decides *which* fields an operation touches; a
//! [`FieldMergeOracle`] decides what happens to each of them. Implementations
//! must be deterministic functions of their inputs: no clocks, no local
//! randomness, nothing a replica does not share with every other replica.
//! They are also pure: results are returned, and the dispatcher commits them
//! once every field has been resolved.

#[cfg(test)]
#[path = "tests/oracle.rs"]
mod tests;

use std::sync::Arc;

use crate::comparator::{self, Winner};
use crate::error::MergeError;
use crate::rmd::FieldTimestamps;
use crate::state::{StatusSummary, UpdateResultStatus};
use crate::value::{FieldValue, Record};

/// Resolved state of one field after a put.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldResolution {
    /// Value the field should hold. Only meaningful when the field was
    /// updated; a cleared field that won reads back as [`FieldValue::Null`].
    pub value: FieldValue,
    /// Timestamp the field should carry.
    pub timestamp: u64,
    /// What happened to the field.
    pub status: UpdateResultStatus,
}

/// Resolved state of a record after a delete.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecordDeletion {
    /// Value with every deleted field reset; `None` if there was no value.
    pub value: Option<Record>,
    /// Field timestamps after the delete.
    pub timestamps: FieldTimestamps,
    /// Aggregate outcome over all fields.
    pub status: UpdateResultStatus,
}

/// Per-field conflict resolution used on per-field RMDs.
pub trait FieldMergeOracle {
    /// Resolves a put of `incoming` onto one field.
    ///
    /// `current` is `None` when the field was last cleared by a delete.
    ///
    /// # Errors
    ///
    /// Implementation-specific; the shipped oracle never fails.
    fn put_on_field(
        &self,
        current: Option<&FieldValue>,
        current_timestamp: u64,
        incoming: &FieldValue,
        incoming_timestamp: u64,
        region_id: i32,
    ) -> Result<FieldResolution, MergeError>;

    /// Resolves a delete of the whole record.
    ///
    /// # Errors
    ///
    /// Implementation-specific; the shipped oracle never fails.
    fn delete_record(
        &self,
        value: Option<&Record>,
        timestamps: &FieldTimestamps,
        delete_timestamp: u64,
        region_id: i32,
    ) -> Result<RecordDeletion, MergeError>;
}

/// Last-writer-wins on every scalar or record field.
///
/// - Put: the newer timestamp wins; on a tie the content comparator decides,
///   a cleared field counting as greater than any value.
/// - Delete: every field stamped at or before the delete is reset to its
///   default and marked cleared.
#[derive(Clone, Copy, Debug, Default)]
pub struct PerFieldLww;

impl FieldMergeOracle for PerFieldLww {
    fn put_on_field(
        &self,
        current: Option<&FieldValue>,
        current_timestamp: u64,
        incoming: &FieldValue,
        incoming_timestamp: u64,
        _region_id: i32,
    ) -> Result<FieldResolution, MergeError> {
        let winner = comparator::resolve(current_timestamp, incoming_timestamp, || {
            comparator::compare_field_slots(Some(incoming), current)
        });

        Ok(match winner {
            Winner::Incoming => FieldResolution {
                value: incoming.clone(),
                timestamp: incoming_timestamp,
                status: UpdateResultStatus::CompletelyUpdated,
            },
            Winner::Current => FieldResolution {
                value: current.cloned().unwrap_or(FieldValue::Null),
                timestamp: current_timestamp,
                status: UpdateResultStatus::NotUpdatedAtAll,
            },
        })
    }

    fn delete_record(
        &self,
        value: Option<&Record>,
        timestamps: &FieldTimestamps,
        delete_timestamp: u64,
        _region_id: i32,
    ) -> Result<RecordDeletion, MergeError> {
        let mut next_value = value.cloned();
        let mut next_timestamps = timestamps.clone();
        let mut summary = StatusSummary::default();

        for (name, field_timestamp) in timestamps.iter() {
            let current = if timestamps.is_cleared(name) {
                None
            } else {
                value.and_then(|record| record.get(name))
            };
            let winner = comparator::resolve(field_timestamp, delete_timestamp, || {
                comparator::compare_field_slots(None, current)
            });

            if winner == Winner::Current {
                summary.record(UpdateResultStatus::NotUpdatedAtAll);
                continue;
            }

            next_timestamps.set_cleared(name, delete_timestamp);
            if let Some(record) = next_value.as_mut() {
                let schema = Arc::clone(record.schema());
                if let (Some(index), Some(field)) = (schema.position(name), schema.field(name)) {
                    record.set_unchecked(index, field.default_value().clone());
                }
            }
            summary.record(UpdateResultStatus::CompletelyUpdated);
        }

        Ok(RecordDeletion {
            value: next_value,
            timestamps: next_timestamps,
            status: summary.status(),
        })
    }
}
