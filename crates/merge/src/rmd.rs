//! Replication metadata (RMD).
//!
//! Every stored value carries an RMD record next to it. The RMD holds the
//! write timestamp(s) used for last-writer-wins resolution and the
//! [`CheckpointVector`] of source offsets already merged.
//!
//! The timestamp comes in exactly one of two shapes for the whole lifetime of
//! a key:
//!
//! - [`RmdTimestamp::ValueLevel`]: one timestamp covering the whole record,
//!   plus whether that write was a delete.
//! - [`RmdTimestamp::PerField`]: one timestamp per top-level field, so that
//!   concurrent writes to different fields both survive.
//!
//! The shape is a variant of a typed enum, fixed when the RMD is built.
//! [`RmdTimestampType`] is only ever derived from it.

#[cfg(test)]
#[path = "tests/rmd.rs"]
mod tests;

pub mod checkpoint;

use std::collections::{BTreeMap, BTreeSet};

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

pub use checkpoint::{CheckpointAdvance, CheckpointVector};

use crate::error::MergeError;
use crate::schema::Schema;

/// Classification of an RMD's timestamp shape.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum RmdTimestampType {
    /// A single timestamp for the whole record.
    ValueLevelTimestamp,
    /// One timestamp per top-level field.
    PerFieldTimestamp,
}

/// Per-field timestamps of a record.
#[derive(
    BorshDeserialize, BorshSerialize, Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize,
)]
pub struct FieldTimestamps {
    /// Last write timestamp of every top-level field.
    fields: BTreeMap<String, u64>,
    /// Fields whose current value was produced by a delete. A delete wins a
    /// timestamp tie against a put, so these must stay distinguishable from
    /// fields that were put with their default value.
    cleared: BTreeSet<String>,
}

impl FieldTimestamps {
    /// Every top-level field of `schema` stamped with `timestamp`.
    #[must_use]
    pub fn uniform(schema: &Schema, timestamp: u64) -> Self {
        Self {
            fields: schema
                .field_names()
                .map(|name| (name.to_owned(), timestamp))
                .collect(),
            cleared: BTreeSet::new(),
        }
    }

    /// Builds the timestamps from explicit `(field, timestamp)` pairs.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, u64)>,
        K: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(name, timestamp)| (name.into(), timestamp))
                .collect(),
            cleared: BTreeSet::new(),
        }
    }

    /// Timestamp of a field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<u64> {
        self.fields.get(field).copied()
    }

    /// Stamps a field written by a put.
    pub fn set(&mut self, field: &str, timestamp: u64) {
        _ = self.fields.insert(field.to_owned(), timestamp);
        _ = self.cleared.remove(field);
    }

    /// Stamps a field cleared by a delete.
    pub fn set_cleared(&mut self, field: &str, timestamp: u64) {
        _ = self.fields.insert(field.to_owned(), timestamp);
        _ = self.cleared.insert(field.to_owned());
    }

    /// Whether the field's current value comes from a delete.
    #[must_use]
    pub fn is_cleared(&self, field: &str) -> bool {
        self.cleared.contains(field)
    }

    /// Fields and their timestamps, ordered by field name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.fields
            .iter()
            .map(|(name, timestamp)| (name.as_str(), *timestamp))
    }

    /// Number of fields tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no field is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Highest field timestamp.
    #[must_use]
    pub fn max(&self) -> Option<u64> {
        self.fields.values().copied().max()
    }

    /// Timestamp every field was last written at, if they all share one.
    ///
    /// This is the record marker: a put that won on every field of the
    /// record, or a delete that cleared all of them, leaves every field at
    /// the timestamp of that write. It is read off the field timestamps rather than
    /// stored, so it depends only on which writes won and never on the order
    /// they arrived in.
    #[must_use]
    pub fn record_timestamp(&self) -> Option<u64> {
        let mut timestamps = self.fields.values().copied();
        let first = timestamps.next()?;
        timestamps.all(|timestamp| timestamp == first).then_some(first)
    }

    /// Whether exactly the top-level fields of `schema` are tracked.
    fn matches(&self, schema: &Schema) -> bool {
        self.fields.len() == schema.fields().len()
            && schema
                .field_names()
                .all(|name| self.fields.contains_key(name))
    }
}

/// Timestamp part of an RMD.
#[derive(BorshDeserialize, BorshSerialize, Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum RmdTimestamp {
    /// One timestamp for the whole record.
    ValueLevel {
        /// Timestamp of the write the record holds.
        timestamp: u64,
        /// Whether that write was a delete. A delete wins a timestamp tie
        /// against a put, and the caller hands a put on a deleted key a
        /// default base record, so the tombstone has to be remembered here.
        deleted: bool,
    },
    /// One timestamp per top-level field.
    PerField(FieldTimestamps),
}

/// Replication metadata of one stored value.
#[derive(BorshDeserialize, BorshSerialize, Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ReplicationMetadata {
    /// Write timestamp(s), in one of the two shapes.
    timestamp: RmdTimestamp,
    /// Source offsets already merged.
    checkpoint: CheckpointVector,
}

impl ReplicationMetadata {
    /// Value-level RMD stamped with `timestamp` and an empty checkpoint vector.
    #[must_use]
    pub const fn value_level(timestamp: u64) -> Self {
        Self {
            timestamp: RmdTimestamp::ValueLevel {
                timestamp,
                deleted: false,
            },
            checkpoint: CheckpointVector::new(),
        }
    }

    /// Per-field RMD for `schema`, every field stamped with `timestamp`.
    #[must_use]
    pub fn per_field(schema: &Schema, timestamp: u64) -> Self {
        Self {
            timestamp: RmdTimestamp::PerField(FieldTimestamps::uniform(schema, timestamp)),
            checkpoint: CheckpointVector::new(),
        }
    }

    /// RMD from explicit parts.
    #[must_use]
    pub const fn new(timestamp: RmdTimestamp, checkpoint: CheckpointVector) -> Self {
        Self {
            timestamp,
            checkpoint,
        }
    }

    /// Replaces the checkpoint vector.
    #[must_use]
    pub fn with_checkpoint(mut self, checkpoint: CheckpointVector) -> Self {
        self.checkpoint = checkpoint;
        self
    }

    /// Shape of the timestamp, derived from its variant.
    #[must_use]
    pub const fn timestamp_type(&self) -> RmdTimestampType {
        match self.timestamp {
            RmdTimestamp::ValueLevel { .. } => RmdTimestampType::ValueLevelTimestamp,
            RmdTimestamp::PerField(_) => RmdTimestampType::PerFieldTimestamp,
        }
    }

    /// Timestamp part.
    #[must_use]
    pub const fn timestamp(&self) -> &RmdTimestamp {
        &self.timestamp
    }

    /// Mutable timestamp part. The variant must not be changed.
    pub(crate) fn timestamp_mut(&mut self) -> &mut RmdTimestamp {
        &mut self.timestamp
    }

    /// Record-wide timestamp of a value-level RMD.
    #[must_use]
    pub const fn value_timestamp(&self) -> Option<u64> {
        match self.timestamp {
            RmdTimestamp::ValueLevel { timestamp, .. } => Some(timestamp),
            RmdTimestamp::PerField(_) => None,
        }
    }

    /// Whether a value-level RMD records a delete as the winning write.
    #[must_use]
    pub const fn is_value_deleted(&self) -> bool {
        matches!(self.timestamp, RmdTimestamp::ValueLevel { deleted: true, .. })
    }

    /// Field timestamps of a per-field RMD.
    #[must_use]
    pub const fn field_timestamps(&self) -> Option<&FieldTimestamps> {
        match self.timestamp {
            RmdTimestamp::ValueLevel { .. } => None,
            RmdTimestamp::PerField(ref fields) => Some(fields),
        }
    }

    /// Checkpoint vector.
    #[must_use]
    pub const fn checkpoint(&self) -> &CheckpointVector {
        &self.checkpoint
    }

    /// Mutable checkpoint vector.
    pub(crate) fn checkpoint_mut(&mut self) -> &mut CheckpointVector {
        &mut self.checkpoint
    }

    /// Checks that this RMD can describe a value of `schema`.
    ///
    /// A per-field RMD must track exactly the top-level fields of the schema;
    /// a value-level RMD fits any schema.
    ///
    /// # Errors
    ///
    /// [`MergeError::InvalidReplicationMetadataShape`] otherwise.
    pub fn validate_for(&self, schema: &Schema) -> Result<(), MergeError> {
        match self.timestamp {
            RmdTimestamp::ValueLevel { .. } => Ok(()),
            RmdTimestamp::PerField(ref fields) if fields.matches(schema) => Ok(()),
            RmdTimestamp::PerField(ref fields) => {
                Err(MergeError::InvalidReplicationMetadataShape(format!(
                    "per-field timestamps track [{}] but schema `{}` has [{}]",
                    fields.iter().map(|(name, _)| name).collect::<Vec<_>>().join(", "),
                    schema.name(),
                    schema.field_names().collect::<Vec<_>>().join(", "),
                )))
            }
        }
    }

    /// Encodes the RMD for the storage write path.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        // Writing into a Vec cannot fail.
        borsh::to_vec(self).unwrap_or_default()
    }

    /// Decodes an RMD read back from storage.
    ///
    /// # Errors
    ///
    /// [`MergeError::InvalidReplicationMetadataShape`] for anything that is not
    /// one of the two known shapes, including trailing or truncated bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MergeError> {
        borsh::from_slice(bytes)
            .map_err(|err| MergeError::InvalidReplicationMetadataShape(err.to_string()))
    }
}
