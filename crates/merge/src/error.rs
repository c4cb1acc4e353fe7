//! Error types for merge operations.

use serde::Serialize;
use thiserror::Error;

use crate::state::ValueAndRmd;

/// Reasons a merge call can be refused.
///
/// Every variant is fatal to the call that produced it: the dispatcher checks
/// all of them before touching the state, so nothing is ever half-applied.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MergeError {
    /// The stored schema is not a superset of the incoming write's schema.
    #[error("schema `{old}` is not a superset of schema `{new}` (field `{field}`)")]
    SchemaIncompatible {
        /// Name of the stored value schema.
        old: String,
        /// Name of the incoming schema.
        new: String,
        /// First field of the incoming schema that has no compatible counterpart.
        field: String,
    },

    /// A put arrived for a key without a base value.
    ///
    /// The caller has to synthesise a default-valued record first.
    #[error("old value cannot be absent on put")]
    MissingBaseValue,

    /// The operation is not available in this deployment.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    /// The replication metadata is neither of the two known shapes, or does
    /// not line up with the value schema.
    #[error("invalid replication metadata shape: {0}")]
    InvalidReplicationMetadataShape(String),

    /// A value does not conform to the schema it is bound to.
    #[error("value does not match schema `{schema}` at field `{field}`: {reason}")]
    SchemaMismatch {
        /// Name of the schema the value was checked against.
        schema: String,
        /// Offending field.
        field: String,
        /// What went wrong.
        reason: String,
    },

    /// A source broker id beyond the configured limit.
    #[error("source broker id {broker_id} exceeds the limit of {limit}")]
    SourceBrokerOutOfRange {
        /// Broker id carried by the write.
        broker_id: i32,
        /// Configured maximum.
        limit: u32,
    },
}

impl MergeError {
    /// Shorthand for [`MergeError::SchemaMismatch`].
    pub(crate) fn mismatch(
        schema: &str,
        field: &str,
        reason: impl Into<String>,
    ) -> Self {
        Self::SchemaMismatch {
            schema: schema.to_owned(),
            field: field.to_owned(),
            reason: reason.into(),
        }
    }
}

impl Serialize for MergeError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// A refused merge call.
///
/// Carries the caller's state back unchanged, so that ownership of the state
/// can move into the dispatcher without being lost on failure.
#[derive(Debug, Error)]
#[error("merge rejected: {error}")]
pub struct Rejected {
    /// The state exactly as it was handed in.
    pub state: ValueAndRmd,
    /// Why the call was refused.
    #[source]
    pub error: MergeError,
}

impl Rejected {
    /// Pairs an error with the untouched state.
    #[must_use]
    pub const fn new(state: ValueAndRmd, error: MergeError) -> Self {
        Self { state, error }
    }

    /// Gives the state back to the caller.
    #[must_use]
    pub fn into_state(self) -> ValueAndRmd {
        self.state
    }

    /// The underlying error.
    #[must_use]
    pub const fn error(&self) -> &MergeError {
        &self.error
    }
}
