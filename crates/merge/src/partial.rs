//! Partial updates ("write compute").
//!
//! A partial update names a subset of a record's fields and what to do with
//! each. It is written against an update schema, a subset of the stored value
//! schema, and applied against the current value and RMD by a
//! [`PartialUpdateApplier`].
//!
//! Collection operations (list/map add and remove) are not supported.

#[cfg(test)]
#[path = "tests/partial.rs"]
mod tests;

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::trace;

use crate::comparator::{self, Winner};
use crate::error::MergeError;
use crate::oracle::{FieldMergeOracle, PerFieldLww};
use crate::rmd::RmdTimestamp;
use crate::schema::{self, Schema};
use crate::state::{StatusSummary, UpdateResultStatus, ValueAndRmd};
use crate::value::{FieldValue, Record};

/// Operation on one field.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum FieldUpdate {
    /// Overwrite the field.
    Set(FieldValue),
    /// Leave the field alone.
    Unchanged,
}

/// A partial update payload.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PartialUpdate {
    /// Operations in payload order.
    fields: Vec<(String, FieldUpdate)>,
}

impl PartialUpdate {
    /// An update touching nothing.
    #[must_use]
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Adds a field overwrite.
    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields
            .push((field.into(), FieldUpdate::Set(value.into())));
        self
    }

    /// Adds an explicit no-op for a field.
    #[must_use]
    pub fn unchanged(mut self, field: impl Into<String>) -> Self {
        self.fields.push((field.into(), FieldUpdate::Unchanged));
        self
    }

    /// Field operations in payload order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldUpdate)> {
        self.fields.iter().map(|(name, update)| (name.as_str(), update))
    }

    /// Whether the payload carries no operation.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Applies a partial update against a value and its RMD.
pub trait PartialUpdateApplier {
    /// Returns the state after the update.
    ///
    /// The RMD handed in already reflects the update's source offset.
    /// Implementations maintain the field timestamps themselves and must not
    /// change the RMD shape.
    ///
    /// # Errors
    ///
    /// Schema violations of the payload, or an RMD not matching
    /// `value_schema`.
    fn apply(
        &self,
        state: ValueAndRmd,
        update: &PartialUpdate,
        value_schema: &Arc<Schema>,
        update_schema: &Schema,
        timestamp: u64,
        region_id: i32,
    ) -> Result<ValueAndRmd, MergeError>;
}

/// Applies `Set` operations with the same rules as a put.
///
/// On a per-field RMD every set field is resolved through the oracle. On a
/// value-level RMD the update is one whole-record write: it lands in full or
/// not at all.
///
/// Value-level updates do not commute. Two updates to different fields keep
/// both fields when the older one arrives first, but the older one is dropped
/// whole when it arrives after the newer. A value-level RMD has only one
/// timestamp to tell them apart with; keys taking concurrent partial updates
/// need per-field RMDs to converge.
#[derive(Clone, Copy, Debug, Default)]
pub struct FieldSetApplier<O = PerFieldLww> {
    /// Resolution used on per-field RMDs.
    oracle: O,
}

impl<O> FieldSetApplier<O> {
    /// Applier resolving fields through `oracle`.
    #[must_use]
    pub const fn new(oracle: O) -> Self {
        Self { oracle }
    }
}

/// A validated `Set`, expressed under the value schema.
struct StagedSet<'update> {
    /// Field name.
    name: &'update str,
    /// Position in the value schema.
    index: usize,
    /// Value widened to the value schema.
    value: FieldValue,
}

impl<O: FieldMergeOracle> FieldSetApplier<O> {
    /// Checks the payload against both schemas and widens every value to the
    /// value schema.
    fn stage<'update>(
        update: &'update PartialUpdate,
        value_schema: &Schema,
        update_schema: &Schema,
    ) -> Result<Vec<StagedSet<'update>>, MergeError> {
        schema::ensure_superset(value_schema, update_schema)?;

        let mut staged = Vec::new();
        let mut seen = BTreeSet::new();
        for (name, operation) in update.iter() {
            if !seen.insert(name) {
                return Err(MergeError::mismatch(
                    update_schema.name(),
                    name,
                    "field appears more than once in the payload",
                ));
            }
            let Some(update_field) = update_schema.field(name) else {
                return Err(MergeError::mismatch(
                    update_schema.name(),
                    name,
                    "field is not part of the update schema",
                ));
            };
            let FieldUpdate::Set(ref value) = *operation else {
                continue;
            };
            if !update_field.kind().accepts(value) {
                return Err(MergeError::mismatch(
                    update_schema.name(),
                    name,
                    "value does not match the declared kind",
                ));
            }
            let (Some(index), Some(value_field)) =
                (value_schema.position(name), value_schema.field(name))
            else {
                return Err(MergeError::mismatch(value_schema.name(), name, "unknown field"));
            };
            staged.push(StagedSet {
                name,
                index,
                value: value_field.kind().widen(update_field.kind(), value.clone()),
            });
        }
        Ok(staged)
    }
}

impl<O: FieldMergeOracle> PartialUpdateApplier for FieldSetApplier<O> {
    fn apply(
        &self,
        mut state: ValueAndRmd,
        update: &PartialUpdate,
        value_schema: &Arc<Schema>,
        update_schema: &Schema,
        timestamp: u64,
        region_id: i32,
    ) -> Result<ValueAndRmd, MergeError> {
        let staged = Self::stage(update, value_schema, update_schema)?;
        state.rmd().validate_for(value_schema)?;

        let widened = match state.value() {
            Some(current) => {
                schema::ensure_superset(value_schema, current.schema())?;
                Some(current.widen_to(value_schema))
            }
            None => None,
        };
        let mut base = widened
            .clone()
            .unwrap_or_else(|| Record::with_defaults(Arc::clone(value_schema)));

        match state.rmd().timestamp().clone() {
            RmdTimestamp::ValueLevel {
                timestamp: current_timestamp,
                deleted,
            } => {
                for set in &staged {
                    base.set_unchecked(set.index, set.value.clone());
                }
                let held = if deleted { None } else { widened.as_ref() };
                let winner = comparator::resolve(current_timestamp, timestamp, || {
                    comparator::compare_records(Some(&base), held)
                });
                if winner == Winner::Incoming {
                    state.set_value(Some(base));
                    *state.rmd_mut().timestamp_mut() = RmdTimestamp::ValueLevel {
                        timestamp,
                        deleted: false,
                    };
                } else {
                    state.set_update_ignored(true);
                }
            }
            RmdTimestamp::PerField(mut timestamps) => {
                let mut summary = StatusSummary::default();

                for set in staged {
                    let current = if timestamps.is_cleared(set.name) {
                        None
                    } else {
                        state.value().and_then(|record| record.get(set.name))
                    };
                    let resolution = self.oracle.put_on_field(
                        current,
                        timestamps.get(set.name).unwrap_or_default(),
                        &set.value,
                        timestamp,
                        region_id,
                    )?;
                    trace!(
                        target: "merge::update",
                        field = set.name,
                        status = ?resolution.status,
                        "Resolved partial update field"
                    );
                    summary.record(resolution.status);
                    if resolution.status != UpdateResultStatus::NotUpdatedAtAll {
                        base.set_unchecked(set.index, resolution.value);
                        timestamps.set(set.name, resolution.timestamp);
                    }
                }

                if summary.none_updated() {
                    state.set_update_ignored(true);
                } else {
                    state.set_value(Some(base));
                    *state.rmd_mut().timestamp_mut() = RmdTimestamp::PerField(timestamps);
                }
            }
        }

        Ok(state)
    }
}
