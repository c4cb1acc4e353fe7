//! The put / delete / update entry points.
//!
//! Every call takes ownership of the current [`ValueAndRmd`] of a key and
//! either returns the merged state or a [`Rejected`] carrying the original
//! state back. A call is planned against the untouched state first; only a
//! plan that passed every check is committed, so a refused call never leaves
//! anything half-applied.
//!
//! The checkpoint vector is advanced on every accepted call, whether or not
//! the write changed the value.

#[cfg(test)]
#[path = "tests/dispatcher.rs"]
mod tests;

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::comparator::{self, Winner};
use crate::config::MergeConfig;
use crate::error::{MergeError, Rejected};
use crate::oracle::{FieldMergeOracle, PerFieldLww};
use crate::partial::{FieldSetApplier, PartialUpdate, PartialUpdateApplier};
use crate::rmd::{CheckpointAdvance, FieldTimestamps, RmdTimestamp};
use crate::schema::{self, Schema};
use crate::state::{StatusSummary, UpdateResultStatus, ValueAndRmd};
use crate::value::Record;

/// Where and when a write was produced.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WriteContext {
    /// Logical write timestamp, in epoch millis.
    pub timestamp: u64,
    /// Region the write originated from.
    pub region_id: i32,
    /// Offset of the write in its source log.
    pub source_offset: u64,
    /// Broker the write was consumed from. Negative when unknown.
    pub source_broker_id: i32,
}

impl WriteContext {
    /// Bundles the parameters of one write.
    #[must_use]
    pub const fn new(
        timestamp: u64,
        region_id: i32,
        source_offset: u64,
        source_broker_id: i32,
    ) -> Self {
        Self {
            timestamp,
            region_id,
            source_offset,
            source_broker_id,
        }
    }
}

/// What a call does to the value and the RMD timestamp.
#[derive(Debug)]
enum Outcome {
    /// The write carries nothing new.
    Ignored,
    /// The value and the timestamp part of the RMD are replaced.
    Replace {
        /// New value; `None` for a deleted record.
        value: Option<Record>,
        /// New timestamp part, always of the shape already in force.
        timestamp: RmdTimestamp,
    },
}

/// Merges incoming writes into the stored state of a key.
#[derive(Clone, Debug, Default)]
pub struct MergeDispatcher<O = PerFieldLww, A = FieldSetApplier<O>> {
    /// Engine settings.
    config: MergeConfig,
    /// Per-field resolution for puts and deletes.
    oracle: O,
    /// Partial-update interpreter.
    applier: A,
}

impl MergeDispatcher {
    /// Dispatcher using [`PerFieldLww`] for both puts and partial updates.
    #[must_use]
    pub fn with_defaults(config: MergeConfig) -> Self {
        Self::new(config, PerFieldLww, FieldSetApplier::new(PerFieldLww))
    }
}

impl<O: FieldMergeOracle, A: PartialUpdateApplier> MergeDispatcher<O, A> {
    /// Dispatcher with a custom oracle and applier.
    #[must_use]
    pub const fn new(config: MergeConfig, oracle: O, applier: A) -> Self {
        Self {
            config,
            oracle,
            applier,
        }
    }

    /// Engine settings in force.
    #[must_use]
    pub const fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Merges a full-record put.
    ///
    /// # Errors
    ///
    /// [`MergeError::MissingBaseValue`] when `old` holds no value,
    /// [`MergeError::SchemaIncompatible`] when the stored schema is not a
    /// superset of `new_value`'s, and [`MergeError::InvalidReplicationMetadataShape`]
    /// or [`MergeError::SourceBrokerOutOfRange`] for bad metadata. `old` is
    /// handed back untouched in every case.
    pub fn put(
        &self,
        mut old: ValueAndRmd,
        new_value: &Record,
        write: WriteContext,
    ) -> Result<ValueAndRmd, Rejected> {
        old.set_update_ignored(false);

        let outcome = match self
            .check_broker(write.source_broker_id)
            .and_then(|()| self.plan_put(&old, new_value, write))
        {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(
                    target: "merge::put",
                    timestamp = write.timestamp,
                    region_id = write.region_id,
                    %error,
                    "Rejected put"
                );
                return Err(Rejected::new(old, error));
            }
        };

        debug!(
            target: "merge::put",
            timestamp = write.timestamp,
            region_id = write.region_id,
            ignored = matches!(outcome, Outcome::Ignored),
            "Merged put"
        );

        Ok(commit(old, outcome, write))
    }

    /// Merges a delete of the whole record.
    ///
    /// # Errors
    ///
    /// [`MergeError::UnsupportedOperation`] when the deployment cannot store
    /// deleted values, plus the metadata errors of [`Self::put`]. `old` is
    /// handed back untouched in every case.
    pub fn delete(&self, mut old: ValueAndRmd, write: WriteContext) -> Result<ValueAndRmd, Rejected> {
        old.set_update_ignored(false);

        let outcome = match self
            .check_broker(write.source_broker_id)
            .and_then(|()| self.plan_delete(&old, write))
        {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(
                    target: "merge::delete",
                    timestamp = write.timestamp,
                    region_id = write.region_id,
                    %error,
                    "Rejected delete"
                );
                return Err(Rejected::new(old, error));
            }
        };

        debug!(
            target: "merge::delete",
            timestamp = write.timestamp,
            region_id = write.region_id,
            ignored = matches!(outcome, Outcome::Ignored),
            "Merged delete"
        );

        Ok(commit(old, outcome, write))
    }

    /// Merges a partial update.
    ///
    /// The checkpoint vector is advanced before the applier runs, so the
    /// applier sees the update's offset as already merged. The applier must
    /// keep the RMD shape.
    ///
    /// # Errors
    ///
    /// Whatever the applier refuses, [`MergeError::InvalidReplicationMetadataShape`]
    /// when it changed the RMD shape, and [`MergeError::SourceBrokerOutOfRange`].
    /// `old` is handed back untouched in every case.
    pub fn update(
        &self,
        mut old: ValueAndRmd,
        update: &PartialUpdate,
        value_schema: &Arc<Schema>,
        update_schema: &Schema,
        write: WriteContext,
    ) -> Result<ValueAndRmd, Rejected> {
        old.set_update_ignored(false);

        let result = self.check_broker(write.source_broker_id).and_then(|()| {
            let mut staged = old.clone();
            advance_checkpoint(&mut staged, write);
            let merged = self.applier.apply(
                staged,
                update,
                value_schema,
                update_schema,
                write.timestamp,
                write.region_id,
            )?;
            if merged.rmd().timestamp_type() != old.rmd().timestamp_type() {
                return Err(MergeError::InvalidReplicationMetadataShape(
                    "partial update changed the timestamp shape".to_owned(),
                ));
            }
            Ok(merged)
        });

        match result {
            Ok(merged) => {
                debug!(
                    target: "merge::update",
                    timestamp = write.timestamp,
                    region_id = write.region_id,
                    ignored = merged.is_update_ignored(),
                    "Merged partial update"
                );
                Ok(merged)
            }
            Err(error) => {
                warn!(
                    target: "merge::update",
                    timestamp = write.timestamp,
                    region_id = write.region_id,
                    %error,
                    "Rejected partial update"
                );
                Err(Rejected::new(old, error))
            }
        }
    }

    /// Refuses broker ids the checkpoint vector must not grow to.
    fn check_broker(&self, broker_id: i32) -> Result<(), MergeError> {
        let limit = self.config.max_source_broker_id();
        match u32::try_from(broker_id) {
            Ok(id) if id > limit => Err(MergeError::SourceBrokerOutOfRange { broker_id, limit }),
            Ok(_) | Err(_) => Ok(()),
        }
    }

    /// Decides a put without touching the state.
    fn plan_put(
        &self,
        state: &ValueAndRmd,
        new_value: &Record,
        write: WriteContext,
    ) -> Result<Outcome, MergeError> {
        let current = state.value().ok_or(MergeError::MissingBaseValue)?;
        schema::ensure_superset(current.schema(), new_value.schema())?;
        state.rmd().validate_for(current.schema())?;

        match *state.rmd().timestamp() {
            RmdTimestamp::ValueLevel {
                timestamp: stored,
                deleted,
            } => {
                let incoming = new_value.widen_to(current.schema());
                // A put on a deleted key arrives with a synthesised base; the
                // tie is against the tombstone, not against that base.
                let held = if deleted { None } else { Some(current) };
                let winner = comparator::resolve(stored, write.timestamp, || {
                    comparator::compare_records(Some(&incoming), held)
                });
                Ok(match winner {
                    Winner::Incoming => Outcome::Replace {
                        value: Some(incoming),
                        timestamp: RmdTimestamp::ValueLevel {
                            timestamp: write.timestamp,
                            deleted: false,
                        },
                    },
                    Winner::Current => Outcome::Ignored,
                })
            }
            RmdTimestamp::PerField(ref timestamps) => {
                self.plan_per_field_put(current, timestamps, new_value, write)
            }
        }
    }

    /// Resolves every field of the incoming record through the oracle.
    fn plan_per_field_put(
        &self,
        current: &Record,
        timestamps: &FieldTimestamps,
        new_value: &Record,
        write: WriteContext,
    ) -> Result<Outcome, MergeError> {
        let stored_schema = current.schema();
        let mut next_value = current.clone();
        let mut next_timestamps = timestamps.clone();
        let mut summary = StatusSummary::default();

        for (incoming_field, raw) in new_value.schema().fields().iter().zip(new_value.fields()) {
            let name = incoming_field.name();
            let (Some(index), Some(stored_field)) =
                (stored_schema.position(name), stored_schema.field(name))
            else {
                return Err(MergeError::mismatch(stored_schema.name(), name, "unknown field"));
            };

            let incoming = stored_field.kind().widen(incoming_field.kind(), raw.clone());
            let current_field = if timestamps.is_cleared(name) {
                None
            } else {
                current.fields().get(index)
            };

            let resolution = self.oracle.put_on_field(
                current_field,
                timestamps.get(name).unwrap_or_default(),
                &incoming,
                write.timestamp,
                write.region_id,
            )?;
            trace!(
                target: "merge::put",
                field = name,
                status = ?resolution.status,
                "Resolved field"
            );

            summary.record(resolution.status);
            if resolution.status != UpdateResultStatus::NotUpdatedAtAll {
                next_value.set_unchecked(index, resolution.value);
                next_timestamps.set(name, resolution.timestamp);
            }
        }

        if summary.none_updated() {
            return Ok(Outcome::Ignored);
        }

        Ok(Outcome::Replace {
            value: Some(next_value),
            timestamp: RmdTimestamp::PerField(next_timestamps),
        })
    }

    /// Decides a delete without touching the state.
    fn plan_delete(&self, state: &ValueAndRmd, write: WriteContext) -> Result<Outcome, MergeError> {
        if !self.config.null_deletes_supported() {
            return Err(MergeError::UnsupportedOperation(
                "delete needs null-valued records, which this deployment cannot store",
            ));
        }
        if let Some(current) = state.value() {
            state.rmd().validate_for(current.schema())?;
        }

        match *state.rmd().timestamp() {
            RmdTimestamp::ValueLevel {
                timestamp: stored,
                deleted,
            } => {
                let held = if deleted { None } else { state.value() };
                let winner = comparator::resolve(stored, write.timestamp, || {
                    comparator::compare_records(None, held)
                });
                Ok(match winner {
                    Winner::Incoming => Outcome::Replace {
                        value: None,
                        timestamp: RmdTimestamp::ValueLevel {
                            timestamp: write.timestamp,
                            deleted: true,
                        },
                    },
                    Winner::Current => Outcome::Ignored,
                })
            }
            RmdTimestamp::PerField(ref timestamps) => {
                let deletion = self.oracle.delete_record(
                    state.value(),
                    timestamps,
                    write.timestamp,
                    write.region_id,
                )?;
                trace!(
                    target: "merge::delete",
                    status = ?deletion.status,
                    "Resolved record delete"
                );

                Ok(match deletion.status {
                    UpdateResultStatus::CompletelyUpdated => Outcome::Replace {
                        value: None,
                        timestamp: RmdTimestamp::PerField(deletion.timestamps),
                    },
                    UpdateResultStatus::PartiallyUpdated => Outcome::Replace {
                        value: deletion.value,
                        timestamp: RmdTimestamp::PerField(deletion.timestamps),
                    },
                    UpdateResultStatus::NotUpdatedAtAll => Outcome::Ignored,
                })
            }
        }
    }
}

/// Records the write's source offset in the checkpoint vector.
fn advance_checkpoint(state: &mut ValueAndRmd, write: WriteContext) {
    let advance = state
        .rmd_mut()
        .checkpoint_mut()
        .advance(write.source_offset, write.source_broker_id);

    match advance {
        CheckpointAdvance::Advanced { previous } => trace!(
            target: "merge::checkpoint",
            broker_id = write.source_broker_id,
            previous,
            offset = write.source_offset,
            "Advanced checkpoint"
        ),
        CheckpointAdvance::Redelivered { covered } => warn!(
            target: "merge::checkpoint",
            broker_id = write.source_broker_id,
            covered,
            offset = write.source_offset,
            "Offset already merged from this broker"
        ),
        CheckpointAdvance::Unattributed => trace!(
            target: "merge::checkpoint",
            broker_id = write.source_broker_id,
            "Write carries no source broker, checkpoint left as is"
        ),
    }
}

/// Applies a planned outcome, advancing the checkpoint first.
fn commit(mut state: ValueAndRmd, outcome: Outcome, write: WriteContext) -> ValueAndRmd {
    advance_checkpoint(&mut state, write);

    match outcome {
        Outcome::Ignored => state.set_update_ignored(true),
        Outcome::Replace { value, timestamp } => {
            state.set_value(value);
            *state.rmd_mut().timestamp_mut() = timestamp;
        }
    }

    state
}
