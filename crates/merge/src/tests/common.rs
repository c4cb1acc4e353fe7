use std::sync::Arc;

use crate::dispatcher::WriteContext;
use crate::rmd::{FieldTimestamps, ReplicationMetadata, RmdTimestamp};
use crate::schema::{FieldKind, FieldSchema, Schema};
use crate::state::ValueAndRmd;
use crate::value::{FieldValue, Record};

/// `User { a: int, b: int }`, the stored schema used across the tests.
pub fn user_schema() -> Arc<Schema> {
    Arc::new(
        Schema::new(
            "User",
            vec![
                FieldSchema::new("a", FieldKind::Int),
                FieldSchema::new("b", FieldKind::Int),
            ],
        )
        .unwrap(),
    )
}

/// `UserA { a: int }`, a strict subset of [`user_schema`].
pub fn user_a_schema() -> Arc<Schema> {
    Arc::new(Schema::new("UserA", vec![FieldSchema::new("a", FieldKind::Int)]).unwrap())
}

/// `UserC { a: int, c: string }`, not a subset of [`user_schema`].
pub fn user_c_schema() -> Arc<Schema> {
    Arc::new(
        Schema::new(
            "UserC",
            vec![
                FieldSchema::new("a", FieldKind::Int),
                FieldSchema::new("c", FieldKind::String),
            ],
        )
        .unwrap(),
    )
}

/// Record of `schema` with the given int fields; others take defaults.
pub fn ints(schema: &Arc<Schema>, pairs: &[(&str, i32)]) -> Record {
    Record::from_pairs(
        Arc::clone(schema),
        pairs.iter().map(|&(name, value)| (name, FieldValue::Int(value))),
    )
    .unwrap()
}

/// State with a value-level RMD.
pub fn value_level_state(value: Option<Record>, timestamp: u64) -> ValueAndRmd {
    ValueAndRmd::new(value, ReplicationMetadata::value_level(timestamp))
}

/// State with a per-field RMD built from explicit field timestamps.
pub fn per_field_state(value: Option<Record>, timestamps: &[(&str, u64)]) -> ValueAndRmd {
    ValueAndRmd::new(
        value,
        ReplicationMetadata::new(
            RmdTimestamp::PerField(FieldTimestamps::from_pairs(timestamps.iter().copied())),
            Default::default(),
        ),
    )
}

/// Write stamped `timestamp` from region 1 with an unknown source.
pub fn at(timestamp: u64) -> WriteContext {
    WriteContext::new(timestamp, 1, 0, -1)
}

/// Write stamped `timestamp` from region 1, consumed at `offset` from `broker_id`.
pub fn from_source(timestamp: u64, offset: u64, broker_id: i32) -> WriteContext {
    WriteContext::new(timestamp, 1, offset, broker_id)
}

/// Field timestamps of a per-field state, as pairs.
pub fn field_timestamps(state: &ValueAndRmd) -> Vec<(String, u64)> {
    state
        .rmd()
        .field_timestamps()
        .unwrap()
        .iter()
        .map(|(name, timestamp)| (name.to_owned(), timestamp))
        .collect()
}
