//! Conflict resolution core for active-active replicated key-value stores.
//!
//! Given the stored value of a key together with its replication metadata
//! (RMD) and an incoming write from any region, the [`MergeDispatcher`]
//! decides the new persisted value and RMD so that replicas applying the same
//! writes in any order converge on the same state.
//!
//! # Building blocks
//!
//! - [`schema`] - structural record schemas and the superset gate
//! - [`value`] - records and field values, with their canonical encoding
//! - [`rmd`] - the two RMD shapes and the replication checkpoint vector
//! - [`comparator`] - deterministic tie-break for equal timestamps
//! - [`oracle`] - per-field resolution (put on a field, delete a record)
//! - [`partial`] - partial updates ("write compute") applied against a record
//! - [`dispatcher`] - the put / delete / update entry points
//! - [`config`] - settings fixed when a dispatcher is built
//!
//! The engine is synchronous and holds no state between calls. Callers must
//! serialise merges per key; different keys can be merged in parallel.

#![forbid(
    unreachable_pub,
    unsafe_code,
    unsafe_op_in_unsafe_fn,
    clippy::missing_docs_in_private_items
)]
#![deny(
    clippy::expect_used,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::panic,
    clippy::unwrap_in_result,
    clippy::unwrap_used
)]
#![warn(
    missing_docs,
    clippy::let_underscore_untyped,
    clippy::map_err_ignore,
    clippy::pattern_type_mismatch,
    clippy::same_name_method,
    clippy::shadow_reuse,
    clippy::shadow_same,
    clippy::unreachable,
    clippy::use_debug
)]
//	Lints specifically disabled for unit tests
#![cfg_attr(
    test,
    allow(
        non_snake_case,
        clippy::arithmetic_side_effects,
        clippy::cast_possible_truncation,
        clippy::default_numeric_fallback,
        clippy::exhaustive_enums,
        clippy::exhaustive_structs,
        clippy::expect_used,
        clippy::indexing_slicing,
        clippy::missing_assert_message,
        clippy::missing_panics_doc,
        clippy::must_use_candidate,
        clippy::panic,
        clippy::too_many_lines,
        clippy::unwrap_in_result,
        clippy::unwrap_used,
        reason = "Not useful in unit tests"
    )
)]

pub mod comparator;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod oracle;
pub mod partial;
pub mod rmd;
pub mod schema;
pub mod state;
pub mod value;

pub use config::MergeConfig;
pub use dispatcher::{MergeDispatcher, WriteContext};
pub use error::{MergeError, Rejected};
pub use oracle::{FieldMergeOracle, PerFieldLww};
pub use partial::{FieldSetApplier, FieldUpdate, PartialUpdate, PartialUpdateApplier};
pub use rmd::{CheckpointVector, FieldTimestamps, ReplicationMetadata, RmdTimestamp, RmdTimestampType};
pub use schema::{FieldKind, FieldSchema, Schema};
pub use state::{UpdateResultStatus, ValueAndRmd};
pub use value::{FieldValue, Record};
