#![allow(non_snake_case)]

use claims::{assert_err, assert_matches, assert_none, assert_ok, assert_some_eq};

use super::*;
use crate::rmd::{CheckpointVector, ReplicationMetadata};
use crate::tests::common::{
    field_timestamps, ints, per_field_state, user_a_schema, user_c_schema, user_schema,
    value_level_state,
};

fn apply(state: ValueAndRmd, update: &PartialUpdate, timestamp: u64) -> Result<ValueAndRmd, MergeError> {
    FieldSetApplier::<PerFieldLww>::default().apply(
        state,
        update,
        &user_schema(),
        &user_schema(),
        timestamp,
        1,
    )
}

#[cfg(test)]
mod partial_update__builder {
    use super::*;

    #[test]
    fn keeps_payload_order() {
        let update = PartialUpdate::new().set("b", 2).unchanged("a");
        assert!(!update.is_empty());
        let names: Vec<_> = update.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["b", "a"]);
        assert!(PartialUpdate::new().is_empty());
    }
}

#[cfg(test)]
mod field_set_applier__per_field {
    use super::*;

    #[test]
    fn newer_sets_land_and_others_stay() {
        let schema = user_schema();
        let state = per_field_state(
            Some(ints(&schema, &[("a", 1), ("b", 2)])),
            &[("a", 100), ("b", 100)],
        );
        let merged = assert_ok!(apply(state, &PartialUpdate::new().set("b", 7), 150));

        assert!(!merged.is_update_ignored());
        assert_eq!(merged.value().unwrap().fields(), [FieldValue::Int(1), FieldValue::Int(7)]);
        assert_eq!(
            field_timestamps(&merged),
            [("a".to_owned(), 100), ("b".to_owned(), 150)]
        );
    }

    #[test]
    fn mixed_outcomes_apply_per_field() {
        let schema = user_schema();
        let state = per_field_state(
            Some(ints(&schema, &[("a", 1), ("b", 2)])),
            &[("a", 100), ("b", 200)],
        );
        let update = PartialUpdate::new().set("a", 5).set("b", 5);
        let merged = assert_ok!(apply(state, &update, 150));

        assert_eq!(merged.value().unwrap().fields(), [FieldValue::Int(5), FieldValue::Int(2)]);
        assert_eq!(
            field_timestamps(&merged),
            [("a".to_owned(), 150), ("b".to_owned(), 200)]
        );
        assert_eq!(
            merged.rmd().field_timestamps().unwrap().record_timestamp(),
            None
        );
    }

    #[test]
    fn all_fields_fresh_bump_the_record_marker() {
        let schema = user_schema();
        let state = per_field_state(
            Some(ints(&schema, &[("a", 1), ("b", 2)])),
            &[("a", 100), ("b", 100)],
        );
        let merged = assert_ok!(apply(state, &PartialUpdate::new().set("a", 3).set("b", 4), 150));
        assert_some_eq!(
            merged.rmd().field_timestamps().unwrap().record_timestamp(),
            150
        );
    }

    #[test]
    fn stale_update_is_ignored() {
        let schema = user_schema();
        let original = per_field_state(
            Some(ints(&schema, &[("a", 1), ("b", 2)])),
            &[("a", 100), ("b", 100)],
        );
        let merged = assert_ok!(apply(original.clone(), &PartialUpdate::new().set("a", 3), 90));
        assert!(merged.is_update_ignored());
        assert_eq!(merged.value(), original.value());
        assert_eq!(merged.rmd(), original.rmd());
    }

    #[test]
    fn missing_value_starts_from_defaults() {
        let state = per_field_state(None, &[("a", 100), ("b", 100)]);
        let merged = assert_ok!(apply(state, &PartialUpdate::new().set("a", 3), 150));
        assert_eq!(merged.value().unwrap().fields(), [FieldValue::Int(3), FieldValue::Int(0)]);
    }

    #[test]
    fn unchanged_fields_are_not_touched() {
        let schema = user_schema();
        let state = per_field_state(
            Some(ints(&schema, &[("a", 1), ("b", 2)])),
            &[("a", 100), ("b", 100)],
        );
        let merged = assert_ok!(apply(state, &PartialUpdate::new().unchanged("a"), 150));
        assert!(merged.is_update_ignored());
    }
}

#[cfg(test)]
mod field_set_applier__value_level {
    use super::*;

    #[test]
    fn newer_update_stamps_the_record() {
        let schema = user_schema();
        let state = value_level_state(Some(ints(&schema, &[("a", 1), ("b", 2)])), 100);
        let merged = assert_ok!(apply(state, &PartialUpdate::new().set("a", 9), 150));
        assert_eq!(merged.value().unwrap().fields(), [FieldValue::Int(9), FieldValue::Int(2)]);
        assert_some_eq!(merged.rmd().value_timestamp(), 150);
    }

    #[test]
    fn older_update_is_dropped_whole() {
        let schema = user_schema();
        let state = value_level_state(Some(ints(&schema, &[("a", 1), ("b", 2)])), 100);
        let merged = assert_ok!(apply(state, &PartialUpdate::new().set("a", 9), 50));
        assert!(merged.is_update_ignored());
        assert_eq!(merged.value().unwrap().fields(), [FieldValue::Int(1), FieldValue::Int(2)]);
        assert_some_eq!(merged.rmd().value_timestamp(), 100);
    }

    #[test]
    fn updates_to_different_fields_depend_on_arrival_order() {
        let schema = user_schema();
        let initial = value_level_state(Some(ints(&schema, &[("a", 0), ("b", 9)])), 100);
        let older = PartialUpdate::new().set("a", 5);
        let newer = PartialUpdate::new().set("b", 5);

        let in_order = assert_ok!(apply(initial.clone(), &older, 150));
        let in_order = assert_ok!(apply(in_order, &newer, 200));
        assert_eq!(in_order.value().unwrap().fields(), [FieldValue::Int(5), FieldValue::Int(5)]);

        let late = assert_ok!(apply(initial, &newer, 200));
        let late = assert_ok!(apply(late, &older, 150));
        assert!(late.is_update_ignored());
        assert_eq!(late.value().unwrap().fields(), [FieldValue::Int(0), FieldValue::Int(5)]);
        assert_eq!(late.rmd(), in_order.rmd());
    }

    #[test]
    fn tie_compares_content_against_a_narrower_stored_record() {
        let state = value_level_state(Some(ints(&user_a_schema(), &[("a", 1)])), 100);

        let same = assert_ok!(apply(state.clone(), &PartialUpdate::new().set("a", 1), 100));
        assert!(same.is_update_ignored());
        let lower = assert_ok!(apply(state.clone(), &PartialUpdate::new().set("a", 0), 100));
        assert!(lower.is_update_ignored());

        let higher = assert_ok!(apply(state, &PartialUpdate::new().set("a", 2), 100));
        assert!(!higher.is_update_ignored());
        assert_eq!(higher.value().unwrap().fields(), [FieldValue::Int(2), FieldValue::Int(0)]);
    }

    #[test]
    fn tie_against_a_delete_is_lost() {
        let tombstone = ReplicationMetadata::new(
            RmdTimestamp::ValueLevel {
                timestamp: 150,
                deleted: true,
            },
            CheckpointVector::new(),
        );
        let state = ValueAndRmd::new(None, tombstone);

        let tied = assert_ok!(apply(state.clone(), &PartialUpdate::new().set("a", 9), 150));
        assert!(tied.is_update_ignored());
        assert_none!(tied.value());

        let newer = assert_ok!(apply(state, &PartialUpdate::new().set("a", 9), 151));
        assert!(!newer.rmd().is_value_deleted());
        assert_eq!(newer.value().unwrap().fields(), [FieldValue::Int(9), FieldValue::Int(0)]);
    }
}

#[cfg(test)]
mod field_set_applier__validation {
    use super::*;

    #[test]
    fn update_schema_must_be_a_subset() {
        let state = value_level_state(None, 0);
        let result = FieldSetApplier::<PerFieldLww>::default().apply(
            state,
            &PartialUpdate::new().set("c", "x"),
            &user_schema(),
            &user_c_schema(),
            1,
            1,
        );
        assert_matches!(result, Err(MergeError::SchemaIncompatible { .. }));
    }

    #[test]
    fn fields_outside_the_update_schema_are_rejected() {
        let state = value_level_state(None, 0);
        let result = FieldSetApplier::<PerFieldLww>::default().apply(
            state,
            &PartialUpdate::new().set("b", 1),
            &user_schema(),
            &user_a_schema(),
            1,
            1,
        );
        assert_matches!(result, Err(MergeError::SchemaMismatch { ref field, .. }) if field == "b");
    }

    #[test]
    fn mistyped_values_are_rejected() {
        let state = value_level_state(None, 0);
        assert_err!(apply(state, &PartialUpdate::new().set("a", "nope"), 1));
    }

    #[test]
    fn repeated_fields_are_rejected() {
        let state = value_level_state(None, 0);
        assert_err!(apply(state, &PartialUpdate::new().set("a", 1).set("a", 2), 1));
    }

    #[test]
    fn per_field_rmd_must_match_the_value_schema() {
        let state = per_field_state(None, &[("a", 1)]);
        let result = apply(state, &PartialUpdate::new().set("a", 1), 2);
        assert_matches!(result, Err(MergeError::InvalidReplicationMetadataShape(_)));
    }
}
