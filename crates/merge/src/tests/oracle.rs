#![allow(non_snake_case)]

use claims::assert_ok;

use super::*;
use crate::tests::common::{ints, user_schema};

#[cfg(test)]
mod per_field_lww__put_on_field {
    use super::*;

    #[test]
    fn newer_incoming_replaces_the_field() {
        let resolution = assert_ok!(PerFieldLww.put_on_field(
            Some(&FieldValue::Int(1)),
            100,
            &FieldValue::Int(5),
            150,
            1
        ));
        assert_eq!(
            resolution,
            FieldResolution {
                value: FieldValue::Int(5),
                timestamp: 150,
                status: UpdateResultStatus::CompletelyUpdated,
            }
        );
    }

    #[test]
    fn older_incoming_keeps_the_field() {
        let resolution = assert_ok!(PerFieldLww.put_on_field(
            Some(&FieldValue::Int(1)),
            100,
            &FieldValue::Int(5),
            90,
            1
        ));
        assert_eq!(resolution.status, UpdateResultStatus::NotUpdatedAtAll);
        assert_eq!(resolution.value, FieldValue::Int(1));
        assert_eq!(resolution.timestamp, 100);
    }

    #[test]
    fn ties_are_decided_by_content_whatever_the_region() {
        let high = FieldValue::Int(9);
        let low = FieldValue::Int(1);
        let up = assert_ok!(PerFieldLww.put_on_field(Some(&low), 100, &high, 100, 1));
        let down = assert_ok!(PerFieldLww.put_on_field(Some(&high), 100, &low, 100, 2));
        assert_eq!(up.status, UpdateResultStatus::CompletelyUpdated);
        assert_eq!(down.status, UpdateResultStatus::NotUpdatedAtAll);
        assert_eq!(up.value, down.value);
    }

    #[test]
    fn a_cleared_field_wins_ties() {
        let resolution =
            assert_ok!(PerFieldLww.put_on_field(None, 100, &FieldValue::Int(5), 100, 1));
        assert_eq!(resolution.status, UpdateResultStatus::NotUpdatedAtAll);
    }

    #[test]
    fn identical_writes_are_no_ops() {
        let value = FieldValue::Int(5);
        let resolution = assert_ok!(PerFieldLww.put_on_field(Some(&value), 100, &value, 100, 1));
        assert_eq!(resolution.status, UpdateResultStatus::NotUpdatedAtAll);
    }
}

#[cfg(test)]
mod per_field_lww__delete_record {
    use super::*;

    #[test]
    fn newer_delete_clears_every_field() {
        let record = ints(&user_schema(), &[("a", 1), ("b", 2)]);
        let timestamps = FieldTimestamps::from_pairs([("a", 100_u64), ("b", 120)]);
        let deletion = assert_ok!(PerFieldLww.delete_record(Some(&record), &timestamps, 150, 1));

        assert_eq!(deletion.status, UpdateResultStatus::CompletelyUpdated);
        assert!(deletion.timestamps.is_cleared("a"));
        assert!(deletion.timestamps.is_cleared("b"));
        assert_eq!(
            deletion.timestamps.iter().collect::<Vec<_>>(),
            [("a", 150), ("b", 150)]
        );
    }

    #[test]
    fn fields_written_after_the_delete_survive() {
        let record = ints(&user_schema(), &[("a", 1), ("b", 2)]);
        let timestamps = FieldTimestamps::from_pairs([("a", 100_u64), ("b", 200)]);
        let deletion = assert_ok!(PerFieldLww.delete_record(Some(&record), &timestamps, 150, 1));

        assert_eq!(deletion.status, UpdateResultStatus::PartiallyUpdated);
        let value = deletion.value.unwrap();
        assert_eq!(value.fields(), [FieldValue::Int(0), FieldValue::Int(2)]);
        assert_eq!(deletion.timestamps.get("a"), Some(150));
        assert_eq!(deletion.timestamps.get("b"), Some(200));
        assert!(!deletion.timestamps.is_cleared("b"));
    }

    #[test]
    fn older_delete_changes_nothing() {
        let record = ints(&user_schema(), &[("a", 1), ("b", 2)]);
        let timestamps = FieldTimestamps::from_pairs([("a", 100_u64), ("b", 100)]);
        let deletion = assert_ok!(PerFieldLww.delete_record(Some(&record), &timestamps, 50, 1));

        assert_eq!(deletion.status, UpdateResultStatus::NotUpdatedAtAll);
        assert_eq!(deletion.value, Some(record));
        assert_eq!(deletion.timestamps, timestamps);
    }

    #[test]
    fn delete_wins_a_tie_but_not_twice() {
        let record = ints(&user_schema(), &[("a", 1), ("b", 2)]);
        let timestamps = FieldTimestamps::from_pairs([("a", 100_u64), ("b", 100)]);
        let first = assert_ok!(PerFieldLww.delete_record(Some(&record), &timestamps, 100, 1));
        assert_eq!(first.status, UpdateResultStatus::CompletelyUpdated);

        let second = assert_ok!(PerFieldLww.delete_record(
            first.value.as_ref(),
            &first.timestamps,
            100,
            2
        ));
        assert_eq!(second.status, UpdateResultStatus::NotUpdatedAtAll);
    }
}
