//! The unit of merge state and per-field outcomes.

use crate::rmd::ReplicationMetadata;
use crate::value::Record;

/// A stored value together with its replication metadata.
///
/// Handed to the dispatcher by value and handed back after the merge. The
/// `update_ignored` flag describes only the most recent merge: when set, the
/// incoming write carried nothing new for the value and the storage write
/// path may skip persisting it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValueAndRmd {
    /// Current record; `None` when deleted or never written.
    value: Option<Record>,
    /// Metadata of the current record.
    rmd: ReplicationMetadata,
    /// Set by the last merge when it changed nothing.
    update_ignored: bool,
}

impl ValueAndRmd {
    /// State of a key. `None` means deleted or never written.
    #[must_use]
    pub const fn new(value: Option<Record>, rmd: ReplicationMetadata) -> Self {
        Self {
            value,
            rmd,
            update_ignored: false,
        }
    }

    /// Current value.
    #[must_use]
    pub const fn value(&self) -> Option<&Record> {
        self.value.as_ref()
    }

    /// Replication metadata.
    #[must_use]
    pub const fn rmd(&self) -> &ReplicationMetadata {
        &self.rmd
    }

    /// Whether the last merge left the value untouched.
    #[must_use]
    pub const fn is_update_ignored(&self) -> bool {
        self.update_ignored
    }

    /// Splits into `(value, rmd, update_ignored)` for the storage write path.
    #[must_use]
    pub fn into_parts(self) -> (Option<Record>, ReplicationMetadata, bool) {
        (self.value, self.rmd, self.update_ignored)
    }

    pub(crate) fn set_value(&mut self, value: Option<Record>) {
        self.value = value;
    }

    pub(crate) fn rmd_mut(&mut self) -> &mut ReplicationMetadata {
        &mut self.rmd
    }

    pub(crate) fn set_update_ignored(&mut self, ignored: bool) {
        self.update_ignored = ignored;
    }
}

/// Outcome of resolving one field (or a whole record on delete).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum UpdateResultStatus {
    /// The incoming write lost: it was older, or lost the tie-break.
    NotUpdatedAtAll,
    /// Only part of the target changed.
    ///
    /// Scalar and record fields never produce this on put; a record delete
    /// does when some fields were newer than the delete.
    PartiallyUpdated,
    /// The incoming write fully replaced the target.
    CompletelyUpdated,
}

/// Folds per-field outcomes into a record-level decision.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StatusSummary {
    /// No outcome other than `CompletelyUpdated` seen.
    all_completely_updated: bool,
    /// No outcome other than `NotUpdatedAtAll` seen.
    none_updated: bool,
}

impl Default for StatusSummary {
    fn default() -> Self {
        Self {
            all_completely_updated: true,
            none_updated: true,
        }
    }
}

impl StatusSummary {
    /// Accounts for one more outcome.
    pub fn record(&mut self, status: UpdateResultStatus) {
        self.all_completely_updated &= status == UpdateResultStatus::CompletelyUpdated;
        self.none_updated &= status == UpdateResultStatus::NotUpdatedAtAll;
    }

    /// Every outcome so far was [`UpdateResultStatus::CompletelyUpdated`].
    #[must_use]
    pub const fn all_completely_updated(&self) -> bool {
        self.all_completely_updated
    }

    /// Every outcome so far was [`UpdateResultStatus::NotUpdatedAtAll`].
    #[must_use]
    pub const fn none_updated(&self) -> bool {
        self.none_updated
    }

    /// The aggregate outcome.
    #[must_use]
    pub const fn status(&self) -> UpdateResultStatus {
        if self.none_updated {
            UpdateResultStatus::NotUpdatedAtAll
        } else if self.all_completely_updated {
            UpdateResultStatus::CompletelyUpdated
        } else {
            UpdateResultStatus::PartiallyUpdated
        }
    }
}

impl FromIterator<UpdateResultStatus> for StatusSummary {
    fn from_iter<I: IntoIterator<Item = UpdateResultStatus>>(iter: I) -> Self {
        let mut summary = Self::default();
        for status in iter {
            summary.record(status);
        }
        summary
    }
}
