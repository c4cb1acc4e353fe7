//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Broker ids the checkpoint vector grows to by default.
pub const DEFAULT_MAX_SOURCE_BROKER_ID: u32 = 1024;

/// Settings fixed when a [`MergeDispatcher`](crate::MergeDispatcher) is built.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
#[non_exhaustive]
pub struct MergeConfig {
    /// Whether the record encoding of this deployment can store a deleted
    /// (null) value. Deletes are refused when it cannot.
    pub null_deletes_supported: bool,

    /// Highest source broker id accepted in a write. Bounds the length of the
    /// checkpoint vector.
    pub max_source_broker_id: u32,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            null_deletes_supported: true,
            max_source_broker_id: DEFAULT_MAX_SOURCE_BROKER_ID,
        }
    }
}

impl MergeConfig {
    /// Config with explicit settings.
    #[must_use]
    pub const fn new(null_deletes_supported: bool, max_source_broker_id: u32) -> Self {
        Self {
            null_deletes_supported,
            max_source_broker_id,
        }
    }

    /// Whether deletes are accepted.
    #[must_use]
    pub const fn null_deletes_supported(&self) -> bool {
        self.null_deletes_supported
    }

    /// Highest accepted source broker id.
    #[must_use]
    pub const fn max_source_broker_id(&self) -> u32 {
        self.max_source_broker_id
    }
}
