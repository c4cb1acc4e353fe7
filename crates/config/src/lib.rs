//! On-disk configuration of a node running the merge engine.

#![cfg_attr(
    test,
    allow(
        clippy::missing_assert_message,
        clippy::unwrap_used,
        reason = "Not useful in unit tests"
    )
)]

#[cfg(test)]
#[path = "tests/lib.rs"]
mod tests;

use std::fs::{read_to_string, write};

use camino::Utf8Path;
use convergent_merge::MergeConfig;
use eyre::{Result as EyreResult, WrapErr};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[non_exhaustive]
pub struct ConfigFile {
    #[serde(default)]
    pub merge: MergeConfig,
}

impl ConfigFile {
    #[must_use]
    pub const fn new(merge: MergeConfig) -> Self {
        Self { merge }
    }

    #[must_use]
    pub fn exists(dir: &Utf8Path) -> bool {
        dir.join(CONFIG_FILE).is_file()
    }

    pub fn load(dir: &Utf8Path) -> EyreResult<Self> {
        let path = dir.join(CONFIG_FILE);
        let content = read_to_string(&path)
            .wrap_err_with(|| format!("failed to read configuration from {path:?}"))?;

        toml::from_str(&content)
            .wrap_err_with(|| format!("failed to parse configuration in {path:?}"))
    }

    pub fn save(&self, dir: &Utf8Path) -> EyreResult<()> {
        let path = dir.join(CONFIG_FILE);
        let content = toml::to_string_pretty(self)?;

        write(&path, content)
            .wrap_err_with(|| format!("failed to write configuration to {path:?}"))?;

        Ok(())
    }

    /// Writes the file unless it already holds exactly this configuration.
    ///
    /// Returns whether the file was written. A missing or unreadable file
    /// counts as different.
    pub fn save_if_changed(&self, dir: &Utf8Path) -> EyreResult<bool> {
        let path = dir.join(CONFIG_FILE);
        let rendered = toml::to_string_pretty(self)?;

        if read_to_string(&path).is_ok_and(|on_disk| on_disk == rendered) {
            return Ok(false);
        }

        write(&path, rendered)
            .wrap_err_with(|| format!("failed to write configuration to {path:?}"))?;

        Ok(true)
    }
}
