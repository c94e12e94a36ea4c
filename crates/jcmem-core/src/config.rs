//! Runtime sizing and behavior knobs, loaded from TOML.

use crate::error::{CardError, ErrorClass, ErrorOrigin};
use serde::Deserialize;
use thiserror::Error as ThisError;

pub const DEFAULT_COMMIT_CAPACITY: u32 = 1024;
pub const DEFAULT_COMMIT_ENTRY_OVERHEAD: u32 = 8;
pub const DEFAULT_PERSISTENT_CAPACITY: u32 = 32 * 1024;
pub const DEFAULT_TRANSIENT_CAPACITY: u32 = 2048;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("commit_capacity must be greater than zero")]
    ZeroCommitCapacity,

    #[error(
        "commit_entry_overhead ({overhead}) leaves no room for payload within commit_capacity ({capacity})"
    )]
    OverheadExceedsCapacity { overhead: u32, capacity: u32 },
}

impl From<ConfigError> for CardError {
    fn from(err: ConfigError) -> Self {
        Self::new(ErrorClass::System, ErrorOrigin::Config, err.to_string())
    }
}

///
/// CardConfig
///
/// Capacities are in bytes. Unknown keys are rejected.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CardConfig {
    pub commit_capacity: u32,
    pub commit_entry_overhead: u32,
    pub persistent_capacity: u32,
    pub transient_reset_capacity: u32,
    pub transient_deselect_capacity: u32,
    pub integrity_sensitive_supported: bool,
    pub debug: bool,
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            commit_capacity: DEFAULT_COMMIT_CAPACITY,
            commit_entry_overhead: DEFAULT_COMMIT_ENTRY_OVERHEAD,
            persistent_capacity: DEFAULT_PERSISTENT_CAPACITY,
            transient_reset_capacity: DEFAULT_TRANSIENT_CAPACITY,
            transient_deselect_capacity: DEFAULT_TRANSIENT_CAPACITY,
            integrity_sensitive_supported: true,
            debug: false,
        }
    }
}

impl CardConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.commit_capacity == 0 {
            return Err(ConfigError::ZeroCommitCapacity);
        }
        if self.commit_entry_overhead >= self.commit_capacity {
            return Err(ConfigError::OverheadExceedsCapacity {
                overhead: self.commit_entry_overhead,
                capacity: self.commit_capacity,
            });
        }

        Ok(())
    }

    #[must_use]
    pub const fn with_commit_capacity(mut self, capacity: u32) -> Self {
        self.commit_capacity = capacity;
        self
    }

    #[must_use]
    pub const fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = CardConfig::from_toml_str("").expect("empty config should parse");

        assert_eq!(config, CardConfig::default());
    }

    #[test]
    fn partial_document_overrides_only_named_fields() {
        let config = CardConfig::from_toml_str(
            r"
            commit_capacity = 64
            transient_deselect_capacity = 16
            debug = true
            ",
        )
        .expect("partial config should parse");

        assert_eq!(config.commit_capacity, 64);
        assert_eq!(config.transient_deselect_capacity, 16);
        assert!(config.debug);
        assert_eq!(config.commit_entry_overhead, DEFAULT_COMMIT_ENTRY_OVERHEAD);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = CardConfig::from_toml_str("commit_buffer = 12").expect_err("unknown key");

        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn overhead_must_leave_payload_room() {
        let err = CardConfig::from_toml_str(
            r"
            commit_capacity = 8
            commit_entry_overhead = 8
            ",
        )
        .expect_err("overhead equal to capacity should be rejected");

        assert!(matches!(
            err,
            ConfigError::OverheadExceedsCapacity {
                overhead: 8,
                capacity: 8
            }
        ));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = CardConfig::default()
            .with_commit_capacity(0)
            .validate()
            .expect_err("zero capacity should be rejected");

        assert!(matches!(err, ConfigError::ZeroCommitCapacity));
    }
}
