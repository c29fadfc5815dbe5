//! Attendance configuration
//!
//! Loaded from TOML; every key is optional.
//!
//! ```toml
//! page_size = 25
//! skip_unchanged = true
//!
//! [justification]
//! min_reason_len = 10
//! max_reason_len = 500
//! ```

use crate::error::ConfigError;
use crate::justification::JustificationPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Attendance view configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttendanceConfig {
    /// Roster rows per page
    pub page_size: u32,
    /// Omit edits equal to the stored status from the batch
    pub skip_unchanged: bool,
    /// Reason text bounds
    pub justification: JustificationPolicy,
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            skip_unchanged: true,
            justification: JustificationPolicy::default(),
        }
    }
}

impl AttendanceConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With page size
    #[inline]
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// With unchanged-edit skipping on or off
    #[inline]
    #[must_use]
    pub fn with_skip_unchanged(mut self, skip: bool) -> Self {
        self.skip_unchanged = skip;
        self
    }

    /// With reason text bounds
    #[inline]
    #[must_use]
    pub fn with_justification(mut self, policy: JustificationPolicy) -> Self {
        self.justification = policy;
        self
    }

    /// Parse and validate TOML
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    /// Check value consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be positive".to_string()));
        }
        let policy = &self.justification;
        if policy.min_reason_len > policy.max_reason_len {
            return Err(ConfigError::Invalid(format!(
                "justification.min_reason_len ({}) exceeds max_reason_len ({})",
                policy.min_reason_len, policy.max_reason_len
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_toml_is_default() {
        let config = AttendanceConfig::from_toml_str("").unwrap();
        assert_eq!(config, AttendanceConfig::default());
        assert_eq!(config.justification.min_reason_len, 10);
        assert_eq!(config.justification.max_reason_len, 500);
    }

    #[test]
    fn partial_override() {
        let config = AttendanceConfig::from_toml_str(
            "page_size = 50\n[justification]\nmax_reason_len = 200\n",
        )
        .unwrap();
        assert_eq!(config.page_size, 50);
        assert!(config.skip_unchanged);
        assert_eq!(config.justification.min_reason_len, 10);
        assert_eq!(config.justification.max_reason_len, 200);
    }

    #[test]
    fn rejects_inconsistent_values() {
        assert!(matches!(
            AttendanceConfig::from_toml_str("page_size = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            AttendanceConfig::from_toml_str("[justification]\nmin_reason_len = 600"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            AttendanceConfig::from_toml_str("page_size = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "skip_unchanged = false").unwrap();

        let config = AttendanceConfig::load(file.path()).unwrap();
        assert!(!config.skip_unchanged);

        let missing = AttendanceConfig::load(file.path().with_extension("missing"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
