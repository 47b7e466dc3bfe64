use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RollbackError;
use crate::frame::FrameWindow;

pub const DEFAULT_MAX_FRAME_COUNT: u32 = 32;
pub const DEFAULT_INITIAL_CAPACITY: usize = 256;
pub const DEFAULT_ENTRY_TOLERANCE: f32 = 0.05;

/// Settings for a rollback group. Every field has a default, so a TOML file
/// only needs to name what it changes:
///
/// ```toml
/// max_frame_count = 16
/// entry_tolerance = 0.1
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollbackConfig {
    /// Number of most recent frames kept before eviction.
    pub max_frame_count: u32,
    /// Slots reserved up front in every container.
    pub initial_capacity: usize,
    /// Starting offset between logical and stored frame numbers.
    pub frame_offset: i32,
    /// Default distance used by the entry tester.
    pub entry_tolerance: f32,
    /// Worker threads for the phase pool, 0 lets rayon decide.
    pub worker_threads: usize,
}

impl Default for RollbackConfig {
    fn default() -> Self {
        RollbackConfig {
            max_frame_count: DEFAULT_MAX_FRAME_COUNT,
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            frame_offset: 0,
            entry_tolerance: DEFAULT_ENTRY_TOLERANCE,
            worker_threads: 0,
        }
    }
}

impl RollbackConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, RollbackError> {
        let config: RollbackConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RollbackError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, RollbackError> {
        toml::to_string_pretty(self).map_err(|e| RollbackError::InvalidConfig(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), RollbackError> {
        if self.max_frame_count == 0 {
            return Err(RollbackError::InvalidConfig(
                "max_frame_count must be at least 1".to_string(),
            ));
        }

        if self.max_frame_count > i32::MAX as u32 {
            return Err(RollbackError::InvalidConfig(format!(
                "max_frame_count {} exceeds the wrap-aware frame range",
                self.max_frame_count
            )));
        }

        if !self.entry_tolerance.is_finite() || self.entry_tolerance < 0.0 {
            return Err(RollbackError::InvalidConfig(format!(
                "entry_tolerance must be a non-negative finite distance, got {}",
                self.entry_tolerance
            )));
        }

        Ok(())
    }

    pub fn window(&self) -> FrameWindow {
        FrameWindow::with_offset(self.max_frame_count, self.frame_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(RollbackConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RollbackConfig::from_toml_str("max_frame_count = 8\nentry_tolerance = 0.5\n").unwrap();

        assert_eq!(config.max_frame_count, 8);
        assert_eq!(config.entry_tolerance, 0.5);
        assert_eq!(config.initial_capacity, DEFAULT_INITIAL_CAPACITY);
        assert_eq!(config.window().max_frame_count(), 8);
    }

    #[test]
    fn test_zero_window_rejected() {
        let err = RollbackConfig::from_toml_str("max_frame_count = 0").unwrap_err();
        assert!(matches!(err, RollbackError::InvalidConfig(_)));
    }

    #[test]
    fn test_negative_tolerance_rejected() {
        let err = RollbackConfig::from_toml_str("entry_tolerance = -1.0").unwrap_err();
        assert!(matches!(err, RollbackError::InvalidConfig(_)));
    }

    #[test]
    fn test_malformed_toml() {
        let err = RollbackConfig::from_toml_str("max_frame_count = \"lots\"").unwrap_err();
        assert!(matches!(err, RollbackError::ConfigParse(_)));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = RollbackConfig {
            max_frame_count: 12,
            frame_offset: -4,
            ..RollbackConfig::default()
        };

        let text = config.to_toml_string().unwrap();
        assert_eq!(RollbackConfig::from_toml_str(&text).unwrap(), config);
    }
}
