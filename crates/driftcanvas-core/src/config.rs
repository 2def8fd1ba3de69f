//! Engine configuration.
//!
//! Every tunable constant of the engine lives here so hosts can override
//! them from a JSON document without recompiling.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid value for `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

/// Parameters of the mantissa/exponent camera representation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Base of the exponent (scale = mantissa * factor^exponent).
    pub factor: f64,
    /// Inclusive lower bound of the mantissa band.
    pub min_mantissa: f64,
    /// Exclusive upper bound of the mantissa band.
    pub max_mantissa: f64,
    /// Largest render-space translation magnitude allowed on one axis is half of this.
    pub translation_limit: f64,
    /// Smallest reachable scene scale.
    pub min_scale: f64,
    /// Largest reachable scene scale.
    pub max_scale: f64,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            factor: 2.0,
            min_mantissa: 0.5,
            max_mantissa: 4.0,
            translation_limit: 10_000.0,
            min_scale: 1e-9,
            max_scale: 1e12,
        }
    }
}

/// Parameters for selection handle layout and hit testing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandleConfig {
    /// Handle radius at scale 1, in scene units.
    pub base_size: f64,
    /// Multiplier applied to the handle radius when hit testing.
    pub hit_padding: f64,
    /// Minimum hit distance in screen pixels.
    pub min_pixel_threshold: f64,
    /// Minimum distance of the rotation handle above the top edge.
    pub rotate_offset_min: f64,
    /// Rotation handle distance as a fraction of the larger box side.
    pub rotate_offset_ratio: f64,
}

impl Default for HandleConfig {
    fn default() -> Self {
        Self {
            base_size: 8.0,
            hit_padding: 1.5,
            min_pixel_threshold: 12.0,
            rotate_offset_min: 40.0,
            rotate_offset_ratio: 0.1,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Lower bound for node width and height, in scene units.
    pub min_node_size: f64,
    /// Maximum number of entries on each history stack.
    pub history_limit: usize,
    pub normalizer: NormalizerConfig,
    pub handles: HandleConfig,
    /// Minimum acceptable rendered-pixels-per-source-pixel for tiled images.
    pub min_tile_density: f64,
    /// On-screen size of newly created shape nodes, in device pixels.
    pub default_node_screen_size: f64,
    /// On-screen font size of newly created text nodes, in device pixels.
    pub default_font_size: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_node_size: 1.0,
            history_limit: 200,
            normalizer: NormalizerConfig::default(),
            handles: HandleConfig::default(),
            min_tile_density: 0.85,
            default_node_screen_size: 100.0,
            default_font_size: 24.0,
        }
    }
}

impl EngineConfig {
    /// Parse a (possibly partial) JSON configuration. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration is internally consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive("min_node_size", self.min_node_size)?;
        if self.history_limit == 0 {
            return Err(invalid("history_limit", "must be at least 1"));
        }
        self.normalizer.validate()?;
        check_positive("handles.base_size", self.handles.base_size)?;
        check_positive("min_tile_density", self.min_tile_density)?;
        check_positive("default_node_screen_size", self.default_node_screen_size)?;
        check_positive("default_font_size", self.default_font_size)?;
        Ok(())
    }

    /// `self` if it validates, otherwise the defaults.
    pub fn or_default(self) -> Self {
        match self.validate() {
            Ok(()) => self,
            Err(err) => {
                log::warn!("falling back to default engine configuration: {}", err);
                Self::default()
            }
        }
    }
}

impl NormalizerConfig {
    /// Check the mantissa band, exponent base and scale range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let n = self;
        if !(n.factor.is_finite() && n.factor > 1.0) {
            return Err(invalid("normalizer.factor", "must be a finite number greater than 1"));
        }
        check_positive("normalizer.min_mantissa", n.min_mantissa)?;
        check_positive("normalizer.max_mantissa", n.max_mantissa)?;
        // The band must be at least one factor wide, otherwise renormalization can oscillate.
        if n.max_mantissa / n.min_mantissa < n.factor {
            return Err(invalid(
                "normalizer.max_mantissa",
                format!("band [{}, {}) is narrower than factor {}", n.min_mantissa, n.max_mantissa, n.factor),
            ));
        }
        check_positive("normalizer.translation_limit", n.translation_limit)?;
        check_positive("normalizer.min_scale", n.min_scale)?;
        if !(n.max_scale.is_finite() && n.max_scale > n.min_scale) {
            return Err(invalid("normalizer.max_scale", "must be finite and above min_scale"));
        }
        Ok(())
    }

    /// `self` if it validates, otherwise the defaults.
    pub fn or_default(self) -> Self {
        match self.validate() {
            Ok(()) => self,
            Err(err) => {
                log::warn!("falling back to default normalizer configuration: {}", err);
                Self::default()
            }
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    let err = ConfigError::Invalid {
        field,
        reason: reason.into(),
    };
    log::warn!("{}", err);
    err
}

fn check_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("expected a positive finite number, got {}", value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json(r#"{ "history_limit": 10, "normalizer": { "factor": 4.0, "max_mantissa": 8.0 } }"#)
            .unwrap();
        assert_eq!(config.history_limit, 10);
        assert!((config.normalizer.factor - 4.0).abs() < f64::EPSILON);
        assert!((config.normalizer.min_mantissa - 0.5).abs() < f64::EPSILON);
        assert!((config.min_node_size - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_narrow_mantissa_band_rejected() {
        let result = EngineConfig::from_json(r#"{ "normalizer": { "min_mantissa": 1.0, "max_mantissa": 1.5 } }"#);
        assert!(matches!(result, Err(ConfigError::Invalid { field: "normalizer.max_mantissa", .. })));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(EngineConfig::from_json("{ nope"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unit_factor_falls_back_to_defaults() {
        let mut config = EngineConfig::default();
        config.normalizer.factor = 1.0;
        config.history_limit = 7;
        assert!(matches!(
            config.normalizer.validate(),
            Err(ConfigError::Invalid { field: "normalizer.factor", .. })
        ));
        assert_eq!(config.normalizer.or_default(), NormalizerConfig::default());
        assert_eq!(config.or_default(), EngineConfig::default());
    }

    #[test]
    fn test_valid_config_kept_by_or_default() {
        let mut config = EngineConfig::default();
        config.history_limit = 7;
        assert_eq!(config.clone().or_default(), config);
    }

    #[test]
    fn test_zero_history_limit_rejected() {
        let mut config = EngineConfig::default();
        config.history_limit = 0;
        assert!(config.validate().is_err());
    }
}
