//! Tunable thresholds for the alignment pipeline.
//!
//! Every value has a named default below. A JSON config file only needs
//! the fields it wants to override.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Blob detections are made on a frame downscaled by this factor.
pub const DEFAULT_UPSCALE_FACTOR: f32 = 4.0;

/// Candidate area band, in downscaled px².
pub const DEFAULT_MIN_CANDIDATE_AREA: f32 = 2.0;
pub const DEFAULT_MAX_CANDIDATE_AREA: f32 = 100.0;

/// Maximum number of markers kept per frame.
pub const DEFAULT_MAX_MARKERS: usize = 5;

/// Full-resolution px added to the eye line before filtering.
pub const DEFAULT_EYE_LEVEL_OFFSET: f32 = 0.0;

/// Per-axis tolerance for facial triangle alignment (3 × 15 px).
pub const DEFAULT_TRIANGLE_TOLERANCE_PX: f32 = 45.0;

pub const DEFAULT_TILT_THRESHOLD_PX: f32 = 10.0;

/// Used by [`TiltThreshold::scale_relative_default`].
pub const DEFAULT_TILT_THRESHOLD_FRACTION: f32 = 0.05;

/// Allowed relative change in face box area before distance feedback.
pub const DEFAULT_DISTANCE_THRESHOLD: f32 = 0.1;

/// How the averaged tilt error is compared against its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum TiltThreshold {
    /// Absolute error in full-resolution pixels.
    Pixels(f32),
    /// Error as a fraction of the largest distance from the expected
    /// markers' centroid to any expected marker.
    ScaleRelative(f32),
}

impl Default for TiltThreshold {
    fn default() -> Self {
        TiltThreshold::Pixels(DEFAULT_TILT_THRESHOLD_PX)
    }
}

impl TiltThreshold {
    /// Scale-relative mode at its default fraction.
    pub const fn scale_relative_default() -> Self {
        TiltThreshold::ScaleRelative(DEFAULT_TILT_THRESHOLD_FRACTION)
    }

    pub fn value(&self) -> f32 {
        match self {
            TiltThreshold::Pixels(v) | TiltThreshold::ScaleRelative(v) => *v,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateConfig {
    pub upscale_factor: f32,
    pub min_area: f32,
    pub max_area: f32,
    pub max_markers: usize,
    pub eye_level_offset: f32,
}

impl Default for CandidateConfig {
    fn default() -> Self {
        Self {
            upscale_factor: DEFAULT_UPSCALE_FACTOR,
            min_area: DEFAULT_MIN_CANDIDATE_AREA,
            max_area: DEFAULT_MAX_CANDIDATE_AREA,
            max_markers: DEFAULT_MAX_MARKERS,
            eye_level_offset: DEFAULT_EYE_LEVEL_OFFSET,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub candidates: CandidateConfig,
    pub triangle_tolerance_px: f32,
    pub tilt_threshold: TiltThreshold,
    pub distance_threshold: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            candidates: CandidateConfig::default(),
            triangle_tolerance_px: DEFAULT_TRIANGLE_TOLERANCE_PX,
            tilt_threshold: TiltThreshold::default(),
            distance_threshold: DEFAULT_DISTANCE_THRESHOLD,
        }
    }
}

impl PipelineConfig {
    /// Load and validate a JSON config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        tracing::debug!(path = %path.as_ref().display(), "loaded pipeline config");
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let c = &self.candidates;
        non_negative("candidates.upscale_factor", c.upscale_factor)?;
        if c.upscale_factor == 0.0 {
            return Err(Error::InvalidConfig(
                "candidates.upscale_factor must be positive".to_string(),
            ));
        }
        non_negative("candidates.min_area", c.min_area)?;
        non_negative("candidates.max_area", c.max_area)?;
        if c.min_area > c.max_area {
            return Err(Error::InvalidConfig(format!(
                "candidate area band is empty: min {} > max {}",
                c.min_area, c.max_area
            )));
        }
        if !c.eye_level_offset.is_finite() {
            return Err(Error::InvalidConfig(
                "candidates.eye_level_offset must be finite".to_string(),
            ));
        }
        non_negative("triangle_tolerance_px", self.triangle_tolerance_px)?;
        non_negative("tilt_threshold", self.tilt_threshold.value())?;
        non_negative("distance_threshold", self.distance_threshold)?;
        Ok(())
    }
}

fn non_negative(name: &str, value: f32) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!(
            "{} must be a finite, non-negative number (got {})",
            name, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.candidates.max_markers, 5);
        assert_eq!(config.triangle_tolerance_px, 45.0);
        assert_eq!(config.tilt_threshold, TiltThreshold::Pixels(10.0));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let json = r#"{"distance_threshold": 0.3, "candidates": {"max_markers": 3}}"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.distance_threshold, 0.3);
        assert_eq!(config.candidates.max_markers, 3);
        assert_eq!(config.candidates.upscale_factor, DEFAULT_UPSCALE_FACTOR);
        assert_eq!(config.triangle_tolerance_px, DEFAULT_TRIANGLE_TOLERANCE_PX);
    }

    #[test]
    fn scale_relative_tilt_threshold_parses() {
        let json = r#"{"tilt_threshold": {"mode": "scale_relative", "value": 0.05}}"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.tilt_threshold, TiltThreshold::scale_relative_default());
    }

    #[test]
    fn rejects_inverted_area_band() {
        let mut config = PipelineConfig::default();
        config.candidates.min_area = 50.0;
        config.candidates.max_area = 10.0;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn rejects_negative_and_nan_thresholds() {
        let mut config = PipelineConfig::default();
        config.triangle_tolerance_px = -1.0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.distance_threshold = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn save_and_load_config() {
        let mut config = PipelineConfig::default();
        config.tilt_threshold = TiltThreshold::ScaleRelative(0.1);

        let temp_path = std::env::temp_dir().join("marker_fit_test_config.json");
        config.save(&temp_path).unwrap();

        let loaded = PipelineConfig::load(&temp_path).unwrap();
        assert_eq!(loaded, config);

        std::fs::remove_file(temp_path).ok();
    }
}
