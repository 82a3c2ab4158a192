use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cluster::validate_iou_threshold;
use crate::error::{Error, Result};
use crate::scan::CascadeParams;
use crate::types::Detection;

/// Where to start looking for the pupils, relative to a face detection.
///
/// Offsets and the search scale are fractions of the face scale. The left
/// eye (in image coordinates) sits at `col - col_offset * scale`, the right
/// eye at `col + col_offset * scale`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EyeLayout {
    pub row_offset: f64,
    pub col_offset: f64,
    pub scale: f64,
}

impl Default for EyeLayout {
    fn default() -> Self {
        Self {
            row_offset: -0.075,
            col_offset: 0.175,
            scale: 0.35,
        }
    }
}

impl EyeLayout {
    /// Initial (row, col, scale) search regions for both eyes of a face.
    pub fn eye_regions(&self, face: &Detection) -> [(f64, f64, f64); 2] {
        let row = face.row + self.row_offset * face.scale;
        let dc = self.col_offset * face.scale;
        let scale = self.scale * face.scale;
        [(row, face.col - dc, scale), (row, face.col + dc, scale)]
    }
}

/// Every tunable of the detection pipeline.
///
/// Missing JSON fields fall back to their defaults, which reproduce the
/// reference face-finder behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub cascade: CascadeParams,
    /// Overlap above which two detections are merged.
    pub iou_threshold: f64,
    /// Clusters must score strictly above this to be reported. Cluster
    /// quality is a member sum, so this value is tied to `iou_threshold`
    /// and `memory_depth` as much as to the model.
    pub quality_threshold: f64,
    /// Number of frames fused by a detection session.
    pub memory_depth: usize,
    /// Jittered localizer runs per pupil.
    pub perturbations: usize,
    /// Seed for the perturbation generator; `None` seeds from entropy.
    pub seed: Option<u64>,
    pub eyes: EyeLayout,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            cascade: CascadeParams::default(),
            iou_threshold: 0.2,
            quality_threshold: 50.0,
            memory_depth: 5,
            perturbations: 63,
            seed: None,
            eyes: EyeLayout::default(),
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<()> {
        self.cascade.validate()?;
        validate_iou_threshold(self.iou_threshold)?;
        if !self.quality_threshold.is_finite() {
            return Err(Error::InvalidParameter(format!(
                "quality threshold must be finite, got {}",
                self.quality_threshold
            )));
        }
        if self.memory_depth == 0 {
            return Err(Error::InvalidParameter(
                "memory depth must be positive".into(),
            ));
        }
        if self.perturbations == 0 {
            return Err(Error::InvalidParameter(
                "perturbation count must be positive".into(),
            ));
        }
        let eyes = &self.eyes;
        if ![eyes.row_offset, eyes.col_offset, eyes.scale].iter().all(|v| v.is_finite())
            || eyes.scale <= 0.0
        {
            return Err(Error::InvalidParameter(format!(
                "invalid eye layout: {:?}",
                eyes
            )));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config = Self::from_json_str(&content)?;
        tracing::debug!(path = %path.as_ref().display(), "loaded detector config");
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
