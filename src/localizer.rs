use std::num::NonZeroUsize;
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::cascade::{read_bincode, write_bincode};
use crate::error::{Error, Result};
use crate::image::{make_pixel_sampler, ImageBuffer};
use crate::tree::{PixelTest, SplitRule, TreeEnsemble};
use crate::types::Point;

/// Lower bound of the random scale jitter, as a fraction of the input scale.
pub const SCALE_JITTER_MIN: f64 = 0.925;
/// Width of the random scale jitter interval.
pub const SCALE_JITTER_RANGE: f64 = 0.15;
/// Maximum center jitter along each axis, as a fraction of the input scale.
pub const CENTER_JITTER: f64 = 0.15;

/// A decoded PICO point localizer (e.g. a pupil locator).
///
/// The model is a cascade of regression-tree ensembles. Each stage samples
/// pixel tests around the current estimate, sums the trees' (row, col)
/// offsets, moves the estimate by `offset * scale` and shrinks the scale by
/// `scale_multiplier` before the next stage. There is no rejection: every
/// stage always runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizerModel {
    tree_depth: u32,
    scale_multiplier: f32,
    stages: Vec<TreeEnsemble>,
}

impl LocalizerModel {
    pub fn new(tree_depth: u32, scale_multiplier: f32, stages: Vec<TreeEnsemble>) -> Result<Self> {
        let model = Self {
            tree_depth,
            scale_multiplier,
            stages,
        };
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<()> {
        if !(self.scale_multiplier.is_finite() && self.scale_multiplier > 0.0) {
            return Err(Error::MalformedModel(format!(
                "scale multiplier must be positive and finite, got {}",
                self.scale_multiplier
            )));
        }
        let Some(first) = self.stages.first() else {
            return Err(Error::MalformedModel(
                "localizer must have at least one stage".into(),
            ));
        };
        let trees_per_stage = first.len();
        if trees_per_stage == 0 {
            return Err(Error::MalformedModel(
                "localizer stages must have at least one tree".into(),
            ));
        }

        for (i, stage) in self.stages.iter().enumerate() {
            if stage.len() != trees_per_stage {
                return Err(Error::MalformedModel(format!(
                    "stage {} has {} trees, expected {}",
                    i,
                    stage.len(),
                    trees_per_stage
                )));
            }
            for tree in &stage.trees {
                tree.validate()?;
                if tree.depth() != self.tree_depth {
                    return Err(Error::MalformedModel(format!(
                        "stage {} has a depth-{} tree, localizer depth is {}",
                        i,
                        tree.depth(),
                        self.tree_depth
                    )));
                }
            }
        }
        Ok(())
    }

    /// Decode a localizer from the PICO binary format.
    pub fn from_pico_bytes(bytes: &[u8]) -> Result<Self> {
        crate::pico::unpack_localizer(bytes)
    }

    /// Load a model previously written with [`LocalizerModel::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let model: Self = read_bincode(path)?;
        model.validate()?;
        Ok(model)
    }

    /// Save the decoded model in this crate's native format.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_bincode(self, path)
    }

    pub fn tree_depth(&self) -> u32 {
        self.tree_depth
    }

    pub fn scale_multiplier(&self) -> f32 {
        self.scale_multiplier
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn trees_per_stage(&self) -> usize {
        self.stages[0].len()
    }

    pub fn stages(&self) -> &[TreeEnsemble] {
        &self.stages
    }

    /// Run every stage once from the given estimate, without jitter.
    pub fn estimate(&self, row: f64, col: f64, scale: f64, image: &ImageBuffer) -> Point {
        let mut position = Point::new(row, col);
        let mut scale = scale;

        for stage in &self.stages {
            let sample = make_pixel_sampler(image, position.row, position.col, scale);
            let delta = stage.predict(|test: &PixelTest| {
                let (first, second) = sample(test);
                SplitRule::RightIfBrighter.goes_right(first, second)
            });

            position += delta * scale;
            scale *= self.scale_multiplier as f64;
        }

        position
    }

    /// Estimate the point from `perturbations` randomly jittered starts and
    /// return the per-axis median.
    ///
    /// The two coordinates are medians taken independently, so they need not
    /// come from the same trial.
    pub fn localize<R: Rng + ?Sized>(
        &self,
        row: f64,
        col: f64,
        scale: f64,
        perturbations: NonZeroUsize,
        image: &ImageBuffer,
        rng: &mut R,
    ) -> Point {
        self.localize_with(row, col, scale, perturbations, image, || rng.gen::<f64>())
    }

    /// Like [`LocalizerModel::localize`], drawing uniform `[0, 1)` values from
    /// `next_unit`. Each trial draws three values: scale, row, then column.
    pub fn localize_with<F>(
        &self,
        row: f64,
        col: f64,
        scale: f64,
        perturbations: NonZeroUsize,
        image: &ImageBuffer,
        mut next_unit: F,
    ) -> Point
    where
        F: FnMut() -> f64,
    {
        let n = perturbations.get();
        let mut rows = Vec::with_capacity(n);
        let mut cols = Vec::with_capacity(n);

        for _ in 0..n {
            let trial_scale = scale * (SCALE_JITTER_MIN + SCALE_JITTER_RANGE * next_unit());
            let trial_row = row + scale * CENTER_JITTER * (0.5 - next_unit());
            let trial_col = col + scale * CENTER_JITTER * (0.5 - next_unit());

            let p = self.estimate(trial_row, trial_col, trial_scale, image);
            rows.push(p.row);
            cols.push(p.col);
        }

        rows.sort_by(f64::total_cmp);
        cols.sort_by(f64::total_cmp);

        let mid = median_index(n);
        Point::new(rows[mid], cols[mid])
    }
}

/// Index of the reported median: `round(n / 2)`, kept in bounds for `n == 1`.
fn median_index(n: usize) -> usize {
    ((n as f64 / 2.0).round() as usize).min(n - 1)
}
