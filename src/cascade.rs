use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::image::{make_pixel_sampler, ImageBuffer};
use crate::tree::{PixelTest, RegressionTree, SplitRule};

/// Score returned for windows rejected by an early stage.
pub const REJECTED: f64 = -1.0;

/// Scores a square window of an image.
///
/// Positive scores mark candidate detections; the magnitude is the
/// confidence. Implementations must be pure so the scanner can evaluate
/// windows from several threads at once.
pub trait RegionClassifier: Sync {
    fn classify_region(&self, row: f64, col: f64, scale: f64, image: &ImageBuffer) -> f64;
}

impl<F> RegionClassifier for F
where
    F: Fn(f64, f64, f64, &ImageBuffer) -> f64 + Sync,
{
    fn classify_region(&self, row: f64, col: f64, scale: f64, image: &ImageBuffer) -> f64 {
        self(row, col, scale, image)
    }
}

/// One cascade stage: a single boosted tree plus the running-score threshold
/// checked after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeStage {
    pub tree: RegressionTree<f32>,
    pub threshold: f32,
}

/// A decoded PICO detection cascade.
///
/// The model is a sequence of depth-`tree_depth` pixel-comparison trees. A
/// window's score is the running sum of the leaves it reaches; as soon as
/// that sum drops below a stage threshold the window is rejected.
///
/// # Usage
///
/// ```ignore
/// let model = CascadeModel::from_pico_bytes(&std::fs::read("facefinder")?)?;
/// let score = model.classify_region(120.0, 160.0, 80.0, &image);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeModel {
    tree_depth: u32,
    stages: Vec<CascadeStage>,
}

impl CascadeModel {
    /// Create a cascade from already-built stages.
    pub fn new(tree_depth: u32, stages: Vec<CascadeStage>) -> Result<Self> {
        let model = Self { tree_depth, stages };
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<()> {
        if self.stages.is_empty() {
            return Err(Error::MalformedModel(
                "cascade must have at least one stage".into(),
            ));
        }
        for (i, stage) in self.stages.iter().enumerate() {
            stage.tree.validate()?;
            if stage.tree.depth() != self.tree_depth {
                return Err(Error::MalformedModel(format!(
                    "stage {} has depth {}, cascade depth is {}",
                    i,
                    stage.tree.depth(),
                    self.tree_depth
                )));
            }
        }
        Ok(())
    }

    /// Decode a cascade from the PICO binary format.
    pub fn from_pico_bytes(bytes: &[u8]) -> Result<Self> {
        crate::pico::unpack_cascade(bytes)
    }

    /// Load a model previously written with [`CascadeModel::save`].
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

    /// Number of trees, which is also the number of stages.
    pub fn tree_count(&self) -> usize {
        self.stages.len()
    }

    pub fn stages(&self) -> &[CascadeStage] {
        &self.stages
    }

    /// Score the window centered at `(row, col)` with side `scale`.
    ///
    /// Returns [`REJECTED`] when a stage rejects the window, otherwise the
    /// margin of the final running score over the last threshold.
    pub fn classify_region(&self, row: f64, col: f64, scale: f64, image: &ImageBuffer) -> f64 {
        let sample = make_pixel_sampler(image, row, col, scale);
        let goes_right = |test: &PixelTest| {
            let (first, second) = sample(test);
            SplitRule::RightIfNotBrighter.goes_right(first, second)
        };

        let mut score = 0.0f64;
        for stage in &self.stages {
            score += *stage.tree.predict(goes_right) as f64;
            if score < stage.threshold as f64 {
                return REJECTED;
            }
        }

        // validate() guarantees at least one stage
        let last = self.stages[self.stages.len() - 1].threshold as f64;
        score - last
    }
}

impl RegionClassifier for CascadeModel {
    fn classify_region(&self, row: f64, col: f64, scale: f64, image: &ImageBuffer) -> f64 {
        CascadeModel::classify_region(self, row, col, scale, image)
    }
}

/// Builder for creating a CascadeModel by hand.
pub struct CascadeModelBuilder {
    tree_depth: Option<u32>,
    stages: Vec<CascadeStage>,
}

impl CascadeModelBuilder {
    pub fn new() -> Self {
        Self {
            tree_depth: None,
            stages: Vec::new(),
        }
    }

    /// Set the tree depth. Defaults to the depth of the first stage.
    pub fn tree_depth(mut self, depth: u32) -> Self {
        self.tree_depth = Some(depth);
        self
    }

    /// Append a tree and the threshold checked after it.
    pub fn add_stage(mut self, tree: RegressionTree<f32>, threshold: f32) -> Self {
        self.stages.push(CascadeStage { tree, threshold });
        self
    }

    pub fn build(self) -> Result<CascadeModel> {
        let tree_depth = match (self.tree_depth, self.stages.first()) {
            (Some(depth), _) => depth,
            (None, Some(stage)) => stage.tree.depth(),
            (None, None) => {
                return Err(Error::MalformedModel(
                    "cascade must have at least one stage".into(),
                ))
            }
        };
        CascadeModel::new(tree_depth, self.stages)
    }
}

impl Default for CascadeModelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn read_bincode<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    Ok(bincode::deserialize(&bytes)?)
}

pub(crate) fn write_bincode<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let bytes = bincode::serialize(value)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Depth-1 stage comparing the window center against a point a quarter
    /// scale to the right. Left leaf when the center is brighter.
    fn center_vs_right(left: f32, right: f32) -> RegressionTree<f32> {
        RegressionTree::new(1, vec![PixelTest::new(0, 0, 0, 64)], vec![left, right]).unwrap()
    }

    fn step_image() -> ImageBuffer {
        // bright left half, dark right half
        ImageBuffer::from_fn(40, 40, |_, c| if c < 20 { 200 } else { 20 })
    }

    #[test]
    fn accumulates_across_stages() {
        let model = CascadeModelBuilder::new()
            .add_stage(center_vs_right(1.0, -1.0), -0.5)
            .add_stage(center_vs_right(2.0, -1.0), 0.5)
            .build()
            .unwrap();

        assert_eq!(model.tree_depth(), 1);
        assert_eq!(model.tree_count(), 2);

        // center at col 18 is bright, col 18 + 0.25 * 16 = 22 is dark: left leaves
        let image = step_image();
        let score = model.classify_region(20.0, 18.0, 16.0, &image);
        assert_eq!(score, 3.0 - 0.5);
    }

    #[test]
    fn early_stage_rejects() {
        let model = CascadeModelBuilder::new()
            .add_stage(center_vs_right(1.0, -1.0), 0.0)
            .add_stage(center_vs_right(100.0, 100.0), 0.0)
            .build()
            .unwrap();

        // flat dark region: tie, goes right, first stage scores -1 < 0
        let image = step_image();
        assert_eq!(model.classify_region(20.0, 30.0, 8.0, &image), REJECTED);
    }

    #[test]
    fn threshold_equality_passes() {
        let model = CascadeModelBuilder::new()
            .add_stage(center_vs_right(0.0, 0.0), 0.0)
            .build()
            .unwrap();

        let image = step_image();
        assert_eq!(model.classify_region(20.0, 30.0, 8.0, &image), 0.0);
    }

    #[test]
    fn classification_is_deterministic() {
        let model = CascadeModelBuilder::new()
            .add_stage(center_vs_right(0.7, -0.3), -1.0)
            .add_stage(center_vs_right(0.2, 0.1), -1.0)
            .build()
            .unwrap();
        let image = ImageBuffer::from_fn(64, 64, |r, c| ((r * 7 + c * 13) % 256) as u8);

        for &(r, c, s) in &[(10.0, 10.0, 12.0), (32.0, 40.0, 30.0), (50.0, 5.0, 20.0)] {
            let first = model.classify_region(r, c, s, &image);
            let second = model.classify_region(r, c, s, &image);
            assert_eq!(first.to_bits(), second.to_bits());
        }
    }

    #[test]
    fn builder_requires_stages() {
        assert!(CascadeModelBuilder::new().build().is_err());
    }

    #[test]
    fn rejects_mixed_depths() {
        let deep = RegressionTree::new(2, vec![PixelTest::default(); 3], vec![0.0; 4]).unwrap();
        let result = CascadeModelBuilder::new()
            .add_stage(center_vs_right(0.0, 0.0), 0.0)
            .add_stage(deep, 0.0)
            .build();
        assert!(matches!(result, Err(Error::MalformedModel(_))));
    }

    #[test]
    fn closures_are_classifiers() {
        let always = |_: f64, _: f64, scale: f64, _: &ImageBuffer| scale;
        let image = step_image();
        assert_eq!(always.classify_region(1.0, 1.0, 4.0, &image), 4.0);
    }

    #[test]
    fn save_and_load_model() {
        let model = CascadeModelBuilder::new()
            .add_stage(center_vs_right(0.5, -0.5), -0.25)
            .build()
            .unwrap();

        let temp_path = std::env::temp_dir().join("pico_face_cascade_test.bin");
        model.save(&temp_path).unwrap();

        let loaded = CascadeModel::load(&temp_path).unwrap();
        assert_eq!(loaded, model);

        std::fs::remove_file(temp_path).ok();
    }
}
