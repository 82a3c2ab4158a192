//! Detection pipeline: scan, cluster, fuse over time, filter, localize.

use std::num::NonZeroUsize;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::cascade::CascadeModel;
use crate::cluster::cluster_detections;
use crate::config::DetectorConfig;
use crate::error::{Error, Result};
use crate::image::ImageBuffer;
use crate::localizer::LocalizerModel;
use crate::memory::DetectionMemory;
use crate::scan::{CancelToken, CascadeScanner};
use crate::types::{Detection, Point};

/// A reported face, with pupil positions when a localizer is attached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub detection: Detection,
    /// Left then right pupil, in image coordinates.
    pub pupils: Option<[Point; 2]>,
}

/// A configured detector. Cheap to clone: models are shared.
#[derive(Debug, Clone)]
pub struct FaceDetector {
    cascade: Arc<CascadeModel>,
    localizer: Option<Arc<LocalizerModel>>,
    config: DetectorConfig,
    scanner: CascadeScanner,
    perturbations: NonZeroUsize,
}

impl FaceDetector {
    /// Validate `config` and build a detector around `cascade`.
    pub fn new(cascade: CascadeModel, config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        let scanner = CascadeScanner::new(config.cascade)?;
        let perturbations = NonZeroUsize::new(config.perturbations).ok_or_else(|| {
            Error::InvalidParameter("perturbation count must be positive".into())
        })?;

        tracing::debug!(
            trees = cascade.tree_count(),
            depth = cascade.tree_depth(),
            "face detector ready"
        );
        Ok(Self {
            cascade: Arc::new(cascade),
            localizer: None,
            config,
            scanner,
            perturbations,
        })
    }

    /// Attach a pupil localizer.
    pub fn with_localizer(mut self, localizer: LocalizerModel) -> Self {
        self.localizer = Some(Arc::new(localizer));
        self
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn cascade(&self) -> &CascadeModel {
        &self.cascade
    }

    pub fn localizer(&self) -> Option<&LocalizerModel> {
        self.localizer.as_deref()
    }

    /// Detect faces in a single still image, without temporal fusion.
    pub fn detect_image(&self, image: &ImageBuffer) -> Vec<Face> {
        let raw = self.scanner.run(image, &*self.cascade);
        let clusters = cluster_detections(&raw, self.config.iou_threshold);
        let mut rng = make_rng(self.config.seed);
        self.report(clusters, image, &mut rng)
    }

    /// Begin a video session with fresh temporal memory.
    pub fn start_session(&self) -> Result<DetectionSession> {
        let memory = DetectionMemory::new(self.config.memory_depth)?;
        tracing::info!(memory_depth = memory.size(), "detection session started");
        Ok(DetectionSession {
            detector: self.clone(),
            memory,
            active: true,
            cancel: CancelToken::new(),
            rng: make_rng(self.config.seed),
            frames: 0,
        })
    }

    /// Keep clusters above the quality threshold and attach pupils.
    fn report(&self, clusters: Vec<Detection>, image: &ImageBuffer, rng: &mut StdRng) -> Vec<Face> {
        clusters
            .into_iter()
            .filter(|det| det.quality > self.config.quality_threshold)
            .map(|detection| Face {
                detection,
                pupils: self
                    .localizer
                    .as_deref()
                    .map(|localizer| self.locate_pupils(localizer, &detection, image, rng)),
            })
            .collect()
    }

    fn locate_pupils(
        &self,
        localizer: &LocalizerModel,
        face: &Detection,
        image: &ImageBuffer,
        rng: &mut StdRng,
    ) -> [Point; 2] {
        self.config.eyes.eye_regions(face).map(|(row, col, scale)| {
            localizer.localize(row, col, scale, self.perturbations, image, rng)
        })
    }
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Per-stream detection state: temporal memory plus a running flag.
///
/// Frames must be fed in order from one thread. Another thread may hold a
/// [`CancelToken`] from [`DetectionSession::cancel_token`] to abandon the
/// frame being scanned.
#[derive(Debug)]
pub struct DetectionSession {
    detector: FaceDetector,
    memory: DetectionMemory,
    active: bool,
    cancel: CancelToken,
    rng: StdRng,
    frames: u64,
}

impl DetectionSession {
    /// Process one frame.
    ///
    /// Clusters of this frame are fused with those of the previous frames
    /// and clustered again, so faces seen repeatedly accumulate quality.
    /// Returns `None` once the session is stopped or its scan was cancelled.
    pub fn process_frame(&mut self, image: &ImageBuffer) -> Option<Vec<Face>> {
        if !self.is_active() {
            self.stop();
            return None;
        }

        let detector = &self.detector;
        let iou = detector.config.iou_threshold;
        let Some(raw) = detector
            .scanner
            .run_cancellable(image, &*detector.cascade, &self.cancel)
        else {
            self.stop();
            return None;
        };

        let clusters = cluster_detections(&raw, iou);
        let fused = cluster_detections(&self.memory.push(clusters), iou);
        self.frames += 1;
        tracing::trace!(frame = self.frames, raw = raw.len(), fused = fused.len(), "frame processed");

        Some(detector.report(fused, image, &mut self.rng))
    }

    /// Stop the session and forget its history. Returns `false` if it was
    /// already stopped, either by an earlier call or through its
    /// [`CancelToken`].
    pub fn stop(&mut self) -> bool {
        let was_active = self.is_active();
        if self.active {
            self.cancel.cancel();
            self.memory.reset();
            self.active = false;
        }
        if was_active {
            tracing::info!(frames = self.frames, "detection session stopped");
        } else {
            tracing::debug!("detection session already stopped");
        }
        was_active
    }

    /// Whether the session still accepts frames. Cancelling its token ends
    /// it just as [`stop`](Self::stop) does.
    pub fn is_active(&self) -> bool {
        self.active && !self.cancel.is_cancelled()
    }

    /// Frames processed so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn detector(&self) -> &FaceDetector {
        &self.detector
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::CascadeModelBuilder;
    use crate::tree::{PixelTest, RegressionTree, TreeEnsemble};

    /// Fires everywhere with score 1: a depth-0 tree with leaf 1, threshold 0.
    fn always_face() -> CascadeModel {
        CascadeModelBuilder::new()
            .tree_depth(0)
            .add_stage(RegressionTree::new(0, vec![], vec![1.0]).unwrap(), 0.0)
            .build()
            .unwrap()
    }

    /// One window per scan on a 20x20 image: a single size-17 window with a
    /// stride larger than the image.
    fn single_window_config() -> DetectorConfig {
        let mut config = DetectorConfig::default();
        config.cascade.min_size = 17.0;
        config.cascade.max_size = 18.0;
        config.cascade.shift_factor = 2.0;
        config.quality_threshold = 0.5;
        config.memory_depth = 3;
        config.seed = Some(1);
        config
    }

    fn blank() -> ImageBuffer {
        ImageBuffer::from_fn(20, 20, |_, _| 0)
    }

    #[test]
    fn rejects_invalid_config() {
        let mut config = DetectorConfig::default();
        config.memory_depth = 0;
        assert!(FaceDetector::new(always_face(), config).is_err());
    }

    #[test]
    fn still_image_uses_one_frame() {
        let detector = FaceDetector::new(always_face(), single_window_config()).unwrap();
        let faces = detector.detect_image(&blank());

        assert_eq!(faces.len(), 1);
        let det = faces[0].detection;
        // offset floor(17 / 2 + 1) = 9; the next center would be 9 + 34
        assert_eq!((det.row, det.col, det.scale, det.quality), (9.0, 9.0, 17.0, 1.0));
        assert!(faces[0].pupils.is_none());
    }

    #[test]
    fn quality_threshold_is_strict() {
        let mut config = single_window_config();
        config.quality_threshold = 1.0;
        let detector = FaceDetector::new(always_face(), config).unwrap();
        assert!(detector.detect_image(&blank()).is_empty());
    }

    #[test]
    fn session_accumulates_quality_over_memory_depth() {
        let detector = FaceDetector::new(always_face(), single_window_config()).unwrap();
        let mut session = detector.start_session().unwrap();

        let qualities: Vec<f64> = (0..5)
            .map(|_| session.process_frame(&blank()).unwrap()[0].detection.quality)
            .collect();
        // saturates once the three-frame memory is full
        assert_eq!(qualities, vec![1.0, 2.0, 3.0, 3.0, 3.0]);
        assert_eq!(session.frames(), 5);
    }

    #[test]
    fn stopped_session_yields_nothing() {
        let detector = FaceDetector::new(always_face(), single_window_config()).unwrap();
        let mut session = detector.start_session().unwrap();
        assert!(session.is_active());

        assert!(session.stop());
        assert!(!session.stop());
        assert!(!session.is_active());
        assert!(session.process_frame(&blank()).is_none());
    }

    #[test]
    fn cancel_token_stops_session() {
        let detector = FaceDetector::new(always_face(), single_window_config()).unwrap();
        let mut session = detector.start_session().unwrap();

        session.cancel_token().cancel();
        assert!(!session.is_active());
        assert!(session.process_frame(&blank()).is_none());
        assert_eq!(session.frames(), 0);
    }

    #[test]
    fn stop_after_external_cancel_reports_already_stopped() {
        let detector = FaceDetector::new(always_face(), single_window_config()).unwrap();
        let mut session = detector.start_session().unwrap();
        assert!(session.process_frame(&blank()).is_some());

        session.cancel_token().cancel();
        assert!(!session.stop());
        assert!(!session.is_active());
        assert!(!session.stop());
        assert!(session.process_frame(&blank()).is_none());
        assert_eq!(session.frames(), 1);
    }

    #[test]
    fn new_session_starts_fresh() {
        let detector = FaceDetector::new(always_face(), single_window_config()).unwrap();
        let mut first = detector.start_session().unwrap();
        first.process_frame(&blank());
        first.process_frame(&blank());

        let mut second = detector.start_session().unwrap();
        let faces = second.process_frame(&blank()).unwrap();
        assert_eq!(faces[0].detection.quality, 1.0);
    }

    #[test]
    fn localizer_adds_pupils() {
        // zero-depth localizer with a fixed offset of one scale unit downwards
        let tree = RegressionTree::new(0, vec![], vec![Point::new(1.0, 0.0)]).unwrap();
        let localizer = LocalizerModel::new(0, 1.0, vec![TreeEnsemble::new(vec![tree])]).unwrap();
        let mut config = single_window_config();
        config.perturbations = 1;

        let detector = FaceDetector::new(always_face(), config)
            .unwrap()
            .with_localizer(localizer);
        let faces = detector.detect_image(&blank());
        let [left, right] = faces[0].pupils.unwrap();

        // both eyes start on the same row and move by their jittered scale
        assert!(left.col < 9.0 && right.col > 9.0);
        assert!(left.row > 9.0 && right.row > 9.0);

        // same seed, same answer
        assert_eq!(detector.detect_image(&blank()), faces);
    }

    #[test]
    fn pixel_tests_see_the_frame() {
        // fires only where the window center is brighter than a point to its
        // right, which sends the split left
        let tree = RegressionTree::new(1, vec![PixelTest::new(0, 0, 0, 100)], vec![1.0, -1.0]).unwrap();
        let cascade = CascadeModelBuilder::new()
            .tree_depth(1)
            .add_stage(tree, 0.0)
            .build()
            .unwrap();
        let detector = FaceDetector::new(cascade, single_window_config()).unwrap();

        assert!(detector.detect_image(&blank()).is_empty());
        let bright_center = ImageBuffer::from_fn(20, 20, |_, c| if c < 12 { 200 } else { 0 });
        assert_eq!(detector.detect_image(&bright_center).len(), 1);
    }
}
