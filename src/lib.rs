//! # pico-face
//!
//! Pure Rust face detection and pupil localization with pixel-intensity
//! comparison (PICO) cascades.
//!
//! This crate provides:
//! - **Model decoding**: the binary `facefinder` cascade and `puploc`
//!   localizer formats, optionally bzip2-compressed
//! - **Detection**: a multi-scale sliding-window scan evaluated in parallel
//! - **Clustering**: greedy non-maximum suppression by square-footprint IoU
//! - **Temporal fusion**: a per-session memory of recent frames
//! - **Localization**: pupil refinement by jittered regression-tree cascades
//!
//! Implements the detector from "Object Detection with Pixel Intensity
//! Comparisons Organized in Decision Trees" (Markuš et al., 2013).
//!
//! ## Algorithm Overview
//!
//! 1. Convert the frame to grayscale (`(7R + 7G + B) / 10`)
//! 2. For each window size from `min_size` up to `max_size`:
//!    - Slide a square window over the image
//!    - Run the cascade: each tree compares two pixels per level and adds
//!      its leaf score; the window is dropped as soon as the running score
//!      falls below a stage threshold
//! 3. Merge overlapping hits into clusters whose quality is the sum of
//!    their members'
//! 4. In video, fuse the clusters of the last few frames and cluster again
//! 5. Report clusters above a quality threshold
//! 6. Optionally refine both pupils with the localizer
//!
//! ## Quick Start
//!
//! ```rust
//! use pico_face::{
//!     CascadeModelBuilder, DetectorConfig, FaceDetector, ImageBuffer, RegressionTree,
//! };
//!
//! // Load a trained model
//! // let cascade = pico_face::pico::load_cascade("facefinder")?;
//!
//! // Or build a trivial one that accepts every window
//! let cascade = CascadeModelBuilder::new()
//!     .add_stage(RegressionTree::new(0, vec![], vec![1.0]).unwrap(), 0.0)
//!     .build()
//!     .unwrap();
//!
//! let mut config = DetectorConfig::default();
//! config.cascade.min_size = 20.0;
//! config.cascade.max_size = 40.0;
//! config.quality_threshold = 0.0;
//! let detector = FaceDetector::new(cascade, config).unwrap();
//!
//! // Grayscale frame, e.g. from ImageBuffer::from_rgba
//! let image = ImageBuffer::from_fn(120, 160, |r, c| ((r + c) % 256) as u8);
//!
//! let faces = detector.detect_image(&image);
//! println!("Found {} faces", faces.len());
//!
//! // Video: one session per stream
//! let mut session = detector.start_session().unwrap();
//! let faces = session.process_frame(&image).unwrap();
//! assert!(!faces.is_empty());
//! ```
//!
//! ## Custom Classifiers
//!
//! The scanner accepts anything implementing [`RegionClassifier`],
//! including plain closures:
//!
//! ```rust
//! use pico_face::{run_cascade, CascadeParams, ImageBuffer};
//!
//! let image = ImageBuffer::from_fn(64, 64, |_, _| 0);
//! let center = |row: f64, col: f64, _scale: f64, _img: &ImageBuffer| {
//!     if row == 32.0 && col == 32.0 { 1.0 } else { -1.0 }
//! };
//! let params = CascadeParams { min_size: 10.0, max_size: 11.0, scale_factor: 1.1, shift_factor: 0.1 };
//! let dets = run_cascade(&image, &center, &params).unwrap();
//! assert_eq!(dets.len(), 1);
//! ```

mod cascade;
mod cluster;
mod config;
mod detector;
mod error;
mod image;
mod localizer;
mod memory;
pub mod pico;
mod scan;
mod tree;
mod types;

pub use cascade::{CascadeModel, CascadeModelBuilder, CascadeStage, RegionClassifier, REJECTED};
pub use cluster::{calculate_iou, cluster_detections, validate_iou_threshold};
pub use config::{DetectorConfig, EyeLayout};
pub use detector::{DetectionSession, Face, FaceDetector};
pub use error::{Error, Result};
pub use self::image::{make_pixel_sampler, sample_pair, ImageBuffer};
pub use localizer::{LocalizerModel, CENTER_JITTER, SCALE_JITTER_MIN, SCALE_JITTER_RANGE};
pub use memory::DetectionMemory;
pub use scan::{run_cascade, CancelToken, CascadeParams, CascadeScanner};
pub use tree::{leaf_count, node_count, PixelTest, RegressionTree, SplitRule, TreeEnsemble, MAX_TREE_DEPTH};
pub use types::{Detection, Point};
