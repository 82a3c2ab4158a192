//! Multi-scale sliding-window driver.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cascade::RegionClassifier;
use crate::error::{Error, Result};
use crate::image::ImageBuffer;
use crate::types::Detection;

/// Window sizes and strides for one scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeParams {
    /// Smallest window side, in pixels.
    pub min_size: f64,
    /// Scanning stops once the window side reaches this size.
    pub max_size: f64,
    /// Growth factor between consecutive window sizes. Must exceed 1.
    pub scale_factor: f64,
    /// Window stride as a fraction of the window side.
    pub shift_factor: f64,
}

impl Default for CascadeParams {
    fn default() -> Self {
        Self {
            min_size: 100.0,
            max_size: 1000.0,
            scale_factor: 1.1,
            shift_factor: 0.1,
        }
    }
}

impl CascadeParams {
    pub fn validate(&self) -> Result<()> {
        let finite = [self.min_size, self.max_size, self.scale_factor, self.shift_factor]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err(Error::InvalidParameter(format!(
                "cascade parameters must be finite: {:?}",
                self
            )));
        }
        if self.min_size <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "min_size must be positive, got {}",
                self.min_size
            )));
        }
        if self.max_size <= self.min_size {
            return Err(Error::InvalidParameter(format!(
                "max_size {} must exceed min_size {}",
                self.max_size, self.min_size
            )));
        }
        if self.scale_factor <= 1.0 {
            return Err(Error::InvalidParameter(format!(
                "scale_factor must exceed 1, got {}",
                self.scale_factor
            )));
        }
        if self.shift_factor <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "shift_factor must be positive, got {}",
                self.shift_factor
            )));
        }
        Ok(())
    }

    /// Window sizes visited by a scan, smallest first.
    pub fn scales(&self) -> impl Iterator<Item = f64> + '_ {
        std::iter::successors(Some(self.min_size), move |s| Some(s * self.scale_factor))
            .take_while(move |&s| s < self.max_size)
    }
}

/// Cooperative cancellation flag shared between a scan and its owner.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Grid geometry for one window size: stride and first/last center.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScaleGrid {
    step: usize,
    offset: usize,
}

impl ScaleGrid {
    fn new(scale: f64, shift_factor: f64) -> Self {
        Self {
            step: ((shift_factor * scale).floor() as usize).max(1),
            offset: (scale / 2.0 + 1.0).floor() as usize,
        }
    }

    /// Window centers along an axis of length `dim`, from `offset` to
    /// `dim - offset` inclusive.
    fn centers(&self, dim: usize) -> impl Iterator<Item = usize> {
        let end = dim.checked_sub(self.offset);
        let start = self.offset;
        (start..=end.unwrap_or(0))
            .step_by(self.step)
            .take_while(move |_| end.is_some())
    }
}

/// Sliding-window scanner with validated parameters.
///
/// Rows of one window size are evaluated in parallel; the output order is
/// still increasing scale, then row-major, which the clustering tie-break
/// relies on.
#[derive(Debug, Clone)]
pub struct CascadeScanner {
    params: CascadeParams,
}

impl CascadeScanner {
    pub fn new(params: CascadeParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &CascadeParams {
        &self.params
    }

    /// Scan the whole image and return every window with a positive score.
    pub fn run<C>(&self, image: &ImageBuffer, classifier: &C) -> Vec<Detection>
    where
        C: RegionClassifier + ?Sized,
    {
        self.scan(image, classifier, None).unwrap_or_default()
    }

    /// Like [`CascadeScanner::run`], but checks `cancel` before every window
    /// and returns `None` if the scan was abandoned.
    pub fn run_cancellable<C>(
        &self,
        image: &ImageBuffer,
        classifier: &C,
        cancel: &CancelToken,
    ) -> Option<Vec<Detection>>
    where
        C: RegionClassifier + ?Sized,
    {
        self.scan(image, classifier, Some(cancel))
    }

    fn scan<C>(
        &self,
        image: &ImageBuffer,
        classifier: &C,
        cancel: Option<&CancelToken>,
    ) -> Option<Vec<Detection>>
    where
        C: RegionClassifier + ?Sized,
    {
        let cancelled = || cancel.is_some_and(CancelToken::is_cancelled);
        let mut detections = Vec::new();

        for scale in self.params.scales() {
            let grid = ScaleGrid::new(scale, self.params.shift_factor);
            let rows: Vec<usize> = grid.centers(image.nrows()).collect();

            let per_row: Option<Vec<Vec<Detection>>> = rows
                .par_iter()
                .map(|&r| {
                    let mut found = Vec::new();
                    for c in grid.centers(image.ncols()) {
                        if cancelled() {
                            return None;
                        }
                        let (row, col) = (r as f64, c as f64);
                        let q = classifier.classify_region(row, col, scale, image);
                        if q > 0.0 {
                            found.push(Detection::new(row, col, scale, q));
                        }
                    }
                    Some(found)
                })
                .collect();

            let Some(per_row) = per_row else {
                tracing::debug!(scale, "scan cancelled");
                return None;
            };
            let before = detections.len();
            detections.extend(per_row.into_iter().flatten());
            tracing::trace!(
                scale,
                step = grid.step,
                rows = rows.len(),
                hits = detections.len() - before,
                "scanned scale"
            );
        }

        tracing::debug!(detections = detections.len(), "cascade scan finished");
        Some(detections)
    }
}

/// Validate `params` and scan `image` once.
pub fn run_cascade<C>(image: &ImageBuffer, classifier: &C, params: &CascadeParams) -> Result<Vec<Detection>>
where
    C: RegionClassifier + ?Sized,
{
    Ok(CascadeScanner::new(*params)?.run(image, classifier))
}
