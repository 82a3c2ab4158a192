//! Non-maximum suppression by greedy clustering.

use crate::error::{Error, Result};
use crate::types::Detection;

/// Intersection-over-union of the square footprints of two detections.
pub fn calculate_iou(a: &Detection, b: &Detection) -> f64 {
    let (ha, hb) = (a.scale / 2.0, b.scale / 2.0);
    let overlap_r = ((a.row + ha).min(b.row + hb) - (a.row - ha).max(b.row - hb)).max(0.0);
    let overlap_c = ((a.col + ha).min(b.col + hb) - (a.col - ha).max(b.col - hb)).max(0.0);
    let intersection = overlap_r * overlap_c;
    intersection / (a.scale * a.scale + b.scale * b.scale - intersection)
}

/// Check that an IoU threshold lies strictly between 0 and 1.
pub fn validate_iou_threshold(iou_threshold: f64) -> Result<()> {
    if iou_threshold > 0.0 && iou_threshold < 1.0 {
        Ok(())
    } else {
        Err(Error::InvalidParameter(format!(
            "IoU threshold must lie in (0, 1), got {}",
            iou_threshold
        )))
    }
}

/// Merge overlapping detections.
///
/// Detections are visited in descending quality (ties keep input order).
/// Each one not yet claimed seeds a cluster that takes every later-or-equal
/// detection whose IoU with the seed exceeds `iou_threshold`, including
/// detections already claimed by an earlier seed. A cluster's position and
/// scale are member means; its quality is the member sum, so an object
/// that fired many overlapping windows outranks an isolated hit.
pub fn cluster_detections(detections: &[Detection], iou_threshold: f64) -> Vec<Detection> {
    let mut sorted = detections.to_vec();
    sorted.sort_by(|a, b| b.quality.total_cmp(&a.quality));

    let mut assigned = vec![false; sorted.len()];
    let mut clusters = Vec::new();

    for i in 0..sorted.len() {
        if assigned[i] {
            continue;
        }
        let seed = sorted[i];

        let (mut row, mut col, mut scale, mut quality) = (0.0, 0.0, 0.0, 0.0);
        let mut members = 0usize;
        for j in i..sorted.len() {
            let det = &sorted[j];
            if calculate_iou(&seed, det) > iou_threshold {
                assigned[j] = true;
                row += det.row;
                col += det.col;
                scale += det.scale;
                quality += det.quality;
                members += 1;
            }
        }

        // the seed overlaps itself with IoU 1
        if members > 0 {
            let n = members as f64;
            clusters.push(Detection::new(row / n, col / n, scale / n, quality));
        }
    }

    tracing::trace!(input = detections.len(), clusters = clusters.len(), "clustered detections");
    clusters
}
