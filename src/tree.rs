use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Point;

/// Deepest tree the decoders accept. Trained PICO models use depth 5-6.
pub const MAX_TREE_DEPTH: u32 = 24;

/// A binary pixel test: two sample points given as signed byte offsets
/// relative to the window center, in units of 1/256 of the window scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PixelTest {
    pub r1: i8,
    pub c1: i8,
    pub r2: i8,
    pub c2: i8,
}

impl PixelTest {
    pub const fn new(r1: i8, c1: i8, r2: i8, c2: i8) -> Self {
        Self { r1, c1, r2, c2 }
    }

    /// Decode the 4-byte on-disk node code `[r1, c1, r2, c2]`.
    pub fn from_code(code: [u8; 4]) -> Self {
        Self {
            r1: code[0] as i8,
            c1: code[1] as i8,
            r2: code[2] as i8,
            c2: code[3] as i8,
        }
    }

    pub fn to_code(&self) -> [u8; 4] {
        [self.r1 as u8, self.c1 as u8, self.r2 as u8, self.c2 as u8]
    }
}

/// Which way a split sends the window, given the two sampled intensities.
///
/// The detection cascade and the localizer were trained with opposite
/// polarities, so each model format carries its own rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitRule {
    /// Go right when the first sample is not brighter than the second.
    RightIfNotBrighter,
    /// Go right when the first sample is strictly brighter than the second.
    RightIfBrighter,
}

impl SplitRule {
    #[inline]
    pub fn goes_right(self, first: u8, second: u8) -> bool {
        match self {
            SplitRule::RightIfNotBrighter => first <= second,
            SplitRule::RightIfBrighter => first > second,
        }
    }
}

/// Number of internal nodes in a full binary tree of the given depth.
#[inline]
pub fn node_count(depth: u32) -> usize {
    (1usize << depth) - 1
}

/// Number of leaves in a full binary tree of the given depth.
#[inline]
pub fn leaf_count(depth: u32) -> usize {
    1usize << depth
}

/// A full binary decision tree over pixel tests.
///
/// Internal nodes are stored in heap order (root at 0, children of `i` at
/// `2i + 1` and `2i + 2`), so descent never needs explicit child links.
/// Leaves carry a scalar score for the detection cascade or a
/// (row, col) offset for the localizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree<L> {
    depth: u32,
    tests: Vec<PixelTest>,
    leaves: Vec<L>,
}

impl<L> RegressionTree<L> {
    /// Create a tree, checking that the node and leaf counts match `depth`.
    pub fn new(depth: u32, tests: Vec<PixelTest>, leaves: Vec<L>) -> Result<Self> {
        let tree = Self {
            depth,
            tests,
            leaves,
        };
        tree.validate()?;
        Ok(tree)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.depth > MAX_TREE_DEPTH {
            return Err(Error::MalformedModel(format!(
                "tree depth {} exceeds maximum of {}",
                self.depth, MAX_TREE_DEPTH
            )));
        }
        if self.tests.len() != node_count(self.depth) {
            return Err(Error::MalformedModel(format!(
                "depth-{} tree needs {} node codes, got {}",
                self.depth,
                node_count(self.depth),
                self.tests.len()
            )));
        }
        if self.leaves.len() != leaf_count(self.depth) {
            return Err(Error::MalformedModel(format!(
                "depth-{} tree needs {} leaves, got {}",
                self.depth,
                leaf_count(self.depth),
                self.leaves.len()
            )));
        }
        Ok(())
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn tests(&self) -> &[PixelTest] {
        &self.tests
    }

    pub fn leaves(&self) -> &[L] {
        &self.leaves
    }

    /// Descend from the root and return the index of the leaf reached.
    ///
    /// `goes_right` decides each split; it is called exactly `depth` times.
    pub fn leaf_index<F>(&self, goes_right: F) -> usize
    where
        F: Fn(&PixelTest) -> bool,
    {
        let mut idx = 0usize;
        for _ in 0..self.depth {
            idx = 2 * idx + 1 + goes_right(&self.tests[idx]) as usize;
        }
        idx - self.tests.len()
    }

    /// Traverse the tree and return a reference to the leaf value.
    pub fn predict<F>(&self, goes_right: F) -> &L
    where
        F: Fn(&PixelTest) -> bool,
    {
        &self.leaves[self.leaf_index(goes_right)]
    }
}

/// An ensemble of offset-regression trees evaluated as one localizer stage.
/// Each tree votes on a (row, col) adjustment and the votes are summed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    pub trees: Vec<RegressionTree<Point>>,
}

impl TreeEnsemble {
    pub fn new(trees: Vec<RegressionTree<Point>>) -> Self {
        Self { trees }
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Predict the stage offset by summing predictions from all trees.
    pub fn predict<F>(&self, goes_right: F) -> Point
    where
        F: Fn(&PixelTest) -> bool,
    {
        self.trees
            .iter()
            .fold(Point::zero(), |delta, tree| delta + *tree.predict(&goes_right))
    }
}
