//! Reader and writer for the PICO binary model formats.
//!
//! Two formats are supported, both little-endian and fixed-layout:
//!
//! **Detection cascade** (`facefinder`-style files)
//!
//! ```text
//! [8 bytes]  ignored header (format version, training metadata)
//! [i32]      tree depth d
//! [i32]      tree count n
//! n records of:
//!   [4 * (2^d - 1) bytes]  node codes, one (r1, c1, r2, c2) i8 quad per internal node
//!   [2^d f32]              leaf scores
//!   [f32]                  stage threshold
//! ```
//!
//! The reference evaluator addresses node codes as if each tree were
//! prefixed by four zero bytes, so that heap index `i` (root at 1) lands at
//! `root + 4 * i`. [`RegressionTree`] stores nodes 0-indexed instead, which
//! is the same layout without the pad.
//!
//! **Pupil localizer** (`puploc`-style files)
//!
//! ```text
//! [i32]  stage count
//! [f32]  scale multiplier applied after each stage
//! [i32]  trees per stage
//! [i32]  tree depth d
//! stages * trees records of:
//!   [4 * (2^d - 1) bytes]              node codes
//!   [2 * (4 * (2^d - 1) + 4) f32]      interleaved (row, col) leaf pairs
//! ```
//!
//! Every record stores `4 * 2^d` leaf pairs, but leaves are not addressed
//! per record. The pair blocks of all records form one sequence and tree
//! `m` (counting `stage * trees + tree`) owns pairs `[m * 2^d, (m + 1) * 2^d)`
//! of it. Only the first quarter of the sequence is ever addressed; the
//! writer zero-fills the rest.
//!
//! Both readers reject any input whose length differs from the length the
//! header implies, including trailing bytes.

use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use bzip2::read::BzDecoder;

use crate::cascade::{CascadeModel, CascadeStage};
use crate::error::{Error, Result};
use crate::localizer::LocalizerModel;
use crate::tree::{leaf_count, node_count, PixelTest, RegressionTree, TreeEnsemble, MAX_TREE_DEPTH};
use crate::types::Point;

/// Bytes skipped at the start of a cascade file.
pub const CASCADE_HEADER_SKIP: usize = 8;

/// Bytes before the first cascade record: skipped header plus depth and count.
pub const CASCADE_PREAMBLE_LEN: usize = CASCADE_HEADER_SKIP + 8;

/// Bytes before the first localizer record.
pub const LOCALIZER_PREAMBLE_LEN: usize = 16;

fn supported_depth(depth: u32) -> Option<u32> {
    (depth <= MAX_TREE_DEPTH).then_some(depth)
}

/// Size in bytes of one cascade tree record, or `None` past
/// [`MAX_TREE_DEPTH`].
pub fn cascade_record_len(depth: u32) -> Option<usize> {
    let depth = supported_depth(depth)?;
    Some(4 * node_count(depth) + 4 * leaf_count(depth) + 4)
}

/// Number of (row, col) leaf pairs stored per localizer tree record, or
/// `None` past [`MAX_TREE_DEPTH`].
pub fn localizer_stored_pairs(depth: u32) -> Option<usize> {
    let depth = supported_depth(depth)?;
    Some(4 * node_count(depth) + 4)
}

/// Size in bytes of one localizer tree record, or `None` past
/// [`MAX_TREE_DEPTH`].
pub fn localizer_record_len(depth: u32) -> Option<usize> {
    Some(4 * node_count(depth) + 8 * localizer_stored_pairs(depth)?)
}

/// Expected total length of a cascade file, or `None` on overflow or an
/// unsupported depth.
pub fn cascade_file_len(depth: u32, tree_count: usize) -> Option<usize> {
    tree_count
        .checked_mul(cascade_record_len(depth)?)?
        .checked_add(CASCADE_PREAMBLE_LEN)
}

/// Expected total length of a localizer file, or `None` on overflow or an
/// unsupported depth.
pub fn localizer_file_len(depth: u32, stage_count: usize, trees_per_stage: usize) -> Option<usize> {
    stage_count
        .checked_mul(trees_per_stage)?
        .checked_mul(localizer_record_len(depth)?)?
        .checked_add(LOCALIZER_PREAMBLE_LEN)
}

/// Little-endian cursor over a model buffer that reports truncation as a
/// malformed model rather than an I/O error.
struct PicoReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> PicoReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(bytes),
        }
    }

    fn position(&self) -> u64 {
        self.cursor.position()
    }

    fn truncated(&self, what: &str) -> Error {
        Error::MalformedModel(format!(
            "unexpected end of data reading {} at byte {}",
            what,
            self.position()
        ))
    }

    fn skip(&mut self, n: usize) -> Result<()> {
        let len = self.cursor.get_ref().len() as u64;
        let target = self.position() + n as u64;
        if target > len {
            return Err(self.truncated("header"));
        }
        self.cursor.set_position(target);
        Ok(())
    }

    fn read_i32(&mut self, what: &str) -> Result<i32> {
        self.cursor
            .read_i32::<LittleEndian>()
            .map_err(|_| self.truncated(what))
    }

    fn read_f32(&mut self, what: &str) -> Result<f32> {
        self.cursor
            .read_f32::<LittleEndian>()
            .map_err(|_| self.truncated(what))
    }

    fn read_tests(&mut self, count: usize) -> Result<Vec<PixelTest>> {
        let mut tests = Vec::with_capacity(count);
        for _ in 0..count {
            let mut code = [0u8; 4];
            self.cursor
                .read_exact(&mut code)
                .map_err(|_| self.truncated("node code"))?;
            tests.push(PixelTest::from_code(code));
        }
        Ok(tests)
    }
}

fn checked_depth(raw: i32) -> Result<u32> {
    if raw < 0 || raw as u32 > MAX_TREE_DEPTH {
        return Err(Error::MalformedModel(format!(
            "tree depth {} outside 0..={}",
            raw, MAX_TREE_DEPTH
        )));
    }
    Ok(raw as u32)
}

fn checked_count(raw: i32, what: &str) -> Result<usize> {
    if raw <= 0 {
        return Err(Error::MalformedModel(format!("{} must be positive, got {}", what, raw)));
    }
    Ok(raw as usize)
}

fn check_len(actual: usize, expected: Option<usize>, what: &str) -> Result<()> {
    match expected {
        Some(expected) if expected == actual => Ok(()),
        Some(expected) => Err(Error::MalformedModel(format!(
            "{} header implies {} bytes, got {}",
            what, expected, actual
        ))),
        None => Err(Error::MalformedModel(format!("{} header sizes overflow", what))),
    }
}

/// Decode a detection cascade from PICO bytes.
pub fn unpack_cascade(bytes: &[u8]) -> Result<CascadeModel> {
    let mut r = PicoReader::new(bytes);

    // 1. Header
    r.skip(CASCADE_HEADER_SKIP)?;
    let depth = checked_depth(r.read_i32("tree depth")?)?;
    let tree_count = checked_count(r.read_i32("tree count")?, "tree count")?;
    check_len(bytes.len(), cascade_file_len(depth, tree_count), "cascade")?;

    // 2. One record per tree
    let mut stages = Vec::with_capacity(tree_count);
    for _ in 0..tree_count {
        let tests = r.read_tests(node_count(depth))?;
        let mut leaves = Vec::with_capacity(leaf_count(depth));
        for _ in 0..leaf_count(depth) {
            leaves.push(r.read_f32("leaf score")?);
        }
        let threshold = r.read_f32("stage threshold")?;

        stages.push(CascadeStage {
            tree: RegressionTree::new(depth, tests, leaves)?,
            threshold,
        });
    }

    tracing::debug!(depth, trees = tree_count, "unpacked detection cascade");
    CascadeModel::new(depth, stages)
}

/// Decode a pupil localizer from PICO bytes.
pub fn unpack_localizer(bytes: &[u8]) -> Result<LocalizerModel> {
    let mut r = PicoReader::new(bytes);

    // 1. Header
    let stage_count = checked_count(r.read_i32("stage count")?, "stage count")?;
    let scale_multiplier = r.read_f32("scale multiplier")?;
    let trees_per_stage = checked_count(r.read_i32("trees per stage")?, "trees per stage")?;
    let depth = checked_depth(r.read_i32("tree depth")?)?;
    check_len(
        bytes.len(),
        localizer_file_len(depth, stage_count, trees_per_stage),
        "localizer",
    )?;

    // 2. stage_count * trees_per_stage records. Node codes stay with their
    // record; leaf pairs are addressed across the concatenated pair blocks.
    let tree_total = stage_count * trees_per_stage;
    let stored_pairs = 4 * leaf_count(depth);
    let mut codes = Vec::with_capacity(tree_total);
    let mut pairs = Vec::with_capacity(tree_total * stored_pairs);
    for _ in 0..tree_total {
        codes.push(r.read_tests(node_count(depth))?);
        for _ in 0..stored_pairs {
            let dr = r.read_f32("leaf row offset")?;
            let dc = r.read_f32("leaf col offset")?;
            pairs.push(Point::new(dr as f64, dc as f64));
        }
    }

    // 3. Tree m takes pairs [m * 2^d, (m + 1) * 2^d)
    let mut trees = codes
        .into_iter()
        .zip(pairs.chunks_exact(leaf_count(depth)))
        .map(|(tests, leaves)| RegressionTree::new(depth, tests, leaves.to_vec()))
        .collect::<Result<Vec<_>>>()?
        .into_iter();
    let stages = (0..stage_count)
        .map(|_| TreeEnsemble::new(trees.by_ref().take(trees_per_stage).collect()))
        .collect();

    tracing::debug!(
        depth,
        stages = stage_count,
        trees_per_stage,
        scale_multiplier,
        "unpacked pupil localizer"
    );
    LocalizerModel::new(depth, scale_multiplier, stages)
}

fn put_i32(out: &mut Vec<u8>, value: i32) {
    let mut buf = [0u8; 4];
    LittleEndian::write_i32(&mut buf, value);
    out.extend_from_slice(&buf);
}

fn put_f32(out: &mut Vec<u8>, value: f32) {
    let mut buf = [0u8; 4];
    LittleEndian::write_f32(&mut buf, value);
    out.extend_from_slice(&buf);
}

fn put_tests(out: &mut Vec<u8>, tests: &[PixelTest]) {
    for test in tests {
        out.extend_from_slice(&test.to_code());
    }
}

/// Encode a cascade in the PICO format. The ignored header is zero-filled.
pub fn pack_cascade(model: &CascadeModel) -> Vec<u8> {
    let depth = model.tree_depth();
    let mut out = Vec::with_capacity(
        cascade_file_len(depth, model.tree_count()).unwrap_or(CASCADE_PREAMBLE_LEN),
    );

    out.extend_from_slice(&[0u8; CASCADE_HEADER_SKIP]);
    put_i32(&mut out, depth as i32);
    put_i32(&mut out, model.tree_count() as i32);

    for stage in model.stages() {
        put_tests(&mut out, stage.tree.tests());
        for &leaf in stage.tree.leaves() {
            put_f32(&mut out, leaf);
        }
        put_f32(&mut out, stage.threshold);
    }
    out
}

/// Encode a localizer in the PICO format. Leaves are laid out in the shared
/// pair sequence and the pairs no tree addresses are zero-filled.
pub fn pack_localizer(model: &LocalizerModel) -> Vec<u8> {
    let depth = model.tree_depth();
    let leaves_per_tree = leaf_count(depth);
    let trees: Vec<_> = model.stages().iter().flat_map(|stage| &stage.trees).collect();

    let mut pairs = vec![Point::zero(); trees.len() * 4 * leaves_per_tree];
    for (m, tree) in trees.iter().enumerate() {
        pairs[m * leaves_per_tree..(m + 1) * leaves_per_tree].copy_from_slice(tree.leaves());
    }

    let mut out = Vec::with_capacity(
        localizer_file_len(depth, model.stage_count(), model.trees_per_stage())
            .unwrap_or(LOCALIZER_PREAMBLE_LEN),
    );

    put_i32(&mut out, model.stage_count() as i32);
    put_f32(&mut out, model.scale_multiplier());
    put_i32(&mut out, model.trees_per_stage() as i32);
    put_i32(&mut out, depth as i32);

    for (tree, block) in trees.iter().zip(pairs.chunks_exact(4 * leaves_per_tree)) {
        put_tests(&mut out, tree.tests());
        for pair in block {
            put_f32(&mut out, pair.row as f32);
            put_f32(&mut out, pair.col as f32);
        }
    }
    out
}

/// Read a model file into memory, decompressing `.bz2` files on the fly.
pub fn read_model_bytes(path: &Path) -> Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut bytes = Vec::new();

    let is_bz2 = path.extension().is_some_and(|ext| ext == "bz2");
    if is_bz2 {
        BzDecoder::new(reader).read_to_end(&mut bytes)?;
    } else {
        reader.read_to_end(&mut bytes)?;
    }

    tracing::debug!(path = %path.display(), bytes = bytes.len(), compressed = is_bz2, "read model file");
    Ok(bytes)
}

/// Load a detection cascade from a raw or `.bz2`-compressed file.
pub fn load_cascade<P: AsRef<Path>>(path: P) -> Result<CascadeModel> {
    unpack_cascade(&read_model_bytes(path.as_ref())?)
}

/// Load a pupil localizer from a raw or `.bz2`-compressed file.
pub fn load_localizer<P: AsRef<Path>>(path: P) -> Result<LocalizerModel> {
    unpack_localizer(&read_model_bytes(path.as_ref())?)
}

/// Decode a detection cascade from an already-opened reader.
pub fn load_cascade_from_reader<R: Read>(mut reader: R) -> Result<CascadeModel> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    unpack_cascade(&bytes)
}

/// Decode a pupil localizer from an already-opened reader.
pub fn load_localizer_from_reader<R: Read>(mut reader: R) -> Result<LocalizerModel> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    unpack_localizer(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageBuffer;
    use std::io::Write;

    use bzip2::write::BzEncoder;
    use bzip2::Compression;

    fn le_i32(v: i32) -> [u8; 4] {
        v.to_le_bytes()
    }

    fn le_f32(v: f32) -> [u8; 4] {
        v.to_le_bytes()
    }

    /// Hand-assembled depth-1, single-tree cascade.
    fn tiny_cascade_bytes() -> Vec<u8> {
        let mut v = Vec::new();
        v.extend_from_slice(b"PICOv001"); // ignored
        v.extend_from_slice(&le_i32(1)); // depth
        v.extend_from_slice(&le_i32(1)); // tree count
        v.extend_from_slice(&[1, 2, 0xfe, 4]); // node codes
        v.extend_from_slice(&le_f32(0.5)); // leaf 0
        v.extend_from_slice(&le_f32(-0.5)); // leaf 1
        v.extend_from_slice(&le_f32(0.25)); // threshold
        v
    }

    /// Hand-assembled single-stage, single-tree, depth-1 localizer.
    fn tiny_localizer_bytes() -> Vec<u8> {
        let mut v = Vec::new();
        v.extend_from_slice(&le_i32(1)); // stages
        v.extend_from_slice(&le_f32(0.75)); // scale multiplier
        v.extend_from_slice(&le_i32(1)); // trees per stage
        v.extend_from_slice(&le_i32(1)); // depth
        v.extend_from_slice(&[10, 20, 236, 226]); // node codes
        // 4 * (2 - 1) + 4 = 8 stored pairs, first two reachable
        let pairs = [(0.1f32, 0.2f32), (-0.3, 0.4), (9.0, 9.0), (9.0, 9.0), (9.0, 9.0), (9.0, 9.0), (9.0, 9.0), (9.0, 9.0)];
        for (dr, dc) in pairs {
            v.extend_from_slice(&le_f32(dr));
            v.extend_from_slice(&le_f32(dc));
        }
        v
    }

    #[test]
    fn record_sizes() {
        assert_eq!(cascade_record_len(1), Some(4 + 8 + 4));
        assert_eq!(cascade_record_len(6), Some(4 * 63 + 4 * 64 + 4));
        assert_eq!(localizer_stored_pairs(1), Some(8));
        assert_eq!(localizer_record_len(1), Some(4 + 64));
        assert_eq!(cascade_file_len(1, 1), Some(32));
        assert_eq!(localizer_file_len(1, 1, 1), Some(84));
    }

    #[test]
    fn oversized_depth_has_no_length() {
        assert!(cascade_file_len(MAX_TREE_DEPTH, 1).is_some());
        assert_eq!(cascade_file_len(MAX_TREE_DEPTH + 1, 1), None);
        assert_eq!(cascade_file_len(62, 1), None);
        assert_eq!(cascade_file_len(100, 1), None);
        assert_eq!(localizer_file_len(62, 1, 1), None);
        assert_eq!(localizer_file_len(u32::MAX, 1, 1), None);
        assert_eq!(localizer_stored_pairs(64), None);
    }

    #[test]
    fn decode_hand_built_cascade() {
        let bytes = tiny_cascade_bytes();
        assert_eq!(bytes.len(), 32);

        let model = unpack_cascade(&bytes).unwrap();
        assert_eq!(model.tree_depth(), 1);
        assert_eq!(model.tree_count(), 1);

        let stage = &model.stages()[0];
        assert_eq!(stage.tree.tests(), &[PixelTest::new(1, 2, -2, 4)]);
        assert_eq!(stage.tree.leaves(), &[0.5, -0.5]);
        assert_eq!(stage.threshold, 0.25);
    }

    #[test]
    fn cascade_truncation_is_malformed() {
        let bytes = tiny_cascade_bytes();
        for len in 0..bytes.len() {
            let result = unpack_cascade(&bytes[..len]);
            assert!(
                matches!(result, Err(Error::MalformedModel(_))),
                "length {} should be rejected",
                len
            );
        }
    }

    #[test]
    fn cascade_trailing_bytes_are_malformed() {
        let mut bytes = tiny_cascade_bytes();
        bytes.push(0);
        assert!(matches!(unpack_cascade(&bytes), Err(Error::MalformedModel(_))));
    }

    #[test]
    fn cascade_bad_header_fields() {
        let mut bytes = tiny_cascade_bytes();
        bytes[8..12].copy_from_slice(&le_i32(-1));
        assert!(matches!(unpack_cascade(&bytes), Err(Error::MalformedModel(_))));

        let mut bytes = tiny_cascade_bytes();
        bytes[8..12].copy_from_slice(&le_i32(40));
        assert!(matches!(unpack_cascade(&bytes), Err(Error::MalformedModel(_))));

        let mut bytes = tiny_cascade_bytes();
        bytes[12..16].copy_from_slice(&le_i32(0));
        assert!(matches!(unpack_cascade(&bytes), Err(Error::MalformedModel(_))));
    }

    #[test]
    fn cascade_pack_matches_layout() {
        let bytes = tiny_cascade_bytes();
        let model = unpack_cascade(&bytes).unwrap();
        let packed = pack_cascade(&model);

        // identical apart from the ignored header
        assert_eq!(packed.len(), bytes.len());
        assert_eq!(&packed[..CASCADE_HEADER_SKIP], &[0u8; 8]);
        assert_eq!(&packed[CASCADE_HEADER_SKIP..], &bytes[CASCADE_HEADER_SKIP..]);
    }

    #[test]
    fn decode_hand_built_localizer() {
        let bytes = tiny_localizer_bytes();
        assert_eq!(bytes.len(), 84);

        let model = unpack_localizer(&bytes).unwrap();
        assert_eq!(model.stage_count(), 1);
        assert_eq!(model.trees_per_stage(), 1);
        assert_eq!(model.tree_depth(), 1);
        assert_eq!(model.scale_multiplier(), 0.75);

        let tree = &model.stages()[0].trees[0];
        assert_eq!(tree.tests(), &[PixelTest::new(10, 20, -20, -30)]);
        assert_eq!(tree.leaves().len(), 2);
        assert_eq!(tree.leaves()[0], Point::new(0.1f32 as f64, 0.2f32 as f64));
        assert_eq!(tree.leaves()[1], Point::new(-0.3f32 as f64, 0.4f32 as f64));
    }

    #[test]
    fn localizer_truncation_is_malformed() {
        let bytes = tiny_localizer_bytes();
        for len in 0..bytes.len() {
            assert!(
                matches!(unpack_localizer(&bytes[..len]), Err(Error::MalformedModel(_))),
                "length {} should be rejected",
                len
            );
        }
    }

    #[test]
    fn localizer_pack_zero_fills_unused_pairs() {
        let model = unpack_localizer(&tiny_localizer_bytes()).unwrap();
        let packed = pack_localizer(&model);

        assert_eq!(packed.len(), 84);
        // header, codes and the two reachable pairs survive unchanged
        let reachable = LOCALIZER_PREAMBLE_LEN + 4 + 16;
        assert_eq!(&packed[..reachable], &tiny_localizer_bytes()[..reachable]);
        assert!(packed[reachable..].iter().all(|&b| b == 0));

        assert_eq!(unpack_localizer(&packed).unwrap(), model);
    }

    /// One stage of two depth-1 trees with all-zero node codes. Only pair 2
    /// of the first record is set; pair 0 of the second record is a decoy.
    fn two_tree_localizer_bytes() -> Vec<u8> {
        let mut v = Vec::new();
        v.extend_from_slice(&le_i32(1)); // stages
        v.extend_from_slice(&le_f32(1.0)); // scale multiplier
        v.extend_from_slice(&le_i32(2)); // trees per stage
        v.extend_from_slice(&le_i32(1)); // depth
        for record in 0..2 {
            v.extend_from_slice(&[0, 0, 0, 0]);
            for k in 0..8 {
                let (dr, dc) = match (record, k) {
                    (0, 2) => (1.0f32, 0.0f32),
                    (1, 0) => (9.0, 9.0),
                    _ => (0.0, 0.0),
                };
                v.extend_from_slice(&le_f32(dr));
                v.extend_from_slice(&le_f32(dc));
            }
        }
        v
    }

    #[test]
    fn localizer_leaves_span_records() {
        let bytes = two_tree_localizer_bytes();
        assert_eq!(bytes.len(), LOCALIZER_PREAMBLE_LEN + 2 * 68);

        let model = unpack_localizer(&bytes).unwrap();
        let trees = &model.stages()[0].trees;
        assert_eq!(trees[0].leaves(), &[Point::zero(), Point::zero()]);
        assert_eq!(trees[1].leaves(), &[Point::new(1.0, 0.0), Point::zero()]);

        // equal samples never go right, so both trees answer with leaf 0
        let image = ImageBuffer::from_fn(12, 12, |_, _| 100);
        let p = model.estimate(5.0, 5.0, 2.0, &image);
        assert_eq!(p.row, 7.0);
        assert_eq!(p.col, 5.0);
    }

    #[test]
    fn multi_tree_localizer_pack_shares_pair_sequence() {
        let model = unpack_localizer(&two_tree_localizer_bytes()).unwrap();
        let packed = pack_localizer(&model);
        assert_eq!(packed.len(), LOCALIZER_PREAMBLE_LEN + 2 * 68);

        // tree 1's first leaf sits at pair 2 of record 0
        let pair2 = LOCALIZER_PREAMBLE_LEN + 4 + 2 * 8;
        assert_eq!(&packed[pair2..pair2 + 4], &le_f32(1.0));
        // the decoy is not addressed by any tree and is written back as zero
        let record1_pairs = LOCALIZER_PREAMBLE_LEN + 68 + 4;
        assert!(packed[record1_pairs..].iter().all(|&b| b == 0));

        assert_eq!(unpack_localizer(&packed).unwrap(), model);
    }

    #[test]
    fn load_compressed_cascade() {
        let temp_path = std::env::temp_dir().join("pico_face_tiny_cascade.bz2");
        {
            let file = File::create(&temp_path).unwrap();
            let mut encoder = BzEncoder::new(file, Compression::default());
            encoder.write_all(&tiny_cascade_bytes()).unwrap();
            encoder.finish().unwrap();
        }

        let model = load_cascade(&temp_path).unwrap();
        assert_eq!(model.tree_count(), 1);

        std::fs::remove_file(temp_path).ok();
    }

    #[test]
    fn load_from_reader() {
        let model = load_cascade_from_reader(Cursor::new(tiny_cascade_bytes())).unwrap();
        assert_eq!(model.tree_depth(), 1);

        let localizer = load_localizer_from_reader(Cursor::new(tiny_localizer_bytes())).unwrap();
        assert_eq!(localizer.stage_count(), 1);
    }
}
