use crate::error::{Error, Result};
use crate::tree::PixelTest;

/// A single-channel 8-bit image with an explicit row stride.
///
/// The pixel at `(row, col)` lives at `pixels[row * stride + col]`. The stride
/// may exceed the logical column count, which lets callers wrap padded frame
/// buffers without copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBuffer {
    pixels: Vec<u8>,
    nrows: usize,
    ncols: usize,
    stride: usize,
}

impl ImageBuffer {
    /// Wrap a tightly packed buffer (`stride == ncols`).
    pub fn new(pixels: Vec<u8>, nrows: usize, ncols: usize) -> Result<Self> {
        Self::with_stride(pixels, nrows, ncols, ncols)
    }

    pub fn with_stride(pixels: Vec<u8>, nrows: usize, ncols: usize, stride: usize) -> Result<Self> {
        if nrows == 0 || ncols == 0 {
            return Err(Error::InvalidParameter(format!(
                "image must not be empty, got {}x{}",
                nrows, ncols
            )));
        }
        if ncols > stride {
            return Err(Error::InvalidParameter(format!(
                "stride {} is smaller than column count {}",
                stride, ncols
            )));
        }
        let required = stride
            .checked_mul(nrows)
            .ok_or_else(|| Error::InvalidParameter("image dimensions overflow".into()))?;
        if pixels.len() < required {
            return Err(Error::InvalidParameter(format!(
                "pixel buffer holds {} bytes, {}x{} with stride {} needs {}",
                pixels.len(),
                nrows,
                ncols,
                stride,
                required
            )));
        }

        Ok(Self {
            pixels,
            nrows,
            ncols,
            stride,
        })
    }

    /// Build an image by evaluating `f(row, col)` for every pixel.
    ///
    /// # Panics
    ///
    /// Panics if either dimension is zero.
    pub fn from_fn<F>(nrows: usize, ncols: usize, f: F) -> Self
    where
        F: Fn(usize, usize) -> u8,
    {
        assert!(nrows > 0 && ncols > 0, "image must not be empty");
        let mut pixels = Vec::with_capacity(nrows * ncols);
        for r in 0..nrows {
            for c in 0..ncols {
                pixels.push(f(r, c));
            }
        }
        Self {
            pixels,
            nrows,
            ncols,
            stride: ncols,
        }
    }

    /// Convert an interleaved RGBA frame to grayscale.
    ///
    /// Uses the fixed integer weighting `(7*R + 7*G + B) / 10` the detection
    /// models were trained against. The weights sum past unity, so very bright
    /// pixels exceed 255 and are stored modulo 256 like the reference
    /// conversion does. Do not replace this with standard luma.
    pub fn from_rgba(rgba: &[u8], nrows: usize, ncols: usize) -> Result<Self> {
        if nrows == 0 || ncols == 0 {
            return Err(Error::InvalidParameter(format!(
                "image must not be empty, got {}x{}",
                nrows, ncols
            )));
        }
        let expected = nrows * ncols * 4;
        if rgba.len() < expected {
            return Err(Error::InvalidParameter(format!(
                "RGBA buffer holds {} bytes, {}x{} needs {}",
                rgba.len(),
                nrows,
                ncols,
                expected
            )));
        }

        let pixels = rgba[..expected]
            .chunks_exact(4)
            .map(|px| rgba_to_gray(px[0], px[1], px[2]))
            .collect();

        Ok(Self {
            pixels,
            nrows,
            ncols,
            stride: ncols,
        })
    }

    #[inline]
    pub fn pixel(&self, row: usize, col: usize) -> u8 {
        self.pixels[row * self.stride + col]
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

#[inline]
fn rgba_to_gray(r: u8, g: u8, b: u8) -> u8 {
    ((7 * r as u32 + 7 * g as u32 + b as u32) / 10) as u8
}

/// Map a window-relative offset to an absolute, clamped pixel coordinate.
///
/// Offsets are signed bytes in units of 1/256 of the window scale; the sum is
/// formed in 8.8 fixed point and shifted back down.
#[inline]
fn sample_coord(center: f64, offset: i8, scale: f64, dim: usize) -> usize {
    let fixed = (256.0 * center + offset as f64 * scale) as i64;
    (fixed >> 8).clamp(0, dim as i64 - 1) as usize
}

/// Read the two intensities a pixel test compares, for a window centered at
/// `(row, col)` with the given scale.
#[inline]
pub fn sample_pair(image: &ImageBuffer, test: &PixelTest, row: f64, col: f64, scale: f64) -> (u8, u8) {
    let (nrows, ncols) = (image.nrows, image.ncols);
    let r1 = sample_coord(row, test.r1, scale, nrows);
    let c1 = sample_coord(col, test.c1, scale, ncols);
    let r2 = sample_coord(row, test.r2, scale, nrows);
    let c2 = sample_coord(col, test.c2, scale, ncols);
    (image.pixel(r1, c1), image.pixel(r2, c2))
}

/// Creates a sampler closure bound to one window, for use with tree prediction.
pub fn make_pixel_sampler<'a>(
    image: &'a ImageBuffer,
    row: f64,
    col: f64,
    scale: f64,
) -> impl Fn(&PixelTest) -> (u8, u8) + 'a {
    move |test: &PixelTest| sample_pair(image, test, row, col, scale)
}
