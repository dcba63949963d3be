//! RGB to planar YUV 4:2:0 conversion
//!
//! CPU readout path only: when the producer cannot share a native buffer
//! handle, its interleaved RGBX pixels are converted into the planar I420
//! layout the backend expects.
//!
//! The integer formulas are limited-range BT.601 with the exact
//! coefficient set the reference encoder input was validated against:
//!
//! ```text
//! Y = ((66 R + 129 G +  25 B + 128) >> 8) + 16
//! U = ((-38 R - 74 G + 112 B + 128) >> 8) + 128
//! V = ((112 R - 94 G -  18 B + 128) >> 8) + 128
//! ```
//!
//! Chroma is written only at even (row, column) positions. This is a
//! plain 4:2:0 decimation, not an averaging filter, and has to stay
//! pixel-exact for bit-exact compatibility.

use thiserror::Error;

/// Bytes per interleaved source pixel (RGBX).
pub const BYTES_PER_INPUT_PIXEL: usize = 4;

/// Errors from the color converter's precondition checks.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConvertError {
    /// Dimensions are zero or odd; 4:2:0 needs even width and height.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Requested frame width.
        width: u32,
        /// Requested frame height.
        height: u32,
    },

    /// Source buffer is shorter than `width * height * 4`.
    #[error("source buffer too small: {len} < {needed}")]
    SourceTooSmall {
        /// Actual source length.
        len: usize,
        /// Required source length.
        needed: usize,
    },

    /// Destination buffer does not match `width * height * 3 / 2`.
    #[error("destination buffer size mismatch: {len} != {needed}")]
    DestinationMismatch {
        /// Actual destination length.
        len: usize,
        /// Required destination length.
        needed: usize,
    },
}

/// Size in bytes of one planar YUV 4:2:0 frame.
pub const fn yuv420p_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 3 / 2
}

/// Convert interleaved RGBX pixels to planar YUV 4:2:0.
///
/// `rgb` holds 4 bytes per pixel in R, G, B, X order; the fourth byte is
/// ignored. `yuv` receives the full luma plane followed by the quarter-size
/// U and V planes. Both buffers are length-checked up front, so out-of-range
/// input is a typed error instead of an out-of-bounds read.
pub fn rgb_to_yuv420p(rgb: &[u8], yuv: &mut [u8], width: u32, height: u32) -> Result<(), ConvertError> {
    if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
        return Err(ConvertError::InvalidDimensions { width, height });
    }

    let pixels = width as usize * height as usize;
    let needed_src = pixels * BYTES_PER_INPUT_PIXEL;
    if rgb.len() < needed_src {
        return Err(ConvertError::SourceTooSmall {
            len: rgb.len(),
            needed: needed_src,
        });
    }

    let needed_dst = yuv420p_len(width, height);
    if yuv.len() != needed_dst {
        return Err(ConvertError::DestinationMismatch {
            len: yuv.len(),
            needed: needed_dst,
        });
    }

    let mut yi = 0usize;
    let mut ui = pixels;
    let mut vi = pixels + pixels / 4;
    let mut s = 0usize;

    for row in 0..height {
        for col in 0..width {
            let r = rgb[s] as i32;
            let g = rgb[s + 1] as i32;
            let b = rgb[s + 2] as i32;

            yuv[yi] = (((66 * r + 129 * g + 25 * b + 128) >> 8) + 16) as u8;

            if row % 2 == 0 && col % 2 == 0 {
                yuv[ui] = (((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128) as u8;
                ui += 1;
                yuv[vi] = (((112 * r - 94 * g - 18 * b + 128) >> 8) + 128) as u8;
                vi += 1;
            }

            yi += 1;
            s += BYTES_PER_INPUT_PIXEL;
        }
    }

    Ok(())
}
