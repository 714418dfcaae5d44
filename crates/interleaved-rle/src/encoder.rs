//! Compression of a tile buffer into an interleaved RLE order stream.
//!
//! The encoder is a greedy scan over the tile in wire orientation. At each
//! position it prefers a background run (pixels matching the scanline
//! below the cursor in stream order, or black while still on the first
//! scanline), then a color run, and falls back to literal color-image
//! spans. It never emits two background runs in a row, so the decoder's
//! foreground-insertion rule stays dormant, and it never emits foreground,
//! dithered, or special orders; those are decode-side obligations only.

use core::marker::PhantomData;

use thiserror::Error;

use crate::depth::{ColorDepth, Depth16, Depth24, Depth8};
use crate::orders;

/// Shortest match against the previous scanline worth a background run.
const MIN_BG_RUN: usize = 2;
/// Shortest repeat worth a color run order.
const MIN_COLOR_RUN: usize = 4;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("unsupported color depth: {bpp} bpp")]
    UnsupportedBpp { bpp: usize },

    #[error("tile width or height is zero")]
    EmptyTile,

    #[error("tile dimensions overflow the address space")]
    TileTooLarge,

    #[error("tile buffer holds {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

/// Compresses a tile, appending the order stream to `dst`.
///
/// `src` holds exactly `width × height` pixels in wire orientation
/// (bottom-up scanlines) and the wire byte layout selected by `bpp`.
pub fn compress(
    src: &[u8],
    dst: &mut Vec<u8>,
    width: usize,
    height: usize,
    bpp: usize,
) -> Result<(), EncodeError> {
    match bpp {
        24 => compress_24_bpp(src, dst, width, height),
        15 | 16 => compress_16_bpp(src, dst, width, height),
        8 => compress_8_bpp(src, dst, width, height),
        bpp => Err(EncodeError::UnsupportedBpp { bpp }),
    }
}

/// Compresses an 8-bpp (palette-indexed) tile.
pub fn compress_8_bpp(
    src: &[u8],
    dst: &mut Vec<u8>,
    width: usize,
    height: usize,
) -> Result<(), EncodeError> {
    compress_tile::<Depth8>(src, dst, width, height)
}

/// Compresses a 16-bpp tile; 15-bpp tiles share the byte layout.
pub fn compress_16_bpp(
    src: &[u8],
    dst: &mut Vec<u8>,
    width: usize,
    height: usize,
) -> Result<(), EncodeError> {
    compress_tile::<Depth16>(src, dst, width, height)
}

/// Compresses a 24-bpp tile.
pub fn compress_24_bpp(
    src: &[u8],
    dst: &mut Vec<u8>,
    width: usize,
    height: usize,
) -> Result<(), EncodeError> {
    compress_tile::<Depth24>(src, dst, width, height)
}

fn compress_tile<D: ColorDepth>(
    src: &[u8],
    dst: &mut Vec<u8>,
    width: usize,
    height: usize,
) -> Result<(), EncodeError> {
    if width == 0 || height == 0 {
        return Err(EncodeError::EmptyTile);
    }

    let expected = width
        .checked_mul(height)
        .and_then(|pixels| pixels.checked_mul(D::BYTES))
        .ok_or(EncodeError::TileTooLarge)?;

    if src.len() != expected {
        return Err(EncodeError::SizeMismatch {
            expected,
            actual: src.len(),
        });
    }

    Encoder::<D> {
        src,
        width,
        _depth: PhantomData,
    }
    .run(dst);

    Ok(())
}

struct Encoder<'a, D: ColorDepth> {
    src: &'a [u8],
    width: usize,
    _depth: PhantomData<D>,
}

impl<D: ColorDepth> Encoder<'_, D> {
    fn run(&self, out: &mut Vec<u8>) {
        let total = self.src.len() / D::BYTES;
        let mut cursor = 0;
        // The decoder inserts a foreground pixel in front of a background
        // run directly following another one; never emit two in a row.
        let mut bg_allowed = true;

        while cursor < total {
            let limit = (total - cursor).min(orders::MEGA_RUN_LIMIT);

            if bg_allowed {
                let len = self.bg_run_len(cursor, limit);
                if len >= MIN_BG_RUN {
                    orders::push_run_header(out, orders::CODE_BG_RUN, orders::MEGA_BG_RUN, len);
                    cursor += len;
                    bg_allowed = false;
                    continue;
                }
            }

            let len = self.color_run_len(cursor, limit);
            if len >= MIN_COLOR_RUN {
                orders::push_run_header(out, orders::CODE_COLOR_RUN, orders::MEGA_COLOR_RUN, len);
                out.extend_from_slice(self.pixel_bytes(cursor));
                cursor += len;
                bg_allowed = true;
                continue;
            }

            let len = self.literal_len(cursor, limit);
            orders::push_run_header(out, orders::CODE_COLOR_IMAGE, orders::MEGA_COLOR_IMAGE, len);
            out.extend_from_slice(&self.src[cursor * D::BYTES..(cursor + len) * D::BYTES]);
            cursor += len;
            bg_allowed = true;
        }
    }

    fn pixel(&self, index: usize) -> D::Pixel {
        D::load(&self.src[index * D::BYTES..])
    }

    fn pixel_bytes(&self, index: usize) -> &[u8] {
        &self.src[index * D::BYTES..(index + 1) * D::BYTES]
    }

    /// Pixels the decoder would reproduce for a background run starting at
    /// `index`: black while the order starts on the first scanline, the
    /// pixel one scanline back otherwise.
    fn bg_run_len(&self, index: usize, limit: usize) -> usize {
        let mut len = 0;

        if index < self.width {
            while len < limit && self.pixel(index + len) == D::BLACK {
                len += 1;
            }
        } else {
            while len < limit && self.pixel(index + len) == self.pixel(index + len - self.width) {
                len += 1;
            }
        }

        len
    }

    fn color_run_len(&self, index: usize, limit: usize) -> usize {
        let value = self.pixel(index);
        let mut len = 1;

        while len < limit && self.pixel(index + len) == value {
            len += 1;
        }

        len
    }

    /// Length of the literal span starting at `index`: scan until a
    /// worthwhile run shows up.
    fn literal_len(&self, index: usize, limit: usize) -> usize {
        let mut len = 1;

        while len < limit {
            let next = index + len;
            let rest = limit - len;

            if self.bg_run_len(next, rest) >= MIN_BG_RUN
                || self.color_run_len(next, rest) >= MIN_COLOR_RUN
            {
                break;
            }

            len += 1;
        }

        len
    }
}
