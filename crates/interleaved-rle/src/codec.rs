//! Outer tile codec: RLE decode into a scratch tile, then convert and flip
//! into the caller's surface; compression runs the same path in reverse.

use thiserror::Error;
use tracing::{trace, warn};

use crate::decoder::{self, DecodeError};
use crate::depth::PixelLayout;
use crate::encoder::{self, EncodeError};
use crate::image::{self, ImageError, Palette, PixelFormat};

/// Largest tile dimension the wire format allows.
pub const MAX_TILE_SIZE: usize = 64;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid color depth: {bpp} bpp")]
    InvalidBpp { bpp: usize },

    #[error("tile width or height is zero")]
    EmptyTile,

    #[error("tile is {width}x{height}, the maximum is {MAX_TILE_SIZE}x{MAX_TILE_SIZE}")]
    TileTooLarge { width: usize, height: usize },

    #[error("tile width {width} is not a multiple of 4")]
    MisalignedWidth { width: usize },

    #[error("RLE decompression failed")]
    Decode(#[from] DecodeError),

    #[error("RLE compression failed")]
    Encode(#[from] EncodeError),

    #[error("tile conversion failed")]
    Image(#[from] ImageError),
}

/// Interleaved bitmap codec context.
///
/// Owns the scratch tile buffer reused across calls, so a context decoding
/// a stream of tiles allocates once. Contexts are independent; one context
/// must not be shared between threads mid-call.
#[derive(Debug, Default)]
pub struct InterleavedCodec {
    scratch: Vec<u8>,
}

impl InterleavedCodec {
    pub fn new() -> Self {
        Self {
            scratch: Vec::with_capacity(MAX_TILE_SIZE * MAX_TILE_SIZE * 4),
        }
    }

    /// Decompresses one tile and places it at `(x, y)` in `dst`, converted
    /// to `format` and flipped into top-down row order.
    ///
    /// `width`, `height` and `bpp` must match the encoded stream; `palette`
    /// is required for 8-bpp tiles.
    #[allow(clippy::too_many_arguments)]
    pub fn decompress(
        &mut self,
        src: &[u8],
        width: usize,
        height: usize,
        bpp: usize,
        palette: Option<&Palette>,
        dst: &mut [u8],
        format: PixelFormat,
        stride: usize,
        x: usize,
        y: usize,
    ) -> Result<(), CodecError> {
        if width == 0 || height == 0 {
            return Err(CodecError::EmptyTile);
        }

        if !matches!(bpp, 8 | 15 | 16 | 24) {
            warn!(bpp, "invalid color depth");
            return Err(CodecError::InvalidBpp { bpp });
        }

        let layout = decoder::decompress(src, &mut self.scratch, width, height, bpp)?;
        trace!(width, height, bpp, "decompressed interleaved tile");

        image::copy_tile_flipped(
            &self.scratch,
            layout,
            palette,
            width,
            height,
            dst,
            format,
            stride,
            x,
            y,
        )?;

        Ok(())
    }

    /// Compresses the `width × height` region of `src` at `(x, y)` into an
    /// order stream appended to `out`.
    ///
    /// The wire format caps tiles at 64×64 and requires the width to be a
    /// multiple of four. 8 bpp is not supported on this path: producing
    /// indexed pixels would need an inverse palette.
    #[allow(clippy::too_many_arguments)]
    pub fn compress(
        &mut self,
        src: &[u8],
        format: PixelFormat,
        stride: usize,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        bpp: usize,
        out: &mut Vec<u8>,
    ) -> Result<(), CodecError> {
        if width == 0 || height == 0 {
            return Err(CodecError::EmptyTile);
        }

        if width % 4 != 0 {
            warn!(width, "tile width is not a multiple of 4");
            return Err(CodecError::MisalignedWidth { width });
        }

        if width > MAX_TILE_SIZE || height > MAX_TILE_SIZE {
            warn!(width, height, "tile exceeds the 64x64 limit");
            return Err(CodecError::TileTooLarge { width, height });
        }

        let layout = match bpp {
            24 => PixelLayout::Bgr24,
            16 => PixelLayout::Rgb16,
            15 => PixelLayout::Rgb15,
            bpp => {
                warn!(bpp, "invalid color depth for compression");
                return Err(CodecError::InvalidBpp { bpp });
            }
        };

        self.scratch.clear();
        image::pack_tile_flipped(src, format, stride, x, y, width, height, layout, &mut self.scratch)?;
        encoder::compress(&self.scratch, out, width, height, bpp)?;
        trace!(width, height, bpp, "compressed interleaved tile");

        Ok(())
    }
}
