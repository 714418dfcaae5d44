//! Tile pixel conversion between wire layouts and caller surfaces.
//!
//! The RLE engines work on tiles in the source pixel layout, stored
//! bottom-up as they are on the wire. This module moves such tiles into
//! and out of 32-bit caller surfaces: palette expansion for indexed
//! tiles, channel scaling for the packed 15/16-bit layouts, and the
//! vertical flip both directions.

use std::io;

use byteorder::WriteBytesExt as _;
use thiserror::Error;

use crate::depth::PixelLayout;

const MIN_ALPHA: u8 = 0x00;
const MAX_ALPHA: u8 = 0xFF;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("8-bit tiles need a palette")]
    MissingPalette,

    #[error("indexed pixels cannot be produced without an inverse palette")]
    CannotPackIndexed,

    #[error("tile does not fit inside the surface")]
    RegionOutOfBounds,

    #[error("tile buffer is smaller than the tile")]
    TileTooSmall,

    #[error("failed to write converted pixels: {0}")]
    Write(#[from] io::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// 256-entry color table used to expand 8-bit indexed tiles.
#[derive(Clone)]
pub struct Palette {
    entries: [Rgb; 256],
}

impl Palette {
    /// All entries black.
    pub const BLACK: Palette = Palette {
        entries: [Rgb { r: 0, g: 0, b: 0 }; 256],
    };

    pub const fn new(entries: [Rgb; 256]) -> Self {
        Self { entries }
    }

    pub fn lookup(&self, index: u8) -> Rgb {
        self.entries[usize::from(index)]
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::BLACK
    }
}

/// 32-bit surface formats the codec reads from and writes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    RgbA32,
    RgbX32,
    BgrA32,
    BgrX32,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        4
    }

    fn write_color(self, color: Rgb, mut buffer: &mut [u8]) -> io::Result<()> {
        match self {
            Self::RgbA32 => {
                buffer.write_u8(color.r)?;
                buffer.write_u8(color.g)?;
                buffer.write_u8(color.b)?;
                buffer.write_u8(MAX_ALPHA)?;
            }
            Self::RgbX32 => {
                buffer.write_u8(color.r)?;
                buffer.write_u8(color.g)?;
                buffer.write_u8(color.b)?;
                buffer.write_u8(MIN_ALPHA)?;
            }
            Self::BgrA32 => {
                buffer.write_u8(color.b)?;
                buffer.write_u8(color.g)?;
                buffer.write_u8(color.r)?;
                buffer.write_u8(MAX_ALPHA)?;
            }
            Self::BgrX32 => {
                buffer.write_u8(color.b)?;
                buffer.write_u8(color.g)?;
                buffer.write_u8(color.r)?;
                buffer.write_u8(MIN_ALPHA)?;
            }
        }

        Ok(())
    }

    fn read_color(self, buffer: &[u8]) -> Rgb {
        match self {
            Self::RgbA32 | Self::RgbX32 => Rgb {
                r: buffer[0],
                g: buffer[1],
                b: buffer[2],
            },
            Self::BgrA32 | Self::BgrX32 => Rgb {
                b: buffer[0],
                g: buffer[1],
                r: buffer[2],
            },
        }
    }
}

/// Copies a decoded tile into `dst` at `(x, y)`, converting every pixel to
/// `format` and flipping the tile vertically (wire tiles are bottom-up,
/// surfaces top-down).
#[allow(clippy::too_many_arguments)]
pub fn copy_tile_flipped(
    src: &[u8],
    layout: PixelLayout,
    palette: Option<&Palette>,
    width: usize,
    height: usize,
    dst: &mut [u8],
    format: PixelFormat,
    stride: usize,
    x: usize,
    y: usize,
) -> Result<(), ImageError> {
    if width == 0 || height == 0 {
        return Ok(());
    }

    let palette = match (layout, palette) {
        (PixelLayout::Indexed8, None) => return Err(ImageError::MissingPalette),
        (_, Some(palette)) => palette,
        (_, None) => &Palette::BLACK,
    };

    let src_bytes = layout.bytes_per_pixel();
    let src_step = width.checked_mul(src_bytes).ok_or(ImageError::TileTooSmall)?;
    if src.len() < src_step.checked_mul(height).ok_or(ImageError::TileTooSmall)? {
        return Err(ImageError::TileTooSmall);
    }

    check_window(dst.len(), format, stride, x, y, width, height)?;

    let dst_bytes = format.bytes_per_pixel();
    for row in 0..height {
        let src_row = &src[(height - 1 - row) * src_step..][..src_step];
        let dst_row = &mut dst[(y + row) * stride + x * dst_bytes..][..width * dst_bytes];

        for col in 0..width {
            let color = expand_pixel(layout, palette, &src_row[col * src_bytes..]);
            format.write_color(color, &mut dst_row[col * dst_bytes..])?;
        }
    }

    Ok(())
}

/// Packs a `width × height` region of `src` at `(x, y)` into wire layout,
/// bottom-up, appending to `out`. The inverse of [`copy_tile_flipped`],
/// used on the compression path.
#[allow(clippy::too_many_arguments)]
pub fn pack_tile_flipped(
    src: &[u8],
    format: PixelFormat,
    stride: usize,
    x: usize,
    y: usize,
    width: usize,
    height: usize,
    layout: PixelLayout,
    out: &mut Vec<u8>,
) -> Result<(), ImageError> {
    if width == 0 || height == 0 {
        return Ok(());
    }

    if layout == PixelLayout::Indexed8 {
        return Err(ImageError::CannotPackIndexed);
    }

    check_window(src.len(), format, stride, x, y, width, height)?;

    let src_bytes = format.bytes_per_pixel();
    for row in (0..height).rev() {
        let src_row = &src[(y + row) * stride + x * src_bytes..][..width * src_bytes];

        for col in 0..width {
            let color = format.read_color(&src_row[col * src_bytes..]);
            pack_pixel(layout, color, out);
        }
    }

    Ok(())
}

/// Verifies the `(x, y)`-anchored tile window lies inside a surface of
/// `len` bytes. Widened arithmetic throughout so hostile geometry cannot
/// wrap.
fn check_window(
    len: usize,
    format: PixelFormat,
    stride: usize,
    x: usize,
    y: usize,
    width: usize,
    height: usize,
) -> Result<(), ImageError> {
    let row_end = x
        .checked_add(width)
        .and_then(|cols| cols.checked_mul(format.bytes_per_pixel()));

    let window_end = y
        .checked_add(height - 1)
        .and_then(|last_row| last_row.checked_mul(stride))
        .zip(row_end)
        .and_then(|(row_start, row_end)| row_start.checked_add(row_end));

    match window_end {
        Some(end) if end <= len => Ok(()),
        _ => Err(ImageError::RegionOutOfBounds),
    }
}

/// Expands one wire pixel to 8-bit channels.
fn expand_pixel(layout: PixelLayout, palette: &Palette, buf: &[u8]) -> Rgb {
    match layout {
        PixelLayout::Indexed8 => palette.lookup(buf[0]),
        PixelLayout::Rgb15 => {
            let value = u16::from_le_bytes([buf[0], buf[1]]);
            Rgb {
                r: expand_5_bit((value >> 10) & 0x1F),
                g: expand_5_bit((value >> 5) & 0x1F),
                b: expand_5_bit(value & 0x1F),
            }
        }
        PixelLayout::Rgb16 => {
            let value = u16::from_le_bytes([buf[0], buf[1]]);
            Rgb {
                r: expand_5_bit((value >> 11) & 0x1F),
                g: expand_6_bit((value >> 5) & 0x3F),
                b: expand_5_bit(value & 0x1F),
            }
        }
        PixelLayout::Bgr24 => Rgb {
            b: buf[0],
            g: buf[1],
            r: buf[2],
        },
    }
}

fn pack_pixel(layout: PixelLayout, color: Rgb, out: &mut Vec<u8>) {
    match layout {
        // Rejected before any pixel is read.
        PixelLayout::Indexed8 => {}
        PixelLayout::Rgb15 => {
            let value = u16::from(color.r >> 3) << 10
                | u16::from(color.g >> 3) << 5
                | u16::from(color.b >> 3);
            out.extend_from_slice(&value.to_le_bytes());
        }
        PixelLayout::Rgb16 => {
            let value = u16::from(color.r >> 3) << 11
                | u16::from(color.g >> 2) << 5
                | u16::from(color.b >> 3);
            out.extend_from_slice(&value.to_le_bytes());
        }
        PixelLayout::Bgr24 => out.extend_from_slice(&[color.b, color.g, color.r]),
    }
}

fn expand_5_bit(channel: u16) -> u8 {
    ((channel * 527 + 23) >> 6) as u8
}

fn expand_6_bit(channel: u16) -> u8 {
    ((channel * 259 + 33) >> 6) as u8
}
