//! Decompression of an interleaved RLE order stream into a tile buffer.
//!
//! The engine walks the stream one order at a time and stops as soon as the
//! tile is full; trailing input is not an error. Most orders derive their
//! pixels from the scanline decoded just above the write cursor. On the
//! first scanline, where no such line exists, background pixels are black
//! and foreground pixels are the foreground color itself. Whether an order
//! runs under first-scanline rules is decided once, when the order starts.

use thiserror::Error;

use crate::depth::{ColorDepth, Depth16, Depth24, Depth8, PixelLayout};
use crate::orders::{self, Order};

/// Bitmask applied by the one-byte SPECIAL_FGBG_1 order.
const MASK_SPECIAL_FGBG_1: u8 = 0x03;
/// Bitmask applied by the one-byte SPECIAL_FGBG_2 order.
const MASK_SPECIAL_FGBG_2: u8 = 0x05;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unsupported color depth: {bpp} bpp")]
    UnsupportedBpp { bpp: usize },

    #[error("tile width or height is zero")]
    EmptyTile,

    #[error("tile dimensions overflow the address space")]
    TileTooLarge,

    #[error("encoded stream is truncated: {needed} more bytes needed, {available} available")]
    TruncatedInput { needed: usize, available: usize },

    #[error("unrecognized order header 0x{header:02X}")]
    UnknownOrder { header: u8 },

    #[error("extended run has a zero length")]
    ZeroLengthMegaRun,

    #[error("order writes {needed} bytes but the tile has only {available} left")]
    DestinationOverrun { needed: usize, available: usize },

    #[error("encoded stream ended with {remaining} tile bytes still unwritten")]
    UnexpectedEndOfStream { remaining: usize },
}

/// Decompresses an RLE-compressed tile.
///
/// `dst` is resized to `width × height` pixels of the width selected by
/// `bpp` and fully rewritten on success; on failure its contents are
/// unspecified. Returns the wire layout of the decoded pixels.
pub fn decompress(
    src: &[u8],
    dst: &mut Vec<u8>,
    width: usize,
    height: usize,
    bpp: usize,
) -> Result<PixelLayout, DecodeError> {
    match bpp {
        24 => decompress_24_bpp(src, dst, width, height).map(|()| PixelLayout::Bgr24),
        16 => decompress_16_bpp(src, dst, width, height).map(|()| PixelLayout::Rgb16),
        15 => decompress_16_bpp(src, dst, width, height).map(|()| PixelLayout::Rgb15),
        8 => decompress_8_bpp(src, dst, width, height).map(|()| PixelLayout::Indexed8),
        bpp => Err(DecodeError::UnsupportedBpp { bpp }),
    }
}

/// Decompresses an 8-bpp (palette-indexed) tile.
pub fn decompress_8_bpp(
    src: &[u8],
    dst: &mut Vec<u8>,
    width: usize,
    height: usize,
) -> Result<(), DecodeError> {
    decompress_tile::<Depth8>(src, dst, width, height)
}

/// Decompresses a 16-bpp tile. 15-bpp streams use the same byte layout and
/// decode through this entry point as well.
pub fn decompress_16_bpp(
    src: &[u8],
    dst: &mut Vec<u8>,
    width: usize,
    height: usize,
) -> Result<(), DecodeError> {
    decompress_tile::<Depth16>(src, dst, width, height)
}

/// Decompresses a 24-bpp tile.
pub fn decompress_24_bpp(
    src: &[u8],
    dst: &mut Vec<u8>,
    width: usize,
    height: usize,
) -> Result<(), DecodeError> {
    decompress_tile::<Depth24>(src, dst, width, height)
}

fn decompress_tile<D: ColorDepth>(
    src: &[u8],
    dst: &mut Vec<u8>,
    width: usize,
    height: usize,
) -> Result<(), DecodeError> {
    if width == 0 || height == 0 {
        return Err(DecodeError::EmptyTile);
    }

    let row_delta = width.checked_mul(D::BYTES).ok_or(DecodeError::TileTooLarge)?;
    let total = row_delta.checked_mul(height).ok_or(DecodeError::TileTooLarge)?;

    dst.clear();
    dst.resize(total, 0);

    Decoder::<D> {
        src,
        src_pos: 0,
        dst,
        dst_pos: 0,
        row_delta,
        fg: D::WHITE,
    }
    .run()
}

struct Decoder<'a, 'b, D: ColorDepth> {
    src: &'a [u8],
    src_pos: usize,
    dst: &'b mut [u8],
    dst_pos: usize,
    row_delta: usize,
    fg: D::Pixel,
}

impl<'a, D: ColorDepth> Decoder<'a, '_, D> {
    fn run(mut self) -> Result<(), DecodeError> {
        let mut first_line = true;
        let mut insert_fg = false;

        while self.dst_pos < self.dst.len() {
            // Watch out for the end of the first scanline.
            if first_line && self.dst_pos >= self.row_delta {
                first_line = false;
                insert_fg = false;
            }

            if self.src_pos == self.src.len() {
                return Err(DecodeError::UnexpectedEndOfStream {
                    remaining: self.dst.len() - self.dst_pos,
                });
            }

            let (order, run_length, consumed) = orders::read_order(&self.src[self.src_pos..])?;
            self.src_pos += consumed;

            match order {
                Order::BgRun => self.bg_run(run_length, first_line, insert_fg)?,
                Order::FgRun => self.fg_run(run_length, first_line, false)?,
                Order::SetFgFgRun => self.fg_run(run_length, first_line, true)?,
                Order::DitheredRun => self.dithered_run(run_length)?,
                Order::ColorRun => self.color_run(run_length)?,
                Order::ColorImage => self.color_image(run_length)?,
                Order::FgbgImage => self.fgbg_image(run_length, first_line, false)?,
                Order::SetFgFgbgImage => self.fgbg_image(run_length, first_line, true)?,
                Order::SpecialFgbg1 => self.fgbg_mask(MASK_SPECIAL_FGBG_1, 8, first_line)?,
                Order::SpecialFgbg2 => self.fgbg_mask(MASK_SPECIAL_FGBG_2, 8, first_line)?,
                Order::WhitePixel => self.single_pixel(D::WHITE)?,
                Order::BlackPixel => self.single_pixel(D::BLACK)?,
            }

            // Only a background run arms the foreground insertion for the
            // order that follows it.
            insert_fg = order == Order::BgRun;
        }

        Ok(())
    }

    /// Verifies `count` more input bytes exist and consumes them.
    fn take(&mut self, count: usize) -> Result<&'a [u8], DecodeError> {
        let available = self.src.len() - self.src_pos;
        if count > available {
            return Err(DecodeError::TruncatedInput {
                needed: count,
                available,
            });
        }

        let bytes = &self.src[self.src_pos..self.src_pos + count];
        self.src_pos += count;
        Ok(bytes)
    }

    fn read_pixel(&mut self) -> Result<D::Pixel, DecodeError> {
        Ok(D::load(self.take(D::BYTES)?))
    }

    /// Verifies a run of `pixels` fits in the remaining tile.
    fn reserve(&self, pixels: usize) -> Result<(), DecodeError> {
        let available = self.dst.len() - self.dst_pos;
        // Saturating so a hostile run length cannot wrap the byte count.
        let needed = pixels.saturating_mul(D::BYTES);
        if needed > available {
            return Err(DecodeError::DestinationOverrun { needed, available });
        }
        Ok(())
    }

    fn write_pixel(&mut self, pixel: D::Pixel) {
        D::store(&mut self.dst[self.dst_pos..], pixel);
        self.dst_pos += D::BYTES;
    }

    /// The pixel one scanline above the write cursor. Callers only reach
    /// this once the cursor has left the first scanline.
    fn pixel_above(&self) -> D::Pixel {
        D::load(&self.dst[self.dst_pos - self.row_delta..])
    }

    /// Background run: black on the first scanline, a copy of the scanline
    /// above afterwards. When this run directly follows another background
    /// run, its first pixel is the foreground color instead; that seam is
    /// how the wire encodes a lone foreground pixel between two runs.
    fn bg_run(
        &mut self,
        mut run_length: usize,
        first_line: bool,
        insert_fg: bool,
    ) -> Result<(), DecodeError> {
        self.reserve(run_length)?;

        if insert_fg {
            let pixel = if first_line {
                self.fg
            } else {
                self.pixel_above() ^ self.fg
            };
            self.write_pixel(pixel);
            run_length -= 1;
        }

        if first_line {
            for _ in 0..run_length {
                self.write_pixel(D::BLACK);
            }
        } else {
            for _ in 0..run_length {
                let above = self.pixel_above();
                self.write_pixel(above);
            }
        }

        Ok(())
    }

    /// Foreground run: the foreground color on the first scanline, the
    /// scanline above XORed with it afterwards.
    fn fg_run(&mut self, run_length: usize, first_line: bool, set_fg: bool) -> Result<(), DecodeError> {
        if set_fg {
            self.fg = self.read_pixel()?;
        }

        self.reserve(run_length)?;

        if first_line {
            for _ in 0..run_length {
                self.write_pixel(self.fg);
            }
        } else {
            for _ in 0..run_length {
                let pixel = self.pixel_above() ^ self.fg;
                self.write_pixel(pixel);
            }
        }

        Ok(())
    }

    /// Dithered run: `run_length` repetitions of a two-pixel pattern.
    fn dithered_run(&mut self, run_length: usize) -> Result<(), DecodeError> {
        let first = self.read_pixel()?;
        let second = self.read_pixel()?;

        self.reserve(run_length.saturating_mul(2))?;

        for _ in 0..run_length {
            self.write_pixel(first);
            self.write_pixel(second);
        }

        Ok(())
    }

    /// Color run: `run_length` copies of one pixel. Does not touch the
    /// foreground color.
    fn color_run(&mut self, run_length: usize) -> Result<(), DecodeError> {
        let pixel = self.read_pixel()?;

        self.reserve(run_length)?;

        for _ in 0..run_length {
            self.write_pixel(pixel);
        }

        Ok(())
    }

    /// Color image: `run_length` literal pixels copied from the input.
    fn color_image(&mut self, run_length: usize) -> Result<(), DecodeError> {
        self.reserve(run_length)?;

        let byte_count = run_length * D::BYTES;
        let bytes = self.take(byte_count)?;
        self.dst[self.dst_pos..self.dst_pos + byte_count].copy_from_slice(bytes);
        self.dst_pos += byte_count;

        Ok(())
    }

    /// Foreground/background image: one bitmask byte per eight pixels, LSB
    /// first. A set bit selects the foreground rule, a clear bit the
    /// background rule. A final partial group still consumes a whole mask
    /// byte.
    fn fgbg_image(
        &mut self,
        run_length: usize,
        first_line: bool,
        set_fg: bool,
    ) -> Result<(), DecodeError> {
        if set_fg {
            self.fg = self.read_pixel()?;
        }

        self.reserve(run_length)?;

        let mut remaining = run_length;
        while remaining > 0 {
            let batch = remaining.min(8);
            let mask = self.take(1)?[0];
            self.fgbg_batch(mask, batch, first_line);
            remaining -= batch;
        }

        Ok(())
    }

    /// One SPECIAL fg/bg order: eight pixels under a fixed bitmask.
    fn fgbg_mask(&mut self, mask: u8, count: usize, first_line: bool) -> Result<(), DecodeError> {
        self.reserve(count)?;
        self.fgbg_batch(mask, count, first_line);
        Ok(())
    }

    /// Writes up to eight mask-selected pixels. Capacity is checked by the
    /// caller.
    fn fgbg_batch(&mut self, mask: u8, count: usize, first_line: bool) {
        for bit in 0..count {
            let fg_selected = mask & (1 << bit) != 0;
            let pixel = if first_line {
                if fg_selected {
                    self.fg
                } else {
                    D::BLACK
                }
            } else {
                let above = self.pixel_above();
                if fg_selected {
                    above ^ self.fg
                } else {
                    above
                }
            };
            self.write_pixel(pixel);
        }
    }

    fn single_pixel(&mut self, pixel: D::Pixel) -> Result<(), DecodeError> {
        self.reserve(1)?;
        self.write_pixel(pixel);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use expect_test::expect;

    use super::*;

    fn decode_8(src: &[u8], width: usize, height: usize) -> Result<Vec<u8>, DecodeError> {
        let mut dst = Vec::new();
        decompress_8_bpp(src, &mut dst, width, height)?;
        Ok(dst)
    }

    fn decode_16(src: &[u8], width: usize, height: usize) -> Result<Vec<u8>, DecodeError> {
        let mut dst = Vec::new();
        decompress_16_bpp(src, &mut dst, width, height)?;
        Ok(dst)
    }

    fn decode_24(src: &[u8], width: usize, height: usize) -> Result<Vec<u8>, DecodeError> {
        let mut dst = Vec::new();
        decompress_24_bpp(src, &mut dst, width, height)?;
        Ok(dst)
    }

    #[test]
    fn white_order_writes_one_white_pixel() {
        assert_eq!(decode_8(&[0xFD], 1, 1).unwrap(), [0xFF]);
        assert_eq!(decode_16(&[0xFD], 1, 1).unwrap(), [0xFF, 0xFF]);
        assert_eq!(decode_24(&[0xFD], 1, 1).unwrap(), [0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn black_order_writes_one_black_pixel() {
        assert_eq!(decode_8(&[0xFE], 1, 1).unwrap(), [0x00]);
        assert_eq!(decode_16(&[0xFE], 1, 1).unwrap(), [0x00, 0x00]);
        assert_eq!(decode_24(&[0xFE], 1, 1).unwrap(), [0x00, 0x00, 0x00]);
    }

    #[test]
    fn color_run_repeats_its_pixel() {
        assert_eq!(decode_8(&[0x63, 0xAA], 3, 1).unwrap(), [0xAA, 0xAA, 0xAA]);
        // 16-bpp payloads are little-endian.
        assert_eq!(
            decode_16(&[0x62, 0x34, 0x12], 2, 1).unwrap(),
            [0x34, 0x12, 0x34, 0x12],
        );
    }

    #[test]
    fn fg_run_starts_from_white_foreground() {
        assert_eq!(decode_8(&[0x23], 3, 1).unwrap(), [0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn set_fg_fg_run_updates_the_foreground() {
        // A lite set-fg run, then a plain fg run reusing the new color.
        assert_eq!(
            decode_8(&[0xC3, 0x77, 0x21], 4, 1).unwrap(),
            [0x77, 0x77, 0x77, 0x77],
        );
    }

    #[test]
    fn fg_run_xors_the_previous_scanline() {
        assert_eq!(
            decode_8(&[0x84, 0x01, 0x02, 0x03, 0x04, 0x24], 4, 2).unwrap(),
            [0x01, 0x02, 0x03, 0x04, 0xFE, 0xFD, 0xFC, 0xFB],
        );
    }

    #[test]
    fn bg_run_is_black_on_the_first_scanline() {
        assert_eq!(decode_8(&[0x04], 4, 1).unwrap(), [0x00; 4]);
    }

    #[test]
    fn bg_run_copies_the_previous_scanline() {
        assert_eq!(
            decode_8(&[0x84, 0x01, 0x02, 0x03, 0x04, 0x04], 4, 2).unwrap(),
            [0x01, 0x02, 0x03, 0x04, 0x01, 0x02, 0x03, 0x04],
        );
    }

    #[test]
    fn adjacent_bg_runs_insert_a_foreground_pixel() {
        assert_eq!(
            decode_8(&[0x05, 0x05], 10, 1).unwrap(),
            [0x00, 0x00, 0x00, 0x00, 0x00, 0xFF, 0x00, 0x00, 0x00, 0x00],
        );
    }

    #[test]
    fn adjacent_bg_runs_xor_the_foreground_on_later_scanlines() {
        // Second scanline: two bg runs; the seam pixel is above ^ fg.
        assert_eq!(
            decode_8(&[0x84, 0x10, 0x20, 0x30, 0x40, 0x02, 0x02], 4, 2).unwrap(),
            [0x10, 0x20, 0x30, 0x40, 0x10, 0x20, 0xCF, 0x40],
        );
    }

    #[test]
    fn insertion_is_disarmed_by_any_other_order() {
        // bg run, white pixel, bg run: no foreground seam on the second run.
        assert_eq!(
            decode_8(&[0x02, 0xFD, 0x02], 5, 1).unwrap(),
            [0x00, 0x00, 0xFF, 0x00, 0x00],
        );
    }

    #[test]
    fn first_line_rule_is_decided_at_order_start() {
        // The second fg run starts inside the first scanline and crosses
        // into the second; every pixel of it stays under first-line rules.
        assert_eq!(decode_8(&[0x23, 0x25], 4, 2).unwrap(), [0xFF; 8]);
    }

    #[test]
    fn dithered_run_alternates_two_pixels() {
        assert_eq!(
            decode_8(&[0xE2, 0xAA, 0xBB], 4, 1).unwrap(),
            [0xAA, 0xBB, 0xAA, 0xBB],
        );
    }

    #[test]
    fn special_fgbg_orders_apply_fixed_masks() {
        assert_eq!(
            decode_8(&[0xF9], 8, 1).unwrap(),
            [0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
        );
        assert_eq!(
            decode_8(&[0xFA], 8, 1).unwrap(),
            [0xFF, 0x00, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00],
        );
    }

    #[test]
    fn fgbg_image_reads_one_mask_per_octet() {
        assert_eq!(
            decode_8(&[0x43, 0xFF, 0x0F, 0x00], 24, 1).unwrap(),
            [
                0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, // mask 0xFF
                0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00, // mask 0x0F
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // mask 0x00
            ],
        );
    }

    #[test]
    fn fgbg_image_partial_group_still_consumes_a_mask_byte() {
        // Extended length 11 + 1 = 12: one full mask, then four low bits.
        assert_eq!(
            decode_8(&[0x40, 0x0B, 0xFF, 0x05], 12, 1).unwrap(),
            [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0xFF, 0x00],
        );
    }

    #[test]
    fn fgbg_image_xors_on_later_scanlines() {
        // Second scanline under mask 0x05: XOR with above where bits are set.
        assert_eq!(
            decode_8(&[0x84, 0x01, 0x02, 0x03, 0x04, 0x40, 0x03, 0x05], 4, 2).unwrap(),
            [0x01, 0x02, 0x03, 0x04, 0xFE, 0x02, 0xFC, 0x04],
        );
    }

    #[test]
    fn set_fg_fgbg_image_reads_the_color_first() {
        assert_eq!(
            decode_8(&[0xD1, 0x55, 0x03], 8, 1).unwrap(),
            [0x55, 0x55, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
        );
    }

    #[test]
    fn regular_extension_adds_32_pixels() {
        assert_eq!(decode_8(&[0x20, 0x03], 35, 1).unwrap(), [0xFF; 35]);
    }

    #[test]
    fn lite_extension_adds_16_pixels() {
        assert_eq!(decode_8(&[0xC0, 0x02, 0x55], 18, 1).unwrap(), [0x55; 18]);
    }

    #[test]
    fn mega_run_length_is_little_endian() {
        assert_eq!(decode_8(&[0xF3, 0x2C, 0x01, 0xAA], 30, 10).unwrap(), [0xAA; 300]);
    }

    #[test]
    fn color_image_copies_24_bpp_pixels_verbatim() {
        assert_eq!(
            decode_24(&[0x81, 0x11, 0x22, 0x33], 1, 1).unwrap(),
            [0x11, 0x22, 0x33],
        );
    }

    #[test]
    fn trailing_input_is_ignored_once_the_tile_is_full() {
        assert_eq!(decode_8(&[0xFD, 0xAB, 0xCD], 1, 1).unwrap(), [0xFF]);
    }

    #[test]
    fn input_ending_before_the_tile_is_full_fails() {
        expect![[r#"
            Err(
                UnexpectedEndOfStream {
                    remaining: 1,
                },
            )
        "#]]
        .assert_debug_eq(&decode_8(&[0xFD], 2, 1));
    }

    #[test]
    fn empty_input_fails_on_a_nonempty_tile() {
        assert_eq!(
            decode_8(&[], 2, 2),
            Err(DecodeError::UnexpectedEndOfStream { remaining: 4 }),
        );
    }

    #[test]
    fn run_longer_than_the_tile_fails() {
        expect![[r#"
            Err(
                DestinationOverrun {
                    needed: 9,
                    available: 4,
                },
            )
        "#]]
        .assert_debug_eq(&decode_8(&[0x09], 4, 1));
    }

    #[test]
    fn truncated_payloads_fail() {
        // Color run missing its pixel.
        assert_eq!(
            decode_8(&[0x63], 3, 1),
            Err(DecodeError::TruncatedInput { needed: 1, available: 0 }),
        );
        // 16-bpp color run with half a pixel.
        assert_eq!(
            decode_16(&[0x62, 0x34], 2, 1),
            Err(DecodeError::TruncatedInput { needed: 2, available: 1 }),
        );
        // fg/bg image missing a mask byte.
        assert_eq!(
            decode_8(&[0x41], 8, 1),
            Err(DecodeError::TruncatedInput { needed: 1, available: 0 }),
        );
    }

    #[test]
    fn zero_sized_tiles_are_rejected() {
        assert_eq!(decode_8(&[0xFD], 0, 1), Err(DecodeError::EmptyTile));
        assert_eq!(decode_8(&[0xFD], 1, 0), Err(DecodeError::EmptyTile));
    }

    #[test]
    fn unknown_orders_are_rejected() {
        assert_eq!(
            decode_8(&[0xFB], 1, 1),
            Err(DecodeError::UnknownOrder { header: 0xFB }),
        );
        assert_eq!(
            decode_8(&[0xA1], 1, 1),
            Err(DecodeError::UnknownOrder { header: 0xA1 }),
        );
    }

    #[test]
    fn dispatch_maps_depths_to_layouts() {
        let mut dst = Vec::new();

        assert_eq!(
            decompress(&[0xFD], &mut dst, 1, 1, 8).unwrap(),
            PixelLayout::Indexed8,
        );
        assert_eq!(
            decompress(&[0xFD], &mut dst, 1, 1, 15).unwrap(),
            PixelLayout::Rgb15,
        );
        assert_eq!(
            decompress(&[0xFD], &mut dst, 1, 1, 16).unwrap(),
            PixelLayout::Rgb16,
        );
        assert_eq!(
            decompress(&[0xFD], &mut dst, 1, 1, 24).unwrap(),
            PixelLayout::Bgr24,
        );
        assert_eq!(
            decompress(&[0xFD], &mut dst, 1, 1, 32),
            Err(DecodeError::UnsupportedBpp { bpp: 32 }),
        );
    }
}
