//! Compression-order headers: classification, run lengths, emission.
//!
//! An order starts with one header byte. The top bits select the header
//! form, which in turn fixes where the order code and the run length live:
//!
//! - `0xxx xxxx` / `10xx xxxx` — REGULAR orders. Code in the top three
//!   bits, run length in the low five.
//! - `1100 xxxx` .. `1110 xxxx` — LITE orders. Code in the top four bits,
//!   run length in the low four.
//! - `0xF0` .. `0xFE` — MEGA and SPECIAL orders. The whole byte is the
//!   code; MEGA orders carry their run length in two little-endian
//!   extension bytes, SPECIAL orders have an implicit pixel count.
//!
//! A REGULAR or LITE header with an all-zero length field borrows the next
//! byte as an extension; the bias added to the extension byte depends on
//! the order family, and the fg/bg image variants count their in-header
//! length in units of eight pixels.

use crate::decoder::DecodeError;

/// A compression order, independent of the header form that encoded it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Order {
    BgRun,
    FgRun,
    FgbgImage,
    ColorRun,
    ColorImage,
    SetFgFgRun,
    SetFgFgbgImage,
    DitheredRun,
    SpecialFgbg1,
    SpecialFgbg2,
    WhitePixel,
    BlackPixel,
}

/// How an order's pixel count is encoded alongside its header byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LengthForm {
    /// Low 5 bits; zero selects an extension byte valued `byte + 32`.
    Regular,
    /// Low 5 bits times 8; zero selects an extension byte valued `byte + 1`.
    RegularFgbg,
    /// Low 4 bits; zero selects an extension byte valued `byte + 16`.
    Lite,
    /// Low 4 bits times 8; zero selects an extension byte valued `byte + 1`.
    LiteFgbg,
    /// Two little-endian extension bytes.
    Mega,
    /// No length field.
    Implicit,
}

const MASK_REGULAR_LENGTH: u8 = 0x1F;
const MASK_LITE_LENGTH: u8 = 0x0F;

fn classify(header: u8) -> Option<(Order, LengthForm)> {
    if header & 0xC0 != 0xC0 {
        // REGULAR orders (000x xxxx, 001x xxxx, 010x xxxx, 011x xxxx, 100x xxxx)
        match header >> 5 {
            0x00 => Some((Order::BgRun, LengthForm::Regular)),
            0x01 => Some((Order::FgRun, LengthForm::Regular)),
            0x02 => Some((Order::FgbgImage, LengthForm::RegularFgbg)),
            0x03 => Some((Order::ColorRun, LengthForm::Regular)),
            0x04 => Some((Order::ColorImage, LengthForm::Regular)),
            _ => None,
        }
    } else if header & 0xF0 == 0xF0 {
        // MEGA and SPECIAL orders (0xF*)
        match header {
            0xF0 => Some((Order::BgRun, LengthForm::Mega)),
            0xF1 => Some((Order::FgRun, LengthForm::Mega)),
            0xF2 => Some((Order::FgbgImage, LengthForm::Mega)),
            0xF3 => Some((Order::ColorRun, LengthForm::Mega)),
            0xF4 => Some((Order::ColorImage, LengthForm::Mega)),
            0xF6 => Some((Order::SetFgFgRun, LengthForm::Mega)),
            0xF7 => Some((Order::SetFgFgbgImage, LengthForm::Mega)),
            0xF8 => Some((Order::DitheredRun, LengthForm::Mega)),
            0xF9 => Some((Order::SpecialFgbg1, LengthForm::Implicit)),
            0xFA => Some((Order::SpecialFgbg2, LengthForm::Implicit)),
            0xFD => Some((Order::WhitePixel, LengthForm::Implicit)),
            0xFE => Some((Order::BlackPixel, LengthForm::Implicit)),
            _ => None,
        }
    } else {
        // LITE orders (1100 xxxx, 1101 xxxx, 1110 xxxx)
        match header >> 4 {
            0x0C => Some((Order::SetFgFgRun, LengthForm::Lite)),
            0x0D => Some((Order::SetFgFgbgImage, LengthForm::LiteFgbg)),
            0x0E => Some((Order::DitheredRun, LengthForm::Lite)),
            _ => None,
        }
    }
}

/// Reads one order header from the front of `src`.
///
/// Returns the order, its run length in pixels (zero for the implicit-length
/// SPECIAL orders), and the number of bytes consumed by the header and its
/// extension.
pub(crate) fn read_order(src: &[u8]) -> Result<(Order, usize, usize), DecodeError> {
    let header = *src.first().ok_or(DecodeError::TruncatedInput {
        needed: 1,
        available: 0,
    })?;

    let (order, form) = classify(header).ok_or(DecodeError::UnknownOrder { header })?;

    let ext = &src[1..];
    let (run_length, consumed) = match form {
        LengthForm::Regular => match usize::from(header & MASK_REGULAR_LENGTH) {
            0 => (usize::from(extension_byte(ext)?) + 32, 2),
            n => (n, 1),
        },
        LengthForm::RegularFgbg => match usize::from(header & MASK_REGULAR_LENGTH) {
            0 => (usize::from(extension_byte(ext)?) + 1, 2),
            n => (n * 8, 1),
        },
        LengthForm::Lite => match usize::from(header & MASK_LITE_LENGTH) {
            0 => (usize::from(extension_byte(ext)?) + 16, 2),
            n => (n, 1),
        },
        LengthForm::LiteFgbg => match usize::from(header & MASK_LITE_LENGTH) {
            0 => (usize::from(extension_byte(ext)?) + 1, 2),
            n => (n * 8, 1),
        },
        LengthForm::Mega => {
            if ext.len() < 2 {
                return Err(DecodeError::TruncatedInput {
                    needed: 2,
                    available: ext.len(),
                });
            }

            match usize::from(u16::from_le_bytes([ext[0], ext[1]])) {
                0 => return Err(DecodeError::ZeroLengthMegaRun),
                n => (n, 3),
            }
        }
        LengthForm::Implicit => (0, 1),
    };

    Ok((order, run_length, consumed))
}

fn extension_byte(ext: &[u8]) -> Result<u8, DecodeError> {
    ext.first().copied().ok_or(DecodeError::TruncatedInput {
        needed: 1,
        available: 0,
    })
}

/// Regular/MEGA code pairs for the order families the encoder emits.
pub(crate) const CODE_BG_RUN: u8 = 0x00;
pub(crate) const CODE_COLOR_RUN: u8 = 0x03;
pub(crate) const CODE_COLOR_IMAGE: u8 = 0x04;
pub(crate) const MEGA_BG_RUN: u8 = 0xF0;
pub(crate) const MEGA_COLOR_RUN: u8 = 0xF3;
pub(crate) const MEGA_COLOR_IMAGE: u8 = 0xF4;

/// Largest pixel count a single order can carry.
pub(crate) const MEGA_RUN_LIMIT: usize = u16::MAX as usize;

/// Appends a regular-family order header for `run_length` pixels, choosing
/// the shortest of the inline, extension, and MEGA forms.
pub(crate) fn push_run_header(out: &mut Vec<u8>, code: u8, mega: u8, run_length: usize) {
    debug_assert!((1..=MEGA_RUN_LIMIT).contains(&run_length));

    if run_length <= usize::from(MASK_REGULAR_LENGTH) {
        out.push(code << 5 | run_length as u8);
    } else if run_length <= usize::from(u8::MAX) + 32 {
        out.push(code << 5);
        out.push((run_length - 32) as u8);
    } else {
        out.push(mega);
        out.extend_from_slice(&(run_length as u16).to_le_bytes());
    }
}
