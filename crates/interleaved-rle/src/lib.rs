//! Interleaved Run-Length Encoding (RLE) Bitmap Codec
//!
//! The compressed form remote desktop servers use to push small screen tiles
//! (at most 64×64 pixels) at 8, 15, 16 and 24 bits per pixel. A tile is a
//! stream of variable-length *compression orders*; most orders derive their
//! pixels from the scanline decoded just before the current one, which is
//! what makes the format cheap for the mostly-vertical redundancy of desktop
//! content.
//!
//! ### References
//!
//! - Microsoft Learn:
//!   - [RLE_BITMAP_STREAM](https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-rdpbcgr/b3b60873-16a8-4cbc-8aaa-5f0a93083280)
//!   - [Pseudo-code](https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-rdpbcgr/b6a3f5c2-0804-4c10-9d25-a321720fd23e)
//!
//! - FreeRDP:
//!   - [interleaved.c](https://github.com/FreeRDP/FreeRDP/blob/db98f16e5bce003c898e8c85eb7af964f22a16a8/libfreerdp/codec/interleaved.c)

pub mod codec;
pub mod decoder;
pub mod encoder;
pub mod image;

mod depth;
mod orders;

pub use codec::{CodecError, InterleavedCodec, MAX_TILE_SIZE};
pub use depth::PixelLayout;
