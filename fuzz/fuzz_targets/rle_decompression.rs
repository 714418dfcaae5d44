#![no_main]

use libfuzzer_sys::fuzz_target;

#[derive(arbitrary::Arbitrary, Debug)]
struct Input<'a> {
    src: &'a [u8],
    width: u8,
    height: u8,
}

fuzz_target!(|input: Input<'_>| {
    let mut out = Vec::new();

    for bpp in [8usize, 15, 16, 24] {
        let _ = interleaved_rle::decoder::decompress(
            input.src,
            &mut out,
            input.width.into(),
            input.height.into(),
            bpp,
        );
    }
});
