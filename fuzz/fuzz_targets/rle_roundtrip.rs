#![no_main]

use libfuzzer_sys::fuzz_target;

#[derive(arbitrary::Arbitrary, Debug)]
struct Input<'a> {
    pixels: &'a [u8],
    width: u8,
    height: u8,
}

fuzz_target!(|input: Input<'_>| {
    let width = usize::from(input.width % 64) + 1;
    let height = usize::from(input.height % 64) + 1;

    for (bpp, bytes) in [(8usize, 1usize), (15, 2), (16, 2), (24, 3)] {
        let len = width * height * bytes;
        let Some(tile) = input.pixels.get(..len) else {
            continue;
        };

        let mut encoded = Vec::new();
        interleaved_rle::encoder::compress(tile, &mut encoded, width, height, bpp)
            .expect("compressing a well-sized tile");

        let mut decoded = Vec::new();
        interleaved_rle::decoder::decompress(&encoded, &mut decoded, width, height, bpp)
            .expect("decompressing a compressed tile");

        assert_eq!(tile, decoded);
    }
});
