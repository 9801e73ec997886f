//! Cross-cutting pixel model properties exercised through the public API.

use raster::color;
use raster::image::{ChannelOrder, Image, Interpolation, PixelFormat};
use raster::stream::{BitReader, InputBuffer};
use raster::transform::{
    copy_resize, copy_rotate, flip_horizontal, flip_vertical, trim, TrimMode, TrimSides,
};

fn patterned(width: u32, height: u32, format: PixelFormat, channels: u8) -> Image {
    let mut image = Image::new(width, height, format, channels);
    let max = format.max_value();
    image.update_pixels(|x, y, pixel| {
        for c in 0..pixel.num_channels() {
            let value = f64::from(x * 13 + y * 7 + u32::from(c) * 3) % (max + 1.0);
            pixel.set_channel(c as usize, value);
        }
    });
    image
}

#[test]
fn buffer_length_invariant() {
    for (w, h, format, channels) in [
        (8, 8, PixelFormat::Uint1, 1),
        (16, 3, PixelFormat::Uint4, 1),
        (5, 7, PixelFormat::Uint8, 3),
        (4, 4, PixelFormat::Uint16, 4),
        (3, 3, PixelFormat::Float32, 2),
        (2, 2, PixelFormat::Float64, 1),
    ] {
        let image = Image::new(w, h, format, channels);
        let bits = w as usize
            * h as usize
            * channels as usize
            * format.bits_per_sample() as usize;
        assert_eq!(image.byte_len(), bits.div_ceil(8), "{format:?}");
    }
}

#[test]
fn safe_equals_direct_inside_and_zero_outside() {
    let image = patterned(6, 4, PixelFormat::Uint8, 3);
    for y in 0..4i64 {
        for x in 0..6i64 {
            assert_eq!(
                image.get_pixel_safe(x, y),
                image.get_pixel(x as u32, y as u32)
            );
        }
    }
    for (x, y) in [(-1, 0), (0, -1), (6, 0), (0, 4), (100, 100)] {
        let pixel = image.get_pixel_safe(x, y);
        for c in 0..3 {
            assert_eq!(pixel.channel(c), 0.0);
        }
    }
}

#[test]
fn flips_are_involutions() {
    for format in [PixelFormat::Uint1, PixelFormat::Uint8, PixelFormat::Uint16] {
        let original = patterned(9, 5, format, 1);

        let mut image = original.clone();
        flip_horizontal(&mut image);
        flip_horizontal(&mut image);
        assert_eq!(image.data(), original.data(), "{format:?} horizontal");

        let mut image = original.clone();
        flip_vertical(&mut image);
        flip_vertical(&mut image);
        assert_eq!(image.data(), original.data(), "{format:?} vertical");
    }
}

#[test]
fn orthogonal_rotation_identity() {
    let original = patterned(7, 3, PixelFormat::Uint8, 4);
    let there = copy_rotate(&original, 90.0, Interpolation::Nearest);
    let back = copy_rotate(&there, -90.0, Interpolation::Nearest);
    assert_eq!(back.data(), original.data());
}

#[test]
fn trim_is_idempotent_across_modes() {
    let mut image = Image::new(8, 8, PixelFormat::Uint8, 4);
    for (i, (x, y)) in [(3, 3), (4, 3), (3, 5)].into_iter().enumerate() {
        let shade = 200.0 - 40.0 * i as f64;
        image.set_pixel_rgba(x, y, shade, 100.0, 50.0, 255.0);
    }

    for mode in [TrimMode::Transparent, TrimMode::TopLeftColor] {
        let once = trim(&image, mode, TrimSides::ALL);
        let twice = trim(&once, mode, TrimSides::ALL);
        assert_eq!(once.data(), twice.data(), "{mode:?}");
    }
}

#[test]
fn bit_reader_concatenation() {
    let data = [0xDEu8, 0xAD, 0xBE, 0xEF, 0x12];
    for (a, b) in [(1u8, 1u8), (3, 7), (9, 15), (16, 16), (5, 27)] {
        let mut split = BitReader::new(InputBuffer::new(&data));
        let hi = split.read_bits(a).unwrap();
        let lo = split.read_bits(b).unwrap();
        let mut whole = BitReader::new(InputBuffer::new(&data));
        let combined = whole.read_bits(a + b).unwrap();
        assert_eq!(u64::from(combined), u64::from(hi) << b | u64::from(lo));
    }
}

#[test]
fn get_bytes_lengths_match_the_contract() {
    let image = patterned(5, 4, PixelFormat::Uint8, 3);
    for (order, channels) in [
        (ChannelOrder::Rgba, 4),
        (ChannelOrder::Bgra, 4),
        (ChannelOrder::Abgr, 4),
        (ChannelOrder::Argb, 4),
        (ChannelOrder::Rgb, 3),
        (ChannelOrder::Bgr, 3),
        (ChannelOrder::Luminance, 1),
    ] {
        assert_eq!(image.get_bytes(order).len(), 5 * 4 * channels);
    }

    let wide = patterned(3, 3, PixelFormat::Uint16, 1);
    assert_eq!(wide.get_bytes(ChannelOrder::Rgb).len(), 3 * 3 * 3 * 2);
}

#[test]
fn alpha_blend_contract() {
    // Full source alpha at full opacity returns the source; zero source
    // alpha returns the destination.
    let src = [9.0, 8.0, 7.0, 255.0];
    let dst = [1.0, 2.0, 3.0, 200.0];
    assert_eq!(color::alpha_blend(src, dst, 255.0), src);
    assert_eq!(
        color::alpha_blend([9.0, 8.0, 7.0, 0.0], dst, 255.0),
        dst
    );
}

#[test]
fn hsl_round_trip_over_channel_grid() {
    for r in (0..=255).step_by(51) {
        for g in (0..=255).step_by(51) {
            for b in (0..=255).step_by(51) {
                let (h, s, l) = color::rgb_to_hsl(f64::from(r), f64::from(g), f64::from(b));
                let (r2, g2, b2) = color::hsl_to_rgb(h, s, l);
                assert!((f64::from(r) - r2).abs() <= 1.0, "{r} {g} {b}");
                assert!((f64::from(g) - g2).abs() <= 1.0, "{r} {g} {b}");
                assert!((f64::from(b) - b2).abs() <= 1.0, "{r} {g} {b}");
            }
        }
    }
}

#[test]
fn resize_then_sample_midpoint() {
    let mut image = Image::new(2, 2, PixelFormat::Uint8, 1);
    image.set_sample(1, 1, 0, 255.0);
    let small = copy_resize(&image, 1, 1, Interpolation::Linear);
    assert_eq!(small.get_sample(0, 0, 0), 63.0);
}

#[test]
fn compose_ops_use_the_overlap() {
    let mut a = patterned(4, 4, PixelFormat::Uint8, 1);
    let before = a.get_sample(3, 3, 0);
    let b = patterned(2, 2, PixelFormat::Uint8, 1);

    a.subtract_image(&b);
    // Outside the overlap nothing changes.
    assert_eq!(a.get_sample(3, 3, 0), before);
    // Inside, the same pattern cancels to zero.
    assert_eq!(a.get_sample(0, 0, 0), 0.0);
    assert_eq!(a.get_sample(1, 1, 0), 0.0);
}
