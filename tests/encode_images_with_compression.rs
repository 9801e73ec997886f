//! Encode-then-decode round trips through the TIFF encoder.

use std::io::Cursor;

use raster::codecs::tiff::TiffDecoder;
use raster::encoder::{StripCompression, TiffEncoder};
use raster::image::{Image, PixelFormat};
use raster::{FrameType, ImageDecoder};

fn gradient(width: u32, height: u32, format: PixelFormat, channels: u8) -> Image {
    let mut image = Image::new(width, height, format, channels);
    let max = format.max_value();
    image.update_pixels(|x, y, pixel| {
        for c in 0..pixel.num_channels() as u32 {
            let value = f64::from(x * 31 + y * 17 + c * 7) % (max + 1.0);
            pixel.set_channel(c as usize, value);
        }
    });
    image
}

fn assert_images_equal(a: &Image, b: &Image) {
    assert_eq!((a.width(), a.height()), (b.width(), b.height()));
    assert_eq!(a.num_channels(), b.num_channels());
    for y in 0..a.height() {
        for x in 0..a.width() {
            for c in 0..a.num_channels() {
                assert_eq!(
                    a.get_sample(x, y, c),
                    b.get_sample(x, y, c),
                    "sample ({x}, {y}, {c})"
                );
            }
        }
    }
}

fn round_trip(image: &Image, compression: StripCompression) {
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut buffer).unwrap();
        encoder
            .write_image_with_compression(image, compression)
            .unwrap();
    }

    let data = buffer.into_inner();
    let mut decoder = TiffDecoder::new();
    let decoded = decoder.decode(&data, 0).unwrap();
    assert_images_equal(image, &decoded);
}

#[test]
fn round_trip_gray8() {
    let image = gradient(21, 10, PixelFormat::Uint8, 1);
    round_trip(&image, StripCompression::None);
    round_trip(&image, StripCompression::Lzw);
    round_trip(&image, StripCompression::Deflate);
    round_trip(&image, StripCompression::PackBits);
}

#[test]
fn round_trip_rgb8() {
    let image = gradient(7, 5, PixelFormat::Uint8, 3);
    round_trip(&image, StripCompression::None);
    round_trip(&image, StripCompression::Lzw);
    round_trip(&image, StripCompression::Deflate);
    round_trip(&image, StripCompression::PackBits);
}

#[test]
fn round_trip_rgba8() {
    let image = gradient(4, 4, PixelFormat::Uint8, 4);
    round_trip(&image, StripCompression::Lzw);
    round_trip(&image, StripCompression::PackBits);
}

#[test]
fn round_trip_gray_alpha16() {
    let image = gradient(3, 9, PixelFormat::Uint16, 2);
    round_trip(&image, StripCompression::None);
    round_trip(&image, StripCompression::Deflate);
}

#[test]
fn round_trip_rgb16() {
    let image = gradient(6, 2, PixelFormat::Uint16, 3);
    round_trip(&image, StripCompression::None);
    round_trip(&image, StripCompression::Lzw);
}

#[test]
fn round_trip_spans_multiple_strips() {
    // Tall enough that the encoder emits several strips.
    let image = gradient(64, 200, PixelFormat::Uint8, 3);
    round_trip(&image, StripCompression::None);
    round_trip(&image, StripCompression::Deflate);
}

#[test]
fn multi_page_files_decode_as_pages() {
    let first = gradient(5, 4, PixelFormat::Uint8, 3);
    let second = gradient(3, 2, PixelFormat::Uint8, 1);

    let mut buffer = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut buffer).unwrap();
        encoder.write_image(&first).unwrap();
        encoder.write_image(&second).unwrap();
    }

    let data = buffer.into_inner();
    let mut decoder = TiffDecoder::new();
    let animation = decoder.decode_animation(&data).unwrap();
    assert_eq!(animation.num_frames(), 2);
    assert_eq!(animation.frame_type, FrameType::Page);
    assert_images_equal(&first, &animation.frame(0).unwrap().image);
    assert_images_equal(&second, &animation.frame(1).unwrap().image);
}

#[test]
fn orientation_survives_a_round_trip() {
    let mut image = gradient(4, 2, PixelFormat::Uint8, 1);
    let mut exif = raster::ExifData::default();
    exif.set_orientation(6);
    image.exif = Some(exif);

    let mut buffer = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut buffer).unwrap();
        encoder.write_image(&image).unwrap();
    }
    let data = buffer.into_inner();
    let mut decoder = TiffDecoder::new();
    let decoded = decoder.decode(&data, 0).unwrap();
    assert_eq!(decoded.exif.unwrap().orientation(), Some(6));
}
