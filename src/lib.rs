//! Decoding and encoding of raster images across the common container
//! formats.
//!
//! Every decoder reads from an in-memory byte buffer and produces the same
//! [`Image`] pixel model: a 1 to 4 channel sample grid in one of twelve
//! sample formats, with optional palette, EXIF, ICC and text metadata.
//! TIFF is the most complete pipeline (tiles and strips, CCITT fax, LZW,
//! PackBits and Deflate compression, predictor reversal, palettes and
//! multi-page files) and has an encoder alongside; PNG, BMP, PNM and
//! baseline JPEG decode through the same interface.
//!
//! # Decoding
//!
//! ```no_run
//! # let bytes: Vec<u8> = vec![];
//! let image = raster::decode_image(&bytes)?;
//! println!("{}x{}", image.width(), image.height());
//! # Ok::<_, raster::ImageError>(())
//! ```
//!
//! Formats are recognized by magic bytes via [`ImageFormat::detect`]; a
//! specific codec can also be driven directly through [`ImageDecoder`].

pub mod bits;
pub mod codecs;
pub mod color;
pub mod compression;
pub mod encoder;
mod error;
pub mod ifd;
pub mod image;
pub mod stream;
pub mod tags;
pub mod transform;

pub use self::codecs::{
    decode_animation, decode_image, find_decoder, DecodeInfo, ImageDecoder, ImageFormat,
};
pub use self::error::{
    ImageError, ImageFormatError, ImageResult, ImageUnsupportedError, UsageError,
};
pub use self::image::{
    ChannelOrder, ExifData, FrameAnimation, FrameInfo, FrameType, Image, Interpolation, Palette,
    Pixel, PixelFormat,
};
