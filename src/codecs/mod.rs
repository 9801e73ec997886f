//! The codec dispatcher: a uniform decoder interface over every supported
//! container format, plus magic-byte format sniffing.

use crate::error::{ImageResult, ImageUnsupportedError, UsageError};
use crate::image::{FrameAnimation, FrameInfo, FrameType, Image};

pub mod bmp;
#[cfg(feature = "jpeg")]
pub mod jpeg;
pub mod png;
pub mod pnm;
pub mod tiff;

/// Basic properties available after parsing a file header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodeInfo {
    pub width: u32,
    pub height: u32,
    pub num_frames: usize,
    /// Canvas background as packed 8-bit RGBA, when the format carries one.
    pub background_color: Option<u32>,
}

/// The capability contract every codec implements.
///
/// `start_decode` parses the header only and stashes per-frame state inside
/// the decoder; `decode_frame` pulls out one frame. `decode` is the one-shot
/// convenience over both.
pub trait ImageDecoder<'a> {
    /// Magic-bytes check. Never errors: a mismatch is `false`.
    fn is_valid_file(&self, data: &'a [u8]) -> bool;

    /// Parses the header and prepares frame decoding.
    fn start_decode(&mut self, data: &'a [u8]) -> ImageResult<DecodeInfo>;

    /// Frames made available by `start_decode`; 0 before it ran.
    fn num_frames(&self) -> usize;

    /// Decodes the frame at `index`.
    fn decode_frame(&mut self, index: usize) -> ImageResult<Image>;

    /// Parses the header and decodes a single frame in one call.
    fn decode(&mut self, data: &'a [u8], frame_index: usize) -> ImageResult<Image> {
        let info = self.start_decode(data)?;
        if frame_index >= info.num_frames {
            return Err(UsageError::InvalidFrameIndex(frame_index).into());
        }
        self.decode_frame(frame_index)
    }

    /// Decodes every frame into an animation container. Single-frame
    /// formats return an animation of length 1.
    fn decode_animation(&mut self, data: &'a [u8]) -> ImageResult<FrameAnimation> {
        let info = self.start_decode(data)?;
        let mut animation = FrameAnimation::new(info.width, info.height, self.frame_type());
        animation.background_color = info.background_color;
        for index in 0..info.num_frames {
            animation.push_frame(FrameInfo::new(self.decode_frame(index)?));
        }
        Ok(animation)
    }

    /// How this format's multiple frames relate to each other.
    fn frame_type(&self) -> FrameType {
        FrameType::Animation
    }
}

/// Container formats the sniffer recognizes.
///
/// Recognition is wider than decoding: formats whose decoders live outside
/// this crate's scope are still identified by their magic bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Tiff,
    Png,
    Jpeg,
    Bmp,
    Ico,
    Gif,
    WebP,
    Pvr,
    Psd,
    Pnm,
}

impl ImageFormat {
    /// Identifies the container by its magic bytes.
    pub fn detect(data: &[u8]) -> Option<ImageFormat> {
        if data.len() < 4 {
            return None;
        }
        match data {
            [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => {
                Some(ImageFormat::Tiff)
            }
            [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some(ImageFormat::Png),
            [0xFF, 0xD8, 0xFF, ..] => Some(ImageFormat::Jpeg),
            [b'B', b'M', ..] => Some(ImageFormat::Bmp),
            [0x00, 0x00, 0x01, 0x00, ..] => Some(ImageFormat::Ico),
            [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some(ImageFormat::Gif),
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => {
                Some(ImageFormat::WebP)
            }
            [b'8', b'B', b'P', b'S', ..] => Some(ImageFormat::Psd),
            [b'P', b'1'..=b'6', b' ' | b'\t' | b'\n' | b'\r' | b'#', ..] => Some(ImageFormat::Pnm),
            // PVR3 magic, either endianness; PVR2 is recognized by its
            // 44- or 52-byte header size in the leading word.
            [b'P', b'V', b'R', 0x03, ..] | [0x03, b'R', b'V', b'P', ..] => Some(ImageFormat::Pvr),
            [44, 0, 0, 0, ..] | [52, 0, 0, 0, ..] => Some(ImageFormat::Pvr),
            _ => None,
        }
    }

    /// A decoder instance for this format, when one is built in.
    pub fn decoder<'a>(self) -> Option<Box<dyn ImageDecoder<'a> + 'a>> {
        match self {
            ImageFormat::Tiff => Some(Box::new(tiff::TiffDecoder::new())),
            ImageFormat::Png => Some(Box::new(png::PngDecoder::new())),
            ImageFormat::Bmp => Some(Box::new(bmp::BmpDecoder::new())),
            ImageFormat::Pnm => Some(Box::new(pnm::PnmDecoder::new())),
            #[cfg(feature = "jpeg")]
            ImageFormat::Jpeg => Some(Box::new(jpeg::JpegDecoder::new())),
            _ => None,
        }
    }
}

/// Sniffs the format and returns a decoder ready for `start_decode`.
pub fn find_decoder<'a>(data: &'a [u8]) -> Option<Box<dyn ImageDecoder<'a> + 'a>> {
    ImageFormat::detect(data)?.decoder()
}

/// Decodes the first frame of any supported format.
pub fn decode_image(data: &[u8]) -> ImageResult<Image> {
    match find_decoder(data) {
        Some(mut decoder) => decoder.decode(data, 0),
        None => Err(ImageUnsupportedError::UnsupportedFeature(
            "no decoder available for this format",
        )
        .into()),
    }
}

/// Decodes every frame of any supported format.
pub fn decode_animation(data: &[u8]) -> ImageResult<FrameAnimation> {
    match find_decoder(data) {
        Some(mut decoder) => decoder.decode_animation(data),
        None => Err(ImageUnsupportedError::UnsupportedFeature(
            "no decoder available for this format",
        )
        .into()),
    }
}
