//! TIFF decoding: classic (non-Big) TIFF, tiled or striped, with
//! None/CCITT/LZW/JPEG/PackBits/Deflate compression, horizontal predictor,
//! palettes and multi-page files.

use std::collections::HashSet;

use crate::codecs::{DecodeInfo, ImageDecoder};
use crate::error::{ImageError, ImageFormatError, ImageResult, UsageError};
use crate::image::{FrameType, Image};
use crate::stream::{ByteOrder, InputBuffer};

mod image;

use self::image::TiffImage;

/// Decoding limits
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct Limits {
    /// The maximum size of any decoded frame buffer in bytes, the default
    /// is 256MiB.
    pub decoding_buffer_size: usize,
    /// The maximum size of any ifd value in bytes, the default is
    /// 1MiB.
    pub ifd_value_size: usize,
}

impl Limits {
    /// A configuration that does not impose any limits.
    ///
    /// This is a good start if the caller only wants to impose selective limits, contrary to the
    /// default limits which allows selectively disabling limits.
    ///
    /// Note that this configuration is likely to crash on excessively large images since,
    /// naturally, the machine running the program does not have infinite memory.
    pub fn unlimited() -> Limits {
        Limits {
            decoding_buffer_size: usize::MAX,
            ifd_value_size: usize::MAX,
        }
    }
}

impl Default for Limits {
    fn default() -> Limits {
        Limits {
            decoding_buffer_size: 256 * 1024 * 1024,
            ifd_value_size: 1024 * 1024,
        }
    }
}

/// Decoder for the TIFF container.
///
/// `start_decode` walks the whole IFD chain so every page's geometry is
/// known up front; pixel data is only touched by `decode_frame`.
#[derive(Default)]
pub struct TiffDecoder<'a> {
    input: Option<InputBuffer<'a>>,
    pages: Vec<TiffImage>,
    limits: Limits,
}

impl<'a> TiffDecoder<'a> {
    pub fn new() -> Self {
        TiffDecoder {
            input: None,
            pages: Vec::new(),
            limits: Limits::default(),
        }
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    fn read_header(data: &'a [u8]) -> ImageResult<(InputBuffer<'a>, u32)> {
        if data.len() < 8 {
            return Err(ImageFormatError::InvalidSignature.into());
        }
        let byte_order = match &data[..2] {
            b"II" => ByteOrder::LittleEndian,
            b"MM" => ByteOrder::BigEndian,
            _ => return Err(ImageFormatError::InvalidSignature.into()),
        };
        let mut input = InputBuffer::with_byte_order(data, byte_order);
        input.skip(2)?;
        if input.read_u16()? != 42 {
            return Err(ImageFormatError::InvalidSignature.into());
        }
        let first_ifd = input.read_u32()?;
        Ok((input, first_ifd))
    }
}

impl<'a> ImageDecoder<'a> for TiffDecoder<'a> {
    fn is_valid_file(&self, data: &'a [u8]) -> bool {
        data.len() >= 8
            && matches!(
                &data[..4],
                [0x49, 0x49, 0x2A, 0x00] | [0x4D, 0x4D, 0x00, 0x2A]
            )
    }

    fn start_decode(&mut self, data: &'a [u8]) -> ImageResult<DecodeInfo> {
        let (input, first_ifd) = Self::read_header(data)?;

        let mut pages = Vec::new();
        let mut seen = HashSet::new();
        let mut offset = first_ifd;
        while offset != 0 {
            if !seen.insert(offset) {
                return Err(ImageFormatError::CycleInOffsets.into());
            }
            let (page, next) = TiffImage::from_ifd(&input, offset, &self.limits)?;
            pages.push(page);
            offset = next;
        }
        if pages.is_empty() {
            return Err(ImageFormatError::ImageFileDirectoryNotFound.into());
        }

        let info = DecodeInfo {
            width: pages[0].width,
            height: pages[0].height,
            num_frames: pages.len(),
            background_color: None,
        };
        self.input = Some(input);
        self.pages = pages;
        Ok(info)
    }

    fn num_frames(&self) -> usize {
        self.pages.len()
    }

    fn decode_frame(&mut self, index: usize) -> ImageResult<Image> {
        let input = self
            .input
            .as_ref()
            .ok_or(UsageError::NoDecodeInProgress)?;
        let page = self
            .pages
            .get(index)
            .ok_or(UsageError::InvalidFrameIndex(index))?;
        if page.buffer_size() > self.limits.decoding_buffer_size {
            return Err(ImageError::LimitsExceeded);
        }
        page.decode(input)
    }

    /// Multiple TIFF images are pages of a document, not animation frames.
    fn frame_type(&self) -> FrameType {
        FrameType::Page
    }
}
