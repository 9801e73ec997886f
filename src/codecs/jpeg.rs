//! Baseline JPEG decoding, delegated to `zune-jpeg`.
//!
//! JPEG internals are out of scope here; this wrapper adapts the external
//! decoder to the uniform codec surface so JFIF files and the dispatcher
//! speak the same types.

use zune_jpeg::zune_core::colorspace::ColorSpace;

use crate::codecs::{DecodeInfo, ImageDecoder};
use crate::error::{ImageFormatError, ImageResult, UsageError};
use crate::image::{Image, PixelFormat};

#[derive(Default)]
pub struct JpegDecoder<'a> {
    data: Option<&'a [u8]>,
    info: Option<DecodeInfo>,
}

impl<'a> JpegDecoder<'a> {
    pub fn new() -> Self {
        JpegDecoder {
            data: None,
            info: None,
        }
    }
}

impl<'a> ImageDecoder<'a> for JpegDecoder<'a> {
    fn is_valid_file(&self, data: &'a [u8]) -> bool {
        data.len() >= 3 && data[0] == 0xFF && data[1] == 0xD8 && data[2] == 0xFF
    }

    fn start_decode(&mut self, data: &'a [u8]) -> ImageResult<DecodeInfo> {
        if !self.is_valid_file(data) {
            return Err(ImageFormatError::InvalidSignature.into());
        }
        let mut decoder = zune_jpeg::JpegDecoder::new(zune_jpeg::zune_core::bytestream::ZCursor::new(data));
        decoder
            .decode_headers()
            .map_err(|_| ImageFormatError::InvalidHeader("JPEG headers"))?;
        let info = decoder
            .info()
            .ok_or(ImageFormatError::InvalidHeader("JPEG headers"))?;

        let decode_info = DecodeInfo {
            width: u32::from(info.width),
            height: u32::from(info.height),
            num_frames: 1,
            background_color: None,
        };
        self.data = Some(data);
        self.info = Some(decode_info);
        Ok(decode_info)
    }

    fn num_frames(&self) -> usize {
        usize::from(self.info.is_some())
    }

    fn decode_frame(&mut self, index: usize) -> ImageResult<Image> {
        if index != 0 {
            return Err(UsageError::InvalidFrameIndex(index).into());
        }
        let data = self.data.ok_or(UsageError::NoDecodeInProgress)?;
        let info = self.info.ok_or(UsageError::NoDecodeInProgress)?;

        let mut decoder = zune_jpeg::JpegDecoder::new(zune_jpeg::zune_core::bytestream::ZCursor::new(data));
        let pixels = decoder
            .decode()
            .map_err(|_| ImageFormatError::Format("JPEG decode failed".into()))?;
        let channels = match decoder.output_colorspace() {
            Some(ColorSpace::Luma) => 1u8,
            _ => 3u8,
        };

        let mut image = Image::new(info.width, info.height, PixelFormat::Uint8, channels);
        let stride = info.width as usize * channels as usize;
        for y in 0..info.height {
            for x in 0..info.width {
                let base = y as usize * stride + x as usize * channels as usize;
                match channels {
                    1 => {
                        image.set_sample(x, y, 0, f64::from(pixels[base]));
                    }
                    _ => image.set_pixel_rgb(
                        x,
                        y,
                        f64::from(pixels[base]),
                        f64::from(pixels[base + 1]),
                        f64::from(pixels[base + 2]),
                    ),
                }
            }
        }
        Ok(image)
    }
}
