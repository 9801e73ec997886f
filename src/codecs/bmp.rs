//! BMP decoding: uncompressed 24- and 32-bit DIBs, bottom-up or top-down.

use crate::codecs::{DecodeInfo, ImageDecoder};
use crate::error::{ImageFormatError, ImageResult, ImageUnsupportedError, UsageError};
use crate::image::{Image, PixelFormat};
use crate::stream::InputBuffer;

const BI_RGB: u32 = 0;

#[derive(Default)]
pub struct BmpDecoder<'a> {
    input: Option<InputBuffer<'a>>,
    info: Option<BmpInfo>,
}

#[derive(Clone, Copy, Debug)]
struct BmpInfo {
    width: u32,
    height: u32,
    top_down: bool,
    bits_per_pixel: u16,
    data_offset: u32,
}

impl<'a> BmpDecoder<'a> {
    pub fn new() -> Self {
        BmpDecoder {
            input: None,
            info: None,
        }
    }

    fn parse_header(data: &'a [u8]) -> ImageResult<(InputBuffer<'a>, BmpInfo)> {
        let mut input = InputBuffer::new(data);
        if input.read_u16()? != u16::from_le_bytes(*b"BM") {
            return Err(ImageFormatError::InvalidSignature.into());
        }
        input.skip(8)?; // file size, reserved
        let data_offset = input.read_u32()?;

        let header_size = input.read_u32()?;
        if header_size < 40 {
            return Err(ImageUnsupportedError::UnsupportedFeature(
                "BMP core headers before BITMAPINFOHEADER",
            )
            .into());
        }
        let width = input.read_i32()?;
        let raw_height = input.read_i32()?;
        let _planes = input.read_u16()?;
        let bits_per_pixel = input.read_u16()?;
        let compression = input.read_u32()?;

        if compression != BI_RGB {
            return Err(ImageUnsupportedError::UnsupportedFeature(
                "compressed or bitfield BMP data",
            )
            .into());
        }
        if !matches!(bits_per_pixel, 24 | 32) {
            return Err(ImageUnsupportedError::UnsupportedSampleDepth(
                bits_per_pixel.min(255) as u8,
            )
            .into());
        }
        if width <= 0 || raw_height == 0 || raw_height == i32::MIN {
            return Err(ImageFormatError::InvalidHeader("non-positive dimensions").into());
        }

        Ok((
            input,
            BmpInfo {
                width: width as u32,
                height: raw_height.unsigned_abs(),
                top_down: raw_height < 0,
                bits_per_pixel,
                data_offset,
            },
        ))
    }
}

impl<'a> ImageDecoder<'a> for BmpDecoder<'a> {
    fn is_valid_file(&self, data: &'a [u8]) -> bool {
        data.len() >= 2 && &data[..2] == b"BM"
    }

    fn start_decode(&mut self, data: &'a [u8]) -> ImageResult<DecodeInfo> {
        let (input, info) = Self::parse_header(data)?;
        self.input = Some(input);
        self.info = Some(info);
        Ok(DecodeInfo {
            width: info.width,
            height: info.height,
            num_frames: 1,
            background_color: None,
        })
    }

    fn num_frames(&self) -> usize {
        usize::from(self.info.is_some())
    }

    fn decode_frame(&mut self, index: usize) -> ImageResult<Image> {
        if index != 0 {
            return Err(UsageError::InvalidFrameIndex(index).into());
        }
        let input = self.input.as_ref().ok_or(UsageError::NoDecodeInProgress)?;
        let info = self.info.ok_or(UsageError::NoDecodeInProgress)?;

        let channels = (info.bits_per_pixel / 8) as usize;
        // Rows are stored padded to 4-byte boundaries.
        let row_bytes = (info.width as usize * channels + 3) & !3;
        let mut rows = input.subarray(
            row_bytes * info.height as usize,
            info.data_offset as usize,
        )?;

        let mut image = Image::new(info.width, info.height, PixelFormat::Uint8, channels as u8);
        for row in 0..info.height {
            let y = if info.top_down {
                row
            } else {
                info.height - 1 - row
            };
            for x in 0..info.width {
                let b = f64::from(rows.read_u8()?);
                let g = f64::from(rows.read_u8()?);
                let r = f64::from(rows.read_u8()?);
                if channels == 4 {
                    let a = f64::from(rows.read_u8()?);
                    image.set_pixel_rgba(x, y, r, g, b, a);
                } else {
                    image.set_pixel_rgb(x, y, r, g, b);
                }
            }
            rows.skip(row_bytes - info.width as usize * channels)?;
        }
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a minimal bottom-up 24-bit BMP.
    fn build_bmp(width: u32, height: i32, pixels: &[[u8; 3]]) -> Vec<u8> {
        let row_bytes = (width as usize * 3 + 3) & !3;
        let data_size = row_bytes * height.unsigned_abs() as usize;
        let mut out = Vec::new();
        out.extend_from_slice(b"BM");
        out.extend_from_slice(&(54 + data_size as u32).to_le_bytes());
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(&54u32.to_le_bytes());
        out.extend_from_slice(&40u32.to_le_bytes());
        out.extend_from_slice(&(width as i32).to_le_bytes());
        out.extend_from_slice(&height.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&24u16.to_le_bytes());
        out.extend_from_slice(&[0; 24]); // compression + size + resolution + colors
        for row in pixels.chunks(width as usize) {
            let mut written = 0;
            for [r, g, b] in row {
                out.extend_from_slice(&[*b, *g, *r]);
                written += 3;
            }
            out.resize(out.len() + (row_bytes - written), 0);
        }
        out
    }

    #[test]
    fn decodes_bottom_up_rows() {
        // Two rows: stored bottom row first.
        let data = build_bmp(
            1,
            2,
            &[[10, 20, 30], [40, 50, 60]], // bottom, top
        );
        let mut decoder = BmpDecoder::new();
        let image = decoder.decode(&data, 0).unwrap();
        assert_eq!(image.get_sample(0, 0, 0), 40.0);
        assert_eq!(image.get_sample(0, 1, 0), 10.0);
        assert_eq!(image.get_sample(0, 1, 2), 30.0);
    }

    #[test]
    fn decodes_top_down_rows() {
        let data = build_bmp(1, -2, &[[10, 20, 30], [40, 50, 60]]);
        let mut decoder = BmpDecoder::new();
        let image = decoder.decode(&data, 0).unwrap();
        assert_eq!(image.get_sample(0, 0, 0), 10.0);
        assert_eq!(image.get_sample(0, 1, 0), 40.0);
    }

    #[test]
    fn rejects_unsupported_depth() {
        let mut data = build_bmp(1, 1, &[[0, 0, 0]]);
        data[28] = 8; // bits per pixel
        let mut decoder = BmpDecoder::new();
        assert!(decoder.decode(&data, 0).is_err());
    }
}
