//! PNG decoding: zlib-wrapped IDAT data, the five scanline filters,
//! palettes and `tEXt` metadata chunks.
//!
//! All three `tRNS` forms are handled: palette alpha entries fold into a
//! fourth palette channel, and the grayscale/RGB transparent-color keys
//! expand into an alpha channel on the decoded image.
//!
//! Interlaced files are not supported.

use std::collections::BTreeMap;

use crate::codecs::{DecodeInfo, ImageDecoder};
use crate::compression::deflate;
use crate::error::{ImageFormatError, ImageResult, ImageUnsupportedError, UsageError};
use crate::image::{Image, Palette, PixelFormat};
use crate::stream::{BitReader, ByteOrder, InputBuffer};

const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PngColorType {
    Grayscale,
    Rgb,
    Indexed,
    GrayscaleAlpha,
    RgbAlpha,
}

impl PngColorType {
    fn from_u8(value: u8) -> Option<PngColorType> {
        Some(match value {
            0 => PngColorType::Grayscale,
            2 => PngColorType::Rgb,
            3 => PngColorType::Indexed,
            4 => PngColorType::GrayscaleAlpha,
            6 => PngColorType::RgbAlpha,
            _ => return None,
        })
    }

    fn num_channels(self) -> u8 {
        match self {
            PngColorType::Grayscale | PngColorType::Indexed => 1,
            PngColorType::GrayscaleAlpha => 2,
            PngColorType::Rgb => 3,
            PngColorType::RgbAlpha => 4,
        }
    }
}

#[derive(Debug)]
struct PngHeader {
    width: u32,
    height: u32,
    bit_depth: u8,
    color_type: PngColorType,
}

#[derive(Default)]
pub struct PngDecoder<'a> {
    header: Option<PngHeader>,
    idat: Vec<u8>,
    palette: Option<Palette>,
    /// Raw `tRNS` payload; for grayscale and RGB this is the 16-bit
    /// transparent-color key.
    transparency: Option<Vec<u8>>,
    text_data: BTreeMap<String, String>,
    _marker: std::marker::PhantomData<&'a ()>,
}

impl<'a> PngDecoder<'a> {
    pub fn new() -> Self {
        PngDecoder {
            header: None,
            idat: Vec::new(),
            palette: None,
            transparency: None,
            text_data: BTreeMap::new(),
            _marker: std::marker::PhantomData,
        }
    }

    fn parse_chunks(&mut self, data: &'a [u8]) -> ImageResult<()> {
        self.header = None;
        self.idat.clear();
        self.palette = None;
        self.transparency = None;
        self.text_data.clear();

        let mut input = InputBuffer::with_byte_order(data, ByteOrder::BigEndian);
        if input.read_bytes(8)? != SIGNATURE.as_slice() {
            return Err(ImageFormatError::InvalidSignature.into());
        }

        let mut trns: Option<Vec<u8>> = None;
        loop {
            let length = input.read_u32()? as usize;
            let chunk_start = input.position();
            let chunk_type: [u8; 4] = input.read_bytes(4)?.try_into().unwrap();
            let chunk_data = input.read_bytes(length)?;
            let crc = input.read_u32()?;

            let mut hasher = crc32fast::Hasher::new();
            hasher.update(&data[chunk_start..chunk_start + 4 + length]);
            if hasher.finalize() != crc {
                return Err(ImageFormatError::InvalidChecksum.into());
            }

            match &chunk_type {
                b"IHDR" => self.parse_ihdr(chunk_data)?,
                b"PLTE" => {
                    if chunk_data.len() % 3 != 0 {
                        return Err(ImageFormatError::InvalidHeader("PLTE length").into());
                    }
                    let mut palette = Palette::new(chunk_data.len() / 3, 3);
                    for (index, rgb) in chunk_data.chunks_exact(3).enumerate() {
                        palette.set(index, 0, u16::from(rgb[0]));
                        palette.set(index, 1, u16::from(rgb[1]));
                        palette.set(index, 2, u16::from(rgb[2]));
                    }
                    self.palette = Some(palette);
                }
                b"tRNS" => trns = Some(chunk_data.to_vec()),
                b"tEXt" => {
                    if let Some(nul) = chunk_data.iter().position(|&b| b == 0) {
                        let keyword: String =
                            chunk_data[..nul].iter().map(|&b| b as char).collect();
                        let text: String =
                            chunk_data[nul + 1..].iter().map(|&b| b as char).collect();
                        self.text_data.insert(keyword, text);
                    }
                }
                b"IDAT" => self.idat.extend_from_slice(chunk_data),
                b"IEND" => break,
                _ => {}
            }
            if input.remaining() == 0 {
                break;
            }
        }

        // Palette transparency folds into a fourth palette channel; the
        // gray/RGB color-key forms are kept for the sample fill.
        if let (Some(palette), Some(alpha)) = (&self.palette, &trns) {
            let mut with_alpha = Palette::new(palette.num_colors(), 4);
            for index in 0..palette.num_colors() {
                for channel in 0..3 {
                    with_alpha.set(index, channel, palette.get(index, channel));
                }
                let a = alpha.get(index).copied().unwrap_or(255);
                with_alpha.set(index, 3, u16::from(a));
            }
            self.palette = Some(with_alpha);
        }
        self.transparency = trns;
        Ok(())
    }

    /// The grayscale or RGB transparent-color key, as stored sample values.
    ///
    /// Keys are written as 16-bit words with the significant bits at the
    /// bottom, so they compare directly against decoded samples at any
    /// depth.
    fn color_key(&self, header: &PngHeader) -> Option<Vec<f64>> {
        let trns = self.transparency.as_deref()?;
        let words = match header.color_type {
            PngColorType::Grayscale => 1,
            PngColorType::Rgb => 3,
            _ => return None,
        };
        if trns.len() < words * 2 {
            return None;
        }
        Some(
            trns.chunks_exact(2)
                .take(words)
                .map(|pair| f64::from(u16::from_be_bytes([pair[0], pair[1]])))
                .collect(),
        )
    }

    fn parse_ihdr(&mut self, chunk: &[u8]) -> ImageResult<()> {
        if chunk.len() != 13 {
            return Err(ImageFormatError::InvalidHeader("IHDR length").into());
        }
        let mut view = InputBuffer::with_byte_order(chunk, ByteOrder::BigEndian);
        let width = view.read_u32()?;
        let height = view.read_u32()?;
        let bit_depth = view.read_u8()?;
        let color_type = PngColorType::from_u8(view.read_u8()?)
            .ok_or(ImageFormatError::InvalidHeader("color type"))?;
        let compression = view.read_u8()?;
        let filter_method = view.read_u8()?;
        let interlace = view.read_u8()?;

        if width == 0 || height == 0 {
            return Err(ImageFormatError::InvalidDimensions(width, height).into());
        }
        if compression != 0 || filter_method != 0 {
            return Err(ImageFormatError::InvalidHeader("compression or filter method").into());
        }
        if interlace != 0 {
            return Err(
                ImageUnsupportedError::UnsupportedFeature("Adam7 interlaced PNG").into(),
            );
        }
        let depth_ok = match color_type {
            PngColorType::Grayscale => matches!(bit_depth, 1 | 2 | 4 | 8 | 16),
            PngColorType::Indexed => matches!(bit_depth, 1 | 2 | 4 | 8),
            _ => matches!(bit_depth, 8 | 16),
        };
        if !depth_ok {
            return Err(ImageUnsupportedError::UnsupportedSampleDepth(bit_depth).into());
        }

        self.header = Some(PngHeader {
            width,
            height,
            bit_depth,
            color_type,
        });
        Ok(())
    }
}

impl<'a> ImageDecoder<'a> for PngDecoder<'a> {
    fn is_valid_file(&self, data: &'a [u8]) -> bool {
        data.len() >= 8 && data[..8] == SIGNATURE
    }

    fn start_decode(&mut self, data: &'a [u8]) -> ImageResult<DecodeInfo> {
        self.parse_chunks(data)?;
        let header = self.header.as_ref().ok_or(ImageFormatError::InvalidHeader(
            "missing IHDR chunk",
        ))?;
        if header.color_type == PngColorType::Indexed && self.palette.is_none() {
            return Err(ImageFormatError::InvalidHeader("indexed PNG without PLTE").into());
        }
        Ok(DecodeInfo {
            width: header.width,
            height: header.height,
            num_frames: 1,
            background_color: None,
        })
    }

    fn num_frames(&self) -> usize {
        usize::from(self.header.is_some())
    }

    fn decode_frame(&mut self, index: usize) -> ImageResult<Image> {
        if index != 0 {
            return Err(UsageError::InvalidFrameIndex(index).into());
        }
        let header = self.header.as_ref().ok_or(UsageError::NoDecodeInProgress)?;

        let channels = header.color_type.num_channels();
        let bits_per_pixel = usize::from(channels) * usize::from(header.bit_depth);
        let stride = (header.width as usize * bits_per_pixel).div_ceil(8);
        // The filter unit is a whole pixel, at least one byte.
        let filter_unit = bits_per_pixel.div_ceil(8).max(1);

        let raw = deflate::inflate_zlib(&self.idat)?;
        let expected = (stride + 1) * header.height as usize;
        if raw.len() < expected {
            return Err(ImageFormatError::InvalidDeflateStream.into());
        }

        // Unfilter in place on a private scratch buffer.
        let mut scanlines = vec![0u8; stride * header.height as usize];
        for y in 0..header.height as usize {
            let filter = raw[y * (stride + 1)];
            let line = &raw[y * (stride + 1) + 1..][..stride];
            let (done, current) = scanlines.split_at_mut(y * stride);
            let current = &mut current[..stride];
            current.copy_from_slice(line);
            let previous = done.get(y.saturating_sub(1) * stride..y * stride);
            let previous = if y == 0 { None } else { previous };
            unfilter(filter, current, previous, filter_unit)?;
        }

        let pixel_format = match (header.bit_depth, header.color_type) {
            (1, _) => PixelFormat::Uint1,
            (2, _) => PixelFormat::Uint2,
            (4, _) => PixelFormat::Uint4,
            (8, _) => PixelFormat::Uint8,
            (16, _) => PixelFormat::Uint16,
            _ => unreachable!("depth validated in IHDR"),
        };

        // A gray/RGB color key grows the image by an alpha channel.
        let color_key = self.color_key(header);
        let out_channels = channels + u8::from(color_key.is_some());

        let mut image = match header.color_type {
            PngColorType::Indexed => {
                let palette = self
                    .palette
                    .clone()
                    .ok_or(ImageFormatError::InvalidHeader("indexed PNG without PLTE"))?;
                Image::with_palette(header.width, header.height, pixel_format, palette)
            }
            _ => Image::new(header.width, header.height, pixel_format, out_channels),
        };
        if !self.text_data.is_empty() {
            image.text_data = Some(self.text_data.clone());
        }
        let opaque = image.max_channel_value();

        if header.bit_depth < 8 {
            for y in 0..header.height {
                let line = &scanlines[y as usize * stride..][..stride];
                let mut reader = BitReader::new(InputBuffer::new(line));
                for x in 0..header.width {
                    let value = f64::from(reader.read_bits(header.bit_depth)?);
                    image.set_sample(x, y, 0, value);
                    if let Some(key) = &color_key {
                        let alpha = if value == key[0] { 0.0 } else { opaque };
                        image.set_sample(x, y, 1, alpha);
                    }
                }
            }
        } else {
            let mut view =
                InputBuffer::with_byte_order(&scanlines, ByteOrder::BigEndian);
            for y in 0..header.height {
                for x in 0..header.width {
                    let mut sample = [0.0f64; 4];
                    for c in 0..channels {
                        let value = if header.bit_depth == 16 {
                            f64::from(view.read_u16()?)
                        } else {
                            f64::from(view.read_u8()?)
                        };
                        sample[c as usize] = value;
                        image.set_sample(x, y, c, value);
                    }
                    if let Some(key) = &color_key {
                        let matches = key
                            .iter()
                            .enumerate()
                            .all(|(c, &k)| sample[c] == k);
                        let alpha = if matches { 0.0 } else { opaque };
                        image.set_sample(x, y, channels, alpha);
                    }
                }
            }
        }
        Ok(image)
    }
}

/// Reverses one scanline filter in place. `previous` is the already
/// reconstructed line above, absent on the first row.
fn unfilter(
    filter: u8,
    current: &mut [u8],
    previous: Option<&[u8]>,
    unit: usize,
) -> ImageResult<()> {
    let above = |previous: Option<&[u8]>, i: usize| previous.map_or(0, |p| p[i]);
    match filter {
        0 => {}
        1 => {
            for i in unit..current.len() {
                current[i] = current[i].wrapping_add(current[i - unit]);
            }
        }
        2 => {
            for i in 0..current.len() {
                current[i] = current[i].wrapping_add(above(previous, i));
            }
        }
        3 => {
            for i in 0..current.len() {
                let left = if i >= unit { current[i - unit] } else { 0 };
                let up = above(previous, i);
                let avg = ((u16::from(left) + u16::from(up)) / 2) as u8;
                current[i] = current[i].wrapping_add(avg);
            }
        }
        4 => {
            for i in 0..current.len() {
                let left = if i >= unit { current[i - unit] } else { 0 };
                let up = above(previous, i);
                let up_left = if i >= unit {
                    above(previous, i - unit)
                } else {
                    0
                };
                current[i] = current[i].wrapping_add(paeth(left, up, up_left));
            }
        }
        _ => return Err(ImageFormatError::InvalidHeader("unknown scanline filter").into()),
    }
    Ok(())
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = i32::from(a) + i32::from(b) - i32::from(c);
    let pa = (p - i32::from(a)).abs();
    let pb = (p - i32::from(b)).abs();
    let pc = (p - i32::from(c)).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::deflate::deflate_zlib;

    fn chunk(kind: &[u8; 4], data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        out.extend_from_slice(kind);
        out.extend_from_slice(data);
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(kind);
        hasher.update(data);
        out.extend_from_slice(&hasher.finalize().to_be_bytes());
        out
    }

    fn build_png(
        width: u32,
        height: u32,
        bit_depth: u8,
        color_type: u8,
        scanlines: &[u8],
        extra: &[Vec<u8>],
    ) -> Vec<u8> {
        let mut ihdr = Vec::new();
        ihdr.extend_from_slice(&width.to_be_bytes());
        ihdr.extend_from_slice(&height.to_be_bytes());
        ihdr.extend_from_slice(&[bit_depth, color_type, 0, 0, 0]);

        let mut out = SIGNATURE.to_vec();
        out.extend(chunk(b"IHDR", &ihdr));
        for e in extra {
            out.extend_from_slice(e);
        }
        out.extend(chunk(b"IDAT", &deflate_zlib(scanlines).unwrap()));
        out.extend(chunk(b"IEND", &[]));
        out
    }

    #[test]
    fn decodes_rgb_with_sub_filter() {
        // One row, filter 1 (Sub): deltas reconstruct 10,20,30 then 15,25,35.
        let scanlines = [1u8, 10, 20, 30, 5, 5, 5];
        let data = build_png(2, 1, 8, 2, &scanlines, &[]);
        let mut decoder = PngDecoder::new();
        let image = decoder.decode(&data, 0).unwrap();
        assert_eq!(image.get_sample(0, 0, 0), 10.0);
        assert_eq!(image.get_sample(1, 0, 0), 15.0);
        assert_eq!(image.get_sample(1, 0, 2), 35.0);
    }

    #[test]
    fn decodes_up_filter_across_rows() {
        let scanlines = [0u8, 100, 2, 50];
        let data = build_png(1, 2, 8, 0, &scanlines, &[]);
        let mut decoder = PngDecoder::new();
        let image = decoder.decode(&data, 0).unwrap();
        assert_eq!(image.get_sample(0, 0, 0), 100.0);
        assert_eq!(image.get_sample(0, 1, 0), 150.0);
    }

    #[test]
    fn indexed_with_transparency() {
        let plte = chunk(b"PLTE", &[255, 0, 0, 0, 255, 0]);
        let trns = chunk(b"tRNS", &[255, 7]);
        let scanlines = [0u8, 0, 1];
        let data = build_png(2, 1, 8, 3, &scanlines, &[plte, trns]);
        let mut decoder = PngDecoder::new();
        let image = decoder.decode(&data, 0).unwrap();
        let palette = image.palette().unwrap();
        assert_eq!(palette.num_channels(), 4);
        assert_eq!(image.get_pixel(0, 0).a(), 255.0);
        assert_eq!(image.get_pixel(1, 0).a(), 7.0);
        assert_eq!(image.get_pixel(1, 0).g(), 255.0);
    }

    #[test]
    fn gray_color_key_becomes_alpha() {
        // 3x1 grayscale with transparent color 7: the image gains an alpha
        // channel that is 0 exactly where the key matches.
        let trns = chunk(b"tRNS", &[0x00, 0x07]);
        let scanlines = [0u8, 5, 7, 9];
        let data = build_png(3, 1, 8, 0, &scanlines, &[trns]);
        let mut decoder = PngDecoder::new();
        let image = decoder.decode(&data, 0).unwrap();

        assert_eq!(image.num_channels(), 2);
        assert_eq!(image.get_sample(0, 0, 0), 5.0);
        assert_eq!(image.get_sample(0, 0, 1), 255.0);
        assert_eq!(image.get_sample(1, 0, 1), 0.0);
        assert_eq!(image.get_sample(2, 0, 1), 255.0);
    }

    #[test]
    fn rgb_color_key_matches_whole_pixels() {
        // Key is (1, 2, 3); only the first pixel matches on all channels.
        let trns = chunk(b"tRNS", &[0, 1, 0, 2, 0, 3]);
        let scanlines = [0u8, 1, 2, 3, 1, 2, 4];
        let data = build_png(2, 1, 8, 2, &scanlines, &[trns]);
        let mut decoder = PngDecoder::new();
        let image = decoder.decode(&data, 0).unwrap();

        assert_eq!(image.num_channels(), 4);
        assert_eq!(image.get_sample(0, 0, 3), 0.0);
        assert_eq!(image.get_sample(1, 0, 3), 255.0);
        assert_eq!(image.get_sample(1, 0, 2), 4.0);
    }

    #[test]
    fn sixteen_bit_gray_color_key() {
        let trns = chunk(b"tRNS", &[0x01, 0x00]);
        let scanlines = [0u8, 0x01, 0x00, 0x02, 0x00];
        let data = build_png(2, 1, 16, 0, &scanlines, &[trns]);
        let mut decoder = PngDecoder::new();
        let image = decoder.decode(&data, 0).unwrap();

        assert_eq!(image.num_channels(), 2);
        assert_eq!(image.get_sample(0, 0, 1), 0.0);
        assert_eq!(image.get_sample(1, 0, 1), 65535.0);
    }

    #[test]
    fn text_chunks_land_in_metadata() {
        let text = chunk(b"tEXt", b"Title\0A tiny image");
        let data = build_png(1, 1, 8, 0, &[0u8, 7], &[text]);
        let mut decoder = PngDecoder::new();
        let image = decoder.decode(&data, 0).unwrap();
        assert_eq!(
            image.text_data.unwrap().get("Title").map(String::as_str),
            Some("A tiny image")
        );
    }

    #[test]
    fn corrupt_crc_is_rejected() {
        let mut data = build_png(1, 1, 8, 0, &[0u8, 7], &[]);
        let len = data.len();
        data[len - 5] ^= 0xFF; // inside IEND's CRC
        let mut decoder = PngDecoder::new();
        assert!(matches!(
            decoder.decode(&data, 0),
            Err(crate::error::ImageError::FormatError(
                ImageFormatError::InvalidChecksum
            ))
        ));
    }

    #[test]
    fn sixteen_bit_gray() {
        let scanlines = [0u8, 0x01, 0x00];
        let data = build_png(1, 1, 16, 0, &scanlines, &[]);
        let mut decoder = PngDecoder::new();
        let image = decoder.decode(&data, 0).unwrap();
        assert_eq!(image.get_sample(0, 0, 0), 256.0);
    }
}
