//! Per-IFD image state and the tile/strip decode loop.

use std::collections::BTreeMap;

use crate::color;
use crate::compression::fax::{FaxCompression, FaxDecoder, FaxOptions};
use crate::compression::{deflate, lzw, packbits};
use crate::error::{ImageError, ImageFormatError, ImageResult, ImageUnsupportedError};
use crate::ifd::{Entry, Value};
use crate::image::{ExifData, Image, Palette, PixelFormat};
use crate::stream::{BitReader, InputBuffer};
use crate::tags::{
    CompressionMethod, PhotometricInterpretation, PlanarConfiguration, Predictor, SampleFormat,
    Tag, Type,
};

/// Pixel reconstruction strategy, classified from photometric
/// interpretation, bit depth and sample count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TiffImageType {
    Bilevel,
    Gray4,
    Gray,
    GrayAlpha,
    Rgb,
    Rgba,
    Palette,
    Cmyk,
    #[cfg(feature = "jpeg")]
    YcbcrJpeg,
}

/// Everything derived from one image file directory.
#[derive(Debug)]
pub(crate) struct TiffImage {
    pub width: u32,
    pub height: u32,
    bits_per_sample: u32,
    samples_per_pixel: u32,
    sample_format: SampleFormat,
    photometric: PhotometricInterpretation,
    compression: CompressionMethod,
    predictor: Predictor,
    fill_order: u16,
    fax_options: FaxOptions,
    image_type: TiffImageType,

    tiled: bool,
    tile_width: u32,
    tile_height: u32,
    tiles_x: u32,
    tiles_y: u32,
    chunk_offsets: Vec<u32>,
    chunk_byte_counts: Vec<u32>,

    palette: Option<Palette>,
    #[cfg(feature = "jpeg")]
    jpeg_tables: Option<Vec<u8>>,
    exif: ExifData,
    icc_profile: Option<Vec<u8>>,
    text_data: BTreeMap<String, String>,
}

impl TiffImage {
    /// Parses the IFD at `offset`, returning the image state and the offset
    /// of the next IFD (0 at the end of the chain).
    pub(crate) fn from_ifd(
        file: &InputBuffer<'_>,
        offset: u32,
        limits: &super::Limits,
    ) -> ImageResult<(TiffImage, u32)> {
        let mut reader = file.clone();
        reader.seek(offset as usize)?;

        let num_entries = reader.read_u16()?;
        let mut entries: BTreeMap<u16, Entry> = BTreeMap::new();
        for _ in 0..num_entries {
            let tag = reader.read_u16()?;
            let field_type = reader.read_u16()?;
            let Some(field_type) = Type::from_u16(field_type) else {
                // Unknown type. Skip this entry according to spec.
                reader.skip(8)?;
                continue;
            };
            let count = reader.read_u32()?;
            if count as usize > limits.ifd_value_size / field_type.size() {
                return Err(ImageError::LimitsExceeded);
            }
            let value: [u8; 4] = reader.read_bytes(4)?.try_into().unwrap();
            entries.insert(tag, Entry::new(field_type, count, value));
        }
        let next_ifd = reader.read_u32()?;

        let get = |tag: Tag| -> ImageResult<Option<Value>> {
            entries.get(&tag.to_u16()).map(|e| e.values(file)).transpose()
        };
        let get_u32 = |tag: Tag| -> ImageResult<Option<u32>> {
            get(tag)?.map(Value::into_u32).transpose()
        };
        let require_u32 = |tag: Tag| -> ImageResult<u32> {
            get_u32(tag)?.ok_or_else(|| ImageFormatError::RequiredTagNotFound(tag).into())
        };

        let width = require_u32(Tag::ImageWidth)?;
        let height = require_u32(Tag::ImageLength)?;
        if width == 0 || height == 0 {
            return Err(ImageFormatError::InvalidDimensions(width, height).into());
        }

        let bits_per_sample = match get(Tag::BitsPerSample)? {
            None => 1,
            Some(value) => {
                let all = value.into_u32_vec()?;
                let first = *all.first().unwrap_or(&1);
                if all.iter().any(|&b| b != first) {
                    return Err(ImageUnsupportedError::InconsistentBitsPerSample(
                        all.iter().map(|&b| b as u8).collect(),
                    )
                    .into());
                }
                first
            }
        };
        let samples_per_pixel = get_u32(Tag::SamplesPerPixel)?.unwrap_or(1);
        if samples_per_pixel == 0 {
            return Err(ImageFormatError::InvalidHeader("zero samples per pixel").into());
        }

        let sample_format = match get_u32(Tag::SampleFormat)? {
            None => SampleFormat::Uint,
            Some(value) => match SampleFormat::from_u16_exhaustive(value as u16) {
                SampleFormat::Void => SampleFormat::Uint,
                format @ (SampleFormat::Uint | SampleFormat::Int | SampleFormat::IEEEFP) => format,
                format => {
                    return Err(ImageUnsupportedError::UnsupportedSampleFormat(vec![format]).into())
                }
            },
        };

        let photometric = match get_u32(Tag::PhotometricInterpretation)? {
            None => PhotometricInterpretation::BlackIsZero,
            Some(value) => PhotometricInterpretation::from_u16(value as u16)
                .ok_or(ImageUnsupportedError::UnknownInterpretation)?,
        };

        let compression = match get_u32(Tag::Compression)? {
            None => CompressionMethod::None,
            Some(value) => CompressionMethod::from_u16_exhaustive(value as u16),
        };

        if let Some(planar) = get_u32(Tag::PlanarConfiguration)? {
            match PlanarConfiguration::from_u16(planar as u16) {
                Some(PlanarConfiguration::Chunky) => {}
                config => {
                    return Err(ImageUnsupportedError::UnsupportedPlanarConfig(config).into())
                }
            }
        }

        let predictor = match get_u32(Tag::Predictor)? {
            None => Predictor::None,
            Some(value) => Predictor::from_u16(value as u16)
                .ok_or(ImageFormatError::UnknownPredictor(value as u16))?,
        };

        let fill_order = get_u32(Tag::FillOrder)?.unwrap_or(1) as u16;
        let fax_options = match compression {
            CompressionMethod::Fax3 => {
                FaxOptions::from_t4(get_u32(Tag::T4Options)?.unwrap_or(0))
            }
            CompressionMethod::Fax4 => {
                // T6Options only carries the uncompressed-data bit.
                let t6 = get_u32(Tag::T6Options)?.unwrap_or(0);
                FaxOptions {
                    two_dimensional: true,
                    uncompressed: t6 & 0b10 != 0,
                    fill_bits: false,
                }
            }
            _ => FaxOptions::default(),
        };

        if let Some(subsampling) = get(Tag::YCbCrSubSampling)? {
            let factors = subsampling.into_u32_vec()?;
            let jpeg = matches!(
                compression,
                CompressionMethod::ModernJPEG | CompressionMethod::JPEG
            );
            if !jpeg && factors.iter().any(|&f| f != 1) {
                return Err(ImageUnsupportedError::UnsupportedFeature(
                    "subsampled YCbCr outside of JPEG compression",
                )
                .into());
            }
        }

        // Tile or strip layout; RowsPerStrip defaults to the whole image and
        // saturates there for the customary 2^32-1 marker.
        let tiled = entries.contains_key(&Tag::TileOffsets.to_u16());
        let striped = entries.contains_key(&Tag::StripOffsets.to_u16());
        if tiled == striped {
            return Err(ImageFormatError::StripTileTagConflict.into());
        }

        let (tile_width, tile_height, chunk_offsets, chunk_byte_counts) = if tiled {
            let tile_width = require_u32(Tag::TileWidth)?;
            let tile_height = require_u32(Tag::TileLength)?;
            if tile_width == 0 || tile_height == 0 {
                return Err(ImageFormatError::InvalidHeader("zero tile dimensions").into());
            }
            (
                tile_width,
                tile_height,
                get(Tag::TileOffsets)?
                    .ok_or(ImageFormatError::RequiredTagNotFound(Tag::TileOffsets))?
                    .into_u32_vec()?,
                get(Tag::TileByteCounts)?
                    .ok_or(ImageFormatError::RequiredTagNotFound(Tag::TileByteCounts))?
                    .into_u32_vec()?,
            )
        } else {
            let rows_per_strip = get_u32(Tag::RowsPerStrip)?
                .unwrap_or(height)
                .min(height)
                .max(1);
            (
                width,
                rows_per_strip,
                get(Tag::StripOffsets)?
                    .ok_or(ImageFormatError::RequiredTagNotFound(Tag::StripOffsets))?
                    .into_u32_vec()?,
                get(Tag::StripByteCounts)?
                    .ok_or(ImageFormatError::RequiredTagNotFound(Tag::StripByteCounts))?
                    .into_u32_vec()?,
            )
        };

        let tiles_x = width.div_ceil(tile_width);
        let tiles_y = height.div_ceil(tile_height);
        let num_chunks = (tiles_x as usize)
            .checked_mul(tiles_y as usize)
            .ok_or(ImageFormatError::InconsistentSizesEncountered)?;
        if chunk_offsets.len() < num_chunks || chunk_byte_counts.len() < num_chunks {
            return Err(ImageFormatError::InconsistentSizesEncountered.into());
        }

        // A 16-bit color map stays 16-bit unless the indices are 8-bit, in
        // which case TIFF writers store `v << 8` and we shift back down.
        let palette = match get(Tag::ColorMap)? {
            None => None,
            Some(value) => {
                let raw = value.into_u32_vec()?;
                if raw.len() % 3 != 0 || raw.is_empty() {
                    return Err(ImageFormatError::InvalidHeader("malformed color map").into());
                }
                let num_colors = raw.len() / 3;
                let mut palette = Palette::new(num_colors, 3);
                for (channel, plane) in raw.chunks(num_colors).enumerate() {
                    for (index, &entry) in plane.iter().enumerate() {
                        let entry = if bits_per_sample == 8 {
                            (entry >> 8) as u16
                        } else {
                            entry as u16
                        };
                        palette.set(index, channel, entry);
                    }
                }
                Some(palette)
            }
        };

        let image_type = classify(photometric, bits_per_sample, samples_per_pixel, compression)?;
        if image_type == TiffImageType::Palette && palette.is_none() {
            return Err(ImageFormatError::RequiredTagNotFound(Tag::ColorMap).into());
        }

        let mut exif = ExifData::default();
        if let Some(orientation) = get_u32(Tag::Orientation)? {
            exif.set_orientation(orientation as u16);
        }

        let icc_profile = match entries.get(&Tag::IccProfile.to_u16()) {
            Some(entry) => Some(entry.values(file)?.into_u8_vec()?),
            None => None,
        };

        let mut text_data = BTreeMap::new();
        for (tag, key) in [
            (Tag::ImageDescription, "description"),
            (Tag::Software, "software"),
            (Tag::Artist, "artist"),
            (Tag::DateTime, "dateTime"),
            (Tag::Copyright, "copyright"),
            (Tag::Make, "make"),
            (Tag::Model, "model"),
            (Tag::HostComputer, "hostComputer"),
        ] {
            if let Some(value) = get(tag)? {
                if let Ok(text) = value.into_string() {
                    text_data.insert(key.to_owned(), text);
                }
            }
        }

        #[cfg(feature = "jpeg")]
        let jpeg_tables = match entries.get(&Tag::JPEGTables.to_u16()) {
            Some(entry) => Some(entry.values(file)?.into_u8_vec()?),
            None => None,
        };

        Ok((
            TiffImage {
                width,
                height,
                bits_per_sample,
                samples_per_pixel,
                sample_format,
                photometric,
                compression,
                predictor,
                fill_order,
                fax_options,
                image_type,
                tiled,
                tile_width,
                tile_height,
                tiles_x,
                tiles_y,
                chunk_offsets,
                chunk_byte_counts,
                palette,
                #[cfg(feature = "jpeg")]
                jpeg_tables,
                exif,
                icc_profile,
                text_data,
            },
            next_ifd,
        ))
    }

    /// Decoded frame buffer size in bytes, for limit checks.
    pub(crate) fn buffer_size(&self) -> usize {
        let row_bits = self.width as usize
            * self.samples_per_pixel as usize
            * self.bits_per_sample.max(8) as usize;
        row_bits.div_ceil(8) * self.height as usize
    }

    /// Decodes the full frame.
    pub(crate) fn decode(&self, file: &InputBuffer<'_>) -> ImageResult<Image> {
        let mut image = self.alloc_image()?;

        for tile_y in 0..self.tiles_y {
            for tile_x in 0..self.tiles_x {
                self.decode_tile(file, &mut image, tile_x, tile_y)?;
            }
        }

        if !self.exif.is_empty() {
            image.exif = Some(self.exif.clone());
        }
        image.icc_profile = self.icc_profile.clone();
        if !self.text_data.is_empty() {
            image.text_data = Some(self.text_data.clone());
        }
        Ok(image)
    }

    fn alloc_image(&self) -> ImageResult<Image> {
        let format = self.pixel_format()?;
        Ok(match self.image_type {
            TiffImageType::Bilevel => Image::new(self.width, self.height, PixelFormat::Uint1, 1),
            TiffImageType::Gray4 => Image::new(self.width, self.height, PixelFormat::Uint4, 1),
            TiffImageType::Gray => Image::new(self.width, self.height, format, 1),
            TiffImageType::GrayAlpha => Image::new(self.width, self.height, format, 2),
            TiffImageType::Rgb => Image::new(self.width, self.height, format, 3),
            TiffImageType::Rgba => Image::new(self.width, self.height, format, 4),
            TiffImageType::Cmyk => Image::new(self.width, self.height, format, 4),
            #[cfg(feature = "jpeg")]
            TiffImageType::YcbcrJpeg => {
                Image::new(self.width, self.height, PixelFormat::Uint8, 3)
            }
            TiffImageType::Palette => Image::with_palette(
                self.width,
                self.height,
                format,
                self.palette.clone().unwrap(),
            ),
        })
    }

    fn pixel_format(&self) -> ImageResult<PixelFormat> {
        let unsupported =
            || ImageUnsupportedError::UnsupportedSampleDepth(self.bits_per_sample as u8);
        Ok(match (self.sample_format, self.bits_per_sample) {
            (_, 1) => PixelFormat::Uint1,
            (_, 4) => PixelFormat::Uint4,
            (SampleFormat::Uint, 8) => PixelFormat::Uint8,
            (SampleFormat::Uint, 16) => PixelFormat::Uint16,
            (SampleFormat::Uint, 32) => PixelFormat::Uint32,
            (SampleFormat::Int, 8) => PixelFormat::Int8,
            (SampleFormat::Int, 16) => PixelFormat::Int16,
            (SampleFormat::Int, 32) => PixelFormat::Int32,
            (SampleFormat::IEEEFP, 16) => PixelFormat::Float16,
            (SampleFormat::IEEEFP, 32) => PixelFormat::Float32,
            (SampleFormat::IEEEFP, 64) => PixelFormat::Float64,
            _ => return Err(unsupported().into()),
        })
    }

    fn decode_tile(
        &self,
        file: &InputBuffer<'_>,
        image: &mut Image,
        tile_x: u32,
        tile_y: u32,
    ) -> ImageResult<()> {
        let index = (tile_y * self.tiles_x + tile_x) as usize;
        let offset = self.chunk_offsets[index] as usize;
        let byte_count = self.chunk_byte_counts[index] as usize;
        let compressed = file
            .subarray(byte_count, offset)
            .map_err(|_| ImageFormatError::TruncatedTile)?
            .as_slice();

        let x0 = tile_x * self.tile_width;
        let y0 = tile_y * self.tile_height;
        // Tiles carry padding columns and rows; the final strip is short.
        let data_rows = if self.tiled {
            self.tile_height
        } else {
            self.tile_height.min(self.height - y0)
        };
        let row_bits =
            self.tile_width as usize * self.samples_per_pixel as usize * self.bits_per_sample as usize;
        let row_bytes = row_bits.div_ceil(8);
        let expected = row_bytes * data_rows as usize;

        let data: Vec<u8> = match self.compression {
            CompressionMethod::None => {
                if compressed.len() < expected {
                    return Err(ImageFormatError::TruncatedTile.into());
                }
                compressed[..expected].to_vec()
            }
            CompressionMethod::LZW => lzw::decode(compressed, expected)?,
            CompressionMethod::PackBits => packbits::unpack_bits(compressed, expected)?,
            CompressionMethod::Deflate | CompressionMethod::OldDeflate => {
                let mut out = vec![0u8; expected];
                deflate::inflate_zlib_into(compressed, &mut out)?;
                out
            }
            CompressionMethod::Huffman | CompressionMethod::Fax3 | CompressionMethod::Fax4 => {
                return self.decode_fax_tile(compressed, image, x0, y0, data_rows);
            }
            #[cfg(feature = "jpeg")]
            CompressionMethod::ModernJPEG => {
                return self.decode_jpeg_tile(compressed, image, x0, y0);
            }
            method => {
                return Err(ImageUnsupportedError::UnsupportedCompressionMethod(method).into())
            }
        };

        let mut data = data;
        if self.predictor == Predictor::Horizontal {
            self.reverse_predictor(&mut data, file, row_bytes);
        } else if self.predictor == Predictor::FloatingPoint {
            return Err(ImageUnsupportedError::UnsupportedFeature(
                "floating point predictor",
            )
            .into());
        }

        self.fill_pixels(&data, file, image, x0, y0, data_rows)
    }

    /// Horizontal differencing reversal, per row, with wrap-around on the
    /// stored sample width. Multi-byte samples are still in file byte order
    /// here, so the arithmetic goes through endian-aware reads.
    fn reverse_predictor(&self, data: &mut [u8], file: &InputBuffer<'_>, row_bytes: usize) {
        let samples = self.samples_per_pixel as usize;
        let big_endian = matches!(file.byte_order(), crate::stream::ByteOrder::BigEndian);

        for row in data.chunks_mut(row_bytes) {
            match self.bits_per_sample {
                8 => {
                    for i in samples..row.len() {
                        row[i] = row[i].wrapping_add(row[i - samples]);
                    }
                }
                16 => {
                    for i in (samples * 2..row.len().saturating_sub(1)).step_by(2) {
                        let prev = read_u16_at(row, i - samples * 2, big_endian);
                        let value = read_u16_at(row, i, big_endian).wrapping_add(prev);
                        write_u16_at(row, i, value, big_endian);
                    }
                }
                32 => {
                    for i in (samples * 4..row.len().saturating_sub(3)).step_by(4) {
                        let prev = read_u32_at(row, i - samples * 4, big_endian);
                        let value = read_u32_at(row, i, big_endian).wrapping_add(prev);
                        write_u32_at(row, i, value, big_endian);
                    }
                }
                _ => {}
            }
        }
    }

    fn decode_fax_tile(
        &self,
        compressed: &[u8],
        image: &mut Image,
        x0: u32,
        y0: u32,
        data_rows: u32,
    ) -> ImageResult<()> {
        if self.bits_per_sample != 1 {
            return Err(ImageUnsupportedError::UnsupportedFeature(
                "fax compression on multi-bit samples",
            )
            .into());
        }
        let fax_compression = match self.compression {
            CompressionMethod::Huffman => FaxCompression::HuffmanRle,
            CompressionMethod::Fax3 => FaxCompression::Group3,
            _ => FaxCompression::Group4,
        };
        let mut decoder = FaxDecoder::new(
            compressed,
            self.tile_width as usize,
            data_rows as usize,
            fax_compression,
            self.fax_options,
            self.fill_order,
        );
        let mut plane =
            vec![0u8; FaxDecoder::row_bytes(self.tile_width as usize) * data_rows as usize];
        // Scanline errors leave the rows decoded so far in place; the tile
        // keeps whatever was recovered.
        let _ = decoder.decode_into(&mut plane);

        let white_is_zero = self.photometric == PhotometricInterpretation::WhiteIsZero;
        let row_bytes = FaxDecoder::row_bytes(self.tile_width as usize);
        for row in 0..data_rows {
            let y = y0 + row;
            if y >= self.height {
                break;
            }
            for col in 0..self.tile_width {
                let x = x0 + col;
                if x >= self.width {
                    break;
                }
                let byte = plane[row as usize * row_bytes + col as usize / 8];
                let black = byte >> (7 - col % 8) & 1 == 1;
                // The plane stores the coded color: a "white" run is a run of
                // 0 bits in the file, which WhiteIsZero displays as white.
                let sample = if black == white_is_zero { 0.0 } else { 1.0 };
                image.set_sample(x, y, 0, sample);
            }
        }
        Ok(())
    }

    #[cfg(feature = "jpeg")]
    fn decode_jpeg_tile(
        &self,
        compressed: &[u8],
        image: &mut Image,
        x0: u32,
        y0: u32,
    ) -> ImageResult<()> {
        // Abbreviated streams put their tables in the JPEGTables tag: splice
        // them in between the tile's SOI and the entropy data.
        let stream: Vec<u8> = match &self.jpeg_tables {
            Some(tables) if tables.len() > 4 && compressed.len() > 2 => {
                let mut merged = Vec::with_capacity(tables.len() + compressed.len());
                merged.extend_from_slice(&tables[..tables.len() - 2]);
                merged.extend_from_slice(&compressed[2..]);
                merged
            }
            _ => compressed.to_vec(),
        };

        let mut decoder = zune_jpeg::JpegDecoder::new(zune_jpeg::zune_core::bytestream::ZCursor::new(&stream));
        decoder
            .decode_headers()
            .map_err(|_| ImageFormatError::InvalidHeader("JPEG tile headers"))?;
        let info = decoder
            .info()
            .ok_or(ImageFormatError::InvalidHeader("JPEG tile headers"))?;
        let (tw, th) = (u32::from(info.width), u32::from(info.height));
        let pixels = decoder
            .decode()
            .map_err(|_| ImageFormatError::Format("JPEG tile decode failed".into()))?;

        let components = pixels.len() / (tw as usize * th as usize).max(1);
        for row in 0..th {
            let y = y0 + row;
            if y >= self.height {
                break;
            }
            for col in 0..tw {
                let x = x0 + col;
                if x >= self.width {
                    break;
                }
                let base = (row as usize * tw as usize + col as usize) * components;
                match components {
                    1 => {
                        let v = f64::from(pixels[base]);
                        image.set_pixel_rgb(x, y, v, v, v);
                    }
                    _ => {
                        image.set_pixel_rgb(
                            x,
                            y,
                            f64::from(pixels[base]),
                            f64::from(pixels[base + 1]),
                            f64::from(pixels[base + 2]),
                        );
                    }
                }
            }
        }
        Ok(())
    }

    /// Streams decompressed samples into the pixel buffer.
    fn fill_pixels(
        &self,
        data: &[u8],
        file: &InputBuffer<'_>,
        image: &mut Image,
        x0: u32,
        y0: u32,
        data_rows: u32,
    ) -> ImageResult<()> {
        let white_is_zero = self.photometric == PhotometricInterpretation::WhiteIsZero;
        let max = image.max_channel_value();

        if self.bits_per_sample < 8 {
            // Sub-byte samples go through the bit reader, rows padded to a
            // byte boundary.
            let view = InputBuffer::with_byte_order(data, file.byte_order());
            let mut reader = BitReader::new(view);
            for row in 0..data_rows {
                let y = y0 + row;
                for col in 0..self.tile_width {
                    let x = x0 + col;
                    for _channel in 0..self.samples_per_pixel {
                        let bits = reader.read_bits(self.bits_per_sample as u8)?;
                        if x >= self.width || y >= self.height {
                            continue;
                        }
                        let value = if white_is_zero {
                            self.bit_max() - f64::from(bits)
                        } else {
                            f64::from(bits)
                        };
                        image.set_sample(x, y, 0, value);
                    }
                }
                reader.flush_byte();
            }
            return Ok(());
        }

        let mut view = InputBuffer::with_byte_order(data, file.byte_order());
        for row in 0..data_rows {
            let y = y0 + row;
            for col in 0..self.tile_width {
                let x = x0 + col;
                let in_bounds = x < self.width && y < self.height;
                match self.image_type {
                    TiffImageType::Gray | TiffImageType::Palette => {
                        let v = self.read_sample(&mut view)?;
                        if in_bounds {
                            let v = if white_is_zero
                                && self.image_type == TiffImageType::Gray
                            {
                                max - v
                            } else {
                                v
                            };
                            image.set_sample(x, y, 0, v);
                        }
                    }
                    TiffImageType::GrayAlpha => {
                        let l = self.read_sample(&mut view)?;
                        let a = self.read_sample(&mut view)?;
                        if in_bounds {
                            let l = if white_is_zero { max - l } else { l };
                            image.set_sample(x, y, 0, l);
                            image.set_sample(x, y, 1, a);
                        }
                    }
                    TiffImageType::Rgb => {
                        let r = self.read_sample(&mut view)?;
                        let g = self.read_sample(&mut view)?;
                        let b = self.read_sample(&mut view)?;
                        if in_bounds {
                            image.set_pixel_rgb(x, y, r, g, b);
                        }
                    }
                    TiffImageType::Rgba => {
                        let r = self.read_sample(&mut view)?;
                        let g = self.read_sample(&mut view)?;
                        let b = self.read_sample(&mut view)?;
                        let a = self.read_sample(&mut view)?;
                        if in_bounds {
                            image.set_pixel_rgba(x, y, r, g, b, a);
                        }
                    }
                    TiffImageType::Cmyk => {
                        let c = self.read_sample(&mut view)?;
                        let m = self.read_sample(&mut view)?;
                        let yy = self.read_sample(&mut view)?;
                        let k = self.read_sample(&mut view)?;
                        if in_bounds {
                            // Convert in 0..=255 space, scale back out.
                            let scale = 255.0 / max;
                            let (r, g, b) = color::cmyk_to_rgb(
                                c * scale,
                                m * scale,
                                yy * scale,
                                k * scale,
                            );
                            image.set_pixel_rgba(
                                x,
                                y,
                                r / scale,
                                g / scale,
                                b / scale,
                                max,
                            );
                        }
                    }
                    TiffImageType::Bilevel | TiffImageType::Gray4 => unreachable!(),
                    #[cfg(feature = "jpeg")]
                    TiffImageType::YcbcrJpeg => unreachable!(),
                }
            }
        }
        Ok(())
    }

    fn bit_max(&self) -> f64 {
        f64::from((1u32 << self.bits_per_sample) - 1)
    }

    fn read_sample(&self, view: &mut InputBuffer<'_>) -> ImageResult<f64> {
        Ok(match (self.sample_format, self.bits_per_sample) {
            (SampleFormat::Uint, 8) => f64::from(view.read_u8()?),
            (SampleFormat::Uint, 16) => f64::from(view.read_u16()?),
            (SampleFormat::Uint, 32) => f64::from(view.read_u32()?),
            (SampleFormat::Int, 8) => f64::from(view.read_i8()?),
            (SampleFormat::Int, 16) => f64::from(view.read_i16()?),
            (SampleFormat::Int, 32) => f64::from(view.read_i32()?),
            (SampleFormat::IEEEFP, 16) => {
                f64::from(half::f16::from_bits(view.read_u16()?).to_f32())
            }
            (SampleFormat::IEEEFP, 32) => f64::from(view.read_f32()?),
            (SampleFormat::IEEEFP, 64) => view.read_f64()?,
            _ => {
                return Err(ImageUnsupportedError::UnsupportedSampleDepth(
                    self.bits_per_sample as u8,
                )
                .into())
            }
        })
    }
}

fn read_u16_at(buf: &[u8], i: usize, big_endian: bool) -> u16 {
    let bytes = [buf[i], buf[i + 1]];
    if big_endian {
        u16::from_be_bytes(bytes)
    } else {
        u16::from_le_bytes(bytes)
    }
}

fn write_u16_at(buf: &mut [u8], i: usize, value: u16, big_endian: bool) {
    let bytes = if big_endian {
        value.to_be_bytes()
    } else {
        value.to_le_bytes()
    };
    buf[i..i + 2].copy_from_slice(&bytes);
}

fn read_u32_at(buf: &[u8], i: usize, big_endian: bool) -> u32 {
    let bytes = [buf[i], buf[i + 1], buf[i + 2], buf[i + 3]];
    if big_endian {
        u32::from_be_bytes(bytes)
    } else {
        u32::from_le_bytes(bytes)
    }
}

fn write_u32_at(buf: &mut [u8], i: usize, value: u32, big_endian: bool) {
    let bytes = if big_endian {
        value.to_be_bytes()
    } else {
        value.to_le_bytes()
    };
    buf[i..i + 4].copy_from_slice(&bytes);
}

/// The classification table from photometric interpretation, bit depth and
/// sample count to a reconstruction strategy.
fn classify(
    photometric: PhotometricInterpretation,
    bits: u32,
    samples: u32,
    compression: CompressionMethod,
) -> ImageResult<TiffImageType> {
    use PhotometricInterpretation::*;

    let mismatch = || -> ImageError {
        ImageUnsupportedError::InterpretationWithBits(
            photometric,
            vec![bits as u8; samples as usize],
        )
        .into()
    };
    let bad_depth =
        || -> ImageError { ImageUnsupportedError::UnsupportedSampleDepth(bits as u8).into() };

    Ok(match photometric {
        WhiteIsZero | BlackIsZero | TransparencyMask => match (bits, samples) {
            (1, 1) => TiffImageType::Bilevel,
            (4, 1) => TiffImageType::Gray4,
            (8 | 16 | 32 | 64, 1) => TiffImageType::Gray,
            (8 | 16 | 32 | 64, 2) => TiffImageType::GrayAlpha,
            (1 | 4 | 8 | 16 | 32 | 64, _) => return Err(mismatch()),
            _ => return Err(bad_depth()),
        },
        RGB => match (bits, samples) {
            (8 | 16 | 32 | 64, 3) => TiffImageType::Rgb,
            (8 | 16 | 32 | 64, 4) => TiffImageType::Rgba,
            (8 | 16 | 32 | 64, _) => return Err(mismatch()),
            _ => return Err(bad_depth()),
        },
        RGBPalette => match (bits, samples) {
            (4 | 8 | 16, 1) => TiffImageType::Palette,
            _ => return Err(mismatch()),
        },
        CMYK => match (bits, samples) {
            (8 | 16 | 32, 4) => TiffImageType::Cmyk,
            _ => return Err(mismatch()),
        },
        YCbCr => {
            #[cfg(feature = "jpeg")]
            {
                if compression == CompressionMethod::ModernJPEG && bits == 8 && samples == 3 {
                    return Ok(TiffImageType::YcbcrJpeg);
                }
            }
            let _ = compression;
            return Err(ImageUnsupportedError::UnsupportedInterpretation(photometric).into());
        }
        CIELab => {
            return Err(ImageUnsupportedError::UnsupportedInterpretation(photometric).into())
        }
    })
}
