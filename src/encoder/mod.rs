//! TIFF encoding: little-endian, strip-based baseline files for 8- and
//! 16-bit gray, gray-alpha, RGB and RGBA images, with optional strip
//! compression. Calling [`TiffEncoder::write_image`] repeatedly produces a
//! multi-page file.

use std::collections::BTreeMap;
use std::io::{Seek, Write};

mod writer;

use self::writer::{write_tiff_header, TiffWriter};
use crate::compression::{deflate, lzw, packbits};
use crate::error::{ImageResult, ImageUnsupportedError};
use crate::image::{Image, PixelData, PixelFormat};
use crate::tags::{CompressionMethod, PhotometricInterpretation, Tag};

/// Strips aim for this many bytes of uncompressed data.
const STRIP_SIZE: usize = 8 * 1024;

/// How strip data is compressed before it is written.
///
/// Strips are compressed as whole in-memory buffers, so this is a plain
/// choice of algorithm rather than a streaming writer; each variant
/// delegates to the matching decoder's counterpart in
/// [`crate::compression`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StripCompression {
    /// Strip data is written as it is.
    #[default]
    None,
    Lzw,
    /// Zlib-wrapped deflate, the "Adobe" TIFF flavor.
    Deflate,
    /// Byte-level RLE. Often ineffective on continuous-tone images; those
    /// are better left uncompressed.
    PackBits,
}

impl StripCompression {
    /// The value written to the directory's `Compression` tag.
    pub fn tag(self) -> CompressionMethod {
        match self {
            StripCompression::None => CompressionMethod::None,
            StripCompression::Lzw => CompressionMethod::LZW,
            StripCompression::Deflate => CompressionMethod::Deflate,
            StripCompression::PackBits => CompressionMethod::PackBits,
        }
    }

    /// Compresses one strip of sample data.
    pub fn compress(self, data: &[u8]) -> ImageResult<Vec<u8>> {
        Ok(match self {
            StripCompression::None => data.to_vec(),
            StripCompression::Lzw => lzw::encode(data),
            StripCompression::Deflate => deflate::deflate_zlib(data)?,
            StripCompression::PackBits => packbits::pack_bits(data),
        })
    }
}

/// One IFD value, encoded on demand.
enum IfdValue {
    Short(Vec<u16>),
    Long(Vec<u32>),
    Rational(Vec<(u32, u32)>),
}

impl IfdValue {
    fn field_type(&self) -> u16 {
        match self {
            IfdValue::Short(_) => 3,
            IfdValue::Long(_) => 4,
            IfdValue::Rational(_) => 5,
        }
    }

    fn count(&self) -> u32 {
        match self {
            IfdValue::Short(values) => values.len() as u32,
            IfdValue::Long(values) => values.len() as u32,
            IfdValue::Rational(values) => values.len() as u32,
        }
    }

    fn bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            IfdValue::Short(values) => {
                for v in values {
                    out.extend_from_slice(&v.to_le_bytes());
                }
            }
            IfdValue::Long(values) => {
                for v in values {
                    out.extend_from_slice(&v.to_le_bytes());
                }
            }
            IfdValue::Rational(values) => {
                for (n, d) in values {
                    out.extend_from_slice(&n.to_le_bytes());
                    out.extend_from_slice(&d.to_le_bytes());
                }
            }
        }
        out
    }
}

/// Encoder for the TIFF container.
pub struct TiffEncoder<W> {
    writer: TiffWriter<W>,
    /// File position of the pointer that links to the next IFD.
    last_ifd_link: u64,
}

impl<W: Write + Seek> TiffEncoder<W> {
    /// Writes the file header and prepares for the first image.
    pub fn new(writer: W) -> ImageResult<TiffEncoder<W>> {
        let mut writer = TiffWriter::new(writer);
        write_tiff_header(&mut writer)?;
        let last_ifd_link = writer.offset();
        writer.write_u32(0)?;
        Ok(TiffEncoder {
            writer,
            last_ifd_link,
        })
    }

    /// Appends `image` as the next page, uncompressed.
    pub fn write_image(&mut self, image: &Image) -> ImageResult<()> {
        self.write_image_with_compression(image, StripCompression::None)
    }

    /// Appends `image` as the next page with the given strip compression.
    pub fn write_image_with_compression(
        &mut self,
        image: &Image,
        compression: StripCompression,
    ) -> ImageResult<()> {
        let samples = sample_bytes(image)?;
        let bits = image.bits_per_sample() as u16;
        let channels = u32::from(image.num_channels());
        let width = image.width();
        let height = image.height();
        let row_bytes = width as usize * channels as usize * usize::from(bits) / 8;

        let rows_per_strip = (STRIP_SIZE / row_bytes.max(1)).clamp(1, height as usize) as u32;
        let strip_count = height.div_ceil(rows_per_strip);

        // Strip data first, the directory after it.
        self.writer.pad_word_boundary()?;
        let mut strip_offsets = Vec::with_capacity(strip_count as usize);
        let mut strip_byte_counts = Vec::with_capacity(strip_count as usize);
        for strip in 0..strip_count {
            let first_row = (strip * rows_per_strip) as usize;
            let last_row = ((strip + 1) * rows_per_strip).min(height) as usize;
            let data = &samples[first_row * row_bytes..last_row * row_bytes];

            strip_offsets.push(self.writer.offset() as u32);
            let compressed = compression.compress(data)?;
            self.writer.write_bytes(&compressed)?;
            strip_byte_counts.push(compressed.len() as u32);
        }

        let photometric = match image.num_channels() {
            1 | 2 => PhotometricInterpretation::BlackIsZero,
            _ => PhotometricInterpretation::RGB,
        };

        let mut entries: BTreeMap<u16, IfdValue> = BTreeMap::new();
        let mut put = |tag: Tag, value: IfdValue| {
            entries.insert(tag.to_u16(), value);
        };
        put(Tag::ImageWidth, IfdValue::Long(vec![width]));
        put(Tag::ImageLength, IfdValue::Long(vec![height]));
        put(
            Tag::BitsPerSample,
            IfdValue::Short(vec![bits; channels as usize]),
        );
        put(
            Tag::Compression,
            IfdValue::Short(vec![compression.tag().to_u16()]),
        );
        put(
            Tag::PhotometricInterpretation,
            IfdValue::Short(vec![photometric.to_u16()]),
        );
        put(Tag::StripOffsets, IfdValue::Long(strip_offsets));
        put(Tag::SamplesPerPixel, IfdValue::Short(vec![channels as u16]));
        put(Tag::RowsPerStrip, IfdValue::Long(vec![rows_per_strip]));
        put(Tag::StripByteCounts, IfdValue::Long(strip_byte_counts));
        put(Tag::XResolution, IfdValue::Rational(vec![(72, 1)]));
        put(Tag::YResolution, IfdValue::Rational(vec![(72, 1)]));
        put(Tag::ResolutionUnit, IfdValue::Short(vec![2]));
        put(
            Tag::SampleFormat,
            IfdValue::Short(vec![1; channels as usize]),
        );
        if matches!(image.num_channels(), 2 | 4) {
            // The trailing channel is unassociated alpha.
            put(Tag::ExtraSamples, IfdValue::Short(vec![2]));
        }
        if let Some(orientation) = image.exif.as_ref().and_then(|e| e.orientation()) {
            put(Tag::Orientation, IfdValue::Short(vec![orientation]));
        }

        self.write_ifd(&entries)
    }

    /// Writes the directory, appends out-of-line values and links the
    /// previous IFD pointer to it.
    fn write_ifd(&mut self, entries: &BTreeMap<u16, IfdValue>) -> ImageResult<()> {
        self.writer.pad_word_boundary()?;
        let ifd_offset = self.writer.offset();

        self.writer.write_u16(entries.len() as u16)?;
        let mut value_offset =
            ifd_offset + 2 + entries.len() as u64 * 12 + 4;
        let mut out_of_line: Vec<Vec<u8>> = Vec::new();

        for (&tag, value) in entries {
            self.writer.write_u16(tag)?;
            self.writer.write_u16(value.field_type())?;
            self.writer.write_u32(value.count())?;
            let bytes = value.bytes();
            if bytes.len() <= 4 {
                let mut slot = [0u8; 4];
                slot[..bytes.len()].copy_from_slice(&bytes);
                self.writer.write_bytes(&slot)?;
            } else {
                self.writer.write_u32(value_offset as u32)?;
                value_offset += bytes.len() as u64;
                out_of_line.push(bytes);
            }
        }

        let next_link = self.writer.offset();
        self.writer.write_u32(0)?;
        for bytes in out_of_line {
            self.writer.write_bytes(&bytes)?;
        }
        let end = self.writer.offset();

        self.writer.goto_offset(self.last_ifd_link)?;
        self.writer.write_u32(ifd_offset as u32)?;
        self.writer.goto_offset(end)?;
        self.last_ifd_link = next_link;

        Ok(())
    }

    /// Flushes nothing further; returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

/// The image's samples as little-endian bytes, row-major.
fn sample_bytes(image: &Image) -> ImageResult<Vec<u8>> {
    if image.has_palette() {
        return Err(
            ImageUnsupportedError::UnsupportedFeature("encoding palette images").into(),
        );
    }
    match (image.format(), image.data()) {
        (PixelFormat::Uint8, PixelData::U8(buf)) => Ok(buf.clone()),
        (PixelFormat::Uint16, PixelData::U16(buf)) => {
            let mut out = Vec::with_capacity(buf.len() * 2);
            for v in buf {
                out.extend_from_slice(&v.to_le_bytes());
            }
            Ok(out)
        }
        _ => Err(ImageUnsupportedError::UnsupportedFeature(
            "encoding is limited to 8- and 16-bit unsigned images",
        )
        .into()),
    }
}
