//! PNM decoding: the P1..P6 netpbm family, ASCII and raw variants.

use crate::codecs::{DecodeInfo, ImageDecoder};
use crate::error::{ImageFormatError, ImageResult, UsageError};
use crate::image::{Image, PixelFormat};
use crate::stream::{BitReader, InputBuffer};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PnmKind {
    BitmapAscii,
    GrayAscii,
    PixmapAscii,
    BitmapRaw,
    GrayRaw,
    PixmapRaw,
}

impl PnmKind {
    fn from_magic(magic: u8) -> Option<PnmKind> {
        Some(match magic {
            b'1' => PnmKind::BitmapAscii,
            b'2' => PnmKind::GrayAscii,
            b'3' => PnmKind::PixmapAscii,
            b'4' => PnmKind::BitmapRaw,
            b'5' => PnmKind::GrayRaw,
            b'6' => PnmKind::PixmapRaw,
            _ => return None,
        })
    }

    fn is_bitmap(self) -> bool {
        matches!(self, PnmKind::BitmapAscii | PnmKind::BitmapRaw)
    }

    fn num_channels(self) -> u8 {
        match self {
            PnmKind::PixmapAscii | PnmKind::PixmapRaw => 3,
            _ => 1,
        }
    }
}

#[derive(Default)]
pub struct PnmDecoder<'a> {
    data: Option<&'a [u8]>,
    header: Option<PnmHeader>,
}

#[derive(Clone, Copy, Debug)]
struct PnmHeader {
    kind: PnmKind,
    width: u32,
    height: u32,
    max_value: u32,
    /// Byte offset of the sample data.
    data_start: usize,
}

impl<'a> PnmDecoder<'a> {
    pub fn new() -> Self {
        PnmDecoder {
            data: None,
            header: None,
        }
    }

    fn parse_header(data: &[u8]) -> ImageResult<PnmHeader> {
        if data.len() < 3 || data[0] != b'P' {
            return Err(ImageFormatError::InvalidSignature.into());
        }
        let kind =
            PnmKind::from_magic(data[1]).ok_or(ImageFormatError::InvalidSignature)?;

        let mut tokens = Tokenizer { data, pos: 2 };
        let width = tokens.next_int()?;
        let height = tokens.next_int()?;
        let max_value = if kind.is_bitmap() { 1 } else { tokens.next_int()? };

        if width == 0 || height == 0 {
            return Err(ImageFormatError::InvalidDimensions(width, height).into());
        }
        if max_value == 0 || max_value > 65535 {
            return Err(ImageFormatError::InvalidHeader("maxval out of range").into());
        }

        // The scanner consumes the single whitespace byte that separates the
        // header from raw sample data.
        let data_start = tokens.pos;

        Ok(PnmHeader {
            kind,
            width,
            height,
            max_value,
            data_start,
        })
    }

    fn pixel_format(header: &PnmHeader) -> PixelFormat {
        if header.kind.is_bitmap() {
            PixelFormat::Uint1
        } else if header.max_value > 255 {
            PixelFormat::Uint16
        } else {
            PixelFormat::Uint8
        }
    }
}

impl<'a> ImageDecoder<'a> for PnmDecoder<'a> {
    fn is_valid_file(&self, data: &'a [u8]) -> bool {
        data.len() >= 3
            && data[0] == b'P'
            && (b'1'..=b'6').contains(&data[1])
            && (data[2].is_ascii_whitespace() || data[2] == b'#')
    }

    fn start_decode(&mut self, data: &'a [u8]) -> ImageResult<DecodeInfo> {
        let header = Self::parse_header(data)?;
        self.data = Some(data);
        self.header = Some(header);
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
        let data = self.data.ok_or(UsageError::NoDecodeInProgress)?;
        let header = self.header.ok_or(UsageError::NoDecodeInProgress)?;

        let channels = header.kind.num_channels();
        let mut image = Image::new(
            header.width,
            header.height,
            Self::pixel_format(&header),
            channels,
        );

        match header.kind {
            PnmKind::BitmapAscii | PnmKind::GrayAscii | PnmKind::PixmapAscii => {
                let mut tokens = Tokenizer {
                    data,
                    pos: header.data_start,
                };
                for y in 0..header.height {
                    for x in 0..header.width {
                        for c in 0..channels {
                            let value = tokens.next_int()?;
                            image.set_sample(x, y, c, convert(&header, value));
                        }
                    }
                }
            }
            PnmKind::BitmapRaw => {
                let view = InputBuffer::new(&data[header.data_start..]);
                let mut reader = BitReader::new(view);
                for y in 0..header.height {
                    for x in 0..header.width {
                        let bit = reader.read_bits(1)?;
                        image.set_sample(x, y, 0, convert(&header, bit));
                    }
                    reader.flush_byte();
                }
            }
            PnmKind::GrayRaw | PnmKind::PixmapRaw => {
                let mut view = InputBuffer::with_byte_order(
                    &data[header.data_start..],
                    crate::stream::ByteOrder::BigEndian,
                );
                for y in 0..header.height {
                    for x in 0..header.width {
                        for c in 0..channels {
                            let value = if header.max_value > 255 {
                                u32::from(view.read_u16()?)
                            } else {
                                u32::from(view.read_u8()?)
                            };
                            image.set_sample(x, y, c, convert(&header, value));
                        }
                    }
                }
            }
        }
        Ok(image)
    }
}

/// Bitmaps invert (PBM 1 is black); gray and color pass through.
fn convert(header: &PnmHeader, value: u32) -> f64 {
    if header.kind.is_bitmap() {
        f64::from(1 - value.min(1))
    } else {
        f64::from(value)
    }
}

/// Whitespace- and comment-aware integer scanner over the ASCII sections.
struct Tokenizer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Tokenizer<'_> {
    fn next_int(&mut self) -> ImageResult<u32> {
        self.skip_filler()?;
        let start = self.pos;
        while self.pos < self.data.len() && self.data[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(ImageFormatError::InvalidHeader("expected integer").into());
        }
        // Consume the single terminating whitespace byte, when present.
        let text = std::str::from_utf8(&self.data[start..self.pos]).unwrap();
        let value: u64 = text
            .parse()
            .map_err(|_| ImageFormatError::InvalidHeader("integer overflow"))?;
        if self.pos < self.data.len() && self.data[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        u32::try_from(value).map_err(|_| ImageFormatError::InvalidHeader("integer overflow").into())
    }

    fn skip_filler(&mut self) -> ImageResult<()> {
        loop {
            while self.pos < self.data.len() && self.data[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            if self.pos < self.data.len() && self.data[self.pos] == b'#' {
                while self.pos < self.data.len() && self.data[self.pos] != b'\n' {
                    self.pos += 1;
                }
                continue;
            }
            break;
        }
        if self.pos >= self.data.len() {
            return Err(ImageFormatError::EndOfStream.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_pixmap() {
        let data = b"P3\n# a comment\n2 1\n255\n255 0 0  0 128 0\n";
        let mut decoder = PnmDecoder::new();
        let image = decoder.decode(data, 0).unwrap();
        assert_eq!((image.width(), image.height()), (2, 1));
        assert_eq!(image.get_sample(0, 0, 0), 255.0);
        assert_eq!(image.get_sample(1, 0, 1), 128.0);
    }

    #[test]
    fn ascii_bitmap_inverts() {
        let data = b"P1\n2 2\n1 0\n0 1\n";
        let mut decoder = PnmDecoder::new();
        let image = decoder.decode(data, 0).unwrap();
        // PBM 1 is black, stored as luminance 0.
        assert_eq!(image.get_sample(0, 0, 0), 0.0);
        assert_eq!(image.get_sample(1, 0, 0), 1.0);
    }

    #[test]
    fn raw_graymap_16_bit() {
        let mut data = b"P5 2 1 65535\n".to_vec();
        data.extend_from_slice(&[0x01, 0x00, 0xFF, 0xFF]);
        let mut decoder = PnmDecoder::new();
        let image = decoder.decode(&data, 0).unwrap();
        assert_eq!(image.get_sample(0, 0, 0), 256.0);
        assert_eq!(image.get_sample(1, 0, 0), 65535.0);
    }

    #[test]
    fn raw_bitmap_rows_are_byte_padded() {
        let mut data = b"P4\n9 2\n".to_vec();
        data.extend_from_slice(&[0b10000000, 0b10000000, 0b00000000, 0b00000000]);
        let mut decoder = PnmDecoder::new();
        let image = decoder.decode(&data, 0).unwrap();
        assert_eq!(image.get_sample(0, 0, 0), 0.0); // black
        assert_eq!(image.get_sample(8, 0, 0), 0.0); // black, second byte
        assert_eq!(image.get_sample(1, 0, 0), 1.0);
        assert_eq!(image.get_sample(0, 1, 0), 1.0);
    }

    #[test]
    fn rejects_bad_header() {
        let mut decoder = PnmDecoder::new();
        assert!(decoder.decode(b"P7 1 1 255 ", 0).is_err());
        assert!(decoder.decode(b"P2 0 1 255 ", 0).is_err());
    }
}
