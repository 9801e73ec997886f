//! Deflate (RFC 1951) and zlib-wrapped (RFC 1950) streams via `flate2`.
//!
//! TIFF's Deflate compression and PNG's IDAT payloads are zlib-wrapped; the
//! raw pair exists for callers that strip the wrapper themselves.

use std::io::{Read, Write};

use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::{DeflateEncoder, ZlibEncoder};
use flate2::Compression;

use crate::error::{ImageFormatError, ImageResult};

/// Inflates a raw deflate stream into a growing buffer.
pub fn inflate(input: &[u8]) -> ImageResult<Vec<u8>> {
    let mut output = Vec::new();
    DeflateDecoder::new(input)
        .read_to_end(&mut output)
        .map_err(|_| ImageFormatError::InvalidDeflateStream)?;
    Ok(output)
}

/// Inflates a zlib-wrapped stream into a growing buffer.
pub fn inflate_zlib(input: &[u8]) -> ImageResult<Vec<u8>> {
    let mut output = Vec::new();
    ZlibDecoder::new(input)
        .read_to_end(&mut output)
        .map_err(|_| ImageFormatError::InvalidDeflateStream)?;
    Ok(output)
}

/// Inflates a zlib-wrapped stream into a caller-supplied buffer.
///
/// Returns the number of bytes written; decompression stops once the buffer
/// is full.
pub fn inflate_zlib_into(input: &[u8], output: &mut [u8]) -> ImageResult<usize> {
    let mut decoder = ZlibDecoder::new(input);
    let mut filled = 0;
    while filled < output.len() {
        let read = decoder
            .read(&mut output[filled..])
            .map_err(|_| ImageFormatError::InvalidDeflateStream)?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    Ok(filled)
}

/// Compresses `input` as a raw deflate stream.
pub fn deflate(input: &[u8]) -> ImageResult<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(input)?;
    Ok(encoder.finish()?)
}

/// Compresses `input` as a zlib-wrapped stream.
pub fn deflate_zlib(input: &[u8]) -> ImageResult<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(input)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_round_trip() {
        let data = b"This is a string for checking various compression algorithms.";
        assert_eq!(inflate(&deflate(data).unwrap()).unwrap(), data);
    }

    #[test]
    fn zlib_round_trip() {
        let mut data = Vec::new();
        for i in 0u32..10_000 {
            data.push((i % 200) as u8);
        }
        assert_eq!(inflate_zlib(&deflate_zlib(&data).unwrap()).unwrap(), data);
    }

    #[test]
    fn fixed_buffer_stops_at_capacity() {
        let data = vec![9u8; 64];
        let compressed = deflate_zlib(&data).unwrap();
        let mut small = [0u8; 16];
        assert_eq!(inflate_zlib_into(&compressed, &mut small).unwrap(), 16);
        assert_eq!(small, [9u8; 16]);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(inflate_zlib(&[0x12, 0x34, 0x56]).is_err());
    }
}
