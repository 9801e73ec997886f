use std::error::Error;
use std::fmt;
use std::io;
use std::str;
use std::string;

use crate::ifd::Value;
use crate::tags::{
    CompressionMethod, PhotometricInterpretation, PlanarConfiguration, SampleFormat, Tag,
};

/// Image error kinds.
#[derive(Debug)]
pub enum ImageError {
    /// The image is not formatted properly.
    FormatError(ImageFormatError),

    /// The decoder does not support features required by the image.
    UnsupportedError(ImageUnsupportedError),

    /// An I/O error occurred while encoding the image.
    IoError(io::Error),

    /// The limits of the decoder are exceeded.
    LimitsExceeded,

    /// An integer conversion to or from a platform size failed, either due to
    /// limits of the platform size or limits of the format.
    IntSizeError,

    /// The image does not support the requested operation.
    UsageError(UsageError),
}

/// The image is not formatted properly.
///
/// This indicates that the encoder producing the image might behave incorrectly or that the input
/// file has been corrupted.
///
/// The list of variants may grow to incorporate errors of future features. Matching against this
/// exhaustively is not covered by interface stability guarantees.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ImageFormatError {
    /// The magic bytes do not match any format the dispatcher knows about,
    /// or do not match the format the decoder was asked to decode.
    InvalidSignature,
    /// A header field carries a value that no valid file can have.
    InvalidHeader(&'static str),
    InvalidDimensions(u32, u32),
    /// A read was attempted past the end of the input buffer.
    EndOfStream,
    /// A NUL-terminated string ran into the end of the buffer.
    UnterminatedString,
    /// Corrupt LZW data, including the `0x00 0x01` old-style bit-order signal.
    InvalidLzwStream,
    /// Corrupt deflate/zlib data.
    InvalidDeflateStream,
    /// A malformed code word inside a CCITT fax stream.
    FaxDecode(&'static str),
    /// A tile or strip byte count exceeds the remainder of the stream.
    TruncatedTile,
    /// A chunk checksum did not match its payload.
    InvalidChecksum,
    ImageFileDirectoryNotFound,
    CycleInOffsets,
    InconsistentSizesEncountered,
    InvalidTag,
    InvalidTagValueType(Tag),
    RequiredTagNotFound(Tag),
    UnknownPredictor(u16),
    ByteExpected(Value),
    UnsignedIntegerExpected(Value),
    SignedIntegerExpected(Value),
    StripTileTagConflict,
    Format(String),
}

impl fmt::Display for ImageFormatError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        use self::ImageFormatError::*;
        match *self {
            InvalidSignature => write!(fmt, "Image signature not recognized."),
            InvalidHeader(expl) => write!(fmt, "Invalid header: {}.", expl),
            InvalidDimensions(width, height) => {
                write!(fmt, "Invalid dimensions: {}x{}.", width, height)
            }
            EndOfStream => write!(fmt, "Read past the end of the input buffer."),
            UnterminatedString => write!(fmt, "String is missing its NUL terminator."),
            InvalidLzwStream => write!(fmt, "LZW compressed data corrupted."),
            InvalidDeflateStream => write!(fmt, "Deflate compressed data corrupted."),
            FaxDecode(expl) => write!(fmt, "CCITT fax data corrupted: {}.", expl),
            TruncatedTile => write!(fmt, "Tile byte count exceeds the remaining stream."),
            InvalidChecksum => write!(fmt, "Chunk checksum mismatch."),
            ImageFileDirectoryNotFound => write!(fmt, "Image file directory not found."),
            CycleInOffsets => write!(fmt, "File contained a cycle in the list of IFDs."),
            InconsistentSizesEncountered => write!(fmt, "Inconsistent sizes encountered."),
            InvalidTag => write!(fmt, "Image contains invalid tag."),
            InvalidTagValueType(ref tag) => {
                write!(fmt, "Tag `{:?}` did not have the expected value type.", tag)
            }
            RequiredTagNotFound(ref tag) => write!(fmt, "Required tag `{:?}` not found.", tag),
            UnknownPredictor(ref predictor) => {
                write!(fmt, "Unknown predictor “{}” encountered", predictor)
            }
            ByteExpected(ref val) => write!(fmt, "Expected byte, {:?} found.", val),
            UnsignedIntegerExpected(ref val) => {
                write!(fmt, "Expected unsigned integer, {:?} found.", val)
            }
            SignedIntegerExpected(ref val) => {
                write!(fmt, "Expected signed integer, {:?} found.", val)
            }
            StripTileTagConflict => write!(fmt, "File should contain either (StripByteCounts and StripOffsets) or (TileByteCounts and TileOffsets), other combination was found."),
            Format(ref val) => write!(fmt, "Invalid format: {:?}.", val),
        }
    }
}

/// The decoder does not support features required by the image.
///
/// This only captures known failures for which the standard either does not require support or an
/// implementation has been planned but not yet completed. Some variants may become unused over
/// time and will then get deprecated before being removed.
///
/// The list of variants may grow. Matching against this exhaustively is not covered by interface
/// stability guarantees.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ImageUnsupportedError {
    /// A valid file uses a code path this library does not implement.
    UnsupportedFeature(&'static str),
    UnknownCompressionMethod,
    UnsupportedCompressionMethod(CompressionMethod),
    UnsupportedSampleDepth(u8),
    UnsupportedSampleFormat(Vec<SampleFormat>),
    UnknownInterpretation,
    UnsupportedInterpretation(PhotometricInterpretation),
    InterpretationWithBits(PhotometricInterpretation, Vec<u8>),
    InconsistentBitsPerSample(Vec<u8>),
    UnsupportedPlanarConfig(Option<PlanarConfiguration>),
    UnsupportedDataType,
}

impl fmt::Display for ImageUnsupportedError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        use self::ImageUnsupportedError::*;
        match *self {
            UnsupportedFeature(expl) => write!(fmt, "Unsupported feature: {}.", expl),
            UnknownCompressionMethod => write!(fmt, "Unknown compression method."),
            UnsupportedCompressionMethod(method) => {
                write!(fmt, "Compression method {:?} is unsupported", method)
            }
            UnsupportedSampleDepth(bits) => {
                write!(fmt, "{} bits per sample is unsupported.", bits)
            }
            UnsupportedSampleFormat(ref formats) => {
                write!(fmt, "Sample format {:?} is unsupported.", formats)
            }
            UnknownInterpretation => write!(
                fmt,
                "The image is using an unknown photometric interpretation."
            ),
            UnsupportedInterpretation(interpretation) => {
                write!(
                    fmt,
                    "Unsupported photometric interpretation \"{:?}\".",
                    interpretation
                )
            }
            InterpretationWithBits(ref photometric_interpretation, ref bits_per_sample) => write!(
                fmt,
                "{:?} with {:?} bits per sample is unsupported",
                photometric_interpretation, bits_per_sample
            ),
            InconsistentBitsPerSample(ref bits_per_sample) => {
                write!(fmt, "Inconsistent bits per sample: {:?}.", bits_per_sample)
            }
            UnsupportedPlanarConfig(config) => {
                write!(fmt, "Unsupported planar configuration “{:?}”.", config)
            }
            UnsupportedDataType => write!(fmt, "Unsupported data type."),
        }
    }
}

/// User attempted to use a decoder or an image in a way that is incompatible with it.
///
/// For example: requesting a frame index past the number of frames in the file.
#[derive(Debug)]
pub enum UsageError {
    InvalidFrameIndex(usize),
    InvalidPixelCoordinate(i64, i64),
    NoDecodeInProgress,
}

impl fmt::Display for UsageError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::UsageError::*;
        match *self {
            InvalidFrameIndex(index) => write!(fmt, "Frame index ({}) out of range.", index),
            InvalidPixelCoordinate(x, y) => {
                write!(fmt, "Pixel coordinate ({}, {}) outside of the image.", x, y)
            }
            NoDecodeInProgress => {
                write!(fmt, "decode_frame called without a successful start_decode.")
            }
        }
    }
}

impl fmt::Display for ImageError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match *self {
            ImageError::FormatError(ref e) => write!(fmt, "Format error: {}", e),
            ImageError::UnsupportedError(ref f) => write!(
                fmt,
                "The decoder does not support the \
                 image format `{}`",
                f
            ),
            ImageError::IoError(ref e) => e.fmt(fmt),
            ImageError::LimitsExceeded => write!(fmt, "The decoder limits are exceeded"),
            ImageError::IntSizeError => write!(fmt, "Platform or format size limits exceeded"),
            ImageError::UsageError(ref e) => write!(fmt, "Usage error: {}", e),
        }
    }
}

impl Error for ImageError {
    fn cause(&self) -> Option<&dyn Error> {
        match *self {
            ImageError::IoError(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ImageError {
    fn from(err: io::Error) -> ImageError {
        ImageError::IoError(err)
    }
}

impl From<str::Utf8Error> for ImageError {
    fn from(_err: str::Utf8Error) -> ImageError {
        ImageError::FormatError(ImageFormatError::InvalidTag)
    }
}

impl From<string::FromUtf8Error> for ImageError {
    fn from(_err: string::FromUtf8Error) -> ImageError {
        ImageError::FormatError(ImageFormatError::InvalidTag)
    }
}

impl From<ImageFormatError> for ImageError {
    fn from(err: ImageFormatError) -> ImageError {
        ImageError::FormatError(err)
    }
}

impl From<ImageUnsupportedError> for ImageError {
    fn from(err: ImageUnsupportedError) -> ImageError {
        ImageError::UnsupportedError(err)
    }
}

impl From<UsageError> for ImageError {
    fn from(err: UsageError) -> ImageError {
        ImageError::UsageError(err)
    }
}

impl From<std::num::TryFromIntError> for ImageError {
    fn from(_err: std::num::TryFromIntError) -> ImageError {
        ImageError::IntSizeError
    }
}

/// Result of an image decoding/encoding process
pub type ImageResult<T> = Result<T, ImageError>;
