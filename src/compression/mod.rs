//! Decompression primitives shared by the codecs.
//!
//! TIFF routes tile payloads through one of these depending on its
//! `Compression` tag; PNG rides on the deflate pair. LZW, PackBits and the
//! CCITT fax family are implemented here; deflate is delegated to `flate2`.

pub mod deflate;
pub mod fax;
pub mod lzw;
pub mod packbits;
