//! CCITT Group 3 / Group 4 fax decompression (ITU-T T.4 and T.6).
//!
//! TIFF stores bilevel scans with one of three schemes: modified Huffman
//! (compression 2, 1D runs with byte-aligned rows), T.4 (compression 3,
//! EOL-separated rows that may mix 1D and 2D coding) and T.6 (compression 4,
//! all-2D, terminated by an EOFB marker).
//!
//! The decoder produces a packed bit plane, one bit per pixel MSB-first with
//! byte-padded rows, where a set bit is black. Mapping that onto photometric
//! interpretation is the caller's concern.

use std::borrow::Cow;
use std::sync::OnceLock;

use crate::bits::reverse_bits;
use crate::error::{ImageFormatError, ImageResult, ImageUnsupportedError};

/// TIFF compression schemes backed by this decoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaxCompression {
    /// Modified Huffman RLE, TIFF compression 2.
    HuffmanRle,
    /// T.4, TIFF compression 3.
    Group3,
    /// T.6, TIFF compression 4.
    Group4,
}

/// Decoded `T4Options` bits.
#[derive(Clone, Copy, Debug, Default)]
pub struct FaxOptions {
    /// Bit 0: rows may be 2D coded, each row carrying a 1-bit mode tag.
    pub two_dimensional: bool,
    /// Bit 1: the stream may switch to uncompressed mode.
    pub uncompressed: bool,
    /// Bit 2: fill bits pad each EOL to a byte boundary.
    pub fill_bits: bool,
}

impl FaxOptions {
    pub fn from_t4(value: u32) -> Self {
        FaxOptions {
            two_dimensional: value & 0b001 != 0,
            uncompressed: value & 0b010 != 0,
            fill_bits: value & 0b100 != 0,
        }
    }
}

/// End-of-facsimile-block: two consecutive EOL codes.
const EOFB: u32 = 0b0000_0000_0001_0000_0000_0001;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Code {
    Invalid,
    /// The peeked bits lead into an EOL code.
    Eol,
    Terminating { run: u16, bits: u8 },
    Makeup { run: u16, bits: u8 },
    /// White lookup saw the 8-bit `0000 0001` extended-makeup prefix; the
    /// following 3-4 bits select the run from the additional-makeup table.
    ExtMakeupPrefix,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode2d {
    Invalid,
    /// All-zero prefix: an EOL (or padding) where a coding mode was expected.
    EolPrefix,
    Pass,
    Horizontal,
    Vertical(i8),
    /// `0000001` extension prefix announcing uncompressed mode.
    Extension,
}

/// `(run length, code bit count, code value)` triples from T.4 tables 2-4.
const WHITE_CODES: &[(u16, u8, u16)] = &[
    // Terminating codes, runs 0..=63.
    (0, 8, 0b00110101),
    (1, 6, 0b000111),
    (2, 4, 0b0111),
    (3, 4, 0b1000),
    (4, 4, 0b1011),
    (5, 4, 0b1100),
    (6, 4, 0b1110),
    (7, 4, 0b1111),
    (8, 5, 0b10011),
    (9, 5, 0b10100),
    (10, 5, 0b00111),
    (11, 5, 0b01000),
    (12, 6, 0b001000),
    (13, 6, 0b000011),
    (14, 6, 0b110100),
    (15, 6, 0b110101),
    (16, 6, 0b101010),
    (17, 6, 0b101011),
    (18, 7, 0b0100111),
    (19, 7, 0b0001100),
    (20, 7, 0b0001000),
    (21, 7, 0b0010111),
    (22, 7, 0b0000011),
    (23, 7, 0b0000100),
    (24, 7, 0b0101000),
    (25, 7, 0b0101011),
    (26, 7, 0b0010011),
    (27, 7, 0b0100100),
    (28, 7, 0b0011000),
    (29, 8, 0b00000010),
    (30, 8, 0b00000011),
    (31, 8, 0b00011010),
    (32, 8, 0b00011011),
    (33, 8, 0b00010010),
    (34, 8, 0b00010011),
    (35, 8, 0b00010100),
    (36, 8, 0b00010101),
    (37, 8, 0b00010110),
    (38, 8, 0b00010111),
    (39, 8, 0b00101000),
    (40, 8, 0b00101001),
    (41, 8, 0b00101010),
    (42, 8, 0b00101011),
    (43, 8, 0b00101100),
    (44, 8, 0b00101101),
    (45, 8, 0b00000100),
    (46, 8, 0b00000101),
    (47, 8, 0b00001010),
    (48, 8, 0b00001011),
    (49, 8, 0b01010010),
    (50, 8, 0b01010011),
    (51, 8, 0b01010100),
    (52, 8, 0b01010101),
    (53, 8, 0b00100100),
    (54, 8, 0b00100101),
    (55, 8, 0b01011000),
    (56, 8, 0b01011001),
    (57, 8, 0b01011010),
    (58, 8, 0b01011011),
    (59, 8, 0b01001010),
    (60, 8, 0b01001011),
    (61, 8, 0b00110010),
    (62, 8, 0b00110011),
    (63, 8, 0b00110100),
    // Makeup codes, runs 64..=1728.
    (64, 5, 0b11011),
    (128, 5, 0b10010),
    (192, 6, 0b010111),
    (256, 7, 0b0110111),
    (320, 8, 0b00110110),
    (384, 8, 0b00110111),
    (448, 8, 0b01100100),
    (512, 8, 0b01100101),
    (576, 8, 0b01101000),
    (640, 8, 0b01100111),
    (704, 9, 0b011001100),
    (768, 9, 0b011001101),
    (832, 9, 0b011010010),
    (896, 9, 0b011010011),
    (960, 9, 0b011010100),
    (1024, 9, 0b011010101),
    (1088, 9, 0b011010110),
    (1152, 9, 0b011010111),
    (1216, 9, 0b011011000),
    (1280, 9, 0b011011001),
    (1344, 9, 0b011011010),
    (1408, 9, 0b011011011),
    (1472, 9, 0b010011000),
    (1536, 9, 0b010011001),
    (1600, 9, 0b010011010),
    (1664, 6, 0b011000),
    (1728, 9, 0b010011011),
];

/// Black codes that start with four zero bits and therefore live in the
/// second lookup stage. Runs 1..=9 are short codes handled inline.
const BLACK_CODES: &[(u16, u8, u16)] = &[
    (0, 10, 0b0000110111),
    (10, 7, 0b0000100),
    (11, 7, 0b0000101),
    (12, 7, 0b0000111),
    (13, 8, 0b00000100),
    (14, 8, 0b00000111),
    (15, 9, 0b000011000),
    (16, 10, 0b0000010111),
    (17, 10, 0b0000011000),
    (18, 10, 0b0000001000),
    (19, 11, 0b00001100111),
    (20, 11, 0b00001101000),
    (21, 11, 0b00001101100),
    (22, 11, 0b00000110111),
    (23, 11, 0b00000101000),
    (24, 11, 0b00000010111),
    (25, 11, 0b00000011000),
    (26, 12, 0b000011001010),
    (27, 12, 0b000011001011),
    (28, 12, 0b000011001100),
    (29, 12, 0b000011001101),
    (30, 12, 0b000001101000),
    (31, 12, 0b000001101001),
    (32, 12, 0b000001101010),
    (33, 12, 0b000001101011),
    (34, 12, 0b000011010010),
    (35, 12, 0b000011010011),
    (36, 12, 0b000011010100),
    (37, 12, 0b000011010101),
    (38, 12, 0b000011010110),
    (39, 12, 0b000011010111),
    (40, 12, 0b000001101100),
    (41, 12, 0b000001101101),
    (42, 12, 0b000011011010),
    (43, 12, 0b000011011011),
    (44, 12, 0b000001010100),
    (45, 12, 0b000001010101),
    (46, 12, 0b000001010110),
    (47, 12, 0b000001010111),
    (48, 12, 0b000001100100),
    (49, 12, 0b000001100101),
    (50, 12, 0b000001010010),
    (51, 12, 0b000001010011),
    (52, 12, 0b000000100100),
    (53, 12, 0b000000110111),
    (54, 12, 0b000000111000),
    (55, 12, 0b000000100111),
    (56, 12, 0b000000101000),
    (57, 12, 0b000001011000),
    (58, 12, 0b000001011001),
    (59, 12, 0b000000101011),
    (60, 12, 0b000000101100),
    (61, 12, 0b000001011010),
    (62, 12, 0b000001100110),
    (63, 12, 0b000001100111),
    // Makeup codes, runs 64..=1728.
    (64, 10, 0b0000001111),
    (128, 12, 0b000011001000),
    (192, 12, 0b000011001001),
    (256, 12, 0b000001011011),
    (320, 12, 0b000000110011),
    (384, 12, 0b000000110100),
    (448, 12, 0b000000110101),
    (512, 13, 0b0000001101100),
    (576, 13, 0b0000001101101),
    (640, 13, 0b0000001001010),
    (704, 13, 0b0000001001011),
    (768, 13, 0b0000001001100),
    (832, 13, 0b0000001001101),
    (896, 13, 0b0000001110010),
    (960, 13, 0b0000001110011),
    (1024, 13, 0b0000001110100),
    (1088, 13, 0b0000001110101),
    (1152, 13, 0b0000001110110),
    (1216, 13, 0b0000001110111),
    (1280, 13, 0b0000001010010),
    (1344, 13, 0b0000001010011),
    (1408, 13, 0b0000001010100),
    (1472, 13, 0b0000001010101),
    (1536, 13, 0b0000001011010),
    (1600, 13, 0b0000001011011),
    (1664, 13, 0b0000001100100),
    (1728, 13, 0b0000001100101),
];

/// Extended makeup codes shared by both colors, runs 1792..=2560.
const EXT_MAKEUP_CODES: &[(u16, u8, u16)] = &[
    (1792, 11, 0b00000001000),
    (1856, 11, 0b00000001100),
    (1920, 11, 0b00000001101),
    (1984, 12, 0b000000010010),
    (2048, 12, 0b000000010011),
    (2112, 12, 0b000000010100),
    (2176, 12, 0b000000010101),
    (2240, 12, 0b000000010110),
    (2304, 12, 0b000000010111),
    (2368, 12, 0b000000011100),
    (2432, 12, 0b000000011101),
    (2496, 12, 0b000000011110),
    (2560, 12, 0b000000011111),
];

struct Tables {
    /// White run lookup, indexed by a 10-bit peek.
    white: [Code; 1024],
    /// Second black stage: after a `0000` prefix, indexed by the next 9 bits.
    /// Entries carry the full code length including the prefix.
    black: [Code; 512],
    /// Extended makeup runs, indexed by the 4 bits after `0000 0001`.
    additional_makeup: [Code; 16],
    /// 2D coding modes, indexed by a 7-bit peek.
    two_d: [(Mode2d, u8); 128],
}

static TABLES: OnceLock<Tables> = OnceLock::new();

fn tables() -> &'static Tables {
    TABLES.get_or_init(build_tables)
}

fn classify(run: u16, bits: u8) -> Code {
    if run < 64 {
        Code::Terminating { run, bits }
    } else {
        Code::Makeup { run, bits }
    }
}

fn build_tables() -> Tables {
    let mut white = [Code::Invalid; 1024];
    for &(run, bits, code) in WHITE_CODES {
        let base = (code as usize) << (10 - bits);
        for entry in &mut white[base..base + (1 << (10 - bits))] {
            *entry = classify(run, bits);
        }
    }
    // An EOL starts with at least eleven zeros; extended makeup codes share
    // the 0000 0001 xx prefixes (indices 4..=7 of the 10-bit peek).
    white[0] = Code::Eol;
    for entry in &mut white[4..8] {
        *entry = Code::ExtMakeupPrefix;
    }

    let mut black = [Code::Invalid; 512];
    for &(run, bits, code) in BLACK_CODES.iter().chain(EXT_MAKEUP_CODES) {
        let suffix_bits = bits - 4;
        let suffix = code & ((1 << suffix_bits) - 1);
        let base = (suffix as usize) << (9 - suffix_bits);
        for entry in &mut black[base..base + (1 << (9 - suffix_bits))] {
            *entry = classify(run, bits);
        }
    }
    // EOL sans prefix: 0000 0001 over 8 bits.
    for entry in &mut black[0b0_0000_0010..=0b0_0000_0011] {
        *entry = Code::Eol;
    }

    let mut additional_makeup = [Code::Invalid; 16];
    for &(run, bits, code) in EXT_MAKEUP_CODES {
        let suffix_bits = bits - 8;
        let suffix = code & ((1 << suffix_bits) - 1);
        let base = (suffix as usize) << (4 - suffix_bits);
        for entry in &mut additional_makeup[base..base + (1 << (4 - suffix_bits))] {
            *entry = Code::Makeup { run, bits: suffix_bits };
        }
    }

    let mut two_d = [(Mode2d::Invalid, 0u8); 128];
    let modes: &[(Mode2d, u8, u16)] = &[
        (Mode2d::Vertical(0), 1, 0b1),
        (Mode2d::Vertical(1), 3, 0b011),
        (Mode2d::Vertical(-1), 3, 0b010),
        (Mode2d::Horizontal, 3, 0b001),
        (Mode2d::Pass, 4, 0b0001),
        (Mode2d::Vertical(2), 6, 0b000011),
        (Mode2d::Vertical(-2), 6, 0b000010),
        (Mode2d::Vertical(3), 7, 0b0000011),
        (Mode2d::Vertical(-3), 7, 0b0000010),
        (Mode2d::Extension, 7, 0b0000001),
    ];
    for &(mode, bits, code) in modes {
        let base = (code as usize) << (7 - bits);
        for entry in &mut two_d[base..base + (1 << (7 - bits))] {
            *entry = (mode, bits);
        }
    }
    two_d[0] = (Mode2d::EolPrefix, 0);

    Tables {
        white,
        black,
        additional_makeup,
        two_d,
    }
}

/// Decoder for one fax-compressed bit plane.
pub struct FaxDecoder<'a> {
    data: Cow<'a, [u8]>,
    byte_ptr: usize,
    /// Bits already consumed from the byte at `byte_ptr`, 0..8.
    bit_ptr: u8,
    width: usize,
    height: usize,
    compression: FaxCompression,
    options: FaxOptions,
    /// Color-change positions on the reference (previous) row.
    prev_changes: Vec<u32>,
    /// Color-change positions accumulated for the row being decoded.
    curr_changes: Vec<u32>,
    /// Search hint into `prev_changes`, reset per row.
    last_changing: usize,
}

impl<'a> FaxDecoder<'a> {
    /// `fill_order` 2 flips the bits of every byte before decoding.
    pub fn new(
        data: &'a [u8],
        width: usize,
        height: usize,
        compression: FaxCompression,
        options: FaxOptions,
        fill_order: u16,
    ) -> Self {
        let data = if fill_order == 2 {
            let mut flipped = data.to_vec();
            reverse_bits(&mut flipped);
            Cow::Owned(flipped)
        } else {
            Cow::Borrowed(data)
        };
        FaxDecoder {
            data,
            byte_ptr: 0,
            bit_ptr: 0,
            width,
            height,
            compression,
            options,
            prev_changes: Vec::with_capacity(width),
            curr_changes: Vec::with_capacity(width),
            last_changing: 0,
        }
    }

    /// Bytes per packed output row.
    pub fn row_bytes(width: usize) -> usize {
        width.div_ceil(8)
    }

    /// Decodes the plane into `output` (`height * row_bytes(width)` bytes,
    /// pre-zeroed, set bit = black).
    ///
    /// On a malformed stream the rows decoded before the error are left in
    /// `output`; the caller decides whether a partial plane is acceptable.
    pub fn decode_into(&mut self, output: &mut [u8]) -> ImageResult<()> {
        let row_bytes = Self::row_bytes(self.width);
        if self.width == 0 || self.height == 0 {
            return Ok(());
        }

        match self.compression {
            FaxCompression::HuffmanRle => {
                for row in 0..self.height {
                    if self.bits_remaining() == 0 {
                        break;
                    }
                    self.decode_1d_row(&mut output[row * row_bytes..][..row_bytes])?;
                    self.align_byte();
                    std::mem::swap(&mut self.prev_changes, &mut self.curr_changes);
                }
            }
            FaxCompression::Group3 => {
                for row in 0..self.height {
                    let has_eol = self.seek_eol();
                    // Without an EOL, fewer than 12 bits can only be padding.
                    if self.bits_remaining() == 0 || (!has_eol && self.bits_remaining() < 12) {
                        break;
                    }
                    // A second EOL right away is the return-to-control marker.
                    if has_eol && self.bits_remaining() >= 12 && self.peek_bits(12) == 1 {
                        break;
                    }
                    let use_1d = if self.options.two_dimensional {
                        self.read_bit() == 1
                    } else {
                        true
                    };
                    let out_row = &mut output[row * row_bytes..][..row_bytes];
                    if use_1d {
                        self.decode_1d_row(out_row)?;
                    } else {
                        self.decode_2d_row(out_row)?;
                    }
                    std::mem::swap(&mut self.prev_changes, &mut self.curr_changes);
                }
            }
            FaxCompression::Group4 => {
                for row in 0..self.height {
                    if self.bits_remaining() == 0 {
                        break;
                    }
                    if self.bits_remaining() >= 24 && self.peek_bits(24) == EOFB {
                        self.consume_bits(24);
                        break;
                    }
                    self.decode_2d_row(&mut output[row * row_bytes..][..row_bytes])?;
                    std::mem::swap(&mut self.prev_changes, &mut self.curr_changes);
                }
            }
        }
        Ok(())
    }

    //
    // Row decoders
    //

    fn decode_1d_row(&mut self, out_row: &mut [u8]) -> ImageResult<()> {
        self.curr_changes.clear();
        let width = self.width as u32;
        let mut pos = 0u32;
        let mut white = true;

        while pos < width {
            let run = self.decode_run(white)?.min(width - pos);
            if !white && run > 0 {
                set_to_black(out_row, pos, run);
            }
            pos += run;
            if pos < width {
                self.curr_changes.push(pos);
            }
            white = !white;
        }
        Ok(())
    }

    fn decode_2d_row(&mut self, out_row: &mut [u8]) -> ImageResult<()> {
        self.curr_changes.clear();
        self.last_changing = 0;
        let width = self.width as i64;
        let mut a0: i64 = -1;
        let mut white = true;

        while a0 < width {
            let (mode, bits) = tables().two_d[self.peek_bits(7) as usize];
            match mode {
                Mode2d::Invalid | Mode2d::EolPrefix => {
                    return Err(ImageFormatError::FaxDecode("bad 2D mode code").into());
                }
                Mode2d::Extension => {
                    return Err(ImageUnsupportedError::UnsupportedFeature(
                        "uncompressed mode in CCITT fax stream",
                    )
                    .into());
                }
                Mode2d::Pass => {
                    self.consume_bits(bits);
                    let (_b1, b2) = self.locate_b(a0, white);
                    let start = a0.max(0) as u32;
                    if !white && b2 > start {
                        set_to_black(out_row, start, b2 - start);
                    }
                    a0 = i64::from(b2);
                }
                Mode2d::Horizontal => {
                    self.consume_bits(bits);
                    let start = a0.max(0) as u32;
                    let r1 = self.decode_run(white)?.min(width as u32 - start);
                    let mid = start + r1;
                    let r2 = self.decode_run(!white)?.min(width as u32 - mid);
                    if a0 >= 0 && r1 + r2 == 0 {
                        return Err(ImageFormatError::FaxDecode("empty horizontal runs").into());
                    }
                    if white {
                        if r2 > 0 {
                            set_to_black(out_row, mid, r2);
                        }
                    } else if r1 > 0 {
                        set_to_black(out_row, start, r1);
                    }
                    if mid < width as u32 {
                        self.curr_changes.push(mid);
                    }
                    if mid + r2 < width as u32 {
                        self.curr_changes.push(mid + r2);
                    }
                    a0 = i64::from(mid + r2);
                }
                Mode2d::Vertical(k) => {
                    self.consume_bits(bits);
                    let (b1, _b2) = self.locate_b(a0, white);
                    let a1 = (i64::from(b1) + i64::from(k)).clamp(0, width);
                    if a0 >= 0 && a1 <= a0 {
                        return Err(
                            ImageFormatError::FaxDecode("coding position not advancing").into()
                        );
                    }
                    let start = a0.max(0);
                    if !white && a1 > start {
                        set_to_black(out_row, start as u32, (a1 - start) as u32);
                    }
                    if a1 < width {
                        self.curr_changes.push(a1 as u32);
                    }
                    white = !white;
                    a0 = a1;
                }
            }
        }
        Ok(())
    }

    /// Decodes one run (makeup chain plus terminating code) of `white` color.
    fn decode_run(&mut self, white: bool) -> ImageResult<u32> {
        let mut total = 0u32;
        loop {
            let code = if white {
                tables().white[self.peek_bits(10) as usize]
            } else {
                self.decode_black_code()?
            };
            match code {
                Code::Terminating { run, bits } => {
                    self.consume_bits(bits);
                    return Ok(total + u32::from(run));
                }
                Code::Makeup { run, bits } => {
                    self.consume_bits(bits);
                    total += u32::from(run);
                }
                Code::ExtMakeupPrefix => {
                    self.consume_bits(8);
                    match tables().additional_makeup[self.peek_bits(4) as usize] {
                        Code::Makeup { run, bits } => {
                            self.consume_bits(bits);
                            total += u32::from(run);
                        }
                        _ => {
                            return Err(
                                ImageFormatError::FaxDecode("bad extended makeup code").into()
                            )
                        }
                    }
                }
                Code::Eol => {
                    return Err(ImageFormatError::FaxDecode("EOL inside a scanline").into());
                }
                Code::Invalid => {
                    return Err(ImageFormatError::FaxDecode("unrecognized run code").into());
                }
            }
        }
    }

    /// Black run codes: runs 1..=9 resolve from a short peek, everything
    /// else carries a `0000` prefix and uses the 9-bit second stage.
    fn decode_black_code(&mut self) -> ImageResult<Code> {
        Ok(match self.peek_bits(4) {
            0b1100..=0b1111 => Code::Terminating { run: 2, bits: 2 },
            0b1000..=0b1011 => Code::Terminating { run: 3, bits: 2 },
            0b0100 | 0b0101 => Code::Terminating { run: 1, bits: 3 },
            0b0110 | 0b0111 => Code::Terminating { run: 4, bits: 3 },
            0b0011 => Code::Terminating { run: 5, bits: 4 },
            0b0010 => Code::Terminating { run: 6, bits: 4 },
            0b0001 => {
                let peek = self.peek_bits(6);
                if peek >> 1 == 0b00011 {
                    Code::Terminating { run: 7, bits: 5 }
                } else if peek == 0b000101 {
                    Code::Terminating { run: 8, bits: 6 }
                } else if peek == 0b000100 {
                    Code::Terminating { run: 9, bits: 6 }
                } else {
                    Code::Invalid
                }
            }
            _ => tables().black[(self.peek_bits(13) & 0x1FF) as usize],
        })
    }

    /// Finds `b1`/`b2` on the reference row: the first change right of `a0`
    /// whose transition matches the parity required by the coding color.
    fn locate_b(&mut self, a0: i64, white: bool) -> (u32, u32) {
        let parity = usize::from(!white);
        let changes = &self.prev_changes;
        let hint = self.last_changing.saturating_sub(1);

        let found = (hint..changes.len())
            .find(|&i| i % 2 == parity && i64::from(changes[i]) > a0)
            .or_else(|| {
                (0..hint.min(changes.len()))
                    .find(|&i| i % 2 == parity && i64::from(changes[i]) > a0)
            });

        match found {
            Some(i) => {
                let b1 = self.prev_changes[i];
                let b2 = self
                    .prev_changes
                    .get(i + 1)
                    .copied()
                    .unwrap_or(self.width as u32);
                self.last_changing = i;
                (b1, b2)
            }
            None => (self.width as u32, self.width as u32),
        }
    }

    //
    // Bit cursor
    //

    fn bits_remaining(&self) -> usize {
        if self.byte_ptr >= self.data.len() {
            return 0;
        }
        (self.data.len() - self.byte_ptr) * 8 - self.bit_ptr as usize
    }

    /// Next `count` bits (at most 24) MSB-first, zero-padded past the end of
    /// the data, without consuming.
    fn peek_bits(&self, count: u8) -> u32 {
        debug_assert!(count <= 24);
        let mut window = 0u32;
        for i in 0..4 {
            let byte = self.data.get(self.byte_ptr + i).copied().unwrap_or(0);
            window = window << 8 | u32::from(byte);
        }
        window <<= self.bit_ptr;
        window >> (32 - count)
    }

    fn consume_bits(&mut self, count: u8) {
        let total = self.bit_ptr as usize + count as usize;
        self.byte_ptr += total / 8;
        self.bit_ptr = (total % 8) as u8;
    }

    fn read_bit(&mut self) -> u32 {
        let bit = self.peek_bits(1);
        self.consume_bits(1);
        bit
    }

    fn align_byte(&mut self) {
        if self.bit_ptr > 0 {
            self.bit_ptr = 0;
            self.byte_ptr += 1;
        }
    }

    /// Consumes an EOL code along with any leading fill bits. Leaves the
    /// cursor untouched when the upcoming bits are not an EOL.
    fn seek_eol(&mut self) -> bool {
        while self.bits_remaining() >= 12 {
            if self.peek_bits(12) == 1 {
                self.consume_bits(12);
                return true;
            }
            if self.peek_bits(1) == 0 {
                self.consume_bits(1);
            } else {
                return false;
            }
        }
        false
    }
}

/// Sets `run` bits to black starting at bit `start` of the packed row.
fn set_to_black(row: &mut [u8], start: u32, run: u32) {
    for bit in start..start + run {
        row[(bit / 8) as usize] |= 0x80 >> (bit % 8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(
        data: &[u8],
        width: usize,
        height: usize,
        compression: FaxCompression,
        options: FaxOptions,
    ) -> Vec<u8> {
        let mut decoder = FaxDecoder::new(data, width, height, compression, options, 1);
        let mut out = vec![0; FaxDecoder::row_bytes(width) * height];
        decoder.decode_into(&mut out).unwrap();
        out
    }

    #[test]
    fn group3_all_white_row() {
        // EOL, then the white terminating code for a run of 8 (`10011`).
        let data = [0x00, 0x19, 0x80];
        let out = decode(&data, 8, 1, FaxCompression::Group3, FaxOptions::default());
        assert_eq!(out, [0x00]);
    }

    #[test]
    fn rle_all_black_row() {
        // White run 0 (`00110101`), black run 8 (`000101`).
        let data = [0x35, 0x14];
        let out = decode(
            &data,
            8,
            1,
            FaxCompression::HuffmanRle,
            FaxOptions::default(),
        );
        assert_eq!(out, [0xFF]);
    }

    #[test]
    fn group4_vertical_all_white() {
        // V(0) against the imaginary all-white reference row, then EOFB.
        let data = [0x80, 0x08, 0x00, 0x80];
        let out = decode(&data, 8, 1, FaxCompression::Group4, FaxOptions::default());
        assert_eq!(out, [0x00]);
    }

    #[test]
    fn group4_horizontal_runs() {
        // Horizontal (`001`), white 3 (`1000`), black 5 (`0011`), EOFB.
        let data = [0x30, 0x60, 0x02, 0x00, 0x20];
        let out = decode(&data, 8, 1, FaxCompression::Group4, FaxOptions::default());
        assert_eq!(out, [0x1F]);
    }

    #[test]
    fn group4_two_rows_with_reference() {
        // Row 1: horizontal, white 3, black 5. Row 2: V(0), V(0) copies the
        // reference transitions, giving an identical row.
        // Bits: 001 1000 0011 | 1 1 | EOFB
        let bits: Vec<u8> = {
            let mut s = String::new();
            s.push_str("00110000011");
            s.push_str("11");
            s.push_str("000000000001000000000001");
            pack_bit_string(&s)
        };
        let out = decode(&bits, 8, 2, FaxCompression::Group4, FaxOptions::default());
        assert_eq!(out, [0x1F, 0x1F]);
    }

    #[test]
    fn fill_order_2_flips_input() {
        // Same stream as `rle_all_black_row` with every byte bit-reversed.
        let data = [0xAC, 0x28];
        let mut decoder = FaxDecoder::new(
            &data,
            8,
            1,
            FaxCompression::HuffmanRle,
            FaxOptions::default(),
            2,
        );
        let mut out = vec![0; 1];
        decoder.decode_into(&mut out).unwrap();
        assert_eq!(out, [0xFF]);
    }

    #[test]
    fn malformed_stream_keeps_decoded_rows() {
        // Row 1 decodes, then garbage: the error leaves row 1 intact.
        let mut bits = String::new();
        bits.push_str("00110000011"); // horizontal, white 3, black 5
        bits.push_str("0000000"); // extension/garbage prefix
        let data = pack_bit_string(&bits);
        let mut decoder = FaxDecoder::new(
            &data,
            8,
            2,
            FaxCompression::Group4,
            FaxOptions::default(),
            1,
        );
        let mut out = vec![0; 2];
        assert!(decoder.decode_into(&mut out).is_err());
        assert_eq!(out[0], 0x1F);
    }

    fn pack_bit_string(bits: &str) -> Vec<u8> {
        let mut out = Vec::new();
        let mut acc = 0u8;
        let mut n = 0;
        for c in bits.chars() {
            acc = acc << 1 | (c == '1') as u8;
            n += 1;
            if n == 8 {
                out.push(acc);
                acc = 0;
                n = 0;
            }
        }
        if n > 0 {
            out.push(acc << (8 - n));
        }
        out
    }
}
