//! Offset-tracking little-endian writer underneath the TIFF encoder.

use std::io::{self, Seek, SeekFrom, Write};

pub fn write_tiff_header<W: Write>(writer: &mut TiffWriter<W>) -> Result<(), io::Error> {
    writer.write_bytes(b"II")?;
    writer.write_u16(42)?;
    Ok(())
}

pub struct TiffWriter<W> {
    writer: W,
    offset: u64,
}

impl<W: Write> TiffWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, offset: 0 }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), io::Error> {
        self.writer.write_all(bytes)?;
        self.offset += bytes.len() as u64;
        Ok(())
    }

    pub fn write_u8(&mut self, n: u8) -> Result<(), io::Error> {
        self.write_bytes(&n.to_le_bytes())
    }

    pub fn write_u16(&mut self, n: u16) -> Result<(), io::Error> {
        self.write_bytes(&n.to_le_bytes())
    }

    pub fn write_u32(&mut self, n: u32) -> Result<(), io::Error> {
        self.write_bytes(&n.to_le_bytes())
    }

    pub fn pad_word_boundary(&mut self) -> Result<(), io::Error> {
        if self.offset % 4 != 0 {
            let padding = [0, 0, 0];
            let padd_len = 4 - (self.offset % 4);
            self.write_bytes(&padding[..padd_len as usize])?;
        }
        Ok(())
    }
}

impl<W: Write + Seek> TiffWriter<W> {
    pub fn goto_offset(&mut self, offset: u64) -> Result<(), io::Error> {
        self.offset = offset;
        self.writer.seek(SeekFrom::Start(offset))?;
        Ok(())
    }
}
