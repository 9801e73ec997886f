//! The TIFF IFD entry model: typed tag values read lazily out of an
//! [`InputBuffer`].

use self::Value::{Ascii, Double, List, Rational, SRational, Signed, Unsigned};
use crate::error::{ImageError, ImageFormatError, ImageResult};
use crate::stream::InputBuffer;
use crate::tags::Type;

/// A decoded tag value.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Value {
    Signed(i32),
    Unsigned(u32),
    Double(f64),
    List(Vec<Value>),
    Rational(u32, u32),
    SRational(i32, i32),
    Ascii(String),
}

impl Value {
    pub fn into_u32(self) -> ImageResult<u32> {
        match self {
            Unsigned(val) => Ok(val),
            List(vec) if !vec.is_empty() => vec.into_iter().next().unwrap().into_u32(),
            val => Err(ImageError::FormatError(
                ImageFormatError::UnsignedIntegerExpected(val),
            )),
        }
    }

    pub fn into_i32(self) -> ImageResult<i32> {
        match self {
            Signed(val) => Ok(val),
            Unsigned(val) => i32::try_from(val)
                .map_err(|_| ImageFormatError::SignedIntegerExpected(Unsigned(val)).into()),
            val => Err(ImageError::FormatError(
                ImageFormatError::SignedIntegerExpected(val),
            )),
        }
    }

    pub fn into_f64(self) -> ImageResult<f64> {
        match self {
            Unsigned(val) => Ok(f64::from(val)),
            Signed(val) => Ok(f64::from(val)),
            Double(val) => Ok(val),
            Rational(n, d) if d != 0 => Ok(f64::from(n) / f64::from(d)),
            SRational(n, d) if d != 0 => Ok(f64::from(n) / f64::from(d)),
            val => Err(ImageError::FormatError(
                ImageFormatError::UnsignedIntegerExpected(val),
            )),
        }
    }

    pub fn into_u32_vec(self) -> ImageResult<Vec<u32>> {
        match self {
            List(vec) => {
                let mut new_vec = Vec::with_capacity(vec.len());
                for v in vec {
                    new_vec.push(v.into_u32()?)
                }
                Ok(new_vec)
            }
            Unsigned(val) => Ok(vec![val]),
            Rational(numerator, denominator) => Ok(vec![numerator, denominator]),
            Ascii(val) => Ok(val.chars().map(u32::from).collect()),
            val => Err(ImageError::FormatError(
                ImageFormatError::UnsignedIntegerExpected(val),
            )),
        }
    }

    pub fn into_u8_vec(self) -> ImageResult<Vec<u8>> {
        let values = self.into_u32_vec()?;
        values
            .into_iter()
            .map(|v| {
                u8::try_from(v).map_err(|_| ImageFormatError::ByteExpected(Unsigned(v)).into())
            })
            .collect()
    }

    pub fn into_string(self) -> ImageResult<String> {
        match self {
            Ascii(val) => Ok(val),
            val => Err(ImageError::FormatError(
                ImageFormatError::UnsignedIntegerExpected(val),
            )),
        }
    }
}

/// One 12-byte IFD entry: field type, count and the 4-byte value-or-offset
/// slot. When `count * type.size() <= 4` the value lives inline, otherwise
/// the slot holds an absolute file offset.
#[derive(Clone, Debug)]
pub struct Entry {
    field_type: Type,
    count: u32,
    offset: [u8; 4],
}

impl Entry {
    pub fn new(field_type: Type, count: u32, offset: [u8; 4]) -> Entry {
        Entry {
            field_type,
            count,
            offset,
        }
    }

    pub fn field_type(&self) -> Type {
        self.field_type
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    fn byte_len(&self) -> ImageResult<usize> {
        (self.count as usize)
            .checked_mul(self.field_type.size())
            .ok_or_else(|| ImageFormatError::InvalidTag.into())
    }

    /// Positions a view over the value bytes, inline or behind the offset.
    fn value_view<'a>(&'a self, file: &InputBuffer<'a>) -> ImageResult<InputBuffer<'a>> {
        let len = self.byte_len()?;
        if len <= 4 {
            // The inline slot was captured out of the file and keeps its
            // byte order.
            Ok(InputBuffer::with_byte_order(&self.offset, file.byte_order()))
        } else {
            let mut offset_view = InputBuffer::with_byte_order(&self.offset, file.byte_order());
            let offset = offset_view.read_u32()? as usize;
            file.subarray(len, offset)
        }
    }

    /// Reads the entry's values. Lists come back as [`Value::List`].
    pub fn values<'a>(&'a self, file: &InputBuffer<'a>) -> ImageResult<Value> {
        let mut view = self.value_view(file)?;

        if self.field_type == Type::ASCII {
            // NUL-terminated within the declared count.
            let raw = view.read_string(self.count as usize)?;
            let text = match raw.find('\0') {
                Some(nul) => raw[..nul].to_owned(),
                None => raw,
            };
            return Ok(Ascii(text));
        }

        let mut values = Vec::with_capacity(self.count as usize);
        for _ in 0..self.count {
            values.push(self.read_one(&mut view)?);
        }
        if values.len() == 1 {
            Ok(values.pop().unwrap())
        } else {
            Ok(List(values))
        }
    }

    fn read_one(&self, view: &mut InputBuffer<'_>) -> ImageResult<Value> {
        Ok(match self.field_type {
            Type::BYTE | Type::UNDEFINED => Unsigned(u32::from(view.read_u8()?)),
            Type::SBYTE => Signed(i32::from(view.read_i8()?)),
            Type::SHORT => Unsigned(u32::from(view.read_u16()?)),
            Type::SSHORT => Signed(i32::from(view.read_i16()?)),
            Type::LONG => Unsigned(view.read_u32()?),
            Type::SLONG => Signed(view.read_i32()?),
            Type::RATIONAL => Rational(view.read_u32()?, view.read_u32()?),
            Type::SRATIONAL => SRational(view.read_i32()?, view.read_i32()?),
            Type::FLOAT => Double(f64::from(view.read_f32()?)),
            Type::DOUBLE => Double(view.read_f64()?),
            Type::ASCII => unreachable!("handled in values()"),
        })
    }
}
