//! Little-endian field decoding shared by every record parser.
//!
//! All reads are bounds-checked against the slice they are given; nothing here can read past the
//! end of a payload.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unexpected end of data at offset {offset} (needed {needed} bytes, {available} available)")]
pub struct Truncated {
    pub offset: usize,
    pub needed: usize,
    pub available: usize,
}

fn array_at<const N: usize>(data: &[u8], offset: usize) -> Option<[u8; N]> {
    let end = offset.checked_add(N)?;
    data.get(offset..end)?.try_into().ok()
}

pub fn read_u8(data: &[u8], offset: usize) -> Option<u8> {
    data.get(offset).copied()
}

pub fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    array_at(data, offset).map(u16::from_le_bytes)
}

/// Signed 16-bit field; sign-extends from bit 15.
pub fn read_s16(data: &[u8], offset: usize) -> Option<i16> {
    array_at(data, offset).map(i16::from_le_bytes)
}

pub fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    array_at(data, offset).map(u32::from_le_bytes)
}

pub fn read_s32(data: &[u8], offset: usize) -> Option<i32> {
    array_at(data, offset).map(i32::from_le_bytes)
}

/// 16.16 fixed point: signed integral high half plus an unsigned fraction.
pub fn read_fixed32(data: &[u8], offset: usize) -> Option<f64> {
    let fraction = read_u16(data, offset)?;
    let integral = read_s16(data, offset.checked_add(2)?)?;
    Some(integral as f64 + fraction as f64 / 65536.0)
}

pub fn read_float64(data: &[u8], offset: usize) -> Option<f64> {
    array_at(data, offset).map(|b| f64::from_bits(u64::from_le_bytes(b)))
}

/// Decoded RK number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RkValue {
    Integer(i32),
    Float(f64),
}

impl RkValue {
    pub fn as_f64(self) -> f64 {
        match self {
            RkValue::Integer(i) => i as f64,
            RkValue::Float(f) => f,
        }
    }
}

/// Decode Excel's packed RK number encoding.
///
/// Bit 0 scales the value by 1/100. Bit 1 selects a 30-bit signed integer in the upper bits;
/// otherwise the upper 30 bits are the high word of an IEEE754 double with a zero low word.
pub fn decode_rk(rk: u32) -> RkValue {
    let scaled = rk & 0x01 != 0;
    if rk & 0x02 != 0 {
        let i = (rk as i32) >> 2;
        if !scaled {
            RkValue::Integer(i)
        } else if i % 100 == 0 {
            RkValue::Integer(i / 100)
        } else {
            RkValue::Float(i as f64 * 0.01)
        }
    } else {
        let f = f64::from_bits(((rk & 0xFFFF_FFFC) as u64) << 32);
        RkValue::Float(if scaled { f * 0.01 } else { f })
    }
}

/// Forward-only cursor over a record payload.
#[derive(Debug, Clone)]
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn data(&self) -> &'a [u8] {
        self.data
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub(crate) fn rest(&self) -> &'a [u8] {
        self.data.get(self.pos..).unwrap_or_default()
    }

    fn truncated(&self, needed: usize) -> Truncated {
        Truncated {
            offset: self.pos,
            needed,
            available: self.remaining(),
        }
    }

    fn take<T>(&mut self, width: usize, value: Option<T>) -> Result<T, Truncated> {
        let value = value.ok_or_else(|| self.truncated(width))?;
        self.pos += width;
        Ok(value)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, Truncated> {
        let v = read_u8(self.data, self.pos);
        self.take(1, v)
    }

    pub(crate) fn u16(&mut self) -> Result<u16, Truncated> {
        let v = read_u16(self.data, self.pos);
        self.take(2, v)
    }

    pub(crate) fn i16(&mut self) -> Result<i16, Truncated> {
        let v = read_s16(self.data, self.pos);
        self.take(2, v)
    }

    pub(crate) fn u32(&mut self) -> Result<u32, Truncated> {
        let v = read_u32(self.data, self.pos);
        self.take(4, v)
    }

    pub(crate) fn i32(&mut self) -> Result<i32, Truncated> {
        let v = read_s32(self.data, self.pos);
        self.take(4, v)
    }

    pub(crate) fn f64(&mut self) -> Result<f64, Truncated> {
        let v = read_float64(self.data, self.pos);
        self.take(8, v)
    }

    pub(crate) fn fixed32(&mut self) -> Result<f64, Truncated> {
        let v = read_fixed32(self.data, self.pos);
        self.take(4, v)
    }

    pub(crate) fn bytes(&mut self, n: usize) -> Result<&'a [u8], Truncated> {
        let v = self
            .pos
            .checked_add(n)
            .and_then(|end| self.data.get(self.pos..end));
        self.take(n, v)
    }

    pub(crate) fn skip(&mut self, n: usize) -> Result<(), Truncated> {
        self.bytes(n).map(|_| ())
    }

    /// Move the cursor forward by `n` bytes (used after string decoders report their size).
    pub(crate) fn advance(&mut self, n: usize) {
        self.pos = self.pos.saturating_add(n).min(self.data.len());
    }
}
