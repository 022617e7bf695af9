// Bounds-checked cursor over consensus-serialized bytes.
use crate::{DecodeError, Result};

pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Bytes consumed between `start` and the current position.
    pub(crate) fn consumed_since(&self, start: usize) -> &'a [u8] {
        &self.buf[start..self.pos]
    }

    pub(crate) fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(DecodeError::Truncated {
                offset: self.pos,
                needed: len,
            });
        }
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub(crate) fn u16_le(&mut self) -> Result<u16> {
        self.array().map(u16::from_le_bytes)
    }

    pub(crate) fn u32_le(&mut self) -> Result<u32> {
        self.array().map(u32::from_le_bytes)
    }

    pub(crate) fn i32_le(&mut self) -> Result<i32> {
        self.array().map(i32::from_le_bytes)
    }

    pub(crate) fn u64_le(&mut self) -> Result<u64> {
        self.array().map(u64::from_le_bytes)
    }

    pub(crate) fn i64_le(&mut self) -> Result<i64> {
        self.array().map(i64::from_le_bytes)
    }

    pub(crate) fn hash(&mut self) -> Result<[u8; 32]> {
        self.array()
    }

    /// Reads a CompactSize integer.
    pub(crate) fn compact_size(&mut self) -> Result<u64> {
        let offset = self.pos;
        let tag = self.take(1)?[0];
        let (value, min) = match tag {
            0xfd => (u64::from(self.u16_le()?), 0xfd),
            0xfe => (u64::from(self.u32_le()?), 0x1_0000),
            0xff => (self.u64_le()?, 0x1_0000_0000),
            small => return Ok(u64::from(small)),
        };
        if value < min {
            return Err(DecodeError::NonCanonicalSize { offset });
        }
        Ok(value)
    }

    /// Reads an element count, rejecting counts that cannot fit in the remaining input.
    pub(crate) fn count(&mut self, what: &'static str, min_item_len: usize) -> Result<usize> {
        let count = self.compact_size()?;
        let fits = usize::try_from(count)
            .ok()
            .filter(|count| count.saturating_mul(min_item_len.max(1)) <= self.remaining());
        fits.ok_or(DecodeError::OversizeCount { what, count })
    }

    /// Reads a CompactSize-prefixed byte string.
    pub(crate) fn var_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.count("bytes", 1)?;
        self.take(len)
    }

    pub(crate) fn finish(&self) -> Result<()> {
        match self.remaining() {
            0 => Ok(()),
            trailing => Err(DecodeError::TrailingBytes(trailing)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_size_widths() {
        let mut reader = Reader::new(&[0x05, 0xfd, 0x00, 0x01, 0xfe, 0x00, 0x00, 0x01, 0x00]);
        assert_eq!(reader.compact_size(), Ok(5));
        assert_eq!(reader.compact_size(), Ok(0x100));
        assert_eq!(reader.compact_size(), Ok(0x1_0000));
        assert!(reader.finish().is_ok());
    }

    #[test]
    fn non_canonical_compact_size_is_rejected() {
        let mut reader = Reader::new(&[0xfd, 0x10, 0x00]);
        assert_eq!(
            reader.compact_size(),
            Err(DecodeError::NonCanonicalSize { offset: 0 })
        );
    }

    #[test]
    fn short_reads_report_offset() {
        let mut reader = Reader::new(&[1, 2, 3]);
        assert_eq!(reader.take(2), Ok(&[1u8, 2][..]));
        assert_eq!(
            reader.u32_le(),
            Err(DecodeError::Truncated {
                offset: 2,
                needed: 4
            })
        );
    }

    #[test]
    fn counts_larger_than_input_are_rejected() {
        let mut reader = Reader::new(&[0x03, 0xaa, 0xbb]);
        assert_eq!(
            reader.count("inputs", 41),
            Err(DecodeError::OversizeCount {
                what: "inputs",
                count: 3
            })
        );
        let mut reader = Reader::new(&[0x02, 0xaa, 0xbb, 0xcc]);
        assert_eq!(reader.var_bytes(), Ok(&[0xaa, 0xbb][..]));
        assert_eq!(reader.finish(), Err(DecodeError::TrailingBytes(1)));
    }
}
