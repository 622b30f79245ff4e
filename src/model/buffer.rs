//! Bounds-checked big-endian reader and section layout arithmetic
//!
//! Every mesh section is handed to its decoder as its own `ByteReader`, so a
//! header that lies about a count runs into `UnexpectedEof` instead of
//! silently reading the neighbouring section.

use std::ops::Range;

use super::DecodeError;

/// Cursor over one named section of a buffer
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    section: &'static str,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8], section: &'static str) -> Self {
        Self { data, pos: 0, section }
    }

    /// Reader over `data[range]`. The range must already be validated by `Sections`.
    pub fn over(data: &'a [u8], range: Range<usize>, section: &'static str) -> Self {
        Self::new(&data[range], section)
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn eof(&self) -> DecodeError {
        DecodeError::UnexpectedEof {
            section: self.section,
            offset: self.pos,
        }
    }

    pub fn peek_u8(&self) -> Result<u8, DecodeError> {
        self.data.get(self.pos).copied().ok_or_else(|| self.eof())
    }

    pub fn u8(&mut self) -> Result<u8, DecodeError> {
        let value = self.peek_u8()?;
        self.pos += 1;
        Ok(value)
    }

    pub fn u16(&mut self) -> Result<u16, DecodeError> {
        if self.remaining() < 2 {
            return Err(self.eof());
        }
        let value = u16::from_be_bytes([self.data[self.pos], self.data[self.pos + 1]]);
        self.pos += 2;
        Ok(value)
    }

    /// Variable-width signed value: one byte biased by -64 below 128,
    /// otherwise a big-endian u16 biased by -0xC000.
    pub fn smart_short(&mut self) -> Result<i32, DecodeError> {
        if self.peek_u8()? < 128 {
            Ok(self.u8()? as i32 - 64)
        } else {
            Ok(self.u16()? as i32 - 0xC000)
        }
    }

    pub fn skip(&mut self, count: usize) -> Result<(), DecodeError> {
        if self.remaining() < count {
            return Err(self.eof());
        }
        self.pos += count;
        Ok(())
    }

    pub fn bytes(&mut self, count: usize) -> Result<Vec<u8>, DecodeError> {
        if self.remaining() < count {
            return Err(self.eof());
        }
        let out = self.data[self.pos..self.pos + count].to_vec();
        self.pos += count;
        Ok(out)
    }
}

/// Sequential section allocator over the data region of a mesh buffer.
///
/// Offsets are pure sums of the preceding section sizes; absent sections
/// consume nothing.
pub struct Sections {
    cursor: usize,
    limit: usize,
}

impl Sections {
    pub fn new(limit: usize) -> Self {
        Self { cursor: 0, limit }
    }

    pub fn take(&mut self, section: &'static str, len: usize) -> Result<Range<usize>, DecodeError> {
        let start = self.cursor;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= self.limit)
            .ok_or(DecodeError::SectionOutOfBounds {
                section,
                end: start.saturating_add(len),
                limit: self.limit,
            })?;
        self.cursor = end;
        Ok(start..end)
    }

    pub fn take_if(
        &mut self,
        section: &'static str,
        present: bool,
        len: usize,
    ) -> Result<Option<Range<usize>>, DecodeError> {
        if present {
            self.take(section, len).map(Some)
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smart_short_one_byte() {
        let mut r = ByteReader::new(&[0, 64, 127], "test");
        assert_eq!(r.smart_short().unwrap(), -64);
        assert_eq!(r.smart_short().unwrap(), 0);
        assert_eq!(r.smart_short().unwrap(), 63);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_smart_short_two_bytes() {
        let mut r = ByteReader::new(&[0x80, 0x00, 0xFF, 0xFF, 0xC0, 0x40], "test");
        assert_eq!(r.smart_short().unwrap(), 0x8000 - 0xC000);
        assert_eq!(r.smart_short().unwrap(), 0xFFFF - 0xC000);
        assert_eq!(r.smart_short().unwrap(), 0x40);
    }

    #[test]
    fn test_reader_eof_names_section() {
        let mut r = ByteReader::new(&[0x80], "vertex_x");
        match r.smart_short() {
            Err(DecodeError::UnexpectedEof { section, offset }) => {
                assert_eq!(section, "vertex_x");
                assert_eq!(offset, 0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_sections_sum_and_overflow() {
        let mut s = Sections::new(10);
        assert_eq!(s.take("a", 4).unwrap(), 0..4);
        assert_eq!(s.take_if("b", false, 100).unwrap(), None);
        assert_eq!(s.take_if("c", true, 6).unwrap(), Some(4..10));
        assert!(matches!(
            s.take("d", 1),
            Err(DecodeError::SectionOutOfBounds { section: "d", .. })
        ));
    }
}
