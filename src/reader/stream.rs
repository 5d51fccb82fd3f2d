//! Sequential cursor over an in-memory GIF stream
use crate::error::{Error, Result};
use crate::types::{ColorTable, PLTE_CHANNELS};

/// Single-owner read cursor. Every read either succeeds completely or fails
/// with [`Error::TruncatedStream`] without moving the cursor.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> ByteReader<'a> {
        ByteReader { data, pos: 0 }
    }

    /// Offset of the next byte to be read.
    pub fn offset(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let b = *self.data.get(self.pos).ok_or(self.truncated())?;
        self.pos += 1;
        Ok(b)
    }

    pub fn read_u16_le(&mut self) -> Result<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Reads a raw run of `n` bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(self.truncated());
        }
        let run = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(run)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.read_bytes(n).map(|_| ())
    }

    /// Reads one length-prefixed sub-block. `None` is the zero-length
    /// terminator that ends a chain.
    pub fn read_block(&mut self) -> Result<Option<&'a [u8]>> {
        let start = self.pos;
        let len = self.read_u8()? as usize;
        if len == 0 {
            return Ok(None);
        }
        match self.read_bytes(len) {
            Ok(block) => Ok(Some(block)),
            Err(err) => {
                self.pos = start;
                Err(err)
            }
        }
    }

    /// Skips a whole sub-block chain including its terminator.
    pub fn skip_blocks(&mut self) -> Result<()> {
        while self.read_block()?.is_some() {}
        Ok(())
    }

    /// Reads a color table of `entries` RGB triples.
    pub fn read_color_table(&mut self, entries: usize) -> Result<ColorTable> {
        let rgb = self.read_bytes(entries * PLTE_CHANNELS)?;
        Ok(ColorTable::from_packed(rgb))
    }

    fn truncated(&self) -> Error {
        Error::TruncatedStream {
            offset: self.data.len(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reads_integers() {
        let mut r = ByteReader::new(&[0x01, 0x34, 0x12]);
        assert_eq!(r.read_u8().unwrap(), 1);
        assert_eq!(r.read_u16_le().unwrap(), 0x1234);
        assert_eq!(r.remaining(), 0);
        assert!(matches!(
            r.read_u8(),
            Err(Error::TruncatedStream { offset: 3 })
        ));
    }

    #[test]
    fn short_read_does_not_advance() {
        let mut r = ByteReader::new(&[0xAA]);
        assert!(r.read_u16_le().is_err());
        assert_eq!(r.offset(), 0);
        assert_eq!(r.read_u8().unwrap(), 0xAA);
    }

    #[test]
    fn sub_block_chains() {
        let data = [2, b'a', b'b', 1, b'c', 0, 0x3B];
        let mut r = ByteReader::new(&data);
        assert_eq!(r.read_block().unwrap(), Some(&b"ab"[..]));
        assert_eq!(r.read_block().unwrap(), Some(&b"c"[..]));
        assert_eq!(r.read_block().unwrap(), None);
        assert_eq!(r.read_u8().unwrap(), 0x3B);

        let mut r = ByteReader::new(&data);
        r.skip_blocks().unwrap();
        assert_eq!(r.offset(), 6);
    }

    #[test]
    fn truncated_sub_block() {
        let mut r = ByteReader::new(&[5, 1, 2]);
        assert!(matches!(r.read_block(), Err(Error::TruncatedStream { .. })));
        assert_eq!(r.offset(), 0);
    }

    #[test]
    fn color_table() {
        let mut r = ByteReader::new(&[1, 2, 3, 4, 5, 6]);
        let table = r.read_color_table(2).unwrap();
        assert_eq!(table.colors(), &[[1, 2, 3], [4, 5, 6]]);
        assert!(r.read_color_table(1).is_err());
    }
}
