//! Buffered TSV output for annotation lines.
//!
//! Uses itoa for integer formatting to avoid allocation in the hot path.
//! Column groups are separated by a double tab and tuples are
//! comma-separated, matching the historical output layout consumed by
//! downstream tooling.

use crate::error::Result;
use std::io::{BufWriter, Write};

/// Buffer size for the annotation writer.
const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

pub struct TsvWriter<W: Write> {
    writer: BufWriter<W>,
    itoa_buf: itoa::Buffer,
}

impl<W: Write> TsvWriter<W> {
    pub fn new(output: W) -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE, output)
    }

    pub fn with_capacity(capacity: usize, output: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(capacity, output),
            itoa_buf: itoa::Buffer::new(),
        }
    }

    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes)?;
        Ok(())
    }

    #[inline]
    pub fn write_tab(&mut self) -> Result<()> {
        self.writer.write_all(b"\t")?;
        Ok(())
    }

    /// Group separator: the historical double tab.
    #[inline]
    pub fn write_gap(&mut self) -> Result<()> {
        self.writer.write_all(b"\t\t")?;
        Ok(())
    }

    #[inline]
    pub fn write_newline(&mut self) -> Result<()> {
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    #[inline]
    pub fn write_int<I: itoa::Integer>(&mut self, n: I) -> Result<()> {
        self.writer.write_all(self.itoa_buf.format(n).as_bytes())?;
        Ok(())
    }

    /// Comma-separated tuple of counts.
    pub fn write_tuple(&mut self, values: &[u32]) -> Result<()> {
        for (i, &v) in values.iter().enumerate() {
            if i > 0 {
                self.writer.write_all(b",")?;
            }
            self.writer.write_all(self.itoa_buf.format(v).as_bytes())?;
        }
        Ok(())
    }

    /// One per-base block: `BASE \t rc,urc,urc26,ursc,q,mq \t\t`.
    pub fn write_base_block(&mut self, base: u8, values: &[u32; 6]) -> Result<()> {
        self.writer.write_all(&[base])?;
        self.write_tab()?;
        self.write_tuple(values)?;
        self.write_gap()?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_tuple() {
        let mut out = Vec::new();
        {
            let mut writer = TsvWriter::new(&mut out);
            writer.write_tuple(&[1, 0, 12, 3]).unwrap();
            writer.flush().unwrap();
        }
        assert_eq!(out, b"1,0,12,3");
    }

    #[test]
    fn test_write_base_block() {
        let mut out = Vec::new();
        {
            let mut writer = TsvWriter::new(&mut out);
            writer.write_base_block(b'A', &[2, 2, 1, 2, 30, 35]).unwrap();
            writer.flush().unwrap();
        }
        assert_eq!(out, b"A\t2,2,1,2,30,35\t\t");
    }

    #[test]
    fn test_line_framing() {
        let mut out = Vec::new();
        {
            let mut writer = TsvWriter::new(&mut out);
            writer.write_bytes(b"c1 4 A C").unwrap();
            writer.write_tab().unwrap();
            writer.write_tuple(&[1, 0, 0, 0]).unwrap();
            writer.write_gap().unwrap();
            writer.write_newline().unwrap();
            writer.flush().unwrap();
        }
        assert_eq!(out, b"c1 4 A C\t1,0,0,0\t\t\n");
    }
}
