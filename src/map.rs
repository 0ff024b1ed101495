//! MAQ `.map` binary alignment format.
//!
//! A map file is a gzip-compressed stream: a small header carrying the
//! contig-name table, followed by fixed-size alignment records sorted by
//! `(seqid, pos >> 1)`. All integers are little-endian.
//!
//! Record wire layout (120 bytes):
//!
//! | field      | size | notes                                     |
//! |------------|------|-------------------------------------------|
//! | `seq`      | 64   | base in high 2 bits, quality in low 6     |
//! | `size`     | 1    | read length in bases                      |
//! | `map_qual` | 1    | mapping quality                           |
//! | `info1..alt_qual` | 6 | aligner bookkeeping, carried through  |
//! | `seqid`    | 4    | contig index into the header name table   |
//! | `pos`      | 4    | strand in bit 0, position in bits 1..31   |
//! | `dist`     | 4    | signed pair distance                      |
//! | `name`     | 36   | NUL-padded read identifier                |
//!
//! A zero `seq` byte is an ambiguous call (N).

use crate::error::{MaqError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::MultiGzDecoder;
use log::warn;
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

/// Compile-time cap on read length.
pub const MAX_READLEN: usize = 64;

/// Cap on read-identifier length, NUL padding included.
pub const MAX_NAMELEN: usize = 36;

/// Header magic for the current map format.
pub const MAP_FORMAT: i32 = -1;

/// On-disk size of one alignment record.
pub const RECORD_SIZE: usize = MAX_READLEN + 8 + 4 + 4 + 4 + MAX_NAMELEN;

const LC_BASES: [u8; 4] = *b"acgt";

/// One aligned short read.
#[derive(Debug, Clone, Copy)]
pub struct MapRecord {
    /// Packed per-base bytes: `(base << 6) | quality`, zero for N.
    pub seq: [u8; MAX_READLEN],
    pub size: u8,
    pub map_qual: u8,
    pub info1: u8,
    pub info2: u8,
    pub c: [u8; 2],
    pub flag: u8,
    pub alt_qual: u8,
    pub seqid: u32,
    /// Packed position: bit 0 is the strand, the rest the 0-based coordinate.
    pub pos: u32,
    pub dist: i32,
    pub name: [u8; MAX_NAMELEN],
}

impl Default for MapRecord {
    fn default() -> Self {
        Self {
            seq: [0; MAX_READLEN],
            size: 0,
            map_qual: 0,
            info1: 0,
            info2: 0,
            c: [0; 2],
            flag: 0,
            alt_qual: 0,
            seqid: 0,
            pos: 0,
            dist: 0,
            name: [0; MAX_NAMELEN],
        }
    }
}

impl MapRecord {
    /// 0-based reference position of the leftmost aligned base.
    #[inline]
    pub fn begin(&self) -> u32 {
        self.pos >> 1
    }

    /// 0-based reference position of the rightmost aligned base (inclusive).
    #[inline]
    pub fn end(&self) -> u32 {
        (self.begin() + self.size as u32).saturating_sub(1)
    }

    /// True when the read mapped to the reverse strand.
    #[inline]
    pub fn is_reverse(&self) -> bool {
        self.pos & 1 == 1
    }

    /// Read identifier up to the first NUL.
    pub fn name_str(&self) -> &str {
        let len = self.name.iter().position(|&b| b == 0).unwrap_or(MAX_NAMELEN);
        std::str::from_utf8(&self.name[..len]).unwrap_or("")
    }

    /// Lower-cased base string over a zero-padded fixed-size buffer.
    ///
    /// Ambiguous bytes map to `n`; positions past `size` stay zero, keeping
    /// byte-wise comparisons of short reads well defined.
    pub fn lc_seq(&self) -> [u8; MAX_READLEN] {
        let mut out = [0u8; MAX_READLEN];
        for (dst, &b) in out.iter_mut().zip(&self.seq[..self.size as usize]) {
            *dst = if b == 0 { b'n' } else { LC_BASES[(b >> 6) as usize & 3] };
        }
        out
    }
}

/// Decoded map-file header.
#[derive(Debug, Clone)]
pub struct MapHeader {
    pub n_mapped_reads: u64,
    ref_names: Vec<String>,
}

impl MapHeader {
    pub fn new(ref_names: Vec<String>, n_mapped_reads: u64) -> Self {
        Self {
            n_mapped_reads,
            ref_names,
        }
    }

    /// Number of contigs in the name table.
    #[inline]
    pub fn n_ref(&self) -> u32 {
        self.ref_names.len() as u32
    }

    /// Contig name for a given seqid.
    pub fn ref_name(&self, seqid: u32) -> Option<&str> {
        self.ref_names.get(seqid as usize).map(String::as_str)
    }

    pub fn ref_names(&self) -> &[String] {
        &self.ref_names
    }
}

/// Streaming reader over a decompressed map byte source.
pub struct MapReader<R: Read> {
    reader: R,
}

impl MapReader<MultiGzDecoder<BufReader<File>>> {
    /// Open a gzip-compressed map file from a path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(MultiGzDecoder::new(BufReader::with_capacity(
            256 * 1024,
            file,
        ))))
    }
}

impl<R: Read> MapReader<R> {
    /// Create a reader over any decompressed byte source.
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Decode the header. Must be called once, before the first record.
    pub fn read_header(&mut self) -> Result<MapHeader> {
        let format = self.reader.read_i32::<LittleEndian>()?;
        if format != MAP_FORMAT {
            return Err(MaqError::InvalidFormat(format!(
                "unsupported map format {} (expected {})",
                format, MAP_FORMAT
            )));
        }
        let n_ref = self.reader.read_i32::<LittleEndian>()?;
        if n_ref < 0 {
            return Err(MaqError::InvalidFormat(format!(
                "negative contig count {}",
                n_ref
            )));
        }
        let mut names = Vec::with_capacity(n_ref as usize);
        for _ in 0..n_ref {
            let len = self.reader.read_i32::<LittleEndian>()?;
            if len <= 0 {
                return Err(MaqError::InvalidFormat(format!(
                    "invalid contig name length {}",
                    len
                )));
            }
            let mut buf = vec![0u8; len as usize];
            self.reader.read_exact(&mut buf)?;
            // name length includes the trailing NUL
            while buf.last() == Some(&0) {
                buf.pop();
            }
            names.push(String::from_utf8_lossy(&buf).into_owned());
        }
        let n_mapped_reads = self.reader.read_u64::<LittleEndian>()?;
        Ok(MapHeader::new(names, n_mapped_reads))
    }

    /// Decode the next alignment record.
    ///
    /// Returns `None` at end of stream. A truncated final record is treated
    /// as end of stream and logged.
    pub fn read_record(&mut self) -> Result<Option<MapRecord>> {
        let mut buf = [0u8; RECORD_SIZE];
        let got = read_fully(&mut self.reader, &mut buf)?;
        if got == 0 {
            return Ok(None);
        }
        if got < RECORD_SIZE {
            warn!(
                "truncated alignment record ({} of {} bytes), stopping",
                got, RECORD_SIZE
            );
            return Ok(None);
        }
        Ok(Some(decode_record(&buf)))
    }
}

fn decode_record(buf: &[u8; RECORD_SIZE]) -> MapRecord {
    let mut rec = MapRecord::default();
    rec.seq.copy_from_slice(&buf[0..MAX_READLEN]);
    rec.size = buf[64];
    rec.map_qual = buf[65];
    rec.info1 = buf[66];
    rec.info2 = buf[67];
    rec.c = [buf[68], buf[69]];
    rec.flag = buf[70];
    rec.alt_qual = buf[71];
    rec.seqid = u32::from_le_bytes([buf[72], buf[73], buf[74], buf[75]]);
    rec.pos = u32::from_le_bytes([buf[76], buf[77], buf[78], buf[79]]);
    rec.dist = i32::from_le_bytes([buf[80], buf[81], buf[82], buf[83]]);
    rec.name.copy_from_slice(&buf[84..84 + MAX_NAMELEN]);
    rec
}

/// Read until the buffer is full or the source is exhausted.
fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

/// Encode a header. Used to build map files programmatically.
pub fn write_header<W: Write>(writer: &mut W, header: &MapHeader) -> io::Result<()> {
    writer.write_i32::<LittleEndian>(MAP_FORMAT)?;
    writer.write_i32::<LittleEndian>(header.n_ref() as i32)?;
    for name in header.ref_names() {
        writer.write_i32::<LittleEndian>(name.len() as i32 + 1)?;
        writer.write_all(name.as_bytes())?;
        writer.write_all(&[0])?;
    }
    writer.write_u64::<LittleEndian>(header.n_mapped_reads)?;
    Ok(())
}

/// Encode one alignment record.
pub fn write_record<W: Write>(writer: &mut W, rec: &MapRecord) -> io::Result<()> {
    writer.write_all(&rec.seq)?;
    writer.write_all(&[
        rec.size,
        rec.map_qual,
        rec.info1,
        rec.info2,
        rec.c[0],
        rec.c[1],
        rec.flag,
        rec.alt_qual,
    ])?;
    writer.write_u32::<LittleEndian>(rec.seqid)?;
    writer.write_u32::<LittleEndian>(rec.pos)?;
    writer.write_i32::<LittleEndian>(rec.dist)?;
    writer.write_all(&rec.name)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> MapRecord {
        let mut rec = MapRecord {
            size: 10,
            map_qual: 40,
            seqid: 2,
            pos: (1234 << 1) | 1,
            dist: -5,
            ..MapRecord::default()
        };
        for i in 0..10 {
            rec.seq[i] = ((i as u8 % 4) << 6) | 30;
        }
        rec.name[..4].copy_from_slice(b"r001");
        rec
    }

    #[test]
    fn test_header_codec() {
        let header = MapHeader::new(vec!["c1".into(), "c2".into()], 7);
        let mut buf = Vec::new();
        write_header(&mut buf, &header).unwrap();

        let mut reader = MapReader::new(buf.as_slice());
        let decoded = reader.read_header().unwrap();
        assert_eq!(decoded.n_ref(), 2);
        assert_eq!(decoded.ref_name(0), Some("c1"));
        assert_eq!(decoded.ref_name(1), Some("c2"));
        assert_eq!(decoded.ref_name(2), None);
        assert_eq!(decoded.n_mapped_reads, 7);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&3i32.to_le_bytes());
        let mut reader = MapReader::new(buf.as_slice());
        assert!(reader.read_header().is_err());
    }

    #[test]
    fn test_record_codec() {
        let rec = sample_record();
        let mut buf = Vec::new();
        write_record(&mut buf, &rec).unwrap();
        assert_eq!(buf.len(), RECORD_SIZE);

        let mut reader = MapReader::new(buf.as_slice());
        let decoded = reader.read_record().unwrap().unwrap();
        assert_eq!(decoded.seqid, 2);
        assert_eq!(decoded.pos, (1234 << 1) | 1);
        assert_eq!(decoded.begin(), 1234);
        assert_eq!(decoded.end(), 1243);
        assert!(decoded.is_reverse());
        assert_eq!(decoded.dist, -5);
        assert_eq!(decoded.name_str(), "r001");
        assert!(reader.read_record().unwrap().is_none());
    }

    #[test]
    fn test_truncated_record_is_end_of_stream() {
        let rec = sample_record();
        let mut buf = Vec::new();
        write_record(&mut buf, &rec).unwrap();
        buf.truncate(RECORD_SIZE - 10);

        let mut reader = MapReader::new(buf.as_slice());
        assert!(reader.read_record().unwrap().is_none());
    }

    #[test]
    fn test_lc_seq_zero_padded() {
        let mut rec = MapRecord {
            size: 4,
            ..MapRecord::default()
        };
        rec.seq[0] = 0 << 6 | 20; // A
        rec.seq[1] = 1 << 6 | 20; // C
        rec.seq[2] = 0; // ambiguous
        rec.seq[3] = 3 << 6 | 20; // T
        let lc = rec.lc_seq();
        assert_eq!(&lc[..4], b"acnt");
        assert!(lc[4..].iter().all(|&b| b == 0));
    }
}
