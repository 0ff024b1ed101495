//! Packed reference genome (`.bfa`) format and the reference-base oracle.
//!
//! A bfa file is a plain (uncompressed) sequence of contig records:
//! a length-prefixed NUL-terminated name, the contig length in bases,
//! the word count, then two parallel `u64` arrays: `seq` packs 32 bases
//! per word at 2 bits each, `mask` marks defined bases (zero mask bits
//! mean the base is undefined). Little-endian throughout.

use crate::error::{MaqError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::warn;
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

const BASES: [u8; 4] = *b"ACGT";

/// One packed reference contig.
#[derive(Debug, Clone)]
pub struct BfaRecord {
    pub name: String,
    /// Contig length in bases.
    pub ori_len: usize,
    pub seq: Vec<u64>,
    pub mask: Vec<u64>,
}

impl BfaRecord {
    /// Build a record from a plain base string; bytes outside ACGT are
    /// stored with a zero mask (undefined).
    pub fn from_bases(name: impl Into<String>, bases: &[u8]) -> Self {
        let words = (bases.len() + 31) / 32;
        let mut seq = vec![0u64; words];
        let mut mask = vec![0u64; words];
        for (i, &b) in bases.iter().enumerate() {
            let code = match b.to_ascii_uppercase() {
                b'A' => Some(0u64),
                b'C' => Some(1),
                b'G' => Some(2),
                b'T' => Some(3),
                _ => None,
            };
            let shift = 2 * (31 - (i & 31));
            if let Some(code) = code {
                seq[i >> 5] |= code << shift;
                mask[i >> 5] |= 3u64 << shift;
            }
        }
        Self {
            name: name.into(),
            ori_len: bases.len(),
            seq,
            mask,
        }
    }

    /// Base at a 0-based position: one of `ACGT`, or `N` when the position
    /// is masked out or beyond the contig.
    pub fn base_at(&self, position: u64) -> u8 {
        if position >= self.ori_len as u64 {
            return b'N';
        }
        let word = self.seq[(position >> 5) as usize];
        let mask = self.mask[(position >> 5) as usize];
        let offset = 31 - (position & 0x1f);
        if (mask >> (2 * offset)) & 3 == 0 {
            b'N'
        } else {
            BASES[((word >> (2 * offset)) & 3) as usize]
        }
    }
}

/// Streaming reader over a packed reference file.
pub struct BfaReader<R: Read> {
    reader: R,
}

impl BfaReader<BufReader<File>> {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::with_capacity(256 * 1024, file)))
    }
}

impl<R: Read> BfaReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Decode the next contig record, or `None` at end of file.
    pub fn read_record(&mut self) -> Result<Option<BfaRecord>> {
        let name_len = match self.reader.read_i32::<LittleEndian>() {
            Ok(n) => n,
            Err(ref e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if name_len <= 0 {
            return Err(MaqError::InvalidFormat(format!(
                "invalid contig name length {}",
                name_len
            )));
        }
        let mut name = vec![0u8; name_len as usize];
        self.reader.read_exact(&mut name)?;
        while name.last() == Some(&0) {
            name.pop();
        }
        let ori_len = self.reader.read_i32::<LittleEndian>()?;
        let len = self.reader.read_i32::<LittleEndian>()?;
        if ori_len < 0 || len < 0 || (len as i64) < (ori_len as i64 + 31) / 32 {
            return Err(MaqError::InvalidFormat(format!(
                "inconsistent contig lengths ({} bases, {} words)",
                ori_len, len
            )));
        }
        let mut seq = vec![0u64; len as usize];
        let mut mask = vec![0u64; len as usize];
        for word in seq.iter_mut() {
            *word = self.reader.read_u64::<LittleEndian>()?;
        }
        for word in mask.iter_mut() {
            *word = self.reader.read_u64::<LittleEndian>()?;
        }
        Ok(Some(BfaRecord {
            name: String::from_utf8_lossy(&name).into_owned(),
            ori_len: ori_len as usize,
            seq,
            mask,
        }))
    }
}

/// Encode one contig record. Used to build reference files programmatically.
pub fn write_record<W: Write>(writer: &mut W, rec: &BfaRecord) -> io::Result<()> {
    writer.write_i32::<LittleEndian>(rec.name.len() as i32 + 1)?;
    writer.write_all(rec.name.as_bytes())?;
    writer.write_all(&[0])?;
    writer.write_i32::<LittleEndian>(rec.ori_len as i32)?;
    writer.write_i32::<LittleEndian>(rec.seq.len() as i32)?;
    for &word in &rec.seq {
        writer.write_u64::<LittleEndian>(word)?;
    }
    for &word in &rec.mask {
        writer.write_u64::<LittleEndian>(word)?;
    }
    Ok(())
}

/// Reference-base oracle over a packed reference file.
///
/// Caches the most recently used contig, keyed by seqid. The file is
/// scanned forward only, which matches inputs laid out in the same contig
/// order as the map header. A contig that cannot be found yields `N` for
/// every lookup and is counted as a miss.
pub struct RefGenome {
    reader: BfaReader<BufReader<File>>,
    cached: Option<BfaRecord>,
    cached_seqid: Option<u32>,
    misses: usize,
}

impl RefGenome {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            reader: BfaReader::from_path(path)?,
            cached: None,
            cached_seqid: None,
            misses: 0,
        })
    }

    /// Reference base for `(seqid, name, position)`: one of `ACGTN`.
    pub fn base_at(&mut self, seqid: u32, name: &str, position: u64) -> u8 {
        if self.cached_seqid != Some(seqid) {
            self.load_contig(seqid, name);
        }
        match &self.cached {
            Some(contig) => contig.base_at(position),
            None => b'N',
        }
    }

    fn load_contig(&mut self, seqid: u32, name: &str) {
        self.cached = None;
        self.cached_seqid = Some(seqid);
        loop {
            match self.reader.read_record() {
                Ok(Some(contig)) => {
                    if contig.name == name {
                        self.cached = Some(contig);
                        return;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("error reading reference genome: {}", e);
                    break;
                }
            }
        }
        self.misses += 1;
        warn!("could not find contig '{}' in the reference genome", name);
    }

    /// Number of contigs that could not be resolved.
    pub fn misses(&self) -> usize {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_base_extraction() {
        let contig = BfaRecord::from_bases("c1", b"ACGTNACGT");
        assert_eq!(contig.base_at(0), b'A');
        assert_eq!(contig.base_at(1), b'C');
        assert_eq!(contig.base_at(2), b'G');
        assert_eq!(contig.base_at(3), b'T');
        assert_eq!(contig.base_at(4), b'N'); // masked out
        assert_eq!(contig.base_at(5), b'A');
        assert_eq!(contig.base_at(8), b'T');
        assert_eq!(contig.base_at(9), b'N'); // past the end
    }

    #[test]
    fn test_base_extraction_across_words() {
        let bases: Vec<u8> = (0..70).map(|i| BASES[i % 4]).collect();
        let contig = BfaRecord::from_bases("c1", &bases);
        for (i, &b) in bases.iter().enumerate() {
            assert_eq!(contig.base_at(i as u64), b, "position {}", i);
        }
    }

    #[test]
    fn test_record_codec() {
        let contig = BfaRecord::from_bases("chr7", b"ACGTACGTACGT");
        let mut buf = Vec::new();
        write_record(&mut buf, &contig).unwrap();

        let mut reader = BfaReader::new(buf.as_slice());
        let decoded = reader.read_record().unwrap().unwrap();
        assert_eq!(decoded.name, "chr7");
        assert_eq!(decoded.ori_len, 12);
        assert_eq!(decoded.base_at(5), b'C');
        assert!(reader.read_record().unwrap().is_none());
    }

    #[test]
    fn test_oracle_cache_and_miss() {
        let mut file = NamedTempFile::new().unwrap();
        write_record(&mut file, &BfaRecord::from_bases("c1", b"AAAA")).unwrap();
        write_record(&mut file, &BfaRecord::from_bases("c2", b"CCCC")).unwrap();
        file.flush().unwrap();

        let mut oracle = RefGenome::open(file.path()).unwrap();
        assert_eq!(oracle.base_at(0, "c1", 0), b'A');
        assert_eq!(oracle.base_at(0, "c1", 3), b'A');
        assert_eq!(oracle.base_at(1, "c2", 1), b'C');
        // forward-only scan: an absent contig is a recorded miss
        assert_eq!(oracle.base_at(2, "c9", 0), b'N');
        assert_eq!(oracle.misses(), 1);
    }
}
