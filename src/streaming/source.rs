//! Record sources with one-slot look-ahead.
//!
//! Both sources deliver records for one chromosome at a time: once the next
//! record belongs to a different contig it is parked in the look-ahead slot
//! and the source reports end-of-stream. The synchroniser later re-arms the
//! source on the new contig via [`AlignmentSource::skip_to_next_seqid`] /
//! [`SiteSource::skip_to_next_seqid`], which release the parked record
//! first. The slot replaces the file-pointer rewinds of older map tooling.

use crate::error::Result;
use crate::map::{MapReader, MapRecord};
use crate::site::{parse_site_fields, ContigTable, SiteRecord};
use crate::streaming::parsing::should_skip_line;
use log::{debug, warn};
use std::io::{BufRead, BufReader, Read};

/// Alignment stream gated to the current chromosome.
pub struct AlignmentSource<R: Read> {
    reader: MapReader<R>,
    pending: Option<MapRecord>,
    current_seqid: u32,
    qual_cutoff: u8,
    records_seen: usize,
}

impl<R: Read> AlignmentSource<R> {
    /// Wrap a map reader whose header has already been consumed.
    pub fn new(reader: MapReader<R>, qual_cutoff: u8) -> Self {
        Self {
            reader,
            pending: None,
            current_seqid: 0,
            qual_cutoff,
            records_seen: 0,
        }
    }

    /// Look at the first record and adopt its contig. Returns false on an
    /// empty stream.
    pub fn prime(&mut self) -> Result<bool> {
        if self.pending.is_none() {
            self.pending = self.read_raw()?;
        }
        match &self.pending {
            Some(rec) => {
                self.current_seqid = rec.seqid;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    #[inline]
    pub fn current_seqid(&self) -> u32 {
        self.current_seqid
    }

    /// Total records pulled from the underlying reader.
    pub fn records_seen(&self) -> usize {
        self.records_seen
    }

    /// Next record on the current chromosome, or `None` once the stream
    /// moves to another contig (the record is parked) or is exhausted.
    ///
    /// Records below the mapping-quality cut-off have their position zeroed
    /// so they sort to the far left of the window and are promptly evicted.
    pub fn next_record(&mut self) -> Result<Option<MapRecord>> {
        let mut rec = match self.pending.take() {
            Some(rec) => rec,
            None => match self.read_raw()? {
                Some(rec) => rec,
                None => return Ok(None),
            },
        };
        if rec.seqid != self.current_seqid {
            debug!(
                "alignment stream reached contig {} while on {}",
                rec.seqid, self.current_seqid
            );
            self.pending = Some(rec);
            return Ok(None);
        }
        if rec.map_qual < self.qual_cutoff {
            rec.pos = 0;
        }
        Ok(Some(rec))
    }

    /// Discard records until one with a strictly greater seqid appears,
    /// park it, and adopt its contig. `None` when the stream is exhausted.
    pub fn skip_to_next_seqid(&mut self) -> Result<Option<u32>> {
        let cur = self.current_seqid;
        loop {
            let rec = match self.pending.take() {
                Some(rec) => rec,
                None => match self.read_raw()? {
                    Some(rec) => rec,
                    None => return Ok(None),
                },
            };
            if rec.seqid > cur {
                self.current_seqid = rec.seqid;
                self.pending = Some(rec);
                return Ok(Some(self.current_seqid));
            }
        }
    }

    fn read_raw(&mut self) -> Result<Option<MapRecord>> {
        let rec = self.reader.read_record()?;
        if rec.is_some() {
            self.records_seen += 1;
        }
        Ok(rec)
    }
}

/// Site stream gated to the current chromosome.
pub struct SiteSource<R: Read> {
    reader: BufReader<R>,
    table: ContigTable,
    pending: Option<SiteRecord>,
    current_seqid: u32,
    line_number: usize,
    buffer: String,
}

impl<R: Read> SiteSource<R> {
    pub fn new(reader: R, table: ContigTable) -> Self {
        Self {
            reader: BufReader::new(reader),
            table,
            pending: None,
            current_seqid: 0,
            line_number: 0,
            buffer: String::with_capacity(1024),
        }
    }

    /// Look at the first usable site and adopt its contig. Returns false
    /// when the file holds no usable sites.
    pub fn prime(&mut self) -> Result<bool> {
        if self.pending.is_none() {
            self.pending = self.read_site()?;
        }
        match &self.pending {
            Some(site) => {
                self.current_seqid = site.seqid;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    #[inline]
    pub fn current_seqid(&self) -> u32 {
        self.current_seqid
    }

    /// Next site on the current chromosome; `None` parks the overshooting
    /// site for the synchroniser.
    pub fn next_site(&mut self) -> Result<Option<SiteRecord>> {
        let site = match self.pending.take() {
            Some(site) => site,
            None => match self.read_site()? {
                Some(site) => site,
                None => return Ok(None),
            },
        };
        if site.seqid != self.current_seqid {
            debug!(
                "site stream reached contig {} while on {}",
                site.seqid, self.current_seqid
            );
            self.pending = Some(site);
            return Ok(None);
        }
        Ok(Some(site))
    }

    /// Discard sites until one with a strictly greater seqid appears, park
    /// it, and adopt its contig. `None` when the file is exhausted.
    pub fn skip_to_next_seqid(&mut self) -> Result<Option<u32>> {
        let cur = self.current_seqid;
        loop {
            let site = match self.pending.take() {
                Some(site) => site,
                None => match self.read_site()? {
                    Some(site) => site,
                    None => return Ok(None),
                },
            };
            if site.seqid > cur {
                self.current_seqid = site.seqid;
                self.pending = Some(site);
                return Ok(Some(self.current_seqid));
            }
        }
    }

    /// Next well-formed site with a resolvable contig, independent of the
    /// chromosome gate. Malformed lines and unknown contigs are skipped
    /// with a warning.
    fn read_site(&mut self) -> Result<Option<SiteRecord>> {
        loop {
            self.buffer.clear();
            let bytes_read = self.reader.read_line(&mut self.buffer)?;
            if bytes_read == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let line = self.buffer.trim_end_matches(|c| c == '\n' || c == '\r');
            if should_skip_line(line.as_bytes()) {
                continue;
            }

            let (name, pos, var1, var2) = match parse_site_fields(line.as_bytes()) {
                Some(fields) => fields,
                None => {
                    warn!(
                        "skipping malformed site record at line {}: '{}'",
                        self.line_number, line
                    );
                    continue;
                }
            };
            if pos == 0 {
                warn!(
                    "skipping site with 1-based position 0 at line {}",
                    self.line_number
                );
                continue;
            }
            let name = String::from_utf8_lossy(name).into_owned();
            let seqid = match self.table.resolve(&name) {
                Some(seqid) => seqid,
                None => {
                    warn!(
                        "skipping site at line {}: contig '{}' not in the map header",
                        self.line_number, name
                    );
                    continue;
                }
            };

            let begin = (pos - 1) as u32;
            return Ok(Some(SiteRecord {
                name,
                begin,
                end: begin,
                seqid,
                var1,
                var2,
                line: line.to_string(),
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{write_header, write_record, MapHeader};
    use std::io::Cursor;

    fn map_bytes(records: &[MapRecord]) -> Vec<u8> {
        let header = MapHeader::new(vec!["c1".into(), "c2".into(), "c3".into()], 0);
        let mut buf = Vec::new();
        write_header(&mut buf, &header).unwrap();
        for rec in records {
            write_record(&mut buf, rec).unwrap();
        }
        buf
    }

    fn read(seqid: u32, begin: u32, size: u8, map_qual: u8) -> MapRecord {
        let mut rec = MapRecord {
            size,
            map_qual,
            seqid,
            pos: begin << 1,
            ..MapRecord::default()
        };
        for i in 0..size as usize {
            rec.seq[i] = 30; // A at quality 30
        }
        rec
    }

    fn alignment_source(records: &[MapRecord], cutoff: u8) -> AlignmentSource<Cursor<Vec<u8>>> {
        let mut reader = MapReader::new(Cursor::new(map_bytes(records)));
        reader.read_header().unwrap();
        AlignmentSource::new(reader, cutoff)
    }

    #[test]
    fn test_alignment_gate_parks_next_contig() {
        let mut source = alignment_source(
            &[read(0, 10, 10, 40), read(0, 20, 10, 40), read(1, 5, 10, 40)],
            0,
        );
        assert!(source.prime().unwrap());
        assert_eq!(source.current_seqid(), 0);

        assert_eq!(source.next_record().unwrap().unwrap().begin(), 10);
        assert_eq!(source.next_record().unwrap().unwrap().begin(), 20);
        // contig changed: gated off, record parked
        assert!(source.next_record().unwrap().is_none());
        assert!(source.next_record().unwrap().is_none());

        assert_eq!(source.skip_to_next_seqid().unwrap(), Some(1));
        assert_eq!(source.next_record().unwrap().unwrap().begin(), 5);
        assert!(source.next_record().unwrap().is_none());
        assert!(source.skip_to_next_seqid().unwrap().is_none());
    }

    #[test]
    fn test_low_quality_position_zeroed() {
        let mut source = alignment_source(&[read(0, 10, 10, 5), read(0, 20, 10, 40)], 20);
        assert!(source.prime().unwrap());
        let first = source.next_record().unwrap().unwrap();
        assert_eq!(first.pos, 0);
        let second = source.next_record().unwrap().unwrap();
        assert_eq!(second.begin(), 20);
    }

    #[test]
    fn test_empty_map_stream() {
        let mut source = alignment_source(&[], 0);
        assert!(!source.prime().unwrap());
    }

    fn site_source(text: &str) -> SiteSource<&[u8]> {
        let names: Vec<String> = vec!["c1".into(), "c2".into(), "c3".into()];
        SiteSource::new(text.as_bytes(), ContigTable::from_names(&names))
    }

    #[test]
    fn test_site_gate_and_skip() {
        let mut source = site_source("c1 5 A C\nc1 9 G T\nc3 2 T A\n");
        assert!(source.prime().unwrap());
        assert_eq!(source.current_seqid(), 0);

        let first = source.next_site().unwrap().unwrap();
        assert_eq!(first.begin, 4); // 1-based input
        assert_eq!(first.line, "c1 5 A C");
        assert_eq!(source.next_site().unwrap().unwrap().begin, 8);
        assert!(source.next_site().unwrap().is_none());

        assert_eq!(source.skip_to_next_seqid().unwrap(), Some(2));
        assert_eq!(source.next_site().unwrap().unwrap().begin, 1);
    }

    #[test]
    fn test_malformed_and_unknown_contig_lines_skipped() {
        let mut source = site_source("# header\n\nnot a record\nc9 5 A C\nc2 7 A C\n");
        assert!(source.prime().unwrap());
        assert_eq!(source.current_seqid(), 1);
        let site = source.next_site().unwrap().unwrap();
        assert_eq!(site.name, "c2");
        assert_eq!(site.begin, 6);
    }

    #[test]
    fn test_siteless_file() {
        let mut source = site_source("# only comments\n");
        assert!(!source.prime().unwrap());
    }
}
