//! Sliding-window overlap engine.
//!
//! Joins two coordinate-sorted streams on one chromosome: for every site it
//! maintains the window of alignment records whose inclusive interval
//! `[begin, end]` touches the site's interval, then fires a callback once
//! per site with the window contents.
//!
//! # Algorithm
//!
//! For each site v:
//! 1. Evict window entries that ended before `v.begin`. Only entries with
//!    `begin < v.begin` are candidates; long reads spanning v among them
//!    stay put, so the scan removes from the middle, not just the front.
//! 2. Load reads until one begins past `v.end`; that read is held back and
//!    appended only after the callback, so the next site sees it.
//! 3. Fire the callback.
//!
//! Because only `begin` is guaranteed sorted, a held-back read can sit at
//! the window tail without overlapping the following site; consumers trim
//! trailing entries whose `begin` exceeds the active site's `end`.
//!
//! # Memory
//!
//! O(k) where k is the deepest read pile-up. The window is a growable
//! deque seeded with a few read-lengths of capacity.

use crate::error::Result;
use crate::map::{MapRecord, MAX_READLEN};
use crate::site::SiteRecord;
use crate::streaming::source::{AlignmentSource, SiteSource};
use std::collections::VecDeque;
use std::io::Read;

/// Streaming overlap join between a site source and an alignment source.
pub struct OverlapEngine {
    window: VecDeque<MapRecord>,
    max_window: usize,
}

impl Default for OverlapEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl OverlapEngine {
    pub fn new() -> Self {
        Self {
            window: VecDeque::with_capacity(4 * MAX_READLEN),
            max_window: 0,
        }
    }

    /// Largest window observed at callback time, across all chromosomes.
    pub fn max_window(&self) -> usize {
        self.max_window
    }

    /// Run the join over the current chromosome of both sources.
    ///
    /// Fires `on_site` exactly once per site, in input order. Returns when
    /// the site source is exhausted for this chromosome; the window is
    /// dropped, not flushed.
    pub fn run_chromosome<R, S, F>(
        &mut self,
        sites: &mut SiteSource<S>,
        reads: &mut AlignmentSource<R>,
        mut on_site: F,
    ) -> Result<()>
    where
        R: Read,
        S: Read,
        F: FnMut(&SiteRecord, &VecDeque<MapRecord>) -> Result<()>,
    {
        self.window.clear();
        while let Some(site) = sites.next_site()? {
            self.evict_before(site.begin);

            let mut held_back = None;
            let tail_past = self
                .window
                .back()
                .map(|r| r.begin() > site.end)
                .unwrap_or(false);
            if !tail_past {
                while let Some(rec) = reads.next_record()? {
                    if rec.end() < site.begin {
                        continue;
                    }
                    if rec.begin() <= site.end {
                        self.window.push_back(rec);
                        continue;
                    }
                    held_back = Some(rec);
                    break;
                }
            }

            self.max_window = self.max_window.max(self.window.len());
            on_site(&site, &self.window)?;

            if let Some(rec) = held_back {
                self.window.push_back(rec);
            }
        }
        Ok(())
    }

    /// Remove entries that can no longer overlap a site starting at
    /// `site_begin`. Entries are begin-sorted, so the scan stops at the
    /// first entry starting at or past the site.
    fn evict_before(&mut self, site_begin: u32) {
        let mut i = 0;
        while i < self.window.len() && self.window[i].begin() < site_begin {
            if self.window[i].end() < site_begin {
                self.window.remove(i);
            } else {
                i += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{write_header, write_record, MapHeader, MapReader};
    use crate::site::ContigTable;
    use std::io::Cursor;

    fn read(begin: u32, size: u8) -> MapRecord {
        let mut rec = MapRecord {
            size,
            map_qual: 60,
            seqid: 0,
            pos: begin << 1,
            ..MapRecord::default()
        };
        for i in 0..size as usize {
            rec.seq[i] = 30;
        }
        rec
    }

    fn sources(
        records: &[MapRecord],
        site_text: &str,
    ) -> (SiteSource<Cursor<Vec<u8>>>, AlignmentSource<Cursor<Vec<u8>>>) {
        let header = MapHeader::new(vec!["c1".into()], records.len() as u64);
        let mut buf = Vec::new();
        write_header(&mut buf, &header).unwrap();
        for rec in records {
            write_record(&mut buf, rec).unwrap();
        }
        let mut reader = MapReader::new(Cursor::new(buf));
        reader.read_header().unwrap();
        let mut reads = AlignmentSource::new(reader, 0);
        assert!(reads.prime().unwrap());

        let table = ContigTable::from_names(&["c1".to_string()]);
        let mut sites = SiteSource::new(Cursor::new(site_text.as_bytes().to_vec()), table);
        assert!(sites.prime().unwrap());
        (sites, reads)
    }

    fn collect_windows(
        records: &[MapRecord],
        site_text: &str,
    ) -> Vec<(u32, Vec<(u32, u32)>)> {
        let (mut sites, mut reads) = sources(records, site_text);
        let mut engine = OverlapEngine::new();
        let mut seen = Vec::new();
        engine
            .run_chromosome(&mut sites, &mut reads, |site, window| {
                seen.push((
                    site.begin,
                    window.iter().map(|r| (r.begin(), r.end())).collect(),
                ));
                Ok(())
            })
            .unwrap();
        seen
    }

    #[test]
    fn test_single_overlap() {
        // reads cover [0,9] and [5,14]; the site at 2 touches only the first
        let windows = collect_windows(&[read(0, 10), read(5, 10)], "c1 3 A C\n");
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].0, 2);
        assert_eq!(windows[0].1, vec![(0, 9)]);
    }

    #[test]
    fn test_eviction_between_sites() {
        let windows = collect_windows(&[read(0, 10), read(20, 10)], "c1 6 A C\nc1 26 A C\n");
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].1, vec![(0, 9)]);
        assert_eq!(windows[1].1, vec![(20, 29)]);
    }

    #[test]
    fn test_inclusive_boundaries() {
        // read [10,19]: sites at both interval ends are still overlaps
        let at_end = collect_windows(&[read(10, 10)], "c1 20 A C\n");
        assert_eq!(at_end[0].1, vec![(10, 19)]);
        let at_begin = collect_windows(&[read(10, 10)], "c1 11 A C\n");
        assert_eq!(at_begin[0].1, vec![(10, 19)]);
        let past = collect_windows(&[read(10, 10)], "c1 21 A C\n");
        assert!(past[0].1.is_empty());
    }

    #[test]
    fn test_long_read_survives_mid_window_eviction() {
        // the long read spans both sites; the short one between must go
        let windows = collect_windows(
            &[read(0, 60), read(2, 4), read(30, 10)],
            "c1 4 A C\nc1 36 A C\n",
        );
        assert_eq!(windows[0].1, vec![(0, 59), (2, 5)]);
        assert_eq!(windows[1].1, vec![(0, 59), (30, 39)]);
    }

    #[test]
    fn test_held_back_read_joins_next_window() {
        let windows = collect_windows(&[read(0, 10), read(12, 10)], "c1 6 A C\nc1 16 A C\n");
        // read at 12 begins past site 5, is held back, then serves site 15
        assert_eq!(windows[0].1, vec![(0, 9)]);
        assert_eq!(windows[1].1, vec![(12, 21)]);
    }

    #[test]
    fn test_callback_order_and_count() {
        let windows = collect_windows(
            &[read(0, 10)],
            "c1 2 A C\nc1 4 A C\nc1 6 A C\n",
        );
        let begins: Vec<u32> = windows.iter().map(|w| w.0).collect();
        assert_eq!(begins, vec![1, 3, 5]);
    }

    #[test]
    fn test_window_high_water_mark() {
        let (mut sites, mut reads) = sources(
            &[read(0, 20), read(2, 20), read(4, 20)],
            "c1 10 A C\nc1 40 A C\n",
        );
        let mut engine = OverlapEngine::new();
        engine
            .run_chromosome(&mut sites, &mut reads, |_, _| Ok(()))
            .unwrap();
        assert_eq!(engine.max_window(), 3);
    }
}
