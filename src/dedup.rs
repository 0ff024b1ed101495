//! Position-bucketed duplicate collapsing.
//!
//! Reads claimed to support the same base call are bucketed by mapped
//! position into a ring of 4 * MAX_READLEN slots. Forward reads key on the
//! packed position directly; reverse reads key on their 3' anchor,
//! `pos + 2*size - 2`. Within a bucket, a configurable comparator decides
//! whether an incoming read duplicates a survivor; the read with the
//! greater byte at `seq[MAX_READLEN - 1]` wins a duplicate pair. The
//! returned figure is the number of surviving reads.

use crate::map::{MapRecord, MAX_READLEN};

/// Number of position buckets in the ring.
pub const BUCKET_RING: usize = 4 * MAX_READLEN;

/// Duplicate-detection policy within a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DupMode {
    /// Compare lower-cased sequences over the leading (forward) or trailing
    /// (reverse) `min(size, L)` bases. Reads of different length never
    /// collapse.
    Prefix,
    /// Legacy coarse policy: any occupied bucket is a hit, keeping at most
    /// one read per bucket.
    Bucket,
}

/// Reusable duplicate counter.
pub struct DupCounter {
    buckets: Vec<Vec<MapRecord>>,
    touched: Vec<usize>,
}

impl Default for DupCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl DupCounter {
    pub fn new() -> Self {
        Self {
            buckets: (0..BUCKET_RING).map(|_| Vec::new()).collect(),
            touched: Vec::new(),
        }
    }

    /// Collapse duplicates among `reads` and return the surviving count.
    /// The counter drains itself afterwards and can be reused.
    pub fn count<'a, I>(&mut self, reads: I, prefix_len: usize, mode: DupMode) -> usize
    where
        I: IntoIterator<Item = &'a MapRecord>,
    {
        for rec in reads {
            self.insert(rec, prefix_len, mode);
        }
        let surviving = self.touched.iter().map(|&i| self.buckets[i].len()).sum();
        self.drain();
        surviving
    }

    fn insert(&mut self, rec: &MapRecord, prefix_len: usize, mode: DupMode) {
        let slot = bucket_slot(rec);
        if self.buckets[slot].is_empty() {
            self.touched.push(slot);
        }
        let hit = match mode {
            DupMode::Bucket => {
                if self.buckets[slot].is_empty() {
                    None
                } else {
                    Some(0)
                }
            }
            DupMode::Prefix => {
                let rec_lc = rec.lc_seq();
                self.buckets[slot]
                    .iter()
                    .position(|survivor| is_duplicate(survivor, rec, &rec_lc, prefix_len))
            }
        };
        match hit {
            Some(i) => {
                if rec.seq[MAX_READLEN - 1] > self.buckets[slot][i].seq[MAX_READLEN - 1] {
                    self.buckets[slot][i] = *rec;
                }
            }
            None => self.buckets[slot].push(*rec),
        }
    }

    fn drain(&mut self) {
        for &i in &self.touched {
            self.buckets[i].clear();
        }
        self.touched.clear();
    }
}

fn bucket_slot(rec: &MapRecord) -> usize {
    let pos = rec.pos as usize;
    let keyed = if rec.is_reverse() {
        (pos + 2 * rec.size as usize).saturating_sub(2)
    } else {
        pos
    };
    keyed % BUCKET_RING
}

fn is_duplicate(
    survivor: &MapRecord,
    rec: &MapRecord,
    rec_lc: &[u8; MAX_READLEN],
    prefix_len: usize,
) -> bool {
    if survivor.size != rec.size {
        return false;
    }
    let len = (rec.size as usize).min(prefix_len);
    let offset = if rec.is_reverse() {
        rec.size as usize - len
    } else {
        0
    };
    let survivor_lc = survivor.lc_seq();
    rec_lc[offset..offset + len] == survivor_lc[offset..offset + len]
}
