//! Chromosome synchroniser.
//!
//! Keeps the alignment and site sources on the same contig. While the two
//! current seqids differ, the source on the lower contig consumes records
//! until one with a strictly greater seqid appears; that record is parked
//! in the source's look-ahead slot so it is the first one emitted on the
//! next round.

use crate::error::Result;
use crate::streaming::source::{AlignmentSource, SiteSource};
use std::cmp::Ordering;
use std::io::Read;

pub struct ChromSync {
    n_ref: u32,
}

impl ChromSync {
    pub fn new(n_ref: u32) -> Self {
        Self { n_ref }
    }

    /// Align the primed sources on their first common contig.
    ///
    /// Returns false when either source runs out before a common contig is
    /// found, or a seqid lands past the contig table.
    pub fn init<R: Read, S: Read>(
        &self,
        reads: &mut AlignmentSource<R>,
        sites: &mut SiteSource<S>,
    ) -> Result<bool> {
        self.align(reads, sites)
    }

    /// Move on after a finished contig: push the alignment stream past it,
    /// then re-align. Returns false once either stream is exhausted.
    pub fn advance<R: Read, S: Read>(
        &self,
        reads: &mut AlignmentSource<R>,
        sites: &mut SiteSource<S>,
    ) -> Result<bool> {
        if reads.skip_to_next_seqid()?.is_none() {
            return Ok(false);
        }
        if reads.current_seqid() >= self.n_ref {
            return Ok(false);
        }
        self.align(reads, sites)
    }

    fn align<R: Read, S: Read>(
        &self,
        reads: &mut AlignmentSource<R>,
        sites: &mut SiteSource<S>,
    ) -> Result<bool> {
        loop {
            match reads.current_seqid().cmp(&sites.current_seqid()) {
                Ordering::Equal => return Ok(true),
                Ordering::Less => {
                    if reads.skip_to_next_seqid()?.is_none() {
                        return Ok(false);
                    }
                    if reads.current_seqid() >= self.n_ref {
                        return Ok(false);
                    }
                }
                Ordering::Greater => {
                    if sites.skip_to_next_seqid()?.is_none() {
                        return Ok(false);
                    }
                    if sites.current_seqid() >= self.n_ref {
                        return Ok(false);
                    }
                }
            }
        }
    }
}
