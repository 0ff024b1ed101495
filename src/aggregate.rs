//! Per-site allele statistics.
//!
//! The overlap callback: turns the window of reads covering a candidate
//! site into one output line. For each of the four bases it reports
//!
//! - `rc`    read count supporting the base,
//! - `urc`   count after duplicate collapse,
//! - `urc26` reads whose site position lies within the first 26 bases from
//!           the 5' end under the mapped strand,
//! - `ursc`  distinct read-sequence strings,
//! - `q`/`mq` mean (rounded) and maximum base quality,
//!
//! then emits the verbatim input line, the four 4-tuples, and per-base
//! blocks for the reference base and each IUB-expanded variant base
//! distinct from it.

use crate::bfa::RefGenome;
use crate::dedup::{DupCounter, DupMode};
use crate::error::Result;
use crate::map::{MapRecord, MAX_READLEN};
use crate::site::{base_code, iub_bases, SiteRecord};
use crate::streaming::output::TsvWriter;
use log::warn;
use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use std::io::Write;

const BASE_CHARS: [u8; 4] = *b"ACGT";

/// Settings for the allele accounting.
#[derive(Debug, Clone)]
pub struct AggregateConfig {
    /// Reads below this mapping quality are excluded from all statistics.
    pub quality_cutoff: u8,
    /// Match the complement of the called base on reverse-strand reads.
    pub complement_reverse: bool,
    pub dup_mode: DupMode,
    /// Comparison length for duplicate collapse.
    pub dedup_prefix: usize,
}

impl AggregateConfig {
    pub fn new(quality_cutoff: u8) -> Self {
        Self {
            quality_cutoff,
            complement_reverse: false,
            dup_mode: DupMode::Prefix,
            dedup_prefix: 26,
        }
    }
}

/// The overlap-engine callback target. Scratch storage is reused across
/// sites; one instance serves a whole run.
pub struct SiteAggregator<W: Write> {
    config: AggregateConfig,
    oracle: Option<RefGenome>,
    writer: TsvWriter<W>,
    filtered: Vec<usize>,
    matches: Vec<usize>,
    dedup: DupCounter,
    distinct: FxHashSet<[u8; MAX_READLEN]>,
    sites_written: usize,
}

impl<W: Write> SiteAggregator<W> {
    pub fn new(config: AggregateConfig, oracle: Option<RefGenome>, output: W) -> Self {
        Self {
            config,
            oracle,
            writer: TsvWriter::new(output),
            filtered: Vec::with_capacity(64),
            matches: Vec::with_capacity(64),
            dedup: DupCounter::new(),
            distinct: FxHashSet::default(),
            sites_written: 0,
        }
    }

    /// Annotate one site against its overlap window and emit the line.
    pub fn annotate(&mut self, site: &SiteRecord, window: &VecDeque<MapRecord>) -> Result<()> {
        self.filtered.clear();
        for (i, rec) in window.iter().enumerate() {
            if rec.map_qual >= self.config.quality_cutoff {
                self.filtered.push(i);
            }
        }
        // only begins are sorted: a held-back read at the tail may start
        // past this site
        while let Some(&i) = self.filtered.last() {
            if window[i].begin() > site.end {
                self.filtered.pop();
            } else {
                break;
            }
        }

        let mut rc = [0u32; 4];
        let mut urc = [0u32; 4];
        let mut urc26 = [0u32; 4];
        let mut ursc = [0u32; 4];
        let mut q = [0u32; 4];
        let mut mq = [0u32; 4];

        for base in 0..4u8 {
            self.matches.clear();
            for &i in &self.filtered {
                let rec = &window[i];
                let called_base = match called(rec, site.begin) {
                    Some((b, _)) => b,
                    None => continue,
                };
                let target = if self.config.complement_reverse && rec.is_reverse() {
                    base ^ 3
                } else {
                    base
                };
                if called_base == target {
                    self.matches.push(i);
                }
            }
            let b = base as usize;
            rc[b] = self.matches.len() as u32;

            let mut total = 0u64;
            for &i in &self.matches {
                if let Some((_, qual)) = called(&window[i], site.begin) {
                    total += qual as u64;
                    mq[b] = mq[b].max(qual as u32);
                }
            }
            q[b] = if self.matches.is_empty() {
                0
            } else {
                (total as f64 / self.matches.len() as f64 + 0.5) as u32
            };

            let (matches, dedup) = (&self.matches, &mut self.dedup);
            urc[b] = dedup.count(
                matches.iter().map(|&i| &window[i]),
                self.config.dedup_prefix,
                self.config.dup_mode,
            ) as u32;

            urc26[b] = self
                .matches
                .iter()
                .filter(|&&i| within_lead(&window[i], site.begin))
                .count() as u32;

            self.distinct.clear();
            for &i in &self.matches {
                self.distinct.insert(window[i].lc_seq());
            }
            ursc[b] = self.distinct.len() as u32;
        }

        let ref_code = self.reference_code(site);

        self.writer.write_bytes(site.line.as_bytes())?;
        self.writer.write_tab()?;
        self.writer.write_tuple(&rc)?;
        self.writer.write_gap()?;
        self.writer.write_tuple(&urc)?;
        self.writer.write_gap()?;
        self.writer.write_tuple(&urc26)?;
        self.writer.write_gap()?;
        self.writer.write_tuple(&ursc)?;
        self.writer.write_gap()?;

        let block = |b: usize| [rc[b], urc[b], urc26[b], ursc[b], q[b], mq[b]];
        if ref_code <= 3 {
            let b = ref_code as usize;
            self.writer.write_base_block(BASE_CHARS[b], &block(b))?;
        } else {
            // undetermined reference: every base gets its block
            for b in 0..4 {
                self.writer.write_base_block(BASE_CHARS[b], &block(b))?;
            }
        }

        let expansion = iub_bases(site.var2);
        if expansion.is_empty() {
            warn!(
                "unrecognized variant code '{}' at {} {}",
                site.var2 as char,
                site.name,
                site.begin + 1
            );
        }
        for &vb in expansion {
            if vb == ref_code {
                continue;
            }
            let b = vb as usize;
            self.writer.write_base_block(BASE_CHARS[b], &block(b))?;
        }
        self.writer.write_newline()?;
        self.sites_written += 1;
        Ok(())
    }

    fn reference_code(&mut self, site: &SiteRecord) -> u8 {
        match &mut self.oracle {
            Some(oracle) => {
                let base = oracle.base_at(site.seqid, &site.name, site.begin as u64);
                base_code(base).unwrap_or(4)
            }
            // without a reference genome the site's own reference code decides
            None => match base_code(site.var1) {
                Some(code) => code,
                None => {
                    warn!(
                        "ambiguous reference code '{}' at {} {}",
                        site.var1 as char,
                        site.name,
                        site.begin + 1
                    );
                    4
                }
            },
        }
    }

    /// Lines emitted so far.
    pub fn sites_written(&self) -> usize {
        self.sites_written
    }

    /// Reference-oracle misses so far.
    pub fn reference_misses(&self) -> usize {
        self.oracle.as_ref().map(RefGenome::misses).unwrap_or(0)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()
    }
}

/// Base code and quality called by a read at a reference position, `None`
/// when the position falls outside the read.
#[inline]
fn called(rec: &MapRecord, position: u32) -> Option<(u8, u8)> {
    let offset = position.checked_sub(rec.begin())? as usize;
    let byte = *rec.seq.get(offset)?;
    if offset >= rec.size as usize {
        return None;
    }
    Some(((byte >> 6) & 3, byte & 0x3f))
}

/// True when the position lies within the first 26 bases from the read's
/// 5' end under its mapped strand.
#[inline]
fn within_lead(rec: &MapRecord, position: u32) -> bool {
    let start = rec.begin() as i64;
    let end = start + rec.size as i64 - 1;
    let position = position as i64;
    if rec.is_reverse() {
        end - 25 <= position
    } else {
        start + 25 >= position
    }
}
