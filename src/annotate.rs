//! The annotation driver: wires the sources, the synchroniser, the overlap
//! engine, and the aggregator into one run.

use crate::aggregate::{AggregateConfig, SiteAggregator};
use crate::bfa::RefGenome;
use crate::dedup::DupMode;
use crate::error::{MaqError, Result};
use crate::map::MapReader;
use crate::site::ContigTable;
use crate::streaming::{AlignmentSource, ChromSync, OverlapEngine, SiteSource};
use log::{info, warn};
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// One full annotation run over a map file and a site list.
#[derive(Debug, Clone)]
pub struct AnnotateCommand {
    /// Reads below this mapping quality contribute to no statistics.
    pub quality_cutoff: u8,
    /// Packed reference genome; without it the reference column falls back
    /// to the site's own reference code.
    pub ref_genome: Option<PathBuf>,
    /// Match the complement of the called base on reverse-strand reads.
    pub complement_reverse: bool,
    pub dup_mode: DupMode,
    /// Comparison length for duplicate collapse.
    pub dedup_prefix: usize,
}

impl AnnotateCommand {
    pub fn new(quality_cutoff: u8) -> Self {
        Self {
            quality_cutoff,
            ref_genome: None,
            complement_reverse: false,
            dup_mode: DupMode::Prefix,
            dedup_prefix: 26,
        }
    }

    /// Annotate every site against the map file, writing one line per site.
    pub fn run<P: AsRef<Path>, W: Write>(
        &self,
        map_path: P,
        site_path: P,
        output: &mut W,
    ) -> Result<AnnotateStats> {
        let mut map_reader = MapReader::from_path(map_path.as_ref())?;
        let header = map_reader.read_header()?;
        info!(
            "map header: {} contigs, {} mapped reads",
            header.n_ref(),
            header.n_mapped_reads
        );

        let table = ContigTable::from_names(header.ref_names());
        let site_file = File::open(site_path.as_ref())?;

        let oracle = match &self.ref_genome {
            Some(path) => Some(RefGenome::open(path)?),
            None => None,
        };

        let mut reads = AlignmentSource::new(map_reader, self.quality_cutoff);
        let mut sites = SiteSource::new(site_file, table);
        let mut engine = OverlapEngine::new();

        let mut config = AggregateConfig::new(self.quality_cutoff);
        config.complement_reverse = self.complement_reverse;
        config.dup_mode = self.dup_mode;
        config.dedup_prefix = self.dedup_prefix;
        let mut aggregator = SiteAggregator::new(config, oracle, output);

        let mut stats = AnnotateStats::default();

        if !reads.prime()? {
            return Err(MaqError::InvalidFormat(
                "map file contains no alignment records".to_string(),
            ));
        }
        if !sites.prime()? {
            warn!("site file contains no usable records");
            aggregator.flush()?;
            return Ok(stats);
        }

        let sync = ChromSync::new(header.n_ref());
        if !sync.init(&mut reads, &mut sites)? {
            warn!("alignments and sites share no contig");
            aggregator.flush()?;
            return Ok(stats);
        }

        loop {
            let contig = header
                .ref_name(reads.current_seqid())
                .unwrap_or("<unknown>");
            info!("annotating contig {}", contig);
            stats.contigs += 1;

            engine.run_chromosome(&mut sites, &mut reads, |site, window| {
                aggregator.annotate(site, window)
            })?;

            if !sync.advance(&mut reads, &mut sites)? {
                break;
            }
        }

        aggregator.flush()?;
        stats.sites = aggregator.sites_written();
        stats.reference_misses = aggregator.reference_misses();
        stats.reads = reads.records_seen();
        stats.max_window = engine.max_window();
        Ok(stats)
    }
}

/// Run statistics, printed to stderr under `--stats`.
#[derive(Debug, Default, Clone)]
pub struct AnnotateStats {
    /// Contigs that reached the overlap engine.
    pub contigs: usize,
    /// Output lines emitted.
    pub sites: usize,
    /// Alignment records pulled from the map file.
    pub reads: usize,
    /// Window high-water mark.
    pub max_window: usize,
    /// Contigs the reference oracle failed to resolve.
    pub reference_misses: usize,
}

impl fmt::Display for AnnotateStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Contigs: {}, Sites: {}, Reads: {}, Max window: {}, Reference misses: {}",
            self.contigs, self.sites, self.reads, self.max_window, self.reference_misses
        )
    }
}
