// Clippy allows for the whole crate
#![allow(clippy::too_many_arguments)]

//! maqval: per-allele read-support annotation for candidate SNV sites.
//!
//! Joins a coordinate-sorted stream of short-read alignments (MAQ `.map`
//! format) against a sorted list of candidate variant sites and reports,
//! per site and per base, the read count, the duplicate-collapsed count,
//! the leading-window count, the distinct-sequence count, and base-quality
//! statistics.
//!
//! # Features
//!
//! - **Streaming**: one pass over both inputs with O(pile-up) memory
//! - **Chromosome synchronisation**: the two streams are kept on a common
//!   contig, skipping contigs present on only one side
//! - **Duplicate collapse**: position-bucketed with a sequence-prefix
//!   comparator (a coarse legacy mode is selectable)
//!
//! # Example
//!
//! ```rust,no_run
//! use maqval::annotate::AnnotateCommand;
//!
//! let cmd = AnnotateCommand::new(30);
//! let mut out = std::io::stdout();
//! let stats = cmd.run("reads.map", "sites.tsv", &mut out).unwrap();
//! eprintln!("{}", stats);
//! ```

pub mod aggregate;
pub mod annotate;
pub mod bfa;
pub mod dedup;
pub mod error;
pub mod map;
pub mod site;
pub mod streaming;

// Re-export commonly used types
pub use annotate::{AnnotateCommand, AnnotateStats};
pub use error::{MaqError, Result};
pub use map::{MapHeader, MapReader, MapRecord, MAX_READLEN};
pub use site::{ContigTable, SiteRecord};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::annotate::{AnnotateCommand, AnnotateStats};
    pub use crate::dedup::{DupCounter, DupMode};
    pub use crate::error::{MaqError, Result};
    pub use crate::map::{MapHeader, MapReader, MapRecord};
    pub use crate::site::{ContigTable, SiteRecord};
    pub use crate::streaming::{AlignmentSource, ChromSync, OverlapEngine, SiteSource};
}
