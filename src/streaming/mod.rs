//! Streaming machinery for the annotation pipeline.
//!
//! - Whitespace field parsing without allocation
//! - Chromosome-gated record sources with one-slot look-ahead
//! - The sliding-window overlap engine
//! - The chromosome synchroniser
//! - Buffered TSV output

pub mod output;
pub mod overlap;
pub mod parsing;
pub mod source;
pub mod sync;

pub use output::TsvWriter;
pub use overlap::OverlapEngine;
pub use parsing::{parse_u64_fast, should_skip_line, split_fields};
pub use source::{AlignmentSource, SiteSource};
pub use sync::ChromSync;
