//! Error types shared across the crate.

use std::io;
use thiserror::Error;

/// Errors that can occur while reading or annotating map data.
#[derive(Error, Debug)]
pub enum MaqError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Invalid map format: {0}")]
    InvalidFormat(String),

    #[error("Contig '{0}' not present in the map header")]
    UnknownContig(String),
}

pub type Result<T> = std::result::Result<T, MaqError>;
