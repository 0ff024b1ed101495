//! Candidate variant sites and the contig-name table.
//!
//! Sites arrive as whitespace-separated text lines, `name pos var1 var2`,
//! with a 1-based position and IUB base codes. The verbatim line is kept
//! for pass-through to the output.

use crate::streaming::parsing::{parse_u64_fast, split_fields};
use rustc_hash::FxHashMap;

/// One candidate SNV site.
#[derive(Debug, Clone)]
pub struct SiteRecord {
    pub name: String,
    /// 0-based position of the site.
    pub begin: u32,
    /// Equal to `begin` for SNVs.
    pub end: u32,
    /// Contig index resolved against the map header.
    pub seqid: u32,
    /// Reference base, IUB code.
    pub var1: u8,
    /// Variant base, IUB code.
    pub var2: u8,
    /// Verbatim input line, newline stripped.
    pub line: String,
}

/// Parse the four leading fields of a site line.
///
/// Returns `(name, pos, var1, var2)` with `pos` still 1-based, or `None`
/// when the line does not have four usable fields.
pub fn parse_site_fields(line: &[u8]) -> Option<(&[u8], u64, u8, u8)> {
    let mut fields = split_fields(line);
    let name = fields.next()?;
    let pos = parse_u64_fast(fields.next()?)?;
    let var1 = single_char(fields.next()?)?;
    let var2 = single_char(fields.next()?)?;
    Some((name, pos, var1, var2))
}

fn single_char(field: &[u8]) -> Option<u8> {
    if field.len() == 1 {
        Some(field[0])
    } else {
        None
    }
}

/// Base code (0..3) for an unambiguous base, 4 for N, `None` otherwise.
pub fn base_code(base: u8) -> Option<u8> {
    match base.to_ascii_lowercase() {
        b'a' => Some(0),
        b'c' => Some(1),
        b'g' => Some(2),
        b't' => Some(3),
        b'n' => Some(4),
        _ => None,
    }
}

/// Expand an IUB code into base codes, in the emission order of the
/// original table. Unrecognized codes expand to nothing.
pub fn iub_bases(code: u8) -> &'static [u8] {
    match code.to_ascii_uppercase() {
        b'A' => &[0],
        b'C' => &[1],
        b'G' => &[2],
        b'T' => &[3],
        b'M' => &[0, 1],
        b'K' => &[2, 3],
        b'Y' => &[1, 3],
        b'R' => &[0, 2],
        b'W' => &[0, 3],
        b'S' => &[2, 1],
        b'D' => &[0, 2, 3],
        b'B' => &[1, 2, 3],
        b'H' => &[0, 1, 3],
        b'V' => &[0, 1, 2],
        b'N' => &[0, 1, 2, 3],
        _ => &[],
    }
}

/// Contig-name table from the map header, with a last-resolved cache.
#[derive(Debug, Clone, Default)]
pub struct ContigTable {
    index: FxHashMap<String, u32>,
    names: Vec<String>,
    last: Option<(String, u32)>,
}

impl ContigTable {
    pub fn from_names(names: &[String]) -> Self {
        let index = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i as u32))
            .collect();
        Self {
            index,
            names: names.to_vec(),
            last: None,
        }
    }

    /// Resolve a contig name to its seqid.
    pub fn resolve(&mut self, name: &str) -> Option<u32> {
        if let Some((cached, seqid)) = &self.last {
            if cached == name {
                return Some(*seqid);
            }
        }
        let seqid = self.index.get(name).copied()?;
        self.last = Some((name.to_string(), seqid));
        Some(seqid)
    }

    pub fn name(&self, seqid: u32) -> Option<&str> {
        self.names.get(seqid as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
