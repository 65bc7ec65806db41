//! FASTA reading and writing, plus small sequence helpers.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::error::{GenomirrorError, ParseError, Result};

/// Residues per FASTA line.
pub const LINE_WIDTH: usize = 60;

/// Read every sequence of a FASTA file (optionally gzipped), keyed by the
/// first token of its header.
pub fn read_fasta(path: &Path) -> Result<HashMap<String, Vec<u8>>> {
    let file = File::open(path).map_err(|e| GenomirrorError::io(path, e))?;
    let reader: Box<dyn BufRead> = if path.extension().is_some_and(|ext| ext == "gz") {
        Box::new(BufReader::new(MultiGzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    let mut sequences = HashMap::new();
    let mut current: Option<(String, Vec<u8>)> = None;
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| GenomirrorError::io(path, e))?;
        if let Some(header) = line.strip_prefix('>') {
            if let Some((id, seq)) = current.take() {
                sequences.insert(id, seq);
            }
            let id = header.split_whitespace().next().unwrap_or("").to_string();
            current = Some((id, Vec::new()));
        } else if let Some((_, seq)) = current.as_mut() {
            seq.extend(
                line.bytes()
                    .filter(|b| !b.is_ascii_whitespace())
                    .map(|b| b.to_ascii_uppercase()),
            );
        } else if !line.trim().is_empty() {
            return Err(ParseError::FlatFile {
                path: path.to_path_buf(),
                line: idx + 1,
                message: "sequence data before first header".into(),
            }
            .into());
        }
    }
    if let Some((id, seq)) = current {
        sequences.insert(id, seq);
    }
    Ok(sequences)
}

/// Append one FASTA entry to `out`, wrapping at [`LINE_WIDTH`].
pub fn push_entry(out: &mut String, header: &str, sequence: &[u8]) {
    let _ = writeln!(out, ">{header}");
    for chunk in sequence.chunks(LINE_WIDTH) {
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push('\n');
    }
}

pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|b| match b {
            b'A' => b'T',
            b'T' => b'A',
            b'G' => b'C',
            b'C' => b'G',
            b'a' => b't',
            b't' => b'a',
            b'g' => b'c',
            b'c' => b'g',
            other => *other,
        })
        .collect()
}

/// Tally of G/C against all unambiguous bases across several sequences.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcTally {
    gc: u64,
    acgt: u64,
}

impl GcTally {
    pub fn add(&mut self, seq: &[u8]) {
        for b in seq {
            match b.to_ascii_uppercase() {
                b'G' | b'C' => {
                    self.gc += 1;
                    self.acgt += 1;
                }
                b'A' | b'T' => self.acgt += 1,
                _ => {}
            }
        }
    }

    /// GC content in percent, or `None` when no bases were seen.
    pub fn percent(&self) -> Option<f64> {
        (self.acgt > 0).then(|| self.gc as f64 * 100.0 / self.acgt as f64)
    }
}
