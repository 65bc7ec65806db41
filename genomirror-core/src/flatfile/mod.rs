//! Genome flat files: the record model shared by parsers and the derived
//! file writers, plus the GenBank and FASTA readers.

pub mod fasta;
pub mod genbank;

use std::path::Path;

use crate::error::Result;

pub use genbank::GenbankParser;

/// Streaming source of flat-file records. Single forward pass; re-open the
/// file to start over.
pub trait FlatFileParser: Send + Sync {
    fn parse(&self, path: &Path) -> Result<Records>;
}

/// Lazy sequence of parsed records.
pub type Records = Box<dyn Iterator<Item = Result<FlatRecord>> + Send>;

/// One sequence record (a replicon) from a flat file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatRecord {
    /// Accession with version, e.g. `NC_000913.3`.
    pub id: String,
    pub description: String,
    pub length: u64,
    pub organism: Option<String>,
    pub gi: Option<String>,
    pub features: Vec<Feature>,
    /// Uppercase residues when the record carries an ORIGIN block.
    pub sequence: Option<Vec<u8>>,
}

impl FlatRecord {
    /// Accession without the version suffix; names the derived files.
    pub fn accession(&self) -> &str {
        self.id.split_once('.').map_or(self.id.as_str(), |(acc, _)| acc)
    }

    pub fn feature_counts(&self) -> FeatureCounts {
        let mut counts = FeatureCounts::default();
        for feature in &self.features {
            match feature.kind.as_str() {
                "CDS" => counts.cds += 1,
                "gene" => counts.gene += 1,
                _ if feature.is_rna() => counts.rna += 1,
                _ => {}
            }
        }
        counts
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureCounts {
    pub cds: i64,
    pub gene: i64,
    pub rna: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Strand {
    #[default]
    Forward,
    Reverse,
}

/// Closed 1-based interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: u64,
    pub end: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Feature {
    pub kind: String,
    pub spans: Vec<Span>,
    pub strand: Strand,
    /// In file order; a name may repeat (`db_xref`, `note`).
    pub qualifiers: Vec<(String, String)>,
}

impl Feature {
    pub fn qualifier(&self, name: &str) -> Option<&str> {
        self.qualifiers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn qualifiers_named<'a, 'n>(
        &'a self,
        name: &'n str,
    ) -> impl Iterator<Item = &'a str> + use<'a, 'n> {
        self.qualifiers
            .iter()
            .filter(move |(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// tRNA, rRNA, ncRNA, tmRNA, misc_RNA and friends.
    pub fn is_rna(&self) -> bool {
        self.kind.ends_with("RNA")
    }

    pub fn start(&self) -> u64 {
        self.spans.iter().map(|s| s.start).min().unwrap_or(0)
    }

    pub fn end(&self) -> u64 {
        self.spans.iter().map(|s| s.end).max().unwrap_or(0)
    }

    /// `<start>..<end>` over the whole feature.
    pub fn coords(&self) -> String {
        format!("{}..{}", self.start(), self.end())
    }

    /// The GI number from a `db_xref="GI:..."` qualifier.
    pub fn gi(&self) -> Option<&str> {
        self.qualifiers_named("db_xref")
            .find_map(|x| x.strip_prefix("GI:"))
    }

    /// Residues covered by the feature, reverse-complemented on the minus
    /// strand. Spans running past the sequence are clipped.
    pub fn extract(&self, sequence: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        for span in &self.spans {
            let start = usize::try_from(span.start.saturating_sub(1)).unwrap_or(usize::MAX);
            let end = usize::try_from(span.end).unwrap_or(usize::MAX).min(sequence.len());
            if start < end {
                out.extend_from_slice(&sequence[start..end]);
            }
        }
        if self.strand == Strand::Reverse {
            fasta::reverse_complement(&out)
        } else {
            out
        }
    }
}

/// Parse a GenBank location string into spans and a strand.
///
/// Handles `complement(..)`, `join(..)`/`order(..)` in either nesting,
/// partial markers (`<`, `>`), single bases and between-base sites (`a^b`).
/// Spans on other records (`NC_1.1:10..20`) are skipped.
pub fn parse_location(text: &str) -> Option<(Vec<Span>, Strand)> {
    let text: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let (inner, mut strand) = match unwrap_call(&text, "complement") {
        Some(inner) => (inner, Strand::Reverse),
        None => (text.as_str(), Strand::Forward),
    };
    let inner = unwrap_call(inner, "join")
        .or_else(|| unwrap_call(inner, "order"))
        .unwrap_or(inner);

    let mut spans = Vec::new();
    let mut complemented_parts = false;
    for part in inner.split(',') {
        let part = match unwrap_call(part, "complement") {
            Some(p) => {
                strand = Strand::Reverse;
                complemented_parts = true;
                p
            }
            None => part,
        };
        if part.contains(':') {
            continue;
        }
        let bound = |s: &str| s.trim_matches(['<', '>']).parse::<u64>().ok();
        let span = if let Some((a, b)) = part.split_once("..") {
            Span {
                start: bound(a)?,
                end: bound(b)?,
            }
        } else if let Some((a, b)) = part.split_once('^') {
            Span {
                start: bound(a)?,
                end: bound(b)?,
            }
        } else {
            let at = bound(part)?;
            Span { start: at, end: at }
        };
        spans.push(span);
    }
    // join(complement(b),complement(a)) reads b then a on the minus strand,
    // which is complement(join(a,b))
    if complemented_parts {
        spans.reverse();
    }
    if spans.is_empty() {
        None
    } else {
        Some((spans, strand))
    }
}

fn unwrap_call<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    text.strip_prefix(name)?
        .strip_prefix('(')?
        .strip_suffix(')')
}
