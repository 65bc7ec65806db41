//! Per-replicon files derived from a parsed flat file: `.fna`, `.faa`,
//! `.ffn` and the `.ptt` protein table.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{GenomirrorError, Result};
use crate::flatfile::fasta::push_entry;
use crate::flatfile::{Feature, FlatRecord, Strand};

const PTT_COLUMNS: [&str; 9] = [
    "Location", "Strand", "Length", "PID", "Gene", "Synonym", "Code", "COG", "Product",
];

/// A CDS with a translation, as listed in `.faa` and `.ptt`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Protein<'a> {
    ident: String,
    coords: String,
    strand: Strand,
    gi: Option<&'a str>,
    gene: Option<&'a str>,
    locus_tag: Option<&'a str>,
    product: Option<&'a str>,
    translation: &'a str,
}

impl<'a> Protein<'a> {
    fn from_feature(feature: &'a Feature) -> Option<Self> {
        let translation = feature.qualifier("translation")?;
        let coords = feature.coords();

        let mut ident: Vec<String> = Vec::new();
        let gi = feature.gi();
        if let Some(gi) = gi {
            ident.push(format!("gi|{gi}"));
        }
        ident.extend(feature.qualifiers_named("protein_id").map(|p| format!("ref|{p}")));
        ident.extend(feature.qualifiers_named("locus_tag").map(|l| format!("locus|{l}")));
        ident.push(match feature.strand {
            Strand::Reverse => format!(":c{coords}"),
            Strand::Forward => format!(":{coords}"),
        });

        Some(Self {
            ident: ident.join("|"),
            coords,
            strand: feature.strand,
            gi,
            gene: feature.qualifier("gene"),
            locus_tag: feature.qualifier("locus_tag"),
            product: feature.qualifier("product"),
            translation,
        })
    }
}

fn proteins(record: &FlatRecord) -> Vec<Protein<'_>> {
    record
        .features
        .iter()
        .filter(|f| f.kind == "CDS")
        .filter_map(|f| {
            let protein = Protein::from_feature(f);
            if protein.is_none() {
                debug!(coords = %f.coords(), "CDS without translation");
            }
            protein
        })
        .collect()
}

pub fn render_fna(record: &FlatRecord, sequence: &[u8]) -> String {
    let mut out = String::new();
    push_entry(&mut out, &format!("{} {}", record.id, record.description), sequence);
    out
}

pub fn render_faa(record: &FlatRecord) -> String {
    let mut out = String::new();
    for protein in proteins(record) {
        let mut description = protein.product.unwrap_or("-").to_string();
        if let Some(organism) = &record.organism {
            let _ = write!(description, " [{organism}]");
        }
        push_entry(
            &mut out,
            &format!("{} {description}", protein.ident),
            protein.translation.as_bytes(),
        );
    }
    out
}

pub fn render_ptt(record: &FlatRecord) -> String {
    let proteins = proteins(record);
    let mut out = String::new();
    let _ = writeln!(out, "{} - 1..{}", record.description, record.length);
    let _ = writeln!(out, "{} proteins", proteins.len());
    let _ = writeln!(out, "{}", PTT_COLUMNS.join("\t"));
    for p in &proteins {
        let strand = match p.strand {
            Strand::Forward => "+",
            Strand::Reverse => "-",
        };
        let length = p.translation.len().to_string();
        let row = [
            p.coords.as_str(),
            strand,
            length.as_str(),
            p.gi.unwrap_or("-"),
            p.gene.unwrap_or("-"),
            p.locus_tag.unwrap_or("-"),
            "-",
            "-",
            p.product.unwrap_or("-"),
        ];
        let _ = writeln!(out, "{}", row.join("\t"));
    }
    out
}

/// Nucleotide entries for every `gene` whose span matches a listed protein.
pub fn render_ffn(record: &FlatRecord, sequence: &[u8]) -> String {
    let proteins = proteins(record);
    let by_coords: HashMap<&str, &str> = proteins
        .iter()
        .map(|p| (p.coords.as_str(), p.ident.as_str()))
        .collect();

    let mut out = String::new();
    for gene in record.features.iter().filter(|f| f.kind == "gene") {
        let coords = gene.coords();
        let Some(ident) = by_coords.get(coords.as_str()) else {
            debug!(coords = %coords, "gene without a matching protein");
            continue;
        };
        push_entry(
            &mut out,
            &format!("{ident} {}", record.description),
            &gene.extract(sequence),
        );
    }
    out
}

/// Write the derived files for one replicon into `dir`, named by the
/// replicon's accession. Without a sequence only `.faa` and `.ptt` are
/// written.
pub fn write_replicon_files(
    dir: &Path,
    record: &FlatRecord,
    sequence: Option<&[u8]>,
) -> Result<Vec<PathBuf>> {
    let stem = record.accession();
    let mut outputs = vec![
        ("faa", render_faa(record)),
        ("ptt", render_ptt(record)),
    ];
    if let Some(seq) = sequence {
        outputs.push(("fna", render_fna(record, seq)));
        outputs.push(("ffn", render_ffn(record, seq)));
    }

    let mut written = Vec::with_capacity(outputs.len());
    for (ext, text) in outputs {
        let path = dir.join(format!("{stem}.{ext}"));
        fs::write(&path, text).map_err(|e| GenomirrorError::io(&path, e))?;
        written.push(path);
    }
    debug!(replicon = stem, files = written.len(), "wrote derived files");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatfile::Span;

    const SEQUENCE: &[u8] = b"ATGAAACCCGGGTTAGGGCATTAA";

    fn cds(start: u64, end: u64, strand: Strand, qualifiers: &[(&str, &str)]) -> Feature {
        Feature {
            kind: "CDS".into(),
            spans: vec![Span { start, end }],
            strand,
            qualifiers: qualifiers
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    fn gene(start: u64, end: u64, strand: Strand) -> Feature {
        Feature {
            kind: "gene".into(),
            spans: vec![Span { start, end }],
            strand,
            qualifiers: vec![],
        }
    }

    fn record() -> FlatRecord {
        FlatRecord {
            id: "NC_9.1".into(),
            description: "Escherichia coli plasmid pX, complete sequence".into(),
            length: 24,
            organism: Some("Escherichia coli".into()),
            gi: None,
            features: vec![
                gene(1, 9, Strand::Forward),
                cds(
                    1,
                    9,
                    Strand::Forward,
                    &[
                        ("gene", "abcA"),
                        ("locus_tag", "ECX_0001"),
                        ("product", "Alpha protein"),
                        ("protein_id", "WP_1.1"),
                        ("db_xref", "GI:111"),
                        ("translation", "MKP"),
                    ],
                ),
                gene(13, 21, Strand::Reverse),
                cds(
                    13,
                    21,
                    Strand::Reverse,
                    &[
                        ("locus_tag", "ECX_0002"),
                        ("product", "Beta protein"),
                        ("protein_id", "WP_2.1"),
                        ("translation", "MG"),
                    ],
                ),
                cds(22, 24, Strand::Forward, &[("product", "fragment")]),
            ],
            sequence: Some(SEQUENCE.to_vec()),
        }
    }

    #[test]
    fn faa_identifiers() {
        insta::assert_snapshot!(render_faa(&record()), @r"
>gi|111|ref|WP_1.1|locus|ECX_0001|:1..9 Alpha protein [Escherichia coli]
MKP
>ref|WP_2.1|locus|ECX_0002|:c13..21 Beta protein [Escherichia coli]
MG
");
    }

    #[test]
    fn ptt_table() {
        let ptt = render_ptt(&record());
        let lines: Vec<&str> = ptt.lines().collect();
        assert_eq!(lines[0], "Escherichia coli plasmid pX, complete sequence - 1..24");
        assert_eq!(lines[1], "2 proteins");
        assert_eq!(
            lines[2],
            "Location\tStrand\tLength\tPID\tGene\tSynonym\tCode\tCOG\tProduct"
        );
        assert_eq!(lines[3], "1..9\t+\t3\t111\tabcA\tECX_0001\t-\t-\tAlpha protein");
        assert_eq!(lines[4], "13..21\t-\t2\t-\t-\tECX_0002\t-\t-\tBeta protein");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn ffn_reverse_complements_minus_strand() {
        insta::assert_snapshot!(render_ffn(&record(), SEQUENCE), @r"
>gi|111|ref|WP_1.1|locus|ECX_0001|:1..9 Escherichia coli plasmid pX, complete sequence
ATGAAACCC
>ref|WP_2.1|locus|ECX_0002|:c13..21 Escherichia coli plasmid pX, complete sequence
ATGCCCTAA
");
    }

    #[test]
    fn writes_files_named_by_accession() {
        let tmp = tempfile::tempdir().unwrap();
        let record = record();
        let written = write_replicon_files(tmp.path(), &record, Some(SEQUENCE)).unwrap();
        assert_eq!(written.len(), 4);
        for ext in ["faa", "ptt", "fna", "ffn"] {
            assert!(tmp.path().join(format!("NC_9.{ext}")).is_file(), "{ext}");
        }
        let fna = fs::read_to_string(tmp.path().join("NC_9.fna")).unwrap();
        assert!(fna.starts_with(">NC_9.1 Escherichia coli plasmid pX"));

        let only_proteins = tempfile::tempdir().unwrap();
        let written = write_replicon_files(only_proteins.path(), &record, None).unwrap();
        assert_eq!(written.len(), 2);
    }
}
