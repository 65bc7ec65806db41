//! Streaming GenBank flat-file reader.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;

use super::{Feature, FlatFileParser, FlatRecord, Records, parse_location};
use crate::error::{GenomirrorError, ParseError, Result};

/// Column where feature locations and qualifiers start.
const FEATURE_VALUE_COL: usize = 21;

#[derive(Debug, Clone, Copy, Default)]
pub struct GenbankParser;

impl FlatFileParser for GenbankParser {
    fn parse(&self, path: &Path) -> Result<Records> {
        let file = File::open(path).map_err(|e| GenomirrorError::io(path, e))?;
        let reader: Box<dyn BufRead + Send> =
            if path.extension().is_some_and(|ext| ext == "gz") {
                Box::new(BufReader::new(MultiGzDecoder::new(file)))
            } else {
                Box::new(BufReader::new(file))
            };
        Ok(Box::new(GenbankRecords::new(reader, path.to_path_buf())))
    }
}

/// Iterator over the records of one GenBank file.
pub struct GenbankRecords<R> {
    lines: Lines<R>,
    path: PathBuf,
    line_no: usize,
    failed: bool,
}

impl<R> std::fmt::Debug for GenbankRecords<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenbankRecords")
            .field("path", &self.path)
            .field("line_no", &self.line_no)
            .finish_non_exhaustive()
    }
}

#[derive(PartialEq)]
enum Section {
    Header,
    Definition,
    Features,
    Origin,
    Other,
}

impl<R: BufRead> GenbankRecords<R> {
    pub fn new(reader: R, path: PathBuf) -> Self {
        Self {
            lines: reader.lines(),
            path,
            line_no: 0,
            failed: false,
        }
    }

    fn error(&self, message: impl Into<String>) -> GenomirrorError {
        ParseError::FlatFile {
            path: self.path.clone(),
            line: self.line_no,
            message: message.into(),
        }
        .into()
    }

    fn next_line(&mut self) -> Option<Result<String>> {
        let line = self.lines.next()?;
        self.line_no += 1;
        Some(line.map_err(|e| GenomirrorError::io(&self.path, e)))
    }

    fn read_record(&mut self) -> Option<Result<FlatRecord>> {
        // Skip blank lines between records
        let first = loop {
            match self.next_line()? {
                Ok(line) if line.trim().is_empty() => {}
                other => break other,
            }
        };
        let first = match first {
            Ok(line) => line,
            Err(e) => return Some(Err(e)),
        };
        if !first.starts_with("LOCUS") {
            return Some(Err(self.error(format!("expected LOCUS, found '{first}'"))));
        }

        let mut builder = RecordBuilder::from_locus(&first);
        let mut section = Section::Header;
        loop {
            let line = match self.next_line() {
                Some(Ok(line)) => line,
                Some(Err(e)) => return Some(Err(e)),
                None => return Some(Err(self.error("record not terminated by //"))),
            };
            if line.starts_with("//") {
                break;
            }

            let keyword = line.split_whitespace().next().unwrap_or("");
            let top_level = !line.starts_with(' ') && !line.is_empty();
            if top_level {
                section = match keyword {
                    "DEFINITION" => {
                        builder.description = value_after_keyword(&line).to_string();
                        Section::Definition
                    }
                    "ACCESSION" => {
                        builder.accession = line.split_whitespace().nth(1).map(String::from);
                        Section::Header
                    }
                    "VERSION" => {
                        let mut tokens = line.split_whitespace().skip(1);
                        builder.version = tokens.next().map(String::from);
                        builder.gi = tokens.find_map(|t| t.strip_prefix("GI:")).map(String::from);
                        Section::Header
                    }
                    "SOURCE" => {
                        builder.source = Some(value_after_keyword(&line).to_string());
                        Section::Header
                    }
                    "FEATURES" => Section::Features,
                    "ORIGIN" => {
                        builder.sequence = Some(Vec::new());
                        Section::Origin
                    }
                    _ => Section::Other,
                };
                continue;
            }

            match section {
                Section::Definition => {
                    builder.description.push(' ');
                    builder.description.push_str(line.trim());
                }
                Section::Header | Section::Other => {
                    let trimmed = line.trim_start();
                    if let Some(organism) = trimmed.strip_prefix("ORGANISM") {
                        builder.organism = Some(organism.trim().to_string());
                    }
                }
                Section::Features => {
                    if let Err(message) = builder.feature_line(&line) {
                        return Some(Err(self.error(message)));
                    }
                }
                Section::Origin => {
                    if let Some(seq) = builder.sequence.as_mut() {
                        seq.extend(
                            line.bytes()
                                .filter(u8::is_ascii_alphabetic)
                                .map(|b| b.to_ascii_uppercase()),
                        );
                    }
                }
            }
        }

        Some(builder.finish().map_err(|m| self.error(m)))
    }
}

impl<R: BufRead> Iterator for GenbankRecords<R> {
    type Item = Result<FlatRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.read_record();
        if matches!(item, Some(Err(_))) {
            self.failed = true;
        }
        item
    }
}

fn value_after_keyword(line: &str) -> &str {
    line.get(12..).unwrap_or("").trim()
}

#[derive(Default)]
struct RecordBuilder {
    locus: String,
    locus_length: Option<u64>,
    description: String,
    accession: Option<String>,
    version: Option<String>,
    gi: Option<String>,
    source: Option<String>,
    organism: Option<String>,
    features: Vec<Feature>,
    pending: Option<PendingFeature>,
    sequence: Option<Vec<u8>>,
}

struct PendingFeature {
    kind: String,
    location: String,
    qualifiers: Vec<(String, String)>,
    /// A quoted value is still open and continues on the next line.
    open_quote: bool,
}

impl RecordBuilder {
    fn from_locus(line: &str) -> Self {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let locus_length = tokens
            .iter()
            .position(|t| *t == "bp" || *t == "aa")
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| tokens[i].parse().ok());
        Self {
            locus: tokens.get(1).copied().unwrap_or_default().to_string(),
            locus_length,
            ..Default::default()
        }
    }

    fn feature_line(&mut self, line: &str) -> std::result::Result<(), String> {
        let key = line.get(5..FEATURE_VALUE_COL).unwrap_or("").trim();
        let value = line.get(FEATURE_VALUE_COL..).unwrap_or("").trim_end();

        if !key.is_empty() {
            self.flush_feature()?;
            self.pending = Some(PendingFeature {
                kind: key.to_string(),
                location: value.trim().to_string(),
                qualifiers: Vec::new(),
                open_quote: false,
            });
            return Ok(());
        }

        let Some(pending) = self.pending.as_mut() else {
            return Err(format!("feature continuation without a feature: '{line}'"));
        };
        if pending.open_quote {
            if let Some((name, current)) = pending.qualifiers.last_mut() {
                if name != "translation" {
                    current.push(' ');
                }
                current.push_str(value.trim());
                pending.open_quote = !closes_quote(current);
            }
        } else if let Some(qualifier) = value.trim_start().strip_prefix('/') {
            let (name, raw) = qualifier.split_once('=').unwrap_or((qualifier, ""));
            pending.open_quote = raw.starts_with('"') && !closes_quote(raw);
            pending.qualifiers.push((name.to_string(), raw.to_string()));
        } else if pending.qualifiers.is_empty() {
            pending.location.push_str(value.trim());
        } else {
            return Err(format!("unexpected feature line: '{line}'"));
        }
        Ok(())
    }

    fn flush_feature(&mut self) -> std::result::Result<(), String> {
        let Some(pending) = self.pending.take() else {
            return Ok(());
        };
        let (spans, strand) = parse_location(&pending.location).unwrap_or_default();
        let qualifiers = pending
            .qualifiers
            .into_iter()
            .map(|(name, raw)| {
                let mut value = unquote(&raw);
                if name == "translation" {
                    value.retain(|c| !c.is_whitespace());
                }
                (name, value)
            })
            .collect();
        self.features.push(Feature {
            kind: pending.kind,
            spans,
            strand,
            qualifiers,
        });
        Ok(())
    }

    fn finish(mut self) -> std::result::Result<FlatRecord, String> {
        self.flush_feature()?;
        let id = self
            .version
            .or(self.accession)
            .unwrap_or_else(|| self.locus.clone());
        if id.is_empty() {
            return Err("record has no identifier".to_string());
        }
        let length = self
            .locus_length
            .or_else(|| self.sequence.as_ref().map(|s| s.len() as u64))
            .unwrap_or(0);
        let description = self.description.trim().trim_end_matches('.').to_string();
        Ok(FlatRecord {
            id,
            description,
            length,
            organism: self.organism.or(self.source),
            gi: self.gi,
            features: self.features,
            sequence: self.sequence.filter(|s| !s.is_empty()),
        })
    }
}

/// A value opened with `"` is closed once it ends in an odd run of quotes
/// (`""` is an escaped quote).
fn closes_quote(value: &str) -> bool {
    let body = value.strip_prefix('"').unwrap_or(value);
    let trailing = body.chars().rev().take_while(|c| *c == '"').count();
    trailing % 2 == 1
}

fn unquote(raw: &str) -> String {
    raw.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw)
        .replace("\"\"", "\"")
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::flatfile::{Span, Strand};

    const RECORD: &str = "\
LOCUS       NC_000913            120 bp    DNA     circular CON 09-MAR-2022
DEFINITION  Escherichia coli str. K-12 substr. MG1655, complete genome.
ACCESSION   NC_000913
VERSION     NC_000913.3  GI:556503834
SOURCE      Escherichia coli str. K-12 substr. MG1655
  ORGANISM  Escherichia coli str. K-12 substr. MG1655
            Bacteria; Pseudomonadota; Gammaproteobacteria.
FEATURES             Location/Qualifiers
     source          1..120
                     /organism=\"Escherichia coli str. K-12 substr. MG1655\"
                     /mol_type=\"genomic DNA\"
     gene            1..30
                     /gene=\"thrL\"
                     /locus_tag=\"b0001\"
     CDS             1..30
                     /gene=\"thrL\"
                     /locus_tag=\"b0001\"
                     /product=\"thr operon leader
                     peptide\"
                     /protein_id=\"NP_414542.1\"
                     /db_xref=\"GI:16127995\"
                     /translation=\"MKRISTTI
                     TTTITITTGNGAG\"
     gene            complement(40..
                     60)
                     /pseudo
     tRNA            70..90
                     /product=\"tRNA-Ile\"
ORIGIN
        1 atgaaacgca ttagcaccac cattaccacc accatcacca ttaccacagg taacggtgcg
       61 ggctgaccca atggcgggct aactggcgcg tgctggggca gcccgctggc ggaagtttta
//

LOCUS       NC_000914             10 bp    DNA     circular CON 09-MAR-2022
DEFINITION  Escherichia coli plasmid pX, complete sequence.
VERSION     NC_000914.1
FEATURES             Location/Qualifiers
     source          1..10
//
";

    fn parse(text: &str) -> Vec<Result<FlatRecord>> {
        GenbankRecords::new(Cursor::new(text.to_string()), PathBuf::from("test.gbff")).collect()
    }

    #[test]
    fn parses_header_features_and_origin() {
        let records = parse(RECORD);
        assert_eq!(records.len(), 2);
        let first = records[0].as_ref().unwrap();
        assert_eq!(first.id, "NC_000913.3");
        assert_eq!(first.accession(), "NC_000913");
        assert_eq!(
            first.description,
            "Escherichia coli str. K-12 substr. MG1655, complete genome"
        );
        assert_eq!(first.length, 120);
        assert_eq!(first.gi.as_deref(), Some("556503834"));
        assert_eq!(
            first.organism.as_deref(),
            Some("Escherichia coli str. K-12 substr. MG1655")
        );
        assert_eq!(first.sequence.as_ref().unwrap().len(), 120);
        assert!(first.sequence.as_ref().unwrap().starts_with(b"ATGAAACGCA"));

        let kinds: Vec<&str> = first.features.iter().map(|f| f.kind.as_str()).collect();
        assert_eq!(kinds, ["source", "gene", "CDS", "gene", "tRNA"]);

        let cds = &first.features[2];
        assert_eq!(cds.qualifier("product"), Some("thr operon leader peptide"));
        assert_eq!(cds.qualifier("translation"), Some("MKRISTTITTTITITTGNGAG"));
        assert_eq!(cds.gi(), Some("16127995"));

        let pseudo = &first.features[3];
        assert_eq!(pseudo.spans, vec![Span { start: 40, end: 60 }]);
        assert_eq!(pseudo.strand, Strand::Reverse);
        assert_eq!(pseudo.qualifier("pseudo"), Some(""));

        let counts = first.feature_counts();
        assert_eq!((counts.cds, counts.gene, counts.rna), (1, 2, 1));

        let second = records[1].as_ref().unwrap();
        assert_eq!(second.id, "NC_000914.1");
        assert_eq!(second.organism, None);
        assert_eq!(second.sequence, None);
        assert_eq!(second.length, 10);
    }

    #[test]
    fn truncated_record_is_an_error() {
        let text = "LOCUS       NC_1  10 bp    DNA\nDEFINITION  cut short\n";
        let records = parse(text);
        assert_eq!(records.len(), 1);
        assert!(matches!(
            records[0],
            Err(GenomirrorError::Parse(ParseError::FlatFile { .. }))
        ));
    }

    #[test]
    fn garbage_before_locus_stops_iteration() {
        let records = parse("not genbank\nLOCUS x\n//\n");
        assert_eq!(records.len(), 1);
        assert!(records[0].is_err());
    }

    #[test]
    fn debug_shows_file_and_position() {
        let records = GenbankRecords::new(Cursor::new(String::new()), PathBuf::from("x.gbff"));
        let shown = format!("{records:?}");
        assert!(shown.contains("x.gbff"));
        assert!(shown.contains("line_no"));
    }

    #[test]
    fn reads_gzipped_files() {
        use std::io::Write;

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("x_genomic.gbff.gz");
        let mut enc = flate2::write::GzEncoder::new(
            File::create(&path).unwrap(),
            flate2::Compression::default(),
        );
        enc.write_all(RECORD.as_bytes()).unwrap();
        enc.finish().unwrap();

        let ids: Vec<String> = GenbankParser
            .parse(&path)
            .unwrap()
            .map(|r| r.unwrap().id)
            .collect();
        assert_eq!(ids, ["NC_000913.3", "NC_000914.1"]);
    }
}
