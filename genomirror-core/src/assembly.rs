//! Parsing of the remote manifests: `assembly_summary.txt` and `md5checksums.txt`.

use chrono::NaiveDate;
use reqwest::Url;

use crate::error::{ParseError, RemoteError};
use crate::types::GenomeFields;

const SUMMARY_COLUMNS: usize = 20;

/// One line of an assembly summary, columns 0 through 19.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblySummary {
    pub assembly_accession: String,
    pub bioproject: Option<String>,
    pub biosample: Option<String>,
    pub wgs_master: Option<String>,
    pub refseq_category: Option<String>,
    pub taxid: Option<i64>,
    pub species_taxid: Option<i64>,
    pub org_name: Option<String>,
    pub infraspecific_name: Option<String>,
    pub isolate: Option<String>,
    pub version_status: Option<String>,
    pub assembly_level: String,
    pub release_type: Option<String>,
    pub genome_rep: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub asm_name: String,
    pub submitter: Option<String>,
    pub gbrs_paired_asm: Option<String>,
    pub paired_asm_comp: Option<String>,
    pub ftp_path: Option<String>,
}

impl AssemblySummary {
    /// Parse one tab-separated summary line. Callers skip `#` comment lines.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < SUMMARY_COLUMNS {
            return Err(ParseError::Summary {
                line: line.to_string(),
                reason: format!("{} columns, expected {SUMMARY_COLUMNS}", cols.len()),
            });
        }

        let required = |idx: usize, name: &str| -> Result<String, ParseError> {
            optional(cols[idx]).ok_or_else(|| ParseError::Summary {
                line: line.to_string(),
                reason: format!("empty {name}"),
            })
        };
        let number = |idx: usize, name: &str| -> Result<Option<i64>, ParseError> {
            optional(cols[idx])
                .map(|s| {
                    s.parse::<i64>().map_err(|_| ParseError::Summary {
                        line: line.to_string(),
                        reason: format!("{name} '{s}' is not a number"),
                    })
                })
                .transpose()
        };

        Ok(Self {
            assembly_accession: required(0, "assembly_accession")?,
            bioproject: optional(cols[1]),
            biosample: optional(cols[2]),
            wgs_master: optional(cols[3]),
            refseq_category: optional(cols[4]),
            taxid: number(5, "taxid")?,
            species_taxid: number(6, "species_taxid")?,
            org_name: optional(cols[7]),
            infraspecific_name: optional(cols[8]),
            isolate: optional(cols[9]),
            version_status: optional(cols[10]),
            assembly_level: cols[11].trim().to_string(),
            release_type: optional(cols[12]),
            genome_rep: optional(cols[13]),
            release_date: optional(cols[14]).and_then(|d| parse_release_date(&d)),
            asm_name: required(15, "asm_name")?,
            submitter: optional(cols[16]),
            gbrs_paired_asm: optional(cols[17]),
            paired_asm_comp: optional(cols[18]),
            ftp_path: optional(cols[19]),
        })
    }

    /// The persisted genome fields for this assembly, listed under `genome_name`.
    pub fn genome_fields(&self, genome_name: &str) -> GenomeFields {
        GenomeFields {
            assembly_accession: self.assembly_accession.clone(),
            asm_name: self.asm_name.clone(),
            genome_name: genome_name.to_string(),
            bioproject: self.bioproject.clone(),
            biosample: self.biosample.clone(),
            taxid: self.taxid,
            species_taxid: self.species_taxid,
            org_name: self.org_name.clone(),
            infraspecific_name: self.infraspecific_name.clone(),
            submitter: self.submitter.clone(),
            release_date: self.release_date,
            file_types: None,
        }
    }

    /// The remote directory holding this assembly's files, as a path on the
    /// remote host (scheme and host stripped from `ftp_path`).
    pub fn remote_dir(&self) -> Result<String, RemoteError> {
        let raw = self
            .ftp_path
            .as_deref()
            .ok_or_else(|| RemoteError::NoRemotePath(self.assembly_accession.clone()))?;
        let path = match Url::parse(raw) {
            Ok(url) => url.path().to_string(),
            Err(_) if raw.starts_with('/') => raw.to_string(),
            Err(_) => return Err(RemoteError::NoRemotePath(self.assembly_accession.clone())),
        };
        // `ftp://host//genomes/..` must not turn into a network-path reference
        let path = path.trim_matches('/');
        if path.is_empty() {
            return Err(RemoteError::NoRemotePath(self.assembly_accession.clone()));
        }
        Ok(format!("/{path}"))
    }
}

/// Parse every data line of a summary file, skipping comments and blanks.
/// Malformed lines come back as errors in place so one bad line does not
/// hide the rest.
pub fn parse_summary(lines: &[String]) -> Vec<Result<AssemblySummary, ParseError>> {
    lines
        .iter()
        .filter(|l| !l.starts_with('#') && !l.trim().is_empty())
        .map(|l| AssemblySummary::parse(l))
        .collect()
}

/// One advertised file from a checksum manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub filename: String,
    pub checksum: String,
}

impl ManifestEntry {
    /// `<hex checksum> <path>`; the filename is the basename of the path.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let mut tokens = line.split_whitespace();
        let (Some(checksum), Some(path)) = (tokens.next(), tokens.next()) else {
            return Err(ParseError::Checksum(line.to_string()));
        };
        let filename = path.rsplit('/').next().unwrap_or(path);
        if filename.is_empty() {
            return Err(ParseError::Checksum(line.to_string()));
        }
        Ok(Self {
            filename: filename.to_string(),
            checksum: checksum.to_string(),
        })
    }
}

/// Parse a checksum manifest, ignoring blank lines.
pub fn parse_manifest(lines: &[String]) -> Result<Vec<ManifestEntry>, ParseError> {
    lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| ManifestEntry::parse(l))
        .collect()
}

fn optional(field: &str) -> Option<String> {
    let field = field.trim();
    if field.is_empty() || field == "na" {
        None
    } else {
        Some(field.to_string())
    }
}

fn parse_release_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y/%m/%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary_line(accession: &str, asm: &str, level: &str, ftp: &str) -> String {
        [
            accession,
            "PRJNA57779",
            "SAMN02604091",
            "",
            "reference genome",
            "511145",
            "562",
            "Escherichia coli str. K-12 substr. MG1655",
            "strain=K-12 substr. MG1655",
            "",
            "latest",
            level,
            "Major",
            "Full",
            "2013/09/26",
            asm,
            "Univ. Wisconsin",
            "GCA_000005845.2",
            "identical",
            ftp,
        ]
        .join("\t")
    }

    #[test]
    fn parses_a_summary_line() {
        let line = summary_line(
            "GCF_000005845.2",
            "ASM584v2",
            "Complete Genome",
            "ftp://ftp.ncbi.nlm.nih.gov/genomes/all/GCF/000/005/845/GCF_000005845.2_ASM584v2",
        );
        let summary = AssemblySummary::parse(&line).unwrap();
        assert_eq!(summary.assembly_accession, "GCF_000005845.2");
        assert_eq!(summary.asm_name, "ASM584v2");
        assert_eq!(summary.taxid, Some(511_145));
        assert_eq!(summary.species_taxid, Some(562));
        assert_eq!(summary.assembly_level, "Complete Genome");
        assert_eq!(summary.wgs_master, None);
        assert_eq!(summary.release_date, NaiveDate::from_ymd_opt(2013, 9, 26));
        assert_eq!(
            summary.remote_dir().unwrap(),
            "/genomes/all/GCF/000/005/845/GCF_000005845.2_ASM584v2"
        );

        let fields = summary.genome_fields("Escherichia_coli");
        assert_eq!(fields.genome_name, "Escherichia_coli");
        assert_eq!(fields.bioproject.as_deref(), Some("PRJNA57779"));
    }

    #[test]
    fn remote_dir_variants() {
        let mut summary = AssemblySummary::parse(&summary_line(
            "GCF_1.1",
            "A",
            "Complete Genome",
            "https://ftp.ncbi.nlm.nih.gov/genomes/all/GCF_1.1_A/",
        ))
        .unwrap();
        assert_eq!(summary.remote_dir().unwrap(), "/genomes/all/GCF_1.1_A");

        summary.ftp_path = Some("/local/GCF_1.1_A".into());
        assert_eq!(summary.remote_dir().unwrap(), "/local/GCF_1.1_A");

        summary.ftp_path = Some("ftp://ftp.ncbi.nlm.nih.gov//genomes/all/GCF_1.1_A/".into());
        assert_eq!(summary.remote_dir().unwrap(), "/genomes/all/GCF_1.1_A");

        summary.ftp_path = None;
        assert!(matches!(
            summary.remote_dir(),
            Err(RemoteError::NoRemotePath(_))
        ));
    }

    #[test]
    fn short_or_bad_lines_are_errors() {
        assert!(matches!(
            AssemblySummary::parse("GCF_1.1\tPRJ"),
            Err(ParseError::Summary { .. })
        ));
        let bad_taxid = summary_line("GCF_1.1", "A", "Complete Genome", "na")
            .replace("511145", "not-a-number");
        assert!(AssemblySummary::parse(&bad_taxid).is_err());
    }

    #[test]
    fn summary_skips_comments() {
        let lines = vec![
            "#   See ftp://ftp.ncbi.nlm.nih.gov/genomes/README_assembly_summary.txt".to_string(),
            "# assembly_accession\tbioproject".to_string(),
            summary_line("GCF_1.1", "A", "Complete Genome", "na"),
            String::new(),
            "broken".to_string(),
            summary_line("GCF_2.1", "B", "Contig", "na"),
        ];
        let parsed = parse_summary(&lines);
        assert_eq!(parsed.len(), 3);
        assert!(parsed[0].is_ok());
        assert!(parsed[1].is_err());
        assert_eq!(parsed[2].as_ref().unwrap().assembly_level, "Contig");
    }

    #[test]
    fn manifest_lines_use_basename() {
        let entries = parse_manifest(&[
            "abc123  ./GCF_1.1_A_genomic.gbff.gz".to_string(),
            String::new(),
            "def456 GCF_1.1_A_genomic.fna.gz".to_string(),
        ])
        .unwrap();
        assert_eq!(
            entries,
            vec![
                ManifestEntry {
                    filename: "GCF_1.1_A_genomic.gbff.gz".into(),
                    checksum: "abc123".into(),
                },
                ManifestEntry {
                    filename: "GCF_1.1_A_genomic.fna.gz".into(),
                    checksum: "def456".into(),
                },
            ]
        );
        assert!(ManifestEntry::parse("lonely").is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Directory components never leak into the filename.
        #[test]
        fn manifest_filename_is_basename(
            checksum in "[0-9a-f]{32}",
            dirs in proptest::collection::vec("[a-z0-9_]{1,8}", 0..4),
            name in "[A-Za-z0-9_.]{1,30}",
        ) {
            let mut path = String::from(".");
            for d in &dirs {
                path.push('/');
                path.push_str(d);
            }
            path.push('/');
            path.push_str(&name);
            let entry = ManifestEntry::parse(&format!("{checksum}  {path}")).unwrap();
            prop_assert_eq!(entry.filename, name);
            prop_assert_eq!(entry.checksum, checksum);
        }

        /// Any line with fewer than twenty columns is rejected.
        #[test]
        fn short_summary_lines_rejected(cols in proptest::collection::vec("[A-Za-z0-9 ]{0,8}", 0..19)) {
            prop_assert!(AssemblySummary::parse(&cols.join("\t")).is_err());
        }
    }
}
