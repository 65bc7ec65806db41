use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ── Typed ID wrappers ──────────────────────────────────────────────

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

typed_id!(VersionId);
typed_id!(GpvId);
typed_id!(RpvId);

// ── Versions ───────────────────────────────────────────────────────

/// One synchronization snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub id: VersionId,
    /// Root of this version's flat-file tree.
    pub dl_directory: Option<PathBuf>,
    pub version_date: NaiveDate,
    pub is_current: bool,
    pub used_by: Option<String>,
}

/// A way of naming a version: a literal id or one of the moving aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionRef {
    Id(VersionId),
    /// The version flagged `is_current`.
    Current,
    /// The highest-numbered version.
    Latest,
}

impl FromStr for VersionRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "current" => Ok(Self::Current),
            "latest" => Ok(Self::Latest),
            other => other
                .parse::<i64>()
                .map(|id| Self::Id(VersionId(id)))
                .map_err(|_| format!("expected a version number, 'current' or 'latest', got '{other}'")),
        }
    }
}

impl From<VersionId> for VersionRef {
    fn from(id: VersionId) -> Self {
        Self::Id(id)
    }
}

impl std::fmt::Display for VersionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Current => f.write_str("current"),
            Self::Latest => f.write_str("latest"),
        }
    }
}

// ── Genome projects ────────────────────────────────────────────────

/// The fields of a genome project that carry over unchanged when it is
/// cloned into a later version. Identity, version, directory and lineage
/// live on [`GenomeProject`] itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenomeFields {
    pub assembly_accession: String,
    pub asm_name: String,
    /// Remote organism directory the assembly was listed under.
    pub genome_name: String,
    pub bioproject: Option<String>,
    pub biosample: Option<String>,
    pub taxid: Option<i64>,
    pub species_taxid: Option<i64>,
    pub org_name: Option<String>,
    pub infraspecific_name: Option<String>,
    pub submitter: Option<String>,
    pub release_date: Option<NaiveDate>,
    /// Space-separated sorted file extensions found in the genome directory.
    pub file_types: Option<String>,
}

/// One genome assembly within one version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenomeProject {
    pub id: GpvId,
    pub version_id: VersionId,
    pub gpv_directory: PathBuf,
    /// Root genome whose files this row's directory links to; `None` for a root.
    pub prev_gpv: Option<GpvId>,
    pub fields: GenomeFields,
}

impl GenomeProject {
    pub fn is_root(&self) -> bool {
        self.prev_gpv.is_none()
    }

    /// `<accession>_<asm_name>`, the stem NCBI uses for every file of the assembly.
    pub fn file_stem(&self) -> String {
        file_stem(&self.fields.assembly_accession, &self.fields.asm_name)
    }
}

/// A genome project row ready to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGenomeProject {
    pub version_id: VersionId,
    pub gpv_directory: PathBuf,
    pub prev_gpv: Option<GpvId>,
    pub fields: GenomeFields,
}

/// NCBI's file stem for an assembly; characters outside `[A-Za-z0-9._-]`
/// in the assembly name become `_`.
pub fn file_stem(assembly_accession: &str, asm_name: &str) -> String {
    format!("{assembly_accession}_{}", sanitize_name(asm_name))
}

pub(crate) fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

// ── Replicons ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepliconType {
    Chromosome,
    Plasmid,
    Contig,
}

impl RepliconType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chromosome => "chromosome",
            Self::Plasmid => "plasmid",
            Self::Contig => "contig",
        }
    }

    /// Classify a replicon from its free-text description.
    ///
    /// Case-insensitive substring match, first hit wins: `plasmid`, then
    /// `complete genome`, `complete sequence`, `chromosome`; anything else is
    /// a contig.
    pub fn classify(description: &str) -> Self {
        let desc = description.to_lowercase();
        if desc.contains("plasmid") {
            Self::Plasmid
        } else if desc.contains("complete genome")
            || desc.contains("complete sequence")
            || desc.contains("chromosome")
        {
            Self::Chromosome
        } else {
            Self::Contig
        }
    }
}

impl FromStr for RepliconType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chromosome" => Ok(Self::Chromosome),
            "plasmid" => Ok(Self::Plasmid),
            "contig" => Ok(Self::Contig),
            other => Err(format!("unknown replicon type '{other}'")),
        }
    }
}

impl std::fmt::Display for RepliconType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Replicon content copied verbatim when its genome project is cloned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepliconFields {
    /// Accession with version, e.g. `NC_000913.3`.
    pub rep_accnum: String,
    pub definition: String,
    pub rep_type: RepliconType,
    pub rep_ginum: Option<String>,
    pub file_name: String,
    pub cds_num: i64,
    pub gene_num: i64,
    pub rna_num: i64,
    pub rep_size: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replicon {
    pub id: RpvId,
    pub gpv_id: GpvId,
    pub version_id: VersionId,
    pub fields: RepliconFields,
}

// ── Checksums ──────────────────────────────────────────────────────

/// Remote checksum of one downloaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenomeChecksum {
    pub version_id: VersionId,
    pub gpv_id: GpvId,
    pub filename: String,
    pub checksum: String,
}

// ── Genome metadata ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GramStain {
    #[serde(rename = "+")]
    Positive,
    #[serde(rename = "-")]
    Negative,
    #[serde(rename = "neither")]
    Neither,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl GramStain {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "+",
            Self::Negative => "-",
            Self::Neither => "neither",
            Self::Unknown => "unknown",
        }
    }
}

impl FromStr for GramStain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "+" => Ok(Self::Positive),
            "-" => Ok(Self::Negative),
            "neither" => Ok(Self::Neither),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("unknown gram stain '{other}'")),
        }
    }
}

/// Derived statistics for one genome project.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GenomeMeta {
    pub gpv_id: GpvId,
    pub gram_stain: GramStain,
    /// GC content in percent.
    pub genome_gc: f64,
    /// Total replicon length in megabases.
    pub genome_size: f64,
    pub patho_status: Option<String>,
    pub disease: Option<String>,
    pub pathogenic_in: Option<String>,
    pub oxygen_req: Option<String>,
    pub motility: Option<String>,
    pub chromosome_num: i64,
    pub plasmid_num: i64,
    pub contig_num: i64,
}

impl Default for GpvId {
    fn default() -> Self {
        Self(0)
    }
}

/// A sparse update to [`GenomeMeta`]; `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaUpdate {
    pub gram_stain: Option<GramStain>,
    pub genome_gc: Option<f64>,
    pub genome_size: Option<f64>,
    pub patho_status: Option<String>,
    pub disease: Option<String>,
    pub pathogenic_in: Option<String>,
    pub oxygen_req: Option<String>,
    pub motility: Option<String>,
    pub chromosome_num: Option<i64>,
    pub plasmid_num: Option<i64>,
    pub contig_num: Option<i64>,
}

impl GenomeMeta {
    /// Apply every field present in `update`.
    pub fn merge(&mut self, update: MetaUpdate) {
        if let Some(v) = update.gram_stain {
            self.gram_stain = v;
        }
        if let Some(v) = update.genome_gc {
            self.genome_gc = v;
        }
        if let Some(v) = update.genome_size {
            self.genome_size = v;
        }
        if update.patho_status.is_some() {
            self.patho_status = update.patho_status;
        }
        if update.disease.is_some() {
            self.disease = update.disease;
        }
        if update.pathogenic_in.is_some() {
            self.pathogenic_in = update.pathogenic_in;
        }
        if update.oxygen_req.is_some() {
            self.oxygen_req = update.oxygen_req;
        }
        if update.motility.is_some() {
            self.motility = update.motility;
        }
        if let Some(v) = update.chromosome_num {
            self.chromosome_num = v;
        }
        if let Some(v) = update.plasmid_num {
            self.plasmid_num = v;
        }
        if let Some(v) = update.contig_num {
            self.contig_num = v;
        }
    }
}

/// Replicon-type tally accumulated while parsing a genome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepliconCounts {
    pub chromosome: i64,
    pub plasmid: i64,
    pub contig: i64,
}

impl RepliconCounts {
    pub fn record(&mut self, rep_type: RepliconType) {
        match rep_type {
            RepliconType::Chromosome => self.chromosome += 1,
            RepliconType::Plasmid => self.plasmid += 1,
            RepliconType::Contig => self.contig += 1,
        }
    }
}

// ── Taxonomy ───────────────────────────────────────────────────────

/// Cached lineage for one taxon id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taxonomy {
    pub taxon_id: i64,
    pub superkingdom: Option<String>,
    pub phylum: Option<String>,
    pub tax_class: Option<String>,
    pub order: Option<String>,
    pub family: Option<String>,
    pub genus: Option<String>,
    pub species: Option<String>,
    /// Scientific name of the taxon itself when NCBI gives it no rank.
    pub other: Option<String>,
    pub synonyms: Option<String>,
    /// Lazily computed from the lineage, see `TaxonomyCache::guess_gram`.
    pub gram_stain: Option<GramStain>,
}

impl Taxonomy {
    /// Lineage names in rank order, superkingdom first.
    pub fn ranks(&self) -> [Option<&str>; 7] {
        [
            self.superkingdom.as_deref(),
            self.phylum.as_deref(),
            self.tax_class.as_deref(),
            self.order.as_deref(),
            self.family.as_deref(),
            self.genus.as_deref(),
            self.species.as_deref(),
        ]
    }
}

// ── Stats ──────────────────────────────────────────────────────────

/// Summary statistics about the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub versions: u64,
    pub genome_projects: u64,
    pub root_genome_projects: u64,
    pub replicons: u64,
    pub checksums: u64,
    pub taxa: u64,
    pub db_size_bytes: u64,
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Any description mentioning a plasmid is a plasmid, whatever else it says.
        #[test]
        fn plasmid_always_wins(prefix in "[a-zA-Z ,]{0,30}", suffix in "[a-zA-Z ,]{0,30}") {
            let desc = format!("{prefix} PlAsMiD {suffix}");
            prop_assert_eq!(RepliconType::classify(&desc), RepliconType::Plasmid);
        }

        /// Descriptions with no keyword fall back to contig.
        #[test]
        fn no_keyword_is_contig(desc in "[0-9 ,._]{0,60}") {
            prop_assert_eq!(RepliconType::classify(&desc), RepliconType::Contig);
        }

        #[test]
        fn sanitized_names_stay_in_charset(name in "\\PC{0,40}") {
            let clean = sanitize_name(&name);
            prop_assert!(clean.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')));
            prop_assert_eq!(clean.chars().count(), name.chars().count());
        }
    }
}
