// Remote-mirror fixtures for genomirror integration tests.
//
// `MirrorFixture` writes a directory laid out like NCBI's genomes area
// (organism summaries, per-assembly checksum manifests, gzipped GenBank
// and FASTA files) that `LocalMirror` can serve to the sync orchestrator.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;

use genomirror_core::config::GenomirrorConfig;
use genomirror_core::error::{Result, TaxonomyError};
use genomirror_core::flatfile::genbank::GenbankParser;
use genomirror_core::remote::LocalMirror;
use genomirror_core::store::SqliteStore;
use genomirror_core::sync::{SyncOrchestrator, SyncStats, VersionMode};
use genomirror_core::taxonomy::TaxonomyDirectory;
use genomirror_core::types::Taxonomy;

pub const ROOT_DIR: &str = "/genomes/refseq/bacteria";

/// One sequence record of a fixture genome.
#[derive(Debug, Clone)]
pub struct FixtureReplicon {
    /// Versioned accession, e.g. `NC_000913.3`.
    pub accession: String,
    pub definition: String,
    pub sequence: String,
}

impl FixtureReplicon {
    pub fn new(accession: &str, definition: &str, sequence: &str) -> Self {
        Self {
            accession: accession.to_string(),
            definition: definition.to_string(),
            sequence: sequence.to_ascii_uppercase(),
        }
    }

    /// A replicon of `len` bases with a fixed GC content of 50%.
    pub fn synthetic(accession: &str, definition: &str, len: usize) -> Self {
        let sequence: String = "ATGC".chars().cycle().take(len).collect();
        Self::new(accession, definition, &sequence)
    }
}

/// One assembly as published in an organism's summary.
#[derive(Debug, Clone)]
pub struct FixtureGenome {
    pub organism: String,
    pub accession: String,
    pub asm_name: String,
    pub taxid: i64,
    pub species_taxid: i64,
    pub assembly_level: String,
    pub replicons: Vec<FixtureReplicon>,
    /// Write ORIGIN blocks into the GenBank file; otherwise sequences are
    /// only in the FASTA companion.
    pub include_origin: bool,
    /// Extra bytes appended to the FASTA file, to publish new content
    /// under the same accession.
    pub revision: u32,
}

impl FixtureGenome {
    pub fn complete(organism: &str, accession: &str, asm_name: &str) -> Self {
        Self {
            organism: organism.to_string(),
            accession: accession.to_string(),
            asm_name: asm_name.to_string(),
            taxid: 511_145,
            species_taxid: 562,
            assembly_level: "Complete Genome".to_string(),
            replicons: Vec::new(),
            include_origin: true,
            revision: 0,
        }
    }

    #[must_use]
    pub fn with_replicon(mut self, replicon: FixtureReplicon) -> Self {
        self.replicons.push(replicon);
        self
    }

    #[must_use]
    pub fn level(mut self, level: &str) -> Self {
        self.assembly_level = level.to_string();
        self
    }

    #[must_use]
    pub fn taxa(mut self, taxid: i64, species_taxid: i64) -> Self {
        self.taxid = taxid;
        self.species_taxid = species_taxid;
        self
    }

    #[must_use]
    pub fn without_origin(mut self) -> Self {
        self.include_origin = false;
        self
    }

    pub fn stem(&self) -> String {
        format!("{}_{}", self.accession, self.asm_name)
    }

    /// Remote directory holding this assembly's files.
    pub fn remote_dir(&self) -> String {
        format!("/genomes/all/{}", self.stem())
    }

    fn org_name(&self) -> String {
        self.organism.replace('_', " ")
    }

    fn summary_line(&self) -> String {
        let cols: [&str; 20] = [
            &self.accession,
            "PRJNA57779",
            "SAMN02604091",
            "",
            "reference genome",
            &self.taxid.to_string(),
            &self.species_taxid.to_string(),
            &self.org_name(),
            "strain=K-12",
            "",
            "latest",
            &self.assembly_level,
            "Major",
            "Full",
            "2013/09/26",
            &self.asm_name,
            "Univ. Wisconsin",
            "GCA_000005845.2",
            "identical",
            &format!("https://ftp.ncbi.nlm.nih.gov{}", self.remote_dir()),
        ];
        cols.join("\t")
    }

    /// GenBank flat file text for every replicon.
    pub fn genbank(&self) -> String {
        let mut out = String::new();
        for (n, rep) in self.replicons.iter().enumerate() {
            write_genbank_record(&mut out, rep, &self.org_name(), n, self.include_origin);
        }
        out
    }

    /// FASTA text for every replicon.
    pub fn fasta(&self) -> String {
        let mut out = String::new();
        for rep in &self.replicons {
            out.push_str(&format!(">{} {}\n", rep.accession, rep.definition));
            for chunk in rep.sequence.as_bytes().chunks(60) {
                out.push_str(&String::from_utf8_lossy(chunk));
                out.push('\n');
            }
        }
        for _ in 0..self.revision {
            out.push('\n');
        }
        out
    }
}

fn write_genbank_record(
    out: &mut String,
    rep: &FixtureReplicon,
    organism: &str,
    n: usize,
    include_origin: bool,
) {
    let len = rep.sequence.len();
    let locus = rep.accession.split('.').next().unwrap_or(&rep.accession);
    let cds_end = (len / 3 * 3).min(30);
    let tag = format!("FIX_{:04}", n + 1);

    out.push_str(&format!(
        "LOCUS       {locus:<16}{len:>11} bp    DNA     circular CON 26-SEP-2013\n"
    ));
    out.push_str(&format!("DEFINITION  {}.\n", rep.definition));
    out.push_str(&format!("ACCESSION   {locus}\n"));
    out.push_str(&format!("VERSION     {}\n", rep.accession));
    out.push_str(&format!("SOURCE      {organism}\n"));
    out.push_str(&format!("  ORGANISM  {organism}\n"));
    out.push_str("FEATURES             Location/Qualifiers\n");
    feature(out, "source", &format!("1..{len}"), &[("organism", organism)]);
    if cds_end >= 3 {
        let location = format!("1..{cds_end}");
        let protein_id = format!("WP_{:09}.1", n + 1);
        let translation = "M".repeat(cds_end / 3 - 1);
        feature(out, "gene", &location, &[("locus_tag", &tag)]);
        feature(
            out,
            "CDS",
            &location,
            &[
                ("locus_tag", &tag),
                ("product", "hypothetical protein"),
                ("protein_id", &protein_id),
                ("translation", &translation),
            ],
        );
    }
    if include_origin {
        out.push_str("ORIGIN\n");
        for (i, line) in rep.sequence.as_bytes().chunks(60).enumerate() {
            let groups: Vec<String> = line
                .chunks(10)
                .map(|g| String::from_utf8_lossy(g).to_ascii_lowercase())
                .collect();
            out.push_str(&format!("{:>9} {}\n", i * 60 + 1, groups.join(" ")));
        }
    }
    out.push_str("//\n");
}

fn feature(out: &mut String, key: &str, location: &str, qualifiers: &[(&str, &str)]) {
    out.push_str(&format!("     {key:<16}{location}\n"));
    for (name, value) in qualifiers {
        out.push_str(&format!("                     /{name}=\"{value}\"\n"));
    }
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("gzip write");
    encoder.finish().expect("gzip finish")
}

/// A temporary remote tree plus an empty mirror base directory.
#[derive(Debug)]
pub struct MirrorFixture {
    pub dir: tempfile::TempDir,
    /// Published genomes by organism, then accession.
    published: BTreeMap<String, BTreeMap<String, FixtureGenome>>,
}

impl Default for MirrorFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl MirrorFixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create tempdir");
        std::fs::create_dir_all(dir.path().join("remote").join(ROOT_DIR.trim_start_matches('/')))
            .expect("create remote root");
        std::fs::create_dir_all(dir.path().join("mirror")).expect("create mirror dir");
        Self {
            dir,
            published: BTreeMap::new(),
        }
    }

    pub fn remote_root(&self) -> PathBuf {
        self.dir.path().join("remote")
    }

    pub fn base_dir(&self) -> PathBuf {
        self.dir.path().join("mirror")
    }

    pub fn remote(&self) -> LocalMirror {
        LocalMirror::new(self.remote_root())
    }

    /// Config pointing at this fixture, with taxonomy lookups off.
    pub fn config(&self) -> GenomirrorConfig {
        let mut config = GenomirrorConfig::default();
        config.storage.base_dir = self.base_dir();
        config.remote.url = format!("file://{}", self.remote_root().display());
        config.taxonomy.enabled = false;
        config
    }

    fn remote_path(&self, path: &str) -> PathBuf {
        self.remote_root().join(path.trim_start_matches('/'))
    }

    /// Publish (or re-publish) a genome: its files, checksum manifest and
    /// its organism's summary line.
    pub fn publish(&mut self, genome: FixtureGenome) {
        let dir = self.remote_path(&genome.remote_dir());
        std::fs::create_dir_all(&dir).expect("create assembly dir");

        let stem = genome.stem();
        let files = [
            (format!("{stem}_genomic.gbff.gz"), gzip(genome.genbank().as_bytes())),
            (format!("{stem}_genomic.fna.gz"), gzip(genome.fasta().as_bytes())),
        ];
        let mut manifest = String::new();
        for (name, bytes) in &files {
            std::fs::write(dir.join(name), bytes).expect("write assembly file");
            manifest.push_str(&format!("{:x}  ./{name}\n", md5::compute(bytes)));
        }
        std::fs::write(dir.join("md5checksums.txt"), manifest).expect("write manifest");

        self.published
            .entry(genome.organism.clone())
            .or_default()
            .insert(genome.accession.clone(), genome.clone());
        self.write_summary(&genome.organism);
    }

    /// Replace the bytes of one published file without touching its manifest.
    pub fn corrupt(&self, genome: &FixtureGenome, filename: &str) {
        let path = self.remote_path(&genome.remote_dir()).join(filename);
        std::fs::write(path, b"corrupted").expect("overwrite file");
    }

    /// Add a top-level entry that is not an organism directory.
    pub fn add_stray_file(&self, name: &str) {
        std::fs::write(self.remote_path(ROOT_DIR).join(name), "stray\n").expect("write stray file");
    }

    fn write_summary(&self, organism: &str) {
        let dir = self.remote_path(ROOT_DIR).join(organism);
        std::fs::create_dir_all(&dir).expect("create organism dir");
        let mut text = String::from(
            "# See ftp://ftp.ncbi.nlm.nih.gov/genomes/README_assembly_summary.txt\n\
             # assembly_accession\tbioproject\tbiosample\twgs_master\trefseq_category\ttaxid\t\
             species_taxid\torganism_name\tinfraspecific_name\tisolate\tversion_status\t\
             assembly_level\trelease_type\tgenome_rep\tseq_rel_date\tasm_name\tsubmitter\t\
             gbrs_paired_asm\tpaired_asm_comp\tftp_path\n",
        );
        for genome in self.published.get(organism).into_iter().flat_map(BTreeMap::values) {
            text.push_str(&genome.summary_line());
            text.push('\n');
        }
        std::fs::write(dir.join("assembly_summary.txt"), text).expect("write summary");
    }
}

/// E. coli K-12 with one chromosome and two plasmids.
pub fn ecoli() -> FixtureGenome {
    FixtureGenome::complete("Escherichia_coli", "GCF_000005845.2", "ASM584v2")
        .with_replicon(FixtureReplicon::synthetic(
            "NC_000913.3",
            "Escherichia coli str. K-12 substr. MG1655, complete genome",
            240,
        ))
        .with_replicon(FixtureReplicon::synthetic(
            "NC_000914.1",
            "Escherichia coli plasmid pA, complete sequence",
            60,
        ))
        .with_replicon(FixtureReplicon::synthetic(
            "NC_000915.1",
            "Escherichia coli plasmid pB, complete sequence",
            60,
        ))
}

/// B. subtilis 168 with one chromosome, GC 100%.
pub fn bsubtilis() -> FixtureGenome {
    FixtureGenome::complete("Bacillus_subtilis", "GCF_000009045.1", "ASM904v1")
        .taxa(224_308, 1423)
        .with_replicon(FixtureReplicon::new(
            "NC_000964.3",
            "Bacillus subtilis subsp. subtilis str. 168 complete genome",
            &"GC".repeat(60),
        ))
}

/// Taxonomy directory answering from a fixed table and counting calls.
#[derive(Debug, Default)]
pub struct StubTaxonomy {
    taxa: HashMap<i64, Taxonomy>,
    calls: AtomicUsize,
}

impl StubTaxonomy {
    /// E. coli (Pseudomonadota) and B. subtilis (Bacillota) lineages.
    pub fn bacteria() -> Self {
        let mut taxa = HashMap::new();
        for (taxon_id, phylum, genus, species) in [
            (562, "Pseudomonadota", "Escherichia", "Escherichia coli"),
            (511_145, "Pseudomonadota", "Escherichia", "Escherichia coli"),
            (1423, "Bacillota", "Bacillus", "Bacillus subtilis"),
            (224_308, "Bacillota", "Bacillus", "Bacillus subtilis"),
        ] {
            taxa.insert(
                taxon_id,
                Taxonomy {
                    taxon_id,
                    superkingdom: Some("Bacteria".into()),
                    phylum: Some(phylum.into()),
                    genus: Some(genus.into()),
                    species: Some(species.into()),
                    ..Default::default()
                },
            );
        }
        Self {
            taxa,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaxonomyDirectory for StubTaxonomy {
    async fn fetch_lineage(&self, taxon_id: i64) -> Result<Taxonomy> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.taxa
            .get(&taxon_id)
            .cloned()
            .ok_or_else(|| TaxonomyError::NotFound(taxon_id).into())
    }
}


/// Run one sync of the fixture's remote tree into `store`.
pub async fn run_sync(
    fixture: &MirrorFixture,
    store: &SqliteStore,
    mode: VersionMode,
) -> Result<SyncStats> {
    run_sync_with(fixture, store, mode, None).await
}

pub async fn run_sync_with(
    fixture: &MirrorFixture,
    store: &SqliteStore,
    mode: VersionMode,
    taxonomy: Option<&StubTaxonomy>,
) -> Result<SyncStats> {
    let config = fixture.config();
    let remote = fixture.remote();
    let parser = GenbankParser;
    let mut orchestrator = SyncOrchestrator::new(store, &config, &remote, &parser);
    if let Some(directory) = taxonomy {
        orchestrator = orchestrator.with_taxonomy(directory);
    }
    orchestrator.run(mode).await
}
