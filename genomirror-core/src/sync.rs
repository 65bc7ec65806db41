// Sync orchestrator: walks the remote genome tree and, per complete
// assembly, fetches and parses it into the target version or clones the
// current version's rows and links to its files.

use std::collections::HashMap;
use std::fs;
use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use crate::assembly::{self, AssemblySummary, ManifestEntry};
use crate::change::{ChangeDetector, Verdict};
use crate::config::GenomirrorConfig;
use crate::derived;
use crate::error::{GenomirrorError, ParseError, RemoteError, Result};
use crate::files;
use crate::flatfile::FlatFileParser;
use crate::flatfile::fasta::{self, GcTally};
use crate::layout::MirrorLayout;
use crate::progress::{NoopReporter, ProgressReporter};
use crate::records::GenomeRecords;
use crate::remote::{self, RemoteSource};
use crate::store::GenomeStore;
use crate::taxonomy::{TaxonomyCache, TaxonomyDirectory};
use crate::types::{
    GenomeChecksum, GenomeProject, GpvId, GramStain, MetaUpdate, RepliconCounts, RepliconFields,
    RepliconType, Version, VersionId, VersionRef,
};
use crate::versions::VersionManager;

/// Which version a run writes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionMode {
    /// Allocate a fresh version.
    #[default]
    CreateNext,
    /// Continue filling the latest version (restart after an interrupted run).
    ReuseLatest,
}

/// What happened to one assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenomeOutcome {
    Created(GpvId),
    Cloned(GpvId),
    /// Already present in the target version.
    Skipped(GpvId),
}

/// Statistics returned by a sync run.
#[derive(Debug)]
pub struct SyncStats {
    pub version_id: VersionId,
    pub organisms: u64,
    pub genomes_seen: u64,
    pub created: u64,
    pub cloned: u64,
    pub skipped: u64,
    /// Summary lines below the configured assembly level.
    pub incomplete_skipped: u64,
    pub duration: Duration,
    /// Per-organism or per-genome failures; the run carried on past each.
    pub errors: Vec<(String, GenomirrorError)>,
}

impl SyncStats {
    fn new(version_id: VersionId) -> Self {
        Self {
            version_id,
            organisms: 0,
            genomes_seen: 0,
            created: 0,
            cloned: 0,
            skipped: 0,
            incomplete_skipped: 0,
            duration: Duration::ZERO,
            errors: Vec::new(),
        }
    }

    fn record(&mut self, outcome: GenomeOutcome) {
        match outcome {
            GenomeOutcome::Created(_) => self.created += 1,
            GenomeOutcome::Cloned(_) => self.cloned += 1,
            GenomeOutcome::Skipped(_) => self.skipped += 1,
        }
    }

    /// Some genomes or organisms failed.
    pub fn is_partial(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Replicon totals gathered while parsing one genome.
#[derive(Debug, Default)]
struct ParsedGenome {
    counts: RepliconCounts,
    total_length: u64,
    gc: GcTally,
}

pub struct SyncOrchestrator<'a> {
    store: &'a dyn GenomeStore,
    config: &'a GenomirrorConfig,
    layout: MirrorLayout,
    remote: &'a dyn RemoteSource,
    parser: &'a dyn FlatFileParser,
    taxonomy: Option<&'a dyn TaxonomyDirectory>,
    progress: &'a dyn ProgressReporter,
}

impl std::fmt::Debug for SyncOrchestrator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("layout", &self.layout)
            .field("remote", &self.remote.name())
            .field("taxonomy", &self.taxonomy.is_some())
            .finish_non_exhaustive()
    }
}

impl<'a> SyncOrchestrator<'a> {
    pub fn new(
        store: &'a dyn GenomeStore,
        config: &'a GenomirrorConfig,
        remote: &'a dyn RemoteSource,
        parser: &'a dyn FlatFileParser,
    ) -> Self {
        Self {
            store,
            config,
            layout: config.layout(),
            remote,
            parser,
            taxonomy: None,
            progress: &NoopReporter,
        }
    }

    #[must_use]
    pub fn with_taxonomy(mut self, directory: &'a dyn TaxonomyDirectory) -> Self {
        self.taxonomy = Some(directory);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: &'a dyn ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    /// Run one sync into the version chosen by `mode`.
    ///
    /// The target version is never promoted to current here. Only fatal
    /// errors (configuration, store connection, unreachable remote root)
    /// end the run early; everything else lands in `SyncStats::errors`.
    #[instrument(skip_all, fields(mode = ?mode))]
    pub async fn run(&self, mode: VersionMode) -> Result<SyncStats> {
        let start = Instant::now();
        let version = self.target_version(mode).await?;
        let mut stats = SyncStats::new(version.id);
        info!(version = version.id.0, remote = self.remote.name(), "sync starting");

        let root = &self.config.remote.root_dir;
        let organisms: Vec<String> = self
            .timed(root, self.remote.list(root))
            .await?
            .into_iter()
            .filter(|name| self.config.sync.wants_organism(name))
            .collect();
        info!(organisms = organisms.len(), "discovered remote entries");

        self.progress
            .start("Syncing organisms", Some(organisms.len() as u64));
        for organism in &organisms {
            stats.organisms += 1;
            if let Err(e) = self.process_directory(organism, &version, &mut stats).await {
                if e.is_fatal() {
                    self.progress.finish();
                    return Err(e);
                }
                warn!(organism = %organism, error = %e, "failed to process organism");
                stats.errors.push((organism.clone(), e));
            }
            self.progress.advance(1);
        }
        self.progress.finish();

        stats.duration = start.elapsed();
        info!(
            version = version.id.0,
            created = stats.created,
            cloned = stats.cloned,
            skipped = stats.skipped,
            incomplete = stats.incomplete_skipped,
            errors = stats.errors.len(),
            duration = ?stats.duration,
            "sync complete"
        );
        Ok(stats)
    }

    async fn target_version(&self, mode: VersionMode) -> Result<Version> {
        let versions = VersionManager::new(self.store, &self.layout);
        let version = match (mode, versions.latest().await?) {
            (VersionMode::ReuseLatest, Some(latest)) => {
                info!(version = latest.0, "reusing latest version");
                versions.get(VersionRef::Id(latest)).await?
            }
            _ => versions.create_next().await?,
        };
        if let Some(dir) = &version.dl_directory {
            fs::create_dir_all(dir).map_err(|e| GenomirrorError::io(dir, e))?;
        }
        Ok(version)
    }

    async fn timed<T>(&self, path: &str, op: impl Future<Output = Result<T>>) -> Result<T> {
        let timeout = Duration::from_secs(self.config.remote.timeout_secs);
        remote::with_timeout(timeout, path, op).await
    }

    /// Fetch one organism's summary and handle each complete assembly in it.
    async fn process_directory(
        &self,
        organism: &str,
        version: &Version,
        stats: &mut SyncStats,
    ) -> Result<()> {
        let dir = remote::join(&self.config.remote.root_dir, organism);
        let summary_path = remote::join(&dir, &self.config.remote.summary_file);
        let lines = match self.timed(&summary_path, self.remote.retrieve_lines(&summary_path)).await {
            Ok(lines) => lines,
            Err(GenomirrorError::Remote(RemoteError::Missing(_))) => {
                debug!(organism, "no assembly summary, skipping entry");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        for parsed in assembly::parse_summary(&lines) {
            let summary = match parsed {
                Ok(summary) => summary,
                Err(e) => {
                    warn!(organism, error = %e, "skipping malformed summary line");
                    stats.errors.push((organism.to_string(), e.into()));
                    continue;
                }
            };
            if summary.assembly_level != self.config.sync.assembly_level {
                stats.incomplete_skipped += 1;
                continue;
            }

            stats.genomes_seen += 1;
            let label = format!("{organism}/{}_{}", summary.assembly_accession, summary.asm_name);
            match self.process_genome(organism, &summary, version.id).await {
                Ok(outcome) => stats.record(outcome),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(genome = %label, error = %e, "failed to process genome");
                    self.progress.message(&format!("{label}: {e}"));
                    stats.errors.push((label, e));
                }
            }
        }
        Ok(())
    }

    #[instrument(skip_all, fields(accession = %summary.assembly_accession, asm = %summary.asm_name))]
    async fn process_genome(
        &self,
        organism: &str,
        summary: &AssemblySummary,
        version: VersionId,
    ) -> Result<GenomeOutcome> {
        let remote_dir = summary.remote_dir()?;
        let manifest_path = remote::join(&remote_dir, &self.config.remote.checksum_file);
        let lines = self
            .timed(&manifest_path, self.remote.retrieve_lines(&manifest_path))
            .await?;
        let manifest: Vec<ManifestEntry> = assembly::parse_manifest(&lines)?
            .into_iter()
            .filter(|entry| self.config.sync.wants_file(&entry.filename))
            .collect();

        let verdict = ChangeDetector::new(self.store)
            .detect(&summary.assembly_accession, &summary.asm_name, &manifest, version)
            .await?;
        match verdict {
            Verdict::AlreadyPresent(gp) => {
                info!(gpv_id = gp.id.0, "already in target version, skipping");
                Ok(GenomeOutcome::Skipped(gp.id))
            }
            Verdict::Unchanged(gp) => {
                let records = GenomeRecords::new(self.store, &self.layout);
                let clone = records.clone_into(&gp, VersionRef::Id(version)).await?;
                Ok(GenomeOutcome::Cloned(clone.id))
            }
            Verdict::Changed { previous } => {
                if let Some(prev) = &previous {
                    info!(gpv_id = prev.id.0, "genome changed upstream, fetching new copy");
                }
                self.fetch_genome(organism, summary, &remote_dir, &manifest, version)
                    .await
            }
        }
    }

    /// Create, download, parse and describe one changed genome as a unit.
    async fn fetch_genome(
        &self,
        organism: &str,
        summary: &AssemblySummary,
        remote_dir: &str,
        manifest: &[ManifestEntry],
        version: VersionId,
    ) -> Result<GenomeOutcome> {
        let records = GenomeRecords::new(self.store, &self.layout);

        self.store.begin_transaction().await?;
        let gp = match records
            .create(VersionRef::Id(version), summary.genome_fields(organism))
            .await
        {
            Ok(gp) => gp,
            Err(e) => {
                self.store.rollback_transaction().await?;
                if e.is_integrity() {
                    if let Some(existing) = self
                        .store
                        .find_genome(&summary.assembly_accession, &summary.asm_name, version)
                        .await?
                    {
                        debug!(gpv_id = existing.id.0, "lost create race, using existing row");
                        return Ok(GenomeOutcome::Skipped(existing.id));
                    }
                }
                return Err(e);
            }
        };

        if let Err(e) = self.populate(&gp, summary, remote_dir, manifest).await {
            self.store.rollback_transaction().await?;
            discard_directory(&gp.gpv_directory);
            return Err(e);
        }
        if let Err(e) = self.store.commit_transaction().await {
            discard_directory(&gp.gpv_directory);
            return Err(e);
        }

        info!(gpv_id = gp.id.0, dir = %gp.gpv_directory.display(), "fetched genome");
        Ok(GenomeOutcome::Created(gp.id))
    }

    async fn populate(
        &self,
        gp: &GenomeProject,
        summary: &AssemblySummary,
        remote_dir: &str,
        manifest: &[ManifestEntry],
    ) -> Result<()> {
        let dir = &gp.gpv_directory;
        fs::create_dir_all(dir).map_err(|e| GenomirrorError::io(dir, e))?;

        let gram = self.lookup_taxonomy(summary).await;

        for entry in manifest {
            let dest = dir.join(&entry.filename);
            let remote_path = remote::join(remote_dir, &entry.filename);
            let bytes = self
                .timed(&remote_path, self.remote.retrieve_binary(&remote_path, &dest))
                .await?;
            if self.config.sync.verify_checksums {
                files::verify_md5(&dest, &entry.filename, &entry.checksum)?;
            }
            self.store
                .insert_checksum(&GenomeChecksum {
                    version_id: gp.version_id,
                    gpv_id: gp.id,
                    filename: entry.filename.clone(),
                    checksum: entry.checksum.clone(),
                })
                .await?;
            files::gunzip_in_place(&dest)?;
            debug!(file = %entry.filename, bytes, "downloaded");
        }

        let parsed = self.parse_replicons(gp).await?;
        debug!(
            gpv_id = gp.id.0,
            chromosomes = parsed.counts.chromosome,
            plasmids = parsed.counts.plasmid,
            contigs = parsed.counts.contig,
            "parsed replicons"
        );

        GenomeRecords::new(self.store, &self.layout)
            .update_meta(
                gp.id,
                MetaUpdate {
                    gram_stain: gram,
                    genome_gc: parsed.gc.percent(),
                    genome_size: Some(parsed.total_length as f64 / 1_000_000.0),
                    chromosome_num: Some(parsed.counts.chromosome),
                    plasmid_num: Some(parsed.counts.plasmid),
                    contig_num: Some(parsed.counts.contig),
                    ..Default::default()
                },
            )
            .await?;

        let file_types = files::file_types(dir)?;
        self.store
            .set_file_types(gp.id, file_types.as_deref())
            .await?;
        Ok(())
    }

    /// Store lineages for the assembly's taxa and guess its gram stain.
    /// Taxonomy trouble is logged and never fails the genome.
    async fn lookup_taxonomy(&self, summary: &AssemblySummary) -> Option<GramStain> {
        let directory = self.taxonomy?;
        let cache = TaxonomyCache::new(self.store, directory);
        for taxon_id in [summary.taxid, summary.species_taxid].into_iter().flatten() {
            if let Err(e) = cache.find_or_create(taxon_id).await {
                warn!(taxon_id, error = %e, "taxonomy lookup failed");
            }
        }
        let taxon_id = summary.species_taxid.or(summary.taxid)?;
        match cache.guess_gram(taxon_id).await {
            Ok(gram) => gram,
            Err(e) => {
                warn!(taxon_id, error = %e, "gram stain guess failed");
                None
            }
        }
    }

    /// Parse `<stem>_genomic.gbff` into replicon rows and derived files.
    async fn parse_replicons(&self, gp: &GenomeProject) -> Result<ParsedGenome> {
        let stem = gp.file_stem();
        let gbff = gp.gpv_directory.join(format!("{stem}_genomic.gbff"));
        if !gbff.is_file() {
            return Err(ParseError::MissingFlatFile(gbff).into());
        }
        let fna = gp.gpv_directory.join(format!("{stem}_genomic.fna"));

        let mut parsed = ParsedGenome::default();
        let mut fasta_sequences: Option<HashMap<String, Vec<u8>>> = None;
        for record in self.parser.parse(&gbff)? {
            let record = record?;
            let rep_type = RepliconType::classify(&record.description);
            parsed.counts.record(rep_type);
            parsed.total_length += record.length;

            let features = record.feature_counts();
            self.store
                .insert_replicon(
                    gp.id,
                    gp.version_id,
                    &RepliconFields {
                        rep_accnum: record.id.clone(),
                        definition: record.description.clone(),
                        rep_type,
                        rep_ginum: record.gi.clone(),
                        file_name: stem.clone(),
                        cds_num: features.cds,
                        gene_num: features.gene,
                        rna_num: features.rna,
                        rep_size: i64::try_from(record.length).unwrap_or(i64::MAX),
                    },
                )
                .await?;

            if record.sequence.is_none() && fasta_sequences.is_none() {
                fasta_sequences = Some(load_fasta(&fna)?);
            }
            let sequence = record.sequence.as_deref().or_else(|| {
                fasta_sequences
                    .as_ref()
                    .and_then(|seqs| seqs.get(&record.id))
                    .map(Vec::as_slice)
            });
            if let Some(seq) = sequence {
                parsed.gc.add(seq);
            }
            if self.config.sync.derive_replicon_files {
                derived::write_replicon_files(&gp.gpv_directory, &record, sequence)?;
            }
            debug!(replicon = %record.id, rep_type = %rep_type, "stored replicon");
        }
        Ok(parsed)
    }
}

/// Sequences from the genome's FASTA, or none when the file is absent.
fn load_fasta(path: &Path) -> Result<HashMap<String, Vec<u8>>> {
    if path.is_file() {
        fasta::read_fasta(path)
    } else {
        debug!(path = %path.display(), "no FASTA companion file");
        Ok(HashMap::new())
    }
}

fn discard_directory(dir: &Path) {
    if let Err(e) = files::remove_path(dir) {
        warn!(dir = %dir.display(), error = %e, "could not remove partial genome directory");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_tally_outcomes() {
        let mut stats = SyncStats::new(VersionId(1));
        stats.record(GenomeOutcome::Created(GpvId(1)));
        stats.record(GenomeOutcome::Cloned(GpvId(2)));
        stats.record(GenomeOutcome::Cloned(GpvId(3)));
        stats.record(GenomeOutcome::Skipped(GpvId(4)));
        assert_eq!((stats.created, stats.cloned, stats.skipped), (1, 2, 1));
        assert!(!stats.is_partial());

        stats
            .errors
            .push(("Escherichia_coli".into(), GenomirrorError::not_found("version", 1)));
        assert!(stats.is_partial());
    }

    #[test]
    fn missing_fasta_companion_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(load_fasta(&tmp.path().join("none.fna")).unwrap().is_empty());
    }
}
