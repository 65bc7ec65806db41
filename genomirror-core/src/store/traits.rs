use std::path::Path;

use chrono::NaiveDate;

use crate::types::{
    GenomeChecksum, GenomeMeta, GenomeProject, GpvId, GramStain, NewGenomeProject, Replicon,
    RepliconFields, RpvId, StoreStats, Taxonomy, Version, VersionId,
};

/// The store abstraction. Versioning, change detection, cloning and sync all
/// go through this trait.
///
/// Transactions nest: each `begin_transaction` must be paired with exactly one
/// `commit_transaction` or `rollback_transaction`, and rolling back an inner
/// transaction leaves the enclosing one usable.
#[async_trait::async_trait]
pub trait GenomeStore: Send + Sync {
    // ── Transactions ───────────────────────────────────────────────

    async fn begin_transaction(&self) -> crate::error::Result<()>;

    async fn commit_transaction(&self) -> crate::error::Result<()>;

    async fn rollback_transaction(&self) -> crate::error::Result<()>;

    // ── Versions ───────────────────────────────────────────────────

    /// Allocate a new version row dated `date`, not current, with no directory yet.
    async fn insert_version(&self, date: NaiveDate) -> crate::error::Result<VersionId>;

    async fn set_version_directory(&self, id: VersionId, dir: &Path) -> crate::error::Result<()>;

    async fn get_version(&self, id: VersionId) -> crate::error::Result<Option<Version>>;

    /// Highest version id, if any version exists.
    async fn latest_version_id(&self) -> crate::error::Result<Option<VersionId>>;

    async fn current_version_id(&self) -> crate::error::Result<Option<VersionId>>;

    /// All versions in ascending id order.
    async fn list_versions(&self) -> crate::error::Result<Vec<Version>>;

    /// Flag `id` as current and clear the flag everywhere else in one statement.
    async fn mark_current(&self, id: VersionId) -> crate::error::Result<()>;

    /// Returns whether a row was deleted.
    async fn delete_version(&self, id: VersionId) -> crate::error::Result<bool>;

    // ── Genome projects ────────────────────────────────────────────

    /// Insert a genome project. Fails with `StoreError::Integrity` when the
    /// (version, accession, asm_name) key is taken.
    async fn insert_genome(&self, gp: &NewGenomeProject) -> crate::error::Result<GenomeProject>;

    async fn get_genome(&self, id: GpvId) -> crate::error::Result<Option<GenomeProject>>;

    /// Exact lookup by natural key within one version.
    async fn find_genome(
        &self,
        assembly_accession: &str,
        asm_name: &str,
        version: VersionId,
    ) -> crate::error::Result<Option<GenomeProject>>;

    /// Genome projects in ascending id order, restricted to one version if given.
    async fn list_genomes(
        &self,
        version: Option<VersionId>,
    ) -> crate::error::Result<Vec<GenomeProject>>;

    async fn count_genomes(&self, version: VersionId) -> crate::error::Result<u64>;

    /// Genome projects whose `prev_gpv` is `root`, ascending by id.
    async fn dependents_of(&self, root: GpvId) -> crate::error::Result<Vec<GenomeProject>>;

    async fn set_prev_gpv(&self, id: GpvId, prev: Option<GpvId>) -> crate::error::Result<()>;

    async fn set_file_types(&self, id: GpvId, file_types: Option<&str>)
    -> crate::error::Result<()>;

    async fn delete_genome(&self, id: GpvId) -> crate::error::Result<bool>;

    // ── Replicons ──────────────────────────────────────────────────

    async fn insert_replicon(
        &self,
        gpv_id: GpvId,
        version_id: VersionId,
        fields: &RepliconFields,
    ) -> crate::error::Result<RpvId>;

    async fn replicons_for_genome(&self, gpv_id: GpvId) -> crate::error::Result<Vec<Replicon>>;

    async fn delete_replicons(&self, gpv_id: GpvId) -> crate::error::Result<u64>;

    // ── Checksums ──────────────────────────────────────────────────

    async fn insert_checksum(&self, checksum: &GenomeChecksum) -> crate::error::Result<()>;

    async fn checksums_for_genome(
        &self,
        gpv_id: GpvId,
    ) -> crate::error::Result<Vec<GenomeChecksum>>;

    async fn delete_checksums(&self, gpv_id: GpvId) -> crate::error::Result<u64>;

    // ── Genome metadata ────────────────────────────────────────────

    async fn get_meta(&self, gpv_id: GpvId) -> crate::error::Result<Option<GenomeMeta>>;

    /// Insert or fully replace the meta row for `meta.gpv_id`.
    async fn put_meta(&self, meta: &GenomeMeta) -> crate::error::Result<()>;

    async fn delete_meta(&self, gpv_id: GpvId) -> crate::error::Result<bool>;

    // ── Taxonomy ───────────────────────────────────────────────────

    async fn get_taxonomy(&self, taxon_id: i64) -> crate::error::Result<Option<Taxonomy>>;

    /// Insert a lineage; an existing row for the same taxon is left untouched.
    async fn insert_taxonomy(&self, taxonomy: &Taxonomy) -> crate::error::Result<()>;

    async fn set_taxonomy_gram(&self, taxon_id: i64, gram: GramStain)
    -> crate::error::Result<()>;

    // ── Stats ──────────────────────────────────────────────────────

    async fn stats(&self) -> crate::error::Result<StoreStats>;
}
