//! Genome project records: create, clone into a later version, remove with
//! re-rooting, and metadata updates.

use std::fs;

use tracing::{debug, error, info, instrument, warn};

use crate::error::{GenomirrorError, LineageError, Result};
use crate::files;
use crate::layout::MirrorLayout;
use crate::lineage;
use crate::store::GenomeStore;
use crate::types::{
    GenomeChecksum, GenomeFields, GenomeMeta, GenomeProject, GpvId, MetaUpdate, NewGenomeProject,
    VersionId, VersionRef,
};
use crate::versions::VersionManager;

#[derive(Clone, Copy)]
pub struct GenomeRecords<'a> {
    store: &'a dyn GenomeStore,
    layout: &'a MirrorLayout,
}

impl std::fmt::Debug for GenomeRecords<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenomeRecords")
            .field("layout", self.layout)
            .finish_non_exhaustive()
    }
}

impl<'a> GenomeRecords<'a> {
    pub fn new(store: &'a dyn GenomeStore, layout: &'a MirrorLayout) -> Self {
        Self { store, layout }
    }

    fn versions(&self) -> VersionManager<'a> {
        VersionManager::new(self.store, self.layout)
    }

    /// Exact natural-key lookup in the referenced version.
    pub async fn find(
        &self,
        assembly_accession: &str,
        asm_name: &str,
        version: VersionRef,
    ) -> Result<Option<GenomeProject>> {
        let version = self.versions().resolve(version).await?;
        self.store
            .find_genome(assembly_accession, asm_name, version)
            .await
    }

    /// Insert a root genome project under `version`.
    ///
    /// The directory is derived from the version directory, the organism
    /// directory name and the assembly's file stem; it is not created here.
    pub async fn create(&self, version: VersionRef, fields: GenomeFields) -> Result<GenomeProject> {
        let version = self.versions().get(version).await?;
        let version_dir = version
            .dl_directory
            .ok_or_else(|| GenomirrorError::not_found("version directory", version.id))?;
        let gpv_directory = MirrorLayout::genome_dir(
            &version_dir,
            &fields.genome_name,
            &fields.assembly_accession,
            &fields.asm_name,
        );
        let gp = self
            .store
            .insert_genome(&NewGenomeProject {
                version_id: version.id,
                gpv_directory,
                prev_gpv: None,
                fields,
            })
            .await?;
        debug!(gpv_id = gp.id.0, version = version.id.0, "created genome project");
        Ok(gp)
    }

    /// Copy `gp` into `target` as a new genome project linked to its root.
    ///
    /// The new row's `prev_gpv` names the root ancestor directly and its
    /// directory is a symlink to the root's directory. Meta, replicons and
    /// checksums are copied under the new ids. Either everything lands or
    /// nothing does, symlink included.
    #[instrument(skip_all, fields(gpv_id = gp.id.0))]
    pub async fn clone_into(&self, gp: &GenomeProject, target: VersionRef) -> Result<GenomeProject> {
        let root = lineage::resolve_root(self.store, gp).await?;
        if files::is_symlink(&root.gpv_directory) || !root.gpv_directory.is_dir() {
            error!(gpv_id = root.id.0, path = %root.gpv_directory.display(), "root directory missing");
            return Err(LineageError::MissingRootDirectory {
                gpv_id: root.id.0,
                path: root.gpv_directory.clone(),
            }
            .into());
        }

        let version = self.versions().get(target).await?;
        let version_dir = version
            .dl_directory
            .ok_or_else(|| GenomirrorError::not_found("version directory", version.id))?;
        let new_dir = MirrorLayout::genome_dir(
            &version_dir,
            &gp.fields.genome_name,
            &gp.fields.assembly_accession,
            &gp.fields.asm_name,
        );
        if files::path_occupied(&new_dir) {
            let stale = fs::read_link(&new_dir).is_ok_and(|t| t == root.gpv_directory)
                && self
                    .store
                    .find_genome(&gp.fields.assembly_accession, &gp.fields.asm_name, version.id)
                    .await?
                    .is_none();
            if !stale {
                return Err(LineageError::Occupied(new_dir).into());
            }
            // Left behind by a clone whose transaction never committed
            warn!(path = %new_dir.display(), "removing stale clone symlink");
            files::remove_symlink(&new_dir)?;
        }

        self.store.begin_transaction().await?;
        let clone = match self.clone_rows(gp, &root, version.id, new_dir).await {
            Ok(clone) => clone,
            Err(e) => {
                self.store.rollback_transaction().await?;
                return Err(e);
            }
        };
        if let Err(e) = self.store.commit_transaction().await {
            let _ = files::remove_symlink(&clone.gpv_directory);
            return Err(e);
        }

        info!(
            gpv_id = clone.id.0,
            root = root.id.0,
            version = version.id.0,
            "cloned genome project"
        );
        Ok(clone)
    }

    async fn clone_rows(
        &self,
        gp: &GenomeProject,
        root: &GenomeProject,
        version: VersionId,
        new_dir: std::path::PathBuf,
    ) -> Result<GenomeProject> {
        let clone = self
            .store
            .insert_genome(&NewGenomeProject {
                version_id: version,
                gpv_directory: new_dir,
                prev_gpv: Some(root.id),
                fields: gp.fields.clone(),
            })
            .await?;

        if let Some(meta) = self.store.get_meta(gp.id).await? {
            self.store
                .put_meta(&GenomeMeta {
                    gpv_id: clone.id,
                    ..meta
                })
                .await?;
        }
        for replicon in self.store.replicons_for_genome(gp.id).await? {
            self.store
                .insert_replicon(clone.id, version, &replicon.fields)
                .await?;
        }
        for checksum in self.store.checksums_for_genome(gp.id).await? {
            self.store
                .insert_checksum(&GenomeChecksum {
                    version_id: version,
                    gpv_id: clone.id,
                    ..checksum
                })
                .await?;
        }

        // Last, so a failure above leaves nothing on disk
        let dir = &clone.gpv_directory;
        if let Some(parent) = dir.parent() {
            fs::create_dir_all(parent).map_err(|e| GenomirrorError::io(parent, e))?;
        }
        files::symlink_dir(&root.gpv_directory, dir).map_err(|e| GenomirrorError::io(dir, e))?;
        Ok(clone)
    }

    /// Remove a genome project and its dependent rows.
    ///
    /// A root with dependents hands its files to the lowest-id dependent,
    /// which becomes the new root; the remaining dependents are re-pointed
    /// at it. With `remove_files`, the genome's own directory or symlink is
    /// deleted afterwards.
    #[instrument(skip_all, fields(gpv_id = id.0))]
    pub async fn remove(&self, id: GpvId, remove_files: bool) -> Result<()> {
        let gp = self
            .store
            .get_genome(id)
            .await?
            .ok_or_else(|| GenomirrorError::not_found("genome project", id))?;
        info!(gpv_id = id.0, remove_files, "removing genome project");

        self.store.begin_transaction().await?;
        let cleared = async {
            let replicons = self.store.delete_replicons(id).await?;
            let checksums = self.store.delete_checksums(id).await?;
            self.store.delete_meta(id).await?;
            debug!(replicons, checksums, "deleted dependent rows");
            Ok::<_, GenomirrorError>(())
        }
        .await;
        if let Err(e) = cleared {
            self.store.rollback_transaction().await?;
            return Err(e);
        }
        self.store.commit_transaction().await?;

        let dependents = self.store.dependents_of(id).await?;
        if gp.is_root() {
            if let Some((new_root, rest)) = dependents.split_first() {
                self.reroot(&gp, new_root, rest).await?;
            }
        } else if !dependents.is_empty() {
            warn!(
                gpv_id = id.0,
                dependents = dependents.len(),
                "non-root genome project has dependents"
            );
        }

        if remove_files {
            if files::remove_path(&gp.gpv_directory)? {
                debug!(path = %gp.gpv_directory.display(), "removed genome files");
            } else {
                warn!(path = %gp.gpv_directory.display(), "genome directory does not exist");
            }
        }

        self.store.begin_transaction().await?;
        if let Err(e) = self.store.delete_genome(id).await {
            self.store.rollback_transaction().await?;
            return Err(e);
        }
        self.store.commit_transaction().await?;
        Ok(())
    }

    /// Promote `new_root` to own a copy of `old`'s files and re-point `rest` at it.
    async fn reroot(
        &self,
        old: &GenomeProject,
        new_root: &GenomeProject,
        rest: &[GenomeProject],
    ) -> Result<()> {
        if files::is_symlink(&old.gpv_directory) || !old.gpv_directory.is_dir() {
            error!(gpv_id = old.id.0, "root directory missing, cannot re-root");
            return Err(LineageError::MissingRootDirectory {
                gpv_id: old.id.0,
                path: old.gpv_directory.clone(),
            }
            .into());
        }
        for dep in std::iter::once(new_root).chain(rest) {
            if !files::is_symlink(&dep.gpv_directory) {
                error!(gpv_id = dep.id.0, path = %dep.gpv_directory.display(), "expected a symlink");
                return Err(LineageError::ExpectedSymlink {
                    gpv_id: dep.id.0,
                    path: dep.gpv_directory.clone(),
                }
                .into());
            }
        }

        self.store.begin_transaction().await?;
        let repointed = async {
            self.store.set_prev_gpv(new_root.id, None).await?;
            for dep in rest {
                self.store.set_prev_gpv(dep.id, Some(new_root.id)).await?;
            }
            Ok::<_, GenomirrorError>(())
        }
        .await;
        if let Err(e) = repointed.and_then(|()| promote_files(old, new_root, rest)) {
            self.store.rollback_transaction().await?;
            return Err(e);
        }
        self.store.commit_transaction().await?;

        info!(
            old_root = old.id.0,
            new_root = new_root.id.0,
            repointed = rest.len(),
            "re-rooted lineage"
        );
        Ok(())
    }

    /// Merge `update` into the genome's meta row, creating it if needed.
    pub async fn update_meta(&self, gpv_id: GpvId, update: MetaUpdate) -> Result<GenomeMeta> {
        if self.store.get_genome(gpv_id).await?.is_none() {
            return Err(GenomirrorError::not_found("genome project", gpv_id));
        }
        let mut meta = self
            .store
            .get_meta(gpv_id)
            .await?
            .unwrap_or_else(|| GenomeMeta {
                gpv_id,
                ..Default::default()
            });
        meta.merge(update);
        self.store.put_meta(&meta).await?;
        Ok(meta)
    }
}

/// Filesystem half of re-rooting. Undoes its own partial work on failure.
fn promote_files(
    old: &GenomeProject,
    new_root: &GenomeProject,
    rest: &[GenomeProject],
) -> Result<()> {
    let restore_new_root = || {
        let _ = files::remove_path(&new_root.gpv_directory);
        let _ = files::symlink_dir(&old.gpv_directory, &new_root.gpv_directory);
    };

    files::remove_symlink(&new_root.gpv_directory)?;
    debug!(
        from = %old.gpv_directory.display(),
        to = %new_root.gpv_directory.display(),
        "copying genome tree to new root"
    );
    if let Err(e) = files::copy_tree(&old.gpv_directory, &new_root.gpv_directory) {
        restore_new_root();
        return Err(e);
    }

    for (i, dep) in rest.iter().enumerate() {
        if let Err(e) = files::replace_symlink(&new_root.gpv_directory, &dep.gpv_directory) {
            for done in &rest[..i] {
                let _ = files::replace_symlink(&old.gpv_directory, &done.gpv_directory);
            }
            restore_new_root();
            return Err(e);
        }
    }
    Ok(())
}

/// Outcome of removing a whole version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeReport {
    pub version_id: VersionId,
    pub genomes_removed: usize,
}

/// Remove every genome project of a version (ascending id), then the version.
#[instrument(skip_all, fields(version = %version))]
pub async fn remove_version_cascade(
    store: &dyn GenomeStore,
    layout: &MirrorLayout,
    version: VersionRef,
    remove_files: bool,
) -> Result<CascadeReport> {
    let versions = VersionManager::new(store, layout);
    let version_id = versions.resolve(version).await?;
    let records = GenomeRecords::new(store, layout);

    let genomes = store.list_genomes(Some(version_id)).await?;
    for gp in &genomes {
        records.remove(gp.id, remove_files).await?;
    }
    versions.remove(VersionRef::Id(version_id), remove_files).await?;

    info!(version = version_id.0, genomes = genomes.len(), "removed version");
    Ok(CascadeReport {
        version_id,
        genomes_removed: genomes.len(),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::store::SqliteStore;
    use crate::types::{GramStain, RepliconFields, RepliconType};

    struct Env {
        _tmp: tempfile::TempDir,
        store: SqliteStore,
        layout: MirrorLayout,
    }

    impl Env {
        fn new() -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let layout = MirrorLayout::new(tmp.path().to_path_buf(), "Bacteria".into(), "Bacteria".into());
            Self {
                _tmp: tmp,
                store: SqliteStore::in_memory().unwrap(),
                layout,
            }
        }

        fn records(&self) -> GenomeRecords<'_> {
            GenomeRecords::new(&self.store, &self.layout)
        }

        async fn version(&self) -> VersionId {
            VersionManager::new(&self.store, &self.layout)
                .create_next()
                .await
                .unwrap()
                .id
        }

        /// A fetched root genome with files, meta, a replicon and a checksum.
        async fn root(&self, version: VersionId) -> GenomeProject {
            let gp = self
                .records()
                .create(
                    VersionRef::Id(version),
                    GenomeFields {
                        assembly_accession: "GCF_000005845.2".into(),
                        asm_name: "ASM584v2".into(),
                        genome_name: "Escherichia_coli".into(),
                        taxid: Some(511_145),
                        file_types: Some(".gbff".into()),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            fs::create_dir_all(&gp.gpv_directory).unwrap();
            fs::write(gp.gpv_directory.join("GCF_000005845.2_ASM584v2_genomic.gbff"), "LOCUS").unwrap();
            self.store
                .insert_replicon(
                    gp.id,
                    version,
                    &RepliconFields {
                        rep_accnum: "NC_000913.3".into(),
                        definition: "Escherichia coli chromosome, complete genome".into(),
                        rep_type: RepliconType::Chromosome,
                        rep_ginum: Some("556503834".into()),
                        file_name: "GCF_000005845.2_ASM584v2".into(),
                        cds_num: 4240,
                        gene_num: 4494,
                        rna_num: 185,
                        rep_size: 4_641_652,
                    },
                )
                .await
                .unwrap();
            self.store
                .insert_checksum(&GenomeChecksum {
                    version_id: version,
                    gpv_id: gp.id,
                    filename: "GCF_000005845.2_ASM584v2_genomic.gbff.gz".into(),
                    checksum: "abc123".into(),
                })
                .await
                .unwrap();
            self.records()
                .update_meta(
                    gp.id,
                    MetaUpdate {
                        chromosome_num: Some(1),
                        gram_stain: Some(GramStain::Negative),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            gp
        }

        async fn assert_lineage_ok(&self) {
            let violations = lineage::verify(&self.store, None).await.unwrap();
            assert!(violations.is_empty(), "{violations:?}");
        }
    }

    fn link_target(path: &Path) -> std::path::PathBuf {
        fs::read_link(path).unwrap()
    }

    #[tokio::test]
    async fn create_derives_directory_and_rejects_duplicates() {
        let env = Env::new();
        let v = env.version().await;
        let gp = env.root(v).await;
        assert!(gp.is_root());
        assert!(gp.gpv_directory.ends_with("Escherichia_coli/GCF_000005845.2_ASM584v2"));

        let err = env
            .records()
            .create(VersionRef::Id(v), gp.fields.clone())
            .await
            .unwrap_err();
        assert!(err.is_integrity());

        let found = env
            .records()
            .find("GCF_000005845.2", "ASM584v2", VersionRef::Current)
            .await
            .unwrap();
        assert_eq!(found, Some(gp));
    }

    #[tokio::test]
    async fn clone_copies_rows_and_links_root() {
        let env = Env::new();
        let v1 = env.version().await;
        let root = env.root(v1).await;
        let v2 = env.version().await;

        let clone = env.records().clone_into(&root, VersionRef::Id(v2)).await.unwrap();
        assert_ne!(clone.id, root.id);
        assert_eq!(clone.version_id, v2);
        assert_eq!(clone.prev_gpv, Some(root.id));
        assert_eq!(clone.fields, root.fields);
        assert_eq!(link_target(&clone.gpv_directory), root.gpv_directory);

        let reps = env.store.replicons_for_genome(clone.id).await.unwrap();
        let orig = env.store.replicons_for_genome(root.id).await.unwrap();
        assert_eq!(reps.len(), 1);
        assert_eq!(reps[0].fields, orig[0].fields);
        assert_eq!(reps[0].version_id, v2);

        let sums = env.store.checksums_for_genome(clone.id).await.unwrap();
        assert_eq!(sums.len(), 1);
        assert_eq!(sums[0].version_id, v2);
        assert_eq!(sums[0].checksum, "abc123");

        let meta = env.store.get_meta(clone.id).await.unwrap().unwrap();
        assert_eq!(meta.chromosome_num, 1);
        assert_eq!(meta.gram_stain, GramStain::Negative);

        env.assert_lineage_ok().await;
    }

    #[tokio::test]
    async fn clone_of_clone_points_at_root() {
        let env = Env::new();
        let v1 = env.version().await;
        let root = env.root(v1).await;
        let v2 = env.version().await;
        let first = env.records().clone_into(&root, VersionRef::Id(v2)).await.unwrap();
        let v3 = env.version().await;
        let second = env.records().clone_into(&first, VersionRef::Id(v3)).await.unwrap();

        assert_eq!(second.prev_gpv, Some(root.id));
        assert_eq!(link_target(&second.gpv_directory), root.gpv_directory);
        env.assert_lineage_ok().await;
    }

    #[tokio::test]
    async fn clone_into_occupied_path_fails_cleanly() {
        let env = Env::new();
        let v1 = env.version().await;
        let root = env.root(v1).await;
        let v2 = env.version().await;
        env.records().clone_into(&root, VersionRef::Id(v2)).await.unwrap();

        let err = env.records().clone_into(&root, VersionRef::Id(v2)).await.unwrap_err();
        assert!(matches!(err, GenomirrorError::Lineage(LineageError::Occupied(_))));
        assert_eq!(env.store.count_genomes(v2).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn clone_replaces_link_left_by_uncommitted_clone() {
        let env = Env::new();
        let v1 = env.version().await;
        let root = env.root(v1).await;
        let v2 = env.version().await;
        let stale = MirrorLayout::genome_dir(
            &VersionManager::new(&env.store, &env.layout).path(VersionRef::Id(v2)).await.unwrap(),
            "Escherichia_coli",
            "GCF_000005845.2",
            "ASM584v2",
        );
        fs::create_dir_all(stale.parent().unwrap()).unwrap();
        files::symlink_dir(&root.gpv_directory, &stale).unwrap();

        let clone = env.records().clone_into(&root, VersionRef::Id(v2)).await.unwrap();
        assert_eq!(clone.gpv_directory, stale);
        assert_eq!(link_target(&stale), root.gpv_directory);
        assert_eq!(env.store.count_genomes(v2).await.unwrap(), 1);
        env.assert_lineage_ok().await;
    }

    #[tokio::test]
    async fn clone_keeps_foreign_link_at_target_path() {
        let env = Env::new();
        let v1 = env.version().await;
        let root = env.root(v1).await;
        let v2 = env.version().await;
        let occupied = MirrorLayout::genome_dir(
            &VersionManager::new(&env.store, &env.layout).path(VersionRef::Id(v2)).await.unwrap(),
            "Escherichia_coli",
            "GCF_000005845.2",
            "ASM584v2",
        );
        fs::create_dir_all(occupied.parent().unwrap()).unwrap();
        let elsewhere = env.layout.base_dir().join("elsewhere");
        fs::create_dir_all(&elsewhere).unwrap();
        files::symlink_dir(&elsewhere, &occupied).unwrap();

        let err = env.records().clone_into(&root, VersionRef::Id(v2)).await.unwrap_err();
        assert!(matches!(err, GenomirrorError::Lineage(LineageError::Occupied(_))));
        assert_eq!(link_target(&occupied), elsewhere);
        assert_eq!(env.store.count_genomes(v2).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_clone_rolls_back_rows_and_symlink() {
        let env = Env::new();
        let v1 = env.version().await;
        let root = env.root(v1).await;
        let v2 = env.version().await;
        // Same key already in the target under a different directory
        let mut fields = root.fields.clone();
        fields.genome_name = "Elsewhere".into();
        env.records().create(VersionRef::Id(v2), fields).await.unwrap();

        let err = env.records().clone_into(&root, VersionRef::Id(v2)).await.unwrap_err();
        assert!(err.is_integrity());
        assert_eq!(env.store.count_genomes(v2).await.unwrap(), 1);
        let would_be = MirrorLayout::genome_dir(
            &VersionManager::new(&env.store, &env.layout).path(VersionRef::Id(v2)).await.unwrap(),
            "Escherichia_coli",
            "GCF_000005845.2",
            "ASM584v2",
        );
        assert!(!files::path_occupied(&would_be));
    }

    #[tokio::test]
    async fn removing_root_promotes_lowest_dependent() {
        let env = Env::new();
        let v1 = env.version().await;
        let root = env.root(v1).await;
        let v2 = env.version().await;
        let a = env.records().clone_into(&root, VersionRef::Id(v2)).await.unwrap();
        let v3 = env.version().await;
        let b = env.records().clone_into(&a, VersionRef::Id(v3)).await.unwrap();

        env.records().remove(root.id, true).await.unwrap();

        assert!(env.store.get_genome(root.id).await.unwrap().is_none());
        assert!(!files::path_occupied(&root.gpv_directory));

        let a = env.store.get_genome(a.id).await.unwrap().unwrap();
        assert!(a.is_root());
        assert!(!files::is_symlink(&a.gpv_directory));
        assert!(a.gpv_directory.join("GCF_000005845.2_ASM584v2_genomic.gbff").is_file());

        let b = env.store.get_genome(b.id).await.unwrap().unwrap();
        assert_eq!(b.prev_gpv, Some(a.id));
        assert_eq!(link_target(&b.gpv_directory), a.gpv_directory);

        assert!(env.store.replicons_for_genome(root.id).await.unwrap().is_empty());
        assert!(env.store.get_meta(root.id).await.unwrap().is_none());
        env.assert_lineage_ok().await;
    }

    #[tokio::test]
    async fn failed_reroot_restores_rows_and_links() {
        let env = Env::new();
        let v1 = env.version().await;
        let root = env.root(v1).await;
        let v2 = env.version().await;
        let a = env.records().clone_into(&root, VersionRef::Id(v2)).await.unwrap();
        let v3 = env.version().await;
        let b = env.records().clone_into(&a, VersionRef::Id(v3)).await.unwrap();
        // Unreadable entry in the root tree makes the copy fail midway
        std::os::unix::fs::symlink(
            env.layout.base_dir().join("no-such-file"),
            root.gpv_directory.join("broken"),
        )
        .unwrap();

        let err = env.records().remove(root.id, true).await.unwrap_err();
        assert!(matches!(err, GenomirrorError::Io { .. }));

        assert!(env.store.get_genome(root.id).await.unwrap().is_some());
        assert!(root.gpv_directory.is_dir());
        for dep in [&a, &b] {
            let dep = env.store.get_genome(dep.id).await.unwrap().unwrap();
            assert_eq!(dep.prev_gpv, Some(root.id));
            assert_eq!(link_target(&dep.gpv_directory), root.gpv_directory);
        }
        env.assert_lineage_ok().await;
    }

    #[tokio::test]
    async fn removing_lone_root_and_clone() {
        let env = Env::new();
        let v1 = env.version().await;
        let root = env.root(v1).await;
        let v2 = env.version().await;
        let clone = env.records().clone_into(&root, VersionRef::Id(v2)).await.unwrap();

        // Removing the clone only unlinks it
        env.records().remove(clone.id, true).await.unwrap();
        assert!(!files::path_occupied(&clone.gpv_directory));
        assert!(root.gpv_directory.is_dir());

        env.records().remove(root.id, false).await.unwrap();
        assert!(root.gpv_directory.is_dir());
        assert_eq!(env.store.stats().await.unwrap().genome_projects, 0);
        env.assert_lineage_ok().await;

        let err = env.records().remove(root.id, false).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn version_cascade_reroots_into_later_version() {
        let env = Env::new();
        let v1 = env.version().await;
        let root = env.root(v1).await;
        let v2 = env.version().await;
        let clone = env.records().clone_into(&root, VersionRef::Id(v2)).await.unwrap();

        let report = remove_version_cascade(&env.store, &env.layout, VersionRef::Id(v1), true)
            .await
            .unwrap();
        assert_eq!(report.genomes_removed, 1);
        assert!(env.store.get_version(v1).await.unwrap().is_none());

        let clone = env.store.get_genome(clone.id).await.unwrap().unwrap();
        assert!(clone.is_root());
        assert!(clone.gpv_directory.is_dir());
        assert_eq!(
            VersionManager::new(&env.store, &env.layout).current().await.unwrap(),
            Some(v2)
        );
        env.assert_lineage_ok().await;
    }

    #[tokio::test]
    async fn update_meta_merges_fields() {
        let env = Env::new();
        let v = env.version().await;
        let gp = env.root(v).await;
        let meta = env
            .records()
            .update_meta(
                gp.id,
                MetaUpdate {
                    plasmid_num: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(meta.chromosome_num, 1);
        assert_eq!(meta.plasmid_num, 2);

        let err = env
            .records()
            .update_meta(GpvId(999), MetaUpdate::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
