//! Checksum-based change detection for one remote assembly.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::assembly::ManifestEntry;
use crate::error::Result;
use crate::store::GenomeStore;
use crate::types::{GenomeChecksum, GenomeProject, VersionId};

/// What the orchestrator should do with one remote assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The version being built already has this assembly (restarted run).
    AlreadyPresent(GenomeProject),
    /// New or modified upstream; fetch and parse it. `previous` is the
    /// current version's row when there is one.
    Changed { previous: Option<GenomeProject> },
    /// Identical to the current version's row; clone it.
    Unchanged(GenomeProject),
}

impl Verdict {
    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed { .. })
    }
}

#[derive(Clone, Copy)]
pub struct ChangeDetector<'a> {
    store: &'a dyn GenomeStore,
}

impl std::fmt::Debug for ChangeDetector<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeDetector").finish_non_exhaustive()
    }
}

impl<'a> ChangeDetector<'a> {
    pub fn new(store: &'a dyn GenomeStore) -> Self {
        Self { store }
    }

    /// Decide between skip, fetch and clone for `accession`/`asm_name`.
    ///
    /// Comparison is against the current version only. A genome is changed
    /// when the current version lacks it or when any advertised file's
    /// checksum is missing or different there.
    pub async fn detect(
        &self,
        assembly_accession: &str,
        asm_name: &str,
        manifest: &[ManifestEntry],
        target: VersionId,
    ) -> Result<Verdict> {
        if let Some(existing) = self
            .store
            .find_genome(assembly_accession, asm_name, target)
            .await?
        {
            debug!(
                gpv_id = existing.id.0,
                version = target.0,
                "assembly already present in target version"
            );
            return Ok(Verdict::AlreadyPresent(existing));
        }

        let Some(current) = self.store.current_version_id().await? else {
            return Ok(Verdict::Changed { previous: None });
        };
        let Some(gp) = self
            .store
            .find_genome(assembly_accession, asm_name, current)
            .await?
        else {
            debug!(assembly_accession, asm_name, "new assembly");
            return Ok(Verdict::Changed { previous: None });
        };

        let rows = self.store.checksums_for_genome(gp.id).await?;
        let stored = stored_checksums(&rows, current);
        if manifest.is_empty() {
            warn!(
                gpv_id = gp.id.0,
                "empty checksum manifest, treating assembly as unchanged"
            );
        }
        if manifest_changed(&stored, manifest) {
            debug!(gpv_id = gp.id.0, "checksums differ from current version");
            Ok(Verdict::Changed { previous: Some(gp) })
        } else {
            Ok(Verdict::Unchanged(gp))
        }
    }
}

fn stored_checksums(rows: &[GenomeChecksum], version: VersionId) -> HashMap<&str, &str> {
    rows.iter()
        .filter(|c| c.version_id == version)
        .map(|c| (c.filename.as_str(), c.checksum.as_str()))
        .collect()
}

/// Whether any advertised file is absent from `stored` or has a different
/// checksum there.
pub fn manifest_changed(stored: &HashMap<&str, &str>, manifest: &[ManifestEntry]) -> bool {
    manifest.iter().any(|entry| {
        stored
            .get(entry.filename.as_str())
            .is_none_or(|known| !known.eq_ignore_ascii_case(&entry.checksum))
    })
}
