//! Symlink lineage between genome projects.
//!
//! A root genome owns a real directory. Every other genome's directory is a
//! symlink whose target is exactly its root's directory, and its `prev_gpv`
//! names that root directly (one hop, never a chain).

use std::collections::HashSet;
use std::fs;

use tracing::{debug, error};

use crate::error::{GenomirrorError, LineageError, Result};
use crate::files;
use crate::store::GenomeStore;
use crate::types::{GenomeProject, VersionId};

/// Follow `prev_gpv` from `gp` to the genome that owns real files.
///
/// Returns `gp` itself when it is a root. Dangling or cyclic chains are
/// lineage errors.
pub async fn resolve_root(store: &dyn GenomeStore, gp: &GenomeProject) -> Result<GenomeProject> {
    let mut seen = HashSet::from([gp.id]);
    let mut current = gp.clone();
    while let Some(prev) = current.prev_gpv {
        if !seen.insert(prev) {
            error!(gpv_id = gp.id.0, "prev_gpv chain cycles");
            return Err(LineageError::Cycle(gp.id.0).into());
        }
        current = match store.get_genome(prev).await? {
            Some(next) => next,
            None => {
                error!(gpv_id = current.id.0, prev_gpv = prev.0, "prev_gpv dangles");
                return Err(LineageError::MissingRoot {
                    gpv_id: current.id.0,
                    prev_gpv: prev.0,
                }
                .into());
            }
        };
    }
    Ok(current)
}

/// Check the lineage invariant for every genome, or one version's genomes.
///
/// Returns every violation found instead of stopping at the first, so the
/// CLI can report them all.
pub async fn verify(
    store: &dyn GenomeStore,
    scope: Option<VersionId>,
) -> Result<Vec<LineageError>> {
    let genomes = store.list_genomes(scope).await?;
    let mut violations = Vec::new();

    for gp in &genomes {
        let dir = &gp.gpv_directory;
        let Some(prev) = gp.prev_gpv else {
            if dir.is_relative() {
                violations.push(LineageError::RelativeRoot {
                    gpv_id: gp.id.0,
                    path: dir.clone(),
                });
            } else if files::is_symlink(dir) || !dir.is_dir() {
                violations.push(LineageError::MissingRootDirectory {
                    gpv_id: gp.id.0,
                    path: dir.clone(),
                });
            }
            continue;
        };

        if !files::is_symlink(dir) {
            violations.push(LineageError::ExpectedSymlink {
                gpv_id: gp.id.0,
                path: dir.clone(),
            });
            continue;
        }

        let root = match resolve_root(store, gp).await {
            Ok(root) => root,
            Err(GenomirrorError::Lineage(violation)) => {
                violations.push(violation);
                continue;
            }
            Err(e) => return Err(e),
        };
        if root.id != prev {
            violations.push(LineageError::MultiHop {
                gpv_id: gp.id.0,
                prev_gpv: prev.0,
            });
        }

        match fs::read_link(dir) {
            Ok(target) if target == root.gpv_directory => {
                if !dir.is_dir() {
                    violations.push(LineageError::Dangling {
                        gpv_id: gp.id.0,
                        path: dir.clone(),
                    });
                }
            }
            Ok(target) => violations.push(LineageError::WrongTarget {
                gpv_id: gp.id.0,
                expected: root.gpv_directory.clone(),
                actual: target,
            }),
            Err(_) => violations.push(LineageError::ExpectedSymlink {
                gpv_id: gp.id.0,
                path: dir.clone(),
            }),
        }
    }

    debug!(
        genomes = genomes.len(),
        violations = violations.len(),
        "lineage verified"
    );
    Ok(violations)
}
