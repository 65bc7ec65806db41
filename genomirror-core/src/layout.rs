//! On-disk layout of the mirror.
//!
//! ```text
//! <base_dir>/
//!   <default_link> -> <base_dir>/<prefix>_2026-10-18  stable link to the current version
//!   <prefix>_2026-10-18/
//!     Escherichia_coli/
//!       GCF_000005845.2_ASM584v2/             real directory (root genome)
//!   <prefix>_2026-11-01/
//!     Escherichia_coli/
//!       GCF_000005845.2_ASM584v2 -> <base_dir>/<prefix>_2026-10-18/Escherichia_coli/GCF_...
//! ```
//!
//! Symlinks always hold the absolute path of the root genome's directory.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::types::{VersionId, file_stem};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorLayout {
    base_dir: PathBuf,
    version_prefix: String,
    default_link: String,
}

impl MirrorLayout {
    /// A relative `base_dir` is made absolute against the working directory.
    pub fn new(base_dir: PathBuf, version_prefix: String, default_link: String) -> Self {
        let base_dir = std::path::absolute(&base_dir).unwrap_or(base_dir);
        Self {
            base_dir,
            version_prefix,
            default_link,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Date-stamped directory for a version created on `date`.
    pub fn version_dir(&self, date: NaiveDate) -> PathBuf {
        self.base_dir
            .join(format!("{}_{}", self.version_prefix, date.format("%Y-%m-%d")))
    }

    /// Fallback when two versions are created on the same day.
    pub fn version_dir_with_id(&self, date: NaiveDate, id: VersionId) -> PathBuf {
        self.base_dir.join(format!(
            "{}_{}_{id}",
            self.version_prefix,
            date.format("%Y-%m-%d")
        ))
    }

    /// The stable path that always resolves to the current version.
    pub fn default_link(&self) -> PathBuf {
        self.base_dir.join(&self.default_link)
    }

    /// `<version_dir>/<genome_name>/<accession>_<asm_name>`.
    pub fn genome_dir(
        version_dir: &Path,
        genome_name: &str,
        assembly_accession: &str,
        asm_name: &str,
    ) -> PathBuf {
        version_dir
            .join(genome_name)
            .join(file_stem(assembly_accession, asm_name))
    }
}
