use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::layout::MirrorLayout;

/// Top-level genomirror configuration, matching `genomirror.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenomirrorConfig {
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub remote: RemoteSection,
    #[serde(default)]
    pub taxonomy: TaxonomySection,
    #[serde(default)]
    pub sync: SyncSection,
}

impl GenomirrorConfig {
    /// Read, parse and validate a config file.
    ///
    /// A relative `storage.base_dir` is resolved against the directory
    /// holding the config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.display().to_string())
            } else {
                ConfigError::Invalid(format!("{}: {e}", path.display()))
            }
        })?;
        let mut config = Self::parse(&text)?;
        let base_dir = &config.storage.base_dir;
        if base_dir.is_relative() && !base_dir.as_os_str().is_empty() {
            let joined = path.parent().unwrap_or(Path::new("")).join(base_dir);
            config.storage.base_dir = std::path::absolute(&joined).map_err(|e| {
                ConfigError::Invalid(format!("storage.base_dir {}: {e}", joined.display()))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config = Self::parse(text)?;
        config.validate()?;
        Ok(config)
    }

    fn parse(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.base_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("storage.base_dir is empty".into()));
        }
        // Lineage symlinks store this path verbatim
        if self.storage.base_dir.is_relative() {
            return Err(ConfigError::Invalid(format!(
                "storage.base_dir '{}' must be absolute",
                self.storage.base_dir.display()
            )));
        }
        if self.storage.version_prefix.is_empty() || self.storage.version_prefix.contains('/') {
            return Err(ConfigError::Invalid(format!(
                "storage.version_prefix '{}' must be a plain name",
                self.storage.version_prefix
            )));
        }
        if self.storage.default_link.is_empty() || self.storage.default_link.contains('/') {
            return Err(ConfigError::Invalid(format!(
                "storage.default_link '{}' must be a plain name",
                self.storage.default_link
            )));
        }
        if self.remote.timeout_secs == 0 {
            return Err(ConfigError::Invalid("remote.timeout_secs must be positive".into()));
        }
        if self.taxonomy.enabled && self.taxonomy.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "taxonomy.timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    /// SQLite database path; relative paths resolve against `base_dir`.
    pub fn database_path(&self) -> PathBuf {
        if self.storage.database.is_absolute() {
            self.storage.database.clone()
        } else {
            self.storage.base_dir.join(&self.storage.database)
        }
    }

    pub fn layout(&self) -> MirrorLayout {
        MirrorLayout::new(
            self.storage.base_dir.clone(),
            self.storage.version_prefix.clone(),
            self.storage.default_link.clone(),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Directory holding every version tree, the default link and (by default) the database.
    pub base_dir: PathBuf,
    pub database: PathBuf,
    /// Version directories are named `<prefix>_<YYYY-MM-DD>`.
    pub version_prefix: String,
    /// Name of the stable link pointing at the current version.
    pub default_link: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("/var/lib/genomirror"),
            database: PathBuf::from("genomirror.db"),
            version_prefix: "Bacteria".into(),
            default_link: "Bacteria".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSection {
    pub url: String,
    /// Remote directory whose entries are organism groups.
    pub root_dir: String,
    pub summary_file: String,
    pub checksum_file: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            url: "https://ftp.ncbi.nlm.nih.gov".into(),
            root_dir: "/genomes/refseq/bacteria".into(),
            summary_file: "assembly_summary.txt".into(),
            checksum_file: "md5checksums.txt".into(),
            timeout_secs: 600,
            user_agent: concat!("genomirror/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxonomySection {
    pub enabled: bool,
    pub eutils_url: String,
    /// Contact address NCBI asks E-utilities callers to supply.
    pub email: String,
    pub tool: String,
    pub timeout_secs: u64,
}

impl Default for TaxonomySection {
    fn default() -> Self {
        Self {
            enabled: true,
            eutils_url: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".into(),
            email: String::new(),
            tool: "genomirror".into(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    /// Only summary lines at this assembly level are mirrored.
    pub assembly_level: String,
    /// Top-level remote entries to process; empty means all.
    pub organisms: Vec<String>,
    /// Filename suffixes kept from each checksum manifest; empty means all.
    pub download_suffixes: Vec<String>,
    pub verify_checksums: bool,
    pub derive_replicon_files: bool,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            assembly_level: "Complete Genome".into(),
            organisms: Vec::new(),
            download_suffixes: Vec::new(),
            verify_checksums: true,
            derive_replicon_files: true,
        }
    }
}

impl RemoteSection {
    /// Directory to read instead of the network when `url` is `file://<dir>`.
    pub fn local_root(&self) -> Option<PathBuf> {
        self.url.strip_prefix("file://").map(PathBuf::from)
    }
}

impl SyncSection {
    pub fn wants_organism(&self, name: &str) -> bool {
        self.organisms.is_empty() || self.organisms.iter().any(|o| o == name)
    }

    pub fn wants_file(&self, filename: &str) -> bool {
        self.download_suffixes.is_empty()
            || self
                .download_suffixes
                .iter()
                .any(|suffix| filename.ends_with(suffix.as_str()))
    }
}
