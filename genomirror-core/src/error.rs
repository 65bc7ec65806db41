use std::path::PathBuf;

/// Top-level genomirror error type.
///
/// All fallible operations in `genomirror-core` return [`Result<T, GenomirrorError>`](Result).
/// Each variant wraps a concern-specific error enum so callers (the sync
/// orchestrator, the CLI) can decide per genome whether to continue or abort.
#[derive(thiserror::Error, Debug)]
pub enum GenomirrorError {
    /// Error from the record store layer (`SQLite` operations, uniqueness).
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// An entity the operation requires does not exist.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Kind of entity (version, genome project, replicon, taxonomy).
        entity: &'static str,
        /// The key that was looked up.
        key: String,
    },

    /// Error talking to the remote genome repository.
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Malformed summary, checksum manifest or flat file.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Error from the taxonomy directory service.
    #[error("Taxonomy error: {0}")]
    Taxonomy(#[from] TaxonomyError),

    /// The symlink lineage between genome projects is broken.
    #[error("Lineage invariant violated: {0}")]
    Lineage(#[from] LineageError),

    /// Error in configuration parsing or validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Filesystem operation failed on a specific path.
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        /// Path the operation was acting on.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

impl GenomirrorError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::Taxonomy(TaxonomyError::NotFound(_))
        )
    }

    /// Uniqueness violation on create; the caller should re-fetch the row.
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Store(StoreError::Integrity(_)))
    }

    /// Whether the whole run must stop rather than skip the current genome.
    ///
    /// Only configuration and store-connection failures are fatal.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Store(StoreError::Open { .. } | StoreError::Migration(_))
        )
    }
}

/// Errors from the SQLite-backed record store.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// Underlying `SQLite` operation failed.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The database file could not be opened.
    #[error("Cannot open database {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },

    /// Schema migration failed (version mismatch or DDL error).
    #[error("Migration failed: {0}")]
    Migration(String),

    /// An insert would violate a uniqueness constraint.
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// An insert failed for a reason other than uniqueness.
    #[error("Creation error: {0}")]
    Creation(String),
}

impl StoreError {
    /// Classify an insert failure into `Integrity` or `Creation`.
    pub fn from_insert(entity: &str, err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::Integrity(format!("{entity}: {err}"))
            }
            _ => Self::Creation(format!("{entity}: {err}")),
        }
    }
}

/// Errors from the remote transfer layer.
#[derive(thiserror::Error, Debug)]
pub enum RemoteError {
    /// Network-level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote returned a non-success status.
    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    /// The path does not exist on the remote.
    #[error("Remote path not found: {0}")]
    Missing(String),

    /// A remote operation did not finish within the configured timeout.
    #[error("Timed out after {secs}s: {path}")]
    Timeout { path: String, secs: u64 },

    /// Local I/O while receiving remote content.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A remote path could not be joined onto the mirror's base URL.
    #[error("Bad remote path '{path}': {reason}")]
    BadPath { path: String, reason: String },

    /// The summary advertised no usable remote location for an assembly.
    #[error("No remote path for assembly {0}")]
    NoRemotePath(String),

    /// Downloaded bytes do not hash to the advertised checksum.
    #[error("Checksum mismatch for {filename}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        filename: String,
        expected: String,
        actual: String,
    },
}

/// Errors from parsing remote manifests and genome flat files.
#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    /// An assembly summary line had too few columns or an unreadable field.
    #[error("Bad assembly summary line ({reason}): {line}")]
    Summary { line: String, reason: String },

    /// A checksum manifest line did not have a checksum and a path.
    #[error("Bad checksum line: {0}")]
    Checksum(String),

    /// A GenBank flat file could not be read.
    #[error("Flat file error in {} at line {line}: {message}", .path.display())]
    FlatFile {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// The genome directory has no flat file to parse.
    #[error("Missing flat file: {}", .0.display())]
    MissingFlatFile(PathBuf),
}

/// Errors from the taxonomy directory service.
#[derive(thiserror::Error, Debug)]
pub enum TaxonomyError {
    /// The directory has no record for this taxon id.
    #[error("Taxon {0} not found")]
    NotFound(i64),

    /// Network-level failure reaching the directory.
    #[error("Network error: {0}")]
    Network(String),

    /// The directory response was not the expected XML.
    #[error("XML error: {0}")]
    Xml(String),
}

/// Violations of the genome-project symlink lineage.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LineageError {
    /// `prev_gpv` points at a row that does not exist.
    #[error("gpv_id {gpv_id} points to missing root gpv_id {prev_gpv}")]
    MissingRoot { gpv_id: i64, prev_gpv: i64 },

    /// `prev_gpv` points at a row that is not itself a root.
    #[error("gpv_id {gpv_id} points to non-root gpv_id {prev_gpv}")]
    MultiHop { gpv_id: i64, prev_gpv: i64 },

    /// Following `prev_gpv` revisits a row.
    #[error("prev_gpv chain from gpv_id {0} cycles")]
    Cycle(i64),

    /// A non-root genome's directory is not a symlink.
    #[error("Expected symlink for gpv_id {gpv_id} at {}", .path.display())]
    ExpectedSymlink { gpv_id: i64, path: PathBuf },

    /// A root genome's directory is missing or is itself a symlink.
    #[error("Root gpv_id {gpv_id} has no real directory at {}", .path.display())]
    MissingRootDirectory { gpv_id: i64, path: PathBuf },

    /// A root genome's directory is stored as a relative path.
    #[error("Root gpv_id {gpv_id} has a relative directory {}", .path.display())]
    RelativeRoot { gpv_id: i64, path: PathBuf },

    /// A non-root genome's symlink does not resolve to a directory.
    #[error("Symlink for gpv_id {gpv_id} at {} dangles", .path.display())]
    Dangling { gpv_id: i64, path: PathBuf },

    /// A symlink resolves somewhere other than its root's directory.
    #[error("Symlink for gpv_id {gpv_id} targets {} instead of {}", .actual.display(), .expected.display())]
    WrongTarget {
        gpv_id: i64,
        expected: PathBuf,
        actual: PathBuf,
    },

    /// The target path for a new clone is already occupied.
    #[error("Clone path already exists: {}", .0.display())]
    Occupied(PathBuf),
}

/// Errors in genomirror configuration parsing and validation.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The configuration file does not exist at the expected path.
    #[error("Config file not found: {0}")]
    NotFound(String),

    /// Configuration values are present but semantically invalid.
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// Configuration file syntax could not be parsed (TOML error).
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Convenience alias for `Result<T, GenomirrorError>`.
pub type Result<T> = std::result::Result<T, GenomirrorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_violation_maps_to_integrity() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (k TEXT UNIQUE); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err = conn
            .execute("INSERT INTO t VALUES ('a')", [])
            .unwrap_err();
        let mapped = GenomirrorError::from(StoreError::from_insert("t", err));
        assert!(mapped.is_integrity());
        assert!(!mapped.is_fatal());
    }

    #[test]
    fn bad_remote_paths_skip_one_genome() {
        let err = GenomirrorError::from(RemoteError::BadPath {
            path: "//[bad/GCF_1.1_A".into(),
            reason: "invalid IPv6 address".into(),
        });
        assert!(!err.is_fatal());
    }

    #[test]
    fn config_errors_are_fatal() {
        let err = GenomirrorError::from(ConfigError::Invalid("base_dir".into()));
        assert!(err.is_fatal());
        assert!(!GenomirrorError::not_found("version", 3).is_fatal());
        assert!(GenomirrorError::not_found("version", 3).is_not_found());
    }
}
