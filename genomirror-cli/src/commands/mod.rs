pub mod delete;
pub mod init;
pub mod set_current;
pub mod status;
pub mod sync;
pub mod verify;
pub mod versions;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Subcommand;

use genomirror_core::config::GenomirrorConfig;
use genomirror_core::store::SqliteStore;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a default configuration file
    Init(init::InitArgs),
    /// Mirror the remote genome tree into a new (or the latest) version
    Sync(sync::SyncArgs),
    /// List versions with their genome counts
    Versions(versions::VersionsArgs),
    /// Make a version the current one
    SetCurrent(set_current::SetCurrentArgs),
    /// Remove one genome project, re-rooting its clones if needed
    DeleteGenome(delete::DeleteGenomeArgs),
    /// Remove a version and every genome project in it
    DeleteVersion(delete::DeleteVersionArgs),
    /// Check the symlink lineage of stored genomes
    Verify(verify::VerifyArgs),
    /// Show store statistics
    Status(status::StatusArgs),
}

/// Options shared by every subcommand.
#[derive(Debug)]
pub struct Global {
    pub config: PathBuf,
    pub quiet: bool,
}

pub async fn run(cmd: Command, global: &Global) -> anyhow::Result<()> {
    match cmd {
        Command::Init(args) => init::run(args, global),
        Command::Sync(args) => sync::run(args, global).await,
        Command::Versions(args) => versions::run(args, global).await,
        Command::SetCurrent(args) => set_current::run(args, global).await,
        Command::DeleteGenome(args) => delete::run_genome(args, global).await,
        Command::DeleteVersion(args) => delete::run_version(args, global).await,
        Command::Verify(args) => verify::run(args, global).await,
        Command::Status(args) => status::run(args, global).await,
    }
}

pub fn load_config(path: &Path) -> anyhow::Result<GenomirrorConfig> {
    GenomirrorConfig::load(path)
        .with_context(|| format!("Cannot load config: {}", path.display()))
}

/// Open the configured database, which must already exist.
pub fn open_store(config: &GenomirrorConfig) -> anyhow::Result<SqliteStore> {
    let db_path = config.database_path();
    if !db_path.exists() {
        anyhow::bail!(
            "Database not found: {}. Run `genomirror init` first.",
            db_path.display()
        );
    }
    SqliteStore::open(&db_path)
        .with_context(|| format!("Cannot open database: {}", db_path.display()))
}

/// Ask a yes/no question unless `force` is set.
pub fn confirm(prompt: &str, default: bool, force: bool) -> anyhow::Result<bool> {
    if force {
        return Ok(true);
    }
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(default)
        .interact()
        .context("Cannot read confirmation")
}
