use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use genomirror_core::config::GenomirrorConfig;
use genomirror_core::store::SqliteStore;

use super::Global;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory that will hold the version trees and the database
    #[arg(long)]
    pub base_dir: Option<PathBuf>,

    /// Remote base URL (`file://<dir>` reads a local copy of the tree)
    #[arg(long)]
    pub remote_url: Option<String>,

    /// Overwrite an existing configuration file
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: InitArgs, global: &Global) -> anyhow::Result<()> {
    let path = &global.config;
    if path.exists() && !args.force {
        anyhow::bail!(
            "Config already exists: {}. Use --force to overwrite.",
            path.display()
        );
    }

    let mut config = GenomirrorConfig::default();
    if let Some(base_dir) = args.base_dir {
        config.storage.base_dir = std::path::absolute(&base_dir)
            .with_context(|| format!("Cannot resolve path: {}", base_dir.display()))?;
    }
    if let Some(url) = args.remote_url {
        config.remote.url = url;
    }
    config.validate().context("Invalid config")?;

    std::fs::create_dir_all(&config.storage.base_dir).with_context(|| {
        format!(
            "Cannot create base directory: {}",
            config.storage.base_dir.display()
        )
    })?;
    let text = config.to_toml().context("Cannot serialize config")?;
    std::fs::write(path, text)
        .with_context(|| format!("Cannot write config: {}", path.display()))?;

    let db_path = config.database_path();
    SqliteStore::open(&db_path)
        .with_context(|| format!("Cannot open database: {}", db_path.display()))?;

    if !global.quiet {
        println!("Initialized genomirror");
        println!("  Config:   {}", path.display());
        println!("  Base dir: {}", config.storage.base_dir.display());
        println!("  Database: {}", db_path.display());
    }
    Ok(())
}
