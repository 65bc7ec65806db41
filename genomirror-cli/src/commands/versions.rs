use anyhow::Context;
use clap::Args;

use genomirror_core::store::GenomeStore;

use super::Global;

#[derive(Args, Debug)]
pub struct VersionsArgs {
    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: VersionsArgs, global: &Global) -> anyhow::Result<()> {
    let config = super::load_config(&global.config)?;
    let store = super::open_store(&config)?;

    let versions = store
        .list_versions()
        .await
        .context("Failed to list versions")?;
    if args.json {
        let mut rows = Vec::with_capacity(versions.len());
        for version in &versions {
            let genomes = store.count_genomes(version.id).await?;
            rows.push(serde_json::json!({ "version": version, "genomes": genomes }));
        }
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if versions.is_empty() {
        println!("No versions yet. Run `genomirror sync` to create one.");
        return Ok(());
    }

    println!("  {:>4}  {:<10}  {:>7}  directory", "id", "date", "genomes");
    for version in &versions {
        let genomes = store.count_genomes(version.id).await?;
        let marker = if version.is_current { '*' } else { ' ' };
        let dir = version
            .dl_directory
            .as_ref()
            .map_or_else(|| "-".to_string(), |d| d.display().to_string());
        println!(
            "{marker} {:>4}  {}  {genomes:>7}  {dir}",
            version.id.0, version.version_date
        );
    }
    Ok(())
}
