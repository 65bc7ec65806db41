use anyhow::Context;
use clap::Args;

use genomirror_core::records::{GenomeRecords, remove_version_cascade};
use genomirror_core::store::GenomeStore;
use genomirror_core::types::{GpvId, VersionRef};
use genomirror_core::versions::VersionManager;

use super::{Global, confirm};

#[derive(Args, Debug)]
pub struct DeleteGenomeArgs {
    /// Genome project id (gpv_id)
    pub gpv_id: i64,

    /// Do not ask for confirmation
    #[arg(long)]
    pub force: bool,

    /// Also delete the genome's directory or symlink
    #[arg(long)]
    pub remove_files: bool,
}

#[derive(Args, Debug)]
pub struct DeleteVersionArgs {
    /// Version number, `current` or `latest`
    pub version: VersionRef,

    /// Do not ask for confirmation
    #[arg(long)]
    pub force: bool,

    /// Also delete the version's directory tree
    #[arg(long)]
    pub remove_files: bool,
}

/// Without `--remove-files`, an interactive run offers to remove them
/// anyway, defaulting to no.
fn want_files(flag: bool, force: bool) -> anyhow::Result<bool> {
    if flag || force {
        return Ok(flag);
    }
    confirm("Also remove files on disk?", false, false)
}

pub async fn run_genome(args: DeleteGenomeArgs, global: &Global) -> anyhow::Result<()> {
    let config = super::load_config(&global.config)?;
    let store = super::open_store(&config)?;
    let layout = config.layout();

    let id = GpvId(args.gpv_id);
    let gp = store
        .get_genome(id)
        .await?
        .with_context(|| format!("Genome project {id} not found"))?;

    let prompt = format!(
        "Delete genome project {id} ({} {}, version {})?",
        gp.fields.assembly_accession, gp.fields.asm_name, gp.version_id
    );
    if !confirm(&prompt, false, args.force)? {
        println!("Aborted");
        return Ok(());
    }
    let remove_files = want_files(args.remove_files, args.force)?;

    GenomeRecords::new(&store, &layout)
        .remove(id, remove_files)
        .await
        .with_context(|| format!("Cannot delete genome project {id}"))?;

    if !global.quiet {
        println!("Deleted genome project {id}");
    }
    Ok(())
}

pub async fn run_version(args: DeleteVersionArgs, global: &Global) -> anyhow::Result<()> {
    let config = super::load_config(&global.config)?;
    let store = super::open_store(&config)?;
    let layout = config.layout();

    let version = VersionManager::new(&store, &layout)
        .get(args.version)
        .await
        .with_context(|| format!("Cannot find version {}", args.version))?;
    let genomes = store.count_genomes(version.id).await?;

    let prompt = format!(
        "Delete version {} ({}) and its {genomes} genome projects?",
        version.id, version.version_date
    );
    if !confirm(&prompt, false, args.force)? {
        println!("Aborted");
        return Ok(());
    }
    let remove_files = want_files(args.remove_files, args.force)?;

    let report = remove_version_cascade(&store, &layout, VersionRef::Id(version.id), remove_files)
        .await
        .with_context(|| format!("Cannot delete version {}", version.id))?;

    if !global.quiet {
        println!(
            "Deleted version {} ({} genome projects)",
            report.version_id, report.genomes_removed
        );
    }
    Ok(())
}
