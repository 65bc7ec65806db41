use anyhow::Context;
use clap::Args;
use tracing::info;

use genomirror_core::flatfile::genbank::GenbankParser;
use genomirror_core::progress::IndicatifReporter;
use genomirror_core::remote::{HttpsMirror, LocalMirror, RemoteSource};
use genomirror_core::sync::{SyncOrchestrator, VersionMode};
use genomirror_core::taxonomy::{EutilsTaxonomy, TaxonomyDirectory};
use genomirror_core::types::VersionRef;
use genomirror_core::versions::VersionManager;

use super::Global;

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Continue filling the latest version instead of creating a new one
    #[arg(long)]
    pub reuse_latest: bool,

    /// Leave the current version unchanged after the sync
    #[arg(long)]
    pub no_promote: bool,

    /// Only process these top-level remote entries (repeatable)
    #[arg(long = "organism", value_name = "NAME")]
    pub organisms: Vec<String>,

    /// Skip taxonomy lookups
    #[arg(long)]
    pub no_taxonomy: bool,
}

pub async fn run(args: SyncArgs, global: &Global) -> anyhow::Result<()> {
    let mut config = super::load_config(&global.config)?;
    if !args.organisms.is_empty() {
        config.sync.organisms = args.organisms;
    }
    let store = super::open_store(&config)?;

    let remote: Box<dyn RemoteSource> = match config.remote.local_root() {
        Some(root) => Box::new(LocalMirror::new(root)),
        None => Box::new(
            HttpsMirror::new(&config.remote.url, &config.remote.user_agent)
                .context("Cannot set up remote mirror")?,
        ),
    };
    let taxonomy = if config.taxonomy.enabled && !args.no_taxonomy {
        Some(EutilsTaxonomy::new(&config.taxonomy).context("Cannot set up taxonomy lookups")?)
    } else {
        None
    };
    let progress = if global.quiet {
        IndicatifReporter::hidden()
    } else {
        IndicatifReporter::new()
    };

    let parser = GenbankParser;
    let mut orchestrator =
        SyncOrchestrator::new(&store, &config, remote.as_ref(), &parser).with_progress(&progress);
    if let Some(directory) = &taxonomy {
        orchestrator = orchestrator.with_taxonomy(directory as &dyn TaxonomyDirectory);
    }

    let mode = if args.reuse_latest {
        VersionMode::ReuseLatest
    } else {
        VersionMode::CreateNext
    };
    let stats = orchestrator.run(mode).await.context("Sync failed")?;

    let layout = config.layout();
    let versions = VersionManager::new(&store, &layout);
    let promoted = if args.no_promote || stats.is_partial() {
        false
    } else {
        versions
            .set_current(VersionRef::Id(stats.version_id))
            .await
            .context("Cannot promote synced version")?;
        info!(version = stats.version_id.0, "promoted to current");
        true
    };

    if !global.quiet {
        println!("Synced version {}", stats.version_id);
        println!();
        println!("  Organisms:        {}", stats.organisms);
        println!("  Complete genomes: {}", stats.genomes_seen);
        println!("  Fetched:          {}", stats.created);
        println!("  Cloned:           {}", stats.cloned);
        println!("  Already present:  {}", stats.skipped);
        println!("  Incomplete:       {}", stats.incomplete_skipped);
        println!("  Duration:         {:.2?}", stats.duration);
        println!(
            "  Current:          {}",
            if promoted { "promoted" } else { "unchanged" }
        );

        if stats.is_partial() {
            println!();
            println!("  Errors ({}):", stats.errors.len());
            for (item, error) in &stats.errors {
                println!("    - {item}: {error}");
            }
        }
    }

    if stats.is_partial() {
        anyhow::bail!(
            "Sync of version {} ended in partial success: {} errors",
            stats.version_id,
            stats.errors.len()
        );
    }
    Ok(())
}
