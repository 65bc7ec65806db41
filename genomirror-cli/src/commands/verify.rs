use anyhow::Context;
use clap::Args;

use genomirror_core::lineage;
use genomirror_core::types::VersionRef;
use genomirror_core::versions::VersionManager;

use super::Global;

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Only check this version (number, `current` or `latest`)
    pub version: Option<VersionRef>,
}

pub async fn run(args: VerifyArgs, global: &Global) -> anyhow::Result<()> {
    let config = super::load_config(&global.config)?;
    let store = super::open_store(&config)?;
    let layout = config.layout();

    let scope = match args.version {
        Some(token) => Some(
            VersionManager::new(&store, &layout)
                .resolve(token)
                .await
                .with_context(|| format!("Cannot find version {token}"))?,
        ),
        None => None,
    };

    let violations = lineage::verify(&store, scope)
        .await
        .context("Lineage check failed")?;
    if violations.is_empty() {
        if !global.quiet {
            println!("Lineage OK");
        }
        return Ok(());
    }

    println!("Lineage violations ({}):", violations.len());
    for violation in &violations {
        println!("  - {violation}");
    }
    anyhow::bail!("{} lineage violations", violations.len())
}
