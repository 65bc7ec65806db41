use anyhow::Context;
use clap::Args;

use genomirror_core::types::VersionRef;
use genomirror_core::versions::VersionManager;

use super::Global;

#[derive(Args, Debug)]
pub struct SetCurrentArgs {
    /// Version number, `current` or `latest`
    pub version: VersionRef,
}

pub async fn run(args: SetCurrentArgs, global: &Global) -> anyhow::Result<()> {
    let config = super::load_config(&global.config)?;
    let store = super::open_store(&config)?;
    let layout = config.layout();

    let id = VersionManager::new(&store, &layout)
        .set_current(args.version)
        .await
        .with_context(|| format!("Cannot make version {} current", args.version))?;

    if !global.quiet {
        println!("Version {id} is now current");
        println!("  Link: {}", layout.default_link().display());
    }
    Ok(())
}
