use anyhow::Context;
use clap::Args;

use genomirror_core::store::GenomeStore;

use super::Global;

#[derive(Args, Debug)]
pub struct StatusArgs {}

pub async fn run(_args: StatusArgs, global: &Global) -> anyhow::Result<()> {
    let config = super::load_config(&global.config)?;
    let store = super::open_store(&config)?;

    let stats = store.stats().await.context("Failed to read store stats")?;
    let current = store.current_version_id().await?;
    let latest = store.latest_version_id().await?;

    println!("genomirror status");
    println!();
    println!("  Base dir: {}", config.storage.base_dir.display());
    println!("  Database: {}", config.database_path().display());
    if stats.db_size_bytes > 0 {
        println!("  Size:     {}", format_bytes(stats.db_size_bytes));
    }
    println!();
    println!(
        "  Current version: {}",
        current.map_or_else(|| "(none)".to_string(), |v| v.to_string())
    );
    println!(
        "  Latest version:  {}",
        latest.map_or_else(|| "(none)".to_string(), |v| v.to_string())
    );
    println!();
    println!("  Versions:        {:>8}", stats.versions);
    println!(
        "  Genome projects: {:>8} ({} roots)",
        stats.genome_projects, stats.root_genome_projects
    );
    println!("  Replicons:       {:>8}", stats.replicons);
    println!("  Checksums:       {:>8}", stats.checksums);
    println!("  Taxa:            {:>8}", stats.taxa);
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_sizes_are_human_readable() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
