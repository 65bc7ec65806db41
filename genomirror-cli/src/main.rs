use std::path::PathBuf;

use clap::Parser;

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "genomirror",
    version,
    about = "Keep a versioned local mirror of NCBI complete bacterial genomes"
)]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,

    /// Path to the configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "GENOMIRROR_CONFIG",
        default_value = "genomirror.toml"
    )]
    config: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,
}

/// Map an error to the process exit code.
///
///   0  success
///   1  general/unknown error
///   2  configuration error
///   4  database error
///   5  remote transfer error
///   10 partial success (some genomes failed, the rest were synced)
fn classify_exit_code(err: &anyhow::Error) -> i32 {
    let msg = format!("{err:#}");
    let lower = msg.to_lowercase();

    if lower.contains("partial success") {
        10
    } else if lower.contains("config") {
        2
    } else if lower.contains("database")
        || lower.contains("sqlite")
        || lower.contains("migration failed")
    {
        4
    } else if lower.contains("http")
        || lower.contains("remote path")
        || lower.contains("timed out")
    {
        5
    } else {
        1
    }
}

fn main() {
    let cli = Cli::parse();

    let filter = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (_, 0) => "warn",
        (_, 1) => "info",
        (_, 2) => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    // reqwest is built without a default crypto provider.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: Failed to create runtime: {e}");
            std::process::exit(1);
        }
    };

    let global = commands::Global {
        config: cli.config,
        quiet: cli.quiet,
    };
    match runtime.block_on(commands::run(cli.command, &global)) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(classify_exit_code(&e));
        }
    }
}
