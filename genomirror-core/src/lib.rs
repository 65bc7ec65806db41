//! genomirror core library: versioned mirror of complete bacterial genomes.
//!
//! The main entry point is [`sync::SyncOrchestrator`], which walks the remote
//! genome tree and, per assembly, either fetches and parses it into a new
//! version or clones the previous version's rows and links to its files.
//! All state lives in a [`store::GenomeStore`]; the on-disk tree follows
//! [`layout::MirrorLayout`].

pub mod assembly;
pub mod change;
pub mod config;
pub mod derived;
pub mod error;
pub mod files;
pub mod flatfile;
pub mod layout;
pub mod lineage;
pub mod progress;
pub mod records;
pub mod remote;
pub mod store;
pub mod sync;
pub mod taxonomy;
pub mod types;
pub mod versions;
