//! Record store for versions, genome projects and their dependents.
//!
//! Every service in the crate reads and writes through [`GenomeStore`];
//! [`SqliteStore`] is the production implementation.

pub mod schema;
pub mod sqlite;
pub mod traits;

pub use sqlite::SqliteStore;
pub use traits::GenomeStore;
