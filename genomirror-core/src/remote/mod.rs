// Remote genome repository access: the transfer trait, its HTTPS and
// local-directory implementations, and per-operation timeouts.

pub mod https;
pub mod local;

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{RemoteError, Result};

pub use https::HttpsMirror;
pub use local::LocalMirror;

/// Read-only view of a remote tree laid out like NCBI's genomes area.
///
/// Paths are absolute remote paths (`/genomes/refseq/bacteria/...`).
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Entry names directly under `dir`, in listing order.
    async fn list(&self, dir: &str) -> Result<Vec<String>>;

    /// A text file's lines, without line terminators.
    async fn retrieve_lines(&self, path: &str) -> Result<Vec<String>>;

    /// Copy a file's bytes to `dest`, returning the number written.
    async fn retrieve_binary(&self, path: &str, dest: &Path) -> Result<u64>;
}

/// Join a remote directory and an entry name with exactly one `/`.
pub fn join(dir: &str, name: &str) -> String {
    format!(
        "{}/{}",
        dir.trim_end_matches('/'),
        name.trim_start_matches('/')
    )
}

/// Run one remote operation under a deadline.
pub async fn with_timeout<T>(
    timeout: Duration,
    path: &str,
    op: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(timeout, op).await {
        Ok(result) => result,
        Err(_) => Err(RemoteError::Timeout {
            path: path.to_string(),
            secs: timeout.as_secs(),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenomirrorError;

    #[test]
    fn joins_with_single_slash() {
        assert_eq!(join("/genomes/", "/x"), "/genomes/x");
        assert_eq!(join("/genomes", "x"), "/genomes/x");
    }

    #[tokio::test]
    async fn slow_operations_time_out() {
        let err = with_timeout(Duration::from_millis(10), "/slow", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            GenomirrorError::Remote(RemoteError::Timeout { ref path, .. }) if path == "/slow"
        ));

        let ok = with_timeout(Duration::from_secs(1), "/fast", async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(ok, 7);
    }
}
