// Remote source backed by a local directory laid out like the remote host.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::RemoteSource;
use crate::error::{RemoteError, Result};

#[derive(Debug, Clone)]
pub struct LocalMirror {
    root: PathBuf,
}

impl LocalMirror {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

fn remote_io(path: &str, err: io::Error) -> RemoteError {
    if matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    ) {
        RemoteError::Missing(path.to_string())
    } else {
        RemoteError::Io(err)
    }
}

#[async_trait]
impl RemoteSource for LocalMirror {
    fn name(&self) -> &'static str {
        "local"
    }

    /// Sorted by name, since directory order is unspecified on disk.
    async fn list(&self, dir: &str) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(self.resolve(dir))
            .await
            .map_err(|e| remote_io(dir, e))?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| remote_io(dir, e))? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        debug!(dir, entries = names.len(), "listed local directory");
        Ok(names)
    }

    async fn retrieve_lines(&self, path: &str) -> Result<Vec<String>> {
        let text = tokio::fs::read_to_string(self.resolve(path))
            .await
            .map_err(|e| remote_io(path, e))?;
        Ok(text.lines().map(String::from).collect())
    }

    async fn retrieve_binary(&self, path: &str, dest: &Path) -> Result<u64> {
        let bytes = tokio::fs::copy(self.resolve(path), dest)
            .await
            .map_err(|e| remote_io(path, e))?;
        Ok(bytes)
    }
}
