//! Version lifecycle: allocation, the current pointer, removal.

use std::fs;
use std::path::PathBuf;

use chrono::Local;
use tracing::{debug, info, instrument, warn};

use crate::error::{GenomirrorError, Result};
use crate::files;
use crate::layout::MirrorLayout;
use crate::store::GenomeStore;
use crate::types::{Version, VersionId, VersionRef};

/// Manages version rows and the default-path link that tracks the current one.
#[derive(Clone, Copy)]
pub struct VersionManager<'a> {
    store: &'a dyn GenomeStore,
    layout: &'a MirrorLayout,
}

impl std::fmt::Debug for VersionManager<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionManager")
            .field("layout", self.layout)
            .finish_non_exhaustive()
    }
}

impl<'a> VersionManager<'a> {
    pub fn new(store: &'a dyn GenomeStore, layout: &'a MirrorLayout) -> Self {
        Self { store, layout }
    }

    pub async fn latest(&self) -> Result<Option<VersionId>> {
        self.store.latest_version_id().await
    }

    pub async fn current(&self) -> Result<Option<VersionId>> {
        self.store.current_version_id().await
    }

    /// Turn a version reference into a concrete id that exists in the store.
    pub async fn resolve(&self, token: VersionRef) -> Result<VersionId> {
        let id = match token {
            VersionRef::Id(id) => self.store.get_version(id).await?.map(|v| v.id),
            VersionRef::Current => self.current().await?,
            VersionRef::Latest => self.latest().await?,
        };
        id.ok_or_else(|| GenomirrorError::not_found("version", token))
    }

    /// Resolve a reference and load the version row.
    pub async fn get(&self, token: VersionRef) -> Result<Version> {
        let id = self.resolve(token).await?;
        self.store
            .get_version(id)
            .await?
            .ok_or_else(|| GenomirrorError::not_found("version", id))
    }

    /// The version's download directory.
    pub async fn path(&self, token: VersionRef) -> Result<PathBuf> {
        let version = self.get(token).await?;
        version
            .dl_directory
            .ok_or_else(|| GenomirrorError::not_found("version directory", version.id))
    }

    /// Allocate the next version and create its directory.
    ///
    /// The directory is `<prefix>_<today>`, suffixed with the id when that
    /// path is already taken. The first version ever created becomes current.
    #[instrument(skip_all)]
    pub async fn create_next(&self) -> Result<Version> {
        let today = Local::now().date_naive();

        self.store.begin_transaction().await?;
        let id = match self.allocate(today).await {
            Ok(id) => id,
            Err(e) => {
                self.store.rollback_transaction().await?;
                return Err(e);
            }
        };
        self.store.commit_transaction().await?;

        let version = self
            .store
            .get_version(id)
            .await?
            .ok_or_else(|| GenomirrorError::not_found("version", id))?;
        if let Some(dir) = &version.dl_directory {
            fs::create_dir_all(dir).map_err(|e| GenomirrorError::io(dir, e))?;
        }
        info!(version = id.0, dir = ?version.dl_directory, "created version");

        if self.current().await?.is_none() {
            debug!(version = id.0, "no current version yet, promoting");
            self.set_current(VersionRef::Id(id)).await?;
            return self.get(VersionRef::Id(id)).await;
        }
        Ok(version)
    }

    async fn allocate(&self, today: chrono::NaiveDate) -> Result<VersionId> {
        let id = self.store.insert_version(today).await?;
        let preferred = self.layout.version_dir(today);
        let taken = self
            .store
            .list_versions()
            .await?
            .iter()
            .any(|v| v.id != id && v.dl_directory.as_ref() == Some(&preferred));
        let dir = if taken || files::path_occupied(&preferred) {
            self.layout.version_dir_with_id(today, id)
        } else {
            preferred
        };
        self.store.set_version_directory(id, &dir).await?;
        Ok(id)
    }

    /// Make `token` the current version and point the default link at it.
    ///
    /// The flag flip and the link swap succeed or fail together.
    #[instrument(skip_all, fields(version = %token))]
    pub async fn set_current(&self, token: VersionRef) -> Result<VersionId> {
        let version = self.get(token).await?;
        let previous_target = fs::read_link(self.layout.default_link()).ok();

        self.store.begin_transaction().await?;
        if let Err(e) = self.store.mark_current(version.id).await {
            self.store.rollback_transaction().await?;
            return Err(e);
        }
        if let Some(dir) = &version.dl_directory {
            if let Err(e) = self.link_default(dir) {
                self.store.rollback_transaction().await?;
                return Err(e);
            }
        }
        if let Err(e) = self.store.commit_transaction().await {
            if let Some(old) = previous_target {
                let _ = files::replace_symlink(&old, &self.layout.default_link());
            }
            return Err(e);
        }

        info!(version = version.id.0, "new current version");
        Ok(version.id)
    }

    fn link_default(&self, dir: &std::path::Path) -> Result<()> {
        let link = self.layout.default_link();
        if !dir.exists() {
            warn!(dir = %dir.display(), "version directory missing, default link not updated");
            return Ok(());
        }
        if cfg!(any(unix, windows)) {
            files::replace_symlink(dir, &link)
        } else {
            files::remove_path(&link)?;
            files::copy_tree(dir, &link).map(|_| ())
        }
    }

    /// Delete a version row and optionally its directory tree.
    ///
    /// Genome projects of the version are not touched here; see
    /// [`crate::records::remove_version_cascade`]. When the removed version
    /// was current, the latest remaining version becomes current.
    #[instrument(skip_all, fields(version = %token))]
    pub async fn remove(&self, token: VersionRef, remove_files: bool) -> Result<VersionId> {
        let version = self.get(token).await?;
        let was_current = version.is_current;
        info!(version = version.id.0, remove_files, "removing version");

        self.store.delete_version(version.id).await?;

        if let Some(dir) = version.dl_directory.as_ref().filter(|_| remove_files) {
            if files::remove_path(dir)? {
                debug!(dir = %dir.display(), "removed version directory");
            } else {
                warn!(dir = %dir.display(), "version directory already gone");
            }
        }

        if was_current {
            match self.latest().await? {
                Some(next) => {
                    info!(version = next.0, "promoting latest remaining version");
                    self.set_current(VersionRef::Id(next)).await?;
                }
                None => {
                    let link = self.layout.default_link();
                    if files::is_symlink(&link) {
                        files::remove_symlink(&link)?;
                    }
                }
            }
        }
        Ok(version.id)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    fn layout(base: &std::path::Path) -> MirrorLayout {
        MirrorLayout::new(base.to_path_buf(), "Bacteria".into(), "Bacteria".into())
    }

    #[tokio::test]
    async fn first_version_bootstraps_current() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SqliteStore::in_memory().unwrap();
        let layout = layout(tmp.path());
        let versions = VersionManager::new(&store, &layout);

        assert!(versions.resolve(VersionRef::Current).await.unwrap_err().is_not_found());

        let v1 = versions.create_next().await.unwrap();
        assert!(v1.is_current);
        let dir = v1.dl_directory.clone().unwrap();
        assert!(dir.is_dir());
        assert_eq!(fs::read_link(layout.default_link()).unwrap(), dir);

        let v2 = versions.create_next().await.unwrap();
        assert!(!v2.is_current);
        assert_ne!(v2.dl_directory, v1.dl_directory);
        assert!(
            v2.dl_directory
                .as_ref()
                .unwrap()
                .to_string_lossy()
                .ends_with(&format!("_{}", v2.id))
        );

        assert_eq!(versions.resolve(VersionRef::Current).await.unwrap(), v1.id);
        assert_eq!(versions.resolve(VersionRef::Latest).await.unwrap(), v2.id);
        assert_eq!(versions.resolve(VersionRef::Id(v2.id)).await.unwrap(), v2.id);
        assert!(
            versions
                .resolve(VersionRef::Id(VersionId(99)))
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn set_current_moves_flag_and_link() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SqliteStore::in_memory().unwrap();
        let layout = layout(tmp.path());
        let versions = VersionManager::new(&store, &layout);
        let v1 = versions.create_next().await.unwrap();
        let v2 = versions.create_next().await.unwrap();

        versions.set_current(VersionRef::Latest).await.unwrap();
        assert_eq!(versions.current().await.unwrap(), Some(v2.id));
        assert_eq!(
            fs::read_link(layout.default_link()).unwrap(),
            v2.dl_directory.unwrap()
        );

        let all = store.list_versions().await.unwrap();
        assert_eq!(all.iter().filter(|v| v.is_current).count(), 1);
        assert!(!all.iter().find(|v| v.id == v1.id).unwrap().is_current);
    }

    #[tokio::test]
    async fn failed_link_swap_keeps_previous_current() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SqliteStore::in_memory().unwrap();
        let layout = layout(tmp.path());
        let versions = VersionManager::new(&store, &layout);
        let v1 = versions.create_next().await.unwrap();
        let v2 = versions.create_next().await.unwrap();
        // A plain file where the default link belongs cannot be replaced
        files::remove_symlink(&layout.default_link()).unwrap();
        fs::write(layout.default_link(), "not a link").unwrap();

        versions.set_current(VersionRef::Id(v2.id)).await.unwrap_err();
        assert_eq!(versions.current().await.unwrap(), Some(v1.id));
        let all = store.list_versions().await.unwrap();
        assert_eq!(all.iter().filter(|v| v.is_current).count(), 1);
        assert!(layout.default_link().is_file());
    }

    #[tokio::test]
    async fn removing_current_promotes_latest_remaining() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SqliteStore::in_memory().unwrap();
        let layout = layout(tmp.path());
        let versions = VersionManager::new(&store, &layout);
        let v1 = versions.create_next().await.unwrap();
        let v2 = versions.create_next().await.unwrap();
        let v3 = versions.create_next().await.unwrap();
        versions.set_current(VersionRef::Id(v3.id)).await.unwrap();

        versions.remove(VersionRef::Current, true).await.unwrap();
        assert!(!v3.dl_directory.unwrap().exists());
        assert_eq!(versions.current().await.unwrap(), Some(v2.id));
        assert_eq!(
            fs::read_link(layout.default_link()).unwrap(),
            v2.dl_directory.clone().unwrap()
        );

        // Removing a non-current version leaves the pointer alone
        versions.remove(VersionRef::Id(v1.id), false).await.unwrap();
        assert!(v1.dl_directory.unwrap().exists());
        assert_eq!(versions.current().await.unwrap(), Some(v2.id));

        versions.remove(VersionRef::Id(v2.id), false).await.unwrap();
        assert_eq!(versions.current().await.unwrap(), None);
        assert!(!files::path_occupied(&layout.default_link()));

        let err = versions.remove(VersionRef::Id(v2.id), false).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
