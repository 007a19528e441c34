use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use flate2::read::GzDecoder;
use tar::Archive;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::StorageConfig;
use crate::error::{Result, ThaiMtError};
use crate::language::BundleSpec;
use super::{ArchiveSource, ArtifactStore, HttpArchiveSource};

/// On-disk state of one bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleStatus {
    pub name: String,
    pub installed: bool,
    pub archive_cached: bool,
    /// Size of the unpacked bundle in bytes
    pub size_bytes: u64,
}

/// Archive cache + unpacked bundles under one data directory
///
/// ```text
/// <data_dir>/archives/<stem>.tar.gz
/// <data_dir>/<name>/<stem>/{models,vocab,bpe}
/// ```
pub struct CorpusStore {
    data_dir: PathBuf,
    source: Arc<dyn ArchiveSource>,
    install_lock: Mutex<()>,
}

impl CorpusStore {
    pub fn new(data_dir: impl Into<PathBuf>, source: Arc<dyn ArchiveSource>) -> Self {
        Self {
            data_dir: data_dir.into(),
            source,
            install_lock: Mutex::new(()),
        }
    }

    /// Store under the configured data directory, downloading over HTTP
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let source = HttpArchiveSource::new(config)?;
        Ok(Self::new(config.data_dir.clone(), Arc::new(source)))
    }

    pub fn install_dir(&self, bundle: &BundleSpec) -> PathBuf {
        self.data_dir.join(bundle.name)
    }

    pub fn archive_path(&self, bundle: &BundleSpec) -> PathBuf {
        self.data_dir.join("archives").join(bundle.archive_file_name())
    }

    pub fn bundle_status(&self, bundle: &BundleSpec) -> BundleStatus {
        let install_dir = self.install_dir(bundle);
        let installed = install_dir.is_dir();

        let size_bytes = if installed {
            WalkDir::new(&install_dir)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter_map(|entry| entry.metadata().ok())
                .filter(|metadata| metadata.is_file())
                .map(|metadata| metadata.len())
                .sum()
        } else {
            0
        };

        BundleStatus {
            name: bundle.name.to_string(),
            installed,
            archive_cached: self.archive_path(bundle).is_file(),
            size_bytes,
        }
    }

    async fn install(&self, bundle: &BundleSpec) -> Result<PathBuf> {
        let install_dir = self.install_dir(bundle);
        let archive = self.archive_path(bundle);

        if !archive.is_file() {
            info!("Fetching bundle {} v{}", bundle.name, bundle.version);
            if let Some(parent) = archive.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    ThaiMtError::StorageUnavailable(format!("Failed to create {}: {}", parent.display(), e))
                })?;
            }

            self.source.fetch(bundle, &archive).await.map_err(|e| match e {
                ThaiMtError::StorageUnavailable(_) => e,
                other => ThaiMtError::StorageUnavailable(format!("Failed to fetch {}: {}", bundle.name, other)),
            })?;
        } else {
            debug!("Archive for {} already cached at {}", bundle.name, archive.display());
        }

        info!("Unpacking {} into {}", archive.display(), install_dir.display());
        let data_dir = self.data_dir.clone();
        let target = install_dir.clone();
        let name = bundle.name;
        tokio::task::spawn_blocking(move || unpack_atomically(&archive, &data_dir, &target, name))
            .await
            .map_err(|e| ThaiMtError::StorageUnavailable(format!("Unpack task failed: {}", e)))??;

        info!("Bundle {} installed at {}", bundle.name, install_dir.display());
        Ok(install_dir)
    }
}

#[async_trait]
impl ArtifactStore for CorpusStore {
    async fn ensure_installed(&self, bundle: &BundleSpec) -> Result<PathBuf> {
        let install_dir = self.install_dir(bundle);
        if install_dir.is_dir() {
            return Ok(install_dir);
        }

        let _guard = self.install_lock.lock().await;
        // Another caller may have finished while we waited
        if install_dir.is_dir() {
            return Ok(install_dir);
        }

        self.install(bundle).await
    }
}

/// Unpack into a staging directory next to the target, then rename into place.
///
/// A corrupt archive is removed so the next install downloads it again.
fn unpack_atomically(archive: &Path, data_dir: &Path, install_dir: &Path, name: &str) -> Result<()> {
    let storage_err = |what: &str, e: std::io::Error| {
        ThaiMtError::StorageUnavailable(format!("{} for {}: {}", what, name, e))
    };

    std::fs::create_dir_all(data_dir).map_err(|e| storage_err("Failed to create data directory", e))?;
    let staging = tempfile::Builder::new()
        .prefix(&format!(".{}-", name))
        .tempdir_in(data_dir)
        .map_err(|e| storage_err("Failed to create staging directory", e))?;

    let file = File::open(archive).map_err(|e| storage_err("Failed to open archive", e))?;
    if let Err(e) = Archive::new(GzDecoder::new(file)).unpack(staging.path()) {
        warn!("Removing unreadable archive {}", archive.display());
        let _ = std::fs::remove_file(archive);
        return Err(storage_err("Failed to unpack archive", e));
    }

    let staged = staging.into_path();
    if let Err(e) = std::fs::rename(&staged, install_dir) {
        let _ = std::fs::remove_dir_all(&staged);
        if install_dir.is_dir() {
            warn!("{} was installed concurrently, keeping existing copy", name);
            return Ok(());
        }
        return Err(storage_err("Failed to move bundle into place", e));
    }

    Ok(())
}
