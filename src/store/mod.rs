//! Bundle storage: fetch archives and unpack them under the data directory

pub mod corpus;
pub mod http;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;
use crate::language::BundleSpec;

pub use corpus::{BundleStatus, CorpusStore};
pub use http::HttpArchiveSource;

/// Resolves a bundle to a local directory, installing it first if needed
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Must be cheap and side-effect free when the bundle is already installed
    async fn ensure_installed(&self, bundle: &BundleSpec) -> Result<PathBuf>;
}

/// Where bundle archives come from
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    /// Write the complete archive for `bundle` to `dest`
    async fn fetch(&self, bundle: &BundleSpec, dest: &Path) -> Result<()>;
}
