use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use tokio::fs as async_fs;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::config::StorageConfig;
use crate::error::{Result, ThaiMtError};
use crate::language::BundleSpec;
use super::ArchiveSource;

/// Downloads bundle archives from a release server
pub struct HttpArchiveSource {
    client: Client,
    base_url: String,
}

impl HttpArchiveSource {
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("thaimt/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(ThaiMtError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn archive_url(&self, bundle: &BundleSpec) -> String {
        format!(
            "{}/{}-v{}/{}",
            self.base_url,
            bundle.name,
            bundle.version,
            bundle.archive_file_name()
        )
    }
}

#[async_trait]
impl ArchiveSource for HttpArchiveSource {
    async fn fetch(&self, bundle: &BundleSpec, dest: &Path) -> Result<()> {
        let url = self.archive_url(bundle);
        info!("Downloading {} from {}", bundle.name, url);

        let mut response = self.client.get(&url).send().await.map_err(|e| {
            ThaiMtError::StorageUnavailable(format!("Request for {} failed: {}", url, e))
        })?;

        if !response.status().is_success() {
            return Err(ThaiMtError::StorageUnavailable(format!(
                "Failed to download bundle {}: HTTP {}",
                bundle.name,
                response.status()
            )));
        }

        let pb = ProgressBar::new(response.content_length().unwrap_or(0));
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }

        // Only a complete download is ever visible at `dest`
        let temp_path = dest.with_extension("part");
        let written = async {
            let mut file = async_fs::File::create(&temp_path).await?;

            while let Some(chunk) = response.chunk().await.map_err(|e| {
                ThaiMtError::StorageUnavailable(format!("Download of {} interrupted: {}", bundle.name, e))
            })? {
                file.write_all(&chunk).await?;
                pb.inc(chunk.len() as u64);
            }

            file.flush().await?;
            Ok::<_, ThaiMtError>(())
        }
        .await;

        if let Err(e) = written {
            pb.abandon();
            let _ = async_fs::remove_file(&temp_path).await;
            return Err(e);
        }

        async_fs::rename(&temp_path, dest).await?;
        pb.finish_with_message(format!("Downloaded {}", bundle.name));
        info!("Saved {} to {}", bundle.name, dest.display());

        Ok(())
    }
}
