use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http::build_http_client;

/// Network seam used by the download coordinator and the installers.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Download `url` into `dest`, creating parent directories as needed.
    async fn download_file(&self, url: &str, dest: &Path) -> LauncherResult<()>;

    /// Fetch a small text document (metadata JSON).
    async fn fetch_text(&self, url: &str) -> LauncherResult<String>;
}

/// reqwest-backed fetcher.
pub struct Downloader {
    client: Client,
}

impl Downloader {
    pub fn new() -> LauncherResult<Self> {
        Ok(Self {
            client: build_http_client()?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for Downloader {
    async fn download_file(&self, url: &str, dest: &Path) -> LauncherResult<()> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;

        // Write inside a block so the handle is dropped before returning
        {
            let mut file = tokio::fs::File::create(dest)
                .await
                .map_err(|e| LauncherError::io(dest, e))?;
            file.write_all(&bytes)
                .await
                .map_err(|e| LauncherError::io(dest, e))?;
            file.flush().await.map_err(|e| LauncherError::io(dest, e))?;
        }

        debug!("Downloaded: {} -> {:?}", url, dest);
        Ok(())
    }

    async fn fetch_text(&self, url: &str) -> LauncherResult<String> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}
