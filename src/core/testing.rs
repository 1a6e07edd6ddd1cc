// Test doubles shared across module tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::cancel::CancellationToken;
use crate::core::downloader::Fetcher;
use crate::core::error::{LauncherError, LauncherResult};

/// Scripted fetcher: exact-url bodies, substring failures, and a stub body
/// for everything else.
#[derive(Default)]
pub struct FakeFetcher {
    files: HashMap<String, Vec<u8>>,
    texts: HashMap<String, String>,
    failing: Vec<String>,
    cancel_on: Option<(String, CancellationToken)>,
    requested: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, needle: &str) -> Self {
        self.failing.push(needle.to_string());
        self
    }

    /// Cancel `token` when a url containing `needle` is requested. The request
    /// itself still succeeds.
    pub fn cancelling_on(mut self, needle: &str, token: &CancellationToken) -> Self {
        self.cancel_on = Some((needle.to_string(), token.clone()));
        self
    }

    pub fn with_file(mut self, url: &str, body: Vec<u8>) -> Self {
        self.files.insert(url.to_string(), body);
        self
    }

    pub fn with_text(mut self, url: &str, body: &str) -> Self {
        self.texts.insert(url.to_string(), body.to_string());
        self
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    fn record(&self, url: &str) -> LauncherResult<()> {
        self.requested.lock().unwrap().push(url.to_string());
        if let Some((needle, token)) = &self.cancel_on {
            if url.contains(needle.as_str()) {
                token.cancel();
            }
        }
        if self.failing.iter().any(|needle| url.contains(needle)) {
            return Err(LauncherError::DownloadFailed {
                url: url.to_string(),
                status: 404,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn download_file(&self, url: &str, dest: &Path) -> LauncherResult<()> {
        self.record(url)?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let body = self
            .files
            .get(url)
            .cloned()
            .unwrap_or_else(|| b"stub".to_vec());
        std::fs::write(dest, body)?;
        Ok(())
    }

    async fn fetch_text(&self, url: &str) -> LauncherResult<String> {
        self.record(url)?;
        self.texts.get(url).cloned().ok_or(LauncherError::DownloadFailed {
            url: url.to_string(),
            status: 404,
        })
    }
}

/// Write a zip archive with the given `(name, contents)` entries.
pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    for (name, contents) in entries {
        zip.start_file(*name, zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(contents).unwrap();
    }
    zip.finish().unwrap();
}

/// In-memory zip bytes, for fetchers that serve archives.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("archive.zip");
    write_zip(&path, entries);
    std::fs::read(path).unwrap()
}
