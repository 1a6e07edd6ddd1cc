// ─── Batch Downloads ───
// Bounded-concurrency library downloads with failure aggregation.

use std::collections::HashMap;
use std::path::PathBuf;

use futures_util::stream::{self, StreamExt};
use tracing::{info, warn};

use super::client::Fetcher;
use crate::core::cancel::CancellationToken;
use crate::core::config::DownloaderConfiguration;
use crate::core::version::LibraryEntry;

/// A single file to fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DownloadRequest {
    pub url: String,
    pub dest: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub success: bool,
    pub detail: Option<String>,
}

impl DownloadOutcome {
    fn failed(detail: String) -> Self {
        Self {
            success: false,
            detail: Some(detail),
        }
    }
}

/// Aggregate of one `download_all` call.
#[derive(Debug, Clone, Default)]
pub struct BatchDownloadResult {
    pub total: usize,
    pub completed: usize,
    pub failures: HashMap<DownloadRequest, DownloadOutcome>,
    /// Always equal to `failures.is_empty()`.
    pub all_succeeded: bool,
    /// The batch stopped early because the install was cancelled.
    pub cancelled: bool,
}

impl BatchDownloadResult {
    fn empty(total: usize) -> Self {
        Self {
            total,
            all_succeeded: true,
            ..Self::default()
        }
    }
}

pub struct DownloadCoordinator<'a> {
    fetcher: &'a dyn Fetcher,
    config: &'a DownloaderConfiguration,
}

impl<'a> DownloadCoordinator<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, config: &'a DownloaderConfiguration) -> Self {
        Self { fetcher, config }
    }

    /// One request per entry; mirror mode keeps the relative path and swaps the host.
    pub fn requests_for(&self, entries: &[LibraryEntry]) -> Vec<DownloadRequest> {
        entries
            .iter()
            .map(|entry| DownloadRequest {
                url: if self.config.use_mirror {
                    self.config.mirror.url_for(&entry.relative_path)
                } else {
                    entry.source_url.clone()
                },
                dest: entry.path.clone(),
            })
            .collect()
    }

    pub async fn download_all<P>(
        &self,
        entries: &[LibraryEntry],
        on_progress: P,
        cancellation: &CancellationToken,
    ) -> BatchDownloadResult
    where
        P: Fn(usize, usize) + Send + Sync,
    {
        self.download_requests(self.requests_for(entries), on_progress, cancellation)
            .await
    }

    /// Download every request with at most `concurrency` in flight.
    ///
    /// Individual failures are recorded and never stop the batch. Cancellation
    /// drops in-flight and queued work and returns what finished so far.
    pub async fn download_requests<P>(
        &self,
        requests: Vec<DownloadRequest>,
        on_progress: P,
        cancellation: &CancellationToken,
    ) -> BatchDownloadResult
    where
        P: Fn(usize, usize) + Send + Sync,
    {
        let total = requests.len();
        let mut result = BatchDownloadResult::empty(total);

        info!(
            "Starting batch download: {} files, concurrency={}",
            total,
            self.config.effective_concurrency()
        );

        if cancellation.is_cancelled() {
            result.cancelled = true;
            return result;
        }

        let fetcher = self.fetcher;
        let mut pending = stream::iter(requests)
            .map(|request| async move {
                let outcome = fetcher.download_file(&request.url, &request.dest).await;
                (request, outcome)
            })
            .buffer_unordered(self.config.effective_concurrency());

        loop {
            let next = tokio::select! {
                biased;
                _ = cancellation.cancelled() => {
                    result.cancelled = true;
                    break;
                }
                next = pending.next() => next,
            };

            let Some((request, outcome)) = next else {
                break;
            };

            // Counter and failure map are updated together, one request at a time.
            result.completed += 1;
            if let Err(e) = outcome {
                warn!("Download failed for {}: {}", request.url, e);
                result
                    .failures
                    .insert(request, DownloadOutcome::failed(e.to_string()));
            }

            on_progress(result.completed, total);
        }

        result.all_succeeded = result.failures.is_empty();

        if result.cancelled {
            info!(
                "Batch download cancelled after {}/{} files",
                result.completed, total
            );
        } else {
            info!(
                "Batch download finished: {} files, {} failed",
                total,
                result.failures.len()
            );
        }

        result
    }
}
