mod batch;
mod client;

pub use batch::{BatchDownloadResult, DownloadCoordinator, DownloadOutcome, DownloadRequest};
pub use client::{Downloader, Fetcher};
