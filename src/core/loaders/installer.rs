use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use super::context::GameContext;
use super::fabric::{FabricBuild, FabricInstaller};
use super::forge::{ForgeInstallEntry, ForgeInstaller};
use super::processor::ProcessorLogs;
use crate::core::cancel::CancellationToken;
use crate::core::config::InstallerSettings;
use crate::core::downloader::{BatchDownloadResult, Fetcher};
use crate::core::error::LauncherResult;

/// Status label attached to each progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InstallStatus {
    Created,
    WaitingToRun,
    Running,
    /// Also used for the final "complete" event; the `Result` of `install`
    /// is what tells completion and cancellation apart.
    Canceled,
}

/// Payload sent to progress subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstallProgress {
    pub fraction: f64,
    pub message: String,
    pub status: InstallStatus,
}

#[derive(Debug, Default)]
struct ReporterState {
    subscribers: Vec<UnboundedSender<InstallProgress>>,
    last_fraction: f64,
}

/// Fan-out of install progress. Reported fractions never go backwards.
#[derive(Debug, Default)]
pub struct ProgressReporter {
    state: Mutex<ReporterState>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe before calling `install`; earlier events are not replayed.
    pub fn subscribe(&self) -> UnboundedReceiver<InstallProgress> {
        let (tx, rx) = unbounded_channel();
        self.lock().subscribers.push(tx);
        rx
    }

    /// Start a new run from zero. Subscribers stay attached.
    pub fn reset(&self) {
        self.lock().last_fraction = 0.0;
    }

    pub fn report(&self, fraction: f64, message: impl Into<String>, status: InstallStatus) {
        let mut state = self.lock();
        let fraction = fraction.clamp(0.0, 1.0).max(state.last_fraction);
        state.last_fraction = fraction;

        let event = InstallProgress {
            fraction,
            message: message.into(),
            status,
        };
        state
            .subscribers
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ReporterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Map a `[0, 1]` fraction into the `[start, end]` slice of the overall run.
pub fn scale_progress(fraction: f64, start: f64, end: f64) -> f64 {
    start + fraction.clamp(0.0, 1.0) * (end - start)
}

/// `completed / total` as a fraction; an empty batch counts as done.
pub fn ratio(completed: usize, total: usize) -> f64 {
    if total == 0 {
        1.0
    } else {
        completed as f64 / total as f64
    }
}

/// What a successful install leaves behind for the caller to inspect.
#[derive(Debug, Clone, Default)]
pub struct InstallReport {
    pub version_id: String,
    pub downloads: BatchDownloadResult,
    pub processors: ProcessorLogs,
}

impl InstallReport {
    /// True when every library downloaded and no processor wrote to stderr
    /// or exited non-zero.
    pub fn is_clean(&self) -> bool {
        self.downloads.all_succeeded && self.processors.all_clean()
    }
}

/// Staged, cancellable installation of a loader into a game folder.
///
/// `Ok` means the install ran to completion (possibly with recorded partial
/// failures), `Err(Cancelled)` means it stopped at a stage boundary, and any
/// other error is fatal.
#[async_trait]
pub trait InstallerPipeline: Send + Sync {
    fn progress(&self) -> &ProgressReporter;

    async fn install(&self, cancellation: &CancellationToken) -> LauncherResult<InstallReport>;
}

/// Dispatcher without `Box<dyn>`.
pub enum Installer {
    Fabric(FabricInstaller),
    Forge(ForgeInstaller),
}

impl Installer {
    pub fn fabric(
        game: GameContext,
        build: FabricBuild,
        settings: &InstallerSettings,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Installer::Fabric(
            FabricInstaller::new(game, build, fetcher).with_configuration(settings.download.clone()),
        )
    }

    pub fn forge(
        game: GameContext,
        entry: ForgeInstallEntry,
        settings: &InstallerSettings,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Installer::Forge(
            ForgeInstaller::new(game, entry, settings.java_path(), fetcher)
                .with_configuration(settings.download.clone())
                .with_package_dir(settings.package_dir()),
        )
    }

    pub fn subscribe(&self) -> UnboundedReceiver<InstallProgress> {
        self.progress().subscribe()
    }
}

#[async_trait]
impl InstallerPipeline for Installer {
    fn progress(&self) -> &ProgressReporter {
        match self {
            Installer::Fabric(i) => i.progress(),
            Installer::Forge(i) => i.progress(),
        }
    }

    async fn install(&self, cancellation: &CancellationToken) -> LauncherResult<InstallReport> {
        match self {
            Installer::Fabric(i) => i.install(cancellation).await,
            Installer::Forge(i) => i.install(cancellation).await,
        }
    }
}
