pub mod core;

use tracing_subscriber::EnvFilter;

pub use crate::core::cancel::CancellationToken;
pub use crate::core::config::{DownloaderConfiguration, InstallerSettings, MirrorSource};
pub use crate::core::downloader::{BatchDownloadResult, DownloadCoordinator, Downloader, Fetcher};
pub use crate::core::error::{LauncherError, LauncherResult};
pub use crate::core::loaders::{
    FabricBuild, FabricInstaller, ForgeInstallEntry, ForgeInstaller, GameContext, InstallProgress,
    InstallReport, InstallStatus, Installer, InstallerPipeline, ProcessorRunner,
};
pub use crate::core::maven::MavenArtifact;
pub use crate::core::version::{LibraryEntry, LibraryResolver, VersionDescriptor};

/// Install the structured logging subscriber.
///
/// `RUST_LOG` wins when set. Calling this twice, or after the embedding
/// application installed its own subscriber, is a no-op.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,loader_installer=debug")),
        )
        .try_init();
}
