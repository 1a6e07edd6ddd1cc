use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::context::GameContext;
use super::installer::{
    ratio, scale_progress, InstallReport, InstallStatus, InstallerPipeline, ProgressReporter,
};
use crate::core::cancel::CancellationToken;
use crate::core::config::DownloaderConfiguration;
use crate::core::downloader::{DownloadCoordinator, Fetcher};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::FABRIC_META;
use crate::core::version::{LibraryResolver, VersionDescriptor};

/// The loader build selected for installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FabricBuild {
    pub minecraft_version: String,
    pub loader_version: String,
}

/// One row of the Fabric Meta loader listing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FabricBuildEntry {
    pub loader: FabricLoaderVersion,
    #[serde(default)]
    pub intermediary: Option<FabricIntermediary>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FabricLoaderVersion {
    #[serde(default = "default_separator")]
    pub separator: String,
    #[serde(default)]
    pub build: u32,
    pub maven: String,
    pub version: String,
    #[serde(default)]
    pub stable: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FabricIntermediary {
    pub maven: String,
    pub version: String,
}

fn default_separator() -> String {
    ".".to_string()
}

impl FabricBuildEntry {
    pub fn to_build(&self, minecraft_version: &str) -> FabricBuild {
        FabricBuild {
            minecraft_version: minecraft_version.to_string(),
            loader_version: self.loader.version.clone(),
        }
    }

    fn version_parts(&self) -> Vec<u64> {
        let normalized = if self.loader.separator.is_empty() {
            self.loader.version.clone()
        } else {
            self.loader.version.replace(&self.loader.separator, ".")
        };
        parse_numeric_version_parts(&normalized)
    }
}

fn parse_numeric_version_parts(raw: &str) -> Vec<u64> {
    raw.split(|c: char| !c.is_ascii_digit())
        .filter(|segment| !segment.is_empty())
        .filter_map(|segment| segment.parse::<u64>().ok())
        .collect()
}

fn compare_version_parts(a: &[u64], b: &[u64]) -> Ordering {
    let max_len = a.len().max(b.len());
    for idx in 0..max_len {
        let a_val = a.get(idx).copied().unwrap_or(0);
        let b_val = b.get(idx).copied().unwrap_or(0);
        match a_val.cmp(&b_val) {
            Ordering::Equal => continue,
            non_eq => return non_eq,
        }
    }
    Ordering::Equal
}

/// Sort newest loader first.
pub fn sort_builds_descending(entries: &mut [FabricBuildEntry]) {
    entries.sort_by(|a, b| compare_version_parts(&b.version_parts(), &a.version_parts()));
}

/// Installs Fabric from the Fabric Meta profile JSON.
pub struct FabricInstaller {
    game: GameContext,
    build: FabricBuild,
    custom_id: Option<String>,
    configuration: DownloaderConfiguration,
    fetcher: Arc<dyn Fetcher>,
    progress: ProgressReporter,
}

impl FabricInstaller {
    pub fn new(game: GameContext, build: FabricBuild, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            game,
            build,
            custom_id: None,
            configuration: DownloaderConfiguration::default(),
            fetcher,
            progress: ProgressReporter::new(),
        }
    }

    pub fn with_custom_id(mut self, id: impl Into<String>) -> Self {
        self.custom_id = Some(id.into());
        self
    }

    pub fn with_configuration(mut self, configuration: DownloaderConfiguration) -> Self {
        self.configuration = configuration;
        self
    }

    pub fn profile_url(build: &FabricBuild) -> String {
        format!(
            "{}/versions/loader/{}/{}/profile/json",
            FABRIC_META, build.minecraft_version, build.loader_version
        )
    }

    /// All loader builds for a Minecraft version, newest first.
    pub async fn list_builds_for_version(
        fetcher: &dyn Fetcher,
        minecraft_version: &str,
    ) -> LauncherResult<Vec<FabricBuildEntry>> {
        let url = format!("{}/versions/loader/{}", FABRIC_META, minecraft_version);
        let raw = fetcher
            .fetch_text(&url)
            .await
            .map_err(|e| LauncherError::MetadataFetch(format!("{url}: {e}")))?;

        let mut entries: Vec<FabricBuildEntry> = serde_json::from_str(&raw)
            .map_err(|e| LauncherError::MetadataFetch(format!("{url}: {e}")))?;
        sort_builds_descending(&mut entries);
        Ok(entries)
    }

    async fn fetch_profile(&self) -> LauncherResult<VersionDescriptor> {
        let url = Self::profile_url(&self.build);
        let raw = self
            .fetcher
            .fetch_text(&url)
            .await
            .map_err(|e| LauncherError::MetadataFetch(format!("{url}: {e}")))?;

        VersionDescriptor::parse(&raw)
            .map_err(|e| LauncherError::MetadataFetch(format!("{url}: {e}")))
    }
}

#[async_trait]
impl InstallerPipeline for FabricInstaller {
    fn progress(&self) -> &ProgressReporter {
        &self.progress
    }

    async fn install(&self, cancellation: &CancellationToken) -> LauncherResult<InstallReport> {
        info!(
            "Installing Fabric {} for Minecraft {}",
            self.build.loader_version, self.build.minecraft_version
        );

        self.progress.reset();

        // 1. Profile
        cancellation.check()?;
        self.progress
            .report(0.0, "Start parse build", InstallStatus::Created);
        let mut profile = self.fetch_profile().await?;
        let mut libraries = LibraryResolver::resolve(&profile.libraries, &self.game.root)?;
        libraries.retain(|lib| lib.is_required_on_client());

        // 2. Libraries
        cancellation.check()?;
        self.progress.report(
            0.25,
            "Start downloading dependent resources",
            InstallStatus::WaitingToRun,
        );
        let downloads = DownloadCoordinator::new(self.fetcher.as_ref(), &self.configuration)
            .download_all(
                &libraries,
                |done, total| {
                    self.progress.report(
                        scale_progress(ratio(done, total), 0.25, 0.75),
                        format!("Downloading dependent resources: {}/{}", done, total),
                        InstallStatus::Running,
                    );
                },
                cancellation,
            )
            .await;

        // 3. Version descriptor
        cancellation.check()?;
        self.progress.report(
            0.85,
            "Write information to version json",
            InstallStatus::WaitingToRun,
        );
        profile.apply_id_override(self.custom_id.as_deref());
        profile.ensure_parent(self.game.inherits_from.as_deref());
        profile.persist(&self.game.root).await?;

        cancellation.check()?;
        self.progress
            .report(1.0, "Installation is complete", InstallStatus::Canceled);
        info!("Fabric installed as {}", profile.id);

        Ok(InstallReport {
            version_id: profile.id,
            downloads,
            processors: Default::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::FakeFetcher;

    const PROFILE: &str = r#"{
        "id": "fabric-loader-0.15.7-1.20.1",
        "inheritsFrom": "1.20.1",
        "mainClass": "net.fabricmc.loader.impl.launch.knot.KnotClient",
        "libraries": [
            { "name": "net.fabricmc:sponge-mixin:0.12.5+mixin.0.8.5", "url": "https://maven.fabricmc.net/" },
            { "name": "net.fabricmc:intermediary:1.20.1", "url": "https://maven.fabricmc.net/" },
            { "name": "net.fabricmc:fabric-loader:0.15.7", "url": "https://maven.fabricmc.net/" }
        ]
    }"#;

    fn build() -> FabricBuild {
        FabricBuild {
            minecraft_version: "1.20.1".into(),
            loader_version: "0.15.7".into(),
        }
    }

    #[tokio::test]
    async fn install_writes_descriptor_and_reports_progress() {
        let root = tempfile::tempdir().unwrap();
        let fetcher = FakeFetcher::new()
            .with_text(&FabricInstaller::profile_url(&build()), PROFILE)
            .failing_on("intermediary");

        let installer = FabricInstaller::new(
            GameContext::for_version(root.path(), "1.20.1"),
            build(),
            Arc::new(fetcher),
        )
        .with_custom_id("fabric-custom");
        let mut rx = installer.progress().subscribe();

        let report = installer.install(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.version_id, "fabric-custom");
        assert_eq!(report.downloads.total, 3);
        assert_eq!(report.downloads.failures.len(), 1);
        assert!(!report.is_clean());

        let descriptor = root
            .path()
            .join("versions/fabric-custom/fabric-custom.json");
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(descriptor).unwrap()).unwrap();
        assert_eq!(written["id"], "fabric-custom");
        assert_eq!(written["inheritsFrom"], "1.20.1");

        let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert!(events
            .windows(2)
            .all(|pair| pair[0].fraction <= pair[1].fraction));
        let last = events.last().unwrap();
        assert_eq!(last.fraction, 1.0);
        assert_eq!(last.status, InstallStatus::Canceled);
        assert_eq!(
            events
                .iter()
                .filter(|e| e.status == InstallStatus::Running)
                .count(),
            3
        );
    }

    #[tokio::test]
    async fn unreachable_metadata_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let installer = FabricInstaller::new(
            GameContext::for_version(root.path(), "1.20.1"),
            build(),
            Arc::new(FakeFetcher::new()),
        );

        let err = installer
            .install(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::MetadataFetch(_)));
        assert!(!root.path().join("versions").exists());
    }

    #[tokio::test]
    async fn cancellation_is_surfaced_not_swallowed() {
        let root = tempfile::tempdir().unwrap();
        let fetcher =
            FakeFetcher::new().with_text(&FabricInstaller::profile_url(&build()), PROFILE);
        let installer = FabricInstaller::new(
            GameContext::for_version(root.path(), "1.20.1"),
            build(),
            Arc::new(fetcher),
        );

        let token = CancellationToken::new();
        token.cancel();
        let err = installer.install(&token).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn cancelling_during_downloads_skips_descriptor() {
        let root = tempfile::tempdir().unwrap();
        let token = CancellationToken::new();
        let fetcher = FakeFetcher::new()
            .with_text(&FabricInstaller::profile_url(&build()), PROFILE)
            .cancelling_on("sponge-mixin", &token);

        let installer = FabricInstaller::new(
            GameContext::for_version(root.path(), "1.20.1"),
            build(),
            Arc::new(fetcher),
        )
        .with_configuration(DownloaderConfiguration::default().with_concurrency(1));

        let err = installer.install(&token).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(!root
            .path()
            .join("versions/fabric-loader-0.15.7-1.20.1/fabric-loader-0.15.7-1.20.1.json")
            .exists());
    }

    #[tokio::test]
    async fn second_install_reports_progress_from_zero() {
        let root = tempfile::tempdir().unwrap();
        let fetcher =
            FakeFetcher::new().with_text(&FabricInstaller::profile_url(&build()), PROFILE);
        let installer = FabricInstaller::new(
            GameContext::for_version(root.path(), "1.20.1"),
            build(),
            Arc::new(fetcher),
        );

        installer.install(&CancellationToken::new()).await.unwrap();
        let mut rx = installer.progress().subscribe();
        installer.install(&CancellationToken::new()).await.unwrap();

        let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(events.first().unwrap().fraction, 0.0);
        assert_eq!(events.first().unwrap().status, InstallStatus::Created);
        assert_eq!(events.last().unwrap().fraction, 1.0);
        assert!(events
            .windows(2)
            .all(|pair| pair[0].fraction <= pair[1].fraction));
    }

    #[tokio::test]
    async fn builds_are_listed_newest_first() {
        let listing = r#"[
            { "loader": { "separator": ".", "build": 7, "maven": "net.fabricmc:fabric-loader:0.9.3", "version": "0.9.3", "stable": false } },
            { "loader": { "separator": "+build.", "build": 12, "maven": "net.fabricmc:fabric-loader:0.15.7", "version": "0.15.7", "stable": true } },
            { "loader": { "separator": ".", "build": 9, "maven": "net.fabricmc:fabric-loader:0.14.21", "version": "0.14.21", "stable": true } }
        ]"#;
        let fetcher = FakeFetcher::new().with_text(
            "https://meta.fabricmc.net/v2/versions/loader/1.20.1",
            listing,
        );

        let builds = FabricInstaller::list_builds_for_version(&fetcher, "1.20.1")
            .await
            .unwrap();
        let versions: Vec<_> = builds.iter().map(|b| b.loader.version.as_str()).collect();
        assert_eq!(versions, vec!["0.15.7", "0.14.21", "0.9.3"]);
        assert_eq!(builds[0].to_build("1.20.1"), build());
    }
}
