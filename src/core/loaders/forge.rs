use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use zip::result::ZipError;
use zip::ZipArchive;

use super::context::GameContext;
use super::forge_profile::{InstallProfile, SubstitutionContext, SubstitutionPaths};
use super::installer::{
    ratio, scale_progress, InstallReport, InstallStatus, InstallerPipeline, ProgressReporter,
};
use super::processor::{ProcessorLogs, ProcessorRunner};
use crate::core::cancel::CancellationToken;
use crate::core::config::DownloaderConfiguration;
use crate::core::downloader::{DownloadCoordinator, Fetcher};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::{BMCL_FORGE_LIST, FORGE_FILES_MAVEN};
use crate::core::version::{LibraryResolver, VersionDescriptor};

/// One Forge build as listed by BMCLAPI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgeInstallEntry {
    #[serde(rename = "mcversion")]
    pub minecraft_version: String,
    /// Forge version without the Minecraft prefix, e.g. `47.2.0`.
    pub version: String,
    pub build: u32,
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub branch: Option<String>,
}

impl ForgeInstallEntry {
    fn package_suffix(&self) -> String {
        let id = format!("{}-{}", self.minecraft_version, self.version);
        format!("/net/minecraftforge/forge/{id}/forge-{id}-installer.jar")
    }

    pub fn package_file_name(&self) -> String {
        format!(
            "forge-{}-{}-installer.jar",
            self.minecraft_version, self.version
        )
    }

    /// Installer package URL; mirror mode keeps the path and swaps the host.
    pub fn package_url(&self, configuration: &DownloaderConfiguration) -> String {
        if configuration.use_mirror {
            configuration.mirror.url_for(&self.package_suffix())
        } else {
            format!("{}{}", FORGE_FILES_MAVEN, self.package_suffix())
        }
    }
}

// ─── Installer package ───

/// An opened Forge installer archive.
pub struct ForgePackage {
    path: PathBuf,
    archive: ZipArchive<File>,
}

impl ForgePackage {
    pub fn open(path: &Path) -> LauncherResult<Self> {
        let file = File::open(path).map_err(|e| LauncherError::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            archive: ZipArchive::new(file)?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_required(&mut self, name: &str) -> LauncherResult<String> {
        let mut entry = match self.archive.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => {
                return Err(LauncherError::MissingArchiveEntry {
                    archive: self.path.clone(),
                    entry: name.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let mut text = String::new();
        entry.read_to_string(&mut text)?;
        Ok(text)
    }

    /// Parse `install_profile.json` and locate the version descriptor.
    ///
    /// Legacy profiles embed it; modern ones ship it as `version.json`.
    pub fn load_profile(&mut self) -> LauncherResult<(InstallProfile, VersionDescriptor)> {
        let mut profile = InstallProfile::parse(&self.read_required("install_profile.json")?)?;

        let version_info = match profile.version_info.take() {
            Some(embedded) => embedded,
            None => VersionDescriptor::parse(&self.read_required("version.json")?)?,
        };

        Ok((profile, version_info))
    }

    /// Extract `name` to `dest`. Returns `false` when the entry is absent.
    pub fn extract_optional(&mut self, name: &str, dest: &Path) -> LauncherResult<bool> {
        let mut entry = match self.archive.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => {
                debug!("Optional entry {} not in installer", name);
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
        }
        let mut out = File::create(dest).map_err(|e| LauncherError::io(dest, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| LauncherError::io(dest, e))?;

        debug!("Extracted {} -> {:?}", name, dest);
        Ok(true)
    }

    pub fn extract_required(&mut self, name: &str, dest: &Path) -> LauncherResult<()> {
        if self.extract_optional(name, dest)? {
            Ok(())
        } else {
            Err(LauncherError::MissingArchiveEntry {
                archive: self.path.clone(),
                entry: name.to_string(),
            })
        }
    }

    /// Copy the artifacts the installer ships itself into the library folder.
    pub fn extract_embedded_artifacts(
        &mut self,
        profile: &InstallProfile,
        libraries_dir: &Path,
    ) -> LauncherResult<()> {
        let forge = profile.forge_artifact()?;
        let forge_jar = forge.library_path(libraries_dir);
        let forge_folder = forge_jar
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| libraries_dir.to_path_buf());

        if let Some(file_path) = &profile.legacy_file_path {
            self.extract_required(file_path, &forge_folder.join(file_path))?;
        }

        let universal = forge.with_classifier("universal", None);
        let client_data = forge.with_classifier("clientdata", Some("lzma"));

        self.extract_optional(&format!("maven/{}", forge.url_path()), &forge_jar)?;
        self.extract_optional(
            &format!("maven/{}", universal.url_path()),
            &universal.library_path(libraries_dir),
        )?;
        self.extract_optional("data/client.lzma", &client_data.library_path(libraries_dir))?;

        Ok(())
    }
}

// ─── Installer ───

/// Installs Forge from its official installer package without running it.
pub struct ForgeInstaller {
    game: GameContext,
    entry: ForgeInstallEntry,
    java_path: PathBuf,
    custom_id: Option<String>,
    configuration: DownloaderConfiguration,
    package_dir: PathBuf,
    fetcher: Arc<dyn Fetcher>,
    progress: ProgressReporter,
}

impl ForgeInstaller {
    pub fn new(
        game: GameContext,
        entry: ForgeInstallEntry,
        java_path: impl Into<PathBuf>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            game,
            entry,
            java_path: java_path.into(),
            custom_id: None,
            configuration: DownloaderConfiguration::default(),
            package_dir: std::env::temp_dir(),
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

    pub fn with_package_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.package_dir = dir.into();
        self
    }

    /// All Forge builds for a Minecraft version, highest build first.
    pub async fn list_forge_builds_for_version(
        fetcher: &dyn Fetcher,
        minecraft_version: &str,
    ) -> LauncherResult<Vec<ForgeInstallEntry>> {
        let url = format!("{}/{}", BMCL_FORGE_LIST, minecraft_version);
        let raw = fetcher
            .fetch_text(&url)
            .await
            .map_err(|e| LauncherError::MetadataFetch(format!("{url}: {e}")))?;

        let mut entries: Vec<ForgeInstallEntry> = serde_json::from_str(&raw)
            .map_err(|e| LauncherError::MetadataFetch(format!("{url}: {e}")))?;
        entries.sort_by(|a, b| b.build.cmp(&a.build));
        Ok(entries)
    }

    async fn acquire_package(&self) -> LauncherResult<PathBuf> {
        let url = self.entry.package_url(&self.configuration);
        let dest = self.package_dir.join(self.entry.package_file_name());

        self.progress.report(
            0.0,
            "Downloading Forge installation package",
            InstallStatus::Running,
        );
        self.fetcher.download_file(&url, &dest).await?;
        self.progress.report(
            0.15,
            "Downloaded Forge installation package",
            InstallStatus::Running,
        );

        Ok(dest)
    }

    fn run_processors(
        &self,
        substitution: &SubstitutionContext,
        profile: &InstallProfile,
        cancellation: &CancellationToken,
    ) -> LauncherResult<ProcessorLogs> {
        let processors = substitution.prepare(&profile.processors)?;
        info!("Running {} install processors", processors.len());

        ProcessorRunner::new(&self.java_path, &self.game.root).run(
            &processors,
            cancellation,
            |done, total| {
                self.progress.report(
                    scale_progress(ratio(done, total), 0.75, 1.0),
                    format!("Running install processor: {}/{}", done, total),
                    InstallStatus::Running,
                );
            },
        )
    }
}

#[async_trait]
impl InstallerPipeline for ForgeInstaller {
    fn progress(&self) -> &ProgressReporter {
        &self.progress
    }

    async fn install(&self, cancellation: &CancellationToken) -> LauncherResult<InstallReport> {
        info!(
            "Installing Forge {} for MC {}",
            self.entry.version, self.entry.minecraft_version
        );
        self.progress.reset();

        // 1. Installer package
        cancellation.check()?;
        let package_path = self.acquire_package().await?;

        let result = self.install_from_package(&package_path, cancellation).await;
        if let Err(e) = tokio::fs::remove_file(&package_path).await {
            debug!("Could not remove installer package {:?}: {}", package_path, e);
        }
        result
    }
}

impl ForgeInstaller {
    async fn install_from_package(
        &self,
        package_path: &Path,
        cancellation: &CancellationToken,
    ) -> LauncherResult<InstallReport> {
        // 2. Parse package
        cancellation.check()?;
        self.progress
            .report(0.15, "Start parse package", InstallStatus::Created);
        let mut package = ForgePackage::open(package_path)?;
        let (profile, mut version_info) = package.load_profile()?;
        info!(
            "Forge {} uses the {} install profile format",
            profile.forge_version,
            if profile.is_legacy { "legacy" } else { "modern" }
        );

        // 3. Libraries
        cancellation.check()?;
        let mut libraries = LibraryResolver::resolve(&version_info.libraries, &self.game.root)?;
        if !profile.is_legacy {
            libraries.extend(LibraryResolver::resolve(
                &profile.libraries,
                &self.game.root,
            )?);
        }
        libraries.retain(|lib| lib.is_required_on_client());

        // 4. Processor substitution context
        cancellation.check()?;
        let substitution = if profile.is_legacy {
            None
        } else {
            Some(SubstitutionContext::new(
                &profile,
                SubstitutionPaths {
                    game_root: &self.game.root,
                    minecraft_jar: &self.game.jar_path,
                    installer: package_path,
                },
            )?)
        };

        // 5. Download
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
                        scale_progress(ratio(done, total), 0.25, 0.6),
                        format!("Downloading dependent resources: {}/{}", done, total),
                        InstallStatus::Running,
                    );
                },
                cancellation,
            )
            .await;

        // 6. Embedded artifacts
        cancellation.check()?;
        self.progress.report(
            0.65,
            "Extract embedded artifacts",
            InstallStatus::WaitingToRun,
        );
        package.extract_embedded_artifacts(&profile, &self.game.libraries_dir())?;
        drop(package);

        // 7. Version descriptor
        cancellation.check()?;
        self.progress.report(
            0.7,
            "Write information to version json",
            InstallStatus::WaitingToRun,
        );
        version_info.apply_id_override(self.custom_id.as_deref());
        version_info.ensure_parent(self.game.inherits_from.as_deref());
        version_info.persist(&self.game.root).await?;

        // 8. Processors
        let processors = match &substitution {
            Some(substitution) => {
                cancellation.check()?;
                self.run_processors(substitution, &profile, cancellation)?
            }
            None => ProcessorLogs::default(),
        };

        cancellation.check()?;
        self.progress
            .report(1.0, "Installation is complete", InstallStatus::Canceled);
        info!("Forge installed as {}", version_info.id);

        Ok(InstallReport {
            version_id: version_info.id,
            downloads,
            processors,
        })
    }
}
