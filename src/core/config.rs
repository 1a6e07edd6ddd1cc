// ─── Installer Configuration ───
// Download settings and persisted installer settings.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::BMCL_MAVEN;

/// Alternate host serving the same maven layout as the canonical repositories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorSource {
    pub maven_host: String,
}

impl Default for MirrorSource {
    fn default() -> Self {
        Self {
            maven_host: BMCL_MAVEN.to_string(),
        }
    }
}

impl MirrorSource {
    /// `<maven_host>/<relative maven path>`
    pub fn url_for(&self, relative_path: &str) -> String {
        format!(
            "{}/{}",
            self.maven_host.trim_end_matches('/'),
            relative_path.trim_start_matches('/')
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DownloaderConfiguration {
    /// Maximum number of parallel downloads.
    pub concurrency: usize,
    pub use_mirror: bool,
    pub mirror: MirrorSource,
}

impl Default for DownloaderConfiguration {
    fn default() -> Self {
        Self {
            concurrency: 8,
            use_mirror: false,
            mirror: MirrorSource::default(),
        }
    }
}

impl DownloaderConfiguration {
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n;
        self
    }

    pub fn with_mirror(mut self, use_mirror: bool) -> Self {
        self.use_mirror = use_mirror;
        self
    }

    /// Worker pool size; never zero.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.max(1)
    }
}

/// Settings persisted next to the game folder by the embedding application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InstallerSettings {
    pub download: DownloaderConfiguration,
    pub java_path: Option<PathBuf>,
    /// Where installer packages are staged. Defaults to the system temp dir.
    pub package_dir: Option<PathBuf>,
}

impl InstallerSettings {
    /// Load settings from a JSON file; a missing file yields defaults.
    pub fn load_from_disk(path: &Path) -> LauncherResult<Self> {
        if !path.exists() {
            debug!("No installer settings at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|e| LauncherError::io(path, e))?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save_to_disk(&self, path: &Path) -> LauncherResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| LauncherError::io(path, e))
    }

    /// Configured Java binary, or `java` from `PATH`.
    pub fn java_path(&self) -> PathBuf {
        self.java_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("java"))
    }

    pub fn package_dir(&self) -> PathBuf {
        self.package_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_settings_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = InstallerSettings::load_from_disk(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings, InstallerSettings::default());
        assert_eq!(settings.download.concurrency, 8);
        assert!(!settings.download.use_mirror);
    }

    #[test]
    fn settings_roundtrip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("installer.json");

        let settings = InstallerSettings {
            download: DownloaderConfiguration::default()
                .with_concurrency(3)
                .with_mirror(true),
            java_path: Some(PathBuf::from("/opt/java/bin/java")),
            package_dir: None,
        };
        settings.save_to_disk(&path).unwrap();

        let loaded = InstallerSettings::load_from_disk(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn partial_settings_fill_in_defaults() {
        let settings: InstallerSettings =
            serde_json::from_str(r#"{ "download": { "useMirror": true } }"#).unwrap();
        assert!(settings.download.use_mirror);
        assert_eq!(settings.download.concurrency, 8);
        assert_eq!(settings.download.mirror, MirrorSource::default());
    }

    #[test]
    fn mirror_url_joins_without_double_slashes() {
        let mirror = MirrorSource {
            maven_host: "https://mirror.example/maven/".into(),
        };
        assert_eq!(
            mirror.url_for("/net/example/lib/1.0/lib-1.0.jar"),
            "https://mirror.example/maven/net/example/lib/1.0/lib-1.0.jar"
        );
    }

    #[test]
    fn zero_concurrency_is_clamped() {
        let config = DownloaderConfiguration::default().with_concurrency(0);
        assert_eq!(config.effective_concurrency(), 1);
    }
}
