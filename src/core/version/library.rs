// ─── Library Resolution ───
// Turns raw library manifests into concrete entries with paths and source URLs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::LauncherResult;
use crate::core::maven::{MavenArtifact, MOJANG_LIBRARIES};

/// Which game side an artifact or processor applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Client,
    Server,
}

// ─── Raw library JSON ───
// Unknown fields are kept in `extra` so descriptors persist verbatim.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLibrary {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<LibraryDownloads>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<LibraryRule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clientreq: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serverreq: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryDownloads {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<LibDownloadArtifact>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibDownloadArtifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryRule {
    pub action: RuleAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<OsRule>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OsRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RawLibrary {
    /// Evaluate whether this library should be included for the current OS.
    ///
    /// Rules logic:
    /// - If no rules → allowed.
    /// - Process rules top-to-bottom. Start with "disallowed".
    /// - Each rule either sets "allow" or "disallow" if the OS matches (or if no OS is specified).
    /// - Final state determines inclusion.
    pub fn is_allowed_for_current_os(&self) -> bool {
        let Some(rules) = &self.rules else {
            return true;
        };

        let current_os = current_os_name();
        let mut allowed = false;

        for rule in rules {
            let os_matches = match rule.os.as_ref().and_then(|os| os.name.as_deref()) {
                None => true,
                Some(name) => name == current_os,
            };

            if os_matches {
                allowed = rule.action == RuleAction::Allow;
            }
        }

        allowed
    }

    /// Side restriction carried by the legacy `clientreq`/`serverreq` flags.
    /// `None` means both sides.
    pub fn side(&self) -> Option<Side> {
        match (self.clientreq, self.serverreq) {
            (Some(false), Some(true)) => Some(Side::Server),
            (Some(true), Some(false)) => Some(Side::Client),
            _ => None,
        }
    }

    fn explicit_artifact_url(&self) -> Option<&str> {
        self.downloads
            .as_ref()?
            .artifact
            .as_ref()?
            .url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
    }
}

/// Get the Mojang OS name for the current platform.
fn current_os_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "osx"
    } else {
        "linux"
    }
}

// ─── Resolved entries ───

/// A library with everything needed to download it and put it on a classpath.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryEntry {
    pub coordinate: MavenArtifact,
    /// `/`-separated maven layout path, shared by canonical and mirror hosts.
    pub relative_path: String,
    /// Absolute destination under `<root>/libraries`.
    pub path: PathBuf,
    pub source_url: String,
    pub side: Option<Side>,
}

impl LibraryEntry {
    pub fn is_required_on_client(&self) -> bool {
        self.side != Some(Side::Server)
    }
}

/// `<root>/libraries`
pub fn libraries_dir(game_root: &Path) -> PathBuf {
    game_root.join("libraries")
}

pub struct LibraryResolver;

impl LibraryResolver {
    /// Resolve every raw library in order.
    ///
    /// A malformed coordinate fails the whole call; libraries excluded by OS
    /// rules are skipped.
    pub fn resolve(raw: &[RawLibrary], game_root: &Path) -> LauncherResult<Vec<LibraryEntry>> {
        let libs_dir = libraries_dir(game_root);
        let mut entries = Vec::with_capacity(raw.len());

        for lib in raw {
            if !lib.is_allowed_for_current_os() {
                debug!("Skipping library (OS rule): {}", lib.name);
                continue;
            }

            let coordinate = MavenArtifact::parse(&lib.name)?;
            let source_url = match (lib.explicit_artifact_url(), lib.url.as_deref()) {
                (Some(url), _) => url.to_string(),
                (None, Some(repo)) if !repo.trim().is_empty() => coordinate.url(repo),
                _ => coordinate.url(MOJANG_LIBRARIES),
            };

            entries.push(LibraryEntry {
                relative_path: coordinate.url_path(),
                path: coordinate.library_path(&libs_dir),
                source_url,
                side: lib.side(),
                coordinate,
            });
        }

        Ok(entries)
    }
}
