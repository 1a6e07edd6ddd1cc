// ─── Forge Install Profile ───
// Parses `install_profile.json` (legacy and modern shapes) and prepares
// processor arguments for a client install.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::core::error::LauncherResult;
use crate::core::maven::MavenArtifact;
use crate::core::version::{RawLibrary, Side, VersionDescriptor};

/// A data entry with per-side values.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SidedValue {
    pub client: String,
    pub server: String,
}

/// An external binary-patching step.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Processor {
    pub jar: MavenArtifact,
    #[serde(default)]
    pub classpath: Vec<MavenArtifact>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
    #[serde(default)]
    pub sides: Option<Vec<Side>>,
}

impl Processor {
    pub fn is_server_only(&self) -> bool {
        matches!(self.sides.as_deref(), Some([Side::Server]))
    }
}

// ─── Wire shapes ───

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyProfileJson {
    install: LegacyInstallSection,
    version_info: VersionDescriptor,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyInstallSection {
    version: String,
    file_path: String,
    minecraft: String,
}

#[derive(Debug, Deserialize)]
struct ModernProfileJson {
    version: String,
    minecraft: String,
    #[serde(default)]
    libraries: Vec<RawLibrary>,
    #[serde(default)]
    processors: Vec<Processor>,
    #[serde(default)]
    data: BTreeMap<String, SidedValue>,
}

/// Typed `install_profile.json`.
#[derive(Debug, Clone)]
pub struct InstallProfile {
    pub is_legacy: bool,
    pub minecraft_version: String,
    pub forge_version: String,
    /// Legacy only: installer-internal path of the universal jar.
    pub legacy_file_path: Option<String>,
    /// Legacy only: the version descriptor embedded in the profile.
    pub version_info: Option<VersionDescriptor>,
    /// Modern only: profile-level libraries (processor tooling).
    pub libraries: Vec<RawLibrary>,
    pub processors: Vec<Processor>,
    pub variable_data: BTreeMap<String, SidedValue>,
}

impl InstallProfile {
    /// A top-level `install` key marks the legacy shape.
    pub fn parse(raw: &str) -> LauncherResult<Self> {
        let value: serde_json::Value = serde_json::from_str(raw)?;

        if value.get("install").is_some() {
            let legacy: LegacyProfileJson = serde_json::from_value(value)?;
            return Ok(Self {
                is_legacy: true,
                minecraft_version: legacy.install.minecraft,
                forge_version: legacy.install.version.replace("forge ", ""),
                legacy_file_path: Some(legacy.install.file_path),
                version_info: Some(legacy.version_info),
                libraries: Vec::new(),
                processors: Vec::new(),
                variable_data: BTreeMap::new(),
            });
        }

        let modern: ModernProfileJson = serde_json::from_value(value)?;
        Ok(Self {
            is_legacy: false,
            minecraft_version: modern.minecraft,
            forge_version: modern.version.replace("-forge-", "-"),
            legacy_file_path: None,
            version_info: None,
            libraries: modern.libraries,
            processors: modern.processors,
            variable_data: modern.data,
        })
    }

    /// `net.minecraftforge:forge:<forge_version>`
    pub fn forge_artifact(&self) -> LauncherResult<MavenArtifact> {
        MavenArtifact::parse(&format!("net.minecraftforge:forge:{}", self.forge_version))
    }
}

/// Paths the static tokens resolve to.
#[derive(Debug, Clone)]
pub struct SubstitutionPaths<'a> {
    pub game_root: &'a Path,
    pub minecraft_jar: &'a Path,
    pub installer: &'a Path,
}

/// Token tables for processor arguments.
///
/// Data tokens (from the profile's `data`) are applied before static tokens.
#[derive(Debug, Clone)]
pub struct SubstitutionContext {
    libraries_dir: PathBuf,
    data_tokens: BTreeMap<String, String>,
    static_tokens: BTreeMap<String, String>,
}

impl SubstitutionContext {
    pub fn new(profile: &InstallProfile, paths: SubstitutionPaths<'_>) -> LauncherResult<Self> {
        let libraries_dir = paths.game_root.join("libraries");

        let static_tokens = BTreeMap::from([
            ("{SIDE}".to_string(), "client".to_string()),
            ("{MINECRAFT_JAR}".to_string(), path_str(paths.minecraft_jar)),
            (
                "{MINECRAFT_VERSION}".to_string(),
                profile.minecraft_version.clone(),
            ),
            ("{ROOT}".to_string(), path_str(paths.game_root)),
            ("{INSTALLER}".to_string(), path_str(paths.installer)),
            ("{LIBRARY_DIR}".to_string(), path_str(&libraries_dir)),
        ]);

        let mut data = profile.variable_data.clone();
        if let Some(binpatch) = data.get_mut("BINPATCH") {
            let forge = profile.forge_artifact()?;
            binpatch.client = format!("[{}]", forge.with_classifier("clientdata", Some("lzma")));
            binpatch.server = format!("[{}]", forge.with_classifier("serverdata", Some("lzma")));
        }

        let mut data_tokens = BTreeMap::new();
        for (key, value) in data {
            let resolved = match MavenArtifact::parse_reference(&value.client) {
                Some(artifact) => path_str(&artifact?.library_path(&libraries_dir)),
                None => value.client,
            };
            data_tokens.insert(format!("{{{}}}", key), resolved);
        }

        Ok(Self {
            libraries_dir,
            data_tokens,
            static_tokens,
        })
    }

    /// Replace brace tokens: data map first, then the static map.
    pub fn substitute(&self, text: &str) -> String {
        let replaced = replace_all(text, &self.data_tokens);
        replace_all(&replaced, &self.static_tokens)
    }

    /// A bracketed argument is a coordinate reference; anything else is templated.
    pub fn resolve_argument(&self, arg: &str) -> LauncherResult<String> {
        match MavenArtifact::parse_reference(arg) {
            Some(artifact) => Ok(path_str(&artifact?.library_path(&self.libraries_dir))),
            None => Ok(self.substitute(arg)),
        }
    }

    /// Drop server-only processors and substitute arguments and outputs.
    pub fn prepare(&self, processors: &[Processor]) -> LauncherResult<Vec<Processor>> {
        let mut prepared = Vec::with_capacity(processors.len());

        for processor in processors {
            if processor.is_server_only() {
                debug!("Skipping server-only processor {}", processor.jar);
                continue;
            }

            let args = processor
                .args
                .iter()
                .map(|arg| self.resolve_argument(arg))
                .collect::<LauncherResult<Vec<_>>>()?;

            let outputs = processor
                .outputs
                .iter()
                .map(|(key, value)| (self.substitute(key), self.substitute(value)))
                .collect();

            prepared.push(Processor {
                args,
                outputs,
                ..processor.clone()
            });
        }

        Ok(prepared)
    }
}

fn replace_all(text: &str, tokens: &BTreeMap<String, String>) -> String {
    tokens
        .iter()
        .fold(text.to_string(), |acc, (token, value)| acc.replace(token, value))
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
