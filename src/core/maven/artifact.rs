use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::core::error::{LauncherError, LauncherResult};

/// Represents a fully parsed Maven coordinate.
///
/// Supported formats:
///   `groupId:artifactId:version`
///   `groupId:artifactId:version:classifier`
///   `groupId:artifactId:version:classifier@extension`
///   `groupId:artifactId:version@extension`
///
/// The string form survives a parse/display round trip unchanged, which is
/// why an explicit `@jar` is remembered separately from the default.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MavenArtifact {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub classifier: Option<String>,
    extension: Option<String>,
}

impl MavenArtifact {
    /// Parse a Maven coordinate string.
    ///
    /// # Examples
    /// ```
    /// use loader_installer::MavenArtifact;
    ///
    /// let a = MavenArtifact::parse("net.sf.jopt-simple:jopt-simple:5.0.4").unwrap();
    /// assert_eq!(a.group_id, "net.sf.jopt-simple");
    /// ```
    pub fn parse(coord: &str) -> LauncherResult<Self> {
        let malformed = || LauncherError::MalformedCoordinate(coord.to_string());

        // Split off @extension first
        let (coord_part, extension) = match coord.rsplit_once('@') {
            Some((_, "")) => return Err(malformed()),
            Some((head, ext)) => (head, Some(ext.to_string())),
            None => (coord, None),
        };

        let parts: Vec<&str> = coord_part.split(':').collect();
        if parts.iter().any(|p| p.trim().is_empty()) {
            return Err(malformed());
        }

        let classifier = match parts.len() {
            3 => None,
            4 => Some(parts[3].to_string()),
            _ => return Err(malformed()),
        };

        Ok(Self {
            group_id: parts[0].to_string(),
            artifact_id: parts[1].to_string(),
            version: parts[2].to_string(),
            classifier,
            extension,
        })
    }

    /// Parse a bracketed reference such as `[net.minecraftforge:forge:1.0:client]`.
    ///
    /// Returns `None` when `value` is not bracketed.
    pub fn parse_reference(value: &str) -> Option<LauncherResult<Self>> {
        value
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .map(Self::parse)
    }

    /// File extension. Defaults to `"jar"`.
    pub fn extension(&self) -> &str {
        self.extension.as_deref().unwrap_or("jar")
    }

    /// Return a new artifact with the given classifier and extension.
    pub fn with_classifier(&self, classifier: &str, extension: Option<&str>) -> Self {
        Self {
            classifier: Some(classifier.to_string()),
            extension: extension.map(str::to_string),
            ..self.clone()
        }
    }

    /// Build the artifact filename.
    ///
    /// `artifactId-version[-classifier].extension`
    pub fn filename(&self) -> String {
        match &self.classifier {
            Some(c) => format!(
                "{}-{}-{}.{}",
                self.artifact_id,
                self.version,
                c,
                self.extension()
            ),
            None => format!("{}-{}.{}", self.artifact_id, self.version, self.extension()),
        }
    }

    /// Relative path in URL form, always `/`-separated:
    /// `<group_path>/<artifact_id>/<version>/<filename>`
    pub fn url_path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.group_id.replace('.', "/"),
            self.artifact_id,
            self.version,
            self.filename()
        )
    }

    /// Construct the full URL for this artifact under the given repository base.
    pub fn url(&self, repo_base: &str) -> String {
        format!("{}/{}", repo_base.trim_end_matches('/'), self.url_path())
    }

    /// Local path relative to the libraries directory.
    ///
    /// Mirrors Maven's local repo layout with platform separators.
    pub fn local_path(&self) -> PathBuf {
        let mut path: PathBuf = self.group_id.split('.').collect();
        path.push(&self.artifact_id);
        path.push(&self.version);
        path.push(self.filename());
        path
    }

    /// Absolute location under `libraries_dir`.
    pub fn library_path(&self, libraries_dir: &Path) -> PathBuf {
        libraries_dir.join(self.local_path())
    }
}

impl FromStr for MavenArtifact {
    type Err = LauncherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MavenArtifact {
    type Error = LauncherError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MavenArtifact> for String {
    fn from(value: MavenArtifact) -> Self {
        value.to_string()
    }
}

impl fmt::Display for MavenArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)?;
        if let Some(c) = &self.classifier {
            write!(f, ":{}", c)?;
        }
        if let Some(ext) = &self.extension {
            write!(f, "@{}", ext)?;
        }
        Ok(())
    }
}
