use std::path::{Path, PathBuf};

use crate::core::version::libraries_dir;

/// The game folder an installer writes into.
/// Supplied by the embedding launcher and never modified here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameContext {
    pub root: PathBuf,
    /// Primary game jar, e.g. `versions/1.20.1/1.20.1.jar`.
    pub jar_path: PathBuf,
    /// Vanilla version the loader is installed on top of.
    pub inherits_from: Option<String>,
}

impl GameContext {
    pub fn new(root: impl Into<PathBuf>, jar_path: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            jar_path: jar_path.into(),
            inherits_from: None,
        }
    }

    /// Context for a vanilla version laid out as `versions/<id>/<id>.jar`.
    pub fn for_version(root: impl Into<PathBuf>, version_id: &str) -> Self {
        let root = root.into();
        let jar_path = root
            .join("versions")
            .join(version_id)
            .join(format!("{}.jar", version_id));
        Self {
            root,
            jar_path,
            inherits_from: Some(version_id.to_string()),
        }
    }

    pub fn libraries_dir(&self) -> PathBuf {
        libraries_dir(&self.root)
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.root.join("versions")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
