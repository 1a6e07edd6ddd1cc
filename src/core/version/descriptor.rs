// ─── Version Descriptor ───
// The `versions/<id>/<id>.json` document written at the end of an install.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::library::RawLibrary;
use crate::core::error::{LauncherError, LauncherResult};

/// A version JSON. Only the fields the installers touch are typed; the rest
/// is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDescriptor {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherits_from: Option<String>,
    #[serde(default)]
    pub libraries: Vec<RawLibrary>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl VersionDescriptor {
    pub fn parse(raw: &str) -> LauncherResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Replace the id when a non-empty custom id is given.
    pub fn apply_id_override(&mut self, custom_id: Option<&str>) {
        if let Some(id) = custom_id.map(str::trim).filter(|id| !id.is_empty()) {
            self.id = id.to_string();
        }
    }

    /// Fill `inheritsFrom` if the document does not name a parent already.
    pub fn ensure_parent(&mut self, parent: Option<&str>) {
        if self.inherits_from.is_none() {
            self.inherits_from = parent.map(str::to_string);
        }
    }

    /// `<root>/versions/<id>/<id>.json`
    pub fn path_under(&self, game_root: &Path) -> PathBuf {
        game_root
            .join("versions")
            .join(&self.id)
            .join(format!("{}.json", self.id))
    }

    /// Write the descriptor, creating the version folder if needed.
    pub async fn persist(&self, game_root: &Path) -> LauncherResult<PathBuf> {
        let path = self.path_under(game_root);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }

        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| LauncherError::io(&path, e))?;

        info!("Wrote version descriptor {:?}", path);
        Ok(path)
    }
}
