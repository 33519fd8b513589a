//! Per-affiliate pagination cursors persisted across restarts.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

/// Position in the explorer's transaction stream. Advanced monotonically
/// forward; never moves backward.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Cursor {
    #[serde(rename = "lastAddr")]
    pub last_deposit_address: String,
    #[serde(rename = "lastMemo", default)]
    pub last_deposit_memo: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct CursorFile {
    #[serde(default)]
    cursors: HashMap<String, Cursor>,
}

/// A single JSON document on disk holding one cursor per affiliate. Writes
/// are infrequent (one per processed batch), so read-modify-write is fine.
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// All persisted cursors. Any read or parse error yields an empty map,
    /// which makes the pollers start over from the beginning.
    pub fn load_all(&self) -> HashMap<String, Cursor> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(_) => return HashMap::new(),
        };
        match serde_json::from_slice::<CursorFile>(&data) {
            Ok(file) => file.cursors,
            Err(err) => {
                tracing::warn!(?err, path = ?self.path, "cursor file is corrupt, starting over");
                HashMap::new()
            }
        }
    }

    /// Persists one affiliate's cursor, leaving the others untouched. The
    /// file is replaced atomically via a temp file rename and kept owner
    /// read/write only.
    pub fn save(&self, affiliate: &str, cursor: &Cursor) -> Result<()> {
        let mut file = CursorFile {
            cursors: self.load_all(),
        };
        file.cursors.insert(affiliate.to_string(), cursor.clone());
        let data = serde_json::to_vec(&file).context("serialize cursor file")?;

        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context("create cursor directory")?;
        }
        let tmp = temp_path(&self.path);
        fs::write(&tmp, data).context("write cursor file")?;
        restrict_permissions(&tmp)?;
        fs::rename(&tmp, &self.path).context("replace cursor file")?;
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .context("restrict cursor file permissions")
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
