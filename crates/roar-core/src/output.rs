//! Placement of rendered manifests on disk.
//!
//! Layout: `<root>[/<env>][/<instance>]/<name>.yaml`. Empty env or instance
//! adds no directory level.

use std::path::{Path, PathBuf};
use tracing::info;

use crate::domain::{Application, Result};

/// Where the manifest of `app` goes under `root`.
pub fn output_path(root: &Path, app: &Application) -> PathBuf {
    let mut dir = root.to_path_buf();
    if let Some(env) = app.env() {
        dir.push(env);
    }
    if let Some(instance) = app.instance() {
        dir.push(instance);
    }
    dir.join(format!("{}.yaml", app.name))
}

/// Write `rendered` to the output path of `app`, creating directories.
pub fn write_manifest(root: &Path, app: &Application, rendered: &[u8]) -> Result<PathBuf> {
    let path = output_path(root, app);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, rendered)?;
    info!(application = %app.name, path = %path.display(), "Saved rendered manifest");
    Ok(path)
}
