use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::foundation::error::SweepResult;

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> SweepResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// A unique hidden sibling of `path` for write-then-rename.
///
/// The extension of `path` is kept last so tools that sniff the format from the file name (the
/// encoder) still see it.
pub fn temp_sibling(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let mut name = format!(".{stem}.partial-{}-{nanos}", std::process::id());
    if let Some(ext) = path.extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }
    path.with_file_name(name)
}

/// Removes the file on drop unless disarmed.
pub(crate) struct TempFileGuard(Option<PathBuf>);

impl TempFileGuard {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self(Some(path))
    }

    /// Keep the file; called once it has been renamed into place.
    pub(crate) fn disarm(&mut self) {
        self.0 = None;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/fs.rs"]
mod tests;
