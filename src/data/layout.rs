use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::data::dataset::validate_name;
use crate::embed::key::EmbeddingKey;
use crate::foundation::error::SweepResult;

/// On-disk layout rooted at `data_root`:
///
/// ```text
/// <root>/<dataset>/umap/<neighbors>-<dims>d-<metric>.json
/// <root>/<dataset>/frames/<metric>-<azimuth:03>.png
/// <root>/<dataset>/<metric>-<fps>fps.mp4
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dataset_dir(&self, dataset: &str) -> PathBuf {
        self.root.join(dataset)
    }

    pub fn embedding_dir(&self, dataset: &str) -> PathBuf {
        self.dataset_dir(dataset).join("umap")
    }

    pub fn frames_dir(&self, dataset: &str) -> PathBuf {
        self.dataset_dir(dataset).join("frames")
    }

    /// Cache artifact path; a pure function of the key.
    pub fn embedding_path(&self, key: &EmbeddingKey) -> PathBuf {
        self.embedding_dir(&key.dataset).join(key.file_name())
    }

    pub fn video_path(&self, dataset: &str, metric: &str, fps: u32) -> PathBuf {
        self.dataset_dir(dataset).join(format!("{metric}-{fps}fps.mp4"))
    }

    /// Create `<root>/<dataset>/{umap,frames}`.
    pub fn ensure_dataset_dirs(&self, dataset: &str) -> SweepResult<()> {
        validate_name(dataset)?;
        for dir in [self.embedding_dir(dataset), self.frames_dir(dataset)] {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("create directory '{}'", dir.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/data/layout.rs"]
mod tests;
