use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use xxhash_rust::xxh3::Xxh3;

use crate::data::dataset::Dataset;
use crate::data::layout::DataLayout;
use crate::embed::embedding::Embedding;
use crate::embed::key::EmbeddingKey;
use crate::foundation::core::Matrix;
use crate::foundation::error::{SweepError, SweepResult};
use crate::foundation::fs::{TempFileGuard, ensure_parent_dir, temp_sibling};

const ARTIFACT_FORMAT: u32 = 1;
const CHECKSUM_SEED: u64 = 0x5eed_c0de_e3b0_c442;

/// How an embedding was obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Loaded from disk; `compute` was not called.
    Hit,
    /// Computed and persisted.
    Miss,
    /// Source was already low-dimensional; nothing computed, nothing persisted.
    PassThrough,
}

/// Embedding plus how it was obtained.
#[derive(Clone, Debug)]
pub struct Cached {
    pub embedding: Embedding,
    pub outcome: CacheOutcome,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct EmbeddingArtifact {
    format: u32,
    key: EmbeddingKey,
    rows: usize,
    cols: usize,
    checksum: u64,
    data: Vec<f64>,
}

/// Disk-backed memo of reducer output, one JSON artifact per [`EmbeddingKey`].
#[derive(Clone, Debug)]
pub struct EmbeddingCache {
    layout: DataLayout,
}

impl EmbeddingCache {
    pub fn new(layout: DataLayout) -> Self {
        Self { layout }
    }

    /// Artifact path for `key`.
    pub fn path_for(&self, key: &EmbeddingKey) -> PathBuf {
        self.layout.embedding_path(key)
    }

    /// Return the embedding for `key`, calling `compute` only on a cache miss.
    pub fn get_or_compute<F>(
        &self,
        key: &EmbeddingKey,
        dataset: &Dataset,
        compute: F,
    ) -> SweepResult<Embedding>
    where
        F: FnOnce(&Matrix) -> SweepResult<Matrix>,
    {
        self.get_or_compute_with_outcome(key, dataset, compute)
            .map(|c| c.embedding)
    }

    /// Like [`get_or_compute`](Self::get_or_compute) but also reports hit/miss/pass-through.
    #[tracing::instrument(skip_all, fields(key = %key))]
    pub fn get_or_compute_with_outcome<F>(
        &self,
        key: &EmbeddingKey,
        dataset: &Dataset,
        compute: F,
    ) -> SweepResult<Cached>
    where
        F: FnOnce(&Matrix) -> SweepResult<Matrix>,
    {
        key.validate()?;
        if key.dataset != dataset.name() {
            return Err(SweepError::validation(format!(
                "embedding key names dataset '{}' but '{}' was supplied",
                key.dataset,
                dataset.name()
            )));
        }

        let target = key.target_dims as usize;
        if dataset.dims() <= target {
            tracing::debug!(
                source_dims = dataset.dims(),
                target,
                "source already low-dimensional, passing through"
            );
            let coords = dataset.samples().leading_columns(target.min(dataset.dims()))?;
            return Ok(Cached {
                embedding: Embedding::new(coords, dataset.labels_arc())?,
                outcome: CacheOutcome::PassThrough,
            });
        }

        let path = self.path_for(key);
        if let Some(coords) = self.load(key, &path, dataset.len())? {
            tracing::info!(path = %path.display(), "embedding cache hit");
            return Ok(Cached {
                embedding: Embedding::new(coords, dataset.labels_arc())?,
                outcome: CacheOutcome::Hit,
            });
        }

        tracing::info!(path = %path.display(), "embedding cache miss, computing");
        let coords = compute(dataset.samples())?;
        check_reduced_shape(&coords, dataset.len(), target)?;
        self.store(key, &path, &coords)?;
        Ok(Cached {
            embedding: Embedding::new(coords, dataset.labels_arc())?,
            outcome: CacheOutcome::Miss,
        })
    }

    /// Delete the artifact for `key`. Returns `true` when something was removed.
    pub fn purge(&self, key: &EmbeddingKey) -> SweepResult<bool> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(path = %path.display(), "purged embedding artifact");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("remove '{}'", path.display()))
                .into()),
        }
    }

    fn load(
        &self,
        key: &EmbeddingKey,
        path: &Path,
        expected_rows: usize,
    ) -> SweepResult<Option<Matrix>> {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SweepError::cache_corruption(path, format!("unreadable: {e}")));
            }
        };
        let artifact: EmbeddingArtifact = serde_json::from_slice(&bytes)
            .map_err(|e| SweepError::cache_corruption(path, format!("malformed artifact: {e}")))?;

        if artifact.format != ARTIFACT_FORMAT {
            return Err(SweepError::cache_corruption(
                path,
                format!("unsupported artifact format {}", artifact.format),
            ));
        }
        if &artifact.key != key {
            return Err(SweepError::cache_corruption(
                path,
                format!("artifact belongs to key {}", artifact.key),
            ));
        }
        if checksum(&artifact.data) != artifact.checksum {
            return Err(SweepError::cache_corruption(path, "checksum mismatch"));
        }
        if artifact.rows != expected_rows || artifact.cols != key.target_dims as usize {
            return Err(SweepError::cache_corruption(
                path,
                format!(
                    "artifact is {}x{}, expected {expected_rows}x{}",
                    artifact.rows, artifact.cols, key.target_dims
                ),
            ));
        }
        Matrix::from_row_major(artifact.rows, artifact.cols, artifact.data)
            .map(Some)
            .map_err(|e| SweepError::cache_corruption(path, e.to_string()))
    }

    fn store(&self, key: &EmbeddingKey, path: &Path, coords: &Matrix) -> SweepResult<()> {
        ensure_parent_dir(path)?;
        let artifact = EmbeddingArtifact {
            format: ARTIFACT_FORMAT,
            key: key.clone(),
            rows: coords.rows(),
            cols: coords.cols(),
            checksum: checksum(coords.as_slice()),
            data: coords.as_slice().to_vec(),
        };

        let tmp = temp_sibling(path);
        let mut guard = TempFileGuard::new(tmp.clone());
        {
            let f = std::fs::File::create(&tmp)
                .with_context(|| format!("create '{}'", tmp.display()))?;
            let mut w = std::io::BufWriter::new(f);
            serde_json::to_writer(&mut w, &artifact)
                .map_err(|e| SweepError::serde(format!("encode embedding artifact: {e}")))?;
            w.flush()
                .with_context(|| format!("flush '{}'", tmp.display()))?;
            w.get_ref()
                .sync_all()
                .with_context(|| format!("sync '{}'", tmp.display()))?;
        }
        std::fs::rename(&tmp, path)
            .with_context(|| format!("rename '{}' -> '{}'", tmp.display(), path.display()))?;
        guard.disarm();
        tracing::debug!(path = %path.display(), "persisted embedding artifact");
        Ok(())
    }
}

fn check_reduced_shape(coords: &Matrix, rows: usize, cols: usize) -> SweepResult<()> {
    if coords.rows() != rows || coords.cols() != cols {
        return Err(SweepError::reduce(format!(
            "reducer returned {}x{}, expected {rows}x{cols}",
            coords.rows(),
            coords.cols()
        )));
    }
    if coords.as_slice().iter().any(|v| !v.is_finite()) {
        return Err(SweepError::reduce("reducer returned non-finite coordinates"));
    }
    Ok(())
}

fn checksum(data: &[f64]) -> u64 {
    let mut h = Xxh3::with_seed(CHECKSUM_SEED);
    for v in data {
        h.update(&v.to_bits().to_le_bytes());
    }
    h.digest()
}

#[cfg(test)]
#[path = "../../tests/unit/embed/cache.rs"]
mod tests;
