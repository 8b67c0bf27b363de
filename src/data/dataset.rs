use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;

use crate::foundation::core::Matrix;
use crate::foundation::error::{SweepError, SweepResult};

/// Labels above this value mark an outlier.
pub const OUTLIER_THRESHOLD: f64 = 0.9;

/// A materialized, labeled dataset.
///
/// Samples and labels are reference counted so embeddings can share the label vector without
/// copying it.
#[derive(Clone, Debug)]
pub struct Dataset {
    name: String,
    samples: Arc<Matrix>,
    labels: Arc<[f64]>,
}

#[derive(serde::Deserialize)]
struct DatasetFile {
    #[serde(rename = "X")]
    x: Vec<Vec<f64>>,
    #[serde(rename = "y")]
    y: Vec<f64>,
}

impl Dataset {
    /// Create a dataset, checking that labels align with samples.
    pub fn new(name: impl Into<String>, samples: Matrix, labels: Vec<f64>) -> SweepResult<Self> {
        let name = name.into();
        validate_name(&name)?;
        if samples.rows() != labels.len() {
            return Err(SweepError::validation(format!(
                "dataset '{name}' has {} samples but {} labels",
                samples.rows(),
                labels.len()
            )));
        }
        if samples.rows() == 0 {
            return Err(SweepError::validation(format!("dataset '{name}' is empty")));
        }
        if samples.cols() == 0 {
            return Err(SweepError::validation(format!(
                "dataset '{name}' has samples without features"
            )));
        }
        if let Some(bad) = labels.iter().find(|l| !l.is_finite() || **l < 0.0) {
            return Err(SweepError::validation(format!(
                "dataset '{name}' has invalid label {bad} (labels must be finite and >= 0)"
            )));
        }
        if samples.as_slice().iter().any(|v| !v.is_finite()) {
            return Err(SweepError::validation(format!(
                "dataset '{name}' contains non-finite samples"
            )));
        }
        Ok(Self {
            name,
            samples: Arc::new(samples),
            labels: labels.into(),
        })
    }

    /// Load `{ "X": [[...], ...], "y": [...] }`. The dataset is named after the file stem.
    pub fn from_json_path(path: impl AsRef<Path>) -> SweepResult<Self> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                SweepError::validation(format!(
                    "cannot derive a dataset name from '{}'",
                    path.display()
                ))
            })?
            .to_string();
        let f = std::fs::File::open(path)
            .with_context(|| format!("open dataset '{}'", path.display()))?;
        let file: DatasetFile = serde_json::from_reader(std::io::BufReader::new(f))
            .map_err(|e| SweepError::serde(format!("dataset '{}': {e}", path.display())))?;
        Self::new(name, Matrix::from_rows(&file.x)?, file.y)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn samples(&self) -> &Matrix {
        &self.samples
    }

    pub fn labels(&self) -> &[f64] {
        &self.labels
    }

    /// Shared handle to the label vector.
    pub fn labels_arc(&self) -> Arc<[f64]> {
        Arc::clone(&self.labels)
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.samples.rows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Source dimensionality.
    pub fn dims(&self) -> usize {
        self.samples.cols()
    }

    /// Share of points whose label exceeds [`OUTLIER_THRESHOLD`].
    pub fn outlier_fraction(&self) -> f64 {
        let outliers = self
            .labels
            .iter()
            .filter(|&&l| l > OUTLIER_THRESHOLD)
            .count();
        outliers as f64 / self.labels.len() as f64
    }

    /// Return a copy with every column rescaled to `[0, 1]`.
    ///
    /// Constant columns map to `0.5`.
    pub fn min_max_normalized(&self) -> Self {
        let mut samples = (*self.samples).clone();
        let cols = samples.cols();
        for c in 0..cols {
            let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
            for row in samples.iter_rows() {
                lo = lo.min(row[c]);
                hi = hi.max(row[c]);
            }
            for r in 0..samples.rows() {
                let v = &mut samples.row_mut(r)[c];
                *v = if lo == hi { 0.5 } else { (*v - lo) / (hi - lo) };
            }
        }
        Self {
            name: self.name.clone(),
            samples: Arc::new(samples),
            labels: Arc::clone(&self.labels),
        }
    }
}

/// Names become path segments, so keep them to a single plain component.
pub(crate) fn validate_name(name: &str) -> SweepResult<()> {
    if name.is_empty() {
        return Err(SweepError::validation("name must be non-empty"));
    }
    if name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(SweepError::validation(format!(
            "name '{name}' must be a single path component"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/data/dataset.rs"]
mod tests;
