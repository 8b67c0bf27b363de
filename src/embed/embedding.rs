use std::sync::Arc;

use crate::foundation::core::Matrix;
use crate::foundation::error::{SweepError, SweepResult};

/// Low-dimensional coordinates paired with the labels of the dataset they came from.
#[derive(Clone, Debug, PartialEq)]
pub struct Embedding {
    coords: Matrix,
    labels: Arc<[f64]>,
}

impl Embedding {
    pub fn new(coords: Matrix, labels: Arc<[f64]>) -> SweepResult<Self> {
        if coords.rows() != labels.len() {
            return Err(SweepError::validation(format!(
                "embedding has {} points but {} labels",
                coords.rows(),
                labels.len()
            )));
        }
        Ok(Self { coords, labels })
    }

    pub fn coords(&self) -> &Matrix {
        &self.coords
    }

    pub fn labels(&self) -> &[f64] {
        &self.labels
    }

    /// Shared handle to the label vector.
    pub fn labels_arc(&self) -> Arc<[f64]> {
        Arc::clone(&self.labels)
    }

    pub fn len(&self) -> usize {
        self.coords.rows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dims(&self) -> usize {
        self.coords.cols()
    }
}
