use xxhash_rust::xxh3::xxh3_64_with_seed;

use crate::embed::key::{EmbeddingKey, Metric};
use crate::foundation::core::Matrix;
use crate::foundation::error::{SweepError, SweepResult};

/// Dimensionality-reduction collaborator, invoked only on cache misses.
///
/// Implementations must be deterministic for a given key so cached and recomputed artifacts agree.
pub trait Reducer: Send + Sync {
    /// Reduce `samples` (N x D) to N x `key.target_dims`.
    fn reduce(&self, samples: &Matrix, key: &EmbeddingKey) -> SweepResult<Matrix>;
}

impl<F> Reducer for F
where
    F: Fn(&Matrix, &EmbeddingKey) -> SweepResult<Matrix> + Send + Sync,
{
    fn reduce(&self, samples: &Matrix, key: &EmbeddingKey) -> SweepResult<Matrix> {
        self(samples, key)
    }
}

/// Seeded random linear projection.
///
/// A stand-in for a neighbor-graph embedding when none is wired in: cheap, deterministic, and
/// roughly distance preserving. `neighbor_count` is ignored. For `cosine` rows are L2-normalized
/// before projecting.
#[derive(Clone, Copy, Debug)]
pub struct RandomProjection {
    seed: u64,
}

impl RandomProjection {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Approximately standard-normal weight for input column `j`, output column `k`.
    fn weight(&self, j: usize, k: usize) -> f64 {
        // Irwin-Hall with four uniforms, rescaled to unit variance.
        let mut sum = 0.0;
        for draw in 0u64..4 {
            let mut buf = [0u8; 24];
            buf[..8].copy_from_slice(&(j as u64).to_le_bytes());
            buf[8..16].copy_from_slice(&(k as u64).to_le_bytes());
            buf[16..].copy_from_slice(&draw.to_le_bytes());
            let bits = xxh3_64_with_seed(&buf, self.seed) >> 11;
            sum += bits as f64 / (1u64 << 53) as f64;
        }
        (sum - 2.0) * 3f64.sqrt()
    }
}

impl Reducer for RandomProjection {
    fn reduce(&self, samples: &Matrix, key: &EmbeddingKey) -> SweepResult<Matrix> {
        let metric: Metric = key.metric.parse()?;
        let target = key.target_dims as usize;
        if target == 0 {
            return Err(SweepError::reduce("target_dims must be >= 1"));
        }

        let d = samples.cols();
        let weights: Vec<f64> = (0..d)
            .flat_map(|j| (0..target).map(move |k| (j, k)))
            .map(|(j, k)| self.weight(j, k) / (target as f64).sqrt())
            .collect();

        let mut out = Vec::with_capacity(samples.rows() * target);
        for row in samples.iter_rows() {
            let scale = match metric {
                Metric::Cosine => {
                    let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
                    if norm > 0.0 { 1.0 / norm } else { 0.0 }
                }
                Metric::Euclidean | Metric::Manhattan => 1.0,
            };
            for k in 0..target {
                let mut acc = 0.0;
                for (j, v) in row.iter().enumerate() {
                    acc += v * scale * weights[j * target + k];
                }
                out.push(acc);
            }
        }

        let mut m = Matrix::from_row_major(samples.rows(), target, out)?;
        center_columns(&mut m);
        Ok(m)
    }
}

fn center_columns(m: &mut Matrix) {
    if m.rows() == 0 {
        return;
    }
    let mut means = vec![0.0; m.cols()];
    for row in m.iter_rows() {
        for (mean, v) in means.iter_mut().zip(row) {
            *mean += v;
        }
    }
    let n = m.rows() as f64;
    for mean in &mut means {
        *mean /= n;
    }
    for r in 0..m.rows() {
        for (v, mean) in m.row_mut(r).iter_mut().zip(&means) {
            *v -= mean;
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/embed/reduce.rs"]
mod tests;
