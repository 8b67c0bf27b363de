use crate::foundation::error::{SweepError, SweepResult};

pub use kurbo::Point;

/// Number of frames in one full rotation, one per integer degree.
pub const SWEEP_FRAMES: u16 = 360;

/// Camera azimuth in whole degrees, always in `[0, 360)`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(try_from = "u16", into = "u16")]
pub struct Azimuth(u16);

impl Azimuth {
    /// Create a validated azimuth.
    pub fn new(degrees: u16) -> SweepResult<Self> {
        if degrees >= SWEEP_FRAMES {
            return Err(SweepError::validation(format!(
                "azimuth must be in [0, {SWEEP_FRAMES}), got {degrees}"
            )));
        }
        Ok(Self(degrees))
    }

    /// Degrees as an integer.
    pub fn degrees(self) -> u16 {
        self.0
    }

    /// Degrees converted to radians.
    pub fn radians(self) -> f64 {
        f64::from(self.0).to_radians()
    }

    /// Every azimuth of a full sweep in ascending order.
    pub fn sweep() -> impl ExactSizeIterator<Item = Azimuth> + Clone {
        (0..SWEEP_FRAMES).map(Azimuth)
    }
}

impl std::fmt::Display for Azimuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for Azimuth {
    type Error = SweepError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Azimuth> for u16 {
    fn from(value: Azimuth) -> Self {
        value.0
    }
}

/// Output frame size in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Default for Canvas {
    fn default() -> Self {
        // 8x8 inches at 128 dpi.
        Self {
            width: 1024,
            height: 1024,
        }
    }
}

/// Dense row-major `f64` matrix.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Wrap row-major `data` as a `rows x cols` matrix.
    pub fn from_row_major(rows: usize, cols: usize, data: Vec<f64>) -> SweepResult<Self> {
        if rows.checked_mul(cols) != Some(data.len()) {
            return Err(SweepError::validation(format!(
                "matrix data length {} does not match {rows}x{cols}",
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Build a matrix from equally sized rows.
    pub fn from_rows(rows: &[Vec<f64>]) -> SweepResult<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(SweepError::validation(format!(
                    "row {i} has {} columns, expected {cols}",
                    row.len()
                )));
            }
            data.extend_from_slice(row);
        }
        Self::from_row_major(rows.len(), cols, data)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Borrow the row-major backing storage.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    pub fn row_mut(&mut self, i: usize) -> &mut [f64] {
        &mut self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Iterate over rows in order.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> {
        // `chunks_exact(0)` panics; a zero-column matrix has no visible rows anyway.
        self.data.chunks_exact(self.cols.max(1)).take(self.rows)
    }

    /// Copy of the first `k` columns. `k` must not exceed `cols`.
    pub fn leading_columns(&self, k: usize) -> SweepResult<Self> {
        if k > self.cols {
            return Err(SweepError::validation(format!(
                "cannot take {k} leading columns of a {}-column matrix",
                self.cols
            )));
        }
        if k == self.cols {
            return Ok(self.clone());
        }
        let mut data = Vec::with_capacity(self.rows * k);
        for row in self.iter_rows() {
            data.extend_from_slice(&row[..k]);
        }
        Self::from_row_major(self.rows, k, data)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
