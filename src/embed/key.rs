use crate::data::dataset::validate_name;
use crate::foundation::error::{SweepError, SweepResult};

/// Identity of one embedding artifact. Equality is structural.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct EmbeddingKey {
    /// Dataset name.
    pub dataset: String,
    /// Neighbor count handed to the reducer.
    pub neighbor_count: u32,
    /// Output dimensionality.
    pub target_dims: u32,
    /// Distance metric name as given by the caller.
    pub metric: String,
}

impl EmbeddingKey {
    pub fn new(
        dataset: impl Into<String>,
        neighbor_count: u32,
        target_dims: u32,
        metric: impl Into<String>,
    ) -> SweepResult<Self> {
        let key = Self {
            dataset: dataset.into(),
            neighbor_count,
            target_dims,
            metric: metric.into(),
        };
        key.validate()?;
        Ok(key)
    }

    pub fn validate(&self) -> SweepResult<()> {
        validate_name(&self.dataset)?;
        validate_name(&self.metric)?;
        if self.target_dims == 0 {
            return Err(SweepError::validation("target_dims must be >= 1"));
        }
        Ok(())
    }

    /// `<neighbors>-<dims>d-<metric>.json`
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}d-{}.json",
            self.neighbor_count, self.target_dims, self.metric
        )
    }
}

impl std::fmt::Display for EmbeddingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}d:{}",
            self.dataset, self.neighbor_count, self.target_dims, self.metric
        )
    }
}

/// Distance metrics understood by the built-in reducer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Metric {
    Euclidean,
    /// Also accepted as `cityblock`.
    Manhattan,
    Cosine,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Euclidean, Metric::Manhattan, Metric::Cosine];

    pub fn name(self) -> &'static str {
        match self {
            Metric::Euclidean => "euclidean",
            Metric::Manhattan => "manhattan",
            Metric::Cosine => "cosine",
        }
    }
}

impl std::str::FromStr for Metric {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "euclidean" => Ok(Metric::Euclidean),
            "manhattan" | "cityblock" => Ok(Metric::Manhattan),
            "cosine" => Ok(Metric::Cosine),
            other => Err(SweepError::validation(format!("unknown metric '{other}'"))),
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/embed/key.rs"]
mod tests;
