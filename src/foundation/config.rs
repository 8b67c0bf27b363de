use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;

use crate::foundation::core::Canvas;
use crate::foundation::error::{SweepError, SweepResult};

/// Environment variable that overrides the encoder program.
pub const ENCODER_ENV: &str = "SWEEPVIZ_ENCODER";

/// Pipeline settings, loadable from JSON. Every field has a default.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Root directory holding one sub-directory per dataset.
    pub data_root: PathBuf,
    /// Neighbor count passed to the reducer.
    pub neighbor_count: u32,
    /// Embedding dimensionality. Sweeps need 3.
    pub target_dims: u32,
    /// Seed for the built-in reducer.
    pub seed: u64,
    /// Frame size in pixels.
    pub canvas: Canvas,
    /// Pixels per typographic point when sizing markers.
    pub dpi: f64,
    /// Camera elevation in degrees.
    pub elevation_deg: f64,
    /// Worker threads for the sweep; `None` uses rayon's default.
    pub threads: Option<usize>,
    /// Output frame rate.
    pub fps: u32,
    /// x264 constant rate factor.
    pub crf: u8,
    /// Encoder executable.
    pub encoder: String,
    /// Kill the encoder after this many seconds.
    pub encode_timeout_secs: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            neighbor_count: 32,
            target_dims: 3,
            seed: 42,
            canvas: Canvas::default(),
            dpi: 128.0,
            elevation_deg: 10.0,
            threads: None,
            fps: 30,
            crf: 20,
            encoder: "ffmpeg".to_string(),
            encode_timeout_secs: None,
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file and validate.
    pub fn from_path(path: impl AsRef<Path>) -> SweepResult<Self> {
        let path = path.as_ref();
        let f = std::fs::File::open(path)
            .with_context(|| format!("open config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_reader(std::io::BufReader::new(f))
            .map_err(|e| SweepError::serde(format!("config '{}': {e}", path.display())))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply `SWEEPVIZ_ENCODER` when it is set and non-empty.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(program) = std::env::var(ENCODER_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
        {
            self.encoder = program;
        }
        self
    }

    pub fn validate(&self) -> SweepResult<()> {
        if self.neighbor_count == 0 {
            return Err(SweepError::validation("neighbor_count must be >= 1"));
        }
        if self.target_dims != 3 {
            return Err(SweepError::validation(format!(
                "rotating sweeps need target_dims == 3, got {}",
                self.target_dims
            )));
        }
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(SweepError::validation("canvas width/height must be non-zero"));
        }
        if !self.canvas.width.is_multiple_of(2) || !self.canvas.height.is_multiple_of(2) {
            return Err(SweepError::validation(
                "canvas width/height must be even (required for yuv420p output)",
            ));
        }
        if self.canvas.width > u32::from(u16::MAX) || self.canvas.height > u32::from(u16::MAX) {
            return Err(SweepError::validation("canvas width/height must fit in u16"));
        }
        if !self.dpi.is_finite() || self.dpi <= 0.0 {
            return Err(SweepError::validation("dpi must be finite and positive"));
        }
        if !self.elevation_deg.is_finite() || self.elevation_deg.abs() > 90.0 {
            return Err(SweepError::validation("elevation_deg must be in [-90, 90]"));
        }
        if self.threads == Some(0) {
            return Err(SweepError::validation("threads must be >= 1 when set"));
        }
        if self.fps == 0 {
            return Err(SweepError::validation("fps must be non-zero"));
        }
        if self.crf > 51 {
            return Err(SweepError::validation("crf must be in [0, 51]"));
        }
        if self.encoder.trim().is_empty() {
            return Err(SweepError::validation("encoder program must be non-empty"));
        }
        if self.encode_timeout_secs == Some(0) {
            return Err(SweepError::validation("encode_timeout_secs must be >= 1 when set"));
        }
        Ok(())
    }

    pub fn encode_timeout(&self) -> Option<Duration> {
        self.encode_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/config.rs"]
mod tests;
