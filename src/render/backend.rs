use std::path::Path;
use std::sync::Arc;

use crate::foundation::core::{Azimuth, Matrix};
use crate::foundation::error::{RenderError, SweepError, SweepResult};
use crate::render::camera::UnitCloud;
use crate::render::palette::MarkerStyle;

/// Premultiplied RGBA8 overlay placed at the top of every frame.
#[derive(Clone)]
pub struct TitleOverlay {
    pub(crate) pixmap: Arc<vello_cpu::Pixmap>,
    pub(crate) width: u32,
    pub(crate) height: u32,
}

impl std::fmt::Debug for TitleOverlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TitleOverlay")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Everything a sweep shares across frames. Built once, read concurrently by every worker.
#[derive(Clone, Debug)]
pub struct Scene {
    cloud: UnitCloud,
    labels: Arc<[f64]>,
    style: MarkerStyle,
    title: String,
    overlay: Option<TitleOverlay>,
}

impl Scene {
    /// Build a scene without a rasterized title.
    pub fn new(points: &Matrix, labels: Arc<[f64]>, title: &str, dpi: f64) -> SweepResult<Self> {
        if points.rows() != labels.len() {
            return Err(SweepError::validation(format!(
                "scene has {} points but {} labels",
                points.rows(),
                labels.len()
            )));
        }
        if points.cols() > 3 {
            return Err(SweepError::validation(format!(
                "scene points must have at most 3 columns, got {}",
                points.cols()
            )));
        }
        Ok(Self {
            cloud: UnitCloud::from_coords(points),
            style: MarkerStyle::fit(&labels, dpi),
            labels,
            title: title.to_string(),
            overlay: None,
        })
    }

    pub(crate) fn with_overlay(mut self, overlay: Option<TitleOverlay>) -> Self {
        self.overlay = overlay;
        self
    }

    pub fn cloud(&self) -> &UnitCloud {
        &self.cloud
    }

    pub fn labels(&self) -> &[f64] {
        &self.labels
    }

    pub fn style(&self) -> &MarkerStyle {
        &self.style
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn overlay(&self) -> Option<&TitleOverlay> {
        self.overlay.as_ref()
    }
}

/// A renderer that turns a [`Scene`] seen from one azimuth into an image file.
///
/// `render_frame` is called concurrently from worker threads with distinct azimuths and distinct
/// output paths; implementations must not share mutable state between calls.
pub trait FrameBackend: Send + Sync {
    /// Per-sweep preparation (title rasterization, fitting).
    fn prepare(&self, points: &Matrix, labels: Arc<[f64]>, title: &str) -> SweepResult<Scene>;

    /// Render one frame to `out_path`.
    fn render_frame(
        &self,
        scene: &Scene,
        azimuth: Azimuth,
        out_path: &Path,
    ) -> Result<(), RenderError>;
}
