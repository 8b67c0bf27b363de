use std::path::Path;
use std::sync::Arc;

use kurbo::Shape as _;

use crate::foundation::config::PipelineConfig;
use crate::foundation::core::{Azimuth, Canvas, Matrix};
use crate::foundation::error::{RenderError, SweepError, SweepResult};
use crate::foundation::fs::{TempFileGuard, temp_sibling};
use crate::render::backend::{FrameBackend, Scene, TitleOverlay};
use crate::render::camera::OrbitCamera;

/// Options for [`CpuFrameRenderer`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CpuRenderOpts {
    pub canvas: Canvas,
    pub elevation_deg: f64,
    pub dpi: f64,
    /// Opaque background, straight RGBA8.
    pub bg_rgba: [u8; 4],
}

impl Default for CpuRenderOpts {
    fn default() -> Self {
        Self {
            canvas: Canvas::default(),
            elevation_deg: 10.0,
            dpi: 128.0,
            bg_rgba: [255, 255, 255, 255],
        }
    }
}

impl From<&PipelineConfig> for CpuRenderOpts {
    fn from(cfg: &PipelineConfig) -> Self {
        Self {
            canvas: cfg.canvas,
            elevation_deg: cfg.elevation_deg,
            dpi: cfg.dpi,
            ..Self::default()
        }
    }
}

/// Scatter-plot renderer powered by `vello_cpu`, writing PNG frames.
///
/// Titles are laid out as SVG text through `usvg` with the system font database and rasterized
/// once per sweep by `resvg`.
pub struct CpuFrameRenderer {
    opts: CpuRenderOpts,
    width: u16,
    height: u16,
    fontdb: Arc<usvg::fontdb::Database>,
}

impl CpuFrameRenderer {
    pub fn new(opts: CpuRenderOpts) -> SweepResult<Self> {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        Self::with_fontdb(opts, Arc::new(db))
    }

    /// Use an existing font database; an empty one renders untitled frames.
    pub fn with_fontdb(
        opts: CpuRenderOpts,
        fontdb: Arc<usvg::fontdb::Database>,
    ) -> SweepResult<Self> {
        let width: u16 = opts
            .canvas
            .width
            .try_into()
            .map_err(|_| SweepError::validation("canvas width exceeds u16"))?;
        let height: u16 = opts
            .canvas
            .height
            .try_into()
            .map_err(|_| SweepError::validation("canvas height exceeds u16"))?;
        if width == 0 || height == 0 {
            return Err(SweepError::validation("canvas width/height must be non-zero"));
        }
        if opts.bg_rgba[3] != 255 {
            return Err(SweepError::validation("background must be opaque"));
        }
        Ok(Self {
            opts,
            width,
            height,
            fontdb,
        })
    }

    pub fn opts(&self) -> &CpuRenderOpts {
        &self.opts
    }

    /// Render one frame without a prepared scene.
    pub fn render(
        &self,
        points: &Matrix,
        labels: &[f64],
        title: &str,
        azimuth: Azimuth,
        out_path: &Path,
    ) -> Result<(), RenderError> {
        let scene = self
            .prepare(points, labels.into(), title)
            .map_err(|e| RenderError::new(azimuth, e.to_string()))?;
        self.render_frame(&scene, azimuth, out_path)
    }

    /// Rasterize `scene` from `azimuth` to straight (and opaque) RGBA8.
    pub fn rasterize(&self, scene: &Scene, azimuth: Azimuth) -> Vec<u8> {
        let (w, h) = (f64::from(self.width), f64::from(self.height));
        let mut ctx = vello_cpu::RenderContext::new(self.width, self.height);

        let [r, g, b, a] = self.opts.bg_rgba;
        ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(r, g, b, a));
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, w, h));

        let inset = scene.overlay().map_or(0.0, |o| f64::from(o.height));
        let camera = OrbitCamera::fit(self.opts.elevation_deg, w, h, inset);
        let style = scene.style();
        for p in camera.project(scene.cloud(), azimuth) {
            let label = scene.labels()[p.index];
            let [r, g, b, a] = style.color(label);
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(r, g, b, a));
            let dot = kurbo::Circle::new(p.screen, style.radius_px(label)).to_path(0.1);
            ctx.fill_path(&bezpath_to_cpu(&dot));
        }

        if let Some(overlay) = scene.overlay() {
            let x = (w - f64::from(overlay.width)).max(0.0) * 0.5;
            ctx.set_transform(vello_cpu::kurbo::Affine::translate((x, 0.0)));
            ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
            ctx.set_paint(vello_cpu::Image {
                image: vello_cpu::ImageSource::Pixmap(Arc::clone(&overlay.pixmap)),
                sampler: vello_cpu::peniko::ImageSampler::default(),
            });
            ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
                0.0,
                0.0,
                f64::from(overlay.width),
                f64::from(overlay.height),
            ));
            ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        }

        ctx.flush();
        let mut pixmap = vello_cpu::Pixmap::new(self.width, self.height);
        ctx.render_to_pixmap(&mut pixmap);
        // The background is opaque, so premultiplied bytes are already straight alpha.
        pixmap.data_as_u8_slice().to_vec()
    }

    fn rasterize_title(&self, title: &str) -> SweepResult<Option<TitleOverlay>> {
        let title = title.trim();
        if title.is_empty() {
            return Ok(None);
        }
        let width = u32::from(self.width);
        let band = title_band_height(u32::from(self.height));
        let font_size = f64::from(band) * 0.6;
        let svg = format!(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{band}" viewBox="0 0 {width} {band}"><text x="{x}" y="{y}" text-anchor="middle" font-family="sans-serif" font-size="{font_size}" fill="#000000">{text}</text></svg>"##,
            x = f64::from(width) * 0.5,
            y = f64::from(band) * 0.75,
            text = escape_xml(title),
        );

        let opts = usvg::Options {
            fontdb: Arc::clone(&self.fontdb),
            ..usvg::Options::default()
        };
        let tree = usvg::Tree::from_str(&svg, &opts)
            .map_err(|e| SweepError::validation(format!("title svg: {e}")))?;
        let mut pixmap = resvg::tiny_skia::Pixmap::new(width, band)
            .ok_or_else(|| SweepError::validation("failed to allocate title pixmap"))?;
        resvg::render(
            &tree,
            resvg::tiny_skia::Transform::identity(),
            &mut pixmap.as_mut(),
        );

        Ok(Some(TitleOverlay {
            pixmap: Arc::new(pixmap_from_premul_bytes(pixmap.data(), width, band)?),
            width,
            height: band,
        }))
    }
}

impl FrameBackend for CpuFrameRenderer {
    fn prepare(&self, points: &Matrix, labels: Arc<[f64]>, title: &str) -> SweepResult<Scene> {
        let overlay = self.rasterize_title(title)?;
        Ok(Scene::new(points, labels, title, self.opts.dpi)?.with_overlay(overlay))
    }

    fn render_frame(
        &self,
        scene: &Scene,
        azimuth: Azimuth,
        out_path: &Path,
    ) -> Result<(), RenderError> {
        let parent = out_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        if !parent.is_dir() {
            return Err(RenderError::new(
                azimuth,
                format!("output directory '{}' does not exist", parent.display()),
            ));
        }

        let pixels = self.rasterize(scene, azimuth);

        // Write then rename so the encoder never sees a half-written frame.
        let tmp = temp_sibling(out_path);
        let mut guard = TempFileGuard::new(tmp.clone());
        image::save_buffer_with_format(
            &tmp,
            &pixels,
            u32::from(self.width),
            u32::from(self.height),
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .map_err(|e| RenderError::new(azimuth, format!("write png '{}': {e}", tmp.display())))?;
        std::fs::rename(&tmp, out_path).map_err(|e| {
            RenderError::new(
                azimuth,
                format!("move frame into place at '{}': {e}", out_path.display()),
            )
        })?;
        guard.disarm();
        tracing::debug!(azimuth = azimuth.degrees(), path = %out_path.display(), "wrote frame");
        Ok(())
    }
}

fn title_band_height(canvas_height: u32) -> u32 {
    (canvas_height / 16).max(12)
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

fn bezpath_to_cpu(path: &kurbo::BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(vello_cpu::kurbo::Point::new(p.x, p.y)),
            PathEl::LineTo(p) => out.line_to(vello_cpu::kurbo::Point::new(p.x, p.y)),
            PathEl::QuadTo(p1, p2) => out.quad_to(
                vello_cpu::kurbo::Point::new(p1.x, p1.y),
                vello_cpu::kurbo::Point::new(p2.x, p2.y),
            ),
            PathEl::CurveTo(p1, p2, p3) => out.curve_to(
                vello_cpu::kurbo::Point::new(p1.x, p1.y),
                vello_cpu::kurbo::Point::new(p2.x, p2.y),
                vello_cpu::kurbo::Point::new(p3.x, p3.y),
            ),
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

fn pixmap_from_premul_bytes(
    bytes: &[u8],
    width: u32,
    height: u32,
) -> SweepResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| SweepError::validation("pixmap width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| SweepError::validation("pixmap height exceeds u16"))?;
    if bytes.len()
        != (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4)
    {
        return Err(SweepError::validation("pixmap byte len mismatch"));
    }
    let pixels = bytes
        .chunks_exact(4)
        .map(|px| vello_cpu::peniko::color::PremulRgba8::from_u8_array([px[0], px[1], px[2], px[3]]))
        .collect::<Vec<_>>();
    Ok(vello_cpu::Pixmap::from_parts_with_opacity(pixels, w, h, true))
}

#[cfg(test)]
#[path = "../../tests/unit/render/cpu.rs"]
mod tests;
