/// The eight-entry qualitative "Dark2" palette, straight RGBA8.
pub const DARK2: [[u8; 4]; 8] = [
    [0x1b, 0x9e, 0x77, 0xff],
    [0xd9, 0x5f, 0x02, 0xff],
    [0x75, 0x70, 0xb3, 0xff],
    [0xe7, 0x29, 0x8a, 0xff],
    [0x66, 0xa6, 0x1e, 0xff],
    [0xe6, 0xab, 0x02, 0xff],
    [0xa6, 0x76, 0x1d, 0xff],
    [0x66, 0x66, 0x66, 0xff],
];

/// Smallest marker radius in pixels; anything thinner vanishes after anti-aliasing.
const MIN_RADIUS_PX: f64 = 0.5;

/// Per-point color and size derived from label values.
#[derive(Clone, Debug)]
pub struct MarkerStyle {
    lo: f64,
    hi: f64,
    px_per_pt: f64,
}

impl MarkerStyle {
    /// Fit the color range to `labels`; `dpi` converts marker points to pixels.
    pub fn fit(labels: &[f64], dpi: f64) -> Self {
        let lo = labels.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = labels.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self {
            lo: if lo.is_finite() { lo } else { 0.0 },
            hi: if hi.is_finite() { hi } else { 0.0 },
            px_per_pt: dpi / 72.0,
        }
    }

    /// Palette entry for `label`, linear over the fitted range.
    pub fn color(&self, label: f64) -> [u8; 4] {
        let span = self.hi - self.lo;
        let t = if span > 0.0 {
            ((label - self.lo) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let idx = ((t * DARK2.len() as f64) as usize).min(DARK2.len() - 1);
        DARK2[idx]
    }

    /// Marker radius in pixels. Area in pt^2 is `10 * label + 0.1`, so outliers stand out.
    pub fn radius_px(&self, label: f64) -> f64 {
        let area_pt2 = 10.0 * label.max(0.0) + 0.1;
        (0.5 * area_pt2.sqrt() * self.px_per_pt).max(MIN_RADIUS_PX)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/palette.rs"]
mod tests;
