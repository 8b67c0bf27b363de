use crate::foundation::core::{Azimuth, Matrix, Point};

/// Points rescaled into the cube `[-1, 1]^3`, each axis independently.
///
/// Embeddings with fewer than three columns are padded with zeros.
#[derive(Clone, Debug)]
pub struct UnitCloud {
    points: Vec<[f64; 3]>,
}

impl UnitCloud {
    pub fn from_coords(coords: &Matrix) -> Self {
        let mut lo = [f64::INFINITY; 3];
        let mut hi = [f64::NEG_INFINITY; 3];
        let mut points = Vec::with_capacity(coords.rows());
        for row in coords.iter_rows() {
            let mut p = [0.0; 3];
            for (axis, v) in p.iter_mut().enumerate() {
                *v = row.get(axis).copied().unwrap_or(0.0);
                lo[axis] = lo[axis].min(*v);
                hi[axis] = hi[axis].max(*v);
            }
            points.push(p);
        }
        for p in &mut points {
            for axis in 0..3 {
                let span = hi[axis] - lo[axis];
                p[axis] = if span > 0.0 {
                    2.0 * (p[axis] - lo[axis]) / span - 1.0
                } else {
                    0.0
                };
            }
        }
        Self { points }
    }

    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A point projected to screen space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projected {
    /// Index into the source cloud.
    pub index: usize,
    pub screen: Point,
    /// Distance along the view direction; larger is closer to the viewer.
    pub depth: f64,
}

/// Orthographic camera orbiting the z axis.
///
/// Azimuth rotates around z, elevation tilts toward +z, matching the usual 3-D plot convention.
#[derive(Clone, Copy, Debug)]
pub struct OrbitCamera {
    pub elevation_deg: f64,
    /// Screen-space center of the cube.
    pub center: Point,
    /// Pixels per unit of the `[-1, 1]` cube.
    pub scale: f64,
}

impl OrbitCamera {
    /// Fit the whole cube, in every orientation, inside a `width x height` viewport.
    pub fn fit(elevation_deg: f64, width: f64, height: f64, top_inset: f64) -> Self {
        let usable_h = (height - top_inset).max(1.0);
        // The cube's circumscribed sphere has radius sqrt(3).
        let scale = 0.5 * width.min(usable_h) / 3f64.sqrt();
        Self {
            elevation_deg,
            center: Point::new(width * 0.5, top_inset + usable_h * 0.5),
            scale,
        }
    }

    /// Project every point, sorted far to near (painter's order).
    pub fn project(&self, cloud: &UnitCloud, azimuth: Azimuth) -> Vec<Projected> {
        let (sa, ca) = azimuth.radians().sin_cos();
        let (se, ce) = self.elevation_deg.to_radians().sin_cos();
        let eye = [ce * ca, ce * sa, se];
        let right = [-sa, ca, 0.0];
        let up = [-se * ca, -se * sa, ce];

        let mut out: Vec<Projected> = cloud
            .points()
            .iter()
            .enumerate()
            .map(|(index, p)| Projected {
                index,
                screen: Point::new(
                    self.center.x + self.scale * dot(p, &right),
                    self.center.y - self.scale * dot(p, &up),
                ),
                depth: dot(p, &eye),
            })
            .collect();
        // Stable sort keeps ties in input order so frames are reproducible.
        out.sort_by(|a, b| a.depth.total_cmp(&b.depth));
        out
    }
}

fn dot(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[cfg(test)]
#[path = "../../tests/unit/render/camera.rs"]
mod tests;
