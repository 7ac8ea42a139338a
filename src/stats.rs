use crate::util::{covariance, mean, variance};

/// Standard board radius (outer double ring edge) in millimetres.
pub const BOARD_RADIUS_MM: f64 = 170.0;

/// Variance assumed for a session with fewer than two throws, so the
/// rendered ellipse is a sane isotropic blob instead of degenerate.
pub fn default_variance() -> f64 {
    let r = BOARD_RADIUS_MM / 4.0;
    r * r
}

/// Sample mean and 2x2 population covariance of impact points. Derived from
/// the current record set on every mutation, never stored.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistributionStats {
    pub mean: (f64, f64),
    pub var_x: f64,
    pub var_y: f64,
    pub cov_xy: f64,
}

impl Default for DistributionStats {
    fn default() -> Self {
        Self {
            mean: (0.0, 0.0),
            var_x: default_variance(),
            var_y: default_variance(),
            cov_xy: 0.0,
        }
    }
}

impl DistributionStats {
    /// Recomputes over all points, O(n). With fewer than two points the
    /// fixed isotropic default applies.
    pub fn from_points(points: &[(f64, f64)]) -> Self {
        if points.len() < 2 {
            return Self::default();
        }
        let xs: Vec<f64> = points.iter().map(|p| p.0).collect();
        let ys: Vec<f64> = points.iter().map(|p| p.1).collect();

        // Unwraps are guarded by the length check above.
        Self {
            mean: (mean(&xs).unwrap(), mean(&ys).unwrap()),
            var_x: variance(&xs).unwrap(),
            var_y: variance(&ys).unwrap(),
            cov_xy: covariance(&xs, &ys).unwrap(),
        }
    }

    /// Principal axes of the covariance, for drawing confidence ellipses.
    /// `None` when the covariance is not positive definite (all throws on a
    /// line or a single point).
    pub fn ellipse_axes(&self) -> Option<EllipseAxes> {
        let (a, b, c) = (self.var_x, self.var_y, self.cov_xy);
        let trace = a + b;
        let det = a * b - c * c;
        let disc = (trace * trace / 4.0 - det).max(0.0);
        let root = disc.sqrt();
        let eig1 = trace / 2.0 + root;
        let eig2 = trace / 2.0 - root;
        if eig1 <= 0.0 || eig2 <= 0.0 {
            return None;
        }

        let major = if c.abs() > 1e-9 {
            (eig1 - b, c)
        } else if a >= b {
            (1.0, 0.0)
        } else {
            (0.0, 1.0)
        };
        let norm = major.0.hypot(major.1);
        if norm == 0.0 {
            return None;
        }

        Some(EllipseAxes {
            center: self.mean,
            major_axis: (major.0 / norm, major.1 / norm),
            half_major: eig1.sqrt(),
            half_minor: eig2.sqrt(),
        })
    }
}

/// 1-sigma confidence ellipse; scale the half-axes by k for the k-sigma
/// contour.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EllipseAxes {
    pub center: (f64, f64),
    /// Unit vector along the major axis; the minor axis is its normal.
    pub major_axis: (f64, f64),
    pub half_major: f64,
    pub half_minor: f64,
}

impl EllipseAxes {
    /// Points on the k-sigma contour, for rendering.
    pub fn contour(&self, k: f64, steps: usize) -> Vec<(f64, f64)> {
        let (ux, uy) = self.major_axis;
        let (vx, vy) = (-uy, ux);
        let rx = k * self.half_major;
        let ry = k * self.half_minor;
        (0..steps)
            .map(|i| {
                let theta = (i as f64) * std::f64::consts::TAU / steps as f64;
                let lx = rx * theta.cos();
                let ly = ry * theta.sin();
                (
                    self.center.0 + lx * ux + ly * vx,
                    self.center.1 + lx * uy + ly * vy,
                )
            })
            .collect()
    }
}
