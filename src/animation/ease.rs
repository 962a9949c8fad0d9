use crate::foundation::core::Point;

/// Interpolation between the two ends of a keyframe.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    /// Hold the start value until the next keyframe.
    Hold,
    /// Straight-line interpolation.
    #[default]
    Linear,
    /// Cubic bezier timing curve through `bezier_out` and `bezier_in`.
    Bezier,
}

/// Cubic bezier timing curve anchored at `(0, 0)` and `(1, 1)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CubicBezier {
    p1: Point,
    p2: Point,
}

impl CubicBezier {
    const NEWTON_ITERATIONS: usize = 8;
    const EPSILON: f64 = 1e-7;

    /// Build a curve from its two inner control points.
    pub fn new(p1: Point, p2: Point) -> Self {
        Self {
            p1: Point::new(p1.x.clamp(0.0, 1.0), p1.y),
            p2: Point::new(p2.x.clamp(0.0, 1.0), p2.y),
        }
    }

    fn sample(a1: f64, a2: f64, t: f64) -> f64 {
        let u = 1.0 - t;
        3.0 * u * u * t * a1 + 3.0 * u * t * t * a2 + t * t * t
    }

    fn slope(a1: f64, a2: f64, t: f64) -> f64 {
        let u = 1.0 - t;
        3.0 * u * u * a1 + 6.0 * u * t * (a2 - a1) + 3.0 * t * t * (1.0 - a2)
    }

    fn solve_t(&self, x: f64) -> f64 {
        let mut t = x;
        for _ in 0..Self::NEWTON_ITERATIONS {
            let err = Self::sample(self.p1.x, self.p2.x, t) - x;
            if err.abs() < Self::EPSILON {
                return t;
            }
            let d = Self::slope(self.p1.x, self.p2.x, t);
            if d.abs() < 1e-6 {
                break;
            }
            t -= err / d;
        }
        let (mut lo, mut hi) = (0.0, 1.0);
        t = x;
        while hi - lo > Self::EPSILON {
            let v = Self::sample(self.p1.x, self.p2.x, t);
            if (v - x).abs() < Self::EPSILON {
                break;
            }
            if v < x {
                lo = t;
            } else {
                hi = t;
            }
            t = (lo + hi) * 0.5;
        }
        t
    }

    /// Map normalized time `x` in `[0, 1]` to eased progress.
    pub fn apply(&self, x: f64) -> f64 {
        let x = x.clamp(0.0, 1.0);
        if x == 0.0 || x == 1.0 {
            return x;
        }
        Self::sample(self.p1.y, self.p2.y, self.solve_t(x))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/animation/ease.rs"]
mod tests;
