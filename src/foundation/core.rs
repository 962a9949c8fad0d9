pub use kurbo::{Affine, BezPath, Point, Rect, Vec2};

/// Integer frame number at some timeline's frame rate.
pub type Frame = i64;

/// Microseconds per second, the unit of every client-facing time value.
pub const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// Frame rate used by layers that have no backing file.
pub const DEFAULT_FRAME_RATE: f32 = 60.0;

/// Inclusive frame range `[start, end]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TimeRange {
    /// First frame of the range.
    pub start: Frame,
    /// Last frame of the range (inclusive).
    pub end: Frame,
}

impl TimeRange {
    /// Build a range from its inclusive bounds.
    pub fn new(start: Frame, end: Frame) -> Self {
        Self { start, end }
    }

    /// Number of frames covered, `0` for inverted ranges.
    pub fn duration(self) -> Frame {
        if self.end < self.start {
            0
        } else {
            self.end - self.start + 1
        }
    }

    /// Return `true` when `start <= end`.
    pub fn is_valid(self) -> bool {
        self.start <= self.end
    }

    /// Return `true` when `frame` lies inside the inclusive bounds.
    pub fn contains(self, frame: Frame) -> bool {
        self.start <= frame && frame <= self.end
    }
}

/// Convert microseconds to a frame number, rounding down.
pub fn time_to_frame(time: i64, frame_rate: f32) -> Frame {
    (time as f64 * f64::from(frame_rate) / MICROS_PER_SECOND).floor() as Frame
}

/// Convert a frame number to microseconds, rounding up.
///
/// Rounding up keeps `time_to_frame(frame_to_time(f)) == f`.
pub fn frame_to_time(frame: Frame, frame_rate: f32) -> i64 {
    if frame_rate <= 0.0 {
        return 0;
    }
    (frame as f64 * MICROS_PER_SECOND / f64::from(frame_rate)).ceil() as i64
}

/// Map a frame to a progress value in `[0, 1]`.
///
/// The `+0.1` bias keeps `progress_to_frame(frame_to_progress(f)) == f`
/// under floating-point error.
pub fn frame_to_progress(current: Frame, total: Frame) -> f64 {
    if total <= 1 {
        return 0.0;
    }
    if current >= total - 1 {
        return 1.0;
    }
    (current as f64 + 0.1) / total as f64
}

/// Map a progress value onto `[0, total)`.
///
/// Values outside `[0, 1]` wrap; an exact `1.0` selects the last frame.
pub fn progress_to_frame(progress: f64, total: Frame) -> Frame {
    if total <= 1 {
        return 0;
    }
    let percent = wrap_progress(progress);
    let frame = (percent * total as f64).floor() as Frame;
    if frame >= total { total - 1 } else { frame }
}

/// Map a progress value onto `[0, total_time)` microseconds.
pub fn progress_to_time(progress: f64, total_time: i64) -> i64 {
    if total_time <= 1 {
        return 0;
    }
    let percent = wrap_progress(progress);
    let time = (percent * total_time as f64).floor() as i64;
    if time >= total_time { total_time - 1 } else { time }
}

/// Map a time in microseconds to a progress value in `[0, 1]`.
pub fn time_to_progress(time: i64, total_time: i64) -> f64 {
    if total_time <= 1 {
        return 0.0;
    }
    if time >= total_time - 1 {
        return 1.0;
    }
    (time as f64 + 0.1) / total_time as f64
}

fn wrap_progress(progress: f64) -> f64 {
    let mut percent = progress % 1.0;
    if percent <= 0.0 && progress != 0.0 {
        percent += 1.0;
    }
    percent
}

/// Rescale a frame between two frame rates, rounding half away from zero.
pub fn rescale_frame(frame: Frame, from_rate: f32, to_rate: f32) -> Frame {
    if from_rate <= 0.0 || from_rate == to_rate {
        return frame;
    }
    (frame as f64 * f64::from(to_rate) / f64::from(from_rate)).round() as Frame
}

/// 8-bit straight-alpha color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rgba8 {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel.
    #[serde(default = "opaque")]
    pub a: u8,
}

fn opaque() -> u8 {
    255
}

impl Rgba8 {
    /// Opaque color from RGB channels.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Fully transparent black.
    pub const fn transparent() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        }
    }
}

/// Map a point through the inverse of `matrix`.
///
/// Returns `None` when the matrix is not invertible.
pub fn map_point_inverted(matrix: Affine, point: Point) -> Option<Point> {
    if matrix.determinant().abs() <= f64::EPSILON {
        return None;
    }
    Some(matrix.inverse() * point)
}

/// Return `true` when the matrix can be inverted.
pub fn is_invertible(matrix: Affine) -> bool {
    let det = matrix.determinant();
    det.is_finite() && det.abs() > f64::EPSILON
}

/// Axis scale factors encoded in a matrix.
pub fn scale_factor(matrix: Affine) -> Vec2 {
    let [a, b, c, d, _, _] = matrix.as_coeffs();
    Vec2::new(a.hypot(b), c.hypot(d))
}

/// Bounding box of `rect` after mapping it through `matrix`.
pub fn map_rect(matrix: Affine, rect: Rect) -> Rect {
    if rect.is_zero_area() {
        return Rect::ZERO;
    }
    matrix.transform_rect_bbox(rect)
}

/// Return `true` when `point` is inside `rect`, with inclusive left/top edges.
pub fn rect_contains(rect: Rect, point: Point) -> bool {
    point.x >= rect.x0 && point.x < rect.x1 && point.y >= rect.y0 && point.y < rect.y1
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
