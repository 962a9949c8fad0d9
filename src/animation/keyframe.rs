use crate::animation::ease::{CubicBezier, Interpolation};
use crate::foundation::core::{Frame, Point};

/// Interpolation contract for animated value types.
pub trait Lerp: Sized {
    /// Interpolate from `a` to `b` with normalized factor `t`.
    fn lerp(a: &Self, b: &Self, t: f64) -> Self;
}

impl Lerp for f32 {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        (f64::from(*a) + (f64::from(*b) - f64::from(*a)) * t) as f32
    }
}

impl Lerp for f64 {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        a + (b - a) * t
    }
}

impl Lerp for Point {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        a.lerp(*b, t)
    }
}

/// One segment `[start_time, end_time]` of an animated property.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Keyframe<T> {
    /// Frame where the segment starts.
    pub start_time: Frame,
    /// Frame where the segment ends.
    pub end_time: Frame,
    /// Value at `start_time`.
    pub start_value: T,
    /// Value at `end_time`.
    pub end_value: T,
    /// Interpolation toward `end_value`.
    #[serde(default)]
    pub interpolation: Interpolation,
    /// Outgoing bezier handle in normalized space.
    #[serde(default)]
    pub bezier_out: Point,
    /// Incoming bezier handle in normalized space.
    #[serde(default = "unit_point")]
    pub bezier_in: Point,
}

fn unit_point() -> Point {
    Point::new(1.0, 1.0)
}

impl<T> Keyframe<T>
where
    T: Lerp + Clone,
{
    /// Linear keyframe between two values.
    pub fn linear(start_time: Frame, end_time: Frame, start_value: T, end_value: T) -> Self {
        Self {
            start_time,
            end_time,
            start_value,
            end_value,
            interpolation: Interpolation::Linear,
            bezier_out: Point::ZERO,
            bezier_in: unit_point(),
        }
    }

    /// Eased progress of `frame` within this segment.
    pub(crate) fn progress_at(&self, frame: Frame) -> f64 {
        let span = self.end_time - self.start_time;
        if span <= 0 {
            return 0.0;
        }
        let t = ((frame - self.start_time) as f64 / span as f64).clamp(0.0, 1.0);
        match self.interpolation {
            Interpolation::Hold => 0.0,
            Interpolation::Linear => t,
            Interpolation::Bezier => CubicBezier::new(self.bezier_out, self.bezier_in).apply(t),
        }
    }

    /// Value of this segment at `frame`, clamped to the segment ends.
    pub fn value_at(&self, frame: Frame) -> T {
        if frame <= self.start_time || self.interpolation == Interpolation::Hold {
            return self.start_value.clone();
        }
        if frame >= self.end_time {
            return self.end_value.clone();
        }
        T::lerp(&self.start_value, &self.end_value, self.progress_at(frame))
    }
}

/// A value that is either constant or keyframed over frames.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Property<T> {
    /// Constant value.
    Static(T),
    /// Keyframes sorted by `start_time`, contiguous in time.
    Animated(Vec<Keyframe<T>>),
}

impl<T: Default> Default for Property<T> {
    fn default() -> Self {
        Self::Static(T::default())
    }
}

impl<T> Property<T>
where
    T: Lerp + Clone + Default,
{
    /// Return `true` when the property carries keyframes.
    pub fn is_animated(&self) -> bool {
        matches!(self, Self::Animated(keys) if !keys.is_empty())
    }

    /// Keyframes of an animated property; empty for static ones.
    pub fn keyframes(&self) -> &[Keyframe<T>] {
        match self {
            Self::Static(_) => &[],
            Self::Animated(keys) => keys,
        }
    }

    /// Sample the property at `frame`.
    ///
    /// Frames before the first keyframe hold its start value, frames after
    /// the last hold its end value.
    pub fn value_at(&self, frame: Frame) -> T {
        match self {
            Self::Static(v) => v.clone(),
            Self::Animated(keys) => {
                let Some(first) = keys.first() else {
                    return T::default();
                };
                if frame < first.start_time {
                    return first.start_value.clone();
                }
                let idx = keys.partition_point(|k| k.end_time <= frame);
                match keys.get(idx) {
                    Some(k) => k.value_at(frame),
                    None => keys[keys.len() - 1].end_value.clone(),
                }
            }
        }
    }
}

fn interpolate(a: Point, b: Point, t: f64) -> Point {
    a.lerp(b, t)
}

/// Split a keyframe at `position`, keeping the right part when `cut_left`
/// and the left part otherwise.
///
/// Bezier handles are re-fitted with de Casteljau subdivision so the kept
/// part follows the original curve.
pub(crate) fn cut_keyframe(keyframe: &mut Keyframe<f32>, position: Frame, cut_left: bool) {
    let mid = keyframe.value_at(position);
    if keyframe.interpolation == Interpolation::Bezier && keyframe.end_time != keyframe.start_time
    {
        let t = (position - keyframe.start_time) as f64
            / (keyframe.end_time - keyframe.start_time) as f64;
        let p1 = interpolate(Point::ZERO, keyframe.bezier_out, t);
        let bc = interpolate(keyframe.bezier_out, keyframe.bezier_in, t);
        let p5 = interpolate(keyframe.bezier_in, Point::new(1.0, 1.0), t);
        let p2 = interpolate(p1, bc, t);
        let p4 = interpolate(bc, p5, t);
        if cut_left {
            keyframe.bezier_out = p4;
            keyframe.bezier_in = p5;
        } else {
            keyframe.bezier_out = p1;
            keyframe.bezier_in = p2;
        }
    }
    if cut_left {
        keyframe.start_value = mid;
        keyframe.start_time = position;
    } else {
        keyframe.end_value = mid;
        keyframe.end_time = position;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/animation/keyframe.rs"]
mod tests;
