//! Image layers and the content-time remap that drives replacement media.
//!
//! The remap is indexed by stretched frames of the owning document root and
//! yields the frame to show from the replacement image. It is built lazily
//! and dropped whenever the layer's placement in time changes.

use crate::animation::ease::Interpolation;
use crate::animation::keyframe::{Keyframe, Property, cut_keyframe};
use crate::document::model::{ImageBytesDef, LayerContentDef, LayerDef, TimeStretchMode};
use crate::foundation::core::{
    DEFAULT_FRAME_RATE, Frame, MICROS_PER_SECOND, TimeRange, frame_to_time, time_to_frame,
};
use crate::foundation::ids::next_unique_id;
use crate::image::Image;
use crate::layer::Layer;
use crate::layer::node::{LayerId, LayerNode, NodeKind};
use crate::layer::tree::LayerArena;
use std::ops::Deref;
use std::sync::Arc;

/// One playback span of the authored content, in microseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VideoRange {
    /// Content time where the span starts.
    pub start: i64,
    /// Content time where the span ends.
    pub end: i64,
    /// Layer time the span takes to play.
    pub play_duration: i64,
    /// The span plays from `start` down to `end`.
    pub reversed: bool,
}

/// What an image layer currently shows.
#[derive(Clone, Debug)]
pub enum ImageContent {
    /// The picture embedded in the document, or a blank placeholder.
    Default(ImageBytesDef),
    /// A client-supplied replacement.
    Replacement(Arc<Image>),
}

#[derive(Clone, Copy, Debug)]
struct FrameRange {
    start: Frame,
    end: Frame,
    duration: Frame,
}

fn frame_ranges(keys: &[Keyframe<f32>], def: &LayerDef) -> Vec<FrameRange> {
    let value = |v: f32| v.round() as Frame;
    let mut ranges = Vec::new();
    let Some(first) = keys.first() else {
        return ranges;
    };
    if first.start_time > def.start_time {
        let v = value(first.start_value);
        ranges.push(FrameRange {
            start: v,
            end: v,
            duration: first.start_time - def.start_time,
        });
    }
    for k in keys {
        ranges.push(FrameRange {
            start: value(k.start_value),
            end: value(k.end_value),
            duration: k.end_time - k.start_time,
        });
    }
    if let Some(last) = keys.last()
        && last.end_time < def.start_time + def.duration
    {
        let v = value(last.end_value);
        ranges.push(FrameRange {
            start: v,
            end: v,
            duration: def.start_time + def.duration - last.end_time,
        });
    }
    let mut i = ranges.len().saturating_sub(1);
    while i >= 1 {
        let (prev, cur) = (ranges[i - 1], ranges[i]);
        if cur.start == cur.end && prev.start == prev.end && cur.start == prev.start {
            ranges[i - 1].duration += cur.duration;
            ranges.remove(i);
        }
        i -= 1;
    }
    let mut i = ranges.len().saturating_sub(1);
    while i >= 1 {
        if ranges[i].duration == 1 {
            ranges[i - 1].duration += 1;
            ranges.remove(i);
        }
        i -= 1;
    }
    ranges
}

fn max_value(keys: &[Keyframe<f32>]) -> Frame {
    keys.iter()
        .fold(0.0f32, |acc, k| acc.max(k.start_value).max(k.end_value)) as Frame
}

/// Rescale remap keyframes into the visible range and trim them to `[0, file_end]`.
///
/// Values are shifted so the smallest one is zero; returns the number of
/// content frames the remap spans.
fn scale_time_remap(keys: &mut Vec<Keyframe<f32>>, visible: TimeRange, frame_scale: f64, file_end: Frame) -> Frame {
    let mut min_value = f32::MAX;
    let mut max_value = 0.0f32;
    for i in (0..keys.len()).rev() {
        let k = &keys[i];
        let start = visible.start + (k.start_time as f64 * frame_scale).round() as Frame;
        let end = (visible.start + ((k.end_time + 1) as f64 * frame_scale).round() as Frame - 1).max(start);
        if start > file_end || end < 0 {
            keys.remove(i);
            continue;
        }
        let start_value = (f64::from(k.start_value) * frame_scale).round() as f32;
        let end_value = ((f64::from(k.end_value) + 1.0) * frame_scale).round() as f32 - 1.0;
        let k = &mut keys[i];
        k.start_time = start;
        k.end_time = end;
        k.start_value = start_value;
        k.end_value = end_value;
        if k.end_time > file_end {
            cut_keyframe(k, file_end, false);
        }
        if k.start_time < 0 {
            cut_keyframe(k, 0, true);
        }
        min_value = min_value.min(k.start_value).min(k.end_value).floor();
        max_value = max_value.max(k.start_value).max(k.end_value).floor();
    }
    for k in keys.iter_mut() {
        k.start_value -= min_value;
        k.end_value -= min_value;
    }
    if keys.is_empty() {
        let span = visible.end - visible.start;
        keys.push(Keyframe::linear(visible.start, visible.end, 0.0, span as f32));
        max_value = span as f32;
        min_value = 0.0;
    }
    (max_value - min_value + 1.0) as Frame
}

/// Replicate the remap across the repeat cycles of a stretched document root.
fn expand_by_repeat(keys: &mut Vec<Keyframe<f32>>, file_duration: Frame, stretched: Frame, content_duration: Frame) {
    let last = stretched - 1;
    let cycles = stretched / file_duration.max(1) + 1;
    let base = keys.clone();
    let mut added = Vec::new();
    'cycles: for count in 1..=cycles {
        for k in &base {
            let mut copy = k.clone();
            copy.start_time += file_duration * count;
            copy.end_time += file_duration * count;
            copy.start_value += (content_duration * count) as f32;
            copy.end_value += (content_duration * count) as f32;
            if copy.start_time > last {
                break 'cycles;
            }
            if copy.end_time > last {
                cut_keyframe(&mut copy, last, false);
            }
            let done = copy.end_time == last;
            added.push(copy);
            if done {
                break 'cycles;
            }
        }
    }
    keys.extend(added);
}

impl LayerArena {
    /// Frames of the document root's stretched timeline where `id` is on screen.
    pub(crate) fn visible_range_in_file(&self, id: LayerId) -> Option<TimeRange> {
        let node = self.node(id);
        let root = node.root_file?;
        let mut range = TimeRange::new(
            node.start_frame,
            node.start_frame + self.frame_duration(id) - 1,
        );
        let mut parent = node.parent;
        let mut child_rate = self.frame_rate(id);
        while let Some(p) = parent {
            range.start = self.child_frame_to_local(p, range.start, child_rate);
            range.end = self.child_frame_to_local(p, range.end, child_rate);
            if p == root {
                break;
            }
            child_rate = self.frame_rate(p);
            parent = self.node(p).parent;
        }
        let root_start = self.node(root).start_frame;
        range.start -= root_start;
        range.end -= root_start;
        if range.start > range.end {
            std::mem::swap(&mut range.start, &mut range.end);
        }
        Some(range)
    }

    /// Authored remap keyframes, or a 1:1 ramp over the layer's lifetime.
    fn copy_content_time_remap(&self, id: LayerId) -> Vec<Keyframe<f32>> {
        let node = self.node(id);
        let authored = node
            .image()
            .and_then(|i| i.time_remap.as_ref())
            .filter(|r| r.is_animated());
        match authored {
            Some(remap) => remap.keyframes().to_vec(),
            None => {
                let start = node.def.start_time;
                let end = start + node.def.duration - 1;
                vec![Keyframe::linear(start, end, start as f32, end as f32)]
            }
        }
    }

    /// Content-time remap of an image layer, built on first use.
    pub(crate) fn content_time_remap(&mut self, id: LayerId) -> Option<Property<f32>> {
        if let Some(cached) = self.node(id).image()?.content_remap.clone() {
            return Some(cached);
        }
        let root = self.node(id).root_file?;
        let visible = self.visible_range_in_file(id)?;
        let stretched = self.stretched_frame_duration(root);
        let remap = if visible.start == visible.end || visible.end < 0 || visible.start > stretched - 1 {
            Property::Static(0.0)
        } else {
            let layer_start = self.node(id).def.start_time;
            let mut keys = self.copy_content_time_remap(id);
            for k in &mut keys {
                k.start_time -= layer_start;
                k.end_time -= layer_start;
            }
            let frame_scale = (visible.end - visible.start + 1) as f64 / self.frame_duration(id) as f64;
            self.build_content_time_remap(&mut keys, root, visible, frame_scale);
            Property::Animated(keys)
        };
        if let Some(image) = self.node_mut(id).image_mut() {
            image.content_remap = Some(remap.clone());
        }
        Some(remap)
    }

    fn build_content_time_remap(&self, keys: &mut Vec<Keyframe<f32>>, root: LayerId, visible: TimeRange, frame_scale: f64) {
        let file_duration = self.frame_duration(root);
        let stretched = self.stretched_frame_duration(root);
        let mode = self
            .node(root)
            .composition()
            .and_then(|c| c.file.as_ref())
            .map_or(TimeStretchMode::None, |f| f.mode);
        let has_repeat = matches!(mode, TimeStretchMode::Repeat | TimeStretchMode::RepeatInverted)
            && file_duration < stretched;
        let file_end = if has_repeat {
            file_duration - 1
        } else {
            stretched - 1
        };
        let content_duration = scale_time_remap(keys, visible, frame_scale, file_end);
        if let Some(first) = keys.first()
            && first.start_time > 0
        {
            let fill = Keyframe::linear(0, first.start_time, first.start_value, first.start_value);
            keys.insert(0, fill);
        }
        if let Some(last) = keys.last()
            && last.end_time < file_end
        {
            let fill = Keyframe::linear(last.end_time, file_end, last.end_value, last.end_value);
            keys.push(fill);
        }
        if has_repeat {
            expand_by_repeat(keys, file_duration, stretched, content_duration);
        }
    }

    /// Length of the replacement content the layer plays, in microseconds.
    pub(crate) fn content_duration(&mut self, id: LayerId) -> i64 {
        if let Some(root) = self.node(id).root_file {
            let rate = self.frame_rate(root);
            return match self.content_time_remap(id) {
                Some(Property::Animated(keys)) if !keys.is_empty() => {
                    frame_to_time(max_value(&keys) + 1, rate)
                }
                _ => 0,
            };
        }
        let rate = self.frame_rate(id);
        let node = self.node(id);
        match node
            .image()
            .and_then(|i| i.time_remap.as_ref())
            .filter(|r| r.is_animated())
        {
            Some(remap) => frame_to_time(max_value(remap.keyframes()), rate),
            None => frame_to_time(node.def.duration, rate),
        }
    }

    pub(crate) fn video_ranges(&self, id: LayerId) -> Vec<VideoRange> {
        let rate = self.frame_rate(id);
        let node = self.node(id);
        let authored = node
            .image()
            .and_then(|i| i.time_remap.as_ref())
            .filter(|r| r.is_animated());
        let Some(remap) = authored else {
            let duration = frame_to_time(node.def.duration, rate);
            return vec![VideoRange {
                start: 0,
                end: duration,
                play_duration: duration,
                reversed: false,
            }];
        };
        frame_ranges(remap.keyframes(), &node.def)
            .into_iter()
            .map(|r| VideoRange {
                start: frame_to_time(r.start, rate),
                end: frame_to_time(r.end, rate),
                play_duration: frame_to_time(r.duration, rate),
                reversed: r.end < r.start,
            })
            .collect()
    }

    pub(crate) fn content_visible(&mut self, id: LayerId) -> bool {
        match self.node(id).root_file {
            Some(root) => {
                let frame = self.stretched_content_frame(root);
                self.visible_range_in_file(id)
                    .is_some_and(|r| r.start <= frame && frame <= r.end)
            }
            None => {
                let frames = time_to_frame(self.content_duration(id), self.frame_rate(id));
                (0..frames).contains(&self.node(id).content_frame)
            }
        }
    }

    /// Time to show from the replacement content when the layer is at `layer_time`.
    pub(crate) fn current_content_time(&mut self, id: LayerId, layer_time: i64) -> i64 {
        let Some(root) = self.node(id).root_file else {
            return layer_time - self.start_time(id);
        };
        let frame = self.stretched_content_frame(root);
        let rate = self.frame_rate(root);
        if self.content_visible(id)
            && let Some(remap) = self.content_time_remap(id)
        {
            let value = f64::from(remap.value_at(frame));
            return (value * MICROS_PER_SECOND / f64::from(rate)).ceil() as i64;
        }
        frame_to_time(frame, rate)
    }

    fn local_frame_to_file_frame(&self, id: LayerId, local_frame: Frame) -> Frame {
        let Some(root) = self.node(id).root_file else {
            return local_frame;
        };
        let mut frame = local_frame;
        let mut child_rate = self.frame_rate(id);
        let mut owner = self.timeline_owner(id);
        while let Some(o) = owner {
            frame = self.child_frame_to_local(o, frame, child_rate);
            child_rate = self.frame_rate(o);
            if o == root {
                break;
            }
            owner = self.timeline_owner(o);
        }
        frame
    }

    fn file_frame_to_local_frame(&self, id: LayerId, file_frame: Frame) -> Frame {
        let root = self.node(id).root_file;
        let mut owners = Vec::new();
        let mut owner = self.timeline_owner(id);
        while let Some(o) = owner {
            owners.push(o);
            if Some(o) == root {
                break;
            }
            owner = self.timeline_owner(o);
        }
        let mut frame = file_frame;
        for (i, &o) in owners.iter().enumerate().rev() {
            let child_rate = if i > 0 {
                self.frame_rate(owners[i - 1])
            } else {
                self.frame_rate(id)
            };
            frame = self.local_frame_to_child(o, frame, child_rate);
        }
        frame
    }

    /// First stretched frame at which the remap reaches content frame `value`.
    fn frame_from_time_remap(&mut self, id: LayerId, value: Frame) -> Frame {
        let Some(remap) = self.content_time_remap(id) else {
            return 0;
        };
        let target = value as f64;
        let mut result = 0;
        for k in remap.keyframes() {
            let (start_value, end_value) = (f64::from(k.start_value), f64::from(k.end_value));
            if start_value > target {
                break;
            }
            if end_value <= target {
                result = k.end_time;
                continue;
            }
            result = match k.interpolation {
                Interpolation::Linear => {
                    let scale = (k.end_time - k.start_time) as f64 / (end_value - start_value);
                    k.start_time + ((target - start_value) * scale).ceil() as Frame
                }
                Interpolation::Hold => k.end_time,
                Interpolation::Bezier => {
                    let (mut lo, mut hi) = (k.start_time, k.end_time);
                    let mut current = (lo + hi) / 2;
                    while lo <= hi {
                        let v = remap.value_at(current) as Frame;
                        if v > value {
                            hi = current - 1;
                        } else if v < value {
                            lo = current + 1;
                        } else {
                            break;
                        }
                        current = (lo + hi) / 2;
                    }
                    current
                }
            };
            break;
        }
        result
    }

    pub(crate) fn content_time_to_layer(&mut self, id: LayerId, content_time: i64) -> i64 {
        let Some(root) = self.node(id).root_file else {
            return content_time;
        };
        let content_frame = time_to_frame(content_time, self.frame_rate(root));
        let file_frame = self.frame_from_time_remap(id, content_frame);
        let start = self.node(id).start_frame;
        let local = self
            .file_frame_to_local_frame(id, file_frame)
            .clamp(start, start + self.stretched_frame_duration(id));
        frame_to_time(local, self.frame_rate(id))
    }

    pub(crate) fn layer_time_to_content(&mut self, id: LayerId, layer_time: i64) -> i64 {
        let Some(root) = self.node(id).root_file else {
            return layer_time;
        };
        let local = time_to_frame(layer_time, self.frame_rate(id));
        let file_frame = self.local_frame_to_file_frame(id, local);
        let value = self
            .content_time_remap(id)
            .map_or(0.0, |r| r.value_at(file_frame));
        frame_to_time(value.floor() as Frame, self.frame_rate(root))
    }

    /// Swap the replacement picture; `None` restores the document's picture.
    pub(crate) fn set_image(&mut self, id: LayerId, image: Option<Arc<Image>>) {
        let Some(payload) = self.node(id).image() else {
            return;
        };
        let old = payload.replacement.clone();
        if let Some(stage) = self.stage_mut() {
            if let Some(old) = &old {
                stage.remove_image_reference(old, id);
            }
            if let Some(image) = &image {
                stage.add_image_reference(image, id);
            }
        }
        if let Some(image) = &image {
            image.set_owner(id);
        }
        if let Some(payload) = self.node_mut(id).image_mut() {
            payload.replacement = image;
        }
        self.notify_modified(id, true);
        self.invalidate_cache_scale(id);
    }

    pub(crate) fn image_content(&self, id: LayerId) -> Option<ImageContent> {
        let payload = self.node(id).image()?;
        Some(match &payload.replacement {
            Some(image) => ImageContent::Replacement(Arc::clone(image)),
            None => ImageContent::Default(payload.default_image.clone()),
        })
    }
}

/// A layer showing a replaceable picture.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageLayer {
    layer: Layer,
}

impl Deref for ImageLayer {
    type Target = Layer;

    fn deref(&self) -> &Layer {
        &self.layer
    }
}

impl ImageLayer {
    /// Build a standalone image layer of `duration` microseconds at 60 fps.
    ///
    /// Returns `None` for non-positive sizes or durations.
    pub fn make(width: i32, height: i32, duration: i64) -> Option<Self> {
        if width <= 0 || height <= 0 || duration <= 0 {
            return None;
        }
        let frames = time_to_frame(duration, DEFAULT_FRAME_RATE).max(1);
        let slot = LayerArena::plant_with(|arena| {
            let id = LayerId(next_unique_id());
            let def = LayerDef::standalone(
                LayerContentDef::Image {
                    image_id: 0,
                    time_remap: None,
                },
                frames,
            );
            let mut node = LayerNode::new(id, Arc::new(def), None);
            if let NodeKind::Image(payload) = &mut node.kind {
                payload.default_image.width = width;
                payload.default_image.height = height;
            }
            node.content_version = 1;
            node.editable_index = 0;
            arena.insert(node);
            id
        });
        Some(Self {
            layer: Layer::from_slot(slot),
        })
    }

    pub(crate) fn from_layer(layer: Layer) -> Self {
        Self { layer }
    }

    /// Length of the content this layer plays, in microseconds.
    pub fn content_duration(&self) -> i64 {
        self.with_mut(|arena, id| arena.content_duration(id))
    }

    /// Spans of the authored content, in playback order.
    pub fn video_ranges(&self) -> Vec<VideoRange> {
        self.with(|arena, id| arena.video_ranges(id))
    }

    /// Map a content time to the first layer time that shows it.
    pub fn content_time_to_layer(&self, content_time: i64) -> i64 {
        self.with_mut(|arena, id| arena.content_time_to_layer(id, content_time))
    }

    /// Map a layer time to the content time shown then.
    pub fn layer_time_to_content(&self, layer_time: i64) -> i64 {
        self.with_mut(|arena, id| arena.layer_time_to_content(id, layer_time))
    }

    /// Current picture: the replacement, or the document default.
    pub fn image(&self) -> ImageContent {
        self.with(|arena, id| arena.image_content(id))
            .unwrap_or_else(|| ImageContent::Default(placeholder()))
    }

    /// Replace this layer's picture only.
    pub fn set_image(&self, image: Option<Arc<Image>>) {
        self.with_mut(|arena, id| arena.set_image(id, image));
    }

    /// Replace the picture of every layer sharing this layer's editable slot.
    pub fn replace_image(&self, image: Option<Arc<Image>>) {
        self.with_mut(|arena, id| {
            let Some(root) = arena.node(id).root_file else {
                arena.set_image(id, image);
                return;
            };
            let index = arena.node(id).editable_index;
            let layer_type = arena.node(id).def.layer_type();
            for layer in arena.layers_by_editable_index(root, index, layer_type) {
                arena.set_image(layer, image.clone());
            }
            if let Some(image) = &image {
                image.set_owner(id);
            }
        });
    }
}

fn placeholder() -> ImageBytesDef {
    ImageBytesDef {
        id: 0,
        width: 0,
        height: 0,
        scale_factor: 1.0,
        unique_id: next_unique_id(),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/layer/remap.rs"]
mod tests;
