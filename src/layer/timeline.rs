//! Timeline algebra over the layer arena.
//!
//! A layer's *local* frame lives in its timeline owner's content space (the
//! parent, or the matte owner's parent). Compositions translate between their
//! children's frames and their own local frames; file roots additionally
//! apply the time stretch.

use crate::document::model::LayerTransform;
use crate::foundation::core::{
    Affine, DEFAULT_FRAME_RATE, Frame, MICROS_PER_SECOND, Point, frame_to_progress, frame_to_time,
    is_invertible, map_point_inverted, progress_to_time, rescale_frame, time_to_frame,
};
use crate::layer::node::LayerId;
use crate::layer::tree::LayerArena;

impl LayerArena {
    /// Frame rate of the layer's own timeline.
    pub(crate) fn frame_rate(&self, id: LayerId) -> f32 {
        let node = self.node(id);
        match node.composition() {
            Some(c) => c.frame_rate,
            None => node
                .file
                .as_ref()
                .map_or(DEFAULT_FRAME_RATE, |f| f.frame_rate()),
        }
    }

    /// Authored length in frames, before any stretch.
    pub(crate) fn frame_duration(&self, id: LayerId) -> Frame {
        let node = self.node(id);
        match node.composition() {
            Some(c) => c.frame_duration,
            None => node.def.duration,
        }
    }

    pub(crate) fn stretched_frame_duration(&self, id: LayerId) -> Frame {
        let node = self.node(id);
        match node.composition().and_then(|c| c.file.as_ref()) {
            Some(f) => f.stretched_frame_duration,
            None => self.frame_duration(id),
        }
    }

    pub(crate) fn stretched_content_frame(&self, id: LayerId) -> Frame {
        let node = self.node(id);
        match node.composition().and_then(|c| c.file.as_ref()) {
            Some(f) => f.stretched_content_frame,
            None => node.content_frame,
        }
    }

    /// Layer whose content timeline `id` is placed on.
    pub(crate) fn timeline_owner(&self, id: LayerId) -> Option<LayerId> {
        let node = self.node(id);
        if node.parent.is_some() {
            return node.parent;
        }
        node.matte_owner.and_then(|owner| self.node(owner).parent)
    }

    /// Layer that receives change notifications from `id`.
    pub(crate) fn parent_or_owner(&self, id: LayerId) -> Option<LayerId> {
        let node = self.node(id);
        node.parent.or(node.matte_owner)
    }

    /// Outermost timeline owner reachable from `id` (itself when detached).
    pub(crate) fn global_layer(&self, id: LayerId) -> LayerId {
        let mut current = id;
        while let Some(owner) = self.timeline_owner(current) {
            current = owner;
        }
        current
    }

    /// Map a frame of a child's timeline (at `child_rate`) onto this layer's local timeline.
    pub(crate) fn child_frame_to_local(&self, id: LayerId, child_frame: Frame, child_rate: f32) -> Frame {
        let node = self.node(id);
        let mut local =
            rescale_frame(child_frame, child_rate, self.frame_rate(id)) + node.start_frame;
        if node.composition().is_some() {
            local += node.composition_offset();
        }
        if self.is_stretched(id) {
            local = self.file_frame_to_stretched_frame(id, local);
        }
        local
    }

    /// Inverse of [`LayerArena::child_frame_to_local`].
    pub(crate) fn local_frame_to_child(&self, id: LayerId, local_frame: Frame, child_rate: f32) -> Frame {
        let node = self.node(id);
        let mut local = local_frame;
        if self.is_stretched(id) {
            local = self.stretched_frame_to_file_frame(id, local);
        }
        if node.composition().is_some() {
            local -= node.composition_offset();
        }
        rescale_frame(local - node.start_frame, self.frame_rate(id), child_rate)
    }

    pub(crate) fn local_frame_to_global(&self, id: LayerId, local_frame: Frame) -> Frame {
        let mut frame = local_frame;
        let mut child_rate = self.frame_rate(id);
        let mut owner = self.timeline_owner(id);
        while let Some(o) = owner {
            frame = self.child_frame_to_local(o, frame, child_rate);
            child_rate = self.frame_rate(o);
            owner = self.timeline_owner(o);
        }
        frame
    }

    pub(crate) fn global_to_local_frame(&self, id: LayerId, global_frame: Frame) -> Frame {
        let mut owners = Vec::new();
        let mut owner = self.timeline_owner(id);
        while let Some(o) = owner {
            owners.push(o);
            owner = self.timeline_owner(o);
        }
        let mut frame = global_frame;
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

    pub(crate) fn local_time_to_global(&self, id: LayerId, local_time: i64) -> i64 {
        let local_frame = time_to_frame(local_time, self.frame_rate(id));
        let global_frame = self.local_frame_to_global(id, local_frame);
        frame_to_time(global_frame, self.frame_rate(self.global_layer(id)))
    }

    pub(crate) fn global_to_local_time(&self, id: LayerId, global_time: i64) -> i64 {
        let global_frame = time_to_frame(global_time, self.frame_rate(self.global_layer(id)));
        let local_frame = self.global_to_local_frame(id, global_frame);
        frame_to_time(local_frame, self.frame_rate(id))
    }

    pub(crate) fn start_time(&self, id: LayerId) -> i64 {
        frame_to_time(self.node(id).start_frame, self.frame_rate(id))
    }

    pub(crate) fn duration(&self, id: LayerId) -> i64 {
        frame_to_time(self.stretched_frame_duration(id), self.frame_rate(id))
    }

    pub(crate) fn current_frame(&self, id: LayerId) -> Frame {
        self.node(id).start_frame + self.stretched_content_frame(id)
    }

    pub(crate) fn current_time(&self, id: LayerId) -> i64 {
        frame_to_time(self.current_frame(id), self.frame_rate(id))
    }

    pub(crate) fn progress(&self, id: LayerId) -> f64 {
        frame_to_progress(
            self.stretched_content_frame(id),
            self.stretched_frame_duration(id),
        )
    }

    pub(crate) fn set_progress(&mut self, id: LayerId, progress: f64) -> bool {
        let time = self.start_time(id) + progress_to_time(progress, self.duration(id));
        self.goto_time_and_notify(id, time)
    }

    pub(crate) fn pre_frame(&mut self, id: LayerId) {
        let total = self.stretched_frame_duration(id);
        if total <= 1 {
            return;
        }
        let mut target = self.stretched_content_frame(id) - 1;
        if target < 0 {
            target = total - 1;
        }
        let time = frame_to_time(self.node(id).start_frame + target, self.frame_rate(id));
        self.goto_time_and_notify(id, time);
    }

    pub(crate) fn next_frame(&mut self, id: LayerId) {
        let total = self.stretched_frame_duration(id);
        if total <= 1 {
            return;
        }
        let mut target = self.stretched_content_frame(id) + 1;
        if target >= total {
            target = 0;
        }
        let time = frame_to_time(self.node(id).start_frame + target, self.frame_rate(id));
        self.goto_time_and_notify(id, time);
    }

    pub(crate) fn set_start_time(&mut self, id: LayerId, time: i64) {
        let rate = self.frame_rate(id);
        let target = time_to_frame(time, rate);
        let node = self.node(id);
        if node.start_frame == target {
            return;
        }
        let layer_frame = node.start_frame + node.content_frame;
        self.node_mut(id).start_frame = target;
        self.update_empty_parent(id);
        self.goto_time_and_notify(id, frame_to_time(layer_frame, rate));
        self.on_timeline_changed(id);
    }

    /// Re-aggregate the parent's timeline when it is a client-built composition.
    pub(crate) fn update_empty_parent(&mut self, id: LayerId) {
        if let Some(parent) = self.node(id).parent
            && self.node(parent).composition().is_some_and(|c| c.empty)
        {
            self.update_duration_and_frame_rate(parent);
        }
    }

    pub(crate) fn goto_time_and_notify(&mut self, id: LayerId, time: i64) -> bool {
        let changed = self.goto_time(id, time);
        if changed {
            self.notify_modified(id, false);
        }
        changed
    }

    /// Move `id` (and everything that follows its timeline) to `layer_time`.
    ///
    /// Returns `true` when anything visible may have changed.
    pub(crate) fn goto_time(&mut self, id: LayerId, layer_time: i64) -> bool {
        let rate = self.frame_rate(id);
        let mut time = layer_time;
        if self.node(id).is_file_root() {
            let start = self.node(id).start_frame;
            let stretched = self.is_stretched(id);
            if let Some(file) = self.node_mut(id).composition_mut().and_then(|c| c.file.as_mut()) {
                file.stretched_content_frame = time_to_frame(layer_time, rate) - start;
            }
            if stretched {
                time = self.stretched_time_to_file_time(id, layer_time);
            }
        }

        let mut changed = false;
        if let Some(matte) = self.node(id).track_matte {
            changed = self.goto_time(matte, time);
        }
        let node = self.node_mut(id);
        let old = node.content_frame;
        node.content_frame = time_to_frame(time, rate) - node.start_frame;
        let new = node.content_frame;
        if !changed {
            changed = self.check_frame_changed(id, new, old);
        }

        if self.node(id).composition().is_some() {
            let node = self.node(id);
            let offset = node.composition_offset() + node.start_frame;
            let offset_time = (offset as f64 * MICROS_PER_SECOND / f64::from(rate)).floor() as i64;
            for child in node.children().to_vec() {
                if self.node(child).excluded {
                    continue;
                }
                if self.goto_time(child, time - offset_time) {
                    changed = true;
                }
            }
        }
        let replacement = self.node(id).image().and_then(|i| i.replacement.clone());
        if let Some(image) = replacement
            && !image.is_still()
            && image.owner() == Some(id)
        {
            let content_time = self.current_content_time(id, time);
            if image.set_content_time(content_time) {
                changed = true;
            }
        }
        changed
    }

    fn check_frame_changed(&self, id: LayerId, new: Frame, old: Frame) -> bool {
        if new == old {
            return false;
        }
        let duration = self.frame_duration(id);
        let visible = |f: Frame| (0..duration).contains(&f);
        if !visible(new) && !visible(old) {
            return false;
        }
        !self.node(id).content_static() || visible(new) != visible(old)
    }

    /// Bump content versions from `id` up to the tree root.
    pub(crate) fn notify_modified(&mut self, id: LayerId, content_changed: bool) {
        if content_changed {
            self.node_mut(id).content_version += 1;
        }
        let mut current = self.parent_or_owner(id);
        while let Some(layer) = current {
            self.node_mut(layer).content_version += 1;
            current = self.parent_or_owner(layer);
        }
    }

    pub(crate) fn notify_audio_modified(&mut self, id: LayerId) {
        self.node_mut(id).audio_version += 1;
        let mut current = self.parent_or_owner(id);
        while let Some(layer) = current {
            self.node_mut(layer).audio_version += 1;
            current = self.parent_or_owner(layer);
        }
    }

    /// React to a change in how `id` is placed in time.
    pub(crate) fn on_timeline_changed(&mut self, id: LayerId) {
        if let Some(image) = self.node_mut(id).image_mut() {
            image.content_remap = None;
            return;
        }
        if self.node(id).composition().is_none() {
            self.notify_audio_modified(id);
            return;
        }
        for child in self.node(id).children().to_vec() {
            self.on_timeline_changed(child);
            if let Some(matte) = self.node(child).track_matte {
                self.on_timeline_changed(matte);
            }
        }
    }

    /// Authored transform at the current frame.
    pub(crate) fn layer_transform(&self, id: LayerId) -> LayerTransform {
        let node = self.node(id);
        node.def.transform.at(node.def.start_time + node.content_frame)
    }

    pub(crate) fn frame_visible(&self, id: LayerId) -> bool {
        (0..self.frame_duration(id)).contains(&self.node(id).content_frame)
    }

    /// Effective transform, or `None` when the layer shows nothing this frame.
    pub(crate) fn get_transform(&self, id: LayerId) -> Option<LayerTransform> {
        let node = self.node(id);
        if !self.frame_visible(id) || !is_invertible(node.matrix) || node.alpha == 0.0 {
            return None;
        }
        let authored = self.layer_transform(id);
        if !authored.visible() {
            return None;
        }
        Some(LayerTransform {
            matrix: node.matrix * authored.matrix,
            alpha: authored.alpha * node.alpha,
        })
    }

    /// Authored matrix at the current frame followed by the user matrix.
    pub(crate) fn total_matrix(&self, id: LayerId) -> Affine {
        self.node(id).matrix * self.layer_transform(id).matrix
    }

    pub(crate) fn global_to_local_point(&self, id: LayerId, point: Point) -> Point {
        let mut total = Affine::IDENTITY;
        let mut current = Some(id);
        while let Some(layer) = current {
            total = self.total_matrix(layer) * total;
            current = self.node(layer).parent;
        }
        map_point_inverted(total, point).unwrap_or(point)
    }

    pub(crate) fn set_matrix(&mut self, id: LayerId, matrix: Affine) {
        if self.node(id).matrix == matrix {
            return;
        }
        self.node_mut(id).matrix = matrix;
        self.notify_modified(id, false);
        self.invalidate_cache_scale_deep(id);
    }

    pub(crate) fn set_alpha(&mut self, id: LayerId, alpha: f32) {
        if self.node(id).alpha == alpha {
            return;
        }
        self.node_mut(id).alpha = alpha;
        self.notify_modified(id, false);
    }

    pub(crate) fn set_visible(&mut self, id: LayerId, visible: bool) {
        if self.node(id).visible == visible {
            return;
        }
        self.node_mut(id).visible = visible;
        self.notify_modified(id, false);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/layer/timeline.rs"]
mod tests;
