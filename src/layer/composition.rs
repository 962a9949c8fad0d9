use crate::document::File;
use crate::document::model::{LayerContentDef, LayerDef, Marker};
use crate::foundation::core::{DEFAULT_FRAME_RATE, Frame, MICROS_PER_SECOND, frame_to_time};
use crate::foundation::ids::next_unique_id;
use crate::layer::Layer;
use crate::layer::node::{CompositionPayload, LayerId, LayerNode, NodeKind};
use crate::layer::tree::{LayerArena, lock_pair};
use std::ops::Deref;
use std::sync::Arc;

/// Return `true` when both layers were built from the same document, or neither was.
pub(crate) fn same_file(a: &Option<Arc<File>>, b: &Option<Arc<File>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

impl LayerArena {
    /// Index of `child` among the children of `parent`, or `-1`.
    pub(crate) fn layer_index(&self, parent: LayerId, child: LayerId) -> i32 {
        self.node(parent)
            .children()
            .iter()
            .position(|c| *c == child)
            .map_or(-1, |i| i as i32)
    }

    /// Return `true` when `target` is `ancestor` or one of its descendants.
    pub(crate) fn contains(&self, ancestor: LayerId, target: LayerId) -> bool {
        if !self.contains_node(target) {
            return false;
        }
        let mut current = Some(target);
        while let Some(layer) = current {
            if layer == ancestor {
                return true;
            }
            current = self.node(layer).parent;
        }
        false
    }

    /// Insertion index for `child`; `None` or out-of-range requests append.
    pub(crate) fn insert_index(&self, parent: LayerId, child: LayerId, requested: Option<i32>) -> usize {
        let len = self.node(parent).children().len();
        match requested {
            Some(i) if i >= 0 && (i as usize) < len => i as usize,
            _ => {
                if self.node(child).parent == Some(parent) {
                    len.saturating_sub(1)
                } else {
                    len
                }
            }
        }
    }

    pub(crate) fn set_layer_index(&mut self, parent: LayerId, child: LayerId, index: i32) {
        let len = self.node(parent).children().len();
        let index = if index < 0 || index as usize >= len {
            len as i32 - 1
        } else {
            index
        };
        let old = self.layer_index(parent, child);
        if old < 0 {
            tracing::warn!("set_layer_index: the layer is not a child of this composition");
            return;
        }
        if old == index {
            return;
        }
        if let Some(payload) = self.node_mut(parent).composition_mut() {
            let moved = payload.children.remove(old as usize);
            payload.children.insert(index as usize, moved);
        }
        self.notify_modified(parent, true);
    }

    fn reject_child(&self, parent: LayerId, child: LayerId) -> bool {
        if parent == child {
            tracing::warn!("a layer cannot be added as a child of itself");
            return true;
        }
        if self.node(child).composition().is_some() && self.contains(child, parent) {
            tracing::warn!("a layer cannot be added to one of its own descendants");
            return true;
        }
        if self.node(child).is_stage() {
            tracing::warn!("a stage cannot be added as a child of a layer");
            return true;
        }
        false
    }

    /// Add `child`, which lives in this arena, under `parent` at `index`.
    pub(crate) fn add_layer(&mut self, parent: LayerId, child: LayerId, index: usize) -> bool {
        if self.reject_child(parent, child) {
            return false;
        }
        if self.node(child).parent == Some(parent) {
            self.set_layer_index(parent, child, index as i32);
            return true;
        }
        self.unlink(child);
        self.link_child(parent, child, index);
        true
    }

    /// Detach `id` from its parent composition or matte owner, keeping it in this arena.
    pub(crate) fn unlink(&mut self, id: LayerId) {
        if let Some(parent) = self.node(id).parent {
            let index = self.layer_index(parent, id);
            if index >= 0 {
                self.remove_child_at(parent, index as usize);
            }
        }
        if let Some(owner) = self.node(id).matte_owner {
            self.leave_stage(id);
            self.node_mut(owner).track_matte = None;
            self.node_mut(id).matte_owner = None;
        }
    }

    /// Remove the child at `index`; the child stays in this arena, detached.
    pub(crate) fn remove_child_at(&mut self, parent: LayerId, index: usize) -> LayerId {
        let child = self.node(parent).children()[index];
        if self.node(parent).root_file.is_some()
            && same_file(&self.node(parent).file, &self.node(child).file)
        {
            self.on_remove_from_root_file(child);
        }
        self.node_mut(child).parent = None;
        if let Some(payload) = self.node_mut(parent).composition_mut() {
            payload.children.remove(index);
        }
        self.notify_modified(parent, true);
        if self.node(parent).composition().is_some_and(|c| c.empty) {
            self.update_duration_and_frame_rate(parent);
        }
        self.leave_stage(child);
        child
    }

    /// Insert a detached `child` under `parent`.
    pub(crate) fn link_child(&mut self, parent: LayerId, child: LayerId, index: usize) {
        self.enter_stage(child);
        if let Some(root) = self.node(parent).root_file
            && same_file(&self.node(parent).file, &self.node(child).file)
        {
            self.on_add_to_root_file(child, root);
        }
        if let Some(payload) = self.node_mut(parent).composition_mut() {
            let index = index.min(payload.children.len());
            payload.children.insert(index, child);
        }
        self.node_mut(child).parent = Some(parent);
        self.notify_modified(parent, true);
        if self.node(parent).composition().is_some_and(|c| c.empty) {
            self.update_duration_and_frame_rate(parent);
        }
    }

    pub(crate) fn swap_layer_at(&mut self, parent: LayerId, a: usize, b: usize) {
        if a == b {
            return;
        }
        if let Some(payload) = self.node_mut(parent).composition_mut() {
            payload.children.swap(a, b);
        }
        self.notify_modified(parent, true);
    }

    /// Recompute the timeline of a client-built composition from its children.
    pub(crate) fn update_duration_and_frame_rate(&mut self, id: LayerId) {
        let children = self.node(id).children().to_vec();
        let mut max_time: i64 = 1;
        let mut max_rate: f32 = if children.is_empty() {
            DEFAULT_FRAME_RATE
        } else {
            1.0
        };
        for child in children {
            max_time = max_time.max(self.start_time(child) + self.duration(child));
            max_rate = max_rate.max(self.frame_rate(child));
        }
        let frames =
            (max_time as f64 * f64::from(max_rate) / MICROS_PER_SECOND).round() as Frame;
        let mut changed = false;
        if let Some(payload) = self.node_mut(id).composition_mut() {
            if payload.frame_duration != frames {
                payload.frame_duration = frames;
                changed = true;
            }
            if payload.frame_rate != max_rate {
                payload.frame_rate = max_rate;
                changed = true;
            }
        }
        if changed {
            self.update_empty_parent(id);
        }
    }

    /// Depth-first search: a layer, then its matte, then its children.
    pub(crate) fn find_layers(&self, id: LayerId, pred: &dyn Fn(&LayerNode) -> bool) -> Vec<LayerId> {
        let mut out = Vec::new();
        self.find_layers_into(id, pred, &mut out);
        out
    }

    fn find_layers_into(&self, id: LayerId, pred: &dyn Fn(&LayerNode) -> bool, out: &mut Vec<LayerId>) {
        let node = self.node(id);
        if pred(node) {
            out.push(id);
        }
        if let Some(matte) = node.track_matte {
            self.find_layers_into(matte, pred, out);
        }
        for &child in node.children() {
            self.find_layers_into(child, pred, out);
        }
    }

    pub(crate) fn audio_start_time(&self, id: LayerId) -> i64 {
        let node = self.node(id);
        let audio_start = match (&node.def.content, node.file.as_ref()) {
            (LayerContentDef::PreCompose { composition_id, .. }, Some(file)) => file
                .composition(*composition_id)
                .map_or(0, |c| c.audio_start_time),
            _ => 0,
        };
        let offset = node.composition_offset() + node.start_frame;
        frame_to_time(audio_start + offset, self.frame_rate(id))
    }

    pub(crate) fn on_add_to_root_file(&mut self, id: LayerId, root: LayerId) {
        let file = self.node(id).file.clone();
        if let Some(matte) = self.node(id).track_matte
            && same_file(&self.node(matte).file, &file)
        {
            self.on_add_to_root_file(matte, root);
        }
        self.node_mut(id).root_file = Some(root);
        for child in self.node(id).children().to_vec() {
            if same_file(&self.node(child).file, &file) {
                self.on_add_to_root_file(child, root);
            }
        }
    }

    pub(crate) fn on_remove_from_root_file(&mut self, id: LayerId) {
        let file = self.node(id).file.clone();
        if let Some(matte) = self.node(id).track_matte
            && same_file(&self.node(matte).file, &file)
        {
            self.on_remove_from_root_file(matte);
        }
        let node = self.node_mut(id);
        node.root_file = None;
        if let Some(image) = node.image_mut() {
            image.content_remap = None;
        }
        for child in self.node(id).children().to_vec() {
            if same_file(&self.node(child).file, &file) {
                self.on_remove_from_root_file(child);
            }
        }
    }

    /// Detach the matte of `owner`, leaving it as a detached node of this arena.
    pub(crate) fn take_track_matte(&mut self, owner: LayerId) -> Option<LayerId> {
        let matte = self.node(owner).track_matte?;
        self.unlink(matte);
        self.notify_modified(owner, true);
        Some(matte)
    }

    /// Install the detached `matte` as the track matte of `owner`.
    pub(crate) fn link_track_matte(&mut self, owner: LayerId, matte: LayerId) {
        self.node_mut(owner).track_matte = Some(matte);
        self.node_mut(matte).matte_owner = Some(owner);
        self.enter_stage(matte);
        if let Some(root) = self.node(owner).root_file
            && same_file(&self.node(owner).file, &self.node(matte).file)
        {
            self.on_add_to_root_file(matte, root);
        }
        let time = self.current_time(owner);
        self.goto_time(matte, time);
        self.notify_modified(owner, true);
    }
}

/// Move `child` from `src` into `dst` and add it under `parent`.
pub(crate) fn add_layer_across(
    dst: &mut LayerArena,
    src: &mut LayerArena,
    parent: LayerId,
    child: LayerId,
    requested: Option<i32>,
) -> bool {
    if src.node(child).is_stage() {
        tracing::warn!("a stage cannot be added as a child of a layer");
        return false;
    }
    src.unlink(child);
    dst.adopt(src.extract(child));
    let index = dst.insert_index(parent, child, requested);
    dst.link_child(parent, child, index);
    true
}

/// A layer that holds an ordered list of child layers, bottom-most first.
#[derive(Clone, Debug, PartialEq)]
pub struct Composition {
    layer: Layer,
}

impl Deref for Composition {
    type Target = Layer;

    fn deref(&self) -> &Layer {
        &self.layer
    }
}

impl Composition {
    /// Build an empty composition whose timeline follows its children.
    pub fn make(width: i32, height: i32) -> Self {
        let slot = LayerArena::plant_with(|arena| {
            let id = LayerId(next_unique_id());
            let def = LayerDef::standalone(
                LayerContentDef::PreCompose {
                    composition_id: 0,
                    composition_start_time: 0,
                },
                1,
            );
            let mut node = LayerNode::new(id, Arc::new(def), None);
            node.kind = NodeKind::Composition(CompositionPayload::empty(width, height));
            node.content_version = 1;
            arena.insert(node);
            id
        });
        Self {
            layer: Layer::from_slot(slot),
        }
    }

    pub(crate) fn from_layer(layer: Layer) -> Self {
        Self { layer }
    }

    /// Width of the composition's clip.
    pub fn width(&self) -> i32 {
        self.with(|arena, id| arena.node(id).composition().map_or(0, |c| c.width))
    }

    /// Height of the composition's clip.
    pub fn height(&self) -> i32 {
        self.with(|arena, id| arena.node(id).composition().map_or(0, |c| c.height))
    }

    /// Change the clip size.
    pub fn set_content_size(&self, width: i32, height: i32) {
        self.with_mut(|arena, id| {
            let Some(payload) = arena.node_mut(id).composition_mut() else {
                return;
            };
            if payload.width == width && payload.height == height {
                return;
            }
            payload.width = width;
            payload.height = height;
            arena.notify_modified(id, true);
        });
    }

    pub fn num_children(&self) -> usize {
        self.with(|arena, id| arena.node(id).children().len())
    }

    /// Child at `index`, bottom-most first.
    pub fn layer_at(&self, index: i32) -> Option<Layer> {
        self.with_mut(|arena, id| {
            let child = usize::try_from(index)
                .ok()
                .and_then(|i| arena.node(id).children().get(i).copied());
            let Some(child) = child else {
                tracing::warn!(index, "layer_at: index out of range");
                return None;
            };
            arena.handle(child).map(Layer::from_slot)
        })
    }

    /// Index of `layer` among the children, or `-1`.
    pub fn layer_index(&self, layer: &Layer) -> i32 {
        self.with(|arena, id| arena.layer_index(id, layer.id()))
    }

    /// Move a child to `index`; invalid indices move it to the top.
    pub fn set_layer_index(&self, layer: &Layer, index: i32) {
        self.with_mut(|arena, id| arena.set_layer_index(id, layer.id(), index));
    }

    /// Add `layer` on top of every other child.
    pub fn add_layer(&self, layer: &Layer) -> bool {
        self.insert(layer, None)
    }

    /// Add `layer` at `index`; out-of-range indices append.
    pub fn add_layer_at(&self, layer: &Layer, index: i32) -> bool {
        self.insert(layer, Some(index))
    }

    fn insert(&self, layer: &Layer, requested: Option<i32>) -> bool {
        let (parent, child) = (self.id(), layer.id());
        let mut guard = lock_pair(&self.slot.tree, &layer.slot.tree);
        match guard.split() {
            (arena, None) => {
                let index = arena.insert_index(parent, child, requested);
                arena.add_layer(parent, child, index)
            }
            (dst, Some(src)) => add_layer_across(dst, src, parent, child, requested),
        }
    }

    /// Return `true` when `layer` is this composition or one of its descendants.
    pub fn contains(&self, layer: &Layer) -> bool {
        let mut guard = lock_pair(&self.slot.tree, &layer.slot.tree);
        match guard.split() {
            (arena, None) => arena.contains(self.id(), layer.id()),
            _ => false,
        }
    }

    /// Detach a child; returns it, or `None` when it is not a child.
    pub fn remove_layer(&self, layer: &Layer) -> Option<Layer> {
        self.with_mut(|arena, id| {
            let index = arena.layer_index(id, layer.id());
            if index < 0 {
                tracing::warn!("remove_layer: the layer is not a child of this composition");
                return None;
            }
            detach_child(arena, id, index as usize)
        })
    }

    pub fn remove_layer_at(&self, index: i32) -> Option<Layer> {
        self.with_mut(|arena, id| {
            let len = arena.node(id).children().len();
            match usize::try_from(index) {
                Ok(i) if i < len => detach_child(arena, id, i),
                _ => {
                    tracing::warn!(index, "remove_layer_at: index out of range");
                    None
                }
            }
        })
    }

    pub fn remove_all_layers(&self) {
        self.with_mut(|arena, id| {
            for i in (0..arena.node(id).children().len()).rev() {
                detach_child(arena, id, i);
            }
        });
    }

    pub fn swap_layer(&self, a: &Layer, b: &Layer) {
        self.with_mut(|arena, id| {
            let ia = arena.layer_index(id, a.id());
            let ib = arena.layer_index(id, b.id());
            if ia < 0 || ib < 0 {
                tracing::warn!("swap_layer: both layers must be children of this composition");
                return;
            }
            arena.swap_layer_at(id, ia as usize, ib as usize);
        });
    }

    pub fn swap_layer_at(&self, a: i32, b: i32) {
        self.with_mut(|arena, id| {
            let len = arena.node(id).children().len() as i32;
            if !(0..len).contains(&a) || !(0..len).contains(&b) {
                tracing::warn!(a, b, "swap_layer_at: index out of range");
                return;
            }
            arena.swap_layer_at(id, a as usize, b as usize);
        });
    }

    /// Every layer named `name`, this composition included, depth first.
    pub fn layers_by_name(&self, name: &str) -> Vec<Layer> {
        if name.is_empty() {
            return Vec::new();
        }
        self.with_mut(|arena, id| {
            let found = arena.find_layers(id, &|n| n.def.name == name);
            arena.handles(found)
        })
    }

    /// Layers whose content covers the point, top-most first, in this
    /// composition's coordinate space.
    pub fn layers_under_point(&self, x: f64, y: f64) -> Vec<Layer> {
        self.with_mut(|arena, id| {
            let mut found = Vec::new();
            arena.layers_under_point(id, crate::foundation::core::Point::new(x, y), &mut found);
            arena.handles(found)
        })
    }

    /// Start of the audio track in this composition's parent time.
    pub fn audio_start_time(&self) -> i64 {
        self.with(|arena, id| arena.audio_start_time(id))
    }

    pub fn audio_markers(&self) -> Vec<Marker> {
        self.with(|arena, id| {
            let node = arena.node(id);
            match (&node.def.content, node.file.as_ref()) {
                (LayerContentDef::PreCompose { composition_id, .. }, Some(file)) => file
                    .composition(*composition_id)
                    .map(|c| c.audio_markers.clone())
                    .unwrap_or_default(),
                _ => Vec::new(),
            }
        })
    }
}

/// Remove the child at `index` and move it into a tree of its own.
pub(crate) fn detach_child(arena: &mut LayerArena, parent: LayerId, index: usize) -> Option<Layer> {
    let child = arena.remove_child_at(parent, index);
    let slot = arena.handle(child);
    arena.detach_to_fresh(child);
    slot.map(Layer::from_slot)
}

#[cfg(test)]
#[path = "../../tests/unit/layer/composition.rs"]
mod tests;
