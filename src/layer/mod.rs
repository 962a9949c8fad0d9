//! Runtime layer trees and the client handles that drive them.
//!
//! Every tree lives in one [`tree::LayerArena`] guarded by a root lock. The
//! handle types in this module ([`Layer`], [`Composition`], [`FileComposition`],
//! [`ImageLayer`], [`TextLayer`], [`SolidLayer`]) are cheap to clone; each call
//! takes the root lock of whichever tree the layer currently belongs to.

pub(crate) mod composition;
pub(crate) mod content;
pub(crate) mod file;
pub(crate) mod hit;
pub(crate) mod node;
pub(crate) mod remap;
pub(crate) mod stage;
pub(crate) mod timeline;
pub(crate) mod tree;

pub use composition::Composition;
pub use content::{SolidLayer, TextLayer};
pub use file::FileComposition;
pub use remap::{ImageContent, ImageLayer, VideoRange};

use crate::document::model::{LayerType, Marker};
use crate::foundation::core::{Affine, Frame, Point, Rect};
use node::LayerId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tree::{LayerArena, LayerSlot, PairGuard, lock_pair};

/// Handle to one layer of a runtime tree.
#[derive(Clone)]
pub struct Layer {
    pub(crate) slot: Arc<LayerSlot>,
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer").field("id", &self.slot.id.0).finish()
    }
}

impl PartialEq for Layer {
    fn eq(&self, other: &Self) -> bool {
        self.slot.id == other.slot.id
    }
}

impl Eq for Layer {}

impl Hash for Layer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.slot.id.hash(state);
    }
}

impl LayerArena {
    pub(crate) fn handles(&mut self, ids: Vec<LayerId>) -> Vec<Layer> {
        ids.into_iter()
            .filter_map(|id| self.handle(id))
            .map(Layer::from_slot)
            .collect()
    }

    /// Return `true` when `target` sits anywhere below `ancestor`, mattes included.
    fn reaches(&self, ancestor: LayerId, target: LayerId) -> bool {
        let mut current = Some(target);
        while let Some(layer) = current {
            if layer == ancestor {
                return true;
            }
            current = self.parent_or_owner(layer);
        }
        false
    }
}

impl Layer {
    pub(crate) fn from_slot(slot: Arc<LayerSlot>) -> Self {
        Self { slot }
    }

    pub(crate) fn id(&self) -> LayerId {
        self.slot.id
    }

    /// Run `f` under the root lock of this layer's tree.
    pub(crate) fn with<R>(&self, f: impl FnOnce(&LayerArena, LayerId) -> R) -> R {
        let guard = self.slot.tree.lock();
        f(&guard, self.slot.id)
    }

    pub(crate) fn with_mut<R>(&self, f: impl FnOnce(&mut LayerArena, LayerId) -> R) -> R {
        let mut guard = self.slot.tree.lock();
        f(&mut guard, self.slot.id)
    }

    /// Process-unique id of this runtime layer.
    pub fn unique_id(&self) -> u32 {
        self.slot.id.0
    }

    pub fn layer_type(&self) -> LayerType {
        self.with(|arena, id| arena.node(id).def.layer_type())
    }

    pub fn layer_name(&self) -> String {
        self.with(|arena, id| arena.node(id).def.name.clone())
    }

    pub fn markers(&self) -> Vec<Marker> {
        self.with(|arena, id| arena.node(id).def.markers.clone())
    }

    /// Editable slot of this layer in its document, or `-1`.
    pub fn editable_index(&self) -> i32 {
        self.with(|arena, id| arena.node(id).editable_index)
    }

    /// The client matrix applied on top of the authored transform.
    pub fn matrix(&self) -> Affine {
        self.with(|arena, id| arena.node(id).matrix)
    }

    pub fn set_matrix(&self, matrix: Affine) {
        self.with_mut(|arena, id| arena.set_matrix(id, matrix));
    }

    pub fn reset_matrix(&self) {
        self.set_matrix(Affine::IDENTITY);
    }

    /// Authored transform at the current frame, followed by the client matrix.
    pub fn total_matrix(&self) -> Affine {
        self.with(|arena, id| arena.total_matrix(id))
    }

    pub fn alpha(&self) -> f32 {
        self.with(|arena, id| arena.node(id).alpha)
    }

    pub fn set_alpha(&self, alpha: f32) {
        self.with_mut(|arena, id| arena.set_alpha(id, alpha));
    }

    pub fn visible(&self) -> bool {
        self.with(|arena, id| arena.node(id).visible)
    }

    pub fn set_visible(&self, visible: bool) {
        self.with_mut(|arena, id| arena.set_visible(id, visible));
    }

    /// Return `true` when the parent skips this layer while seeking.
    pub fn excluded_from_timeline(&self) -> bool {
        self.with(|arena, id| arena.node(id).excluded)
    }

    pub fn set_excluded_from_timeline(&self, excluded: bool) {
        self.with_mut(|arena, id| arena.node_mut(id).excluded = excluded);
    }

    /// Start of this layer in its parent's time, in microseconds.
    pub fn start_time(&self) -> i64 {
        self.with(|arena, id| arena.start_time(id))
    }

    pub fn set_start_time(&self, time: i64) {
        self.with_mut(|arena, id| arena.set_start_time(id, time));
    }

    /// Length of this layer in microseconds, stretch included.
    pub fn duration(&self) -> i64 {
        self.with(|arena, id| arena.duration(id))
    }

    pub fn frame_rate(&self) -> f32 {
        self.with(|arena, id| arena.frame_rate(id))
    }

    /// Current position in the parent's time, in microseconds.
    pub fn current_time(&self) -> i64 {
        self.with(|arena, id| arena.current_time(id))
    }

    /// Seek to `time`; returns `true` when anything visible changed.
    pub fn set_current_time(&self, time: i64) -> bool {
        self.with_mut(|arena, id| arena.goto_time_and_notify(id, time))
    }

    pub fn progress(&self) -> f64 {
        self.with(|arena, id| arena.progress(id))
    }

    pub fn set_progress(&self, progress: f64) -> bool {
        self.with_mut(|arena, id| arena.set_progress(id, progress))
    }

    /// Step back one frame, wrapping to the last frame.
    pub fn pre_frame(&self) {
        self.with_mut(|arena, id| arena.pre_frame(id));
    }

    /// Step forward one frame, wrapping to the first frame.
    pub fn next_frame(&self) {
        self.with_mut(|arena, id| arena.next_frame(id));
    }

    /// Map a frame of this layer's timeline to the timeline of its tree's top layer.
    pub fn local_frame_to_global(&self, frame: Frame) -> Frame {
        self.with(|arena, id| arena.local_frame_to_global(id, frame))
    }

    pub fn global_to_local_frame(&self, frame: Frame) -> Frame {
        self.with(|arena, id| arena.global_to_local_frame(id, frame))
    }

    pub fn local_time_to_global(&self, time: i64) -> i64 {
        self.with(|arena, id| arena.local_time_to_global(id, time))
    }

    pub fn global_to_local_time(&self, time: i64) -> i64 {
        self.with(|arena, id| arena.global_to_local_time(id, time))
    }

    /// Map a point in the top layer's space into this layer's space.
    pub fn global_to_local_point(&self, x: f64, y: f64) -> Point {
        self.with(|arena, id| arena.global_to_local_point(id, Point::new(x, y)))
    }

    /// Content bounds at the current frame, in layer space.
    pub fn bounds(&self) -> Rect {
        self.with(|arena, id| arena.measure_bounds(id))
    }

    pub fn content_version(&self) -> u64 {
        self.with(|arena, id| arena.node(id).content_version)
    }

    pub fn audio_version(&self) -> u64 {
        self.with(|arena, id| arena.node(id).audio_version)
    }

    /// The composition holding this layer, if any.
    pub fn parent(&self) -> Option<Composition> {
        self.with_mut(|arena, id| {
            let parent = arena.node(id).parent?;
            arena
                .handle(parent)
                .map(|slot| Composition::from_layer(Layer::from_slot(slot)))
        })
    }

    pub fn track_matte_layer(&self) -> Option<Layer> {
        self.with_mut(|arena, id| {
            let matte = arena.node(id).track_matte?;
            arena.handle(matte).map(Layer::from_slot)
        })
    }

    /// Use `matte` as this layer's track matte; `None` removes the current one.
    ///
    /// The matte leaves its previous parent or owner first. A replaced matte
    /// becomes a tree of its own.
    pub fn set_track_matte_layer(&self, matte: Option<&Layer>) {
        let Some(matte) = matte else {
            self.with_mut(|arena, id| {
                if let Some(old) = arena.take_track_matte(id) {
                    arena.detach_to_fresh(old);
                }
            });
            return;
        };
        if matte == self {
            tracing::warn!("a layer cannot be its own track matte");
            return;
        }
        let mut guard = lock_pair(&self.slot.tree, &matte.slot.tree);
        link_matte(&mut guard, self.id(), matte.id());
    }

    /// Checked down-cast to a composition handle.
    pub fn as_composition(&self) -> Option<Composition> {
        self.with(|arena, id| arena.node(id).composition().is_some())
            .then(|| Composition::from_layer(self.clone()))
    }

    /// Checked down-cast to a document root handle.
    pub fn as_file(&self) -> Option<FileComposition> {
        let file = self.with(|arena, id| {
            let node = arena.node(id);
            node.is_file_root().then(|| node.file.clone()).flatten()
        })?;
        Some(FileComposition::from_parts(
            Composition::from_layer(self.clone()),
            file,
        ))
    }

    pub fn as_image_layer(&self) -> Option<ImageLayer> {
        (self.layer_type() == LayerType::Image).then(|| ImageLayer::from_layer(self.clone()))
    }

    pub fn as_text_layer(&self) -> Option<TextLayer> {
        (self.layer_type() == LayerType::Text).then(|| TextLayer::from_layer(self.clone()))
    }

    pub fn as_solid_layer(&self) -> Option<SolidLayer> {
        (self.layer_type() == LayerType::Solid).then(|| SolidLayer::from_layer(self.clone()))
    }
}

fn link_matte(guard: &mut PairGuard, owner: LayerId, matte: LayerId) {
    match guard.split() {
        (arena, None) => {
            if arena.node(matte).is_stage() {
                tracing::warn!("a stage cannot be used as a track matte");
                return;
            }
            if arena.reaches(matte, owner) {
                tracing::warn!("a layer cannot use one of its ancestors as a track matte");
                return;
            }
            if arena.node(owner).track_matte == Some(matte) {
                return;
            }
            if let Some(old) = arena.take_track_matte(owner) {
                arena.detach_to_fresh(old);
            }
            arena.unlink(matte);
            arena.link_track_matte(owner, matte);
        }
        (dst, Some(src)) => {
            if src.node(matte).is_stage() {
                tracing::warn!("a stage cannot be used as a track matte");
                return;
            }
            if let Some(old) = dst.take_track_matte(owner) {
                dst.detach_to_fresh(old);
            }
            src.unlink(matte);
            dst.adopt(src.extract(matte));
            dst.link_track_matte(owner, matte);
        }
    }
}
