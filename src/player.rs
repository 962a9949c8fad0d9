//! The player: drives one composition into one surface.
//!
//! A player owns a stage, an empty composition whose first child is the
//! composition being played. The stage's tree root lock is shared with the
//! bound surface, so rendering and tree mutation serialize on it.

use crate::config::PlayerOpts;
use crate::document::model::{LayerContentDef, LayerDef};
use crate::foundation::core::{
    Affine, Point, Rect, frame_to_progress, map_point_inverted, map_rect, progress_to_frame,
    rect_contains, time_to_frame,
};
use crate::foundation::ids::next_unique_id;
use crate::layer::composition::{add_layer_across, detach_child};
use crate::layer::node::{CompositionPayload, LayerId, LayerNode, NodeKind};
use crate::layer::stage::StageState;
use crate::layer::tree::{LayerArena, PairGuard, lock_pair};
use crate::layer::{Composition, Layer};
use crate::render::backend::BackendSemaphore;
use crate::render::cache::{FrameTelemetry, RenderCache};
use crate::render::graphic::Graphic;
use crate::render::scale::{ScaleMode, apply_scale_mode};
use crate::render::surface::Surface;
use std::sync::Arc;
use std::time::Instant;

/// Player settings and render state, stored in the stage.
#[derive(Debug)]
pub(crate) struct PlayerState {
    pub(crate) surface: Option<Arc<Surface>>,
    pub(crate) cache: RenderCache,
    pub(crate) scale_mode: ScaleMode,
    pub(crate) max_frame_rate: f32,
    pub(crate) auto_clear: bool,
    /// Last recorded frame and the stage version it was recorded at.
    graphic: Option<(u64, Arc<Graphic>)>,
    /// Bumped whenever the summed image versions move, so the stage version
    /// never goes backwards when an image leaves the stage.
    image_epoch: u64,
    image_versions: u64,
}

impl PlayerState {
    pub(crate) fn new(opts: &PlayerOpts) -> Self {
        Self {
            surface: None,
            cache: RenderCache::new(opts.cache_enabled, opts.video_enabled),
            scale_mode: opts.scale_mode,
            max_frame_rate: opts.max_frame_rate,
            auto_clear: opts.auto_clear,
            graphic: None,
            image_epoch: 0,
            image_versions: 0,
        }
    }
}

impl LayerArena {
    fn player(&self) -> Option<&PlayerState> {
        self.stage().map(|s| &s.player)
    }

    fn player_mut(&mut self) -> Option<&mut PlayerState> {
        self.stage_mut().map(|s| &mut s.player)
    }

    /// Version of everything the stage draws: the layer tree plus replacement images.
    pub(crate) fn stage_version(&mut self) -> u64 {
        let Some(stage) = self.stage_id() else {
            return 0;
        };
        let tree = self.node(stage).content_version;
        let Some(state) = self.stage_mut() else {
            return tree;
        };
        let images = state.image_versions();
        if images != state.player.image_versions {
            state.player.image_versions = images;
            state.player.image_epoch += 1;
        }
        tree + state.player.image_epoch
    }

    fn stage_size(&self) -> (i32, i32) {
        self.stage_id()
            .and_then(|s| self.node(s).composition())
            .map_or((0, 0), |c| (c.width, c.height))
    }

    /// Fit the root composition into the stage with the player's scale mode.
    fn update_scale_mode_if_need(&mut self) {
        let Some(root) = self.root_composition() else {
            return;
        };
        let mode = self.player().map_or(ScaleMode::None, |p| p.scale_mode);
        if mode == ScaleMode::None {
            return;
        }
        let (sw, sh) = self.stage_size();
        let (rw, rh) = self
            .node(root)
            .composition()
            .map_or((0, 0), |c| (c.width, c.height));
        self.set_matrix(root, apply_scale_mode(mode, rw, rh, sw, sh));
    }

    fn set_stage_size(&mut self, width: i32, height: i32) {
        let Some(stage) = self.stage_id() else {
            return;
        };
        let Some(payload) = self.node_mut(stage).composition_mut() else {
            return;
        };
        if payload.width == width && payload.height == height {
            return;
        }
        payload.width = width;
        payload.height = height;
        self.notify_modified(stage, true);
        self.update_scale_mode_if_need();
    }

    fn update_stage_size(&mut self) {
        let size = self
            .player()
            .and_then(|p| p.surface.as_ref())
            .map_or((0, 0), |s| (s.width(), s.height()));
        self.set_stage_size(size.0, size.1);
    }

    /// The current frame's graphic, re-recorded only when the stage version moved.
    fn current_graphic(&mut self, version: u64) -> Arc<Graphic> {
        if let Some((recorded, graphic)) = self.player().and_then(|p| p.graphic.as_ref())
            && *recorded == version
        {
            return Arc::clone(graphic);
        }
        let Some(stage) = self.stage_id() else {
            return Arc::new(Graphic::Empty);
        };
        let video_enabled = self.player().is_some_and(|p| p.cache.video_enabled);
        let graphic = Arc::new(self.record(stage, video_enabled));
        if let Some(player) = self.player_mut() {
            player.graphic = Some((version, Arc::clone(&graphic)));
        }
        graphic
    }

    /// Matrix from `id`'s content space to the stage.
    fn stage_matrix(&self, id: LayerId) -> Affine {
        let mut matrix = Affine::IDENTITY;
        let mut current = Some(id);
        while let Some(layer) = current {
            if self.node(layer).is_stage() {
                break;
            }
            matrix = self.total_matrix(layer) * matrix;
            current = self.node(layer).parent;
        }
        matrix
    }

    fn on_stage(&self, id: LayerId) -> bool {
        self.stage_id()
            .is_some_and(|stage| stage != id && self.contains(stage, id))
    }
}

/// Plays one composition into one surface.
#[derive(Debug)]
pub struct Player {
    stage: Composition,
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

impl Player {
    pub fn new() -> Self {
        Self::with_opts(&PlayerOpts::default())
    }

    pub fn with_opts(opts: &PlayerOpts) -> Self {
        let mut state = StageState::new(PlayerState::new(opts));
        state.set_cache_scale(opts.cache_scale);
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
            let mut payload = CompositionPayload::empty(0, 0);
            payload.stage = Some(Box::new(state));
            node.kind = NodeKind::Composition(payload);
            arena.insert(node);
            id
        });
        Self {
            stage: Composition::from_layer(Layer::from_slot(slot)),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut LayerArena, LayerId) -> R) -> R {
        self.stage.with_mut(f)
    }

    fn root(&self) -> Option<Composition> {
        self.with(|arena, _| {
            let root = arena.root_composition()?;
            arena
                .handle(root)
                .map(|slot| Composition::from_layer(Layer::from_slot(slot)))
        })
    }

    /// The composition being played.
    pub fn composition(&self) -> Option<Composition> {
        self.root()
    }

    /// Play `composition`, detaching it from any parent or other player first.
    #[tracing::instrument(skip_all)]
    pub fn set_composition(&self, composition: Option<&Composition>) {
        let stage = self.stage.id();
        let Some(composition) = composition else {
            self.with(|arena, stage| {
                if arena.root_composition().is_some() {
                    detach_child(arena, stage, 0);
                    tracing::debug!("composition removed from player");
                }
            });
            return;
        };
        let mut guard = lock_pair(&self.stage.slot.tree, &composition.slot.tree);
        let added = match guard.split() {
            (arena, None) => {
                if arena.root_composition() == Some(composition.id()) {
                    return;
                }
                if !arena.add_layer(stage, composition.id(), 0) {
                    return;
                }
                if arena.node(stage).children().len() > 1 {
                    detach_child(arena, stage, 1);
                }
                true
            }
            (arena, Some(src)) => {
                if arena.root_composition().is_some() {
                    detach_child(arena, stage, 0);
                }
                add_layer_across(arena, src, stage, composition.id(), Some(0))
            }
        };
        if added {
            let (arena, _) = guard.split();
            arena.update_scale_mode_if_need();
            tracing::debug!(layer = composition.unique_id(), "composition set");
        }
    }

    pub fn surface(&self) -> Option<Arc<Surface>> {
        self.with(|arena, _| arena.player().and_then(|p| p.surface.clone()))
    }

    /// Render into `surface`; a surface can serve one player at a time.
    #[tracing::instrument(skip_all)]
    pub fn set_surface(&self, surface: Option<Arc<Surface>>) {
        let tree = self.stage.slot.tree.current();
        let mut guard = self.stage.slot.tree.lock();
        let current = guard.player().and_then(|p| p.surface.clone());
        match (&current, &surface) {
            (Some(a), Some(b)) if Arc::ptr_eq(a, b) => return,
            (None, None) => return,
            _ => {}
        }
        if let Some(surface) = &surface
            && !surface.try_bind(&tree)
        {
            tracing::warn!("set_surface: the surface is already used by another player");
            return;
        }
        if let Some(old) = current {
            old.unbind();
        }
        if let Some(player) = guard.player_mut() {
            player.surface = surface;
            player.graphic = None;
        }
        guard.update_stage_size();
        tracing::debug!("surface set");
    }

    pub fn video_enabled(&self) -> bool {
        self.with(|arena, _| arena.player().is_some_and(|p| p.cache.video_enabled))
    }

    pub fn set_video_enabled(&self, value: bool) {
        self.with(|arena, stage| {
            let Some(player) = arena.player_mut() else {
                return;
            };
            if player.cache.video_enabled == value {
                return;
            }
            player.cache.video_enabled = value;
            arena.notify_modified(stage, true);
        });
    }

    pub fn cache_enabled(&self) -> bool {
        self.with(|arena, _| arena.player().is_some_and(|p| p.cache.cache_enabled))
    }

    pub fn set_cache_enabled(&self, value: bool) {
        self.with(|arena, _| {
            if let Some(player) = arena.player_mut() {
                player.cache.cache_enabled = value;
                if !value {
                    player.cache.release_all();
                }
            }
        });
    }

    pub fn cache_scale(&self) -> f32 {
        self.with(|arena, _| arena.stage().map_or(1.0, |s| s.cache_scale))
    }

    /// Scale of cached assets; values outside `(0, 1]` reset it to `1`.
    pub fn set_cache_scale(&self, value: f32) {
        self.with(|arena, stage| {
            if let Some(state) = arena.stage_mut() {
                state.set_cache_scale(value);
                state.scale_factors.clear();
            }
            arena.notify_modified(stage, true);
        });
    }

    pub fn max_frame_rate(&self) -> f32 {
        self.with(|arena, _| arena.player().map_or(0.0, |p| p.max_frame_rate))
    }

    pub fn set_max_frame_rate(&self, value: f32) {
        if value.is_nan() || value <= 0.0 {
            tracing::warn!(value, "set_max_frame_rate: the rate must be positive");
            return;
        }
        self.with(|arena, _| {
            if let Some(player) = arena.player_mut() {
                player.max_frame_rate = value;
            }
        });
    }

    pub fn scale_mode(&self) -> ScaleMode {
        self.with(|arena, _| arena.player().map_or(ScaleMode::None, |p| p.scale_mode))
    }

    pub fn set_scale_mode(&self, mode: ScaleMode) {
        self.with(|arena, _| {
            if let Some(player) = arena.player_mut() {
                player.scale_mode = mode;
            }
            arena.update_scale_mode_if_need();
        });
    }

    /// Matrix placing the composition on the surface.
    pub fn matrix(&self) -> Affine {
        self.with(|arena, _| {
            arena
                .root_composition()
                .map_or(Affine::IDENTITY, |root| arena.node(root).matrix)
        })
    }

    /// Place the composition explicitly; switches the scale mode to `None`.
    pub fn set_matrix(&self, matrix: Affine) {
        self.with(|arena, _| {
            if let Some(player) = arena.player_mut() {
                player.scale_mode = ScaleMode::None;
            }
            if let Some(root) = arena.root_composition() {
                arena.set_matrix(root, matrix);
            }
        });
    }

    /// Duration of the composition in microseconds, or `0` without one.
    pub fn duration(&self) -> i64 {
        self.with(|arena, _| arena.root_composition().map_or(0, |root| arena.duration(root)))
    }

    pub fn next_frame(&self) {
        self.with(|arena, _| {
            if let Some(root) = arena.root_composition() {
                arena.next_frame(root);
            }
        });
    }

    pub fn pre_frame(&self) {
        self.with(|arena, _| {
            if let Some(root) = arena.root_composition() {
                arena.pre_frame(root);
            }
        });
    }

    pub fn progress(&self) -> f64 {
        self.with(|arena, _| arena.root_composition().map_or(0.0, |root| arena.progress(root)))
    }

    /// Seek the composition; snaps to the max frame rate when it is below the composition's.
    pub fn set_progress(&self, progress: f64) {
        self.with(|arena, _| {
            let Some(root) = arena.root_composition() else {
                return;
            };
            let max_rate = arena.player().map_or(0.0, |p| p.max_frame_rate);
            let mut real = progress;
            if max_rate > 0.0 && arena.frame_rate(root) > max_rate {
                let total = time_to_frame(arena.duration(root), max_rate);
                real = frame_to_progress(progress_to_frame(progress, total), total);
            }
            arena.set_progress(root, real);
        });
    }

    pub fn auto_clear(&self) -> bool {
        self.with(|arena, _| arena.player().is_some_and(|p| p.auto_clear))
    }

    pub fn set_auto_clear(&self, value: bool) {
        self.with(|arena, stage| {
            let Some(player) = arena.player_mut() else {
                return;
            };
            if player.auto_clear == value {
                return;
            }
            player.auto_clear = value;
            arena.notify_modified(stage, true);
        });
    }

    /// Record the current frame and decode its images ahead of [`Player::flush`].
    #[tracing::instrument(skip_all)]
    pub fn prepare(&self) {
        self.with(|arena, _| {
            if arena.root_composition().is_none() {
                return;
            }
            let removed = arena
                .stage_mut()
                .map(|s| s.take_removed_assets())
                .unwrap_or_default();
            let version = arena.stage_version();
            let graphic = arena.current_graphic(version);
            if let Some(player) = arena.player_mut() {
                player.cache.begin_frame(&removed);
                player.cache.prepare_images(&graphic.images());
            }
        });
    }

    /// Make the next frame's GPU work wait on `semaphore`.
    ///
    /// Returns `false` when there is no surface, the semaphore is
    /// uninitialized, or the backend cannot wait; the caller keeps the
    /// semaphore in that case.
    pub fn wait(&self, semaphore: &BackendSemaphore) -> bool {
        let guard = self.stage.slot.tree.lock();
        let Some(surface) = guard.player().and_then(|p| p.surface.clone()) else {
            return false;
        };
        surface.wait(&guard.token(), semaphore)
    }

    /// Draw the current frame; returns `true` when the surface content changed.
    #[tracing::instrument(skip_all)]
    pub fn flush(&self) -> bool {
        self.flush_internal(None)
    }

    /// Like [`Player::flush`], also signaling `semaphore` after submission.
    ///
    /// The semaphore is left uninitialized when the backend cannot signal.
    #[tracing::instrument(skip_all)]
    pub fn flush_and_signal_semaphore(&self, semaphore: &mut BackendSemaphore) -> bool {
        self.flush_internal(Some(semaphore))
    }

    fn flush_internal(&self, signal: Option<&mut BackendSemaphore>) -> bool {
        let t0 = Instant::now();
        let mut guard = self.stage.slot.tree.lock();
        let Some(surface) = guard.player().and_then(|p| p.surface.clone()) else {
            return false;
        };
        let Some(root) = guard.root_composition() else {
            return false;
        };
        guard.update_stage_size();
        let removed = guard
            .stage_mut()
            .map(|s| s.take_removed_assets())
            .unwrap_or_default();
        let version = guard.stage_version();
        let graphic = guard.current_graphic(version);
        let (auto_clear, time_stamp) = {
            let duration = guard.duration(root) as f64;
            let progress = guard.progress(root);
            let auto_clear = guard.player().is_some_and(|p| p.auto_clear);
            (auto_clear, (progress * duration).ceil() as i64)
        };
        if let Some(player) = guard.player_mut() {
            player.cache.begin_frame(&removed);
            player.cache.prepare_images(&graphic.images());
        }
        let t1 = Instant::now();
        let changed = surface.draw(
            &guard.token(),
            &graphic,
            version,
            signal,
            auto_clear,
            time_stamp,
        );
        let t2 = Instant::now();
        if let Some(player) = guard.player_mut() {
            player.cache.add_rendering_time(t1 - t0);
            player.cache.add_presenting_time(t2 - t1);
            let telemetry = player.cache.telemetry();
            tracing::trace!(
                changed,
                version,
                rendering = telemetry.rendering_time,
                decoding = telemetry.image_decoding_time,
                presenting = telemetry.presenting_time,
                "flush"
            );
        }
        changed
    }

    /// Bounds of `layer` in surface space; empty when it is not played here.
    pub fn bounds(&self, layer: &Layer) -> Rect {
        let mut guard = lock_pair(&self.stage.slot.tree, &layer.slot.tree);
        let PairGuard::Same(arena) = &mut guard else {
            return Rect::ZERO;
        };
        let id = layer.id();
        if !arena.on_stage(id) {
            return Rect::ZERO;
        }
        map_rect(arena.stage_matrix(id), arena.measure_bounds(id))
    }

    /// Leaf layers drawn at the surface point, top-most first.
    pub fn layers_under_point(&self, x: f64, y: f64) -> Vec<Layer> {
        self.with(|arena, stage| {
            let mut found = Vec::new();
            arena.layers_under_point(stage, Point::new(x, y), &mut found);
            arena.handles(found)
        })
    }

    /// Return `true` when `layer` covers the surface point.
    ///
    /// With `pixel_hit_test` the layer is rasterized and the pixel's alpha
    /// decides; otherwise its bounds do.
    pub fn hit_test_point(&self, layer: &Layer, x: f64, y: f64, pixel_hit_test: bool) -> bool {
        let mut guard = lock_pair(&self.stage.slot.tree, &layer.slot.tree);
        let PairGuard::Same(arena) = &mut guard else {
            return false;
        };
        let id = layer.id();
        if !arena.on_stage(id) {
            return false;
        }
        let matrix = arena.stage_matrix(id);
        if !pixel_hit_test {
            return map_point_inverted(matrix, Point::new(x, y))
                .is_some_and(|local| rect_contains(arena.measure_bounds(id), local));
        }
        let Some(surface) = arena.player().and_then(|p| p.surface.clone()) else {
            return false;
        };
        let video_enabled = arena.player().is_some_and(|p| p.cache.video_enabled);
        let graphic = Graphic::Transform {
            matrix,
            alpha: 1.0,
            content: Box::new(arena.record(id, video_enabled)),
        };
        surface.hit_test(&arena.token(), &graphic, x, y)
    }

    fn telemetry(&self) -> FrameTelemetry {
        self.with(|arena, _| arena.player().map(|p| p.cache.telemetry()).unwrap_or_default())
    }

    /// Time spent recording and drawing the last frame, in microseconds.
    pub fn rendering_time(&self) -> i64 {
        self.telemetry().rendering_time
    }

    /// Time spent decoding images for the last frame, in microseconds.
    pub fn image_decoding_time(&self) -> i64 {
        self.telemetry().image_decoding_time
    }

    /// Time spent flushing and presenting the last frame, in microseconds.
    pub fn presenting_time(&self) -> i64 {
        self.telemetry().presenting_time
    }

    /// Bytes of decoded image memory held by this player's cache.
    pub fn graphics_memory(&self) -> usize {
        self.with(|arena, _| arena.player().map_or(0, |p| p.cache.memory_usage()))
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.set_surface(None);
        self.stage.remove_all_layers();
    }
}

#[cfg(test)]
#[path = "../tests/unit/player.rs"]
mod tests;
