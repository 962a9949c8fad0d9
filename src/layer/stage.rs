//! The stage: root of a player's tree and owner of stage-wide caches.

use crate::document::model::LayerContentDef;
use crate::foundation::core::scale_factor;
use crate::image::Image;
use crate::layer::node::{LayerId, NodeKind};
use crate::layer::tree::LayerArena;
use crate::player::PlayerState;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Stage-wide bookkeeping, stored in the stage node's payload.
#[derive(Debug)]
pub(crate) struct StageState {
    /// Layers referencing each asset id (layer, definition, composition,
    /// image bytes or replacement image).
    pub(crate) references: HashMap<u32, Vec<LayerId>>,
    pub(crate) images: HashMap<u32, Arc<Image>>,
    pub(crate) scale_factors: HashMap<u32, f32>,
    pub(crate) invalid_assets: HashSet<u32>,
    pub(crate) cache_scale: f32,
    pub(crate) player: PlayerState,
}

impl StageState {
    pub(crate) fn new(player: PlayerState) -> Self {
        Self {
            references: HashMap::new(),
            images: HashMap::new(),
            scale_factors: HashMap::new(),
            invalid_assets: HashSet::new(),
            cache_scale: 1.0,
            player,
        }
    }

    /// Store the cache scale, replacing anything outside `(0, 1]` with `1`.
    pub(crate) fn set_cache_scale(&mut self, value: f32) {
        self.cache_scale = if value <= 0.0 || value > 1.0 { 1.0 } else { value };
    }

    fn add_to_reference_map(&mut self, key: u32, layer: LayerId) {
        let layers = self.references.entry(key).or_default();
        if !layers.contains(&layer) {
            layers.push(layer);
        }
    }

    /// Drop one reference; returns `true` when `key` has no references left.
    fn remove_from_reference_map(&mut self, key: u32, layer: LayerId) -> bool {
        let Some(layers) = self.references.get_mut(&key) else {
            return true;
        };
        let Some(pos) = layers.iter().position(|l| *l == layer) else {
            return false;
        };
        if layers.len() == 1 {
            self.references.remove(&key);
            self.invalid_assets.insert(key);
            true
        } else {
            layers.remove(pos);
            false
        }
    }

    pub(crate) fn add_image_reference(&mut self, image: &Arc<Image>, layer: LayerId) {
        self.add_to_reference_map(image.unique_id(), layer);
        self.images.insert(image.unique_id(), Arc::clone(image));
    }

    pub(crate) fn remove_image_reference(&mut self, image: &Image, layer: LayerId) {
        if self.remove_from_reference_map(image.unique_id(), layer) {
            self.images.remove(&image.unique_id());
        }
    }

    /// Asset ids that lost their last reference since the previous call.
    pub(crate) fn take_removed_assets(&mut self) -> HashSet<u32> {
        let invalid = std::mem::take(&mut self.invalid_assets);
        invalid
            .into_iter()
            .filter(|id| !self.references.contains_key(id))
            .collect()
    }

    /// Sum of the versions of every replacement image on stage.
    pub(crate) fn image_versions(&self) -> u64 {
        self.images.values().map(|i| i.version()).sum()
    }
}

impl LayerArena {
    /// Asset ids a layer contributes to the stage reference map.
    fn reference_keys(&self, id: LayerId) -> (Vec<u32>, Option<Arc<Image>>) {
        let node = self.node(id);
        let mut keys = vec![id.0, node.def.unique_id()];
        let mut image = None;
        match &node.kind {
            NodeKind::Composition(_) => {
                if let (LayerContentDef::PreCompose { composition_id, .. }, Some(file)) =
                    (&node.def.content, node.file.as_ref())
                    && let Some(comp) = file.composition(*composition_id)
                {
                    keys.push(comp.unique_id);
                }
            }
            NodeKind::Image(payload) => {
                keys.push(payload.default_image.unique_id);
                image = payload.replacement.clone();
            }
            _ => {}
        }
        (keys, image)
    }

    /// Register `id`, its matte and its descendants with the stage.
    pub(crate) fn enter_stage(&mut self, id: LayerId) {
        if self.stage_id().is_none() {
            return;
        }
        for layer in self.subtree(id) {
            if self.node(layer).is_stage() {
                continue;
            }
            let (keys, image) = self.reference_keys(layer);
            if let Some(stage) = self.stage_mut() {
                for key in keys {
                    stage.add_to_reference_map(key, layer);
                }
                if let Some(image) = image {
                    stage.add_image_reference(&image, layer);
                }
            }
            self.invalidate_cache_scale(layer);
        }
    }

    /// Undo [`LayerArena::enter_stage`] for `id` and everything below it.
    pub(crate) fn leave_stage(&mut self, id: LayerId) {
        if self.stage_id().is_none() {
            return;
        }
        for layer in self.subtree(id) {
            if self.node(layer).is_stage() {
                continue;
            }
            let (keys, image) = self.reference_keys(layer);
            if let Some(stage) = self.stage_mut() {
                for key in keys {
                    stage.remove_from_reference_map(key, layer);
                }
                if let Some(image) = image {
                    stage.remove_image_reference(&image, layer);
                }
            }
            self.invalidate_cache_scale(layer);
        }
    }

    /// Forget cached scale factors of one layer's assets.
    pub(crate) fn invalidate_cache_scale(&mut self, id: LayerId) {
        if self.stage_id().is_none() {
            return;
        }
        let (keys, image) = self.reference_keys(id);
        if let Some(stage) = self.stage_mut() {
            for key in keys {
                stage.scale_factors.remove(&key);
            }
            if let Some(image) = image {
                stage.scale_factors.remove(&image.unique_id());
            }
        }
    }

    /// Invalidate `id` and, for compositions, every child and matte below it.
    pub(crate) fn invalidate_cache_scale_deep(&mut self, id: LayerId) {
        if self.stage_id().is_none() {
            return;
        }
        for layer in self.subtree(id) {
            self.invalidate_cache_scale(layer);
        }
    }

    /// Root composition of the stage: its first child, when it is a composition.
    pub(crate) fn root_composition(&self) -> Option<LayerId> {
        let stage = self.stage_id()?;
        let first = *self.node(stage).children().first()?;
        self.node(first).composition().map(|_| first)
    }

    /// Largest on-screen scale of an asset times the stage cache scale.
    pub(crate) fn asset_max_scale(&mut self, reference: u32) -> f32 {
        let cache_scale = self.stage().map_or(1.0, |s| s.cache_scale);
        self.max_scale_factor(reference) * cache_scale
    }

    fn max_scale_factor(&mut self, reference: u32) -> f32 {
        if let Some(cached) = self.stage().and_then(|s| s.scale_factors.get(&reference)) {
            return *cached;
        }
        let Some(value) = self.calc_max_scale_factor(reference) else {
            return 0.0;
        };
        if let Some(stage) = self.stage_mut() {
            stage.scale_factors.insert(reference, value);
        }
        value
    }

    fn calc_max_scale_factor(&self, reference: u32) -> Option<f32> {
        let stage = self.stage()?;
        let layers = stage.references.get(&reference)?;
        let is_image = stage.images.contains_key(&reference);
        let is_layer = layers.len() == 1 && layers[0].0 == reference;
        let mut max = 0.0f32;
        for &layer in layers {
            let node = self.node(layer);
            if !(is_image || is_layer || !node.content_modified()) {
                continue;
            }
            let content = match (&node.kind, is_image) {
                (NodeKind::Image(img), true) => img.replacement.as_ref().map_or((1.0, 1.0), |r| {
                    let w = img.default_image.width.max(1) as f32;
                    let h = img.default_image.height.max(1) as f32;
                    (w / r.width() as f32, h / r.height() as f32)
                }),
                (NodeKind::Image(img), false) => {
                    let s = 1.0 / img.default_image.scale_factor.max(f32::EPSILON);
                    (s, s)
                }
                _ => (1.0, 1.0),
            };
            max = max.max(self.layer_scale_factor(layer, content));
        }
        Some(max)
    }

    fn layer_scale_factor(&self, id: LayerId, content: (f32, f32)) -> f32 {
        let (mut sx, mut sy) = content;
        let mut current = Some(id);
        while let Some(layer) = current {
            let node = self.node(layer);
            let authored = node.def.transform.max_scale();
            sx *= authored.x.abs() as f32;
            sy *= authored.y.abs() as f32;
            let user = scale_factor(node.matrix);
            sx *= user.x.abs() as f32;
            sy *= user.y.abs() as f32;
            current = match (node.parent, node.matte_owner) {
                (Some(parent), _) => Some(parent),
                (None, Some(owner)) => self.node(owner).parent,
                (None, None) => None,
            };
        }
        sx.max(sy)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/layer/stage.rs"]
mod tests;
