//! Text and solid layers.

use crate::document::model::{LayerContentDef, LayerDef, TextDocument};
use crate::foundation::core::{DEFAULT_FRAME_RATE, Rect, Rgba8, time_to_frame};
use crate::foundation::ids::next_unique_id;
use crate::layer::Layer;
use crate::layer::node::{LayerId, LayerNode, NodeKind};
use crate::layer::tree::LayerArena;
use std::ops::Deref;
use std::sync::Arc;

impl LayerArena {
    /// Swap the text payload; `None` restores the document's text.
    pub(crate) fn set_text_document(&mut self, id: LayerId, document: Option<TextDocument>) {
        let original = match &self.node(id).def.content {
            LayerContentDef::Text { document, .. } => document.clone(),
            _ => return,
        };
        if let NodeKind::Text(payload) = &mut self.node_mut(id).kind {
            payload.replaced = document.is_some();
            payload.document = document.unwrap_or(original);
        }
        self.notify_modified(id, true);
    }

    fn edit_text(&mut self, id: LayerId, edit: impl FnOnce(&mut TextDocument)) {
        let NodeKind::Text(payload) = &mut self.node_mut(id).kind else {
            return;
        };
        let before = payload.document.clone();
        edit(&mut payload.document);
        if payload.document == before {
            return;
        }
        payload.replaced = true;
        self.notify_modified(id, true);
    }

    fn set_solid_color(&mut self, id: LayerId, color: Rgba8) {
        let NodeKind::Solid(payload) = &mut self.node_mut(id).kind else {
            return;
        };
        if payload.color == color {
            return;
        }
        payload.color = color;
        payload.replaced = true;
        self.notify_modified(id, true);
    }
}

fn standalone_frames(duration: i64) -> i64 {
    time_to_frame(duration, DEFAULT_FRAME_RATE).max(1)
}

/// A layer that shows one block of text.
#[derive(Clone, Debug, PartialEq)]
pub struct TextLayer {
    layer: Layer,
}

impl Deref for TextLayer {
    type Target = Layer;

    fn deref(&self) -> &Layer {
        &self.layer
    }
}

impl TextLayer {
    /// Build a standalone text layer lasting `duration` microseconds.
    pub fn make(duration: i64, document: TextDocument) -> Option<Self> {
        if duration <= 0 {
            return None;
        }
        let slot = LayerArena::plant_with(|arena| {
            let id = LayerId(next_unique_id());
            let def = LayerDef::standalone(
                LayerContentDef::Text {
                    document,
                    bounds: Rect::ZERO,
                },
                standalone_frames(duration),
            );
            let mut node = LayerNode::new(id, Arc::new(def), None);
            node.content_version = 1;
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

    fn document(&self) -> TextDocument {
        self.with(|arena, id| match &arena.node(id).kind {
            NodeKind::Text(payload) => Some(payload.document.clone()),
            _ => None,
        })
        .unwrap_or_else(|| TextDocument::new(""))
    }

    pub fn text(&self) -> String {
        self.document().text
    }

    pub fn set_text(&self, text: impl Into<String>) {
        let text = text.into();
        self.with_mut(|arena, id| arena.edit_text(id, |d| d.text = text));
    }

    pub fn font_family(&self) -> String {
        self.document().font_family
    }

    pub fn set_font_family(&self, family: impl Into<String>) {
        let family = family.into();
        self.with_mut(|arena, id| arena.edit_text(id, |d| d.font_family = family));
    }

    pub fn font_size(&self) -> f32 {
        self.document().font_size
    }

    pub fn set_font_size(&self, size: f32) {
        self.with_mut(|arena, id| arena.edit_text(id, |d| d.font_size = size));
    }

    pub fn fill_color(&self) -> Rgba8 {
        self.document().fill_color
    }

    pub fn set_fill_color(&self, color: Rgba8) {
        self.with_mut(|arena, id| arena.edit_text(id, |d| d.fill_color = color));
    }

    /// Drop every edit and show the document's text again.
    pub fn reset(&self) {
        self.with_mut(|arena, id| arena.set_text_document(id, None));
    }
}

/// A layer filled with one color.
#[derive(Clone, Debug, PartialEq)]
pub struct SolidLayer {
    layer: Layer,
}

impl Deref for SolidLayer {
    type Target = Layer;

    fn deref(&self) -> &Layer {
        &self.layer
    }
}

impl SolidLayer {
    /// Build a standalone solid layer; `None` on non-positive input.
    pub fn make(duration: i64, width: i32, height: i32, color: Rgba8) -> Option<Self> {
        if duration <= 0 || width <= 0 || height <= 0 {
            return None;
        }
        let slot = LayerArena::plant_with(|arena| {
            let id = LayerId(next_unique_id());
            let def = LayerDef::standalone(
                LayerContentDef::Solid {
                    color,
                    width,
                    height,
                },
                standalone_frames(duration),
            );
            let mut node = LayerNode::new(id, Arc::new(def), None);
            node.content_version = 1;
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

    pub fn solid_color(&self) -> Rgba8 {
        self.with(|arena, id| match &arena.node(id).kind {
            NodeKind::Solid(payload) => payload.color,
            _ => Rgba8::transparent(),
        })
    }

    pub fn set_solid_color(&self, color: Rgba8) {
        self.with_mut(|arena, id| arena.set_solid_color(id, color));
    }
}

#[cfg(test)]
#[path = "../../tests/unit/layer/content.rs"]
mod tests;
