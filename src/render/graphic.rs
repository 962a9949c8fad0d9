//! Recorded drawing commands for one frame of a layer tree.
//!
//! A [`Graphic`] is a plain value: recording walks the tree under the root
//! lock, and the result can be rasterized after the lock is released.

use crate::document::model::TrackMatteType;
use crate::foundation::core::{Affine, Rect, Rgba8};
use crate::image::Image;
use crate::layer::node::{LayerId, NodeKind};
use crate::layer::tree::LayerArena;
use crate::render::scale::{ScaleMode, apply_scale_mode};
use std::sync::Arc;

/// A drawing command tree.
#[derive(Clone, Debug, Default)]
pub enum Graphic {
    /// Draws nothing.
    #[default]
    Empty,
    /// A filled rectangle.
    Solid { rect: Rect, color: Rgba8 },
    /// An image placed by `matrix`, covering `width` x `height` pixels of it.
    Picture {
        image: Arc<Image>,
        width: i32,
        height: i32,
        matrix: Affine,
    },
    /// Children drawn bottom-most first.
    Group(Vec<Graphic>),
    Transform {
        matrix: Affine,
        alpha: f32,
        content: Box<Graphic>,
    },
    /// `content` cut to `rect`, given in content space.
    Clip { rect: Rect, content: Box<Graphic> },
    /// `content` weighted by a rendered `matte`.
    Matte {
        content: Box<Graphic>,
        matte: Box<Graphic>,
        kind: TrackMatteType,
    },
}

impl Graphic {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Group(children) => children.iter().all(Graphic::is_empty),
            Self::Transform { content, .. } | Self::Clip { content, .. } => content.is_empty(),
            Self::Matte { content, .. } => content.is_empty(),
            Self::Solid { .. } | Self::Picture { .. } => false,
        }
    }

    fn transform(matrix: Affine, alpha: f32, content: Graphic) -> Self {
        if content.is_empty() || alpha <= 0.0 {
            return Self::Empty;
        }
        if matrix == Affine::IDENTITY && alpha >= 1.0 {
            return content;
        }
        Self::Transform {
            matrix,
            alpha,
            content: Box::new(content),
        }
    }

    /// Every distinct image referenced by this graphic.
    pub(crate) fn images(&self) -> Vec<Arc<Image>> {
        let mut out: Vec<Arc<Image>> = Vec::new();
        self.collect_images(&mut out);
        out
    }

    fn collect_images(&self, out: &mut Vec<Arc<Image>>) {
        match self {
            Self::Picture { image, .. } => {
                if !out.iter().any(|i| Arc::ptr_eq(i, image)) {
                    out.push(Arc::clone(image));
                }
            }
            Self::Group(children) => children.iter().for_each(|c| c.collect_images(out)),
            Self::Transform { content, .. } | Self::Clip { content, .. } => {
                content.collect_images(out);
            }
            Self::Matte { content, matte, .. } => {
                content.collect_images(out);
                matte.collect_images(out);
            }
            Self::Empty | Self::Solid { .. } => {}
        }
    }
}

impl LayerArena {
    /// Record the children of `id` at the current frame, without `id`'s own transform.
    pub(crate) fn record(&mut self, id: LayerId, video_enabled: bool) -> Graphic {
        self.record_content(id, video_enabled)
    }

    /// `id` in its parent's space, track matte applied.
    fn record_layer(&mut self, id: LayerId, video_enabled: bool) -> Graphic {
        if !self.node(id).visible {
            return Graphic::Empty;
        }
        let content = self.record_placed(id, video_enabled);
        let node = self.node(id);
        let Some(matte) = node.track_matte else {
            return content;
        };
        let kind = node.def.track_matte_type;
        if content.is_empty() || kind == TrackMatteType::None {
            return content;
        }
        // A matte draws even when its own visibility flag is off.
        let matte = self.record_placed(matte, video_enabled);
        if matte.is_empty() && !kind.is_inverted() {
            return Graphic::Empty;
        }
        Graphic::Matte {
            content: Box::new(content),
            matte: Box::new(matte),
            kind,
        }
    }

    fn record_placed(&mut self, id: LayerId, video_enabled: bool) -> Graphic {
        let Some(transform) = self.get_transform(id) else {
            return Graphic::Empty;
        };
        let content = self.record_content(id, video_enabled);
        Graphic::transform(transform.matrix, transform.alpha, content)
    }

    fn record_content(&mut self, id: LayerId, video_enabled: bool) -> Graphic {
        match &self.node(id).kind {
            NodeKind::Solid(s) => Graphic::Solid {
                rect: Rect::new(0.0, 0.0, f64::from(s.width), f64::from(s.height)),
                color: s.color,
            },
            NodeKind::Image(payload) => {
                let Some(image) = payload.replacement.clone() else {
                    return Graphic::Empty;
                };
                let (width, height) = (payload.default_image.width, payload.default_image.height);
                if !image.is_still() && (!video_enabled || !self.content_visible(id)) {
                    return Graphic::Empty;
                }
                let matrix = match image.scale_mode() {
                    ScaleMode::None => image.matrix(),
                    mode => apply_scale_mode(mode, image.width(), image.height(), width, height),
                };
                Graphic::Clip {
                    rect: Rect::new(0.0, 0.0, f64::from(width), f64::from(height)),
                    content: Box::new(Graphic::Picture {
                        width: image.width(),
                        height: image.height(),
                        image,
                        matrix,
                    }),
                }
            }
            NodeKind::Composition(c) => {
                let clip = c
                    .has_clip()
                    .then(|| Rect::new(0.0, 0.0, f64::from(c.width), f64::from(c.height)));
                let children = c.children.clone();
                let group: Vec<Graphic> = children
                    .into_iter()
                    .map(|child| self.record_layer(child, video_enabled))
                    .filter(|g| !g.is_empty())
                    .collect();
                if group.is_empty() {
                    return Graphic::Empty;
                }
                let content = Graphic::Group(group);
                match clip {
                    Some(rect) => Graphic::Clip {
                        rect,
                        content: Box::new(content),
                    },
                    None => content,
                }
            }
            // Text and shape glyphs come from the content renderer, which is not part of this crate.
            NodeKind::Text(_) | NodeKind::Plain => Graphic::Empty,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/graphic.rs"]
mod tests;
