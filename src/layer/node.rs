use crate::animation::keyframe::Property;
use crate::document::File;
use crate::document::model::{
    ImageBytesDef, LayerContentDef, LayerDef, TextDocument, TimeStretchMode,
};
use crate::foundation::core::{Affine, Frame, Rgba8};
use crate::image::Image;
use crate::layer::stage::StageState;
use crate::layer::tree::LayerSlot;
use std::sync::{Arc, Weak};

/// Arena key of a runtime layer; equal to the layer's process-wide unique id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct LayerId(pub(crate) u32);

/// One runtime layer: shared attributes plus a kind-specific payload.
#[derive(Debug)]
pub(crate) struct LayerNode {
    pub(crate) id: LayerId,
    pub(crate) def: Arc<LayerDef>,
    /// Document this layer was built from; `None` for standalone layers.
    pub(crate) file: Option<Arc<File>>,
    /// File composition whose timeline this layer belongs to.
    pub(crate) root_file: Option<LayerId>,
    pub(crate) parent: Option<LayerId>,
    pub(crate) matte_owner: Option<LayerId>,
    pub(crate) track_matte: Option<LayerId>,
    pub(crate) handle: Weak<LayerSlot>,
    pub(crate) start_frame: Frame,
    pub(crate) content_frame: Frame,
    pub(crate) matrix: Affine,
    pub(crate) alpha: f32,
    pub(crate) visible: bool,
    pub(crate) excluded: bool,
    pub(crate) editable_index: i32,
    pub(crate) content_version: u64,
    pub(crate) audio_version: u64,
    pub(crate) kind: NodeKind,
}

#[derive(Debug)]
pub(crate) enum NodeKind {
    Plain,
    Solid(SolidPayload),
    Text(TextPayload),
    Image(ImagePayload),
    Composition(CompositionPayload),
}

#[derive(Debug)]
pub(crate) struct SolidPayload {
    pub(crate) color: Rgba8,
    pub(crate) width: i32,
    pub(crate) height: i32,
    pub(crate) replaced: bool,
}

#[derive(Debug)]
pub(crate) struct TextPayload {
    pub(crate) document: TextDocument,
    pub(crate) replaced: bool,
}

#[derive(Debug)]
pub(crate) struct ImagePayload {
    pub(crate) default_image: ImageBytesDef,
    pub(crate) time_remap: Option<Property<f32>>,
    pub(crate) replacement: Option<Arc<Image>>,
    /// Lazily built content-time remap in file frames.
    pub(crate) content_remap: Option<Property<f32>>,
}

#[derive(Debug)]
pub(crate) struct CompositionPayload {
    /// Children, bottom-most first.
    pub(crate) children: Vec<LayerId>,
    pub(crate) width: i32,
    pub(crate) height: i32,
    pub(crate) frame_duration: Frame,
    pub(crate) frame_rate: f32,
    /// Built by client code rather than from a document; its duration and
    /// frame rate follow its children.
    pub(crate) empty: bool,
    pub(crate) file: Option<FileTimeline>,
    pub(crate) stage: Option<Box<StageState>>,
}

/// Stretch state of a document root.
#[derive(Debug)]
pub(crate) struct FileTimeline {
    pub(crate) mode: TimeStretchMode,
    pub(crate) stretched_frame_duration: Frame,
    pub(crate) stretched_content_frame: Frame,
}

impl CompositionPayload {
    pub(crate) fn empty(width: i32, height: i32) -> Self {
        Self {
            children: Vec::new(),
            width,
            height,
            frame_duration: 1,
            frame_rate: crate::foundation::core::DEFAULT_FRAME_RATE,
            empty: true,
            file: None,
            stage: None,
        }
    }

    pub(crate) fn has_clip(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl LayerNode {
    /// Build a detached node for `def`; composition children are linked by the caller.
    pub(crate) fn new(id: LayerId, def: Arc<LayerDef>, file: Option<Arc<File>>) -> Self {
        let kind = match &def.content {
            LayerContentDef::Null | LayerContentDef::Shape { .. } | LayerContentDef::Camera => {
                NodeKind::Plain
            }
            LayerContentDef::Solid {
                color,
                width,
                height,
            } => NodeKind::Solid(SolidPayload {
                color: *color,
                width: *width,
                height: *height,
                replaced: false,
            }),
            LayerContentDef::Text { document, .. } => NodeKind::Text(TextPayload {
                document: document.clone(),
                replaced: false,
            }),
            LayerContentDef::Image {
                image_id,
                time_remap,
            } => {
                let default_image = file
                    .as_ref()
                    .and_then(|f| f.image_bytes(*image_id))
                    .cloned()
                    .unwrap_or_else(|| ImageBytesDef {
                        id: *image_id,
                        width: 0,
                        height: 0,
                        scale_factor: 1.0,
                        unique_id: crate::foundation::ids::next_unique_id(),
                    });
                NodeKind::Image(ImagePayload {
                    default_image,
                    time_remap: time_remap.clone(),
                    replacement: None,
                    content_remap: None,
                })
            }
            LayerContentDef::PreCompose { composition_id, .. } => {
                let comp = file.as_ref().and_then(|f| f.composition(*composition_id));
                NodeKind::Composition(CompositionPayload {
                    children: Vec::new(),
                    width: comp.map_or(0, |c| c.width),
                    height: comp.map_or(0, |c| c.height),
                    frame_duration: def.duration,
                    frame_rate: file
                        .as_ref()
                        .map_or(crate::foundation::core::DEFAULT_FRAME_RATE, |f| f.frame_rate()),
                    empty: false,
                    file: None,
                    stage: None,
                })
            }
        };
        let editable_index = file.as_ref().map_or(-1, |f| f.editable_index(&def));
        Self {
            id,
            start_frame: def.start_time,
            content_frame: 0,
            matrix: Affine::IDENTITY,
            alpha: 1.0,
            visible: def.is_active,
            excluded: false,
            editable_index,
            content_version: 0,
            audio_version: 0,
            parent: None,
            matte_owner: None,
            track_matte: None,
            root_file: None,
            handle: Weak::new(),
            def,
            file,
            kind,
        }
    }

    pub(crate) fn composition(&self) -> Option<&CompositionPayload> {
        match &self.kind {
            NodeKind::Composition(c) => Some(c),
            _ => None,
        }
    }

    pub(crate) fn composition_mut(&mut self) -> Option<&mut CompositionPayload> {
        match &mut self.kind {
            NodeKind::Composition(c) => Some(c),
            _ => None,
        }
    }

    pub(crate) fn image(&self) -> Option<&ImagePayload> {
        match &self.kind {
            NodeKind::Image(i) => Some(i),
            _ => None,
        }
    }

    pub(crate) fn image_mut(&mut self) -> Option<&mut ImagePayload> {
        match &mut self.kind {
            NodeKind::Image(i) => Some(i),
            _ => None,
        }
    }

    pub(crate) fn children(&self) -> &[LayerId] {
        self.composition().map_or(&[], |c| c.children.as_slice())
    }

    pub(crate) fn is_stage(&self) -> bool {
        self.composition().is_some_and(|c| c.stage.is_some())
    }

    pub(crate) fn is_file_root(&self) -> bool {
        self.composition().is_some_and(|c| c.file.is_some())
    }

    /// Return `true` once client code replaced this layer's content.
    pub(crate) fn content_modified(&self) -> bool {
        match &self.kind {
            NodeKind::Image(i) => i.replacement.is_some(),
            NodeKind::Text(t) => t.replaced,
            NodeKind::Solid(s) => s.replaced,
            _ => self.content_version > 0,
        }
    }

    /// Return `true` when every frame of the content looks the same.
    pub(crate) fn content_static(&self) -> bool {
        if !self.def.transform.is_static() {
            return false;
        }
        match &self.kind {
            NodeKind::Image(i) => match &i.replacement {
                Some(img) if !img.is_still() => false,
                _ => !i.time_remap.as_ref().is_some_and(|r| r.is_animated()),
            },
            NodeKind::Composition(_) => false,
            _ => true,
        }
    }

    /// Offset of the nested timeline, `composition_start_time - start_time`.
    pub(crate) fn composition_offset(&self) -> Frame {
        match self.def.content {
            LayerContentDef::PreCompose {
                composition_start_time,
                ..
            } => composition_start_time - self.def.start_time,
            _ => 0,
        }
    }
}
