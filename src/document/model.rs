use crate::animation::keyframe::Property;
use crate::foundation::core::{Affine, Frame, Point, Rect, Rgba8, TimeRange};
use crate::foundation::ids::next_unique_id;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Policy reconciling a file's authored duration with a requested one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeStretchMode {
    /// Play at original speed; hold the last frame beyond the content.
    None,
    /// Speed playback up or down to fit the requested duration.
    Scale,
    /// Loop the content.
    #[default]
    Repeat,
    /// Loop the content, reversing every other cycle.
    RepeatInverted,
}

/// How a layer uses its track matte.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackMatteType {
    /// No matte.
    #[default]
    None,
    /// Keep pixels where the matte is opaque.
    Alpha,
    /// Keep pixels where the matte is transparent.
    AlphaInverted,
    /// Keep pixels where the matte is bright.
    Luma,
    /// Keep pixels where the matte is dark.
    LumaInverted,
}

impl TrackMatteType {
    /// Return `true` for the inverted matte kinds.
    pub fn is_inverted(self) -> bool {
        matches!(self, Self::AlphaInverted | Self::LumaInverted)
    }
}

/// Kind tag of a layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerType {
    /// Layer without content.
    Null,
    /// Rectangle of a solid color.
    Solid,
    /// Text block.
    Text,
    /// Vector shapes.
    Shape,
    /// Replaceable bitmap.
    Image,
    /// Nested composition.
    PreCompose,
    /// Camera, never drawn.
    Camera,
}

/// Content kind of a composition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositionKind {
    /// Composition built from layers.
    #[default]
    Vector,
    /// Pre-rendered bitmap sequence.
    Bitmap,
    /// Pre-rendered video sequence.
    Video,
}

/// A named point or span on a timeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    /// Start frame.
    pub start_time: Frame,
    /// Length in frames.
    #[serde(default)]
    pub duration: Frame,
    /// Free-form comment.
    #[serde(default)]
    pub comment: String,
}

/// Editable text payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextDocument {
    /// Displayed text.
    pub text: String,
    /// Font family name.
    #[serde(default)]
    pub font_family: String,
    /// Font size in points.
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    /// Fill color.
    #[serde(default = "default_text_color")]
    pub fill_color: Rgba8,
}

fn default_font_size() -> f32 {
    24.0
}

fn default_text_color() -> Rgba8 {
    Rgba8::rgb(0, 0, 0)
}

impl TextDocument {
    /// Text with default styling.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font_family: String::new(),
            font_size: default_font_size(),
            fill_color: default_text_color(),
        }
    }
}

/// Embedded bitmap referenced by image layers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImageBytesDef {
    /// Document-local id.
    pub id: u32,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
    /// Ratio between the stored pixels and the authored size.
    #[serde(default = "unit_scale")]
    pub scale_factor: f32,
    #[serde(skip, default = "next_unique_id")]
    pub(crate) unique_id: u32,
}

fn unit_scale() -> f32 {
    1.0
}

/// Animated 2D layer transform.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformDef {
    /// Anchor point in layer space.
    pub anchor_point: Property<Point>,
    /// Position of the anchor in parent space.
    pub position: Property<Point>,
    /// Scale factors.
    pub scale: Property<Point>,
    /// Rotation in degrees.
    pub rotation: Property<f32>,
    /// Opacity in `[0, 1]`.
    pub opacity: Property<f32>,
}

impl Default for TransformDef {
    fn default() -> Self {
        Self {
            anchor_point: Property::Static(Point::ZERO),
            position: Property::Static(Point::ZERO),
            scale: Property::Static(Point::new(1.0, 1.0)),
            rotation: Property::Static(0.0),
            opacity: Property::Static(1.0),
        }
    }
}

/// Matrix and opacity of a layer at one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerTransform {
    /// Layer-to-parent matrix.
    pub matrix: Affine,
    /// Opacity in `[0, 1]`.
    pub alpha: f32,
}

impl LayerTransform {
    /// Return `true` when the transform can show anything.
    pub fn visible(&self) -> bool {
        self.alpha > 0.0 && crate::foundation::core::is_invertible(self.matrix)
    }
}

impl TransformDef {
    /// Sample the transform at a composition frame.
    pub fn at(&self, frame: Frame) -> LayerTransform {
        let anchor = self.anchor_point.value_at(frame);
        let position = self.position.value_at(frame);
        let scale = self.scale.value_at(frame);
        let rotation = f64::from(self.rotation.value_at(frame)).to_radians();
        let matrix = Affine::translate(position.to_vec2())
            * Affine::rotate(rotation)
            * Affine::scale_non_uniform(scale.x, scale.y)
            * Affine::translate(-anchor.to_vec2());
        LayerTransform {
            matrix,
            alpha: self.opacity.value_at(frame).clamp(0.0, 1.0),
        }
    }

    /// Return `true` when no transform property is keyframed.
    pub fn is_static(&self) -> bool {
        !(self.anchor_point.is_animated()
            || self.position.is_animated()
            || self.scale.is_animated()
            || self.rotation.is_animated()
            || self.opacity.is_animated())
    }

    /// Largest absolute scale reached over all scale keyframes.
    pub(crate) fn max_scale(&self) -> Point {
        match &self.scale {
            Property::Static(s) => Point::new(s.x.abs(), s.y.abs()),
            Property::Animated(keys) => keys.iter().fold(Point::ZERO, |acc, k| {
                Point::new(
                    acc.x.max(k.start_value.x.abs()).max(k.end_value.x.abs()),
                    acc.y.max(k.start_value.y.abs()).max(k.end_value.y.abs()),
                )
            }),
        }
    }
}

/// Kind-specific payload of a layer definition.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerContentDef {
    /// No content.
    Null,
    /// Solid rectangle.
    Solid {
        /// Fill color.
        color: Rgba8,
        /// Width in pixels.
        width: i32,
        /// Height in pixels.
        height: i32,
    },
    /// Text block; glyph layout happens outside this crate.
    Text {
        /// Source text document.
        document: TextDocument,
        /// Layout box in layer space.
        #[serde(default)]
        bounds: Rect,
    },
    /// Vector shapes; rasterization happens outside this crate.
    Shape {
        /// Content bounds in layer space.
        #[serde(default)]
        bounds: Rect,
    },
    /// Image layer.
    Image {
        /// Id of the embedded bitmap.
        image_id: u32,
        /// Authored content time remap, in frames of the content.
        #[serde(default)]
        time_remap: Option<Property<f32>>,
    },
    /// Nested composition.
    PreCompose {
        /// Id of the nested composition.
        composition_id: u32,
        /// Offset of the nested timeline relative to the layer start.
        #[serde(default)]
        composition_start_time: Frame,
    },
    /// Camera.
    Camera,
}

/// One layer of a composition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LayerDef {
    /// Document-local id.
    pub id: u32,
    /// Layer name.
    #[serde(default)]
    pub name: String,
    /// Kind payload.
    #[serde(flatten)]
    pub content: LayerContentDef,
    /// Start frame in the parent composition.
    #[serde(default)]
    pub start_time: Frame,
    /// Length in frames.
    pub duration: Frame,
    /// Animated transform.
    #[serde(default)]
    pub transform: TransformDef,
    /// Initial visibility.
    #[serde(default = "yes")]
    pub is_active: bool,
    /// How `track_matte` masks this layer.
    #[serde(default)]
    pub track_matte_type: TrackMatteType,
    /// Matte layer, drawn only through this layer.
    #[serde(default)]
    pub track_matte: Option<Arc<LayerDef>>,
    /// Timeline markers.
    #[serde(default)]
    pub markers: Vec<Marker>,
    #[serde(skip, default = "next_unique_id")]
    pub(crate) unique_id: u32,
}

fn yes() -> bool {
    true
}

impl LayerDef {
    /// Build a definition for a layer that has no backing document.
    pub(crate) fn standalone(content: LayerContentDef, duration: Frame) -> Self {
        Self {
            id: 0,
            name: String::new(),
            content,
            start_time: 0,
            duration,
            transform: TransformDef::default(),
            is_active: true,
            track_matte_type: TrackMatteType::None,
            track_matte: None,
            markers: Vec::new(),
            unique_id: next_unique_id(),
        }
    }

    /// Kind tag of this layer.
    pub fn layer_type(&self) -> LayerType {
        match self.content {
            LayerContentDef::Null => LayerType::Null,
            LayerContentDef::Solid { .. } => LayerType::Solid,
            LayerContentDef::Text { .. } => LayerType::Text,
            LayerContentDef::Shape { .. } => LayerType::Shape,
            LayerContentDef::Image { .. } => LayerType::Image,
            LayerContentDef::PreCompose { .. } => LayerType::PreCompose,
            LayerContentDef::Camera => LayerType::Camera,
        }
    }

    /// Process-wide unique id of this definition.
    pub fn unique_id(&self) -> u32 {
        self.unique_id
    }
}

/// A composition: an ordered set of layers on a shared timeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompositionDef {
    /// Document-local id.
    pub id: u32,
    /// Content kind.
    #[serde(default)]
    pub kind: CompositionKind,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
    /// Length in frames.
    pub duration: Frame,
    /// Frames per second.
    pub frame_rate: f32,
    /// Layers, top-most first.
    #[serde(default)]
    pub layers: Vec<Arc<LayerDef>>,
    /// Frame where the audio track starts.
    #[serde(default)]
    pub audio_start_time: Frame,
    /// Audio markers.
    #[serde(default)]
    pub audio_markers: Vec<Marker>,
    #[serde(skip, default = "next_unique_id")]
    pub(crate) unique_id: u32,
}

/// Root of a parsed document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileDef {
    /// Format feature level the document requires.
    #[serde(default = "default_tag_level")]
    pub tag_level: u16,
    /// Compositions; the last one is the main composition.
    pub compositions: Vec<Arc<CompositionDef>>,
    /// Embedded bitmaps.
    #[serde(default)]
    pub images: Vec<ImageBytesDef>,
    /// Stretch policy applied when the duration is overridden.
    #[serde(default)]
    pub time_stretch_mode: TimeStretchMode,
    /// Range that Scale mode stretches; frames outside it keep their speed.
    #[serde(default)]
    pub scaled_time_range: Option<TimeRange>,
    /// Editable image indices; `None` means all images are editable.
    #[serde(default)]
    pub editable_images: Option<Vec<i32>>,
    /// Editable text indices; `None` means all texts are editable.
    #[serde(default)]
    pub editable_texts: Option<Vec<i32>>,
}

fn default_tag_level() -> u16 {
    1
}

#[cfg(test)]
#[path = "../../tests/unit/document/model.rs"]
mod tests;
