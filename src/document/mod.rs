//! Serialized document model and the validated, shareable [`File`].

pub mod file;
pub mod model;

pub use file::{File, MAX_SUPPORTED_TAG_LEVEL};
pub use model::{
    CompositionDef, CompositionKind, FileDef, ImageBytesDef, LayerContentDef, LayerDef,
    LayerTransform, LayerType, Marker, TextDocument, TimeStretchMode, TrackMatteType,
    TransformDef,
};
