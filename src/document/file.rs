use crate::document::model::{
    CompositionDef, CompositionKind, FileDef, ImageBytesDef, LayerContentDef, LayerDef,
    TextDocument, TimeStretchMode,
};
use crate::foundation::core::{Frame, TimeRange};
use crate::foundation::error::{KinemaError, KinemaResult};
use crate::foundation::ids::next_unique_id;
use std::collections::HashMap;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

/// Highest document feature level this crate understands.
pub const MAX_SUPPORTED_TAG_LEVEL: u16 = 93;

/// A parsed, validated animation document.
///
/// Files are immutable and shared through `Arc`; every runtime layer built
/// from a file keeps it alive.
#[derive(Debug)]
pub struct File {
    def: FileDef,
    path: String,
    root_layer: Arc<LayerDef>,
    main: Arc<CompositionDef>,
    compositions: HashMap<u32, Arc<CompositionDef>>,
    text_layers: Vec<Arc<LayerDef>>,
    unique_id: u32,
}

impl File {
    /// Parse a document from a JSON reader.
    pub fn from_reader<R: std::io::Read>(r: R) -> KinemaResult<Arc<Self>> {
        let def: FileDef = serde_json::from_reader(r)
            .map_err(|e| KinemaError::decode(format!("parse document JSON: {e}")))?;
        Self::from_def(def, String::new())
    }

    /// Parse a document from a JSON string.
    pub fn from_json(json: &str) -> KinemaResult<Arc<Self>> {
        Self::from_reader(json.as_bytes())
    }

    /// Parse a document from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> KinemaResult<Arc<Self>> {
        let path = path.as_ref();
        let f = std::fs::File::open(path)
            .map_err(|e| KinemaError::io(format!("open document '{}': {e}", path.display())))?;
        let def: FileDef = serde_json::from_reader(BufReader::new(f)).map_err(|e| {
            KinemaError::decode(format!("parse document '{}': {e}", path.display()))
        })?;
        Self::from_def(def, path.display().to_string())
    }

    /// Validate and index an already-deserialized document.
    pub fn from_def(def: FileDef, path: String) -> KinemaResult<Arc<Self>> {
        validate(&def)?;
        let main = def
            .compositions
            .last()
            .cloned()
            .ok_or_else(|| KinemaError::validation("document has no compositions"))?;
        let compositions = def
            .compositions
            .iter()
            .map(|c| (c.id, Arc::clone(c)))
            .collect::<HashMap<_, _>>();
        for c in &def.compositions {
            for layer in &c.layers {
                check_references(layer, &compositions, &def.images)?;
            }
        }
        let mut root = LayerDef::standalone(
            LayerContentDef::PreCompose {
                composition_id: main.id,
                composition_start_time: 0,
            },
            main.duration,
        );
        root.name = String::from("root");
        let mut text_layers = Vec::new();
        for c in &def.compositions {
            for layer in &c.layers {
                collect_text_layers(layer, &mut text_layers);
            }
        }
        Ok(Arc::new(Self {
            def,
            path,
            root_layer: Arc::new(root),
            main,
            compositions,
            text_layers,
            unique_id: next_unique_id(),
        }))
    }

    /// Frame rate of the main composition.
    pub fn frame_rate(&self) -> f32 {
        self.main_composition().frame_rate
    }

    /// Width of the main composition.
    pub fn width(&self) -> i32 {
        self.main_composition().width
    }

    /// Height of the main composition.
    pub fn height(&self) -> i32 {
        self.main_composition().height
    }

    /// Length of the main composition in frames.
    pub fn duration(&self) -> Frame {
        self.main_composition().duration
    }

    /// Feature level of the document.
    pub fn tag_level(&self) -> u16 {
        self.def.tag_level
    }

    /// Number of text layers.
    pub fn num_texts(&self) -> usize {
        self.text_layers.len()
    }

    /// Number of embedded images.
    pub fn num_images(&self) -> usize {
        self.def.images.len()
    }

    /// Number of pre-rendered video compositions.
    pub fn num_videos(&self) -> usize {
        self.def
            .compositions
            .iter()
            .filter(|c| c.kind == CompositionKind::Video)
            .count()
    }

    /// Path the document was loaded from; empty for in-memory documents.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Default stretch policy.
    pub fn time_stretch_mode(&self) -> TimeStretchMode {
        self.def.time_stretch_mode
    }

    /// Range Scale mode is limited to, if declared.
    pub fn scaled_time_range(&self) -> Option<TimeRange> {
        self.def.scaled_time_range
    }

    /// Editable image indices.
    pub fn editable_images(&self) -> Vec<i32> {
        match &self.def.editable_images {
            Some(v) => v.clone(),
            None => (0..self.num_images() as i32).collect(),
        }
    }

    /// Editable text indices.
    pub fn editable_texts(&self) -> Vec<i32> {
        match &self.def.editable_texts {
            Some(v) => v.clone(),
            None => (0..self.num_texts() as i32).collect(),
        }
    }

    /// Copy of the original text of the editable text at `index`.
    pub fn text_data(&self, index: i32) -> Option<TextDocument> {
        let layer = self.text_layers.get(usize::try_from(index).ok()?)?;
        match &layer.content {
            LayerContentDef::Text { document, .. } => Some(document.clone()),
            _ => None,
        }
    }

    /// Process-wide unique id of this document.
    pub fn unique_id(&self) -> u32 {
        self.unique_id
    }

    pub(crate) fn main_composition(&self) -> &Arc<CompositionDef> {
        &self.main
    }

    pub(crate) fn root_layer(&self) -> &Arc<LayerDef> {
        &self.root_layer
    }

    pub(crate) fn composition(&self, id: u32) -> Option<&Arc<CompositionDef>> {
        self.compositions.get(&id)
    }

    pub(crate) fn image_bytes(&self, id: u32) -> Option<&ImageBytesDef> {
        self.def.images.iter().find(|i| i.id == id)
    }

    /// Editable index of a layer, `-1` when the layer is not replaceable.
    pub(crate) fn editable_index(&self, layer: &LayerDef) -> i32 {
        let index = match &layer.content {
            LayerContentDef::Text { .. } => self
                .text_layers
                .iter()
                .position(|l| l.unique_id == layer.unique_id),
            LayerContentDef::Image { image_id, .. } => {
                self.def.images.iter().position(|i| i.id == *image_id)
            }
            _ => None,
        };
        index.map_or(-1, |i| i as i32)
    }
}

fn collect_text_layers(layer: &Arc<LayerDef>, out: &mut Vec<Arc<LayerDef>>) {
    if matches!(layer.content, LayerContentDef::Text { .. }) {
        out.push(Arc::clone(layer));
    }
    if let Some(matte) = &layer.track_matte {
        collect_text_layers(matte, out);
    }
}

fn validate(def: &FileDef) -> KinemaResult<()> {
    if def.tag_level > MAX_SUPPORTED_TAG_LEVEL {
        return Err(KinemaError::validation(format!(
            "document tag level {} exceeds supported level {MAX_SUPPORTED_TAG_LEVEL}",
            def.tag_level
        )));
    }
    for c in &def.compositions {
        if c.frame_rate.is_nan() || c.frame_rate <= 0.0 {
            return Err(KinemaError::validation(format!(
                "composition {} frame_rate must be > 0",
                c.id
            )));
        }
        if c.duration <= 0 {
            return Err(KinemaError::validation(format!(
                "composition {} duration must be > 0",
                c.id
            )));
        }
        if c.width < 0 || c.height < 0 {
            return Err(KinemaError::validation(format!(
                "composition {} size must be non-negative",
                c.id
            )));
        }
        for layer in &c.layers {
            validate_layer(layer)?;
        }
    }
    if let Some(range) = def.scaled_time_range
        && !range.is_valid()
    {
        return Err(KinemaError::validation("scaled_time_range start must be <= end"));
    }
    Ok(())
}

fn validate_layer(layer: &LayerDef) -> KinemaResult<()> {
    if layer.duration <= 0 {
        return Err(KinemaError::validation(format!(
            "layer {} duration must be > 0",
            layer.id
        )));
    }
    if let LayerContentDef::Image {
        time_remap: Some(remap),
        ..
    } = &layer.content
        && let crate::animation::keyframe::Property::Animated(keys) = remap
        && keys.is_empty()
    {
        return Err(KinemaError::validation(format!(
            "layer {} time_remap has no keyframes",
            layer.id
        )));
    }
    if let Some(matte) = &layer.track_matte {
        validate_layer(matte)?;
    }
    Ok(())
}

fn check_references(
    layer: &LayerDef,
    compositions: &HashMap<u32, Arc<CompositionDef>>,
    images: &[ImageBytesDef],
) -> KinemaResult<()> {
    match &layer.content {
        LayerContentDef::PreCompose { composition_id, .. }
            if !compositions.contains_key(composition_id) =>
        {
            return Err(KinemaError::validation(format!(
                "layer {} references missing composition {composition_id}",
                layer.id
            )));
        }
        LayerContentDef::Image { image_id, .. } if !images.iter().any(|i| i.id == *image_id) => {
            return Err(KinemaError::validation(format!(
                "layer {} references missing image {image_id}",
                layer.id
            )));
        }
        _ => {}
    }
    if let Some(matte) = &layer.track_matte {
        check_references(matte, compositions, images)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/document/file.rs"]
mod tests;
