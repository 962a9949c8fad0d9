//! Document roots: building runtime trees from a [`File`] and stretching their timeline.

use crate::document::model::{CompositionKind, LayerContentDef, LayerDef, LayerType, TextDocument, TimeStretchMode};
use crate::document::{File, MAX_SUPPORTED_TAG_LEVEL};
use crate::foundation::core::{
    Frame, TimeRange, frame_to_progress, frame_to_time, progress_to_frame, time_to_frame,
};
use crate::foundation::error::KinemaResult;
use crate::foundation::ids::next_unique_id;
use crate::image::Image;
use crate::layer::Layer;
use crate::layer::composition::{Composition, same_file};
use crate::layer::node::{FileTimeline, LayerId, LayerNode};
use crate::layer::tree::LayerArena;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

impl LayerArena {
    /// Instantiate `def` and everything below it; children are stored bottom-most first.
    pub(crate) fn build_layer(&mut self, file: &Arc<File>, def: &Arc<LayerDef>) -> LayerId {
        let id = LayerId(next_unique_id());
        self.insert(LayerNode::new(id, Arc::clone(def), Some(Arc::clone(file))));
        let LayerContentDef::PreCompose { composition_id, .. } = &def.content else {
            return id;
        };
        let Some(composition) = file.composition(*composition_id) else {
            return id;
        };
        if composition.kind != CompositionKind::Vector {
            return id;
        }
        for child_def in composition.layers.iter().rev() {
            let child = self.build_layer(file, child_def);
            self.node_mut(child).parent = Some(id);
            if let Some(payload) = self.node_mut(id).composition_mut() {
                payload.children.push(child);
            }
            if let Some(matte_def) = &child_def.track_matte {
                let matte = self.build_layer(file, matte_def);
                self.node_mut(matte).matte_owner = Some(child);
                self.node_mut(child).track_matte = Some(matte);
            }
        }
        id
    }

    fn file_timeline(&self, id: LayerId) -> Option<&FileTimeline> {
        self.node(id).composition()?.file.as_ref()
    }

    /// Return `true` when `id` is a document root whose duration was overridden.
    pub(crate) fn is_stretched(&self, id: LayerId) -> bool {
        self.file_timeline(id)
            .is_some_and(|f| f.stretched_frame_duration != self.frame_duration(id))
    }

    fn scaled_time_range(&self, id: LayerId) -> Option<TimeRange> {
        self.node(id).file.as_ref()?.scaled_time_range()
    }

    /// Map a content frame in `[0, stretched)` back onto the authored content.
    fn stretched_content_to_file(&self, id: LayerId, content: Frame) -> Frame {
        let Some(timeline) = self.file_timeline(id) else {
            return content;
        };
        let stretched = timeline.stretched_frame_duration;
        let duration = self.frame_duration(id);
        match timeline.mode {
            TimeStretchMode::Scale => match self.scaled_time_range(id) {
                Some(range) => self.scaled_frame_to_file_frame(id, content, range),
                None => {
                    let frame = (content as f64 * duration as f64 / stretched as f64).round() as Frame;
                    frame.min(duration - 1)
                }
            },
            TimeStretchMode::Repeat => {
                if content >= duration {
                    content % duration
                } else {
                    content
                }
            }
            TimeStretchMode::RepeatInverted => {
                if content >= duration {
                    let count = ((content + 1) as f64 / duration as f64).ceil() as i64;
                    let frame = content % duration;
                    if count % 2 == 0 {
                        duration - 1 - frame
                    } else {
                        frame
                    }
                } else {
                    content
                }
            }
            TimeStretchMode::None => content.min(duration - 1),
        }
    }

    /// Map a frame of the stretched timeline onto the authored timeline.
    pub(crate) fn stretched_frame_to_file_frame(&self, id: LayerId, stretched_frame: Frame) -> Frame {
        let start = self.node(id).start_frame;
        let content = stretched_frame - start;
        if content <= 0 {
            return stretched_frame;
        }
        let stretched = self.stretched_frame_duration(id);
        if content >= stretched {
            return stretched_frame - stretched + self.frame_duration(id);
        }
        start + self.stretched_content_to_file(id, content)
    }

    /// Map a frame of the authored timeline onto the stretched timeline.
    pub(crate) fn file_frame_to_stretched_frame(&self, id: LayerId, file_frame: Frame) -> Frame {
        let start = self.node(id).start_frame;
        let content = file_frame - start;
        if content <= 0 {
            return file_frame;
        }
        let duration = self.frame_duration(id);
        let stretched = self.stretched_frame_duration(id);
        if content >= duration {
            return file_frame + stretched - duration;
        }
        let Some(timeline) = self.file_timeline(id) else {
            return file_frame;
        };
        if timeline.mode != TimeStretchMode::Scale {
            return file_frame;
        }
        let mapped = match self.scaled_time_range(id) {
            Some(range) => self.file_frame_to_scaled_frame(id, content, range),
            None => {
                let frame = (content as f64 * stretched as f64 / duration as f64).round() as Frame;
                frame.min(stretched - 1)
            }
        };
        start + mapped
    }

    /// Time flavour of [`LayerArena::stretched_frame_to_file_frame`].
    pub(crate) fn stretched_time_to_file_time(&self, id: LayerId, stretched_time: i64) -> i64 {
        let rate = self.frame_rate(id);
        let start = self.start_time(id);
        let content = stretched_time - start;
        if content <= 0 {
            return stretched_time;
        }
        let duration = frame_to_time(self.frame_duration(id), rate);
        let stretched = frame_to_time(self.stretched_frame_duration(id), rate);
        if content >= stretched {
            return stretched_time - stretched + duration;
        }
        let frame = self.stretched_content_to_file(id, time_to_frame(content, rate));
        start + frame_to_time(frame, rate)
    }

    fn scaled_frame_to_file_frame(&self, id: LayerId, scaled: Frame, range: TimeRange) -> Frame {
        if scaled < range.start {
            return scaled;
        }
        let duration = self.frame_duration(id);
        let stretched = self.stretched_frame_duration(id);
        let min_duration = range.start + duration - range.end;
        if stretched <= min_duration {
            return scaled + range.end - range.start;
        }
        let offset = stretched - duration;
        if scaled >= range.end + offset {
            return scaled - offset;
        }
        let span = stretched - min_duration - 1;
        if span <= 0 {
            return range.start;
        }
        let progress = (scaled - range.start) as f64 / span as f64;
        (progress * (duration - min_duration - 1) as f64).round() as Frame + range.start
    }

    fn file_frame_to_scaled_frame(&self, id: LayerId, file_frame: Frame, range: TimeRange) -> Frame {
        if file_frame < range.start {
            return file_frame;
        }
        let duration = self.frame_duration(id);
        let stretched = self.stretched_frame_duration(id);
        let min_duration = range.start + duration - range.end;
        if stretched <= min_duration {
            return file_frame - range.end + range.start;
        }
        if file_frame >= range.end {
            return file_frame + stretched - duration;
        }
        let progress = frame_to_progress(file_frame - range.start, range.end - range.start);
        progress_to_frame(progress, stretched - min_duration) + range.start
    }

    /// Override the root's duration; non-positive values restore the authored one.
    pub(crate) fn set_file_duration(&mut self, id: LayerId, duration: i64) {
        let mut frames = time_to_frame(duration, self.frame_rate(id));
        if frames <= 0 {
            frames = self.frame_duration(id);
        }
        let current_time = self.current_time(id);
        let Some(timeline) = self.node_mut(id).composition_mut().and_then(|c| c.file.as_mut()) else {
            return;
        };
        if timeline.stretched_frame_duration == frames {
            return;
        }
        timeline.stretched_frame_duration = frames;
        self.update_empty_parent(id);
        self.on_timeline_changed(id);
        self.goto_time(id, current_time);
        self.notify_modified(id, true);
    }

    pub(crate) fn set_time_stretch_mode(&mut self, id: LayerId, mode: TimeStretchMode) {
        let current_time = self.current_time(id);
        let Some(timeline) = self.node_mut(id).composition_mut().and_then(|c| c.file.as_mut()) else {
            return;
        };
        if timeline.mode == mode {
            return;
        }
        timeline.mode = mode;
        self.on_timeline_changed(id);
        self.goto_time(id, current_time);
        self.notify_modified(id, true);
    }

    /// Layers of `root`'s document with the given kind and editable index.
    pub(crate) fn layers_by_editable_index(&self, root: LayerId, index: i32, layer_type: LayerType) -> Vec<LayerId> {
        let file = self.node(root).file.clone();
        self.find_layers(root, &|n| {
            n.def.layer_type() == layer_type
                && n.editable_index == index
                && same_file(&n.file, &file)
        })
    }
}

/// The root of a loaded document, with a stretchable timeline.
#[derive(Clone, Debug)]
pub struct FileComposition {
    composition: Composition,
    file: Arc<File>,
}

impl PartialEq for FileComposition {
    fn eq(&self, other: &Self) -> bool {
        self.composition == other.composition
    }
}

impl Deref for FileComposition {
    type Target = Composition;

    fn deref(&self) -> &Composition {
        &self.composition
    }
}

impl FileComposition {
    /// Highest document feature level this build can play.
    pub fn max_supported_tag_level() -> u16 {
        MAX_SUPPORTED_TAG_LEVEL
    }

    /// Instantiate a fresh runtime tree for `file`.
    pub fn from_file(file: Arc<File>) -> Self {
        let slot = LayerArena::plant_with(|arena| {
            let root = arena.build_layer(&file, file.root_layer());
            if let Some(payload) = arena.node_mut(root).composition_mut() {
                payload.file = Some(FileTimeline {
                    mode: file.time_stretch_mode(),
                    stretched_frame_duration: file.root_layer().duration,
                    stretched_content_frame: 0,
                });
            }
            arena.goto_time(root, 0);
            arena.on_add_to_root_file(root, root);
            root
        });
        Self {
            composition: Composition::from_layer(Layer::from_slot(slot)),
            file,
        }
    }

    /// Load and instantiate a document from disk.
    pub fn load(path: impl AsRef<Path>) -> KinemaResult<Self> {
        Ok(Self::from_file(File::from_path(path)?))
    }

    /// Parse and instantiate a document from a JSON reader.
    pub fn from_reader<R: std::io::Read>(r: R) -> KinemaResult<Self> {
        Ok(Self::from_file(File::from_reader(r)?))
    }

    pub(crate) fn from_parts(composition: Composition, file: Arc<File>) -> Self {
        Self { composition, file }
    }

    /// The document this tree was built from.
    pub fn file(&self) -> Arc<File> {
        Arc::clone(&self.file)
    }

    pub fn tag_level(&self) -> u16 {
        self.file().tag_level()
    }

    pub fn num_texts(&self) -> usize {
        self.file().num_texts()
    }

    pub fn num_images(&self) -> usize {
        self.file().num_images()
    }

    pub fn num_videos(&self) -> usize {
        self.file().num_videos()
    }

    pub fn path(&self) -> String {
        self.file().path().to_owned()
    }

    /// Original text of an editable text slot.
    pub fn text_data(&self, index: i32) -> Option<TextDocument> {
        self.file().text_data(index)
    }

    /// Replace the text of every layer in the slot; `None` restores the original.
    pub fn replace_text(&self, index: i32, text: Option<TextDocument>) {
        self.with_mut(|arena, id| {
            for layer in arena.layers_by_editable_index(id, index, LayerType::Text) {
                arena.set_text_document(layer, text.clone());
            }
        });
    }

    /// Replace the image of every layer in the slot; `None` restores the original.
    pub fn replace_image(&self, index: i32, image: Option<Arc<Image>>) {
        self.with_mut(|arena, id| {
            for layer in arena.layers_by_editable_index(id, index, LayerType::Image) {
                arena.set_image(layer, image.clone());
            }
        });
    }

    /// Replace the image of every image layer named `name`.
    pub fn replace_image_by_name(&self, name: &str, image: Option<Arc<Image>>) {
        if name.is_empty() {
            return;
        }
        self.with_mut(|arena, id| {
            let layers = arena.find_layers(id, &|n| {
                n.def.name == name && n.def.layer_type() == LayerType::Image
            });
            for layer in layers {
                arena.set_image(layer, image.clone());
            }
        });
    }

    pub fn layers_by_editable_index(&self, index: i32, layer_type: LayerType) -> Vec<Layer> {
        self.with_mut(|arena, id| {
            let found = arena.layers_by_editable_index(id, index, layer_type);
            arena.handles(found)
        })
    }

    /// Editable slot indices for texts or images.
    pub fn editable_indices(&self, layer_type: LayerType) -> Vec<i32> {
        match layer_type {
            LayerType::Image => self.file().editable_images(),
            LayerType::Text => self.file().editable_texts(),
            _ => Vec::new(),
        }
    }

    pub fn time_stretch_mode(&self) -> TimeStretchMode {
        self.with(|arena, id| {
            arena
                .node(id)
                .composition()
                .and_then(|c| c.file.as_ref())
                .map_or(TimeStretchMode::None, |f| f.mode)
        })
    }

    pub fn set_time_stretch_mode(&self, mode: TimeStretchMode) {
        self.with_mut(|arena, id| arena.set_time_stretch_mode(id, mode));
    }

    /// Stretch the timeline to `duration` microseconds.
    pub fn set_duration(&self, duration: i64) {
        self.with_mut(|arena, id| arena.set_file_duration(id, duration));
    }

    /// A new, unmodified tree built from the same document.
    pub fn copy_original(&self) -> Self {
        Self::from_file(self.file())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/layer/file.rs"]
mod tests;
