//! Replaceable pictures: stills, decoded on demand, and frame sequences.

use crate::foundation::core::{Affine, time_to_frame};
use crate::foundation::error::{KinemaError, KinemaResult};
use crate::foundation::ids::next_unique_id;
use crate::foundation::math::premultiply_rgba8_in_place;
use crate::layer::node::LayerId;
use crate::render::scale::ScaleMode;
use anyhow::Context;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// Premultiplied RGBA8 pixels of one picture frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImagePixels {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row-major premultiplied RGBA8 data.
    pub rgba8_premul: Arc<Vec<u8>>,
}

#[derive(Debug)]
enum ImageSource {
    Encoded {
        bytes: Arc<[u8]>,
        decoded: OnceLock<Option<ImagePixels>>,
    },
    Frames {
        frames: Vec<ImagePixels>,
        frame_rate: f32,
    },
}

#[derive(Debug)]
struct ImageState {
    scale_mode: ScaleMode,
    matrix: Affine,
    owner: Option<LayerId>,
    content_time: i64,
    frame_index: usize,
}

/// A picture that can replace the content of image layers.
///
/// An image can be shared by layers of several trees, so its fill settings
/// sit behind their own lock instead of a tree's root lock.
#[derive(Debug)]
pub struct Image {
    unique_id: u32,
    width: i32,
    height: i32,
    source: ImageSource,
    state: Mutex<ImageState>,
    version: AtomicU64,
}

impl Image {
    fn with_source(width: i32, height: i32, source: ImageSource) -> Arc<Self> {
        Arc::new(Self {
            unique_id: next_unique_id(),
            width,
            height,
            source,
            state: Mutex::new(ImageState {
                scale_mode: ScaleMode::LetterBox,
                matrix: Affine::IDENTITY,
                owner: None,
                content_time: 0,
                frame_index: 0,
            }),
            version: AtomicU64::new(0),
        })
    }

    /// Read the header of an encoded picture; pixels are decoded lazily.
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> KinemaResult<Arc<Self>> {
        let bytes = bytes.into();
        let (w, h) = image::ImageReader::new(std::io::Cursor::new(&bytes[..]))
            .with_guessed_format()
            .context("guess image format")?
            .into_dimensions()
            .context("read image dimensions")?;
        let (width, height) = checked_size(w, h)?;
        Ok(Self::with_source(
            width,
            height,
            ImageSource::Encoded {
                bytes,
                decoded: OnceLock::new(),
            },
        ))
    }

    /// Read an encoded picture from disk.
    pub fn from_path(path: impl AsRef<Path>) -> KinemaResult<Arc<Self>> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| KinemaError::io(format!("read image '{}': {e}", path.display())))?;
        Self::from_bytes(bytes)
    }

    /// Wrap already-premultiplied RGBA8 pixels.
    pub fn from_pixels(width: u32, height: u32, rgba8_premul: Vec<u8>) -> KinemaResult<Arc<Self>> {
        let frame = checked_pixels(width, height, rgba8_premul)?;
        Self::from_frames(vec![frame], 0.0)
    }

    /// Build an image sequence played at `frame_rate`.
    pub fn from_frames(frames: Vec<ImagePixels>, frame_rate: f32) -> KinemaResult<Arc<Self>> {
        let first = frames
            .first()
            .ok_or_else(|| KinemaError::validation("image sequence has no frames"))?;
        let (width, height) = checked_size(first.width, first.height)?;
        for f in &frames {
            if f.width != first.width || f.height != first.height {
                return Err(KinemaError::validation(
                    "image sequence frames must share one size",
                ));
            }
            if f.rgba8_premul.len() != f.width as usize * f.height as usize * 4 {
                return Err(KinemaError::validation(
                    "image sequence frame has the wrong byte length",
                ));
            }
        }
        if frames.len() > 1 && (frame_rate.is_nan() || frame_rate <= 0.0) {
            return Err(KinemaError::validation("image sequence frame_rate must be > 0"));
        }
        Ok(Self::with_source(
            width,
            height,
            ImageSource::Frames { frames, frame_rate },
        ))
    }

    /// Process-wide unique id.
    pub fn unique_id(&self) -> u32 {
        self.unique_id
    }

    /// Width in pixels.
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> i32 {
        self.height
    }

    /// How the picture is fitted into a layer's content box.
    pub fn scale_mode(&self) -> ScaleMode {
        self.state.lock().scale_mode
    }

    /// Change the fit mode; `None` falls back to [`Image::matrix`].
    pub fn set_scale_mode(&self, mode: ScaleMode) {
        let mut state = self.state.lock();
        if state.scale_mode == mode {
            return;
        }
        state.scale_mode = mode;
        self.bump();
    }

    /// Placement matrix used when the scale mode is `None`.
    pub fn matrix(&self) -> Affine {
        self.state.lock().matrix
    }

    /// Set an explicit placement matrix and switch the scale mode to `None`.
    pub fn set_matrix(&self, matrix: Affine) {
        let mut state = self.state.lock();
        state.scale_mode = ScaleMode::None;
        state.matrix = matrix;
        self.bump();
    }

    /// Return `true` for single-frame pictures.
    pub fn is_still(&self) -> bool {
        match &self.source {
            ImageSource::Encoded { .. } => true,
            ImageSource::Frames { frames, .. } => frames.len() <= 1,
        }
    }

    /// Playback time of an image sequence, in microseconds.
    pub fn content_time(&self) -> i64 {
        self.state.lock().content_time
    }

    /// Number of microseconds the picture plays for; `0` for stills.
    pub fn duration(&self) -> i64 {
        match &self.source {
            ImageSource::Frames { frames, frame_rate } if frames.len() > 1 => {
                crate::foundation::core::frame_to_time(frames.len() as i64, *frame_rate)
            }
            _ => 0,
        }
    }

    pub(crate) fn owner(&self) -> Option<LayerId> {
        self.state.lock().owner
    }

    pub(crate) fn set_owner(&self, owner: LayerId) {
        self.state.lock().owner = Some(owner);
    }

    /// Move the sequence to `time`; returns `true` when the visible frame changed.
    ///
    /// Times past the end hold the last frame.
    pub(crate) fn set_content_time(&self, time: i64) -> bool {
        let ImageSource::Frames { frames, frame_rate } = &self.source else {
            return false;
        };
        let last = frames.len().saturating_sub(1) as i64;
        let index = time_to_frame(time, *frame_rate).clamp(0, last) as usize;
        let mut state = self.state.lock();
        state.content_time = time;
        if state.frame_index == index {
            return false;
        }
        state.frame_index = index;
        true
    }

    pub(crate) fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Pixels of the current frame, decoding on first use.
    pub(crate) fn pixels(&self) -> Option<ImagePixels> {
        match &self.source {
            ImageSource::Encoded { bytes, decoded } => decoded
                .get_or_init(|| match decode_premul(bytes) {
                    Ok(px) => Some(px),
                    Err(err) => {
                        tracing::warn!(image = self.unique_id, %err, "image decode failed");
                        None
                    }
                })
                .clone(),
            ImageSource::Frames { frames, .. } => {
                let index = self.state.lock().frame_index;
                frames.get(index).cloned()
            }
        }
    }

    /// Return `true` once the current frame can be drawn without decoding.
    pub(crate) fn is_decoded(&self) -> bool {
        match &self.source {
            ImageSource::Encoded { decoded, .. } => decoded.get().is_some(),
            ImageSource::Frames { .. } => true,
        }
    }

    pub(crate) fn byte_size(&self) -> usize {
        match &self.source {
            ImageSource::Encoded { decoded, .. } => decoded
                .get()
                .and_then(|d| d.as_ref())
                .map_or(0, |px| px.rgba8_premul.len()),
            ImageSource::Frames { frames, .. } => {
                frames.iter().map(|f| f.rgba8_premul.len()).sum()
            }
        }
    }

    fn bump(&self) {
        self.version.fetch_add(1, Ordering::AcqRel);
    }
}

fn decode_premul(bytes: &[u8]) -> KinemaResult<ImagePixels> {
    let img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut data = rgba.into_raw();
    premultiply_rgba8_in_place(&mut data);
    Ok(ImagePixels {
        width,
        height,
        rgba8_premul: Arc::new(data),
    })
}

fn checked_size(width: u32, height: u32) -> KinemaResult<(i32, i32)> {
    if width == 0 || height == 0 {
        return Err(KinemaError::validation("image size must be non-zero"));
    }
    let w = i32::try_from(width).map_err(|_| KinemaError::validation("image width overflows"))?;
    let h =
        i32::try_from(height).map_err(|_| KinemaError::validation("image height overflows"))?;
    Ok((w, h))
}

fn checked_pixels(width: u32, height: u32, rgba8_premul: Vec<u8>) -> KinemaResult<ImagePixels> {
    let expected = width as usize * height as usize * 4;
    if rgba8_premul.len() != expected {
        return Err(KinemaError::validation(format!(
            "expected {expected} pixel bytes for {width}x{height}, got {}",
            rgba8_premul.len()
        )));
    }
    Ok(ImagePixels {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    })
}

#[cfg(test)]
#[path = "../tests/unit/image.rs"]
mod tests;
