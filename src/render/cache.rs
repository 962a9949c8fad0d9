//! Per-player render cache: pre-decoded images and frame telemetry.

use crate::image::Image;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Timings of the most recent frame, in microseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameTelemetry {
    /// Recording the graphic and drawing it.
    pub rendering_time: i64,
    /// Decoding images ahead of drawing.
    pub image_decoding_time: i64,
    /// Flushing and presenting the surface.
    pub presenting_time: i64,
}

fn micros(d: Duration) -> i64 {
    i64::try_from(d.as_micros()).unwrap_or(i64::MAX)
}

#[derive(Debug)]
pub(crate) struct RenderCache {
    pub(crate) cache_enabled: bool,
    pub(crate) video_enabled: bool,
    /// Decoded images kept alive between frames, keyed by image id.
    prepared: HashMap<u32, Arc<Image>>,
    telemetry: FrameTelemetry,
}

impl RenderCache {
    pub(crate) fn new(cache_enabled: bool, video_enabled: bool) -> Self {
        Self {
            cache_enabled,
            video_enabled,
            prepared: HashMap::new(),
            telemetry: FrameTelemetry::default(),
        }
    }

    /// Forget assets that left the stage and reset the frame timings.
    pub(crate) fn begin_frame(&mut self, removed_assets: &HashSet<u32>) {
        self.prepared.retain(|id, _| !removed_assets.contains(id));
        self.telemetry = FrameTelemetry::default();
    }

    /// Decode every image of the next frame that is not decoded yet, in parallel.
    pub(crate) fn prepare_images(&mut self, images: &[Arc<Image>]) {
        let pending: Vec<&Arc<Image>> = images.iter().filter(|i| !i.is_decoded()).collect();
        if !pending.is_empty() {
            let t0 = Instant::now();
            let decoded = pending
                .par_iter()
                .filter(|image| image.pixels().is_some())
                .count();
            let elapsed = micros(t0.elapsed());
            self.telemetry.image_decoding_time += elapsed;
            tracing::trace!(decoded, pending = pending.len(), elapsed, "images decoded");
        }
        if self.cache_enabled {
            for image in images {
                self.prepared
                    .entry(image.unique_id())
                    .or_insert_with(|| Arc::clone(image));
            }
        }
    }

    pub(crate) fn add_rendering_time(&mut self, elapsed: Duration) {
        self.telemetry.rendering_time += micros(elapsed);
    }

    pub(crate) fn add_presenting_time(&mut self, elapsed: Duration) {
        self.telemetry.presenting_time += micros(elapsed);
    }

    pub(crate) fn telemetry(&self) -> FrameTelemetry {
        self.telemetry
    }

    /// Drop every cached image.
    pub(crate) fn release_all(&mut self) {
        self.prepared.clear();
    }

    /// Bytes held by cached decoded images.
    pub(crate) fn memory_usage(&self) -> usize {
        self.prepared.values().map(|i| i.byte_size()).sum()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/cache.rs"]
mod tests;
