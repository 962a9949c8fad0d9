//! Process-wide engine configuration and the engine object that carries it.
//!
//! Settings that are global in nature (fallback fonts, disk cache limits,
//! decoder counts) live in an [`EngineConfig`] handed to [`Engine::new`] once
//! at startup, and everything created through the engine inherits them.

use crate::foundation::error::{KinemaError, KinemaResult};
use crate::player::Player;
use crate::render::backend::Device;
use crate::render::cpu::SoftwareContext;
use crate::render::scale::ScaleMode;
use crate::render::surface::Surface;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Defaults applied to every player made by an [`Engine`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerOpts {
    /// Keep decoded images alive between frames.
    pub cache_enabled: bool,
    /// Draw image sequences; when off only still images are drawn.
    pub video_enabled: bool,
    /// Scale applied to cached assets, in `(0, 1]`.
    pub cache_scale: f32,
    /// Upper bound of the playback frame rate.
    pub max_frame_rate: f32,
    /// How the composition is fitted into the surface.
    pub scale_mode: ScaleMode,
    /// Clear the surface before every frame.
    pub auto_clear: bool,
}

impl Default for PlayerOpts {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            video_enabled: true,
            cache_scale: 1.0,
            max_frame_rate: 60.0,
            scale_mode: ScaleMode::LetterBox,
            auto_clear: true,
        }
    }
}

/// Engine-wide settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Font families tried when a text layer's font is missing.
    pub fallback_font_names: Vec<String>,
    /// Upper bound of the on-disk asset cache.
    pub disk_cache_max_bytes: u64,
    /// Hardware video decoders that may be open at once.
    pub max_hardware_decoders: u32,
    /// Let the built-in software device signal and wait on semaphores.
    pub software_sync: bool,
    pub player: PlayerOpts,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fallback_font_names: Vec::new(),
            disk_cache_max_bytes: 1024 * 1024 * 1024,
            max_hardware_decoders: 4,
            software_sync: false,
            player: PlayerOpts::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a JSON configuration; missing fields take their defaults.
    pub fn from_reader<R: std::io::Read>(r: R) -> KinemaResult<Self> {
        serde_json::from_reader(r)
            .map_err(|e| KinemaError::decode(format!("parse engine config JSON: {e}")))
    }

    pub fn from_path(path: impl AsRef<Path>) -> KinemaResult<Self> {
        let path = path.as_ref();
        let f = std::fs::File::open(path).map_err(|e| {
            KinemaError::io(format!("open engine config '{}': {e}", path.display()))
        })?;
        Self::from_reader(std::io::BufReader::new(f))
    }
}

/// The process-wide engine: configuration plus the lazily created default device.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    device: Mutex<Option<Arc<Device>>>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Arc<Self> {
        tracing::debug!(
            fallback_fonts = config.fallback_font_names.len(),
            disk_cache_max_bytes = config.disk_cache_max_bytes,
            max_hardware_decoders = config.max_hardware_decoders,
            software_sync = config.software_sync,
            "engine created"
        );
        Arc::new(Self {
            config,
            device: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Font families a text shaper should try, in order.
    ///
    /// Kinema has no text layers of its own; the list is carried for the
    /// font collaborator the host plugs in.
    pub fn fallback_font_names(&self) -> &[String] {
        &self.config.fallback_font_names
    }

    /// Size limit for the host's on-disk asset cache.
    pub fn disk_cache_max_bytes(&self) -> u64 {
        self.config.disk_cache_max_bytes
    }

    /// Decoder budget for the host's video collaborator.
    pub fn max_hardware_decoders(&self) -> u32 {
        self.config.max_hardware_decoders
    }

    /// The shared default device, created on first use.
    ///
    /// Without a platform GPU device this is the built-in software device.
    pub fn default_device(&self) -> Arc<Device> {
        let mut device = self.device.lock();
        Arc::clone(device.get_or_insert_with(|| {
            let context = SoftwareContext::new().with_sync(self.config.software_sync);
            Device::new(Box::new(context))
        }))
    }

    /// An offscreen surface on the default device.
    pub fn make_offscreen_surface(&self, width: i32, height: i32) -> Option<Arc<Surface>> {
        Surface::make_offscreen(&self.default_device(), width, height)
    }

    /// A player configured with this engine's player defaults.
    pub fn make_player(&self) -> Player {
        Player::with_opts(&self.config.player)
    }

    /// Release the default device; surfaces already made keep their own reference.
    pub fn shutdown(&self) {
        if self.device.lock().take().is_some() {
            tracing::debug!("default device released");
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
