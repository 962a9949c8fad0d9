//! Kinema is a layer-timeline animation playback engine.
//!
//! Documents are loaded into runtime layer trees ([`FileComposition`]), which
//! can be edited, nested and re-timed, and are played by a [`Player`] into a
//! [`Surface`]:
//!
//! - Load a [`FileComposition`] or build layers by hand
//! - Create a [`Player`] and a [`Surface`] (the built-in software device
//!   comes from [`Engine::default_device`])
//! - Seek with [`Player::set_progress`] and draw with [`Player::flush`]
#![forbid(unsafe_code)]

pub mod animation;
mod config;
pub mod document;
pub mod foundation;
mod image;
/// Runtime layer trees and their handles.
pub mod layer;
mod player;
/// Rendering backends, drawables and surfaces.
pub mod render;

pub use crate::config::{Engine, EngineConfig, PlayerOpts};
pub use crate::document::{File, FileDef, TimeStretchMode, TrackMatteType};
pub use crate::foundation::core::{Affine, Frame, Point, Rect, Rgba8, TimeRange, Vec2};
pub use crate::foundation::error::{KinemaError, KinemaResult};
pub use crate::image::{Image, ImagePixels};
pub use crate::layer::{
    Composition, FileComposition, ImageContent, ImageLayer, Layer, SolidLayer, TextLayer,
    VideoRange,
};
pub use crate::player::Player;
pub use crate::render::backend::{
    Backend, BackendRenderTarget, BackendSemaphore, BackendTexture, Device, GlFrameBufferInfo,
    GlTextureInfo, HardwareBuffer, MtlTextureInfo, VkImageInfo,
};
pub use crate::render::cache::FrameTelemetry;
pub use crate::render::cpu::{SoftwareContext, SoftwareControl};
pub use crate::render::scale::ScaleMode;
pub use crate::render::surface::Surface;
