//! Drawables: the render destinations a [`Surface`](crate::Surface) draws into.
//!
//! A drawable lazily creates its backend surface through the device context
//! and caches it until [`Drawable::free_surface`] or a size change.

use crate::foundation::ids::next_unique_id;
use crate::render::backend::{
    BackendRenderTarget, BackendSurface, BackendTexture, Context, Device,
    HardwareBuffer, SurfaceTarget, TextureHandle,
};
use std::sync::Arc;

/// A render destination backed by a device.
pub trait Drawable: Send {
    fn width(&self) -> i32;

    fn height(&self) -> i32;

    fn device(&self) -> Arc<Device>;

    /// Cached backend surface slot.
    fn surface_slot(&mut self) -> &mut Option<Box<dyn BackendSurface>>;

    /// Create the backend surface; `None` when the backend refuses.
    fn on_create_surface(&mut self, context: &mut dyn Context) -> Option<Box<dyn BackendSurface>>;

    /// Re-read the destination size; drops the cached surface.
    fn update_size(&mut self) {
        self.free_surface();
    }

    /// Hand the finished frame to the destination.
    fn present(&mut self, _context: &mut dyn Context) {}

    /// Presentation time of the next frame, in microseconds.
    fn set_time_stamp(&mut self, _time: i64) {}

    fn free_surface(&mut self) {
        *self.surface_slot() = None;
    }

    /// The cached backend surface, created on demand unless `query_only`.
    fn surface(
        &mut self,
        context: &mut dyn Context,
        query_only: bool,
    ) -> Option<&mut Box<dyn BackendSurface>> {
        if self.surface_slot().is_none() && !query_only {
            let created = self.on_create_surface(context);
            *self.surface_slot() = created;
        }
        self.surface_slot().as_mut()
    }

    /// Backend surface holding the last presented frame; never allocates.
    fn front_surface(&mut self) -> Option<&mut Box<dyn BackendSurface>> {
        self.surface_slot().as_mut()
    }

    /// Texture holding the last presented frame, for texture-backed drawables.
    fn front_texture(&self) -> Option<BackendTexture> {
        None
    }

    /// Texture the next frame is rendered into, for texture-backed drawables.
    fn back_texture(&self) -> Option<BackendTexture> {
        None
    }
}

/// Draws into a client framebuffer.
pub struct RenderTargetDrawable {
    device: Arc<Device>,
    target: BackendRenderTarget,
    surface: Option<Box<dyn BackendSurface>>,
}

impl RenderTargetDrawable {
    pub fn new(device: Arc<Device>, target: BackendRenderTarget) -> Option<Self> {
        if !target.is_valid() {
            return None;
        }
        Some(Self {
            device,
            target,
            surface: None,
        })
    }
}

impl Drawable for RenderTargetDrawable {
    fn width(&self) -> i32 {
        self.target.width
    }

    fn height(&self) -> i32 {
        self.target.height
    }

    fn device(&self) -> Arc<Device> {
        Arc::clone(&self.device)
    }

    fn surface_slot(&mut self) -> &mut Option<Box<dyn BackendSurface>> {
        &mut self.surface
    }

    fn on_create_surface(&mut self, context: &mut dyn Context) -> Option<Box<dyn BackendSurface>> {
        context.make_surface(&SurfaceTarget::RenderTarget(self.target))
    }
}

/// Draws into a client texture.
///
/// In double-buffered mode the drawable owns a second texture of the same
/// size; frames render into the back texture and `present` swaps the two.
pub struct TextureDrawable {
    device: Arc<Device>,
    textures: [BackendTexture; 2],
    surfaces: [Option<Box<dyn BackendSurface>>; 2],
    front: usize,
    double_buffered: bool,
    time_stamp: i64,
}

impl TextureDrawable {
    pub fn new(device: Arc<Device>, texture: BackendTexture, double_buffered: bool) -> Option<Self> {
        if !texture.is_valid() {
            return None;
        }
        let back = if double_buffered {
            BackendTexture {
                handle: TextureHandle::Internal(next_unique_id()),
                ..texture
            }
        } else {
            texture
        };
        Some(Self {
            device,
            textures: [texture, back],
            surfaces: [None, None],
            front: 0,
            double_buffered,
            time_stamp: 0,
        })
    }

    fn back(&self) -> usize {
        if self.double_buffered { 1 - self.front } else { self.front }
    }

    /// Presentation time of the frame most recently presented.
    pub fn time_stamp(&self) -> i64 {
        self.time_stamp
    }
}

impl Drawable for TextureDrawable {
    fn width(&self) -> i32 {
        self.textures[0].width
    }

    fn height(&self) -> i32 {
        self.textures[0].height
    }

    fn device(&self) -> Arc<Device> {
        Arc::clone(&self.device)
    }

    fn surface_slot(&mut self) -> &mut Option<Box<dyn BackendSurface>> {
        let back = self.back();
        &mut self.surfaces[back]
    }

    fn on_create_surface(&mut self, context: &mut dyn Context) -> Option<Box<dyn BackendSurface>> {
        context.make_surface(&SurfaceTarget::Texture(self.textures[self.back()]))
    }

    fn front_surface(&mut self) -> Option<&mut Box<dyn BackendSurface>> {
        self.surfaces[self.front].as_mut()
    }

    fn update_size(&mut self) {
        self.surfaces = [None, None];
    }

    fn free_surface(&mut self) {
        self.surfaces = [None, None];
    }

    fn present(&mut self, _context: &mut dyn Context) {
        if self.double_buffered {
            self.front = 1 - self.front;
        }
    }

    fn set_time_stamp(&mut self, time: i64) {
        self.time_stamp = time;
    }

    fn front_texture(&self) -> Option<BackendTexture> {
        Some(self.textures[self.front])
    }

    fn back_texture(&self) -> Option<BackendTexture> {
        Some(self.textures[self.back()])
    }
}

/// Draws into storage owned by the backend.
pub struct OffscreenDrawable {
    device: Arc<Device>,
    width: i32,
    height: i32,
    surface: Option<Box<dyn BackendSurface>>,
}

impl OffscreenDrawable {
    pub fn new(device: Arc<Device>, width: i32, height: i32) -> Option<Self> {
        if width <= 0 || height <= 0 {
            return None;
        }
        Some(Self {
            device,
            width,
            height,
            surface: None,
        })
    }
}

impl Drawable for OffscreenDrawable {
    fn width(&self) -> i32 {
        self.width
    }

    fn height(&self) -> i32 {
        self.height
    }

    fn device(&self) -> Arc<Device> {
        Arc::clone(&self.device)
    }

    fn surface_slot(&mut self) -> &mut Option<Box<dyn BackendSurface>> {
        &mut self.surface
    }

    fn on_create_surface(&mut self, context: &mut dyn Context) -> Option<Box<dyn BackendSurface>> {
        context.make_surface(&SurfaceTarget::Offscreen {
            width: self.width,
            height: self.height,
        })
    }

    // The backing store never changes size, so the cached surface stays valid.
    fn update_size(&mut self) {}
}

/// Draws into a platform hardware buffer.
pub struct HardwareBufferDrawable {
    device: Arc<Device>,
    buffer: HardwareBuffer,
    surface: Option<Box<dyn BackendSurface>>,
    time_stamp: i64,
}

impl HardwareBufferDrawable {
    pub fn new(device: Arc<Device>, buffer: HardwareBuffer) -> Option<Self> {
        if buffer.width <= 0 || buffer.height <= 0 {
            return None;
        }
        Some(Self {
            device,
            buffer,
            surface: None,
            time_stamp: 0,
        })
    }

    pub fn time_stamp(&self) -> i64 {
        self.time_stamp
    }
}

impl Drawable for HardwareBufferDrawable {
    fn width(&self) -> i32 {
        self.buffer.width
    }

    fn height(&self) -> i32 {
        self.buffer.height
    }

    fn device(&self) -> Arc<Device> {
        Arc::clone(&self.device)
    }

    fn surface_slot(&mut self) -> &mut Option<Box<dyn BackendSurface>> {
        &mut self.surface
    }

    fn on_create_surface(&mut self, context: &mut dyn Context) -> Option<Box<dyn BackendSurface>> {
        context.make_surface(&SurfaceTarget::HardwareBuffer(self.buffer))
    }

    fn set_time_stamp(&mut self, time: i64) {
        self.time_stamp = time;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/drawable.rs"]
mod tests;
