//! GPU backend contract consumed by surfaces and drawables.
//!
//! A [`Device`] owns one backend [`Context`] behind the GPU context lock.
//! That lock can only be taken with a [`RootToken`], so the root lock of a
//! layer tree is always acquired before it.

use crate::layer::tree::RootToken;
use crate::render::graphic::Graphic;
use parking_lot::{Mutex, MutexGuard};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Graphics API behind a context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Not known, or not initialized.
    #[default]
    Unknown,
    /// OpenGL or OpenGL ES.
    OpenGL,
    /// Apple Metal.
    Metal,
    /// Vulkan.
    Vulkan,
    /// The built-in CPU rasterizer.
    Software,
}

/// An OpenGL texture owned by the client.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct GlTextureInfo {
    /// Texture name.
    pub id: u32,
    /// Texture target, e.g. `GL_TEXTURE_2D`.
    pub target: u32,
    /// Sized internal format.
    pub format: u32,
}

/// An OpenGL framebuffer owned by the client.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct GlFrameBufferInfo {
    /// Framebuffer name.
    pub id: u32,
    /// Sized internal format of the color attachment.
    pub format: u32,
}

/// A Metal texture, as an opaque pointer-sized handle.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MtlTextureInfo {
    /// `id<MTLTexture>` handle.
    pub texture: usize,
}

/// A Vulkan image, as an opaque pointer-sized handle.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct VkImageInfo {
    /// `VkImage` handle.
    pub image: usize,
}

/// Native handle of a [`BackendTexture`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureHandle {
    Gl(GlTextureInfo),
    Metal(MtlTextureInfo),
    Vulkan(VkImageInfo),
    /// Storage the engine allocated itself, e.g. the second buffer of a
    /// double-buffered drawable. Ids never collide with client handles.
    Internal(u32),
}

/// A client texture a surface can render into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BackendTexture {
    pub handle: TextureHandle,
    pub width: i32,
    pub height: i32,
}

impl BackendTexture {
    pub fn gl(info: GlTextureInfo, width: i32, height: i32) -> Self {
        Self {
            handle: TextureHandle::Gl(info),
            width,
            height,
        }
    }

    pub fn backend(&self) -> Backend {
        match self.handle {
            TextureHandle::Gl(_) => Backend::OpenGL,
            TextureHandle::Metal(_) => Backend::Metal,
            TextureHandle::Vulkan(_) => Backend::Vulkan,
            TextureHandle::Internal(_) => Backend::Unknown,
        }
    }

    /// Return `true` when the texture has a size and a non-null handle.
    pub fn is_valid(&self) -> bool {
        let handle = match self.handle {
            TextureHandle::Gl(info) => info.id != 0,
            TextureHandle::Metal(info) => info.texture != 0,
            TextureHandle::Vulkan(info) => info.image != 0,
            TextureHandle::Internal(id) => id != 0,
        };
        handle && self.width > 0 && self.height > 0
    }
}

/// A client framebuffer a surface can render into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BackendRenderTarget {
    pub framebuffer: GlFrameBufferInfo,
    pub width: i32,
    pub height: i32,
}

impl BackendRenderTarget {
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// A platform hardware buffer shared between CPU and GPU.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HardwareBuffer {
    pub id: u64,
    pub width: i32,
    pub height: i32,
}

/// A GPU sync object, exchanged with the client.
///
/// An uninitialized semaphore carries no sync object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BackendSemaphore {
    backend: Backend,
    gl_sync: usize,
    initialized: bool,
}

impl BackendSemaphore {
    /// Wrap an OpenGL sync object.
    pub fn gl(sync: usize) -> Self {
        let mut semaphore = Self::default();
        semaphore.init_gl(sync);
        semaphore
    }

    pub fn init_gl(&mut self, sync: usize) {
        self.backend = Backend::OpenGL;
        self.gl_sync = sync;
        self.initialized = sync != 0;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn gl_sync(&self) -> usize {
        self.gl_sync
    }
}

/// Where a backend surface draws.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceTarget {
    RenderTarget(BackendRenderTarget),
    Texture(BackendTexture),
    HardwareBuffer(HardwareBuffer),
    /// Storage owned by the backend.
    Offscreen { width: i32, height: i32 },
}

/// A backend graphics context.
///
/// Every call happens with the owning [`Device`]'s context lock held.
pub trait Context: Send {
    fn backend(&self) -> Backend;

    /// Wrap `target` in a drawable surface; `None` when the backend refuses.
    fn make_surface(&mut self, target: &SurfaceTarget) -> Option<Box<dyn BackendSurface>>;

    /// Make later GPU work wait on `semaphore`.
    ///
    /// Returns `false` when the semaphore is uninitialized or waits are not
    /// supported; the caller then keeps ownership of the semaphore.
    fn wait_semaphore(&mut self, semaphore: &BackendSemaphore) -> bool;

    /// Insert a sync object after the submitted work, if supported.
    fn insert_signal(&mut self) -> Option<BackendSemaphore>;

    /// Drop cached GPU resources.
    fn purge(&mut self);

    /// A context sharing this one's resources, for use on another thread.
    fn make_shared(&self) -> Option<Box<dyn Context>>;
}

/// A drawable surface created by a [`Context`].
pub trait BackendSurface: Send {
    fn width(&self) -> i32;

    fn height(&self) -> i32;

    /// Erase to transparent; returns `true` when any pixel changed.
    fn clear(&mut self) -> bool;

    /// Draw `graphic` over the current content.
    fn draw(&mut self, graphic: &Graphic);

    /// Submit pending work.
    fn flush(&mut self);

    /// Copy the pixels as premultiplied RGBA8 rows of `row_bytes` bytes.
    fn read_pixels(&self, dst: &mut [u8], row_bytes: usize) -> bool;

    /// Return `true` when `graphic` covers the surface point `(x, y)`.
    fn hit_test(&self, graphic: &Graphic, x: f64, y: f64) -> bool;
}

/// A graphics device: one backend context plus its context lock.
pub struct Device {
    unique_id: u32,
    backend: Backend,
    context: Mutex<Box<dyn Context>>,
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("unique_id", &self.unique_id)
            .field("backend", &self.backend)
            .finish()
    }
}

/// Exclusive access to a device's context; released on drop.
pub(crate) struct ContextGuard<'a> {
    inner: MutexGuard<'a, Box<dyn Context>>,
}

impl Deref for ContextGuard<'_> {
    type Target = dyn Context;

    fn deref(&self) -> &(dyn Context + 'static) {
        &**self.inner
    }
}

impl DerefMut for ContextGuard<'_> {
    fn deref_mut(&mut self) -> &mut (dyn Context + 'static) {
        &mut **self.inner
    }
}

impl Device {
    pub fn new(context: Box<dyn Context>) -> Arc<Self> {
        Arc::new(Self {
            unique_id: crate::foundation::ids::next_unique_id(),
            backend: context.backend(),
            context: Mutex::new(context),
        })
    }

    pub fn unique_id(&self) -> u32 {
        self.unique_id
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Take the context lock; the token proves the root lock is already held.
    pub(crate) fn lock_context<'a>(&'a self, _root: &RootToken<'_>) -> ContextGuard<'a> {
        ContextGuard {
            inner: self.context.lock(),
        }
    }

    /// A device whose context shares this one's resources.
    pub fn make_shared(&self) -> Option<Arc<Device>> {
        let shared = self.context.lock().make_shared()?;
        Some(Self::new(shared))
    }
}
