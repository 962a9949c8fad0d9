//! The client-facing render surface.
//!
//! Every operation that reaches the device takes the root lock of the tree the
//! surface is bound to, then the surface state, then the device context.

use crate::layer::tree::{LayerArena, RootToken, TreeCell, TreeRef};
use crate::render::backend::{
    BackendRenderTarget, BackendSemaphore, BackendTexture, Device, HardwareBuffer,
};
use crate::render::drawable::{
    Drawable, HardwareBufferDrawable, OffscreenDrawable, RenderTargetDrawable, TextureDrawable,
};
use crate::render::graphic::Graphic;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

struct SurfaceState {
    drawable: Box<dyn Drawable>,
    /// Stage version of the last drawn frame; `0` forces a redraw.
    content_version: u64,
    bound: bool,
}

/// A render destination a [`Player`](crate::Player) draws into.
pub struct Surface {
    /// Root lock shared with the player's stage while bound.
    pub(crate) tree: TreeRef,
    state: Mutex<SurfaceState>,
}

impl fmt::Debug for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Surface")
            .field("width", &state.drawable.width())
            .field("height", &state.drawable.height())
            .field("bound", &state.bound)
            .finish()
    }
}

impl Surface {
    /// Wrap a custom drawable.
    pub fn make_from(drawable: Box<dyn Drawable>) -> Arc<Self> {
        Arc::new(Self {
            tree: TreeRef::new(LayerArena::new_tree()),
            state: Mutex::new(SurfaceState {
                drawable,
                content_version: 0,
                bound: false,
            }),
        })
    }

    pub fn make_from_render_target(
        device: &Arc<Device>,
        target: BackendRenderTarget,
    ) -> Option<Arc<Self>> {
        let drawable = RenderTargetDrawable::new(Arc::clone(device), target)?;
        Some(Self::make_from(Box::new(drawable)))
    }

    /// Draw into a client texture.
    ///
    /// With `for_async_thread` the surface renders through its own device,
    /// sharing `device`'s resources, and double-buffers the texture.
    pub fn make_from_texture(
        device: &Arc<Device>,
        texture: BackendTexture,
        for_async_thread: bool,
    ) -> Option<Arc<Self>> {
        let device = if for_async_thread {
            device.make_shared()?
        } else {
            Arc::clone(device)
        };
        let drawable = TextureDrawable::new(device, texture, for_async_thread)?;
        Some(Self::make_from(Box::new(drawable)))
    }

    pub fn make_from_hardware_buffer(
        device: &Arc<Device>,
        buffer: HardwareBuffer,
    ) -> Option<Arc<Self>> {
        let drawable = HardwareBufferDrawable::new(Arc::clone(device), buffer)?;
        Some(Self::make_from(Box::new(drawable)))
    }

    /// An offscreen surface; `None` when the size is invalid or allocation fails.
    pub fn make_offscreen(device: &Arc<Device>, width: i32, height: i32) -> Option<Arc<Self>> {
        let drawable = OffscreenDrawable::new(Arc::clone(device), width, height)?;
        let surface = Self::make_from(Box::new(drawable));
        let created = {
            let guard = surface.tree.lock();
            let token = guard.token();
            let mut state = surface.state.lock();
            let device = state.drawable.device();
            let mut context = device.lock_context(&token);
            state.drawable.surface(&mut *context, false).is_some()
        };
        if !created {
            tracing::warn!(width, height, "offscreen surface allocation failed");
            return None;
        }
        Some(surface)
    }

    pub fn width(&self) -> i32 {
        self.state.lock().drawable.width()
    }

    pub fn height(&self) -> i32 {
        self.state.lock().drawable.height()
    }

    /// Re-read the destination size after the client resized it.
    pub fn update_size(&self) {
        let _root = self.tree.lock();
        let mut state = self.state.lock();
        state.content_version = 0;
        state.drawable.update_size();
    }

    /// Erase to transparent; returns `true` when any pixel changed.
    pub fn clear_all(&self) -> bool {
        let guard = self.tree.lock();
        let token = guard.token();
        let mut state = self.state.lock();
        let device = state.drawable.device();
        let mut context = device.lock_context(&token);
        let Some(surface) = state.drawable.surface(&mut *context, false) else {
            return false;
        };
        let changed = surface.clear();
        surface.flush();
        state.drawable.present(&mut *context);
        state.content_version = 0;
        changed
    }

    /// Drop the backend surface and the bound player's caches.
    pub fn free_cache(&self) {
        let mut guard = self.tree.lock();
        if let Some(stage) = guard.stage_mut() {
            stage.player.cache.release_all();
        }
        let token = guard.token();
        let mut state = self.state.lock();
        let device = state.drawable.device();
        let mut context = device.lock_context(&token);
        state.drawable.free_surface();
        state.content_version = 0;
        context.purge();
        tracing::debug!("surface cache freed");
    }

    /// Copy the last frame as premultiplied RGBA8.
    ///
    /// Returns `false` when nothing was rendered yet or `dst` is too small.
    pub fn read_pixels(&self, dst: &mut [u8], row_bytes: usize) -> bool {
        let guard = self.tree.lock();
        let token = guard.token();
        let mut state = self.state.lock();
        let device = state.drawable.device();
        let _context = device.lock_context(&token);
        state
            .drawable
            .front_surface()
            .is_some_and(|s| s.read_pixels(dst, row_bytes))
    }

    pub fn front_texture(&self) -> Option<BackendTexture> {
        self.state.lock().drawable.front_texture()
    }

    pub fn back_texture(&self) -> Option<BackendTexture> {
        self.state.lock().drawable.back_texture()
    }

    pub(crate) fn is_bound(&self) -> bool {
        self.state.lock().bound
    }

    /// Share `tree`'s root lock unless another player already holds this surface.
    ///
    /// The bound flag is tested and set under one state lock.
    pub(crate) fn try_bind(&self, tree: &Arc<TreeCell>) -> bool {
        let mut state = self.state.lock();
        if state.bound {
            return false;
        }
        self.tree.set(Arc::clone(tree));
        state.bound = true;
        state.content_version = 0;
        true
    }

    /// Return to a private root lock.
    pub(crate) fn unbind(&self) {
        let mut state = self.state.lock();
        self.tree.set(LayerArena::new_tree());
        state.bound = false;
        state.content_version = 0;
    }

    /// Draw one frame.
    ///
    /// Returns `false` without touching the device when `version` was already
    /// drawn and no semaphore is requested, or when the backend surface
    /// cannot be created. A requested semaphore is left uninitialized when
    /// the backend cannot signal.
    pub(crate) fn draw(
        &self,
        token: &RootToken<'_>,
        graphic: &Graphic,
        version: u64,
        signal: Option<&mut BackendSemaphore>,
        auto_clear: bool,
        time_stamp: i64,
    ) -> bool {
        let mut state = self.state.lock();
        if state.content_version == version && signal.is_none() {
            return false;
        }
        let device = state.drawable.device();
        let mut context = device.lock_context(token);
        let Some(surface) = state.drawable.surface(&mut *context, false) else {
            return false;
        };
        if auto_clear {
            surface.clear();
        }
        surface.draw(graphic);
        surface.flush();
        if let Some(signal) = signal {
            *signal = context.insert_signal().unwrap_or_default();
        }
        state.drawable.set_time_stamp(time_stamp);
        state.drawable.present(&mut *context);
        state.content_version = version;
        true
    }

    pub(crate) fn hit_test(&self, token: &RootToken<'_>, graphic: &Graphic, x: f64, y: f64) -> bool {
        let mut state = self.state.lock();
        let device = state.drawable.device();
        let mut context = device.lock_context(token);
        state
            .drawable
            .surface(&mut *context, false)
            .is_some_and(|s| s.hit_test(graphic, x, y))
    }

    /// Queue a GPU wait on `semaphore` before the next frame.
    pub(crate) fn wait(&self, token: &RootToken<'_>, semaphore: &BackendSemaphore) -> bool {
        let mut state = self.state.lock();
        let device = state.drawable.device();
        let mut context = device.lock_context(token);
        if state.drawable.surface(&mut *context, false).is_none() {
            return false;
        }
        context.wait_semaphore(semaphore)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/surface.rs"]
mod tests;
