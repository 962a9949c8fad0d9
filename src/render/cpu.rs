//! Software backend powered by `vello_cpu`.
//!
//! Client textures, render targets and hardware buffers are emulated by pixel
//! storage keyed by their handle ids, so a texture keeps its content between
//! surface recreations and can be shared by contexts made with
//! [`Context::make_shared`].

use crate::document::model::TrackMatteType;
use crate::foundation::core::{Affine, Rect, Rgba8};
use crate::foundation::ids::next_unique_id;
use crate::foundation::math::{matte_apply_rgba8_premul, premul_over_in_place};
use crate::image::ImagePixels;
use crate::render::backend::{
    Backend, BackendSemaphore, BackendSurface, Context, SurfaceTarget, TextureHandle,
};
use crate::render::graphic::Graphic;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum StorageKey {
    Texture(u64),
    Internal(u32),
    RenderTarget(u32),
    HardwareBuffer(u64),
    Offscreen(u32),
}

#[derive(Debug)]
struct PixelBuffer {
    width: u16,
    height: u16,
    data: Vec<u8>,
}

impl PixelBuffer {
    fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            data: vec![0; usize::from(width) * usize::from(height) * 4],
        }
    }
}

type SharedBuffer = Arc<Mutex<PixelBuffer>>;

#[derive(Debug, Default)]
struct Shared {
    store: Mutex<HashMap<StorageKey, SharedBuffer>>,
    fail_allocations: AtomicBool,
    next_sync: AtomicUsize,
    signals: AtomicU64,
    waits: AtomicU64,
}

/// Test and tooling hooks into a software context family.
#[derive(Clone, Debug)]
pub struct SoftwareControl {
    shared: Arc<Shared>,
}

impl SoftwareControl {
    /// Make every later surface allocation fail, emulating device loss.
    pub fn set_fail_allocations(&self, fail: bool) {
        self.shared.fail_allocations.store(fail, Ordering::Release);
    }

    /// Premultiplied RGBA8 content of a client texture, if it was ever drawn to.
    pub fn texture_pixels(&self, handle: &TextureHandle) -> Option<Vec<u8>> {
        let store = self.shared.store.lock();
        let buffer = store.get(&texture_key(handle))?;
        Some(buffer.lock().data.clone())
    }

    /// Number of sync objects inserted so far.
    pub fn signals_inserted(&self) -> u64 {
        self.shared.signals.load(Ordering::Acquire)
    }

    /// Number of semaphores accepted by `wait_semaphore` so far.
    pub fn waits_accepted(&self) -> u64 {
        self.shared.waits.load(Ordering::Acquire)
    }
}

/// CPU implementation of [`Context`].
#[derive(Debug)]
pub struct SoftwareContext {
    shared: Arc<Shared>,
    sync: bool,
}

impl Default for SoftwareContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareContext {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            sync: false,
        }
    }

    /// Advertise emulated sync objects, so semaphores can be signaled and waited on.
    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    pub fn control(&self) -> SoftwareControl {
        SoftwareControl {
            shared: Arc::clone(&self.shared),
        }
    }

    fn buffer_for(&self, key: StorageKey, width: u16, height: u16) -> SharedBuffer {
        let mut store = self.shared.store.lock();
        let buffer = store
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(PixelBuffer::new(width, height))));
        {
            let mut px = buffer.lock();
            if px.width != width || px.height != height {
                *px = PixelBuffer::new(width, height);
            }
        }
        Arc::clone(buffer)
    }
}

fn texture_key(handle: &TextureHandle) -> StorageKey {
    match handle {
        TextureHandle::Gl(info) => StorageKey::Texture(u64::from(info.id)),
        TextureHandle::Metal(info) => StorageKey::Texture(info.texture as u64),
        TextureHandle::Vulkan(info) => StorageKey::Texture(info.image as u64),
        TextureHandle::Internal(id) => StorageKey::Internal(*id),
    }
}

fn checked_dims(width: i32, height: i32) -> Option<(u16, u16)> {
    let w = u16::try_from(width).ok().filter(|w| *w > 0)?;
    let h = u16::try_from(height).ok().filter(|h| *h > 0)?;
    Some((w, h))
}

impl Context for SoftwareContext {
    fn backend(&self) -> Backend {
        Backend::Software
    }

    fn make_surface(&mut self, target: &SurfaceTarget) -> Option<Box<dyn BackendSurface>> {
        if self.shared.fail_allocations.load(Ordering::Acquire) {
            tracing::warn!("software surface allocation failed");
            return None;
        }
        let (key, width, height) = match target {
            SurfaceTarget::RenderTarget(rt) => {
                (StorageKey::RenderTarget(rt.framebuffer.id), rt.width, rt.height)
            }
            SurfaceTarget::Texture(tex) => {
                if !tex.is_valid() {
                    return None;
                }
                (texture_key(&tex.handle), tex.width, tex.height)
            }
            SurfaceTarget::HardwareBuffer(hb) => {
                (StorageKey::HardwareBuffer(hb.id), hb.width, hb.height)
            }
            SurfaceTarget::Offscreen { width, height } => {
                (StorageKey::Offscreen(next_unique_id()), *width, *height)
            }
        };
        let Some((w, h)) = checked_dims(width, height) else {
            tracing::warn!(width, height, "software surface size out of range");
            return None;
        };
        let buffer = match key {
            StorageKey::Offscreen(_) => Arc::new(Mutex::new(PixelBuffer::new(w, h))),
            _ => self.buffer_for(key, w, h),
        };
        tracing::debug!(?key, width, height, "software surface created");
        Some(Box::new(SoftwareSurface { buffer }))
    }

    fn wait_semaphore(&mut self, semaphore: &BackendSemaphore) -> bool {
        if !self.sync || !semaphore.is_initialized() {
            return false;
        }
        self.shared.waits.fetch_add(1, Ordering::AcqRel);
        true
    }

    fn insert_signal(&mut self) -> Option<BackendSemaphore> {
        if !self.sync {
            return None;
        }
        let sync = self.shared.next_sync.fetch_add(1, Ordering::AcqRel) + 1;
        self.shared.signals.fetch_add(1, Ordering::AcqRel);
        Some(BackendSemaphore::gl(sync))
    }

    fn purge(&mut self) {
        self.shared
            .store
            .lock()
            .retain(|_, buffer| Arc::strong_count(buffer) > 1);
    }

    fn make_shared(&self) -> Option<Box<dyn Context>> {
        Some(Box::new(Self {
            shared: Arc::clone(&self.shared),
            sync: self.sync,
        }))
    }
}

/// A surface drawing into shared CPU pixel storage.
struct SoftwareSurface {
    buffer: SharedBuffer,
}

impl BackendSurface for SoftwareSurface {
    fn width(&self) -> i32 {
        i32::from(self.buffer.lock().width)
    }

    fn height(&self) -> i32 {
        i32::from(self.buffer.lock().height)
    }

    fn clear(&mut self) -> bool {
        let mut px = self.buffer.lock();
        let changed = px.data.iter().any(|b| *b != 0);
        px.data.fill(0);
        changed
    }

    fn draw(&mut self, graphic: &Graphic) {
        if graphic.is_empty() {
            return;
        }
        let mut px = self.buffer.lock();
        let layer = rasterize(graphic, Affine::IDENTITY, px.width, px.height);
        premul_over_in_place(&mut px.data, layer.data_as_u8_slice());
    }

    fn flush(&mut self) {}

    fn read_pixels(&self, dst: &mut [u8], row_bytes: usize) -> bool {
        let px = self.buffer.lock();
        let src_row = usize::from(px.width) * 4;
        let rows = usize::from(px.height);
        if row_bytes < src_row || dst.len() < row_bytes * (rows - 1) + src_row {
            return false;
        }
        for (y, row) in px.data.chunks_exact(src_row).enumerate() {
            let start = y * row_bytes;
            dst[start..start + src_row].copy_from_slice(row);
        }
        true
    }

    fn hit_test(&self, graphic: &Graphic, x: f64, y: f64) -> bool {
        if graphic.is_empty() {
            return false;
        }
        let sample = rasterize(graphic, Affine::translate((-x.floor(), -y.floor())), 1, 1);
        sample.data_as_u8_slice()[3] > 0
    }
}

/// Render `graphic` placed by `matrix` into a fresh transparent pixmap.
fn rasterize(graphic: &Graphic, matrix: Affine, width: u16, height: u16) -> vello_cpu::Pixmap {
    let mut ctx = vello_cpu::RenderContext::new(width, height);
    paint(&mut ctx, graphic, matrix, 1.0, width, height);
    let mut pixmap = vello_cpu::Pixmap::new(width, height);
    ctx.flush();
    ctx.render_to_pixmap(&mut pixmap);
    pixmap
}

fn paint(
    ctx: &mut vello_cpu::RenderContext,
    graphic: &Graphic,
    matrix: Affine,
    alpha: f32,
    width: u16,
    height: u16,
) {
    match graphic {
        Graphic::Empty => {}
        Graphic::Solid { rect, color } => {
            ctx.set_transform(affine_to_cpu(matrix));
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                color.r, color.g, color.b, color.a,
            ));
            fill_with_opacity(ctx, *rect, alpha);
        }
        Graphic::Picture {
            image,
            matrix: fit,
            ..
        } => {
            let Some(pixels) = image.pixels() else {
                return;
            };
            let Some(paint) = image_paint(&pixels) else {
                return;
            };
            ctx.set_transform(affine_to_cpu(matrix * *fit));
            ctx.set_paint(paint);
            let rect = Rect::new(0.0, 0.0, f64::from(pixels.width), f64::from(pixels.height));
            fill_with_opacity(ctx, rect, alpha);
        }
        Graphic::Group(children) => {
            for child in children {
                paint(ctx, child, matrix, alpha, width, height);
            }
        }
        Graphic::Transform {
            matrix: local,
            alpha: local_alpha,
            content,
        } => paint(ctx, content, matrix * *local, alpha * local_alpha, width, height),
        Graphic::Clip { rect, content } => {
            let mask = Graphic::Solid {
                rect: *rect,
                color: Rgba8::rgb(255, 255, 255),
            };
            let layer = masked(content, &mask, TrackMatteType::Alpha, matrix, width, height);
            draw_layer(ctx, layer, alpha, width, height);
        }
        Graphic::Matte {
            content,
            matte,
            kind,
        } => {
            let layer = masked(content, matte, *kind, matrix, width, height);
            draw_layer(ctx, layer, alpha, width, height);
        }
    }
}

/// Rasterize `content` and weight it by the rasterized `matte`.
fn masked(
    content: &Graphic,
    matte: &Graphic,
    kind: TrackMatteType,
    matrix: Affine,
    width: u16,
    height: u16,
) -> Vec<u8> {
    let src = rasterize(content, matrix, width, height);
    let weights = rasterize(matte, matrix, width, height);
    let mut out = vec![0; src.data_as_u8_slice().len()];
    let luma = matches!(kind, TrackMatteType::Luma | TrackMatteType::LumaInverted);
    matte_apply_rgba8_premul(
        src.data_as_u8_slice(),
        weights.data_as_u8_slice(),
        &mut out,
        luma,
        kind.is_inverted(),
    );
    out
}

fn draw_layer(ctx: &mut vello_cpu::RenderContext, layer: Vec<u8>, alpha: f32, width: u16, height: u16) {
    let Some(pixmap) = pixmap_from_premul_bytes(&layer, width, height) else {
        return;
    };
    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    ctx.set_paint(vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    });
    let rect = Rect::new(0.0, 0.0, f64::from(width), f64::from(height));
    fill_with_opacity(ctx, rect, alpha);
}

fn fill_with_opacity(ctx: &mut vello_cpu::RenderContext, rect: Rect, alpha: f32) {
    if alpha < 1.0 {
        ctx.push_opacity_layer(alpha);
    }
    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(rect.x0, rect.y0, rect.x1, rect.y1));
    if alpha < 1.0 {
        ctx.pop_layer();
    }
}

fn image_paint(pixels: &ImagePixels) -> Option<vello_cpu::Image> {
    let w = u16::try_from(pixels.width).ok()?;
    let h = u16::try_from(pixels.height).ok()?;
    let pixmap = pixmap_from_premul_bytes(&pixels.rgba8_premul, w, h)?;
    Some(vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    })
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn pixmap_from_premul_bytes(bytes: &[u8], width: u16, height: u16) -> Option<vello_cpu::Pixmap> {
    if bytes.len() != usize::from(width) * usize::from(height) * 4 {
        return None;
    }
    let mut may_have_opacities = false;
    let pixels = bytes
        .chunks_exact(4)
        .map(|px| {
            may_have_opacities |= px[3] != 255;
            vello_cpu::peniko::color::PremulRgba8 {
                r: px[0],
                g: px[1],
                b: px[2],
                a: px[3],
            }
        })
        .collect();
    Some(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels,
        width,
        height,
        may_have_opacities,
    ))
}

#[cfg(test)]
#[path = "../../tests/unit/render/cpu.rs"]
mod tests;
