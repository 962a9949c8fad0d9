use super::*;
use crate::render::backend::{BackendRenderTarget, BackendTexture, GlFrameBufferInfo, GlTextureInfo};

fn offscreen(ctx: &mut SoftwareContext, width: i32, height: i32) -> Box<dyn BackendSurface> {
    ctx.make_surface(&SurfaceTarget::Offscreen { width, height })
        .unwrap()
}

fn solid(x1: f64, y1: f64, color: Rgba8) -> Graphic {
    Graphic::Solid {
        rect: Rect::new(0.0, 0.0, x1, y1),
        color,
    }
}

fn pixel(surface: &dyn BackendSurface, x: usize, y: usize) -> [u8; 4] {
    let width = surface.width() as usize;
    let mut data = vec![0; width * surface.height() as usize * 4];
    assert!(surface.read_pixels(&mut data, width * 4));
    let i = (y * width + x) * 4;
    [data[i], data[i + 1], data[i + 2], data[i + 3]]
}

fn texture(id: u32) -> BackendTexture {
    BackendTexture::gl(
        GlTextureInfo {
            id,
            target: 0x0DE1,
            format: 0x8058,
        },
        2,
        2,
    )
}

const RED: Rgba8 = Rgba8::rgb(255, 0, 0);

#[test]
fn solids_fill_whole_pixels() {
    let mut ctx = SoftwareContext::new();
    let mut surface = offscreen(&mut ctx, 4, 4);
    assert_eq!((surface.width(), surface.height()), (4, 4));
    surface.draw(&solid(2.0, 4.0, RED));
    assert_eq!(pixel(&*surface, 0, 0), [255, 0, 0, 255]);
    assert_eq!(pixel(&*surface, 1, 3), [255, 0, 0, 255]);
    assert_eq!(pixel(&*surface, 3, 0), [0, 0, 0, 0]);
    assert!(surface.clear());
    assert!(!surface.clear());
    assert_eq!(pixel(&*surface, 0, 0), [0, 0, 0, 0]);
}

#[test]
fn sizes_must_fit_the_backend() {
    let mut ctx = SoftwareContext::new();
    let target = |width, height| SurfaceTarget::Offscreen { width, height };
    assert!(ctx.make_surface(&target(0, 4)).is_none());
    assert!(ctx.make_surface(&target(4, -1)).is_none());
    assert!(ctx.make_surface(&target(70_000, 1)).is_none());
    assert!(ctx.make_surface(&target(1, 1)).is_some());
}

#[test]
fn allocation_failures_can_be_forced() {
    let mut ctx = SoftwareContext::new();
    let control = ctx.control();
    control.set_fail_allocations(true);
    assert!(ctx.make_surface(&SurfaceTarget::Offscreen { width: 2, height: 2 }).is_none());
    control.set_fail_allocations(false);
    assert!(ctx.make_surface(&SurfaceTarget::Offscreen { width: 2, height: 2 }).is_some());
}

#[test]
fn textures_keep_their_pixels_across_shared_contexts() {
    let mut ctx = SoftwareContext::new();
    let control = ctx.control();
    let tex = texture(7);
    let mut surface = ctx.make_surface(&SurfaceTarget::Texture(tex)).unwrap();
    surface.draw(&solid(2.0, 2.0, RED));
    let stored = control.texture_pixels(&tex.handle).unwrap();
    assert_eq!(&stored[..4], &[255, 0, 0, 255]);

    let mut other = ctx.make_shared().unwrap();
    let again = other.make_surface(&SurfaceTarget::Texture(tex)).unwrap();
    assert_eq!(pixel(&*again, 1, 1), [255, 0, 0, 255]);
    assert!(control.texture_pixels(&texture(8).handle).is_none());
    assert!(ctx.make_surface(&SurfaceTarget::Texture(texture(0))).is_none());
}

#[test]
fn render_targets_share_storage_by_framebuffer() {
    let mut ctx = SoftwareContext::new();
    let target = SurfaceTarget::RenderTarget(BackendRenderTarget {
        framebuffer: GlFrameBufferInfo { id: 3, format: 0x8058 },
        width: 2,
        height: 2,
    });
    let mut first = ctx.make_surface(&target).unwrap();
    first.draw(&solid(1.0, 1.0, RED));
    let second = ctx.make_surface(&target).unwrap();
    assert_eq!(pixel(&*second, 0, 0), [255, 0, 0, 255]);
}

#[test]
fn purge_drops_unused_storage() {
    let mut ctx = SoftwareContext::new();
    let control = ctx.control();
    let tex = texture(9);
    let surface = ctx.make_surface(&SurfaceTarget::Texture(tex)).unwrap();
    ctx.purge();
    assert!(control.texture_pixels(&tex.handle).is_some());
    drop(surface);
    ctx.purge();
    assert!(control.texture_pixels(&tex.handle).is_none());
}

#[test]
fn semaphores_need_sync_support() {
    let mut plain = SoftwareContext::new();
    assert!(plain.insert_signal().is_none());
    assert!(!plain.wait_semaphore(&BackendSemaphore::gl(4)));

    let mut ctx = SoftwareContext::new().with_sync(true);
    let control = ctx.control();
    let first = ctx.insert_signal().unwrap();
    let second = ctx.insert_signal().unwrap();
    assert!(first.is_initialized());
    assert_ne!(first.gl_sync(), second.gl_sync());
    assert_eq!(control.signals_inserted(), 2);

    assert!(!ctx.wait_semaphore(&BackendSemaphore::default()));
    assert!(ctx.wait_semaphore(&first));
    assert_eq!(control.waits_accepted(), 1);
}

#[test]
fn read_pixels_honors_row_stride() {
    let mut ctx = SoftwareContext::new();
    let mut surface = offscreen(&mut ctx, 2, 2);
    surface.draw(&solid(2.0, 2.0, RED));
    let mut padded = vec![0u8; 12 + 8];
    assert!(surface.read_pixels(&mut padded, 12));
    assert_eq!(&padded[12..16], &[255, 0, 0, 255]);
    assert_eq!(&padded[8..12], &[0, 0, 0, 0]);
    assert!(!surface.read_pixels(&mut padded, 4));
    assert!(!surface.read_pixels(&mut [0u8; 10], 8));
}

#[test]
fn hit_tests_sample_one_pixel() {
    let mut ctx = SoftwareContext::new();
    let surface = offscreen(&mut ctx, 4, 4);
    let graphic = solid(2.0, 2.0, RED);
    assert!(surface.hit_test(&graphic, 1.5, 1.0));
    assert!(!surface.hit_test(&graphic, 3.0, 3.0));
    assert!(!surface.hit_test(&Graphic::Empty, 0.0, 0.0));
}

#[test]
fn clips_and_mattes_mask_content() {
    let mut ctx = SoftwareContext::new();
    let mut surface = offscreen(&mut ctx, 4, 4);
    surface.draw(&Graphic::Clip {
        rect: Rect::new(0.0, 0.0, 1.0, 1.0),
        content: Box::new(solid(4.0, 4.0, RED)),
    });
    assert!(pixel(&*surface, 0, 0)[3] >= 250);
    assert_eq!(pixel(&*surface, 2, 2)[3], 0);

    surface.clear();
    surface.draw(&Graphic::Matte {
        content: Box::new(solid(4.0, 4.0, RED)),
        matte: Box::new(solid(2.0, 4.0, Rgba8::rgb(0, 0, 0))),
        kind: TrackMatteType::AlphaInverted,
    });
    assert_eq!(pixel(&*surface, 0, 0)[3], 0);
    let [r, g, _, a] = pixel(&*surface, 3, 0);
    assert!(r >= 250 && a >= 250 && g == 0, "{r} {a}");
}

#[test]
fn group_alpha_scales_coverage() {
    let mut ctx = SoftwareContext::new();
    let mut surface = offscreen(&mut ctx, 2, 2);
    surface.draw(&Graphic::Transform {
        matrix: Affine::translate((1.0, 0.0)),
        alpha: 0.5,
        content: Box::new(solid(1.0, 2.0, RED)),
    });
    let [r, _, _, a] = pixel(&*surface, 1, 0);
    assert!((i32::from(a) - 128).abs() <= 1, "{a}");
    assert!((i32::from(r) - i32::from(a)).abs() <= 1, "{r} {a}");
    assert_eq!(pixel(&*surface, 0, 0)[3], 0);
}

#[test]
fn pictures_draw_their_pixels() {
    let mut ctx = SoftwareContext::new();
    let mut surface = offscreen(&mut ctx, 1, 1);
    let image = crate::image::Image::from_pixels(1, 1, vec![0, 255, 0, 255]).unwrap();
    surface.draw(&Graphic::Picture {
        image,
        width: 1,
        height: 1,
        matrix: Affine::IDENTITY,
    });
    let [r, g, _, a] = pixel(&*surface, 0, 0);
    assert_eq!(r, 0);
    assert!(g > 200 && a > 200, "{g} {a}");
}
