use super::*;
use crate::foundation::core::{Rect, Rgba8};
use crate::render::backend::{Backend, GlFrameBufferInfo, GlTextureInfo};
use crate::render::cpu::SoftwareContext;

fn device() -> Arc<Device> {
    Device::new(Box::new(SoftwareContext::new()))
}

fn red() -> Graphic {
    Graphic::Solid {
        rect: Rect::new(0.0, 0.0, 2.0, 2.0),
        color: Rgba8::rgb(255, 0, 0),
    }
}

fn draw(surface: &Surface, version: u64, signal: Option<&mut BackendSemaphore>) -> bool {
    let guard = surface.tree.lock();
    let token = guard.token();
    surface.draw(&token, &red(), version, signal, true, 0)
}

fn first_pixel(surface: &Surface) -> Option<[u8; 4]> {
    let width = surface.width() as usize;
    let mut data = vec![0; width * surface.height() as usize * 4];
    surface
        .read_pixels(&mut data, width * 4)
        .then(|| [data[0], data[1], data[2], data[3]])
}

#[test]
fn offscreen_surfaces_allocate_eagerly() {
    assert!(Surface::make_offscreen(&device(), 0, 4).is_none());

    let ctx = SoftwareContext::new();
    let control = ctx.control();
    let failing = Device::new(Box::new(ctx));
    control.set_fail_allocations(true);
    assert!(Surface::make_offscreen(&failing, 2, 2).is_none());
    control.set_fail_allocations(false);

    let surface = Surface::make_offscreen(&failing, 3, 2).unwrap();
    assert_eq!((surface.width(), surface.height()), (3, 2));
    assert_eq!(first_pixel(&surface), Some([0, 0, 0, 0]));
    assert!(format!("{surface:?}").contains("Surface"));
}

#[test]
fn nothing_is_read_before_the_first_frame() {
    let target = BackendRenderTarget {
        framebuffer: GlFrameBufferInfo { id: 5, format: 0x8058 },
        width: 2,
        height: 2,
    };
    let surface = Surface::make_from_render_target(&device(), target).unwrap();
    assert_eq!(first_pixel(&surface), None);
    assert!(draw(&surface, 1, None));
    assert_eq!(first_pixel(&surface), Some([255, 0, 0, 255]));
    assert!(!surface.read_pixels(&mut [0u8; 4], 8));
}

#[test]
fn unchanged_versions_are_skipped() {
    let surface = Surface::make_offscreen(&device(), 2, 2).unwrap();
    assert!(draw(&surface, 3, None));
    assert!(!draw(&surface, 3, None));
    assert!(draw(&surface, 4, None));

    surface.update_size();
    assert!(draw(&surface, 4, None));
}

#[test]
fn requested_semaphores_force_a_frame() {
    let plain = Surface::make_offscreen(&device(), 2, 2).unwrap();
    assert!(draw(&plain, 1, None));
    let mut semaphore = BackendSemaphore::gl(9);
    assert!(draw(&plain, 1, Some(&mut semaphore)));
    assert!(!semaphore.is_initialized());

    let synced = Device::new(Box::new(SoftwareContext::new().with_sync(true)));
    let surface = Surface::make_offscreen(&synced, 2, 2).unwrap();
    let mut semaphore = BackendSemaphore::default();
    assert!(draw(&surface, 1, Some(&mut semaphore)));
    assert!(semaphore.is_initialized());
    assert_eq!(semaphore.backend(), Backend::OpenGL);
}

#[test]
fn clearing_reports_changes_and_forces_a_redraw() {
    let surface = Surface::make_offscreen(&device(), 2, 2).unwrap();
    assert!(!surface.clear_all());
    assert!(draw(&surface, 1, None));
    assert!(surface.clear_all());
    assert_eq!(first_pixel(&surface), Some([0, 0, 0, 0]));
    assert!(draw(&surface, 1, None));
}

#[test]
fn freeing_the_cache_drops_the_backend_surface() {
    let surface = Surface::make_offscreen(&device(), 2, 2).unwrap();
    assert!(draw(&surface, 1, None));
    surface.free_cache();
    assert_eq!(first_pixel(&surface), None);
    assert!(draw(&surface, 1, None));
    assert_eq!(first_pixel(&surface), Some([255, 0, 0, 255]));
}

#[test]
fn binding_shares_the_root_lock() {
    let surface = Surface::make_offscreen(&device(), 2, 2).unwrap();
    assert!(!surface.is_bound());
    let tree = LayerArena::new_tree();
    assert!(surface.try_bind(&tree));
    assert!(surface.is_bound());
    assert!(!surface.try_bind(&LayerArena::new_tree()));
    assert!(Arc::ptr_eq(&surface.tree.current(), &tree));
    surface.unbind();
    assert!(!surface.is_bound());
    assert!(!Arc::ptr_eq(&surface.tree.current(), &tree));
}

#[test]
fn async_textures_are_double_buffered() {
    let client = BackendTexture::gl(
        GlTextureInfo {
            id: 12,
            target: 0x0DE1,
            format: 0x8058,
        },
        4,
        4,
    );
    let shared = Surface::make_from_texture(&device(), client, true).unwrap();
    assert_eq!(shared.front_texture(), Some(client));
    let back = shared.back_texture().unwrap();
    assert_ne!(back, client);
    assert!(draw(&shared, 1, None));
    assert_eq!(shared.front_texture(), Some(back));

    let direct = Surface::make_from_texture(&device(), client, false).unwrap();
    assert_eq!(direct.back_texture(), Some(client));
}

#[test]
fn async_read_back_follows_the_latest_frame() {
    let client = BackendTexture::gl(
        GlTextureInfo {
            id: 21,
            target: 0x0DE1,
            format: 0x8058,
        },
        2,
        2,
    );
    let surface = Surface::make_from_texture(&device(), client, true).unwrap();
    assert_eq!(first_pixel(&surface), None);
    assert!(draw(&surface, 1, None));
    assert_eq!(first_pixel(&surface), Some([255, 0, 0, 255]));

    let blue = Graphic::Solid {
        rect: Rect::new(0.0, 0.0, 2.0, 2.0),
        color: Rgba8::rgb(0, 0, 255),
    };
    {
        let guard = surface.tree.lock();
        assert!(surface.draw(&guard.token(), &blue, 2, None, true, 0));
    }
    assert_eq!(first_pixel(&surface), Some([0, 0, 255, 255]));
    assert!(draw(&surface, 3, None));
    assert_eq!(first_pixel(&surface), Some([255, 0, 0, 255]));
}

#[test]
fn hit_tests_and_waits_go_through_the_context() {
    let synced = Device::new(Box::new(SoftwareContext::new().with_sync(true)));
    let surface = Surface::make_offscreen(&synced, 4, 4).unwrap();
    let guard = surface.tree.lock();
    let token = guard.token();
    assert!(surface.hit_test(&token, &red(), 1.0, 1.0));
    assert!(!surface.hit_test(&token, &red(), 3.0, 3.0));
    assert!(surface.wait(&token, &BackendSemaphore::gl(2)));
    assert!(!surface.wait(&token, &BackendSemaphore::default()));

    let plain = Surface::make_offscreen(&device(), 1, 1).unwrap();
    let guard = plain.tree.lock();
    assert!(!plain.wait(&guard.token(), &BackendSemaphore::gl(2)));
}
