use super::*;
use crate::foundation::core::{Rgba8, frame_to_progress};
use crate::image::Image;
use crate::layer::{ImageLayer, SolidLayer};
use crate::render::backend::Device;
use crate::render::cpu::SoftwareContext;

fn surface(width: i32, height: i32) -> Arc<Surface> {
    let device = Device::new(Box::new(SoftwareContext::new()));
    Surface::make_offscreen(&device, width, height).unwrap()
}

/// A 100x50 composition holding one second of a 10x10 solid placed at (5, 5).
fn scene() -> (Composition, SolidLayer) {
    let comp = Composition::make(100, 50);
    let solid = SolidLayer::make(1_000_000, 10, 10, Rgba8::rgb(255, 0, 0)).unwrap();
    solid.set_matrix(Affine::translate((5.0, 5.0)));
    comp.add_layer(&solid);
    (comp, solid)
}

fn stage_version(player: &Player) -> u64 {
    player.stage.with_mut(|arena, _| arena.stage_version())
}

#[test]
fn options_seed_the_player() {
    let player = Player::with_opts(&PlayerOpts {
        cache_enabled: false,
        video_enabled: false,
        cache_scale: 0.5,
        max_frame_rate: 24.0,
        scale_mode: ScaleMode::Zoom,
        auto_clear: false,
    });
    assert!(!player.cache_enabled());
    assert!(!player.video_enabled());
    assert_eq!(player.cache_scale(), 0.5);
    assert_eq!(player.max_frame_rate(), 24.0);
    assert_eq!(player.scale_mode(), ScaleMode::Zoom);
    assert!(!player.auto_clear());
    assert!(player.composition().is_none());
    assert!(player.surface().is_none());
    assert_eq!(player.duration(), 0);
    assert_eq!(player.progress(), 0.0);
}

#[test]
fn invalid_frame_rates_are_ignored() {
    let player = Player::new();
    for bad in [0.0, -5.0, f32::NAN] {
        player.set_max_frame_rate(bad);
        assert_eq!(player.max_frame_rate(), 60.0);
    }
    player.set_max_frame_rate(25.0);
    assert_eq!(player.max_frame_rate(), 25.0);
}

#[test]
fn compositions_move_between_players() {
    let (comp, _) = scene();
    let first = Player::new();
    let second = Player::new();
    first.set_composition(Some(&comp));
    assert_eq!(first.composition(), Some(comp.clone()));
    assert_eq!(first.duration(), 1_000_000);

    second.set_composition(Some(&comp));
    assert!(first.composition().is_none());
    assert_eq!(second.composition(), Some(comp.clone()));

    let (other, _) = scene();
    second.set_composition(Some(&other));
    assert_eq!(second.composition(), Some(other));
    assert!(comp.parent().is_none());

    second.set_composition(None);
    assert!(second.composition().is_none());
}

#[test]
fn compositions_are_fitted_into_the_surface() {
    let (comp, _) = scene();
    let player = Player::new();
    player.set_composition(Some(&comp));
    assert_eq!(player.matrix(), Affine::IDENTITY);

    player.set_surface(Some(surface(200, 200)));
    let letterbox = Affine::translate((0.0, 50.0)) * Affine::scale(2.0);
    assert_eq!(player.matrix(), letterbox);

    player.set_matrix(Affine::scale(3.0));
    assert_eq!(player.scale_mode(), ScaleMode::None);
    assert_eq!(player.matrix(), Affine::scale(3.0));

    player.set_scale_mode(ScaleMode::Stretch);
    assert_eq!(player.matrix(), Affine::scale_non_uniform(2.0, 4.0));
}

#[test]
fn seeking_snaps_to_the_max_frame_rate() {
    let (comp, _) = scene();
    let player = Player::new();
    player.set_composition(Some(&comp));
    assert_eq!(comp.frame_rate(), 60.0);

    player.set_progress(0.52);
    assert_eq!(player.progress(), frame_to_progress(31, 60));

    player.set_max_frame_rate(30.0);
    player.set_progress(0.52);
    assert_eq!(player.progress(), frame_to_progress(30, 60));
}

#[test]
fn stepping_wraps_around() {
    let (comp, _) = scene();
    let player = Player::new();
    player.set_composition(Some(&comp));
    player.pre_frame();
    assert_eq!(player.progress(), 1.0);
    player.next_frame();
    assert_eq!(player.progress(), frame_to_progress(0, 60));
    player.next_frame();
    assert_eq!(player.progress(), frame_to_progress(1, 60));
}

#[test]
fn flush_draws_only_when_something_changed() {
    let (comp, solid) = scene();
    let player = Player::new();
    assert!(!player.flush());
    player.set_surface(Some(surface(100, 50)));
    assert!(!player.flush());

    player.set_composition(Some(&comp));
    assert!(player.flush());
    assert!(!player.flush());

    solid.set_matrix(Affine::translate((20.0, 5.0)));
    assert!(player.flush());
    player.set_auto_clear(false);
    assert!(player.flush());
    assert!(player.rendering_time() >= 0);
    assert!(player.presenting_time() >= 0);

    let mut semaphore = BackendSemaphore::default();
    assert!(player.flush_and_signal_semaphore(&mut semaphore));
    assert!(!semaphore.is_initialized());
    assert!(!player.wait(&BackendSemaphore::gl(1)));
}

#[test]
fn flush_renders_the_stage() {
    let (comp, _) = scene();
    let player = Player::new();
    let target = surface(100, 50);
    player.set_surface(Some(Arc::clone(&target)));
    player.set_composition(Some(&comp));
    assert!(player.flush());

    let mut data = vec![0u8; 100 * 50 * 4];
    assert!(target.read_pixels(&mut data, 400));
    let at = |x: usize, y: usize| data[(y * 100 + x) * 4..][..4].to_vec();
    let red = at(10, 10);
    assert!(red[0] >= 250 && red[3] >= 250 && red[1] == 0, "{red:?}");
    assert_eq!(at(50, 30), [0, 0, 0, 0]);
}

#[test]
fn a_surface_serves_one_player() {
    let target = surface(10, 10);
    let first = Player::new();
    let second = Player::new();
    first.set_surface(Some(Arc::clone(&target)));
    second.set_surface(Some(Arc::clone(&target)));
    assert!(second.surface().is_none());
    assert!(target.is_bound());

    drop(first);
    assert!(!target.is_bound());
    second.set_surface(Some(Arc::clone(&target)));
    assert!(second.surface().is_some());
    second.set_surface(None);
    assert!(!target.is_bound());
}

#[test]
fn layers_are_located_in_surface_space() {
    let (comp, solid) = scene();
    let player = Player::new();
    player.set_surface(Some(surface(200, 200)));
    player.set_composition(Some(&comp));

    assert_eq!(player.bounds(&solid), Rect::new(10.0, 60.0, 30.0, 80.0));
    let stray = SolidLayer::make(1_000_000, 5, 5, Rgba8::rgb(0, 0, 0)).unwrap();
    assert_eq!(player.bounds(&stray), Rect::ZERO);

    let hits = player.layers_under_point(20.0, 70.0);
    assert_eq!(hits, vec![Layer::clone(&solid)]);
    assert!(player.layers_under_point(5.0, 5.0).is_empty());

    assert!(player.hit_test_point(&solid, 20.0, 70.0, false));
    assert!(!player.hit_test_point(&solid, 35.0, 70.0, false));
    assert!(player.hit_test_point(&solid, 20.0, 70.0, true));
    assert!(!player.hit_test_point(&solid, 35.0, 70.0, true));
    assert!(!player.hit_test_point(&stray, 1.0, 1.0, false));
}

#[test]
fn stage_version_never_goes_backwards() {
    let player = Player::with_opts(&PlayerOpts {
        scale_mode: ScaleMode::None,
        ..PlayerOpts::default()
    });
    let comp = Composition::make(10, 10);
    let layer = ImageLayer::make(4, 4, 1_000_000).unwrap();
    let image = Image::from_pixels(2, 2, vec![255; 16]).unwrap();
    layer.set_image(Some(Arc::clone(&image)));
    comp.add_layer(&layer);
    player.set_composition(Some(&comp));

    let v1 = stage_version(&player);
    image.set_matrix(Affine::scale(2.0));
    let v2 = stage_version(&player);
    assert!(v2 > v1);
    comp.remove_layer(&layer);
    let v3 = stage_version(&player);
    assert!(v3 > v2);
}

#[test]
fn cached_images_count_as_graphics_memory() {
    let comp = Composition::make(4, 4);
    let layer = ImageLayer::make(4, 4, 1_000_000).unwrap();
    layer.set_image(Some(Image::from_pixels(2, 2, vec![255; 16]).unwrap()));
    comp.add_layer(&layer);
    let player = Player::new();
    player.set_surface(Some(surface(4, 4)));
    player.set_composition(Some(&comp));

    player.prepare();
    assert_eq!(player.graphics_memory(), 16);
    player.set_cache_enabled(false);
    assert_eq!(player.graphics_memory(), 0);
    assert!(player.image_decoding_time() >= 0);
}
