use super::*;
use crate::config::PlayerOpts;
use crate::foundation::core::Affine;
use crate::layer::{Composition, ImageLayer};
use crate::player::Player;
use crate::render::scale::ScaleMode;

fn state() -> StageState {
    StageState::new(PlayerState::new(&PlayerOpts::default()))
}

fn pixels(w: u32, h: u32) -> Arc<Image> {
    Image::from_pixels(w, h, vec![255; (w * h * 4) as usize]).unwrap()
}

fn unscaled_player() -> Player {
    Player::with_opts(&PlayerOpts {
        scale_mode: ScaleMode::None,
        ..PlayerOpts::default()
    })
}

#[test]
fn cache_scale_is_clamped() {
    let mut stage = state();
    stage.set_cache_scale(0.5);
    assert_eq!(stage.cache_scale, 0.5);
    for bad in [0.0, -1.0, 1.5] {
        stage.set_cache_scale(bad);
        assert_eq!(stage.cache_scale, 1.0, "{bad}");
    }
}

#[test]
fn image_references_are_counted() {
    let mut stage = state();
    let image = pixels(1, 1);
    stage.add_image_reference(&image, LayerId(1));
    stage.add_image_reference(&image, LayerId(2));
    stage.add_image_reference(&image, LayerId(2));
    assert_eq!(stage.references[&image.unique_id()].len(), 2);

    stage.remove_image_reference(&image, LayerId(1));
    assert!(stage.images.contains_key(&image.unique_id()));
    assert!(stage.take_removed_assets().is_empty());

    stage.remove_image_reference(&image, LayerId(2));
    assert!(!stage.images.contains_key(&image.unique_id()));
    assert!(stage.take_removed_assets().contains(&image.unique_id()));
    assert!(stage.take_removed_assets().is_empty());
}

#[test]
fn image_versions_sum_over_the_stage() {
    let mut stage = state();
    let (a, b) = (pixels(1, 1), pixels(2, 2));
    stage.add_image_reference(&a, LayerId(1));
    stage.add_image_reference(&b, LayerId(2));
    assert_eq!(stage.image_versions(), a.version() + b.version());
}

#[test]
fn entering_and_leaving_the_stage_tracks_assets() {
    let player = unscaled_player();
    let comp = Composition::make(10, 10);
    let layer = ImageLayer::make(4, 4, 1_000_000).unwrap();
    let image = pixels(2, 2);
    layer.set_image(Some(Arc::clone(&image)));
    comp.add_layer(&layer);

    player.set_composition(Some(&comp));
    comp.with(|arena, id| {
        assert_eq!(arena.root_composition(), Some(id));
        let stage = arena.stage().unwrap();
        assert!(stage.images.contains_key(&image.unique_id()));
        assert!(stage.references.contains_key(&layer.id().0));
    });

    let held = layer.clone();
    player.set_composition(None);
    assert!(player.composition().is_none());
    assert!(held.with(|arena, _| arena.stage().is_none()));
}

#[test]
fn removed_layers_report_their_assets() {
    let player = unscaled_player();
    let comp = Composition::make(10, 10);
    let layer = ImageLayer::make(4, 4, 1_000_000).unwrap();
    let image = pixels(2, 2);
    comp.add_layer(&layer);
    player.set_composition(Some(&comp));
    layer.set_image(Some(Arc::clone(&image)));
    comp.remove_layer(&layer);
    let removed = comp.with_mut(|arena, _| arena.stage_mut().unwrap().take_removed_assets());
    assert!(removed.contains(&image.unique_id()));
    assert!(removed.contains(&layer.id().0));
}

#[test]
fn asset_scale_follows_every_matrix() {
    let player = unscaled_player();
    let comp = Composition::make(10, 10);
    let layer = ImageLayer::make(4, 4, 1_000_000).unwrap();
    let image = pixels(2, 2);
    comp.add_layer(&layer);
    player.set_composition(Some(&comp));
    layer.set_image(Some(Arc::clone(&image)));
    layer.set_matrix(Affine::scale(2.0));

    let key = image.unique_id();
    let scale = comp.with_mut(|arena, _| arena.asset_max_scale(key));
    assert!((scale - 4.0).abs() < 1e-5, "{scale}");

    layer.set_matrix(Affine::scale(3.0));
    let scale = comp.with_mut(|arena, _| arena.asset_max_scale(key));
    assert!((scale - 6.0).abs() < 1e-5, "{scale}");

    player.set_cache_scale(0.5);
    let scale = comp.with_mut(|arena, _| arena.asset_max_scale(key));
    assert!((scale - 3.0).abs() < 1e-5, "{scale}");
}
