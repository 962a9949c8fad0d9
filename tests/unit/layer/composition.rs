use super::*;
use crate::foundation::core::Rgba8;
use crate::layer::{FileComposition, SolidLayer};

const DOC: &str = r#"{
  "compositions": [
    {
      "id": 1, "width": 40, "height": 40, "duration": 30, "frame_rate": 30,
      "layers": [
        { "id": 11, "name": "a", "type": "solid", "color": { "r": 9, "g": 9, "b": 9 },
          "width": 40, "height": 40, "duration": 30 }
      ]
    },
    {
      "id": 2, "width": 100, "height": 100, "duration": 30, "frame_rate": 30,
      "audio_start_time": 6,
      "audio_markers": [ { "start_time": 1, "duration": 2, "comment": "beat" } ],
      "layers": [
        { "id": 21, "name": "a", "type": "solid", "color": { "r": 1, "g": 1, "b": 1 },
          "width": 100, "height": 100, "duration": 30,
          "track_matte_type": "alpha",
          "track_matte": { "id": 22, "name": "m", "type": "solid",
            "color": { "r": 0, "g": 0, "b": 0 }, "width": 50, "height": 50, "duration": 30 } },
        { "id": 23, "name": "nested", "type": "pre_compose", "composition_id": 1, "duration": 30 }
      ]
    }
  ]
}"#;

fn solid(duration: i64) -> Layer {
    Layer::clone(&SolidLayer::make(duration, 10, 10, Rgba8::rgb(0, 255, 0)).unwrap())
}

fn order(comp: &Composition) -> Vec<Layer> {
    (0..comp.num_children() as i32)
        .filter_map(|i| comp.layer_at(i))
        .collect()
}

#[test]
fn children_are_ordered_bottom_first() {
    let comp = Composition::make(100, 100);
    let (a, b, c) = (solid(1_000_000), solid(1_000_000), solid(1_000_000));
    assert!(comp.add_layer(&a));
    assert!(comp.add_layer(&b));
    assert!(comp.add_layer_at(&c, 0));
    assert_eq!(order(&comp), vec![c.clone(), a.clone(), b.clone()]);
    assert_eq!(comp.layer_index(&b), 2);
    assert!(comp.layer_at(3).is_none());
    assert!(comp.layer_at(-1).is_none());
    assert_eq!(comp.layer_index(&solid(1)), -1);
}

#[test]
fn reindexing_moves_children() {
    let comp = Composition::make(100, 100);
    let (a, b, c) = (solid(1_000_000), solid(1_000_000), solid(1_000_000));
    for layer in [&a, &b, &c] {
        comp.add_layer(layer);
    }
    comp.set_layer_index(&a, 1);
    assert_eq!(order(&comp), vec![b.clone(), a.clone(), c.clone()]);
    comp.set_layer_index(&b, -1);
    assert_eq!(order(&comp), vec![a.clone(), c.clone(), b.clone()]);
    assert!(comp.add_layer(&a));
    assert_eq!(order(&comp), vec![c.clone(), b.clone(), a.clone()]);
    assert_eq!(comp.num_children(), 3);
}

#[test]
fn swapping_children() {
    let comp = Composition::make(100, 100);
    let (a, b, c) = (solid(1_000_000), solid(1_000_000), solid(1_000_000));
    for layer in [&a, &b, &c] {
        comp.add_layer(layer);
    }
    comp.swap_layer(&a, &c);
    assert_eq!(order(&comp), vec![c.clone(), b.clone(), a.clone()]);
    comp.swap_layer_at(0, 1);
    assert_eq!(order(&comp), vec![b.clone(), c.clone(), a.clone()]);
    comp.swap_layer_at(0, 7);
    comp.swap_layer(&a, &solid(1));
    assert_eq!(order(&comp), vec![b, c, a]);
}

#[test]
fn a_layer_has_at_most_one_parent() {
    let first = Composition::make(100, 100);
    let second = Composition::make(100, 100);
    let layer = solid(1_000_000);
    first.add_layer(&layer);
    assert!(second.add_layer(&layer));
    assert!(!first.contains(&layer));
    assert!(second.contains(&layer));
    assert_eq!(first.num_children(), 0);
    assert_eq!(layer.parent(), Some(second.clone()));
    layer.set_alpha(0.5);
    assert_eq!(layer.alpha(), 0.5);
}

#[test]
fn cycles_are_rejected() {
    let outer = Composition::make(100, 100);
    let inner = Composition::make(50, 50);
    assert!(!outer.add_layer(&outer));
    assert!(outer.add_layer(&inner));
    assert!(!inner.add_layer(&outer));
    assert!(outer.contains(&outer));
    assert!(outer.contains(&inner));
    assert!(!inner.contains(&outer));
}

#[test]
fn removed_layers_become_standalone() {
    let comp = Composition::make(100, 100);
    let (a, b, c) = (solid(1_000_000), solid(1_000_000), solid(1_000_000));
    for layer in [&a, &b, &c] {
        comp.add_layer(layer);
    }
    let removed = comp.remove_layer(&b).unwrap();
    assert_eq!(removed, b);
    assert!(b.parent().is_none());
    assert!(!comp.contains(&b));
    assert!(comp.remove_layer(&b).is_none());
    assert!(comp.remove_layer_at(5).is_none());
    assert_eq!(comp.remove_layer_at(0), Some(a.clone()));
    b.set_visible(false);
    assert!(!b.visible());
    comp.remove_all_layers();
    assert_eq!(comp.num_children(), 0);
    assert!(c.parent().is_none());
}

#[test]
fn empty_compositions_follow_their_children() {
    let comp = Composition::make(100, 100);
    let a = solid(frame_to_time(30, 60.0));
    let b = solid(frame_to_time(50, 60.0));
    comp.add_layer(&a);
    comp.add_layer(&b);
    assert_eq!(comp.duration(), frame_to_time(50, 60.0));
    b.set_start_time(frame_to_time(20, 60.0));
    assert_eq!(comp.duration(), frame_to_time(70, 60.0));
    comp.remove_layer(&b);
    assert_eq!(comp.duration(), frame_to_time(30, 60.0));
    assert_eq!(comp.frame_rate(), 60.0);
}

#[test]
fn nested_empty_compositions_propagate_duration() {
    let outer = Composition::make(100, 100);
    let inner = Composition::make(100, 100);
    outer.add_layer(&inner);
    inner.add_layer(&solid(2_000_000));
    assert_eq!(inner.duration(), 2_000_000);
    assert_eq!(outer.duration(), 2_000_000);
}

#[test]
fn frame_rate_is_the_fastest_child() {
    let comp = Composition::make(100, 100);
    let file = FileComposition::from_file(File::from_json(DOC).unwrap());
    comp.add_layer(&file);
    assert_eq!(comp.frame_rate(), 30.0);
    assert_eq!(comp.duration(), 1_000_000);
    comp.add_layer(&solid(500_000));
    assert_eq!(comp.frame_rate(), 60.0);
}

#[test]
fn content_size_changes_bump_the_version() {
    let comp = Composition::make(100, 80);
    assert_eq!((comp.width(), comp.height()), (100, 80));
    let before = comp.content_version();
    comp.set_content_size(100, 80);
    assert_eq!(comp.content_version(), before);
    comp.set_content_size(20, 30);
    assert_eq!((comp.width(), comp.height()), (20, 30));
    assert!(comp.content_version() > before);
}

#[test]
fn name_lookup_searches_mattes_and_nested_layers() {
    let file = FileComposition::from_file(File::from_json(DOC).unwrap());
    assert_eq!(file.layers_by_name("a").len(), 2);
    assert_eq!(file.layers_by_name("m").len(), 1);
    assert_eq!(file.layers_by_name("nested").len(), 1);
    assert!(file.layers_by_name("").is_empty());
    assert!(file.layers_by_name("missing").is_empty());
}

#[test]
fn audio_metadata_comes_from_the_document() {
    let file = FileComposition::from_file(File::from_json(DOC).unwrap());
    assert_eq!(file.audio_start_time(), frame_to_time(6, 30.0));
    let markers = file.audio_markers();
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].comment, "beat");
    assert!(Composition::make(1, 1).audio_markers().is_empty());
}

#[test]
fn adding_a_matte_elsewhere_detaches_it() {
    let first = Composition::make(100, 100);
    let second = Composition::make(100, 100);
    let (owner, matte) = (solid(1_000_000), solid(1_000_000));
    first.add_layer(&owner);
    first.add_layer(&matte);
    owner.set_track_matte_layer(Some(&matte));
    assert_eq!(owner.track_matte_layer(), Some(matte.clone()));
    assert!(matte.parent().is_none());
    assert_eq!(first.num_children(), 1);

    second.add_layer(&matte);
    assert!(owner.track_matte_layer().is_none());
    assert_eq!(matte.parent(), Some(second.clone()));
}

#[test]
fn mattes_reject_self_and_ancestors() {
    let comp = Composition::make(100, 100);
    let layer = solid(1_000_000);
    comp.add_layer(&layer);
    layer.set_track_matte_layer(Some(&layer));
    assert!(layer.track_matte_layer().is_none());
    layer.set_track_matte_layer(Some(&*comp));
    assert!(layer.track_matte_layer().is_none());
}

#[test]
fn clearing_a_matte_leaves_it_standalone() {
    let comp = Composition::make(100, 100);
    let (owner, matte) = (solid(1_000_000), solid(1_000_000));
    comp.add_layer(&owner);
    owner.set_track_matte_layer(Some(&matte));
    owner.set_track_matte_layer(None);
    assert!(owner.track_matte_layer().is_none());
    assert!(!comp.contains(&matte));
    assert!(comp.add_layer(&matte));
}
