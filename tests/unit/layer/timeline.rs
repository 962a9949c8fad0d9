use super::*;
use crate::document::File;
use crate::foundation::core::Rgba8;
use crate::layer::{Composition, FileComposition, Layer, SolidLayer};

const DOC: &str = r#"{
  "compositions": [
    {
      "id": 1, "width": 100, "height": 100, "duration": 20, "frame_rate": 30,
      "layers": [
        { "id": 11, "name": "dot", "type": "solid", "color": { "r": 255, "g": 0, "b": 0 },
          "width": 10, "height": 10, "duration": 20 }
      ]
    },
    {
      "id": 2, "width": 200, "height": 200, "duration": 60, "frame_rate": 30,
      "layers": [
        { "id": 21, "name": "inner", "type": "pre_compose", "composition_id": 1,
          "composition_start_time": 10, "start_time": 10, "duration": 20 },
        { "id": 22, "name": "bg", "type": "solid", "color": { "r": 0, "g": 0, "b": 255 },
          "width": 200, "height": 200, "duration": 60 }
      ]
    }
  ]
}"#;

fn fixture() -> FileComposition {
    FileComposition::from_file(File::from_json(DOC).unwrap())
}

fn named(root: &FileComposition, name: &str) -> Layer {
    root.layers_by_name(name).remove(0)
}

fn content_frame(layer: &Layer) -> Frame {
    layer.with(|arena, id| arena.node(id).content_frame)
}

fn solid(duration: i64) -> SolidLayer {
    SolidLayer::make(duration, 10, 10, Rgba8::rgb(255, 0, 0)).unwrap()
}

#[test]
fn nested_frames_round_trip_through_the_root() {
    let root = fixture();
    let dot = named(&root, "dot");
    assert_eq!(dot.local_frame_to_global(5), 15);
    assert_eq!(dot.global_to_local_frame(15), 5);
    for f in 0..20 {
        assert_eq!(dot.global_to_local_frame(dot.local_frame_to_global(f)), f);
    }
    assert_eq!(
        dot.local_time_to_global(frame_to_time(5, 30.0)),
        frame_to_time(15, 30.0)
    );
    assert_eq!(
        dot.global_to_local_time(frame_to_time(15, 30.0)),
        frame_to_time(5, 30.0)
    );
}

#[test]
fn frames_rescale_between_frame_rates() {
    let root = fixture();
    let layer = solid(1_000_000);
    assert!(root.add_layer(&layer));
    assert_eq!(layer.frame_rate(), 60.0);
    assert_eq!(layer.local_frame_to_global(20), 10);
    assert_eq!(layer.global_to_local_frame(10), 20);
}

#[test]
fn seeking_the_root_moves_nested_layers() {
    let root = fixture();
    let inner = named(&root, "inner");
    let dot = named(&root, "dot");
    assert!(root.set_current_time(frame_to_time(15, 30.0)));
    assert_eq!(content_frame(&inner), 5);
    assert_eq!(content_frame(&dot), 5);
    assert_eq!(dot.current_time(), frame_to_time(5, 30.0));
    assert_eq!(root.current_time(), frame_to_time(15, 30.0));
    assert!(!root.set_current_time(frame_to_time(15, 30.0)));
}

#[test]
fn excluded_layers_keep_their_frame() {
    let root = fixture();
    let bg = named(&root, "bg");
    bg.set_excluded_from_timeline(true);
    assert!(bg.excluded_from_timeline());
    root.set_current_time(frame_to_time(40, 30.0));
    assert_eq!(content_frame(&bg), 0);
}

#[test]
fn progress_snaps_to_frames() {
    let root = fixture();
    assert!(root.set_progress(0.5));
    assert_eq!(root.current_time(), frame_to_time(30, 30.0));
    assert!((root.progress() - 30.1 / 60.0).abs() < 1e-9);
    assert!((root.progress() - 0.5).abs() < 1.0 / 60.0);
}

#[test]
fn frame_stepping_wraps_around() {
    let root = fixture();
    root.pre_frame();
    assert_eq!(root.progress(), 1.0);
    assert_eq!(root.current_time(), frame_to_time(59, 30.0));
    root.next_frame();
    assert_eq!(root.current_time(), 0);
    root.next_frame();
    assert_eq!(root.current_time(), frame_to_time(1, 30.0));
}

#[test]
fn single_frame_layers_do_not_step() {
    let comp = Composition::make(10, 10);
    comp.next_frame();
    comp.pre_frame();
    assert_eq!(comp.progress(), 0.0);
    assert_eq!(comp.current_time(), 0);
}

#[test]
fn mutations_bump_the_root_version() {
    let root = fixture();
    let dot = named(&root, "dot");
    let before = root.content_version();
    dot.set_alpha(0.5);
    let after_alpha = root.content_version();
    assert!(after_alpha > before);
    dot.set_alpha(0.5);
    assert_eq!(root.content_version(), after_alpha);
    dot.set_matrix(Affine::translate((1.0, 2.0)));
    assert!(root.content_version() > after_alpha);
    let after_matrix = root.content_version();
    dot.set_visible(false);
    assert!(root.content_version() > after_matrix);
}

#[test]
fn start_time_change_keeps_parent_position() {
    let comp = Composition::make(100, 100);
    let layer = solid(1_000_000);
    comp.add_layer(&layer);
    comp.set_current_time(frame_to_time(30, 60.0));
    assert_eq!(content_frame(&layer), 30);

    layer.set_start_time(frame_to_time(10, 60.0));
    assert_eq!(layer.start_time(), frame_to_time(10, 60.0));
    assert_eq!(content_frame(&layer), 20);
    assert_eq!(comp.duration(), frame_to_time(70, 60.0));
    assert!(layer.audio_version() > 0);
    assert!(comp.audio_version() > 0);
}

#[test]
fn frame_change_counts_visibility_toggles() {
    let layer = solid(1_000_000);
    layer.with(|arena, id| {
        assert!(!arena.check_frame_changed(id, 30, 0));
        assert!(arena.check_frame_changed(id, 60, 30));
        assert!(arena.check_frame_changed(id, 0, -1));
        assert!(!arena.check_frame_changed(id, 70, 65));
        assert!(!arena.check_frame_changed(id, 5, 5));
    });
}

#[test]
fn layers_outside_their_range_have_no_transform() {
    let root = fixture();
    let inner = named(&root, "inner");
    assert!(inner.with(|arena, id| arena.get_transform(id)).is_none());
    root.set_current_time(frame_to_time(12, 30.0));
    assert!(inner.with(|arena, id| arena.get_transform(id)).is_some());
    inner.set_alpha(0.0);
    assert!(inner.with(|arena, id| arena.get_transform(id)).is_none());
}

#[test]
fn points_map_into_layer_space() {
    let comp = Composition::make(100, 100);
    let layer = solid(1_000_000);
    comp.add_layer(&layer);
    comp.set_matrix(Affine::translate((10.0, 20.0)));
    let p = layer.global_to_local_point(15.0, 25.0);
    assert!((p.x - 5.0).abs() < 1e-9 && (p.y - 5.0).abs() < 1e-9);
    layer.set_matrix(Affine::scale(2.0));
    let p = layer.global_to_local_point(20.0, 30.0);
    assert!((p.x - 5.0).abs() < 1e-9 && (p.y - 5.0).abs() < 1e-9);
    assert_eq!(layer.total_matrix(), Affine::scale(2.0));
    layer.reset_matrix();
    assert_eq!(layer.matrix(), Affine::IDENTITY);
}
