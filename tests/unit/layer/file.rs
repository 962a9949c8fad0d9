use super::*;
use crate::layer::ImageContent;

const DOC: &str = r#"{
  "time_stretch_mode": "scale",
  "images": [ { "id": 5, "width": 8, "height": 8 } ],
  "compositions": [
    {
      "id": 1, "width": 50, "height": 50, "duration": 10, "frame_rate": 30,
      "layers": [
        { "id": 2, "name": "title", "type": "text", "document": { "text": "hello" }, "duration": 10 },
        { "id": 3, "name": "subtitle", "type": "text", "document": { "text": "world" }, "duration": 10 },
        { "id": 4, "name": "photo", "type": "image", "image_id": 5, "duration": 10 },
        { "id": 6, "name": "bg", "type": "solid", "color": { "r": 1, "g": 2, "b": 3 },
          "width": 50, "height": 50, "duration": 10 }
      ]
    }
  ]
}"#;

fn fixture() -> FileComposition {
    FileComposition::from_file(File::from_json(DOC).unwrap())
}

fn frames(n: Frame) -> i64 {
    frame_to_time(n, 30.0)
}

fn to_file(root: &FileComposition, frame: Frame) -> Frame {
    root.with(|arena, id| arena.stretched_frame_to_file_frame(id, frame))
}

fn to_stretched(root: &FileComposition, frame: Frame) -> Frame {
    root.with(|arena, id| arena.file_frame_to_stretched_frame(id, frame))
}

#[test]
fn scale_maps_frames_both_ways() {
    let root = fixture();
    root.set_duration(frames(20));
    assert!(root.with(|arena, id| arena.is_stretched(id)));
    assert_eq!(root.duration(), frames(20));
    assert_eq!(to_stretched(&root, 5), 10);
    assert_eq!(to_file(&root, 10), 5);
    assert_eq!(to_file(&root, 19), 9);
    for f in 0..10 {
        assert_eq!(to_file(&root, to_stretched(&root, f)), f);
    }
    assert_eq!(to_file(&root, 22), 12);
    assert_eq!(to_stretched(&root, 12), 22);
}

#[test]
fn none_mode_holds_the_last_frame() {
    let root = fixture();
    root.set_time_stretch_mode(TimeStretchMode::None);
    root.set_duration(frames(20));
    assert_eq!(to_file(&root, 15), 9);
    for f in 0..10 {
        assert_eq!(to_file(&root, to_stretched(&root, f)), f);
    }
}

#[test]
fn repeat_is_periodic() {
    let root = fixture();
    root.set_time_stretch_mode(TimeStretchMode::Repeat);
    root.set_duration(frames(30));
    for k in 0..3 {
        for f in 0..10 {
            assert_eq!(to_file(&root, k * 10 + f), f, "cycle {k} frame {f}");
        }
    }
}

#[test]
fn repeat_inverted_mirrors_every_other_cycle() {
    let root = fixture();
    root.set_time_stretch_mode(TimeStretchMode::RepeatInverted);
    root.set_duration(frames(30));
    assert_eq!(to_file(&root, 9), 9);
    assert_eq!(to_file(&root, 10), 9);
    assert_eq!(to_file(&root, 11), 8);
    assert_eq!(to_file(&root, 19), 0);
    assert_eq!(to_file(&root, 20), 0);
    assert_eq!(to_file(&root, 21), 1);
}

#[test]
fn seeking_a_stretched_root_plays_authored_frames() {
    let root = fixture();
    root.set_duration(frames(20));
    let bg = root.layers_by_name("bg").remove(0);
    root.set_current_time(frames(10));
    assert_eq!(bg.with(|arena, id| arena.node(id).content_frame), 5);
    assert!((root.progress() - 10.1 / 20.0).abs() < 1e-9);
}

#[test]
fn non_positive_duration_restores_the_original() {
    let root = fixture();
    root.set_duration(frames(25));
    root.set_duration(0);
    assert_eq!(root.duration(), frames(10));
    assert!(!root.with(|arena, id| arena.is_stretched(id)));
}

#[test]
fn scaled_range_only_stretches_inside_it() {
    let doc = DOC.replacen(
        "\"time_stretch_mode\": \"scale\",",
        "\"time_stretch_mode\": \"scale\", \"scaled_time_range\": { \"start\": 2, \"end\": 6 },",
        1,
    );
    let root = FileComposition::from_file(File::from_json(&doc).unwrap());
    root.set_duration(frames(14));
    assert_eq!(to_stretched(&root, 1), 1);
    assert_eq!(to_stretched(&root, 3), 4);
    assert_eq!(to_stretched(&root, 8), 12);
    assert_eq!(to_file(&root, 12), 8);
    for f in 0..10 {
        assert_eq!(to_file(&root, to_stretched(&root, f)), f);
    }
}

#[test]
fn stretch_mode_round_trips() {
    let root = fixture();
    assert_eq!(root.time_stretch_mode(), TimeStretchMode::Scale);
    root.set_time_stretch_mode(TimeStretchMode::RepeatInverted);
    assert_eq!(root.time_stretch_mode(), TimeStretchMode::RepeatInverted);
}

#[test]
fn document_metrics_are_exposed() {
    let root = fixture();
    assert_eq!(root.num_texts(), 2);
    assert_eq!(root.num_images(), 1);
    assert_eq!(root.num_videos(), 0);
    assert!(root.path().is_empty());
    assert!(root.tag_level() <= FileComposition::max_supported_tag_level());
    assert_eq!(root.width(), 50);
    assert_eq!(root.frame_rate(), 30.0);
    assert!(root.as_file().is_some());
}

#[test]
fn replace_text_targets_one_slot() {
    let root = fixture();
    let title = root.layers_by_name("title").remove(0).as_text_layer().unwrap();
    let subtitle = root.layers_by_name("subtitle").remove(0).as_text_layer().unwrap();
    root.replace_text(1, Some(TextDocument::new("changed")));
    assert_eq!(subtitle.text(), "changed");
    assert_eq!(title.text(), "hello");
    assert_eq!(root.text_data(1).unwrap().text, "world");
    root.replace_text(1, None);
    assert_eq!(subtitle.text(), "world");
}

#[test]
fn replace_image_and_restore() {
    let root = fixture();
    let photo = root.layers_by_name("photo").remove(0).as_image_layer().unwrap();
    let image = Image::from_pixels(1, 1, vec![255; 4]).unwrap();
    root.replace_image(0, Some(Arc::clone(&image)));
    match photo.image() {
        ImageContent::Replacement(current) => assert!(Arc::ptr_eq(&current, &image)),
        other => panic!("expected a replacement, got {other:?}"),
    }
    root.replace_image_by_name("photo", None);
    match photo.image() {
        ImageContent::Default(def) => assert_eq!((def.width, def.height), (8, 8)),
        other => panic!("expected the default image, got {other:?}"),
    }
}

#[test]
fn editable_slots_are_listed() {
    let root = fixture();
    assert_eq!(root.editable_indices(LayerType::Text), vec![0, 1]);
    assert_eq!(root.editable_indices(LayerType::Image), vec![0]);
    assert!(root.editable_indices(LayerType::Solid).is_empty());
    let found = root.layers_by_editable_index(1, LayerType::Text);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].layer_name(), "subtitle");
    assert!(root.layers_by_editable_index(3, LayerType::Text).is_empty());
}

#[test]
fn copy_original_drops_client_edits() {
    let root = fixture();
    root.set_duration(frames(20));
    root.replace_text(0, Some(TextDocument::new("edited")));
    let copy = root.copy_original();
    assert_ne!(copy, root);
    assert_eq!(copy.duration(), frames(10));
    let title = copy.layers_by_name("title").remove(0).as_text_layer().unwrap();
    assert_eq!(title.text(), "hello");
    assert!(Arc::ptr_eq(&copy.file(), &root.file()));
}

#[test]
fn loading_a_missing_path_fails() {
    assert!(FileComposition::load("/definitely/not/here.json").is_err());
    assert!(FileComposition::from_reader(DOC.as_bytes()).is_ok());
}
