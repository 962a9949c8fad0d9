use super::*;

fn ramp() -> Property<f32> {
    Property::Animated(vec![
        Keyframe::linear(0, 10, 0.0, 10.0),
        Keyframe::linear(10, 20, 10.0, 30.0),
    ])
}

#[test]
fn static_property_is_constant() {
    let p = Property::Static(4.0f32);
    assert!(!p.is_animated());
    assert_eq!(p.value_at(-5), 4.0);
    assert_eq!(p.value_at(500), 4.0);
}

#[test]
fn animated_property_clamps_outside_keys() {
    let p = ramp();
    assert!(p.is_animated());
    assert_eq!(p.value_at(-3), 0.0);
    assert_eq!(p.value_at(5), 5.0);
    assert_eq!(p.value_at(15), 20.0);
    assert_eq!(p.value_at(25), 30.0);
}

#[test]
fn hold_keeps_start_value() {
    let mut k = Keyframe::linear(0, 10, 1.0f32, 9.0);
    k.interpolation = Interpolation::Hold;
    assert_eq!(k.value_at(9), 1.0);
}

#[test]
fn cut_linear_keyframe_keeps_values_on_line() {
    let mut left = Keyframe::linear(0, 10, 0.0f32, 100.0);
    let mut right = left.clone();
    cut_keyframe(&mut left, 4, false);
    cut_keyframe(&mut right, 4, true);
    assert_eq!((left.start_time, left.end_time), (0, 4));
    assert_eq!(left.end_value, 40.0);
    assert_eq!((right.start_time, right.end_time), (4, 10));
    assert_eq!(right.start_value, 40.0);
    assert_eq!(right.value_at(7), 70.0);
}

#[test]
fn cut_bezier_keyframe_refits_handles() {
    let mut k = Keyframe::linear(0, 10, 0.0f32, 10.0);
    k.interpolation = Interpolation::Bezier;
    k.bezier_out = Point::new(0.4, 0.0);
    k.bezier_in = Point::new(0.6, 1.0);
    let original = k.clone();
    cut_keyframe(&mut k, 5, false);
    assert_eq!(k.end_time, 5);
    assert_eq!(k.end_value, original.value_at(5));
    assert_ne!(k.bezier_out, original.bezier_out);
}

#[test]
fn property_deserializes_untagged() {
    let p: Property<f32> = serde_json::from_str("2.5").unwrap();
    assert_eq!(p, Property::Static(2.5));
    let p: Property<f32> = serde_json::from_str(
        r#"[{"start_time":0,"end_time":4,"start_value":0,"end_value":4}]"#,
    )
    .unwrap();
    assert_eq!(p.value_at(2), 2.0);
}
