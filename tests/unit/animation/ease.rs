use super::*;

#[test]
fn linear_control_points_are_identity() {
    let c = CubicBezier::new(Point::new(0.0, 0.0), Point::new(1.0, 1.0));
    for i in 0..=10 {
        let x = f64::from(i) / 10.0;
        assert!((c.apply(x) - x).abs() < 1e-5, "x={x}");
    }
}

#[test]
fn ease_in_lags_behind_linear() {
    let c = CubicBezier::new(Point::new(0.42, 0.0), Point::new(1.0, 1.0));
    assert!(c.apply(0.3) < 0.3);
    assert_eq!(c.apply(0.0), 0.0);
    assert_eq!(c.apply(1.0), 1.0);
}

#[test]
fn default_interpolation_is_linear() {
    assert_eq!(Interpolation::default(), Interpolation::Linear);
}
