use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        KinemaError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(KinemaError::io("x").to_string().contains("io error:"));
    assert!(KinemaError::decode("x").to_string().contains("decode error:"));
    assert!(
        KinemaError::backend("x")
            .to_string()
            .contains("backend error:")
    );
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = KinemaError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
