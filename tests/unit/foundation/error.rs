use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        FlushError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        FlushError::allocation("x")
            .to_string()
            .contains("allocation error:")
    );
    assert!(FlushError::device("x").to_string().contains("device error:"));
    assert!(
        FlushError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
    assert_eq!(FlushError::Abandoned.to_string(), "device abandoned");
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = FlushError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
