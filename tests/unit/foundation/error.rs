use super::*;
use crate::foundation::ids::EngineId;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        CompographError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        CompographError::device("x")
            .to_string()
            .contains("device error:")
    );
    assert!(
        CompographError::unknown_kind("effect", "nope")
            .to_string()
            .contains("unknown effect: nope")
    );
}

#[test]
fn structural_errors_are_classified() {
    let id = NodeId {
        engine: EngineId(7),
        seq: 1,
    };
    assert!(
        CompographError::CyclicConnection {
            node: id,
            source_node: id
        }
        .is_structural()
    );
    assert!(CompographError::ForeignNode(id).is_structural());
    assert!(CompographError::UnknownSourceType.is_structural());
    assert!(!CompographError::CrossOriginMedia(id).is_structural());
    assert!(!CompographError::validation("x").is_structural());
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = CompographError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
