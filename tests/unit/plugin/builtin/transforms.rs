use super::*;

#[test]
fn affine_starts_as_pass_through() {
    let state = Affine2d.instantiate();
    assert!(!state.transformed());
    assert_eq!(state.matrix(), Mat4::IDENTITY);
    assert_eq!(state.get("scale_x"), Some(InputValue::Number(1.0)));
}

#[test]
fn translation_is_in_pixels() {
    let mut state = Affine2d.instantiate();
    state.resize(100, 50);
    assert!(state.set("translate_x", &InputValue::Number(25.0)));
    assert!(state.transformed());
    // 25px of a 100px-wide node is a quarter of clip space width (2.0)
    let m = state.matrix();
    assert!((m.0[12] - 0.5).abs() < 1e-6);
    assert!(!state.set("translate_x", &InputValue::Number(25.0)));
}

#[test]
fn reset_restores_identity() {
    let mut state = Affine2d.instantiate();
    state.set("rotation", &InputValue::Number(90.0));
    assert!(state.call("reset"));
    assert!(!state.transformed());
    assert!(!state.call("nope"));
}

#[test]
fn flip_mirrors_one_axis() {
    let mut state = Flip.instantiate();
    assert!(state.transformed());
    assert_eq!(state.matrix().0[0], -1.0);
    assert!(state.set("direction", &InputValue::from("vertical")));
    assert_eq!(state.matrix().0[0], 1.0);
    assert_eq!(state.matrix().0[5], -1.0);
    assert_eq!(state.get("direction"), Some(InputValue::from("vertical")));
}
