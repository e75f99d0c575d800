use super::*;

#[test]
fn identity_is_neutral_for_mul() {
    let m = Mat4::from_affine(Affine::translate((3.0, -4.0)) * Affine::scale(2.0));
    assert_eq!(Mat4::IDENTITY.mul(&m), m);
    assert_eq!(m.mul(&Mat4::IDENTITY), m);
}

#[test]
fn mul_applies_rhs_first() {
    let t = Mat4::from_affine(Affine::translate((10.0, 0.0)));
    let s = Mat4::from_affine(Affine::scale(2.0));
    // scale after translate: the translation is scaled too
    let m = s.mul(&t);
    assert!(m.approx_eq(
        &Mat4::from_affine(Affine::scale(2.0) * Affine::translate((10.0, 0.0))),
        1e-6
    ));
    assert_eq!(m.0[12], 20.0);
}

#[test]
fn affine_roundtrip_keeps_coefficients() {
    let a = Affine::rotate(0.5).then_translate(kurbo::Vec2::new(1.0, 2.0));
    let back = Mat4::from_affine(a).to_affine();
    for (x, y) in a.as_coeffs().iter().zip(back.as_coeffs().iter()) {
        assert!((x - y).abs() < 1e-6);
    }
}

#[test]
fn scale_after_translation_scales_offset() {
    let m = Mat4::scale(0.5, 2.0).mul(&Mat4::from_affine(Affine::translate((4.0, 3.0))));
    assert_eq!(m.0[0], 0.5);
    assert_eq!(m.0[5], 2.0);
    assert_eq!(m.0[12], 2.0);
    assert_eq!(m.0[13], 6.0);
}
