use super::*;
use crate::device::surface::HeadlessCanvas;
use crate::engine::options::{SourceOptions, TargetOptions};
use crate::foundation::core::FrameRGBA;
use crate::media::builtin::ImageMedia;

fn source(engine: &mut Engine, w: u32, h: u32) -> NodeId {
    engine
        .source(
            ImageMedia::loaded(FrameRGBA::solid(w, h, [9, 9, 9, 255])),
            None,
            SourceOptions::default(),
        )
        .unwrap()
}

#[test]
fn properties_round_trip_through_the_behavior() {
    let mut engine = Engine::new();
    let tf = engine.transform("2d").unwrap();
    assert_eq!(
        engine.set_input(tf, "rotation", 450.0).unwrap(),
        InputValue::Number(90.0)
    );
    assert_eq!(engine.input(tf, "rotation").unwrap(), InputValue::Number(90.0));
    assert_eq!(engine.input(tf, "scale_x").unwrap(), InputValue::Number(1.0));
    assert!(matches!(
        engine.set_input(tf, "opacity", 1.0),
        Err(CompographError::UnknownInput { .. })
    ));
}

#[test]
fn chained_transforms_compose_into_one_matrix() {
    let mut engine = Engine::new();
    let src = source(&mut engine, 10, 10);
    let inner = engine.transform("flip").unwrap();
    let outer = engine.transform("2d").unwrap();
    engine.set_source(inner, src).unwrap();
    engine.set_source(outer, inner).unwrap();
    engine.set_input(outer, "scale_x", 0.5).unwrap();
    engine.set_input(outer, "scale_y", 0.5).unwrap();

    engine.pull_node(outer, false).unwrap();
    let expected = Mat4::scale(0.5, 0.5).mul(&Mat4::scale(-1.0, 1.0));
    assert!(
        engine
            .cumulative_matrix(outer)
            .unwrap()
            .approx_eq(&expected, 1e-6)
    );
}

#[test]
fn upstream_property_change_invalidates_downstream_matrices() {
    let mut engine = Engine::new();
    let src = source(&mut engine, 10, 10);
    let inner = engine.transform("2d").unwrap();
    let outer = engine.transform("2d").unwrap();
    engine.set_source(inner, src).unwrap();
    engine.set_source(outer, inner).unwrap();
    engine.pull_node(outer, false).unwrap();
    assert_eq!(engine.cumulative_matrix(outer).unwrap(), Mat4::IDENTITY);

    engine.set_input(inner, "scale_y", 2.0).unwrap();
    let t = match &engine.graph.get(outer).unwrap().kind {
        NodeKind::Transform(t) => t.transform_dirty,
        _ => false,
    };
    assert!(t);
    engine.pull_node(outer, false).unwrap();
    assert!(
        engine
            .cumulative_matrix(outer)
            .unwrap()
            .approx_eq(&Mat4::scale(1.0, 2.0), 1e-6)
    );
}

#[test]
fn reset_method_restores_identity() {
    let mut engine = Engine::new();
    let tf = engine.transform("2d").unwrap();
    engine.set_input(tf, "translate_x", 4.0).unwrap();
    assert!(engine.call(tf, "reset").unwrap());
    assert!(!engine.call(tf, "reset").unwrap());
    assert_eq!(engine.input(tf, "translate_x").unwrap(), InputValue::Number(0.0));
    assert!(matches!(
        engine.call(tf, "spin"),
        Err(CompographError::UnknownInput { .. })
    ));
}

#[test]
fn size_follows_the_source() {
    let mut engine = Engine::new();
    let tf = engine.transform("flip").unwrap();
    assert_eq!(engine.size(tf).unwrap(), (1, 1));
    let src = source(&mut engine, 12, 7);
    engine.set_source(tf, src).unwrap();
    assert_eq!(engine.size(tf).unwrap(), (12, 7));
    assert!(engine.is_ready(tf).unwrap());

    engine.set_source(tf, NodeInput::Empty).unwrap();
    assert_eq!(engine.size(tf).unwrap(), (1, 1));
    assert!(!engine.is_ready(tf).unwrap());
    assert!(engine.targets_of(src).unwrap().is_empty());
}

#[test]
fn transforms_only_rasterize_when_pixels_are_needed() {
    let mut engine = Engine::new();
    let canvas = HeadlessCanvas::new(8, 8);
    let out = engine
        .target(canvas.clone(), None, TargetOptions::default())
        .unwrap();
    let src = source(&mut engine, 8, 8);
    let tf = engine.transform("flip").unwrap();
    engine.set_source(tf, src).unwrap();
    engine.set_source(out, tf).unwrap();
    engine.render().unwrap();
    assert!(engine.graph.get(tf).unwrap().base.framebuffer.is_none());

    // A two-input effect cannot fold the matrix into its own pass.
    let mix = engine.effect("mix").unwrap();
    engine.connect(mix, "a", tf).unwrap();
    engine.connect(mix, "b", src).unwrap();
    engine.set_source(out, mix).unwrap();
    engine.render().unwrap();
    assert!(engine.graph.get(tf).unwrap().base.framebuffer.is_some());
}

#[test]
fn sources_and_effects_reject_set_source() {
    let mut engine = Engine::new();
    let src = source(&mut engine, 2, 2);
    let fx = engine.effect("brightness-contrast").unwrap();
    assert!(matches!(
        engine.set_source(fx, src),
        Err(CompographError::WrongNodeKind { .. })
    ));
}
