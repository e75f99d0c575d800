use std::cell::RefCell;
use std::rc::Rc;

use super::*;
use crate::device::surface::HeadlessCanvas;
use crate::engine::options::{SourceOptions, TargetOptions};
use crate::foundation::core::FrameRGBA;
use crate::media::builtin::ImageMedia;
use crate::plugin::inputs::InputValue;

struct Scene {
    engine: Engine,
    canvas: Rc<HeadlessCanvas>,
    src: NodeId,
    fx: NodeId,
    out: NodeId,
}

fn scene() -> Scene {
    let mut engine = Engine::new();
    let canvas = HeadlessCanvas::new(8, 8);
    let out = engine
        .target(canvas.clone(), None, TargetOptions::default())
        .unwrap();
    let src = engine
        .source(
            ImageMedia::loaded(FrameRGBA::solid(8, 8, [10, 20, 30, 255])),
            None,
            SourceOptions::default(),
        )
        .unwrap();
    let fx = engine.effect("brightness-contrast").unwrap();
    engine.connect(fx, "source", src).unwrap();
    engine.set_source(out, fx).unwrap();
    engine.render().unwrap();
    Scene {
        engine,
        canvas,
        src,
        fx,
        out,
    }
}

#[test]
fn loss_keeps_topology_and_drops_resources() {
    let Scene {
        mut engine,
        canvas,
        src,
        fx,
        out,
    } = scene();
    assert!(engine.texture_of(fx).unwrap().is_some());

    canvas.device().lose_context();
    engine.tick(0.0);
    assert!(engine.is_context_lost());
    assert!(!engine.has_context());
    assert_eq!(engine.sources_of(fx).unwrap(), vec![src]);
    assert_eq!(engine.sources_of(out).unwrap(), vec![fx]);
    assert_eq!(
        engine.input(fx, "brightness").unwrap(),
        InputValue::Number(1.0)
    );
    assert_eq!(engine.texture_of(fx).unwrap(), None);
    assert_eq!(engine.program_of(fx).unwrap(), None);
    // The daemon keeps polling for a restore.
    assert!(engine.frame_requested());
}

#[test]
fn restore_rebuilds_lazily_and_signals_every_node() {
    let Scene {
        mut engine,
        canvas,
        src,
        fx,
        out,
    } = scene();
    let device = canvas.device();
    let programs = device.live_programs();

    let events = Rc::new(RefCell::new(Vec::new()));
    for node in [src, fx, out] {
        for kind in [EventKind::ContextLost, EventKind::ContextRestored] {
            let sink = Rc::clone(&events);
            engine
                .on(node, kind, move |e| sink.borrow_mut().push((e.node, e.kind)))
                .unwrap();
        }
    }

    device.lose_context();
    engine.tick(0.0);
    assert!(!engine.restore_context().unwrap());

    device.restore_context();
    assert!(engine.restore_context().unwrap());
    assert!(engine.has_context());
    assert!(!engine.is_context_lost());
    assert!(engine.is_dirty(src).unwrap());
    assert!(engine.is_dirty(out).unwrap());
    assert_eq!(device.live_programs(), programs);

    let events = events.borrow();
    let lost = events
        .iter()
        .filter(|(_, k)| *k == EventKind::ContextLost)
        .count();
    let restored = events
        .iter()
        .filter(|(_, k)| *k == EventKind::ContextRestored)
        .count();
    assert_eq!((lost, restored), (3, 3));
    drop(events);

    engine.render().unwrap();
    assert!(engine.texture_of(fx).unwrap().is_some());
    assert_eq!(
        device.screen_pixels().unwrap().pixel(4, 4),
        Some([10, 20, 30, 255])
    );
}

#[test]
fn context_that_arrives_lost_is_not_attached() {
    let mut engine = Engine::new();
    let canvas = HeadlessCanvas::new(4, 4);
    canvas.device().lose_context();
    let out = engine
        .target(canvas.clone(), None, TargetOptions::default())
        .unwrap();
    assert!(engine.is_node(out));
    assert!(engine.is_context_lost());
    assert!(!engine.has_context());

    canvas.device().restore_context();
    engine.tick(1.0);
    assert!(engine.has_context());
}

#[test]
fn refused_context_leaves_an_inert_target() {
    let mut engine = Engine::new();
    let canvas = HeadlessCanvas::new(4, 4);
    canvas.set_contexts_enabled(false);
    let out = engine
        .target(canvas.clone(), None, TargetOptions::default())
        .unwrap();
    assert!(!engine.has_context());
    assert_eq!(engine.incompatible(None).as_deref(), Some("context"));
    assert!(engine.render_target(out).is_ok());
    assert!(canvas.device().draw_log().is_empty());
}

#[test]
fn common_programs_are_rebuilt_once_after_restore() {
    let Scene {
        mut engine, canvas, src, ..
    } = scene();
    let second = engine.effect("brightness-contrast").unwrap();
    engine.connect(second, "source", src).unwrap();
    let device = canvas.device();
    let compiles = device.compile_count();

    device.lose_context();
    engine.tick(0.0);
    device.restore_context();
    engine.tick(1.0);

    // Base program plus one shared brightness-contrast program.
    assert_eq!(device.compile_count(), compiles + 2);
    assert_eq!(device.live_programs(), 2);
}
