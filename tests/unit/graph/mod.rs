use std::cell::Cell;
use std::rc::Rc;

use super::*;
use crate::device::surface::HeadlessCanvas;
use crate::engine::Engine;
use crate::engine::options::{SourceOptions, TargetOptions};
use crate::foundation::core::FrameRGBA;
use crate::graph::node::EventKind;
use crate::media::builtin::ImageMedia;

fn chain(engine: &mut Engine) -> (NodeId, NodeId, NodeId) {
    let src = engine
        .source(
            ImageMedia::loaded(FrameRGBA::solid(8, 8, [1, 2, 3, 255])),
            None,
            SourceOptions::default(),
        )
        .unwrap();
    let fx = engine.effect("brightness-contrast").unwrap();
    engine.connect(fx, "source", src).unwrap();
    let tf = engine.transform("2d").unwrap();
    engine.set_source(tf, fx).unwrap();
    (src, fx, tf)
}

#[test]
fn ids_from_another_engine_are_foreign() {
    let mut a = Engine::new();
    let b = Engine::new();
    let (src, _, _) = chain(&mut a);
    assert!(matches!(
        b.graph.check(src),
        Err(CompographError::ForeignNode(id)) if id == src
    ));
    assert!(a.graph.check(src).is_ok());
}

#[test]
fn upstream_walk_is_transitive_and_directed() {
    let mut engine = Engine::new();
    let (src, fx, tf) = chain(&mut engine);
    assert!(engine.graph.is_upstream(src, tf));
    assert!(engine.graph.is_upstream(fx, tf));
    assert!(engine.graph.is_upstream(tf, tf));
    assert!(!engine.graph.is_upstream(tf, src));
}

#[test]
fn back_edges_never_point_at_self() {
    let mut engine = Engine::new();
    let (src, fx, _) = chain(&mut engine);
    engine.graph.link(src, src);
    engine.graph.link(src, fx);
    assert_eq!(engine.graph.get(src).unwrap().base.targets, vec![fx]);
}

#[test]
fn shared_upstream_is_listed_once() {
    let mut engine = Engine::new();
    let (src, _, _) = chain(&mut engine);
    let mix = engine.effect("mix").unwrap();
    engine.connect(mix, "a", src).unwrap();
    engine.connect(mix, "b", src).unwrap();
    assert_eq!(engine.graph.get(mix).unwrap().sources(), vec![src]);
    assert_eq!(
        engine
            .graph
            .get(src)
            .unwrap()
            .base
            .targets
            .iter()
            .filter(|t| **t == mix)
            .count(),
        1
    );

    // One slot going away keeps the edge alive for the other.
    engine.disconnect(mix, "a").unwrap();
    assert!(engine.graph.get(src).unwrap().base.targets.contains(&mix));
    engine.disconnect(mix, "b").unwrap();
    assert!(!engine.graph.get(src).unwrap().base.targets.contains(&mix));
}

#[test]
fn dirty_walk_stops_at_dirty_nodes() {
    let mut engine = Engine::new();
    let canvas = HeadlessCanvas::new(8, 8);
    let (_, fx, tf) = chain(&mut engine);
    let out = engine
        .target(canvas.clone(), None, TargetOptions::default())
        .unwrap();
    engine.set_source(out, tf).unwrap();
    engine.render().unwrap();
    assert!(!engine.is_dirty(out).unwrap());

    let hits = Rc::new(Cell::new(0));
    let seen = Rc::clone(&hits);
    engine
        .on(out, EventKind::Dirty, move |_| seen.set(seen.get() + 1))
        .unwrap();

    engine.set_input(fx, "brightness", 2.0).unwrap();
    engine.set_input(fx, "brightness", 3.0).unwrap();
    assert_eq!(hits.get(), 1);
    assert!(engine.is_dirty(tf).unwrap());
}

#[test]
fn creation_order_is_iteration_order() {
    let mut engine = Engine::new();
    let (src, fx, tf) = chain(&mut engine);
    assert_eq!(engine.graph.ids(), vec![src, fx, tf]);
    assert_eq!(engine.graph.ids_of(NodeRole::Effect), vec![fx]);
}
