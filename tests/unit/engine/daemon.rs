use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::*;
use crate::device::RenderTarget;
use crate::device::surface::HeadlessCanvas;
use crate::engine::options::{SourceOptions, TargetOptions};
use crate::foundation::core::FrameRGBA;
use crate::foundation::ids::NodeId;
use crate::media::builtin::{ImageMedia, VideoMedia};

fn counting_requester(engine: &mut Engine) -> Rc<Cell<u32>> {
    let count = Rc::new(Cell::new(0));
    let seen = Rc::clone(&count);
    engine.set_frame_requester(move || seen.set(seen.get() + 1));
    count
}

fn attached(engine: &mut Engine) -> (Rc<HeadlessCanvas>, NodeId) {
    let canvas = HeadlessCanvas::new(4, 4);
    let out = engine
        .target(canvas.clone(), None, TargetOptions::default())
        .unwrap();
    (canvas, out)
}

#[test]
fn idle_graph_requests_nothing() {
    let mut engine = Engine::new();
    let requests = counting_requester(&mut engine);
    let (_canvas, out) = attached(&mut engine);
    let src = engine
        .source(
            ImageMedia::loaded(FrameRGBA::solid(4, 4, [1, 1, 1, 255])),
            None,
            SourceOptions::default(),
        )
        .unwrap();
    engine.set_source(out, src).unwrap();
    assert_eq!(requests.get(), 0);
    assert!(!engine.frame_requested());
}

#[test]
fn auto_target_renders_once_and_goes_idle() {
    let mut engine = Engine::new();
    let requests = counting_requester(&mut engine);
    let (canvas, out) = attached(&mut engine);
    engine.set_auto(out, true).unwrap();
    let src = engine
        .source(
            ImageMedia::loaded(FrameRGBA::solid(4, 4, [1, 1, 1, 255])),
            None,
            SourceOptions::default(),
        )
        .unwrap();
    engine.set_source(out, src).unwrap();
    assert_eq!(requests.get(), 1);

    engine.tick(16.0);
    assert_eq!(canvas.device().draws_into(RenderTarget::Screen), 1);
    assert!(!engine.frame_requested());

    engine.tick(32.0);
    assert_eq!(canvas.device().draws_into(RenderTarget::Screen), 1);
    assert_eq!(requests.get(), 1);
}

#[test]
fn callbacks_run_around_the_frame_until_stopped() {
    let mut engine = Engine::new();
    let order = Rc::new(RefCell::new(Vec::new()));
    let pre_log = Rc::clone(&order);
    let post_log = Rc::clone(&order);
    let id = engine.go(
        Some(Box::new(move |_: &mut Engine, now: f64| pre_log.borrow_mut().push(("pre", now)))),
        Some(Box::new(move |_: &mut Engine, now: f64| post_log.borrow_mut().push(("post", now)))),
    );
    assert!(engine.frame_requested());

    engine.tick(1.0);
    engine.tick(2.0);
    assert_eq!(
        *order.borrow(),
        vec![("pre", 1.0), ("post", 1.0), ("pre", 2.0), ("post", 2.0)]
    );

    engine.cancel(id);
    engine.tick(3.0);
    assert_eq!(order.borrow().len(), 4);
    assert!(!engine.frame_requested());
}

#[test]
fn stop_inside_a_callback_wins() {
    let mut engine = Engine::new();
    let runs = Rc::new(Cell::new(0));
    let seen = Rc::clone(&runs);
    engine.go(
        Some(Box::new(move |engine: &mut Engine, _: f64| {
            seen.set(seen.get() + 1);
            engine.stop();
        })),
        None,
    );
    engine.tick(0.0);
    engine.tick(1.0);
    assert_eq!(runs.get(), 1);
    assert!(!engine.frame_requested());
}

#[test]
fn go_turns_every_target_auto() {
    let mut engine = Engine::new();
    let (_canvas, out) = attached(&mut engine);
    engine.go(None, None);
    let later = HeadlessCanvas::new(4, 4);
    let second = engine
        .target(
            later.clone(),
            None,
            TargetOptions {
                render_to_texture: true,
                ..TargetOptions::default()
            },
        )
        .unwrap();
    for id in [out, second] {
        let auto = match &engine.graph.get(id).unwrap().kind {
            NodeKind::Target(t) => t.auto,
            _ => false,
        };
        assert!(auto);
    }
}

#[test]
fn go_redraws_targets_that_were_clean() {
    let mut engine = Engine::new();
    let (canvas, out) = attached(&mut engine);
    let src = engine
        .source(
            ImageMedia::loaded(FrameRGBA::solid(4, 4, [5, 5, 5, 255])),
            None,
            SourceOptions::default(),
        )
        .unwrap();
    engine.set_source(out, src).unwrap();
    engine.render().unwrap();
    assert!(!engine.is_dirty(out).unwrap());

    engine.go(None, None);
    assert!(engine.is_dirty(out).unwrap());
    assert!(!engine.is_dirty(src).unwrap());
    assert!(engine.frame_requested());
    engine.tick(0.0);
    assert_eq!(canvas.device().draws_into(RenderTarget::Screen), 2);

    // Already auto: a second go leaves the target alone.
    engine.go(None, None);
    assert!(!engine.is_dirty(out).unwrap());
}

#[test]
fn playing_video_keeps_the_daemon_armed() {
    let mut engine = Engine::new();
    let (canvas, out) = attached(&mut engine);
    engine.set_auto(out, true).unwrap();
    let video = VideoMedia::new(vec![
        FrameRGBA::solid(4, 4, [255, 0, 0, 255]),
        FrameRGBA::solid(4, 4, [0, 255, 0, 255]),
    ]);
    let src = engine
        .source(video.clone(), None, SourceOptions::default())
        .unwrap();
    assert_eq!(engine.hook(src).unwrap(), "video");
    engine.set_source(out, src).unwrap();

    engine.tick(0.0);
    assert_eq!(
        canvas.device().screen_pixels().unwrap().pixel(0, 0),
        Some([255, 0, 0, 255])
    );
    assert!(engine.frame_requested());

    engine.tick(16.0);
    assert_eq!(canvas.device().draws_into(RenderTarget::Screen), 1);

    video.advance();
    engine.tick(32.0);
    assert_eq!(canvas.device().draws_into(RenderTarget::Screen), 2);
    assert_eq!(
        canvas.device().screen_pixels().unwrap().pixel(0, 0),
        Some([0, 255, 0, 255])
    );
}

#[test]
fn render_draws_dirty_targets_without_auto() {
    let mut engine = Engine::new();
    let (canvas, out) = attached(&mut engine);
    let src = engine
        .source(
            ImageMedia::loaded(FrameRGBA::solid(4, 4, [1, 2, 3, 255])),
            None,
            SourceOptions::default(),
        )
        .unwrap();
    engine.set_source(out, src).unwrap();
    assert!(engine.render().is_ok());
    assert_eq!(canvas.device().draws_into(RenderTarget::Screen), 1);
}
