use super::*;
use crate::device::Device;
use crate::device::surface::{HeadlessCanvas, MemorySurface};
use crate::engine::options::{SourceOptions, TargetOptions};
use crate::media::builtin::{CanvasMedia, ImageMedia};

fn gradient(w: u32, h: u32) -> FrameRGBA {
    let mut frame = FrameRGBA::transparent(w, h);
    for y in 0..h {
        for x in 0..w {
            let i = ((y * w + x) * 4) as usize;
            frame.data[i..i + 4].copy_from_slice(&[(x * 40) as u8, (y * 40) as u8, 0, 255]);
        }
    }
    frame
}

fn primary(engine: &mut Engine, w: u32, h: u32) -> (Rc<HeadlessCanvas>, NodeId) {
    let canvas = HeadlessCanvas::new(w, h);
    let out = engine
        .target(canvas.clone(), None, TargetOptions::default())
        .unwrap();
    (canvas, out)
}

#[test]
fn effect_pass_binds_its_program_and_inputs() {
    let mut engine = Engine::new();
    let (canvas, out) = primary(&mut engine, 8, 8);
    let src = engine
        .source(ImageMedia::loaded(gradient(8, 8)), None, SourceOptions::default())
        .unwrap();
    let fx = engine.effect("brightness-contrast").unwrap();
    engine.connect(fx, "source", src).unwrap();
    engine.set_source(out, fx).unwrap();
    engine.render().unwrap();

    let device = canvas.device();
    device.clear_draw_log();
    engine.set_input(fx, "brightness", 2.0).unwrap();
    assert!(engine.is_dirty(out).unwrap());
    engine.render().unwrap();

    let log = device.draw_log();
    assert_eq!(log.len(), 2);
    let fb = engine.graph.get(fx).unwrap().base.framebuffer.unwrap();
    assert_eq!(log[0].target, RenderTarget::Framebuffer(fb));
    assert_eq!(Some(log[0].program), engine.program_of(fx).unwrap());
    assert_eq!(log[0].uniforms["brightness"], UniformValue::Float(2.0));
    assert_eq!(
        log[0].uniforms["resolution"],
        UniformValue::Vec2([8.0, 8.0])
    );
    assert_eq!(log[1].target, RenderTarget::Screen);
    assert_eq!(
        log[1].uniforms["source"].as_texture(),
        engine.texture_of(fx).unwrap()
    );
}

#[test]
fn in_place_effect_folds_the_upstream_matrix() {
    let mut engine = Engine::new();
    let (canvas, out) = primary(&mut engine, 4, 4);
    let src = engine
        .source(ImageMedia::loaded(gradient(4, 4)), None, SourceOptions::default())
        .unwrap();
    let flip = engine.transform("flip").unwrap();
    engine.set_source(flip, src).unwrap();
    let fx = engine.effect("brightness-contrast").unwrap();
    engine.connect(fx, "source", flip).unwrap();
    engine.set_source(out, fx).unwrap();
    engine.render().unwrap();

    assert!(engine.graph.get(flip).unwrap().base.framebuffer.is_none());
    let log = canvas.device().draw_log();
    let pass = log
        .iter()
        .find(|c| matches!(c.target, RenderTarget::Framebuffer(_)))
        .unwrap();
    assert_eq!(
        pass.uniforms["transform"],
        UniformValue::Mat4(Mat4::scale(-1.0, 1.0))
    );
    let px = engine.read_pixels(fx, 0, 0, 4, 1).unwrap();
    assert_eq!(px.pixel(0, 0), Some([120, 0, 0, 255]));
}

#[test]
fn repeated_resize_allocates_nothing_new() {
    let mut engine = Engine::new();
    let (canvas, out) = primary(&mut engine, 8, 8);
    let fill = engine.effect("color").unwrap();
    engine.set_input(fill, "width", 8.0).unwrap();
    engine.set_input(fill, "height", 8.0).unwrap();
    engine.set_source(out, fill).unwrap();
    engine.render().unwrap();
    let device = canvas.device();
    let allocations = device.framebuffer_allocations();

    engine.set_input(fill, "width", 8.0).unwrap();
    assert!(!engine.resize(fill).unwrap());
    engine.render().unwrap();
    assert_eq!(device.framebuffer_allocations(), allocations);

    engine.set_input(fill, "width", 6.0).unwrap();
    engine.render().unwrap();
    assert_eq!(device.framebuffer_allocations(), allocations + 1);
    let fb = engine.graph.get(fill).unwrap().base.framebuffer.unwrap();
    assert_eq!(device.framebuffer_size(fb), Some((6, 8)));
}

#[test]
fn unflipped_sources_are_mirrored_on_upload() {
    let mut engine = Engine::new();
    let (_canvas, _out) = primary(&mut engine, 2, 2);
    let src = engine
        .source(
            ImageMedia::loaded(gradient(2, 2)),
            None,
            SourceOptions {
                flip: Some(false),
                ..SourceOptions::default()
            },
        )
        .unwrap();
    let px = engine.read_pixels(src, 0, 0, 2, 2).unwrap();
    assert_eq!(px, gradient(2, 2).flipped_vertical());
}

#[test]
fn sink_targets_receive_presented_frames() {
    let mut engine = Engine::new();
    let (_canvas, _out) = primary(&mut engine, 4, 4);
    let sink = MemorySurface::new(4, 4);
    let readback = engine
        .target(sink.clone(), None, TargetOptions::default())
        .unwrap();
    assert_eq!(engine.hook(readback).unwrap(), "readback");
    let src = engine
        .source(ImageMedia::loaded(gradient(4, 4)), None, SourceOptions::default())
        .unwrap();
    engine.set_source(readback, src).unwrap();
    engine.render_target(readback).unwrap();

    assert_eq!(sink.frames().len(), 1);
    assert_eq!(sink.last_frame(), Some(gradient(4, 4)));
    engine.render_target(readback).unwrap();
    assert_eq!(sink.frames().len(), 1);
}

#[test]
fn target_scales_a_smaller_source_to_fill() {
    let mut engine = Engine::new();
    let (canvas, out) = primary(&mut engine, 8, 8);
    let src = engine
        .source(
            ImageMedia::loaded(FrameRGBA::solid(4, 4, [7, 7, 7, 255])),
            None,
            SourceOptions::default(),
        )
        .unwrap();
    engine.set_source(out, src).unwrap();
    engine.render().unwrap();
    let call = canvas.device().draw_log().pop().unwrap();
    assert_eq!(
        call.uniforms["transform"],
        UniformValue::Mat4(Mat4::scale(0.5, 0.5))
    );
}

#[test]
fn target_scale_also_shrinks_upstream_translation() {
    let mut engine = Engine::new();
    let (canvas, out) = primary(&mut engine, 8, 8);
    let src = engine
        .source(
            ImageMedia::loaded(FrameRGBA::solid(4, 4, [7, 7, 7, 255])),
            None,
            SourceOptions::default(),
        )
        .unwrap();
    let shift = engine.transform("2d").unwrap();
    engine.set_source(shift, src).unwrap();
    engine.set_input(shift, "translate_x", 1.0).unwrap();
    engine.set_source(out, shift).unwrap();
    engine.render().unwrap();

    let call = canvas.device().draw_log().pop().unwrap();
    let UniformValue::Mat4(m) = &call.uniforms["transform"] else {
        panic!("transform uniform missing");
    };
    // One source pixel is 0.5 clip units at 4px wide, 0.25 once drawn into 8px.
    assert!((m.0[0] - 0.5).abs() < 1e-6);
    assert!((m.0[12] - 0.25).abs() < 1e-6);
}

#[test]
fn secondary_target_draws_on_its_own_device() {
    let mut engine = Engine::new();
    let (canvas, _out) = primary(&mut engine, 4, 4);
    let other = HeadlessCanvas::new(4, 4);
    let err = engine
        .target(other.clone(), None, TargetOptions::default())
        .unwrap_err();
    assert!(matches!(err, CompographError::Device(_)));

    let second = engine
        .target(
            other.clone(),
            None,
            TargetOptions {
                allow_secondary_context: true,
                ..TargetOptions::default()
            },
        )
        .unwrap();
    let src = engine
        .source(
            ImageMedia::loaded(FrameRGBA::solid(4, 4, [0, 0, 200, 255])),
            None,
            SourceOptions::default(),
        )
        .unwrap();
    engine.set_source(second, src).unwrap();
    engine.render_target(second).unwrap();

    assert_eq!(canvas.device().draws_into(RenderTarget::Screen), 0);
    assert_eq!(other.device().draws_into(RenderTarget::Screen), 1);
    assert_eq!(
        other.device().screen_pixels().unwrap().pixel(1, 1),
        Some([0, 0, 200, 255])
    );
    let px = engine.read_pixels(second, 1, 1, 1, 1).unwrap();
    assert_eq!(px.pixel(0, 0), Some([0, 0, 200, 255]));
}

#[test]
fn cross_origin_media_stops_refreshing() {
    let mut engine = Engine::new();
    let (_canvas, out) = primary(&mut engine, 2, 2);
    let src = engine
        .source(
            ImageMedia::cross_origin(FrameRGBA::solid(2, 2, [1, 1, 1, 255])),
            None,
            SourceOptions::default(),
        )
        .unwrap();
    engine.set_source(out, src).unwrap();
    engine.render().unwrap();

    assert!(engine.is_ready(src).unwrap());
    let fault = engine.node_fault(src).unwrap().unwrap();
    assert!(fault.contains("cross-origin"));
    let s = match &engine.graph.get(src).unwrap().kind {
        NodeKind::Source(s) => (s.allow_refresh, s.cross_origin),
        _ => (true, false),
    };
    assert_eq!(s, (false, true));
}

#[test]
fn canvas_redraws_reach_the_screen_after_update() {
    let mut engine = Engine::new();
    let (canvas, out) = primary(&mut engine, 2, 2);
    let media = CanvasMedia::from_frame(FrameRGBA::solid(2, 2, [0, 0, 0, 255]));
    let src = engine
        .source(media.clone(), None, SourceOptions::default())
        .unwrap();
    engine.set_source(out, src).unwrap();
    engine.render().unwrap();

    media.draw(|f| *f = FrameRGBA::solid(2, 2, [50, 60, 70, 255]));
    engine.render().unwrap();
    assert_eq!(
        canvas.device().screen_pixels().unwrap().pixel(0, 0),
        Some([0, 0, 0, 255])
    );

    engine.update_source(src).unwrap();
    engine.render().unwrap();
    assert_eq!(
        canvas.device().screen_pixels().unwrap().pixel(0, 0),
        Some([50, 60, 70, 255])
    );
}
