use std::cell::Cell;
use std::rc::Rc;

use super::*;
use crate::device::DeviceLimits;
use crate::device::headless::HeadlessDevice;
use crate::device::surface::{DrawingSurface, HeadlessCanvas, MemorySurface, SurfaceRef};
use crate::engine::options::{SourceOptions, TargetOptions};
use crate::media::builtin::ImageMedia;
use crate::plugin::EffectPlugin;
use crate::plugin::inputs::InputSpec;

fn image_source(engine: &mut Engine, w: u32, h: u32) -> NodeId {
    engine
        .source(
            ImageMedia::loaded(FrameRGBA::solid(w, h, [200, 100, 50, 255])),
            None,
            SourceOptions::default(),
        )
        .unwrap()
}

struct LimitedCanvas {
    key: crate::device::surface::SurfaceKey,
    device: HeadlessDevice,
}

impl DrawingSurface for LimitedCanvas {
    fn key(&self) -> crate::device::surface::SurfaceKey {
        self.key
    }

    fn kind(&self) -> crate::device::surface::SurfaceKind {
        crate::device::surface::SurfaceKind::Canvas
    }

    fn size(&self) -> (u32, u32) {
        (4, 4)
    }

    fn set_size(&self, _width: u32, _height: u32) {}

    fn create_context(&self) -> Option<Box<dyn crate::device::Device>> {
        Some(Box::new(self.device.clone()))
    }
}

struct NeedsEightUnits;

impl EffectPlugin for NeedsEightUnits {
    fn title(&self) -> &str {
        "wide"
    }

    fn inputs(&self) -> Vec<InputSpec> {
        Vec::new()
    }

    fn compatible(&self, limits: &DeviceLimits) -> bool {
        limits.max_texture_units >= 8
    }
}

#[test]
fn listeners_fire_until_removed() {
    let mut engine = Engine::new();
    let fx = engine.effect("brightness-contrast").unwrap();
    let src = image_source(&mut engine, 4, 4);

    let hits = Rc::new(Cell::new(0));
    let seen = Rc::clone(&hits);
    let id = engine
        .on(fx, EventKind::Ready, move |e| {
            assert_eq!(e.kind, EventKind::Ready);
            seen.set(seen.get() + 1);
        })
        .unwrap();
    engine.connect(fx, "source", src).unwrap();
    assert_eq!(hits.get(), 1);

    assert!(engine.off(fx, id).unwrap());
    assert!(!engine.off(fx, id).unwrap());
    engine.disconnect(fx, "source").unwrap();
    engine.connect(fx, "source", src).unwrap();
    assert_eq!(hits.get(), 1);
}

#[test]
fn defaults_merge_from_json() {
    let mut engine = Engine::new();
    engine
        .set_defaults_json(r#"{"brightness-contrast": {"brightness": 0.5}}"#)
        .unwrap();
    engine
        .set_defaults_json(r#"{"brightness-contrast": {"contrast": 2}}"#)
        .unwrap();
    let defaults = engine.defaults("brightness-contrast").unwrap();
    assert_eq!(defaults.len(), 2);

    let fx = engine.effect("brightness-contrast").unwrap();
    assert_eq!(engine.input(fx, "brightness").unwrap(), InputValue::Number(0.5));
    assert_eq!(engine.input(fx, "contrast").unwrap(), InputValue::Number(2.0));

    let err = engine.set_defaults_json("{not json").unwrap_err();
    assert!(err.to_string().contains("defaults json"));

    engine.clear_defaults(Some("brightness-contrast"));
    assert!(engine.defaults("brightness-contrast").is_none());
}

#[test]
fn incompatibility_reports_context_then_plugin() {
    let mut engine = Engine::new();
    engine
        .registry_mut()
        .register_effect("wide", NeedsEightUnits)
        .unwrap();
    assert_eq!(engine.incompatible(None).as_deref(), Some("context"));

    let limits = DeviceLimits {
        max_texture_units: 4,
        ..DeviceLimits::default()
    };
    let surface: SurfaceRef = Rc::new(LimitedCanvas {
        key: crate::device::surface::SurfaceKey::next(),
        device: HeadlessDevice::with_limits(4, 4, limits),
    });
    engine.target(surface, None, TargetOptions::default()).unwrap();
    assert_eq!(engine.incompatible(None).as_deref(), Some("plugin-wide"));
    assert_eq!(engine.incompatible(Some("mix")), None);
}

#[test]
fn destroying_a_node_empties_consumer_slots() {
    let mut engine = Engine::new();
    let src = image_source(&mut engine, 4, 4);
    let fx = engine.effect("brightness-contrast").unwrap();
    let tf = engine.transform("flip").unwrap();
    engine.connect(fx, "source", src).unwrap();
    engine.set_source(tf, fx).unwrap();
    engine.alias(fx, "brightness", "glow").unwrap();

    engine.destroy_node(fx).unwrap();
    assert!(!engine.is_node(fx));
    assert!(engine.targets_of(src).unwrap().is_empty());
    assert!(engine.sources_of(tf).unwrap().is_empty());
    assert!(!engine.is_ready(tf).unwrap());
    assert!(engine.aliases().is_empty());
    assert!(matches!(
        engine.destroy_node(fx),
        Err(CompographError::NodeNotFound(_))
    ));
}

#[test]
fn destroying_the_primary_target_drops_the_context() {
    let mut engine = Engine::new();
    let canvas = HeadlessCanvas::new(4, 4);
    let out = engine
        .target(canvas.clone(), None, TargetOptions::default())
        .unwrap();
    let device = canvas.device();
    assert!(engine.has_context());
    assert!(device.live_programs() > 0);

    engine.destroy_node(out).unwrap();
    assert!(!engine.has_context());
    assert_eq!(device.live_programs(), 0);
    assert_eq!(device.live_models(), 0);
}

#[test]
fn destroyed_engine_refuses_new_nodes() {
    let registry = SurfaceRegistry::new();
    let mut engine = Engine::with_options(EngineOptions {
        surfaces: registry.clone(),
        ..EngineOptions::default()
    });
    let sink = MemorySurface::new(4, 4);
    engine.target(sink.clone(), None, TargetOptions::default()).unwrap();
    image_source(&mut engine, 2, 2);
    assert_eq!(registry.owners(sink.key()), vec![engine.id()]);

    engine.destroy();
    assert!(engine.is_destroyed());
    assert!(engine.nodes().is_empty());
    assert!(registry.owners(sink.key()).is_empty());
    assert!(matches!(
        engine.effect("mix"),
        Err(CompographError::Validation(_))
    ));
}

#[test]
fn removing_a_plugin_destroys_its_nodes() {
    let mut engine = Engine::new();
    let a = engine.effect("mix").unwrap();
    let b = engine.effect("brightness-contrast").unwrap();
    engine.connect(b, "source", a).unwrap();

    assert!(engine.remove_effect_plugin("mix"));
    assert!(!engine.is_node(a));
    assert!(engine.is_node(b));
    assert!(!engine.registry().has_effect("mix"));
    assert!(matches!(
        engine.effect("mix"),
        Err(CompographError::UnknownNodeKind { .. })
    ));
    assert!(!engine.remove_effect_plugin("mix"));
}

#[test]
fn read_pixels_needs_a_context() {
    let mut engine = Engine::new();
    let src = image_source(&mut engine, 2, 2);
    assert!(matches!(
        engine.read_pixels(src, 0, 0, 2, 2),
        Err(CompographError::NoContext)
    ));
}

#[test]
fn queries_reject_wrong_roles() {
    let mut engine = Engine::new();
    let src = image_source(&mut engine, 3, 5);
    assert_eq!(engine.node_kind(src).unwrap(), NodeRole::Source);
    assert_eq!(engine.hook(src).unwrap(), "image");
    assert_eq!(engine.size(src).unwrap(), (3, 5));
    assert!(matches!(
        engine.input(src, "brightness"),
        Err(CompographError::WrongNodeKind { .. })
    ));
    assert!(matches!(
        engine.inputs(src),
        Err(CompographError::WrongNodeKind { .. })
    ));
}

#[test]
fn read_pixels_clips_rectangles_past_the_edge() {
    let mut engine = Engine::new();
    engine
        .target(HeadlessCanvas::new(4, 4), None, TargetOptions::default())
        .unwrap();
    let src = image_source(&mut engine, 4, 4);

    let px = engine.read_pixels(src, 3, 0, 2, 1).unwrap();
    assert_eq!(px.pixel(0, 0), Some([200, 100, 50, 255]));
    assert_eq!(px.pixel(1, 0), Some([0, 0, 0, 0]));

    let px = engine.read_pixels(src, u32::MAX, 0, 2, 1).unwrap();
    assert_eq!(px, FrameRGBA::transparent(2, 1));
}

#[test]
fn oversized_effect_faults_while_siblings_render() {
    let mut engine = Engine::new();
    let out = engine
        .target(HeadlessCanvas::new(4, 4), None, TargetOptions::default())
        .unwrap();
    let huge = engine.effect("color").unwrap();
    engine.set_input(huge, "width", 20000.0).unwrap();
    engine.set_input(huge, "height", 2.0).unwrap();
    engine.set_source(out, huge).unwrap();
    let src = image_source(&mut engine, 4, 4);
    let sibling = engine.effect("brightness-contrast").unwrap();
    engine.connect(sibling, "source", src).unwrap();
    assert!(engine.is_ready(out).unwrap());

    assert!(matches!(engine.render(), Err(CompographError::Device(_))));
    assert!(engine.node_fault(huge).unwrap().is_some());
    assert!(!engine.is_ready(huge).unwrap());
    assert!(!engine.is_ready(out).unwrap());
    assert!(engine.render().is_ok());

    let px = engine.read_pixels(sibling, 0, 0, 1, 1).unwrap();
    assert_eq!(px.pixel(0, 0), Some([200, 100, 50, 255]));
    assert!(engine.node_fault(sibling).unwrap().is_none());
}
