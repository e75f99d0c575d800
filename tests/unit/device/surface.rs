use super::*;

#[test]
fn canvas_contexts_share_device_state() {
    let canvas = HeadlessCanvas::new(8, 6);
    let mut ctx = canvas.create_context().unwrap();
    assert_eq!(ctx.screen_size(), (8, 6));
    ctx.create_texture(1, 1).unwrap();
    assert_eq!(canvas.device().live_textures(), 1);

    canvas.set_size(4, 4);
    assert_eq!(ctx.screen_size(), (4, 4));
}

#[test]
fn canvas_can_refuse_contexts() {
    let canvas = HeadlessCanvas::new(1, 1);
    canvas.set_contexts_enabled(false);
    assert!(canvas.create_context().is_none());
}

#[test]
fn memory_surface_collects_frames() {
    let sink = MemorySurface::new(2, 2);
    assert_eq!(sink.kind(), SurfaceKind::Sink);
    assert!(sink.create_context().is_none());
    sink.present(&FrameRGBA::solid(2, 2, [1, 1, 1, 1]));
    assert_eq!(sink.frames().len(), 1);
    assert_eq!(sink.last_frame().unwrap().pixel(0, 0), Some([1, 1, 1, 1]));
}

#[test]
fn registry_reports_other_owners() {
    let reg = SurfaceRegistry::new();
    let key = SurfaceKey::next();
    let (a, b) = (EngineId::next(), EngineId::next());
    assert!(reg.claim(key, a).is_empty());
    assert!(reg.claim(key, a).is_empty());
    assert_eq!(reg.claim(key, b), vec![a]);
    reg.release(key, a);
    assert_eq!(reg.owners(key), vec![b]);
    reg.release(key, b);
    assert!(reg.owners(key).is_empty());
}
