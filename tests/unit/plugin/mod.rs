use super::*;
use crate::device::Geometry;
use crate::device::headless::HeadlessDevice;
use crate::device::shader::ShaderSource;

#[test]
fn default_draw_targets_own_framebuffer() {
    let mut device = HeadlessDevice::new(8, 8);
    let probe = device.clone();
    let program = device.compile_program(&ShaderSource::base()).expect("program");
    let model = device.create_model(&Geometry::unit_quad()).expect("model");
    let framebuffer = device.create_framebuffer(4, 4).expect("framebuffer");
    let node = NodeId {
        engine: crate::foundation::ids::EngineId(1),
        seq: 1,
    };
    let inputs = InputValues::new();

    let mut pass = EffectPass {
        device: &mut device,
        node,
        program,
        model,
        framebuffer,
        uniforms: Uniforms::new(),
        inputs: &inputs,
        width: 4,
        height: 4,
    };
    pass.draw_default().expect("draw");

    let log = probe.draw_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].target, RenderTarget::Framebuffer(framebuffer));
    assert_eq!(log[0].options, DrawOptions::pass(4, 4));
}
