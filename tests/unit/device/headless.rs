use super::*;
use crate::device::DrawOptions;
use crate::foundation::core::Affine;

fn quad_setup(dev: &mut HeadlessDevice) -> (ProgramId, ModelId) {
    let program = dev
        .compile_program(&ShaderSource::base().named("test.base"))
        .unwrap();
    let model = dev.create_model(&Geometry::unit_quad()).unwrap();
    (program, model)
}

fn draw_texture(
    program: ProgramId,
    model: ModelId,
    texture: TextureId,
    target: RenderTarget,
    transform: Mat4,
    size: (u32, u32),
) -> DrawCall {
    let mut uniforms = crate::device::Uniforms::new();
    uniforms.insert("source".into(), UniformValue::Texture(texture));
    uniforms.insert("transform".into(), UniformValue::Mat4(transform));
    DrawCall {
        program,
        model,
        target,
        uniforms,
        options: DrawOptions::pass(size.0, size.1),
    }
}

#[test]
fn identity_draw_copies_texture() {
    let mut dev = HeadlessDevice::new(4, 4);
    let (program, model) = quad_setup(&mut dev);
    let tex = dev.create_texture(4, 4).unwrap();
    dev.upload_texture(tex, &FrameRGBA::solid(4, 4, [10, 20, 30, 255]))
        .unwrap();
    let fb = dev.create_framebuffer(4, 4).unwrap();

    let call = draw_texture(
        program,
        model,
        tex,
        RenderTarget::Framebuffer(fb),
        Mat4::IDENTITY,
        (4, 4),
    );
    dev.draw(&call).unwrap();

    let out = dev
        .read_pixels(RenderTarget::Framebuffer(fb), 0, 0, 4, 4)
        .unwrap();
    assert_eq!(out, FrameRGBA::solid(4, 4, [10, 20, 30, 255]));
    assert_eq!(dev.draw_log(), vec![call]);
    assert_eq!(dev.draws_into(RenderTarget::Framebuffer(fb)), 1);
}

#[test]
fn half_scale_transform_covers_center_only() {
    let mut dev = HeadlessDevice::new(4, 4);
    let (program, model) = quad_setup(&mut dev);
    let tex = dev.create_texture(2, 2).unwrap();
    dev.upload_texture(tex, &FrameRGBA::solid(2, 2, [255, 0, 0, 255]))
        .unwrap();

    let call = draw_texture(
        program,
        model,
        tex,
        RenderTarget::Screen,
        Mat4::from_affine(Affine::scale(0.5)),
        (4, 4),
    );
    dev.draw(&call).unwrap();

    let out = dev.screen_pixels().unwrap();
    assert_eq!(out.pixel(0, 0), Some([0, 0, 0, 0]));
    assert_eq!(out.pixel(1, 1), Some([255, 0, 0, 255]));
    assert_eq!(out.pixel(2, 2), Some([255, 0, 0, 255]));
    assert_eq!(out.pixel(3, 3), Some([0, 0, 0, 0]));
}

#[test]
fn source_over_blends_with_destination() {
    assert_eq!(source_over([0, 0, 255, 255], [255, 0, 0, 255]), [255, 0, 0, 255]);
    assert_eq!(source_over([0, 0, 255, 255], [255, 0, 0, 0]), [0, 0, 255, 255]);
    let half = source_over([0, 0, 0, 255], [255, 255, 255, 128]);
    assert_eq!(half[3], 255);
    assert!((127..=129).contains(&half[0]));
}

#[test]
fn resource_counts_track_create_and_delete() {
    let mut dev = HeadlessDevice::new(2, 2);
    let fb = dev.create_framebuffer(2, 2).unwrap();
    assert_eq!(dev.live_framebuffers(), 1);
    assert_eq!(dev.live_textures(), 1);
    assert_eq!(dev.framebuffer_allocations(), 1);

    dev.resize_framebuffer(fb, 2, 2).unwrap();
    assert_eq!(dev.framebuffer_allocations(), 1);
    dev.resize_framebuffer(fb, 3, 2).unwrap();
    assert_eq!(dev.framebuffer_allocations(), 2);
    assert_eq!(dev.framebuffer_size(fb), Some((3, 2)));

    dev.delete_framebuffer(fb);
    assert_eq!(dev.live_framebuffers(), 0);
    assert_eq!(dev.live_textures(), 0);
}

#[test]
fn lost_context_kills_handles_until_restored() {
    let mut dev = HeadlessDevice::new(2, 2);
    let tex = dev.create_texture(2, 2).unwrap();
    let observer = dev.clone();

    observer.lose_context();
    assert!(dev.is_lost());
    assert!(dev.create_texture(1, 1).is_err());
    assert!(dev.texture_pixels(tex).is_none());

    observer.restore_context();
    assert!(!dev.is_lost());
    let again = dev.create_texture(1, 1).unwrap();
    assert_ne!(again, tex);
}

#[test]
fn color_uniform_fills_without_texture() {
    let mut dev = HeadlessDevice::new(2, 2);
    let fragment = "@group(1) @binding(0) var<uniform> color: vec4<f32>;\n\
                    @fragment\nfn fs_main(@location(0) tex_coord: vec2<f32>) -> @location(0) vec4<f32> {\n    return color;\n}\n";
    let program = dev
        .compile_program(&ShaderSource::with_fragment(fragment))
        .unwrap();
    let model = dev.create_model(&Geometry::unit_quad()).unwrap();
    let mut uniforms = crate::device::Uniforms::new();
    uniforms.insert("color".into(), UniformValue::Vec4([0.0, 1.0, 0.0, 1.0]));
    dev.draw(&DrawCall {
        program,
        model,
        target: RenderTarget::Screen,
        uniforms,
        options: DrawOptions::pass(2, 2),
    })
    .unwrap();
    assert_eq!(dev.screen_pixels().unwrap(), FrameRGBA::solid(2, 2, [0, 255, 0, 255]));
}

#[test]
fn reads_past_the_edge_come_back_transparent() {
    let mut dev = HeadlessDevice::new(4, 4);
    let (program, model) = quad_setup(&mut dev);
    let tex = dev.create_texture(4, 4).unwrap();
    dev.upload_texture(tex, &FrameRGBA::solid(4, 4, [9, 8, 7, 255]))
        .unwrap();
    let fb = dev.create_framebuffer(4, 4).unwrap();
    let target = RenderTarget::Framebuffer(fb);
    dev.draw(&draw_texture(program, model, tex, target, Mat4::IDENTITY, (4, 4)))
        .unwrap();

    let corner = dev.read_pixels(target, 2, 2, 4, 4).unwrap();
    assert_eq!(corner.pixel(1, 1), Some([9, 8, 7, 255]));
    assert_eq!(corner.pixel(2, 1), Some([0, 0, 0, 0]));
    assert_eq!(corner.pixel(0, 3), Some([0, 0, 0, 0]));

    let wrapped = dev.read_pixels(target, u32::MAX, u32::MAX - 1, 2, 3).unwrap();
    assert_eq!(wrapped, FrameRGBA::transparent(2, 3));
}

#[test]
fn allocations_respect_max_texture_size() {
    let limits = DeviceLimits {
        max_texture_size: 16,
        ..DeviceLimits::default()
    };
    let mut dev = HeadlessDevice::with_limits(4, 4, limits);
    assert!(dev.create_texture(16, 16).is_ok());
    assert!(matches!(
        dev.create_texture(17, 1),
        Err(CompographError::Device(_))
    ));
    assert!(dev.create_framebuffer(1, 17).is_err());

    let fb = dev.create_framebuffer(8, 8).unwrap();
    assert!(dev.resize_framebuffer(fb, 32, 8).is_err());
    assert_eq!(dev.framebuffer_size(fb), Some((8, 8)));

    let tex = dev.create_texture(1, 1).unwrap();
    assert!(dev.upload_texture(tex, &FrameRGBA::transparent(20, 1)).is_err());
    assert!(dev.read_pixels(RenderTarget::Framebuffer(fb), 0, 0, 1, 20).is_err());
}
