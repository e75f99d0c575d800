//! Plugin contracts for the four node roles, plus the input schema they declare.
//!
//! A plugin describes a node *kind*; the engine instantiates nodes from it. Every optional
//! callback has a default, so the smallest effect plugin is a title, an input list and (usually)
//! a fragment shader.

use std::collections::BTreeMap;

use crate::device::shader::ShaderSource;
use crate::device::surface::SurfaceRef;
use crate::device::{
    Device, DeviceLimits, DrawCall, DrawOptions, FramebufferId, ModelId, ProgramId, RenderTarget,
    Uniforms,
};
use crate::engine::options::SourceOptions;
use crate::engine::options::TargetOptions;
use crate::foundation::core::FrameRGBA;
use crate::foundation::error::CompographResult;
use crate::foundation::ids::NodeId;
use crate::foundation::math::Mat4;
use crate::media::{MediaError, MediaRef, same_media};

pub mod builtin;
pub mod inputs;
pub mod registry;
pub mod validate;

use inputs::{InputSpec, InputValue, InputValues};

/// Everything an effect draw needs, handed to [`EffectPlugin::draw`].
pub struct EffectPass<'a> {
    pub(crate) device: &'a mut dyn Device,
    pub(crate) node: NodeId,
    pub(crate) program: ProgramId,
    pub(crate) model: ModelId,
    pub(crate) framebuffer: FramebufferId,
    pub(crate) uniforms: Uniforms,
    pub(crate) inputs: &'a InputValues,
    pub(crate) width: u32,
    pub(crate) height: u32,
}

impl EffectPass<'_> {
    /// Node being drawn.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Current input values.
    pub fn inputs(&self) -> &InputValues {
        self.inputs
    }

    /// Program built for this node.
    pub fn program(&self) -> ProgramId {
        self.program
    }

    /// Shared quad geometry.
    pub fn model(&self) -> ModelId {
        self.model
    }

    /// The node's own framebuffer.
    pub fn framebuffer(&self) -> FramebufferId {
        self.framebuffer
    }

    /// Output size.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Uniforms prepared from inputs, sources, `transform` and `resolution`.
    pub fn uniforms(&self) -> &Uniforms {
        &self.uniforms
    }

    /// Mutable access to the prepared uniforms.
    pub fn uniforms_mut(&mut self) -> &mut Uniforms {
        &mut self.uniforms
    }

    /// The device, for multi-pass plugins that allocate scratch resources.
    pub fn device(&mut self) -> &mut dyn Device {
        &mut *self.device
    }

    /// One textured-quad draw of `program` into `target`.
    pub fn draw(
        &mut self,
        program: ProgramId,
        uniforms: Uniforms,
        target: RenderTarget,
        options: DrawOptions,
    ) -> CompographResult<()> {
        self.device.draw(&DrawCall {
            program,
            model: self.model,
            target,
            uniforms,
            options,
        })
    }

    /// The default draw: the node program, prepared uniforms, own framebuffer.
    pub fn draw_default(&mut self) -> CompographResult<()> {
        let uniforms = self.uniforms.clone();
        let target = RenderTarget::Framebuffer(self.framebuffer);
        let options = DrawOptions::pass(self.width, self.height);
        self.draw(self.program, uniforms, target, options)
    }
}

/// An effect kind: a shader pass over named, typed inputs.
pub trait EffectPlugin {
    /// Human title.
    fn title(&self) -> &str;

    /// Human description.
    fn description(&self) -> &str {
        ""
    }

    /// Declared inputs, in display order.
    fn inputs(&self) -> Vec<InputSpec>;

    /// The shader depends only on uniforms, so one program serves every instance.
    fn common_shader(&self) -> bool {
        false
    }

    /// With exactly one image input, the upstream transform is applied while drawing this pass.
    fn in_place(&self) -> bool {
        false
    }

    /// Program for the current inputs. `None` uses the base pass-through pair.
    fn shader(&self, _inputs: &InputValues, _base: &ShaderSource) -> Option<ShaderSource> {
        None
    }

    /// Whether image input `input` is needed given the current inputs.
    fn requires(&self, _input: &str, _inputs: &InputValues) -> bool {
        true
    }

    /// Output size from inputs and connected source sizes. `None` uses the default rules.
    fn resize(
        &self,
        _inputs: &InputValues,
        _sources: &BTreeMap<String, (u32, u32)>,
    ) -> Option<(u32, u32)> {
        None
    }

    /// Called once per node after construction.
    fn initialize(&self, _node: NodeId) {}

    /// Issue the draw(s) for one render.
    fn draw(&self, pass: &mut EffectPass<'_>) -> CompographResult<()> {
        pass.draw_default()
    }

    /// The device context holding this node's resources went away.
    fn lost_context(&self, _node: NodeId) {}

    /// The node is being destroyed.
    fn destroy(&self, _node: NodeId) {}

    /// Whether this effect can run on a device with `limits`.
    fn compatible(&self, _limits: &DeviceLimits) -> bool {
        true
    }
}

/// A source adapter: turns a media handle into uploadable pixels.
pub trait SourcePlugin {
    /// Human title.
    fn title(&self) -> &str;

    /// Whether this adapter handles `media`. `forced` is set when the caller named this hook.
    fn probe(&self, media: &MediaRef, options: &SourceOptions, forced: bool) -> bool;

    /// Whether `candidate` is the same media as the one `existing` already adapts.
    fn compare(&self, existing: &MediaRef, candidate: &MediaRef) -> bool {
        same_media(existing, candidate)
    }

    /// Texture allocation must wait for the media to load.
    fn defer_texture(&self, media: &MediaRef) -> bool {
        !media.is_loaded()
    }

    /// The media changed since `uploaded_version` and needs re-upload.
    fn check_dirty(&self, _media: &MediaRef, _uploaded_version: Option<u64>) -> bool {
        false
    }

    /// The render daemon must keep polling [`SourcePlugin::check_dirty`] every frame.
    fn polls(&self) -> bool {
        false
    }

    /// Pixels to upload.
    fn pixels(&self, media: &MediaRef) -> Result<FrameRGBA, MediaError> {
        media.pixels()
    }

    /// The node is being destroyed.
    fn destroy(&self, _node: NodeId) {}

    /// Whether this adapter works on a device with `limits`.
    fn compatible(&self, _limits: &DeviceLimits) -> bool {
        true
    }
}

/// Per-node state of a transform kind.
pub trait TransformBehavior {
    /// Node-local matrix in clip space.
    fn matrix(&self) -> Mat4;

    /// Whether the matrix differs from identity; pass-through transforms are free.
    fn transformed(&self) -> bool;

    /// Current value of a property.
    fn get(&self, name: &str) -> Option<InputValue>;

    /// Apply an already-validated property. Returns whether the matrix changed.
    fn set(&mut self, name: &str, value: &InputValue) -> bool;

    /// Invoke a zero-argument method. Returns whether the matrix changed.
    fn call(&mut self, _method: &str) -> bool {
        false
    }

    /// The node's size changed. Returns whether the matrix changed.
    fn resize(&mut self, _width: u32, _height: u32) -> bool {
        false
    }
}

/// A transform kind.
pub trait TransformPlugin {
    /// Human title.
    fn title(&self) -> &str;

    /// Human description.
    fn description(&self) -> &str {
        ""
    }

    /// Declared properties.
    fn inputs(&self) -> Vec<InputSpec>;

    /// Zero-argument method names.
    fn methods(&self) -> Vec<String> {
        Vec::new()
    }

    /// Fresh per-node state.
    fn instantiate(&self) -> Box<dyn TransformBehavior>;
}

/// A target adapter for surfaces the engine cannot open a context on directly.
pub trait TargetPlugin {
    /// Human title.
    fn title(&self) -> &str;

    /// Whether this adapter handles `surface`. `forced` is set when the caller named this hook.
    fn probe(&self, surface: &SurfaceRef, options: &TargetOptions, forced: bool) -> bool;

    /// Deliver a rendered frame.
    fn present(&self, surface: &SurfaceRef, frame: &FrameRGBA) -> CompographResult<()> {
        surface.present(frame);
        Ok(())
    }

    /// The node is being destroyed.
    fn destroy(&self, _node: NodeId) {}
}

#[cfg(test)]
#[path = "../../tests/unit/plugin/mod.rs"]
mod tests;
