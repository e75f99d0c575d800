//! The GPU seam: the [`Device`] trait, handles, draw calls and drawing surfaces.
//!
//! Graph nodes never touch a graphics API directly. Everything that allocates or draws goes
//! through a [`Device`], so a device context can be dropped and rebuilt without touching graph
//! topology. [`headless::HeadlessDevice`] is the CPU implementation used by tests and headless
//! hosts.

use std::collections::BTreeMap;
use std::fmt;

use crate::device::shader::{ShaderCompileError, ShaderSource};
use crate::foundation::core::FrameRGBA;
use crate::foundation::error::CompographResult;
use crate::foundation::math::Mat4;

pub mod headless;
pub mod shader;
pub mod surface;

/// Texture handle, valid only for the device that created it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureId(pub u64);

/// Framebuffer handle. Every framebuffer owns one color texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FramebufferId(pub u64);

/// Compiled shader program handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProgramId(pub u64);

/// Uploaded geometry handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModelId(pub u64);

/// Where a draw lands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderTarget {
    /// The surface's own (default) framebuffer.
    Screen,
    /// An offscreen framebuffer.
    Framebuffer(FramebufferId),
}

/// Blend equation applied by a draw.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BlendMode {
    /// Overwrite destination (`ONE, ZERO`). Used for intermediate passes.
    #[default]
    Replace,
    /// Straight-alpha source-over (`SRC_ALPHA, ONE_MINUS_SRC_ALPHA`). Used for final output.
    SourceOver,
}

/// Per-draw state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawOptions {
    /// Blend equation.
    pub blend: BlendMode,
    /// Clear the destination to transparent before drawing.
    pub clear: bool,
    /// Viewport width.
    pub width: u32,
    /// Viewport height.
    pub height: u32,
}

impl DrawOptions {
    /// Default options for an intermediate pass of the given size.
    pub fn pass(width: u32, height: u32) -> Self {
        Self {
            blend: BlendMode::Replace,
            clear: true,
            width,
            height,
        }
    }

    /// Options used for the final draw into a target.
    pub fn output(width: u32, height: u32) -> Self {
        Self {
            blend: BlendMode::SourceOver,
            clear: true,
            width,
            height,
        }
    }
}

/// Value bound to a shader uniform.
#[derive(Clone, Debug, PartialEq)]
pub enum UniformValue {
    /// `f32`.
    Float(f32),
    /// `i32`.
    Int(i32),
    /// Boolean (bound as `0`/`1`).
    Bool(bool),
    /// `vec2<f32>`.
    Vec2([f32; 2]),
    /// `vec3<f32>`.
    Vec3([f32; 3]),
    /// `vec4<f32>`.
    Vec4([f32; 4]),
    /// `mat4x4<f32>`.
    Mat4(Mat4),
    /// Sampled texture.
    Texture(TextureId),
}

impl UniformValue {
    /// Texture handle, if this is a texture binding.
    pub fn as_texture(&self) -> Option<TextureId> {
        match self {
            Self::Texture(t) => Some(*t),
            _ => None,
        }
    }

    /// Scalar value, if this is a float.
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }
}

/// Uniforms for a draw, keyed by shader name.
pub type Uniforms = BTreeMap<String, UniformValue>;

/// A single draw request.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawCall {
    /// Program to bind.
    pub program: ProgramId,
    /// Geometry to draw.
    pub model: ModelId,
    /// Destination.
    pub target: RenderTarget,
    /// Uniform values.
    pub uniforms: Uniforms,
    /// Blend/clear/viewport state.
    pub options: DrawOptions,
}

/// Indexed triangle geometry with texture coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Geometry {
    /// Vertex positions in clip space.
    pub positions: Vec<[f32; 3]>,
    /// Texture coordinates, one per vertex.
    pub tex_coords: Vec<[f32; 2]>,
    /// Triangle list indices.
    pub indices: Vec<u16>,
}

impl Geometry {
    /// The full-viewport quad every node draws with.
    pub fn unit_quad() -> Self {
        Self {
            positions: vec![
                [-1.0, -1.0, 0.0],
                [1.0, -1.0, 0.0],
                [1.0, 1.0, 0.0],
                [-1.0, 1.0, 0.0],
            ],
            tex_coords: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }
}

/// Device capability limits, reported alongside shader failures.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DeviceLimits {
    /// Maximum sampled textures per program.
    pub max_texture_units: u32,
    /// Maximum uniform vectors per stage.
    pub max_uniform_vectors: u32,
    /// Maximum varyings between stages.
    pub max_varyings: u32,
    /// Maximum vertex attributes.
    pub max_vertex_attributes: u32,
    /// Maximum texture edge length.
    pub max_texture_size: u32,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            max_texture_units: 16,
            max_uniform_vectors: 256,
            max_varyings: 15,
            max_vertex_attributes: 16,
            max_texture_size: 8192,
        }
    }
}

impl fmt::Display for DeviceLimits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MAX_TEXTURE_IMAGE_UNITS={} MAX_UNIFORM_VECTORS={} MAX_VARYING_VECTORS={} \
             MAX_VERTEX_ATTRIBS={} MAX_TEXTURE_SIZE={}",
            self.max_texture_units,
            self.max_uniform_vectors,
            self.max_varyings,
            self.max_vertex_attributes,
            self.max_texture_size
        )
    }
}

/// A device context.
///
/// Handles are only meaningful for the device that produced them. Once [`Device::is_lost`]
/// reports `true`, every handle is dead and the owner must rebuild from a fresh context.
pub trait Device {
    /// Capability limits.
    fn limits(&self) -> DeviceLimits;

    /// Whether the context has been lost.
    fn is_lost(&self) -> bool;

    /// Size of the default framebuffer ([`RenderTarget::Screen`]).
    fn screen_size(&self) -> (u32, u32);

    /// Resize the default framebuffer.
    fn set_screen_size(&mut self, width: u32, height: u32);

    /// Allocate a transparent texture.
    fn create_texture(&mut self, width: u32, height: u32) -> CompographResult<TextureId>;

    /// Replace a texture's contents (and size) with `frame`.
    fn upload_texture(&mut self, texture: TextureId, frame: &FrameRGBA) -> CompographResult<()>;

    /// Release a texture. Unknown handles are ignored.
    fn delete_texture(&mut self, texture: TextureId);

    /// Allocate an offscreen framebuffer with its own color texture.
    fn create_framebuffer(&mut self, width: u32, height: u32) -> CompographResult<FramebufferId>;

    /// Reallocate a framebuffer's storage.
    fn resize_framebuffer(
        &mut self,
        framebuffer: FramebufferId,
        width: u32,
        height: u32,
    ) -> CompographResult<()>;

    /// Color texture of a framebuffer.
    fn framebuffer_texture(&self, framebuffer: FramebufferId) -> Option<TextureId>;

    /// Current size of a framebuffer.
    fn framebuffer_size(&self, framebuffer: FramebufferId) -> Option<(u32, u32)>;

    /// Release a framebuffer and its texture. Unknown handles are ignored.
    fn delete_framebuffer(&mut self, framebuffer: FramebufferId);

    /// Compile and link a program.
    fn compile_program(&mut self, source: &ShaderSource) -> Result<ProgramId, ShaderCompileError>;

    /// Uniform names the program reads.
    fn program_uniforms(&self, program: ProgramId) -> Vec<String>;

    /// Release a program. Unknown handles are ignored.
    fn delete_program(&mut self, program: ProgramId);

    /// Upload geometry.
    fn create_model(&mut self, geometry: &Geometry) -> CompographResult<ModelId>;

    /// Release geometry. Unknown handles are ignored.
    fn delete_model(&mut self, model: ModelId);

    /// Execute one draw.
    fn draw(&mut self, call: &DrawCall) -> CompographResult<()>;

    /// Read back a rectangle (origin top-left) of a render target.
    fn read_pixels(
        &mut self,
        target: RenderTarget,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> CompographResult<FrameRGBA>;
}
