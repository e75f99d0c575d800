//! compograph is a real-time, node-based media compositing engine.
//!
//! Media flows from **sources** (images, video, canvases, device textures) through
//! **effects** (shader passes over typed inputs) and **transforms** (matrices) into
//! **targets** (drawing surfaces). The graph re-evaluates lazily as inputs change.
//!
//! # Model
//!
//! - Nodes live in an arena owned by the [`Engine`] and are addressed by [`NodeId`]. Edges are id
//!   lists in both directions and never own anything.
//! - **Dirty** and **ready** are pushed downstream synchronously. Rendering is pulled: a target
//!   renders its source, which renders its own sources first, and each node draws only while
//!   `dirty && ready`.
//! - Chains of transforms collapse into one cumulative matrix; a transform rasterizes only when a
//!   consumer needs its pixels.
//! - Every GPU object sits behind the [`Device`] trait and is a disposable cache over the graph.
//!   Losing the device context drops the cache and keeps topology; restoring rebuilds it.
//!
//! # Getting started
//!
//! ```no_run
//! use compograph::{Engine, HeadlessCanvas, ImageMedia, FrameRGBA, MediaRef, SurfaceRef};
//! use compograph::{SourceOptions, TargetOptions};
//!
//! # fn main() -> compograph::CompographResult<()> {
//! let mut engine = Engine::new();
//! let canvas = HeadlessCanvas::new(64, 64);
//! let image: MediaRef = ImageMedia::loaded(FrameRGBA::solid(64, 64, [200, 40, 40, 255]));
//!
//! let src = engine.source(image, None, SourceOptions::default())?;
//! let fx = engine.effect("brightness-contrast")?;
//! engine.connect(fx, "source", src)?;
//! engine.set_input(fx, "brightness", 1.5)?;
//!
//! let surface: SurfaceRef = canvas.clone();
//! let out = engine.target(surface, None, TargetOptions::default())?;
//! engine.set_source(out, fx)?;
//! engine.render()?;
//! # Ok(())
//! # }
//! ```
#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![allow(missing_docs_in_private_items)]

mod device;
mod engine;
mod foundation;
mod graph;
mod media;
mod plugin;

pub use device::headless::HeadlessDevice;
pub use device::shader::{
    BASE_FRAGMENT_SHADER, BASE_VERTEX_SHADER, ProgramInfo, SHADER_NAME_PREFIX,
    ShaderCompileError, ShaderSource, ShaderStage, numbered_listing,
};
pub use device::surface::{
    DrawingSurface, HeadlessCanvas, MemorySurface, SurfaceKey, SurfaceKind, SurfaceRef,
    SurfaceRegistry,
};
pub use device::{
    BlendMode, Device, DeviceLimits, DrawCall, DrawOptions, FramebufferId, Geometry, ModelId,
    ProgramId, RenderTarget, TextureId, UniformValue, Uniforms,
};
pub use engine::Engine;
pub use engine::daemon::FrameCallback;
pub use engine::options::{EngineOptions, SourceOptions, TargetOptions};
pub use foundation::core::{Affine, FrameRGBA, Point, Vec2};
pub use foundation::error::{CompographError, CompographResult};
pub use foundation::ids::{CallbackId, EngineId, ListenerId, NodeId};
pub use foundation::math::Mat4;
pub use graph::alias::RESERVED_ALIAS_NAMES;
pub use graph::node::{EventKind, Listener, NodeEvent, NodeRole};
pub use graph::resolve::NodeInput;
pub use media::builtin::{CanvasMedia, ImageMedia, TextureMedia, VideoMedia};
pub use media::{Media, MediaError, MediaKind, MediaRef, same_media};
pub use plugin::builtin::effects::{BrightnessContrast, ColorFill, Mix};
pub use plugin::builtin::sources::{
    CanvasSource, INTRINSIC_SOURCE_HOOKS, ImageSource, TextureSource, VideoSource,
};
pub use plugin::builtin::targets::Readback;
pub use plugin::builtin::transforms::{Affine2d, Flip};
pub use plugin::inputs::{InputKind, InputSchema, InputSpec, InputValue, InputValues, Validator};
pub use plugin::registry::{
    EffectManifest, InputManifest, PluginRegistry, RESERVED_EFFECT_PROPERTIES,
    RESERVED_TRANSFORM_PROPERTIES,
};
/// Per-kind input coercion used by [`Engine::set_input`].
pub use plugin::validate;
pub use plugin::{
    EffectPass, EffectPlugin, SourcePlugin, TargetPlugin, TransformBehavior, TransformPlugin,
};
