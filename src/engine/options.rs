use std::collections::BTreeMap;

use crate::device::surface::SurfaceRegistry;
use crate::plugin::inputs::InputValues;
use crate::plugin::registry::PluginRegistry;

/// Options for adapting a media handle into a source node.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SourceOptions {
    /// Width override (required for raw device textures).
    pub width: Option<u32>,
    /// Height override (required for raw device textures).
    pub height: Option<u32>,
    /// Whether pixels arrive top row first. Defaults per adapter (`true` except for textures).
    pub flip: Option<bool>,
}

/// Options for binding a drawing surface as a target node.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TargetOptions {
    /// Width override; defaults to the surface width.
    pub width: Option<u32>,
    /// Height override; defaults to the surface height.
    pub height: Option<u32>,
    /// Render every frame while dirty. Defaults to the engine's `auto`.
    pub auto: Option<bool>,
    /// Mirror the output vertically.
    pub flip: bool,
    /// Draw into an offscreen framebuffer on the shared device instead of the surface itself.
    pub render_to_texture: bool,
    /// Allow opening a second device context on a different surface.
    pub allow_secondary_context: bool,
}

/// Engine construction options.
#[derive(Clone, Debug)]
pub struct EngineOptions {
    /// Targets render automatically while dirty.
    pub auto: bool,
    /// Surface ownership registry, shared between engines that must see each other.
    pub surfaces: SurfaceRegistry,
    /// Registered plugins.
    pub registry: PluginRegistry,
    /// Per-hook default input values.
    pub defaults: BTreeMap<String, InputValues>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            auto: false,
            surfaces: SurfaceRegistry::new(),
            registry: PluginRegistry::with_builtins(),
            defaults: BTreeMap::new(),
        }
    }
}
