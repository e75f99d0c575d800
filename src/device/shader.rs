use std::fmt;

use crate::device::DeviceLimits;

/// Marker line prefix used to name a shader program in diagnostics.
pub const SHADER_NAME_PREFIX: &str = "// SHADER_NAME ";

/// Vertex shader shared by every textured-quad draw.
pub const BASE_VERTEX_SHADER: &str = r#"@group(0) @binding(0) var<uniform> transform: mat4x4<f32>;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) tex_coord: vec2<f32>,
};

@vertex
fn vs_main(@location(0) position: vec3<f32>, @location(1) tex_coord: vec2<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.position = transform * vec4<f32>(position, 1.0);
    out.tex_coord = tex_coord;
    return out;
}
"#;

/// Fragment shader that samples the `source` texture unchanged.
pub const BASE_FRAGMENT_SHADER: &str = r#"@group(0) @binding(1) var source: texture_2d<f32>;
@group(0) @binding(2) var source_sampler: sampler;

@fragment
fn fs_main(@location(0) tex_coord: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(source, source_sampler, tex_coord);
}
"#;

/// Pipeline stage of a shader module.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderStage {
    /// Vertex stage (`@vertex` entry point).
    Vertex,
    /// Fragment stage (`@fragment` entry point).
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => f.write_str("vertex"),
            Self::Fragment => f.write_str("fragment"),
        }
    }
}

/// A WGSL vertex/fragment pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderSource {
    /// Vertex stage WGSL.
    pub vertex: String,
    /// Fragment stage WGSL.
    pub fragment: String,
}

impl ShaderSource {
    /// Build from vertex and fragment WGSL.
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }

    /// The shared base pair (transform + sample `source`).
    pub fn base() -> Self {
        Self::new(BASE_VERTEX_SHADER, BASE_FRAGMENT_SHADER)
    }

    /// Base vertex stage with a custom fragment stage.
    pub fn with_fragment(fragment: impl Into<String>) -> Self {
        Self::new(BASE_VERTEX_SHADER, fragment)
    }

    /// Prefix both stages with a `SHADER_NAME` marker unless one is already present.
    pub fn named(mut self, name: &str) -> Self {
        self.vertex = add_shader_name(&self.vertex, name);
        self.fragment = add_shader_name(&self.fragment, name);
        self
    }

    /// Name taken from the first `SHADER_NAME` marker, if any.
    pub fn name(&self) -> Option<&str> {
        shader_name(&self.vertex).or_else(|| shader_name(&self.fragment))
    }
}

fn shader_name(src: &str) -> Option<&str> {
    src.lines()
        .map(str::trim_start)
        .find_map(|l| l.strip_prefix(SHADER_NAME_PREFIX))
        .map(str::trim)
        .filter(|n| !n.is_empty())
}

fn add_shader_name(src: &str, name: &str) -> String {
    if shader_name(src).is_some() {
        return src.to_owned();
    }
    format!("{SHADER_NAME_PREFIX}{name}\n{src}")
}

/// Shader compile/link failure.
///
/// Carries enough context to debug the failure without the original source at hand: the failing
/// stage, the compiler message, a line-numbered listing and the device limits in effect.
#[derive(thiserror::Error, Debug, Clone)]
#[error("{stage} shader '{name}' failed to compile: {message}")]
pub struct ShaderCompileError {
    /// Shader name from the `SHADER_NAME` marker (or `unnamed`).
    pub name: String,
    /// Failing stage.
    pub stage: ShaderStage,
    /// Compiler message.
    pub message: String,
    /// 1-based line of the failure, when the compiler reports one.
    pub line: Option<u32>,
    /// Line-numbered source of the failing stage.
    pub listing: String,
    /// Device limits at compile time.
    pub limits: DeviceLimits,
}

impl ShaderCompileError {
    /// Full multi-line report: message, numbered source and device limits.
    pub fn diagnostics(&self) -> String {
        let mut out = format!("{self}\n");
        if let Some(line) = self.line {
            out.push_str(&format!("at line {line}\n"));
        }
        out.push_str("---\n");
        out.push_str(&self.listing);
        out.push_str("---\n");
        out.push_str(&format!("{}\n", self.limits));
        out
    }
}

/// Reflection data for a compiled program.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProgramInfo {
    /// Shader name.
    pub name: String,
    /// Every uniform and resource name declared by either stage, in declaration order.
    pub uniforms: Vec<String>,
    /// Texture bindings, in declaration order.
    pub textures: Vec<String>,
}

impl ProgramInfo {
    /// Whether `name` is a uniform the program reads.
    pub fn has_uniform(&self, name: &str) -> bool {
        self.uniforms.iter().any(|u| u == name)
    }
}

/// Number each line of `src`, the way compile diagnostics print it.
pub fn numbered_listing(src: &str) -> String {
    let mut out = String::new();
    for (i, line) in src.lines().enumerate() {
        out.push_str(&format!("{:4} | {}\n", i + 1, line));
    }
    out
}

/// Parse and validate both stages with `naga`, returning reflected uniform names.
pub fn compile(
    source: &ShaderSource,
    limits: &DeviceLimits,
) -> Result<ProgramInfo, ShaderCompileError> {
    let name = source.name().unwrap_or("unnamed").to_owned();
    let mut info = ProgramInfo {
        name: name.clone(),
        ..ProgramInfo::default()
    };

    for (stage, src) in [
        (ShaderStage::Vertex, source.vertex.as_str()),
        (ShaderStage::Fragment, source.fragment.as_str()),
    ] {
        let fail = |message: String, line: Option<u32>| ShaderCompileError {
            name: name.clone(),
            stage,
            message,
            line,
            listing: numbered_listing(src),
            limits: limits.clone(),
        };

        let module = naga::front::wgsl::parse_str(src).map_err(|e| {
            let line = e.location(src).map(|loc| loc.line_number);
            fail(e.message().to_owned(), line)
        })?;

        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .map_err(|e| fail(format!("{e}"), None))?;

        let wanted = match stage {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
        };
        if !module.entry_points.iter().any(|ep| ep.stage == wanted) {
            return Err(fail(format!("missing @{stage} entry point"), None));
        }

        for (_, var) in module.global_variables.iter() {
            let Some(var_name) = var.name.as_ref() else {
                continue;
            };
            match var.space {
                naga::AddressSpace::Uniform | naga::AddressSpace::Handle => {}
                _ => continue,
            }
            if matches!(module.types[var.ty].inner, naga::TypeInner::Image { .. })
                && !info.textures.contains(var_name)
            {
                info.textures.push(var_name.clone());
            }
            if !info.uniforms.contains(var_name) {
                info.uniforms.push(var_name.clone());
            }
        }
    }

    if info.textures.len() > limits.max_texture_units as usize {
        return Err(ShaderCompileError {
            name,
            stage: ShaderStage::Fragment,
            message: format!(
                "{} textures exceed the device limit of {}",
                info.textures.len(),
                limits.max_texture_units
            ),
            line: None,
            listing: numbered_listing(&source.fragment),
            limits: limits.clone(),
        });
    }

    Ok(info)
}

#[cfg(test)]
#[path = "../../tests/unit/device/shader.rs"]
mod tests;
