use std::collections::BTreeMap;

use crate::device::shader::ShaderSource;
use crate::plugin::EffectPlugin;
use crate::plugin::inputs::{InputSpec, InputValues};

const BRIGHTNESS_CONTRAST_FRAGMENT: &str = r#"@group(0) @binding(1) var source: texture_2d<f32>;
@group(0) @binding(2) var source_sampler: sampler;
@group(1) @binding(0) var<uniform> brightness: f32;
@group(1) @binding(1) var<uniform> contrast: f32;

@fragment
fn fs_main(@location(0) tex_coord: vec2<f32>) -> @location(0) vec4<f32> {
    let px = textureSample(source, source_sampler, tex_coord);
    var rgb = px.rgb * brightness;
    rgb = (rgb - vec3<f32>(0.5)) * contrast + vec3<f32>(0.5);
    return vec4<f32>(rgb, px.a);
}
"#;

/// CSS-style brightness and contrast.
#[derive(Clone, Copy, Debug, Default)]
pub struct BrightnessContrast;

impl EffectPlugin for BrightnessContrast {
    fn title(&self) -> &str {
        "Brightness/Contrast"
    }

    fn description(&self) -> &str {
        "Multiply brightness, then scale contrast around mid-gray"
    }

    fn inputs(&self) -> Vec<InputSpec> {
        vec![
            InputSpec::image("source").uniform("source"),
            InputSpec::number("brightness")
                .uniform("brightness")
                .default_value(1.0)
                .min(0.0)
                .title("Brightness"),
            InputSpec::number("contrast")
                .uniform("contrast")
                .default_value(1.0)
                .min(0.0)
                .title("Contrast"),
        ]
    }

    fn common_shader(&self) -> bool {
        true
    }

    fn in_place(&self) -> bool {
        true
    }

    fn shader(&self, _inputs: &InputValues, base: &ShaderSource) -> Option<ShaderSource> {
        Some(ShaderSource::new(
            base.vertex.clone(),
            BRIGHTNESS_CONTRAST_FRAGMENT,
        ))
    }
}

const MIX_FRAGMENT: &str = r#"@group(0) @binding(1) var a: texture_2d<f32>;
@group(0) @binding(2) var a_sampler: sampler;
@group(0) @binding(3) var b: texture_2d<f32>;
@group(0) @binding(4) var b_sampler: sampler;
@group(1) @binding(0) var<uniform> amount: f32;

@fragment
fn fs_main(@location(0) tex_coord: vec2<f32>) -> @location(0) vec4<f32> {
    let ca = textureSample(a, a_sampler, tex_coord);
    let cb = textureSample(b, b_sampler, tex_coord);
    return mix(ca, cb, amount);
}
"#;

/// Linear blend of two images.
///
/// At `amount` 0 only `a` is needed and at 1 only `b`, so the hidden side may stay unready.
#[derive(Clone, Copy, Debug, Default)]
pub struct Mix;

impl EffectPlugin for Mix {
    fn title(&self) -> &str {
        "Mix"
    }

    fn inputs(&self) -> Vec<InputSpec> {
        vec![
            InputSpec::image("a").uniform("a"),
            InputSpec::image("b").uniform("b"),
            InputSpec::number("amount")
                .uniform("amount")
                .default_value(0.5)
                .min(0.0)
                .max(1.0)
                .update_sources(),
        ]
    }

    fn common_shader(&self) -> bool {
        true
    }

    fn shader(&self, _inputs: &InputValues, base: &ShaderSource) -> Option<ShaderSource> {
        Some(ShaderSource::new(base.vertex.clone(), MIX_FRAGMENT))
    }

    fn requires(&self, input: &str, inputs: &InputValues) -> bool {
        let amount = inputs
            .get("amount")
            .and_then(|v| v.as_number())
            .unwrap_or(0.5);
        match input {
            "a" => amount < 1.0,
            "b" => amount > 0.0,
            _ => true,
        }
    }

    fn resize(
        &self,
        _inputs: &InputValues,
        sources: &BTreeMap<String, (u32, u32)>,
    ) -> Option<(u32, u32)> {
        sources.get("a").or_else(|| sources.get("b")).copied()
    }
}

const COLOR_FRAGMENT: &str = r#"@group(1) @binding(0) var<uniform> color: vec4<f32>;

@fragment
fn fs_main(@location(0) tex_coord: vec2<f32>) -> @location(0) vec4<f32> {
    return color;
}
"#;

/// Solid color generator sized by its `width`/`height` inputs.
#[derive(Clone, Copy, Debug, Default)]
pub struct ColorFill;

impl EffectPlugin for ColorFill {
    fn title(&self) -> &str {
        "Color"
    }

    fn inputs(&self) -> Vec<InputSpec> {
        vec![
            InputSpec::color("color")
                .uniform("color")
                .default_value("black"),
            InputSpec::number("width")
                .default_value(640.0)
                .min(1.0)
                .step(1.0),
            InputSpec::number("height")
                .default_value(480.0)
                .min(1.0)
                .step(1.0),
        ]
    }

    fn shader(&self, _inputs: &InputValues, base: &ShaderSource) -> Option<ShaderSource> {
        Some(ShaderSource::new(base.vertex.clone(), COLOR_FRAGMENT))
    }
}

#[cfg(test)]
#[path = "../../../tests/unit/plugin/builtin/effects.rs"]
mod tests;
