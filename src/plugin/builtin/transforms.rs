use crate::foundation::core::{Affine, Vec2};
use crate::foundation::math::Mat4;
use crate::plugin::inputs::{InputSpec, InputValue};
use crate::plugin::{TransformBehavior, TransformPlugin};

/// 2D affine transform in pixel units: translate, rotate, scale and skew about a pivot.
#[derive(Clone, Copy, Debug, Default)]
pub struct Affine2d;

impl TransformPlugin for Affine2d {
    fn title(&self) -> &str {
        "2D Transform"
    }

    fn description(&self) -> &str {
        "Translate, rotate, scale and skew; offsets in pixels, angles in degrees"
    }

    fn inputs(&self) -> Vec<InputSpec> {
        vec![
            InputSpec::number("translate_x"),
            InputSpec::number("translate_y"),
            InputSpec::number("scale_x").default_value(1.0),
            InputSpec::number("scale_y").default_value(1.0),
            InputSpec::number("rotation").modulo(360.0),
            InputSpec::number("skew_x"),
            InputSpec::number("skew_y"),
            InputSpec::number("pivot_x"),
            InputSpec::number("pivot_y"),
        ]
    }

    fn methods(&self) -> Vec<String> {
        vec!["reset".to_owned()]
    }

    fn instantiate(&self) -> Box<dyn TransformBehavior> {
        Box::new(Affine2dState::default())
    }
}

#[derive(Clone, Debug)]
struct Affine2dState {
    translate: Vec2,
    scale: Vec2,
    rotation: f64,
    skew: Vec2,
    pivot: Vec2,
    size: (u32, u32),
    matrix: Mat4,
}

impl Default for Affine2dState {
    fn default() -> Self {
        Self {
            translate: Vec2::ZERO,
            scale: Vec2::new(1.0, 1.0),
            rotation: 0.0,
            skew: Vec2::ZERO,
            pivot: Vec2::ZERO,
            size: (1, 1),
            matrix: Mat4::IDENTITY,
        }
    }
}

impl Affine2dState {
    fn is_identity(&self) -> bool {
        self.translate == Vec2::ZERO
            && self.scale == Vec2::new(1.0, 1.0)
            && self.rotation == 0.0
            && self.skew == Vec2::ZERO
    }

    /// Rebuild the clip-space matrix; returns whether it changed.
    fn recompute(&mut self) -> bool {
        let before = self.matrix;
        self.matrix = if self.is_identity() {
            Mat4::IDENTITY
        } else {
            let pixels = Affine::translate(self.translate + self.pivot)
                * Affine::rotate(self.rotation.to_radians())
                * Affine::skew(
                    self.skew.x.to_radians().tan(),
                    self.skew.y.to_radians().tan(),
                )
                * Affine::scale_non_uniform(self.scale.x, self.scale.y)
                * Affine::translate(-self.pivot);
            let half = Affine::scale_non_uniform(
                f64::from(self.size.0.max(1)) / 2.0,
                f64::from(self.size.1.max(1)) / 2.0,
            );
            Mat4::from_affine(half.inverse() * pixels * half)
        };
        before != self.matrix
    }
}

impl TransformBehavior for Affine2dState {
    fn matrix(&self) -> Mat4 {
        self.matrix
    }

    fn transformed(&self) -> bool {
        !self.is_identity()
    }

    fn get(&self, name: &str) -> Option<InputValue> {
        let v = match name {
            "translate_x" => self.translate.x,
            "translate_y" => self.translate.y,
            "scale_x" => self.scale.x,
            "scale_y" => self.scale.y,
            "rotation" => self.rotation,
            "skew_x" => self.skew.x,
            "skew_y" => self.skew.y,
            "pivot_x" => self.pivot.x,
            "pivot_y" => self.pivot.y,
            _ => return None,
        };
        Some(InputValue::Number(v))
    }

    fn set(&mut self, name: &str, value: &InputValue) -> bool {
        let Some(v) = value.as_number() else {
            return false;
        };
        let slot = match name {
            "translate_x" => &mut self.translate.x,
            "translate_y" => &mut self.translate.y,
            "scale_x" => &mut self.scale.x,
            "scale_y" => &mut self.scale.y,
            "rotation" => &mut self.rotation,
            "skew_x" => &mut self.skew.x,
            "skew_y" => &mut self.skew.y,
            "pivot_x" => &mut self.pivot.x,
            "pivot_y" => &mut self.pivot.y,
            _ => return false,
        };
        *slot = v;
        self.recompute()
    }

    fn call(&mut self, method: &str) -> bool {
        if method != "reset" {
            return false;
        }
        let size = self.size;
        *self = Self {
            size,
            ..Self::default()
        };
        self.recompute()
    }

    fn resize(&mut self, width: u32, height: u32) -> bool {
        self.size = (width, height);
        self.recompute()
    }
}

/// Mirror horizontally or vertically.
#[derive(Clone, Copy, Debug, Default)]
pub struct Flip;

impl TransformPlugin for Flip {
    fn title(&self) -> &str {
        "Flip"
    }

    fn inputs(&self) -> Vec<InputSpec> {
        vec![InputSpec::enumeration("direction", &["horizontal", "vertical"])]
    }

    fn instantiate(&self) -> Box<dyn TransformBehavior> {
        Box::new(FlipState { horizontal: true })
    }
}

#[derive(Clone, Copy, Debug)]
struct FlipState {
    horizontal: bool,
}

impl TransformBehavior for FlipState {
    fn matrix(&self) -> Mat4 {
        if self.horizontal {
            Mat4::scale(-1.0, 1.0)
        } else {
            Mat4::scale(1.0, -1.0)
        }
    }

    fn transformed(&self) -> bool {
        true
    }

    fn get(&self, name: &str) -> Option<InputValue> {
        (name == "direction").then(|| {
            InputValue::String(if self.horizontal { "horizontal" } else { "vertical" }.to_owned())
        })
    }

    fn set(&mut self, name: &str, value: &InputValue) -> bool {
        if name != "direction" {
            return false;
        }
        let horizontal = value.as_str() != Some("vertical");
        let changed = horizontal != self.horizontal;
        self.horizontal = horizontal;
        changed
    }
}

#[cfg(test)]
#[path = "../../../tests/unit/plugin/builtin/transforms.rs"]
mod tests;
