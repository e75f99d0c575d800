use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::foundation::ids::NodeId;
use crate::plugin::validate;

/// Declared type of a plugin input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    /// Image input: connecting one creates a graph edge.
    Image,
    /// Scalar with optional clamp/step/modulo.
    Number,
    /// RGBA color in `0..=1`.
    Color,
    /// Boolean flag.
    Boolean,
    /// Free-form string.
    String,
    /// One key out of a fixed option list.
    Enum,
    /// Fixed-length float vector (2 to 4 components).
    Vector,
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Image => "image",
            Self::Number => "number",
            Self::Color => "color",
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Enum => "enum",
            Self::Vector => "vector",
        };
        f.write_str(s)
    }
}

/// A value held by (or offered to) a node input.
///
/// Validation coerces whatever the caller passes into the variant matching the input's kind, so
/// `Number` offered to a color input comes back as a `Color`.
#[derive(Clone, Debug, PartialEq)]
pub enum InputValue {
    /// Scalar.
    Number(f64),
    /// Boolean.
    Bool(bool),
    /// String or enum key.
    String(String),
    /// RGBA color.
    Color([f32; 4]),
    /// Float vector.
    Vector(Vec<f32>),
    /// Connected upstream node, or nothing.
    Image(Option<NodeId>),
}

impl InputValue {
    /// Scalar payload.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Boolean payload.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// String payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Color payload.
    pub fn as_color(&self) -> Option<[f32; 4]> {
        match self {
            Self::Color(c) => Some(*c),
            _ => None,
        }
    }

    /// Vector payload.
    pub fn as_vector(&self) -> Option<&[f32]> {
        match self {
            Self::Vector(v) => Some(v),
            _ => None,
        }
    }

    /// Connected node of an image input.
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Self::Image(n) => *n,
            _ => None,
        }
    }
}

impl From<f64> for InputValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<f32> for InputValue {
    fn from(v: f32) -> Self {
        Self::Number(f64::from(v))
    }
}

impl From<i32> for InputValue {
    fn from(v: i32) -> Self {
        Self::Number(f64::from(v))
    }
}

impl From<u32> for InputValue {
    fn from(v: u32) -> Self {
        Self::Number(f64::from(v))
    }
}

impl From<bool> for InputValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for InputValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for InputValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<[f32; 4]> for InputValue {
    fn from(v: [f32; 4]) -> Self {
        Self::Color(v)
    }
}

impl From<Vec<f32>> for InputValue {
    fn from(v: Vec<f32>) -> Self {
        Self::Vector(v)
    }
}

impl From<NodeId> for InputValue {
    fn from(v: NodeId) -> Self {
        Self::Image(Some(v))
    }
}

impl serde::Serialize for InputValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Number(v) => serializer.serialize_f64(*v),
            Self::Bool(v) => serializer.serialize_bool(*v),
            Self::String(v) => serializer.serialize_str(v),
            Self::Color(c) => c.serialize(serializer),
            Self::Vector(v) => v.serialize(serializer),
            Self::Image(_) => serializer.serialize_none(),
        }
    }
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum RawValue {
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<f32>),
    Null(()),
}

impl<'de> serde::Deserialize<'de> for InputValue {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawValue::deserialize(deserializer)? {
            RawValue::Bool(v) => Self::Bool(v),
            RawValue::Number(v) => Self::Number(v),
            RawValue::String(v) => Self::String(v),
            RawValue::List(v) => Self::Vector(v),
            RawValue::Null(()) => Self::Image(None),
        })
    }
}

/// Custom validator: `(value, spec, default, previous) -> coerced`.
pub type Validator =
    Rc<dyn Fn(&InputValue, &InputSpec, &InputValue, Option<&InputValue>) -> InputValue>;

/// Input values keyed by input name.
pub type InputValues = BTreeMap<String, InputValue>;

/// Declaration of one plugin input.
#[derive(Clone)]
pub struct InputSpec {
    /// Input name.
    pub name: String,
    /// Declared type.
    pub kind: InputKind,
    /// Shader uniform fed by this input, if any.
    pub uniform: Option<String>,
    /// Default value (filled in per kind when normalized).
    pub default: Option<InputValue>,
    /// Lower clamp for numbers.
    pub min: f64,
    /// Upper clamp for numbers.
    pub max: f64,
    /// Rounding step for numbers (`0` disables).
    pub step: f64,
    /// Wrap-around modulus for numbers (`0` disables).
    pub modulo: f64,
    /// Enum options as `(key, label)`; keys are lowercase.
    pub options: Vec<(String, String)>,
    /// Vector length.
    pub dimensions: usize,
    /// Changing this input invalidates an instance shader.
    pub shader_dirty: bool,
    /// Changing this input changes which image inputs are required.
    pub update_sources: bool,
    /// Human title.
    pub title: Option<String>,
    /// Human description.
    pub description: Option<String>,
    /// Replaces the per-kind validator.
    pub validator: Option<Validator>,
}

impl fmt::Debug for InputSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputSpec")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("uniform", &self.uniform)
            .field("default", &self.default)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("step", &self.step)
            .field("modulo", &self.modulo)
            .field("options", &self.options)
            .field("dimensions", &self.dimensions)
            .field("custom_validator", &self.validator.is_some())
            .finish()
    }
}

impl InputSpec {
    /// New input of `kind` with no constraints.
    pub fn new(name: impl Into<String>, kind: InputKind) -> Self {
        Self {
            name: name.into(),
            kind,
            uniform: None,
            default: None,
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            step: 0.0,
            modulo: 0.0,
            options: Vec::new(),
            dimensions: 4,
            shader_dirty: false,
            update_sources: false,
            title: None,
            description: None,
            validator: None,
        }
    }

    /// Image input.
    pub fn image(name: impl Into<String>) -> Self {
        Self::new(name, InputKind::Image)
    }

    /// Number input.
    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, InputKind::Number)
    }

    /// Color input.
    pub fn color(name: impl Into<String>) -> Self {
        Self::new(name, InputKind::Color)
    }

    /// Boolean input.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, InputKind::Boolean)
    }

    /// String input.
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, InputKind::String)
    }

    /// Enum input over `options` (keys double as labels).
    pub fn enumeration(name: impl Into<String>, options: &[&str]) -> Self {
        let mut spec = Self::new(name, InputKind::Enum);
        for o in options {
            spec = spec.option(o, o);
        }
        spec
    }

    /// Vector input of `dimensions` components.
    pub fn vector(name: impl Into<String>, dimensions: usize) -> Self {
        let mut spec = Self::new(name, InputKind::Vector);
        spec.dimensions = dimensions;
        spec
    }

    /// Bind to a shader uniform.
    pub fn uniform(mut self, uniform: impl Into<String>) -> Self {
        self.uniform = Some(uniform.into());
        self
    }

    /// Set the default value.
    pub fn default_value(mut self, value: impl Into<InputValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Set the lower clamp.
    pub fn min(mut self, min: f64) -> Self {
        self.min = min;
        self
    }

    /// Set the upper clamp.
    pub fn max(mut self, max: f64) -> Self {
        self.max = max;
        self
    }

    /// Set the rounding step.
    pub fn step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    /// Set the wrap-around modulus.
    pub fn modulo(mut self, modulo: f64) -> Self {
        self.modulo = modulo;
        self
    }

    /// Add an enum option.
    pub fn option(mut self, key: &str, label: &str) -> Self {
        self.options.push((key.to_lowercase(), label.to_owned()));
        self
    }

    /// Mark as invalidating an instance shader.
    pub fn shader_dirty(mut self) -> Self {
        self.shader_dirty = true;
        self
    }

    /// Mark as changing which image inputs are required.
    pub fn update_sources(mut self) -> Self {
        self.update_sources = true;
        self
    }

    /// Set the human title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the human description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Replace the per-kind validator.
    pub fn validator(
        mut self,
        f: impl Fn(&InputValue, &InputSpec, &InputValue, Option<&InputValue>) -> InputValue + 'static,
    ) -> Self {
        self.validator = Some(Rc::new(f));
        self
    }

    /// Default value, falling back to the per-kind zero value.
    pub fn default_or_zero(&self) -> InputValue {
        self.default
            .clone()
            .unwrap_or_else(|| validate::zero_value(self))
    }

    /// Fill in the default and clamp dimensions so every spec in a schema is complete.
    pub(crate) fn normalized(mut self) -> Self {
        self.dimensions = self.dimensions.clamp(2, 4);
        let zero = validate::zero_value(&self);
        let raw = self.default.take().unwrap_or_else(|| zero.clone());
        let default = validate::validate(&raw, &self, &zero, None);
        self.default = Some(default);
        self
    }
}

/// Ordered input declarations of one plugin kind.
#[derive(Clone, Debug, Default)]
pub struct InputSchema {
    specs: Vec<InputSpec>,
}

impl InputSchema {
    /// Schema over already-normalized specs.
    pub(crate) fn new(specs: Vec<InputSpec>) -> Self {
        Self {
            specs: specs.into_iter().map(InputSpec::normalized).collect(),
        }
    }

    /// Spec by name.
    pub fn get(&self, name: &str) -> Option<&InputSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    /// Specs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &InputSpec> {
        self.specs.iter()
    }

    /// Image inputs in declaration order.
    pub fn images(&self) -> impl Iterator<Item = &InputSpec> {
        self.specs.iter().filter(|s| s.kind == InputKind::Image)
    }

    /// Number of declared inputs.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Whether no inputs are declared.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/plugin/inputs.rs"]
mod tests;
