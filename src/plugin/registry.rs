use std::fmt;
use std::rc::Rc;

use crate::foundation::error::{CompographError, CompographResult};
use crate::plugin::inputs::{InputKind, InputSchema, InputValue};
use crate::plugin::{EffectPlugin, SourcePlugin, TargetPlugin, TransformPlugin};

/// Input names an effect may not declare; they collide with node accessors.
pub const RESERVED_EFFECT_PROPERTIES: &[&str] = &[
    "alias",
    "destroy",
    "effect",
    "id",
    "initialize",
    "inputs",
    "is_destroyed",
    "is_ready",
    "matte",
    "off",
    "on",
    "read_pixels",
    "render",
    "title",
    "update",
];

/// Property and method names a transform may not declare.
pub const RESERVED_TRANSFORM_PROPERTIES: &[&str] = &[
    "alias",
    "destroy",
    "id",
    "inputs",
    "is_destroyed",
    "is_ready",
    "off",
    "on",
    "source",
    "title",
    "update",
];

#[derive(Clone)]
pub(crate) struct EffectEntry {
    pub(crate) plugin: Rc<dyn EffectPlugin>,
    pub(crate) schema: Rc<InputSchema>,
}

#[derive(Clone)]
pub(crate) struct TransformEntry {
    pub(crate) plugin: Rc<dyn TransformPlugin>,
    pub(crate) schema: Rc<InputSchema>,
    pub(crate) methods: Rc<Vec<String>>,
}

/// Plugins by hook, per node role.
///
/// Source and target adapters are probed in registration order, so the order of
/// `register_source`/`register_target` calls matters.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    effects: Vec<(String, EffectEntry)>,
    sources: Vec<(String, Rc<dyn SourcePlugin>)>,
    transforms: Vec<(String, TransformEntry)>,
    targets: Vec<(String, Rc<dyn TargetPlugin>)>,
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("effects", &self.effect_hooks())
            .field("sources", &self.source_hooks())
            .field("transforms", &self.transform_hooks())
            .field("targets", &self.target_hooks())
            .finish()
    }
}

fn check_reserved(names: impl IntoIterator<Item = String>, reserved: &[&str]) -> CompographResult<()> {
    for name in names {
        if reserved.contains(&name.as_str()) {
            return Err(CompographError::ReservedName(name));
        }
    }
    Ok(())
}

fn find<'a, T>(list: &'a [(String, T)], hook: &str) -> Option<&'a T> {
    list.iter().find(|(h, _)| h == hook).map(|(_, v)| v)
}

fn remove<T>(list: &mut Vec<(String, T)>, hook: &str) -> bool {
    let before = list.len();
    list.retain(|(h, _)| h != hook);
    list.len() != before
}

fn hooks<T>(list: &[(String, T)]) -> Vec<String> {
    list.iter().map(|(h, _)| h.clone()).collect()
}

impl PluginRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in plugin.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::plugin::builtin::register_all(&mut registry);
        registry
    }

    /// Register an effect kind. Returns `false` (and logs) if `hook` is already taken.
    pub fn register_effect(
        &mut self,
        hook: &str,
        plugin: impl EffectPlugin + 'static,
    ) -> CompographResult<bool> {
        if self.has_effect(hook) {
            tracing::warn!(hook, "effect already registered; ignoring");
            return Ok(false);
        }
        let specs = plugin.inputs();
        check_reserved(specs.iter().map(|s| s.name.clone()), RESERVED_EFFECT_PROPERTIES)?;
        let entry = EffectEntry {
            plugin: Rc::new(plugin),
            schema: Rc::new(InputSchema::new(specs)),
        };
        self.effects.push((hook.to_owned(), entry));
        Ok(true)
    }

    /// Register a source adapter. Returns `false` (and logs) if `hook` is already taken.
    pub fn register_source(
        &mut self,
        hook: &str,
        plugin: impl SourcePlugin + 'static,
    ) -> CompographResult<bool> {
        if self.has_source(hook) {
            tracing::warn!(hook, "source already registered; ignoring");
            return Ok(false);
        }
        self.sources.push((hook.to_owned(), Rc::new(plugin)));
        Ok(true)
    }

    /// Register a transform kind. Returns `false` (and logs) if `hook` is already taken.
    pub fn register_transform(
        &mut self,
        hook: &str,
        plugin: impl TransformPlugin + 'static,
    ) -> CompographResult<bool> {
        if self.has_transform(hook) {
            tracing::warn!(hook, "transform already registered; ignoring");
            return Ok(false);
        }
        let specs = plugin.inputs();
        let methods = plugin.methods();
        check_reserved(
            specs.iter().map(|s| s.name.clone()).chain(methods.iter().cloned()),
            RESERVED_TRANSFORM_PROPERTIES,
        )?;
        if let Some(image) = specs.iter().find(|s| s.kind == InputKind::Image) {
            return Err(CompographError::validation(format!(
                "transform input '{}' cannot be an image; transforms take a single source",
                image.name
            )));
        }
        let entry = TransformEntry {
            plugin: Rc::new(plugin),
            schema: Rc::new(InputSchema::new(specs)),
            methods: Rc::new(methods),
        };
        self.transforms.push((hook.to_owned(), entry));
        Ok(true)
    }

    /// Register a target adapter. Returns `false` (and logs) if `hook` is already taken.
    pub fn register_target(
        &mut self,
        hook: &str,
        plugin: impl TargetPlugin + 'static,
    ) -> CompographResult<bool> {
        if self.has_target(hook) {
            tracing::warn!(hook, "target already registered; ignoring");
            return Ok(false);
        }
        self.targets.push((hook.to_owned(), Rc::new(plugin)));
        Ok(true)
    }

    /// Whether an effect kind is registered.
    pub fn has_effect(&self, hook: &str) -> bool {
        find(&self.effects, hook).is_some()
    }

    /// Whether a source adapter is registered.
    pub fn has_source(&self, hook: &str) -> bool {
        find(&self.sources, hook).is_some()
    }

    /// Whether a transform kind is registered.
    pub fn has_transform(&self, hook: &str) -> bool {
        find(&self.transforms, hook).is_some()
    }

    /// Whether a target adapter is registered.
    pub fn has_target(&self, hook: &str) -> bool {
        find(&self.targets, hook).is_some()
    }

    /// Registered effect hooks, in registration order.
    pub fn effect_hooks(&self) -> Vec<String> {
        hooks(&self.effects)
    }

    /// Registered source hooks, in probe order.
    pub fn source_hooks(&self) -> Vec<String> {
        hooks(&self.sources)
    }

    /// Registered transform hooks, in registration order.
    pub fn transform_hooks(&self) -> Vec<String> {
        hooks(&self.transforms)
    }

    /// Registered target hooks, in probe order.
    pub fn target_hooks(&self) -> Vec<String> {
        hooks(&self.targets)
    }

    /// Input schema of an effect kind.
    pub fn effect_schema(&self, hook: &str) -> Option<Rc<InputSchema>> {
        find(&self.effects, hook).map(|e| e.schema.clone())
    }

    /// Input schema of a transform kind.
    pub fn transform_schema(&self, hook: &str) -> Option<Rc<InputSchema>> {
        find(&self.transforms, hook).map(|e| e.schema.clone())
    }

    pub(crate) fn effect(&self, hook: &str) -> Option<&EffectEntry> {
        find(&self.effects, hook)
    }

    pub(crate) fn source(&self, hook: &str) -> Option<&Rc<dyn SourcePlugin>> {
        find(&self.sources, hook)
    }

    pub(crate) fn sources(&self) -> impl Iterator<Item = (&str, &Rc<dyn SourcePlugin>)> {
        self.sources.iter().map(|(h, p)| (h.as_str(), p))
    }

    pub(crate) fn transform(&self, hook: &str) -> Option<&TransformEntry> {
        find(&self.transforms, hook)
    }

    pub(crate) fn target(&self, hook: &str) -> Option<&Rc<dyn TargetPlugin>> {
        find(&self.targets, hook)
    }

    pub(crate) fn targets(&self) -> impl Iterator<Item = (&str, &Rc<dyn TargetPlugin>)> {
        self.targets.iter().map(|(h, p)| (h.as_str(), p))
    }

    pub(crate) fn remove_effect(&mut self, hook: &str) -> bool {
        remove(&mut self.effects, hook)
    }

    pub(crate) fn remove_source(&mut self, hook: &str) -> bool {
        remove(&mut self.sources, hook)
    }

    pub(crate) fn remove_transform(&mut self, hook: &str) -> bool {
        remove(&mut self.transforms, hook)
    }

    pub(crate) fn remove_target(&mut self, hook: &str) -> bool {
        remove(&mut self.targets, hook)
    }

    /// Serializable description of every registered effect.
    pub fn effect_manifest(&self) -> Vec<EffectManifest> {
        self.effects
            .iter()
            .map(|(hook, entry)| EffectManifest {
                hook: hook.clone(),
                title: entry.plugin.title().to_owned(),
                description: entry.plugin.description().to_owned(),
                inputs: entry.schema.iter().map(InputManifest::from_spec).collect(),
            })
            .collect()
    }
}

/// One effect kind as listed by [`PluginRegistry::effect_manifest`].
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct EffectManifest {
    /// Registration hook.
    pub hook: String,
    /// Human title.
    pub title: String,
    /// Human description.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Declared inputs in order.
    pub inputs: Vec<InputManifest>,
}

/// One input of an [`EffectManifest`].
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct InputManifest {
    /// Input name.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub kind: InputKind,
    /// Normalized default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<InputValue>,
    /// Lower clamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Upper clamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Rounding step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    /// Wrap-around modulus.
    #[serde(rename = "mod", skip_serializing_if = "Option::is_none")]
    pub modulo: Option<f64>,
    /// Vector length.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
    /// Enum options as `(key, label)`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<(String, String)>,
    /// Human title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl InputManifest {
    fn from_spec(spec: &crate::plugin::inputs::InputSpec) -> Self {
        let finite = |v: f64| v.is_finite().then_some(v);
        let nonzero = |v: f64| (v != 0.0).then_some(v);
        let numeric = spec.kind == InputKind::Number;
        Self {
            name: spec.name.clone(),
            kind: spec.kind,
            default: spec.default.clone().filter(|_| spec.kind != InputKind::Image),
            min: finite(spec.min).filter(|_| numeric),
            max: finite(spec.max).filter(|_| numeric),
            step: nonzero(spec.step).filter(|_| numeric),
            modulo: nonzero(spec.modulo).filter(|_| numeric),
            dimensions: (spec.kind == InputKind::Vector).then_some(spec.dimensions),
            options: spec.options.clone(),
            title: spec.title.clone(),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/plugin/registry.rs"]
mod tests;
