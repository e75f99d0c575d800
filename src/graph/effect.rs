use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::debug;

use crate::device::ProgramId;
use crate::engine::Engine;
use crate::foundation::error::{CompographError, CompographResult};
use crate::foundation::ids::NodeId;
use crate::graph::node::{NodeBase, NodeRole};
use crate::graph::resolve::NodeInput;
use crate::graph::{Node, NodeKind};
use crate::plugin::EffectPlugin;
use crate::plugin::inputs::{InputKind, InputSchema, InputSpec, InputValue, InputValues};
use crate::plugin::validate::validate;

/// Program an effect draws with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum EffectShader {
    /// Not built yet (no context, or invalidated by context loss).
    Unbuilt,
    /// The plugin declares no shader; the engine base program is used.
    Base,
    /// Refcounted program shared by every instance of the hook.
    Common(ProgramId),
    /// Instance-private program.
    Own(ProgramId),
}

impl EffectShader {
    pub(crate) fn program(self, base: ProgramId) -> Option<ProgramId> {
        match self {
            Self::Unbuilt => None,
            Self::Base => Some(base),
            Self::Common(p) | Self::Own(p) => Some(p),
        }
    }
}

pub(crate) struct EffectState {
    pub(crate) plugin: Rc<dyn EffectPlugin>,
    pub(crate) schema: Rc<InputSchema>,
    /// Every declared input; image inputs hold `Image(Some(node))` while connected.
    pub(crate) inputs: InputValues,
    /// Connected image inputs. Always a subset of the schema's image inputs.
    pub(crate) sources: BTreeMap<String, NodeId>,
    pub(crate) shader: EffectShader,
    pub(crate) shader_dirty: bool,
    /// Shader build or framebuffer allocation failed; the node stays unready.
    pub(crate) broken: bool,
}

impl EffectState {
    /// Whether the sole image input is connected and the plugin draws it in place, so an
    /// upstream transform is applied by this pass instead of being rasterized first.
    pub(crate) fn in_place_single(&self) -> bool {
        let mut images = self.schema.images();
        match (images.next(), images.next()) {
            (Some(only), None) => self.plugin.in_place() && self.sources.contains_key(&only.name),
            _ => false,
        }
    }
}

impl Engine {
    /// Create an effect node of kind `hook`.
    ///
    /// Inputs start at the per-hook defaults (see [`Engine::set_defaults`]) or the declared
    /// defaults. With a context attached the shader is built immediately and a compile failure is
    /// returned without leaving a node behind.
    pub fn effect(&mut self, hook: &str) -> CompographResult<NodeId> {
        self.ensure_alive()?;
        let entry = self
            .registry
            .effect(hook)
            .cloned()
            .ok_or_else(|| CompographError::unknown_kind("effect", hook))?;

        let defaults = self.defaults.get(hook);
        let mut inputs = InputValues::new();
        for spec in entry.schema.iter() {
            let declared = spec.default_or_zero();
            let value = match defaults.and_then(|d| d.get(&spec.name)) {
                _ if spec.kind == InputKind::Image => InputValue::Image(None),
                Some(v) => validate(v, spec, &declared, None),
                None => declared,
            };
            inputs.insert(spec.name.clone(), value);
        }

        let id = self.graph.alloc_id();
        let state = EffectState {
            plugin: Rc::clone(&entry.plugin),
            schema: Rc::clone(&entry.schema),
            inputs,
            sources: BTreeMap::new(),
            shader: EffectShader::Unbuilt,
            shader_dirty: true,
            broken: false,
        };
        self.graph.insert(Node {
            base: NodeBase::new(id, hook),
            kind: NodeKind::Effect(state),
        });
        entry.plugin.initialize(id);

        if self.gpu.is_some() {
            if let Err(err) = self.ensure_effect_shader(id) {
                self.release_gpu(id);
                self.graph.nodes.remove(&id);
                return Err(err);
            }
        }
        self.graph.resize(id);
        self.graph.refresh_ready(id);
        debug!(node = %id, hook, "effect created");
        Ok(id)
    }

    /// Set an input on an effect (or a property on a transform) and return the coerced value.
    ///
    /// Image inputs connect instead; see [`Engine::connect`]. Setting a value equal to the current
    /// one changes nothing.
    pub fn set_input(
        &mut self,
        node: NodeId,
        name: &str,
        value: impl Into<InputValue>,
    ) -> CompographResult<InputValue> {
        let value = value.into();
        let n = self.graph.get(node)?;
        match &n.kind {
            NodeKind::Effect(e) => {
                let schema = Rc::clone(&e.schema);
                let spec = schema.get(name).ok_or_else(|| CompographError::UnknownInput {
                    node,
                    input: name.to_owned(),
                })?;
                if spec.kind == InputKind::Image {
                    let target = match value {
                        InputValue::Image(Some(src)) => NodeInput::Node(src),
                        InputValue::Image(None) => NodeInput::Empty,
                        other => {
                            return Err(CompographError::validation(format!(
                                "image input '{name}' cannot take {other:?}"
                            )));
                        }
                    };
                    return self
                        .connect(node, name, target)
                        .map(InputValue::Image);
                }

                let default = self.default_for(&n.base.hook, name, spec);
                let previous = e.inputs.get(name).cloned();
                let coerced = validate(&value, spec, &default, previous.as_ref());
                if previous.as_ref() == Some(&coerced) {
                    return Ok(coerced);
                }
                if let Some(NodeKind::Effect(e)) = self.graph.nodes.get_mut(&node).map(|n| &mut n.kind)
                {
                    e.inputs.insert(name.to_owned(), coerced.clone());
                    if spec.shader_dirty {
                        e.shader_dirty = true;
                    }
                }
                if spec.update_sources {
                    self.graph.refresh_ready(node);
                }
                self.graph.resize(node);
                self.graph.set_dirty(node);
                self.arm_if_needed();
                Ok(coerced)
            }
            NodeKind::Transform(_) => self.set_transform_property(node, name, value),
            NodeKind::Source(_) | NodeKind::Target(_) => Err(CompographError::WrongNodeKind {
                node,
                expected: "effect or transform",
            }),
        }
    }

    pub(crate) fn default_for(
        &self,
        hook: &str,
        name: &str,
        spec: &InputSpec,
    ) -> InputValue {
        self.defaults
            .get(hook)
            .and_then(|d| d.get(name))
            .map(|v| validate(v, spec, &spec.default_or_zero(), None))
            .unwrap_or_else(|| spec.default_or_zero())
    }

    /// Connect an upstream node (or media, adapted on the fly) to an input.
    ///
    /// For effects `input` names an image input; transforms and targets take `"source"`. The cycle
    /// check runs before anything is mutated, so a rejected connection leaves every edge as it
    /// was. Returns the connected node.
    pub fn connect(
        &mut self,
        node: NodeId,
        input: &str,
        source: impl Into<NodeInput>,
    ) -> CompographResult<Option<NodeId>> {
        let source = source.into();
        let role = self.graph.get(node)?.role();
        match role {
            NodeRole::Effect => {}
            NodeRole::Transform | NodeRole::Target if input == "source" => {
                return self.set_source(node, source);
            }
            NodeRole::Transform | NodeRole::Target => {
                return Err(CompographError::UnknownInput {
                    node,
                    input: input.to_owned(),
                });
            }
            NodeRole::Source => {
                return Err(CompographError::WrongNodeKind {
                    node,
                    expected: "effect, transform or target",
                });
            }
        }

        let is_image = self
            .graph
            .get(node)?
            .effect()
            .and_then(|e| e.schema.get(input))
            .is_some_and(|s| s.kind == InputKind::Image);
        if !is_image {
            return Err(CompographError::UnknownInput {
                node,
                input: input.to_owned(),
            });
        }

        let candidate = self.resolve_input(source)?;
        if let Some(c) = candidate {
            self.check_connectable(node, c)?;
        }

        let previous = self
            .graph
            .get(node)?
            .effect()
            .and_then(|e| e.sources.get(input).copied());
        if previous == candidate {
            return Ok(candidate);
        }

        let mut still_used = false;
        if let Some(e) = self.graph.get_mut(node)?.effect_mut() {
            match candidate {
                Some(c) => {
                    e.sources.insert(input.to_owned(), c);
                }
                None => {
                    e.sources.remove(input);
                }
            }
            e.inputs
                .insert(input.to_owned(), InputValue::Image(candidate));
            still_used = previous.is_some_and(|p| e.sources.values().any(|s| *s == p));
        }
        if let Some(p) = previous.filter(|_| !still_used) {
            self.graph.unlink(p, node);
        }
        if let Some(c) = candidate {
            self.graph.link(c, node);
        }

        self.graph.resize(node);
        self.graph.refresh_ready(node);
        self.graph.set_dirty(node);
        self.arm_if_needed();
        Ok(candidate)
    }

    /// Disconnect an image input (or the `"source"` of a transform or target).
    pub fn disconnect(&mut self, node: NodeId, input: &str) -> CompographResult<()> {
        self.connect(node, input, NodeInput::Empty).map(|_| ())
    }

    /// Reject targets as upstream nodes and connections that would close a cycle.
    pub(crate) fn check_connectable(&self, node: NodeId, candidate: NodeId) -> CompographResult<()> {
        if self.graph.get(candidate)?.role() == NodeRole::Target {
            return Err(CompographError::WrongNodeKind {
                node: candidate,
                expected: "source, effect or transform",
            });
        }
        if self.graph.is_upstream(node, candidate) {
            return Err(CompographError::CyclicConnection {
                node,
                source_node: candidate,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/graph/effect.rs"]
mod tests;
