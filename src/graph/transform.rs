use std::rc::Rc;

use tracing::debug;

use crate::engine::Engine;
use crate::foundation::error::{CompographError, CompographResult};
use crate::foundation::ids::NodeId;
use crate::foundation::math::Mat4;
use crate::graph::node::{NodeBase, NodeRole};
use crate::graph::resolve::NodeInput;
use crate::graph::{Node, NodeKind};
use crate::plugin::TransformBehavior;
use crate::plugin::inputs::{InputSchema, InputValue};
use crate::plugin::validate::validate;

pub(crate) struct TransformState {
    pub(crate) behavior: Box<dyn TransformBehavior>,
    pub(crate) schema: Rc<InputSchema>,
    pub(crate) methods: Rc<Vec<String>>,
    pub(crate) source: Option<NodeId>,
    /// Local matrix composed with every upstream transform. Valid while `!transform_dirty`.
    pub(crate) cumulative: Mat4,
    pub(crate) transform_dirty: bool,
    /// The framebuffer copy (if any) no longer matches the upstream pixels.
    pub(crate) raster_stale: bool,
}

impl Engine {
    /// Create a transform node of kind `hook`.
    pub fn transform(&mut self, hook: &str) -> CompographResult<NodeId> {
        self.ensure_alive()?;
        let entry = self
            .registry
            .transform(hook)
            .cloned()
            .ok_or_else(|| CompographError::unknown_kind("transform", hook))?;

        let mut behavior = entry.plugin.instantiate();
        if let Some(defaults) = self.defaults.get(hook) {
            for spec in entry.schema.iter() {
                if let Some(v) = defaults.get(&spec.name) {
                    behavior.set(&spec.name, &validate(v, spec, &spec.default_or_zero(), None));
                }
            }
        }
        let cumulative = behavior.matrix();

        let id = self.graph.alloc_id();
        let state = TransformState {
            behavior,
            schema: entry.schema,
            methods: entry.methods,
            source: None,
            cumulative,
            transform_dirty: true,
            raster_stale: true,
        };
        self.graph.insert(Node {
            base: NodeBase::new(id, hook),
            kind: NodeKind::Transform(state),
        });
        self.graph.resize(id);
        self.graph.refresh_ready(id);
        debug!(node = %id, hook, "transform created");
        Ok(id)
    }

    pub(crate) fn set_transform_property(
        &mut self,
        node: NodeId,
        name: &str,
        value: InputValue,
    ) -> CompographResult<InputValue> {
        let hook = self.graph.get(node)?.base.hook.clone();
        let schema = match &self.graph.get(node)?.kind {
            NodeKind::Transform(t) => Rc::clone(&t.schema),
            _ => {
                return Err(CompographError::WrongNodeKind {
                    node,
                    expected: "transform",
                });
            }
        };
        let spec = schema.get(name).ok_or_else(|| CompographError::UnknownInput {
            node,
            input: name.to_owned(),
        })?;
        let default = self.default_for(&hook, name, spec);

        let Some(t) = self.graph.get_mut(node)?.transform_mut() else {
            return Ok(value);
        };
        let previous = t.behavior.get(name);
        let coerced = validate(&value, spec, &default, previous.as_ref());
        let changed = t.behavior.set(name, &coerced);
        let current = t.behavior.get(name).unwrap_or(coerced);
        if changed {
            self.graph.set_transform_dirty(node);
            self.arm_if_needed();
        }
        Ok(current)
    }

    /// Invoke a zero-argument transform method (e.g. `reset`). Returns whether the matrix changed.
    pub fn call(&mut self, node: NodeId, method: &str) -> CompographResult<bool> {
        let Some(t) = self.graph.get_mut(node)?.transform_mut() else {
            return Err(CompographError::WrongNodeKind {
                node,
                expected: "transform",
            });
        };
        if !t.methods.iter().any(|m| m == method) {
            return Err(CompographError::UnknownInput {
                node,
                input: method.to_owned(),
            });
        }
        let changed = t.behavior.call(method);
        if changed {
            self.graph.set_transform_dirty(node);
            self.arm_if_needed();
        }
        Ok(changed)
    }

    /// Set the single upstream of a transform or target node.
    ///
    /// Same rules as [`Engine::connect`]: targets cannot be upstream, cycles are rejected before
    /// any mutation, and an unchanged source is a no-op.
    pub fn set_source(
        &mut self,
        node: NodeId,
        source: impl Into<NodeInput>,
    ) -> CompographResult<Option<NodeId>> {
        let role = self.graph.get(node)?.role();
        if !matches!(role, NodeRole::Transform | NodeRole::Target) {
            return Err(CompographError::WrongNodeKind {
                node,
                expected: "transform or target",
            });
        }
        let candidate = self.resolve_input(source.into())?;
        if let Some(c) = candidate {
            self.check_connectable(node, c)?;
        }

        let slot = match &mut self.graph.get_mut(node)?.kind {
            NodeKind::Transform(t) => &mut t.source,
            NodeKind::Target(t) => &mut t.source,
            NodeKind::Source(_) | NodeKind::Effect(_) => return Ok(None),
        };
        let previous = *slot;
        if previous == candidate {
            return Ok(candidate);
        }
        *slot = candidate;
        if let Some(p) = previous {
            self.graph.unlink(p, node);
        }
        if let Some(c) = candidate {
            self.graph.link(c, node);
        }

        self.graph.resize(node);
        self.graph.set_transform_dirty(node);
        self.graph.refresh_ready(node);
        self.arm_if_needed();
        Ok(candidate)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/graph/transform.rs"]
mod tests;
