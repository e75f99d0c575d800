//! Engine-level names for node inputs, so a host can drive `"fade"` without holding the node id.

use crate::engine::Engine;
use crate::foundation::error::{CompographError, CompographResult};
use crate::foundation::ids::NodeId;
use crate::graph::NodeKind;
use crate::plugin::inputs::InputValue;

/// Names an alias may not take; they collide with engine operations.
pub const RESERVED_ALIAS_NAMES: &[&str] = &[
    "alias",
    "aliases",
    "defaults",
    "destroy",
    "effect",
    "go",
    "id",
    "incompatible",
    "is_destroyed",
    "is_node",
    "remove_alias",
    "render",
    "source",
    "stop",
    "target",
    "tick",
    "transform",
];

/// Where an alias points.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Alias {
    pub(crate) node: NodeId,
    pub(crate) input: String,
}

impl Engine {
    /// Publish `node`'s `input` (or transform method) under `name`.
    ///
    /// Re-aliasing the same input under the same name is a no-op; taking a name that already
    /// points elsewhere fails.
    pub fn alias(&mut self, node: NodeId, input: &str, name: &str) -> CompographResult<()> {
        if RESERVED_ALIAS_NAMES.contains(&name) {
            return Err(CompographError::ReservedName(name.to_owned()));
        }
        let known = match &self.graph.get(node)?.kind {
            NodeKind::Effect(e) => e.schema.get(input).is_some(),
            NodeKind::Transform(t) => {
                t.schema.get(input).is_some() || t.methods.iter().any(|m| m == input)
            }
            NodeKind::Source(_) | NodeKind::Target(_) => false,
        };
        if !known {
            return Err(CompographError::UnknownInput {
                node,
                input: input.to_owned(),
            });
        }

        let alias = Alias {
            node,
            input: input.to_owned(),
        };
        match self.aliases.get(name) {
            Some(existing) if *existing == alias => Ok(()),
            Some(_) => Err(CompographError::validation(format!(
                "alias '{name}' is already in use"
            ))),
            None => {
                self.aliases.insert(name.to_owned(), alias);
                Ok(())
            }
        }
    }

    /// Drop an alias. Returns whether it existed.
    pub fn remove_alias(&mut self, name: &str) -> bool {
        self.aliases.remove(name).is_some()
    }

    /// Alias names, sorted.
    pub fn aliases(&self) -> Vec<String> {
        self.aliases.keys().cloned().collect()
    }

    fn alias_target(&self, name: &str) -> CompographResult<Alias> {
        self.aliases
            .get(name)
            .cloned()
            .ok_or_else(|| CompographError::validation(format!("unknown alias '{name}'")))
    }

    /// Set the input behind an alias.
    pub fn set_alias(
        &mut self,
        name: &str,
        value: impl Into<InputValue>,
    ) -> CompographResult<InputValue> {
        let alias = self.alias_target(name)?;
        self.set_input(alias.node, &alias.input, value)
    }

    /// Current value of the input behind an alias.
    pub fn alias_value(&self, name: &str) -> CompographResult<InputValue> {
        let alias = self.alias_target(name)?;
        self.input(alias.node, &alias.input)
    }

    /// Invoke the transform method behind an alias.
    pub fn call_alias(&mut self, name: &str) -> CompographResult<bool> {
        let alias = self.alias_target(name)?;
        self.call(alias.node, &alias.input)
    }
}
