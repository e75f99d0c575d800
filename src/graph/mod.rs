//! The compositing graph: a node arena with id edges in both directions.
//!
//! Nodes are owned only by the [`Graph`] table. Edges are plain [`NodeId`] lists: an upstream
//! node lists its consumers in `targets`, and a consumer names its upstream nodes in its
//! kind-specific state (effect `sources`, transform/target `source`). Neither direction owns.

use std::collections::BTreeMap;

use crate::foundation::error::{CompographError, CompographResult};
use crate::foundation::ids::{EngineId, NodeId};
use crate::foundation::math::Mat4;

pub mod alias;
pub mod effect;
pub mod node;
pub mod propagation;
pub mod resolve;
pub mod source;
pub mod target;
pub mod transform;

use effect::EffectState;
use node::{NodeBase, NodeRole};
use source::SourceState;
use target::TargetState;
use transform::TransformState;

/// Kind-specific node state.
pub(crate) enum NodeKind {
    Source(SourceState),
    Effect(EffectState),
    Transform(TransformState),
    Target(TargetState),
}

/// A graph node: shared base plus kind-specific state.
pub(crate) struct Node {
    pub(crate) base: NodeBase,
    pub(crate) kind: NodeKind,
}

impl Node {
    pub(crate) fn role(&self) -> NodeRole {
        match self.kind {
            NodeKind::Source(_) => NodeRole::Source,
            NodeKind::Effect(_) => NodeRole::Effect,
            NodeKind::Transform(_) => NodeRole::Transform,
            NodeKind::Target(_) => NodeRole::Target,
        }
    }

    /// Upstream nodes, deduplicated, in input order.
    pub(crate) fn sources(&self) -> Vec<NodeId> {
        match &self.kind {
            NodeKind::Source(_) => Vec::new(),
            NodeKind::Effect(e) => {
                let mut out: Vec<NodeId> = Vec::new();
                for id in e.sources.values() {
                    if !out.contains(id) {
                        out.push(*id);
                    }
                }
                out
            }
            NodeKind::Transform(t) => t.source.into_iter().collect(),
            NodeKind::Target(t) => t.source.into_iter().collect(),
        }
    }

    /// Matrix a consumer applies when sampling this node's texture without rasterizing it.
    pub(crate) fn cumulative_matrix(&self) -> Mat4 {
        match &self.kind {
            NodeKind::Transform(t) => t.cumulative,
            _ => Mat4::IDENTITY,
        }
    }

    pub(crate) fn effect(&self) -> Option<&EffectState> {
        match &self.kind {
            NodeKind::Effect(e) => Some(e),
            _ => None,
        }
    }

    pub(crate) fn effect_mut(&mut self) -> Option<&mut EffectState> {
        match &mut self.kind {
            NodeKind::Effect(e) => Some(e),
            _ => None,
        }
    }

    pub(crate) fn transform_mut(&mut self) -> Option<&mut TransformState> {
        match &mut self.kind {
            NodeKind::Transform(t) => Some(t),
            _ => None,
        }
    }

    pub(crate) fn target_mut(&mut self) -> Option<&mut TargetState> {
        match &mut self.kind {
            NodeKind::Target(t) => Some(t),
            _ => None,
        }
    }
}

/// Node table of one engine. Iteration follows creation order.
pub(crate) struct Graph {
    engine: EngineId,
    next_seq: u64,
    pub(crate) nodes: BTreeMap<NodeId, Node>,
}

impl Graph {
    pub(crate) fn new(engine: EngineId) -> Self {
        Self {
            engine,
            next_seq: 0,
            nodes: BTreeMap::new(),
        }
    }

    pub(crate) fn alloc_id(&mut self) -> NodeId {
        self.next_seq += 1;
        NodeId {
            engine: self.engine,
            seq: self.next_seq,
        }
    }

    pub(crate) fn insert(&mut self, node: Node) {
        self.nodes.insert(node.base.id, node);
    }

    /// Reject ids from other engines and ids that were destroyed.
    pub(crate) fn check(&self, id: NodeId) -> CompographResult<()> {
        if id.engine != self.engine {
            return Err(CompographError::ForeignNode(id));
        }
        if !self.nodes.contains_key(&id) {
            return Err(CompographError::NodeNotFound(id));
        }
        Ok(())
    }

    pub(crate) fn get(&self, id: NodeId) -> CompographResult<&Node> {
        self.check(id)?;
        self.nodes.get(&id).ok_or(CompographError::NodeNotFound(id))
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> CompographResult<&mut Node> {
        self.check(id)?;
        self.nodes
            .get_mut(&id)
            .ok_or(CompographError::NodeNotFound(id))
    }

    pub(crate) fn ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    pub(crate) fn ids_of(&self, role: NodeRole) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|n| n.role() == role)
            .map(|n| n.base.id)
            .collect()
    }

    /// Whether `node` is `candidate` or one of its transitive sources.
    ///
    /// Connecting `candidate` as an input of `node` is a cycle exactly when this holds.
    pub(crate) fn is_upstream(&self, node: NodeId, candidate: NodeId) -> bool {
        let mut stack = vec![candidate];
        let mut seen = Vec::new();
        while let Some(id) = stack.pop() {
            if id == node {
                return true;
            }
            if seen.contains(&id) {
                continue;
            }
            seen.push(id);
            if let Some(n) = self.nodes.get(&id) {
                stack.extend(n.sources());
            }
        }
        false
    }

    /// Add the `source -> consumer` back-edge.
    pub(crate) fn link(&mut self, source: NodeId, consumer: NodeId) {
        if let Some(n) = self.nodes.get_mut(&source) {
            n.base.add_target(consumer);
        }
    }

    /// Drop the `source -> consumer` back-edge.
    pub(crate) fn unlink(&mut self, source: NodeId, consumer: NodeId) {
        if let Some(n) = self.nodes.get_mut(&source) {
            n.base.remove_target(consumer);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/graph/mod.rs"]
mod tests;
