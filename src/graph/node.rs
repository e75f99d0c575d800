use std::fmt;

use crate::device::FramebufferId;
use crate::foundation::ids::{ListenerId, NodeId};

/// The four node roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// Adapts external media into a texture.
    Source,
    /// Shader pass over typed inputs.
    Effect,
    /// Matrix applied to a single source.
    Transform,
    /// Terminal sink bound to a drawing surface.
    Target,
}

impl NodeRole {
    /// Lowercase role name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Effect => "effect",
            Self::Transform => "transform",
            Self::Target => "target",
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Node event kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The node became ready.
    Ready,
    /// The node became unready.
    Unready,
    /// The node became dirty.
    Dirty,
    /// The node's size changed.
    Resize,
    /// The node finished a render.
    Render,
    /// The device context went away.
    ContextLost,
    /// The device context was rebuilt.
    ContextRestored,
}

/// Event delivered to node listeners.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeEvent {
    /// Emitting node.
    pub node: NodeId,
    /// What happened.
    pub kind: EventKind,
}

/// Listener callback. Delivery is synchronous, during the call that caused the event.
pub type Listener = Box<dyn FnMut(&NodeEvent)>;

/// State shared by every node role.
pub(crate) struct NodeBase {
    pub(crate) id: NodeId,
    pub(crate) hook: String,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) ready: bool,
    pub(crate) dirty: bool,
    /// Consumers of this node's output, in connection order. Never contains `id`.
    pub(crate) targets: Vec<NodeId>,
    pub(crate) listeners: Vec<(ListenerId, EventKind, Listener)>,
    /// Last resource failure (shader, cross-origin media), if any.
    pub(crate) fault: Option<String>,
    pub(crate) framebuffer: Option<FramebufferId>,
}

impl NodeBase {
    pub(crate) fn new(id: NodeId, hook: impl Into<String>) -> Self {
        Self {
            id,
            hook: hook.into(),
            width: 1,
            height: 1,
            ready: false,
            dirty: true,
            targets: Vec::new(),
            listeners: Vec::new(),
            fault: None,
            framebuffer: None,
        }
    }

    pub(crate) fn emit(&mut self, kind: EventKind) {
        let event = NodeEvent {
            node: self.id,
            kind,
        };
        for (_, k, listener) in &mut self.listeners {
            if *k == kind {
                listener(&event);
            }
        }
    }

    pub(crate) fn add_target(&mut self, target: NodeId) {
        if target != self.id && !self.targets.contains(&target) {
            self.targets.push(target);
        }
    }

    pub(crate) fn remove_target(&mut self, target: NodeId) {
        self.targets.retain(|t| *t != target);
    }
}
