//! Push-side state propagation: dirty, transform-dirty, readiness and size.
//!
//! Every walk is iterative over `targets`, so a long chain never grows the call stack, and every
//! walk stops at nodes that are already in the requested state. Fan-in therefore costs one visit.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::foundation::ids::NodeId;
use crate::graph::node::EventKind;
use crate::graph::{Graph, NodeKind};
use crate::plugin::inputs::InputValue;

impl Graph {
    /// Mark `id` and everything downstream dirty. No-op on nodes that are already dirty.
    pub(crate) fn set_dirty(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            let Some(node) = self.nodes.get_mut(&cur) else {
                continue;
            };
            if node.base.dirty {
                continue;
            }
            node.base.dirty = true;
            node.base.emit(EventKind::Dirty);
            stack.extend(node.base.targets.iter().copied());
        }
    }

    /// Re-dirty `id` even when it is already dirty, so consumers that rendered without it are
    /// reached too.
    pub(crate) fn force_dirty(&mut self, id: NodeId) {
        if let Some(n) = self.nodes.get_mut(&id) {
            n.base.dirty = false;
        }
        self.set_dirty(id);
    }

    /// Invalidate cumulative matrices from `id` downstream.
    ///
    /// Transform and target nodes get `transform_dirty` and keep propagating even when already
    /// dirty; any other consumer is simply marked dirty.
    pub(crate) fn set_transform_dirty(&mut self, id: NodeId) {
        let mut stack = vec![id];
        let mut seen = BTreeSet::new();
        while let Some(cur) = stack.pop() {
            if !seen.insert(cur) {
                continue;
            }
            let Some(node) = self.nodes.get_mut(&cur) else {
                continue;
            };
            match &mut node.kind {
                NodeKind::Transform(t) => t.transform_dirty = true,
                NodeKind::Target(t) => t.transform_dirty = true,
                NodeKind::Source(_) | NodeKind::Effect(_) => {
                    self.set_dirty(cur);
                    continue;
                }
            }
            if !node.base.dirty {
                node.base.dirty = true;
                node.base.emit(EventKind::Dirty);
            }
            stack.extend(node.base.targets.iter().copied());
        }
    }

    fn compute_ready(&self, id: NodeId) -> bool {
        let Some(node) = self.nodes.get(&id) else {
            return false;
        };
        let ready = |src: Option<&NodeId>| {
            src.and_then(|s| self.nodes.get(s))
                .is_some_and(|n| n.base.ready)
        };
        match &node.kind {
            NodeKind::Source(s) => !s.deferred,
            NodeKind::Effect(e) => {
                !e.broken
                    && e.schema.images().all(|spec| {
                        !e.plugin.requires(&spec.name, &e.inputs)
                            || ready(e.sources.get(&spec.name))
                    })
            }
            NodeKind::Transform(t) => ready(t.source.as_ref()),
            NodeKind::Target(t) => ready(t.source.as_ref()),
        }
    }

    /// Re-evaluate readiness of `id`; on a change emit `Ready`/`Unready` and re-evaluate every
    /// consumer.
    pub(crate) fn refresh_ready(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            let want = self.compute_ready(cur);
            let Some(node) = self.nodes.get_mut(&cur) else {
                continue;
            };
            if node.base.ready == want {
                continue;
            }
            node.base.ready = want;
            node.base.emit(if want {
                EventKind::Ready
            } else {
                EventKind::Unready
            });
            stack.extend(node.base.targets.iter().copied());
        }
    }

    /// Size a node should have given its upstream and inputs.
    pub(crate) fn compute_size(&self, id: NodeId) -> (u32, u32) {
        let Some(node) = self.nodes.get(&id) else {
            return (1, 1);
        };
        let size_of = |src: &NodeId| self.nodes.get(src).map(|n| (n.base.width, n.base.height));
        let (w, h) = match &node.kind {
            NodeKind::Source(s) => {
                let (mw, mh) = s.media.size();
                (
                    s.options.width.unwrap_or(mw),
                    s.options.height.unwrap_or(mh),
                )
            }
            NodeKind::Effect(e) => {
                let sizes: BTreeMap<String, (u32, u32)> = e
                    .sources
                    .iter()
                    .filter_map(|(name, src)| size_of(src).map(|s| (name.clone(), s)))
                    .collect();
                let dim = |name: &str| match e.inputs.get(name) {
                    Some(InputValue::Number(v)) if *v >= 1.0 => Some(*v as u32),
                    _ => None,
                };
                let first_image = || {
                    e.schema
                        .images()
                        .find_map(|spec| sizes.get(&spec.name).copied())
                };
                e.plugin
                    .resize(&e.inputs, &sizes)
                    .or_else(|| sizes.get("source").copied())
                    .or_else(|| dim("width").zip(dim("height")))
                    .or_else(first_image)
                    .unwrap_or((1, 1))
            }
            NodeKind::Transform(t) => t.source.as_ref().and_then(size_of).unwrap_or((1, 1)),
            NodeKind::Target(t) => {
                let (sw, sh) = t.surface.size();
                (t.options.width.unwrap_or(sw), t.options.height.unwrap_or(sh))
            }
        };
        (w.max(1), h.max(1))
    }

    /// Recompute the size of `id` and, on change, of everything downstream.
    ///
    /// Returns whether `id` itself changed. A node whose size is unchanged emits nothing, which
    /// makes a repeated call a no-op.
    pub(crate) fn resize(&mut self, id: NodeId) -> bool {
        let mut changed_root = false;
        let mut queue = VecDeque::from([id]);
        while let Some(cur) = queue.pop_front() {
            let (w, h) = self.compute_size(cur);
            let Some(node) = self.nodes.get_mut(&cur) else {
                continue;
            };
            if (node.base.width, node.base.height) == (w, h) {
                continue;
            }
            node.base.width = w;
            node.base.height = h;
            node.base.emit(EventKind::Resize);
            if cur == id {
                changed_root = true;
            }

            let matrix_node = match &mut node.kind {
                NodeKind::Transform(t) => {
                    t.behavior.resize(w, h);
                    true
                }
                NodeKind::Target(_) => true,
                NodeKind::Source(_) | NodeKind::Effect(_) => false,
            };
            let targets = node.base.targets.clone();
            if matrix_node {
                self.set_transform_dirty(cur);
            } else {
                self.set_dirty(cur);
            }
            for t in targets {
                let consumer_matrix = self
                    .nodes
                    .get(&t)
                    .is_some_and(|n| matches!(n.kind, NodeKind::Transform(_) | NodeKind::Target(_)));
                if consumer_matrix {
                    self.set_transform_dirty(t);
                }
                queue.push_back(t);
            }
        }
        changed_root
    }
}
