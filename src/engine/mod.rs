//! The [`Engine`]: owner of every node, the device context and the render daemon.
//!
//! All state lives here and is passed explicitly; there are no process-wide registries. Two
//! engines only see each other through a shared [`SurfaceRegistry`].

use std::collections::BTreeMap;

use tracing::debug;

use crate::device::surface::SurfaceRegistry;
use crate::device::{ProgramId, TextureId};
use crate::foundation::core::FrameRGBA;
use crate::foundation::error::{CompographError, CompographResult};
use crate::foundation::ids::{EngineId, ListenerId, NodeId};
use crate::foundation::math::Mat4;
use crate::graph::alias::Alias;
use crate::graph::node::{EventKind, NodeEvent, NodeRole};
use crate::graph::target::TargetMode;
use crate::graph::{Graph, NodeKind};
use crate::plugin::inputs::{InputValue, InputValues};
use crate::plugin::registry::{EffectManifest, PluginRegistry};

pub mod context;
pub mod daemon;
pub mod draw;
pub mod options;

use context::GpuContext;
use daemon::Daemon;
use options::EngineOptions;

/// A compositing graph together with its device context and frame scheduler.
pub struct Engine {
    pub(crate) id: EngineId,
    pub(crate) graph: Graph,
    pub(crate) registry: PluginRegistry,
    pub(crate) surfaces: SurfaceRegistry,
    pub(crate) defaults: BTreeMap<String, InputValues>,
    pub(crate) aliases: BTreeMap<String, Alias>,
    /// `None` while detached or lost.
    pub(crate) gpu: Option<GpuContext>,
    /// Target whose surface provided `gpu`.
    pub(crate) primary: Option<NodeId>,
    pub(crate) context_lost: bool,
    pub(crate) auto: bool,
    pub(crate) daemon: Daemon,
    next_listener: u64,
    destroyed: bool,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("id", &self.id)
            .field("nodes", &self.graph.nodes.len())
            .field("attached", &self.gpu.is_some())
            .field("context_lost", &self.context_lost)
            .field("auto", &self.auto)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Engine with the built-in plugins and a private surface registry.
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    /// Engine from explicit options.
    pub fn with_options(options: EngineOptions) -> Self {
        let id = EngineId::next();
        Self {
            id,
            graph: Graph::new(id),
            registry: options.registry,
            surfaces: options.surfaces,
            defaults: options.defaults,
            aliases: BTreeMap::new(),
            gpu: None,
            primary: None,
            context_lost: false,
            auto: options.auto,
            daemon: Daemon::default(),
            next_listener: 0,
            destroyed: false,
        }
    }

    /// This engine's identity.
    pub fn id(&self) -> EngineId {
        self.id
    }

    /// Registered plugins.
    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Registered plugins, for adding kinds after construction.
    pub fn registry_mut(&mut self) -> &mut PluginRegistry {
        &mut self.registry
    }

    pub(crate) fn ensure_alive(&self) -> CompographResult<()> {
        if self.destroyed {
            return Err(CompographError::validation("engine is destroyed"));
        }
        Ok(())
    }

    // Queries.

    /// Whether `node` is a live node of this engine.
    pub fn is_node(&self, node: NodeId) -> bool {
        self.graph.check(node).is_ok()
    }

    /// Live nodes in creation order.
    pub fn nodes(&self) -> Vec<NodeId> {
        self.graph.ids()
    }

    /// Role of a node.
    pub fn node_kind(&self, node: NodeId) -> CompographResult<NodeRole> {
        Ok(self.graph.get(node)?.role())
    }

    /// Plugin hook a node was created from (`canvas`, `image`, `brightness-contrast`, ...).
    pub fn hook(&self, node: NodeId) -> CompographResult<&str> {
        Ok(self.graph.get(node)?.base.hook.as_str())
    }

    /// Current size.
    pub fn size(&self, node: NodeId) -> CompographResult<(u32, u32)> {
        let n = self.graph.get(node)?;
        Ok((n.base.width, n.base.height))
    }

    /// Whether the node (and everything it requires) has content.
    pub fn is_ready(&self, node: NodeId) -> CompographResult<bool> {
        Ok(self.graph.get(node)?.base.ready)
    }

    /// Whether the node's output is stale.
    pub fn is_dirty(&self, node: NodeId) -> CompographResult<bool> {
        Ok(self.graph.get(node)?.base.dirty)
    }

    /// Consumers of a node, in connection order.
    pub fn targets_of(&self, node: NodeId) -> CompographResult<Vec<NodeId>> {
        Ok(self.graph.get(node)?.base.targets.clone())
    }

    /// Upstream nodes of a node.
    pub fn sources_of(&self, node: NodeId) -> CompographResult<Vec<NodeId>> {
        Ok(self.graph.get(node)?.sources())
    }

    /// Current value of an effect input or transform property.
    pub fn input(&self, node: NodeId, name: &str) -> CompographResult<InputValue> {
        let unknown = || CompographError::UnknownInput {
            node,
            input: name.to_owned(),
        };
        match &self.graph.get(node)?.kind {
            NodeKind::Effect(e) => e.inputs.get(name).cloned().ok_or_else(unknown),
            NodeKind::Transform(t) => t.behavior.get(name).ok_or_else(unknown),
            NodeKind::Source(_) | NodeKind::Target(_) => Err(CompographError::WrongNodeKind {
                node,
                expected: "effect or transform",
            }),
        }
    }

    /// Every input of an effect or property of a transform.
    pub fn inputs(&self, node: NodeId) -> CompographResult<InputValues> {
        match &self.graph.get(node)?.kind {
            NodeKind::Effect(e) => Ok(e.inputs.clone()),
            NodeKind::Transform(t) => Ok(t
                .schema
                .iter()
                .filter_map(|s| t.behavior.get(&s.name).map(|v| (s.name.clone(), v)))
                .collect()),
            NodeKind::Source(_) | NodeKind::Target(_) => Err(CompographError::WrongNodeKind {
                node,
                expected: "effect or transform",
            }),
        }
    }

    /// Matrix a consumer applies when sampling this node (identity except for transforms).
    pub fn cumulative_matrix(&self, node: NodeId) -> CompographResult<Mat4> {
        Ok(self.graph.get(node)?.cumulative_matrix())
    }

    /// Texture holding the node's last output, if it has one on the current context.
    pub fn texture_of(&self, node: NodeId) -> CompographResult<Option<TextureId>> {
        let n = self.graph.get(node)?;
        let Some(gpu) = self.gpu.as_ref() else {
            return Ok(None);
        };
        let own = n
            .base
            .framebuffer
            .and_then(|fb| gpu.device.framebuffer_texture(fb));
        Ok(match &n.kind {
            NodeKind::Source(s) => s.external_texture().or(s.texture),
            _ => own,
        })
    }

    /// Program an effect draws with; instances of a common-shader kind share one.
    pub fn program_of(&self, node: NodeId) -> CompographResult<Option<ProgramId>> {
        let n = self.graph.get(node)?;
        let base = self.gpu.as_ref().map(|g| g.base_program);
        Ok(match (n.effect(), base) {
            (Some(e), Some(base)) => e.shader.program(base),
            _ => None,
        })
    }

    /// Last resource failure recorded on the node (shader build, cross-origin media).
    pub fn node_fault(&self, node: NodeId) -> CompographResult<Option<String>> {
        Ok(self.graph.get(node)?.base.fault.clone())
    }

    // Node operations.

    /// Render a node and its upstream now, returning the texture that holds its output.
    ///
    /// Only a dirty and ready node draws; a clean one returns its last texture. A transform
    /// hands back its upstream texture (sample it through [`Engine::cumulative_matrix`]) and a
    /// target returns `None`.
    pub fn render_node(&mut self, node: NodeId) -> CompographResult<Option<TextureId>> {
        self.graph.check(node)?;
        self.pull_node(node, false)
    }

    /// Recompute a node's size from its upstream and inputs. Returns whether it changed.
    ///
    /// An unchanged size emits nothing, so calling this twice in a row is a no-op.
    pub fn resize(&mut self, node: NodeId) -> CompographResult<bool> {
        self.graph.check(node)?;
        let changed = self.graph.resize(node);
        if changed {
            self.arm_if_needed();
        }
        Ok(changed)
    }

    /// Mark a node and everything downstream dirty. Nodes already dirty are skipped.
    pub fn set_dirty(&mut self, node: NodeId) -> CompographResult<()> {
        self.graph.check(node)?;
        self.graph.set_dirty(node);
        self.arm_if_needed();
        Ok(())
    }

    // Events.

    /// Register a listener for one event kind on a node.
    pub fn on(
        &mut self,
        node: NodeId,
        kind: EventKind,
        listener: impl FnMut(&NodeEvent) + 'static,
    ) -> CompographResult<ListenerId> {
        let n = self.graph.get_mut(node)?;
        self.next_listener += 1;
        let id = ListenerId(self.next_listener);
        n.base.listeners.push((id, kind, Box::new(listener)));
        Ok(id)
    }

    /// Remove a listener. Returns whether it was registered on `node`.
    pub fn off(&mut self, node: NodeId, listener: ListenerId) -> CompographResult<bool> {
        let n = self.graph.get_mut(node)?;
        let before = n.base.listeners.len();
        n.base.listeners.retain(|(id, _, _)| *id != listener);
        Ok(n.base.listeners.len() != before)
    }

    // Defaults.

    /// Replace the default input values applied to new nodes of `hook`.
    pub fn set_defaults(&mut self, hook: &str, values: InputValues) {
        self.defaults.insert(hook.to_owned(), values);
    }

    /// Merge defaults from JSON of the form `{"hook": {"input": value}}`.
    pub fn set_defaults_json(&mut self, json: &str) -> CompographResult<()> {
        let parsed: BTreeMap<String, InputValues> = serde_json::from_str(json)
            .map_err(|e| CompographError::validation(format!("defaults json: {e}")))?;
        for (hook, values) in parsed {
            self.defaults.entry(hook).or_default().extend(values);
        }
        Ok(())
    }

    /// Forget the defaults of one hook, or of every hook.
    pub fn clear_defaults(&mut self, hook: Option<&str>) {
        match hook {
            Some(h) => {
                self.defaults.remove(h);
            }
            None => self.defaults.clear(),
        }
    }

    /// Defaults registered for `hook`.
    pub fn defaults(&self, hook: &str) -> Option<&InputValues> {
        self.defaults.get(hook)
    }

    // Plugins.

    /// Why `hook` (or, with `None`, any effect) cannot run here: `"context"` when no device
    /// context is attached, `"plugin-<hook>"` when an effect rejects the device limits.
    pub fn incompatible(&self, hook: Option<&str>) -> Option<String> {
        let Some(gpu) = self.gpu.as_ref() else {
            return Some("context".to_owned());
        };
        let limits = gpu.device.limits();
        let hooks = match hook {
            Some(h) => vec![h.to_owned()],
            None => self.registry.effect_hooks(),
        };
        hooks.into_iter().find_map(|h| {
            let entry = self.registry.effect(&h)?;
            (!entry.plugin.compatible(&limits)).then(|| format!("plugin-{h}"))
        })
    }

    /// Manifest of every registered effect.
    pub fn effect_manifest(&self) -> Vec<EffectManifest> {
        self.registry.effect_manifest()
    }

    fn destroy_nodes_where(&mut self, role: NodeRole, hook: &str) {
        let doomed: Vec<NodeId> = self
            .graph
            .nodes
            .values()
            .filter(|n| n.role() == role && n.base.hook == hook)
            .map(|n| n.base.id)
            .collect();
        for id in doomed {
            if let Err(err) = self.destroy_node(id) {
                debug!(node = %id, %err, "node already gone");
            }
        }
    }

    /// Destroy every effect of `hook` and unregister it.
    pub fn remove_effect_plugin(&mut self, hook: &str) -> bool {
        self.destroy_nodes_where(NodeRole::Effect, hook);
        self.registry.remove_effect(hook)
    }

    /// Destroy every source adapted by `hook` and unregister it.
    pub fn remove_source_plugin(&mut self, hook: &str) -> bool {
        self.destroy_nodes_where(NodeRole::Source, hook);
        self.registry.remove_source(hook)
    }

    /// Destroy every transform of `hook` and unregister it.
    pub fn remove_transform_plugin(&mut self, hook: &str) -> bool {
        self.destroy_nodes_where(NodeRole::Transform, hook);
        self.registry.remove_transform(hook)
    }

    /// Destroy every target adapted by `hook` and unregister it.
    pub fn remove_target_plugin(&mut self, hook: &str) -> bool {
        self.destroy_nodes_where(NodeRole::Target, hook);
        self.registry.remove_target(hook)
    }

    // Teardown.

    /// Destroy a node immediately: sever every edge, release its device resources and drop it.
    ///
    /// Consumers keep existing with the slot emptied. Destroying the target that owns the device
    /// context tears the context down for the whole engine.
    pub fn destroy_node(&mut self, node: NodeId) -> CompographResult<()> {
        let n = self.graph.get(node)?;
        let sources = n.sources();
        let consumers = n.base.targets.clone();
        for s in sources {
            self.graph.unlink(s, node);
        }
        for c in consumers {
            self.detach_consumer(c, node);
        }
        self.release_gpu(node);

        if let Some(n) = self.graph.nodes.get_mut(&node) {
            match &mut n.kind {
                NodeKind::Source(s) => s.plugin.destroy(node),
                NodeKind::Effect(e) => e.plugin.destroy(node),
                NodeKind::Transform(_) => {}
                NodeKind::Target(t) => {
                    if let TargetMode::Plugin(p) = &t.mode {
                        p.destroy(node);
                    }
                    self.surfaces.release(t.surface.key(), self.id);
                }
            }
        }
        self.aliases.retain(|_, a| a.node != node);

        if self.primary == Some(node) {
            self.primary = None;
            self.handle_context_lost(true);
            // Nothing left to restore from.
            self.context_lost = false;
        }
        self.graph.nodes.remove(&node);
        debug!(node = %node, "node destroyed");
        self.arm_if_needed();
        Ok(())
    }

    fn detach_consumer(&mut self, consumer: NodeId, source: NodeId) {
        let Some(n) = self.graph.nodes.get_mut(&consumer) else {
            return;
        };
        match &mut n.kind {
            NodeKind::Effect(e) => {
                let slots: Vec<String> = e
                    .sources
                    .iter()
                    .filter(|(_, s)| **s == source)
                    .map(|(k, _)| k.clone())
                    .collect();
                for slot in slots {
                    e.sources.remove(&slot);
                    e.inputs.insert(slot, InputValue::Image(None));
                }
            }
            NodeKind::Transform(t) if t.source == Some(source) => t.source = None,
            NodeKind::Target(t) if t.source == Some(source) => t.source = None,
            _ => return,
        }
        self.graph.resize(consumer);
        self.graph.refresh_ready(consumer);
        self.graph.set_transform_dirty(consumer);
    }

    /// Destroy every node and drop all callbacks. The engine refuses new nodes afterwards.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.stop();
        let primary = self.primary;
        let mut ids = self.graph.ids();
        ids.retain(|id| Some(*id) != primary);
        ids.reverse();
        ids.extend(primary);
        for id in ids {
            if let Err(err) = self.destroy_node(id) {
                debug!(node = %id, %err, "node already gone");
            }
        }
        self.aliases.clear();
        self.daemon.requester = None;
        self.destroyed = true;
        debug!(engine = %self.id, "engine destroyed");
    }

    /// Whether [`Engine::destroy`] was called.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Read back a rectangle (origin top-left) of a node's output, rendering it first.
    ///
    /// Transforms are rasterized for this; targets are read from wherever they draw.
    pub fn read_pixels(
        &mut self,
        node: NodeId,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> CompographResult<FrameRGBA> {
        self.graph.check(node)?;
        if self.gpu.is_none() {
            return Err(CompographError::NoContext);
        }
        self.read_node_pixels(node, x, y, width, height)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let keys: Vec<_> = self
            .graph
            .nodes
            .values()
            .filter_map(|n| match &n.kind {
                NodeKind::Target(t) => Some(t.surface.key()),
                _ => None,
            })
            .collect();
        for key in keys {
            self.surfaces.release(key, self.id);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/engine/mod.rs"]
mod tests;
