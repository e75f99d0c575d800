//! The render daemon: a frame scheduler that only stays armed while there is work.
//!
//! The engine never owns a timer. Whenever work appears it calls the host's frame requester
//! once (the equivalent of `requestAnimationFrame`) and the host answers with
//! [`Engine::tick`]. An idle graph requests nothing.

use tracing::{error, instrument};

use crate::engine::Engine;
use crate::foundation::error::CompographResult;
use crate::foundation::ids::CallbackId;
use crate::graph::NodeKind;
use crate::graph::node::NodeRole;
use crate::graph::target::TargetMode;

/// Per-frame callback; receives the engine and the tick timestamp.
pub type FrameCallback = Box<dyn FnMut(&mut Engine, f64)>;

#[derive(Default)]
pub(crate) struct Daemon {
    pub(crate) pre: Vec<(CallbackId, FrameCallback)>,
    pub(crate) post: Vec<(CallbackId, FrameCallback)>,
    /// A frame has been requested and not yet ticked.
    pub(crate) requested: bool,
    /// Bumped by `stop`, so callbacks taken out for a running tick are not put back.
    pub(crate) epoch: u64,
    pub(crate) requester: Option<Box<dyn FnMut()>>,
    next_callback: u64,
}

impl Engine {
    /// Start automatic rendering: every target becomes `auto`, and the optional callbacks run
    /// before and after each frame until [`Engine::stop`].
    ///
    /// Nothing renders synchronously; the daemon is armed and the next [`Engine::tick`] does the
    /// work. Targets that were not yet `auto` are marked dirty so they draw on that tick.
    ///
    /// Each call registers its callbacks anew under a fresh [`CallbackId`]; pass that id to
    /// [`Engine::cancel`] to drop them.
    pub fn go(&mut self, pre: Option<FrameCallback>, post: Option<FrameCallback>) -> CallbackId {
        self.daemon.next_callback += 1;
        let id = CallbackId(self.daemon.next_callback);
        if let Some(cb) = pre {
            self.daemon.pre.push((id, cb));
        }
        if let Some(cb) = post {
            self.daemon.post.push((id, cb));
        }
        self.auto = true;
        let mut switched = Vec::new();
        for node in self.graph.nodes.values_mut() {
            if let NodeKind::Target(t) = &mut node.kind {
                if !t.auto {
                    t.auto = true;
                    switched.push(node.base.id);
                }
            }
        }
        // A target that just went auto draws on the next tick even if it was clean.
        for id in switched {
            self.graph.set_dirty(id);
        }
        self.arm_if_needed();
        id
    }

    /// Drop the callbacks registered by one [`Engine::go`] call.
    pub fn cancel(&mut self, callback: CallbackId) {
        self.daemon.pre.retain(|(id, _)| *id != callback);
        self.daemon.post.retain(|(id, _)| *id != callback);
    }

    /// Drop every frame callback and cancel the pending frame.
    ///
    /// Targets keep their `auto` flag; see [`Engine::set_auto`].
    pub fn stop(&mut self) {
        self.daemon.pre.clear();
        self.daemon.post.clear();
        self.daemon.epoch += 1;
        self.daemon.requested = false;
    }

    /// Install the host hook called whenever the daemon wants a frame.
    pub fn set_frame_requester(&mut self, requester: impl FnMut() + 'static) {
        self.daemon.requester = Some(Box::new(requester));
        self.arm_if_needed();
    }

    /// Whether a frame is pending.
    pub fn frame_requested(&self) -> bool {
        self.daemon.requested
    }

    /// Render every target that is dirty and ready, in creation order. Returns the first error.
    pub fn render(&mut self) -> CompographResult<()> {
        let mut first = None;
        for id in self.graph.ids_of(NodeRole::Target) {
            if let Err(err) = self.pull_node(id, false) {
                first.get_or_insert(err);
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Run one daemon frame at timestamp `now`.
    ///
    /// Order: context check, pre callbacks, source polling, auto targets (each pulls its whole
    /// upstream), post callbacks. The daemon re-arms only if work remains.
    #[instrument(skip(self))]
    pub fn tick(&mut self, now: f64) {
        self.daemon.requested = false;

        if self.gpu.as_ref().is_some_and(|g| g.device.is_lost()) {
            self.handle_context_lost(true);
        }
        if self.context_lost {
            if let Err(err) = self.restore_context() {
                error!(%err, "context restore failed");
            }
        }

        self.run_callbacks(now, true);

        for id in self.graph.ids_of(NodeRole::Source) {
            self.poll_source(id);
        }

        for id in self.graph.ids_of(NodeRole::Target) {
            let due = self.graph.nodes.get(&id).is_some_and(|n| {
                let auto = matches!(&n.kind, NodeKind::Target(t) if t.auto);
                auto && n.base.dirty && n.base.ready
            });
            if !due {
                continue;
            }
            if let Err(err) = self.pull_node(id, false) {
                error!(node = %id, %err, "target render failed");
            }
        }

        self.run_callbacks(now, false);
        self.arm_if_needed();
    }

    fn run_callbacks(&mut self, now: f64, pre: bool) {
        let list = if pre {
            &mut self.daemon.pre
        } else {
            &mut self.daemon.post
        };
        let mut taken = std::mem::take(list);
        let epoch = self.daemon.epoch;
        for (_, cb) in &mut taken {
            cb(self, now);
        }
        if self.daemon.epoch != epoch {
            return;
        }
        let list = if pre {
            &mut self.daemon.pre
        } else {
            &mut self.daemon.post
        };
        let added = std::mem::take(list);
        taken.extend(added);
        *list = taken;
    }

    pub(crate) fn has_outstanding_work(&self) -> bool {
        if !self.daemon.pre.is_empty() || !self.daemon.post.is_empty() {
            return true;
        }
        if self.context_lost && self.primary.is_some() {
            return true;
        }
        let attached = self.gpu.is_some();
        self.graph.nodes.values().any(|n| match &n.kind {
            NodeKind::Source(s) => s.deferred || s.plugin.polls(),
            NodeKind::Target(t) => {
                attached
                    && t.auto
                    && n.base.dirty
                    && n.base.ready
                    && !matches!(t.mode, TargetMode::Inert)
            }
            NodeKind::Effect(_) | NodeKind::Transform(_) => false,
        })
    }

    /// Request a frame if one is not pending and there is work for it.
    pub(crate) fn arm_if_needed(&mut self) {
        if self.is_destroyed() || self.daemon.requested || !self.has_outstanding_work() {
            return;
        }
        self.daemon.requested = true;
        if let Some(requester) = self.daemon.requester.as_mut() {
            requester();
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/engine/daemon.rs"]
mod tests;
