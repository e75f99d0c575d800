//! Device-context lifecycle: attach, loss, restore, and the derived GPU cache.
//!
//! Topology (nodes, edges, input values) is graph metadata and never touched here. Textures,
//! framebuffers and programs are a disposable cache over it: loss drops the cache, restore
//! rebuilds it lazily by marking every node dirty.

use std::collections::HashMap;

use tracing::{error, info, warn};

use crate::device::shader::ShaderSource;
use crate::device::{Device, Geometry, ModelId, ProgramId};
use crate::engine::Engine;
use crate::foundation::error::{CompographError, CompographResult};
use crate::foundation::ids::NodeId;
use crate::graph::NodeKind;
use crate::graph::effect::{EffectShader, EffectState};
use crate::graph::node::EventKind;
use crate::graph::target::TargetMode;

/// Program shared by every instance of a common-shader effect kind.
#[derive(Clone, Copy, Debug)]
pub(crate) struct CommonShader {
    pub(crate) program: ProgramId,
    pub(crate) count: usize,
}

/// The attached device plus the resources every node shares.
pub(crate) struct GpuContext {
    pub(crate) device: Box<dyn Device>,
    pub(crate) base_program: ProgramId,
    pub(crate) model: ModelId,
    pub(crate) common: HashMap<String, CommonShader>,
}

fn build_shader(
    gpu: &mut GpuContext,
    hook: &str,
    e: &EffectState,
) -> CompographResult<EffectShader> {
    if e.plugin.common_shader() {
        if let Some(c) = gpu.common.get_mut(hook) {
            c.count += 1;
            return Ok(EffectShader::Common(c.program));
        }
    }
    let Some(source) = e.plugin.shader(&e.inputs, &ShaderSource::base()) else {
        return Ok(EffectShader::Base);
    };
    let program = gpu
        .device
        .compile_program(&source.named(&format!("compograph.{hook}")))?;
    if e.plugin.common_shader() {
        gpu.common
            .insert(hook.to_owned(), CommonShader { program, count: 1 });
        Ok(EffectShader::Common(program))
    } else {
        Ok(EffectShader::Own(program))
    }
}

/// Give back an effect's program: delete an own one, drop one reference to a common one.
pub(crate) fn release_shader(gpu: &mut GpuContext, hook: &str, shader: EffectShader) {
    match shader {
        EffectShader::Own(p) => gpu.device.delete_program(p),
        EffectShader::Common(p) => {
            let last = match gpu.common.get_mut(hook) {
                Some(c) => {
                    c.count = c.count.saturating_sub(1);
                    c.count == 0
                }
                None => false,
            };
            if last {
                gpu.common.remove(hook);
                gpu.device.delete_program(p);
            }
        }
        EffectShader::Unbuilt | EffectShader::Base => {}
    }
}

impl Engine {
    /// Build (or rebuild, when `shader_dirty`) an effect's program.
    ///
    /// A failure is recorded on the node, which becomes permanently unready; siblings are not
    /// affected.
    pub(crate) fn ensure_effect_shader(&mut self, id: NodeId) -> CompographResult<()> {
        let Some(gpu) = self.gpu.as_mut() else {
            return Ok(());
        };
        let Some(node) = self.graph.nodes.get_mut(&id) else {
            return Err(CompographError::NodeNotFound(id));
        };
        let hook = node.base.hook.clone();
        let NodeKind::Effect(e) = &mut node.kind else {
            return Ok(());
        };
        match e.shader {
            EffectShader::Common(_) => return Ok(()),
            EffectShader::Own(_) | EffectShader::Base if !e.shader_dirty => return Ok(()),
            _ => {}
        }

        let outcome = match build_shader(gpu, &hook, e) {
            Ok(shader) => {
                if let EffectShader::Own(old) = e.shader {
                    gpu.device.delete_program(old);
                }
                e.shader = shader;
                e.shader_dirty = false;
                Ok(())
            }
            Err(err) => {
                e.broken = true;
                let report = match &err {
                    CompographError::ShaderCompile(c) => c.diagnostics(),
                    other => other.to_string(),
                };
                error!(node = %id, hook = %hook, "shader build failed:\n{report}");
                node.base.fault = Some(err.to_string());
                Err(err)
            }
        };
        if outcome.is_err() {
            self.graph.refresh_ready(id);
        }
        outcome
    }

    /// Release every device resource a node holds on the current context.
    pub(crate) fn release_gpu(&mut self, id: NodeId) {
        let Some(node) = self.graph.nodes.get_mut(&id) else {
            return;
        };
        let fb = node.base.framebuffer.take();
        let hook = node.base.hook.clone();
        if let NodeKind::Target(t) = &mut node.kind {
            if let TargetMode::Secondary(sec) = &mut t.mode {
                sec.release();
            }
        }
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };
        if let Some(fb) = fb {
            gpu.device.delete_framebuffer(fb);
        }
        match &mut node.kind {
            NodeKind::Source(s) => {
                if let Some(t) = s.texture.take() {
                    gpu.device.delete_texture(t);
                }
            }
            NodeKind::Effect(e) => {
                let shader = std::mem::replace(&mut e.shader, EffectShader::Unbuilt);
                release_shader(gpu, &hook, shader);
            }
            NodeKind::Transform(_) | NodeKind::Target(_) => {}
        }
    }

    /// Adopt a freshly created device context.
    ///
    /// Returns `Ok(false)` when the context is already lost; the engine then stays in the lost
    /// state until a later restore.
    pub(crate) fn attach_context(&mut self, mut device: Box<dyn Device>) -> CompographResult<bool> {
        if device.is_lost() {
            warn!(engine = %self.id, "attached device context is already lost");
            self.context_lost = true;
            return Ok(false);
        }
        let base_program =
            device.compile_program(&ShaderSource::base().named("compograph.base"))?;
        let model = device.create_model(&Geometry::unit_quad())?;
        self.gpu = Some(GpuContext {
            device,
            base_program,
            model,
            common: HashMap::new(),
        });
        self.context_lost = false;

        let mut effects = Vec::new();
        for node in self.graph.nodes.values_mut() {
            match &mut node.kind {
                NodeKind::Effect(e) => {
                    e.shader_dirty = true;
                    effects.push(node.base.id);
                }
                NodeKind::Source(s) => s.allow_refresh = !s.cross_origin,
                NodeKind::Transform(_) | NodeKind::Target(_) => {}
            }
        }
        for id in effects {
            // Failures are recorded on the node.
            let _ = self.ensure_effect_shader(id);
        }
        Ok(true)
    }

    /// Drop the device context and every resource derived from it, keeping topology.
    ///
    /// `signal` emits `ContextLost` on every node.
    pub(crate) fn handle_context_lost(&mut self, signal: bool) {
        let gpu = self.gpu.take();
        let mut gpu = gpu.filter(|g| !g.device.is_lost());

        for node in self.graph.nodes.values_mut() {
            let id = node.base.id;
            if let (Some(fb), Some(gpu)) = (node.base.framebuffer.take(), gpu.as_mut()) {
                gpu.device.delete_framebuffer(fb);
            }
            match &mut node.kind {
                NodeKind::Source(s) => {
                    if let (Some(t), Some(gpu)) = (s.texture.take(), gpu.as_mut()) {
                        gpu.device.delete_texture(t);
                    }
                    s.allow_refresh = false;
                    s.uploaded_version = None;
                }
                NodeKind::Effect(e) => {
                    if let (EffectShader::Own(p), Some(gpu)) = (e.shader, gpu.as_mut()) {
                        gpu.device.delete_program(p);
                    }
                    e.shader = EffectShader::Unbuilt;
                    e.shader_dirty = true;
                    e.plugin.lost_context(id);
                }
                NodeKind::Transform(t) => t.raster_stale = true,
                NodeKind::Target(_) => {}
            }
        }
        if let Some(gpu) = gpu.as_mut() {
            for c in gpu.common.values() {
                gpu.device.delete_program(c.program);
            }
            gpu.device.delete_program(gpu.base_program);
            gpu.device.delete_model(gpu.model);
        }

        self.context_lost = true;
        self.daemon.requested = false;
        warn!(engine = %self.id, "device context lost");
        if signal {
            for node in self.graph.nodes.values_mut() {
                node.base.emit(EventKind::ContextLost);
            }
        }
    }

    /// Whether the attached context is gone (or none could be attached yet).
    pub fn is_context_lost(&self) -> bool {
        self.context_lost
    }

    /// Whether a device context is attached.
    pub fn has_context(&self) -> bool {
        self.gpu.is_some()
    }

    /// Try to rebuild the device context from the primary target's surface.
    ///
    /// Returns `Ok(false)` when there is nothing to restore from or the surface's context is
    /// still lost. On success every node is dirty and receives `ContextRestored`.
    pub fn restore_context(&mut self) -> CompographResult<bool> {
        if self.gpu.is_some() {
            return Ok(true);
        }
        let surface = match self.primary.and_then(|p| self.graph.nodes.get(&p)).map(|n| &n.kind) {
            Some(NodeKind::Target(t)) => t.surface.clone(),
            _ => return Ok(false),
        };
        let Some(device) = surface.create_context() else {
            return Ok(false);
        };
        if device.is_lost() || !self.attach_context(device)? {
            return Ok(false);
        }

        for node in self.graph.nodes.values_mut() {
            match &mut node.kind {
                NodeKind::Transform(t) => t.transform_dirty = true,
                NodeKind::Target(t) => t.transform_dirty = true,
                NodeKind::Source(_) | NodeKind::Effect(_) => {}
            }
            if !node.base.dirty {
                node.base.dirty = true;
                node.base.emit(EventKind::Dirty);
            }
            node.base.emit(EventKind::ContextRestored);
        }
        info!(engine = %self.id, "device context restored");
        self.arm_if_needed();
        Ok(true)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/engine/context.rs"]
mod tests;
