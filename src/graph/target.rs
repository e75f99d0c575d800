use std::rc::Rc;

use tracing::{debug, warn};

use crate::device::shader::ShaderSource;
use crate::device::surface::{SurfaceKind, SurfaceRef};
use crate::device::{Device, Geometry, ModelId, ProgramId, TextureId};
use crate::engine::Engine;
use crate::engine::options::TargetOptions;
use crate::foundation::error::{CompographError, CompographResult};
use crate::foundation::ids::NodeId;
use crate::graph::node::{NodeBase, NodeRole};
use crate::graph::{Node, NodeKind};
use crate::plugin::TargetPlugin;

/// A second device context, bridged from the shared one through readback and re-upload.
pub(crate) struct SecondaryContext {
    pub(crate) device: Box<dyn Device>,
    pub(crate) program: ProgramId,
    pub(crate) model: ModelId,
    pub(crate) texture: TextureId,
}

impl SecondaryContext {
    fn open(mut device: Box<dyn Device>, width: u32, height: u32) -> CompographResult<Self> {
        let program = device.compile_program(&ShaderSource::base().named("compograph.secondary"))?;
        let model = device.create_model(&Geometry::unit_quad())?;
        let texture = device.create_texture(width, height)?;
        Ok(Self {
            device,
            program,
            model,
            texture,
        })
    }

    pub(crate) fn release(&mut self) {
        if self.device.is_lost() {
            return;
        }
        self.device.delete_texture(self.texture);
        self.device.delete_model(self.model);
        self.device.delete_program(self.program);
    }
}

/// How a target gets its pixels onto the surface.
pub(crate) enum TargetMode {
    /// Owns the engine's device context and draws to the surface directly (or, with
    /// `render_to_texture`, into a framebuffer that is read back and presented).
    Primary,
    /// Draws into a framebuffer on the shared context; the frame is read back and presented.
    SharedTexture,
    /// Draws on the shared context, then re-uploads the frame into its own context.
    Secondary(SecondaryContext),
    /// Adapted by a target plugin; frames are read back and handed to the plugin.
    Plugin(Rc<dyn TargetPlugin>),
    /// The surface refused a context; the node exists but never draws.
    Inert,
}

pub(crate) struct TargetState {
    pub(crate) surface: SurfaceRef,
    pub(crate) mode: TargetMode,
    pub(crate) source: Option<NodeId>,
    pub(crate) auto: bool,
    pub(crate) options: TargetOptions,
    pub(crate) transform_dirty: bool,
}

enum Binding {
    Primary(Box<dyn Device>),
    Mode(TargetMode),
}

impl Engine {
    /// Bind a drawing surface as a target node, or return the node already bound to it.
    ///
    /// The first canvas bound opens the engine's device context. Later canvases need
    /// `render_to_texture` (draw on the shared context and present) or `allow_secondary_context`.
    /// Other surfaces go to the target plugins; `hook` forces one.
    pub fn target(
        &mut self,
        surface: SurfaceRef,
        hook: Option<&str>,
        options: TargetOptions,
    ) -> CompographResult<NodeId> {
        self.ensure_alive()?;
        let key = surface.key();
        let existing = self.graph.nodes.values().find_map(|n| match &n.kind {
            NodeKind::Target(t) if t.surface.key() == key => Some(n.base.id),
            _ => None,
        });
        if let Some(existing) = existing {
            return Ok(existing);
        }

        let (hook, binding) = self.pick_target_binding(&surface, hook, &options)?;
        let others = self.surfaces.claim(key, self.id);
        if !others.is_empty() {
            warn!(surface = key.0, ?others, "surface is already used by another engine");
        }

        let id = self.graph.alloc_id();
        let (mode, device) = match binding {
            Binding::Primary(device) => (TargetMode::Primary, Some(device)),
            Binding::Mode(mode) => (mode, None),
        };
        let state = TargetState {
            surface,
            mode,
            source: None,
            auto: options.auto.unwrap_or(self.auto),
            options,
            transform_dirty: true,
        };
        self.graph.insert(Node {
            base: NodeBase::new(id, hook.as_str()),
            kind: NodeKind::Target(state),
        });
        if let Some(device) = device {
            self.primary = Some(id);
            if let Err(err) = self.attach_context(device) {
                self.primary = None;
                self.graph.nodes.remove(&id);
                self.surfaces.release(key, self.id);
                return Err(err);
            }
        }
        self.graph.resize(id);
        self.graph.refresh_ready(id);
        debug!(node = %id, hook = %hook, "target created");
        self.arm_if_needed();
        Ok(id)
    }

    fn pick_target_binding(
        &self,
        surface: &SurfaceRef,
        hook: Option<&str>,
        options: &TargetOptions,
    ) -> CompographResult<(String, Binding)> {
        match hook {
            Some("canvas") => {}
            Some(h) => {
                let plugin = self
                    .registry
                    .target(h)
                    .ok_or_else(|| CompographError::unknown_kind("target", h))?;
                if plugin.probe(surface, options, true) {
                    return Ok((h.to_owned(), Binding::Mode(TargetMode::Plugin(Rc::clone(plugin)))));
                }
                return Err(CompographError::UnknownTargetType);
            }
            None if surface.kind() != SurfaceKind::Canvas => {
                return self
                    .registry
                    .targets()
                    .find(|(_, p)| p.probe(surface, options, false))
                    .map(|(h, p)| (h.to_owned(), Binding::Mode(TargetMode::Plugin(Rc::clone(p)))))
                    .ok_or(CompographError::UnknownTargetType);
            }
            None => {}
        }

        let canvas = "canvas".to_owned();
        if self.primary.is_none() {
            return Ok(match surface.create_context() {
                Some(device) => (canvas, Binding::Primary(device)),
                None => {
                    warn!(surface = surface.key().0, "surface refused a device context");
                    (canvas, Binding::Mode(TargetMode::Inert))
                }
            });
        }
        if options.render_to_texture {
            return Ok((canvas, Binding::Mode(TargetMode::SharedTexture)));
        }
        if !options.allow_secondary_context {
            return Err(CompographError::device(
                "only one device target surface allowed; set allow_secondary_context",
            ));
        }
        let Some(device) = surface.create_context() else {
            warn!(surface = surface.key().0, "surface refused a secondary context");
            return Ok((canvas, Binding::Mode(TargetMode::Inert)));
        };
        let (w, h) = surface.size();
        let secondary = SecondaryContext::open(
            device,
            options.width.unwrap_or(w).max(1),
            options.height.unwrap_or(h).max(1),
        )?;
        Ok((canvas, Binding::Mode(TargetMode::Secondary(secondary))))
    }

    /// Render this target every frame while it is dirty.
    pub fn set_auto(&mut self, node: NodeId, auto: bool) -> CompographResult<()> {
        let Some(t) = self.graph.get_mut(node)?.target_mut() else {
            return Err(CompographError::WrongNodeKind {
                node,
                expected: "target",
            });
        };
        t.auto = auto;
        self.arm_if_needed();
        Ok(())
    }

    /// Resize a target (and its surface).
    pub fn set_target_size(&mut self, node: NodeId, width: u32, height: u32) -> CompographResult<()> {
        let Some(t) = self.graph.get_mut(node)?.target_mut() else {
            return Err(CompographError::WrongNodeKind {
                node,
                expected: "target",
            });
        };
        let (width, height) = (width.max(1), height.max(1));
        t.options.width = Some(width);
        t.options.height = Some(height);
        t.surface.set_size(width, height);
        self.graph.resize(node);
        self.graph.set_transform_dirty(node);
        self.arm_if_needed();
        Ok(())
    }

    /// Render one target now, whether or not it is `auto`.
    pub fn render_target(&mut self, node: NodeId) -> CompographResult<()> {
        if self.graph.get(node)?.role() != NodeRole::Target {
            return Err(CompographError::WrongNodeKind {
                node,
                expected: "target",
            });
        }
        self.pull_node(node, false).map(|_| ())
    }
}
