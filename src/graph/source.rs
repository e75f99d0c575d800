use std::rc::Rc;

use tracing::debug;

use crate::device::TextureId;
use crate::engine::Engine;
use crate::engine::options::SourceOptions;
use crate::foundation::error::{CompographError, CompographResult};
use crate::foundation::ids::NodeId;
use crate::graph::node::{NodeBase, NodeRole};
use crate::graph::{Node, NodeKind};
use crate::media::{MediaKind, MediaRef};
use crate::plugin::SourcePlugin;
use crate::plugin::builtin::sources::{CanvasSource, ImageSource, TextureSource};

/// Source node state: one adapted media handle and the texture it uploads into.
pub(crate) struct SourceState {
    pub(crate) media: MediaRef,
    pub(crate) plugin: Rc<dyn SourcePlugin>,
    pub(crate) options: SourceOptions,
    /// Pixels arrive top row first; `false` flips rows before upload.
    pub(crate) flip: bool,
    pub(crate) texture: Option<TextureId>,
    /// Cleared while no context exists and, permanently, after a cross-origin failure.
    pub(crate) allow_refresh: bool,
    pub(crate) cross_origin: bool,
    /// Waiting for the media to load before a texture can be allocated.
    pub(crate) deferred: bool,
    pub(crate) uploaded_version: Option<u64>,
}

impl SourceState {
    /// Device texture owned by the media itself, for texture sources.
    pub(crate) fn external_texture(&self) -> Option<TextureId> {
        match self.media.kind() {
            MediaKind::Texture(t) => Some(t),
            _ => None,
        }
    }
}

fn intrinsic(hook: &str) -> Option<Rc<dyn SourcePlugin>> {
    match hook {
        "canvas" => Some(Rc::new(CanvasSource)),
        "image" => Some(Rc::new(ImageSource)),
        "texture" => Some(Rc::new(TextureSource)),
        _ => None,
    }
}

fn sniff(media: &MediaRef) -> Option<(&'static str, Rc<dyn SourcePlugin>)> {
    let hook = match media.kind() {
        MediaKind::Canvas => "canvas",
        MediaKind::Image => "image",
        MediaKind::Texture(_) => "texture",
        MediaKind::Video | MediaKind::Other(_) => return None,
    };
    intrinsic(hook).map(|p| (hook, p))
}

impl Engine {
    /// Adapt `media` into a source node, or return the node that already adapts it.
    ///
    /// Adapter order: the `hook` the caller forces, then intrinsic sniffing (canvas, image,
    /// texture), then registered source plugins in registration order.
    pub fn source(
        &mut self,
        media: MediaRef,
        hook: Option<&str>,
        options: SourceOptions,
    ) -> CompographResult<NodeId> {
        self.ensure_alive()?;
        if let Some(existing) = self.find_source(&media) {
            return Ok(existing);
        }
        let (hook, plugin) = self.pick_source_adapter(&media, hook, &options)?;

        let id = self.graph.alloc_id();
        let deferred = plugin.defer_texture(&media);
        let flip = options
            .flip
            .unwrap_or(!matches!(media.kind(), MediaKind::Texture(_)));
        let state = SourceState {
            media,
            plugin,
            options,
            flip,
            texture: None,
            allow_refresh: self.gpu.is_some(),
            cross_origin: false,
            deferred,
            uploaded_version: None,
        };
        self.graph.insert(Node {
            base: NodeBase::new(id, hook.as_str()),
            kind: NodeKind::Source(state),
        });
        self.graph.resize(id);
        self.graph.refresh_ready(id);
        debug!(node = %id, hook = %hook, deferred, "source created");
        self.arm_if_needed();
        Ok(id)
    }

    fn find_source(&self, media: &MediaRef) -> Option<NodeId> {
        self.graph.nodes.values().find_map(|n| match &n.kind {
            NodeKind::Source(s) if s.plugin.compare(&s.media, media) => Some(n.base.id),
            _ => None,
        })
    }

    fn pick_source_adapter(
        &self,
        media: &MediaRef,
        hook: Option<&str>,
        options: &SourceOptions,
    ) -> CompographResult<(String, Rc<dyn SourcePlugin>)> {
        if let Some(hook) = hook {
            let plugin = intrinsic(hook)
                .or_else(|| self.registry.source(hook).cloned())
                .ok_or_else(|| CompographError::unknown_kind("source", hook))?;
            if plugin.probe(media, options, true) {
                return Ok((hook.to_owned(), plugin));
            }
        }
        if let Some((hook, plugin)) = sniff(media) {
            return Ok((hook.to_owned(), plugin));
        }
        self.registry
            .sources()
            .find(|(_, p)| p.probe(media, options, false))
            .map(|(h, p)| (h.to_owned(), Rc::clone(p)))
            .ok_or(CompographError::UnknownSourceType)
    }

    /// The host changed the media's pixels (drew on a canvas, swapped a frame): re-upload on the
    /// next render and dirty everything downstream.
    pub fn update_source(&mut self, node: NodeId) -> CompographResult<()> {
        if self.graph.get(node)?.role() != NodeRole::Source {
            return Err(CompographError::WrongNodeKind {
                node,
                expected: "source",
            });
        }
        if !self.poll_source(node) {
            self.graph.force_dirty(node);
        }
        self.arm_if_needed();
        Ok(())
    }

    /// Check one source against its media: finish a deferred load or pick up new content.
    ///
    /// Returns whether anything changed.
    pub(crate) fn poll_source(&mut self, id: NodeId) -> bool {
        let Some(NodeKind::Source(s)) = self.graph.nodes.get_mut(&id).map(|n| &mut n.kind) else {
            return false;
        };
        if s.deferred {
            if s.plugin.defer_texture(&s.media) {
                return false;
            }
            s.deferred = false;
            self.graph.resize(id);
            self.graph.refresh_ready(id);
            self.graph.force_dirty(id);
            return true;
        }
        if s.allow_refresh && s.plugin.check_dirty(&s.media, s.uploaded_version) {
            self.graph.force_dirty(id);
            return true;
        }
        false
    }
}
