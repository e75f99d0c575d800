//! Pull-based rendering: a node renders its upstream first, then draws itself if
//! `dirty && ready`.

use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::{error, instrument};

use crate::device::{
    DrawCall, DrawOptions, FramebufferId, RenderTarget, TextureId, UniformValue, Uniforms,
};
use crate::engine::Engine;
use crate::foundation::core::FrameRGBA;
use crate::foundation::error::{CompographError, CompographResult};
use crate::foundation::ids::NodeId;
use crate::foundation::math::Mat4;
use crate::graph::NodeKind;
use crate::graph::node::{EventKind, NodeRole};
use crate::graph::target::TargetMode;
use crate::media::MediaError;
use crate::plugin::inputs::{InputSchema, InputValue, InputValues};
use crate::plugin::{EffectPass, TargetPlugin};

fn quad_uniforms(texture: TextureId, transform: Mat4) -> Uniforms {
    let mut uniforms = Uniforms::new();
    uniforms.insert("source".to_owned(), UniformValue::Texture(texture));
    uniforms.insert("transform".to_owned(), UniformValue::Mat4(transform));
    uniforms
}

fn input_uniforms(
    schema: &InputSchema,
    inputs: &InputValues,
    textures: &BTreeMap<String, TextureId>,
) -> Uniforms {
    let mut uniforms = Uniforms::new();
    for spec in schema.iter() {
        let Some(name) = spec.uniform.as_ref() else {
            continue;
        };
        let value = match inputs.get(&spec.name) {
            Some(InputValue::Number(v)) => UniformValue::Float(*v as f32),
            Some(InputValue::Bool(b)) => UniformValue::Bool(*b),
            Some(InputValue::Color(c)) => UniformValue::Vec4(*c),
            Some(InputValue::Vector(v)) => {
                let at = |i: usize| v.get(i).copied().unwrap_or(0.0);
                match v.len() {
                    0..=2 => UniformValue::Vec2([at(0), at(1)]),
                    3 => UniformValue::Vec3([at(0), at(1), at(2)]),
                    _ => UniformValue::Vec4([at(0), at(1), at(2), at(3)]),
                }
            }
            Some(InputValue::String(s)) => match spec.options.iter().position(|(k, _)| k == s) {
                Some(i) => UniformValue::Int(i as i32),
                None => continue,
            },
            Some(InputValue::Image(_)) => match textures.get(&spec.name) {
                Some(t) => UniformValue::Texture(*t),
                None => continue,
            },
            None => continue,
        };
        uniforms.insert(name.clone(), value);
    }
    uniforms
}

/// How a target's frame leaves the shared device.
enum Delivery {
    Screen,
    Present(Option<Rc<dyn TargetPlugin>>),
    Secondary,
}

impl Engine {
    /// Render `id` and return the texture holding its output.
    ///
    /// `need_pixels` asks a transform to rasterize instead of passing its upstream texture and
    /// matrix through.
    pub(crate) fn pull_node(
        &mut self,
        id: NodeId,
        need_pixels: bool,
    ) -> CompographResult<Option<TextureId>> {
        match self.graph.get(id)?.role() {
            NodeRole::Source => self.render_source(id),
            NodeRole::Effect => self.render_effect(id),
            NodeRole::Transform => self.render_transform(id, need_pixels),
            NodeRole::Target => self.render_target_node(id).map(|()| None),
        }
    }

    /// Allocate the node's framebuffer, or resize it when the node size moved.
    pub(crate) fn ensure_framebuffer(&mut self, id: NodeId) -> CompographResult<FramebufferId> {
        let gpu = self.gpu.as_mut().ok_or(CompographError::NoContext)?;
        let node = self
            .graph
            .nodes
            .get_mut(&id)
            .ok_or(CompographError::NodeNotFound(id))?;
        let (w, h) = (node.base.width, node.base.height);
        match node.base.framebuffer {
            Some(fb) => {
                if gpu.device.framebuffer_size(fb) != Some((w, h)) {
                    gpu.device.resize_framebuffer(fb, w, h)?;
                }
                Ok(fb)
            }
            None => {
                let fb = gpu.device.create_framebuffer(w, h)?;
                node.base.framebuffer = Some(fb);
                Ok(fb)
            }
        }
    }

    fn render_source(&mut self, id: NodeId) -> CompographResult<Option<TextureId>> {
        let Some(gpu) = self.gpu.as_mut() else {
            return Ok(None);
        };
        let node = self
            .graph
            .nodes
            .get_mut(&id)
            .ok_or(CompographError::NodeNotFound(id))?;
        let (w, h) = (node.base.width, node.base.height);
        let NodeKind::Source(s) = &mut node.kind else {
            return Ok(None);
        };

        let texture = if let Some(external) = s.external_texture() {
            external
        } else {
            if s.deferred {
                return Ok(None);
            }
            let texture = match s.texture {
                Some(t) => t,
                None => {
                    let t = gpu.device.create_texture(w, h)?;
                    s.texture = Some(t);
                    t
                }
            };
            let stale = node.base.dirty || s.uploaded_version.is_none();
            if stale && s.allow_refresh {
                match s.plugin.pixels(&s.media) {
                    Ok(frame) => {
                        let frame = if s.flip {
                            frame
                        } else {
                            frame.flipped_vertical()
                        };
                        gpu.device.upload_texture(texture, &frame)?;
                        s.uploaded_version = Some(s.media.version());
                    }
                    Err(MediaError::CrossOrigin) => {
                        s.cross_origin = true;
                        s.allow_refresh = false;
                        let err = CompographError::CrossOriginMedia(id);
                        error!(node = %id, %err, "source refresh disabled");
                        node.base.fault = Some(err.to_string());
                    }
                    Err(MediaError::NotLoaded) => return Ok(None),
                    Err(MediaError::NoPixels) => {}
                }
            }
            texture
        };

        if node.base.dirty {
            node.base.dirty = false;
            node.base.emit(EventKind::Render);
        }
        Ok(Some(texture))
    }

    fn render_effect(&mut self, id: NodeId) -> CompographResult<Option<TextureId>> {
        if self.gpu.is_none() {
            return Ok(None);
        }
        let (in_place, required) = {
            let e = self
                .graph
                .get(id)?
                .effect()
                .ok_or(CompographError::WrongNodeKind {
                    node: id,
                    expected: "effect",
                })?;
            let required: Vec<(String, NodeId)> = e
                .schema
                .images()
                .filter(|spec| e.plugin.requires(&spec.name, &e.inputs))
                .filter_map(|spec| e.sources.get(&spec.name).map(|s| (spec.name.clone(), *s)))
                .collect();
            (e.in_place_single(), required)
        };

        let mut textures = BTreeMap::new();
        for (name, src) in &required {
            if let Some(t) = self.pull_node(*src, !in_place)? {
                textures.insert(name.clone(), t);
            }
        }

        let (dirty, ready) = {
            let n = self.graph.get(id)?;
            (n.base.dirty, n.base.ready)
        };
        if !(dirty && ready) {
            return self.texture_of(id);
        }

        self.ensure_effect_shader(id)?;
        let framebuffer = match self.ensure_framebuffer(id) {
            Ok(fb) => fb,
            Err(err @ CompographError::Device(_)) => {
                self.break_effect(id, &err);
                return Err(err);
            }
            Err(err) => return Err(err),
        };
        let transform = match (in_place, required.first()) {
            (true, Some((_, src))) => self.graph.get(*src)?.cumulative_matrix(),
            _ => Mat4::IDENTITY,
        };

        let Some(gpu) = self.gpu.as_mut() else {
            return Ok(None);
        };
        let node = self
            .graph
            .nodes
            .get_mut(&id)
            .ok_or(CompographError::NodeNotFound(id))?;
        let (width, height) = (node.base.width, node.base.height);
        let NodeKind::Effect(e) = &node.kind else {
            return Ok(None);
        };
        let Some(program) = e.shader.program(gpu.base_program) else {
            return Ok(None);
        };
        let mut uniforms = input_uniforms(&e.schema, &e.inputs, &textures);
        uniforms.insert("transform".to_owned(), UniformValue::Mat4(transform));
        uniforms.insert(
            "resolution".to_owned(),
            UniformValue::Vec2([width as f32, height as f32]),
        );
        let plugin = Rc::clone(&e.plugin);
        let mut pass = EffectPass {
            device: gpu.device.as_mut(),
            node: id,
            program,
            model: gpu.model,
            framebuffer,
            uniforms,
            inputs: &e.inputs,
            width,
            height,
        };
        plugin.draw(&mut pass)?;

        node.base.dirty = false;
        node.base.emit(EventKind::Render);
        Ok(gpu.device.framebuffer_texture(framebuffer))
    }

    /// Take an effect out of service after a resource failure; siblings keep rendering.
    fn break_effect(&mut self, id: NodeId, err: &CompographError) {
        let Some(node) = self.graph.nodes.get_mut(&id) else {
            return;
        };
        error!(node = %id, %err, "effect disabled");
        node.base.fault = Some(err.to_string());
        if let Some(e) = node.effect_mut() {
            e.broken = true;
        }
        self.graph.refresh_ready(id);
    }

    fn render_transform(
        &mut self,
        id: NodeId,
        need_pixels: bool,
    ) -> CompographResult<Option<TextureId>> {
        let source = match &self.graph.get(id)?.kind {
            NodeKind::Transform(t) => t.source,
            _ => return Ok(None),
        };
        let Some(src) = source else {
            let node = self.graph.get_mut(id)?;
            if let NodeKind::Transform(t) = &mut node.kind {
                t.cumulative = t.behavior.matrix();
                t.transform_dirty = false;
            }
            return Ok(None);
        };

        let upstream = self.pull_node(src, false)?;
        let src_matrix = self.graph.get(src)?.cumulative_matrix();

        let node = self.graph.get_mut(id)?;
        let NodeKind::Transform(t) = &mut node.kind else {
            return Ok(None);
        };
        if t.transform_dirty {
            t.cumulative = if t.behavior.transformed() {
                t.behavior.matrix().mul(&src_matrix)
            } else {
                src_matrix
            };
            t.transform_dirty = false;
        }
        if node.base.dirty {
            t.raster_stale = true;
            node.base.dirty = false;
            node.base.emit(EventKind::Render);
        }
        let cumulative = t.cumulative;
        let raster_stale = t.raster_stale;

        if !need_pixels || cumulative == Mat4::IDENTITY {
            return Ok(upstream);
        }
        let Some(upstream) = upstream else {
            return Ok(None);
        };
        if self.gpu.is_none() {
            return Ok(None);
        }
        let framebuffer = self.ensure_framebuffer(id)?;
        let (w, h) = self.size(id)?;
        let Some(gpu) = self.gpu.as_mut() else {
            return Ok(None);
        };
        if raster_stale {
            gpu.device.draw(&DrawCall {
                program: gpu.base_program,
                model: gpu.model,
                target: RenderTarget::Framebuffer(framebuffer),
                uniforms: quad_uniforms(upstream, cumulative),
                options: DrawOptions::pass(w, h),
            })?;
            if let Some(t) = self.graph.get_mut(id)?.transform_mut() {
                t.raster_stale = false;
            }
        }
        Ok(gpu_texture(self, framebuffer))
    }

    /// Matrix mapping the source's resolution (and cumulative transform) onto the target.
    fn target_matrix(&self, id: NodeId, src: NodeId) -> CompographResult<Mat4> {
        let target = self.graph.get(id)?;
        let source = self.graph.get(src)?;
        let (tw, th) = (target.base.width, target.base.height);
        let (sw, sh) = (source.base.width, source.base.height);
        let cumulative = source.cumulative_matrix();
        // Scale last: translations in `cumulative` are in source units and shrink with the quad.
        let mut matrix = if (sw, sh) == (tw, th) {
            cumulative
        } else {
            Mat4::scale(sw as f32 / tw as f32, sh as f32 / th as f32).mul(&cumulative)
        };
        if let NodeKind::Target(t) = &target.kind {
            if t.options.flip {
                matrix = Mat4::scale(1.0, -1.0).mul(&matrix);
            }
        }
        Ok(matrix)
    }

    #[instrument(skip(self))]
    fn render_target_node(&mut self, id: NodeId) -> CompographResult<()> {
        let n = self.graph.get(id)?;
        let NodeKind::Target(t) = &n.kind else {
            return Ok(());
        };
        if !(n.base.dirty && n.base.ready) || self.gpu.is_none() {
            return Ok(());
        }
        let Some(src) = t.source else {
            return Ok(());
        };
        let delivery = match &t.mode {
            TargetMode::Inert => return Ok(()),
            TargetMode::Primary if !t.options.render_to_texture => Delivery::Screen,
            TargetMode::Primary | TargetMode::SharedTexture => Delivery::Present(None),
            TargetMode::Plugin(p) => Delivery::Present(Some(Rc::clone(p))),
            TargetMode::Secondary(_) => Delivery::Secondary,
        };
        let surface = t.surface.clone();

        let Some(texture) = self.pull_node(src, false)? else {
            return Ok(());
        };
        let matrix = self.target_matrix(id, src)?;
        if let Some(t) = self.graph.get_mut(id)?.target_mut() {
            t.transform_dirty = false;
        }
        let (w, h) = self.size(id)?;
        let uniforms = quad_uniforms(texture, matrix);

        match delivery {
            Delivery::Screen => {
                let Some(gpu) = self.gpu.as_mut() else {
                    return Ok(());
                };
                if gpu.device.screen_size() != (w, h) {
                    gpu.device.set_screen_size(w, h);
                }
                gpu.device.draw(&DrawCall {
                    program: gpu.base_program,
                    model: gpu.model,
                    target: RenderTarget::Screen,
                    uniforms,
                    options: DrawOptions::output(w, h),
                })?;
            }
            Delivery::Present(plugin) => {
                let frame = self.draw_offscreen(id, uniforms, w, h)?;
                match plugin {
                    Some(p) => p.present(&surface, &frame)?,
                    None => surface.present(&frame),
                }
            }
            Delivery::Secondary => {
                let frame = self.draw_offscreen(id, uniforms, w, h)?;
                if let Some(NodeKind::Target(t)) = self.graph.nodes.get_mut(&id).map(|n| &mut n.kind)
                {
                    if let TargetMode::Secondary(sec) = &mut t.mode {
                        sec.device.upload_texture(sec.texture, &frame)?;
                        if sec.device.screen_size() != (w, h) {
                            sec.device.set_screen_size(w, h);
                        }
                        sec.device.draw(&DrawCall {
                            program: sec.program,
                            model: sec.model,
                            target: RenderTarget::Screen,
                            uniforms: quad_uniforms(sec.texture, Mat4::IDENTITY),
                            options: DrawOptions::output(w, h),
                        })?;
                    }
                }
            }
        }

        let node = self.graph.get_mut(id)?;
        node.base.dirty = false;
        node.base.emit(EventKind::Render);
        Ok(())
    }

    /// Draw into the node's framebuffer on the shared device and read the frame back.
    fn draw_offscreen(
        &mut self,
        id: NodeId,
        uniforms: Uniforms,
        w: u32,
        h: u32,
    ) -> CompographResult<FrameRGBA> {
        let framebuffer = self.ensure_framebuffer(id)?;
        let gpu = self.gpu.as_mut().ok_or(CompographError::NoContext)?;
        let target = RenderTarget::Framebuffer(framebuffer);
        gpu.device.draw(&DrawCall {
            program: gpu.base_program,
            model: gpu.model,
            target,
            uniforms,
            options: DrawOptions::output(w, h),
        })?;
        gpu.device.read_pixels(target, 0, 0, w, h)
    }

    /// Copy a texture through a scratch framebuffer and read a rectangle of it.
    fn read_texture(
        &mut self,
        texture: Option<TextureId>,
        size: (u32, u32),
        rect: (u32, u32, u32, u32),
    ) -> CompographResult<FrameRGBA> {
        let (x, y, w, h) = rect;
        let Some(texture) = texture else {
            return Ok(FrameRGBA::transparent(w, h));
        };
        let gpu = self.gpu.as_mut().ok_or(CompographError::NoContext)?;
        let scratch = gpu.device.create_framebuffer(size.0, size.1)?;
        let target = RenderTarget::Framebuffer(scratch);
        let result = gpu
            .device
            .draw(&DrawCall {
                program: gpu.base_program,
                model: gpu.model,
                target,
                uniforms: quad_uniforms(texture, Mat4::IDENTITY),
                options: DrawOptions::pass(size.0, size.1),
            })
            .and_then(|()| gpu.device.read_pixels(target, x, y, w, h));
        gpu.device.delete_framebuffer(scratch);
        result
    }

    pub(crate) fn read_node_pixels(
        &mut self,
        id: NodeId,
        x: u32,
        y: u32,
        w: u32,
        h: u32,
    ) -> CompographResult<FrameRGBA> {
        let rect = (x, y, w, h);
        let size = self.size(id)?;
        match self.graph.get(id)?.role() {
            NodeRole::Effect => {
                self.pull_node(id, true)?;
                let framebuffer = self.ensure_framebuffer(id)?;
                let gpu = self.gpu.as_mut().ok_or(CompographError::NoContext)?;
                gpu.device
                    .read_pixels(RenderTarget::Framebuffer(framebuffer), x, y, w, h)
            }
            NodeRole::Transform => {
                let texture = self.pull_node(id, true)?;
                let own = self.graph.get(id)?.base.framebuffer;
                match own {
                    Some(fb) if texture.is_some() && gpu_texture(self, fb) == texture => {
                        let gpu = self.gpu.as_mut().ok_or(CompographError::NoContext)?;
                        gpu.device
                            .read_pixels(RenderTarget::Framebuffer(fb), x, y, w, h)
                    }
                    _ => self.read_texture(texture, size, rect),
                }
            }
            NodeRole::Source => {
                let texture = self.pull_node(id, false)?;
                self.read_texture(texture, size, rect)
            }
            NodeRole::Target => {
                self.pull_node(id, false)?;
                let (framebuffer, screen) = match &self.graph.get(id)?.kind {
                    NodeKind::Target(t) => match &t.mode {
                        TargetMode::Inert => return Err(CompographError::NoContext),
                        TargetMode::Primary if !t.options.render_to_texture => (None, true),
                        TargetMode::Secondary(_) => (None, false),
                        _ => (self.graph.get(id)?.base.framebuffer, false),
                    },
                    _ => return Err(CompographError::NoContext),
                };
                if screen {
                    let gpu = self.gpu.as_mut().ok_or(CompographError::NoContext)?;
                    return gpu.device.read_pixels(RenderTarget::Screen, x, y, w, h);
                }
                if let Some(fb) = framebuffer {
                    let gpu = self.gpu.as_mut().ok_or(CompographError::NoContext)?;
                    return gpu.device.read_pixels(RenderTarget::Framebuffer(fb), x, y, w, h);
                }
                match self.graph.get_mut(id)?.target_mut().map(|t| &mut t.mode) {
                    Some(TargetMode::Secondary(sec)) => {
                        sec.device.read_pixels(RenderTarget::Screen, x, y, w, h)
                    }
                    _ => Ok(FrameRGBA::transparent(w, h)),
                }
            }
        }
    }
}

fn gpu_texture(engine: &Engine, framebuffer: FramebufferId) -> Option<TextureId> {
    engine
        .gpu
        .as_ref()
        .and_then(|g| g.device.framebuffer_texture(framebuffer))
}

#[cfg(test)]
#[path = "../../tests/unit/engine/draw.rs"]
mod tests;
