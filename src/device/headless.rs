use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::device::shader::{self, ProgramInfo, ShaderCompileError, ShaderSource};
use crate::device::{
    BlendMode, Device, DeviceLimits, DrawCall, FramebufferId, Geometry, ModelId, ProgramId,
    RenderTarget, TextureId, UniformValue,
};
use crate::foundation::core::{FrameRGBA, Point, byte_len};
use crate::foundation::error::{CompographError, CompographResult};
use crate::foundation::math::Mat4;

#[derive(Clone, Debug)]
struct Pixels {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Pixels {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; byte_len(width, height)],
        }
    }

    fn texel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    lost: bool,
    limits: DeviceLimits,
    screen: Option<Pixels>,
    textures: HashMap<TextureId, Pixels>,
    framebuffers: HashMap<FramebufferId, TextureId>,
    programs: HashMap<ProgramId, ProgramInfo>,
    models: HashMap<ModelId, Geometry>,
    draws: Vec<DrawCall>,
    compiles: u64,
    framebuffer_allocations: u64,
}

impl State {
    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_alive(&self) -> CompographResult<()> {
        if self.lost {
            return Err(CompographError::device("context lost"));
        }
        Ok(())
    }

    fn check_size(&self, width: u32, height: u32) -> CompographResult<()> {
        let max = self.limits.max_texture_size;
        if width > max || height > max {
            return Err(CompographError::device(format!(
                "{width}x{height} exceeds MAX_TEXTURE_SIZE={max}"
            )));
        }
        Ok(())
    }

    fn target_pixels(&self, target: RenderTarget) -> CompographResult<&Pixels> {
        match target {
            RenderTarget::Screen => self
                .screen
                .as_ref()
                .ok_or_else(|| CompographError::device("no default framebuffer")),
            RenderTarget::Framebuffer(fb) => {
                let tex = self
                    .framebuffers
                    .get(&fb)
                    .ok_or_else(|| CompographError::device(format!("unknown framebuffer {fb:?}")))?;
                self.textures
                    .get(tex)
                    .ok_or_else(|| CompographError::device(format!("unknown texture {tex:?}")))
            }
        }
    }

    fn target_pixels_mut(&mut self, target: RenderTarget) -> CompographResult<&mut Pixels> {
        match target {
            RenderTarget::Screen => self
                .screen
                .as_mut()
                .ok_or_else(|| CompographError::device("no default framebuffer")),
            RenderTarget::Framebuffer(fb) => {
                let tex = *self
                    .framebuffers
                    .get(&fb)
                    .ok_or_else(|| CompographError::device(format!("unknown framebuffer {fb:?}")))?;
                self.textures
                    .get_mut(&tex)
                    .ok_or_else(|| CompographError::device(format!("unknown texture {tex:?}")))
            }
        }
    }
}

/// CPU device used by tests and headless hosts.
///
/// Clones share one context, so a test can keep a handle while the engine owns another and
/// inspect the recorded draw log, live resource counts and pixels. Draws are rasterized with
/// nearest sampling of the first bound texture through the inverse of the 2D part of the
/// `transform` uniform; fragment math is not executed. A program without textures fills with its
/// `color` uniform when one is bound.
#[derive(Clone, Debug, Default)]
pub struct HeadlessDevice {
    state: Rc<RefCell<State>>,
}

impl HeadlessDevice {
    /// New device whose default framebuffer is `width`x`height`.
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_limits(width, height, DeviceLimits::default())
    }

    /// New device with explicit limits.
    pub fn with_limits(width: u32, height: u32, limits: DeviceLimits) -> Self {
        let state = State {
            limits,
            screen: Some(Pixels::new(width, height)),
            ..State::default()
        };
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    /// Every draw executed so far, in order.
    pub fn draw_log(&self) -> Vec<DrawCall> {
        self.state.borrow().draws.clone()
    }

    /// Forget recorded draws.
    pub fn clear_draw_log(&self) {
        self.state.borrow_mut().draws.clear();
    }

    /// Number of draws that landed on `target`.
    pub fn draws_into(&self, target: RenderTarget) -> usize {
        self.state
            .borrow()
            .draws
            .iter()
            .filter(|d| d.target == target)
            .count()
    }

    /// Live textures, including framebuffer color attachments.
    pub fn live_textures(&self) -> usize {
        self.state.borrow().textures.len()
    }

    /// Live framebuffers.
    pub fn live_framebuffers(&self) -> usize {
        self.state.borrow().framebuffers.len()
    }

    /// Live programs.
    pub fn live_programs(&self) -> usize {
        self.state.borrow().programs.len()
    }

    /// Live models.
    pub fn live_models(&self) -> usize {
        self.state.borrow().models.len()
    }

    /// Successful program compilations so far.
    pub fn compile_count(&self) -> u64 {
        self.state.borrow().compiles
    }

    /// Framebuffer storage allocations so far (creation and effective resizes).
    pub fn framebuffer_allocations(&self) -> u64 {
        self.state.borrow().framebuffer_allocations
    }

    /// Reflection data for a live program.
    pub fn program_info(&self, program: ProgramId) -> Option<ProgramInfo> {
        self.state.borrow().programs.get(&program).cloned()
    }

    /// Copy of a texture's pixels.
    pub fn texture_pixels(&self, texture: TextureId) -> Option<FrameRGBA> {
        let st = self.state.borrow();
        let px = st.textures.get(&texture)?;
        Some(FrameRGBA {
            width: px.width,
            height: px.height,
            data: px.data.clone(),
            premultiplied: false,
        })
    }

    /// Copy of the default framebuffer.
    pub fn screen_pixels(&self) -> Option<FrameRGBA> {
        let st = self.state.borrow();
        let px = st.screen.as_ref()?;
        Some(FrameRGBA {
            width: px.width,
            height: px.height,
            data: px.data.clone(),
            premultiplied: false,
        })
    }

    /// Simulate context loss: every handle dies and further calls fail until restored.
    pub fn lose_context(&self) {
        let mut st = self.state.borrow_mut();
        st.lost = true;
        st.textures.clear();
        st.framebuffers.clear();
        st.programs.clear();
        st.models.clear();
        if let Some(screen) = st.screen.as_mut() {
            screen.data.fill(0);
        }
    }

    /// Make the context usable again. Old handles stay dead.
    pub fn restore_context(&self) {
        self.state.borrow_mut().lost = false;
    }

    fn rasterize(st: &mut State, call: &DrawCall) -> CompographResult<()> {
        let program = st
            .programs
            .get(&call.program)
            .ok_or_else(|| CompographError::device(format!("unknown program {:?}", call.program)))?
            .clone();
        if !st.models.contains_key(&call.model) {
            return Err(CompographError::device(format!(
                "unknown model {:?}",
                call.model
            )));
        }

        let sampled = program
            .textures
            .iter()
            .find_map(|name| call.uniforms.get(name).and_then(UniformValue::as_texture))
            .map(|tex| {
                st.textures
                    .get(&tex)
                    .cloned()
                    .ok_or_else(|| CompographError::device(format!("unknown texture {tex:?}")))
            })
            .transpose()?;
        let fill = match call.uniforms.get("color") {
            Some(UniformValue::Vec4(c)) => Some(c.map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)),
            _ => None,
        };

        let transform = match call.uniforms.get("transform") {
            Some(UniformValue::Mat4(m)) => *m,
            _ => Mat4::IDENTITY,
        };
        let affine = transform.to_affine();
        if affine.determinant().abs() < 1e-12 {
            return Ok(());
        }
        let inverse = affine.inverse();

        let dest = st.target_pixels_mut(call.target)?;
        if call.options.clear {
            dest.data.fill(0);
        }
        if sampled.is_none() && fill.is_none() {
            return Ok(());
        }

        let vw = call.options.width.min(dest.width);
        let vh = call.options.height.min(dest.height);
        for py in 0..vh {
            for px in 0..vw {
                let ndc = Point::new(
                    (f64::from(px) + 0.5) / f64::from(vw) * 2.0 - 1.0,
                    1.0 - (f64::from(py) + 0.5) / f64::from(vh) * 2.0,
                );
                let q = inverse * ndc;
                if !(-1.0..=1.0).contains(&q.x) || !(-1.0..=1.0).contains(&q.y) {
                    continue;
                }
                let src = match (&sampled, fill) {
                    (Some(tex), _) => {
                        if tex.width == 0 || tex.height == 0 {
                            continue;
                        }
                        let u = (q.x + 1.0) / 2.0;
                        let v = (q.y + 1.0) / 2.0;
                        let tx = ((u * f64::from(tex.width)) as u32).min(tex.width - 1);
                        let ty = (((1.0 - v) * f64::from(tex.height)) as u32).min(tex.height - 1);
                        tex.texel(tx, ty)
                    }
                    (None, Some(c)) => c,
                    (None, None) => continue,
                };
                let i = (py as usize * dest.width as usize + px as usize) * 4;
                let dst = [
                    dest.data[i],
                    dest.data[i + 1],
                    dest.data[i + 2],
                    dest.data[i + 3],
                ];
                let out = match call.options.blend {
                    BlendMode::Replace => src,
                    BlendMode::SourceOver => source_over(dst, src),
                };
                dest.data[i..i + 4].copy_from_slice(&out);
            }
        }
        Ok(())
    }
}

fn source_over(dst: [u8; 4], src: [u8; 4]) -> [u8; 4] {
    let sa = u32::from(src[3]);
    let inv = 255 - sa;
    let mut out = [0u8; 4];
    for c in 0..3 {
        out[c] = ((u32::from(src[c]) * sa + u32::from(dst[c]) * inv + 127) / 255) as u8;
    }
    out[3] = ((sa * 255 + u32::from(dst[3]) * inv + 127) / 255) as u8;
    out
}

impl Device for HeadlessDevice {
    fn limits(&self) -> DeviceLimits {
        self.state.borrow().limits.clone()
    }

    fn is_lost(&self) -> bool {
        self.state.borrow().lost
    }

    fn screen_size(&self) -> (u32, u32) {
        self.state
            .borrow()
            .screen
            .as_ref()
            .map(|s| (s.width, s.height))
            .unwrap_or((0, 0))
    }

    fn set_screen_size(&mut self, width: u32, height: u32) {
        let mut st = self.state.borrow_mut();
        let same = st
            .screen
            .as_ref()
            .is_some_and(|s| s.width == width && s.height == height);
        if !same {
            st.screen = Some(Pixels::new(width, height));
        }
    }

    fn create_texture(&mut self, width: u32, height: u32) -> CompographResult<TextureId> {
        let mut st = self.state.borrow_mut();
        st.check_alive()?;
        st.check_size(width, height)?;
        let id = TextureId(st.next());
        st.textures.insert(id, Pixels::new(width, height));
        Ok(id)
    }

    fn upload_texture(&mut self, texture: TextureId, frame: &FrameRGBA) -> CompographResult<()> {
        let mut st = self.state.borrow_mut();
        st.check_alive()?;
        st.check_size(frame.width, frame.height)?;
        let px = st
            .textures
            .get_mut(&texture)
            .ok_or_else(|| CompographError::device(format!("unknown texture {texture:?}")))?;
        if frame.data.len() != byte_len(frame.width, frame.height) {
            return Err(CompographError::validation("frame buffer size mismatch"));
        }
        px.width = frame.width;
        px.height = frame.height;
        px.data.clone_from(&frame.data);
        Ok(())
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.state.borrow_mut().textures.remove(&texture);
    }

    fn create_framebuffer(&mut self, width: u32, height: u32) -> CompographResult<FramebufferId> {
        let mut st = self.state.borrow_mut();
        st.check_alive()?;
        st.check_size(width, height)?;
        let tex = TextureId(st.next());
        st.textures.insert(tex, Pixels::new(width, height));
        let fb = FramebufferId(st.next());
        st.framebuffers.insert(fb, tex);
        st.framebuffer_allocations += 1;
        Ok(fb)
    }

    fn resize_framebuffer(
        &mut self,
        framebuffer: FramebufferId,
        width: u32,
        height: u32,
    ) -> CompographResult<()> {
        let mut st = self.state.borrow_mut();
        st.check_alive()?;
        st.check_size(width, height)?;
        let tex = *st.framebuffers.get(&framebuffer).ok_or_else(|| {
            CompographError::device(format!("unknown framebuffer {framebuffer:?}"))
        })?;
        let px = st
            .textures
            .get_mut(&tex)
            .ok_or_else(|| CompographError::device(format!("unknown texture {tex:?}")))?;
        if px.width == width && px.height == height {
            return Ok(());
        }
        *px = Pixels::new(width, height);
        st.framebuffer_allocations += 1;
        Ok(())
    }

    fn framebuffer_texture(&self, framebuffer: FramebufferId) -> Option<TextureId> {
        self.state.borrow().framebuffers.get(&framebuffer).copied()
    }

    fn framebuffer_size(&self, framebuffer: FramebufferId) -> Option<(u32, u32)> {
        let st = self.state.borrow();
        let tex = st.framebuffers.get(&framebuffer)?;
        st.textures.get(tex).map(|p| (p.width, p.height))
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        let mut st = self.state.borrow_mut();
        if let Some(tex) = st.framebuffers.remove(&framebuffer) {
            st.textures.remove(&tex);
        }
    }

    fn compile_program(&mut self, source: &ShaderSource) -> Result<ProgramId, ShaderCompileError> {
        let limits = self.limits();
        let info = shader::compile(source, &limits)?;
        let mut st = self.state.borrow_mut();
        if st.lost {
            return Err(ShaderCompileError {
                name: info.name,
                stage: shader::ShaderStage::Vertex,
                message: "context lost".to_owned(),
                line: None,
                listing: String::new(),
                limits,
            });
        }
        let id = ProgramId(st.next());
        st.programs.insert(id, info);
        st.compiles += 1;
        Ok(id)
    }

    fn program_uniforms(&self, program: ProgramId) -> Vec<String> {
        self.state
            .borrow()
            .programs
            .get(&program)
            .map(|p| p.uniforms.clone())
            .unwrap_or_default()
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.state.borrow_mut().programs.remove(&program);
    }

    fn create_model(&mut self, geometry: &Geometry) -> CompographResult<ModelId> {
        let mut st = self.state.borrow_mut();
        st.check_alive()?;
        if geometry.positions.len() != geometry.tex_coords.len() {
            return Err(CompographError::validation(
                "geometry needs one texture coordinate per vertex",
            ));
        }
        let id = ModelId(st.next());
        st.models.insert(id, geometry.clone());
        Ok(id)
    }

    fn delete_model(&mut self, model: ModelId) {
        self.state.borrow_mut().models.remove(&model);
    }

    fn draw(&mut self, call: &DrawCall) -> CompographResult<()> {
        let mut st = self.state.borrow_mut();
        st.check_alive()?;
        Self::rasterize(&mut st, call)?;
        st.draws.push(call.clone());
        Ok(())
    }

    fn read_pixels(
        &mut self,
        target: RenderTarget,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> CompographResult<FrameRGBA> {
        let st = self.state.borrow();
        st.check_alive()?;
        st.check_size(width, height)?;
        let src = st.target_pixels(target)?;
        let mut out = FrameRGBA::transparent(width, height);
        for row in 0..height {
            for col in 0..width {
                // Texels outside the target stay transparent.
                let (Some(sx), Some(sy)) = (x.checked_add(col), y.checked_add(row)) else {
                    continue;
                };
                if sx >= src.width || sy >= src.height {
                    continue;
                }
                let i = (row as usize * width as usize + col as usize) * 4;
                out.data[i..i + 4].copy_from_slice(&src.texel(sx, sy));
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/device/headless.rs"]
mod tests;
