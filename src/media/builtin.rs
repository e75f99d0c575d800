use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::device::TextureId;
use crate::foundation::core::FrameRGBA;
use crate::media::{Media, MediaError, MediaKind};

/// Still image that may finish loading after it is connected.
#[derive(Debug)]
pub struct ImageMedia {
    frame: RefCell<Option<FrameRGBA>>,
    cross_origin: bool,
    version: Cell<u64>,
}

impl ImageMedia {
    /// Image whose pixels are already decoded.
    pub fn loaded(frame: FrameRGBA) -> Rc<Self> {
        Rc::new(Self {
            frame: RefCell::new(Some(frame)),
            cross_origin: false,
            version: Cell::new(1),
        })
    }

    /// Image still loading; call [`ImageMedia::finish_loading`] later.
    pub fn pending() -> Rc<Self> {
        Rc::new(Self {
            frame: RefCell::new(None),
            cross_origin: false,
            version: Cell::new(0),
        })
    }

    /// Loaded image from another origin: size is known but pixels cannot be read.
    pub fn cross_origin(frame: FrameRGBA) -> Rc<Self> {
        Rc::new(Self {
            frame: RefCell::new(Some(frame)),
            cross_origin: true,
            version: Cell::new(1),
        })
    }

    /// Decode an encoded image (PNG) from memory.
    pub fn decode(bytes: &[u8]) -> Result<Rc<Self>, image::ImageError> {
        let img = image::load_from_memory(bytes)?.to_rgba8();
        Ok(Self::loaded(FrameRGBA::from_image(&img)))
    }

    /// Deliver the decoded pixels (the "load" event).
    pub fn finish_loading(&self, frame: FrameRGBA) {
        *self.frame.borrow_mut() = Some(frame);
        self.version.set(self.version.get() + 1);
    }
}

impl Media for ImageMedia {
    fn kind(&self) -> MediaKind {
        MediaKind::Image
    }

    fn size(&self) -> (u32, u32) {
        self.frame
            .borrow()
            .as_ref()
            .map(|f| (f.width, f.height))
            .unwrap_or((0, 0))
    }

    fn is_loaded(&self) -> bool {
        self.frame.borrow().is_some()
    }

    fn version(&self) -> u64 {
        self.version.get()
    }

    fn pixels(&self) -> Result<FrameRGBA, MediaError> {
        if self.cross_origin {
            return Err(MediaError::CrossOrigin);
        }
        self.frame.borrow().clone().ok_or(MediaError::NotLoaded)
    }
}

/// Writable canvas. Ready immediately; the host marks the source dirty after drawing.
#[derive(Debug)]
pub struct CanvasMedia {
    frame: RefCell<FrameRGBA>,
    version: Cell<u64>,
}

impl CanvasMedia {
    /// Transparent canvas.
    pub fn new(width: u32, height: u32) -> Rc<Self> {
        Self::from_frame(FrameRGBA::transparent(width, height))
    }

    /// Canvas initialized with `frame`.
    pub fn from_frame(frame: FrameRGBA) -> Rc<Self> {
        Rc::new(Self {
            frame: RefCell::new(frame),
            version: Cell::new(1),
        })
    }

    /// Draw into the canvas.
    pub fn draw(&self, f: impl FnOnce(&mut FrameRGBA)) {
        f(&mut self.frame.borrow_mut());
        self.version.set(self.version.get() + 1);
    }
}

impl Media for CanvasMedia {
    fn kind(&self) -> MediaKind {
        MediaKind::Canvas
    }

    fn size(&self) -> (u32, u32) {
        let f = self.frame.borrow();
        (f.width, f.height)
    }

    fn version(&self) -> u64 {
        self.version.get()
    }

    fn pixels(&self) -> Result<FrameRGBA, MediaError> {
        Ok(self.frame.borrow().clone())
    }
}

/// In-memory frame sequence standing in for a playing video.
#[derive(Debug)]
pub struct VideoMedia {
    frames: Vec<FrameRGBA>,
    current: Cell<usize>,
    version: Cell<u64>,
}

impl VideoMedia {
    /// Video over `frames`. An empty sequence never becomes loaded.
    pub fn new(frames: Vec<FrameRGBA>) -> Rc<Self> {
        Rc::new(Self {
            frames,
            current: Cell::new(0),
            version: Cell::new(1),
        })
    }

    /// Step to the next frame, wrapping around at the end.
    pub fn advance(&self) {
        if self.frames.is_empty() {
            return;
        }
        self.current.set((self.current.get() + 1) % self.frames.len());
        self.version.set(self.version.get() + 1);
    }

    /// Index of the current frame.
    pub fn current_frame(&self) -> usize {
        self.current.get()
    }
}

impl Media for VideoMedia {
    fn kind(&self) -> MediaKind {
        MediaKind::Video
    }

    fn size(&self) -> (u32, u32) {
        self.frames
            .first()
            .map(|f| (f.width, f.height))
            .unwrap_or((0, 0))
    }

    fn is_loaded(&self) -> bool {
        !self.frames.is_empty()
    }

    fn version(&self) -> u64 {
        self.version.get()
    }

    fn pixels(&self) -> Result<FrameRGBA, MediaError> {
        self.frames
            .get(self.current.get())
            .cloned()
            .ok_or(MediaError::NotLoaded)
    }
}

/// Texture that already lives on the engine's device.
#[derive(Debug)]
pub struct TextureMedia {
    texture: TextureId,
}

impl TextureMedia {
    /// Wrap a device texture handle.
    pub fn new(texture: TextureId) -> Rc<Self> {
        Rc::new(Self { texture })
    }
}

impl Media for TextureMedia {
    fn kind(&self) -> MediaKind {
        MediaKind::Texture(self.texture)
    }

    fn size(&self) -> (u32, u32) {
        (0, 0)
    }

    fn pixels(&self) -> Result<FrameRGBA, MediaError> {
        Err(MediaError::NoPixels)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/builtin.rs"]
mod tests;
