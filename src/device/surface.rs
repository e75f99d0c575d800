use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::device::Device;
use crate::device::headless::HeadlessDevice;
use crate::foundation::core::FrameRGBA;
use crate::foundation::ids::EngineId;

static NEXT_SURFACE_KEY: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a drawing surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurfaceKey(pub u64);

impl SurfaceKey {
    /// Allocate a fresh key.
    pub fn next() -> Self {
        Self(NEXT_SURFACE_KEY.fetch_add(1, Ordering::Relaxed))
    }
}

/// What kind of surface a handle is, used to pick a target adapter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SurfaceKind {
    /// A canvas that can hand out device contexts.
    Canvas,
    /// A pixel sink without its own context (presented through readback).
    Sink,
    /// Anything else; only target plugins can adopt it.
    Other(String),
}

/// Shared handle to a drawing surface.
pub type SurfaceRef = Rc<dyn DrawingSurface>;

/// The drawing-surface handle a target renders into.
pub trait DrawingSurface {
    /// Identity of this surface.
    fn key(&self) -> SurfaceKey;

    /// Surface kind.
    fn kind(&self) -> SurfaceKind;

    /// Current size in pixels.
    fn size(&self) -> (u32, u32);

    /// Resize the surface.
    fn set_size(&self, width: u32, height: u32);

    /// Open a device context on this surface, if it supports one.
    fn create_context(&self) -> Option<Box<dyn Device>> {
        None
    }

    /// Receive a finished frame (readback and secondary paths).
    fn present(&self, _frame: &FrameRGBA) {}
}

/// Headless canvas backed by a [`HeadlessDevice`].
///
/// Every context it hands out shares the same device state, so the canvas (or the device
/// returned by [`HeadlessCanvas::device`]) can be used to inspect draws and simulate loss.
#[derive(Debug)]
pub struct HeadlessCanvas {
    key: SurfaceKey,
    size: Cell<(u32, u32)>,
    device: HeadlessDevice,
    contexts_enabled: Cell<bool>,
    presented: RefCell<Vec<FrameRGBA>>,
}

impl HeadlessCanvas {
    /// New canvas of the given size.
    pub fn new(width: u32, height: u32) -> Rc<Self> {
        Rc::new(Self {
            key: SurfaceKey::next(),
            size: Cell::new((width, height)),
            device: HeadlessDevice::new(width, height),
            contexts_enabled: Cell::new(true),
            presented: RefCell::new(Vec::new()),
        })
    }

    /// Handle to the canvas device.
    pub fn device(&self) -> HeadlessDevice {
        self.device.clone()
    }

    /// Refuse (or allow again) context creation, as a browser does when out of contexts.
    pub fn set_contexts_enabled(&self, enabled: bool) {
        self.contexts_enabled.set(enabled);
    }

    /// Frames handed to [`DrawingSurface::present`].
    pub fn presented(&self) -> Vec<FrameRGBA> {
        self.presented.borrow().clone()
    }
}

impl DrawingSurface for HeadlessCanvas {
    fn key(&self) -> SurfaceKey {
        self.key
    }

    fn kind(&self) -> SurfaceKind {
        SurfaceKind::Canvas
    }

    fn size(&self) -> (u32, u32) {
        self.size.get()
    }

    fn set_size(&self, width: u32, height: u32) {
        self.size.set((width, height));
        let mut device = self.device.clone();
        device.set_screen_size(width, height);
    }

    fn create_context(&self) -> Option<Box<dyn Device>> {
        if !self.contexts_enabled.get() {
            return None;
        }
        Some(Box::new(self.device.clone()))
    }

    fn present(&self, frame: &FrameRGBA) {
        self.presented.borrow_mut().push(frame.clone());
    }
}

/// Context-less pixel sink; frames arrive through [`DrawingSurface::present`].
#[derive(Debug)]
pub struct MemorySurface {
    key: SurfaceKey,
    size: Cell<(u32, u32)>,
    frames: RefCell<Vec<FrameRGBA>>,
}

impl MemorySurface {
    /// New sink of the given size.
    pub fn new(width: u32, height: u32) -> Rc<Self> {
        Rc::new(Self {
            key: SurfaceKey::next(),
            size: Cell::new((width, height)),
            frames: RefCell::new(Vec::new()),
        })
    }

    /// Presented frames, oldest first.
    pub fn frames(&self) -> Vec<FrameRGBA> {
        self.frames.borrow().clone()
    }

    /// Most recent frame.
    pub fn last_frame(&self) -> Option<FrameRGBA> {
        self.frames.borrow().last().cloned()
    }
}

impl DrawingSurface for MemorySurface {
    fn key(&self) -> SurfaceKey {
        self.key
    }

    fn kind(&self) -> SurfaceKind {
        SurfaceKind::Sink
    }

    fn size(&self) -> (u32, u32) {
        self.size.get()
    }

    fn set_size(&self, width: u32, height: u32) {
        self.size.set((width, height));
    }

    fn present(&self, frame: &FrameRGBA) {
        self.frames.borrow_mut().push(frame.clone());
    }
}

/// Surface to owning-engines map, shared between engines that should see each other.
///
/// Engines are not process-global; two engines only detect contention over a surface when they
/// were built with clones of the same registry.
#[derive(Clone, Debug, Default)]
pub struct SurfaceRegistry {
    owners: Rc<RefCell<HashMap<SurfaceKey, BTreeSet<EngineId>>>>,
}

impl SurfaceRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `engine` as an owner of `key`. Returns the other engines already using it.
    pub fn claim(&self, key: SurfaceKey, engine: EngineId) -> Vec<EngineId> {
        let mut owners = self.owners.borrow_mut();
        let set = owners.entry(key).or_default();
        let others = set.iter().copied().filter(|e| *e != engine).collect();
        set.insert(engine);
        others
    }

    /// Drop `engine` from the owners of `key`.
    pub fn release(&self, key: SurfaceKey, engine: EngineId) {
        let mut owners = self.owners.borrow_mut();
        if let Some(set) = owners.get_mut(&key) {
            set.remove(&engine);
            if set.is_empty() {
                owners.remove(&key);
            }
        }
    }

    /// Engines currently using `key`.
    pub fn owners(&self, key: SurfaceKey) -> Vec<EngineId> {
        self.owners
            .borrow()
            .get(&key)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/device/surface.rs"]
mod tests;
