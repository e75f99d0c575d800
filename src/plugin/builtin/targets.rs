use crate::device::surface::{SurfaceKind, SurfaceRef};
use crate::engine::options::TargetOptions;
use crate::plugin::TargetPlugin;

/// Pixel sinks without a context: the frame is drawn offscreen on the shared device, read back
/// and presented to the surface.
#[derive(Clone, Copy, Debug, Default)]
pub struct Readback;

impl TargetPlugin for Readback {
    fn title(&self) -> &str {
        "Readback"
    }

    fn probe(&self, surface: &SurfaceRef, _options: &TargetOptions, forced: bool) -> bool {
        forced || surface.kind() == SurfaceKind::Sink
    }
}
