//! External media handles that source nodes adapt into the graph.

use std::rc::Rc;

use crate::device::TextureId;
use crate::foundation::core::FrameRGBA;

pub mod builtin;

/// Intrinsic media type, used for adapter sniffing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MediaKind {
    /// Drawable canvas; ready immediately.
    Canvas,
    /// Still image; ready once loaded.
    Image,
    /// Frame sequence; adopted by the `video` source plugin.
    Video,
    /// Texture that already lives on the device.
    Texture(TextureId),
    /// Anything else; only source plugins can adopt it.
    Other(String),
}

/// Failure while reading media pixels.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// Pixels are protected by a same-origin restriction.
    #[error("media is cross-origin and cannot be read")]
    CrossOrigin,
    /// The media has not finished loading.
    #[error("media is not loaded yet")]
    NotLoaded,
    /// The media has no readable pixels (e.g. a device texture).
    #[error("media has no readable pixels")]
    NoPixels,
}

/// An external media handle.
///
/// Implementations use interior mutability: the host keeps its own `Rc` and mutates the media
/// (finishes loading, draws, advances frames) while the graph holds another.
pub trait Media {
    /// Intrinsic kind.
    fn kind(&self) -> MediaKind;

    /// Natural size in pixels (may be `(0, 0)` before load).
    fn size(&self) -> (u32, u32);

    /// Whether pixels are available.
    fn is_loaded(&self) -> bool {
        true
    }

    /// Monotonic content version, bumped whenever pixels change.
    fn version(&self) -> u64 {
        0
    }

    /// Current pixels, top row first.
    fn pixels(&self) -> Result<FrameRGBA, MediaError>;
}

/// Shared media handle.
pub type MediaRef = Rc<dyn Media>;

/// Whether two handles refer to the same underlying media object.
pub fn same_media(a: &MediaRef, b: &MediaRef) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}
