//! Source adapters. The intrinsic ones (canvas, image, texture) are picked by media sniffing and
//! are not registered; `video` is a regular registered plugin.

use crate::engine::options::SourceOptions;
use crate::media::{MediaKind, MediaRef};
use crate::plugin::SourcePlugin;

/// Hooks the engine resolves by sniffing instead of through the registry.
pub const INTRINSIC_SOURCE_HOOKS: &[&str] = &["canvas", "image", "texture"];

/// Canvas media: ready immediately, re-uploaded when marked dirty.
#[derive(Clone, Copy, Debug, Default)]
pub struct CanvasSource;

impl SourcePlugin for CanvasSource {
    fn title(&self) -> &str {
        "Canvas"
    }

    fn probe(&self, media: &MediaRef, _options: &SourceOptions, _forced: bool) -> bool {
        media.kind() == MediaKind::Canvas
    }

    fn defer_texture(&self, _media: &MediaRef) -> bool {
        false
    }
}

/// Image media: ready once loaded.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageSource;

impl SourcePlugin for ImageSource {
    fn title(&self) -> &str {
        "Image"
    }

    fn probe(&self, media: &MediaRef, _options: &SourceOptions, _forced: bool) -> bool {
        media.kind() == MediaKind::Image
    }
}

/// Texture already on the device. Sized from options; never uploaded or refreshed.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextureSource;

impl SourcePlugin for TextureSource {
    fn title(&self) -> &str {
        "Texture"
    }

    fn probe(&self, media: &MediaRef, _options: &SourceOptions, _forced: bool) -> bool {
        matches!(media.kind(), MediaKind::Texture(_))
    }

    fn defer_texture(&self, _media: &MediaRef) -> bool {
        false
    }
}

/// Playing video: polled every frame and re-uploaded when the frame version moves.
#[derive(Clone, Copy, Debug, Default)]
pub struct VideoSource;

impl SourcePlugin for VideoSource {
    fn title(&self) -> &str {
        "Video"
    }

    fn probe(&self, media: &MediaRef, _options: &SourceOptions, _forced: bool) -> bool {
        media.kind() == MediaKind::Video
    }

    fn check_dirty(&self, media: &MediaRef, uploaded_version: Option<u64>) -> bool {
        media.is_loaded() && uploaded_version != Some(media.version())
    }

    fn polls(&self) -> bool {
        true
    }
}
