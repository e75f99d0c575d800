//! Plugins every engine starts with.

use crate::plugin::registry::PluginRegistry;

pub mod effects;
pub mod sources;
pub mod targets;
pub mod transforms;

/// Register every built-in plugin into `registry`.
pub(crate) fn register_all(registry: &mut PluginRegistry) {
    let results = [
        registry.register_effect("brightness-contrast", effects::BrightnessContrast),
        registry.register_effect("mix", effects::Mix),
        registry.register_effect("color", effects::ColorFill),
        registry.register_transform("2d", transforms::Affine2d),
        registry.register_transform("flip", transforms::Flip),
        registry.register_source("video", sources::VideoSource),
        registry.register_target("readback", targets::Readback),
    ];
    for r in results {
        if let Err(err) = r {
            tracing::error!(%err, "built-in plugin rejected");
        }
    }
}
