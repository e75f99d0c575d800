use super::*;
use crate::plugin::inputs::InputSpec;

struct Named(&'static str);

impl EffectPlugin for Named {
    fn title(&self) -> &str {
        "named"
    }

    fn inputs(&self) -> Vec<InputSpec> {
        vec![InputSpec::number(self.0)]
    }
}

#[test]
fn builtins_are_registered() {
    let r = PluginRegistry::with_builtins();
    assert_eq!(r.effect_hooks(), vec!["brightness-contrast", "mix", "color"]);
    assert_eq!(r.transform_hooks(), vec!["2d", "flip"]);
    assert_eq!(r.source_hooks(), vec!["video"]);
    assert_eq!(r.target_hooks(), vec!["readback"]);
}

#[test]
fn duplicate_registration_is_ignored() {
    let mut r = PluginRegistry::new();
    assert!(r.register_effect("fx", Named("a")).expect("first"));
    assert!(!r.register_effect("fx", Named("b")).expect("second"));
    let schema = r.effect_schema("fx").expect("schema");
    assert!(schema.get("a").is_some());
    assert!(schema.get("b").is_none());
}

#[test]
fn reserved_input_names_are_rejected() {
    let mut r = PluginRegistry::new();
    let err = r.register_effect("fx", Named("render")).unwrap_err();
    assert!(matches!(err, CompographError::ReservedName(ref n) if n == "render"));
    assert!(!r.has_effect("fx"));
}

#[test]
fn manifest_lists_constraints() {
    let r = PluginRegistry::with_builtins();
    let manifest = r.effect_manifest();
    let bc = manifest
        .iter()
        .find(|m| m.hook == "brightness-contrast")
        .expect("brightness-contrast");
    assert_eq!(bc.inputs.len(), 3);
    assert_eq!(bc.inputs[1].name, "brightness");
    assert_eq!(bc.inputs[1].min, Some(0.0));
    assert_eq!(bc.inputs[1].max, None);

    let json = serde_json::to_value(&manifest).expect("json");
    assert_eq!(json[0]["inputs"][1]["type"], "number");
    assert_eq!(json[0]["inputs"][1]["default"], 1.0);
    assert!(json[0]["inputs"][0].get("default").is_none());
}
