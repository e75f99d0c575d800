//! Per-kind input coercion: `(value, spec, default, previous) -> coerced`.
//!
//! Validators never fail. Anything that cannot be interpreted falls back to the default, the
//! same way a slider bound to a bad value snaps back.

use crate::plugin::inputs::{InputKind, InputSpec, InputValue};

/// Run the input's custom validator, or the one for its kind.
pub fn validate(
    value: &InputValue,
    spec: &InputSpec,
    default: &InputValue,
    previous: Option<&InputValue>,
) -> InputValue {
    if let Some(custom) = &spec.validator {
        return custom(value, spec, default, previous);
    }
    match spec.kind {
        InputKind::Number => InputValue::Number(number(value, spec, default)),
        InputKind::Enum => InputValue::String(enumeration(value, spec, default)),
        InputKind::Boolean => InputValue::Bool(boolean(value)),
        InputKind::String => InputValue::String(string(value)),
        InputKind::Color => InputValue::Color(color(value)),
        InputKind::Vector => InputValue::Vector(vector(value, spec.dimensions)),
        InputKind::Image => match value {
            InputValue::Image(n) => InputValue::Image(*n),
            _ => InputValue::Image(None),
        },
    }
}

/// Value an input takes when nothing else is known.
pub fn zero_value(spec: &InputSpec) -> InputValue {
    match spec.kind {
        InputKind::Number => InputValue::Number(0.0),
        InputKind::Enum => InputValue::String(
            spec.options
                .first()
                .map(|(k, _)| k.clone())
                .unwrap_or_default(),
        ),
        InputKind::Boolean => InputValue::Bool(false),
        InputKind::String => InputValue::String(String::new()),
        InputKind::Color => InputValue::Color([0.0; 4]),
        InputKind::Vector => InputValue::Vector(vec![0.0; spec.dimensions.clamp(2, 4)]),
        InputKind::Image => InputValue::Image(None),
    }
}

fn parse_number(value: &InputValue) -> f64 {
    match value {
        InputValue::Number(v) => *v,
        InputValue::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

/// Parse, wrap by `modulo`, clamp to `[min, max]`, then round to `step`.
pub fn number(value: &InputValue, spec: &InputSpec, default: &InputValue) -> f64 {
    let mut v = parse_number(value);
    if v.is_nan() {
        return default.as_number().unwrap_or(0.0);
    }

    if spec.modulo != 0.0 {
        v -= spec.modulo * (v / spec.modulo).floor();
    }
    if v < spec.min {
        return spec.min;
    }
    if v > spec.max {
        return spec.max;
    }
    if spec.step != 0.0 {
        return (v / spec.step).round() * spec.step;
    }
    v
}

/// Lowercase key that must name one of the options.
pub fn enumeration(value: &InputValue, spec: &InputSpec, default: &InputValue) -> String {
    let key = match value {
        InputValue::String(s) => s.to_lowercase(),
        InputValue::Number(n) => n.to_string(),
        InputValue::Bool(b) => b.to_string(),
        _ => String::new(),
    };
    if spec.options.iter().any(|(k, _)| *k == key) {
        return key;
    }
    default.as_str().unwrap_or_default().to_owned()
}

/// Truthiness, except that the string `"false"` is false.
pub fn boolean(value: &InputValue) -> bool {
    match value {
        InputValue::Bool(b) => *b,
        InputValue::Number(n) => *n != 0.0 && !n.is_nan(),
        InputValue::String(s) => !(s.is_empty() || s.eq_ignore_ascii_case("false")),
        InputValue::Image(n) => n.is_some(),
        InputValue::Color(_) | InputValue::Vector(_) => true,
    }
}

/// String form of any value.
pub fn string(value: &InputValue) -> String {
    fn join(v: impl Iterator<Item = f32>) -> String {
        v.map(|x| x.to_string()).collect::<Vec<_>>().join(",")
    }
    match value {
        InputValue::String(s) => s.clone(),
        InputValue::Number(n) => n.to_string(),
        InputValue::Bool(b) => b.to_string(),
        InputValue::Color(c) => join(c.iter().copied()),
        InputValue::Vector(v) => join(v.iter().copied()),
        InputValue::Image(_) => String::new(),
    }
}

const NAMED_COLORS: &[(&str, [u8; 4])] = &[
    ("transparent", [0, 0, 0, 0]),
    ("black", [0, 0, 0, 255]),
    ("red", [255, 0, 0, 255]),
    ("green", [0, 128, 0, 255]),
    ("blue", [0, 0, 255, 255]),
    ("white", [255, 255, 255, 255]),
    ("silver", [192, 192, 192, 255]),
    ("gray", [128, 128, 128, 255]),
    ("grey", [128, 128, 128, 255]),
    ("maroon", [128, 0, 0, 255]),
    ("purple", [128, 0, 128, 255]),
    ("fuchsia", [255, 0, 255, 255]),
    ("magenta", [255, 0, 255, 255]),
    ("lime", [0, 255, 0, 255]),
    ("olive", [128, 128, 0, 255]),
    ("yellow", [255, 255, 0, 255]),
    ("navy", [0, 0, 128, 255]),
    ("teal", [0, 128, 128, 255]),
    ("aqua", [0, 255, 255, 255]),
    ("cyan", [0, 255, 255, 255]),
    ("orange", [255, 165, 0, 255]),
];

/// RGBA in `0..=1` from a CSS-like string, a gray level, or a component list.
///
/// Unparseable input yields transparent black.
pub fn color(value: &InputValue) -> [f32; 4] {
    match value {
        InputValue::Color(c) => *c,
        InputValue::Number(n) => {
            let n = *n as f32;
            [n, n, n, 1.0]
        }
        InputValue::Vector(v) => match v.len() {
            0..=2 => [0.0; 4],
            3 => [v[0], v[1], v[2], 1.0],
            _ => [v[0], v[1], v[2], v[3]],
        },
        InputValue::String(s) => parse_color(s).unwrap_or([0.0; 4]),
        InputValue::Bool(_) | InputValue::Image(_) => [0.0; 4],
    }
}

fn parse_color(s: &str) -> Option<[f32; 4]> {
    let s = s.trim().to_lowercase();
    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex);
    }
    for (prefix, hsl) in [
        ("rgba(", false),
        ("rgb(", false),
        ("hsla(", true),
        ("hsl(", true),
    ] {
        if let Some(body) = s.strip_prefix(prefix) {
            return parse_functional(body.strip_suffix(')')?, hsl);
        }
    }
    NAMED_COLORS
        .iter()
        .find(|(name, _)| *name == s)
        .map(|(_, c)| c.map(|v| f32::from(v) / 255.0))
}

fn parse_hex(hex: &str) -> Option<[f32; 4]> {
    let digits: String = hex
        .chars()
        .take_while(char::is_ascii_hexdigit)
        .take(8)
        .collect();
    let nibble = |i: usize| u8::from_str_radix(&digits[i..=i], 16).ok();
    let byte = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    let c: [u8; 4] = match digits.len() {
        3 | 4 => {
            let mut c = [255u8; 4];
            for (i, slot) in c.iter_mut().enumerate().take(digits.len()) {
                *slot = nibble(i)? * 17;
            }
            c
        }
        6 | 8 => {
            let mut c = [255u8; 4];
            for (i, slot) in c.iter_mut().enumerate().take(digits.len() / 2) {
                *slot = byte(i * 2)?;
            }
            c
        }
        _ => [0; 4],
    };
    Some(c.map(|v| f32::from(v) / 255.0))
}

fn parse_functional(body: &str, hsl: bool) -> Option<[f32; 4]> {
    let parts: Vec<f32> = body
        .split(',')
        .map(|p| p.trim().trim_end_matches('%').parse::<f32>())
        .collect::<Result<_, _>>()
        .ok()?;
    if parts.len() < 3 {
        return Some([0.0; 4]);
    }
    let alpha = parts.get(3).copied().unwrap_or(1.0);
    let [a, b, c] = [parts[0] / 255.0, parts[1] / 255.0, parts[2] / 255.0];
    if hsl {
        let [r, g, bl] = hsl_to_rgb(a, b, c);
        return Some([r, g, bl, alpha]);
    }
    Some([a, b, c, alpha])
}

fn hsl_to_rgb(h: f32, s: f32, l: f32) -> [f32; 3] {
    fn hue(m1: f32, m2: f32, h: f32) -> f32 {
        let h = h.rem_euclid(1.0);
        if h < 1.0 / 6.0 {
            m1 + (m2 - m1) * h * 6.0
        } else if h < 0.5 {
            m2
        } else if h < 2.0 / 3.0 {
            m1 + (m2 - m1) * (2.0 / 3.0 - h) * 6.0
        } else {
            m1
        }
    }
    let m2 = if l < 0.5 { l * (s + 1.0) } else { l + s - l * s };
    let m1 = l * 2.0 - m2;
    [
        hue(m1, m2, h + 1.0 / 3.0),
        hue(m1, m2, h),
        hue(m1, m2, h - 1.0 / 3.0),
    ]
}

/// Float vector of exactly `dimensions` components (clamped to 2..=4).
///
/// Lists are truncated or zero-padded; a scalar is splatted.
pub fn vector(value: &InputValue, dimensions: usize) -> Vec<f32> {
    let n = dimensions.clamp(2, 4);
    let take = |src: &[f32]| -> Vec<f32> {
        (0..n).map(|i| src.get(i).copied().unwrap_or(0.0)).collect()
    };
    match value {
        InputValue::Vector(v) => take(v),
        InputValue::Color(c) => take(c),
        InputValue::Number(x) => vec![*x as f32; n],
        InputValue::String(s) => vec![s.trim().parse().unwrap_or(0.0); n],
        InputValue::Bool(_) | InputValue::Image(_) => vec![0.0; n],
    }
}

#[cfg(test)]
#[path = "../../tests/unit/plugin/validate.rs"]
mod tests;
