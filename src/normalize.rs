//! Merging partial configuration over a canonical `Options` value
//!
//! Normalization never fails: malformed input is coerced where the intent is
//! obvious and otherwise dropped with a warning.

use crate::options::{Options, MAX_TYPE_NUMBER};
use serde_json::{Map, Value};

/// Merge `partial` over `base` and return the sanitized, fully populated result.
///
/// `base` is either the default configuration (at construction) or the
/// previous canonical configuration (on update).
pub fn normalize(base: &Options, partial: Option<&Value>) -> Options {
    let Some(partial) = partial else {
        return base.clone();
    };

    if !partial.is_object() {
        log::warn!("Ignoring non-object configuration update: {}", partial);
        return base.clone();
    }

    let base_value = match serde_json::to_value(base) {
        Ok(v) => v,
        Err(e) => {
            log::error!("Failed to serialize current options: {}", e);
            return base.clone();
        }
    };
    let mut merged = base_value.clone();
    merge_deep(&mut merged, partial);
    coerce_numbers(&mut merged);

    match serde_json::from_value::<Options>(merged.clone()) {
        Ok(options) => sanitize(options),
        Err(_) => sanitize(apply_per_field(base, base_value, &merged, partial)),
    }
}

/// Apply the fields of `partial` one at a time, keeping the previous value of
/// every field that does not fit its type.
fn apply_per_field(base: &Options, base_value: Value, merged: &Value, partial: &Value) -> Options {
    let mut leaves = Vec::new();
    leaf_paths(partial, &base_value, &mut Vec::new(), &mut leaves);

    let mut accepted = base_value;
    let mut options = base.clone();
    for path in leaves {
        let Some(value) = lookup(merged, &path) else {
            continue;
        };
        let mut trial = accepted.clone();
        if !assign(&mut trial, &path, value.clone()) {
            continue;
        }
        match serde_json::from_value::<Options>(trial.clone()) {
            Ok(o) => {
                accepted = trial;
                options = o;
            }
            Err(e) => log::warn!("Ignoring '{}' = {} ({}); keeping previous value", path.join("."), value, e),
        }
    }
    options
}

/// Paths of the values `partial` replaces, descending only where both sides
/// hold objects (the same places `merge_deep` descends).
fn leaf_paths(partial: &Value, base: &Value, prefix: &mut Vec<String>, out: &mut Vec<Vec<String>>) {
    let Some(obj) = partial.as_object() else {
        return;
    };
    for (key, value) in obj {
        prefix.push(key.clone());
        match base.get(key) {
            Some(b) if b.is_object() && value.is_object() => leaf_paths(value, b, prefix, out),
            _ => out.push(prefix.clone()),
        }
        prefix.pop();
    }
}

fn lookup<'a>(root: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(root, |v, key| v.get(key))
}

fn assign(root: &mut Value, path: &[String], value: Value) -> bool {
    let Some((last, parents)) = path.split_last() else {
        return false;
    };
    let mut cursor = root;
    for key in parents {
        match cursor.get_mut(key) {
            Some(next) => cursor = next,
            None => return false,
        }
    }
    match cursor.as_object_mut() {
        Some(obj) => {
            obj.insert(last.clone(), value);
            true
        }
        None => false,
    }
}

/// Deep-merge `source` into `target`.
///
/// Objects merge key by key; arrays, scalars and `null` replace.
pub fn merge_deep(target: &mut Value, source: &Value) {
    match (target, source) {
        (Value::Object(t), Value::Object(s)) => {
            for (key, value) in s {
                match t.get_mut(key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge_deep(existing, value)
                    }
                    _ => {
                        t.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (t, s) => *t = s.clone(),
    }
}

// Integer fields as (group, key); an empty group is the top level.
const INTEGER_FIELDS: &[(&str, &str)] = &[
    ("", "width"),
    ("", "height"),
    ("", "margin"),
    ("qrOptions", "typeNumber"),
    ("imageOptions", "margin"),
];

const FLOAT_FIELDS: &[(&str, &str)] = &[("imageOptions", "imageSize")];

fn field_mut<'a>(root: &'a mut Value, group: &str, key: &str) -> Option<&'a mut Value> {
    let obj = if group.is_empty() {
        root.as_object_mut()?
    } else {
        root.get_mut(group)?.as_object_mut()?
    };
    obj.get_mut(key)
}

/// Coerce numeric strings and out-of-range numbers in known numeric fields.
fn coerce_numbers(root: &mut Value) {
    for (group, key) in INTEGER_FIELDS {
        if let Some(v) = field_mut(root, group, key) {
            if let Some(n) = as_number(v) {
                let n = if n.is_finite() { n.round().max(0.0) } else { 0.0 };
                *v = Value::from(n.min(u32::MAX as f64) as u32);
            }
        }
    }
    if let Some(v) = field_mut(root, "qrOptions", "typeNumber") {
        if v.as_u64().is_some_and(|n| n > u64::from(MAX_TYPE_NUMBER)) {
            *v = Value::from(MAX_TYPE_NUMBER);
        }
    }
    for (group, key) in FLOAT_FIELDS {
        if let Some(v) = field_mut(root, group, key) {
            if let Some(n) = as_number(v).filter(|n| n.is_finite()) {
                if let Some(num) = serde_json::Number::from_f64(n) {
                    *v = Value::Number(num);
                }
            }
        }
    }
    // Normalize mode spelling ("byte" -> "Byte"); unknown modes fall back to detection
    if let Some(mode) = field_mut(root, "qrOptions", "mode") {
        if let Some(s) = mode.as_str() {
            *mode = match s.parse::<crate::Mode>() {
                Ok(m) => serde_json::to_value(m).unwrap_or(Value::Null),
                Err(e) => {
                    log::warn!("{}; using automatic mode detection", e);
                    Value::Null
                }
            };
        }
    }
    if let Some(level) = field_mut(root, "qrOptions", "errorCorrectionLevel") {
        if let Some(s) = level.as_str() {
            if let Ok(l) = s.parse::<crate::ErrorCorrectionLevel>() {
                *level = Value::String(l.to_string());
            }
        }
    }
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Apply cross-field fixups to an already typed configuration.
pub fn sanitize(mut options: Options) -> Options {
    options.width = options.width.max(1);
    options.height = options.height.max(1);

    // Keep at least one pixel of drawable area on the short side
    let short = options.width.min(options.height);
    let max_margin = short.saturating_sub(1) / 2;
    if options.margin > max_margin {
        log::warn!("Margin {} too large for {}px, clamping to {}", options.margin, short, max_margin);
        options.margin = max_margin;
    }

    if options.qr_options.type_number > MAX_TYPE_NUMBER {
        options.qr_options.type_number = MAX_TYPE_NUMBER;
    }

    options.image_options.image_size = options.image_options.image_size.clamp(0.0, 1.0);

    if options.data.as_deref() == Some("") {
        options.data = None;
    }

    if let (Some(mode), Some(data)) = (options.qr_options.mode, options.data.as_deref()) {
        if !mode.accepts(data) {
            log::warn!("Mode {:?} cannot represent the data; using automatic detection", mode);
            options.qr_options.mode = None;
        }
    }

    options
}

/// Convenience for building a partial update from a single top-level key.
pub fn patch(key: &str, value: impl Into<Value>) -> Value {
    let mut m = Map::new();
    m.insert(key.to_string(), value.into());
    Value::Object(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorCorrectionLevel, Mode};
    use serde_json::json;

    #[test]
    fn absent_partial_keeps_base() {
        let base = Options::default();
        assert_eq!(normalize(&base, None), base);
    }

    #[test]
    fn nested_groups_merge_key_by_key() {
        let base = Options::default();
        let out = normalize(&base, Some(&json!({"qrOptions": {"typeNumber": 4}})));
        assert_eq!(out.qr_options.type_number, 4);
        assert_eq!(out.qr_options.error_correction_level, ErrorCorrectionLevel::Q);
        assert_eq!(out.width, 300);
    }

    #[test]
    fn merges_over_previous_not_defaults() {
        let first = normalize(&Options::default(), Some(&json!({"data": "A", "width": 120})));
        let second = normalize(&first, Some(&json!({"data": "B"})));
        assert_eq!(second.width, 120);
        assert_eq!(second.data(), Some("B"));
    }

    #[test]
    fn null_clears_data() {
        let first = normalize(&Options::default(), Some(&json!({"data": "A"})));
        let second = normalize(&first, Some(&json!({"data": null})));
        assert!(second.data().is_none());
    }

    #[test]
    fn unknown_keys_are_preserved() {
        let out = normalize(&Options::default(), Some(&json!({"shape": "circle", "nodeCanvas": {"x": 1}})));
        assert_eq!(out.extra["shape"], "circle");
        let again = normalize(&out, Some(&json!({"nodeCanvas": {"y": 2}})));
        assert_eq!(again.extra["nodeCanvas"], json!({"x": 1, "y": 2}));
    }

    #[test]
    fn coerces_numeric_strings() {
        let out = normalize(
            &Options::default(),
            Some(&json!({"width": "200", "height": 150.6, "imageOptions": {"imageSize": "0.5"}})),
        );
        assert_eq!(out.width, 200);
        assert_eq!(out.height, 151);
        assert!((out.image_options.image_size - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn clamps_ranges() {
        let out = normalize(
            &Options::default(),
            Some(&json!({"qrOptions": {"typeNumber": 300}, "margin": 1000, "imageOptions": {"imageSize": 3}})),
        );
        assert_eq!(out.qr_options.type_number, MAX_TYPE_NUMBER);
        assert_eq!(out.margin, 149);
        assert_eq!(out.image_options.image_size, 1.0);
    }

    #[test]
    fn incompatible_forced_mode_is_dropped() {
        let out = normalize(
            &Options::default(),
            Some(&json!({"data": "hello", "qrOptions": {"mode": "Numeric"}})),
        );
        assert_eq!(out.qr_options.mode, None);
        let ok = normalize(&Options::default(), Some(&json!({"data": "123", "qrOptions": {"mode": "numeric"}})));
        assert_eq!(ok.qr_options.mode, Some(Mode::Numeric));
    }

    #[test]
    fn malformed_field_keeps_previous_value_only() {
        let base = normalize(&Options::default(), Some(&json!({"data": "OLD", "width": 120})));

        let out = normalize(&base, Some(&json!({"data": "NEW", "qrOptions": {"errorCorrectionLevel": "Z", "typeNumber": 5}})));
        assert_eq!(out.data(), Some("NEW"));
        assert_eq!(out.qr_options.error_correction_level, ErrorCorrectionLevel::Q);
        assert_eq!(out.qr_options.type_number, 5);

        let out = normalize(&base, Some(&json!({"data": "NEW", "width": "wide", "height": 80})));
        assert_eq!(out.data(), Some("NEW"));
        assert_eq!(out.width, 120);
        assert_eq!(out.height, 80);

        let out = normalize(&base, Some(&json!({"dotsOptions": {"type": "hexagon", "color": "#123456"}})));
        assert_eq!(out.dots_options.dot_type, base.dots_options.dot_type);
        assert_eq!(out.dots_options.color, "#123456");
    }

    #[test]
    fn non_object_update_keeps_base() {
        let base = normalize(&Options::default(), Some(&json!({"data": "keep"})));
        assert_eq!(normalize(&base, Some(&json!("not an object"))), base);
    }

    #[test]
    fn malformed_group_keeps_previous_group() {
        let base = normalize(&Options::default(), Some(&json!({"data": "keep"})));
        let out = normalize(&base, Some(&json!({"dotsOptions": 7, "margin": 4})));
        assert_eq!(out.dots_options, base.dots_options);
        assert_eq!(out.margin, 4);
    }

    #[test]
    fn merge_deep_replaces_arrays() {
        let mut t = json!({"a": [1, 2, 3], "b": {"c": 1}});
        merge_deep(&mut t, &json!({"a": [9], "b": {"d": 2}}));
        assert_eq!(t, json!({"a": [9], "b": {"c": 1, "d": 2}}));
    }
}
