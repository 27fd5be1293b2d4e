use std::fmt::Write;

use serde_json::Value;

/// Canonical byte form of a document.
///
/// Object keys are emitted in byte order of their UTF-8 text regardless of
/// the map's own iteration order, arrays keep element order, and no
/// whitespace is written between tokens. Scalars keep their type: strings
/// are quoted, numbers use `serde_json::Number`'s display form (`2`, `2.0`,
/// `-1.5e-7`), booleans and null are bare literals.
pub fn canonicalize(doc: &Value) -> Vec<u8> {
    canonicalize_to_string(doc).into_bytes()
}

/// Same as [`canonicalize`], kept as text for logging.
pub fn canonicalize_to_string(doc: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, doc);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => {
            let _ = write!(out, "{n}");
        }
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, item);
            }
            out.push('}');
        }
    }
}

/// JSON string literal with the short escapes for the common control
/// characters and `\u00XX` for the rest.
fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0C}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
