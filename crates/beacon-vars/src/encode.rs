//! Wire encoding.
//!
//! Structured values (objects, arrays) are first rendered with a compact,
//! URL-safe notation (`~(key~'value~n~1)`) that survives query strings
//! without escaping braces and quotes, then percent-encoded like
//! `encodeURIComponent`.

use std::fmt::Write as _;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::Value;

/// Characters `encodeURIComponent` leaves untouched.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// How structured values are rendered before percent-encoding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ValueEncoding {
    /// Compact URL-safe notation.
    #[default]
    Compact,
    /// Standard JSON text.
    Json,
}

/// Percent-encode a component like `encodeURIComponent`.
pub fn encode_component(s: &str) -> String {
    utf8_percent_encode(s, URI_COMPONENT).to_string()
}

/// Render a variable value as the text that goes on the wire (before
/// percent-encoding). Scalars render plainly; structures use `encoding`.
pub fn render_value(value: &Value, encoding: ValueEncoding) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => match encoding {
            ValueEncoding::Compact => to_compact(value),
            ValueEncoding::Json => value.to_string(),
        },
    }
}

/// Encode one `name=value` pair.
pub fn encode_pair(name: &str, value: &Value, encoding: ValueEncoding) -> String {
    format!(
        "{}={}",
        encode_component(name),
        encode_component(&render_value(value, encoding))
    )
}

/// Compact URL-safe rendering of any JSON value.
///
/// - numbers and booleans: `~1`, `~true`
/// - strings: `~'text` with non-word characters escaped (`*XX`, `**XXXX`, `$` → `!`)
/// - arrays: `~(~1~2)`, empty array `~()`
/// - objects: `~(key~1~other~'x)`
/// - null: `~null`
pub fn to_compact(value: &Value) -> String {
    let mut out = String::new();
    write_compact(value, &mut out);
    out
}

fn write_compact(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("~null"),
        Value::Bool(b) => {
            out.push('~');
            out.push_str(if *b { "true" } else { "false" });
        }
        Value::Number(n) => {
            out.push('~');
            out.push_str(&n.to_string());
        }
        Value::String(s) => {
            out.push_str("~'");
            escape_compact(s, out);
        }
        Value::Array(items) => {
            out.push_str("~(");
            if items.is_empty() {
                out.push('~');
            }
            for item in items {
                write_compact(item, out);
            }
            out.push(')');
        }
        Value::Object(map) => {
            out.push_str("~(");
            for (i, (key, val)) in map.iter().enumerate() {
                if i > 0 {
                    out.push('~');
                }
                escape_compact(key, out);
                write_compact(val, out);
            }
            out.push(')');
        }
    }
}

fn escape_compact(s: &str, out: &mut String) {
    for ch in s.chars() {
        match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '-' | '.' => out.push(ch),
            '$' => out.push('!'),
            _ => {
                let mut buf = [0u16; 2];
                for unit in ch.encode_utf16(&mut buf) {
                    if *unit < 0x100 {
                        let _ = write!(out, "*{unit:02x}");
                    } else {
                        let _ = write!(out, "**{unit:04x}");
                    }
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
