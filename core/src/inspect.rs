use serde_json::Value;
use std::fmt::{self, Write as _};

/// Single-line, human-readable rendering of a JSON payload:
/// `{ height: 100, hash: abc, peers: [ a, b ] }`. Strings are written unquoted.
pub struct Inspect<'a>(pub &'a Value);

impl fmt::Display for Inspect<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(f, self.0)
    }
}

fn write_str_escaped(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    // one record per line
    for c in s.chars() {
        match c {
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            c => f.write_char(c)?,
        }
    }
    Ok(())
}

fn write_value(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Null => f.write_str("null"),
        Value::Bool(b) => write!(f, "{}", b),
        Value::Number(n) => write!(f, "{}", n),
        Value::String(s) => write_str_escaped(f, s),
        Value::Array(items) if items.is_empty() => f.write_str("[]"),
        Value::Array(items) => {
            f.write_str("[ ")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_value(f, item)?;
            }
            f.write_str(" ]")
        }
        Value::Object(map) if map.is_empty() => f.write_str("{}"),
        Value::Object(map) => {
            f.write_str("{ ")?;
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_str_escaped(f, key)?;
                f.write_str(": ")?;
                write_value(f, item)?;
            }
            f.write_str(" }")
        }
    }
}
