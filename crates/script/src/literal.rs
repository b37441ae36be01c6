//! Python literal rendering.
//!
//! Values substituted into a script template are rendered as Python
//! literals. String escaping turns `@` into `\x40`, so no rendered value can
//! ever contain the template delimiter.

use std::fmt::Write;

/// A value that renders as a Python literal.
#[derive(Debug, Clone, PartialEq)]
pub enum PyValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<PyValue>),
    /// Keys are rendered in insertion order.
    Dict(Vec<(String, PyValue)>),
}

impl PyValue {
    /// Dict from `(key, value)` pairs, keeping their order.
    pub fn dict<K: Into<String>>(entries: impl IntoIterator<Item = (K, PyValue)>) -> Self {
        PyValue::Dict(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn list<T: Into<PyValue>>(items: impl IntoIterator<Item = T>) -> Self {
        PyValue::List(items.into_iter().map(Into::into).collect())
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut String) {
        match self {
            PyValue::None => out.push_str("None"),
            PyValue::Bool(true) => out.push_str("True"),
            PyValue::Bool(false) => out.push_str("False"),
            PyValue::Int(v) => {
                let _ = write!(out, "{v}");
            }
            PyValue::Float(v) => write_float(*v, out),
            PyValue::Str(s) => write_str(s, out),
            PyValue::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write_to(out);
                }
                out.push(']');
            }
            PyValue::Dict(entries) => {
                out.push('{');
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    write_str(key, out);
                    out.push_str(": ");
                    value.write_to(out);
                }
                out.push('}');
            }
        }
    }
}

fn write_float(v: f64, out: &mut String) {
    if v.is_nan() {
        out.push_str("float('nan')");
    } else if v.is_infinite() {
        out.push_str(if v > 0.0 { "float('inf')" } else { "float('-inf')" });
    } else {
        // Debug keeps a trailing `.0` on whole numbers.
        let _ = write!(out, "{v:?}");
    }
}

fn write_str(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '@' => out.push_str("\\x40"),
            c if c.is_control() => {
                let code = c as u32;
                if code <= 0xff {
                    let _ = write!(out, "\\x{code:02x}");
                } else {
                    let _ = write!(out, "\\u{code:04x}");
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

impl From<bool> for PyValue {
    fn from(v: bool) -> Self {
        PyValue::Bool(v)
    }
}

impl From<i64> for PyValue {
    fn from(v: i64) -> Self {
        PyValue::Int(v)
    }
}

impl From<u32> for PyValue {
    fn from(v: u32) -> Self {
        PyValue::Int(i64::from(v))
    }
}

impl From<usize> for PyValue {
    fn from(v: usize) -> Self {
        PyValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for PyValue {
    fn from(v: f64) -> Self {
        PyValue::Float(v)
    }
}

impl From<f32> for PyValue {
    fn from(v: f32) -> Self {
        PyValue::Float(f64::from(v))
    }
}

impl From<&str> for PyValue {
    fn from(v: &str) -> Self {
        PyValue::Str(v.to_string())
    }
}

impl From<String> for PyValue {
    fn from(v: String) -> Self {
        PyValue::Str(v)
    }
}

impl From<&String> for PyValue {
    fn from(v: &String) -> Self {
        PyValue::Str(v.clone())
    }
}

impl<T: Into<PyValue>> From<Option<T>> for PyValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(PyValue::None, Into::into)
    }
}
