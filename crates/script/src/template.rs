//! `@@NAME@@` script templates.
//!
//! A template is validated when parsed: every `@@` must open or close a
//! placeholder with an uppercase identifier, and each placeholder may appear
//! only once. Rendering requires a value for every placeholder and rejects
//! values nobody asked for.

use std::collections::{BTreeMap, BTreeSet};

use shotline_common::error::ShotlineError;

use crate::literal::PyValue;

/// Placeholder delimiter.
pub const DELIMITER: &str = "@@";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("unterminated placeholder at byte {offset}")]
    Unterminated { offset: usize },

    #[error("invalid placeholder name '{name}' at byte {offset}")]
    InvalidName { name: String, offset: usize },

    #[error("placeholder '{0}' appears more than once")]
    Duplicate(String),

    #[error("no value supplied for placeholder '{0}'")]
    MissingValue(String),

    #[error("value '{0}' does not match any placeholder")]
    UnusedValue(String),

    #[error("rendered script still contains '{DELIMITER}' at byte {offset}")]
    Leak { offset: usize },
}

impl From<TemplateError> for ShotlineError {
    fn from(err: TemplateError) -> Self {
        ShotlineError::template(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Placeholder {
    name: String,
    /// Byte range of `@@NAME@@` in the source.
    start: usize,
    end: usize,
}

/// A parsed and validated template.
#[derive(Debug, Clone)]
pub struct Template {
    source: String,
    placeholders: Vec<Placeholder>,
}

fn valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

impl Template {
    pub fn parse(source: impl Into<String>) -> Result<Self, TemplateError> {
        let source = source.into();
        let mut placeholders = Vec::new();
        let mut seen = BTreeSet::new();
        let mut cursor = 0;

        while let Some(found) = source[cursor..].find(DELIMITER) {
            let start = cursor + found;
            let name_start = start + DELIMITER.len();
            let Some(len) = source[name_start..].find(DELIMITER) else {
                return Err(TemplateError::Unterminated { offset: start });
            };
            let name = &source[name_start..name_start + len];
            if !valid_name(name) {
                return Err(TemplateError::InvalidName {
                    name: name.to_string(),
                    offset: start,
                });
            }
            if !seen.insert(name.to_string()) {
                return Err(TemplateError::Duplicate(name.to_string()));
            }
            let end = name_start + len + DELIMITER.len();
            placeholders.push(Placeholder {
                name: name.to_string(),
                start,
                end,
            });
            cursor = end;
        }

        Ok(Self {
            source,
            placeholders,
        })
    }

    /// Placeholder names in source order.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.placeholders.iter().map(|p| p.name.as_str())
    }

    pub fn render(&self, values: &BTreeMap<String, PyValue>) -> Result<String, TemplateError> {
        for placeholder in &self.placeholders {
            if !values.contains_key(&placeholder.name) {
                return Err(TemplateError::MissingValue(placeholder.name.clone()));
            }
        }
        if let Some(unused) = values
            .keys()
            .find(|k| !self.placeholders.iter().any(|p| &p.name == *k))
        {
            return Err(TemplateError::UnusedValue(unused.clone()));
        }

        let mut out = String::with_capacity(self.source.len() * 2);
        let mut cursor = 0;
        for placeholder in &self.placeholders {
            out.push_str(&self.source[cursor..placeholder.start]);
            if let Some(value) = values.get(&placeholder.name) {
                out.push_str(&value.render());
            }
            cursor = placeholder.end;
        }
        out.push_str(&self.source[cursor..]);

        if let Some(offset) = out.find(DELIMITER) {
            return Err(TemplateError::Leak { offset });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(entries: &[(&str, PyValue)]) -> BTreeMap<String, PyValue> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_parse_and_render() {
        let template = Template::parse("a = @@A@@\nb = @@B_2@@\n").unwrap();
        assert_eq!(template.placeholders().collect::<Vec<_>>(), ["A", "B_2"]);

        let out = template
            .render(&values(&[("A", PyValue::from(1i64)), ("B_2", PyValue::from("x"))]))
            .unwrap();
        assert_eq!(out, "a = 1\nb = \"x\"\n");
    }

    #[test]
    fn test_rejects_malformed_templates() {
        assert_eq!(
            Template::parse("x = @@OPEN").unwrap_err(),
            TemplateError::Unterminated { offset: 4 }
        );
        assert!(matches!(
            Template::parse("@@lower@@").unwrap_err(),
            TemplateError::InvalidName { .. }
        ));
        assert!(matches!(
            Template::parse("@@A@@ @@ @@B@@").unwrap_err(),
            TemplateError::InvalidName { .. }
        ));
        assert_eq!(
            Template::parse("@@A@@ @@A@@").unwrap_err(),
            TemplateError::Duplicate("A".to_string())
        );
    }

    #[test]
    fn test_missing_and_unused_values() {
        let template = Template::parse("@@A@@ @@B@@").unwrap();
        assert_eq!(
            template.render(&values(&[("A", PyValue::None)])).unwrap_err(),
            TemplateError::MissingValue("B".to_string())
        );
        assert_eq!(
            template
                .render(&values(&[
                    ("A", PyValue::None),
                    ("B", PyValue::None),
                    ("C", PyValue::None)
                ]))
                .unwrap_err(),
            TemplateError::UnusedValue("C".to_string())
        );
    }

    #[test]
    fn test_values_cannot_inject_delimiters() {
        let template = Template::parse("x = @@A@@").unwrap();
        let out = template
            .render(&values(&[("A", PyValue::from("@@B@@"))]))
            .unwrap();
        assert!(!out.contains(DELIMITER));
    }
}
