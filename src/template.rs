//! JSON templates and the key paths that address their leaves.
//!
//! A template is an ordinary JSON document. Its leaves (scalars, `null`,
//! empty objects and empty arrays) are the positions a mapping may write to.
//! Leaves are addressed by a [`KeyPath`]: dot-separated segments where a
//! numeric segment indexes into an array.
//!
//! ```
//! use sheetmap::template::{KeyPath, Template};
//!
//! let template = Template::from_slice(br#"{"user": {"name": "", "tags": ["x"]}}"#).unwrap();
//! let paths: Vec<String> = template.key_paths().iter().map(|p| p.to_string()).collect();
//! assert_eq!(paths, vec!["user.name", "user.tags.0"]);
//! assert!(template.contains(&KeyPath::parse("user.name").unwrap()));
//! ```

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{TemplateError, ValidationError};

lazy_static! {
    static ref PLACEHOLDER_RE: Regex = Regex::new(r"%[^%\s]+(?: [^%\s]+)*%").unwrap();
}

/// Address of a template leaf
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPath {
    segments: Vec<String>,
}

impl KeyPath {
    /// Parse a dot-separated path. `\.` is a literal dot, `\\` a literal backslash.
    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidKeyPath(text.to_string());

        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = text.chars();

        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some(escaped @ ('.' | '\\')) => current.push(escaped),
                    _ => return Err(invalid()),
                },
                '.' => {
                    if current.is_empty() {
                        return Err(invalid());
                    }
                    segments.push(std::mem::take(&mut current));
                }
                _ => current.push(c),
            }
        }

        if current.is_empty() {
            return Err(invalid());
        }
        segments.push(current);

        Ok(KeyPath { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    fn child(&self, segment: String) -> KeyPath {
        let mut segments = self.segments.clone();
        segments.push(segment);
        KeyPath { segments }
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(&segment.replace('\\', "\\\\").replace('.', "\\."))?;
        }
        Ok(())
    }
}

/// Resolve `path` inside `value`, descending through objects by key and
/// through arrays by index.
pub fn lookup<'a>(value: &'a Value, path: &KeyPath) -> Option<&'a Value> {
    path.segments.iter().try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => array_index(segment).and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Mutable counterpart of [`lookup`]
pub fn lookup_mut<'a>(value: &'a mut Value, path: &KeyPath) -> Option<&'a mut Value> {
    path.segments
        .iter()
        .try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get_mut(segment),
            Value::Array(items) => array_index(segment).and_then(move |i| items.get_mut(i)),
            _ => None,
        })
}

// Only the canonical spelling indexes an array: `1`, never `01` or `+1`.
fn array_index(segment: &str) -> Option<usize> {
    let canonical = segment == "0"
        || (!segment.starts_with('0') && !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()));
    if canonical { segment.parse().ok() } else { None }
}

fn is_leaf(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => true,
    }
}

/// A parsed JSON template
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    root: Value,
}

impl Template {
    /// Parse a template from UTF-8 JSON bytes. A leading byte order mark is ignored.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TemplateError> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let root = serde_json::from_slice(bytes)?;
        Ok(Template { root })
    }

    pub fn from_value(root: Value) -> Self {
        Template { root }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// A fresh copy of the template to fill in for one row
    pub fn skeleton(&self) -> Value {
        self.root.clone()
    }

    /// True when `path` addresses a leaf of the template
    pub fn contains(&self, path: &KeyPath) -> bool {
        lookup(&self.root, path).is_some_and(is_leaf)
    }

    /// Every leaf key path, in document order
    pub fn key_paths(&self) -> Vec<KeyPath> {
        let mut paths = Vec::new();
        collect_leaves(&self.root, KeyPath { segments: Vec::new() }, &mut paths);
        paths
    }

    /// Distinct `%token%` strings found in string values and object keys,
    /// in order of first occurrence
    pub fn placeholders(&self) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        visit_strings(&self.root, &mut |text| {
            for m in PLACEHOLDER_RE.find_iter(text) {
                if !found.iter().any(|f| f == m.as_str()) {
                    found.push(m.as_str().to_string());
                }
            }
        });
        found
    }

    /// True when `token` occurs inside any string value or object key
    pub fn mentions(&self, token: &str) -> bool {
        let mut hit = false;
        visit_strings(&self.root, &mut |text| hit = hit || text.contains(token));
        hit
    }
}

fn collect_leaves(value: &Value, prefix: KeyPath, out: &mut Vec<KeyPath>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                collect_leaves(child, prefix.child(key.clone()), out);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (i, child) in items.iter().enumerate() {
                collect_leaves(child, prefix.child(i.to_string()), out);
            }
        }
        _ => {
            if !prefix.segments.is_empty() {
                out.push(prefix);
            }
        }
    }
}

fn visit_strings(value: &Value, f: &mut impl FnMut(&str)) {
    match value {
        Value::String(s) => f(s),
        Value::Array(items) => items.iter().for_each(|item| visit_strings(item, f)),
        Value::Object(map) => {
            for (key, child) in map {
                f(key);
                visit_strings(child, f);
            }
        }
        _ => {}
    }
}

/// Substitute each `(token, text)` pair in string values and object keys.
///
/// String leaves whose path is in `skip` are left alone. Paths are matched
/// against the keys as they were before any renaming. Substitution is a single
/// left-to-right pass, so inserted text is never scanned again.
pub fn fill_placeholders(value: &mut Value, replacements: &[(&str, String)], skip: &[&KeyPath]) {
    let mut path = Vec::new();
    fill_at(value, replacements, skip, &mut path);
}

fn fill_at(value: &mut Value, replacements: &[(&str, String)], skip: &[&KeyPath], path: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            if !skip.iter().any(|p| p.segments() == path.as_slice()) {
                *s = substitute(s, replacements);
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter_mut().enumerate() {
                path.push(i.to_string());
                fill_at(item, replacements, skip, path);
                path.pop();
            }
        }
        Value::Object(map) => {
            *map = std::mem::take(map)
                .into_iter()
                .map(|(key, mut child)| {
                    path.push(key);
                    fill_at(&mut child, replacements, skip, path);
                    let key = path.pop().unwrap_or_default();
                    (substitute(&key, replacements), child)
                })
                .collect::<Map<String, Value>>();
        }
        _ => {}
    }
}

fn substitute(text: &str, replacements: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    loop {
        // Earliest match wins; on a tie the first replacement does.
        let next = replacements
            .iter()
            .filter_map(|(token, with)| rest.find(token).map(|at| (at, token.len(), with)))
            .min_by_key(|(at, _, _)| *at);

        match next {
            Some((at, len, with)) => {
                out.push_str(&rest[..at]);
                out.push_str(with);
                rest = &rest[at + len..];
            }
            None => {
                out.push_str(rest);
                return out;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_escaped_segments() {
        let path = KeyPath::parse(r"meta.file\.name").unwrap();
        assert_eq!(path.segments(), &["meta".to_string(), "file.name".to_string()]);
        assert_eq!(path.to_string(), r"meta.file\.name");
    }

    #[test]
    fn rejects_empty_segments() {
        for bad in ["", ".a", "a.", "a..b", r"a\x"] {
            assert_eq!(
                KeyPath::parse(bad),
                Err(ValidationError::InvalidKeyPath(bad.to_string()))
            );
        }
    }

    #[test]
    fn only_leaves_are_contained() {
        let template = Template::from_value(json!({
            "name": "",
            "address": {"city": null, "zip": 0},
            "items": [{"sku": ""}],
            "extra": {}
        }));

        assert!(template.contains(&KeyPath::parse("address.city").unwrap()));
        assert!(template.contains(&KeyPath::parse("items.0.sku").unwrap()));
        assert!(template.contains(&KeyPath::parse("extra").unwrap()));
        assert!(!template.contains(&KeyPath::parse("address").unwrap()));
        assert!(!template.contains(&KeyPath::parse("items.1.sku").unwrap()));
        assert!(!template.contains(&KeyPath::parse("email").unwrap()));
    }

    #[test]
    fn array_indices_must_be_canonical() {
        let template = Template::from_value(json!({"tags": ["a", "b"]}));
        assert!(template.contains(&KeyPath::parse("tags.0").unwrap()));
        assert!(template.contains(&KeyPath::parse("tags.1").unwrap()));
        for alias in ["tags.01", "tags.+1", "tags.00", "tags. 1"] {
            assert!(!template.contains(&KeyPath::parse(alias).unwrap()), "{alias}");
        }
    }

    #[test]
    fn key_paths_follow_document_order() {
        let template = Template::from_value(json!({"b": 1, "a": {"y": 2, "x": 3}}));
        let paths: Vec<String> = template.key_paths().iter().map(ToString::to_string).collect();
        assert_eq!(paths, vec!["b", "a.y", "a.x"]);
    }

    #[test]
    fn finds_placeholders_in_values_and_keys() {
        let template = Template::from_value(json!({
            "title": "Hello %First Name%, 50% off",
            "%Key%": ["%First Name%", "%Code%"]
        }));
        assert_eq!(
            template.placeholders(),
            vec!["%First Name%", "%Key%", "%Code%"]
        );
        assert!(template.mentions("%Code%"));
        assert!(!template.mentions("%Missing%"));
    }

    #[test]
    fn replaces_placeholders_everywhere() {
        let mut doc = json!({"%k%": "a-%k%-b", "list": ["%k%"]});
        fill_placeholders(&mut doc, &[("%k%", "id".to_string())], &[]);
        assert_eq!(doc, json!({"id": "a-id-b", "list": ["id"]}));
    }

    #[test]
    fn skipped_leaves_and_inserted_text_stay_untouched() {
        let mut doc = json!({"%k%": {"v": "%k%"}, "w": "%k%", "x": "%a%%b%"});
        let written = KeyPath::parse("%k%.v").unwrap();
        fill_placeholders(
            &mut doc,
            &[("%k%", "id".to_string()), ("%a%", "%b%".to_string()), ("%b%", "B".to_string())],
            &[&written],
        );
        assert_eq!(doc, json!({"id": {"v": "%k%"}, "w": "id", "x": "%b%B"}));
    }

    #[test]
    fn strips_byte_order_mark() {
        let template = Template::from_slice(b"\xEF\xBB\xBF{\"a\": 1}").unwrap();
        assert_eq!(template.root(), &json!({"a": 1}));
    }
}
