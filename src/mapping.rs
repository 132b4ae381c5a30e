//! Column mappings and their validation against a template.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

use crate::error::ValidationError;
use crate::template::{KeyPath, Template};

/// Where a column's value is written in the output document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// Replace the template leaf at this path
    KeyPath(KeyPath),
    /// Substitute the cell text for every occurrence of this `%token%`
    Placeholder(String),
}

impl Target {
    /// `%token%` is a placeholder, anything else a key path
    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        if text.len() >= 2 && text.starts_with('%') && text.ends_with('%') {
            Ok(Target::Placeholder(text.to_string()))
        } else {
            KeyPath::parse(text).map(Target::KeyPath)
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::KeyPath(path) => write!(f, "{path}"),
            Target::Placeholder(token) => f.write_str(token),
        }
    }
}

/// One user-supplied mapping pair, as received from the form or command line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub column: String,
    pub target: String,
}

impl MappingEntry {
    pub fn new(column: impl Into<String>, target: impl Into<String>) -> Self {
        MappingEntry {
            column: column.into(),
            target: target.into(),
        }
    }
}

/// Ordered list of (column, target) pairs
pub type ColumnMapping = Vec<MappingEntry>;

/// A validated mapping, ready to apply to rows
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentPlan {
    template: Template,
    assignments: Vec<(String, Target)>,
}

impl AssignmentPlan {
    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Assignments in mapping order
    pub fn assignments(&self) -> &[(String, Target)] {
        &self.assignments
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.assignments.iter().map(|(column, _)| column.as_str())
    }

    /// Ensure every mapped column appears in the spreadsheet header
    pub fn check_columns<S: AsRef<str>>(&self, headers: &[S]) -> Result<(), ValidationError> {
        for column in self.columns() {
            if !headers.iter().any(|h| h.as_ref() == column) {
                return Err(ValidationError::UnknownColumn(column.to_string()));
            }
        }
        Ok(())
    }
}

/// Validate `mapping` against `template` and build the assignment plan.
///
/// The first offending entry, in mapping order, determines the error.
pub fn resolve(template: &Template, mapping: &[MappingEntry]) -> Result<AssignmentPlan, ValidationError> {
    if mapping.is_empty() {
        return Err(ValidationError::EmptyMapping);
    }

    let mut seen = HashSet::new();
    let mut assignments = Vec::with_capacity(mapping.len());

    for (position, entry) in mapping.iter().enumerate() {
        if entry.column.trim().is_empty() {
            return Err(ValidationError::EmptyColumn { position });
        }

        let target = Target::parse(entry.target.trim())?;
        match &target {
            Target::KeyPath(path) if !template.contains(path) => {
                return Err(ValidationError::UnknownKeyPath(path.to_string()));
            }
            Target::Placeholder(token) if !template.mentions(token) => {
                return Err(ValidationError::UnknownPlaceholder(token.clone()));
            }
            _ => {}
        }

        if !seen.insert(target.clone()) {
            return Err(ValidationError::DuplicateKeyPath(target.to_string()));
        }

        debug!(column = %entry.column, target = %target, "mapping entry accepted");
        assignments.push((entry.column.clone(), target));
    }

    Ok(AssignmentPlan {
        template: template.clone(),
        assignments,
    })
}

/// Propose a mapping for `headers`.
///
/// A header maps to `%header%` when that placeholder occurs in the template,
/// otherwise to the header itself when it names a template leaf.
pub fn suggest_mapping<S: AsRef<str>>(template: &Template, headers: &[S]) -> ColumnMapping {
    headers
        .iter()
        .map(AsRef::as_ref)
        .filter_map(|header| {
            let placeholder = format!("%{header}%");
            if template.mentions(&placeholder) {
                return Some(MappingEntry::new(header, placeholder));
            }
            KeyPath::parse(header)
                .ok()
                .filter(|path| template.contains(path))
                .map(|_| MappingEntry::new(header, header))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn template() -> Template {
        Template::from_value(json!({
            "name": "",
            "age": 0,
            "contact": {"email": ""},
            "greeting": "Dear %Name%"
        }))
    }

    #[test]
    fn resolves_in_mapping_order() {
        let plan = resolve(
            &template(),
            &[
                MappingEntry::new("Age", "age"),
                MappingEntry::new("Name", "name"),
                MappingEntry::new("Name", "%Name%"),
            ],
        )
        .unwrap();

        let targets: Vec<String> = plan.assignments().iter().map(|(_, t)| t.to_string()).collect();
        assert_eq!(targets, vec!["age", "name", "%Name%"]);
    }

    #[test]
    fn rejects_empty_mapping() {
        assert_eq!(resolve(&template(), &[]), Err(ValidationError::EmptyMapping));
    }

    #[test]
    fn rejects_unknown_key_path() {
        let result = resolve(
            &template(),
            &[MappingEntry::new("Name", "name"), MappingEntry::new("Email", "email")],
        );
        assert_eq!(result, Err(ValidationError::UnknownKeyPath("email".to_string())));
    }

    #[test]
    fn rejects_interior_key_path() {
        let result = resolve(&template(), &[MappingEntry::new("Contact", "contact")]);
        assert_eq!(result, Err(ValidationError::UnknownKeyPath("contact".to_string())));
    }

    #[test]
    fn rejects_duplicate_targets() {
        let result = resolve(
            &template(),
            &[MappingEntry::new("A", "name"), MappingEntry::new("B", " name ")],
        );
        assert_eq!(result, Err(ValidationError::DuplicateKeyPath("name".to_string())));
    }

    #[test]
    fn rejects_aliased_index_paths() {
        let template = Template::from_value(json!({"tags": ["", ""]}));
        let result = resolve(
            &template,
            &[
                MappingEntry::new("A", "tags.1"),
                MappingEntry::new("B", "tags.01"),
                MappingEntry::new("C", "tags.+1"),
            ],
        );
        assert_eq!(result, Err(ValidationError::UnknownKeyPath("tags.01".to_string())));

        let result = resolve(
            &template,
            &[MappingEntry::new("A", "tags.1"), MappingEntry::new("B", "tags.1")],
        );
        assert_eq!(result, Err(ValidationError::DuplicateKeyPath("tags.1".to_string())));
    }

    #[test]
    fn rejects_blank_column() {
        let result = resolve(
            &template(),
            &[MappingEntry::new("Name", "name"), MappingEntry::new("  ", "age")],
        );
        assert_eq!(result, Err(ValidationError::EmptyColumn { position: 1 }));
    }

    #[test]
    fn rejects_unknown_placeholder() {
        let result = resolve(&template(), &[MappingEntry::new("Age", "%Age%")]);
        assert_eq!(result, Err(ValidationError::UnknownPlaceholder("%Age%".to_string())));
    }

    #[test]
    fn checks_columns_against_header() {
        let plan = resolve(&template(), &[MappingEntry::new("Name", "name")]).unwrap();
        assert!(plan.check_columns(&["Name", "Age"]).is_ok());
        assert_eq!(
            plan.check_columns(&["Age"]),
            Err(ValidationError::UnknownColumn("Name".to_string()))
        );
    }

    #[test]
    fn suggests_placeholders_before_key_paths() {
        let suggested = suggest_mapping(&template(), &["Name", "age", "contact.email", "Other"]);
        assert_eq!(
            suggested,
            vec![
                MappingEntry::new("Name", "%Name%"),
                MappingEntry::new("age", "age"),
                MappingEntry::new("contact.email", "contact.email"),
            ]
        );
    }
}
