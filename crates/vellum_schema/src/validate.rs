//! Structural validation of schema specifications.
//!
//! Fails with the first violation found. The historical migration log is
//! not re-validated: it refers to type names as they were at the time the
//! actions were recorded.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::error::{SchemaError, SchemaResult};
use crate::spec::{FieldSpec, FieldType, SchemaSpecification};

fn type_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("^[A-Z][a-zA-Z0-9]*$").expect("valid regex"))
}

fn camel_case_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("^[a-z][a-zA-Z0-9]*$").expect("valid regex"))
}

pub(crate) fn validate_spec(spec: &SchemaSpecification) -> SchemaResult<()> {
    let mut type_names = HashSet::new();
    for t in &spec.entity_types {
        validate_type_name(&t.name, &mut type_names)?;
    }
    for t in &spec.component_types {
        validate_type_name(&t.name, &mut type_names)?;
    }

    let mut pattern_names = HashSet::new();
    for p in &spec.patterns {
        if !camel_case_regex().is_match(&p.name) {
            return Err(SchemaError::validation(format!(
                "pattern name {} must be camelCase",
                p.name
            )));
        }
        if !pattern_names.insert(p.name.as_str()) {
            return Err(SchemaError::validation(format!(
                "duplicate pattern name {}",
                p.name
            )));
        }
        Regex::new(&p.pattern).map_err(|e| {
            SchemaError::validation(format!("pattern {} is not a valid regex: {e}", p.name))
        })?;
    }

    let mut index_names = HashSet::new();
    for index in &spec.indexes {
        if !camel_case_regex().is_match(&index.name) {
            return Err(SchemaError::validation(format!(
                "index name {} must be camelCase",
                index.name
            )));
        }
        if !index_names.insert(index.name.as_str()) {
            return Err(SchemaError::validation(format!(
                "duplicate index name {}",
                index.name
            )));
        }
    }

    let entity_type_names: HashSet<&str> =
        spec.entity_types.iter().map(|t| t.name.as_str()).collect();
    let component_type_names: HashSet<&str> = spec
        .component_types
        .iter()
        .map(|t| t.name.as_str())
        .collect();

    for t in &spec.entity_types {
        validate_fields(
            &t.name,
            &t.fields,
            &entity_type_names,
            &component_type_names,
            &pattern_names,
            &index_names,
        )?;

        if let Some(name_field) = &t.name_field {
            match t.field(name_field) {
                None => {
                    return Err(SchemaError::validation(format!(
                        "{}: nameField {name_field} does not exist",
                        t.name
                    )))
                }
                Some(field) => {
                    if !matches!(field.field_type, FieldType::String { .. }) || field.list {
                        return Err(SchemaError::validation(format!(
                            "{}: nameField {name_field} must be a single String field",
                            t.name
                        )));
                    }
                }
            }
        }

        if let Some(pattern) = &t.auth_key_pattern {
            if !pattern_names.contains(pattern.as_str()) {
                return Err(SchemaError::validation(format!(
                    "{}: authKeyPattern references unknown pattern {pattern}",
                    t.name
                )));
            }
        }
    }

    for t in &spec.component_types {
        validate_fields(
            &t.name,
            &t.fields,
            &entity_type_names,
            &component_type_names,
            &pattern_names,
            &index_names,
        )?;
    }

    Ok(())
}

fn validate_type_name<'a>(name: &'a str, seen: &mut HashSet<&'a str>) -> SchemaResult<()> {
    if !type_name_regex().is_match(name) {
        return Err(SchemaError::validation(format!(
            "type name {name} must be PascalCase"
        )));
    }
    // Entity and component types share one namespace.
    if !seen.insert(name) {
        return Err(SchemaError::validation(format!("duplicate type name {name}")));
    }
    Ok(())
}

fn validate_fields(
    type_name: &str,
    fields: &[FieldSpec],
    entity_types: &HashSet<&str>,
    component_types: &HashSet<&str>,
    patterns: &HashSet<&str>,
    indexes: &HashSet<&str>,
) -> SchemaResult<()> {
    let mut field_names = HashSet::new();
    for field in fields {
        if !camel_case_regex().is_match(&field.name) {
            return Err(SchemaError::validation(format!(
                "{type_name}.{} must be camelCase",
                field.name
            )));
        }
        if !field_names.insert(field.name.as_str()) {
            return Err(SchemaError::validation(format!(
                "{type_name}: duplicate field name {}",
                field.name
            )));
        }

        match &field.field_type {
            FieldType::String {
                match_pattern,
                index,
            } => {
                if let Some(pattern) = match_pattern {
                    if !patterns.contains(pattern.as_str()) {
                        return Err(SchemaError::validation(format!(
                            "{type_name}.{}: matchPattern references unknown pattern {pattern}",
                            field.name
                        )));
                    }
                }
                if let Some(index) = index {
                    if !indexes.contains(index.as_str()) {
                        return Err(SchemaError::validation(format!(
                            "{type_name}.{}: index references unknown index {index}",
                            field.name
                        )));
                    }
                }
            }
            FieldType::Reference { entity_types: refs } => {
                for name in refs {
                    if !entity_types.contains(name.as_str()) {
                        return Err(SchemaError::validation(format!(
                            "{type_name}.{}: entityTypes references unknown type {name}",
                            field.name
                        )));
                    }
                }
            }
            FieldType::Component {
                component_types: refs,
            } => {
                for name in refs {
                    if !component_types.contains(name.as_str()) {
                        return Err(SchemaError::validation(format!(
                            "{type_name}.{}: componentTypes references unknown type {name}",
                            field.name
                        )));
                    }
                }
            }
            FieldType::Boolean | FieldType::Number { .. } | FieldType::Location
            | FieldType::RichText => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{EntityTypeSpec, IndexSpec, IndexType, PatternSpec};

    fn entity_type(name: &str, fields: Vec<FieldSpec>) -> EntityTypeSpec {
        EntityTypeSpec {
            name: name.into(),
            admin_only: false,
            auth_key_pattern: None,
            name_field: None,
            fields,
        }
    }

    fn string_field(name: &str) -> FieldSpec {
        FieldSpec {
            name: name.into(),
            list: false,
            required: false,
            admin_only: false,
            field_type: FieldType::String {
                match_pattern: None,
                index: None,
            },
        }
    }

    #[test]
    fn accepts_minimal_spec() {
        let spec = SchemaSpecification {
            entity_types: vec![entity_type("TitleOnly", vec![string_field("title")])],
            ..SchemaSpecification::empty()
        };
        assert!(validate_spec(&spec).is_ok());
    }

    #[test]
    fn rejects_lowercase_type_name() {
        let spec = SchemaSpecification {
            entity_types: vec![entity_type("titleOnly", vec![])],
            ..SchemaSpecification::empty()
        };
        assert!(validate_spec(&spec).is_err());
    }

    #[test]
    fn rejects_duplicate_type_across_namespaces() {
        let spec = SchemaSpecification {
            entity_types: vec![entity_type("Shared", vec![])],
            component_types: vec![crate::spec::ComponentTypeSpec {
                name: "Shared".into(),
                admin_only: false,
                fields: vec![],
            }],
            ..SchemaSpecification::empty()
        };
        assert!(validate_spec(&spec).is_err());
    }

    #[test]
    fn rejects_dangling_reference_type() {
        let spec = SchemaSpecification {
            entity_types: vec![entity_type(
                "Post",
                vec![FieldSpec {
                    name: "author".into(),
                    list: false,
                    required: false,
                    admin_only: false,
                    field_type: FieldType::Reference {
                        entity_types: vec!["Person".into()],
                    },
                }],
            )],
            ..SchemaSpecification::empty()
        };
        let err = validate_spec(&spec).unwrap_err();
        assert!(err.to_string().contains("Person"));
    }

    #[test]
    fn rejects_invalid_pattern_regex() {
        let spec = SchemaSpecification {
            patterns: vec![PatternSpec {
                name: "broken".into(),
                pattern: "[".into(),
            }],
            ..SchemaSpecification::empty()
        };
        assert!(validate_spec(&spec).is_err());
    }

    #[test]
    fn rejects_unknown_index() {
        let spec = SchemaSpecification {
            entity_types: vec![entity_type(
                "Post",
                vec![FieldSpec {
                    name: "slug".into(),
                    list: false,
                    required: false,
                    admin_only: false,
                    field_type: FieldType::String {
                        match_pattern: None,
                        index: Some("slugs".into()),
                    },
                }],
            )],
            ..SchemaSpecification::empty()
        };
        assert!(validate_spec(&spec).is_err());
    }

    #[test]
    fn rejects_list_name_field() {
        let mut field = string_field("titles");
        field.list = true;
        let mut t = entity_type("Post", vec![field]);
        t.name_field = Some("titles".into());
        let spec = SchemaSpecification {
            entity_types: vec![t],
            ..SchemaSpecification::empty()
        };
        assert!(validate_spec(&spec).is_err());
    }

    #[test]
    fn accepts_unique_index_reference() {
        let spec = SchemaSpecification {
            indexes: vec![IndexSpec {
                name: "slugs".into(),
                index_type: IndexType::Unique,
            }],
            entity_types: vec![entity_type(
                "Post",
                vec![FieldSpec {
                    name: "slug".into(),
                    list: false,
                    required: false,
                    admin_only: false,
                    field_type: FieldType::String {
                        match_pattern: None,
                        index: Some("slugs".into()),
                    },
                }],
            )],
            ..SchemaSpecification::empty()
        };
        assert!(validate_spec(&spec).is_ok());
    }
}
