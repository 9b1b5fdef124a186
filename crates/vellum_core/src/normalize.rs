//! Field input normalization and validation.
//!
//! Incoming field maps are checked against the schema and canonicalized
//! before storage: unknown fields are rejected, empty strings and empty
//! lists become null, and null fields are dropped from the stored map.
//! Required-field checks are deferred to publish time so drafts can stay
//! incomplete.

use vellum_adapter::{RepoError, RepoResult};
use vellum_schema::{FieldSpec, FieldType, Schema};

use crate::path::ContentPath;
use crate::richtext::RichTextNode;
use crate::value::{ComponentValue, FieldMap, FieldValue};

/// Normalizes and validates an entity's input fields against its type.
///
/// Returns the canonical field map to store. Fails with
/// [`RepoError::BadRequest`] on unknown field names or values that do not
/// fit the field specs.
pub fn normalize_entity_fields(
    schema: &Schema,
    entity_type: &str,
    input: &FieldMap,
) -> RepoResult<FieldMap> {
    let type_spec = schema
        .entity_type(entity_type)
        .ok_or_else(|| RepoError::bad_request(format!("Unknown entity type {entity_type}")))?;
    normalize_fields(schema, &type_spec.fields, input, &ContentPath::root())
}

fn normalize_fields(
    schema: &Schema,
    specs: &[FieldSpec],
    input: &FieldMap,
    path: &ContentPath,
) -> RepoResult<FieldMap> {
    let unknown: Vec<&str> = input
        .keys()
        .filter(|name| !specs.iter().any(|spec| &spec.name == *name))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        return Err(RepoError::bad_request(format!(
            "Unsupported field names: {}",
            unknown.join(", ")
        )));
    }

    let mut normalized = FieldMap::new();
    for spec in specs {
        let Some(value) = input.get(&spec.name) else {
            continue;
        };
        let field_path = path.with_field(&spec.name);
        let value = normalize_field(schema, spec, value, &field_path)?;
        if !value.is_null() {
            normalized.insert(spec.name.clone(), value);
        }
    }
    Ok(normalized)
}

fn normalize_field(
    schema: &Schema,
    spec: &FieldSpec,
    value: &FieldValue,
    path: &ContentPath,
) -> RepoResult<FieldValue> {
    match value {
        FieldValue::Null => Ok(FieldValue::Null),
        FieldValue::List(items) => {
            if !spec.list {
                return Err(RepoError::bad_request(format!(
                    "Field {path} must be a single value, got a list"
                )));
            }
            let mut normalized = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                let item_path = path.with_index(index);
                if matches!(item, FieldValue::Null | FieldValue::List(_)) {
                    return Err(RepoError::bad_request(format!(
                        "Field {item_path} must be a plain value"
                    )));
                }
                normalized.push(normalize_scalar(schema, spec, item, &item_path)?);
            }
            if normalized.is_empty() {
                Ok(FieldValue::Null)
            } else {
                Ok(FieldValue::List(normalized))
            }
        }
        _ => {
            if spec.list {
                return Err(RepoError::bad_request(format!(
                    "Field {path} must be a list"
                )));
            }
            normalize_scalar(schema, spec, value, path)
        }
    }
}

fn normalize_scalar(
    schema: &Schema,
    spec: &FieldSpec,
    value: &FieldValue,
    path: &ContentPath,
) -> RepoResult<FieldValue> {
    match (&spec.field_type, value) {
        (FieldType::Boolean, FieldValue::Boolean(_)) => Ok(value.clone()),
        (FieldType::String { match_pattern, .. }, FieldValue::String(text)) => {
            if text.is_empty() {
                return Ok(FieldValue::Null);
            }
            if let Some(pattern_name) = match_pattern {
                let pattern = schema.pattern(pattern_name).ok_or_else(|| {
                    RepoError::bad_request(format!("Unknown pattern {pattern_name}"))
                })?;
                if !pattern.is_match(text) {
                    return Err(RepoError::bad_request(format!(
                        "Field {path} does not match pattern {pattern_name}"
                    )));
                }
            }
            Ok(value.clone())
        }
        (FieldType::Number { integer }, FieldValue::Number(number)) => {
            if *integer && (number.fract() != 0.0 || !number.is_finite()) {
                return Err(RepoError::bad_request(format!(
                    "Field {path} must be an integer"
                )));
            }
            if !number.is_finite() {
                return Err(RepoError::bad_request(format!(
                    "Field {path} must be a finite number"
                )));
            }
            Ok(value.clone())
        }
        (FieldType::Location, FieldValue::Location(location)) => {
            if !(-90.0..=90.0).contains(&location.lat)
                || !(-180.0..=180.0).contains(&location.lng)
            {
                return Err(RepoError::bad_request(format!(
                    "Field {path} is not a valid location"
                )));
            }
            Ok(value.clone())
        }
        (FieldType::Reference { .. }, FieldValue::Reference(_)) => Ok(value.clone()),
        (FieldType::RichText, FieldValue::RichText(doc)) => {
            if !matches!(doc.root, RichTextNode::Root { .. }) {
                return Err(RepoError::bad_request(format!(
                    "Field {path} must be a rich text document"
                )));
            }
            Ok(value.clone())
        }
        (FieldType::Component { component_types }, FieldValue::Component(component)) => {
            normalize_component(schema, component_types, component, path)
        }
        (expected, _) => Err(RepoError::bad_request(format!(
            "Field {path} must be a {} value",
            expected.name()
        ))),
    }
}

fn normalize_component(
    schema: &Schema,
    allowed_types: &[String],
    component: &ComponentValue,
    path: &ContentPath,
) -> RepoResult<FieldValue> {
    // An empty list places no restriction on the component type.
    if !allowed_types.is_empty() && !allowed_types.contains(&component.component_type) {
        return Err(RepoError::bad_request(format!(
            "Component type {} is not allowed at {path}",
            component.component_type
        )));
    }
    let spec = schema
        .component_type(&component.component_type)
        .ok_or_else(|| {
            RepoError::bad_request(format!(
                "Unknown component type {}",
                component.component_type
            ))
        })?;
    let fields = normalize_fields(schema, &spec.fields, &component.fields, path)?;
    Ok(FieldValue::Component(ComponentValue {
        component_type: component.component_type.clone(),
        fields,
    }))
}

/// Checks a stored field map against the published schema before publish.
///
/// The entity type must survive in the published schema and every
/// required field must have a value.
pub fn validate_for_publish(
    published_schema: &Schema,
    entity_type: &str,
    fields: &FieldMap,
) -> RepoResult<()> {
    let type_spec = published_schema.entity_type(entity_type).ok_or_else(|| {
        RepoError::bad_request(format!("Entity type {entity_type} cannot be published"))
    })?;
    let missing: Vec<&str> = type_spec
        .fields
        .iter()
        .filter(|spec| spec.required && !fields.contains_key(&spec.name))
        .map(|spec| spec.name.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(RepoError::bad_request(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_schema::{SchemaSpecification, SchemaSpecificationUpdate};

    fn test_schema() -> Schema {
        let update: SchemaSpecificationUpdate = serde_json::from_value(serde_json::json!({
            "entityTypes": [{
                "name": "Event",
                "fields": [
                    {"name": "title", "type": "string", "required": true},
                    {"name": "slug", "type": "string", "matchPattern": "slug"},
                    {"name": "seats", "type": "number", "integer": true},
                    {"name": "tags", "type": "string", "list": true},
                    {"name": "venue", "type": "component", "componentTypes": ["Venue"]},
                    {"name": "widget", "type": "component"}
                ]
            }],
            "componentTypes": [{
                "name": "Venue",
                "fields": [{"name": "name", "type": "string"}]
            }],
            "patterns": [{"name": "slug", "pattern": "^[a-z0-9-]+$"}]
        }))
        .unwrap();
        Schema::new(SchemaSpecification::empty())
            .unwrap()
            .apply_update(&update)
            .unwrap()
            .schema
    }

    fn fields(json: serde_json::Value) -> FieldMap {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let schema = test_schema();
        let err = normalize_entity_fields(&schema, "Event", &fields(serde_json::json!({"bogus": 1})))
            .unwrap_err();
        assert_eq!(
            err,
            RepoError::bad_request("Unsupported field names: bogus")
        );
    }

    #[test]
    fn empty_values_become_absent() {
        let schema = test_schema();
        let normalized = normalize_entity_fields(
            &schema,
            "Event",
            &fields(serde_json::json!({"title": "", "tags": [], "seats": null})),
        )
        .unwrap();
        assert!(normalized.is_empty());
    }

    #[test]
    fn pattern_mismatch_is_rejected() {
        let schema = test_schema();
        let err = normalize_entity_fields(
            &schema,
            "Event",
            &fields(serde_json::json!({"slug": "Not A Slug"})),
        )
        .unwrap_err();
        assert!(err.is_bad_request());
        assert!(err.to_string().contains("pattern"));
    }

    #[test]
    fn integer_field_rejects_fractions() {
        let schema = test_schema();
        let err = normalize_entity_fields(
            &schema,
            "Event",
            &fields(serde_json::json!({"seats": 2.5})),
        )
        .unwrap_err();
        assert!(err.to_string().contains("integer"));
        assert!(normalize_entity_fields(
            &schema,
            "Event",
            &fields(serde_json::json!({"seats": 12}))
        )
        .is_ok());
    }

    #[test]
    fn scalar_for_list_field_is_rejected() {
        let schema = test_schema();
        let err = normalize_entity_fields(
            &schema,
            "Event",
            &fields(serde_json::json!({"tags": "solo"})),
        )
        .unwrap_err();
        assert!(err.to_string().contains("must be a list"));
    }

    #[test]
    fn component_fields_are_normalized_recursively() {
        let schema = test_schema();
        let normalized = normalize_entity_fields(
            &schema,
            "Event",
            &fields(serde_json::json!({"venue": {"type": "Venue", "name": ""}})),
        )
        .unwrap();
        match normalized.get("venue") {
            Some(FieldValue::Component(component)) => assert!(component.fields.is_empty()),
            other => panic!("unexpected venue value: {other:?}"),
        }
    }

    #[test]
    fn disallowed_component_type_is_rejected() {
        let schema = test_schema();
        let err = normalize_entity_fields(
            &schema,
            "Event",
            &fields(serde_json::json!({"venue": {"type": "Event"}})),
        )
        .unwrap_err();
        assert!(err.to_string().contains("not allowed"));
    }

    #[test]
    fn unrestricted_component_field_accepts_any_known_type() {
        let schema = test_schema();
        let normalized = normalize_entity_fields(
            &schema,
            "Event",
            &fields(serde_json::json!({"widget": {"type": "Venue", "name": "Hall"}})),
        )
        .unwrap();
        assert!(matches!(
            normalized.get("widget"),
            Some(FieldValue::Component(component)) if component.component_type == "Venue"
        ));

        let err = normalize_entity_fields(
            &schema,
            "Event",
            &fields(serde_json::json!({"widget": {"type": "Nonexistent"}})),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Unknown component type"));
    }

    #[test]
    fn publish_requires_required_fields() {
        let schema = test_schema();
        let err = validate_for_publish(&schema, "Event", &FieldMap::new()).unwrap_err();
        assert_eq!(err, RepoError::bad_request("Missing required fields: title"));

        let ok = fields(serde_json::json!({"title": "Launch"}));
        assert!(validate_for_publish(&schema, "Event", &ok).is_ok());
    }
}
