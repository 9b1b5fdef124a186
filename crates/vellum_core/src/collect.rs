//! Derived index data collected from entity content.
//!
//! A single traversal pass over an entity's fields produces everything the
//! storage layer indexes besides the raw version payload: the full-text
//! blob, outgoing references, locations, unique-index values and the set
//! of embedded component types.

use std::collections::{BTreeMap, BTreeSet};

use uuid::Uuid;
use vellum_schema::{EntityTypeSpec, FieldSpec, FieldType, Schema};

use crate::richtext::RichTextNode;
use crate::traverse::{traverse_entity, ContentNode};
use crate::value::{FieldMap, FieldValue, Location};

/// Index data derived from one entity version's content.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct EntityIndexData {
    /// Concatenated text of all string and rich-text content.
    pub full_text: String,
    /// Ids of referenced entities, in content order, deduplicated.
    pub references: Vec<Uuid>,
    /// All location values in the content.
    pub locations: Vec<Location>,
    /// Values per unique index, keyed by index name.
    pub unique_values: BTreeMap<String, BTreeSet<String>>,
    /// Component types embedded anywhere in the content.
    pub component_types: BTreeSet<String>,
    /// References made through fields that restrict target entity types.
    pub typed_references: Vec<TypedReference>,
}

/// A reference made through a type-restricted reference field.
///
/// Rich-text entity embeds carry no field spec and are never restricted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedReference {
    /// Name of the field the reference was made through.
    pub field: String,
    /// Referenced entity id.
    pub id: Uuid,
    /// Entity types the field accepts.
    pub allowed_types: Vec<String>,
}

/// Collects index data from an entity's fields in one traversal pass.
pub fn collect_index_data(
    schema: &Schema,
    type_spec: &EntityTypeSpec,
    fields: &FieldMap,
) -> EntityIndexData {
    let mut data = EntityIndexData::default();
    let mut seen_references = BTreeSet::new();

    for node in traverse_entity(schema, type_spec, fields) {
        match node {
            ContentNode::Field {
                field,
                value: Some(value),
                ..
            } => collect_value(schema, &mut data, &mut seen_references, field, value),
            ContentNode::FieldItem { field, value, .. } => {
                collect_value(schema, &mut data, &mut seen_references, field, value);
            }
            ContentNode::Component { value, .. } => {
                data.component_types.insert(value.component_type.clone());
            }
            ContentNode::RichTextNode { node, .. } => match node {
                RichTextNode::Text { text } => push_text(&mut data.full_text, text),
                RichTextNode::Entity { id } | RichTextNode::EntityLink { id, .. } => {
                    if seen_references.insert(*id) {
                        data.references.push(*id);
                    }
                }
                _ => {}
            },
            ContentNode::Field { value: None, .. } | ContentNode::Error { .. } => {}
        }
    }
    data
}

fn collect_value(
    schema: &Schema,
    data: &mut EntityIndexData,
    seen_references: &mut BTreeSet<Uuid>,
    field: &FieldSpec,
    value: &FieldValue,
) {
    match value {
        FieldValue::String(text) => {
            push_text(&mut data.full_text, text);
            if let FieldType::String { index: Some(index), .. } = &field.field_type {
                if schema.is_unique_index(index) {
                    data.unique_values
                        .entry(index.clone())
                        .or_default()
                        .insert(text.clone());
                }
            }
        }
        FieldValue::Reference(reference) => {
            if seen_references.insert(reference.id) {
                data.references.push(reference.id);
            }
            if let FieldType::Reference { entity_types } = &field.field_type {
                if !entity_types.is_empty() {
                    data.typed_references.push(TypedReference {
                        field: field.name.clone(),
                        id: reference.id,
                        allowed_types: entity_types.clone(),
                    });
                }
            }
        }
        FieldValue::Location(location) => data.locations.push(*location),
        _ => {}
    }
}

fn push_text(full_text: &mut String, text: &str) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    if !full_text.is_empty() {
        full_text.push(' ');
    }
    full_text.push_str(text);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::richtext::RichText;
    use crate::value::{ComponentValue, EntityReference};
    use vellum_schema::{SchemaSpecification, SchemaSpecificationUpdate};

    fn test_schema() -> Schema {
        let update: SchemaSpecificationUpdate = serde_json::from_value(serde_json::json!({
            "entityTypes": [{
                "name": "Place",
                "fields": [
                    {"name": "title", "type": "string", "index": "slugs"},
                    {"name": "summary", "type": "string"},
                    {"name": "body", "type": "richText"},
                    {"name": "where", "type": "location"},
                    {"name": "related", "type": "reference", "entityTypes": ["Place"], "list": true},
                    {"name": "extras", "type": "component", "componentTypes": ["Callout"], "list": true}
                ]
            }],
            "componentTypes": [{
                "name": "Callout",
                "fields": [{"name": "text", "type": "string"}]
            }],
            "indexes": [{"name": "slugs", "type": "unique"}]
        }))
        .unwrap();
        Schema::new(SchemaSpecification::empty())
            .unwrap()
            .apply_update(&update)
            .unwrap()
            .schema
    }

    #[test]
    fn collects_text_references_and_locations() {
        let schema = test_schema();
        let type_spec = schema.entity_type("Place").unwrap();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let mut fields = FieldMap::new();
        fields.insert("title".into(), FieldValue::String("Lighthouse".into()));
        fields.insert("summary".into(), FieldValue::String("  sea views  ".into()));
        fields.insert(
            "where".into(),
            FieldValue::Location(Location { lat: 57.0, lng: -2.0 }),
        );
        fields.insert(
            "related".into(),
            FieldValue::List(vec![
                FieldValue::Reference(EntityReference { id: a }),
                FieldValue::Reference(EntityReference { id: b }),
                FieldValue::Reference(EntityReference { id: a }),
            ]),
        );

        let data = collect_index_data(&schema, type_spec, &fields);
        assert_eq!(data.full_text, "Lighthouse sea views");
        assert_eq!(data.references, [a, b]);
        assert_eq!(data.locations.len(), 1);
        assert_eq!(
            data.unique_values["slugs"],
            BTreeSet::from(["Lighthouse".to_owned()])
        );
    }

    #[test]
    fn rich_text_contributes_text_and_references() {
        let schema = test_schema();
        let type_spec = schema.entity_type("Place").unwrap();
        let id = Uuid::new_v4();

        let doc = RichText::from_blocks(vec![
            RichTextNode::Paragraph {
                children: vec![
                    RichTextNode::Text { text: "see".into() },
                    RichTextNode::EntityLink {
                        id,
                        children: vec![RichTextNode::Text { text: "here".into() }],
                    },
                ],
            },
            RichTextNode::Component {
                value: ComponentValue {
                    component_type: "Callout".into(),
                    fields: FieldMap::from([(
                        "text".into(),
                        FieldValue::String("note".into()),
                    )]),
                },
            },
        ]);
        let mut fields = FieldMap::new();
        fields.insert("body".into(), FieldValue::RichText(doc));

        let data = collect_index_data(&schema, type_spec, &fields);
        assert_eq!(data.full_text, "see here note");
        assert_eq!(data.references, [id]);
        assert_eq!(data.component_types, BTreeSet::from(["Callout".to_owned()]));
    }

    #[test]
    fn restricted_reference_fields_record_their_allowed_types() {
        let schema = test_schema();
        let type_spec = schema.entity_type("Place").unwrap();
        let id = Uuid::new_v4();

        let mut fields = FieldMap::new();
        fields.insert(
            "related".into(),
            FieldValue::List(vec![FieldValue::Reference(EntityReference { id })]),
        );

        let data = collect_index_data(&schema, type_spec, &fields);
        assert_eq!(
            data.typed_references,
            [TypedReference {
                field: "related".into(),
                id,
                allowed_types: vec!["Place".into()],
            }]
        );
    }

    #[test]
    fn empty_entity_yields_empty_data() {
        let schema = test_schema();
        let type_spec = schema.entity_type("Place").unwrap();
        let data = collect_index_data(&schema, type_spec, &FieldMap::new());
        assert_eq!(data, EntityIndexData::default());
    }
}
