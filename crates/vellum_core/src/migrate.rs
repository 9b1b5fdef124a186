//! Lazy field-data migration.
//!
//! Entity versions store the schema version they were written under.
//! When a version is read under a newer schema, the migration actions
//! recorded since its version are applied to the stored field map in
//! order. Nothing is rewritten in place; storage keeps the original
//! payload and migration happens on every read.

use vellum_adapter::{RepoError, RepoResult};
use vellum_schema::{MigrationAction, Schema, TypeKind};

use crate::richtext::RichTextNode;
use crate::value::{ComponentValue, FieldMap, FieldValue};

/// Migrates a stored field map from the schema version it was written
/// under to the given schema.
///
/// Returns the entity's current type name (following renames) and the
/// migrated fields. Fails if the entity's own type was deleted by a
/// migration, which the schema update path prevents while entities of
/// the type exist.
pub fn migrate_entity_fields(
    schema: &Schema,
    from_version: u32,
    entity_type: &str,
    fields: FieldMap,
) -> RepoResult<(String, FieldMap)> {
    let mut type_name = entity_type.to_owned();
    let mut fields = fields;

    for action in schema.actions_since_version(from_version) {
        match action {
            MigrationAction::RenameType {
                kind: TypeKind::Entity,
                name,
                new_name,
            } if *name == type_name => {
                type_name = new_name.clone();
            }
            MigrationAction::DeleteType {
                kind: TypeKind::Entity,
                name,
            } if *name == type_name => {
                return Err(RepoError::generic(format!(
                    "entity type {name} was deleted by a migration while entities remained"
                )));
            }
            MigrationAction::RenameField {
                kind: TypeKind::Entity,
                type_name: owner,
                field,
                new_field,
            } if *owner == type_name => {
                if let Some(value) = fields.remove(field) {
                    fields.insert(new_field.clone(), value);
                }
            }
            MigrationAction::DeleteField {
                kind: TypeKind::Entity,
                type_name: owner,
                field,
            } if *owner == type_name => {
                fields.remove(field);
            }
            action if action_kind(action) == TypeKind::Component => {
                fields.retain(|_, value| apply_to_value(value, action));
            }
            _ => {}
        }
    }
    Ok((type_name, fields))
}

fn action_kind(action: &MigrationAction) -> TypeKind {
    match action {
        MigrationAction::RenameType { kind, .. }
        | MigrationAction::DeleteType { kind, .. }
        | MigrationAction::RenameField { kind, .. }
        | MigrationAction::DeleteField { kind, .. } => *kind,
    }
}

/// Applies a component-kind action inside one value. Returns false when
/// the value itself must be removed.
fn apply_to_value(value: &mut FieldValue, action: &MigrationAction) -> bool {
    match value {
        FieldValue::Component(component) => apply_to_component(component, action),
        FieldValue::List(items) => {
            items.retain_mut(|item| apply_to_value(item, action));
            true
        }
        FieldValue::RichText(doc) => {
            apply_to_node(&mut doc.root, action);
            true
        }
        _ => true,
    }
}

fn apply_to_component(component: &mut ComponentValue, action: &MigrationAction) -> bool {
    match action {
        MigrationAction::DeleteType { name, .. } if *name == component.component_type => {
            return false;
        }
        MigrationAction::RenameType { name, new_name, .. }
            if *name == component.component_type =>
        {
            component.component_type = new_name.clone();
        }
        MigrationAction::RenameField {
            type_name,
            field,
            new_field,
            ..
        } if *type_name == component.component_type => {
            if let Some(value) = component.fields.remove(field) {
                component.fields.insert(new_field.clone(), value);
            }
        }
        MigrationAction::DeleteField {
            type_name, field, ..
        } if *type_name == component.component_type => {
            component.fields.remove(field);
        }
        _ => {}
    }
    component
        .fields
        .retain(|_, value| apply_to_value(value, action));
    true
}

fn apply_to_node(node: &mut RichTextNode, action: &MigrationAction) {
    if let Some(children) = node.children_mut() {
        children.retain_mut(|child| match child {
            RichTextNode::Component { value } => apply_to_component(value, action),
            other => {
                apply_to_node(other, action);
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::richtext::RichText;
    use vellum_schema::{MigrationBatch, SchemaSpecification};

    fn schema_with_actions(actions: Vec<MigrationAction>) -> Schema {
        Schema::new(SchemaSpecification {
            version: 2,
            migrations: vec![MigrationBatch {
                version: 2,
                actions,
            }],
            ..SchemaSpecification::empty()
        })
        .unwrap()
    }

    fn callout(text: &str) -> ComponentValue {
        ComponentValue {
            component_type: "Callout".into(),
            fields: FieldMap::from([("text".into(), FieldValue::String(text.into()))]),
        }
    }

    #[test]
    fn entity_field_rename_moves_the_value() {
        let schema = schema_with_actions(vec![MigrationAction::RenameField {
            kind: TypeKind::Entity,
            type_name: "Post".into(),
            field: "header".into(),
            new_field: "title".into(),
        }]);
        let fields = FieldMap::from([("header".into(), FieldValue::String("hi".into()))]);

        let (type_name, migrated) =
            migrate_entity_fields(&schema, 1, "Post", fields).unwrap();
        assert_eq!(type_name, "Post");
        assert_eq!(migrated.get("title"), Some(&FieldValue::String("hi".into())));
        assert!(!migrated.contains_key("header"));
    }

    #[test]
    fn entity_type_rename_follows_the_chain() {
        let schema = Schema::new(SchemaSpecification {
            version: 3,
            migrations: vec![
                MigrationBatch {
                    version: 2,
                    actions: vec![MigrationAction::RenameType {
                        kind: TypeKind::Entity,
                        name: "Post".into(),
                        new_name: "Article".into(),
                    }],
                },
                MigrationBatch {
                    version: 3,
                    actions: vec![MigrationAction::RenameType {
                        kind: TypeKind::Entity,
                        name: "Article".into(),
                        new_name: "Story".into(),
                    }],
                },
            ],
            ..SchemaSpecification::empty()
        })
        .unwrap();

        let (type_name, _) =
            migrate_entity_fields(&schema, 1, "Post", FieldMap::new()).unwrap();
        assert_eq!(type_name, "Story");
    }

    #[test]
    fn component_rename_reaches_nested_values() {
        let schema = schema_with_actions(vec![MigrationAction::RenameType {
            kind: TypeKind::Component,
            name: "Callout".into(),
            new_name: "Aside".into(),
        }]);
        let doc = RichText::from_blocks(vec![RichTextNode::Component {
            value: callout("embedded"),
        }]);
        let fields = FieldMap::from([
            ("aside".into(), FieldValue::Component(callout("direct"))),
            ("body".into(), FieldValue::RichText(doc)),
        ]);

        let (_, migrated) = migrate_entity_fields(&schema, 1, "Post", fields).unwrap();
        match migrated.get("aside") {
            Some(FieldValue::Component(c)) => assert_eq!(c.component_type, "Aside"),
            other => panic!("unexpected aside: {other:?}"),
        }
        match migrated.get("body") {
            Some(FieldValue::RichText(doc)) => match &doc.root {
                RichTextNode::Root { children } => match &children[0] {
                    RichTextNode::Component { value } => {
                        assert_eq!(value.component_type, "Aside");
                    }
                    other => panic!("unexpected node: {other:?}"),
                },
                other => panic!("unexpected root: {other:?}"),
            },
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn deleted_component_values_are_dropped() {
        let schema = schema_with_actions(vec![MigrationAction::DeleteType {
            kind: TypeKind::Component,
            name: "Callout".into(),
        }]);
        let fields = FieldMap::from([
            ("single".into(), FieldValue::Component(callout("a"))),
            (
                "many".into(),
                FieldValue::List(vec![
                    FieldValue::Component(callout("b")),
                    FieldValue::String("keep".into()),
                ]),
            ),
        ]);

        let (_, migrated) = migrate_entity_fields(&schema, 1, "Post", fields).unwrap();
        assert!(!migrated.contains_key("single"));
        assert_eq!(
            migrated.get("many"),
            Some(&FieldValue::List(vec![FieldValue::String("keep".into())]))
        );
    }

    #[test]
    fn component_field_delete_applies_recursively() {
        let schema = schema_with_actions(vec![MigrationAction::DeleteField {
            kind: TypeKind::Component,
            type_name: "Callout".into(),
            field: "text".into(),
        }]);
        let outer = ComponentValue {
            component_type: "Box".into(),
            fields: FieldMap::from([("inner".into(), FieldValue::Component(callout("x")))]),
        };
        let fields = FieldMap::from([("box".into(), FieldValue::Component(outer))]);

        let (_, migrated) = migrate_entity_fields(&schema, 1, "Post", fields).unwrap();
        match migrated.get("box") {
            Some(FieldValue::Component(outer)) => match outer.fields.get("inner") {
                Some(FieldValue::Component(inner)) => assert!(inner.fields.is_empty()),
                other => panic!("unexpected inner: {other:?}"),
            },
            other => panic!("unexpected box: {other:?}"),
        }
    }

    #[test]
    fn up_to_date_version_is_untouched() {
        let schema = schema_with_actions(vec![MigrationAction::DeleteField {
            kind: TypeKind::Entity,
            type_name: "Post".into(),
            field: "title".into(),
        }]);
        let fields = FieldMap::from([("title".into(), FieldValue::String("hi".into()))]);

        let (_, migrated) =
            migrate_entity_fields(&schema, schema.version(), "Post", fields.clone()).unwrap();
        assert_eq!(migrated, fields);
    }
}
