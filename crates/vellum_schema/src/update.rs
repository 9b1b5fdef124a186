//! Schema updates.
//!
//! `apply_update` merges a partial update into the previous specification
//! and produces a new schema. The previous schema is never mutated; a
//! no-op update returns it with an unchanged version.

use crate::error::{SchemaError, SchemaResult};
use crate::schema::Schema;
use crate::spec::{
    FieldType, MigrationAction, MigrationBatch, SchemaSpecification, SchemaSpecificationUpdate,
    TypeKind,
};

/// Outcome of [`Schema::apply_update`].
#[derive(Debug, Clone)]
pub struct SchemaUpdateResult {
    /// The resulting schema. Identical to the input for a no-op update.
    pub schema: Schema,
    /// False if the update changed nothing (version not bumped).
    pub changed: bool,
    /// Migration actions recorded by this update (requested plus
    /// inferred), used by the caller to compute the change impact.
    pub actions: Vec<MigrationAction>,
}

impl Schema {
    /// Produces a new schema by merging `update` into this one.
    ///
    /// Requested migration actions are applied structurally first, then
    /// added/changed types, patterns and indexes are merged in (matched by
    /// name). Replacing a type infers a delete-field action for every
    /// field the replacement no longer declares. If anything changed the
    /// version is incremented and the actions are appended to the
    /// migration log; otherwise the schema is returned as-is.
    pub fn apply_update(&self, update: &SchemaSpecificationUpdate) -> SchemaResult<SchemaUpdateResult> {
        let before = self.spec();
        let mut candidate = before.clone();
        let mut actions = update.migrations.clone();

        for action in &update.migrations {
            apply_action(&mut candidate, action)?;
        }

        for updated in &update.entity_types {
            match candidate
                .entity_types
                .iter_mut()
                .find(|t| t.name == updated.name)
            {
                Some(existing) => {
                    infer_deleted_fields(
                        TypeKind::Entity,
                        &existing.name,
                        existing.fields.iter().map(|f| f.name.as_str()),
                        updated.fields.iter().map(|f| f.name.as_str()),
                        &mut actions,
                    );
                    *existing = updated.clone();
                }
                None => candidate.entity_types.push(updated.clone()),
            }
        }
        for updated in &update.component_types {
            match candidate
                .component_types
                .iter_mut()
                .find(|t| t.name == updated.name)
            {
                Some(existing) => {
                    infer_deleted_fields(
                        TypeKind::Component,
                        &existing.name,
                        existing.fields.iter().map(|f| f.name.as_str()),
                        updated.fields.iter().map(|f| f.name.as_str()),
                        &mut actions,
                    );
                    *existing = updated.clone();
                }
                None => candidate.component_types.push(updated.clone()),
            }
        }
        for updated in &update.patterns {
            match candidate.patterns.iter_mut().find(|p| p.name == updated.name) {
                Some(existing) => *existing = updated.clone(),
                None => candidate.patterns.push(updated.clone()),
            }
        }
        for updated in &update.indexes {
            match candidate.indexes.iter_mut().find(|x| x.name == updated.name) {
                Some(existing) => {
                    if existing.index_type != updated.index_type {
                        return Err(SchemaError::validation(format!(
                            "index {} cannot change type",
                            updated.name
                        )));
                    }
                    *existing = updated.clone();
                }
                None => candidate.indexes.push(updated.clone()),
            }
        }

        let changed = !actions.is_empty()
            || candidate.entity_types != before.entity_types
            || candidate.component_types != before.component_types
            || candidate.patterns != before.patterns
            || candidate.indexes != before.indexes;

        if !changed {
            return Ok(SchemaUpdateResult {
                schema: self.clone(),
                changed: false,
                actions: Vec::new(),
            });
        }

        candidate.version = before.version + 1;
        if !actions.is_empty() {
            candidate.migrations.push(MigrationBatch {
                version: candidate.version,
                actions: actions.clone(),
            });
        }

        Ok(SchemaUpdateResult {
            schema: Schema::new(candidate)?,
            changed: true,
            actions,
        })
    }
}

fn infer_deleted_fields<'a>(
    kind: TypeKind,
    type_name: &str,
    old_fields: impl Iterator<Item = &'a str>,
    new_fields: impl Iterator<Item = &'a str> + Clone,
    actions: &mut Vec<MigrationAction>,
) {
    for old in old_fields {
        if !new_fields.clone().any(|new| new == old) {
            actions.push(MigrationAction::DeleteField {
                kind,
                type_name: type_name.to_owned(),
                field: old.to_owned(),
            });
        }
    }
}

fn apply_action(spec: &mut SchemaSpecification, action: &MigrationAction) -> SchemaResult<()> {
    match action {
        MigrationAction::RenameType {
            kind,
            name,
            new_name,
        } => {
            if type_exists(spec, new_name) {
                return Err(SchemaError::migration(format!(
                    "cannot rename {name} to {new_name}: type already exists"
                )));
            }
            rename_type_references(spec, *kind, name, new_name);
            match kind {
                TypeKind::Entity => {
                    let t = spec
                        .entity_types
                        .iter_mut()
                        .find(|t| t.name == *name)
                        .ok_or_else(|| missing_type(name))?;
                    t.name = new_name.clone();
                }
                TypeKind::Component => {
                    let t = spec
                        .component_types
                        .iter_mut()
                        .find(|t| t.name == *name)
                        .ok_or_else(|| missing_type(name))?;
                    t.name = new_name.clone();
                }
            }
            Ok(())
        }
        MigrationAction::DeleteType { kind, name } => {
            match kind {
                TypeKind::Entity => {
                    let before = spec.entity_types.len();
                    spec.entity_types.retain(|t| t.name != *name);
                    if spec.entity_types.len() == before {
                        return Err(missing_type(name));
                    }
                }
                TypeKind::Component => {
                    let before = spec.component_types.len();
                    spec.component_types.retain(|t| t.name != *name);
                    if spec.component_types.len() == before {
                        return Err(missing_type(name));
                    }
                }
            }
            remove_type_references(spec, *kind, name);
            Ok(())
        }
        MigrationAction::RenameField {
            kind,
            type_name,
            field,
            new_field,
        } => with_type_fields(spec, *kind, type_name, |fields, name_field| {
            if fields.iter().any(|f| f.name == *new_field) {
                return Err(SchemaError::migration(format!(
                    "{type_name}: cannot rename {field} to {new_field}: field already exists"
                )));
            }
            let f = fields
                .iter_mut()
                .find(|f| f.name == *field)
                .ok_or_else(|| missing_field(type_name, field))?;
            f.name = new_field.clone();
            if let Some(nf) = name_field {
                if *nf == *field {
                    *nf = new_field.clone();
                }
            }
            Ok(())
        }),
        MigrationAction::DeleteField {
            kind,
            type_name,
            field,
        } => with_type_fields(spec, *kind, type_name, |fields, name_field| {
            let before = fields.len();
            fields.retain(|f| f.name != *field);
            if fields.len() == before {
                return Err(missing_field(type_name, field));
            }
            if name_field.as_deref() == Some(field.as_str()) {
                *name_field = None;
            }
            Ok(())
        }),
    }
}

fn missing_type(name: &str) -> SchemaError {
    SchemaError::migration(format!("type {name} does not exist"))
}

fn missing_field(type_name: &str, field: &str) -> SchemaError {
    SchemaError::migration(format!("field {type_name}.{field} does not exist"))
}

fn type_exists(spec: &SchemaSpecification, name: &str) -> bool {
    spec.entity_types.iter().any(|t| t.name == name)
        || spec.component_types.iter().any(|t| t.name == name)
}

fn with_type_fields(
    spec: &mut SchemaSpecification,
    kind: TypeKind,
    type_name: &str,
    f: impl FnOnce(&mut Vec<crate::spec::FieldSpec>, &mut Option<String>) -> SchemaResult<()>,
) -> SchemaResult<()> {
    match kind {
        TypeKind::Entity => {
            let t = spec
                .entity_types
                .iter_mut()
                .find(|t| t.name == type_name)
                .ok_or_else(|| missing_type(type_name))?;
            f(&mut t.fields, &mut t.name_field)
        }
        TypeKind::Component => {
            let t = spec
                .component_types
                .iter_mut()
                .find(|t| t.name == type_name)
                .ok_or_else(|| missing_type(type_name))?;
            let mut no_name_field = None;
            f(&mut t.fields, &mut no_name_field)
        }
    }
}

/// Rewrites reference lists in field specs after a type rename.
fn rename_type_references(
    spec: &mut SchemaSpecification,
    kind: TypeKind,
    old_name: &str,
    new_name: &str,
) {
    for_each_field(spec, |field_type| match (kind, field_type) {
        (TypeKind::Entity, FieldType::Reference { entity_types }) => {
            for name in entity_types.iter_mut() {
                if name == old_name {
                    *name = new_name.to_owned();
                }
            }
        }
        (TypeKind::Component, FieldType::Component { component_types }) => {
            for name in component_types.iter_mut() {
                if name == old_name {
                    *name = new_name.to_owned();
                }
            }
        }
        _ => {}
    });
}

fn remove_type_references(spec: &mut SchemaSpecification, kind: TypeKind, name: &str) {
    for_each_field(spec, |field_type| match (kind, field_type) {
        (TypeKind::Entity, FieldType::Reference { entity_types }) => {
            entity_types.retain(|n| n != name);
        }
        (TypeKind::Component, FieldType::Component { component_types }) => {
            component_types.retain(|n| n != name);
        }
        _ => {}
    });
}

fn for_each_field(spec: &mut SchemaSpecification, mut f: impl FnMut(&mut FieldType)) {
    for t in &mut spec.entity_types {
        for field in &mut t.fields {
            f(&mut field.field_type);
        }
    }
    for t in &mut spec.component_types {
        for field in &mut t.fields {
            f(&mut field.field_type);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{EntityTypeSpec, FieldSpec};

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

    fn base_schema() -> Schema {
        Schema::new(SchemaSpecification {
            version: 1,
            entity_types: vec![EntityTypeSpec {
                name: "Post".into(),
                admin_only: false,
                auth_key_pattern: None,
                name_field: Some("title".into()),
                fields: vec![string_field("title"), string_field("summary")],
            }],
            ..SchemaSpecification::empty()
        })
        .unwrap()
    }

    #[test]
    fn empty_update_is_noop() {
        let schema = base_schema();
        let result = schema.apply_update(&SchemaSpecificationUpdate::default()).unwrap();
        assert!(!result.changed);
        assert_eq!(result.schema.version(), 1);
        assert_eq!(result.schema, schema);
    }

    #[test]
    fn identical_type_update_is_noop() {
        let schema = base_schema();
        let update = SchemaSpecificationUpdate {
            entity_types: schema.spec().entity_types.clone(),
            ..Default::default()
        };
        let result = schema.apply_update(&update).unwrap();
        assert!(!result.changed);
        assert_eq!(result.schema.version(), 1);
    }

    #[test]
    fn adding_type_bumps_version() {
        let schema = base_schema();
        let update = SchemaSpecificationUpdate {
            entity_types: vec![EntityTypeSpec {
                name: "Author".into(),
                admin_only: false,
                auth_key_pattern: None,
                name_field: None,
                fields: vec![string_field("name")],
            }],
            ..Default::default()
        };
        let result = schema.apply_update(&update).unwrap();
        assert!(result.changed);
        assert_eq!(result.schema.version(), 2);
        assert!(result.schema.entity_type("Author").is_some());
        assert!(result.schema.entity_type("Post").is_some());
    }

    #[test]
    fn replacing_type_infers_field_deletion() {
        let schema = base_schema();
        let update = SchemaSpecificationUpdate {
            entity_types: vec![EntityTypeSpec {
                name: "Post".into(),
                admin_only: false,
                auth_key_pattern: None,
                name_field: Some("title".into()),
                fields: vec![string_field("title")], // summary dropped
            }],
            ..Default::default()
        };
        let result = schema.apply_update(&update).unwrap();
        assert!(result.changed);
        assert_eq!(
            result.actions,
            vec![MigrationAction::DeleteField {
                kind: TypeKind::Entity,
                type_name: "Post".into(),
                field: "summary".into(),
            }]
        );
        let batches = &result.schema.spec().migrations;
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].version, 2);
    }

    #[test]
    fn rename_type_rewrites_references() {
        let schema = Schema::new(SchemaSpecification {
            version: 1,
            entity_types: vec![
                EntityTypeSpec {
                    name: "Post".into(),
                    admin_only: false,
                    auth_key_pattern: None,
                    name_field: None,
                    fields: vec![FieldSpec {
                        name: "author".into(),
                        list: false,
                        required: false,
                        admin_only: false,
                        field_type: FieldType::Reference {
                            entity_types: vec!["Person".into()],
                        },
                    }],
                },
                EntityTypeSpec {
                    name: "Person".into(),
                    admin_only: false,
                    auth_key_pattern: None,
                    name_field: None,
                    fields: vec![string_field("name")],
                },
            ],
            ..SchemaSpecification::empty()
        })
        .unwrap();

        let update = SchemaSpecificationUpdate {
            migrations: vec![MigrationAction::RenameType {
                kind: TypeKind::Entity,
                name: "Person".into(),
                new_name: "Author".into(),
            }],
            ..Default::default()
        };
        let result = schema.apply_update(&update).unwrap();
        assert_eq!(result.schema.version(), 2);
        assert!(result.schema.entity_type("Author").is_some());
        assert!(result.schema.entity_type("Person").is_none());

        let post = result.schema.entity_type("Post").unwrap();
        match &post.fields[0].field_type {
            FieldType::Reference { entity_types } => {
                assert_eq!(entity_types, &vec!["Author".to_owned()]);
            }
            other => panic!("unexpected field type: {other:?}"),
        }
    }

    #[test]
    fn rename_field_updates_name_field() {
        let schema = base_schema();
        let update = SchemaSpecificationUpdate {
            migrations: vec![MigrationAction::RenameField {
                kind: TypeKind::Entity,
                type_name: "Post".into(),
                field: "title".into(),
                new_field: "headline".into(),
            }],
            ..Default::default()
        };
        let result = schema.apply_update(&update).unwrap();
        let post = result.schema.entity_type("Post").unwrap();
        assert_eq!(post.name_field.as_deref(), Some("headline"));
        assert!(post.field("headline").is_some());
        assert!(post.field("title").is_none());
    }

    #[test]
    fn rename_to_existing_type_fails() {
        let schema = base_schema();
        let update = SchemaSpecificationUpdate {
            migrations: vec![MigrationAction::RenameType {
                kind: TypeKind::Entity,
                name: "Post".into(),
                new_name: "Post".into(),
            }],
            ..Default::default()
        };
        assert!(schema.apply_update(&update).is_err());
    }

    #[test]
    fn delete_missing_field_fails() {
        let schema = base_schema();
        let update = SchemaSpecificationUpdate {
            migrations: vec![MigrationAction::DeleteField {
                kind: TypeKind::Entity,
                type_name: "Post".into(),
                field: "nope".into(),
            }],
            ..Default::default()
        };
        assert!(schema.apply_update(&update).is_err());
    }
}
