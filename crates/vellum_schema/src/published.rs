//! Published-view derivation.

use crate::error::SchemaResult;
use crate::schema::Schema;
use crate::spec::FieldType;

impl Schema {
    /// Derives the published-side schema.
    ///
    /// Drops admin-only entity and component types and admin-only fields,
    /// and prunes reference lists that mention dropped types. The result
    /// keeps the same version number: it is a filtered view, not a new
    /// schema revision. Used for published-side traversal and validation.
    pub fn to_published(&self) -> SchemaResult<Schema> {
        let mut spec = self.spec().clone();

        spec.entity_types.retain(|t| !t.admin_only);
        spec.component_types.retain(|t| !t.admin_only);
        for t in &mut spec.entity_types {
            t.fields.retain(|f| !f.admin_only);
            if let Some(name_field) = &t.name_field {
                if !t.fields.iter().any(|f| f.name == *name_field) {
                    t.name_field = None;
                }
            }
        }
        for t in &mut spec.component_types {
            t.fields.retain(|f| !f.admin_only);
        }

        let entity_names: Vec<String> = spec.entity_types.iter().map(|t| t.name.clone()).collect();
        let component_names: Vec<String> =
            spec.component_types.iter().map(|t| t.name.clone()).collect();
        for t in &mut spec.entity_types {
            prune_references(&mut t.fields, &entity_names, &component_names);
        }
        for t in &mut spec.component_types {
            prune_references(&mut t.fields, &entity_names, &component_names);
        }

        Schema::new(spec)
    }
}

fn prune_references(
    fields: &mut [crate::spec::FieldSpec],
    entity_names: &[String],
    component_names: &[String],
) {
    for field in fields {
        match &mut field.field_type {
            FieldType::Reference { entity_types } => {
                entity_types.retain(|n| entity_names.contains(n));
            }
            FieldType::Component { component_types } => {
                component_types.retain(|n| component_names.contains(n));
            }
            _ => {}
        }
    }
}
