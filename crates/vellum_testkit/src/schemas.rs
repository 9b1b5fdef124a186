//! Ready-made schema specifications.
//!
//! Two shapes cover most tests: a minimal single-type schema and a
//! larger one exercising patterns, unique indexes, references,
//! components and admin-only visibility.

use vellum_schema::{
    ComponentTypeSpec, EntityTypeSpec, FieldSpec, FieldType, IndexSpec, IndexType, PatternSpec,
    SchemaSpecificationUpdate,
};

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

fn required(mut field: FieldSpec) -> FieldSpec {
    field.required = true;
    field
}

/// A minimal schema: one `TitleOnly` entity type whose name derives from
/// its required `title` field.
pub fn title_only_update() -> SchemaSpecificationUpdate {
    SchemaSpecificationUpdate {
        entity_types: vec![EntityTypeSpec {
            name: "TitleOnly".into(),
            admin_only: false,
            auth_key_pattern: None,
            name_field: Some("title".into()),
            fields: vec![required(string_field("title"))],
        }],
        ..SchemaSpecificationUpdate::default()
    }
}

/// A schema exercising the full field surface.
///
/// `Article` carries a pattern-checked, unique-indexed `slug`, rich text,
/// references, lists, a component field and an admin-only note. `Author`
/// is a plain secondary type and `Secret` is admin-only, so it vanishes
/// from the published view.
pub fn publishing_update() -> SchemaSpecificationUpdate {
    SchemaSpecificationUpdate {
        entity_types: vec![
            EntityTypeSpec {
                name: "Article".into(),
                admin_only: false,
                auth_key_pattern: None,
                name_field: Some("title".into()),
                fields: vec![
                    required(string_field("title")),
                    FieldSpec {
                        name: "slug".into(),
                        list: false,
                        required: false,
                        admin_only: false,
                        field_type: FieldType::String {
                            match_pattern: Some("slug".into()),
                            index: Some("slug".into()),
                        },
                    },
                    string_field("summary"),
                    FieldSpec {
                        name: "body".into(),
                        list: false,
                        required: false,
                        admin_only: false,
                        field_type: FieldType::RichText,
                    },
                    FieldSpec {
                        name: "rating".into(),
                        list: false,
                        required: false,
                        admin_only: false,
                        field_type: FieldType::Number { integer: false },
                    },
                    FieldSpec {
                        name: "note".into(),
                        list: false,
                        required: false,
                        admin_only: true,
                        field_type: FieldType::String {
                            match_pattern: None,
                            index: None,
                        },
                    },
                    FieldSpec {
                        name: "location".into(),
                        list: false,
                        required: false,
                        admin_only: false,
                        field_type: FieldType::Location,
                    },
                    FieldSpec {
                        name: "related".into(),
                        list: false,
                        required: false,
                        admin_only: false,
                        field_type: FieldType::Reference {
                            entity_types: vec!["Article".into()],
                        },
                    },
                    FieldSpec {
                        name: "tags".into(),
                        list: true,
                        required: false,
                        admin_only: false,
                        field_type: FieldType::String {
                            match_pattern: None,
                            index: None,
                        },
                    },
                    FieldSpec {
                        name: "infobox".into(),
                        list: false,
                        required: false,
                        admin_only: false,
                        field_type: FieldType::Component {
                            component_types: vec!["Infobox".into()],
                        },
                    },
                ],
            },
            EntityTypeSpec {
                name: "Author".into(),
                admin_only: false,
                auth_key_pattern: None,
                name_field: None,
                fields: vec![required(string_field("name")), string_field("bio")],
            },
            EntityTypeSpec {
                name: "Secret".into(),
                admin_only: true,
                auth_key_pattern: None,
                name_field: None,
                fields: vec![string_field("label")],
            },
        ],
        component_types: vec![
            ComponentTypeSpec {
                name: "Infobox".into(),
                admin_only: false,
                fields: vec![required(string_field("heading")), string_field("body")],
            },
            ComponentTypeSpec {
                name: "Callout".into(),
                admin_only: false,
                fields: vec![string_field("text")],
            },
        ],
        patterns: vec![PatternSpec {
            name: "slug".into(),
            pattern: "^[a-z0-9-]+$".into(),
        }],
        indexes: vec![IndexSpec {
            name: "slug".into(),
            index_type: IndexType::Unique,
        }],
        migrations: Vec::new(),
    }
}
