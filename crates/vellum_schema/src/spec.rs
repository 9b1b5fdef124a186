//! Schema specification types.
//!
//! A [`SchemaSpecification`] is an immutable, versioned snapshot. Updates
//! never mutate a specification in place; they produce a new one with a
//! higher version (see [`crate::Schema::apply_update`]).

use serde::{Deserialize, Serialize};

/// A versioned schema snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaSpecification {
    /// Schema version. Only ever increases.
    pub version: u32,
    /// Entity type specifications.
    #[serde(default)]
    pub entity_types: Vec<EntityTypeSpec>,
    /// Component type specifications.
    #[serde(default)]
    pub component_types: Vec<ComponentTypeSpec>,
    /// Named regex patterns.
    #[serde(default)]
    pub patterns: Vec<PatternSpec>,
    /// Named indexes.
    #[serde(default)]
    pub indexes: Vec<IndexSpec>,
    /// Append-only migration log, batched by the schema version that
    /// introduced each batch.
    #[serde(default)]
    pub migrations: Vec<MigrationBatch>,
}

impl SchemaSpecification {
    /// The empty version-0 specification.
    pub fn empty() -> Self {
        Self {
            version: 0,
            entity_types: Vec::new(),
            component_types: Vec::new(),
            patterns: Vec::new(),
            indexes: Vec::new(),
            migrations: Vec::new(),
        }
    }
}

/// Specification of an entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityTypeSpec {
    /// Type name (PascalCase).
    pub name: String,
    /// Admin-only types are dropped from the published view.
    #[serde(default)]
    pub admin_only: bool,
    /// Pattern name the entity's authorization key must match.
    #[serde(default)]
    pub auth_key_pattern: Option<String>,
    /// Field whose value provides the entity name.
    #[serde(default)]
    pub name_field: Option<String>,
    /// Ordered field list.
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

impl EntityTypeSpec {
    /// Looks up a field spec by name.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Specification of a component type (a nested, non-entity structured
/// value embeddable in fields or rich text).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentTypeSpec {
    /// Type name (PascalCase).
    pub name: String,
    /// Admin-only types are dropped from the published view.
    #[serde(default)]
    pub admin_only: bool,
    /// Ordered field list.
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

impl ComponentTypeSpec {
    /// Looks up a field spec by name.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Specification of one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    /// Field name (camelCase).
    pub name: String,
    /// Whether the field holds a list of values.
    #[serde(default)]
    pub list: bool,
    /// Required fields must be non-null when publishing.
    #[serde(default)]
    pub required: bool,
    /// Admin-only fields are dropped from the published view.
    #[serde(default)]
    pub admin_only: bool,
    /// The field's value type.
    #[serde(flatten)]
    pub field_type: FieldType,
}

/// The closed set of field value types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FieldType {
    /// Boolean value.
    Boolean,
    /// String value.
    #[serde(rename_all = "camelCase")]
    String {
        /// Pattern name values must match.
        #[serde(default)]
        match_pattern: Option<String>,
        /// Index name the values feed.
        #[serde(default)]
        index: Option<String>,
    },
    /// Numeric value.
    #[serde(rename_all = "camelCase")]
    Number {
        /// Restrict to integral values.
        #[serde(default)]
        integer: bool,
    },
    /// Geographic location.
    Location,
    /// Rich-text document tree.
    RichText,
    /// Reference to another entity.
    #[serde(rename_all = "camelCase")]
    Reference {
        /// Allowed entity types; empty means any.
        #[serde(default)]
        entity_types: Vec<String>,
    },
    /// Embedded component value.
    #[serde(rename_all = "camelCase")]
    Component {
        /// Allowed component types; empty means any.
        #[serde(default)]
        component_types: Vec<String>,
    },
}

impl FieldType {
    /// Human-readable type name for error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Boolean => "Boolean",
            Self::String { .. } => "String",
            Self::Number { .. } => "Number",
            Self::Location => "Location",
            Self::RichText => "RichText",
            Self::Reference { .. } => "Reference",
            Self::Component { .. } => "Component",
        }
    }
}

/// A named regex pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternSpec {
    /// Pattern name (camelCase).
    pub name: String,
    /// The regex source.
    pub pattern: String,
}

/// A named index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSpec {
    /// Index name (camelCase).
    pub name: String,
    /// Index kind.
    #[serde(rename = "type")]
    pub index_type: IndexType,
}

/// Kind of a named index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IndexType {
    /// Values are unique across entities.
    Unique,
    /// Plain lookup index.
    Generic,
}

/// Migration actions introduced by one schema version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationBatch {
    /// The schema version that introduced these actions.
    pub version: u32,
    /// Ordered actions.
    pub actions: Vec<MigrationAction>,
}

/// Whether a migration action targets an entity type or a component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TypeKind {
    /// An entity type.
    Entity,
    /// A component type.
    Component,
}

/// A structural migration action.
///
/// Actions are replayed, never mutated: stored field data is transformed
/// lazily at read time by applying the actions recorded after the schema
/// version the data was written under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum MigrationAction {
    /// Renames a type.
    #[serde(rename_all = "camelCase")]
    RenameType {
        /// Target namespace.
        kind: TypeKind,
        /// Current type name.
        name: String,
        /// New type name.
        new_name: String,
    },
    /// Deletes a type.
    #[serde(rename_all = "camelCase")]
    DeleteType {
        /// Target namespace.
        kind: TypeKind,
        /// Type name to delete.
        name: String,
    },
    /// Renames a field of a type.
    #[serde(rename_all = "camelCase")]
    RenameField {
        /// Target namespace.
        kind: TypeKind,
        /// Owning type name.
        type_name: String,
        /// Current field name.
        field: String,
        /// New field name.
        new_field: String,
    },
    /// Deletes a field of a type.
    #[serde(rename_all = "camelCase")]
    DeleteField {
        /// Target namespace.
        kind: TypeKind,
        /// Owning type name.
        type_name: String,
        /// Field name to delete.
        field: String,
    },
}

/// A partial schema update, merged into the previous specification by
/// [`crate::Schema::apply_update`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaSpecificationUpdate {
    /// Entity types to add or replace (matched by name).
    #[serde(default)]
    pub entity_types: Vec<EntityTypeSpec>,
    /// Component types to add or replace (matched by name).
    #[serde(default)]
    pub component_types: Vec<ComponentTypeSpec>,
    /// Patterns to add or replace (matched by name).
    #[serde(default)]
    pub patterns: Vec<PatternSpec>,
    /// Indexes to add or replace (matched by name).
    #[serde(default)]
    pub indexes: Vec<IndexSpec>,
    /// Structural migration actions to apply before merging.
    #[serde(default)]
    pub migrations: Vec<MigrationAction>,
}

impl SchemaSpecificationUpdate {
    /// True if the update requests no change at all.
    pub fn is_empty(&self) -> bool {
        self.entity_types.is_empty()
            && self.component_types.is_empty()
            && self.patterns.is_empty()
            && self.indexes.is_empty()
            && self.migrations.is_empty()
    }
}
