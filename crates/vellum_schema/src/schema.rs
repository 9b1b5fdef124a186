//! The validated schema wrapper.

use regex::Regex;
use std::collections::HashMap;

use crate::error::{SchemaError, SchemaResult};
use crate::spec::{
    ComponentTypeSpec, EntityTypeSpec, IndexSpec, IndexType, MigrationAction, SchemaSpecification,
    TypeKind,
};
use crate::validate::validate_spec;

/// A validated, immutable schema.
///
/// Wraps a [`SchemaSpecification`] with derived lookup tables and compiled
/// patterns. Construction fails if the specification is invalid, so every
/// `Schema` in circulation is known-good. Cached by version number by the
/// repository facade.
#[derive(Debug, Clone)]
pub struct Schema {
    spec: SchemaSpecification,
    entity_types: HashMap<String, usize>,
    component_types: HashMap<String, usize>,
    indexes: HashMap<String, usize>,
    patterns: HashMap<String, Regex>,
}

impl Schema {
    /// Validates a specification and builds the schema.
    pub fn new(spec: SchemaSpecification) -> SchemaResult<Self> {
        validate_spec(&spec)?;

        let entity_types = spec
            .entity_types
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.clone(), i))
            .collect();
        let component_types = spec
            .component_types
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.clone(), i))
            .collect();
        let indexes = spec
            .indexes
            .iter()
            .enumerate()
            .map(|(i, x)| (x.name.clone(), i))
            .collect();
        let mut patterns = HashMap::new();
        for p in &spec.patterns {
            // validate_spec already checked the regex compiles
            let regex = Regex::new(&p.pattern)
                .map_err(|e| SchemaError::validation(format!("pattern {}: {e}", p.name)))?;
            patterns.insert(p.name.clone(), regex);
        }

        Ok(Self {
            spec,
            entity_types,
            component_types,
            indexes,
            patterns,
        })
    }

    /// The empty version-0 schema.
    pub fn empty() -> Self {
        Self::new(SchemaSpecification::empty()).expect("empty specification is valid")
    }

    /// Returns the underlying specification.
    pub fn spec(&self) -> &SchemaSpecification {
        &self.spec
    }

    /// Returns the schema version.
    pub fn version(&self) -> u32 {
        self.spec.version
    }

    /// Looks up an entity type by name.
    pub fn entity_type(&self, name: &str) -> Option<&EntityTypeSpec> {
        self.entity_types.get(name).map(|&i| &self.spec.entity_types[i])
    }

    /// Looks up a component type by name.
    pub fn component_type(&self, name: &str) -> Option<&ComponentTypeSpec> {
        self.component_types
            .get(name)
            .map(|&i| &self.spec.component_types[i])
    }

    /// Looks up an index by name.
    pub fn index(&self, name: &str) -> Option<&IndexSpec> {
        self.indexes.get(name).map(|&i| &self.spec.indexes[i])
    }

    /// True if `name` is a unique index.
    pub fn is_unique_index(&self, name: &str) -> bool {
        matches!(
            self.index(name),
            Some(IndexSpec {
                index_type: IndexType::Unique,
                ..
            })
        )
    }

    /// Looks up a compiled pattern by name.
    pub fn pattern(&self, name: &str) -> Option<&Regex> {
        self.patterns.get(name)
    }

    /// Returns the ordered migration actions recorded after `version`.
    ///
    /// Used to transform field data stored under an older schema version
    /// lazily at read time.
    pub fn actions_since_version(&self, version: u32) -> Vec<&MigrationAction> {
        self.spec
            .migrations
            .iter()
            .filter(|batch| batch.version > version)
            .flat_map(|batch| batch.actions.iter())
            .collect()
    }

    /// Resolves what a type written under schema `version` is called now.
    ///
    /// Follows rename chains recorded after `version`; returns `None` if
    /// the type was deleted along the way.
    pub fn type_name_since_version(
        &self,
        kind: TypeKind,
        version: u32,
        name: &str,
    ) -> Option<String> {
        let mut current = name.to_owned();
        for action in self.actions_since_version(version) {
            match action {
                MigrationAction::RenameType {
                    kind: k,
                    name,
                    new_name,
                } if *k == kind && *name == current => {
                    current = new_name.clone();
                }
                MigrationAction::DeleteType { kind: k, name } if *k == kind && *name == current => {
                    return None;
                }
                _ => {}
            }
        }
        Some(current)
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.spec == other.spec
    }
}
