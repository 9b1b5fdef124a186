//! Field value model.
//!
//! Field values form a closed tagged union mirroring the schema's field
//! types. The JSON shapes are natural (no explicit tag except for
//! components, whose `type` key doubles as the discriminator), so the
//! union deserializes untagged.

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::richtext::RichText;

/// Field name to value map of an entity or component.
///
/// Ordered so serialized forms are deterministic; null-valued fields are
/// not stored.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// A geographic location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Location {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

/// A reference to another entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityReference {
    /// The referenced entity's id.
    pub id: Uuid,
}

/// An embedded component value: a component type name plus its fields.
///
/// Serialized as a flat object whose `type` key carries the component
/// type name next to the field entries.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentValue {
    /// The component type name.
    pub component_type: String,
    /// The component's field values.
    pub fields: FieldMap,
}

impl Serialize for ComponentValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry("type", &self.component_type)?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ComponentValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut fields = FieldMap::deserialize(deserializer)?;
        match fields.remove("type") {
            Some(FieldValue::String(component_type)) => Ok(Self {
                component_type,
                fields,
            }),
            _ => Err(D::Error::missing_field("type")),
        }
    }
}

/// A field value.
///
/// The variant order matters for deserialization: the object-shaped
/// variants with fixed key sets (`Location`, `Reference`, `RichText`)
/// are tried before `Component`, which accepts any object carrying a
/// `type` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Absent value.
    Null,
    /// Boolean value.
    Boolean(bool),
    /// Numeric value.
    Number(f64),
    /// String value.
    String(String),
    /// Geographic location.
    Location(Location),
    /// Entity reference.
    Reference(EntityReference),
    /// Rich-text document.
    RichText(RichText),
    /// Embedded component.
    Component(ComponentValue),
    /// List of values (never nested).
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// True for the null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}
