//! Field value builders for test content.

use uuid::Uuid;
use vellum_core::{
    ComponentValue, CreateEntityRequest, EntityReference, FieldMap, FieldValue, Location, RichText,
};

/// Builds a field map from `(name, value)` pairs.
pub fn fields<const N: usize>(entries: [(&str, FieldValue); N]) -> FieldMap {
    entries
        .into_iter()
        .map(|(name, value)| (name.to_owned(), value))
        .collect()
}

/// A string field value.
pub fn text(value: impl Into<String>) -> FieldValue {
    FieldValue::String(value.into())
}

/// A numeric field value.
pub fn number(value: f64) -> FieldValue {
    FieldValue::Number(value)
}

/// A boolean field value.
pub fn boolean(value: bool) -> FieldValue {
    FieldValue::Boolean(value)
}

/// A location field value.
pub fn location(lat: f64, lng: f64) -> FieldValue {
    FieldValue::Location(Location { lat, lng })
}

/// A reference field value.
pub fn reference(id: Uuid) -> FieldValue {
    FieldValue::Reference(EntityReference { id })
}

/// A single-paragraph rich-text field value.
pub fn rich_text(text: impl Into<String>) -> FieldValue {
    FieldValue::RichText(RichText::from_text(text))
}

/// A component field value.
pub fn component<const N: usize>(
    component_type: &str,
    entries: [(&str, FieldValue); N],
) -> FieldValue {
    FieldValue::Component(ComponentValue {
        component_type: component_type.to_owned(),
        fields: fields(entries),
    })
}

/// A string-list field value.
pub fn tags<const N: usize>(values: [&str; N]) -> FieldValue {
    FieldValue::List(values.into_iter().map(text).collect())
}

/// Parses a field map from inline JSON.
///
/// # Panics
///
/// Panics when the JSON does not describe a field map.
pub fn json_fields(json: serde_json::Value) -> FieldMap {
    serde_json::from_value(json).expect("invalid field map json")
}

/// A create request for the `TitleOnly` test type.
pub fn title_only_entity(title: &str) -> CreateEntityRequest {
    CreateEntityRequest {
        entity_type: "TitleOnly".into(),
        fields: fields([("title", text(title))]),
        ..CreateEntityRequest::default()
    }
}

/// A create request for an `Article` with a title and a slug.
pub fn article_entity(title: &str, slug: &str) -> CreateEntityRequest {
    CreateEntityRequest {
        entity_type: "Article".into(),
        fields: fields([("title", text(title)), ("slug", text(slug))]),
        ..CreateEntityRequest::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_fields_match_builders() {
        let built = fields([
            ("title", text("Hi")),
            ("rating", number(4.5)),
            ("tags", tags(["a", "b"])),
        ]);
        let parsed = json_fields(serde_json::json!({
            "title": "Hi",
            "rating": 4.5,
            "tags": ["a", "b"],
        }));
        assert_eq!(built, parsed);
    }

    #[test]
    fn component_builder_shape() {
        let value = component("Infobox", [("heading", text("Facts"))]);
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json["type"], "Infobox");
        assert_eq!(json["heading"], "Facts");
    }
}
