//! Declarative index mapping

use serde_json::{json, Map, Value};

/// Storage/query type of one mapped field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldMapping {
    /// Exact-match term, not analyzed
    Keyword,
    /// Exact-match term array kept in the stored fields
    StoredKeyword,
    /// 16-bit integer
    Short,
    /// Sub-object resolved from a related entity
    Object { properties: Vec<(String, FieldMapping)> },
    /// Prefix completion with payloads
    Completion {
        analyzer: String,
        payloads: bool,
        preserve_separators: bool,
        preserve_position_increments: bool,
        max_input_length: u32,
    },
}

impl FieldMapping {
    pub fn is_object(&self) -> bool {
        matches!(self, FieldMapping::Object { .. })
    }

    /// Declared sub-properties of an object field
    pub fn properties(&self) -> &[(String, FieldMapping)] {
        match self {
            FieldMapping::Object { properties } => properties,
            _ => &[],
        }
    }

    /// Engine JSON for this field
    pub fn to_json(&self) -> Value {
        match self {
            FieldMapping::Keyword => json!({ "type": "keyword" }),
            FieldMapping::StoredKeyword => json!({ "type": "keyword", "store": true }),
            FieldMapping::Short => json!({ "type": "short" }),
            FieldMapping::Object { properties } => json!({
                "type": "object",
                "properties": properties_json(properties),
            }),
            FieldMapping::Completion {
                analyzer,
                payloads,
                preserve_separators,
                preserve_position_increments,
                max_input_length,
            } => json!({
                "type": "completion",
                "analyzer": analyzer,
                "payloads": payloads,
                "preserve_separators": preserve_separators,
                "preserve_position_increments": preserve_position_increments,
                "max_input_length": max_input_length,
            }),
        }
    }
}

fn properties_json(properties: &[(String, FieldMapping)]) -> Value {
    let mut map = Map::new();
    for (name, field) in properties {
        map.insert(name.clone(), field.to_json());
    }
    Value::Object(map)
}

/// Ordered field declarations of one document type
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndexMapping {
    fields: Vec<(String, FieldMapping)>,
}

impl IndexMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field; a later declaration with the same name replaces it
    pub fn field(mut self, name: impl Into<String>, mapping: FieldMapping) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = mapping,
            None => self.fields.push((name, mapping)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldMapping> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, mapping)| mapping)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldMapping)> {
        self.fields.iter().map(|(name, mapping)| (name.as_str(), mapping))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Body for a put-mapping request
    pub fn to_json(&self) -> Value {
        json!({ "properties": properties_json(&self.fields) })
    }
}

/// Mapping of the student document
pub fn student_mapping() -> IndexMapping {
    IndexMapping::new()
        .field(
            "university",
            FieldMapping::Object {
                properties: vec![("name".to_string(), FieldMapping::Keyword)],
            },
        )
        .field("first_name", FieldMapping::Keyword)
        .field("last_name", FieldMapping::Keyword)
        .field("age", FieldMapping::Short)
        .field("year_in_school", FieldMapping::Keyword)
        .field(
            "name_complete",
            FieldMapping::Completion {
                analyzer: "simple".to_string(),
                payloads: true,
                preserve_separators: true,
                preserve_position_increments: true,
                max_input_length: 50,
            },
        )
        .field("course_names", FieldMapping::StoredKeyword)
}
