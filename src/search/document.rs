//! Document projection
//!
//! A [`DocumentProjector`] walks the fields of an [`IndexMapping`] and asks,
//! for each one: is there a registered strategy, is it an object resolved
//! from a related entity, or is it a plain attribute? The strategy table is
//! explicit and inspectable.

use crate::models::{RecordKey, StudentRecord};
use crate::search::error::ProjectionError;
use crate::search::mapping::{student_mapping, IndexMapping};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Related entity reachable from a record
pub trait RelatedEntity {
    /// Read a declared property
    fn property(&self, name: &str) -> Option<Value>;
}

/// Relation state of a record for one field
pub enum Relation<'a> {
    /// Reference set
    Present(&'a dyn RelatedEntity),
    /// Reference is null
    Absent,
}

/// A record the projector can read
pub trait Projectable {
    /// Primary key the document is stored under
    fn key(&self) -> RecordKey;

    /// Plain attribute by name
    fn attribute(&self, name: &str) -> Option<Value>;

    /// Single-valued relation by field name; `None` when no such relation exists
    fn relation(&self, name: &str) -> Option<Relation<'_>>;
}

/// Custom projection for one field
pub type ProjectionStrategy<R> = Arc<dyn Fn(&R) -> Result<Value, ProjectionError> + Send + Sync>;

/// Derived, replaceable projection of one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    /// Key of the source record
    pub key: RecordKey,

    /// Projected fields in mapping order
    pub fields: Map<String, Value>,
}

impl IndexDocument {
    pub fn new(key: RecordKey, fields: Map<String, Value>) -> Self {
        Self { key, fields }
    }

    /// Engine id
    pub fn id(&self) -> String {
        self.key.to_string()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Document body without the key
    pub fn source(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

/// Converts records into index documents
pub struct DocumentProjector<R> {
    mapping: IndexMapping,
    strategies: BTreeMap<String, ProjectionStrategy<R>>,
}

impl<R> fmt::Debug for DocumentProjector<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentProjector")
            .field("mapping", &self.mapping)
            .field("strategies", &self.strategies.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<R: Projectable> DocumentProjector<R> {
    pub fn new(mapping: IndexMapping) -> Self {
        Self {
            mapping,
            strategies: BTreeMap::new(),
        }
    }

    /// Register a custom strategy for a field
    pub fn with_strategy<F>(mut self, field: impl Into<String>, strategy: F) -> Self
    where
        F: Fn(&R) -> Result<Value, ProjectionError> + Send + Sync + 'static,
    {
        self.strategies.insert(field.into(), Arc::new(strategy));
        self
    }

    pub fn mapping(&self) -> &IndexMapping {
        &self.mapping
    }

    /// Fields with a custom strategy
    pub fn strategy_fields(&self) -> impl Iterator<Item = &str> {
        self.strategies.keys().map(String::as_str)
    }

    pub fn has_strategy(&self, field: &str) -> bool {
        self.strategies.contains_key(field)
    }

    /// Project every mapped field of a record
    pub fn project(&self, record: &R) -> Result<IndexDocument, ProjectionError> {
        let mut fields = Map::new();
        for (name, _) in self.mapping.fields() {
            fields.insert(name.to_string(), self.project_field(record, name)?);
        }
        Ok(IndexDocument::new(record.key(), fields))
    }

    /// Project a single mapped field
    pub fn project_field(&self, record: &R, field: &str) -> Result<Value, ProjectionError> {
        let mapping = self
            .mapping
            .get(field)
            .ok_or_else(|| ProjectionError::UnknownField(field.to_string()))?;

        if let Some(strategy) = self.strategies.get(field) {
            return strategy(record);
        }

        if mapping.is_object() {
            return match record.relation(field) {
                Some(Relation::Present(related)) => {
                    let mut object = Map::new();
                    for (property, _) in mapping.properties() {
                        let value = related.property(property).unwrap_or(Value::Null);
                        object.insert(property.clone(), value);
                    }
                    Ok(Value::Object(object))
                }
                Some(Relation::Absent) => Ok(Value::Null),
                None => Err(ProjectionError::UnknownField(field.to_string())),
            };
        }

        record
            .attribute(field)
            .ok_or_else(|| ProjectionError::UnknownField(field.to_string()))
    }
}

// ============================================================================
// Student projection
// ============================================================================

impl RelatedEntity for crate::models::University {
    fn property(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(json!(self.id)),
            "name" => Some(json!(self.name)),
            _ => None,
        }
    }
}

impl Projectable for StudentRecord {
    fn key(&self) -> RecordKey {
        self.student.id
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        let student = &self.student;
        match name {
            "id" => Some(json!(student.id)),
            "first_name" => Some(json!(student.first_name)),
            "last_name" => Some(json!(student.last_name)),
            "age" => Some(json!(student.age)),
            "year_in_school" => Some(json!(student.year_in_school.to_string())),
            _ => None,
        }
    }

    fn relation(&self, name: &str) -> Option<Relation<'_>> {
        match name {
            "university" => Some(match &self.university {
                Some(university) => Relation::Present(university),
                None => Relation::Absent,
            }),
            _ => None,
        }
    }
}

/// Completion entry combining both name parts, carrying the key as payload
pub fn project_name_complete(record: &StudentRecord) -> Result<Value, ProjectionError> {
    let student = &record.student;
    if student.first_name.trim().is_empty() || student.last_name.trim().is_empty() {
        return Err(ProjectionError::InvalidValue {
            field: "name_complete".to_string(),
            reason: "completion input requires both name parts".to_string(),
        });
    }
    Ok(json!({
        "input": [student.first_name, student.last_name],
        "output": student.full_name(),
        "payload": { "id": student.id },
    }))
}

/// Display names of the enrolled courses
pub fn project_course_names(record: &StudentRecord) -> Result<Value, ProjectionError> {
    Ok(Value::Array(
        record.courses.iter().map(|course| json!(course.name)).collect(),
    ))
}

/// Projector for student documents with its strategy table
pub fn student_projector() -> DocumentProjector<StudentRecord> {
    DocumentProjector::new(student_mapping())
        .with_strategy("name_complete", project_name_complete)
        .with_strategy("course_names", project_course_names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Course, Student, University, YearInSchool};
    use crate::search::mapping::FieldMapping;

    fn record() -> StudentRecord {
        StudentRecord {
            student: Student::new(7, "Ada", "Lovelace", 19, YearInSchool::FR)
                .with_university(1)
                .with_courses([10, 11]),
            university: Some(University::new(1, "MIT")),
            courses: vec![Course::new(10, "CS101"), Course::new(11, "MATH201")],
        }
    }

    #[test]
    fn test_project_student() {
        let doc = student_projector().project(&record()).unwrap();

        assert_eq!(doc.key, 7);
        assert_eq!(doc.id(), "7");
        assert_eq!(doc.get("university"), Some(&json!({"name": "MIT"})));
        assert_eq!(doc.get("first_name"), Some(&json!("Ada")));
        assert_eq!(doc.get("age"), Some(&json!(19)));
        assert_eq!(doc.get("year_in_school"), Some(&json!("FR")));
        assert_eq!(doc.get("course_names"), Some(&json!(["CS101", "MATH201"])));
        assert_eq!(
            doc.get("name_complete"),
            Some(&json!({
                "input": ["Ada", "Lovelace"],
                "output": "Ada Lovelace",
                "payload": {"id": 7}
            }))
        );
        assert!(doc.get("id").is_none());
    }

    #[test]
    fn test_project_is_deterministic() {
        let projector = student_projector();
        let record = record();
        assert_eq!(projector.project(&record).unwrap(), projector.project(&record).unwrap());
    }

    #[test]
    fn test_null_references_do_not_error() {
        let record = StudentRecord {
            student: Student::new(8, "Grace", "Hopper", 20, YearInSchool::SO),
            university: None,
            courses: vec![],
        };
        let doc = student_projector().project(&record).unwrap();

        assert_eq!(doc.get("university"), Some(&Value::Null));
        assert_eq!(doc.get("course_names"), Some(&json!([])));
    }

    #[test]
    fn test_blank_name_is_a_projection_error() {
        let mut record = record();
        record.student.last_name = " ".to_string();
        let err = student_projector().project(&record).unwrap_err();
        assert!(matches!(err, ProjectionError::InvalidValue { ref field, .. } if field == "name_complete"));
    }

    #[test]
    fn test_unmapped_attribute_is_unknown_field() {
        let projector = DocumentProjector::<StudentRecord>::new(
            student_mapping().field("shoe_size", FieldMapping::Short),
        );
        let err = projector.project(&record()).unwrap_err();
        assert_eq!(err, ProjectionError::UnknownField("name_complete".to_string()));

        let err = projector.project_field(&record(), "shoe_size").unwrap_err();
        assert_eq!(err, ProjectionError::UnknownField("shoe_size".to_string()));
    }

    #[test]
    fn test_project_single_field() {
        let projector = student_projector();
        assert_eq!(
            projector.project_field(&record(), "university").unwrap(),
            json!({"name": "MIT"})
        );
        assert!(projector.project_field(&record(), "missing").is_err());
    }

    #[test]
    fn test_strategy_table_is_inspectable() {
        let projector = student_projector();
        let fields: Vec<&str> = projector.strategy_fields().collect();
        assert_eq!(fields, vec!["course_names", "name_complete"]);
        assert!(!projector.has_strategy("university"));
    }
}
