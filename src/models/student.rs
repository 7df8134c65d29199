use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strum::{Display, EnumString};
use validator::{Validate, ValidationError};

/// Separator between values of one facet in request parameters
pub const FACET_VALUE_SEPARATOR: char = ',';

/// Primary key of a relational row
pub type RecordKey = i64;

/// Year-in-school code
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, EnumString, Display)]
pub enum YearInSchool {
    FR, // Freshman
    SO, // Sophomore
    JR, // Junior
    SR, // Senior
}

impl YearInSchool {
    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            YearInSchool::FR => "Freshman",
            YearInSchool::SO => "Sophomore",
            YearInSchool::JR => "Junior",
            YearInSchool::SR => "Senior",
        }
    }
}

/// Names that become facet values must survive the comma-joined filter
/// encoding, so they may not contain the separator or surrounding whitespace.
pub fn validate_facet_value(value: &str) -> Result<(), ValidationError> {
    if value.contains(FACET_VALUE_SEPARATOR) {
        let mut error = ValidationError::new("facet_separator");
        error.message = Some("must not contain ','".into());
        return Err(error);
    }
    if value.trim() != value {
        let mut error = ValidationError::new("facet_whitespace");
        error.message = Some("must not start or end with whitespace".into());
        return Err(error);
    }
    Ok(())
}

/// Owner entity referenced by at most one university per student
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct University {
    pub id: RecordKey,

    #[validate(length(min = 1, max = 255), custom(function = "validate_facet_value"))]
    pub name: String,
}

impl University {
    pub fn new(id: RecordKey, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }
}

/// Tag entity a student can be enrolled in
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct Course {
    pub id: RecordKey,

    #[validate(length(min = 1, max = 255), custom(function = "validate_facet_value"))]
    pub name: String,
}

impl Course {
    pub fn new(id: RecordKey, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }
}

/// Authoritative student row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct Student {
    /// Primary key
    pub id: RecordKey,

    #[validate(length(min = 1, max = 50))]
    pub first_name: String,

    #[validate(length(min = 1, max = 50))]
    pub last_name: String,

    #[validate(range(min = 1, max = 100))]
    pub age: i16,

    pub year_in_school: YearInSchool,

    /// Owning university, if any
    pub university_id: Option<RecordKey>,

    /// Enrolled courses
    pub course_ids: BTreeSet<RecordKey>,
}

impl Student {
    /// Create a student with no university and no courses
    pub fn new(
        id: RecordKey,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        age: i16,
        year_in_school: YearInSchool,
    ) -> Self {
        Self {
            id,
            first_name: first_name.into(),
            last_name: last_name.into(),
            age,
            year_in_school,
            university_id: None,
            course_ids: BTreeSet::new(),
        }
    }

    pub fn with_university(mut self, university_id: RecordKey) -> Self {
        self.university_id = Some(university_id);
        self
    }

    pub fn with_courses(mut self, course_ids: impl IntoIterator<Item = RecordKey>) -> Self {
        self.course_ids = course_ids.into_iter().collect();
        self
    }

    /// "First Last"
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A student with its references resolved against the relational store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StudentRecord {
    pub student: Student,
    pub university: Option<University>,
    /// Resolved courses, ordered by course id
    pub courses: Vec<Course>,
}

impl StudentRecord {
    pub fn key(&self) -> RecordKey {
        self.student.id
    }
}

/// Kind of a referenced entity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
    /// Single-valued owner reference
    University,
    /// Multi-valued tag membership
    Course,
}

/// A referenced entity that was created or changed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReferencedEntity {
    University(University),
    Course(Course),
}

impl ReferencedEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            ReferencedEntity::University(_) => EntityKind::University,
            ReferencedEntity::Course(_) => EntityKind::Course,
        }
    }

    pub fn key(&self) -> RecordKey {
        match self {
            ReferencedEntity::University(u) => u.id,
            ReferencedEntity::Course(c) => c.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ReferencedEntity::University(u) => &u.name,
            ReferencedEntity::Course(c) => &c.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_year_in_school_codes() {
        assert_eq!(YearInSchool::from_str("JR").unwrap(), YearInSchool::JR);
        assert_eq!(YearInSchool::SO.to_string(), "SO");
        assert_eq!(YearInSchool::SR.label(), "Senior");
        assert!(YearInSchool::from_str("XX").is_err());
    }

    #[test]
    fn test_entity_names_are_facet_safe() {
        assert!(University::new(1, "Cal Tech").validate().is_ok());
        assert!(University::new(1, "Foo, Inc").validate().is_err());
        assert!(Course::new(1, "CS101 ").validate().is_err());
        assert!(Course::new(1, "").validate().is_err());
    }

    #[test]
    fn test_student_validation() {
        let student = Student::new(1, "Ada", "Lovelace", 19, YearInSchool::FR);
        assert!(student.validate().is_ok());

        let too_old = Student::new(2, "Old", "Timer", 101, YearInSchool::SR);
        assert!(too_old.validate().is_err());

        let unnamed = Student::new(3, "", "Nobody", 20, YearInSchool::SO);
        assert!(unnamed.validate().is_err());
    }

    #[test]
    fn test_referenced_entity_accessors() {
        let entity = ReferencedEntity::Course(Course::new(4, "CS101"));
        assert_eq!(entity.kind(), EntityKind::Course);
        assert_eq!(entity.key(), 4);
        assert_eq!(entity.name(), "CS101");
    }
}
