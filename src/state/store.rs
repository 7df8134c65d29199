use crate::error::{AppError, Result};
use crate::models::{
    Course, EntityKind, RecordKey, ReferencedEntity, Student, StudentRecord, University,
};
use crate::state::RecordStore;
use crate::sync::DomainEvent;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use validator::Validate;

/// In-memory relational store (for the memory backend and testing)
///
/// Every mutation validates, commits and returns the domain event the index
/// has to follow.
#[derive(Clone)]
pub struct InMemoryStore {
    students: Arc<DashMap<RecordKey, Student>>,
    universities: Arc<DashMap<RecordKey, University>>,
    courses: Arc<DashMap<RecordKey, Course>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            students: Arc::new(DashMap::new()),
            universities: Arc::new(DashMap::new()),
            courses: Arc::new(DashMap::new()),
        }
    }

    /// Insert or rename a university
    pub fn save_university(&self, university: University) -> Result<DomainEvent> {
        university.validate()?;
        let taken = self
            .universities
            .iter()
            .any(|entry| entry.id != university.id && entry.name == university.name);
        if taken {
            return Err(AppError::Conflict(format!(
                "University name '{}' already exists",
                university.name
            )));
        }

        self.universities.insert(university.id, university.clone());
        tracing::debug!(university_id = university.id, name = %university.name, "University saved");
        Ok(DomainEvent::ReferencedEntitySaved {
            entity: ReferencedEntity::University(university),
        })
    }

    /// Insert or rename a course
    pub fn save_course(&self, course: Course) -> Result<DomainEvent> {
        course.validate()?;
        let taken = self
            .courses
            .iter()
            .any(|entry| entry.id != course.id && entry.name == course.name);
        if taken {
            return Err(AppError::Conflict(format!(
                "Course name '{}' already exists",
                course.name
            )));
        }

        self.courses.insert(course.id, course.clone());
        tracing::debug!(course_id = course.id, name = %course.name, "Course saved");
        Ok(DomainEvent::ReferencedEntitySaved {
            entity: ReferencedEntity::Course(course),
        })
    }

    /// Insert or update a student
    pub fn save_student(&self, student: Student) -> Result<DomainEvent> {
        student.validate()?;
        let record = self.resolve(&student)?;
        let is_new = self.students.insert(student.id, student).is_none();

        tracing::debug!(student_id = record.key(), is_new, "Student saved");
        Ok(DomainEvent::RecordSaved { record, is_new })
    }

    /// Remove a student
    pub fn delete_student(&self, key: RecordKey) -> Result<DomainEvent> {
        if self.students.remove(&key).is_none() {
            return Err(AppError::NotFound(format!("Student {} not found", key)));
        }
        tracing::debug!(student_id = key, "Student deleted");
        Ok(DomainEvent::RecordDeleted { key })
    }

    /// Replace a student's course memberships
    pub fn set_courses(
        &self,
        key: RecordKey,
        course_ids: impl IntoIterator<Item = RecordKey>,
    ) -> Result<DomainEvent> {
        let course_ids: BTreeSet<RecordKey> = course_ids.into_iter().collect();
        let mut student = self
            .students
            .get(&key)
            .map(|entry| entry.clone())
            .ok_or_else(|| AppError::NotFound(format!("Student {} not found", key)))?;

        student.course_ids = course_ids;
        let record = self.resolve(&student)?;
        self.students.insert(key, student);

        tracing::debug!(student_id = key, courses = record.courses.len(), "Memberships changed");
        Ok(DomainEvent::MembershipsChanged { record })
    }

    /// Add one course membership
    pub fn enroll(&self, key: RecordKey, course_id: RecordKey) -> Result<DomainEvent> {
        let mut course_ids = self
            .students
            .get(&key)
            .map(|entry| entry.course_ids.clone())
            .ok_or_else(|| AppError::NotFound(format!("Student {} not found", key)))?;
        course_ids.insert(course_id);
        self.set_courses(key, course_ids)
    }

    pub fn student(&self, key: RecordKey) -> Option<Student> {
        self.students.get(&key).map(|entry| entry.clone())
    }

    pub fn university(&self, id: RecordKey) -> Option<University> {
        self.universities.get(&id).map(|entry| entry.clone())
    }

    pub fn course(&self, id: RecordKey) -> Option<Course> {
        self.courses.get(&id).map(|entry| entry.clone())
    }

    /// Resolve a student's references against the stored entities
    pub fn resolve(&self, student: &Student) -> Result<StudentRecord> {
        let university = match student.university_id {
            Some(id) => Some(
                self.university(id)
                    .ok_or_else(|| AppError::Validation(format!("Unknown university {}", id)))?,
            ),
            None => None,
        };

        let courses = student
            .course_ids
            .iter()
            .map(|id| {
                self.course(*id)
                    .ok_or_else(|| AppError::Validation(format!("Unknown course {}", id)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(StudentRecord {
            student: student.clone(),
            university,
            courses,
        })
    }

    fn sorted_records<F>(&self, filter: F) -> Result<Vec<StudentRecord>>
    where
        F: Fn(&Student) -> bool,
    {
        let mut students: Vec<Student> = self
            .students
            .iter()
            .filter(|entry| filter(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        students.sort_by_key(|student| student.id);
        students.iter().map(|student| self.resolve(student)).collect()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn load_record(&self, key: RecordKey) -> Result<Option<StudentRecord>> {
        match self.student(key) {
            Some(student) => Ok(Some(self.resolve(&student)?)),
            None => Ok(None),
        }
    }

    async fn dependents_of(&self, kind: EntityKind, key: RecordKey) -> Result<Vec<StudentRecord>> {
        match kind {
            EntityKind::University => {
                self.sorted_records(|student| student.university_id == Some(key))
            }
            EntityKind::Course => self.sorted_records(|student| student.course_ids.contains(&key)),
        }
    }

    async fn all_records(&self) -> Result<Vec<StudentRecord>> {
        self.sorted_records(|_| true)
    }

    async fn count_records(&self) -> Result<u64> {
        Ok(self.students.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::YearInSchool;

    fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.save_university(University::new(1, "MIT")).unwrap();
        store.save_course(Course::new(10, "CS101")).unwrap();
        store.save_course(Course::new(11, "MATH101")).unwrap();
        store
    }

    #[tokio::test]
    async fn test_save_student_reports_new_then_update() {
        let store = seeded();
        let student = Student::new(1, "Ada", "Lovelace", 19, YearInSchool::FR).with_university(1);

        match store.save_student(student.clone()).unwrap() {
            DomainEvent::RecordSaved { record, is_new } => {
                assert!(is_new);
                assert_eq!(record.university, Some(University::new(1, "MIT")));
            }
            other => panic!("unexpected event {:?}", other),
        }

        let event = store.save_student(student).unwrap();
        assert!(matches!(event, DomainEvent::RecordSaved { is_new: false, .. }));
    }

    #[tokio::test]
    async fn test_unique_names() {
        let store = seeded();
        let err = store.save_university(University::new(2, "MIT")).unwrap_err();
        assert_eq!(err.error_code(), "CONFLICT");

        // renaming an entity to its own name is fine
        assert!(store.save_course(Course::new(10, "CS101")).is_ok());
    }

    #[tokio::test]
    async fn test_invalid_student_is_rejected() {
        let store = seeded();
        let err = store
            .save_student(Student::new(1, "Ada", "Lovelace", 0, YearInSchool::FR))
            .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");

        let err = store
            .save_student(Student::new(2, "Alan", "Turing", 20, YearInSchool::SO).with_university(9))
            .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert!(store.student(2).is_none());
    }

    #[tokio::test]
    async fn test_entity_names_must_be_facet_safe() {
        let store = seeded();

        let err = store.save_university(University::new(2, "Foo, Inc")).unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert!(store.university(2).is_none());

        let err = store.save_course(Course::new(12, " CS102")).unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert!(store.course(12).is_none());

        assert!(store.save_university(University::new(2, "Foo Inc")).is_ok());
    }

    #[tokio::test]
    async fn test_dependents_lookup() {
        let store = seeded();
        store
            .save_student(Student::new(2, "Alan", "Turing", 20, YearInSchool::SO).with_university(1))
            .unwrap();
        store
            .save_student(Student::new(1, "Ada", "Lovelace", 19, YearInSchool::FR).with_courses([10]))
            .unwrap();
        store.enroll(2, 10).unwrap();

        let owned = store.dependents_of(EntityKind::University, 1).await.unwrap();
        assert_eq!(owned.iter().map(|r| r.key()).collect::<Vec<_>>(), vec![2]);

        let enrolled = store.dependents_of(EntityKind::Course, 10).await.unwrap();
        assert_eq!(enrolled.iter().map(|r| r.key()).collect::<Vec<_>>(), vec![1, 2]);

        assert!(store.dependents_of(EntityKind::Course, 11).await.unwrap().is_empty());
        assert_eq!(store.count_records().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_delete_student() {
        let store = seeded();
        store
            .save_student(Student::new(5, "Grace", "Hopper", 22, YearInSchool::SR))
            .unwrap();

        assert_eq!(store.delete_student(5).unwrap(), DomainEvent::RecordDeleted { key: 5 });
        assert!(store.load_record(5).await.unwrap().is_none());
        assert!(store.delete_student(5).is_err());
    }
}
