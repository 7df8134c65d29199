//! Deterministic demo roster
//!
//! Fills an [`InMemoryStore`] with universities, courses and generated
//! students so the service has something to facet over. Run the
//! [`Reindexer`](crate::sync::Reindexer) afterwards to push it to the index.

use crate::error::Result;
use crate::models::{Course, RecordKey, Student, University, YearInSchool};
use crate::state::InMemoryStore;

pub const UNIVERSITY_NAMES: &[&str] = &["MIT", "MGU", "CalTech", "KPI", "DPI", "PSTU"];

const COURSE_PREFIXES: &[&str] = &["CS", "MATH", "CHEM", "PHYS"];

const FIRST_NAMES: &[&str] = &[
    "Ada", "Alan", "Barbara", "Claude", "Donald", "Edsger", "Frances", "Grace", "John", "Katherine",
    "Leslie", "Margaret",
];

const LAST_NAMES: &[&str] = &[
    "Allen", "Dijkstra", "Hopper", "Johnson", "Knuth", "Lamport", "Liskov", "Lovelace", "Hamilton",
    "McCarthy", "Shannon", "Turing",
];

const YEARS: [YearInSchool; 4] = [
    YearInSchool::FR,
    YearInSchool::SO,
    YearInSchool::JR,
    YearInSchool::SR,
];

/// Course names: `CS101`, `MATH101`, ... `PHYS303`
pub fn course_names() -> Vec<String> {
    let mut names = Vec::new();
    for level in 1..=3 {
        for number in 1..=3 {
            for prefix in COURSE_PREFIXES {
                names.push(format!("{}{}0{}", prefix, number, level));
            }
        }
    }
    names
}

/// Generated student for a key
pub fn student(id: RecordKey, universities: usize, courses: usize) -> Student {
    let n = id.unsigned_abs() as usize;
    let mut student = Student::new(
        id,
        FIRST_NAMES[n % FIRST_NAMES.len()],
        LAST_NAMES[(n * 7) % LAST_NAMES.len()],
        17 + (n % 9) as i16,
        YEARS[n % YEARS.len()],
    );
    if universities > 0 {
        student = student.with_university((n % universities) as RecordKey + 1);
    }
    if courses > 0 {
        student = student.with_courses([
            ((n * 5) % courses) as RecordKey + 1,
            ((n * 11) % courses) as RecordKey + 1,
        ]);
    }
    student
}

/// Populate the store; returns the number of students created
pub fn seed_store(store: &InMemoryStore, students: usize) -> Result<usize> {
    for (i, name) in UNIVERSITY_NAMES.iter().enumerate() {
        store.save_university(University::new(i as RecordKey + 1, *name))?;
    }

    let courses = course_names();
    for (i, name) in courses.iter().enumerate() {
        store.save_course(Course::new(i as RecordKey + 1, name.clone()))?;
    }

    for id in 1..=students {
        store.save_student(student(id as RecordKey, UNIVERSITY_NAMES.len(), courses.len()))?;
    }

    tracing::info!(
        universities = UNIVERSITY_NAMES.len(),
        courses = courses.len(),
        students,
        "Demo roster seeded"
    );
    Ok(students)
}
