//! Integration tests for keeping the index in step with the store

mod common;

use common::{fixture_students, Harness};
use roster_search::models::{Course, Student, University, YearInSchool};
use roster_search::search::{SearchConfig, SearchError};
use roster_search::sync::{Propagated, SyncError};
use serde_json::json;

#[tokio::test]
async fn test_new_record_creates_full_document() {
    let harness = Harness::new().await;
    harness
        .apply(harness.store.save_university(University::new(1, "MIT")))
        .await
        .unwrap();
    harness
        .apply(harness.store.save_course(Course::new(10, "CS101")))
        .await
        .unwrap();

    let student = Student::new(7, "Ada", "Lovelace", 19, YearInSchool::FR)
        .with_university(1)
        .with_courses([10]);
    let outcome = harness.apply(harness.store.save_student(student)).await.unwrap();
    assert_eq!(outcome, Propagated::Created(7));

    let document = harness.gateway.get(7).await.unwrap().unwrap();
    assert_eq!(
        document.source(),
        json!({
            "university": {"name": "MIT"},
            "first_name": "Ada",
            "last_name": "Lovelace",
            "age": 19,
            "year_in_school": "FR",
            "name_complete": {
                "input": ["Ada", "Lovelace"],
                "output": "Ada Lovelace",
                "payload": {"id": 7}
            },
            "course_names": ["CS101"]
        })
    );
}

#[tokio::test]
async fn test_updated_record_refreshes_document() {
    let harness = Harness::seeded().await;

    let moved = Student::new(4, "Edsger", "Dijkstra", 21, YearInSchool::SR).with_university(2);
    let outcome = harness.apply(harness.store.save_student(moved)).await.unwrap();
    assert_eq!(outcome, Propagated::Updated(4));

    let document = harness.gateway.get(4).await.unwrap().unwrap();
    assert_eq!(document.get("age"), Some(&json!(21)));
    assert_eq!(document.get("year_in_school"), Some(&json!("SR")));
    assert_eq!(document.get("university"), Some(&json!({"name": "CalTech"})));
    assert_eq!(document.get("course_names"), Some(&json!([])));
}

#[tokio::test]
async fn test_owner_rename_reaches_every_dependent() {
    let harness = Harness::seeded().await;
    let before_unrelated = harness.gateway.get(3).await.unwrap().unwrap();
    let before_dependent = harness.gateway.get(1).await.unwrap().unwrap();

    let outcome = harness
        .apply(harness.store.save_university(University::new(1, "MIT-X")))
        .await
        .unwrap();
    match outcome {
        Propagated::Dependents(report) => {
            assert_eq!(report.entity, "university 1");
            assert_eq!(report.attempted, 2);
            assert_eq!(report.succeeded, 2);
            assert!(report.is_complete());
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    for key in [1, 2] {
        let document = harness.gateway.get(key).await.unwrap().unwrap();
        assert_eq!(document.get("university"), Some(&json!({"name": "MIT-X"})));
    }

    // only the university field moved
    let mut after_dependent = harness.gateway.get(1).await.unwrap().unwrap();
    after_dependent
        .fields
        .insert("university".to_string(), json!({"name": "MIT"}));
    assert_eq!(after_dependent, before_dependent);

    assert_eq!(harness.gateway.get(3).await.unwrap().unwrap(), before_unrelated);
}

#[tokio::test]
async fn test_course_rename_updates_course_names() {
    let harness = Harness::seeded().await;

    harness
        .apply(harness.store.save_course(Course::new(11, "MATH102")))
        .await
        .unwrap();

    let alan = harness.gateway.get(2).await.unwrap().unwrap();
    assert_eq!(alan.get("course_names"), Some(&json!(["CS101", "MATH102"])));
    let grace = harness.gateway.get(3).await.unwrap().unwrap();
    assert_eq!(grace.get("course_names"), Some(&json!(["MATH102"])));
    let ada = harness.gateway.get(1).await.unwrap().unwrap();
    assert_eq!(ada.get("course_names"), Some(&json!(["CS101"])));
}

#[tokio::test]
async fn test_entity_without_dependents_is_a_no_op() {
    let harness = Harness::seeded().await;

    let outcome = harness
        .apply(harness.store.save_course(Course::new(99, "CHEM101")))
        .await
        .unwrap();
    match outcome {
        Propagated::Dependents(report) => assert_eq!(report.attempted, 0),
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test]
async fn test_membership_change_reprojects_record() {
    let harness = Harness::seeded().await;

    let outcome = harness.apply(harness.store.enroll(4, 10)).await.unwrap();
    assert_eq!(outcome, Propagated::Updated(4));

    let document = harness.gateway.get(4).await.unwrap().unwrap();
    assert_eq!(document.get("course_names"), Some(&json!(["CS101", "PHYS101"])));

    harness.apply(harness.store.set_courses(4, [])).await.unwrap();
    let document = harness.gateway.get(4).await.unwrap().unwrap();
    assert_eq!(document.get("course_names"), Some(&json!([])));
}

#[tokio::test]
async fn test_delete_removes_document() {
    let harness = Harness::seeded().await;

    let outcome = harness.apply(harness.store.delete_student(2)).await.unwrap();
    assert_eq!(outcome, Propagated::Deleted(2));

    assert!(harness.gateway.get(2).await.unwrap().is_none());
    let err = harness.search.document(2).await.unwrap_err();
    assert!(matches!(err, SearchError::DocumentMissing(2)));
    assert_eq!(harness.search.count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_updating_unindexed_record_reports_missing_document() {
    let harness = Harness::seeded().await;
    harness.engine.fail_writes_for(5);

    // commit succeeds, index create fails
    let student = Student::new(5, "Barbara", "Liskov", 22, YearInSchool::SR);
    let err = harness
        .apply(harness.store.save_student(student.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Write(SearchError::Write { key: 5, .. })));

    harness.engine.heal();
    let err = harness
        .apply(harness.store.save_student(student))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Write(SearchError::DocumentMissing(5))));
}

#[tokio::test]
async fn test_failed_dependent_does_not_stop_the_sweep() {
    let config = SearchConfig {
        propagation_concurrency: 4,
        ..Default::default()
    };
    let harness = Harness::with_config(config).await;
    harness
        .apply(harness.store.save_university(University::new(1, "MIT")))
        .await
        .unwrap();
    for id in 1..=100 {
        let student = Student::new(id, "Student", format!("Number{}", id), 20, YearInSchool::SO)
            .with_university(1);
        harness.apply(harness.store.save_student(student)).await.unwrap();
    }

    harness.engine.fail_writes_for(50);
    let err = harness
        .apply(harness.store.save_university(University::new(1, "MIT-X")))
        .await
        .unwrap_err();

    match &err {
        SyncError::Propagation { entity, failed } => {
            assert_eq!(entity, "university 1");
            assert_eq!(failed.len(), 1);
            assert_eq!(failed[0].0, 50);
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(err.to_string().contains("50 ("));

    for id in (1..=49).chain(51..=100) {
        let document = harness.gateway.get(id).await.unwrap().unwrap();
        assert_eq!(document.get("university"), Some(&json!({"name": "MIT-X"})), "student {}", id);
    }
    let stale = harness.gateway.get(50).await.unwrap().unwrap();
    assert_eq!(stale.get("university"), Some(&json!({"name": "MIT"})));
}

#[tokio::test]
async fn test_report_keeps_dependent_order() {
    let harness = Harness::seeded().await;
    harness.engine.fail_writes_for(2);
    harness.engine.fail_writes_for(1);

    let entity = match harness.store.save_university(University::new(1, "MIT-Y")).unwrap() {
        roster_search::sync::DomainEvent::ReferencedEntitySaved { entity } => entity,
        other => panic!("unexpected event {:?}", other),
    };
    let report = harness
        .propagator
        .on_referenced_entity_saved(&entity)
        .await
        .unwrap();

    assert_eq!(report.attempted, 2);
    assert_eq!(report.succeeded, 0);
    let keys: Vec<i64> = report.failures.iter().map(|(key, _)| *key).collect();
    assert_eq!(keys, vec![1, 2]);
}

#[tokio::test]
async fn test_reindex_rebuilds_from_store() {
    let harness = Harness::seeded().await;
    harness.apply(harness.store.delete_student(1)).await.unwrap();
    // drift the index away from the store
    harness.gateway.delete(2).await.unwrap();

    let stats = harness.reindexer().run().await.unwrap();

    assert_eq!(stats.records, fixture_students().len() - 1);
    assert_eq!(stats.indexed, 3);
    assert_eq!(stats.failed(), 0);
    assert_eq!(harness.search.count().await.unwrap(), 3);
    assert!(harness.gateway.get(2).await.unwrap().is_some());
    assert!(harness.gateway.get(1).await.unwrap().is_none());
}
