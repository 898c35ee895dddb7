use chrono::{Duration, TimeZone, Utc};
use serde_json::json;

use crate::models::{
    attempt::{self, AttemptResult},
    course, section,
    student_unit_state::{self, UnitStatus},
    task::{self, AnswerType},
    task_revision::{self, Choice, NumericPart},
    unit, unit_graph_edge,
};
use crate::test_utils::setup_test_db;

#[tokio::test]
async fn published_filters_hide_drafts() {
    let db = setup_test_db().await;
    let c = course::Model::create(&db, "Algebra", Some(7), 30).await.unwrap();
    let draft = section::Model::create(&db, c.id, "Draft", 1, false).await.unwrap();
    let live = section::Model::create(&db, c.id, "Live", 2, true).await.unwrap();

    assert!(section::Model::find_published(&db, draft.id).await.unwrap().is_none());
    assert!(section::Model::find_published(&db, live.id).await.unwrap().is_some());

    let u2 = unit::Model::create(&db, live.id, "Second", 2, 0, true).await.unwrap();
    let u1 = unit::Model::create(&db, live.id, "First", 1, 0, true).await.unwrap();
    let hidden = unit::Model::create(&db, live.id, "Hidden", 0, 0, false).await.unwrap();

    let ids: Vec<i64> = unit::Model::published_for_section(&db, live.id)
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.id)
        .collect();
    assert_eq!(ids, vec![u1.id, u2.id]);

    let all = unit::Model::all_for_section(&db, live.id).await.unwrap();
    assert_eq!(all.first().map(|u| u.id), Some(hidden.id));
}

#[tokio::test]
async fn revisions_number_sequentially_and_parse() {
    let db = setup_test_db().await;
    let c = course::Model::create(&db, "Geometry", None, 30).await.unwrap();
    let s = section::Model::create(&db, c.id, "S", 1, true).await.unwrap();
    let u = unit::Model::create(&db, s.id, "U", 1, 1, true).await.unwrap();
    let t = task::Model::create(&db, u.id, "Pick", 1, AnswerType::MultiChoice, true, true)
        .await
        .unwrap();

    let choices = vec![
        Choice { key: "a".into(), label: "A".into() },
        Choice { key: "b".into(), label: "B".into() },
    ];
    let r1 = task_revision::Model::create(&db, t.id, &[], &choices, &["a".to_string()])
        .await
        .unwrap();
    let parts = vec![NumericPart { key: "x".into(), correct_value: "4".into() }];
    let r2 = task_revision::Model::create(&db, t.id, &parts, &[], &[]).await.unwrap();

    assert_eq!(r1.revision_no, 1);
    assert_eq!(r2.revision_no, 2);
    assert_eq!(r1.parsed_choices().unwrap(), choices);
    assert_eq!(r2.parsed_numeric_parts().unwrap(), parts);

    let t = task::Model::set_active_revision(&db, t.id, r2.id).await.unwrap();
    assert_eq!(t.active_revision_id, Some(r2.id));
}

#[tokio::test]
async fn attempt_numbers_are_scoped_to_revision() {
    let db = setup_test_db().await;
    let c = course::Model::create(&db, "Physics", None, 30).await.unwrap();
    let s = section::Model::create(&db, c.id, "S", 1, true).await.unwrap();
    let u = unit::Model::create(&db, s.id, "U", 1, 1, true).await.unwrap();
    let t = task::Model::create(&db, u.id, "T", 1, AnswerType::Numeric, false, true)
        .await
        .unwrap();
    let other = task::Model::create(&db, u.id, "Other", 2, AnswerType::Numeric, false, true)
        .await
        .unwrap();
    let now = Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap();

    assert_eq!(attempt::Model::next_attempt_no(&db, 11, 100).await.unwrap(), 1);
    for n in 1..=2 {
        attempt::Model::create(&db, 11, t.id, 100, n, json!({}), AttemptResult::Incorrect, now)
            .await
            .unwrap();
    }
    assert_eq!(attempt::Model::next_attempt_no(&db, 11, 100).await.unwrap(), 3);
    assert_eq!(attempt::Model::next_attempt_no(&db, 11, 101).await.unwrap(), 1);
    assert_eq!(attempt::Model::next_attempt_no(&db, 12, 100).await.unwrap(), 1);

    let attempted = attempt::Model::attempted_task_ids(&db, 11, &[t.id, other.id])
        .await
        .unwrap();
    assert_eq!(attempted, vec![t.id]);
}

#[tokio::test]
async fn override_flag_creates_placeholder_then_updates() {
    let db = setup_test_db().await;
    let c = course::Model::create(&db, "Chemistry", None, 30).await.unwrap();
    let s = section::Model::create(&db, c.id, "S", 1, true).await.unwrap();
    let u = unit::Model::create(&db, s.id, "U", 1, 0, true).await.unwrap();
    let now = Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap();

    let row = student_unit_state::Model::mark_override_opened(&db, 5, u.id, now)
        .await
        .unwrap();
    assert!(row.override_opened);
    assert_eq!(row.status, UnitStatus::Locked);

    let again = student_unit_state::Model::mark_override_opened(&db, 5, u.id, now + Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(again.id, row.id);
    assert_eq!(
        student_unit_state::Model::student_ids_for_units(&db, &[u.id]).await.unwrap(),
        vec![5]
    );
}

#[tokio::test]
async fn edges_are_filtered_to_the_unit_set() {
    let db = setup_test_db().await;
    let c = course::Model::create(&db, "Biology", None, 30).await.unwrap();
    let s = section::Model::create(&db, c.id, "S", 1, true).await.unwrap();
    let a = unit::Model::create(&db, s.id, "A", 1, 0, true).await.unwrap();
    let b = unit::Model::create(&db, s.id, "B", 2, 0, true).await.unwrap();
    let draft = unit::Model::create(&db, s.id, "Draft", 3, 0, false).await.unwrap();

    unit_graph_edge::Model::create(&db, s.id, a.id, b.id).await.unwrap();
    unit_graph_edge::Model::create(&db, s.id, draft.id, b.id).await.unwrap();

    let edges = unit_graph_edge::Model::among_units(&db, &[a.id, b.id]).await.unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!((edges[0].prereq_unit_id, edges[0].unit_id), (a.id, b.id));

    assert_eq!(unit_graph_edge::Model::delete_for_section(&db, s.id).await.unwrap(), 2);
}
