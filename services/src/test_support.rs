//! Fixture builder shared by the service tests.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use db::models::{
    course, section,
    student_task_state::{self, TaskStatus},
    task::{self, AnswerType},
    task_revision::{self, Choice, NumericPart},
    unit, unit_graph_edge,
};
use db::test_utils::setup_test_db;
use sea_orm::{DatabaseConnection, IntoActiveModel, Set};
use serde_json::{Value, json};
use util::clock::{Clock, ManualClock};

pub const STUDENT: i64 = 42;
pub const TEACHER: i64 = 900;
pub const LOCK_MINUTES: i64 = 30;

pub struct Fixture {
    pub db: DatabaseConnection,
    pub clock: ManualClock,
    pub course: course::Model,
    pub section: section::Model,
}

impl Fixture {
    /// Published section in a course led by [`TEACHER`].
    pub async fn new() -> Self {
        Self::with_lead_teacher(Some(TEACHER)).await
    }

    pub async fn with_lead_teacher(lead_teacher_id: Option<i64>) -> Self {
        let db = setup_test_db().await;
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap());
        let course = course::Model::create(&db, "Algebra I", lead_teacher_id, LOCK_MINUTES)
            .await
            .unwrap();
        let section = section::Model::create(&db, course.id, "Linear equations", 1, true)
            .await
            .unwrap();
        Self {
            db,
            clock,
            course,
            section,
        }
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::new(self.clock.clone())
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn unit(&self, sort_order: i32, min_counted: i32) -> unit::Model {
        unit::Model::create(
            &self.db,
            self.section.id,
            &format!("Unit {sort_order}"),
            sort_order,
            min_counted,
            true,
        )
        .await
        .unwrap()
    }

    pub async fn edge(&self, prereq_unit_id: i64, unit_id: i64) {
        unit_graph_edge::Model::create(&self.db, self.section.id, prereq_unit_id, unit_id)
            .await
            .unwrap();
    }

    async fn task_with_revision(
        &self,
        unit_id: i64,
        answer_type: AnswerType,
        is_required: bool,
        parts: &[NumericPart],
        choices: &[Choice],
        correct: &[String],
    ) -> task::Model {
        let task = task::Model::create(
            &self.db,
            unit_id,
            "Task",
            1,
            answer_type,
            is_required,
            true,
        )
        .await
        .unwrap();
        let revision = task_revision::Model::create(&self.db, task.id, parts, choices, correct)
            .await
            .unwrap();
        task::Model::set_active_revision(&self.db, task.id, revision.id)
            .await
            .unwrap()
    }

    /// Single-part numeric task keyed `x`.
    pub async fn numeric_task(&self, unit_id: i64, is_required: bool, correct: &str) -> task::Model {
        let parts = [NumericPart {
            key: "x".into(),
            correct_value: correct.into(),
        }];
        self.task_with_revision(unit_id, AnswerType::Numeric, is_required, &parts, &[], &[])
            .await
    }

    /// Choice task with choices `a`..`d`.
    pub async fn choice_task(
        &self,
        unit_id: i64,
        answer_type: AnswerType,
        correct: &[&str],
    ) -> task::Model {
        let choices: Vec<Choice> = ["a", "b", "c", "d"]
            .iter()
            .map(|k| Choice {
                key: (*k).into(),
                label: k.to_uppercase(),
            })
            .collect();
        let correct: Vec<String> = correct.iter().map(|k| (*k).to_owned()).collect();
        self.task_with_revision(unit_id, answer_type, false, &[], &choices, &correct)
            .await
    }

    pub async fn photo_task(&self, unit_id: i64, is_required: bool) -> task::Model {
        self.task_with_revision(unit_id, AnswerType::Photo, is_required, &[], &[], &[])
            .await
    }

    /// Publishes a new revision of a numeric task and makes it live.
    pub async fn revise_numeric(&self, task_id: i64, correct: &str) -> task::Model {
        let parts = [NumericPart {
            key: "x".into(),
            correct_value: correct.into(),
        }];
        let revision = task_revision::Model::create(&self.db, task_id, &parts, &[], &[])
            .await
            .unwrap();
        task::Model::set_active_revision(&self.db, task_id, revision.id)
            .await
            .unwrap()
    }

    /// Writes a task state directly, bypassing the attempt flow.
    pub async fn set_status(&self, student_id: i64, task_id: i64, status: TaskStatus) {
        let mut active = match student_task_state::Model::find(&self.db, student_id, task_id)
            .await
            .unwrap()
        {
            Some(existing) => existing.into_active_model(),
            None => student_task_state::Model::blank(student_id, task_id, None),
        };
        active.status = Set(status);
        student_task_state::Model::save_state(&self.db, active)
            .await
            .unwrap();
    }

    pub async fn task_state(&self, student_id: i64, task_id: i64) -> student_task_state::Model {
        student_task_state::Model::find(&self.db, student_id, task_id)
            .await
            .unwrap()
            .expect("task state exists")
    }
}

pub fn numeric_answer(value: &str) -> Value {
    json!({ "type": "numeric", "parts": [{ "part_key": "x", "value": value }] })
}
