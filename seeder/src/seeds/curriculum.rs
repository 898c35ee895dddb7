use crate::seed::Seeder;
use db::models::{
    course, section,
    task::{self, AnswerType},
    task_revision::{self, Choice, NumericPart},
    unit, unit_graph_edge,
};
use fake::{Fake, faker::lorem::en::Words};
use sea_orm::DatabaseConnection;
use services::ServiceError;
use util::config;

/// Lead teacher id attached to the demo course.
pub const DEMO_LEAD_TEACHER: i64 = 1;

pub struct CurriculumSeeder;

#[async_trait::async_trait]
impl Seeder for CurriculumSeeder {
    async fn seed(&self, db: &DatabaseConnection) -> Result<(), ServiceError> {
        let course = course::Model::create(
            db,
            "Algebra I",
            Some(DEMO_LEAD_TEACHER),
            config::default_lock_duration_minutes(),
        )
        .await?;

        // Three units in a chain, plus a draft unit that students never see.
        let section = section::Model::create(db, course.id, "Linear equations", 1, true).await?;
        let basics = unit::Model::create(db, section.id, "Solving for x", 1, 2, true).await?;
        let systems = unit::Model::create(db, section.id, "Systems of equations", 2, 2, true).await?;
        let modelling = unit::Model::create(db, section.id, "Word problems", 3, 1, true).await?;
        unit::Model::create(db, section.id, "Matrices (draft)", 4, 1, false).await?;

        unit_graph_edge::Model::create(db, section.id, basics.id, systems.id).await?;
        unit_graph_edge::Model::create(db, section.id, systems.id, modelling.id).await?;

        numeric_task(db, basics.id, 1, true, &[("x", "4")]).await?;
        numeric_task(db, basics.id, 2, false, &[("x", "-2.5")]).await?;
        choice_task(db, basics.id, 3, AnswerType::SingleChoice, &["b"]).await?;

        numeric_task(db, systems.id, 1, true, &[("x", "3"), ("y", "1")]).await?;
        choice_task(db, systems.id, 2, AnswerType::MultiChoice, &["a", "c"]).await?;

        photo_task(db, modelling.id, 1, true).await?;
        numeric_task(db, modelling.id, 2, false, &[("t", "12")]).await?;

        // An unpublished second section for the same course.
        section::Model::create(db, course.id, "Quadratics", 2, false).await?;
        Ok(())
    }
}

fn title() -> String {
    let words: Vec<String> = Words(2..5).fake();
    let mut title = words.join(" ");
    if let Some(first) = title.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    title
}

async fn publish(
    db: &DatabaseConnection,
    unit_id: i64,
    sort_order: i32,
    answer_type: AnswerType,
    is_required: bool,
    parts: &[NumericPart],
    choices: &[Choice],
    correct: &[String],
) -> Result<task::Model, ServiceError> {
    let task = task::Model::create(
        db,
        unit_id,
        &title(),
        sort_order,
        answer_type,
        is_required,
        true,
    )
    .await?;
    let revision = task_revision::Model::create(db, task.id, parts, choices, correct).await?;
    Ok(task::Model::set_active_revision(db, task.id, revision.id).await?)
}

async fn numeric_task(
    db: &DatabaseConnection,
    unit_id: i64,
    sort_order: i32,
    is_required: bool,
    parts: &[(&str, &str)],
) -> Result<task::Model, ServiceError> {
    let parts: Vec<NumericPart> = parts
        .iter()
        .map(|(key, value)| NumericPart {
            key: (*key).to_owned(),
            correct_value: (*value).to_owned(),
        })
        .collect();
    publish(db, unit_id, sort_order, AnswerType::Numeric, is_required, &parts, &[], &[]).await
}

async fn choice_task(
    db: &DatabaseConnection,
    unit_id: i64,
    sort_order: i32,
    answer_type: AnswerType,
    correct: &[&str],
) -> Result<task::Model, ServiceError> {
    let choices: Vec<Choice> = ["a", "b", "c", "d"]
        .iter()
        .map(|key| Choice {
            key: (*key).to_owned(),
            label: title(),
        })
        .collect();
    let correct: Vec<String> = correct.iter().map(|k| (*k).to_owned()).collect();
    publish(db, unit_id, sort_order, answer_type, false, &[], &choices, &correct).await
}

async fn photo_task(
    db: &DatabaseConnection,
    unit_id: i64,
    sort_order: i32,
    is_required: bool,
) -> Result<task::Model, ServiceError> {
    publish(db, unit_id, sort_order, AnswerType::Photo, is_required, &[], &[], &[]).await
}
