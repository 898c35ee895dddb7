use crate::seed::Seeder;
use crate::seeds::curriculum::DEMO_LEAD_TEACHER;
use db::models::{
    section,
    task::{self, AnswerType},
    task_revision, unit,
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde_json::{Value, json};
use services::{
    Actor, ErrorKind, ServiceError,
    attempt::AttemptService,
    photo_review::{PhotoReviewService, PhotoSubmissionInput, RejectPhotoInput},
    section_availability::SectionAvailability,
};
use std::sync::Arc;
use util::clock::{Clock, SystemClock};

/// Simulates a cohort working through every published section.
pub struct ProgressSeeder {
    pub students: i64,
    pub first_student_id: i64,
}

impl Default for ProgressSeeder {
    fn default() -> Self {
        Self {
            students: 12,
            first_student_id: 1001,
        }
    }
}

#[async_trait::async_trait]
impl Seeder for ProgressSeeder {
    async fn seed(&self, db: &DatabaseConnection) -> Result<(), ServiceError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let attempts = AttemptService::new(clock.clone());
        let photos = PhotoReviewService::new(clock.clone());
        let teacher = Actor::teacher(DEMO_LEAD_TEACHER);

        let sections = section::Entity::find()
            .filter(section::Column::IsPublished.eq(true))
            .all(db)
            .await?;

        for student_id in self.first_student_id..self.first_student_id + self.students {
            let student = Actor::student(student_id);
            // Per-student skill: the chance any single answer is right.
            let skill = 0.3 + fastrand::f64() * 0.6;

            for section in &sections {
                let units = unit::Model::published_for_section(db, section.id).await?;
                let unit_ids: Vec<i64> = units.iter().map(|u| u.id).collect();
                let tasks = task::Model::published_for_units(db, &unit_ids).await?;

                for task in &tasks {
                    if task.answer_type == AnswerType::Photo {
                        let keys = (0..fastrand::usize(1..=3))
                            .map(|n| format!("uploads/{student_id}/{}/{n}.jpg", task.id))
                            .collect();
                        let out = photos
                            .submit_photo(db, &student, task.id, PhotoSubmissionInput { asset_keys: keys })
                            .await?;
                        if fastrand::f64() < skill {
                            photos.accept_submission(db, &teacher, out.submission.id).await?;
                        } else {
                            let reason = RejectPhotoInput {
                                reason: "Working is not legible".into(),
                            };
                            photos
                                .reject_submission(db, &teacher, out.submission.id, reason)
                                .await?;
                        }
                        continue;
                    }

                    let Some(revision_id) = task.active_revision_id else {
                        continue;
                    };
                    let Some(revision) = task_revision::Model::get_by_id(db, revision_id).await? else {
                        continue;
                    };

                    for _ in 0..fastrand::usize(1..=4) {
                        let right = fastrand::f64() < skill;
                        let answer = answer_for(task.answer_type, &revision, right)?;
                        match attempts.submit_attempt(db, &student, task.id, &answer).await {
                            Ok(out) if out.is_correct => break,
                            Ok(_) => {}
                            // Blocked is the expected end of a bad streak.
                            Err(e) if e.kind() == ErrorKind::Conflict => break,
                            Err(e) => return Err(e),
                        }
                    }
                }

                SectionAvailability::recompute(db, student_id, section.id, clock.now()).await?;
            }
        }

        tracing::info!(students = self.students, "seeded student progress");
        Ok(())
    }
}

fn answer_for(
    answer_type: AnswerType,
    revision: &task_revision::Model,
    right: bool,
) -> Result<Value, ServiceError> {
    let answer = match answer_type {
        AnswerType::Numeric => {
            let parts: Vec<Value> = revision
                .parsed_numeric_parts()?
                .into_iter()
                .map(|p| {
                    let value = if right {
                        p.correct_value
                    } else {
                        format!("{}1", p.correct_value)
                    };
                    json!({ "part_key": p.key, "value": value })
                })
                .collect();
            json!({ "type": "numeric", "parts": parts })
        }
        AnswerType::SingleChoice => {
            let correct = revision.parsed_correct_choice_keys()?;
            let declared = revision.parsed_choices()?;
            let key = declared
                .iter()
                .map(|c| c.key.clone())
                .find(|k| correct.contains(k) == right)
                .unwrap_or_default();
            json!({ "type": "single_choice", "choice_key": key })
        }
        AnswerType::MultiChoice => {
            let mut keys = revision.parsed_correct_choice_keys()?;
            if !right {
                keys.truncate(keys.len().saturating_sub(1).max(1));
                if let Some(extra) = revision
                    .parsed_choices()?
                    .into_iter()
                    .map(|c| c.key)
                    .find(|k| !keys.contains(k))
                {
                    keys.push(extra);
                }
            }
            json!({ "type": "multi_choice", "choice_keys": keys })
        }
        other => {
            return Err(ServiceError::UnsupportedAnswerType(other.to_string()));
        }
    };
    Ok(answer)
}
