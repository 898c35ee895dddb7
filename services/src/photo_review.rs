//! Photo answers: a student uploads 1 to 5 images, a teacher accepts or
//! rejects them. Accepted photos credit the task. Rejected ones leave it open
//! for another submission; the old submission stays for the record.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use db::models::{
    attempt::{self, AttemptResult},
    photo_task_submission::{self, PhotoSubmissionStatus},
    student_task_state::{self, TaskStatus},
    task::AnswerType,
};
use sea_orm::{ConnectionTrait, DatabaseTransaction, IntoActiveModel, Set, TransactionTrait};
use serde::Deserialize;
use serde_json::json;
use util::clock::Clock;
use validator::Validate;

use crate::actor::Actor;
use crate::attempt::TaskProgress;
use crate::context::TaskContext;
use crate::error::{ServiceError, ServiceResult};
use crate::events::DomainEvent;
use crate::section_availability::SectionAvailability;
use crate::unit_snapshot::UnitSnapshot;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PhotoSubmissionInput {
    #[validate(length(min = 1, max = 5, message = "A photo submission needs between 1 and 5 images"))]
    pub asset_keys: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RejectPhotoInput {
    #[validate(length(min = 1, max = 2000, message = "Rejection reason must be between 1 and 2000 characters"))]
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct PhotoOutcome {
    pub attempt: attempt::Model,
    pub submission: photo_task_submission::Model,
    pub task_state: student_task_state::Model,
    pub units: BTreeMap<i64, UnitSnapshot>,
}

pub struct PhotoReviewService {
    clock: Arc<dyn Clock>,
}

impl PhotoReviewService {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub async fn submit_photo<C>(
        &self,
        db: &C,
        actor: &Actor,
        task_id: i64,
        input: PhotoSubmissionInput,
    ) -> ServiceResult<PhotoOutcome>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let student_id = actor.require_student()?;
        input.validate()?;
        let asset_keys = normalize_asset_keys(&input.asset_keys)?;
        let now = self.clock.now();

        let txn = db.begin().await?;
        let outcome = submit_in(&txn, student_id, task_id, &asset_keys, now).await?;
        txn.commit().await?;
        Ok(outcome)
    }

    pub async fn accept_submission<C>(
        &self,
        db: &C,
        actor: &Actor,
        submission_id: i64,
    ) -> ServiceResult<PhotoOutcome>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let teacher_id = actor.require_teacher()?;
        let now = self.clock.now();

        let txn = db.begin().await?;
        let outcome = decide_in(&txn, teacher_id, submission_id, Decision::Accept, now).await?;
        txn.commit().await?;
        Ok(outcome)
    }

    pub async fn reject_submission<C>(
        &self,
        db: &C,
        actor: &Actor,
        submission_id: i64,
        input: RejectPhotoInput,
    ) -> ServiceResult<PhotoOutcome>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let teacher_id = actor.require_teacher()?;
        input.validate()?;
        let reason = input.reason.trim().to_owned();
        if reason.is_empty() {
            return Err(ServiceError::InvalidInput(
                "Rejection reason must not be blank".into(),
            ));
        }
        let now = self.clock.now();

        let txn = db.begin().await?;
        let outcome =
            decide_in(&txn, teacher_id, submission_id, Decision::Reject(reason), now).await?;
        txn.commit().await?;
        Ok(outcome)
    }
}

fn normalize_asset_keys(raw: &[String]) -> ServiceResult<Vec<String>> {
    let keys: Vec<String> = raw.iter().map(|k| k.trim().to_owned()).collect();
    if keys.iter().any(String::is_empty) {
        return Err(ServiceError::InvalidInput("Asset keys must not be blank".into()));
    }
    let distinct: BTreeSet<&str> = keys.iter().map(String::as_str).collect();
    if distinct.len() != keys.len() {
        return Err(ServiceError::InvalidInput("Asset keys must be distinct".into()));
    }
    Ok(keys)
}

async fn submit_in(
    txn: &DatabaseTransaction,
    student_id: i64,
    task_id: i64,
    asset_keys: &[String],
    now: DateTime<Utc>,
) -> ServiceResult<PhotoOutcome> {
    let ctx = TaskContext::load(txn, task_id).await?;
    if ctx.task.answer_type != AnswerType::Photo {
        return Err(ServiceError::NotAPhotoTask(task_id));
    }
    let revision = ctx.active_revision(txn).await?;

    let prior = student_task_state::Model::find(txn, student_id, task_id).await?;
    if prior
        .as_ref()
        .is_some_and(|row| row.status == TaskStatus::PendingReview)
    {
        return Err(ServiceError::PhotoReviewPending);
    }
    let progress = TaskProgress::resume(prior.as_ref(), revision.id, now)?;

    let attempt_no = attempt::Model::next_attempt_no(txn, student_id, revision.id).await?;
    let attempt = attempt::Model::create(
        txn,
        student_id,
        task_id,
        revision.id,
        attempt_no,
        json!({ "type": "photo", "asset_keys": asset_keys }),
        AttemptResult::PendingReview,
        now,
    )
    .await?;
    let submission =
        photo_task_submission::Model::create(txn, attempt.id, student_id, task_id, asset_keys, now)
            .await?;

    let mut active = match prior {
        Some(row) => row.into_active_model(),
        None => student_task_state::Model::blank(student_id, task_id, Some(revision.id)),
    };
    active.status = Set(TaskStatus::PendingReview);
    active.wrong_attempts = Set(progress.wrong_attempts);
    active.locked_until = Set(None);
    active.required_skipped = Set(progress.required_skipped);
    active.active_revision_id = Set(Some(revision.id));
    active.updated_at = Set(now);
    let task_state = student_task_state::Model::save_state(txn, active).await?;

    DomainEvent::PhotoAttemptSubmitted {
        student_id,
        task_id,
        attempt_id: attempt.id,
        submission_id: submission.id,
        asset_count: asset_keys.len(),
    }
    .record(txn, Some(student_id), now)
    .await?;

    let units = SectionAvailability::recompute(txn, student_id, ctx.section.id, now).await?;

    Ok(PhotoOutcome {
        attempt,
        submission,
        task_state,
        units,
    })
}

enum Decision {
    Accept,
    Reject(String),
}

async fn decide_in(
    txn: &DatabaseTransaction,
    teacher_id: i64,
    submission_id: i64,
    decision: Decision,
    now: DateTime<Utc>,
) -> ServiceResult<PhotoOutcome> {
    let submission = photo_task_submission::Model::get_by_id(txn, submission_id)
        .await?
        .ok_or(ServiceError::not_found("photo submission", submission_id))?;
    if submission.status != PhotoSubmissionStatus::Submitted {
        return Err(ServiceError::SubmissionAlreadyReviewed(submission_id));
    }

    let student_id = submission.student_id;
    let task_id = submission.task_id;
    let ctx = TaskContext::load(txn, task_id).await?;
    let state = student_task_state::Model::find(txn, student_id, task_id)
        .await?
        .ok_or(ServiceError::not_found("student task state", task_id))?;
    let pending = attempt::Model::get_by_id(txn, submission.attempt_id)
        .await?
        .ok_or(ServiceError::not_found("attempt", submission.attempt_id))?;

    let mut active = state.into_active_model();
    active.locked_until = Set(None);
    active.updated_at = Set(now);

    let (submission, attempt) = match decision {
        Decision::Accept => {
            active.status = Set(TaskStatus::Accepted);
            active.credited_revision_id = Set(Some(pending.revision_id));
            active.credited_at = Set(Some(now));

            let submission = submission
                .record_decision(txn, PhotoSubmissionStatus::Accepted, None, teacher_id, now)
                .await?;
            let attempt = attempt::Model::set_result(txn, pending.id, AttemptResult::Accepted).await?;
            DomainEvent::PhotoAttemptAccepted {
                student_id,
                task_id,
                submission_id,
                reviewer_id: teacher_id,
            }
            .record(txn, Some(teacher_id), now)
            .await?;
            (submission, attempt)
        }
        Decision::Reject(reason) => {
            active.status = Set(TaskStatus::Rejected);

            let submission = submission
                .record_decision(
                    txn,
                    PhotoSubmissionStatus::Rejected,
                    Some(reason.clone()),
                    teacher_id,
                    now,
                )
                .await?;
            let attempt = attempt::Model::set_result(txn, pending.id, AttemptResult::Rejected).await?;
            DomainEvent::PhotoAttemptRejected {
                student_id,
                task_id,
                submission_id,
                reviewer_id: teacher_id,
                reason,
            }
            .record(txn, Some(teacher_id), now)
            .await?;
            (submission, attempt)
        }
    };

    let task_state = student_task_state::Model::save_state(txn, active).await?;
    tracing::info!(
        submission_id,
        student_id,
        task_id,
        status = %submission.status,
        "photo submission reviewed"
    );

    let units = SectionAvailability::recompute(txn, student_id, ctx.section.id, now).await?;

    Ok(PhotoOutcome {
        attempt,
        submission,
        task_state,
        units,
    })
}
