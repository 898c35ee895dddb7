//! Auto-evaluated attempts and the wrong-answer escalation policy.
//!
//! Third wrong answer on a revision blocks the task for the course's lock
//! duration. Sixth wrong answer credits it without progress, which counts
//! toward unit completion but not toward "solved".

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use db::models::{
    attempt::{self, AttemptResult},
    notification::NotificationKind,
    student_task_state::{self, TaskStatus},
    task::AnswerType,
};
use sea_orm::{ConnectionTrait, DatabaseTransaction, IntoActiveModel, Set, TransactionTrait};
use serde_json::Value;
use util::clock::Clock;

use crate::actor::Actor;
use crate::answer::{Answer, evaluate};
use crate::context::TaskContext;
use crate::error::{ServiceError, ServiceResult};
use crate::events::DomainEvent;
use crate::notifications::notify_lead_teacher;
use crate::section_availability::SectionAvailability;
use crate::unit_snapshot::UnitSnapshot;

pub const BLOCK_AFTER_WRONG_ATTEMPTS: i32 = 3;
pub const AUTO_CREDIT_AFTER_WRONG_ATTEMPTS: i32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    None,
    Block,
    AutoCredit,
}

pub fn escalation_for(wrong_attempts: i32) -> Escalation {
    match wrong_attempts {
        AUTO_CREDIT_AFTER_WRONG_ATTEMPTS => Escalation::AutoCredit,
        BLOCK_AFTER_WRONG_ATTEMPTS => Escalation::Block,
        _ => Escalation::None,
    }
}

/// The mutable part of a student's task state for the live revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskProgress {
    pub status: TaskStatus,
    pub wrong_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub required_skipped: bool,
}

impl Default for TaskProgress {
    fn default() -> Self {
        Self {
            status: TaskStatus::NotStarted,
            wrong_attempts: 0,
            locked_until: None,
            required_skipped: false,
        }
    }
}

impl TaskProgress {
    /// Progress a new attempt on `revision_id` starts from.
    ///
    /// Credited tasks are closed. A state remembered for an older revision
    /// starts over. A block that has not yet expired rejects the attempt.
    pub fn resume(
        prior: Option<&student_task_state::Model>,
        revision_id: i64,
        now: DateTime<Utc>,
    ) -> ServiceResult<Self> {
        let Some(row) = prior else {
            return Ok(Self::default());
        };
        if row.status.is_credited() {
            return Err(ServiceError::TaskAlreadyCredited);
        }
        if row.active_revision_id != Some(revision_id) {
            tracing::debug!(
                student_id = row.student_id,
                task_id = row.task_id,
                revision_id,
                "task revision changed, progress reset"
            );
            return Ok(Self::default());
        }
        if row.status == TaskStatus::Blocked {
            match row.locked_until {
                Some(locked_until) if locked_until > now => {
                    return Err(ServiceError::TaskBlocked { locked_until });
                }
                _ => {}
            }
        }
        Ok(Self {
            status: row.status,
            wrong_attempts: row.wrong_attempts,
            locked_until: row.locked_until,
            required_skipped: row.required_skipped,
        })
    }

    pub fn record_correct(self) -> Self {
        Self {
            status: TaskStatus::Correct,
            locked_until: None,
            ..self
        }
    }

    pub fn record_incorrect(
        self,
        lock_for: Duration,
        is_required: bool,
        now: DateTime<Utc>,
    ) -> (Self, Escalation) {
        let wrong_attempts = self.wrong_attempts + 1;
        let escalation = escalation_for(wrong_attempts);
        let next = match escalation {
            Escalation::None => Self {
                status: TaskStatus::InProgress,
                wrong_attempts,
                locked_until: None,
                ..self
            },
            Escalation::Block => Self {
                status: TaskStatus::Blocked,
                wrong_attempts,
                locked_until: Some(now + lock_for),
                ..self
            },
            Escalation::AutoCredit => Self {
                status: TaskStatus::CreditedWithoutProgress,
                wrong_attempts,
                locked_until: None,
                required_skipped: is_required,
            },
        };
        (next, escalation)
    }
}

#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    pub attempt: attempt::Model,
    pub task_state: student_task_state::Model,
    pub is_correct: bool,
    pub escalation: Escalation,
    pub units: BTreeMap<i64, UnitSnapshot>,
}

pub struct AttemptService {
    clock: Arc<dyn Clock>,
}

impl AttemptService {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Evaluates an answer, advances the student's task state and recomputes
    /// the task's section, all in one transaction.
    pub async fn submit_attempt<C>(
        &self,
        db: &C,
        actor: &Actor,
        task_id: i64,
        raw_answer: &Value,
    ) -> ServiceResult<AttemptOutcome>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let student_id = actor.require_student()?;
        let now = self.clock.now();

        let txn = db.begin().await?;
        let outcome = submit_in(&txn, student_id, task_id, raw_answer, now).await?;
        txn.commit().await?;
        Ok(outcome)
    }
}

async fn submit_in(
    txn: &DatabaseTransaction,
    student_id: i64,
    task_id: i64,
    raw_answer: &Value,
    now: DateTime<Utc>,
) -> ServiceResult<AttemptOutcome> {
    let ctx = TaskContext::load(txn, task_id).await?;
    let revision = ctx.active_revision(txn).await?;
    if ctx.task.answer_type == AnswerType::Photo {
        return Err(ServiceError::TaskRequiresPhotoSubmission(task_id));
    }

    let answer = Answer::parse(raw_answer)?;
    let is_correct = evaluate(task_id, ctx.task.answer_type, &answer, &revision)?;

    let prior = student_task_state::Model::find(txn, student_id, task_id).await?;
    let progress = TaskProgress::resume(prior.as_ref(), revision.id, now)?;

    let attempt_no = attempt::Model::next_attempt_no(txn, student_id, revision.id).await?;
    let attempt = attempt::Model::create(
        txn,
        student_id,
        task_id,
        revision.id,
        attempt_no,
        serde_json::to_value(&answer)?,
        if is_correct {
            AttemptResult::Correct
        } else {
            AttemptResult::Incorrect
        },
        now,
    )
    .await?;

    DomainEvent::AttemptSubmitted {
        student_id,
        task_id,
        revision_id: revision.id,
        attempt_id: attempt.id,
        attempt_no,
    }
    .record(txn, Some(student_id), now)
    .await?;

    let (next, escalation) = if is_correct {
        (progress.record_correct(), Escalation::None)
    } else {
        progress.record_incorrect(
            Duration::minutes(ctx.course.lock_duration_minutes),
            ctx.task.is_required,
            now,
        )
    };

    let mut active = match prior {
        Some(row) => row.into_active_model(),
        None => student_task_state::Model::blank(student_id, task_id, Some(revision.id)),
    };
    active.status = Set(next.status);
    active.wrong_attempts = Set(next.wrong_attempts);
    active.locked_until = Set(next.locked_until);
    active.required_skipped = Set(next.required_skipped);
    active.active_revision_id = Set(Some(revision.id));
    if next.status.is_credited() {
        active.credited_revision_id = Set(Some(revision.id));
        active.credited_at = Set(Some(now));
    } else {
        active.credited_revision_id = Set(None);
        active.credited_at = Set(None);
    }
    active.updated_at = Set(now);
    let task_state = student_task_state::Model::save_state(txn, active).await?;

    if is_correct {
        DomainEvent::AttemptEvaluatedCorrect {
            student_id,
            task_id,
            attempt_id: attempt.id,
        }
        .record(txn, Some(student_id), now)
        .await?;
    } else {
        DomainEvent::AttemptEvaluatedIncorrect {
            student_id,
            task_id,
            attempt_id: attempt.id,
            wrong_attempts: next.wrong_attempts,
        }
        .record(txn, Some(student_id), now)
        .await?;
    }

    match escalation {
        Escalation::None => {}
        Escalation::Block => {
            let locked_until = next.locked_until.unwrap_or(now);
            tracing::info!(student_id, task_id, %locked_until, "task blocked after wrong answers");
            DomainEvent::TaskLockedForStudent {
                student_id,
                task_id,
                locked_until,
            }
            .record(txn, Some(student_id), now)
            .await?;
            notify_lead_teacher(
                txn,
                &ctx.course,
                NotificationKind::TaskLocked,
                student_id,
                &ctx.task,
                now,
            )
            .await?;
        }
        Escalation::AutoCredit => {
            tracing::info!(
                student_id,
                task_id,
                required = ctx.task.is_required,
                "task credited without progress"
            );
            DomainEvent::TaskAutoCreditedWithoutProgress {
                student_id,
                task_id,
            }
            .record(txn, Some(student_id), now)
            .await?;
            if ctx.task.is_required {
                DomainEvent::RequiredTaskSkippedFlagSet {
                    student_id,
                    task_id,
                }
                .record(txn, Some(student_id), now)
                .await?;
                notify_lead_teacher(
                    txn,
                    &ctx.course,
                    NotificationKind::RequiredTaskSkipped,
                    student_id,
                    &ctx.task,
                    now,
                )
                .await?;
            }
        }
    }

    let units = SectionAvailability::recompute(txn, student_id, ctx.section.id, now).await?;

    Ok(AttemptOutcome {
        attempt,
        task_state,
        is_correct,
        escalation,
        units,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Fixture, LOCK_MINUTES, STUDENT, TEACHER, numeric_answer};
    use db::models::{domain_event, notification, student_unit_state::UnitStatus, task};
    use serde_json::json;

    #[test]
    fn escalation_thresholds() {
        assert_eq!(escalation_for(1), Escalation::None);
        assert_eq!(escalation_for(2), Escalation::None);
        assert_eq!(escalation_for(3), Escalation::Block);
        assert_eq!(escalation_for(4), Escalation::None);
        assert_eq!(escalation_for(6), Escalation::AutoCredit);
    }

    #[test]
    fn expired_block_resumes_and_next_wrong_reopens() {
        let now = Utc::now();
        let blocked = TaskProgress {
            status: TaskStatus::Blocked,
            wrong_attempts: 3,
            locked_until: Some(now - Duration::minutes(1)),
            required_skipped: false,
        };
        let (next, esc) = blocked.record_incorrect(Duration::minutes(30), true, now);
        assert_eq!(esc, Escalation::None);
        assert_eq!(next.status, TaskStatus::InProgress);
        assert_eq!(next.wrong_attempts, 4);
        assert_eq!(next.locked_until, None);
        assert!(!next.required_skipped);
    }

    #[tokio::test]
    async fn wrong_answers_escalate_to_block_then_auto_credit() {
        let fx = Fixture::new().await;
        let unit = fx.unit(1, 1).await;
        let task = fx.numeric_task(unit.id, true, "12").await;
        let service = AttemptService::new(fx.clock());
        let student = Actor::student(STUDENT);

        for expected in 1..=2 {
            let out = service
                .submit_attempt(&fx.db, &student, task.id, &numeric_answer("11"))
                .await
                .unwrap();
            assert!(!out.is_correct);
            assert_eq!(out.task_state.status, TaskStatus::InProgress);
            assert_eq!(out.task_state.wrong_attempts, expected);
            assert_eq!(out.task_state.locked_until, None);
            assert_eq!(out.units[&unit.id].status, UnitStatus::InProgress);
        }

        let third = service
            .submit_attempt(&fx.db, &student, task.id, &numeric_answer("11"))
            .await
            .unwrap();
        let until = fx.now() + Duration::minutes(LOCK_MINUTES);
        assert_eq!(third.escalation, Escalation::Block);
        assert_eq!(third.task_state.status, TaskStatus::Blocked);
        assert_eq!(third.task_state.locked_until, Some(until));

        let notes = notification::Model::for_recipient(&fx.db, TEACHER).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::TaskLocked);
        assert_eq!(notes[0].student_id, STUDENT);

        // Even a correct answer is refused while the block is live.
        let err = service
            .submit_attempt(&fx.db, &student, task.id, &numeric_answer("12"))
            .await
            .unwrap_err();
        match err {
            ServiceError::TaskBlocked { locked_until } => assert_eq!(locked_until, until),
            other => panic!("expected TaskBlocked, got {other:?}"),
        }
        let attempts = attempt::Model::for_student_and_task(&fx.db, STUDENT, task.id)
            .await
            .unwrap();
        assert_eq!(attempts.len(), 3);

        fx.clock.advance(Duration::minutes(LOCK_MINUTES + 1));
        for _ in 4..=5 {
            let out = service
                .submit_attempt(&fx.db, &student, task.id, &numeric_answer("0"))
                .await
                .unwrap();
            assert_eq!(out.task_state.status, TaskStatus::InProgress);
        }
        let sixth = service
            .submit_attempt(&fx.db, &student, task.id, &numeric_answer("0"))
            .await
            .unwrap();
        assert_eq!(sixth.escalation, Escalation::AutoCredit);
        assert_eq!(sixth.task_state.status, TaskStatus::CreditedWithoutProgress);
        assert_eq!(sixth.task_state.wrong_attempts, 6);
        assert!(sixth.task_state.required_skipped);
        assert_eq!(sixth.task_state.locked_until, None);
        assert_eq!(sixth.task_state.credited_at, Some(fx.now()));

        let snap = &sixth.units[&unit.id];
        assert_eq!(snap.metrics.counted_tasks, 1);
        assert_eq!(snap.metrics.solved_tasks, 0);
        assert_eq!(snap.status, UnitStatus::Completed);

        let notes = notification::Model::for_recipient(&fx.db, TEACHER).await.unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[1].kind, NotificationKind::RequiredTaskSkipped);
        let skipped = domain_event::Model::of_type(&fx.db, "RequiredTaskSkippedFlagSet")
            .await
            .unwrap();
        assert_eq!(skipped.len(), 1);

        let err = service
            .submit_attempt(&fx.db, &student, task.id, &numeric_answer("12"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "TASK_ALREADY_CREDITED");
    }

    #[tokio::test]
    async fn optional_task_auto_credit_does_not_flag_skip() {
        let fx = Fixture::new().await;
        let unit = fx.unit(1, 1).await;
        let task = fx.numeric_task(unit.id, false, "1").await;
        let service = AttemptService::new(fx.clock());
        let student = Actor::student(STUDENT);

        for n in 1..=6 {
            if n == 4 {
                fx.clock.advance(Duration::minutes(LOCK_MINUTES));
            }
            service
                .submit_attempt(&fx.db, &student, task.id, &numeric_answer("2"))
                .await
                .unwrap();
        }
        let state = fx.task_state(STUDENT, task.id).await;
        assert_eq!(state.status, TaskStatus::CreditedWithoutProgress);
        assert!(!state.required_skipped);
        let notes = notification::Model::for_recipient(&fx.db, TEACHER).await.unwrap();
        assert_eq!(notes.len(), 1);
    }

    #[tokio::test]
    async fn completing_prerequisite_unlocks_next_unit() {
        let fx = Fixture::new().await;
        let a = fx.unit(1, 2).await;
        let b = fx.unit(2, 1).await;
        fx.edge(a.id, b.id).await;
        let first = fx.numeric_task(a.id, false, "3").await;
        let second = fx.choice_task(a.id, AnswerType::SingleChoice, &["c"]).await;
        fx.numeric_task(b.id, false, "9").await;

        let before = SectionAvailability::recompute(&fx.db, STUDENT, fx.section.id, fx.now())
            .await
            .unwrap();
        assert_eq!(before[&a.id].status, UnitStatus::Available);
        assert_eq!(before[&b.id].status, UnitStatus::Locked);

        let service = AttemptService::new(fx.clock());
        let student = Actor::student(STUDENT);
        let out = service
            .submit_attempt(&fx.db, &student, first.id, &numeric_answer(" 3 "))
            .await
            .unwrap();
        assert!(out.is_correct);
        assert_eq!(out.units[&a.id].status, UnitStatus::InProgress);
        assert_eq!(out.units[&b.id].status, UnitStatus::Locked);

        let out = service
            .submit_attempt(
                &fx.db,
                &student,
                second.id,
                &json!({"type": "single_choice", "choice_key": "c"}),
            )
            .await
            .unwrap();
        assert_eq!(out.task_state.status, TaskStatus::Correct);
        assert_eq!(out.units[&a.id].status, UnitStatus::Completed);
        assert_eq!(out.units[&a.id].metrics.completion_percent, 100);
        assert_eq!(out.units[&b.id].status, UnitStatus::Available);
        assert_eq!(out.units[&b.id].became_available_at, Some(fx.now()));
    }

    #[tokio::test]
    async fn empty_multi_choice_counts_as_wrong_attempt() {
        let fx = Fixture::new().await;
        let unit = fx.unit(1, 1).await;
        let task = fx.choice_task(unit.id, AnswerType::MultiChoice, &["a"]).await;
        let service = AttemptService::new(fx.clock());

        let out = service
            .submit_attempt(
                &fx.db,
                &Actor::student(STUDENT),
                task.id,
                &json!({"type": "multi_choice", "choice_keys": []}),
            )
            .await
            .unwrap();
        assert!(!out.is_correct);
        assert_eq!(out.task_state.wrong_attempts, 1);
        assert_eq!(out.task_state.status, TaskStatus::InProgress);
        assert_eq!(
            attempt::Model::for_student_and_task(&fx.db, STUDENT, task.id)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn malformed_answers_leave_no_trace() {
        let fx = Fixture::new().await;
        let unit = fx.unit(1, 1).await;
        let task = fx.choice_task(unit.id, AnswerType::MultiChoice, &["a", "b"]).await;
        let service = AttemptService::new(fx.clock());
        let student = Actor::student(STUDENT);

        let err = service
            .submit_attempt(
                &fx.db,
                &student,
                task.id,
                &json!({"type": "multi_choice", "choice_keys": ["a", "zz"]}),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_CHOICE_KEY");

        let err = service
            .submit_attempt(&fx.db, &student, task.id, &numeric_answer("1"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_ANSWER");

        assert!(
            student_task_state::Model::find(&fx.db, STUDENT, task.id)
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            attempt::Model::for_student_and_task(&fx.db, STUDENT, task.id)
                .await
                .unwrap()
                .is_empty()
        );
        assert!(domain_event::Model::all_in_order(&fx.db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn new_revision_resets_uncredited_progress() {
        let fx = Fixture::new().await;
        let unit = fx.unit(1, 1).await;
        let task = fx.numeric_task(unit.id, false, "5").await;
        let service = AttemptService::new(fx.clock());
        let student = Actor::student(STUDENT);

        for _ in 0..3 {
            service
                .submit_attempt(&fx.db, &student, task.id, &numeric_answer("4"))
                .await
                .unwrap();
        }
        assert_eq!(fx.task_state(STUDENT, task.id).await.status, TaskStatus::Blocked);

        let revised = fx.revise_numeric(task.id, "6").await;
        let out = service
            .submit_attempt(&fx.db, &student, task.id, &numeric_answer("4"))
            .await
            .unwrap();
        assert_eq!(out.task_state.wrong_attempts, 1);
        assert_eq!(out.task_state.status, TaskStatus::InProgress);
        assert_eq!(out.task_state.active_revision_id, revised.active_revision_id);
        assert_eq!(out.attempt.attempt_no, 1);

        let out = service
            .submit_attempt(&fx.db, &student, task.id, &numeric_answer("6"))
            .await
            .unwrap();
        assert_eq!(out.attempt.attempt_no, 2);
        assert_eq!(out.task_state.credited_revision_id, revised.active_revision_id);
    }

    #[tokio::test]
    async fn preconditions_are_enforced() {
        let fx = Fixture::new().await;
        let unit = fx.unit(1, 1).await;
        let service = AttemptService::new(fx.clock());
        let student = Actor::student(STUDENT);

        let bare = task::Model::create(&fx.db, unit.id, "No revision", 1, AnswerType::Numeric, false, true)
            .await
            .unwrap();
        let err = service
            .submit_attempt(&fx.db, &student, bare.id, &numeric_answer("1"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "TASK_ACTIVE_REVISION_MISSING");

        let photo = fx.photo_task(unit.id, false).await;
        let err = service
            .submit_attempt(&fx.db, &student, photo.id, &numeric_answer("1"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "TASK_REQUIRES_PHOTO_SUBMISSION");

        let err = service
            .submit_attempt(&fx.db, &student, 4242, &numeric_answer("1"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");

        let numeric = fx.numeric_task(unit.id, false, "1").await;
        let err = service
            .submit_attempt(&fx.db, &Actor::teacher(TEACHER), numeric.id, &numeric_answer("1"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");
    }

    #[tokio::test]
    async fn block_without_lead_teacher_skips_notification() {
        let fx = Fixture::with_lead_teacher(None).await;
        let unit = fx.unit(1, 1).await;
        let task = fx.numeric_task(unit.id, false, "1").await;
        let service = AttemptService::new(fx.clock());
        let student = Actor::student(STUDENT);

        for _ in 0..3 {
            service
                .submit_attempt(&fx.db, &student, task.id, &numeric_answer("9"))
                .await
                .unwrap();
        }
        assert_eq!(fx.task_state(STUDENT, task.id).await.status, TaskStatus::Blocked);
        assert!(notification::Model::for_recipient(&fx.db, TEACHER).await.unwrap().is_empty());
        let locked = domain_event::Model::of_type(&fx.db, "TaskLockedForStudent")
            .await
            .unwrap();
        assert_eq!(locked.len(), 1);
    }
}
