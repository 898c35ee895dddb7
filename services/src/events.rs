//! Domain events appended to the `domain_events` log.
//!
//! Every state change the engine makes emits one or more of these inside the
//! same transaction as the change itself, so the log never disagrees with the
//! stored progress.

use chrono::{DateTime, Utc};
use db::models::domain_event;
use sea_orm::ConnectionTrait;
use serde::{Deserialize, Serialize};

use crate::error::ServiceResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum DomainEvent {
    AttemptSubmitted {
        student_id: i64,
        task_id: i64,
        revision_id: i64,
        attempt_id: i64,
        attempt_no: i32,
    },

    AttemptEvaluatedCorrect {
        student_id: i64,
        task_id: i64,
        attempt_id: i64,
    },

    AttemptEvaluatedIncorrect {
        student_id: i64,
        task_id: i64,
        attempt_id: i64,
        wrong_attempts: i32,
    },

    /// Third wrong answer on the current revision.
    TaskLockedForStudent {
        student_id: i64,
        task_id: i64,
        locked_until: DateTime<Utc>,
    },

    /// Sixth wrong answer on the current revision.
    TaskAutoCreditedWithoutProgress { student_id: i64, task_id: i64 },

    RequiredTaskSkippedFlagSet { student_id: i64, task_id: i64 },

    PhotoAttemptSubmitted {
        student_id: i64,
        task_id: i64,
        attempt_id: i64,
        submission_id: i64,
        asset_count: usize,
    },

    PhotoAttemptAccepted {
        student_id: i64,
        task_id: i64,
        submission_id: i64,
        reviewer_id: i64,
    },

    PhotoAttemptRejected {
        student_id: i64,
        task_id: i64,
        submission_id: i64,
        reviewer_id: i64,
        reason: String,
    },

    TaskTeacherCreditedForStudent {
        student_id: i64,
        task_id: i64,
        teacher_id: i64,
    },

    UnitOverrideOpened {
        student_id: i64,
        unit_id: i64,
        teacher_id: i64,
    },

    UnitGraphUpdated {
        section_id: i64,
        edges: Vec<(i64, i64)>,
        recomputed_students: usize,
    },
}

impl DomainEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::AttemptSubmitted { .. } => "AttemptSubmitted",
            DomainEvent::AttemptEvaluatedCorrect { .. } => "AttemptEvaluatedCorrect",
            DomainEvent::AttemptEvaluatedIncorrect { .. } => "AttemptEvaluatedIncorrect",
            DomainEvent::TaskLockedForStudent { .. } => "TaskLockedForStudent",
            DomainEvent::TaskAutoCreditedWithoutProgress { .. } => {
                "TaskAutoCreditedWithoutProgress"
            }
            DomainEvent::RequiredTaskSkippedFlagSet { .. } => "RequiredTaskSkippedFlagSet",
            DomainEvent::PhotoAttemptSubmitted { .. } => "PhotoAttemptSubmitted",
            DomainEvent::PhotoAttemptAccepted { .. } => "PhotoAttemptAccepted",
            DomainEvent::PhotoAttemptRejected { .. } => "PhotoAttemptRejected",
            DomainEvent::TaskTeacherCreditedForStudent { .. } => "TaskTeacherCreditedForStudent",
            DomainEvent::UnitOverrideOpened { .. } => "UnitOverrideOpened",
            DomainEvent::UnitGraphUpdated { .. } => "UnitGraphUpdated",
        }
    }

    /// Appends the event to the log on the caller's connection or transaction.
    pub async fn record<C>(
        &self,
        db: &C,
        actor_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> ServiceResult<domain_event::Model>
    where
        C: ConnectionTrait,
    {
        let payload = serde_json::to_value(self)?;
        let row = domain_event::Model::create(db, self.event_type(), actor_id, payload, now).await?;
        tracing::debug!(event = self.event_type(), id = row.id, "domain event recorded");
        Ok(row)
    }
}
