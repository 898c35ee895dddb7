use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use db::models::{
    section,
    student_task_state::{self, TaskStatus},
    student_unit_state, unit,
};
use sea_orm::{ConnectionTrait, DatabaseTransaction, IntoActiveModel, Set, TransactionTrait};
use util::clock::Clock;

use crate::actor::Actor;
use crate::context::TaskContext;
use crate::error::{ServiceError, ServiceResult};
use crate::events::DomainEvent;
use crate::section_availability::SectionAvailability;
use crate::unit_snapshot::UnitSnapshot;

#[derive(Debug, Clone)]
pub struct CreditOutcome {
    pub task_state: student_task_state::Model,
    pub units: BTreeMap<i64, UnitSnapshot>,
}

/// Manual interventions a teacher can make on one student's progress.
pub struct TeacherActionService {
    clock: Arc<dyn Clock>,
}

impl TeacherActionService {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Upgrades an auto-credited task to `teacher_credited`, which also counts
    /// it as solved and clears the required-skip flag.
    pub async fn credit_task<C>(
        &self,
        db: &C,
        actor: &Actor,
        student_id: i64,
        task_id: i64,
    ) -> ServiceResult<CreditOutcome>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let teacher_id = actor.require_teacher()?;
        let now = self.clock.now();

        let txn = db.begin().await?;
        let outcome = credit_in(&txn, teacher_id, student_id, task_id, now).await?;
        txn.commit().await?;
        Ok(outcome)
    }

    /// Opens a unit for one student regardless of its prerequisites. The flag
    /// is sticky; recomputes never clear it.
    pub async fn override_open_unit<C>(
        &self,
        db: &C,
        actor: &Actor,
        student_id: i64,
        unit_id: i64,
    ) -> ServiceResult<BTreeMap<i64, UnitSnapshot>>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let teacher_id = actor.require_teacher()?;
        let now = self.clock.now();

        let txn = db.begin().await?;
        let units = override_in(&txn, teacher_id, student_id, unit_id, now).await?;
        txn.commit().await?;
        Ok(units)
    }
}

async fn credit_in(
    txn: &DatabaseTransaction,
    teacher_id: i64,
    student_id: i64,
    task_id: i64,
    now: DateTime<Utc>,
) -> ServiceResult<CreditOutcome> {
    let ctx = TaskContext::load(txn, task_id).await?;
    let state = student_task_state::Model::find(txn, student_id, task_id)
        .await?
        .ok_or(ServiceError::not_found("student task state", task_id))?;

    match state.status {
        TaskStatus::CreditedWithoutProgress => {}
        TaskStatus::TeacherCredited | TaskStatus::Correct | TaskStatus::Accepted => {
            return Err(ServiceError::TaskAlreadyCredited);
        }
        other => return Err(ServiceError::TaskNotCreditable(other)),
    }

    let credited_revision = state.credited_revision_id.or(state.active_revision_id);
    let mut active = state.into_active_model();
    active.status = Set(TaskStatus::TeacherCredited);
    active.required_skipped = Set(false);
    active.locked_until = Set(None);
    active.credited_revision_id = Set(credited_revision);
    active.credited_at = Set(Some(now));
    active.updated_at = Set(now);
    let task_state = student_task_state::Model::save_state(txn, active).await?;

    DomainEvent::TaskTeacherCreditedForStudent {
        student_id,
        task_id,
        teacher_id,
    }
    .record(txn, Some(teacher_id), now)
    .await?;
    tracing::info!(student_id, task_id, teacher_id, "task credited by teacher");

    let units = SectionAvailability::recompute(txn, student_id, ctx.section.id, now).await?;
    Ok(CreditOutcome { task_state, units })
}

async fn override_in(
    txn: &DatabaseTransaction,
    teacher_id: i64,
    student_id: i64,
    unit_id: i64,
    now: DateTime<Utc>,
) -> ServiceResult<BTreeMap<i64, UnitSnapshot>> {
    let unit = unit::Model::get_by_id(txn, unit_id)
        .await?
        .filter(|u| u.is_published)
        .ok_or(ServiceError::not_found("unit", unit_id))?;
    let section = section::Model::find_published(txn, unit.section_id)
        .await?
        .ok_or(ServiceError::not_found("unit", unit_id))?;

    student_unit_state::Model::mark_override_opened(txn, student_id, unit.id, now).await?;
    DomainEvent::UnitOverrideOpened {
        student_id,
        unit_id,
        teacher_id,
    }
    .record(txn, Some(teacher_id), now)
    .await?;
    tracing::info!(student_id, unit_id, teacher_id, "unit opened by teacher");

    SectionAvailability::recompute(txn, student_id, section.id, now).await
}
