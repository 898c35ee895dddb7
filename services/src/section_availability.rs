//! Recomputes every unit snapshot of one section for one student.
//!
//! Units are evaluated in prerequisite order and each unit's gate looks at the
//! statuses computed earlier in the same call, never at stored rows, so a task
//! credited in unit A opens unit B in the very same recompute.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use db::models::{
    attempt, section,
    student_task_state::{self, TaskStatus},
    student_unit_state::{self, UnitStatus},
    task, unit, unit_graph_edge,
};
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, IntoActiveModel, Set, TransactionTrait,
};

use crate::error::{ServiceError, ServiceResult};
use crate::prerequisite_graph::{GraphNode, PrerequisiteGraph};
use crate::unit_snapshot::{
    TaskSignal, UnitSnapshot, compute_unit_completed, compute_unit_metrics, compute_unit_status,
    pending_required_tasks,
};

pub struct SectionAvailability;

impl SectionAvailability {
    /// Recomputes and persists the student's unit snapshots for a published
    /// section, keyed by unit id.
    ///
    /// Runs in its own transaction, nested as a savepoint when `db` is already
    /// a transaction, so a failure leaves nothing half-written.
    pub async fn recompute<C>(
        db: &C,
        student_id: i64,
        section_id: i64,
        now: DateTime<Utc>,
    ) -> ServiceResult<BTreeMap<i64, UnitSnapshot>>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let txn = db.begin().await?;
        let snapshots = recompute_in(&txn, student_id, section_id, now).await?;
        txn.commit().await?;
        Ok(snapshots)
    }

    /// Same as [`Self::recompute`], ordered the way the section lists its units.
    pub async fn section_progress<C>(
        db: &C,
        student_id: i64,
        section_id: i64,
        now: DateTime<Utc>,
    ) -> ServiceResult<Vec<UnitSnapshot>>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let mut units: Vec<UnitSnapshot> = Self::recompute(db, student_id, section_id, now)
            .await?
            .into_values()
            .collect();
        units.sort_by_key(|s| (s.sort_order, s.unit_id));
        Ok(units)
    }

    /// Recomputes the section for each student in turn. Returns how many were
    /// processed.
    pub async fn recompute_for_students<C>(
        db: &C,
        student_ids: &[i64],
        section_id: i64,
        now: DateTime<Utc>,
    ) -> ServiceResult<usize>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        for &student_id in student_ids {
            Self::recompute(db, student_id, section_id, now).await?;
        }
        tracing::info!(
            section_id,
            students = student_ids.len(),
            "section recomputed for students"
        );
        Ok(student_ids.len())
    }

    /// Students with any task or unit state in the section, ascending.
    pub async fn students_with_state<C>(db: &C, section_id: i64) -> ServiceResult<Vec<i64>>
    where
        C: ConnectionTrait,
    {
        let unit_ids: Vec<i64> = unit::Model::all_for_section(db, section_id)
            .await?
            .into_iter()
            .map(|u| u.id)
            .collect();
        let task_ids: Vec<i64> = task::Model::published_for_units(db, &unit_ids)
            .await?
            .into_iter()
            .map(|t| t.id)
            .collect();

        let mut students: BTreeSet<i64> =
            student_unit_state::Model::student_ids_for_units(db, &unit_ids)
                .await?
                .into_iter()
                .collect();
        students.extend(student_task_state::Model::student_ids_for_tasks(db, &task_ids).await?);
        Ok(students.into_iter().collect())
    }
}

async fn recompute_in<C>(
    db: &C,
    student_id: i64,
    section_id: i64,
    now: DateTime<Utc>,
) -> ServiceResult<BTreeMap<i64, UnitSnapshot>>
where
    C: ConnectionTrait,
{
    let Some(section) = section::Model::find_published(db, section_id).await? else {
        return Err(ServiceError::not_found("section", section_id));
    };

    let units = unit::Model::published_for_section(db, section.id).await?;
    if units.is_empty() {
        tracing::debug!(section_id, student_id, "section has no published units");
        return Ok(BTreeMap::new());
    }
    let unit_ids: Vec<i64> = units.iter().map(|u| u.id).collect();

    let edges = unit_graph_edge::Model::among_units(db, &unit_ids).await?;
    let graph = PrerequisiteGraph::new(
        units.iter().map(|u| GraphNode {
            id: u.id,
            sort_order: u.sort_order,
        }),
        edges.iter().map(|e| (e.prereq_unit_id, e.unit_id)),
    );

    let tasks = task::Model::published_for_units(db, &unit_ids).await?;
    let task_ids: Vec<i64> = tasks.iter().map(|t| t.id).collect();

    let statuses: HashMap<i64, TaskStatus> =
        student_task_state::Model::for_student_and_tasks(db, student_id, &task_ids)
            .await?
            .into_iter()
            .map(|s| (s.task_id, s.status))
            .collect();
    let attempted: HashSet<i64> = attempt::Model::attempted_task_ids(db, student_id, &task_ids)
        .await?
        .into_iter()
        .collect();
    let mut previous: HashMap<i64, student_unit_state::Model> =
        student_unit_state::Model::for_student_and_units(db, student_id, &unit_ids)
            .await?
            .into_iter()
            .map(|row| (row.unit_id, row))
            .collect();

    let mut signals: HashMap<i64, Vec<TaskSignal>> = HashMap::new();
    for t in &tasks {
        signals.entry(t.unit_id).or_default().push(TaskSignal {
            task_id: t.id,
            is_required: t.is_required,
            status: statuses.get(&t.id).copied(),
            attempted: attempted.contains(&t.id),
        });
    }

    let units_by_id: HashMap<i64, &unit::Model> = units.iter().map(|u| (u.id, u)).collect();
    let mut snapshots: BTreeMap<i64, UnitSnapshot> = BTreeMap::new();

    for unit_id in graph.topological_order() {
        let Some(unit) = units_by_id.get(&unit_id) else {
            continue;
        };
        let unit_tasks = signals.get(&unit_id).map(Vec::as_slice).unwrap_or(&[]);

        let metrics = compute_unit_metrics(unit_tasks);
        let is_completed = compute_unit_completed(&metrics, unit.min_counted_tasks_to_complete);
        if !is_completed {
            tracing::trace!(
                student_id,
                unit_id,
                pending_required = ?pending_required_tasks(unit_tasks),
                "unit not completed"
            );
        }
        let has_attempt = unit_tasks.iter().any(|t| t.attempted);
        let prereqs_completed = graph.prerequisites_of(unit_id).iter().all(|p| {
            snapshots
                .get(p)
                .is_some_and(|s| s.status == UnitStatus::Completed)
        });

        let prior = previous.remove(&unit_id);
        let override_opened = prior.as_ref().is_some_and(|row| row.override_opened);
        let status =
            compute_unit_status(is_completed, prereqs_completed || override_opened, has_attempt);

        let snapshot = UnitSnapshot {
            unit_id,
            sort_order: unit.sort_order,
            status,
            override_opened,
            prereqs_completed,
            has_attempt,
            is_completed,
            metrics,
            became_available_at: first_write(
                prior.as_ref().and_then(|r| r.became_available_at),
                status != UnitStatus::Locked,
                now,
            ),
            started_at: first_write(prior.as_ref().and_then(|r| r.started_at), has_attempt, now),
            completed_at: first_write(
                prior.as_ref().and_then(|r| r.completed_at),
                status == UnitStatus::Completed,
                now,
            ),
        };

        persist(db, student_id, prior, &snapshot, now).await?;
        snapshots.insert(unit_id, snapshot);
    }

    tracing::debug!(
        section_id,
        student_id,
        units = snapshots.len(),
        "section availability recomputed"
    );
    Ok(snapshots)
}

/// Keeps an existing stamp; otherwise stamps `now` once `reached` holds.
fn first_write(
    existing: Option<DateTime<Utc>>,
    reached: bool,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    existing.or_else(|| reached.then_some(now))
}

fn row_matches(row: &student_unit_state::Model, snap: &UnitSnapshot) -> bool {
    row.status == snap.status
        && row.counted_tasks == snap.metrics.counted_tasks
        && row.solved_tasks == snap.metrics.solved_tasks
        && row.total_tasks == snap.metrics.total_tasks
        && row.completion_percent == snap.metrics.completion_percent
        && row.solved_percent == snap.metrics.solved_percent
        && row.became_available_at == snap.became_available_at
        && row.started_at == snap.started_at
        && row.completed_at == snap.completed_at
}

async fn persist<C>(
    db: &C,
    student_id: i64,
    prior: Option<student_unit_state::Model>,
    snap: &UnitSnapshot,
    now: DateTime<Utc>,
) -> ServiceResult<()>
where
    C: ConnectionTrait,
{
    let mut active = match prior {
        Some(row) if row_matches(&row, snap) => return Ok(()),
        Some(row) => {
            if row.status != snap.status {
                tracing::info!(
                    student_id,
                    unit_id = snap.unit_id,
                    from = %row.status,
                    to = %snap.status,
                    "unit status changed"
                );
            }
            row.into_active_model()
        }
        None => student_unit_state::ActiveModel {
            student_id: Set(student_id),
            unit_id: Set(snap.unit_id),
            override_opened: Set(false),
            ..Default::default()
        },
    };

    active.status = Set(snap.status);
    active.counted_tasks = Set(snap.metrics.counted_tasks);
    active.solved_tasks = Set(snap.metrics.solved_tasks);
    active.total_tasks = Set(snap.metrics.total_tasks);
    active.completion_percent = Set(snap.metrics.completion_percent);
    active.solved_percent = Set(snap.metrics.solved_percent);
    active.became_available_at = Set(snap.became_available_at);
    active.started_at = Set(snap.started_at);
    active.completed_at = Set(snap.completed_at);
    active.updated_at = Set(now);

    if active.id.is_not_set() {
        active.insert(db).await?;
    } else {
        active.update(db).await?;
    }
    Ok(())
}
