//! Per-unit progress math for one student.
//!
//! Everything here is pure; the section engine feeds it rows loaded from the
//! database and persists what comes out.

use chrono::{DateTime, Utc};
use db::models::{student_task_state::TaskStatus, student_unit_state::UnitStatus};
use serde::Serialize;

use crate::task_credit::{is_counted, is_solved};

/// What the engine knows about one published task for one student.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSignal {
    pub task_id: i64,
    pub is_required: bool,
    pub status: Option<TaskStatus>,
    pub attempted: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UnitMetrics {
    pub total_tasks: i32,
    pub counted_tasks: i32,
    pub solved_tasks: i32,
    pub required_tasks: i32,
    pub required_counted_tasks: i32,
    pub completion_percent: i32,
    pub solved_percent: i32,
}

/// One unit's derived state as of a recompute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitSnapshot {
    pub unit_id: i64,
    pub sort_order: i32,
    pub status: UnitStatus,
    pub override_opened: bool,
    pub prereqs_completed: bool,
    pub has_attempt: bool,
    pub is_completed: bool,
    pub metrics: UnitMetrics,
    pub became_available_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

fn percent(part: i32, total: i32) -> i32 {
    if total == 0 {
        return 0;
    }
    (i64::from(part) * 100 / i64::from(total)) as i32
}

pub fn compute_unit_metrics(tasks: &[TaskSignal]) -> UnitMetrics {
    let mut metrics = UnitMetrics {
        total_tasks: tasks.len() as i32,
        ..Default::default()
    };

    for task in tasks {
        let counted = is_counted(task.status);
        if counted {
            metrics.counted_tasks += 1;
        }
        if is_solved(task.status) {
            metrics.solved_tasks += 1;
        }
        if task.is_required {
            metrics.required_tasks += 1;
            if counted {
                metrics.required_counted_tasks += 1;
            }
        }
    }

    metrics.completion_percent = percent(metrics.counted_tasks, metrics.total_tasks);
    metrics.solved_percent = percent(metrics.solved_tasks, metrics.total_tasks);
    metrics
}

/// Required tasks that still hold the unit back from completion.
pub fn pending_required_tasks(tasks: &[TaskSignal]) -> Vec<i64> {
    tasks
        .iter()
        .filter(|t| t.is_required && !is_counted(t.status))
        .map(|t| t.task_id)
        .collect()
}

/// Counted tasks a unit needs: the configured minimum, raised to the number of
/// required tasks.
pub fn effective_threshold(min_counted_tasks: i32, required_tasks: i32) -> i32 {
    min_counted_tasks.max(required_tasks)
}

pub fn compute_unit_completed(metrics: &UnitMetrics, min_counted_tasks: i32) -> bool {
    metrics.required_counted_tasks == metrics.required_tasks
        && metrics.counted_tasks >= effective_threshold(min_counted_tasks, metrics.required_tasks)
}

/// `prereqs_open` is "all direct prerequisites completed, or the unit was
/// opened by a teacher". A closed unit stays locked whatever its tasks say.
pub fn compute_unit_status(is_completed: bool, prereqs_open: bool, has_attempt: bool) -> UnitStatus {
    if !prereqs_open {
        UnitStatus::Locked
    } else if is_completed {
        UnitStatus::Completed
    } else if has_attempt {
        UnitStatus::InProgress
    } else {
        UnitStatus::Available
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(task_id: i64, is_required: bool, status: Option<TaskStatus>) -> TaskSignal {
        TaskSignal {
            task_id,
            is_required,
            status,
            attempted: status.is_some(),
        }
    }

    #[test]
    fn empty_unit_is_zero_percent() {
        let m = compute_unit_metrics(&[]);
        assert_eq!(m.total_tasks, 0);
        assert_eq!(m.completion_percent, 0);
        assert_eq!(m.solved_percent, 0);
    }

    #[test]
    fn percentages_floor() {
        let tasks = [
            signal(1, false, Some(TaskStatus::Correct)),
            signal(2, false, Some(TaskStatus::CreditedWithoutProgress)),
            signal(3, false, None),
        ];
        let m = compute_unit_metrics(&tasks);
        assert_eq!(m.counted_tasks, 2);
        assert_eq!(m.solved_tasks, 1);
        assert_eq!(m.completion_percent, 66);
        assert_eq!(m.solved_percent, 33);
    }

    #[test]
    fn one_missing_required_task_blocks_completion() {
        // Five tasks, two required, only one of those counted.
        let tasks = [
            signal(1, true, Some(TaskStatus::Correct)),
            signal(2, true, Some(TaskStatus::Blocked)),
            signal(3, false, Some(TaskStatus::Correct)),
            signal(4, false, Some(TaskStatus::Accepted)),
            signal(5, false, Some(TaskStatus::TeacherCredited)),
        ];
        let m = compute_unit_metrics(&tasks);
        assert_eq!(m.counted_tasks, 4);
        assert_eq!(m.required_tasks, 2);
        assert_eq!(m.required_counted_tasks, 1);
        assert!(!compute_unit_completed(&m, 1));
        assert!(!compute_unit_completed(&m, 0));
    }

    #[test]
    fn pending_required_lists_uncounted_required_tasks() {
        let tasks = [
            signal(1, true, Some(TaskStatus::Correct)),
            signal(2, true, Some(TaskStatus::Blocked)),
            signal(3, true, None),
            signal(4, false, None),
            signal(5, true, Some(TaskStatus::CreditedWithoutProgress)),
        ];
        assert_eq!(pending_required_tasks(&tasks), vec![2, 3]);
        assert!(pending_required_tasks(&[]).is_empty());
    }

    #[test]
    fn completes_exactly_at_effective_threshold() {
        let tasks = [
            signal(1, true, Some(TaskStatus::Correct)),
            signal(2, true, Some(TaskStatus::CreditedWithoutProgress)),
            signal(3, false, Some(TaskStatus::Correct)),
            signal(4, false, None),
            signal(5, false, None),
        ];
        let m = compute_unit_metrics(&tasks);
        assert_eq!(effective_threshold(3, m.required_tasks), 3);
        assert!(compute_unit_completed(&m, 3));
        assert!(!compute_unit_completed(&m, 4));
    }

    #[test]
    fn required_count_raises_low_minimum() {
        assert_eq!(effective_threshold(1, 3), 3);
        assert_eq!(effective_threshold(4, 2), 4);
    }

    #[test]
    fn status_rules() {
        assert_eq!(compute_unit_status(false, true, false), UnitStatus::Available);
        assert_eq!(compute_unit_status(false, true, true), UnitStatus::InProgress);
        assert_eq!(compute_unit_status(true, true, true), UnitStatus::Completed);
        assert_eq!(compute_unit_status(false, false, true), UnitStatus::Locked);
        assert_eq!(compute_unit_status(true, false, true), UnitStatus::Locked);
    }
}
