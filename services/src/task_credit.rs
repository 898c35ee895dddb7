//! How a task's status feeds its unit's progress.
//!
//! "Counted" tasks move a unit toward completion. "Solved" tasks are the
//! subset the student actually answered correctly or had accepted.

use db::models::student_task_state::TaskStatus;

pub const COUNTED_STATUSES: [TaskStatus; 4] = [
    TaskStatus::Correct,
    TaskStatus::Accepted,
    TaskStatus::CreditedWithoutProgress,
    TaskStatus::TeacherCredited,
];

pub const SOLVED_STATUSES: [TaskStatus; 3] = [
    TaskStatus::Correct,
    TaskStatus::Accepted,
    TaskStatus::TeacherCredited,
];

/// A missing status is treated as `not_started`.
pub fn is_counted(status: Option<TaskStatus>) -> bool {
    status.is_some_and(|s| COUNTED_STATUSES.contains(&s))
}

pub fn is_solved(status: Option<TaskStatus>) -> bool {
    status.is_some_and(|s| SOLVED_STATUSES.contains(&s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_credit_counts_but_is_not_solved() {
        let s = Some(TaskStatus::CreditedWithoutProgress);
        assert!(is_counted(s));
        assert!(!is_solved(s));
    }

    #[test]
    fn solved_is_a_subset_of_counted() {
        for status in SOLVED_STATUSES {
            assert!(is_counted(Some(status)));
        }
    }

    #[test]
    fn open_statuses_count_for_nothing() {
        for status in [
            TaskStatus::NotStarted,
            TaskStatus::InProgress,
            TaskStatus::Blocked,
            TaskStatus::PendingReview,
            TaskStatus::Rejected,
        ] {
            assert!(!is_counted(Some(status)));
            assert!(!is_solved(Some(status)));
        }
        assert!(!is_counted(None));
    }
}
