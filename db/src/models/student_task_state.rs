use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};

/// Per student × task progress status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    #[sea_orm(string_value = "not_started")]
    NotStarted,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    /// Temporarily locked after the third wrong answer.
    #[sea_orm(string_value = "blocked")]
    Blocked,
    /// Auto-credited after the sixth wrong answer.
    #[sea_orm(string_value = "credited_without_progress")]
    CreditedWithoutProgress,
    #[sea_orm(string_value = "teacher_credited")]
    TeacherCredited,
    #[sea_orm(string_value = "correct")]
    Correct,
    #[sea_orm(string_value = "pending_review")]
    PendingReview,
    #[sea_orm(string_value = "accepted")]
    Accepted,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::NotStarted
    }
}

impl TaskStatus {
    /// Statuses that end the attempt flow for the current revision.
    pub fn is_credited(self) -> bool {
        matches!(
            self,
            TaskStatus::Correct
                | TaskStatus::CreditedWithoutProgress
                | TaskStatus::TeacherCredited
                | TaskStatus::Accepted
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "student_task_states")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub student_id: i64,
    pub task_id: i64,
    pub status: TaskStatus,
    pub wrong_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub required_skipped: bool,
    /// Revision this state was built against.
    pub active_revision_id: Option<i64>,
    pub credited_revision_id: Option<i64>,
    pub credited_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::task::Entity",
        from = "Column::TaskId",
        to = "super::task::Column::Id"
    )]
    Task,
}

impl Related<super::task::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Task.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn find<C>(db: &C, student_id: i64, task_id: i64) -> Result<Option<Self>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find()
            .filter(Column::StudentId.eq(student_id))
            .filter(Column::TaskId.eq(task_id))
            .one(db)
            .await
    }

    pub async fn for_student_and_tasks<C>(
        db: &C,
        student_id: i64,
        task_ids: &[i64],
    ) -> Result<Vec<Self>, DbErr>
    where
        C: ConnectionTrait,
    {
        if task_ids.is_empty() {
            return Ok(Vec::new());
        }
        Entity::find()
            .filter(Column::StudentId.eq(student_id))
            .filter(Column::TaskId.is_in(task_ids.to_vec()))
            .all(db)
            .await
    }

    /// Distinct students holding any task state for the given tasks.
    pub async fn student_ids_for_tasks<C>(db: &C, task_ids: &[i64]) -> Result<Vec<i64>, DbErr>
    where
        C: ConnectionTrait,
    {
        if task_ids.is_empty() {
            return Ok(Vec::new());
        }
        Entity::find()
            .select_only()
            .column(Column::StudentId)
            .distinct()
            .filter(Column::TaskId.is_in(task_ids.to_vec()))
            .into_tuple::<i64>()
            .all(db)
            .await
    }

    /// Fresh in-memory state for a first interaction; not yet persisted.
    pub fn blank(student_id: i64, task_id: i64, revision_id: Option<i64>) -> ActiveModel {
        ActiveModel {
            student_id: Set(student_id),
            task_id: Set(task_id),
            status: Set(TaskStatus::NotStarted),
            wrong_attempts: Set(0),
            locked_until: Set(None),
            required_skipped: Set(false),
            active_revision_id: Set(revision_id),
            credited_revision_id: Set(None),
            credited_at: Set(None),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
    }

    /// Inserts or updates depending on whether the row already exists.
    pub async fn save_state<C>(db: &C, active: ActiveModel) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if active.id.is_set() || active.id.is_unchanged() {
            active.update(db).await
        } else {
            active.insert(db).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credited_statuses() {
        assert!(TaskStatus::Correct.is_credited());
        assert!(TaskStatus::CreditedWithoutProgress.is_credited());
        assert!(TaskStatus::TeacherCredited.is_credited());
        assert!(TaskStatus::Accepted.is_credited());
        assert!(!TaskStatus::Blocked.is_credited());
        assert!(!TaskStatus::PendingReview.is_credited());
        assert!(!TaskStatus::Rejected.is_credited());
    }

    #[test]
    fn status_display_matches_storage() {
        assert_eq!(
            TaskStatus::CreditedWithoutProgress.to_string(),
            "credited_without_progress"
        );
        assert_eq!(TaskStatus::PendingReview.to_string(), "pending_review");
    }
}
