use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DbErr, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};

/// Outcome recorded on an attempt row.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttemptResult {
    #[sea_orm(string_value = "correct")]
    Correct,
    #[sea_orm(string_value = "incorrect")]
    Incorrect,
    #[sea_orm(string_value = "pending_review")]
    PendingReview,
    #[sea_orm(string_value = "accepted")]
    Accepted,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

/// Append-only attempt log. Only a photo attempt's `result` is ever rewritten,
/// once, when the teacher decides.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "attempts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub student_id: i64,
    pub task_id: i64,
    pub revision_id: i64,
    /// 1-based, sequential per (student, revision).
    pub attempt_no: i32,
    #[sea_orm(column_type = "JsonBinary")]
    pub answer: Json,
    pub result: AttemptResult,
    pub created_at: DateTime<Utc>,
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
    pub async fn create<C>(
        db: &C,
        student_id: i64,
        task_id: i64,
        revision_id: i64,
        attempt_no: i32,
        answer: Json,
        result: AttemptResult,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        ActiveModel {
            student_id: Set(student_id),
            task_id: Set(task_id),
            revision_id: Set(revision_id),
            attempt_no: Set(attempt_no),
            answer: Set(answer),
            result: Set(result),
            created_at: Set(created_at),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    pub async fn get_by_id<C>(db: &C, id: i64) -> Result<Option<Self>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find_by_id(id).one(db).await
    }

    /// `1 + max(attempt_no)` for the student on this revision.
    pub async fn next_attempt_no<C>(db: &C, student_id: i64, revision_id: i64) -> Result<i32, DbErr>
    where
        C: ConnectionTrait,
    {
        let latest = Entity::find()
            .filter(Column::StudentId.eq(student_id))
            .filter(Column::RevisionId.eq(revision_id))
            .order_by_desc(Column::AttemptNo)
            .one(db)
            .await?;
        Ok(latest.map(|a| a.attempt_no + 1).unwrap_or(1))
    }

    /// Task ids among `task_ids` the student has attempted at least once.
    pub async fn attempted_task_ids<C>(
        db: &C,
        student_id: i64,
        task_ids: &[i64],
    ) -> Result<Vec<i64>, DbErr>
    where
        C: ConnectionTrait,
    {
        if task_ids.is_empty() {
            return Ok(Vec::new());
        }
        Entity::find()
            .select_only()
            .column(Column::TaskId)
            .distinct()
            .filter(Column::StudentId.eq(student_id))
            .filter(Column::TaskId.is_in(task_ids.to_vec()))
            .into_tuple::<i64>()
            .all(db)
            .await
    }

    pub async fn for_student_and_task<C>(
        db: &C,
        student_id: i64,
        task_id: i64,
    ) -> Result<Vec<Self>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find()
            .filter(Column::StudentId.eq(student_id))
            .filter(Column::TaskId.eq(task_id))
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }

    /// Rewrites the result of a pending photo attempt.
    pub async fn set_result<C>(db: &C, id: i64, result: AttemptResult) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let Some(attempt) = Self::get_by_id(db, id).await? else {
            return Err(DbErr::RecordNotFound(format!("Attempt {id} not found")));
        };
        let mut active = attempt.into_active_model();
        active.result = Set(result);
        active.update(db).await
    }
}
