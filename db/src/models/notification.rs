use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationKind {
    #[sea_orm(string_value = "task_locked")]
    TaskLocked,
    #[sea_orm(string_value = "required_task_skipped")]
    RequiredTaskSkipped,
}

/// Teacher-facing notification about a student's progress on a task.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub recipient_id: i64,
    pub kind: NotificationKind,
    pub student_id: i64,
    pub task_id: i64,
    #[sea_orm(column_type = "JsonBinary")]
    pub payload: Json,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create<C>(
        db: &C,
        recipient_id: i64,
        kind: NotificationKind,
        student_id: i64,
        task_id: i64,
        payload: Json,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        ActiveModel {
            recipient_id: Set(recipient_id),
            kind: Set(kind),
            student_id: Set(student_id),
            task_id: Set(task_id),
            payload: Set(payload),
            is_read: Set(false),
            created_at: Set(created_at),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    pub async fn for_recipient<C>(db: &C, recipient_id: i64) -> Result<Vec<Self>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find()
            .filter(Column::RecipientId.eq(recipient_id))
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }
}
