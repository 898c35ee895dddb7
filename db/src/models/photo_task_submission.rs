use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DbErr, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PhotoSubmissionStatus {
    #[sea_orm(string_value = "submitted")]
    Submitted,
    #[sea_orm(string_value = "accepted")]
    Accepted,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

/// Uploaded photo set for one photo attempt. Rejected rows are kept for audit;
/// a resubmission always creates a new row.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "photo_task_submissions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub attempt_id: i64,
    pub student_id: i64,
    pub task_id: i64,
    /// Object-storage keys, 1 to 5 of them.
    #[sea_orm(column_type = "JsonBinary")]
    pub asset_keys: Json,
    pub status: PhotoSubmissionStatus,
    pub rejected_reason: Option<String>,
    pub reviewed_by: Option<i64>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::attempt::Entity",
        from = "Column::AttemptId",
        to = "super::attempt::Column::Id"
    )]
    Attempt,
}

impl Related<super::attempt::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Attempt.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create<C>(
        db: &C,
        attempt_id: i64,
        student_id: i64,
        task_id: i64,
        asset_keys: &[String],
        created_at: DateTime<Utc>,
    ) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let keys = serde_json::to_value(asset_keys).map_err(|e| DbErr::Custom(e.to_string()))?;
        ActiveModel {
            attempt_id: Set(attempt_id),
            student_id: Set(student_id),
            task_id: Set(task_id),
            asset_keys: Set(keys),
            status: Set(PhotoSubmissionStatus::Submitted),
            rejected_reason: Set(None),
            reviewed_by: Set(None),
            reviewed_at: Set(None),
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

    pub fn parsed_asset_keys(&self) -> serde_json::Result<Vec<String>> {
        serde_json::from_value(self.asset_keys.clone())
    }

    /// Records the teacher's decision on this submission.
    pub async fn record_decision<C>(
        self,
        db: &C,
        status: PhotoSubmissionStatus,
        rejected_reason: Option<String>,
        reviewer_id: i64,
        reviewed_at: DateTime<Utc>,
    ) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active = self.into_active_model();
        active.status = Set(status);
        active.rejected_reason = Set(rejected_reason);
        active.reviewed_by = Set(Some(reviewer_id));
        active.reviewed_at = Set(Some(reviewed_at));
        active.update(db).await
    }
}
