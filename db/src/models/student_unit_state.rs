use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DbErr, EntityTrait, IntoActiveModel, QueryFilter,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};

/// Derived availability of a unit for one student.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UnitStatus {
    #[sea_orm(string_value = "locked")]
    Locked,
    #[sea_orm(string_value = "available")]
    Available,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "completed")]
    Completed,
}

impl Default for UnitStatus {
    fn default() -> Self {
        Self::Locked
    }
}

/// Cached snapshot row. The three `*_at` stamps are first-write-wins.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "student_unit_states")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub student_id: i64,
    pub unit_id: i64,
    pub status: UnitStatus,
    /// Sticky teacher flag bypassing prerequisite gating.
    pub override_opened: bool,
    pub counted_tasks: i32,
    pub solved_tasks: i32,
    pub total_tasks: i32,
    pub completion_percent: i32,
    pub solved_percent: i32,
    pub became_available_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::unit::Entity",
        from = "Column::UnitId",
        to = "super::unit::Column::Id"
    )]
    Unit,
}

impl Related<super::unit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Unit.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn find<C>(db: &C, student_id: i64, unit_id: i64) -> Result<Option<Self>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find()
            .filter(Column::StudentId.eq(student_id))
            .filter(Column::UnitId.eq(unit_id))
            .one(db)
            .await
    }

    pub async fn for_student_and_units<C>(
        db: &C,
        student_id: i64,
        unit_ids: &[i64],
    ) -> Result<Vec<Self>, DbErr>
    where
        C: ConnectionTrait,
    {
        if unit_ids.is_empty() {
            return Ok(Vec::new());
        }
        Entity::find()
            .filter(Column::StudentId.eq(student_id))
            .filter(Column::UnitId.is_in(unit_ids.to_vec()))
            .all(db)
            .await
    }

    /// Distinct students holding a snapshot row for any of the given units.
    pub async fn student_ids_for_units<C>(db: &C, unit_ids: &[i64]) -> Result<Vec<i64>, DbErr>
    where
        C: ConnectionTrait,
    {
        if unit_ids.is_empty() {
            return Ok(Vec::new());
        }
        Entity::find()
            .select_only()
            .column(Column::StudentId)
            .distinct()
            .filter(Column::UnitId.is_in(unit_ids.to_vec()))
            .into_tuple::<i64>()
            .all(db)
            .await
    }

    /// Raises the override flag, creating a locked placeholder row when none exists yet.
    /// The following recompute fills in the real status and metrics.
    pub async fn mark_override_opened<C>(
        db: &C,
        student_id: i64,
        unit_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        match Self::find(db, student_id, unit_id).await? {
            Some(existing) => {
                let mut active = existing.into_active_model();
                active.override_opened = Set(true);
                active.updated_at = Set(now);
                active.update(db).await
            }
            None => {
                ActiveModel {
                    student_id: Set(student_id),
                    unit_id: Set(unit_id),
                    status: Set(UnitStatus::Locked),
                    override_opened: Set(true),
                    counted_tasks: Set(0),
                    solved_tasks: Set(0),
                    total_tasks: Set(0),
                    completion_percent: Set(0),
                    solved_percent: Set(0),
                    became_available_at: Set(None),
                    started_at: Set(None),
                    completed_at: Set(None),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(db)
                .await
            }
        }
    }
}
