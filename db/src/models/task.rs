use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DbErr, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};

/// How a task expects to be answered.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AnswerType {
    #[sea_orm(string_value = "numeric")]
    Numeric,
    #[sea_orm(string_value = "single_choice")]
    SingleChoice,
    #[sea_orm(string_value = "multi_choice")]
    MultiChoice,
    /// Reviewed by a teacher through the photo flow.
    #[sea_orm(string_value = "photo")]
    Photo,
    /// Free text; stored by content authoring but not auto-evaluated.
    #[sea_orm(string_value = "text")]
    Text,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tasks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub unit_id: i64,
    pub title: String,
    pub sort_order: i32,
    pub answer_type: AnswerType,
    pub is_required: bool,
    pub is_published: bool,
    /// The live revision holding correctness data. Student state is scoped to it.
    pub active_revision_id: Option<i64>,
    pub created_at: DateTime<Utc>,
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
    pub async fn create<C>(
        db: &C,
        unit_id: i64,
        title: &str,
        sort_order: i32,
        answer_type: AnswerType,
        is_required: bool,
        is_published: bool,
    ) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        ActiveModel {
            unit_id: Set(unit_id),
            title: Set(title.to_owned()),
            sort_order: Set(sort_order),
            answer_type: Set(answer_type),
            is_required: Set(is_required),
            is_published: Set(is_published),
            active_revision_id: Set(None),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    pub async fn find_published<C>(db: &C, id: i64) -> Result<Option<Self>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find_by_id(id)
            .filter(Column::IsPublished.eq(true))
            .one(db)
            .await
    }

    /// Published tasks of the given units ordered by `(unit_id, sort_order, id)`.
    pub async fn published_for_units<C>(db: &C, unit_ids: &[i64]) -> Result<Vec<Self>, DbErr>
    where
        C: ConnectionTrait,
    {
        if unit_ids.is_empty() {
            return Ok(Vec::new());
        }
        Entity::find()
            .filter(Column::UnitId.is_in(unit_ids.to_vec()))
            .filter(Column::IsPublished.eq(true))
            .order_by_asc(Column::UnitId)
            .order_by_asc(Column::SortOrder)
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }

    /// Points the task at a new live revision.
    pub async fn set_active_revision<C>(
        db: &C,
        id: i64,
        revision_id: i64,
    ) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let Some(task) = Entity::find_by_id(id).one(db).await? else {
            return Err(DbErr::RecordNotFound(format!("Task {id} not found")));
        };
        let mut active = task.into_active_model();
        active.active_revision_id = Set(Some(revision_id));
        active.update(db).await
    }
}
