use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};

/// Directed edge `prereq_unit_id -> unit_id`: the prerequisite must be completed
/// before the dependent unit opens.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "unit_graph_edges")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub section_id: i64,
    pub prereq_unit_id: i64,
    pub unit_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::section::Entity",
        from = "Column::SectionId",
        to = "super::section::Column::Id"
    )]
    Section,
}

impl Related<super::section::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Section.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create<C>(
        db: &C,
        section_id: i64,
        prereq_unit_id: i64,
        unit_id: i64,
    ) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        ActiveModel {
            section_id: Set(section_id),
            prereq_unit_id: Set(prereq_unit_id),
            unit_id: Set(unit_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    /// Edges whose *both* endpoints are among `unit_ids`.
    pub async fn among_units<C>(db: &C, unit_ids: &[i64]) -> Result<Vec<Self>, DbErr>
    where
        C: ConnectionTrait,
    {
        if unit_ids.is_empty() {
            return Ok(Vec::new());
        }
        Entity::find()
            .filter(Column::UnitId.is_in(unit_ids.to_vec()))
            .filter(Column::PrereqUnitId.is_in(unit_ids.to_vec()))
            .all(db)
            .await
    }

    pub async fn for_section<C>(db: &C, section_id: i64) -> Result<Vec<Self>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find()
            .filter(Column::SectionId.eq(section_id))
            .all(db)
            .await
    }

    pub async fn delete_for_section<C>(db: &C, section_id: i64) -> Result<u64, DbErr>
    where
        C: ConnectionTrait,
    {
        let res = Entity::delete_many()
            .filter(Column::SectionId.eq(section_id))
            .exec(db)
            .await?;
        Ok(res.rows_affected)
    }
}
