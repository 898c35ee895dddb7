use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};

/// Append-only event log row. `event_type` mirrors the serialized event tag.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "domain_events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub event_type: String,
    pub actor_id: Option<i64>,
    #[sea_orm(column_type = "JsonBinary")]
    pub payload: Json,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create<C>(
        db: &C,
        event_type: &str,
        actor_id: Option<i64>,
        payload: Json,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        ActiveModel {
            event_type: Set(event_type.to_owned()),
            actor_id: Set(actor_id),
            payload: Set(payload),
            created_at: Set(created_at),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    pub async fn of_type<C>(db: &C, event_type: &str) -> Result<Vec<Self>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find()
            .filter(Column::EventType.eq(event_type))
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }

    pub async fn all_in_order<C>(db: &C) -> Result<Vec<Self>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find().order_by_asc(Column::Id).all(db).await
    }
}
