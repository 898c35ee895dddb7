use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};

/// One expected numeric part, e.g. `{"key": "x", "correct_value": "12.5"}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumericPart {
    pub key: String,
    pub correct_value: String,
}

/// A declared choice of a single/multi choice task.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub key: String,
    #[serde(default)]
    pub label: String,
}

/// Immutable version of a task's correctness data.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "task_revisions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub task_id: i64,
    pub revision_no: i32,
    #[sea_orm(column_type = "JsonBinary")]
    pub numeric_parts: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub choices: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub correct_choice_keys: Json,
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
    /// Inserts the next revision for `task_id` (revision numbers start at 1).
    pub async fn create<C>(
        db: &C,
        task_id: i64,
        numeric_parts: &[NumericPart],
        choices: &[Choice],
        correct_choice_keys: &[String],
    ) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let latest = Entity::find()
            .filter(Column::TaskId.eq(task_id))
            .order_by_desc(Column::RevisionNo)
            .one(db)
            .await?;
        let revision_no = latest.map(|r| r.revision_no + 1).unwrap_or(1);

        let to_json = |v: serde_json::Result<Json>| v.map_err(|e| DbErr::Custom(e.to_string()));

        ActiveModel {
            task_id: Set(task_id),
            revision_no: Set(revision_no),
            numeric_parts: Set(to_json(serde_json::to_value(numeric_parts))?),
            choices: Set(to_json(serde_json::to_value(choices))?),
            correct_choice_keys: Set(to_json(serde_json::to_value(correct_choice_keys))?),
            created_at: Set(Utc::now()),
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

    pub fn parsed_numeric_parts(&self) -> serde_json::Result<Vec<NumericPart>> {
        serde_json::from_value(self.numeric_parts.clone())
    }

    pub fn parsed_choices(&self) -> serde_json::Result<Vec<Choice>> {
        serde_json::from_value(self.choices.clone())
    }

    pub fn parsed_correct_choice_keys(&self) -> serde_json::Result<Vec<String>> {
        serde_json::from_value(self.correct_choice_keys.clone())
    }
}
