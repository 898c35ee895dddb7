use db::models::{course, section, task, task_revision, unit};
use sea_orm::ConnectionTrait;

use crate::error::{ServiceError, ServiceResult};

/// A published task together with the published containers above it.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub task: task::Model,
    pub unit: unit::Model,
    pub section: section::Model,
    pub course: course::Model,
}

impl TaskContext {
    /// Fails with not-found when the task or any of its parents is missing
    /// or unpublished.
    pub async fn load<C>(db: &C, task_id: i64) -> ServiceResult<Self>
    where
        C: ConnectionTrait,
    {
        let task = task::Model::find_published(db, task_id)
            .await?
            .ok_or(ServiceError::not_found("task", task_id))?;

        let unit = unit::Model::get_by_id(db, task.unit_id)
            .await?
            .filter(|u| u.is_published)
            .ok_or(ServiceError::not_found("task", task_id))?;

        let section = section::Model::find_published(db, unit.section_id)
            .await?
            .ok_or(ServiceError::not_found("task", task_id))?;

        let course = course::Model::get_by_id(db, section.course_id)
            .await?
            .ok_or(ServiceError::not_found("course", section.course_id))?;

        Ok(Self {
            task,
            unit,
            section,
            course,
        })
    }

    pub async fn active_revision<C>(&self, db: &C) -> ServiceResult<task_revision::Model>
    where
        C: ConnectionTrait,
    {
        let missing = ServiceError::TaskActiveRevisionMissing(self.task.id);
        let Some(revision_id) = self.task.active_revision_id else {
            return Err(missing);
        };
        task_revision::Model::get_by_id(db, revision_id)
            .await?
            .filter(|r| r.task_id == self.task.id)
            .ok_or(missing)
    }
}
