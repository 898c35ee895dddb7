use chrono::{DateTime, Utc};
use db::models::{
    course,
    notification::{self, NotificationKind},
    task,
};
use sea_orm::ConnectionTrait;
use serde_json::json;

use crate::error::ServiceResult;

/// Notifies the course's lead teacher about a student's task.
///
/// Courses without a lead teacher are skipped with a warning; the surrounding
/// state change still goes through.
pub async fn notify_lead_teacher<C>(
    db: &C,
    course: &course::Model,
    kind: NotificationKind,
    student_id: i64,
    task: &task::Model,
    now: DateTime<Utc>,
) -> ServiceResult<Option<notification::Model>>
where
    C: ConnectionTrait,
{
    let Some(recipient_id) = course.lead_teacher_id else {
        tracing::warn!(
            course_id = course.id,
            task_id = task.id,
            %kind,
            "course has no lead teacher, notification dropped"
        );
        return Ok(None);
    };

    let payload = json!({
        "course_id": course.id,
        "task_title": task.title,
        "unit_id": task.unit_id,
    });
    let row =
        notification::Model::create(db, recipient_id, kind, student_id, task.id, payload, now)
            .await?;
    Ok(Some(row))
}
