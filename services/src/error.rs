use chrono::{DateTime, Utc};
use db::models::student_task_state::TaskStatus;
use sea_orm::DbErr;
use validator::ValidationErrors;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Coarse classification callers map onto transport status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Conflict,
    Forbidden,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("invalid answer: {0}")]
    InvalidAnswer(String),

    #[error("unknown choice key '{0}'")]
    UnknownChoiceKey(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("answer type '{0}' cannot be evaluated automatically")]
    UnsupportedAnswerType(String),

    #[error("task {0} has no active revision")]
    TaskActiveRevisionMissing(i64),

    #[error("task {0} must be answered with a photo submission")]
    TaskRequiresPhotoSubmission(i64),

    #[error("task {0} does not accept photo submissions")]
    NotAPhotoTask(i64),

    #[error("task is already credited")]
    TaskAlreadyCredited,

    #[error("task is blocked until {locked_until}")]
    TaskBlocked { locked_until: DateTime<Utc> },

    #[error("a photo submission for this task is awaiting review")]
    PhotoReviewPending,

    #[error("photo submission {0} has already been reviewed")]
    SubmissionAlreadyReviewed(i64),

    #[error("task cannot be teacher-credited from status '{0}'")]
    TaskNotCreditable(TaskStatus),

    #[error("unit {0} cannot be its own prerequisite")]
    GraphSelfLoop(i64),

    #[error("edge {0} -> {1} is listed more than once")]
    GraphDuplicateEdge(i64, i64),

    #[error("edge {0} -> {1} references a unit outside the section")]
    GraphEdgeOutsideSection(i64, i64),

    #[error("prerequisite graph would contain a cycle")]
    GraphCycle,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("database error: {0}")]
    Database(#[from] DbErr),

    #[error("stored data could not be decoded: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        ServiceError::NotFound { entity, id }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::NotFound { .. } => "NOT_FOUND",
            ServiceError::InvalidAnswer(_) => "INVALID_ANSWER",
            ServiceError::UnknownChoiceKey(_) => "UNKNOWN_CHOICE_KEY",
            ServiceError::InvalidInput(_) => "INVALID_INPUT",
            ServiceError::UnsupportedAnswerType(_) => "UNSUPPORTED_ANSWER_TYPE",
            ServiceError::TaskActiveRevisionMissing(_) => "TASK_ACTIVE_REVISION_MISSING",
            ServiceError::TaskRequiresPhotoSubmission(_) => "TASK_REQUIRES_PHOTO_SUBMISSION",
            ServiceError::NotAPhotoTask(_) => "NOT_A_PHOTO_TASK",
            ServiceError::TaskAlreadyCredited => "TASK_ALREADY_CREDITED",
            ServiceError::TaskBlocked { .. } => "TASK_BLOCKED",
            ServiceError::PhotoReviewPending => "PHOTO_REVIEW_PENDING",
            ServiceError::SubmissionAlreadyReviewed(_) => "SUBMISSION_ALREADY_REVIEWED",
            ServiceError::TaskNotCreditable(_) => "TASK_NOT_CREDITABLE",
            ServiceError::GraphSelfLoop(_) => "GRAPH_SELF_LOOP",
            ServiceError::GraphDuplicateEdge(..) => "GRAPH_DUPLICATE_EDGE",
            ServiceError::GraphEdgeOutsideSection(..) => "GRAPH_EDGE_OUTSIDE_SECTION",
            ServiceError::GraphCycle => "GRAPH_CYCLE",
            ServiceError::Forbidden(_) => "FORBIDDEN",
            ServiceError::Database(_) => "DATABASE_ERROR",
            ServiceError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::InvalidAnswer(_)
            | ServiceError::UnknownChoiceKey(_)
            | ServiceError::InvalidInput(_)
            | ServiceError::UnsupportedAnswerType(_)
            | ServiceError::TaskRequiresPhotoSubmission(_)
            | ServiceError::NotAPhotoTask(_) => ErrorKind::InvalidInput,
            ServiceError::NotFound { .. } => ErrorKind::NotFound,
            ServiceError::TaskActiveRevisionMissing(_)
            | ServiceError::TaskAlreadyCredited
            | ServiceError::TaskBlocked { .. }
            | ServiceError::PhotoReviewPending
            | ServiceError::SubmissionAlreadyReviewed(_)
            | ServiceError::TaskNotCreditable(_)
            | ServiceError::GraphSelfLoop(_)
            | ServiceError::GraphDuplicateEdge(..)
            | ServiceError::GraphEdgeOutsideSection(..)
            | ServiceError::GraphCycle => ErrorKind::Conflict,
            ServiceError::Forbidden(_) => ErrorKind::Forbidden,
            ServiceError::Database(_) | ServiceError::Serialization(_) => ErrorKind::Internal,
        }
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(errors: ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .values()
            .flat_map(|errs| {
                errs.iter()
                    .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
            })
            .collect::<Vec<_>>()
            .join("; ");
        ServiceError::InvalidInput(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_kinds_line_up() {
        let blocked = ServiceError::TaskBlocked {
            locked_until: Utc::now(),
        };
        assert_eq!(blocked.code(), "TASK_BLOCKED");
        assert_eq!(blocked.kind(), ErrorKind::Conflict);

        let unknown = ServiceError::UnknownChoiceKey("z".into());
        assert_eq!(unknown.kind(), ErrorKind::InvalidInput);

        let missing = ServiceError::not_found("section", 3);
        assert_eq!(missing.kind(), ErrorKind::NotFound);
        assert_eq!(missing.to_string(), "section 3 not found");
    }
}
