use crate::error::{ServiceError, ServiceResult};

/// Role of an already-authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Student,
    Teacher,
}

/// Identity handed over by the auth layer. Trusted as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
}

impl Actor {
    pub fn student(user_id: i64) -> Self {
        Self {
            user_id,
            role: Role::Student,
        }
    }

    pub fn teacher(user_id: i64) -> Self {
        Self {
            user_id,
            role: Role::Teacher,
        }
    }

    pub(crate) fn require_student(&self) -> ServiceResult<i64> {
        match self.role {
            Role::Student => Ok(self.user_id),
            Role::Teacher => Err(ServiceError::Forbidden(
                "only students can submit answers".into(),
            )),
        }
    }

    pub(crate) fn require_teacher(&self) -> ServiceResult<i64> {
        match self.role {
            Role::Teacher => Ok(self.user_id),
            Role::Student => Err(ServiceError::Forbidden(
                "this action requires a teacher".into(),
            )),
        }
    }
}
