//! Learning progress and availability engine.
//!
//! Every mutating entry point opens one transaction on the handle it is given,
//! applies the task-state change and recomputes the affected section inside it.

pub mod actor;
pub mod answer;
pub mod attempt;
pub mod context;
pub mod error;
pub mod events;
pub mod notifications;
pub mod photo_review;
pub mod prerequisite_graph;
pub mod section_availability;
pub mod task_credit;
pub mod teacher_actions;
pub mod unit_graph;
pub mod unit_snapshot;

#[cfg(test)]
mod test_support;

pub use actor::{Actor, Role};
pub use error::{ErrorKind, ServiceError, ServiceResult};
