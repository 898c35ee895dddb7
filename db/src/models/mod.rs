pub mod attempt;
pub mod course;
pub mod domain_event;
pub mod notification;
pub mod photo_task_submission;
pub mod section;
pub mod student_task_state;
pub mod student_unit_state;
pub mod task;
pub mod task_revision;
pub mod unit;
pub mod unit_graph_edge;

pub use attempt::Entity as Attempt;
pub use course::Entity as Course;
pub use domain_event::Entity as DomainEvent;
pub use notification::Entity as Notification;
pub use photo_task_submission::Entity as PhotoTaskSubmission;
pub use section::Entity as Section;
pub use student_task_state::Entity as StudentTaskState;
pub use student_unit_state::Entity as StudentUnitState;
pub use task::Entity as Task;
pub use task_revision::Entity as TaskRevision;
pub use unit::Entity as Unit;
pub use unit_graph_edge::Entity as UnitGraphEdge;
