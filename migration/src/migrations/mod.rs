pub mod m202510010001_create_courses;
pub mod m202510010002_create_sections;
pub mod m202510010003_create_units;
pub mod m202510010004_create_unit_graph_edges;
pub mod m202510010005_create_tasks;
pub mod m202510010006_create_task_revisions;
pub mod m202510010007_create_student_task_states;
pub mod m202510010008_create_student_unit_states;
pub mod m202510010009_create_attempts;
pub mod m202510010010_create_photo_task_submissions;
pub mod m202510010011_create_notifications;
pub mod m202510010012_create_domain_events;
