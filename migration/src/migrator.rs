use sea_orm_migration::prelude::*;

use crate::migrations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(migrations::m202510010001_create_courses::Migration),
            Box::new(migrations::m202510010002_create_sections::Migration),
            Box::new(migrations::m202510010003_create_units::Migration),
            Box::new(migrations::m202510010004_create_unit_graph_edges::Migration),
            Box::new(migrations::m202510010005_create_tasks::Migration),
            Box::new(migrations::m202510010006_create_task_revisions::Migration),
            Box::new(migrations::m202510010007_create_student_task_states::Migration),
            Box::new(migrations::m202510010008_create_student_unit_states::Migration),
            Box::new(migrations::m202510010009_create_attempts::Migration),
            Box::new(migrations::m202510010010_create_photo_task_submissions::Migration),
            Box::new(migrations::m202510010011_create_notifications::Migration),
            Box::new(migrations::m202510010012_create_domain_events::Migration),
        ]
    }
}
