//! Editing a section's prerequisite graph.
//!
//! Edits replace the whole edge set at once. Validation is strict here even
//! though the availability engine tolerates bad graphs.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use db::models::{section, unit, unit_graph_edge};
use sea_orm::{ConnectionTrait, DatabaseTransaction, TransactionTrait};
use serde::{Deserialize, Serialize};
use util::clock::Clock;

use crate::actor::Actor;
use crate::error::{ServiceError, ServiceResult};
use crate::events::DomainEvent;
use crate::prerequisite_graph::{GraphNode, PrerequisiteGraph};
use crate::section_availability::SectionAvailability;

/// `unit_id` requires `prereq_unit_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeInput {
    pub prereq_unit_id: i64,
    pub unit_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphUpdateOutcome {
    pub section_id: i64,
    pub edge_count: usize,
    pub recomputed_students: Vec<i64>,
}

/// Checks a proposed edge set against the units of a section.
pub fn validate_edges(units: &[unit::Model], edges: &[EdgeInput]) -> ServiceResult<()> {
    let ids: HashSet<i64> = units.iter().map(|u| u.id).collect();
    let mut seen = HashSet::with_capacity(edges.len());

    for edge in edges {
        if edge.prereq_unit_id == edge.unit_id {
            return Err(ServiceError::GraphSelfLoop(edge.unit_id));
        }
        if !ids.contains(&edge.prereq_unit_id) || !ids.contains(&edge.unit_id) {
            return Err(ServiceError::GraphEdgeOutsideSection(
                edge.prereq_unit_id,
                edge.unit_id,
            ));
        }
        if !seen.insert(*edge) {
            return Err(ServiceError::GraphDuplicateEdge(
                edge.prereq_unit_id,
                edge.unit_id,
            ));
        }
    }

    let graph = PrerequisiteGraph::new(
        units.iter().map(|u| GraphNode {
            id: u.id,
            sort_order: u.sort_order,
        }),
        edges.iter().map(|e| (e.prereq_unit_id, e.unit_id)),
    );
    if graph.has_cycle() {
        return Err(ServiceError::GraphCycle);
    }
    Ok(())
}

pub struct UnitGraphService {
    clock: Arc<dyn Clock>,
}

impl UnitGraphService {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub async fn section_edges<C>(db: &C, section_id: i64) -> ServiceResult<Vec<EdgeInput>>
    where
        C: ConnectionTrait,
    {
        let mut edges: Vec<EdgeInput> = unit_graph_edge::Model::for_section(db, section_id)
            .await?
            .into_iter()
            .map(|e| EdgeInput {
                prereq_unit_id: e.prereq_unit_id,
                unit_id: e.unit_id,
            })
            .collect();
        edges.sort_by_key(|e| (e.prereq_unit_id, e.unit_id));
        Ok(edges)
    }

    /// Replaces every edge of the section, then recomputes each student who
    /// already has progress there, one after another.
    pub async fn replace_section_graph<C>(
        &self,
        db: &C,
        actor: &Actor,
        section_id: i64,
        edges: &[EdgeInput],
    ) -> ServiceResult<GraphUpdateOutcome>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let teacher_id = actor.require_teacher()?;
        let now = self.clock.now();

        let txn = db.begin().await?;
        let outcome = replace_in(&txn, teacher_id, section_id, edges, now).await?;
        txn.commit().await?;
        Ok(outcome)
    }
}

async fn replace_in(
    txn: &DatabaseTransaction,
    teacher_id: i64,
    section_id: i64,
    edges: &[EdgeInput],
    now: DateTime<Utc>,
) -> ServiceResult<GraphUpdateOutcome> {
    let section = section::Model::get_by_id(txn, section_id)
        .await?
        .ok_or(ServiceError::not_found("section", section_id))?;
    let units = unit::Model::all_for_section(txn, section.id).await?;
    validate_edges(&units, edges)?;

    let removed = unit_graph_edge::Model::delete_for_section(txn, section.id).await?;
    for edge in edges {
        unit_graph_edge::Model::create(txn, section.id, edge.prereq_unit_id, edge.unit_id).await?;
    }
    tracing::info!(
        section_id,
        removed,
        added = edges.len(),
        "section prerequisite graph replaced"
    );

    let students = if section.is_published {
        let students = SectionAvailability::students_with_state(txn, section.id).await?;
        SectionAvailability::recompute_for_students(txn, &students, section.id, now).await?;
        students
    } else {
        Vec::new()
    };

    DomainEvent::UnitGraphUpdated {
        section_id,
        edges: edges.iter().map(|e| (e.prereq_unit_id, e.unit_id)).collect(),
        recomputed_students: students.len(),
    }
    .record(txn, Some(teacher_id), now)
    .await?;

    Ok(GraphUpdateOutcome {
        section_id,
        edge_count: edges.len(),
        recomputed_students: students,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Fixture, STUDENT, TEACHER};
    use db::models::{
        student_task_state::TaskStatus,
        student_unit_state::{self, UnitStatus},
    };

    fn edge(prereq_unit_id: i64, unit_id: i64) -> EdgeInput {
        EdgeInput {
            prereq_unit_id,
            unit_id,
        }
    }

    #[tokio::test]
    async fn rejects_invalid_edge_sets() {
        let fx = Fixture::new().await;
        let a = fx.unit(1, 1).await;
        let b = fx.unit(2, 1).await;
        let c = fx.unit(3, 1).await;
        let service = UnitGraphService::new(fx.clock());
        let teacher = Actor::teacher(TEACHER);

        let cases = [
            (vec![edge(a.id, a.id)], "GRAPH_SELF_LOOP"),
            (vec![edge(a.id, b.id), edge(a.id, b.id)], "GRAPH_DUPLICATE_EDGE"),
            (vec![edge(a.id, 9999)], "GRAPH_EDGE_OUTSIDE_SECTION"),
            (
                vec![edge(a.id, b.id), edge(b.id, c.id), edge(c.id, a.id)],
                "GRAPH_CYCLE",
            ),
        ];
        for (edges, code) in cases {
            let err = service
                .replace_section_graph(&fx.db, &teacher, fx.section.id, &edges)
                .await
                .unwrap_err();
            assert_eq!(err.code(), code);
        }
        assert!(
            UnitGraphService::section_edges(&fx.db, fx.section.id)
                .await
                .unwrap()
                .is_empty()
        );

        let err = service
            .replace_section_graph(&fx.db, &Actor::student(STUDENT), fx.section.id, &[])
            .await
            .unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");

        let err = service
            .replace_section_graph(&fx.db, &teacher, 8080, &[])
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn replacing_edges_recomputes_affected_students() {
        let fx = Fixture::new().await;
        let a = fx.unit(1, 1).await;
        let b = fx.unit(2, 1).await;
        let c = fx.unit(3, 1).await;
        fx.edge(a.id, b.id).await;
        fx.numeric_task(a.id, false, "1").await;
        let tb = fx.numeric_task(b.id, false, "2").await;
        fx.numeric_task(c.id, false, "3").await;

        fx.set_status(STUDENT, tb.id, TaskStatus::InProgress).await;
        let before = SectionAvailability::recompute(&fx.db, STUDENT, fx.section.id, fx.now())
            .await
            .unwrap();
        assert_eq!(before[&b.id].status, UnitStatus::Locked);
        assert_eq!(before[&c.id].status, UnitStatus::Available);

        let service = UnitGraphService::new(fx.clock());
        let out = service
            .replace_section_graph(&fx.db, &Actor::teacher(TEACHER), fx.section.id, &[edge(b.id, c.id)])
            .await
            .unwrap();
        assert_eq!(out.edge_count, 1);
        assert_eq!(out.recomputed_students, vec![STUDENT]);
        assert_eq!(
            UnitGraphService::section_edges(&fx.db, fx.section.id).await.unwrap(),
            vec![edge(b.id, c.id)]
        );

        let b_row = student_unit_state::Model::find(&fx.db, STUDENT, b.id).await.unwrap().unwrap();
        let c_row = student_unit_state::Model::find(&fx.db, STUDENT, c.id).await.unwrap().unwrap();
        assert_eq!(b_row.status, UnitStatus::Available);
        assert_eq!(c_row.status, UnitStatus::Locked);
        // Stamped when C was first available; survives the regression.
        assert_eq!(c_row.became_available_at, before[&c.id].became_available_at);
    }
}
