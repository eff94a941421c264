use super::NodeCalendars;
use crate::dependency::{Dependency, RelationshipType};
use crate::task::{Task, TaskStatus};
use chrono::NaiveDateTime;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

/// Early dates, predecessors before successors.
pub struct ForwardPass<'a> {
    calendars: &'a NodeCalendars<'a>,
    order: &'a [NodeIndex],
}

impl<'a> ForwardPass<'a> {
    pub fn new(calendars: &'a NodeCalendars<'a>, order: &'a [NodeIndex]) -> Self {
        Self { calendars, order }
    }

    /// Writes `early_start` and `early_finish` on every task in `order`.
    /// Work that has not started is held back to `data_date` when one is given.
    pub fn execute(
        &self,
        graph: &mut DiGraph<Task, Dependency>,
        project_start: NaiveDateTime,
        data_date: Option<NaiveDateTime>,
    ) {
        for &node in self.order {
            let (early_start, early_finish) =
                self.early_dates(graph, node, project_start, data_date);
            let task = &mut graph[node];
            task.early_start = Some(early_start);
            task.early_finish = Some(early_finish);
        }
    }

    fn early_dates(
        &self,
        graph: &DiGraph<Task, Dependency>,
        node: NodeIndex,
        project_start: NaiveDateTime,
        data_date: Option<NaiveDateTime>,
    ) -> (NaiveDateTime, NaiveDateTime) {
        let task = &graph[node];
        let calendar = self.calendars.get(node);

        if task.is_completed() {
            let start = task.actual_start.unwrap_or(project_start);
            return (start, task.actual_finish.unwrap_or(start));
        }

        let duration = task.effective_duration_hours();

        if let (TaskStatus::InProgress, Some(actual_start)) = (task.status, task.actual_start) {
            let resume = data_date.map_or(actual_start, |date| actual_start.max(date));
            let finish = if task.is_milestone() {
                resume
            } else {
                calendar.add_work_hours(resume, duration)
            };
            return (actual_start, finish);
        }

        let mut start = project_start;
        for edge in graph.edges_directed(node, Direction::Incoming) {
            let predecessor = &graph[edge.source()];
            let (Some(pred_start), Some(pred_finish)) =
                (predecessor.early_start, predecessor.early_finish)
            else {
                continue;
            };
            let lag = edge.weight().lag_hours;
            let driven = match edge.weight().relationship {
                RelationshipType::FinishToStart => calendar.shift_work_hours(pred_finish, lag),
                RelationshipType::StartToStart => calendar.shift_work_hours(pred_start, lag),
                RelationshipType::FinishToFinish => calendar
                    .subtract_work_hours(calendar.shift_work_hours(pred_finish, lag), duration),
                RelationshipType::StartToFinish => calendar
                    .subtract_work_hours(calendar.shift_work_hours(pred_start, lag), duration),
            };
            start = start.max(driven);
        }

        if let Some(constraint) = task.constraint.filter(|c| c.constraint_type.limits_start()) {
            start = start.max(constraint.date);
        }
        if let Some(date) = data_date {
            start = start.max(date);
        }

        if task.is_milestone() {
            return (start, start);
        }
        if duration > 0.0 {
            start = calendar.advance_to_work_time(start);
        }
        (start, calendar.add_work_hours(start, duration))
    }
}
