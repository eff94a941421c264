use super::NodeCalendars;
use crate::dependency::{Dependency, RelationshipType};
use crate::task::Task;
use chrono::NaiveDateTime;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

/// Late dates, successors before predecessors.
pub struct BackwardPass<'a> {
    calendars: &'a NodeCalendars<'a>,
    order: &'a [NodeIndex],
}

impl<'a> BackwardPass<'a> {
    /// `order` is the forward topological order; it is walked in reverse.
    pub fn new(calendars: &'a NodeCalendars<'a>, order: &'a [NodeIndex]) -> Self {
        Self { calendars, order }
    }

    /// Writes `late_start` and `late_finish`. Requires early dates.
    pub fn execute(&self, graph: &mut DiGraph<Task, Dependency>, project_end: NaiveDateTime) {
        for &node in self.order.iter().rev() {
            let (late_start, late_finish) = self.late_dates(graph, node, project_end);
            let task = &mut graph[node];
            task.late_start = Some(late_start);
            task.late_finish = Some(late_finish);
        }
    }

    fn late_dates(
        &self,
        graph: &DiGraph<Task, Dependency>,
        node: NodeIndex,
        project_end: NaiveDateTime,
    ) -> (NaiveDateTime, NaiveDateTime) {
        let task = &graph[node];
        let calendar = self.calendars.get(node);

        // Actuals are history: nothing later in the network can move them.
        if task.is_completed() {
            if let (Some(start), Some(finish)) = (task.early_start, task.early_finish) {
                return (start, finish);
            }
        }

        let duration = task.effective_duration_hours();
        let mut finish: Option<NaiveDateTime> = None;
        for edge in graph.edges_directed(node, Direction::Outgoing) {
            let successor = &graph[edge.target()];
            let (Some(succ_start), Some(succ_finish)) =
                (successor.late_start, successor.late_finish)
            else {
                continue;
            };
            let lag = -edge.weight().lag_hours;
            let required = match edge.weight().relationship {
                RelationshipType::FinishToStart => calendar.shift_work_hours(succ_start, lag),
                RelationshipType::StartToStart => calendar
                    .add_work_hours(calendar.shift_work_hours(succ_start, lag), duration),
                RelationshipType::FinishToFinish => calendar.shift_work_hours(succ_finish, lag),
                RelationshipType::StartToFinish => calendar
                    .add_work_hours(calendar.shift_work_hours(succ_finish, lag), duration),
            };
            finish = Some(finish.map_or(required, |current| current.min(required)));
        }

        let mut finish = finish.unwrap_or(project_end);
        if let Some(constraint) = task.constraint.filter(|c| c.constraint_type.limits_finish()) {
            finish = finish.min(constraint.date);
        }

        if task.is_milestone() {
            return (finish, finish);
        }
        if duration > 0.0 {
            finish = calendar.retreat_to_work_time(finish);
        }
        (calendar.subtract_work_hours(finish, duration), finish)
    }
}
