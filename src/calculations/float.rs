use super::NodeCalendars;
use crate::dependency::{Dependency, RelationshipType};
use crate::task::Task;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

pub struct FloatPass<'a> {
    calendars: &'a NodeCalendars<'a>,
}

impl<'a> FloatPass<'a> {
    pub fn new(calendars: &'a NodeCalendars<'a>) -> Self {
        Self { calendars }
    }

    /// Total float, free float and the critical flag for every task.
    /// Completed tasks carry no float and are never critical.
    pub fn execute(&self, graph: &mut DiGraph<Task, Dependency>) {
        let floats: Vec<(NodeIndex, Option<f64>, Option<f64>)> = graph
            .node_indices()
            .map(|node| {
                if graph[node].is_completed() {
                    (node, None, None)
                } else {
                    (node, self.total_float(graph, node), self.free_float(graph, node))
                }
            })
            .collect();

        for (node, total, free) in floats {
            let task = &mut graph[node];
            task.total_float_hours = total;
            task.free_float_hours = free;
            task.is_critical = total.is_some_and(|hours| hours <= 0.0);
        }
    }

    /// Work hours from early to late finish; negative when behind.
    fn total_float(&self, graph: &DiGraph<Task, Dependency>, node: NodeIndex) -> Option<f64> {
        let task = &graph[node];
        let (early, late) = (task.early_finish?, task.late_finish?);
        Some(self.calendars.get(node).signed_work_hours_between(early, late))
    }

    /// Slack before any Finish-to-Start successor is pushed. `None` without
    /// such successors.
    fn free_float(&self, graph: &DiGraph<Task, Dependency>, node: NodeIndex) -> Option<f64> {
        let early_finish = graph[node].early_finish?;
        let calendar = self.calendars.get(node);
        graph
            .edges_directed(node, Direction::Outgoing)
            .filter(|edge| edge.weight().relationship == RelationshipType::FinishToStart)
            .filter_map(|edge| {
                let successor_start = graph[edge.target()].early_start?;
                Some(
                    calendar.work_hours_between(early_finish, successor_start)
                        - edge.weight().lag_hours,
                )
            })
            .min_by(f64::total_cmp)
            .map(|slack| slack.max(0.0))
    }
}
