pub mod backward_pass;
pub mod float;
pub mod forward_pass;

pub use backward_pass::BackwardPass;
pub use float::FloatPass;
pub use forward_pass::ForwardPass;

use crate::calendar::{CalendarSet, WorkCalendar};
use crate::graph::TaskNetwork;
use petgraph::graph::NodeIndex;
use tracing::debug;

/// Each task's calendar, looked up once per run and indexed by node.
#[derive(Debug)]
pub struct NodeCalendars<'a> {
    by_node: Vec<&'a WorkCalendar>,
}

impl<'a> NodeCalendars<'a> {
    /// Unknown or missing calendar ids fall back to `default`.
    pub fn resolve(
        network: &TaskNetwork,
        calendars: &'a CalendarSet,
        default: &'a WorkCalendar,
    ) -> Self {
        let by_node = network
            .tasks()
            .map(|task| {
                if let Some(id) = task.calendar_id {
                    if !calendars.contains(id) {
                        debug!(
                            task_id = task.task_id,
                            calendar_id = id,
                            "unknown calendar, using default"
                        );
                    }
                }
                task.calendar_id
                    .and_then(|id| calendars.get(id))
                    .unwrap_or(default)
            })
            .collect();
        Self { by_node }
    }

    pub fn get(&self, node: NodeIndex) -> &'a WorkCalendar {
        self.by_node[node.index()]
    }
}
