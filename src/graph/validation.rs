use super::TaskNetwork;
use crate::calendar::CalendarSet;
use crate::dependency::RelationshipType;
use crate::task::{CalendarId, TaskId};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// A structural problem found in a network. Diagnostics only: the engine
/// still runs on a network with issues, except for cycles.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum NetworkIssue {
    DanglingDependency {
        predecessor_id: TaskId,
        successor_id: TaskId,
    },
    SelfLoop {
        task_id: TaskId,
    },
    DuplicateDependency {
        predecessor_id: TaskId,
        successor_id: TaskId,
        relationship: RelationshipType,
    },
    Cycle {
        unresolved: usize,
        sample: Vec<TaskId>,
    },
    MissingCalendar {
        task_id: TaskId,
    },
    UnknownCalendar {
        task_id: TaskId,
        calendar_id: CalendarId,
    },
    NegativeDuration {
        task_id: TaskId,
        duration_hours: f64,
    },
}

impl fmt::Display for NetworkIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkIssue::DanglingDependency {
                predecessor_id,
                successor_id,
            } => write!(
                f,
                "dependency {predecessor_id} -> {successor_id} references a missing task"
            ),
            NetworkIssue::SelfLoop { task_id } => {
                write!(f, "task {task_id} depends on itself")
            }
            NetworkIssue::DuplicateDependency {
                predecessor_id,
                successor_id,
                relationship,
            } => write!(
                f,
                "dependency {predecessor_id} -> {successor_id} ({}) appears more than once",
                relationship.as_str()
            ),
            NetworkIssue::Cycle { unresolved, sample } => write!(
                f,
                "dependency cycle among {unresolved} tasks (sample: {sample:?})"
            ),
            NetworkIssue::MissingCalendar { task_id } => {
                write!(f, "task {task_id} has no calendar")
            }
            NetworkIssue::UnknownCalendar {
                task_id,
                calendar_id,
            } => write!(
                f,
                "task {task_id} references unknown calendar {calendar_id}"
            ),
            NetworkIssue::NegativeDuration {
                task_id,
                duration_hours,
            } => write!(f, "task {task_id} has negative duration {duration_hours}"),
        }
    }
}

impl TaskNetwork {
    /// Lists structural issues. An empty list means the network is clean.
    pub fn validate(&self) -> Vec<NetworkIssue> {
        let mut issues: Vec<NetworkIssue> = self
            .dangling_dependencies()
            .iter()
            .map(|dep| NetworkIssue::DanglingDependency {
                predecessor_id: dep.predecessor_id,
                successor_id: dep.successor_id,
            })
            .collect();

        let mut seen = HashSet::new();
        for dep in self.dependencies() {
            if dep.predecessor_id == dep.successor_id {
                issues.push(NetworkIssue::SelfLoop {
                    task_id: dep.predecessor_id,
                });
            }
            if !seen.insert((dep.predecessor_id, dep.successor_id, dep.relationship)) {
                issues.push(NetworkIssue::DuplicateDependency {
                    predecessor_id: dep.predecessor_id,
                    successor_id: dep.successor_id,
                    relationship: dep.relationship,
                });
            }
        }

        for task in self.tasks() {
            if task.calendar_id.is_none() {
                issues.push(NetworkIssue::MissingCalendar {
                    task_id: task.task_id,
                });
            }
            if task.duration_hours < 0.0 {
                issues.push(NetworkIssue::NegativeDuration {
                    task_id: task.task_id,
                    duration_hours: task.duration_hours,
                });
            }
        }

        if let Err(cycle) = self.topological_indices() {
            issues.push(NetworkIssue::Cycle {
                unresolved: cycle.unresolved,
                sample: cycle.sample,
            });
        }

        issues
    }

    /// [`validate`](Self::validate) plus a check that every calendar
    /// reference resolves in `calendars`.
    pub fn validate_with_calendars(&self, calendars: &CalendarSet) -> Vec<NetworkIssue> {
        let mut issues = self.validate();
        issues.extend(self.tasks().filter_map(|task| {
            let calendar_id = task.calendar_id?;
            (!calendars.contains(calendar_id)).then_some(NetworkIssue::UnknownCalendar {
                task_id: task.task_id,
                calendar_id,
            })
        }));
        issues
    }
}
