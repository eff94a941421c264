use crate::graph::TaskNetwork;
use crate::task::{TaskId, TaskStatus};
use chrono::NaiveDateTime;
use serde::Serialize;

/// Where the computed early dates say a task should be at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PlannedState {
    Complete,
    InProgress,
    NotStarted,
    /// No early dates; the network has not been scheduled.
    Unscheduled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskProgress {
    pub task_id: TaskId,
    pub task_code: String,
    pub planned: PlannedState,
    pub status: TaskStatus,
    pub early_start: Option<NaiveDateTime>,
    pub early_finish: Option<NaiveDateTime>,
    pub is_behind: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleStatus {
    pub as_of: NaiveDateTime,
    pub tasks: Vec<TaskProgress>,
    pub planned_complete: usize,
    pub planned_in_progress: usize,
    pub planned_not_started: usize,
    pub unscheduled: usize,
    /// Planned complete but not completed, or planned started but not started.
    pub behind: Vec<TaskId>,
}

fn planned_state(
    early_start: Option<NaiveDateTime>,
    early_finish: Option<NaiveDateTime>,
    as_of: NaiveDateTime,
) -> PlannedState {
    match (early_start, early_finish) {
        (Some(_), Some(finish)) if finish <= as_of => PlannedState::Complete,
        (Some(start), Some(_)) if start <= as_of => PlannedState::InProgress,
        (Some(_), Some(_)) => PlannedState::NotStarted,
        _ => PlannedState::Unscheduled,
    }
}

/// Status of every task at `as_of` against the early dates of the last run.
pub fn schedule_at_date(network: &TaskNetwork, as_of: NaiveDateTime) -> ScheduleStatus {
    let tasks: Vec<TaskProgress> = network
        .tasks()
        .map(|task| {
            let planned = planned_state(task.early_start, task.early_finish, as_of);
            let is_behind = match planned {
                PlannedState::Complete => task.status != TaskStatus::Completed,
                PlannedState::InProgress => task.status == TaskStatus::NotStarted,
                PlannedState::NotStarted | PlannedState::Unscheduled => false,
            };
            TaskProgress {
                task_id: task.task_id,
                task_code: task.task_code.clone(),
                planned,
                status: task.status,
                early_start: task.early_start,
                early_finish: task.early_finish,
                is_behind,
            }
        })
        .collect();

    let count = |state: PlannedState| tasks.iter().filter(|t| t.planned == state).count();
    ScheduleStatus {
        as_of,
        planned_complete: count(PlannedState::Complete),
        planned_in_progress: count(PlannedState::InProgress),
        planned_not_started: count(PlannedState::NotStarted),
        unscheduled: count(PlannedState::Unscheduled),
        behind: tasks.iter().filter(|t| t.is_behind).map(|t| t.task_id).collect(),
        tasks,
    }
}
