use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub type TaskId = i64;
pub type CalendarId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TaskStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TaskType {
    #[default]
    Task,
    Milestone,
    FinishMilestone,
    ResourceDependent,
}

impl TaskType {
    pub fn is_milestone(self) -> bool {
        matches!(self, TaskType::Milestone | TaskType::FinishMilestone)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintType {
    StartNoEarlierThan,
    FinishNoLaterThan,
    MustStartOn,
    MustFinishOn,
}

impl ConstraintType {
    /// Constraints that push the early start forward.
    pub fn limits_start(self) -> bool {
        matches!(
            self,
            ConstraintType::StartNoEarlierThan | ConstraintType::MustStartOn
        )
    }

    /// Constraints that pull the late finish back.
    pub fn limits_finish(self) -> bool {
        matches!(
            self,
            ConstraintType::FinishNoLaterThan | ConstraintType::MustFinishOn
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub constraint_type: ConstraintType,
    pub date: NaiveDateTime,
}

/// Dates and float computed by an external scheduler, kept for validating
/// this engine's output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceDates {
    pub early_start: Option<NaiveDateTime>,
    pub early_finish: Option<NaiveDateTime>,
    pub late_start: Option<NaiveDateTime>,
    pub late_finish: Option<NaiveDateTime>,
    pub total_float_hours: Option<f64>,
    pub is_critical: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: TaskId,
    pub task_code: String,
    pub task_name: String,
    pub duration_hours: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_duration_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar_id: Option<CalendarId>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub task_type: TaskType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wbs_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<Constraint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_start: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_finish: Option<NaiveDateTime>,

    // Written by the CPM engine on every run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub early_start: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub early_finish: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub late_start: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub late_finish: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_float_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_float_hours: Option<f64>,
    #[serde(default)]
    pub is_critical: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<ReferenceDates>,
}

impl Task {
    pub fn new(
        task_id: TaskId,
        task_code: impl Into<String>,
        task_name: impl Into<String>,
        duration_hours: f64,
    ) -> Self {
        Self {
            task_id,
            task_code: task_code.into(),
            task_name: task_name.into(),
            duration_hours,
            remaining_duration_hours: None,
            calendar_id: None,
            status: TaskStatus::NotStarted,
            task_type: TaskType::Task,
            wbs_id: None,
            constraint: None,
            actual_start: None,
            actual_finish: None,
            early_start: None,
            early_finish: None,
            late_start: None,
            late_finish: None,
            total_float_hours: None,
            free_float_hours: None,
            is_critical: false,
            reference: None,
        }
    }

    pub fn with_calendar(mut self, calendar_id: CalendarId) -> Self {
        self.calendar_id = Some(calendar_id);
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_type(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
        self
    }

    pub fn with_constraint(mut self, constraint_type: ConstraintType, date: NaiveDateTime) -> Self {
        self.constraint = Some(Constraint {
            constraint_type,
            date,
        });
        self
    }

    pub fn with_actuals(
        mut self,
        actual_start: Option<NaiveDateTime>,
        actual_finish: Option<NaiveDateTime>,
    ) -> Self {
        self.actual_start = actual_start;
        self.actual_finish = actual_finish;
        self
    }

    pub fn with_remaining(mut self, remaining_duration_hours: f64) -> Self {
        self.remaining_duration_hours = Some(remaining_duration_hours);
        self
    }

    pub fn with_reference(mut self, reference: ReferenceDates) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    pub fn is_milestone(&self) -> bool {
        self.task_type.is_milestone()
    }

    /// Duration the scheduler works with: remaining work for in-progress
    /// tasks, the planned duration otherwise, and zero for milestones.
    pub fn effective_duration_hours(&self) -> f64 {
        if self.is_milestone() {
            return 0.0;
        }
        match self.status {
            TaskStatus::InProgress => self
                .remaining_duration_hours
                .unwrap_or(self.duration_hours)
                .max(0.0),
            _ => self.duration_hours.max(0.0),
        }
    }

    /// Clears every field the engine writes.
    pub fn reset_schedule(&mut self) {
        self.early_start = None;
        self.early_finish = None;
        self.late_start = None;
        self.late_finish = None;
        self.total_float_hours = None;
        self.free_float_hours = None;
        self.is_critical = false;
    }
}
