//! Reports built from one or more CPM runs. Anything that changes a task
//! works on a clone, never on the caller's network.

pub mod critical_path;
pub mod delay;
pub mod impact;
pub mod progress;
pub mod sweep;

pub use critical_path::{CriticalPathReport, FloatBucket, RiskTask, critical_path_report};
pub use delay::{
    DelayAttribution, DelayContribution, MarginalContribution, TaskMatching, attribute_delay,
    marginal_attribution, marginal_sweep, match_tasks,
};
pub use impact::{ImpactAnalyzer, TaskImpact, analyze_task_impact, sensitivity_sweep};
pub use progress::{PlannedState, ScheduleStatus, TaskProgress, schedule_at_date};
pub use sweep::{CancellationToken, SweepReport, SweepRunner};

use crate::calendar::WorkCalendar;

/// Hours in a work day for hour-to-day conversion; 8 when the calendar has none.
pub(crate) fn work_hours_per_day(calendar: &WorkCalendar) -> f64 {
    let hours = calendar.default_hours_per_day();
    if hours > 0.0 { hours } else { 8.0 }
}
