use super::sweep::{SweepReport, SweepRunner};
use crate::calendar::CalendarSet;
use crate::config::{AnalysisConfig, EngineConfig};
use crate::engine::{CpmEngine, RunOptions};
use crate::error::{ScheduleError, ScheduleResult};
use crate::graph::TaskNetwork;
use crate::task::{Task, TaskId};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

const DURATION_EPSILON: f64 = 1e-9;

/// Tasks of two snapshots paired by `task_code`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskMatching {
    /// `(baseline id, current id)` pairs, in current-network order.
    pub matched: Vec<(TaskId, TaskId)>,
    /// Codes only in the current snapshot.
    pub new_tasks: Vec<String>,
    /// Codes only in the baseline snapshot.
    pub removed_tasks: Vec<String>,
}

fn index_by_code(network: &TaskNetwork) -> HashMap<&str, &Task> {
    let mut by_code: HashMap<&str, &Task> = HashMap::new();
    for task in network.tasks() {
        if task.task_code.is_empty() {
            debug!(task_id = task.task_id, "task without a code cannot be matched");
            continue;
        }
        if by_code.insert(task.task_code.as_str(), task).is_some() {
            warn!(code = %task.task_code, "duplicate task code, keeping the last task");
        }
    }
    by_code
}

/// Pairs tasks across snapshots. Ids are snapshot-scoped, so only codes are compared.
pub fn match_tasks(baseline: &TaskNetwork, current: &TaskNetwork) -> TaskMatching {
    let baseline_codes = index_by_code(baseline);
    let current_codes = index_by_code(current);

    let mut matching = TaskMatching::default();
    for task in current.tasks() {
        if current_codes.get(task.task_code.as_str()).map(|t| t.task_id) != Some(task.task_id) {
            continue;
        }
        match baseline_codes.get(task.task_code.as_str()) {
            Some(before) => matching.matched.push((before.task_id, task.task_id)),
            None => matching.new_tasks.push(task.task_code.clone()),
        }
    }
    for task in baseline.tasks() {
        if baseline_codes.get(task.task_code.as_str()).map(|t| t.task_id) == Some(task.task_id)
            && !current_codes.contains_key(task.task_code.as_str())
        {
            matching.removed_tasks.push(task.task_code.clone());
        }
    }
    matching
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DelayContribution {
    pub task_code: String,
    pub baseline_task_id: TaskId,
    pub current_task_id: TaskId,
    pub baseline_duration_hours: f64,
    pub current_duration_hours: f64,
    pub duration_increase_hours: f64,
    pub is_critical: bool,
    pub total_float_hours: Option<f64>,
    /// Share of the project slip charged to this task, in work hours.
    pub contribution_hours: f64,
    /// Percent of all attributed hours.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DelayAttribution {
    pub baseline_finish: NaiveDateTime,
    pub current_finish: NaiveDateTime,
    /// Work hours the current finish is later than the baseline; never negative.
    pub total_slip_hours: f64,
    pub attributed_hours: f64,
    /// Slip not explained by duration growth (logic changes, new work, actuals).
    pub unattributed_hours: f64,
    /// Every matched task whose duration grew, largest contribution first.
    pub contributions: Vec<DelayContribution>,
    pub matching: TaskMatching,
}

/// Compares two snapshots and charges the finish slip to tasks that grew.
///
/// A task critical in the current schedule is charged its whole increase;
/// any other task only the part that exceeds its current float. When the
/// charges add up to more than the slip they are scaled down to fit.
/// Both snapshots are scheduled with `config`, and slip is measured on its
/// default calendar.
pub fn attribute_delay(
    baseline: &TaskNetwork,
    current: &TaskNetwork,
    calendars: &CalendarSet,
    baseline_options: RunOptions,
    current_options: RunOptions,
    config: &EngineConfig,
) -> ScheduleResult<DelayAttribution> {
    let calendar = config.default_calendar(calendars)?;
    let mut baseline_run = baseline.clone();
    let baseline_result = CpmEngine::with_config(&mut baseline_run, calendars, config.clone())
        .run(baseline_options)?;
    let mut current_run = current.clone();
    let current_result = CpmEngine::with_config(&mut current_run, calendars, config.clone())
        .run(current_options)?;

    let matching = match_tasks(&baseline_run, &current_run);
    let total_slip_hours = calendar
        .work_hours_between(baseline_result.project_finish, current_result.project_finish);

    let mut contributions: Vec<DelayContribution> = Vec::new();
    for &(baseline_id, current_id) in &matching.matched {
        let (Some(before), Some(after)) =
            (baseline_run.task(baseline_id), current_run.task(current_id))
        else {
            continue;
        };
        let increase = after.duration_hours - before.duration_hours;
        if increase <= DURATION_EPSILON {
            continue;
        }
        let raw = if after.is_critical {
            increase
        } else {
            let float = after.total_float_hours.unwrap_or(0.0).max(0.0);
            (increase - float).max(0.0)
        };
        contributions.push(DelayContribution {
            task_code: after.task_code.clone(),
            baseline_task_id: baseline_id,
            current_task_id: current_id,
            baseline_duration_hours: before.duration_hours,
            current_duration_hours: after.duration_hours,
            duration_increase_hours: increase,
            is_critical: after.is_critical,
            total_float_hours: after.total_float_hours,
            contribution_hours: raw,
            percentage: 0.0,
        });
    }

    let raw_total: f64 = contributions.iter().map(|c| c.contribution_hours).sum();
    if raw_total > total_slip_hours {
        let scale = if raw_total > 0.0 { total_slip_hours / raw_total } else { 0.0 };
        for contribution in &mut contributions {
            contribution.contribution_hours *= scale;
        }
    }
    let attributed_hours: f64 = contributions.iter().map(|c| c.contribution_hours).sum();
    for contribution in &mut contributions {
        contribution.percentage = if attributed_hours > 0.0 {
            contribution.contribution_hours / attributed_hours * 100.0
        } else {
            0.0
        };
    }
    contributions.sort_by(|a, b| {
        b.contribution_hours
            .total_cmp(&a.contribution_hours)
            .then_with(|| b.duration_increase_hours.total_cmp(&a.duration_increase_hours))
    });

    info!(
        slip_hours = total_slip_hours,
        attributed_hours,
        contributors = contributions.len(),
        new_tasks = matching.new_tasks.len(),
        removed_tasks = matching.removed_tasks.len(),
        "delay attribution complete"
    );

    Ok(DelayAttribution {
        baseline_finish: baseline_result.project_finish,
        current_finish: current_result.project_finish,
        total_slip_hours,
        attributed_hours,
        unattributed_hours: (total_slip_hours - attributed_hours).max(0.0),
        contributions,
        matching,
    })
}

/// Measured effect of undoing one task's growth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarginalContribution {
    pub task_code: String,
    pub current_task_id: TaskId,
    pub duration_increase_hours: f64,
    pub finish_with_rollback: NaiveDateTime,
    /// Work hours the finish comes in when this task alone returns to its
    /// baseline duration.
    pub marginal_hours: f64,
}

/// For the `top_n` largest contributors, rolls the task back to its baseline
/// duration on a clone of `current`, re-runs CPM and measures how far the
/// finish comes in. One full run per candidate, spread over the runner's pool.
pub fn marginal_attribution(
    current: &TaskNetwork,
    calendars: &CalendarSet,
    current_options: RunOptions,
    attribution: &DelayAttribution,
    top_n: usize,
    runner: &SweepRunner,
    config: &EngineConfig,
) -> ScheduleResult<SweepReport<MarginalContribution>> {
    let calendar = config.default_calendar(calendars)?;
    let mut reference = current.clone();
    let reference_result = CpmEngine::with_config(&mut reference, calendars, config.clone())
        .run(current_options.clone())?;
    let options = RunOptions {
        project_start: Some(reference_result.project_start),
        ..current_options
    };

    let candidates: Vec<&DelayContribution> =
        attribution.contributions.iter().take(top_n).collect();
    let by_id: HashMap<TaskId, &DelayContribution> = candidates
        .iter()
        .map(|c| (c.current_task_id, *c))
        .collect();
    let ids: Vec<TaskId> = candidates.iter().map(|c| c.current_task_id).collect();

    let mut report = runner.run(&ids, |task_id| {
        let contribution = by_id
            .get(&task_id)
            .ok_or(ScheduleError::NotFound(task_id))?;
        let mut scenario = current.clone();
        scenario.modify_task_duration(task_id, contribution.baseline_duration_hours)?;
        let result = CpmEngine::with_config(&mut scenario, calendars, config.clone())
            .run(options.clone())?;
        Ok(MarginalContribution {
            task_code: contribution.task_code.clone(),
            current_task_id: task_id,
            duration_increase_hours: contribution.duration_increase_hours,
            finish_with_rollback: result.project_finish,
            marginal_hours: calendar
                .signed_work_hours_between(result.project_finish, reference_result.project_finish),
        })
    });
    report
        .completed
        .sort_by(|a, b| b.marginal_hours.total_cmp(&a.marginal_hours));
    Ok(report)
}

/// [`marginal_attribution`] over `config.marginal_top_n` contributors, with
/// the pool and engine settings taken from `config`.
pub fn marginal_sweep(
    current: &TaskNetwork,
    calendars: &CalendarSet,
    current_options: RunOptions,
    attribution: &DelayAttribution,
    config: &AnalysisConfig,
) -> ScheduleResult<SweepReport<MarginalContribution>> {
    let runner = SweepRunner::new(config.sweep.clone());
    marginal_attribution(
        current,
        calendars,
        current_options,
        attribution,
        config.marginal_top_n,
        &runner,
        &config.engine,
    )
}
