use super::sweep::{SweepReport, SweepRunner};
use super::work_hours_per_day;
use crate::calendar::{CalendarSet, WorkCalendar};
use crate::config::{AnalysisConfig, EngineConfig};
use crate::engine::{CpmEngine, CpmResult, RunOptions};
use crate::error::{ScheduleError, ScheduleResult};
use crate::graph::TaskNetwork;
use crate::task::TaskId;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Effect of one task's duration change on the project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskImpact {
    pub task_id: TaskId,
    pub task_code: String,
    pub original_duration_hours: f64,
    pub new_duration_hours: f64,
    pub baseline_finish: NaiveDateTime,
    pub new_finish: NaiveDateTime,
    /// Work hours the project finish moved; negative when it came in.
    pub slip_hours: f64,
    pub slip_days: f64,
    /// Tasks whose early finish moved, in topological order.
    pub changed_tasks: Vec<TaskId>,
    pub critical_path_changed: bool,
    pub was_critical: bool,
}

/// A scheduled copy of the source network that what-if scenarios are
/// measured against. The source network is never modified.
pub struct ImpactAnalyzer<'a> {
    source: &'a TaskNetwork,
    calendars: &'a CalendarSet,
    config: EngineConfig,
    /// Slip is measured in work hours of the configured default calendar.
    slip_calendar: &'a WorkCalendar,
    options: RunOptions,
    baseline: TaskNetwork,
    baseline_result: CpmResult,
    baseline_critical: HashSet<TaskId>,
}

impl<'a> ImpactAnalyzer<'a> {
    pub fn new(
        source: &'a TaskNetwork,
        calendars: &'a CalendarSet,
        options: RunOptions,
    ) -> ScheduleResult<Self> {
        Self::with_config(source, calendars, options, EngineConfig::default())
    }

    /// Every baseline and scenario run uses `config`.
    pub fn with_config(
        source: &'a TaskNetwork,
        calendars: &'a CalendarSet,
        options: RunOptions,
        config: EngineConfig,
    ) -> ScheduleResult<Self> {
        let slip_calendar = config.default_calendar(calendars)?;
        let mut baseline = source.clone();
        let baseline_result = CpmEngine::with_config(&mut baseline, calendars, config.clone())
            .run(options.clone())?;
        // Pin the start so scenarios never fall back to a different clock reading.
        let options = RunOptions {
            project_start: Some(baseline_result.project_start),
            ..options
        };
        let baseline_critical = baseline_result.critical_path.iter().copied().collect();
        Ok(Self {
            source,
            calendars,
            config,
            slip_calendar,
            options,
            baseline,
            baseline_result,
            baseline_critical,
        })
    }

    pub fn baseline_result(&self) -> &CpmResult {
        &self.baseline_result
    }

    pub fn baseline(&self) -> &TaskNetwork {
        &self.baseline
    }

    /// Re-runs the schedule with `task_id` set to `new_duration_hours`.
    pub fn impact_of(
        &self,
        task_id: TaskId,
        new_duration_hours: f64,
    ) -> ScheduleResult<TaskImpact> {
        let original = self
            .source
            .task(task_id)
            .ok_or(ScheduleError::NotFound(task_id))?;

        let mut scenario = self.source.clone();
        scenario.modify_task_duration(task_id, new_duration_hours)?;
        let result = CpmEngine::with_config(&mut scenario, self.calendars, self.config.clone())
            .run(self.options.clone())?;

        let baseline_finishes: HashMap<TaskId, Option<NaiveDateTime>> = self
            .baseline
            .tasks()
            .map(|task| (task.task_id, task.early_finish))
            .collect();
        let changed_tasks = scenario
            .topological_sort()?
            .into_iter()
            .filter(|id| {
                let after = scenario.task(*id).and_then(|task| task.early_finish);
                baseline_finishes.get(id).copied().flatten() != after
            })
            .collect();

        let critical: HashSet<TaskId> = result.critical_path.iter().copied().collect();
        let calendar = self.slip_calendar;
        let slip_hours = calendar
            .signed_work_hours_between(self.baseline_result.project_finish, result.project_finish);

        Ok(TaskImpact {
            task_id,
            task_code: original.task_code.clone(),
            original_duration_hours: original.duration_hours,
            new_duration_hours,
            baseline_finish: self.baseline_result.project_finish,
            new_finish: result.project_finish,
            slip_hours,
            slip_days: slip_hours / work_hours_per_day(calendar),
            changed_tasks,
            critical_path_changed: critical != self.baseline_critical,
            was_critical: self.baseline_critical.contains(&task_id),
        })
    }

    /// Impact of lengthening `task_id` by `delay_hours`.
    pub fn delay_impact(&self, task_id: TaskId, delay_hours: f64) -> ScheduleResult<TaskImpact> {
        let task = self
            .source
            .task(task_id)
            .ok_or(ScheduleError::NotFound(task_id))?;
        self.impact_of(task_id, task.duration_hours + delay_hours)
    }

    /// Incomplete, non-milestone tasks with a non-zero duration.
    pub fn default_candidates(&self) -> Vec<TaskId> {
        self.source
            .tasks()
            .filter(|task| {
                !task.is_completed() && !task.is_milestone() && task.duration_hours > 0.0
            })
            .map(|task| task.task_id)
            .collect()
    }

    /// Delays each candidate by `delay_hours` in turn, on the runner's pool.
    /// Results are ordered by slip, largest first.
    pub fn sensitivity_sweep(
        &self,
        delay_hours: f64,
        candidates: Option<&[TaskId]>,
        runner: &SweepRunner,
    ) -> SweepReport<TaskImpact> {
        let defaults;
        let candidates = match candidates {
            Some(ids) => ids,
            None => {
                defaults = self.default_candidates();
                &defaults
            }
        };
        let mut report = runner.run(candidates, |task_id| self.delay_impact(task_id, delay_hours));
        report
            .completed
            .sort_by(|a, b| b.slip_hours.total_cmp(&a.slip_hours));
        report
    }
}

/// One-shot form of [`ImpactAnalyzer::impact_of`].
pub fn analyze_task_impact(
    network: &TaskNetwork,
    calendars: &CalendarSet,
    task_id: TaskId,
    new_duration_hours: f64,
    options: RunOptions,
    config: &EngineConfig,
) -> ScheduleResult<TaskImpact> {
    ImpactAnalyzer::with_config(network, calendars, options, config.clone())?
        .impact_of(task_id, new_duration_hours)
}

/// Sensitivity sweep over every default candidate using `config`'s delay,
/// pool and engine settings.
pub fn sensitivity_sweep(
    network: &TaskNetwork,
    calendars: &CalendarSet,
    options: RunOptions,
    config: &AnalysisConfig,
) -> ScheduleResult<SweepReport<TaskImpact>> {
    let analyzer = ImpactAnalyzer::with_config(network, calendars, options, config.engine.clone())?;
    let runner = SweepRunner::new(config.sweep.clone());
    Ok(analyzer.sensitivity_sweep(config.sensitivity_delay_hours, None, &runner))
}
