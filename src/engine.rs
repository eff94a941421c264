use crate::calculations::{BackwardPass, FloatPass, ForwardPass, NodeCalendars};
use crate::calendar::{CalendarSet, WorkCalendar};
use crate::config::EngineConfig;
use crate::error::ScheduleResult;
use crate::graph::TaskNetwork;
use crate::task::{Task, TaskId};
use chrono::{Local, NaiveDateTime, Timelike};
use petgraph::graph::NodeIndex;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Inputs for one [`CpmEngine::run`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOptions {
    /// Derived from the network when unset; see [`CpmEngine::run`].
    pub project_start: Option<NaiveDateTime>,
    /// Schedule as-of date. Unstarted work is not scheduled before it.
    pub data_date: Option<NaiveDateTime>,
    /// Late finish for tasks without successors; the latest early finish when unset.
    pub project_end: Option<NaiveDateTime>,
}

impl RunOptions {
    pub fn starting_at(project_start: NaiveDateTime) -> Self {
        Self {
            project_start: Some(project_start),
            ..Self::default()
        }
    }

    pub fn with_data_date(mut self, data_date: NaiveDateTime) -> Self {
        self.data_date = Some(data_date);
        self
    }

    pub fn with_project_end(mut self, project_end: NaiveDateTime) -> Self {
        self.project_end = Some(project_end);
        self
    }
}

/// Snapshot of one engine run, owned by the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CpmResult {
    pub project_start: NaiveDateTime,
    pub project_finish: NaiveDateTime,
    /// Critical task ids in topological order.
    pub critical_path: Vec<TaskId>,
    pub critical_path_duration_hours: f64,
    pub task_count: usize,
    pub critical_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceMismatch {
    pub task_id: TaskId,
    pub field: &'static str,
    pub computed: String,
    pub reference: String,
}

/// Agreement between computed values and the reference values carried on tasks.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReferenceComparison {
    pub tasks_compared: usize,
    pub matched: usize,
    pub mismatched: usize,
    pub mismatches_by_field: BTreeMap<&'static str, usize>,
    pub sample: Vec<ReferenceMismatch>,
}

impl ReferenceComparison {
    pub fn match_rate(&self) -> f64 {
        if self.tasks_compared == 0 {
            return 1.0;
        }
        self.matched as f64 / self.tasks_compared as f64
    }
}

/// The wall clock truncated to the minute, so runs made moments apart agree.
fn current_minute() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0)
        .and_then(|t| t.with_second(0))
        .unwrap_or(now)
}

/// Forward pass, backward pass and float over one network. The engine keeps
/// no state between runs; every output lives on the network's tasks.
pub struct CpmEngine<'a> {
    network: &'a mut TaskNetwork,
    calendars: &'a CalendarSet,
    config: EngineConfig,
}

impl<'a> CpmEngine<'a> {
    pub fn new(network: &'a mut TaskNetwork, calendars: &'a CalendarSet) -> Self {
        Self::with_config(network, calendars, EngineConfig::default())
    }

    pub fn with_config(
        network: &'a mut TaskNetwork,
        calendars: &'a CalendarSet,
        config: EngineConfig,
    ) -> Self {
        Self {
            network,
            calendars,
            config,
        }
    }

    pub fn network(&self) -> &TaskNetwork {
        &*self.network
    }

    fn default_calendar(&self) -> ScheduleResult<&'a WorkCalendar> {
        self.config.default_calendar(self.calendars)
    }

    fn prepare(&self) -> ScheduleResult<(NodeCalendars<'a>, Vec<NodeIndex>)> {
        let default = self.default_calendar()?;
        let order = self.network.topological_indices().map_err(|cycle| {
            warn!(
                unresolved = cycle.unresolved,
                sample = ?cycle.sample,
                "dependency cycle, CPM aborted"
            );
            cycle
        })?;
        let calendars = NodeCalendars::resolve(&*self.network, self.calendars, default);
        Ok((calendars, order))
    }

    pub fn forward_pass(
        &mut self,
        project_start: NaiveDateTime,
        data_date: Option<NaiveDateTime>,
    ) -> ScheduleResult<()> {
        let (calendars, order) = self.prepare()?;
        ForwardPass::new(&calendars, &order).execute(
            self.network.graph_mut(),
            project_start,
            data_date,
        );
        Ok(())
    }

    /// Needs early dates from [`forward_pass`](Self::forward_pass).
    /// `project_end` defaults to the latest early finish.
    pub fn backward_pass(&mut self, project_end: Option<NaiveDateTime>) -> ScheduleResult<()> {
        let Some(project_end) = project_end.or_else(|| self.latest_early_finish()) else {
            return Ok(());
        };
        let (calendars, order) = self.prepare()?;
        BackwardPass::new(&calendars, &order).execute(self.network.graph_mut(), project_end);
        Ok(())
    }

    pub fn calculate_float(&mut self) -> ScheduleResult<()> {
        let default = self.default_calendar()?;
        let calendars = NodeCalendars::resolve(&*self.network, self.calendars, default);
        FloatPass::new(&calendars).execute(self.network.graph_mut());
        Ok(())
    }

    pub fn latest_early_finish(&self) -> Option<NaiveDateTime> {
        self.network.tasks().filter_map(|task| task.early_finish).max()
    }

    /// Earliest actual start or start-constraint date in the network.
    fn derived_project_start(&self) -> Option<NaiveDateTime> {
        self.network
            .tasks()
            .flat_map(|task| {
                let constraint = task
                    .constraint
                    .filter(|c| c.constraint_type.limits_start())
                    .map(|c| c.date);
                [task.actual_start, constraint]
            })
            .flatten()
            .min()
    }

    /// Runs all three passes. The project start is, in order of preference,
    /// the explicit start, the data date, the earliest actual start or start
    /// constraint, and finally the current time.
    pub fn run(&mut self, options: RunOptions) -> ScheduleResult<CpmResult> {
        let project_start = options
            .project_start
            .or(options.data_date)
            .or_else(|| self.derived_project_start())
            .unwrap_or_else(current_minute);

        self.network.reset_schedule();
        let (calendars, order) = self.prepare()?;
        let graph = self.network.graph_mut();

        ForwardPass::new(&calendars, &order).execute(graph, project_start, options.data_date);
        let project_finish = self.latest_early_finish().unwrap_or(project_start);

        let graph = self.network.graph_mut();
        BackwardPass::new(&calendars, &order)
            .execute(graph, options.project_end.unwrap_or(project_finish));
        FloatPass::new(&calendars).execute(graph);

        let critical: Vec<&Task> = order
            .iter()
            .map(|&node| &self.network.graph()[node])
            .filter(|task| task.is_critical)
            .collect();
        let result = CpmResult {
            project_start,
            project_finish,
            critical_path: critical.iter().map(|task| task.task_id).collect(),
            critical_path_duration_hours: critical
                .iter()
                .map(|task| task.effective_duration_hours())
                .sum(),
            task_count: self.network.len(),
            critical_count: critical.len(),
        };

        info!(
            tasks = result.task_count,
            critical = result.critical_count,
            start = %result.project_start,
            finish = %result.project_finish,
            "CPM run complete"
        );
        Ok(result)
    }

    /// Compares computed dates, float and criticality with the reference
    /// values on each task, within the configured tolerances.
    pub fn compare_with_reference(&self) -> ReferenceComparison {
        let mut report = ReferenceComparison::default();
        for task in self.network.tasks() {
            let Some(reference) = &task.reference else {
                continue;
            };
            report.tasks_compared += 1;

            let mut mismatches = Vec::new();
            let dates = [
                ("early_start", task.early_start, reference.early_start),
                ("early_finish", task.early_finish, reference.early_finish),
                ("late_start", task.late_start, reference.late_start),
                ("late_finish", task.late_finish, reference.late_finish),
            ];
            for (field, computed, expected) in dates {
                if let (Some(computed), Some(expected)) = (computed, expected) {
                    let apart = (computed - expected).num_seconds().abs() as f64 / 3600.0;
                    if apart > self.config.date_tolerance_hours {
                        mismatches.push(mismatch(task, field, computed, expected));
                    }
                }
            }
            if let (Some(computed), Some(expected)) =
                (task.total_float_hours, reference.total_float_hours)
            {
                if (computed - expected).abs() > self.config.float_tolerance_hours {
                    mismatches.push(mismatch(task, "total_float_hours", computed, expected));
                }
            }
            if let Some(expected) = reference.is_critical {
                if task.is_critical != expected {
                    mismatches.push(mismatch(task, "is_critical", task.is_critical, expected));
                }
            }

            if mismatches.is_empty() {
                report.matched += 1;
                continue;
            }
            report.mismatched += 1;
            for item in mismatches {
                *report.mismatches_by_field.entry(item.field).or_default() += 1;
                if report.sample.len() < self.config.mismatch_sample_size {
                    report.sample.push(item);
                }
            }
        }
        report
    }
}

fn mismatch(
    task: &Task,
    field: &'static str,
    computed: impl ToString,
    reference: impl ToString,
) -> ReferenceMismatch {
    ReferenceMismatch {
        task_id: task.task_id,
        field,
        computed: computed.to_string(),
        reference: reference.to_string(),
    }
}
