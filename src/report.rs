use crate::engine::CpmResult;
use crate::error::LoadError;
use crate::graph::TaskNetwork;
use crate::task::{Task, TaskId, TaskStatus};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Consumer of engine output.
pub trait ScheduleReporter {
    fn report_tasks(&mut self, network: &TaskNetwork) -> Result<(), LoadError>;
    fn report_summary(&mut self, result: &CpmResult) -> Result<(), LoadError>;

    fn report(&mut self, network: &TaskNetwork, result: &CpmResult) -> Result<(), LoadError> {
        self.report_tasks(network)?;
        self.report_summary(result)
    }
}

#[derive(Serialize)]
struct TaskCsvRecord<'a> {
    task_id: TaskId,
    task_code: &'a str,
    task_name: &'a str,
    status: TaskStatus,
    duration_hours: f64,
    early_start: Option<NaiveDateTime>,
    early_finish: Option<NaiveDateTime>,
    late_start: Option<NaiveDateTime>,
    late_finish: Option<NaiveDateTime>,
    total_float_hours: Option<f64>,
    free_float_hours: Option<f64>,
    is_critical: bool,
}

impl<'a> From<&'a Task> for TaskCsvRecord<'a> {
    fn from(task: &'a Task) -> Self {
        Self {
            task_id: task.task_id,
            task_code: &task.task_code,
            task_name: &task.task_name,
            status: task.status,
            duration_hours: task.duration_hours,
            early_start: task.early_start,
            early_finish: task.early_finish,
            late_start: task.late_start,
            late_finish: task.late_finish,
            total_float_hours: task.total_float_hours,
            free_float_hours: task.free_float_hours,
            is_critical: task.is_critical,
        }
    }
}

#[derive(Serialize)]
struct SummaryCsvRecord {
    project_start: NaiveDateTime,
    project_finish: NaiveDateTime,
    task_count: usize,
    critical_count: usize,
    critical_path_duration_hours: f64,
    critical_path: String,
}

impl From<&CpmResult> for SummaryCsvRecord {
    fn from(result: &CpmResult) -> Self {
        Self {
            project_start: result.project_start,
            project_finish: result.project_finish,
            task_count: result.task_count,
            critical_count: result.critical_count,
            critical_path_duration_hours: result.critical_path_duration_hours,
            critical_path: result
                .critical_path
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(";"),
        }
    }
}

/// Writes one row per task to one writer and a one-row run summary to another.
pub struct CsvReporter<W: Write> {
    tasks: csv::Writer<W>,
    summary: csv::Writer<W>,
}

impl CsvReporter<File> {
    /// Creates `<stem>_tasks.csv` and `<stem>_summary.csv` in `dir`.
    pub fn create<P: AsRef<Path>>(dir: P, stem: &str) -> Result<Self, LoadError> {
        let dir = dir.as_ref();
        let tasks = File::create(dir.join(format!("{stem}_tasks.csv")))?;
        let summary = File::create(dir.join(format!("{stem}_summary.csv")))?;
        Ok(Self::new(tasks, summary))
    }
}

impl<W: Write> CsvReporter<W> {
    pub fn new(tasks: W, summary: W) -> Self {
        Self {
            tasks: csv::Writer::from_writer(tasks),
            summary: csv::Writer::from_writer(summary),
        }
    }

    /// Flushes both writers and hands back the underlying sinks.
    pub fn finish(self) -> Result<(W, W), LoadError> {
        let tasks = self
            .tasks
            .into_inner()
            .map_err(|err| LoadError::Io(err.into_error()))?;
        let summary = self
            .summary
            .into_inner()
            .map_err(|err| LoadError::Io(err.into_error()))?;
        Ok((tasks, summary))
    }
}

impl<W: Write> ScheduleReporter for CsvReporter<W> {
    fn report_tasks(&mut self, network: &TaskNetwork) -> Result<(), LoadError> {
        for task in network.tasks() {
            self.tasks.serialize(TaskCsvRecord::from(task))?;
        }
        self.tasks.flush()?;
        Ok(())
    }

    fn report_summary(&mut self, result: &CpmResult) -> Result<(), LoadError> {
        self.summary.serialize(SummaryCsvRecord::from(result))?;
        self.summary.flush()?;
        Ok(())
    }
}
