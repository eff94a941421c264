use crate::calendar::CalendarSet;
use crate::config::AnalysisConfig;
use crate::engine::{CpmEngine, CpmResult, RunOptions};
use crate::error::ScheduleResult;
use crate::graph::TaskNetwork;
use crate::task::{Task, TaskId, TaskStatus};
use serde::Serialize;

/// Upper bounds of the float ranges, in work hours.
const BUCKET_LIMITS: [(&str, f64); 5] = [
    ("critical", 0.0),
    ("0-8h", 8.0),
    ("8-40h", 40.0),
    ("40-80h", 80.0),
    ("80-160h", 160.0),
];
const OVER_LIMIT: &str = "160h+";
const UNKNOWN: &str = "unknown";

/// Name of the float range `total_float_hours` falls in.
pub fn float_bucket(total_float_hours: Option<f64>) -> &'static str {
    let Some(float) = total_float_hours else {
        return UNKNOWN;
    };
    BUCKET_LIMITS
        .iter()
        .find(|(_, limit)| float <= *limit)
        .map_or(OVER_LIMIT, |(label, _)| *label)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FloatBucket {
    pub label: &'static str,
    pub task_ids: Vec<TaskId>,
}

impl FloatBucket {
    pub fn count(&self) -> usize {
        self.task_ids.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskTask {
    pub task_id: TaskId,
    pub task_code: String,
    pub task_name: String,
    pub total_float_hours: f64,
    pub duration_hours: f64,
    pub status: TaskStatus,
    pub is_critical: bool,
}

impl RiskTask {
    fn from_task(task: &Task, total_float_hours: f64) -> Self {
        Self {
            task_id: task.task_id,
            task_code: task.task_code.clone(),
            task_name: task.task_name.clone(),
            total_float_hours,
            duration_hours: task.duration_hours,
            status: task.status,
            is_critical: task.is_critical,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriticalPathReport {
    pub result: CpmResult,
    /// Every bucket in fixed order, empty ones included.
    pub buckets: Vec<FloatBucket>,
    pub near_critical_threshold_hours: f64,
    /// Tasks with known float at or under the threshold, critical ones included.
    pub near_critical: Vec<TaskId>,
    /// Near-critical, unfinished and long enough to matter; tightest first.
    pub risk_tasks: Vec<RiskTask>,
}

impl CriticalPathReport {
    pub fn bucket(&self, label: &str) -> Option<&FloatBucket> {
        self.buckets.iter().find(|bucket| bucket.label == label)
    }
}

/// Runs CPM on `network` and classifies every task by float.
pub fn critical_path_report(
    network: &mut TaskNetwork,
    calendars: &CalendarSet,
    options: RunOptions,
    config: &AnalysisConfig,
) -> ScheduleResult<CriticalPathReport> {
    let result = CpmEngine::with_config(network, calendars, config.engine.clone()).run(options)?;

    let mut buckets: Vec<FloatBucket> = BUCKET_LIMITS
        .iter()
        .map(|(label, _)| *label)
        .chain([OVER_LIMIT, UNKNOWN])
        .map(|label| FloatBucket {
            label,
            task_ids: Vec::new(),
        })
        .collect();

    let threshold = config.near_critical_threshold_hours;
    let mut near_critical = Vec::new();
    let mut risk_tasks = Vec::new();

    for task in network.tasks() {
        let label = float_bucket(task.total_float_hours);
        if let Some(bucket) = buckets.iter_mut().find(|bucket| bucket.label == label) {
            bucket.task_ids.push(task.task_id);
        }

        let Some(float) = task.total_float_hours.filter(|float| *float <= threshold) else {
            continue;
        };
        near_critical.push(task.task_id);
        if !task.is_completed() && task.duration_hours >= config.min_risk_duration_hours {
            risk_tasks.push(RiskTask::from_task(task, float));
        }
    }

    risk_tasks.sort_by(|a, b| {
        a.total_float_hours
            .total_cmp(&b.total_float_hours)
            .then_with(|| b.duration_hours.total_cmp(&a.duration_hours))
    });

    Ok(CriticalPathReport {
        result,
        buckets,
        near_critical_threshold_hours: threshold,
        near_critical,
        risk_tasks,
    })
}
