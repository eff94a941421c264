//! Reading schedule snapshots into a network and calendar set.

use crate::calendar::{CalendarSet, WorkCalendar};
use crate::dependency::{Dependency, RelationshipType};
use crate::engine::RunOptions;
use crate::error::LoadError;
use crate::graph::TaskNetwork;
use crate::task::{CalendarId, Task, TaskId};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    /// As-of date of the snapshot.
    #[serde(default)]
    pub data_date: Option<NaiveDateTime>,
    /// Falls back to the first calendar in the snapshot.
    #[serde(default)]
    pub default_calendar_id: Option<CalendarId>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    pub tasks_loaded: usize,
    pub calendars_loaded: usize,
    pub dependencies_loaded: usize,
    /// Dependencies whose predecessor or successor is outside the snapshot.
    pub dependencies_dropped: usize,
}

#[derive(Debug, Clone)]
pub struct LoadedSchedule {
    pub network: TaskNetwork,
    pub calendars: CalendarSet,
    pub project: ProjectInfo,
    pub stats: LoadStats,
}

impl LoadedSchedule {
    /// Run options anchored on the snapshot's data date.
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            data_date: self.project.data_date,
            ..RunOptions::default()
        }
    }
}

pub trait ScheduleLoader {
    fn load_schedule(&self, version_id: &str) -> Result<LoadedSchedule, LoadError>;
}

/// A calendar as exported: the raw nested calendar text plus its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarRecord {
    pub calendar_id: CalendarId,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_hours_per_day")]
    pub hours_per_day: f64,
    /// Missing data means the standard Monday to Friday week.
    #[serde(default)]
    pub data: Option<String>,
}

fn default_hours_per_day() -> f64 {
    8.0
}

impl CalendarRecord {
    fn into_calendar(self) -> Result<WorkCalendar, LoadError> {
        match self.data {
            Some(raw) => WorkCalendar::parse(self.calendar_id, &raw, self.hours_per_day, self.name)
                .map_err(|source| LoadError::Calendar {
                    calendar_id: self.calendar_id,
                    source,
                }),
            None => Ok(WorkCalendar::standard(self.calendar_id, self.name)),
        }
    }
}

/// A dependency as exported. Relationship codes may carry a `PR_` prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyRecord {
    pub predecessor_id: TaskId,
    pub successor_id: TaskId,
    #[serde(default)]
    pub relationship: Option<String>,
    #[serde(default)]
    pub lag_hours: f64,
}

impl DependencyRecord {
    fn into_dependency(self) -> Dependency {
        let relationship = match self.relationship.as_deref() {
            None => RelationshipType::FinishToStart,
            Some(code) => RelationshipType::from_code(code).unwrap_or_else(|| {
                warn!(
                    code,
                    predecessor_id = self.predecessor_id,
                    successor_id = self.successor_id,
                    "unknown relationship code, treating as finish-to-start"
                );
                RelationshipType::FinishToStart
            }),
        };
        Dependency::new(
            self.predecessor_id,
            self.successor_id,
            relationship,
            self.lag_hours,
        )
    }
}

/// One schedule version, as stored by [`JsonScheduleLoader`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleExport {
    #[serde(default)]
    pub project: ProjectInfo,
    pub calendars: Vec<CalendarRecord>,
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub dependencies: Vec<DependencyRecord>,
}

impl ScheduleExport {
    /// Builds the network with tolerant dependency insertion.
    pub fn into_schedule(self) -> Result<LoadedSchedule, LoadError> {
        let default_id = self
            .project
            .default_calendar_id
            .or_else(|| self.calendars.first().map(|c| c.calendar_id))
            .unwrap_or_default();
        let calendars = self
            .calendars
            .into_iter()
            .map(CalendarRecord::into_calendar)
            .collect::<Result<Vec<_>, _>>()?;
        let calendars = CalendarSet::new(calendars, default_id)?;

        let mut network = TaskNetwork::new();
        for task in self.tasks {
            network.add_task(task);
        }

        let mut stats = LoadStats {
            tasks_loaded: network.len(),
            calendars_loaded: calendars.len(),
            ..LoadStats::default()
        };
        for record in self.dependencies {
            if network.add_dependency_safe(record.into_dependency()) {
                stats.dependencies_loaded += 1;
            } else {
                stats.dependencies_dropped += 1;
            }
        }
        if stats.dependencies_dropped > 0 {
            info!(
                dropped = stats.dependencies_dropped,
                "dropped dependencies referencing tasks outside the snapshot"
            );
        }

        Ok(LoadedSchedule {
            network,
            calendars,
            project: self.project,
            stats,
        })
    }
}

/// Loads `<dir>/<version_id>.json` files.
#[derive(Debug, Clone)]
pub struct JsonScheduleLoader {
    dir: PathBuf,
}

impl JsonScheduleLoader {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, version_id: &str) -> PathBuf {
        self.dir.join(format!("{version_id}.json"))
    }

    pub fn from_json_str(json: &str) -> Result<LoadedSchedule, LoadError> {
        serde_json::from_str::<ScheduleExport>(json)?.into_schedule()
    }
}

impl ScheduleLoader for JsonScheduleLoader {
    fn load_schedule(&self, version_id: &str) -> Result<LoadedSchedule, LoadError> {
        let path = self.path_for(version_id);
        if !path.is_file() {
            return Err(LoadError::VersionNotFound(version_id.to_string()));
        }
        let reader = BufReader::new(File::open(&path)?);
        let export: ScheduleExport = serde_json::from_reader(reader)?;
        let loaded = export.into_schedule()?;
        info!(
            version = version_id,
            tasks = loaded.stats.tasks_loaded,
            dependencies = loaded.stats.dependencies_loaded,
            "loaded schedule"
        );
        Ok(loaded)
    }
}
