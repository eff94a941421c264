pub mod analysis;
pub mod calculations;
pub mod calendar;
pub mod config;
pub mod dependency;
pub mod engine;
pub mod error;
pub mod graph;
pub mod loader;
pub mod report;
pub mod task;

pub use calendar::{CalendarSet, WorkCalendar, WorkPeriod};
pub use config::{AnalysisConfig, EngineConfig, SweepConfig};
pub use dependency::{Dependency, RelationshipType};
pub use engine::{CpmEngine, CpmResult, ReferenceComparison, RunOptions};
pub use error::{CalendarParseError, CycleError, LoadError, ScheduleError, ScheduleResult};
pub use graph::{NetworkIssue, TaskNetwork};
pub use loader::{JsonScheduleLoader, LoadedSchedule, ProjectInfo, ScheduleLoader};
pub use report::{CsvReporter, ScheduleReporter};
pub use task::{Constraint, ConstraintType, Task, TaskId, TaskStatus, TaskType};
