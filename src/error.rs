use crate::task::TaskId;
use thiserror::Error;

/// Number of unresolved task ids reported by a [`CycleError`].
pub const CYCLE_SAMPLE_SIZE: usize = 10;

/// Raised when a traversal finds tasks that can never be released because
/// they sit on (or downstream of) a dependency cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("dependency cycle detected: {unresolved} tasks unresolved (sample: {sample:?})")]
pub struct CycleError {
    pub unresolved: usize,
    pub sample: Vec<TaskId>,
}

impl CycleError {
    pub fn new(mut unresolved_ids: Vec<TaskId>) -> Self {
        unresolved_ids.sort_unstable();
        let unresolved = unresolved_ids.len();
        unresolved_ids.truncate(CYCLE_SAMPLE_SIZE);
        Self {
            unresolved,
            sample: unresolved_ids,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarParseError {
    #[error("unbalanced parenthesis opened at byte {position}")]
    Unbalanced { position: usize },
    #[error("unexpected ')' at byte {position}")]
    UnexpectedClose { position: usize },
    #[error("invalid time of day '{0}'")]
    InvalidTime(String),
    #[error("invalid serial date '{0}'")]
    InvalidSerialDate(String),
}

#[derive(Debug, Clone, Error)]
pub enum ScheduleError {
    #[error(transparent)]
    Cycle(#[from] CycleError),
    #[error("dependency {predecessor} -> {successor} references unknown task {missing}")]
    InvalidReference {
        predecessor: TaskId,
        successor: TaskId,
        missing: TaskId,
    },
    #[error("task {0} not found")]
    NotFound(TaskId),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("calendar error: {0}")]
    Calendar(#[from] CalendarParseError),
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;

/// Errors raised at the I/O boundary (loading exports, writing reports).
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("calendar {calendar_id}: {source}")]
    Calendar {
        calendar_id: i64,
        #[source]
        source: CalendarParseError,
    },
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error("schedule version '{0}' not found")]
    VersionNotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_error_sorts_and_truncates_sample() {
        let err = CycleError::new((0..25).rev().collect());
        assert_eq!(err.unresolved, 25);
        assert_eq!(err.sample, (0..10).collect::<Vec<_>>());
        assert!(err.to_string().contains("25 tasks unresolved"));
    }
}
