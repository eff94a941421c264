use crate::calendar::{CalendarSet, WorkCalendar};
use crate::error::{LoadError, ScheduleError, ScheduleResult};
use crate::task::CalendarId;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Engine-level settings. The default calendar is passed here rather than
/// looked up from shared state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Overrides the calendar set's own default when present in the set.
    pub default_calendar_id: Option<CalendarId>,
    /// Date tolerance for reference comparison.
    pub date_tolerance_hours: f64,
    /// Float tolerance for reference comparison; one work day.
    pub float_tolerance_hours: f64,
    /// Mismatches kept in a comparison report.
    pub mismatch_sample_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_calendar_id: None,
            date_tolerance_hours: 1.0,
            float_tolerance_hours: 8.0,
            mismatch_sample_size: 20,
        }
    }
}

impl EngineConfig {
    pub fn with_default_calendar(mut self, id: CalendarId) -> Self {
        self.default_calendar_id = Some(id);
        self
    }

    /// The calendar used for tasks without a loaded calendar and for
    /// measuring slip. An override missing from `calendars` is an error.
    pub fn default_calendar<'c>(
        &self,
        calendars: &'c CalendarSet,
    ) -> ScheduleResult<&'c WorkCalendar> {
        match self.default_calendar_id {
            Some(id) => calendars.get(id).ok_or_else(|| {
                ScheduleError::Configuration(format!("default calendar {id} is not loaded"))
            }),
            None => Ok(calendars.default_calendar()),
        }
    }
}

/// Limits for the parallel what-if runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Worker threads; 0 lets rayon pick.
    pub max_workers: usize,
    pub per_candidate_timeout_ms: Option<u64>,
    pub overall_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub near_critical_threshold_hours: f64,
    pub min_risk_duration_hours: f64,
    pub sensitivity_delay_hours: f64,
    /// Contributors re-run by the config-driven marginal attribution.
    pub marginal_top_n: usize,
    pub sweep: SweepConfig,
    /// Settings for every CPM run an analysis performs.
    pub engine: EngineConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            near_critical_threshold_hours: 40.0,
            min_risk_duration_hours: 8.0,
            sensitivity_delay_hours: 8.0,
            marginal_top_n: 10,
            sweep: SweepConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_str(json: &str) -> Result<Self, LoadError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config =
            AnalysisConfig::from_json_str(r#"{"marginal_top_n": 3, "sweep": {"max_workers": 2}}"#)
                .unwrap();
        assert_eq!(config.marginal_top_n, 3);
        assert_eq!(config.near_critical_threshold_hours, 40.0);
        assert_eq!(config.sweep.max_workers, 2);
        assert_eq!(config.sweep.overall_timeout_ms, None);
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn engine_section_reads_default_calendar_override() {
        let config =
            AnalysisConfig::from_json_str(r#"{"engine": {"default_calendar_id": 2}}"#).unwrap();
        assert_eq!(config.engine.default_calendar_id, Some(2));
        assert_eq!(config.engine.mismatch_sample_size, 20);
    }

    #[test]
    fn default_calendar_override_must_be_loaded() {
        let calendars = CalendarSet::new(
            vec![
                WorkCalendar::standard(1, "Standard"),
                WorkCalendar::standard(2, "Site"),
            ],
            1,
        )
        .unwrap();
        let config = EngineConfig::default();
        assert_eq!(config.default_calendar(&calendars).unwrap().id(), 1);
        let config = config.with_default_calendar(2);
        assert_eq!(config.default_calendar(&calendars).unwrap().id(), 2);
        assert!(matches!(
            config.with_default_calendar(9).default_calendar(&calendars),
            Err(ScheduleError::Configuration(_))
        ));
    }

    #[test]
    fn engine_defaults_match_reference_tolerances() {
        let config = EngineConfig::default();
        assert_eq!(config.date_tolerance_hours, 1.0);
        assert_eq!(config.float_tolerance_hours, 8.0);
    }
}
