mod parser;

use crate::error::{CalendarParseError, ScheduleError};
use crate::task::CalendarId;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

const MINUTES_PER_DAY: u32 = 24 * 60;
const SECONDS_PER_DAY: i64 = 24 * 60 * 60;
const SECONDS_PER_HOUR: f64 = 3600.0;

/// Days with only zero-length periods are worked as a single block of the
/// calendar's default hours that starts at this time. With the usual 8h the
/// block is 08:00-16:00, so backward snapping on such a day lands on 16:00,
/// not 17:00. Days longer than 16h start earlier so the block fits the day.
const DEGENERATE_BLOCK_START: i64 = 8 * 60 * 60;

/// How far a single snap may search for work time before giving up.
const MAX_SCAN_DAYS: i64 = 3660;

/// A span of work time within one day, stored as minutes after midnight.
/// `start <= finish` always holds; `finish` may be 1440 (24:00).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkPeriod {
    start_minute: u32,
    finish_minute: u32,
}

impl WorkPeriod {
    /// Builds a period from two clock readings given in either order. A
    /// finish of 00:00 after a later start means midnight at the end of the day.
    pub fn new(start_minute: u32, finish_minute: u32) -> Self {
        let start = start_minute.min(MINUTES_PER_DAY);
        let mut finish = finish_minute.min(MINUTES_PER_DAY);
        if finish == 0 && start > 0 {
            finish = MINUTES_PER_DAY;
        }
        if start <= finish {
            Self {
                start_minute: start,
                finish_minute: finish,
            }
        } else {
            Self {
                start_minute: finish,
                finish_minute: start,
            }
        }
    }

    pub fn from_hm(start_hour: u32, start_min: u32, finish_hour: u32, finish_min: u32) -> Self {
        Self::new(start_hour * 60 + start_min, finish_hour * 60 + finish_min)
    }

    /// Parses a `HH:MM` pair.
    pub fn parse(start: &str, finish: &str) -> Result<Self, CalendarParseError> {
        Ok(Self::new(
            parser::parse_clock(start)?,
            parser::parse_clock(finish)?,
        ))
    }

    pub fn start_minute(&self) -> u32 {
        self.start_minute
    }

    pub fn finish_minute(&self) -> u32 {
        self.finish_minute
    }

    pub fn start_time(&self) -> NaiveTime {
        NaiveTime::from_num_seconds_from_midnight_opt(self.start_minute * 60, 0)
            .unwrap_or(NaiveTime::MIN)
    }

    pub fn duration_minutes(&self) -> u32 {
        self.finish_minute - self.start_minute
    }

    pub fn duration_hours(&self) -> f64 {
        f64::from(self.duration_minutes()) / 60.0
    }

    pub fn is_degenerate(&self) -> bool {
        self.start_minute == self.finish_minute
    }
}

/// Sorts periods and folds overlapping ones together.
fn normalize_periods(mut periods: Vec<WorkPeriod>) -> Vec<WorkPeriod> {
    periods.sort_by_key(|p| (p.start_minute, p.finish_minute));
    periods.dedup();
    let mut merged: Vec<WorkPeriod> = Vec::with_capacity(periods.len());
    for period in periods {
        match merged.last_mut() {
            Some(last) if period.start_minute < last.finish_minute => {
                last.finish_minute = last.finish_minute.max(period.finish_minute);
            }
            _ => merged.push(period),
        }
    }
    merged
}

fn hours_to_seconds(hours: f64) -> i64 {
    (hours * SECONDS_PER_HOUR).round() as i64
}

fn seconds_to_hours(seconds: i64) -> f64 {
    seconds as f64 / SECONDS_PER_HOUR
}

fn at(date: NaiveDate, seconds_of_day: i64) -> NaiveDateTime {
    NaiveDateTime::new(date, NaiveTime::MIN) + TimeDelta::seconds(seconds_of_day)
}

fn seconds_of_day(t: NaiveDateTime) -> i64 {
    i64::from(t.time().num_seconds_from_midnight())
}

fn shift_date(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    date.checked_add_signed(TimeDelta::try_days(days)?)
}

/// Work-time model for one calendar: a weekly pattern of work periods plus
/// date exceptions that replace the pattern for a single day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkCalendar {
    id: CalendarId,
    name: String,
    default_hours_per_day: f64,
    /// Indexed by `Weekday::num_days_from_monday`.
    weekly: [Vec<WorkPeriod>; 7],
    exceptions: BTreeMap<NaiveDate, Vec<WorkPeriod>>,
}

impl WorkCalendar {
    /// An empty calendar: no work time until periods are added.
    pub fn new(id: CalendarId, name: impl Into<String>, default_hours_per_day: f64) -> Self {
        Self {
            id,
            name: name.into(),
            default_hours_per_day,
            weekly: Default::default(),
            exceptions: BTreeMap::new(),
        }
    }

    /// Monday to Friday, 08:00-12:00 and 13:00-17:00.
    pub fn standard(id: CalendarId, name: impl Into<String>) -> Self {
        let mut calendar = Self::new(id, name, 8.0);
        let day = vec![WorkPeriod::from_hm(8, 0, 12, 0), WorkPeriod::from_hm(13, 0, 17, 0)];
        for weekday in [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
        ] {
            calendar.set_weekday_periods(weekday, day.clone());
        }
        calendar
    }

    /// Parses the nested calendar text carried by schedule exports.
    pub fn parse(
        id: CalendarId,
        raw_spec: &str,
        default_hours_per_day: f64,
        name: impl Into<String>,
    ) -> Result<Self, CalendarParseError> {
        let parsed = parser::parse_calendar_data(raw_spec)?;
        let mut calendar = Self::new(id, name, default_hours_per_day);
        for (slot, periods) in parsed.weekly.into_iter().enumerate() {
            calendar.weekly[slot] = normalize_periods(periods);
        }
        for (date, periods) in parsed.exceptions {
            calendar.add_exception(date, periods);
        }
        debug!(
            calendar_id = id,
            exceptions = calendar.exceptions.len(),
            "parsed calendar"
        );
        Ok(calendar)
    }

    pub fn id(&self) -> CalendarId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_hours_per_day(&self) -> f64 {
        self.default_hours_per_day
    }

    pub fn set_weekday_periods(&mut self, weekday: Weekday, periods: Vec<WorkPeriod>) {
        self.weekly[weekday.num_days_from_monday() as usize] = normalize_periods(periods);
    }

    /// Replaces the weekly pattern on `date`; an empty list makes it a holiday.
    pub fn add_exception(&mut self, date: NaiveDate, periods: Vec<WorkPeriod>) {
        self.exceptions.insert(date, normalize_periods(periods));
    }

    pub fn add_holiday(&mut self, date: NaiveDate) {
        self.add_exception(date, Vec::new());
    }

    pub fn exceptions(&self) -> impl Iterator<Item = (&NaiveDate, &[WorkPeriod])> {
        self.exceptions
            .iter()
            .map(|(date, periods)| (date, periods.as_slice()))
    }

    pub fn get_work_periods(&self, date: NaiveDate) -> &[WorkPeriod] {
        match self.exceptions.get(&date) {
            Some(periods) => periods,
            None => &self.weekly[date.weekday().num_days_from_monday() as usize],
        }
    }

    fn is_degenerate_day(periods: &[WorkPeriod]) -> bool {
        !periods.is_empty() && periods.iter().all(WorkPeriod::is_degenerate)
    }

    /// Work hours on `date`. Days whose periods are all zero-length model
    /// continuous processes and count as `default_hours_per_day`.
    pub fn get_work_hours(&self, date: NaiveDate) -> f64 {
        let periods = self.get_work_periods(date);
        if Self::is_degenerate_day(periods) {
            return self.default_hours_per_day.max(0.0);
        }
        periods.iter().map(WorkPeriod::duration_hours).sum()
    }

    pub fn is_work_day(&self, date: NaiveDate) -> bool {
        !self.work_windows(date).is_empty()
    }

    /// Work windows on `date` in seconds after midnight, ordered and disjoint.
    fn work_windows(&self, date: NaiveDate) -> Vec<(i64, i64)> {
        let periods = self.get_work_periods(date);
        if Self::is_degenerate_day(periods) {
            let length = hours_to_seconds(self.default_hours_per_day).clamp(0, SECONDS_PER_DAY);
            if length == 0 {
                return Vec::new();
            }
            let start = DEGENERATE_BLOCK_START.min(SECONDS_PER_DAY - length);
            return vec![(start, start + length)];
        }
        periods
            .iter()
            .filter(|p| !p.is_degenerate())
            .map(|p| {
                (
                    i64::from(p.start_minute) * 60,
                    i64::from(p.finish_minute) * 60,
                )
            })
            .collect()
    }

    /// The first work window ending after `t`, clipped so it starts no earlier than `t`.
    fn window_at_or_after(&self, t: NaiveDateTime) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let first_day = t.date();
        let second = seconds_of_day(t);
        for offset in 0..MAX_SCAN_DAYS {
            let day = shift_date(first_day, offset)?;
            for (start, finish) in self.work_windows(day) {
                if offset == 0 {
                    if finish <= second {
                        continue;
                    }
                    return Some((at(day, start.max(second)), at(day, finish)));
                }
                return Some((at(day, start), at(day, finish)));
            }
        }
        None
    }

    /// The last work window starting before `t`, clipped so it ends no later than `t`.
    fn window_at_or_before(&self, t: NaiveDateTime) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let first_day = t.date();
        let second = seconds_of_day(t);
        for offset in 0..MAX_SCAN_DAYS {
            let day = shift_date(first_day, -offset)?;
            for (start, finish) in self.work_windows(day).into_iter().rev() {
                if offset == 0 {
                    if start >= second {
                        continue;
                    }
                    return Some((at(day, start), at(day, finish.min(second))));
                }
                return Some((at(day, start), at(day, finish)));
            }
        }
        None
    }

    /// Snaps `t` forward to the nearest instant at which work can proceed.
    pub fn advance_to_work_time(&self, t: NaiveDateTime) -> NaiveDateTime {
        match self.window_at_or_after(t) {
            Some((start, _)) => start,
            None => {
                warn!(calendar_id = self.id, %t, "no work time found after instant");
                t
            }
        }
    }

    /// Snaps `t` backward to the nearest instant up to which work can have run.
    pub fn retreat_to_work_time(&self, t: NaiveDateTime) -> NaiveDateTime {
        match self.window_at_or_before(t) {
            Some((_, finish)) => finish,
            None => {
                warn!(calendar_id = self.id, %t, "no work time found before instant");
                t
            }
        }
    }

    pub fn add_work_hours(&self, start: NaiveDateTime, hours: f64) -> NaiveDateTime {
        if hours.is_nan() || hours <= 0.0 {
            return start;
        }
        let mut remaining = hours_to_seconds(hours);
        let mut cursor = start;
        while let Some((from, to)) = self.window_at_or_after(cursor) {
            let available = (to - from).num_seconds();
            if remaining <= available {
                return from + TimeDelta::seconds(remaining);
            }
            remaining -= available;
            cursor = to;
        }
        warn!(
            calendar_id = self.id,
            %start,
            hours,
            "calendar ran out of work time while adding hours"
        );
        cursor
    }

    pub fn subtract_work_hours(&self, end: NaiveDateTime, hours: f64) -> NaiveDateTime {
        if hours.is_nan() || hours <= 0.0 {
            return end;
        }
        let mut remaining = hours_to_seconds(hours);
        let mut cursor = end;
        while let Some((from, to)) = self.window_at_or_before(cursor) {
            let available = (to - from).num_seconds();
            if remaining <= available {
                return to - TimeDelta::seconds(remaining);
            }
            remaining -= available;
            cursor = from;
        }
        warn!(
            calendar_id = self.id,
            %end,
            hours,
            "calendar ran out of work time while subtracting hours"
        );
        cursor
    }

    /// Work hours inside `[a, b]`; zero when `b <= a`.
    pub fn work_hours_between(&self, a: NaiveDateTime, b: NaiveDateTime) -> f64 {
        if b <= a {
            return 0.0;
        }
        let mut total = 0i64;
        let mut day = a.date();
        let last_day = b.date();
        while day <= last_day {
            for (start, finish) in self.work_windows(day) {
                let from = at(day, start).max(a);
                let to = at(day, finish).min(b);
                if to > from {
                    total += (to - from).num_seconds();
                }
            }
            match shift_date(day, 1) {
                Some(next) => day = next,
                None => break,
            }
        }
        seconds_to_hours(total)
    }

    /// Signed variant of [`work_hours_between`](Self::work_hours_between):
    /// negative when `b` precedes `a`.
    pub fn signed_work_hours_between(&self, a: NaiveDateTime, b: NaiveDateTime) -> f64 {
        if b >= a {
            self.work_hours_between(a, b)
        } else {
            -self.work_hours_between(b, a)
        }
    }

    /// Moves `t` by a signed number of work hours.
    pub fn shift_work_hours(&self, t: NaiveDateTime, hours: f64) -> NaiveDateTime {
        if hours > 0.0 {
            self.add_work_hours(t, hours)
        } else if hours < 0.0 {
            self.subtract_work_hours(t, -hours)
        } else {
            t
        }
    }
}

/// Calendars keyed by id, with the default used for tasks whose calendar is
/// missing or unknown.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarSet {
    calendars: HashMap<CalendarId, WorkCalendar>,
    default_id: CalendarId,
}

impl CalendarSet {
    pub fn new<I>(calendars: I, default_id: CalendarId) -> Result<Self, ScheduleError>
    where
        I: IntoIterator<Item = WorkCalendar>,
    {
        let calendars: HashMap<CalendarId, WorkCalendar> =
            calendars.into_iter().map(|c| (c.id(), c)).collect();
        if calendars.is_empty() {
            return Err(ScheduleError::Configuration(
                "at least one calendar is required".into(),
            ));
        }
        if !calendars.contains_key(&default_id) {
            return Err(ScheduleError::Configuration(format!(
                "default calendar {default_id} is not among the loaded calendars"
            )));
        }
        Ok(Self {
            calendars,
            default_id,
        })
    }

    /// A set holding only `calendar`, which becomes the default.
    pub fn single(calendar: WorkCalendar) -> Self {
        let default_id = calendar.id();
        Self {
            calendars: HashMap::from([(default_id, calendar)]),
            default_id,
        }
    }

    pub fn default_id(&self) -> CalendarId {
        self.default_id
    }

    pub fn default_calendar(&self) -> &WorkCalendar {
        // `new` and `single` both guarantee the default is present.
        &self.calendars[&self.default_id]
    }

    pub fn get(&self, id: CalendarId) -> Option<&WorkCalendar> {
        self.calendars.get(&id)
    }

    pub fn contains(&self, id: CalendarId) -> bool {
        self.calendars.contains_key(&id)
    }

    /// Falls back to the default calendar for missing or unknown ids.
    pub fn resolve(&self, id: Option<CalendarId>) -> &WorkCalendar {
        match id.and_then(|id| self.calendars.get(&id)) {
            Some(calendar) => calendar,
            None => self.default_calendar(),
        }
    }

    pub fn len(&self) -> usize {
        self.calendars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calendars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkCalendar> {
        self.calendars.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn periods_normalize_order_and_midnight() {
        let swapped = WorkPeriod::new(17 * 60, 13 * 60);
        assert_eq!((swapped.start_minute(), swapped.finish_minute()), (780, 1020));

        let night = WorkPeriod::new(16 * 60, 0);
        assert_eq!((night.start_minute(), night.finish_minute()), (960, 1440));

        let zero = WorkPeriod::new(0, 0);
        assert!(zero.is_degenerate());
    }

    #[test]
    fn overlapping_periods_are_merged() {
        let merged = normalize_periods(vec![
            WorkPeriod::from_hm(13, 0, 17, 0),
            WorkPeriod::from_hm(8, 0, 12, 0),
            WorkPeriod::from_hm(11, 0, 14, 0),
        ]);
        assert_eq!(merged, vec![WorkPeriod::from_hm(8, 0, 17, 0)]);
    }

    #[test]
    fn degenerate_block_fits_inside_the_day() {
        let mut calendar = WorkCalendar::new(1, "Cure", 20.0);
        calendar.set_weekday_periods(Weekday::Mon, vec![WorkPeriod::new(0, 0)]);
        let monday = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        assert_eq!(calendar.work_windows(monday), vec![(4 * 3600, 24 * 3600)]);
        assert_eq!(calendar.get_work_hours(monday), 20.0);
    }
}
