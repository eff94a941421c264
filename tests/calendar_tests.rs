use chrono::{NaiveDate, NaiveDateTime, Weekday};
use schedule_cpm::{CalendarParseError, CalendarSet, ScheduleError, WorkCalendar, WorkPeriod};

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn dt(y: i32, m: u32, day: u32, h: u32, mi: u32) -> NaiveDateTime {
    d(y, m, day).and_hms_opt(h, mi, 0).unwrap()
}

fn weekday_record(n: u32, periods: &[&str]) -> String {
    let children: String = periods
        .iter()
        .enumerate()
        .map(|(i, p)| format!("(0||{i}({p})())"))
        .collect();
    format!("(0||{n}()({children}))")
}

fn calendar_text(days: &[String], exceptions: &[String]) -> String {
    format!(
        "(0||CalendarData()((0||DaysOfWeek()({}))(0||Exceptions()({}))))",
        days.concat(),
        exceptions.concat()
    )
}

/// Monday to Friday, 08:00-12:00 and 13:00-17:00. Monday's afternoon is
/// written finish-first, as some exports do.
fn standard_text(exceptions: &[String]) -> String {
    let mut days = vec![weekday_record(1, &[])];
    days.push(weekday_record(2, &["s|08:00|f|12:00", "f|17:00|s|13:00"]));
    for n in 3..=6 {
        days.push(weekday_record(n, &["s|08:00|f|12:00", "s|13:00|f|17:00"]));
    }
    days.push(weekday_record(7, &[]));
    calendar_text(&days, exceptions)
}

fn standard() -> WorkCalendar {
    WorkCalendar::parse(1, &standard_text(&[]), 8.0, "Standard").unwrap()
}

/// Every day degenerate; runs as 08:00-16:00 with the 8h default.
fn cure() -> WorkCalendar {
    let days: Vec<String> = (1..=7)
        .map(|n| weekday_record(n, &["s|00:00|f|00:00"]))
        .collect();
    WorkCalendar::parse(3, &calendar_text(&days, &[]), 8.0, "Cure").unwrap()
}

#[test]
fn parses_weekly_pattern_in_both_token_orders() {
    let cal = standard();
    let monday = cal.get_work_periods(d(2025, 1, 6));
    assert_eq!(
        monday,
        &[WorkPeriod::from_hm(8, 0, 12, 0), WorkPeriod::from_hm(13, 0, 17, 0)]
    );
    assert_eq!(cal.get_work_hours(d(2025, 1, 6)), 8.0);
    assert_eq!(cal.get_work_hours(d(2025, 1, 7)), 8.0);
    assert_eq!(cal.get_work_hours(d(2025, 1, 11)), 0.0);
    assert_eq!(cal.get_work_hours(d(2025, 1, 12)), 0.0);
    assert!(!cal.is_work_day(d(2025, 1, 12)));
}

#[test]
fn parsed_calendar_matches_builder_calendar() {
    let built = WorkCalendar::standard(1, "Standard");
    let parsed = standard();
    for offset in 0..14 {
        let day = d(2025, 1, 6) + chrono::TimeDelta::days(offset);
        assert_eq!(built.get_work_periods(day), parsed.get_work_periods(day), "{day}");
    }
}

#[test]
fn exceptions_use_serial_dates_and_override_the_week() {
    // 45665 is Wednesday 2025-01-08; 45668 is Saturday 2025-01-11.
    let text = standard_text(&[
        "(0||0(d|45665)())".to_string(),
        "(0||1(d|45668)((0||0(s|08:00|f|12:00)())))".to_string(),
    ]);
    let cal = WorkCalendar::parse(7, &text, 8.0, "With holidays").unwrap();
    assert!(!cal.is_work_day(d(2025, 1, 8)));
    assert_eq!(cal.get_work_hours(d(2025, 1, 8)), 0.0);
    assert!(cal.is_work_day(d(2025, 1, 11)));
    assert_eq!(cal.get_work_hours(d(2025, 1, 11)), 4.0);
    assert_eq!(cal.exceptions().count(), 2);
}

#[test]
fn malformed_text_is_rejected() {
    let unbalanced = WorkCalendar::parse(1, "(0||CalendarData()(", 8.0, "Bad");
    assert!(matches!(unbalanced, Err(CalendarParseError::Unbalanced { .. })));

    let bad_time = calendar_text(&[weekday_record(2, &["s|8am|f|12:00"])], &[]);
    assert!(matches!(
        WorkCalendar::parse(1, &bad_time, 8.0, "Bad"),
        Err(CalendarParseError::InvalidTime(_))
    ));

    let bad_date = standard_text(&["(0||0(d|someday)())".to_string()]);
    assert!(matches!(
        WorkCalendar::parse(1, &bad_date, 8.0, "Bad"),
        Err(CalendarParseError::InvalidSerialDate(_))
    ));
}

#[test]
fn add_work_hours_crosses_lunch_and_weekends() {
    let cal = standard();
    assert_eq!(cal.add_work_hours(dt(2025, 1, 6, 8, 0), 16.0), dt(2025, 1, 7, 17, 0));
    assert_eq!(cal.add_work_hours(dt(2025, 1, 6, 12, 30), 1.0), dt(2025, 1, 6, 14, 0));
    assert_eq!(cal.add_work_hours(dt(2025, 1, 10, 13, 0), 8.0), dt(2025, 1, 13, 12, 0));
    assert_eq!(cal.add_work_hours(dt(2025, 1, 6, 8, 0), 2.5), dt(2025, 1, 6, 10, 30));
}

#[test]
fn add_from_end_of_day_moves_to_next_work_period() {
    let cal = standard();
    assert_eq!(cal.add_work_hours(dt(2025, 1, 7, 17, 0), 8.0), dt(2025, 1, 8, 17, 0));
    assert_eq!(cal.add_work_hours(dt(2025, 1, 11, 10, 0), 1.0), dt(2025, 1, 13, 9, 0));
}

#[test]
fn subtract_work_hours_mirrors_add() {
    let cal = standard();
    assert_eq!(cal.subtract_work_hours(dt(2025, 1, 13, 12, 0), 8.0), dt(2025, 1, 10, 13, 0));
    assert_eq!(cal.subtract_work_hours(dt(2025, 1, 8, 17, 0), 24.0), dt(2025, 1, 6, 8, 0));
    assert_eq!(cal.subtract_work_hours(dt(2025, 1, 6, 13, 0), 1.0), dt(2025, 1, 6, 11, 0));
}

#[test]
fn non_positive_hours_return_the_input() {
    let cal = standard();
    let t = dt(2025, 1, 11, 10, 0);
    assert_eq!(cal.add_work_hours(t, 0.0), t);
    assert_eq!(cal.add_work_hours(t, -3.0), t);
    assert_eq!(cal.subtract_work_hours(t, 0.0), t);
    assert_eq!(cal.subtract_work_hours(t, -3.0), t);
}

#[test]
fn signed_shift_moves_in_both_directions() {
    let cal = standard();
    let t = dt(2025, 1, 6, 17, 0);
    assert_eq!(cal.shift_work_hours(t, 4.0), dt(2025, 1, 7, 12, 0));
    assert_eq!(cal.shift_work_hours(t, -4.0), dt(2025, 1, 6, 13, 0));
    assert_eq!(cal.shift_work_hours(t, 0.0), t);
}

#[test]
fn snapping_finds_nearest_work_instant() {
    let cal = standard();
    assert_eq!(cal.advance_to_work_time(dt(2025, 1, 7, 17, 0)), dt(2025, 1, 8, 8, 0));
    assert_eq!(cal.advance_to_work_time(dt(2025, 1, 6, 12, 15)), dt(2025, 1, 6, 13, 0));
    assert_eq!(cal.advance_to_work_time(dt(2025, 1, 6, 9, 0)), dt(2025, 1, 6, 9, 0));
    assert_eq!(cal.retreat_to_work_time(dt(2025, 1, 8, 8, 0)), dt(2025, 1, 7, 17, 0));
    assert_eq!(cal.retreat_to_work_time(dt(2025, 1, 12, 9, 0)), dt(2025, 1, 10, 17, 0));
    assert_eq!(cal.retreat_to_work_time(dt(2025, 1, 6, 12, 30)), dt(2025, 1, 6, 12, 0));
}

#[test]
fn work_hours_between_counts_only_work_time() {
    let cal = standard();
    assert_eq!(cal.work_hours_between(dt(2025, 1, 6, 8, 0), dt(2025, 1, 7, 17, 0)), 16.0);
    assert_eq!(cal.work_hours_between(dt(2025, 1, 10, 16, 0), dt(2025, 1, 13, 9, 0)), 2.0);
    assert_eq!(cal.work_hours_between(dt(2025, 1, 6, 11, 30), dt(2025, 1, 6, 13, 30)), 1.0);
    assert_eq!(cal.work_hours_between(dt(2025, 1, 7, 8, 0), dt(2025, 1, 6, 8, 0)), 0.0);
    assert_eq!(
        cal.signed_work_hours_between(dt(2025, 1, 7, 17, 0), dt(2025, 1, 6, 17, 0)),
        -8.0
    );
}

#[test]
fn add_then_subtract_returns_to_a_work_instant() {
    let text = standard_text(&["(0||0(d|45665)())".to_string()]);
    let calendars = [
        standard(),
        WorkCalendar::parse(2, &text, 8.0, "Holiday").unwrap(),
        cure(),
    ];
    let starts = [
        dt(2025, 1, 6, 8, 0),
        dt(2025, 1, 6, 10, 45),
        dt(2025, 1, 7, 13, 0),
        dt(2025, 1, 10, 16, 30),
    ];
    let hours = [0.25, 1.0, 3.5, 4.0, 8.0, 13.75, 40.0];
    for cal in &calendars {
        for &start in &starts {
            let t = cal.advance_to_work_time(start);
            for &h in &hours {
                let end = cal.add_work_hours(t, h);
                assert_eq!(cal.subtract_work_hours(end, h), t, "start {t} hours {h}");
                assert_eq!(cal.work_hours_between(t, end), h, "start {t} hours {h}");
            }
        }
    }
}

#[test]
fn work_hours_between_is_additive() {
    let cal = standard();
    let a = dt(2025, 1, 6, 9, 30);
    let b = dt(2025, 1, 8, 12, 30);
    let c = dt(2025, 1, 14, 15, 10);
    assert_eq!(
        cal.work_hours_between(a, b) + cal.work_hours_between(b, c),
        cal.work_hours_between(a, c)
    );

    // Split points outside the degenerate block and across the weekend.
    let cal = cure();
    let a = dt(2025, 1, 10, 14, 0);
    let b = dt(2025, 1, 12, 20, 0);
    let c = dt(2025, 1, 14, 9, 15);
    assert_eq!(cal.work_hours_between(a, b), 18.0);
    assert_eq!(cal.work_hours_between(b, c), 9.25);
    assert_eq!(cal.work_hours_between(a, c), 27.25);
}

#[test]
fn degenerate_days_run_as_one_block_of_default_hours() {
    let cal = cure();

    assert_eq!(cal.get_work_hours(d(2025, 1, 11)), 8.0);
    assert_eq!(cal.add_work_hours(dt(2025, 1, 6, 8, 0), 8.0), dt(2025, 1, 6, 16, 0));
    assert_eq!(cal.add_work_hours(dt(2025, 1, 6, 8, 0), 12.0), dt(2025, 1, 7, 12, 0));
    assert_eq!(cal.subtract_work_hours(dt(2025, 1, 7, 12, 0), 12.0), dt(2025, 1, 6, 8, 0));
    assert_eq!(cal.work_hours_between(dt(2025, 1, 6, 0, 0), dt(2025, 1, 9, 0, 0)), 24.0);
    // The block ends at 16:00, so that is where backward snapping lands.
    assert_eq!(cal.retreat_to_work_time(dt(2025, 1, 7, 17, 0)), dt(2025, 1, 7, 16, 0));
    assert_eq!(cal.subtract_work_hours(dt(2025, 1, 7, 17, 0), 4.0), dt(2025, 1, 7, 12, 0));
}

#[test]
fn builder_api_sets_weekdays_and_holidays() {
    let mut cal = WorkCalendar::new(4, "Weekend crew", 10.0);
    cal.set_weekday_periods(Weekday::Sat, vec![WorkPeriod::from_hm(7, 0, 17, 0)]);
    cal.set_weekday_periods(Weekday::Sun, vec![WorkPeriod::from_hm(7, 0, 17, 0)]);
    cal.add_holiday(d(2025, 1, 12));

    assert_eq!(cal.get_work_hours(d(2025, 1, 11)), 10.0);
    assert!(!cal.is_work_day(d(2025, 1, 12)));
    assert!(!cal.is_work_day(d(2025, 1, 13)));
    assert_eq!(cal.add_work_hours(dt(2025, 1, 11, 7, 0), 12.0), dt(2025, 1, 18, 9, 0));
}

#[test]
fn calendar_set_requires_its_default() {
    assert!(matches!(
        CalendarSet::new(Vec::new(), 1),
        Err(ScheduleError::Configuration(_))
    ));
    assert!(matches!(
        CalendarSet::new(vec![WorkCalendar::standard(1, "Standard")], 2),
        Err(ScheduleError::Configuration(_))
    ));

    let set = CalendarSet::new(
        vec![
            WorkCalendar::standard(1, "Standard"),
            WorkCalendar::new(2, "Empty", 8.0),
        ],
        1,
    )
    .unwrap();
    assert_eq!(set.len(), 2);
    assert_eq!(set.resolve(Some(2)).id(), 2);
    assert_eq!(set.resolve(Some(99)).id(), 1);
    assert_eq!(set.resolve(None).id(), 1);
}
