//! Reader for the nested, parenthesis-delimited calendar text found in
//! schedule exports:
//!
//! ```text
//! (0||CalendarData()(
//!   (0||DaysOfWeek()(
//!     (0||1()())
//!     (0||2()((0||0(s|08:00|f|12:00)())(0||1(f|17:00|s|13:00)())))
//!     ...))
//!   (0||Exceptions()((0||0(d|45665)())))))
//! ```
//!
//! Every record is `(<header>(<attributes>)(<children>))`. The text is first
//! split into parenthesis and text tokens, then folded into a tree by
//! balanced-parenthesis descent, and only then interpreted.

use super::WorkPeriod;
use crate::error::CalendarParseError;
use chrono::{NaiveDate, TimeDelta};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Open(usize),
    Close(usize),
    Text(&'a str),
}

fn flush_text<'a>(raw: &'a str, tokens: &mut Vec<Token<'a>>, start: Option<usize>, end: usize) {
    if let Some(start) = start {
        let text = raw[start..end].trim_matches(|c: char| c.is_whitespace() || c.is_control());
        if !text.is_empty() {
            tokens.push(Token::Text(text));
        }
    }
}

fn tokenize(raw: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut text_start: Option<usize> = None;

    for (pos, ch) in raw.char_indices() {
        match ch {
            '(' => {
                flush_text(raw, &mut tokens, text_start.take(), pos);
                tokens.push(Token::Open(pos));
            }
            ')' => {
                flush_text(raw, &mut tokens, text_start.take(), pos);
                tokens.push(Token::Close(pos));
            }
            _ => {
                if text_start.is_none() {
                    text_start = Some(pos);
                }
            }
        }
    }
    flush_text(raw, &mut tokens, text_start, raw.len());
    tokens
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Group(Vec<Node>),
}

fn parse_nodes(raw: &str) -> Result<Vec<Node>, CalendarParseError> {
    let tokens = tokenize(raw);
    let mut cursor = 0;
    let mut nodes = Vec::new();
    while cursor < tokens.len() {
        match tokens[cursor] {
            Token::Open(position) => {
                cursor += 1;
                nodes.push(Node::Group(parse_group(&tokens, &mut cursor, position)?));
            }
            Token::Close(position) => return Err(CalendarParseError::UnexpectedClose { position }),
            Token::Text(text) => {
                nodes.push(Node::Text(text.to_string()));
                cursor += 1;
            }
        }
    }
    Ok(nodes)
}

/// Consumes tokens up to and including the `)` matching the `(` at `opened_at`.
fn parse_group(
    tokens: &[Token<'_>],
    cursor: &mut usize,
    opened_at: usize,
) -> Result<Vec<Node>, CalendarParseError> {
    let mut items = Vec::new();
    while let Some(token) = tokens.get(*cursor) {
        *cursor += 1;
        match *token {
            Token::Open(position) => {
                items.push(Node::Group(parse_group(tokens, cursor, position)?))
            }
            Token::Close(_) => return Ok(items),
            Token::Text(text) => items.push(Node::Text(text.to_string())),
        }
    }
    Err(CalendarParseError::Unbalanced {
        position: opened_at,
    })
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Record {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Record>,
}

impl Record {
    fn from_group(items: &[Node]) -> Record {
        let (name, rest) = match items.split_first() {
            Some((Node::Text(header), rest)) => (
                header
                    .rsplit("||")
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
                rest,
            ),
            _ => (String::new(), items),
        };

        let groups: Vec<&[Node]> = rest
            .iter()
            .filter_map(|node| match node {
                Node::Group(inner) => Some(inner.as_slice()),
                Node::Text(_) => None,
            })
            .collect();

        // A record without a header is a bare container of records.
        if name.is_empty() {
            return Record {
                name,
                attributes: Vec::new(),
                children: groups.into_iter().map(Record::from_group).collect(),
            };
        }

        let attributes = groups
            .first()
            .map(|attrs| parse_attributes(attrs))
            .unwrap_or_default();
        let children = groups
            .get(1)
            .map(|children| {
                children
                    .iter()
                    .filter_map(|node| match node {
                        Node::Group(inner) => Some(Record::from_group(inner)),
                        Node::Text(_) => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Record {
            name,
            attributes,
            children,
        }
    }

    fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    fn find(&self, name: &str) -> Option<&Record> {
        if self.name.eq_ignore_ascii_case(name) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }
}

/// `s|08:00|f|12:00` -> `[("s", "08:00"), ("f", "12:00")]`
fn parse_attributes(items: &[Node]) -> Vec<(String, String)> {
    let text: String = items
        .iter()
        .filter_map(|node| match node {
            Node::Text(text) => Some(text.as_str()),
            Node::Group(_) => None,
        })
        .collect::<Vec<_>>()
        .join("|");

    let parts: Vec<&str> = text.split('|').map(str::trim).collect();
    parts
        .chunks(2)
        .filter(|pair| pair.len() == 2 && !pair[0].is_empty())
        .map(|pair| (pair[0].to_string(), pair[1].to_string()))
        .collect()
}

/// Parses `HH:MM` into minutes after midnight; `24:00` is accepted.
pub(crate) fn parse_clock(value: &str) -> Result<u32, CalendarParseError> {
    let invalid = || CalendarParseError::InvalidTime(value.to_string());
    let (hours, minutes) = value.trim().split_once(':').ok_or_else(invalid)?;
    let hours: u32 = hours.trim().parse().map_err(|_| invalid())?;
    let minutes: u32 = minutes.trim().parse().map_err(|_| invalid())?;
    if minutes >= 60 || hours > 24 || (hours == 24 && minutes != 0) {
        return Err(invalid());
    }
    Ok(hours * 60 + minutes)
}

/// Serial day numbers count from 1899-12-30.
pub(crate) fn serial_to_date(value: &str) -> Result<NaiveDate, CalendarParseError> {
    let invalid = || CalendarParseError::InvalidSerialDate(value.to_string());
    let serial: f64 = value.trim().parse().map_err(|_| invalid())?;
    if !serial.is_finite() {
        return Err(invalid());
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30).ok_or_else(invalid)?;
    epoch
        .checked_add_signed(TimeDelta::try_days(serial.trunc() as i64).ok_or_else(invalid)?)
        .ok_or_else(invalid)
}

fn period_from_record(record: &Record) -> Result<Option<WorkPeriod>, CalendarParseError> {
    match (record.attribute("s"), record.attribute("f")) {
        (Some(start), Some(finish)) => Ok(Some(WorkPeriod::new(
            parse_clock(start)?,
            parse_clock(finish)?,
        ))),
        _ => {
            warn!(attributes = ?record.attributes, "skipping work period without start and finish");
            Ok(None)
        }
    }
}

fn periods_from_children(record: &Record) -> Result<Vec<WorkPeriod>, CalendarParseError> {
    let mut periods = Vec::with_capacity(record.children.len());
    for child in &record.children {
        if let Some(period) = period_from_record(child)? {
            periods.push(period);
        }
    }
    Ok(periods)
}

/// Weekday records are numbered 1 (Sunday) through 7 (Saturday); the result
/// is indexed from Monday.
fn weekday_slot(name: &str) -> Option<usize> {
    match name.trim().parse::<usize>() {
        Ok(n @ 1..=7) => Some((n + 5) % 7),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ParsedCalendar {
    pub weekly: [Vec<WorkPeriod>; 7],
    pub exceptions: Vec<(NaiveDate, Vec<WorkPeriod>)>,
}

pub(crate) fn parse_calendar_data(raw: &str) -> Result<ParsedCalendar, CalendarParseError> {
    let nodes = parse_nodes(raw)?;
    let root = Record {
        name: String::new(),
        attributes: Vec::new(),
        children: nodes
            .iter()
            .filter_map(|node| match node {
                Node::Group(items) => Some(Record::from_group(items)),
                Node::Text(_) => None,
            })
            .collect(),
    };

    let mut parsed = ParsedCalendar::default();

    match root.find("DaysOfWeek") {
        Some(days) => {
            for day in &days.children {
                let Some(slot) = weekday_slot(&day.name) else {
                    warn!(day = %day.name, "skipping unknown weekday record");
                    continue;
                };
                parsed.weekly[slot] = periods_from_children(day)?;
            }
        }
        None => warn!("calendar data has no DaysOfWeek section"),
    }

    if let Some(exceptions) = root.find("Exceptions") {
        for exception in &exceptions.children {
            let Some(serial) = exception.attribute("d") else {
                warn!(record = %exception.name, "skipping exception without a date");
                continue;
            };
            let date = serial_to_date(serial)?;
            parsed
                .exceptions
                .push((date, periods_from_children(exception)?));
        }
    }

    Ok(parsed)
}
