// src/ingest/normalize.rs
//! Maps raw upstream values onto the canonical `Game` shape.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::ingest::error::IngestError;
use crate::ingest::types::{Game, RawRow, SourceConfig, CANONICAL_DATE_FORMAT};

pub const COL_DATE: &str = "Date";
pub const COL_TIME: &str = "Time";
pub const COL_FIELD: &str = "field_name";
pub const COL_HOME: &str = "home_team";
pub const COL_AWAY: &str = "visit_team";

/// Columns every CSV export must carry.
pub const REQUIRED_COLUMNS: [&str; 5] = [COL_DATE, COL_TIME, COL_FIELD, COL_HOME, COL_AWAY];

/// Raw date layout a strategy produces. Each strategy yields exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateLayout {
    /// `9/23/2022` with the time in a separate column (CSV exports).
    UsSlashed,
    /// `2022-09-23`, possibly followed by more text (schedule pages).
    IsoPrefixed,
}

fn re_ws() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"))
}

fn re_meridiem() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(\d{1,2}:\d{2}(?::\d{2})?)\s*([ap])\.?\s*m\.?$").expect("meridiem regex"))
}

/// Collapse whitespace runs to one space and trim.
pub fn collapse_ws(s: &str) -> String {
    re_ws().replace_all(s.trim(), " ").into_owned()
}

/// Trim a cell and decode any HTML entities the export left in it.
pub fn clean_cell(s: &str) -> String {
    collapse_ws(&html_escape::decode_html_entities(s))
}

/// `7:00  PM`, `7:00 pm`, `7:00PM` -> `7:00PM`; 24h values pass through.
pub fn clean_time(raw: &str) -> String {
    let t = collapse_ws(raw);
    match re_meridiem().captures(&t) {
        Some(caps) => format!("{}{}M", &caps[1], caps[2].to_ascii_uppercase()),
        None => t,
    }
}

fn parse_time(raw: &str) -> Result<NaiveTime, IngestError> {
    let t = clean_time(raw);
    ["%I:%M%p", "%I:%M:%S%p", "%H:%M", "%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(&t, fmt).ok())
        .ok_or_else(|| IngestError::Parse(format!("unrecognized time {raw:?}")))
}

fn parse_date(layout: DateLayout, raw: &str) -> Result<NaiveDate, IngestError> {
    let d = collapse_ws(raw);
    let parsed = match layout {
        DateLayout::UsSlashed => NaiveDate::parse_from_str(&d, "%m/%d/%Y").ok(),
        DateLayout::IsoPrefixed => d
            .get(..10)
            .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()),
    };
    parsed.ok_or_else(|| IngestError::Parse(format!("unrecognized date {raw:?} for {layout:?}")))
}

/// Combine a raw date and time into the canonical `YYYY-MM-DD h:mmAM` string.
pub fn canonical_date(layout: DateLayout, date: &str, time: &str) -> Result<String, IngestError> {
    let dt = NaiveDateTime::new(parse_date(layout, date)?, parse_time(time)?);
    Ok(dt.format(CANONICAL_DATE_FORMAT).to_string())
}

/// Apply the source's team rewrites in order.
pub fn rewrite_team(source: &SourceConfig, team: &str) -> String {
    source
        .team_rewrites
        .iter()
        .fold(team.to_string(), |acc, (from, to)| acc.replace(from.as_str(), to))
}

fn column<'a>(row: &'a RawRow, name: &str) -> Result<&'a str, IngestError> {
    row.get(name)
        .map(String::as_str)
        .ok_or_else(|| IngestError::Parse(format!("row is missing column {name:?}")))
}

/// Normalize one CSV export row for `source`.
pub fn normalize(source: &SourceConfig, row: &RawRow) -> Result<Game, IngestError> {
    let date = canonical_date(DateLayout::UsSlashed, column(row, COL_DATE)?, column(row, COL_TIME)?)?;
    Ok(Game {
        date,
        who: source.id.to_string(),
        field: clean_cell(column(row, COL_FIELD)?),
        home: rewrite_team(source, &clean_cell(column(row, COL_HOME)?)),
        away: rewrite_team(source, &clean_cell(column(row, COL_AWAY)?)),
    })
}
