// src/ingest/types.rs
use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Canonical date layout shared by every source, e.g. `2022-09-23 7:00PM`.
pub const CANONICAL_DATE_FORMAT: &str = "%Y-%m-%d %-I:%M%p";

/// Stable lowercase slug identifying one tracked participant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One scheduled game in the shape served to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub date: String,
    pub who: String,
    pub field: String,
    pub home: String,
    pub away: String,
}

impl Game {
    /// Parses `date` back into a timestamp. `None` only for data that did not
    /// come through the normalizer (e.g. hand-edited cache values).
    pub fn starts_at(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.date, CANONICAL_DATE_FORMAT).ok()
    }
}

/// A CSV export row keyed by header name.
pub type RawRow = HashMap<String, String>;

/// How a source's schedule is obtained. Closed set; the orchestrator
/// dispatches on it exhaustively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStrategy {
    /// Form-encoded POST that returns a CSV export.
    CsvForm { url: String, body: String },
    /// GET of a schedule page, keeping games that mention `filter_name`.
    HtmlScrape { url: String, filter_name: String },
}

impl FetchStrategy {
    pub fn tag(&self) -> &'static str {
        match self {
            FetchStrategy::CsvForm { .. } => "csv-form",
            FetchStrategy::HtmlScrape { .. } => "html-scrape",
        }
    }

    pub fn url(&self) -> &str {
        match self {
            FetchStrategy::CsvForm { url, .. } | FetchStrategy::HtmlScrape { url, .. } => url,
        }
    }
}

/// Static per-source configuration, built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub id: SourceId,
    pub display_name: String,
    pub strategy: FetchStrategy,
    /// Source-local team name rewrites `(from, to)`, applied to home/away.
    pub team_rewrites: Vec<(String, String)>,
}

/// Result handed to consumers: merged games plus the last refresh timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSnapshot {
    pub games: Vec<Game>,
    pub fetch_date: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_serializes_with_consumer_field_names() {
        let snap = ScheduleSnapshot {
            games: vec![Game {
                date: "2022-09-23 7:00PM".into(),
                who: "kat".into(),
                field: "Field 3".into(),
                home: "Team A".into(),
                away: "Team B".into(),
            }],
            fetch_date: Some("2022-09-20T10:00:00.000Z".into()),
        };
        let v = serde_json::to_value(&snap).unwrap();
        assert_eq!(v["fetchDate"], "2022-09-20T10:00:00.000Z");
        let game = v["games"][0].as_object().unwrap();
        let mut keys: Vec<_> = game.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["away", "date", "field", "home", "who"]);
    }

    #[test]
    fn starts_at_reads_canonical_dates() {
        let g = Game {
            date: "2022-09-23 7:00PM".into(),
            who: "kat".into(),
            field: String::new(),
            home: String::new(),
            away: String::new(),
        };
        let ts = g.starts_at().unwrap();
        assert_eq!(ts.format("%Y-%m-%d %H:%M").to_string(), "2022-09-23 19:00");
    }
}
