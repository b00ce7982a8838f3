// src/ingest/providers/html_scrape.rs
//! Schedule-page scraper.
//!
//! Page contract:
//! - every `.gameDate` element carries a `data-date` attribute (`YYYY-MM-DD...`);
//! - inside it, a `.scheduleTable` whose header row declares the field columns
//!   (`th` 0 is the time column, `th` i+1 names data column i);
//! - each body row is one time slot: a `.gameTime` cell, then one `td` per field;
//! - a field cell lists the two teams as anchors.

use std::time::Instant;

use metrics::{counter, histogram};
use once_cell::sync::OnceCell;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::ingest::error::IngestError;
use crate::ingest::normalize::{canonical_date, collapse_ws, rewrite_team, DateLayout};
use crate::ingest::transport::Transport;
use crate::ingest::types::{Game, SourceConfig};

struct Selectors {
    date_group: Selector,
    header_cell: Selector,
    row: Selector,
    time: Selector,
    cell: Selector,
    team: Selector,
}

fn selectors() -> &'static Selectors {
    static SEL: OnceCell<Selectors> = OnceCell::new();
    SEL.get_or_init(|| {
        let parse = |s: &str| Selector::parse(s).expect("static selector");
        Selectors {
            date_group: parse(".gameDate"),
            header_cell: parse("th"),
            row: parse(".scheduleTable tbody tr"),
            time: parse(".gameTime"),
            cell: parse("td"),
            team: parse("a"),
        }
    })
}

fn re_tabs_newlines() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\s*[\t\r\n]+\s*").expect("tab/newline regex"))
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Header text with embedded tab/newline runs collapsed to one space.
fn field_name(el: ElementRef<'_>) -> String {
    re_tabs_newlines()
        .replace_all(&text_of(el), " ")
        .trim()
        .to_string()
}

/// A game row as it appears on the page, before relevance filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageGame {
    pub date: String,
    pub field: String,
    pub home: String,
    pub away: String,
}

/// Extract every game on the page, one per (time slot, field column) that
/// lists two teams. A data column without a header cell is an error.
pub fn parse_page(html: &str) -> Result<Vec<PageGame>, IngestError> {
    parse_page_matching(html, |_, _| true)
}

/// Like [`parse_page`], but only slots whose teams pass `keep` have their date
/// and time parsed, so an unrelated slot with an odd time (`TBA`) is skipped.
pub fn parse_page_matching<F>(html: &str, keep: F) -> Result<Vec<PageGame>, IngestError>
where
    F: Fn(&str, &str) -> bool,
{
    let sel = selectors();
    let doc = Html::parse_document(html);
    let mut out = Vec::new();

    for group in doc.select(&sel.date_group) {
        let date = group
            .value()
            .attr("data-date")
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| IngestError::Parse("date group without data-date".to_string()))?;

        let headers: Vec<ElementRef<'_>> = group.select(&sel.header_cell).collect();

        for row in group.select(&sel.row) {
            let cells: Vec<ElementRef<'_>> = row.select(&sel.cell).skip(1).collect();
            if cells.is_empty() {
                continue;
            }
            let time = row.select(&sel.time).next().map(text_of).unwrap_or_default();

            for (i, cell) in cells.into_iter().enumerate() {
                let field = headers
                    .get(i + 1)
                    .map(|th| field_name(*th))
                    .filter(|f| !f.is_empty())
                    .ok_or_else(|| IngestError::FieldNotFound {
                        date: date.to_string(),
                        column: i,
                    })?;

                let teams: Vec<String> = cell
                    .select(&sel.team)
                    .take(2)
                    .map(|a| collapse_ws(&text_of(a)))
                    .filter(|t| !t.is_empty())
                    .collect();
                let [home, away] = <[String; 2]>::try_from(teams).unwrap_or_default();
                if home.is_empty() || away.is_empty() || !keep(&home, &away) {
                    continue;
                }

                out.push(PageGame {
                    date: canonical_date(DateLayout::IsoPrefixed, date, &time)?,
                    field,
                    home,
                    away,
                });
            }
        }
    }

    Ok(out)
}

/// Substring match against either team. Deliberately loose: upstream names
/// carry qualifiers, so an unrelated team containing the filter also matches.
pub fn is_relevant(filter_name: &str, home: &str, away: &str) -> bool {
    home.contains(filter_name) || away.contains(filter_name)
}

/// Parse a page and keep the games relevant to `filter_name`, normalized for `source`.
pub fn games_from_page(
    source: &SourceConfig,
    filter_name: &str,
    html: &str,
) -> Result<Vec<Game>, IngestError> {
    let kept = parse_page_matching(html, |home, away| is_relevant(filter_name, home, away))?;
    let games: Vec<Game> = kept
        .into_iter()
        .map(|g| Game {
            date: g.date,
            who: source.id.to_string(),
            field: g.field,
            home: rewrite_team(source, &g.home),
            away: rewrite_team(source, &g.away),
        })
        .collect();
    tracing::debug!(
        target: "ingest",
        source = %source.id,
        kept = games.len(),
        "schedule page filtered"
    );
    Ok(games)
}

/// GET the schedule page and return the relevant games.
pub async fn fetch_games(
    transport: &dyn Transport,
    source: &SourceConfig,
    url: &str,
    filter_name: &str,
) -> Result<Vec<Game>, IngestError> {
    let html = transport.get(url).await?;

    let t0 = Instant::now();
    let games = games_from_page(source, filter_name, &html)?;
    histogram!("schedule_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    counter!("schedule_rows_total").increment(games.len() as u64);
    Ok(games)
}
