// src/ingest/providers/csv_form.rs
use std::time::Instant;

use metrics::{counter, histogram};

use crate::ingest::error::IngestError;
use crate::ingest::normalize::{normalize, REQUIRED_COLUMNS};
use crate::ingest::transport::Transport;
use crate::ingest::types::{Game, RawRow, SourceConfig};

/// Parse a CSV export (header row first) into rows keyed by header name.
/// Column order is irrelevant; missing required columns are an error.
pub fn parse_rows(text: &str) -> Result<Vec<RawRow>, IngestError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(text.trim_start_matches('\u{feff}').as_bytes());

    let headers = rdr.headers()?.clone();
    if let Some(missing) = REQUIRED_COLUMNS
        .iter()
        .find(|col| !headers.iter().any(|h| h == **col))
    {
        return Err(IngestError::Parse(format!(
            "csv export is missing column {missing:?} (headers: {:?})",
            headers.iter().collect::<Vec<_>>()
        )));
    }

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        // Exports end with a blank line now and then.
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), v.to_string()))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

/// Parse and normalize a CSV export for `source`.
pub fn games_from_csv(source: &SourceConfig, text: &str) -> Result<Vec<Game>, IngestError> {
    parse_rows(text)?
        .iter()
        .map(|row| normalize(source, row))
        .collect()
}

/// POST the export form and return the raw rows.
pub async fn fetch_rows(
    transport: &dyn Transport,
    url: &str,
    body: &str,
) -> Result<Vec<RawRow>, IngestError> {
    let text = transport.post_form(url, body).await?;

    let t0 = Instant::now();
    let rows = parse_rows(&text)?;
    histogram!("schedule_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    counter!("schedule_rows_total").increment(rows.len() as u64);
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::transport::FixtureTransport;

    #[test]
    fn header_order_does_not_matter_and_extras_are_kept() {
        let text = "visit_team,home_team,Time,Date,division_name,field_name\n\
                    Team B,Team A,7:00  PM,9/23/2022,o30,Field 3\n";
        let rows = parse_rows(text).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["home_team"], "Team A");
        assert_eq!(rows[0]["Time"], "7:00  PM");
        assert_eq!(rows[0]["division_name"], "o30");
    }

    #[test]
    fn quoted_cells_and_blank_lines() {
        let text = "Date,Time,field_name,home_team,visit_team\r\n\
                    9/23/2022,7:00 PM,\"Park, North\",\"The \"\"A\"\" Team\",Team B\r\n\
                    ,,,,\r\n";
        let rows = parse_rows(text).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["field_name"], "Park, North");
        assert_eq!(rows[0]["home_team"], "The \"A\" Team");
    }

    #[test]
    fn missing_required_column_is_parse_error() {
        let err = parse_rows("Date,Time,home_team,visit_team\n9/23/2022,7:00 PM,A,B\n").unwrap_err();
        assert!(matches!(err, IngestError::Parse(msg) if msg.contains("field_name")));
    }

    #[test]
    fn ragged_rows_are_parse_errors() {
        let text = "Date,Time,field_name,home_team,visit_team\n9/23/2022,7:00 PM,F\n";
        assert!(matches!(parse_rows(text), Err(IngestError::Parse(_))));
    }

    #[test]
    fn header_only_export_has_no_rows() {
        let rows = parse_rows("Date,Time,field_name,home_team,visit_team\n").unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn fetch_posts_the_configured_body() {
        let t = FixtureTransport::new().with_post(
            "http://league/export",
            "team_refno=24&cmd=Excel",
            "Date,Time,field_name,home_team,visit_team\n9/23/2022,7:00 PM,F,A,B\n",
        );
        let rows = fetch_rows(&t, "http://league/export", "team_refno=24&cmd=Excel")
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        let err = fetch_rows(&t, "http://league/export", "team_refno=25&cmd=Excel")
            .await
            .unwrap_err();
        assert!(err.is_fetch());
    }
}
