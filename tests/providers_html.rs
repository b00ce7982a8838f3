// tests/providers_html.rs
use socker_schedules::ingest::providers::html_scrape::{fetch_games, parse_page};
use socker_schedules::ingest::transport::FixtureTransport;
use socker_schedules::ingest::types::{FetchStrategy, SourceConfig, SourceId};
use socker_schedules::ingest::IngestError;

const PAGE: &str = include_str!("fixtures/club_schedule.html");
const URL: &str = "https://club.example/schedule";

fn source() -> SourceConfig {
    SourceConfig {
        id: SourceId::new("tash"),
        display_name: "Tash".into(),
        strategy: FetchStrategy::HtmlScrape {
            url: URL.into(),
            filter_name: "Lions".into(),
        },
        team_rewrites: vec![("U10 Girls".into(), "U10G".into())],
    }
}

#[test]
fn fixture_page_yields_one_game_per_filled_column() {
    let games = parse_page(PAGE).expect("page parses");
    let rows: Vec<(&str, &str, &str, &str)> = games
        .iter()
        .map(|g| (g.date.as_str(), g.field.as_str(), g.home.as_str(), g.away.as_str()))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("2024-05-11 9:00AM", "Riverside Field 1", "Lions U10 Girls", "Hawks"),
            ("2024-05-11 9:00AM", "Riverside Field 2", "Owls", "Bears"),
            ("2024-05-11 10:30AM", "Riverside Field 1", "Sea Lionsgate", "Foxes"),
            ("2024-05-18 1:00PM", "Hillcrest", "Wolves", "Lions U10 Girls"),
        ]
    );
}

#[tokio::test]
async fn fetch_filters_by_team_substring_and_tags_the_source() {
    let t = FixtureTransport::new().with_get(URL, PAGE);
    let games = fetch_games(&t, &source(), URL, "Lions").await.expect("fetch ok");

    // "Sea Lionsgate" is not the tracked team but contains the filter text;
    // the substring match keeps it.
    let homes: Vec<&str> = games.iter().map(|g| g.home.as_str()).collect();
    assert_eq!(homes, vec!["Lions U10G", "Sea Lionsgate", "Wolves"]);
    assert!(games.iter().all(|g| g.who == "tash"));
    assert_eq!(games[2].away, "Lions U10G");
}

#[tokio::test]
async fn http_failure_surfaces_as_fetch_error() {
    let t = FixtureTransport::new().with_get_status(URL, 500);
    let err = fetch_games(&t, &source(), URL, "Lions").await.unwrap_err();
    assert!(err.is_fetch());
}

#[test]
fn misaligned_page_is_rejected() {
    let err = parse_page(include_str!("fixtures/club_schedule_misaligned.html")).unwrap_err();
    match err {
        IngestError::FieldNotFound { date, column } => {
            assert_eq!(date, "2024-05-11");
            assert_eq!(column, 1);
        }
        other => panic!("expected FieldNotFound, got {other:?}"),
    }
}
