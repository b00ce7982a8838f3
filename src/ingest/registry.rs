// src/ingest/registry.rs
//! Fixed mapping from source id to fetch strategy, built once at startup.

use std::collections::HashSet;

use crate::ingest::error::IngestError;
use crate::ingest::types::{FetchStrategy, SourceConfig, SourceId};

const LIWSA_URL: &str = "https://liwsa.com/webapps/spappz_live/schedule_maint";
const VISL_URL: &str = "https://visl.org/webapps/spappz_live/schedule_maint";

#[derive(Debug, Clone)]
pub struct SourceRegistry {
    sources: Vec<SourceConfig>,
}

impl SourceRegistry {
    /// Validates ids (non-empty, lowercase, unique) and strategy parameters.
    /// Declaration order is kept as the listing order.
    pub fn new(sources: Vec<SourceConfig>) -> Result<Self, IngestError> {
        let mut seen = HashSet::new();
        for s in &sources {
            let id = s.id.as_str();
            if id.is_empty() || id.chars().any(|c| c.is_whitespace() || c.is_uppercase()) {
                return Err(IngestError::Config(format!(
                    "source id {id:?} must be a non-empty lowercase slug"
                )));
            }
            if !seen.insert(id.to_string()) {
                return Err(IngestError::Config(format!("duplicate source id {id:?}")));
            }
            if s.strategy.url().trim().is_empty() {
                return Err(IngestError::Config(format!("source {id:?} has no url")));
            }
            if let FetchStrategy::HtmlScrape { filter_name, .. } = &s.strategy {
                // An empty filter would keep every game on the page.
                if filter_name.trim().is_empty() {
                    return Err(IngestError::Config(format!(
                        "source {id:?} needs a filter_name for html-scrape"
                    )));
                }
            }
        }
        Ok(Self { sources })
    }

    pub fn list_sources(&self) -> Vec<SourceId> {
        self.sources.iter().map(|s| s.id.clone()).collect()
    }

    pub fn get(&self, id: &SourceId) -> Result<&SourceConfig, IngestError> {
        self.sources
            .iter()
            .find(|s| &s.id == id)
            .ok_or_else(|| IngestError::UnknownSource(id.to_string()))
    }

    pub fn strategy_for(&self, id: &SourceId) -> Result<&FetchStrategy, IngestError> {
        self.get(id).map(|s| &s.strategy)
    }

    pub fn display_name(&self, id: &SourceId) -> Result<&str, IngestError> {
        self.get(id).map(|s| s.display_name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Built-in registry used when no sources file is configured.
    pub fn default_seed() -> Self {
        let liwsa = |area: &str, division: &str, team: &str| {
            format!(
                "reg_year=2025&flt_area={area}&season=All&division={division}&agegroup=All\
                 &team_refno={team}&stype=All&sname=All&sstat=All&fieldref=All&fdate=All\
                 &tdate=All&dow=All&start_time=All&sortby1=sched_time&sortby2=sched_type\
                 &sortby3=sched_name&sortby4=None&cmd=Excel&appid=liwsa&returnto=&firsttime=0"
            )
        };
        let visl_body = "reg_year=2025&flt_area=cas&season=All&division=2&sched_pool=All\
                         &team_refno=All&stype=All&sname=All&sstat=All&fieldref=All&fdate=All\
                         &tdate=&dow=All&start_time=All&sortby1=sched_time&sortby2=sched_type\
                         &sortby3=sched_name&sortby4=None&cmd=Excel&appid=visl&returnto=&firsttime=0";

        let csv = |id: &str, url: &str, body: String| SourceConfig {
            id: SourceId::new(id),
            display_name: capitalize(id),
            strategy: FetchStrategy::CsvForm {
                url: url.to_string(),
                body,
            },
            team_rewrites: Vec::new(),
        };

        Self {
            sources: vec![
                csv("nad", VISL_URL, visl_body.to_string()),
                csv("mo", LIWSA_URL, liwsa("sffc", "tiereddiv", "38")),
                csv("kat", LIWSA_URL, liwsa("cfc", "o30", "24")),
                csv("tash", LIWSA_URL, liwsa("sffc", "tiereddiv", "57")),
            ],
        }
    }
}

/// `kat` -> `Kat`; used as the default display name.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
