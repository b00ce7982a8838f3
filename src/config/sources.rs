// src/config/sources.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::registry::{capitalize, SourceRegistry};
use crate::ingest::types::{FetchStrategy, SourceConfig, SourceId};

pub const ENV_SOURCES_PATH: &str = "SCHEDULE_SOURCES_PATH";

#[derive(Debug, Deserialize)]
struct SourcesFile {
    sources: Vec<SourceEntry>,
}

#[derive(Debug, Deserialize)]
struct SourceEntry {
    id: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(flatten)]
    strategy: StrategyEntry,
    /// `[from, to]` pairs applied to team names.
    #[serde(default)]
    team_rewrites: Vec<(String, String)>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
enum StrategyEntry {
    CsvForm { url: String, body: String },
    HtmlScrape { url: String, filter_name: String },
}

impl From<SourceEntry> for SourceConfig {
    fn from(e: SourceEntry) -> Self {
        let id = e.id.trim().to_string();
        let display_name = e
            .display_name
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| capitalize(&id));
        let strategy = match e.strategy {
            StrategyEntry::CsvForm { url, body } => FetchStrategy::CsvForm {
                url: url.trim().to_string(),
                body: body.trim().to_string(),
            },
            StrategyEntry::HtmlScrape { url, filter_name } => FetchStrategy::HtmlScrape {
                url: url.trim().to_string(),
                filter_name: filter_name.trim().to_string(),
            },
        };
        SourceConfig {
            id: SourceId::new(id),
            display_name,
            strategy,
            team_rewrites: e.team_rewrites,
        }
    }
}

/// Load the registry from an explicit path. Supports TOML or JSON formats.
pub fn load_sources_from(path: &Path) -> Result<SourceRegistry> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sources from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_sources(&content, ext.as_str())
        .with_context(|| format!("parsing sources from {}", path.display()))
}

/// Load the registry using env var + fallbacks:
/// 1) $SCHEDULE_SOURCES_PATH
/// 2) config/sources.toml
/// 3) config/sources.json
/// 4) built-in seed
pub fn load_sources_default() -> Result<SourceRegistry> {
    if let Ok(p) = std::env::var(ENV_SOURCES_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_sources_from(&pb);
        }
        return Err(anyhow!("{ENV_SOURCES_PATH} points to non-existent path"));
    }
    let toml_p = PathBuf::from("config/sources.toml");
    if toml_p.exists() {
        return load_sources_from(&toml_p);
    }
    let json_p = PathBuf::from("config/sources.json");
    if json_p.exists() {
        return load_sources_from(&json_p);
    }
    tracing::info!("no sources file found, using built-in sources");
    Ok(SourceRegistry::default_seed())
}

fn parse_sources(s: &str, hint_ext: &str) -> Result<SourceRegistry> {
    let file: SourcesFile = if hint_ext == "json" || s.trim_start().starts_with('{') {
        serde_json::from_str(s).context("sources json")?
    } else {
        toml::from_str(s).context("sources toml")?
    };
    let sources = file.sources.into_iter().map(SourceConfig::from).collect();
    Ok(SourceRegistry::new(sources)?)
}
