// src/ingest/providers/mod.rs
pub mod csv_form;
pub mod html_scrape;
