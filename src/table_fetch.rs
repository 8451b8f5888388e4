use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, TimeZone};

use crate::http_cache::fetch_text_cached;
use crate::http_client::http_client;
use crate::schema::{normalize_with_report, NormalizeReport, RawTable};
use crate::state::PlayerRecord;

/// Outcome of one load. A failed load carries no records and the error text.
#[derive(Debug, Clone, Default)]
pub struct TableLoad {
    pub records: Vec<PlayerRecord>,
    pub report: NormalizeReport,
    pub fetched_at: Option<DateTime<Local>>,
    pub from_cache: bool,
    pub error: Option<String>,
}

impl TableLoad {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Fetch and normalize the player table. Never fails: errors become an empty load.
pub fn load_table(source: &str, ttl: Duration) -> TableLoad {
    match fetch_raw_table(source, ttl) {
        Ok((raw, fetched_at, from_cache)) => {
            let (records, report) = normalize_with_report(&raw);
            if !report.synthesized_columns.is_empty() {
                let cols: Vec<&str> = report.synthesized_columns.iter().map(|a| a.column()).collect();
                tracing::warn!(source, columns = ?cols, "attribute columns missing, filled with 0");
            }
            if report.coerced_cells > 0 {
                tracing::debug!(source, cells = report.coerced_cells, "non-numeric cells coerced to 0");
            }
            tracing::info!(source, rows = records.len(), from_cache, "player table loaded");
            TableLoad {
                records,
                report,
                fetched_at,
                from_cache,
                error: None,
            }
        }
        Err(err) => {
            tracing::warn!(source, "player table load failed: {err:#}");
            TableLoad {
                error: Some(format!("{err:#}")),
                ..TableLoad::default()
            }
        }
    }
}

/// Read the raw table from an `http(s)://` URL (through the cache) or a local path.
pub fn fetch_raw_table(
    source: &str,
    ttl: Duration,
) -> Result<(RawTable, Option<DateTime<Local>>, bool)> {
    if is_remote(source) {
        let client = http_client()?;
        let fetched = fetch_text_cached(client, source, ttl)
            .with_context(|| format!("fetch {source}"))?;
        let raw = RawTable::from_csv_str(&fetched.body).context("parse player csv")?;
        let fetched_at = i64::try_from(fetched.fetched_at)
            .ok()
            .and_then(|secs| Local.timestamp_opt(secs, 0).single());
        return Ok((raw, fetched_at, fetched.from_cache));
    }

    let path = Path::new(source);
    let file = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let raw = RawTable::from_csv_reader(file)
        .with_context(|| format!("parse player csv {}", path.display()))?;
    Ok((raw, Some(Local::now()), false))
}

pub fn is_remote(source: &str) -> bool {
    let lower = source.trim().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
