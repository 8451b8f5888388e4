use std::io;
use std::path::PathBuf;

use anyhow::{Result, anyhow};

use power_terminal::export::{export_csv, write_csv};
use power_terminal::rankings::{RankFilters, RankScope, rank};
use power_terminal::scoring::{FormulaPreset, ScoringConfig};
use power_terminal::settings::{Settings, load_dotenv};
use power_terminal::table_fetch::load_table;
use power_terminal::telemetry;

fn main() -> Result<()> {
    load_dotenv();
    let settings = Settings::from_env();
    if let Err(err) = telemetry::init_stderr(&settings.log_filter) {
        eprintln!("[WARN] logging disabled: {err:#}");
    }

    let source = parse_string_arg("--source").unwrap_or_else(|| settings.source.clone());
    let config = resolve_config(&settings)?;

    let mut filters = RankFilters::default();
    filters.positions = parse_list_arg("--pos").into_iter().collect();
    filters.rarities = parse_list_arg("--rarity").into_iter().collect();
    filters.scope = match parse_string_arg("--scope").as_deref() {
        None | Some("population") => RankScope::Population,
        Some("filtered") => RankScope::Filtered,
        Some(other) => return Err(anyhow!("unknown --scope {other}; use population or filtered")),
    };
    let limit = match parse_usize_arg("--top") {
        Some(0) => None,
        Some(n) => Some(n),
        None => settings.limit,
    };

    let load = load_table(&source, settings.cache_ttl);
    if let Some(err) = &load.error {
        return Err(anyhow!("failed to load player table: {err}"));
    }
    let table = rank(&load.records, &config, &filters, limit);
    tracing::info!(
        formula = %config.name,
        population = table.population,
        rows = table.len(),
        "ranking computed"
    );

    match parse_string_arg("--out") {
        Some(out) => {
            let report = export_csv(&PathBuf::from(out), &table)?;
            eprintln!("[INFO] wrote {} rows to {}", report.rows, report.path.display());
        }
        None => write_csv(&table, io::stdout().lock())?,
    }
    Ok(())
}

fn resolve_config(settings: &Settings) -> Result<ScoringConfig> {
    if let Some(path) = parse_string_arg("--config") {
        return ScoringConfig::load(&PathBuf::from(path));
    }
    if let Some(key) = parse_string_arg("--formula") {
        let preset = FormulaPreset::from_key(&key).ok_or_else(|| {
            let known: Vec<&str> = FormulaPreset::ALL.iter().map(|p| p.key()).collect();
            anyhow!("unknown --formula {key}; expected one of {}", known.join(", "))
        })?;
        return Ok(preset.config());
    }
    settings.scoring_config()
}

fn parse_string_arg(name: &str) -> Option<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&format!("{name}="))
            && !raw.trim().is_empty()
        {
            return Some(raw.trim().to_string());
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

fn parse_usize_arg(name: &str) -> Option<usize> {
    parse_string_arg(name).and_then(|raw| raw.parse::<usize>().ok())
}

fn parse_list_arg(name: &str) -> Vec<String> {
    let Some(raw) = parse_string_arg(name) else {
        return Vec::new();
    };
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}
