use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use power_terminal::calibration::{DEFAULT_RIDGE, Metrics, fit_scoring_config, load_targets};
use power_terminal::scoring::FormulaPreset;
use power_terminal::settings::{Settings, load_dotenv};
use power_terminal::state::role_label;
use power_terminal::table_fetch::load_table;
use power_terminal::telemetry;

fn main() -> Result<()> {
    load_dotenv();
    let settings = Settings::from_env();
    if let Err(err) = telemetry::init_stderr(&settings.log_filter) {
        eprintln!("[WARN] logging disabled: {err:#}");
    }

    let targets_path = parse_string_arg("--targets")
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("usage: fit_weights --targets <targets.json> [--source <csv>] [--base <preset>] [--ridge <f64>] [--out <config.json>]"))?;
    let source = parse_string_arg("--source").unwrap_or_else(|| settings.source.clone());
    let base = match parse_string_arg("--base") {
        Some(key) => FormulaPreset::from_key(&key)
            .ok_or_else(|| anyhow!("unknown --base preset {key}"))?
            .config(),
        None => settings.scoring_config()?,
    };
    let ridge = parse_f64_arg("--ridge")
        .filter(|r| r.is_finite() && *r >= 0.0)
        .unwrap_or(DEFAULT_RIDGE);

    let targets = load_targets(&targets_path)?;
    let load = load_table(&source, settings.cache_ttl);
    if let Some(err) = &load.error {
        return Err(anyhow!("failed to load player table: {err}"));
    }

    let report = fit_scoring_config(&load.records, &targets, &base, ridge)?;
    for fit in &report.fits {
        print_metrics(role_label(fit.role), fit.metrics);
        eprintln!("  intercept: {:.4}", fit.intercept);
        for (attr, weight) in &fit.weights {
            eprintln!("  {:<13} {weight:.4}", attr.column());
        }
    }
    if !report.unmatched.is_empty() {
        eprintln!(
            "[WARN] {} targets had no matching player: {}",
            report.unmatched.len(),
            report.unmatched.join(", ")
        );
    }

    let json = report.config.to_json_pretty()?;
    match parse_string_arg("--out") {
        Some(out) => {
            let path = PathBuf::from(out);
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
            fs::write(&path, json).with_context(|| format!("write {}", path.display()))?;
            eprintln!("[INFO] wrote fitted config to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn print_metrics(label: &str, metrics: Metrics) {
    eprintln!("{label}:");
    eprintln!("  samples: {}", metrics.samples);
    eprintln!("  rmse: {:.4}", metrics.rmse);
    eprintln!("  mae: {:.4}", metrics.mae);
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

fn parse_f64_arg(name: &str) -> Option<f64> {
    parse_string_arg(name).and_then(|raw| raw.parse::<f64>().ok())
}
