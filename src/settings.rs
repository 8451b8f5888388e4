use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use crate::scoring::{FormulaPreset, ScoringConfig};

pub const DEFAULT_SOURCE: &str =
    "https://raw.githubusercontent.com/krowteaz/fifarivals/main/players.csv";
const DEFAULT_TTL_SECS: u64 = 60;
const MIN_TTL_SECS: u64 = 5;
const DEFAULT_TOP_N: usize = 100;

/// Runtime configuration read from the environment (and `.env` files, loaded by the binaries).
#[derive(Debug, Clone)]
pub struct Settings {
    pub source: String,
    pub cache_ttl: Duration,
    pub limit: Option<usize>,
    pub preset: FormulaPreset,
    pub config_path: Option<PathBuf>,
    pub export_dir: PathBuf,
    pub log_filter: String,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup. Unparseable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let ttl_secs = get("POWER_CACHE_TTL_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TTL_SECS)
            .max(MIN_TTL_SECS);
        let limit = match get("POWER_TOP_N").and_then(|v| v.parse::<usize>().ok()) {
            Some(0) => None,
            Some(n) => Some(n),
            None => Some(DEFAULT_TOP_N),
        };
        let preset = get("POWER_FORMULA")
            .and_then(|v| FormulaPreset::from_key(&v))
            .unwrap_or_default();

        Self {
            source: get("POWER_CSV_SOURCE").unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            cache_ttl: Duration::from_secs(ttl_secs),
            limit,
            preset,
            config_path: get("POWER_CONFIG").map(PathBuf::from),
            export_dir: get("POWER_EXPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            log_filter: get("POWER_LOG").unwrap_or_else(|| "info".to_string()),
        }
    }

    /// The preset's config, or the JSON file at `config_path` when one is set.
    pub fn scoring_config(&self) -> Result<ScoringConfig> {
        match &self.config_path {
            Some(path) => ScoringConfig::load(path),
            None => Ok(self.preset.config()),
        }
    }
}

/// Load `.env.local` then `.env` from the working directory, ignoring missing files.
pub fn load_dotenv() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(pairs: &[(&str, &str)]) -> Settings {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let s = settings_from(&[]);
        assert_eq!(s.source, DEFAULT_SOURCE);
        assert_eq!(s.cache_ttl, Duration::from_secs(60));
        assert_eq!(s.limit, Some(100));
        assert_eq!(s.preset, FormulaPreset::Excel);
        assert!(s.config_path.is_none());
    }

    #[test]
    fn overrides_and_bounds() {
        let s = settings_from(&[
            ("POWER_CACHE_TTL_SECS", "1"),
            ("POWER_TOP_N", "0"),
            ("POWER_FORMULA", "balanced"),
            ("POWER_CSV_SOURCE", " players.csv "),
        ]);
        assert_eq!(s.cache_ttl, Duration::from_secs(5));
        assert_eq!(s.limit, None);
        assert_eq!(s.preset, FormulaPreset::Balanced);
        assert_eq!(s.source, "players.csv");

        let s = settings_from(&[("POWER_TOP_N", "lots"), ("POWER_FORMULA", "v42")]);
        assert_eq!(s.limit, Some(100));
        assert_eq!(s.preset, FormulaPreset::Excel);
    }
}
