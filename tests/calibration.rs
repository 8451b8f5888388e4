use std::fs;
use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use power_terminal::calibration::{
    CalibrationTarget, DEFAULT_RIDGE, fit_scoring_config, load_targets, match_targets,
};
use power_terminal::schema::{RawTable, normalize};
use power_terminal::scoring::{FormulaPreset, raw_score};
use power_terminal::state::{Attribute, Attributes, PlayerRecord, Role};

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

fn synthetic_players(n: usize, pos: &str, rng: &mut StdRng) -> Vec<PlayerRecord> {
    (0..n)
        .map(|i| {
            let mut attributes = Attributes::default();
            for attr in Attribute::ALL {
                attributes.set(attr, rng.gen_range(40..=100) as f64);
            }
            PlayerRecord {
                name: format!("{pos} Player {i}"),
                pos: pos.to_string(),
                attributes,
                ..PlayerRecord::default()
            }
        })
        .collect()
}

#[test]
fn fit_recovers_known_weights() {
    let truth = FormulaPreset::Excel.config();
    let mut rng = StdRng::seed_from_u64(42);
    let mut records = synthetic_players(40, "ST", &mut rng);
    records.extend(synthetic_players(25, "GK", &mut rng));

    let targets: Vec<CalibrationTarget> = records
        .iter()
        .map(|r| CalibrationTarget {
            name: r.name.to_uppercase(),
            score: raw_score(r, truth.formula(r.role())),
        })
        .collect();

    // Start from a different preset so nothing is carried over by accident.
    let base = FormulaPreset::Balanced.config();
    let report = fit_scoring_config(&records, &targets, &base, DEFAULT_RIDGE).expect("fit succeeds");
    assert!(report.unmatched.is_empty());
    assert_eq!(report.fits.len(), 2);

    for fit in &report.fits {
        assert!(fit.metrics.rmse < 0.05, "{:?} rmse {}", fit.role, fit.metrics.rmse);
        let expected = truth.formula(fit.role);
        for (attr, weight) in &fit.weights {
            assert!(*weight >= 0.0);
            assert!(
                (weight - expected.weight(*attr)).abs() < 2e-3,
                "{:?} {attr:?}: fitted {weight}, expected {}",
                fit.role,
                expected.weight(*attr)
            );
        }
    }

    let outfield = report.config.formula(Role::Outfield);
    assert!(outfield.baseline_offset.abs() < 0.2);
    assert_eq!(outfield.scale_factor, 1.0);
    assert!(report.config.validate().is_ok());
}

#[test]
fn role_without_enough_targets_keeps_base() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut records = synthetic_players(12, "CM", &mut rng);
    records.extend(synthetic_players(1, "GK", &mut rng));
    let truth = FormulaPreset::Excel.config();
    let targets: Vec<CalibrationTarget> = records
        .iter()
        .map(|r| CalibrationTarget {
            name: r.name.clone(),
            score: raw_score(r, truth.formula(r.role())),
        })
        .collect();

    let base = FormulaPreset::Balanced.config();
    let report = fit_scoring_config(&records, &targets, &base, DEFAULT_RIDGE).expect("fit succeeds");
    assert_eq!(report.fits.len(), 1);
    assert_eq!(report.fits[0].role, Role::Outfield);
    assert_eq!(report.config.goalkeeper, base.goalkeeper);
}

#[test]
fn no_matching_names_is_an_error() {
    let mut rng = StdRng::seed_from_u64(1);
    let records = synthetic_players(5, "ST", &mut rng);
    let targets = vec![CalibrationTarget {
        name: "Somebody Else".to_string(),
        score: 90.0,
    }];
    let base = FormulaPreset::Excel.config();
    assert!(fit_scoring_config(&records, &targets, &base, DEFAULT_RIDGE).is_err());
    assert!(fit_scoring_config(&[], &targets, &base, DEFAULT_RIDGE).is_err());
}

#[test]
fn fixture_targets_match_by_normalized_name() {
    let raw = fs::read_to_string(fixture_path("players.csv")).expect("fixture file should be readable");
    let records = normalize(&RawTable::from_csv_str(&raw).expect("parse"));
    let targets = load_targets(&fixture_path("calibration_targets.json")).expect("targets load");
    assert_eq!(targets.len(), 3);

    let (matched, unmatched) = match_targets(&records, &targets);
    let names: Vec<&str> = matched.iter().map(|(r, _)| r.name.as_str()).collect();
    assert_eq!(names, vec!["Kylian Mbappe", "Thibaut Courtois"]);
    assert_eq!(unmatched, vec!["Nobody In Particular".to_string()]);
}
