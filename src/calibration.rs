//! Offline weight fitting against hand-labeled target scores.
//!
//! Targets name known players and the score they should receive. Matched players
//! are grouped by role and a non-negative linear fit produces a new `ScoringConfig`.
//! Nothing here runs inside the ranking pass.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::scoring::{RoleFormula, ScoringConfig};
use crate::state::{Attribute, PlayerRecord, Role};

pub const DEFAULT_RIDGE: f64 = 1e-6;
const MIN_ROLE_SAMPLES: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationTarget {
    pub name: String,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub samples: usize,
    pub rmse: f64,
    pub mae: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoleFit {
    pub role: Role,
    pub weights: BTreeMap<Attribute, f64>,
    pub intercept: f64,
    pub metrics: Metrics,
}

#[derive(Debug, Clone)]
pub struct FitReport {
    pub config: ScoringConfig,
    pub fits: Vec<RoleFit>,
    pub unmatched: Vec<String>,
}

pub fn load_targets(path: &Path) -> Result<Vec<CalibrationTarget>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read calibration targets {}", path.display()))?;
    let targets: Vec<CalibrationTarget> =
        serde_json::from_str(&raw).context("parse calibration targets")?;
    if let Some(bad) = targets.iter().find(|t| !t.score.is_finite()) {
        return Err(anyhow!("target score for {} is not finite", bad.name));
    }
    Ok(targets)
}

/// Lowercased, whitespace-collapsed name used to match targets to rows.
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace()
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Pair each target with the first record of the same normalized name.
pub fn match_targets<'a>(
    records: &'a [PlayerRecord],
    targets: &[CalibrationTarget],
) -> (Vec<(&'a PlayerRecord, f64)>, Vec<String>) {
    let mut by_name: HashMap<String, &PlayerRecord> = HashMap::with_capacity(records.len());
    for record in records {
        by_name.entry(normalize_name(&record.name)).or_insert(record);
    }

    let mut matched = Vec::new();
    let mut unmatched = Vec::new();
    for target in targets {
        match by_name.get(&normalize_name(&target.name)) {
            Some(record) => matched.push((*record, target.score)),
            None => unmatched.push(target.name.clone()),
        }
    }
    (matched, unmatched)
}

/// Fit one weight set per role. Roles with too few matched targets keep `base`.
pub fn fit_scoring_config(
    records: &[PlayerRecord],
    targets: &[CalibrationTarget],
    base: &ScoringConfig,
    ridge: f64,
) -> Result<FitReport> {
    let (matched, unmatched) = match_targets(records, targets);
    if matched.is_empty() {
        return Err(anyhow!(
            "none of the {} calibration targets matched a player name",
            targets.len()
        ));
    }

    let mut config = base.clone();
    config.name = format!("fitted ({})", base.name);
    let mut fits = Vec::new();

    for role in [Role::Goalkeeper, Role::Outfield] {
        let samples: Vec<(&PlayerRecord, f64)> = matched
            .iter()
            .filter(|(record, _)| record.role() == role)
            .copied()
            .collect();
        if samples.len() < MIN_ROLE_SAMPLES {
            tracing::info!(?role, samples = samples.len(), "too few targets, keeping base weights");
            continue;
        }

        let attrs: Vec<Attribute> = base.formula(role).weights.keys().copied().collect();
        let fit = fit_role(role, &samples, &attrs, ridge)
            .ok_or_else(|| anyhow!("{role:?} fit is singular; add targets or raise the ridge"))?;
        tracing::info!(
            ?role,
            samples = fit.metrics.samples,
            rmse = fit.metrics.rmse,
            mae = fit.metrics.mae,
            "role weights fitted"
        );

        let mut formula = RoleFormula::weighted_sum(&[]);
        formula.weights = fit.weights.clone();
        formula.baseline_offset = round4(-fit.intercept);
        *config.formula_mut(role) = formula;
        fits.push(fit);
    }

    Ok(FitReport {
        config,
        fits,
        unmatched,
    })
}

/// Ridge least squares with an intercept, refit without the most negative weight
/// until every weight is >= 0.
pub fn fit_role(
    role: Role,
    samples: &[(&PlayerRecord, f64)],
    attrs: &[Attribute],
    ridge: f64,
) -> Option<RoleFit> {
    if samples.is_empty() {
        return None;
    }
    let mut active: Vec<Attribute> = attrs.to_vec();
    let (intercept, coefs) = loop {
        let solution = least_squares(samples, &active, ridge)?;
        let (intercept, coefs) = solution.split_first()?;
        let most_negative = coefs
            .iter()
            .enumerate()
            .filter(|(_, w)| **w < 0.0)
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        match most_negative {
            Some(i) => {
                active.remove(i);
            }
            None => break (*intercept, coefs.to_vec()),
        }
    };

    let mut weights: BTreeMap<Attribute, f64> = attrs.iter().map(|a| (*a, 0.0)).collect();
    for (attr, w) in active.iter().zip(&coefs) {
        weights.insert(*attr, round4(*w));
    }
    let intercept = round4(intercept);
    let metrics = evaluate(samples, &weights, intercept);

    Some(RoleFit {
        role,
        weights,
        intercept,
        metrics,
    })
}

fn least_squares(samples: &[(&PlayerRecord, f64)], attrs: &[Attribute], ridge: f64) -> Option<Vec<f64>> {
    let n = attrs.len() + 1;
    let mut ata = vec![vec![0.0_f64; n]; n];
    let mut aty = vec![0.0_f64; n];

    for (record, target) in samples {
        let mut x = Vec::with_capacity(n);
        x.push(1.0);
        x.extend(attrs.iter().map(|a| record.attr(*a)));
        for i in 0..n {
            aty[i] += x[i] * target;
            for j in 0..n {
                ata[i][j] += x[i] * x[j];
            }
        }
    }
    // Intercept is not penalized.
    for (i, row) in ata.iter_mut().enumerate().skip(1) {
        row[i] += ridge;
    }
    solve_linear(ata, aty)
}

/// Gaussian elimination with partial pivoting.
fn solve_linear(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|i, j| a[*i][col].abs().total_cmp(&a[*j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                let v = a[col][k];
                a[row][k] -= factor * v;
            }
            let v = b[col];
            b[row] -= factor * v;
        }
    }

    let mut x = vec![0.0_f64; n];
    for row in (0..n).rev() {
        let mut s = b[row];
        for k in row + 1..n {
            s -= a[row][k] * x[k];
        }
        x[row] = s / a[row][row];
    }
    Some(x)
}

fn evaluate(samples: &[(&PlayerRecord, f64)], weights: &BTreeMap<Attribute, f64>, intercept: f64) -> Metrics {
    let mut sq = 0.0;
    let mut abs = 0.0;
    for (record, target) in samples {
        let pred = intercept + weights.iter().map(|(a, w)| w * record.attr(*a)).sum::<f64>();
        let err = pred - target;
        sq += err * err;
        abs += err.abs();
    }
    let n = samples.len().max(1) as f64;
    Metrics {
        samples: samples.len(),
        rmse: (sq / n).sqrt(),
        mae: abs / n,
    }
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}
