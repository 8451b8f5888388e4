use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::state::{Attribute, PlayerRecord, Role};

/// Reference value of the baseline-relative bonus shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BaseValue {
    /// The player's own `PWR`.
    Pwr,
    Fixed { value: f64 },
    /// Unweighted mean of the attributes named in the role's weight map.
    RoleMean,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum FormulaShape {
    /// `Σ w_i * a_i`
    #[default]
    WeightedSum,
    /// `b + Σ w_i * (a_i - b)`
    BaselineBonus { base: BaseValue },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleFormula {
    #[serde(default)]
    pub shape: FormulaShape,
    pub weights: BTreeMap<Attribute, f64>,
    #[serde(default)]
    pub baseline_offset: f64,
    #[serde(default = "unit_scale")]
    pub scale_factor: f64,
}

fn unit_scale() -> f64 {
    1.0
}

impl RoleFormula {
    pub fn weighted_sum(weights: &[(Attribute, f64)]) -> Self {
        Self {
            shape: FormulaShape::WeightedSum,
            weights: weights.iter().copied().collect(),
            baseline_offset: 0.0,
            scale_factor: 1.0,
        }
    }

    pub fn baseline_bonus(base: BaseValue, weights: &[(Attribute, f64)]) -> Self {
        Self {
            shape: FormulaShape::BaselineBonus { base },
            ..Self::weighted_sum(weights)
        }
    }

    pub fn weight(&self, attr: Attribute) -> f64 {
        self.weights.get(&attr).copied().unwrap_or(0.0)
    }

    pub fn weight_total(&self) -> f64 {
        self.weights.values().sum()
    }
}

/// Formula parameterization for one ranking pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub name: String,
    pub goalkeeper: RoleFormula,
    pub outfield: RoleFormula,
}

impl ScoringConfig {
    pub fn formula(&self, role: Role) -> &RoleFormula {
        match role {
            Role::Goalkeeper => &self.goalkeeper,
            Role::Outfield => &self.outfield,
        }
    }

    pub fn formula_mut(&mut self, role: Role) -> &mut RoleFormula {
        match role {
            Role::Goalkeeper => &mut self.goalkeeper,
            Role::Outfield => &mut self.outfield,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (role, formula) in [
            (Role::Goalkeeper, &self.goalkeeper),
            (Role::Outfield, &self.outfield),
        ] {
            for (attr, weight) in &formula.weights {
                if !weight.is_finite() || *weight < 0.0 {
                    return Err(anyhow!(
                        "{role:?} weight for {} must be a finite value >= 0, got {weight}",
                        attr.column()
                    ));
                }
            }
            if !formula.baseline_offset.is_finite() {
                return Err(anyhow!("{role:?} baseline_offset must be finite"));
            }
            if !formula.scale_factor.is_finite() {
                return Err(anyhow!("{role:?} scale_factor must be finite"));
            }
            if let FormulaShape::BaselineBonus {
                base: BaseValue::Fixed { value },
            } = formula.shape
            {
                if !value.is_finite() {
                    return Err(anyhow!("{role:?} fixed base must be finite"));
                }
            }
        }
        Ok(())
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: ScoringConfig = serde_json::from_str(raw).context("parse scoring config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read scoring config {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("load scoring config {}", path.display()))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serialize scoring config")
    }
}

/// Built-in calibrations. Each is plain data fed to the same engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormulaPreset {
    #[default]
    Excel,
    Balanced,
    PwrBonus,
}

impl FormulaPreset {
    pub const ALL: [FormulaPreset; 3] = [
        FormulaPreset::Excel,
        FormulaPreset::Balanced,
        FormulaPreset::PwrBonus,
    ];

    pub fn key(self) -> &'static str {
        match self {
            FormulaPreset::Excel => "excel",
            FormulaPreset::Balanced => "balanced",
            FormulaPreset::PwrBonus => "pwr-bonus",
        }
    }

    pub fn from_key(raw: &str) -> Option<Self> {
        let key = raw.trim().to_ascii_lowercase().replace('_', "-");
        FormulaPreset::ALL.into_iter().find(|p| p.key() == key)
    }

    pub fn next(self) -> Self {
        match self {
            FormulaPreset::Excel => FormulaPreset::Balanced,
            FormulaPreset::Balanced => FormulaPreset::PwrBonus,
            FormulaPreset::PwrBonus => FormulaPreset::Excel,
        }
    }

    pub fn config(self) -> ScoringConfig {
        use Attribute::*;

        let (goalkeeper, outfield) = match self {
            // Matches the spreadsheet the table was first ranked with.
            FormulaPreset::Excel => (
                RoleFormula::weighted_sum(&[
                    (Goalkeeping, 0.55),
                    (Explosiveness, 0.15),
                    (Defend, 0.10),
                    (Pass, 0.08),
                    (Speed, 0.07),
                    (Pwr, 0.05),
                ]),
                RoleFormula::weighted_sum(&[
                    (Explosiveness, 0.30),
                    (Shoot, 0.22),
                    (Speed, 0.18),
                    (Dribble, 0.15),
                    (Pass, 0.08),
                    (Defend, 0.04),
                    (Pwr, 0.03),
                ]),
            ),
            FormulaPreset::Balanced => (
                RoleFormula::weighted_sum(&[
                    (Goalkeeping, 0.50),
                    (Pwr, 0.15),
                    (Explosiveness, 0.10),
                    (Defend, 0.10),
                    (Speed, 0.10),
                    (Pass, 0.05),
                ]),
                RoleFormula::weighted_sum(&[
                    (Pwr, 0.25),
                    (Speed, 0.15),
                    (Shoot, 0.20),
                    (Dribble, 0.15),
                    (Pass, 0.10),
                    (Defend, 0.05),
                    (Explosiveness, 0.10),
                ]),
            ),
            FormulaPreset::PwrBonus => (
                RoleFormula::baseline_bonus(
                    BaseValue::Pwr,
                    &[
                        (Goalkeeping, 0.45),
                        (Explosiveness, 0.10),
                        (Defend, 0.06),
                        (Pass, 0.04),
                    ],
                ),
                RoleFormula::baseline_bonus(
                    BaseValue::Pwr,
                    &[
                        (Explosiveness, 0.22),
                        (Shoot, 0.18),
                        (Speed, 0.15),
                        (Dribble, 0.12),
                        (Pass, 0.06),
                        (Defend, 0.04),
                    ],
                ),
            ),
        };

        ScoringConfig {
            name: self.key().to_string(),
            goalkeeper,
            outfield,
        }
    }
}

/// Power ranking for one record, rounded to 2 decimals (half away from zero).
pub fn score(record: &PlayerRecord, config: &ScoringConfig) -> f64 {
    round2(raw_score(record, config.formula(record.role())))
}

/// Unrounded score under one role formula, post-processing included.
pub fn raw_score(record: &PlayerRecord, formula: &RoleFormula) -> f64 {
    let raw = match formula.shape {
        FormulaShape::WeightedSum => formula
            .weights
            .iter()
            .map(|(attr, w)| w * record.attr(*attr))
            .sum::<f64>(),
        FormulaShape::BaselineBonus { base } => {
            let b = base_value(record, formula, base);
            let bonus = formula
                .weights
                .iter()
                .map(|(attr, w)| (record.attr(*attr) - b) * w)
                .sum::<f64>();
            b + bonus
        }
    };
    post_process(raw, formula)
}

fn post_process(raw: f64, formula: &RoleFormula) -> f64 {
    (raw - formula.baseline_offset) * formula.scale_factor
}

fn base_value(record: &PlayerRecord, formula: &RoleFormula, base: BaseValue) -> f64 {
    match base {
        BaseValue::Pwr => record.attr(Attribute::Pwr),
        BaseValue::Fixed { value } => value,
        BaseValue::RoleMean => {
            if formula.weights.is_empty() {
                return 0.0;
            }
            let sum: f64 = formula.weights.keys().map(|a| record.attr(*a)).sum();
            sum / formula.weights.len() as f64
        }
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    pub attribute: Attribute,
    pub value: f64,
    pub weight: f64,
    /// `w * a` for a weighted sum, `w * (a - b)` for a bonus.
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Explanation {
    pub role: Role,
    pub base: Option<f64>,
    pub contributions: Vec<Contribution>,
    pub raw: f64,
    pub score: f64,
}

/// Break a score into per-attribute parts, largest contribution first.
pub fn explain(record: &PlayerRecord, config: &ScoringConfig) -> Explanation {
    let role = record.role();
    let formula = config.formula(role);
    let base = match formula.shape {
        FormulaShape::WeightedSum => None,
        FormulaShape::BaselineBonus { base } => Some(base_value(record, formula, base)),
    };
    let mut contributions: Vec<Contribution> = formula
        .weights
        .iter()
        .map(|(attr, w)| {
            let value = record.attr(*attr);
            Contribution {
                attribute: *attr,
                value,
                weight: *w,
                amount: w * (value - base.unwrap_or(0.0)),
            }
        })
        .collect();
    // Summed in weight order so the total matches `raw_score` bit for bit.
    let raw = base.unwrap_or(0.0) + contributions.iter().map(|c| c.amount).sum::<f64>();
    contributions.sort_by(|a, b| b.amount.total_cmp(&a.amount));

    Explanation {
        role,
        base,
        contributions,
        raw,
        score: round2(post_process(raw, formula)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Attributes;

    fn keeper(goalkeeping: f64, pwr: f64) -> PlayerRecord {
        PlayerRecord {
            name: "Keeper".to_string(),
            pos: "GK".to_string(),
            attributes: Attributes {
                goalkeeping,
                pwr,
                ..Attributes::default()
            },
            ..PlayerRecord::default()
        }
    }

    #[test]
    fn post_process_applies_offset_then_scale() {
        let mut config = FormulaPreset::Excel.config();
        config.goalkeeper = RoleFormula::weighted_sum(&[(Attribute::Goalkeeping, 1.0)]);
        config.goalkeeper.baseline_offset = 50.0;
        config.goalkeeper.scale_factor = 2.0;
        assert_eq!(score(&keeper(80.0, 0.0), &config), 60.0);
    }

    #[test]
    fn role_mean_base_uses_weighted_attribute_set() {
        let mut config = FormulaPreset::Excel.config();
        config.goalkeeper = RoleFormula::baseline_bonus(
            BaseValue::RoleMean,
            &[(Attribute::Goalkeeping, 0.5), (Attribute::Pwr, 0.0)],
        );
        // base = (90 + 70) / 2 = 80, bonus = (90 - 80) * 0.5 = 5
        assert_eq!(score(&keeper(90.0, 70.0), &config), 85.0);
    }

    #[test]
    fn explanation_matches_score() {
        let config = FormulaPreset::PwrBonus.config();
        let record = keeper(95.0, 88.0);
        let explained = explain(&record, &config);
        assert_eq!(explained.base, Some(88.0));
        assert_eq!(explained.score, score(&record, &config));
        assert_eq!(explained.contributions[0].attribute, Attribute::Goalkeeping);
    }

    #[test]
    fn preset_keys_round_trip() {
        for preset in FormulaPreset::ALL {
            assert_eq!(FormulaPreset::from_key(preset.key()), Some(preset));
        }
        assert_eq!(FormulaPreset::from_key("PWR_BONUS"), Some(FormulaPreset::PwrBonus));
        assert_eq!(FormulaPreset::from_key("v9"), None);
    }
}
