use std::collections::{BTreeSet, VecDeque};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::rankings::{rank, RankFilters, RankScope, RankedRow, RankedTable};
use crate::scoring::{FormulaPreset, ScoringConfig};

/// Position tag that selects the goalkeeper formula. Every other tag is outfield.
pub const GOALKEEPER_TAG: &str = "GK";

pub const DESCRIPTIVE_COLUMNS: [&str; 5] = ["Name", "Pos", "Nationality", "Rarity", "Season"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Attribute {
    #[serde(rename = "PWR")]
    Pwr,
    Speed,
    Shoot,
    Dribble,
    Pass,
    Defend,
    Explosiveness,
    Goalkeeping,
}

impl Attribute {
    pub const ALL: [Attribute; 8] = [
        Attribute::Pwr,
        Attribute::Speed,
        Attribute::Shoot,
        Attribute::Dribble,
        Attribute::Pass,
        Attribute::Defend,
        Attribute::Explosiveness,
        Attribute::Goalkeeping,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Attribute::Pwr => "PWR",
            Attribute::Speed => "Speed",
            Attribute::Shoot => "Shoot",
            Attribute::Dribble => "Dribble",
            Attribute::Pass => "Pass",
            Attribute::Defend => "Defend",
            Attribute::Explosiveness => "Explosiveness",
            Attribute::Goalkeeping => "Goalkeeping",
        }
    }

    /// Short label for narrow table headers.
    pub fn short_label(self) -> &'static str {
        match self {
            Attribute::Pwr => "PWR",
            Attribute::Speed => "SPD",
            Attribute::Shoot => "SHO",
            Attribute::Dribble => "DRI",
            Attribute::Pass => "PAS",
            Attribute::Defend => "DEF",
            Attribute::Explosiveness => "EXP",
            Attribute::Goalkeeping => "GK",
        }
    }
}

/// Normalized attribute vector. Every value is finite and >= 0.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Attributes {
    pub pwr: f64,
    pub speed: f64,
    pub shoot: f64,
    pub dribble: f64,
    pub pass: f64,
    pub defend: f64,
    pub explosiveness: f64,
    pub goalkeeping: f64,
}

impl Attributes {
    pub fn get(&self, attr: Attribute) -> f64 {
        match attr {
            Attribute::Pwr => self.pwr,
            Attribute::Speed => self.speed,
            Attribute::Shoot => self.shoot,
            Attribute::Dribble => self.dribble,
            Attribute::Pass => self.pass,
            Attribute::Defend => self.defend,
            Attribute::Explosiveness => self.explosiveness,
            Attribute::Goalkeeping => self.goalkeeping,
        }
    }

    pub fn set(&mut self, attr: Attribute, value: f64) {
        let slot = match attr {
            Attribute::Pwr => &mut self.pwr,
            Attribute::Speed => &mut self.speed,
            Attribute::Shoot => &mut self.shoot,
            Attribute::Dribble => &mut self.dribble,
            Attribute::Pass => &mut self.pass,
            Attribute::Defend => &mut self.defend,
            Attribute::Explosiveness => &mut self.explosiveness,
            Attribute::Goalkeeping => &mut self.goalkeeping,
        };
        *slot = value;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Goalkeeper,
    Outfield,
}

impl Role {
    pub fn from_pos(pos: &str) -> Self {
        if pos.trim() == GOALKEEPER_TAG {
            Role::Goalkeeper
        } else {
            Role::Outfield
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub name: String,
    pub pos: String,
    pub nationality: String,
    pub rarity: String,
    pub season: String,
    pub attributes: Attributes,
}

impl PlayerRecord {
    pub fn role(&self) -> Role {
        Role::from_pos(&self.pos)
    }

    pub fn attr(&self, attr: Attribute) -> f64 {
        self.attributes.get(attr)
    }

    pub fn descriptive(&self, column: &str) -> &str {
        match column {
            "Name" => &self.name,
            "Pos" => &self.pos,
            "Nationality" => &self.nationality,
            "Rarity" => &self.rarity,
            "Season" => &self.season,
            _ => "",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Table,
    Positions,
    Rarities,
    Weights,
}

/// Display budgets cycled with `t`. `None` shows every row.
pub const LIMIT_CHOICES: [Option<usize>; 4] = [Some(25), Some(50), Some(100), None];

const WEIGHT_STEP: f64 = 0.01;

#[derive(Debug, Clone)]
pub struct AppState {
    pub source: String,
    pub records: Vec<PlayerRecord>,
    pub loaded_at: Option<DateTime<Local>>,
    pub load_error: Option<String>,
    pub preset: FormulaPreset,
    pub config: ScoringConfig,
    /// Config that weight edits started from.
    pub edit_origin: ScoringConfig,
    pub config_from_file: bool,
    pub filters: RankFilters,
    pub limit: Option<usize>,
    pub table: RankedTable,
    pub focus: Focus,
    pub selected: usize,
    pub position_choices: Vec<String>,
    pub rarity_choices: Vec<String>,
    pub position_cursor: usize,
    pub rarity_cursor: usize,
    pub weight_role: Role,
    pub weight_cursor: usize,
    pub search_active: bool,
    pub logs: VecDeque<String>,
    pub help_overlay: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(FormulaPreset::default().config(), FormulaPreset::default(), Some(100))
    }
}

impl AppState {
    pub fn new(config: ScoringConfig, preset: FormulaPreset, limit: Option<usize>) -> Self {
        Self {
            source: String::new(),
            records: Vec::new(),
            loaded_at: None,
            load_error: None,
            preset,
            edit_origin: config.clone(),
            config,
            config_from_file: false,
            filters: RankFilters::default(),
            limit,
            table: RankedTable::default(),
            focus: Focus::Table,
            selected: 0,
            position_choices: Vec::new(),
            rarity_choices: Vec::new(),
            position_cursor: 0,
            rarity_cursor: 0,
            weight_role: Role::Outfield,
            weight_cursor: 0,
            search_active: false,
            logs: VecDeque::with_capacity(200),
            help_overlay: false,
        }
    }

    /// Replace the loaded table. Filter values that no longer exist are dropped.
    pub fn set_records(&mut self, records: Vec<PlayerRecord>) {
        self.position_choices = distinct_sorted(records.iter().map(|r| r.pos.as_str()));
        self.rarity_choices = distinct_sorted(records.iter().map(|r| r.rarity.as_str()));
        let positions = &self.position_choices;
        self.filters.positions.retain(|p| positions.contains(p));
        let rarities = &self.rarity_choices;
        self.filters.rarities.retain(|r| rarities.contains(r));
        self.position_cursor = self.position_cursor.min(self.position_choices.len().saturating_sub(1));
        self.rarity_cursor = self.rarity_cursor.min(self.rarity_choices.len().saturating_sub(1));
        self.records = records;
        self.recompute();
    }

    /// Score, rank, filter and truncate the loaded records from scratch.
    pub fn recompute(&mut self) {
        self.table = rank(&self.records, &self.config, &self.filters, self.limit);
        self.clamp_selection();
    }

    pub fn clamp_selection(&mut self) {
        let total = self.table.len();
        if total == 0 {
            self.selected = 0;
        } else if self.selected >= total {
            self.selected = total - 1;
        }
    }

    pub fn selected_row(&self) -> Option<&RankedRow> {
        self.table.rows.get(self.selected)
    }

    pub fn cycle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Table => Focus::Positions,
            Focus::Positions => Focus::Rarities,
            Focus::Rarities => Focus::Weights,
            Focus::Weights => Focus::Table,
        };
    }

    pub fn move_down(&mut self) {
        match self.focus {
            Focus::Table => {
                let total = self.table.len();
                if total > 0 {
                    self.selected = (self.selected + 1) % total;
                }
            }
            Focus::Positions => {
                self.position_cursor = wrap_next(self.position_cursor, self.position_choices.len())
            }
            Focus::Rarities => {
                self.rarity_cursor = wrap_next(self.rarity_cursor, self.rarity_choices.len())
            }
            Focus::Weights => {
                self.weight_cursor = wrap_next(self.weight_cursor, Attribute::ALL.len())
            }
        }
    }

    pub fn move_up(&mut self) {
        match self.focus {
            Focus::Table => {
                let total = self.table.len();
                if total > 0 {
                    self.selected = wrap_prev(self.selected, total);
                }
            }
            Focus::Positions => {
                self.position_cursor = wrap_prev(self.position_cursor, self.position_choices.len())
            }
            Focus::Rarities => {
                self.rarity_cursor = wrap_prev(self.rarity_cursor, self.rarity_choices.len())
            }
            Focus::Weights => {
                self.weight_cursor = wrap_prev(self.weight_cursor, Attribute::ALL.len())
            }
        }
    }

    /// Toggle the value under the cursor of the focused filter pane.
    pub fn toggle_current_choice(&mut self) {
        let changed = match self.focus {
            Focus::Positions => toggle_member(
                &mut self.filters.positions,
                self.position_choices.get(self.position_cursor),
            ),
            Focus::Rarities => toggle_member(
                &mut self.filters.rarities,
                self.rarity_choices.get(self.rarity_cursor),
            ),
            Focus::Table | Focus::Weights => false,
        };
        if changed {
            self.selected = 0;
            self.recompute();
        }
    }

    pub fn clear_filters(&mut self) {
        self.filters.positions.clear();
        self.filters.rarities.clear();
        self.filters.query.clear();
        self.selected = 0;
        self.recompute();
    }

    pub fn push_search_char(&mut self, ch: char) {
        self.filters.query.push(ch);
        self.selected = 0;
        self.recompute();
    }

    pub fn pop_search_char(&mut self) {
        if self.filters.query.pop().is_some() {
            self.selected = 0;
            self.recompute();
        }
    }

    pub fn selected_weight_attribute(&self) -> Attribute {
        Attribute::ALL
            .get(self.weight_cursor)
            .copied()
            .unwrap_or(Attribute::Pwr)
    }

    /// Nudge the weight under the cursor by `steps` increments. Weights never go below 0.
    pub fn adjust_weight(&mut self, steps: i32) {
        let attr = self.selected_weight_attribute();
        let formula = self.config.formula_mut(self.weight_role);
        let current = formula.weights.get(&attr).copied().unwrap_or(0.0);
        let next = (current + f64::from(steps) * WEIGHT_STEP).max(0.0);
        // Keep two decimals so repeated nudges do not drift.
        let next = (next * 100.0).round() / 100.0;
        // RoleMean averages over the map's keys; a 0 weight that started absent stays absent.
        let originally_weighted = self
            .edit_origin
            .formula(self.weight_role)
            .weights
            .contains_key(&attr);
        if next == 0.0 && !originally_weighted {
            formula.weights.remove(&attr);
        } else {
            formula.weights.insert(attr, next);
        }
        self.config.name = format!("{} (edited)", self.preset.key());
        self.config_from_file = false;
        self.recompute();
    }

    pub fn cycle_weight_role(&mut self) {
        self.weight_role = match self.weight_role {
            Role::Goalkeeper => Role::Outfield,
            Role::Outfield => Role::Goalkeeper,
        };
    }

    pub fn cycle_preset(&mut self) {
        self.apply_preset(self.preset.next());
    }

    pub fn apply_preset(&mut self, preset: FormulaPreset) {
        self.preset = preset;
        self.set_config(preset.config(), false);
    }

    /// Replace the active config; later weight edits are measured against it.
    pub fn set_config(&mut self, config: ScoringConfig, from_file: bool) {
        self.edit_origin = config.clone();
        self.config = config;
        self.config_from_file = from_file;
        self.recompute();
    }

    pub fn cycle_limit(&mut self) {
        let idx = LIMIT_CHOICES
            .iter()
            .position(|c| *c == self.limit)
            .map(|i| (i + 1) % LIMIT_CHOICES.len())
            .unwrap_or(0);
        self.limit = LIMIT_CHOICES[idx];
        self.recompute();
    }

    pub fn toggle_scope(&mut self) {
        self.filters.scope = match self.filters.scope {
            RankScope::Population => RankScope::Filtered,
            RankScope::Filtered => RankScope::Population,
        };
        self.recompute();
    }

    /// Ranked view of the whole table for export, ignoring filters and the display budget.
    pub fn full_table(&self) -> RankedTable {
        rank(&self.records, &self.config, &RankFilters::default(), None)
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        const MAX_LOGS: usize = 200;
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }
}

pub fn role_label(role: Role) -> &'static str {
    match role {
        Role::Goalkeeper => "Goalkeeper",
        Role::Outfield => "Outfield",
    }
}

pub fn scope_label(scope: RankScope) -> &'static str {
    match scope {
        RankScope::Population => "ALL",
        RankScope::Filtered => "FILTERED",
    }
}

pub fn limit_label(limit: Option<usize>) -> String {
    match limit {
        Some(n) => format!("Top {n}"),
        None => "All".to_string(),
    }
}

fn distinct_sorted<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn toggle_member(set: &mut BTreeSet<String>, value: Option<&String>) -> bool {
    let Some(value) = value else {
        return false;
    };
    if !set.remove(value) {
        set.insert(value.clone());
    }
    true
}

fn wrap_next(current: usize, total: usize) -> usize {
    if total == 0 { 0 } else { (current + 1) % total }
}

fn wrap_prev(current: usize, total: usize) -> usize {
    if total == 0 {
        0
    } else if current == 0 {
        total - 1
    } else {
        current - 1
    }
}
