use std::collections::BTreeSet;

use crate::scoring::{score, ScoringConfig};
use crate::state::PlayerRecord;

/// Which population the rank numbers are computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RankScope {
    /// Rank over the full table, then filter. Shown ranks may have gaps.
    #[default]
    Population,
    /// Rank only the rows that survive the filters.
    Filtered,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankFilters {
    /// Empty means every position.
    pub positions: BTreeSet<String>,
    /// Empty means every rarity.
    pub rarities: BTreeSet<String>,
    /// Case-insensitive match on name or nationality. Blank disables it.
    pub query: String,
    pub scope: RankScope,
}

impl RankFilters {
    pub fn positions<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            positions: values.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn rarities<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rarities: values.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &PlayerRecord) -> bool {
        if !self.positions.is_empty() && !self.positions.contains(record.pos.trim()) {
            return false;
        }
        if !self.rarities.is_empty() && !self.rarities.contains(record.rarity.trim()) {
            return false;
        }
        let query = self.query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        record.name.to_lowercase().contains(&query)
            || record.nationality.to_lowercase().contains(&query)
    }

    pub fn is_active(&self) -> bool {
        !self.positions.is_empty() || !self.rarities.is_empty() || !self.query.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedRow {
    pub rank: u32,
    pub score: f64,
    pub record: PlayerRecord,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedTable {
    pub rows: Vec<RankedRow>,
    /// Records scored before filtering and truncation.
    pub population: usize,
}

impl RankedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Subset of the rows that pass `filters`. Rank numbers are kept as they are.
    pub fn filtered(&self, filters: &RankFilters) -> RankedTable {
        RankedTable {
            rows: self
                .rows
                .iter()
                .filter(|row| filters.matches(&row.record))
                .cloned()
                .collect(),
            population: self.population,
        }
    }
}

/// Score, order and filter `records` in one pass.
///
/// Rows come back by descending score with "min" ranks: tied scores share
/// `1 + count(strictly higher)`. Exact ties keep input order. The display budget
/// `limit` is applied last.
pub fn rank(
    records: &[PlayerRecord],
    config: &ScoringConfig,
    filters: &RankFilters,
    limit: Option<usize>,
) -> RankedTable {
    let scores: Vec<f64> = records.iter().map(|r| score(r, config)).collect();
    let order = descending_order(&scores);
    let ranks = min_ranks_in_order(&scores, &order);

    let mut rows: Vec<RankedRow> = order
        .iter()
        .zip(ranks)
        .filter(|(idx, _)| filters.matches(&records[**idx]))
        .map(|(idx, rank)| RankedRow {
            rank,
            score: scores[*idx],
            record: records[*idx].clone(),
        })
        .collect();

    if filters.scope == RankScope::Filtered {
        let kept: Vec<f64> = rows.iter().map(|row| row.score).collect();
        let kept_order: Vec<usize> = (0..kept.len()).collect();
        for (row, rank) in rows.iter_mut().zip(min_ranks_in_order(&kept, &kept_order)) {
            row.rank = rank;
        }
    }

    if let Some(n) = limit {
        rows.truncate(n);
    }

    RankedTable {
        rows,
        population: records.len(),
    }
}

/// Min-method rank for every score, in input order.
pub fn min_ranks(scores: &[f64]) -> Vec<u32> {
    let order = descending_order(scores);
    let in_order = min_ranks_in_order(scores, &order);
    let mut out = vec![0u32; scores.len()];
    for (idx, rank) in order.into_iter().zip(in_order) {
        out[idx] = rank;
    }
    out
}

fn descending_order(scores: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    // Stable: equal scores keep their input order.
    order.sort_by(|a, b| scores[*b].total_cmp(&scores[*a]));
    order
}

/// Ranks aligned with `order`, which must already be sorted by descending score.
fn min_ranks_in_order(scores: &[f64], order: &[usize]) -> Vec<u32> {
    let mut out = Vec::with_capacity(order.len());
    let mut prev: Option<(f64, u32)> = None;
    for (pos, idx) in order.iter().enumerate() {
        let s = scores[*idx];
        let rank = match prev {
            Some((prev_score, prev_rank)) if prev_score == s => prev_rank,
            _ => pos as u32 + 1,
        };
        out.push(rank);
        prev = Some((s, rank));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_ranks_share_and_skip() {
        assert_eq!(min_ranks(&[90.0, 95.0, 90.0, 80.0]), vec![2, 1, 2, 4]);
        assert_eq!(min_ranks(&[]), Vec::<u32>::new());
        assert_eq!(min_ranks(&[50.0, 50.0, 50.0]), vec![1, 1, 1]);
    }

    #[test]
    fn query_matches_name_or_nationality() {
        let record = PlayerRecord {
            name: "Lionel Messi".to_string(),
            nationality: "Argentina".to_string(),
            ..PlayerRecord::default()
        };
        let mut filters = RankFilters::default();
        filters.query = "  MESSI ".to_string();
        assert!(filters.matches(&record));
        filters.query = "argen".to_string();
        assert!(filters.matches(&record));
        filters.query = "brazil".to_string();
        assert!(!filters.matches(&record));
    }
}
