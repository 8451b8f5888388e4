use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use power_terminal::rankings::{RankFilters, RankScope, RankedTable, min_ranks, rank};
use power_terminal::schema::{RawTable, normalize};
use power_terminal::scoring::{FormulaPreset, ScoringConfig, score};
use power_terminal::state::PlayerRecord;

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn players() -> Vec<PlayerRecord> {
    normalize(&RawTable::from_csv_str(&read_fixture("players.csv")).expect("players fixture should parse"))
}

fn excel() -> ScoringConfig {
    FormulaPreset::Excel.config()
}

fn names(table: &RankedTable) -> Vec<&str> {
    table.rows.iter().map(|r| r.record.name.as_str()).collect()
}

fn row_set(table: &RankedTable) -> BTreeSet<(String, u32)> {
    table
        .rows
        .iter()
        .map(|r| (r.record.name.clone(), r.rank))
        .collect()
}

#[test]
fn fixture_order_and_ranks() {
    let table = rank(&players(), &excel(), &RankFilters::default(), None);
    assert_eq!(table.population, 10);
    assert_eq!(
        names(&table),
        vec![
            "Kylian Mbappe",
            "Erling Haaland",
            "Thibaut Courtois",
            "Alisson Becker",
            "Pedri",
            "Gavi",
            "Rodri",
            "Virgil van Dijk",
            "Bukayo Saka",
            "",
        ]
    );
    let ranks: Vec<u32> = table.rows.iter().map(|r| r.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3, 4, 5, 5, 7, 8, 9, 10]);
}

#[test]
fn ranks_are_monotone_in_score() {
    for preset in FormulaPreset::ALL {
        let table = rank(&players(), &preset.config(), &RankFilters::default(), None);
        for a in &table.rows {
            for b in &table.rows {
                if a.score > b.score {
                    assert!(a.rank <= b.rank, "{preset:?}: {} vs {}", a.record.name, b.record.name);
                }
                if a.score == b.score {
                    assert_eq!(a.rank, b.rank, "{preset:?}");
                }
            }
        }
    }
}

#[test]
fn min_rank_tie_law() {
    let scores = [70.0, 88.5, 88.5, 91.0, 88.5, 60.0, 91.0];
    let ranks = min_ranks(&scores);
    for (s, r) in scores.iter().zip(&ranks) {
        let higher = scores.iter().filter(|other| *other > s).count() as u32;
        assert_eq!(*r, higher + 1, "score {s}");
    }
    assert_eq!(ranks, vec![6, 3, 3, 1, 3, 7, 1]);
}

#[test]
fn filters_compose_as_conjunction() {
    let records = players();
    let full = rank(&records, &excel(), &RankFilters::default(), None);
    let positions = ["CM", "GK", "ST"];
    let rarities = ["Icon", "Rare"];

    let stepwise = full
        .filtered(&RankFilters::positions(positions))
        .filtered(&RankFilters::rarities(rarities));

    let mut both = RankFilters::positions(positions);
    both.rarities = RankFilters::rarities(rarities).rarities;
    let once = rank(&records, &excel(), &both, None);

    assert_eq!(row_set(&stepwise), row_set(&once));
    assert_eq!(
        names(&once),
        vec!["Kylian Mbappe", "Thibaut Courtois", "Pedri", "Gavi"]
    );
}

#[test]
fn population_scope_keeps_full_table_ranks() {
    let records = players();
    let mut filters = RankFilters::positions(["GK"]);
    let table = rank(&records, &excel(), &filters, None);
    let ranks: Vec<u32> = table.rows.iter().map(|r| r.rank).collect();
    assert_eq!(ranks, vec![3, 4]);
    assert_eq!(table.population, 10);

    filters.scope = RankScope::Filtered;
    let table = rank(&records, &excel(), &filters, None);
    let ranks: Vec<u32> = table.rows.iter().map(|r| r.rank).collect();
    assert_eq!(ranks, vec![1, 2]);
}

#[test]
fn filtered_scope_renumbers_ties() {
    let mut filters = RankFilters::positions(["CM", "CDM"]);
    filters.scope = RankScope::Filtered;
    let table = rank(&players(), &excel(), &filters, None);
    assert_eq!(names(&table), vec!["Pedri", "Gavi", "Rodri"]);
    let ranks: Vec<u32> = table.rows.iter().map(|r| r.rank).collect();
    assert_eq!(ranks, vec![1, 1, 3]);
}

#[test]
fn truncation_keeps_the_highest_scores() {
    let records = players();
    let config = excel();
    let filters = RankFilters::default();
    let full = rank(&records, &config, &filters, None);

    for n in 0..=records.len() + 2 {
        let top = rank(&records, &config, &filters, Some(n));
        assert_eq!(top.len(), n.min(records.len()));
        assert_eq!(top.rows[..], full.rows[..top.len()]);
        if let Some(last) = top.rows.last() {
            let outside = records
                .iter()
                .map(|r| score(r, &config))
                .filter(|s| *s > last.score)
                .count();
            assert!(outside < top.len(), "no higher score was left out");
        }
    }
}

#[test]
fn search_query_applies_before_truncation() {
    let mut filters = RankFilters::default();
    filters.query = "spain".to_string();
    let table = rank(&players(), &excel(), &filters, Some(2));
    assert_eq!(names(&table), vec!["Pedri", "Gavi"]);
    assert!(filters.is_active());
}

#[test]
fn empty_input_is_empty_table() {
    let table = rank(&[], &excel(), &RankFilters::default(), None);
    assert!(table.is_empty());
    assert_eq!(table.population, 0);

    let table = rank(&[], &excel(), &RankFilters::positions(["GK"]), Some(10));
    assert!(table.is_empty());
}

#[test]
fn filter_with_unknown_value_matches_nothing() {
    let table = rank(&players(), &excel(), &RankFilters::rarities(["Mythic"]), None);
    assert!(table.is_empty());
    assert_eq!(table.population, 10);
}
