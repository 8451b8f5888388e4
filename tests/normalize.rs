use std::fs;
use std::path::PathBuf;

use power_terminal::schema::{RawTable, normalize, normalize_table, normalize_with_report};
use power_terminal::state::{Attribute, Role};
use power_terminal::table_fetch::load_table;

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

fn read_fixture(name: &str) -> String {
    fs::read_to_string(fixture_path(name)).expect("fixture file should be readable")
}

fn players() -> RawTable {
    RawTable::from_csv_str(&read_fixture("players.csv")).expect("players fixture should parse")
}

#[test]
fn every_attribute_is_finite_and_non_negative() {
    for name in ["players.csv", "players_partial.csv"] {
        let raw = RawTable::from_csv_str(&read_fixture(name)).expect("fixture should parse");
        let records = normalize(&raw);
        assert_eq!(records.len(), raw.rows.len(), "{name}: rows are never dropped");
        for record in &records {
            for attr in Attribute::ALL {
                let v = record.attr(attr);
                assert!(v.is_finite() && v >= 0.0, "{name}: {attr:?} = {v}");
            }
        }
    }
}

#[test]
fn missing_columns_are_synthesized_for_every_subset() {
    // Drop each attribute column on its own, then all of them.
    let full = players();
    let mut drops: Vec<Vec<Attribute>> = Attribute::ALL.iter().map(|a| vec![*a]).collect();
    drops.push(Attribute::ALL.to_vec());

    for dropped in drops {
        let keep: Vec<usize> = full
            .headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !dropped.iter().any(|a| a.column() == h.as_str()))
            .map(|(i, _)| i)
            .collect();
        let raw = RawTable::new(
            keep.iter().map(|i| full.headers[*i].clone()).collect(),
            full.rows
                .iter()
                .map(|row| keep.iter().map(|i| row[*i].clone()).collect())
                .collect(),
        );

        let (records, report) = normalize_with_report(&raw);
        assert_eq!(report.synthesized_columns, dropped);
        for record in &records {
            for attr in &dropped {
                assert_eq!(record.attr(*attr), 0.0);
            }
        }

        let table = normalize_table(&raw);
        for attr in Attribute::ALL {
            assert!(table.column_index(attr.column()).is_some(), "{attr:?} column present");
        }
    }
}

#[test]
fn bad_cells_become_zero_and_are_counted() {
    let (records, report) = normalize_with_report(&players());
    assert_eq!(report.rows, 10);
    assert!(report.synthesized_columns.is_empty());
    // Saka's "n/a", then -5, "abc" and two blanks on the unnamed row.
    assert_eq!(report.coerced_cells, 5);
    assert!(!report.is_clean());

    let saka = records.iter().find(|r| r.name == "Bukayo Saka").expect("saka row");
    assert_eq!(saka.attr(Attribute::Explosiveness), 0.0);
    assert_eq!(saka.attr(Attribute::Shoot), 85.0);

    let unnamed = records.iter().find(|r| r.name.is_empty()).expect("unnamed row");
    assert_eq!(unnamed.pos, "CAM");
    assert_eq!(unnamed.attr(Attribute::Pwr), 0.0);
    assert_eq!(unnamed.attr(Attribute::Speed), 0.0);
    assert_eq!(unnamed.attr(Attribute::Dribble), 80.0);
}

#[test]
fn ragged_rows_and_missing_descriptive_columns() {
    let raw = RawTable::from_csv_str(&read_fixture("players_partial.csv")).expect("parse");
    let (records, report) = normalize_with_report(&raw);
    assert_eq!(
        report.synthesized_columns,
        vec![Attribute::Explosiveness, Attribute::Goalkeeping]
    );
    assert_eq!(report.coerced_cells, 3);

    let keeper = &records[0];
    assert_eq!(keeper.role(), Role::Goalkeeper);
    assert_eq!(keeper.nationality, "");
    assert_eq!(keeper.season, "");
    assert_eq!(keeper.attr(Attribute::Defend), 70.0);

    let striker = &records[1];
    assert_eq!(striker.attr(Attribute::Speed), 85.0);
    assert_eq!(striker.attr(Attribute::Dribble), 0.0);
}

#[test]
fn normalization_is_idempotent() {
    for name in ["players.csv", "players_partial.csv"] {
        let raw = RawTable::from_csv_str(&read_fixture(name)).expect("fixture should parse");
        let once = normalize_table(&raw);
        let twice = normalize_table(&once);
        assert_eq!(once, twice, "{name}");
        assert_eq!(normalize(&once), normalize(&raw), "{name}");
        let (_, report) = normalize_with_report(&once);
        assert!(report.is_clean(), "{name}: normalized table needs no repair");
    }
}

#[test]
fn empty_table_normalizes_to_nothing() {
    let raw = RawTable::from_csv_str("Name,Pos\n").expect("header-only csv parses");
    assert!(raw.is_empty());
    let (records, report) = normalize_with_report(&raw);
    assert!(records.is_empty());
    assert_eq!(report.synthesized_columns.len(), Attribute::ALL.len());
}

#[test]
fn local_load_reads_fixture_and_failed_load_is_empty() {
    let path = fixture_path("players.csv");
    let load = load_table(path.to_str().expect("utf-8 path"), std::time::Duration::from_secs(60));
    assert!(load.is_ok(), "{:?}", load.error);
    assert_eq!(load.records.len(), 10);
    assert!(!load.from_cache);
    assert!(load.fetched_at.is_some());

    let missing = fixture_path("does_not_exist.csv");
    let load = load_table(missing.to_str().expect("utf-8 path"), std::time::Duration::from_secs(60));
    assert!(!load.is_ok());
    assert!(load.records.is_empty());
    assert!(load.error.unwrap_or_default().contains("does_not_exist.csv"));
}
