use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use rust_xlsxwriter::{Format, Workbook, Worksheet};

use crate::rankings::{RankedRow, RankedTable};
use crate::schema::format_attribute;
use crate::state::{Attribute, DESCRIPTIVE_COLUMNS};

pub const RANK_COLUMN: &str = "Rank";
pub const SCORE_COLUMN: &str = "Power Ranking";

#[derive(Debug, Clone)]
pub struct ExportReport {
    pub path: PathBuf,
    pub rows: usize,
}

/// Header of every export: rank, score, descriptive columns, then the attributes.
pub fn export_headers() -> Vec<String> {
    let mut headers = vec![RANK_COLUMN.to_string(), SCORE_COLUMN.to_string()];
    headers.extend(DESCRIPTIVE_COLUMNS.iter().map(|c| c.to_string()));
    headers.extend(Attribute::ALL.iter().map(|a| a.column().to_string()));
    headers
}

pub fn export_row(row: &RankedRow) -> Vec<String> {
    let mut out = vec![row.rank.to_string(), format!("{:.2}", row.score)];
    out.extend(
        DESCRIPTIVE_COLUMNS
            .iter()
            .map(|c| row.record.descriptive(c).to_string()),
    );
    out.extend(
        Attribute::ALL
            .iter()
            .map(|a| format_attribute(row.record.attr(*a))),
    );
    out
}

pub fn write_csv<W: Write>(table: &RankedTable, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(export_headers()).context("write csv header")?;
    for row in &table.rows {
        wtr.write_record(export_row(row))
            .with_context(|| format!("write csv row for {}", row.record.name))?;
    }
    wtr.flush().context("flush csv")?;
    Ok(())
}

pub fn export_csv(path: &Path, table: &RankedTable) -> Result<ExportReport> {
    ensure_parent(path)?;
    let file = fs::File::create(path).with_context(|| format!("create {}", path.display()))?;
    write_csv(table, file).with_context(|| format!("failed writing csv to {}", path.display()))?;
    Ok(ExportReport {
        path: path.to_path_buf(),
        rows: table.len(),
    })
}

pub fn export_xlsx(path: &Path, table: &RankedTable) -> Result<ExportReport> {
    ensure_parent(path)?;
    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Power Ranking")?;
        write_sheet(sheet, table)?;
    }
    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;
    Ok(ExportReport {
        path: path.to_path_buf(),
        rows: table.len(),
    })
}

fn write_sheet(sheet: &mut Worksheet, table: &RankedTable) -> Result<()> {
    let bold = Format::new().set_bold();
    for (col_idx, header) in export_headers().iter().enumerate() {
        sheet
            .write_string_with_format(0, col_idx as u16, header, &bold)
            .with_context(|| format!("write header ({col_idx})"))?;
    }

    let score_format = Format::new().set_num_format("0.00");
    for (idx, row) in table.rows.iter().enumerate() {
        let r = idx as u32 + 1;
        sheet
            .write_number(r, 0, f64::from(row.rank))
            .with_context(|| format!("write cell ({r},0)"))?;
        sheet
            .write_number_with_format(r, 1, row.score, &score_format)
            .with_context(|| format!("write cell ({r},1)"))?;
        let mut col = 2u16;
        for column in DESCRIPTIVE_COLUMNS {
            sheet
                .write_string(r, col, row.record.descriptive(column))
                .with_context(|| format!("write cell ({r},{col})"))?;
            col += 1;
        }
        for attr in Attribute::ALL {
            sheet
                .write_number(r, col, row.record.attr(attr))
                .with_context(|| format!("write cell ({r},{col})"))?;
            col += 1;
        }
    }
    Ok(())
}

/// `power_ranking_YYYYmmdd_HHMMSS.<ext>` in local time.
pub fn timestamped_file_name(ext: &str) -> String {
    format!("power_ranking_{}.{ext}", Local::now().format("%Y%m%d_%H%M%S"))
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create export dir {}", parent.display()))?;
        }
    }
    Ok(())
}
