// src/export/mod.rs
//
// Dual-format serialization of the converted table. Both files carry the
// same logical data; the CSV gets a UTF-8 byte-order mark so spreadsheet
// tools pick the right encoding.

use anyhow::{Context, Result};
use rust_xlsxwriter::Workbook;
use tracing::debug;

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::table::Table;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

fn with_extension(base: &Path, ext: &str) -> PathBuf {
    let mut s: OsString = base.as_os_str().to_os_string();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}

/// Path of the CSV artifact for `output_base`.
pub fn csv_path(output_base: &Path) -> PathBuf {
    with_extension(output_base, "csv")
}

/// Path of the XLSX artifact for `output_base`.
pub fn xlsx_path(output_base: &Path) -> PathBuf {
    with_extension(output_base, "xlsx")
}

fn write_csv(table: &Table, path: &Path) -> Result<()> {
    let mut file = File::create(path).with_context(|| format!("creating {path:?}"))?;
    file.write_all(UTF8_BOM)
        .with_context(|| format!("writing BOM to {path:?}"))?;

    let mut wtr = csv::Writer::from_writer(file);
    wtr.write_record(&table.headers)
        .with_context(|| format!("writing header to {path:?}"))?;
    for row in &table.rows {
        wtr.write_record(row)
            .with_context(|| format!("writing row to {path:?}"))?;
    }
    wtr.flush().with_context(|| format!("flushing {path:?}"))?;
    Ok(())
}

fn write_xlsx(table: &Table, path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    for (col, header) in table.headers.iter().enumerate() {
        sheet
            .write_string(0, col as u16, header.as_str())
            .with_context(|| format!("writing header cell {col} of {path:?}"))?;
    }
    for (row, cells) in table.rows.iter().enumerate() {
        for (col, value) in cells.iter().enumerate() {
            sheet
                .write_string(row as u32 + 1, col as u16, value.as_str())
                .with_context(|| format!("writing cell ({row},{col}) of {path:?}"))?;
        }
    }

    workbook
        .save(path)
        .with_context(|| format!("saving {path:?}"))?;
    Ok(())
}

/// Write `<output_base>.csv` and `<output_base>.xlsx`, creating parent
/// directories as needed. On any write failure both artifacts are removed
/// so a `false` from `process` never leaves partial files behind.
pub fn write_outputs(table: &Table, output_base: &Path) -> Result<()> {
    if let Some(parent) = output_base.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| format!("creating {parent:?}"))?;
        }
    }

    let csv = csv_path(output_base);
    let xlsx = xlsx_path(output_base);

    let result = write_csv(table, &csv).and_then(|_| write_xlsx(table, &xlsx));
    if result.is_err() {
        for path in [&csv, &xlsx] {
            if fs::remove_file(path).is_ok() {
                debug!(?path, "removed partial output");
            }
        }
    }
    result
}
