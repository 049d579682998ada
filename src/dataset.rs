//! CSV and JSON I/O around the pipeline.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::pipeline::diagnostics::Diagnostics;
use crate::pipeline::table::{Table, Value};

/// Convert a config delimiter to the single byte the CSV reader expects
pub fn delimiter_byte(delimiter: char) -> Result<u8> {
    u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| PipelineError::Config(format!("Delimiter '{}' is not ASCII", delimiter)))
}

fn parse_cell(field: &str) -> Value {
    if field.trim().is_empty() {
        Value::Null
    } else {
        Value::text(field)
    }
}

/// Read a CSV with a header row. Blank cells become nulls, everything else
/// stays text; short rows are padded with nulls.
pub fn read_csv_from<R: Read>(reader: R, delimiter: u8) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| match i {
            0 => h.trim_start_matches('\u{feff}').to_string(),
            _ => h.to_string(),
        })
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(parse_cell).collect());
    }

    Ok(Table::from_rows(headers, rows))
}

pub fn read_csv(path: &Path, delimiter: u8) -> Result<Table> {
    let table = read_csv_from(File::open(path)?, delimiter)?;
    info!(
        "Loaded {} rows, {} columns from {}",
        table.row_count(),
        table.column_count(),
        path.display()
    );
    Ok(table)
}

/// Write the table with a header row; nulls become empty cells
pub fn write_csv_to<W: Write>(table: &Table, writer: W, delimiter: u8) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(writer);

    writer.write_record(table.column_names())?;
    for row in table.rows() {
        writer.write_record(row.iter().map(|v| v.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_csv(table: &Table, path: &Path, delimiter: u8) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    write_csv_to(table, BufWriter::new(File::create(path)?), delimiter)?;
    info!("Wrote {} rows to {}", table.row_count(), path.display());
    Ok(())
}

pub fn write_diagnostics(diagnostics: &Diagnostics, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, diagnostics)?;
    writer.flush()?;
    info!("Wrote diagnostics to {}", path.display());
    Ok(())
}
