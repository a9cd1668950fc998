use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use polars::prelude::*;
use tracing::debug;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    Csv,
    Spreadsheet,
}

impl DatasetFormat {
    /// Pick a reader from the file extension (`.csv`, `.xlsx`, `.xls`).
    pub fn from_filename(name: &str) -> AppResult<Self> {
        let lower = name.trim().to_ascii_lowercase();
        if lower.ends_with(".csv") {
            Ok(DatasetFormat::Csv)
        } else if lower.ends_with(".xlsx") || lower.ends_with(".xls") {
            Ok(DatasetFormat::Spreadsheet)
        } else {
            Err(AppError::user("unsupported_file_type", "Unsupported file type. Upload a .csv or .xlsx file."))
        }
    }
}

fn unreadable(kind: &str, err: impl std::fmt::Display) -> AppError {
    AppError::user("unreadable_dataset", format!("Could not read {}: {}", kind, err))
}

/// Parse an uploaded dataset into a frame of text columns.
pub fn read_dataset(bytes: Vec<u8>, format: DatasetFormat) -> AppResult<DataFrame> {
    let df = match format {
        DatasetFormat::Csv => read_csv(bytes)?,
        DatasetFormat::Spreadsheet => read_spreadsheet(bytes)?,
    };
    debug!(target: "gradebook::ingest", rows = df.height(), columns = df.width(), ?format, "dataset parsed");
    Ok(df)
}

/// Load a dataset from a local path. A missing file is `NotFound`.
pub fn read_dataset_file(path: &Path) -> AppResult<DataFrame> {
    if !path.is_file() {
        return Err(AppError::not_found("dataset_not_found", format!("{} not found in project directory", path.display())));
    }
    let format = DatasetFormat::from_filename(&path.to_string_lossy())?;
    let bytes = std::fs::read(path)?;
    read_dataset(bytes, format)
}

// Every column is read as text; numeric coercion happens per row so errors can name the row.
fn read_csv(bytes: Vec<u8>) -> AppResult<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
        .map_err(|e| unreadable("CSV", e))
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) if s.trim().is_empty() => None,
        // roll numbers typed as numbers come back as floats; keep "2210", not "2210.0"
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Some(format!("{}", *f as i64)),
        other => Some(other.to_string()),
    }
}

/// Header names from the first row. Blank cells become `Column<n>` and repeats
/// get a `_<k>` suffix so every column name is distinct.
fn header_names(cells: &[Data]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    cells
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let base = cell_text(c).unwrap_or_else(|| format!("Column{}", i + 1));
            let count = seen.entry(base.clone()).or_insert(0);
            *count += 1;
            if *count == 1 { base } else { format!("{}_{}", base, *count - 1) }
        })
        .collect()
}

fn read_spreadsheet(bytes: Vec<u8>) -> AppResult<DataFrame> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| unreadable("spreadsheet", e))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AppError::user("unreadable_dataset", "Spreadsheet has no worksheets"))?
        .map_err(|e| unreadable("spreadsheet", e))?;

    let mut rows = range.rows();
    let header = rows.next().map(header_names).unwrap_or_default();
    let mut columns: Vec<Vec<Option<String>>> = vec![Vec::new(); header.len()];
    for row in rows {
        let cells: Vec<Option<String>> = (0..header.len()).map(|i| row.get(i).and_then(cell_text)).collect();
        if cells.iter().all(Option::is_none) {
            continue;
        }
        for (col, cell) in columns.iter_mut().zip(cells) {
            col.push(cell);
        }
    }
    let series: Vec<Column> = header
        .iter()
        .zip(columns)
        .map(|(name, values)| Series::new(name.as_str().into(), values).into())
        .collect();
    DataFrame::new(series).map_err(|e| unreadable("spreadsheet", e))
}
