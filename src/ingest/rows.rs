use std::collections::HashMap;

use polars::prelude::*;

use crate::error::{AppError, AppResult};

pub const COL_NAME: &str = "Student Name";
pub const COL_ROLL: &str = "Student Roll Number";
pub const COL_MARKS: &str = "Marks";
pub const COL_STUDY: &str = "Time Studied Per Day (hrs)";

pub const REQUIRED_COLUMNS: [&str; 4] = [COL_NAME, COL_ROLL, COL_MARKS, COL_STUDY];

/// One validated dataset row.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentRow {
    pub student_id: String,
    pub student_name: String,
    pub time_study: f64,
    pub marks: f64,
}

/// Map each required column to the frame's actual (untrimmed) header.
fn resolve_columns(df: &DataFrame) -> AppResult<HashMap<&'static str, String>> {
    let found: Vec<String> = df.get_column_names().iter().map(|n| n.to_string()).collect();
    let mut resolved = HashMap::new();
    let mut missing = Vec::new();
    for required in REQUIRED_COLUMNS {
        match found.iter().find(|f| f.trim() == required) {
            Some(actual) => { resolved.insert(required, actual.clone()); }
            None => missing.push(required),
        }
    }
    if !missing.is_empty() {
        return Err(AppError::user(
            "missing_columns",
            format!(
                "File must contain columns: [{}]. Missing: [{}]. Found: [{}]",
                REQUIRED_COLUMNS.join(", "),
                missing.join(", "),
                found.join(", ")
            ),
        ));
    }
    Ok(resolved)
}

fn text_column(df: &DataFrame, name: &str) -> AppResult<Vec<Option<String>>> {
    let col = df
        .column(name)
        .and_then(|c| c.cast(&DataType::String))
        .map_err(|e| AppError::user("unreadable_dataset", format!("Column '{}': {}", name, e)))?;
    let ca = col.str().map_err(|e| AppError::user("unreadable_dataset", format!("Column '{}': {}", name, e)))?;
    Ok(ca
        .into_iter()
        .map(|v| v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string))
        .collect())
}

fn required_text(value: &Option<String>, row: usize, field: &str) -> AppResult<String> {
    value
        .clone()
        .ok_or_else(|| AppError::user("invalid_row", format!("Row {}: '{}' is empty", row, field)))
}

fn number(value: &Option<String>, row: usize, field: &str) -> AppResult<f64> {
    let raw = required_text(value, row, field)?;
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(AppError::user("invalid_row", format!("Row {}: '{}' is not a number: '{}'", row, field, raw))),
    }
}

/// Validate the dataset and turn it into rows, in input order.
///
/// Row numbers in errors are 1-based data rows (the header is not counted).
/// A roll number appearing twice fails the whole batch with `Conflict`.
pub fn extract_rows(df: &DataFrame) -> AppResult<Vec<StudentRow>> {
    let cols = resolve_columns(df)?;
    let names = text_column(df, &cols[COL_NAME])?;
    let rolls = text_column(df, &cols[COL_ROLL])?;
    let marks = text_column(df, &cols[COL_MARKS])?;
    let study = text_column(df, &cols[COL_STUDY])?;

    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let row = i + 1;
        let student_name = required_text(&names[i], row, COL_NAME)?;
        let student_id = required_text(&rolls[i], row, COL_ROLL)?;
        let marks = number(&marks[i], row, COL_MARKS)?;
        let time_study = number(&study[i], row, COL_STUDY)?;
        if time_study < 0.0 {
            return Err(AppError::user("invalid_row", format!("Row {}: '{}' must not be negative", row, COL_STUDY)));
        }
        if let Some(first) = seen.insert(student_id.clone(), row) {
            return Err(AppError::conflict(
                "duplicate_student_id",
                format!("Student Roll Number '{}' appears in rows {} and {}", student_id, first, row),
            ));
        }
        out.push(StudentRow { student_id, student_name, time_study, marks });
    }
    Ok(out)
}
