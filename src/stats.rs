//! Aggregate statistics over the mark records.

use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::storage::MarkRecord;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Stats {
    pub average_marks: f64,
    pub average_study_time: f64,
    pub highest_marks: f64,
    pub lowest_marks: f64,
}

pub fn round2(v: f64) -> f64 { (v * 100.0).round() / 100.0 }

/// Means, max and min, all rounded to 2 decimal places. Zero-filled when empty.
pub fn summarize(records: &[MarkRecord]) -> Stats {
    if records.is_empty() {
        return Stats { average_marks: 0.0, average_study_time: 0.0, highest_marks: 0.0, lowest_marks: 0.0 };
    }
    let n = records.len() as f64;
    let marks_sum: f64 = records.iter().map(|r| r.marks).sum();
    let study_sum: f64 = records.iter().map(|r| r.time_study).sum();
    let highest = records.iter().map(|r| r.marks).fold(f64::NEG_INFINITY, f64::max);
    let lowest = records.iter().map(|r| r.marks).fold(f64::INFINITY, f64::min);
    Stats {
        average_marks: round2(marks_sum / n),
        average_study_time: round2(study_sum / n),
        highest_marks: round2(highest),
        lowest_marks: round2(lowest),
    }
}

pub(crate) fn no_records() -> AppError { AppError::not_found("no_records", "No records found. Load data first.") }

// Ties keep the earliest record in insertion order.
fn pick(records: &[MarkRecord], better: impl Fn(f64, f64) -> bool) -> AppResult<MarkRecord> {
    let mut iter = records.iter();
    let mut best = iter.next().ok_or_else(no_records)?;
    for rec in iter {
        if better(rec.marks, best.marks) {
            best = rec;
        }
    }
    Ok(best.clone())
}

pub fn highest(records: &[MarkRecord]) -> AppResult<MarkRecord> { pick(records, |a, b| a > b) }

pub fn lowest(records: &[MarkRecord]) -> AppResult<MarkRecord> { pick(records, |a, b| a < b) }
