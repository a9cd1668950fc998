use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::rows::{extract_rows, StudentRow};
use crate::error::{AppError, AppResult};
use crate::identity::{hash_password, Role};
use crate::storage::{MarkRecord, NewMark, SharedStore};

/// Login handle for a student: display name and roll number joined by `_`,
/// so namesakes stay distinct as long as their roll numbers differ.
pub fn student_handle(name: &str, student_id: &str) -> String {
    format!("{}_{}", name, student_id)
}

pub fn student_contact(student_id: &str) -> String {
    format!("{}@student.edu", student_id.to_lowercase())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssuedCredential {
    pub username: String,
    /// Initial password, equal to the roll number.
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestManifest {
    pub records_loaded: usize,
    pub accounts_created: usize,
    pub credentials: Vec<IssuedCredential>,
}

struct PreparedStudent {
    row: StudentRow,
    handle: String,
    contact: String,
    secret_hash: String,
}

/// Replace every mark record and every student identity with `rows`.
///
/// Runs as a single store transaction: on any failure (for example a derived
/// handle colliding with an existing admin) the previous state is untouched.
pub fn replace_students(store: &SharedStore, rows: Vec<StudentRow>) -> AppResult<IngestManifest> {
    let prepared = rows
        .into_iter()
        .map(|row| -> AppResult<PreparedStudent> {
            Ok(PreparedStudent {
                handle: student_handle(&row.student_name, &row.student_id),
                contact: student_contact(&row.student_id),
                secret_hash: hash_password(&row.student_id)?,
                row,
            })
        })
        .collect::<AppResult<Vec<_>>>()?;

    let (removed_marks, removed_students, manifest) = store.transaction(|t| {
        let removed_marks = t.clear_marks();
        let removed_students = t.delete_identities_with_role(Role::Student);
        let mut credentials = Vec::with_capacity(prepared.len());
        for p in &prepared {
            let mark = t.insert_mark(NewMark {
                student_id: p.row.student_id.clone(),
                student_name: p.row.student_name.clone(),
                time_study: p.row.time_study,
                marks: p.row.marks,
            });
            let identity = t.insert_identity(&p.handle, Some(&p.contact), p.secret_hash.clone(), Role::Student)?;
            t.link_mark(mark.id, identity.id)?;
            credentials.push(IssuedCredential { username: p.handle.clone(), password: p.row.student_id.clone() });
        }
        let manifest = IngestManifest { records_loaded: t.marks().len(), accounts_created: credentials.len(), credentials };
        Ok((removed_marks, removed_students, manifest))
    })?;

    info!(
        target: "gradebook::ingest",
        removed_marks, removed_students,
        loaded = manifest.records_loaded,
        accounts = manifest.accounts_created,
        "student data replaced"
    );
    Ok(manifest)
}

/// Validate a parsed dataset and replace all student state with it.
pub fn ingest_dataset(store: &SharedStore, df: &DataFrame) -> AppResult<IngestManifest> {
    let rows = extract_rows(df)?;
    replace_students(store, rows)
}

/// Partial change to one mark record; absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarkUpdate {
    #[serde(default)]
    pub student_name: Option<String>,
    #[serde(default)]
    pub time_study: Option<f64>,
    #[serde(default)]
    pub marks: Option<f64>,
}

impl MarkUpdate {
    fn validate(&self) -> AppResult<()> {
        if let Some(name) = &self.student_name {
            if name.trim().is_empty() {
                return Err(AppError::user("invalid_update", "student_name must not be empty"));
            }
        }
        if let Some(t) = self.time_study {
            if !t.is_finite() || t < 0.0 {
                return Err(AppError::user("invalid_update", "time_study must be a non-negative number"));
            }
        }
        if let Some(m) = self.marks {
            if !m.is_finite() {
                return Err(AppError::user("invalid_update", "marks must be a number"));
            }
        }
        Ok(())
    }
}

/// Apply `changes` to the record with roll number `student_id`.
///
/// A name change renames the linked student identity using the same handle
/// rule as ingestion; a clash with any other identity is a `Conflict` and
/// nothing is changed.
pub fn update_record(store: &SharedStore, student_id: &str, changes: &MarkUpdate) -> AppResult<MarkRecord> {
    changes.validate()?;
    let updated = store.transaction(|t| {
        let rec = t
            .mark_by_student_id_mut(student_id)
            .ok_or_else(|| AppError::not_found("record_not_found", "Student record not found"))?;
        if let Some(name) = &changes.student_name {
            rec.student_name = name.trim().to_string();
        }
        if let Some(v) = changes.time_study {
            rec.time_study = v;
        }
        if let Some(v) = changes.marks {
            rec.marks = v;
        }
        let rec = rec.clone();
        if changes.student_name.is_some() {
            if let Some(uid) = rec.user_id {
                t.rename_identity(uid, &student_handle(&rec.student_name, &rec.student_id))?;
            }
        }
        Ok(rec)
    })?;
    info!(target: "gradebook::ingest", student_id, "mark record updated");
    Ok(updated)
}
