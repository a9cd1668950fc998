//! Parquet persistence for the two store tables.
//!
//! Each commit writes both tables into a fresh `gen-NNNNNN/` directory and
//! then publishes it by renaming `CURRENT.tmp` over `CURRENT`. The pointer
//! rename is the only step that changes what a reopen sees, so a commit is
//! visible on disk in full or not at all.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::identity::{Identity, Role};

use super::{MarkRecord, Tables};

const CURRENT: &str = "CURRENT";
const CURRENT_STAGED: &str = "CURRENT.tmp";
const GEN_PREFIX: &str = "gen-";

pub(super) fn generation_dir(root: &Path, generation: u64) -> PathBuf {
    root.join(format!("{}{:06}", GEN_PREFIX, generation))
}

fn identities_path(dir: &Path) -> PathBuf { dir.join("identities.parquet") }
fn marks_path(dir: &Path) -> PathBuf { dir.join("marks.parquet") }

fn corrupt(table: &str, column: &str, row: usize) -> AppError {
    AppError::internal("corrupt_store", format!("{}: missing {} at row {}", table, column, row))
}

/// Generation named by `CURRENT`, or `None` for a store that never committed.
pub(super) fn current_generation(root: &Path) -> AppResult<Option<u64>> {
    let path = root.join(CURRENT);
    if !path.exists() { return Ok(None); }
    let raw = fs::read_to_string(&path)?;
    raw.trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|_| AppError::internal("corrupt_store", format!("{}: unreadable generation '{}'", path.display(), raw.trim())))
}

/// Generation numbers of every `gen-*` directory under `root`.
pub(super) fn generations_on_disk(root: &Path) -> AppResult<Vec<u64>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(root)?.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(n) = name.strip_prefix(GEN_PREFIX).and_then(|s| s.parse::<u64>().ok()) {
            out.push(n);
        }
    }
    Ok(out)
}

/// Best-effort removal of a generation directory that is no longer published.
pub(super) fn discard_generation(root: &Path, generation: u64) {
    let dir = generation_dir(root, generation);
    if dir.is_dir() {
        if let Err(e) = fs::remove_dir_all(&dir) {
            warn!(target: "gradebook::storage", dir = %dir.display(), "could not remove generation: {}", e);
        }
    }
}

pub(super) fn load_generation(root: &Path, generation: u64) -> AppResult<(Vec<Identity>, Vec<MarkRecord>)> {
    let dir = generation_dir(root, generation);
    Ok((read_identities(&identities_path(&dir))?, read_marks(&marks_path(&dir))?))
}

/// Write both tables into a new generation directory. The directory must not
/// exist yet; on failure whatever was created is removed again.
pub(super) fn stage_generation(root: &Path, generation: u64, tables: &Tables) -> AppResult<()> {
    let dir = generation_dir(root, generation);
    fs::create_dir(&dir)?;
    let written = write_identities(&identities_path(&dir), tables.identities())
        .and_then(|_| write_marks(&marks_path(&dir), tables.marks()));
    if written.is_err() {
        discard_generation(root, generation);
    }
    written
}

/// Point `CURRENT` at `generation` with a single rename.
pub(super) fn publish_generation(root: &Path, generation: u64) -> AppResult<()> {
    let staged = root.join(CURRENT_STAGED);
    let mut f = fs::File::create(&staged)?;
    f.write_all(generation.to_string().as_bytes())?;
    f.sync_all()?;
    fs::rename(&staged, root.join(CURRENT))?;
    // best-effort flush of the directory entry
    if let Ok(dir) = fs::File::open(root) {
        let _ = dir.sync_all();
    }
    debug!(target: "gradebook::storage", generation, "generation published");
    Ok(())
}

fn read_frame(path: &Path) -> AppResult<Option<DataFrame>> {
    if !path.exists() { return Ok(None); }
    let file = fs::File::open(path)?;
    let df = ParquetReader::new(file).finish()?;
    Ok(Some(df))
}

fn write_frame(path: &Path, mut df: DataFrame) -> AppResult<()> {
    let mut f = fs::File::create(path)?;
    ParquetWriter::new(&mut f).finish(&mut df)?;
    f.sync_all()?;
    Ok(())
}

fn read_identities(path: &Path) -> AppResult<Vec<Identity>> {
    let Some(df) = read_frame(path)? else { return Ok(Vec::new()); };
    let ids = df.column("id")?.i64()?;
    let handles = df.column("handle")?.str()?;
    let contacts = df.column("contact")?.str()?;
    let hashes = df.column("secret_hash")?.str()?;
    let roles = df.column("role")?.str()?;
    let mut out = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let role: Role = roles.get(i).ok_or_else(|| corrupt("identities", "role", i))?.parse()?;
        out.push(Identity {
            id: ids.get(i).ok_or_else(|| corrupt("identities", "id", i))?,
            handle: handles.get(i).ok_or_else(|| corrupt("identities", "handle", i))?.to_string(),
            contact: contacts.get(i).map(str::to_string),
            secret_hash: hashes.get(i).ok_or_else(|| corrupt("identities", "secret_hash", i))?.to_string(),
            role,
        });
    }
    Ok(out)
}

fn write_identities(path: &Path, rows: &[Identity]) -> AppResult<()> {
    let df = DataFrame::new(vec![
        Series::new("id".into(), rows.iter().map(|r| r.id).collect::<Vec<i64>>()).into(),
        Series::new("handle".into(), rows.iter().map(|r| r.handle.clone()).collect::<Vec<String>>()).into(),
        Series::new("contact".into(), rows.iter().map(|r| r.contact.clone()).collect::<Vec<Option<String>>>()).into(),
        Series::new("secret_hash".into(), rows.iter().map(|r| r.secret_hash.clone()).collect::<Vec<String>>()).into(),
        Series::new("role".into(), rows.iter().map(|r| r.role.as_str().to_string()).collect::<Vec<String>>()).into(),
    ])?;
    write_frame(path, df)
}

fn read_marks(path: &Path) -> AppResult<Vec<MarkRecord>> {
    let Some(df) = read_frame(path)? else { return Ok(Vec::new()); };
    let ids = df.column("id")?.i64()?;
    let student_ids = df.column("student_id")?.str()?;
    let names = df.column("student_name")?.str()?;
    let study = df.column("time_study")?.f64()?;
    let marks = df.column("marks")?.f64()?;
    let users = df.column("user_id")?.i64()?;
    let mut out = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        out.push(MarkRecord {
            id: ids.get(i).ok_or_else(|| corrupt("marks", "id", i))?,
            student_id: student_ids.get(i).ok_or_else(|| corrupt("marks", "student_id", i))?.to_string(),
            student_name: names.get(i).ok_or_else(|| corrupt("marks", "student_name", i))?.to_string(),
            time_study: study.get(i).ok_or_else(|| corrupt("marks", "time_study", i))?,
            marks: marks.get(i).ok_or_else(|| corrupt("marks", "marks", i))?,
            user_id: users.get(i),
        });
    }
    Ok(out)
}

fn write_marks(path: &Path, rows: &[MarkRecord]) -> AppResult<()> {
    let df = DataFrame::new(vec![
        Series::new("id".into(), rows.iter().map(|r| r.id).collect::<Vec<i64>>()).into(),
        Series::new("student_id".into(), rows.iter().map(|r| r.student_id.clone()).collect::<Vec<String>>()).into(),
        Series::new("student_name".into(), rows.iter().map(|r| r.student_name.clone()).collect::<Vec<String>>()).into(),
        Series::new("time_study".into(), rows.iter().map(|r| r.time_study).collect::<Vec<f64>>()).into(),
        Series::new("marks".into(), rows.iter().map(|r| r.marks).collect::<Vec<f64>>()).into(),
        Series::new("user_id".into(), rows.iter().map(|r| r.user_id).collect::<Vec<Option<i64>>>()).into(),
    ])?;
    write_frame(path, df)
}
