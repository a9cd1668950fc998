use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use super::extract::CurrentIdentity;
use super::AppState;
use crate::charts;
use crate::error::{AppError, AppResult};
use crate::identity::{authorize, Operation};
use crate::ingest::{self, DatasetFormat, IngestManifest, MarkUpdate};
use crate::stats::{self, Stats};
use crate::storage::MarkRecord;

const LOCAL_CREDENTIAL_PREVIEW: usize = 5;

fn manifest_body(manifest: IngestManifest, preview: Option<usize>) -> Json<Value> {
    let message = format!("Loaded {} records. Created {} student accounts.", manifest.records_loaded, manifest.accounts_created);
    let (credentials, note) = match preview {
        Some(n) => (
            manifest.credentials.into_iter().take(n).collect::<Vec<_>>(),
            format!("Showing first {}. Students login with username=<Student Name>_<Roll Number>, password=<Roll Number>", n),
        ),
        None => (manifest.credentials, "Students login with username=<Student Name>_<Roll Number> and password=<Roll Number>".to_string()),
    };
    Json(json!({
        "message": message,
        "student_credentials": credentials,
        "note": note,
    }))
}

async fn run_blocking<T: Send + 'static>(f: impl FnOnce() -> AppResult<T> + Send + 'static) -> AppResult<T> {
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::internal("task_failed", e.to_string()))?
}

/// `POST /marks/upload`: multipart field `file` holding a CSV or spreadsheet.
pub(super) async fn upload(
    State(state): State<AppState>,
    CurrentIdentity(who): CurrentIdentity,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<Value>> {
    authorize(who, Operation::IngestDataset)?;
    let mut multipart = multipart.map_err(|e| AppError::user("invalid_body", e.body_text()))?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::user("invalid_body", e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|e| AppError::user("invalid_body", e.body_text()))?;
        upload = Some((filename, bytes));
        break;
    }
    let (filename, bytes) = upload.ok_or_else(|| AppError::user("missing_file", "Multipart field 'file' is required"))?;
    let format = DatasetFormat::from_filename(&filename)?;

    let store = state.store.clone();
    let manifest = run_blocking(move || {
        let df = ingest::read_dataset(bytes.to_vec(), format)?;
        ingest::ingest_dataset(&store, &df)
    })
    .await?;
    Ok(manifest_body(manifest, None))
}

/// `POST /marks/load-csv`: ingest the configured local dataset file.
pub(super) async fn load_local(State(state): State<AppState>, CurrentIdentity(who): CurrentIdentity) -> AppResult<Json<Value>> {
    authorize(who, Operation::IngestDataset)?;
    let store = state.store.clone();
    let path = state.config.dataset_path.clone();
    let manifest = run_blocking(move || {
        let df = ingest::read_dataset_file(&path)?;
        ingest::ingest_dataset(&store, &df)
    })
    .await?;
    Ok(manifest_body(manifest, Some(LOCAL_CREDENTIAL_PREVIEW)))
}

/// `GET /marks`: every record in insertion order. Any authenticated caller.
pub(super) async fn list(State(state): State<AppState>, CurrentIdentity(who): CurrentIdentity) -> AppResult<Json<Vec<MarkRecord>>> {
    authorize(who, Operation::ListRecords)?;
    Ok(Json(state.store.read(|t| t.marks().to_vec())))
}

/// `PATCH /marks/{student_id}`: partial update. Admin only.
pub(super) async fn update(
    State(state): State<AppState>,
    CurrentIdentity(who): CurrentIdentity,
    Path(student_id): Path<String>,
    body: Result<Json<MarkUpdate>, JsonRejection>,
) -> AppResult<Json<MarkRecord>> {
    authorize(who, Operation::UpdateRecord)?;
    let Json(changes) = body.map_err(|e| AppError::user("invalid_body", e.body_text()))?;
    Ok(Json(ingest::update_record(&state.store, &student_id, &changes)?))
}

pub(super) async fn average(State(state): State<AppState>, CurrentIdentity(who): CurrentIdentity) -> AppResult<Json<Stats>> {
    authorize(who, Operation::ViewStatistics)?;
    Ok(Json(state.store.read(|t| stats::summarize(t.marks()))))
}

pub(super) async fn highest(State(state): State<AppState>, CurrentIdentity(who): CurrentIdentity) -> AppResult<Json<MarkRecord>> {
    authorize(who, Operation::ViewStatistics)?;
    Ok(Json(state.store.read(|t| stats::highest(t.marks()))?))
}

pub(super) async fn lowest(State(state): State<AppState>, CurrentIdentity(who): CurrentIdentity) -> AppResult<Json<MarkRecord>> {
    authorize(who, Operation::ViewStatistics)?;
    Ok(Json(state.store.read(|t| stats::lowest(t.marks()))?))
}

fn chart_marks(state: &AppState) -> AppResult<Vec<f64>> {
    let marks: Vec<f64> = state.store.read(|t| t.marks().iter().map(|m| m.marks).collect());
    if marks.is_empty() {
        return Err(stats::no_records());
    }
    Ok(marks)
}

pub(super) async fn bar_chart(State(state): State<AppState>, CurrentIdentity(who): CurrentIdentity) -> AppResult<impl IntoResponse> {
    authorize(who, Operation::ViewCharts)?;
    let marks = chart_marks(&state)?;
    Ok(([(CONTENT_TYPE, charts::CONTENT_TYPE)], charts::bar_chart_svg(&marks)))
}

pub(super) async fn histogram(State(state): State<AppState>, CurrentIdentity(who): CurrentIdentity) -> AppResult<impl IntoResponse> {
    authorize(who, Operation::ViewCharts)?;
    let marks = chart_marks(&state)?;
    Ok(([(CONTENT_TYPE, charts::CONTENT_TYPE)], charts::histogram_svg(&marks)))
}
