//! Bulk ingestion of the marks dataset and the student account sync that
//! rides on it.
//!
//! An ingestion is a destructive full replace: every mark record and every
//! student identity is dropped and rebuilt from the dataset inside one store
//! transaction. Student handles are `<name>_<roll number>` and the initial
//! password is the roll number itself. That credential is weak and is echoed
//! back to the operator in the manifest so it can be handed out.

mod reader;
mod rows;
mod sync;

pub use reader::{read_dataset, read_dataset_file, DatasetFormat};
pub use rows::{extract_rows, StudentRow, COL_MARKS, COL_NAME, COL_ROLL, COL_STUDY, REQUIRED_COLUMNS};
pub use sync::{ingest_dataset, replace_students, student_contact, student_handle, update_record, IngestManifest, IssuedCredential, MarkUpdate};
