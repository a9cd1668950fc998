//!
//! gradebook storage module
//! ------------------------
//! The record store owns two tables: login identities and student mark records.
//! Both live in memory and are persisted together as one Parquet generation
//! (`gen-NNNNNN/identities.parquet`, `gen-NNNNNN/marks.parquet`) named by the
//! `CURRENT` pointer file under the configured root.
//!
//! All mutation goes through [`SharedStore::transaction`]: the closure works on
//! a staged copy of both tables, and the copy only replaces the live tables
//! once it has been published on disk. Writers hold the writer mutex for the
//! whole unit of work; readers see either the old or the new state.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::identity::{Identity, Role};

mod io;

/// One student's academic datum.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkRecord {
    pub id: i64,
    pub student_id: String,
    pub student_name: String,
    /// Hours studied per day.
    pub time_study: f64,
    pub marks: f64,
    /// Linked student identity. Only `None` between insert and link.
    #[serde(skip)]
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewMark {
    pub student_id: String,
    pub student_name: String,
    pub time_study: f64,
    pub marks: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Tables {
    identities: Vec<Identity>,
    marks: Vec<MarkRecord>,
    next_identity_id: i64,
    next_mark_id: i64,
}

impl Tables {
    fn from_rows(identities: Vec<Identity>, marks: Vec<MarkRecord>) -> Self {
        let next_identity_id = identities.iter().map(|i| i.id).max().unwrap_or(0) + 1;
        let next_mark_id = marks.iter().map(|m| m.id).max().unwrap_or(0) + 1;
        Self { identities, marks, next_identity_id, next_mark_id }
    }

    pub fn identities(&self) -> &[Identity] { &self.identities }

    /// Mark records in insertion order.
    pub fn marks(&self) -> &[MarkRecord] { &self.marks }

    pub fn identity_by_handle(&self, handle: &str) -> Option<&Identity> {
        self.identities.iter().find(|i| i.handle == handle)
    }

    pub fn identity_by_contact(&self, contact: &str) -> Option<&Identity> {
        self.identities.iter().find(|i| i.contact.as_deref() == Some(contact))
    }

    pub fn identity_by_id(&self, id: i64) -> Option<&Identity> {
        self.identities.iter().find(|i| i.id == id)
    }

    pub fn count_role(&self, role: Role) -> usize {
        self.identities.iter().filter(|i| i.role == role).count()
    }

    /// Insert a new identity, enforcing unique handles and unique non-empty contacts.
    pub fn insert_identity(&mut self, handle: &str, contact: Option<&str>, secret_hash: String, role: Role) -> AppResult<Identity> {
        if self.identity_by_handle(handle).is_some() {
            return Err(AppError::conflict("duplicate_username", format!("Username '{}' already exists", handle)));
        }
        let contact = contact.map(str::trim).filter(|c| !c.is_empty());
        if let Some(c) = contact {
            if self.identity_by_contact(c).is_some() {
                return Err(AppError::conflict("duplicate_email", format!("Email '{}' already registered", c)));
            }
        }
        let identity = Identity {
            id: self.next_identity_id,
            handle: handle.to_string(),
            contact: contact.map(str::to_string),
            secret_hash,
            role,
        };
        self.next_identity_id += 1;
        self.identities.push(identity.clone());
        Ok(identity)
    }

    pub fn delete_identities_with_role(&mut self, role: Role) -> usize {
        let before = self.identities.len();
        self.identities.retain(|i| i.role != role);
        before - self.identities.len()
    }

    /// Rename identity `id`, failing with `Conflict` if another identity holds `handle`.
    pub fn rename_identity(&mut self, id: i64, handle: &str) -> AppResult<()> {
        if self.identities.iter().any(|i| i.handle == handle && i.id != id) {
            return Err(AppError::conflict("duplicate_username", "Generated username already exists"));
        }
        let ident = self
            .identities
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| AppError::not_found("identity_not_found", format!("No identity with id {}", id)))?;
        ident.handle = handle.to_string();
        Ok(())
    }

    pub fn insert_mark(&mut self, new: NewMark) -> MarkRecord {
        let rec = MarkRecord {
            id: self.next_mark_id,
            student_id: new.student_id,
            student_name: new.student_name,
            time_study: new.time_study,
            marks: new.marks,
            user_id: None,
        };
        self.next_mark_id += 1;
        self.marks.push(rec.clone());
        rec
    }

    /// Link a mark record to an identity. An identity backs at most one record.
    pub fn link_mark(&mut self, mark_id: i64, identity_id: i64) -> AppResult<()> {
        if self.identity_by_id(identity_id).is_none() {
            return Err(AppError::not_found("identity_not_found", format!("No identity with id {}", identity_id)));
        }
        if self.marks.iter().any(|m| m.user_id == Some(identity_id) && m.id != mark_id) {
            return Err(AppError::conflict("identity_already_linked", format!("Identity {} already backs a mark record", identity_id)));
        }
        let rec = self
            .marks
            .iter_mut()
            .find(|m| m.id == mark_id)
            .ok_or_else(|| AppError::not_found("record_not_found", format!("No mark record with id {}", mark_id)))?;
        rec.user_id = Some(identity_id);
        Ok(())
    }

    pub fn clear_marks(&mut self) -> usize {
        let n = self.marks.len();
        self.marks.clear();
        n
    }

    pub fn mark_by_student_id(&self, student_id: &str) -> Option<&MarkRecord> {
        self.marks.iter().find(|m| m.student_id == student_id)
    }

    pub fn mark_by_student_id_mut(&mut self, student_id: &str) -> Option<&mut MarkRecord> {
        self.marks.iter_mut().find(|m| m.student_id == student_id)
    }

    pub fn mark_for_identity(&self, identity_id: i64) -> Option<&MarkRecord> {
        self.marks.iter().find(|m| m.user_id == Some(identity_id))
    }
}

/// Writer side of the store: owns the on-disk generations under `root`.
pub struct Store {
    root: PathBuf,
    /// Published generation, `None` until the first commit.
    generation: Option<u64>,
    next_generation: u64,
}

impl Store {
    /// Open (or create) a store under `root` and load the published tables.
    ///
    /// Generation directories that `CURRENT` does not name are leftovers of
    /// interrupted commits and are removed.
    pub fn open<P: AsRef<Path>>(root: P) -> AppResult<(Self, Tables)> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        let generation = io::current_generation(&root)?;
        let on_disk = io::generations_on_disk(&root)?;
        let (identities, marks) = match generation {
            Some(g) => io::load_generation(&root, g)?,
            None => (Vec::new(), Vec::new()),
        };
        for stale in on_disk.iter().copied().filter(|g| Some(*g) != generation) {
            io::discard_generation(&root, stale);
        }
        let next_generation = on_disk.iter().copied().chain(generation).max().unwrap_or(0) + 1;
        debug!(target: "gradebook::storage", root = %root.display(), ?generation, identities = identities.len(), marks = marks.len(), "store opened");
        Ok((Self { root, generation, next_generation }, Tables::from_rows(identities, marks)))
    }

    /// Stage `tables` as a new generation and publish it. On error the
    /// previously published generation stays current.
    fn persist(&mut self, tables: &Tables) -> AppResult<()> {
        let generation = self.next_generation;
        self.next_generation += 1;
        io::stage_generation(&self.root, generation, tables)?;
        if let Err(e) = io::publish_generation(&self.root, generation) {
            io::discard_generation(&self.root, generation);
            return Err(e);
        }
        if let Some(previous) = self.generation.replace(generation) {
            io::discard_generation(&self.root, previous);
        }
        Ok(())
    }
}

/// Thread-safe handle cloned into every request.
///
/// Readers only take the `live` lock, which is never held across disk I/O.
/// Writers are serialized by the `writer` mutex and swap `live` after their
/// generation is published.
#[derive(Clone)]
pub struct SharedStore {
    live: Arc<RwLock<Tables>>,
    writer: Arc<Mutex<Store>>,
}

impl SharedStore {
    pub fn new<P: AsRef<Path>>(root: P) -> AppResult<Self> {
        let (store, tables) = Store::open(root)?;
        Ok(Self { live: Arc::new(RwLock::new(tables)), writer: Arc::new(Mutex::new(store)) })
    }

    pub fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        f(&self.live.read())
    }

    /// Run `f` as one unit of work: all of its changes are kept, or none are.
    pub fn transaction<R>(&self, f: impl FnOnce(&mut Tables) -> AppResult<R>) -> AppResult<R> {
        let mut writer = self.writer.lock();
        let mut staged = self.live.read().clone();
        let out = f(&mut staged)?;
        writer.persist(&staged)?;
        *self.live.write() = staged;
        Ok(out)
    }
}
