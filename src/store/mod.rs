//! Authoritative reservation list with atomic JSON persistence.
//!
//! The list is replaced wholesale on every committed mutation: writers build
//! a new vector and swap it in behind an `Arc`, so a reader that grabbed the
//! previous snapshot stays consistent for the duration of its call. The
//! document on disk is a JSON array of reservation records, overwritten via
//! write-to-temp + rename so a crash mid-save never leaves it torn.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use log::warn;
use tempfile::NamedTempFile;

use crate::reservation::Reservation;
use crate::ProgramId;

pub mod error;

pub use error::StoreError;

/// In-memory authoritative list of reservations plus its persisted document.
#[derive(Debug)]
pub struct ReserveStore {
    path: PathBuf,
    list: RwLock<Arc<Vec<Reservation>>>,
}

impl ReserveStore {
    /// Opens the store, loading the persisted document if present.
    ///
    /// A missing document starts the store empty (logged as a warning); an
    /// unreadable or unparseable one is a fatal error for the caller to
    /// surface.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let mut list = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice::<Vec<Reservation>>(&bytes).map_err(|source| {
                StoreError::Corrupt {
                    path: path.clone(),
                    source,
                }
            })?,
            Err(source) if source.kind() == ErrorKind::NotFound => {
                warn!(
                    "reservation document {} not found, starting empty",
                    path.display()
                );
                Vec::new()
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.clone(),
                    source,
                })
            }
        };
        Self::sort(&mut list);

        Ok(Self {
            path,
            list: RwLock::new(Arc::new(list)),
        })
    }

    /// Atomically overwrites the document with the current list.
    pub fn save(&self) -> Result<(), StoreError> {
        let snapshot = self.snapshot();
        let dir = self.path.parent().filter(|p| !p.as_os_str().is_empty());
        let mut file = NamedTempFile::new_in(dir.unwrap_or_else(|| Path::new(".")))
            .map_err(|source| self.io_error(source))?;

        serde_json::to_writer(&mut file, snapshot.as_ref())
            .map_err(|source| self.io_error(source.into()))?;
        file.as_file()
            .sync_all()
            .map_err(|source| self.io_error(source))?;
        file.persist(&self.path)
            .map_err(|source| self.io_error(source.error))?;
        Ok(())
    }

    /// Replaces the list, re-establishing start-time order.
    pub fn replace(&self, mut next: Vec<Reservation>) {
        Self::sort(&mut next);
        *self
            .list
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
    }

    /// Current snapshot; stays consistent even while a writer replaces the
    /// list.
    pub fn snapshot(&self) -> Arc<Vec<Reservation>> {
        self.list
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // ── readers ──────────────────────────────────────────────────────

    /// Every reservation in start order.
    pub fn all(&self, limit: Option<usize>, offset: usize) -> (Vec<Reservation>, usize) {
        Self::page(self.snapshot().iter(), limit, offset)
    }

    /// Reservations that will actually be recorded: neither skipped nor in
    /// conflict.
    pub fn plain(&self, limit: Option<usize>, offset: usize) -> (Vec<Reservation>, usize) {
        let snapshot = self.snapshot();
        Self::page(
            snapshot.iter().filter(|r| !r.is_skip && !r.is_conflict),
            limit,
            offset,
        )
    }

    pub fn conflicts(&self, limit: Option<usize>, offset: usize) -> (Vec<Reservation>, usize) {
        let snapshot = self.snapshot();
        Self::page(snapshot.iter().filter(|r| r.is_conflict), limit, offset)
    }

    pub fn skips(&self, limit: Option<usize>, offset: usize) -> (Vec<Reservation>, usize) {
        let snapshot = self.snapshot();
        Self::page(snapshot.iter().filter(|r| r.is_skip), limit, offset)
    }

    pub fn by_program_id(&self, id: ProgramId) -> Option<Reservation> {
        self.snapshot()
            .iter()
            .find(|r| r.program.id == id)
            .cloned()
    }

    /// Slices a filtered sequence: without `limit` the whole sequence is
    /// returned and `offset` is not applied; with it, `sequence[offset ..
    /// offset + limit]`. The second element is the length before slicing.
    fn page<'a>(
        sequence: impl Iterator<Item = &'a Reservation>,
        limit: Option<usize>,
        offset: usize,
    ) -> (Vec<Reservation>, usize) {
        let filtered: Vec<&Reservation> = sequence.collect();
        let total = filtered.len();
        let sliced = match limit {
            Some(limit) => filtered
                .into_iter()
                .skip(offset)
                .take(limit)
                .cloned()
                .collect(),
            None => filtered.into_iter().cloned().collect(),
        };
        (sliced, total)
    }

    fn sort(list: &mut [Reservation]) {
        list.sort_by_key(|r| (r.program.start_at, r.program.id));
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
