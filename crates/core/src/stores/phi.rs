//! File-backed PHI document collection.
//!
//! Each document is a JSON file stored under a sharded directory derived from its id:
//!
//! ```text
//! <data_dir>/phi/<s1>/<s2>/<id>/phi.json
//! ```
//!
//! where `s1`/`s2` are the first two pairs of hex characters of the canonical id. Listing walks
//! the shard tree; unreadable or malformed documents are skipped with a warning so one bad file
//! never hides the rest of a caller's records.

use super::PhiStore;
use crate::constants::PHI_DOCUMENT_FILENAME;
use crate::phi::{NewPhiRecord, PhiRecord};
use crate::{ReferralError, ReferralResult};
use async_trait::async_trait;
use chrono::Utc;
use referra_uuid::RecordId;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

/// Attempts made to find an unused document directory before giving up.
const MAX_ALLOCATION_ATTEMPTS: usize = 5;

#[derive(Clone, Debug)]
pub struct FilePhiStore {
    root: PathBuf,
}

impl FilePhiStore {
    /// Opens (and creates if needed) a collection rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`ReferralError::StorageDirCreation`] if `root` cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> ReferralResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(ReferralError::StorageDirCreation)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, id: &RecordId) -> PathBuf {
        id.sharded_dir(&self.root).join(PHI_DOCUMENT_FILENAME)
    }

    fn insert_blocking(&self, new: NewPhiRecord) -> ReferralResult<PhiRecord> {
        let (id, dir) = allocate_document_dir(&self.root, RecordId::new)?;
        let record = PhiRecord::from_new(id, new, Utc::now());

        let json = serde_json::to_string_pretty(&record).map_err(ReferralError::Serialization)?;
        if let Err(e) = fs::write(dir.join(PHI_DOCUMENT_FILENAME), json) {
            // Leave no empty directory behind for a document that was never written.
            let _ = fs::remove_dir_all(&dir);
            return Err(ReferralError::FileWrite(e));
        }

        tracing::debug!("stored PHI document {}", record.id);
        Ok(record)
    }

    fn get_blocking(&self, id: &RecordId) -> ReferralResult<Option<PhiRecord>> {
        let path = self.document_path(id);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ReferralError::FileRead(e)),
        };

        let record: PhiRecord =
            serde_json::from_str(&contents).map_err(ReferralError::Deserialization)?;
        Ok(Some(record))
    }

    /// Every document is read and parsed, then filtered by owner, so the cost grows with the
    /// whole collection rather than with one owner's records.
    fn list_by_owner_blocking(&self, owner_id: &str) -> ReferralResult<Vec<PhiRecord>> {
        let mut records: Vec<PhiRecord> = walk_documents(&self.root)?
            .into_iter()
            .filter(|record| record.owner_id == owner_id)
            .collect();

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(records)
    }

    fn delete_blocking(&self, id: &RecordId) -> ReferralResult<bool> {
        let dir = id.sharded_dir(&self.root);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                tracing::info!("removed PHI document {}", id);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ReferralError::FileRemove(e)),
        }
    }
}

#[async_trait]
impl PhiStore for FilePhiStore {
    async fn insert(&self, new: NewPhiRecord) -> ReferralResult<PhiRecord> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.insert_blocking(new)).await?
    }

    async fn get(&self, id: &RecordId) -> ReferralResult<Option<PhiRecord>> {
        let store = self.clone();
        let id = *id;
        tokio::task::spawn_blocking(move || store.get_blocking(&id)).await?
    }

    async fn list_by_owner(&self, owner_id: &str) -> ReferralResult<Vec<PhiRecord>> {
        let store = self.clone();
        let owner_id = owner_id.to_owned();
        tokio::task::spawn_blocking(move || store.list_by_owner_blocking(&owner_id)).await?
    }

    async fn delete(&self, id: &RecordId) -> ReferralResult<bool> {
        let store = self.clone();
        let id = *id;
        tokio::task::spawn_blocking(move || store.delete_blocking(&id)).await?
    }

    async fn ping(&self) -> ReferralResult<()> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || {
            if root.is_dir() {
                Ok(())
            } else {
                Err(ReferralError::Backend(format!(
                    "PHI collection directory missing: {}",
                    root.display()
                )))
            }
        })
        .await?
    }
}

/// Allocates a fresh id and creates its sharded directory.
///
/// Ids come from `id_source`; a candidate whose directory already exists is skipped.
///
/// # Errors
///
/// Returns [`ReferralError::StorageDirCreation`] if directory creation fails, or if no unused
/// directory was found after five attempts.
fn allocate_document_dir(
    root: &Path,
    mut id_source: impl FnMut() -> RecordId,
) -> ReferralResult<(RecordId, PathBuf)> {
    for _attempt in 0..MAX_ALLOCATION_ATTEMPTS {
        let id = id_source();
        let candidate = id.sharded_dir(root);

        if candidate.exists() {
            continue;
        }

        if let Some(parent) = candidate.parent() {
            fs::create_dir_all(parent).map_err(ReferralError::StorageDirCreation)?;
        }

        match fs::create_dir(&candidate) {
            Ok(()) => return Ok((id, candidate)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(ReferralError::StorageDirCreation(e)),
        }
    }

    Err(ReferralError::StorageDirCreation(io::Error::new(
        ErrorKind::AlreadyExists,
        "failed to allocate a unique PHI document directory after 5 attempts",
    )))
}

/// Reads every parseable document under the shard tree rooted at `root`.
///
/// Unreadable shard directories and documents are skipped with a warning.
///
/// # Errors
///
/// Returns [`ReferralError::FileRead`] if `root` itself cannot be read.
fn walk_documents(root: &Path) -> ReferralResult<Vec<PhiRecord>> {
    let mut records = Vec::new();

    let s1_iter = fs::read_dir(root).map_err(ReferralError::FileRead)?;

    for s1 in s1_iter.flatten() {
        let s1_path = s1.path();
        if !s1_path.is_dir() {
            continue;
        }

        let s2_iter = match fs::read_dir(&s1_path) {
            Ok(it) => it,
            Err(_) => continue,
        };

        for s2 in s2_iter.flatten() {
            let s2_path = s2.path();
            if !s2_path.is_dir() {
                continue;
            }

            let id_iter = match fs::read_dir(&s2_path) {
                Ok(it) => it,
                Err(_) => continue,
            };

            for id_ent in id_iter.flatten() {
                let document_path = id_ent.path().join(PHI_DOCUMENT_FILENAME);
                if !document_path.is_file() {
                    continue;
                }

                let contents = match fs::read_to_string(&document_path) {
                    Ok(contents) => contents,
                    Err(e) => {
                        tracing::warn!(
                            "failed to read PHI document: {} - {}",
                            document_path.display(),
                            e
                        );
                        continue;
                    }
                };

                match serde_json::from_str::<PhiRecord>(&contents) {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        tracing::warn!(
                            "failed to parse PHI document: {} - {}",
                            document_path.display(),
                            e
                        );
                    }
                }
            }
        }
    }

    Ok(records)
}
