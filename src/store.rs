//! Persistent document store backed by redb.
//!
//! One database file, three tables, all keyed by file id: `files` holds
//! bincode-encoded metadata, `blobs` the raw document bytes, `progress` the
//! reading positions. All writes are transactional; deleting a file removes
//! its blob and progress in the same transaction.

use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::StoreError;
use crate::model::{FileId, FileIdAllocator, ReadingProgress, StoredFile};

/// File metadata records.
const FILES: TableDefinition<u64, &[u8]> = TableDefinition::new("files");
/// Raw document bytes, under the same id as the metadata.
const BLOBS: TableDefinition<u64, &[u8]> = TableDefinition::new("blobs");
/// Reading positions. At most one row per file.
const PROGRESS: TableDefinition<u64, &[u8]> = TableDefinition::new("progress");
/// Store bookkeeping. Holds the id high-water mark so ids are never reused,
/// even when the newest file is deleted before a restart.
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

const NEXT_ID_KEY: &str = "next_file_id";

/// Database filename inside the data directory.
const DB_FILE: &str = "quire.redb";

/// Document store with full ACID guarantees.
///
/// Reads use MVCC snapshots; a single process is assumed to be the sole
/// writer (redb enforces this at the file level).
pub struct ShelfStore {
    db: Database,
    allocator: FileIdAllocator,
}

fn redb<T, E: std::fmt::Display>(result: Result<T, E>, op: &str) -> Result<T, StoreError> {
    result.map_err(|e| StoreError::Redb {
        message: format!("{op} failed: {e}"),
    })
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    bincode::serialize(value).map_err(|e| StoreError::Serialization {
        message: e.to_string(),
    })
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization {
        message: e.to_string(),
    })
}

impl ShelfStore {
    /// Open or create a store in the given directory.
    ///
    /// Seeds the id allocator past the highest persisted id, so ids are never
    /// reused across sessions even after deletes.
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(data_dir).map_err(|e| StoreError::Io { source: e })?;
        let db_path = data_dir.join(DB_FILE);
        let db = Database::create(&db_path).map_err(|e| StoreError::Redb {
            message: format!("failed to open redb at {}: {e}", db_path.display()),
        })?;

        // Create the tables up front so first reads see empty tables rather
        // than missing ones.
        let txn = redb(db.begin_write(), "begin_write")?;
        {
            redb(txn.open_table(FILES), "open_table")?;
            redb(txn.open_table(BLOBS), "open_table")?;
            redb(txn.open_table(PROGRESS), "open_table")?;
            redb(txn.open_table(META), "open_table")?;
        }
        redb(txn.commit(), "commit")?;

        let next = {
            let txn = redb(db.begin_read(), "begin_read")?;
            let files = redb(txn.open_table(FILES), "open_table")?;
            let highest = redb(files.last(), "last")?
                .map(|(key, _)| key.value())
                .unwrap_or(0);
            let meta = redb(txn.open_table(META), "open_table")?;
            let persisted = redb(meta.get(NEXT_ID_KEY), "get")?
                .map(|guard| guard.value())
                .unwrap_or(1);
            persisted.max(highest + 1)
        };

        Ok(Self {
            db,
            allocator: FileIdAllocator::starting_from(next),
        })
    }

    /// Persist a new file record and its content, returning the record.
    pub fn save_file(&self, name: &str, path: &str, bytes: &[u8]) -> Result<StoredFile, StoreError> {
        let id = self.allocator.next_id()?;
        let record = StoredFile::new(id, name, path, bytes.len() as u64);
        let encoded = encode(&record)?;

        let txn = redb(self.db.begin_write(), "begin_write")?;
        {
            let mut files = redb(txn.open_table(FILES), "open_table")?;
            redb(files.insert(id.get(), encoded.as_slice()), "insert")?;
            let mut blobs = redb(txn.open_table(BLOBS), "open_table")?;
            redb(blobs.insert(id.get(), bytes), "insert")?;
            let mut meta = redb(txn.open_table(META), "open_table")?;
            redb(meta.insert(NEXT_ID_KEY, id.get() + 1), "insert")?;
        }
        redb(txn.commit(), "commit")?;

        debug!(file = %id, path, size = bytes.len(), "stored file");
        Ok(record)
    }

    /// All file records, ordered by creation time (ties broken by id).
    pub fn list_files(&self) -> Result<Vec<StoredFile>, StoreError> {
        let txn = redb(self.db.begin_read(), "begin_read")?;
        let table = redb(txn.open_table(FILES), "open_table")?;
        let mut out = Vec::new();
        for entry in redb(table.iter(), "iter")? {
            let (_, value) = redb(entry, "next entry")?;
            out.push(decode::<StoredFile>(value.value())?);
        }
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    /// Read one file record. Returns `Ok(None)` if the id is unknown.
    pub fn get_file(&self, id: FileId) -> Result<Option<StoredFile>, StoreError> {
        let txn = redb(self.db.begin_read(), "begin_read")?;
        let table = redb(txn.open_table(FILES), "open_table")?;
        let result = redb(table.get(id.get()), "get")?;
        result.map(|guard| decode(guard.value())).transpose()
    }

    /// Read a file's content bytes. Returns `Ok(None)` if the id is unknown.
    pub fn get_content(&self, id: FileId) -> Result<Option<Vec<u8>>, StoreError> {
        let txn = redb(self.db.begin_read(), "begin_read")?;
        let table = redb(txn.open_table(BLOBS), "open_table")?;
        let result = redb(table.get(id.get()), "get")?;
        Ok(result.map(|guard| guard.value().to_vec()))
    }

    /// Delete a file, its content, and any progress record in one transaction.
    ///
    /// Returns whether the file existed; deleting a missing id is not an error.
    pub fn delete_file(&self, id: FileId) -> Result<bool, StoreError> {
        let txn = redb(self.db.begin_write(), "begin_write")?;
        let existed = {
            let mut files = redb(txn.open_table(FILES), "open_table")?;
            let removed = redb(files.remove(id.get()), "remove")?.is_some();
            let mut blobs = redb(txn.open_table(BLOBS), "open_table")?;
            redb(blobs.remove(id.get()), "remove")?;
            let mut progress = redb(txn.open_table(PROGRESS), "open_table")?;
            redb(progress.remove(id.get()), "remove")?;
            removed
        };
        redb(txn.commit(), "commit")?;

        debug!(file = %id, existed, "deleted file");
        Ok(existed)
    }

    /// Write a progress record, replacing any previous one for that file.
    pub fn upsert_progress(&self, progress: &ReadingProgress) -> Result<(), StoreError> {
        let encoded = encode(progress)?;
        let txn = redb(self.db.begin_write(), "begin_write")?;
        {
            let mut table = redb(txn.open_table(PROGRESS), "open_table")?;
            redb(
                table.insert(progress.file_id.get(), encoded.as_slice()),
                "insert",
            )?;
        }
        redb(txn.commit(), "commit")?;
        Ok(())
    }

    /// Read the progress record for one file, if any.
    pub fn get_progress(&self, id: FileId) -> Result<Option<ReadingProgress>, StoreError> {
        let txn = redb(self.db.begin_read(), "begin_read")?;
        let table = redb(txn.open_table(PROGRESS), "open_table")?;
        let result = redb(table.get(id.get()), "get")?;
        result.map(|guard| decode(guard.value())).transpose()
    }

    /// All progress records, most recently read first.
    pub fn list_progress(&self) -> Result<Vec<ReadingProgress>, StoreError> {
        let txn = redb(self.db.begin_read(), "begin_read")?;
        let table = redb(txn.open_table(PROGRESS), "open_table")?;
        let mut out = Vec::new();
        for entry in redb(table.iter(), "iter")? {
            let (_, value) = redb(entry, "next entry")?;
            out.push(decode::<ReadingProgress>(value.value())?);
        }
        out.sort_by(|a, b| {
            b.last_read_at
                .cmp(&a.last_read_at)
                .then(a.file_id.cmp(&b.file_id))
        });
        Ok(out)
    }

    /// Point the id allocator at a raw counter value.
    #[cfg(test)]
    pub(crate) fn set_next_id(&self, raw: u64) {
        self.allocator.set_next(raw);
    }
}

impl std::fmt::Debug for ShelfStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShelfStore")
            .field("next_id", &self.allocator.peek_next())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_and_get_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = ShelfStore::open(dir.path()).unwrap();

        let record = store.save_file("a.pdf", "a.pdf", b"%PDF-1.4 fake").unwrap();
        assert_eq!(record.name, "a.pdf");
        assert_eq!(record.size_bytes, 13);

        let loaded = store.get_file(record.id).unwrap().unwrap();
        assert_eq!(loaded, record);

        let content = store.get_content(record.id).unwrap().unwrap();
        assert_eq!(content, b"%PDF-1.4 fake");
    }

    #[test]
    fn get_missing_returns_none() {
        let dir = TempDir::new().unwrap();
        let store = ShelfStore::open(dir.path()).unwrap();
        let id = FileId::new(99).unwrap();
        assert!(store.get_file(id).unwrap().is_none());
        assert!(store.get_content(id).unwrap().is_none());
        assert!(store.get_progress(id).unwrap().is_none());
    }

    #[test]
    fn list_files_ordered_by_creation() {
        let dir = TempDir::new().unwrap();
        let store = ShelfStore::open(dir.path()).unwrap();

        store.save_file("first.pdf", "first.pdf", b"1").unwrap();
        store.save_file("second.pdf", "second.pdf", b"2").unwrap();
        store.save_file("third.pdf", "third.pdf", b"3").unwrap();

        let names: Vec<String> = store
            .list_files()
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["first.pdf", "second.pdf", "third.pdf"]);
    }

    #[test]
    fn delete_cascades_to_blob_and_progress() {
        let dir = TempDir::new().unwrap();
        let store = ShelfStore::open(dir.path()).unwrap();

        let record = store.save_file("a.pdf", "a.pdf", b"data").unwrap();
        store
            .upsert_progress(&ReadingProgress::new(record.id, 3, Some(10)))
            .unwrap();

        assert!(store.delete_file(record.id).unwrap());
        assert!(store.get_file(record.id).unwrap().is_none());
        assert!(store.get_content(record.id).unwrap().is_none());
        assert!(store.get_progress(record.id).unwrap().is_none());

        // Second delete of the same id is a no-op, not an error.
        assert!(!store.delete_file(record.id).unwrap());
    }

    #[test]
    fn upsert_replaces_single_record() {
        let dir = TempDir::new().unwrap();
        let store = ShelfStore::open(dir.path()).unwrap();
        let record = store.save_file("a.pdf", "a.pdf", b"data").unwrap();

        store
            .upsert_progress(&ReadingProgress::new(record.id, 2, Some(10)))
            .unwrap();
        store
            .upsert_progress(&ReadingProgress::new(record.id, 7, Some(10)))
            .unwrap();

        let all = store.list_progress().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].last_page, 7);
    }

    #[test]
    fn list_progress_most_recent_first() {
        let dir = TempDir::new().unwrap();
        let store = ShelfStore::open(dir.path()).unwrap();

        let older = ReadingProgress {
            file_id: FileId::new(1).unwrap(),
            last_page: 4,
            total_pages: None,
            last_read_at: 1_000,
        };
        let newer = ReadingProgress {
            file_id: FileId::new(2).unwrap(),
            last_page: 9,
            total_pages: None,
            last_read_at: 2_000,
        };
        store.upsert_progress(&older).unwrap();
        store.upsert_progress(&newer).unwrap();

        let all = store.list_progress().unwrap();
        assert_eq!(all[0].file_id.get(), 2);
        assert_eq!(all[1].file_id.get(), 1);
    }

    #[test]
    fn persistence_across_reopens() {
        let dir = TempDir::new().unwrap();

        let first_id = {
            let store = ShelfStore::open(dir.path()).unwrap();
            store.save_file("keep.pdf", "keep.pdf", b"kept").unwrap().id
        };

        let store = ShelfStore::open(dir.path()).unwrap();
        let files = store.list_files().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].id, first_id);

        // Allocator resumes past the persisted maximum.
        let next = store.save_file("new.pdf", "new.pdf", b"new").unwrap();
        assert!(next.id.get() > first_id.get());
    }

    #[test]
    fn save_fails_cleanly_when_ids_run_out() {
        let dir = TempDir::new().unwrap();
        let store = ShelfStore::open(dir.path()).unwrap();

        // Raw id 0 is never allocatable.
        store.set_next_id(0);
        assert!(matches!(
            store.save_file("a.pdf", "a.pdf", b"a"),
            Err(StoreError::IdsExhausted)
        ));

        // The failed save leaves no partial record behind.
        assert!(store.list_files().unwrap().is_empty());
    }

    #[test]
    fn ids_never_reused_after_delete_and_reopen() {
        let dir = TempDir::new().unwrap();

        let first = {
            let store = ShelfStore::open(dir.path()).unwrap();
            let first = store.save_file("a.pdf", "a.pdf", b"a").unwrap();
            // Deleting the newest file must not free its id for reuse.
            store.delete_file(first.id).unwrap();
            first
        };

        let store = ShelfStore::open(dir.path()).unwrap();
        let second = store.save_file("b.pdf", "b.pdf", b"b").unwrap();
        assert!(second.id.get() > first.id.get());
    }
}
