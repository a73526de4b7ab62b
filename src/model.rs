//! Core record types for the quire library.
//!
//! A library holds two persisted record collections: [`StoredFile`] metadata
//! (one per imported document, identified by [`FileId`]) and [`ReadingProgress`]
//! (at most one per file). Everything else, including the folder tree and the
//! open book, is derived from these.

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// MIME type recorded for imported PDFs.
pub const PDF_MIME: &str = "application/pdf";

/// Unique, niche-optimized identifier for a stored file.
///
/// Uses `NonZeroU64` so that `Option<FileId>` is the same size as `FileId`
/// (the niche optimization lets the compiler use 0 as the `None` discriminant).
/// Ids are never reused within a library, even after deletes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct FileId(NonZeroU64);

impl FileId {
    /// Create a `FileId` from a raw `u64`.
    ///
    /// Returns `None` if `raw` is zero.
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(FileId)
    }

    /// Get the underlying `u64` value.
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "file:{}", self.0)
    }
}

/// Milliseconds since the UNIX epoch.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Case-insensitive `.pdf` extension check used by the import filter.
pub fn is_pdf_path(path: &str) -> bool {
    std::path::Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// Metadata for one imported document.
///
/// The document bytes are persisted separately under the same id; records are
/// created on import, deleted by id, and never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    /// Unique identifier, never reused.
    pub id: FileId,
    /// Display name (the original filename).
    pub name: String,
    /// MIME type of the stored content.
    pub mime_type: String,
    /// Size of the stored content in bytes.
    pub size_bytes: u64,
    /// When this file was imported (milliseconds since UNIX epoch).
    pub created_at: u64,
    /// `/`-delimited relative path placing the file in the library tree.
    /// Equal to `name` for flat imports.
    pub path: String,
}

impl StoredFile {
    /// Create a new record with the current timestamp and the PDF MIME type.
    pub fn new(id: FileId, name: impl Into<String>, path: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            id,
            name: name.into(),
            mime_type: PDF_MIME.to_string(),
            size_bytes,
            created_at: now_ms(),
            path: path.into(),
        }
    }
}

/// Last-read position for one file. At most one record per file id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingProgress {
    /// The file this progress belongs to.
    pub file_id: FileId,
    /// Last page the reader was on, 1-based.
    pub last_page: u32,
    /// Total page count, when known.
    pub total_pages: Option<u32>,
    /// When this position was recorded (milliseconds since UNIX epoch).
    pub last_read_at: u64,
}

impl ReadingProgress {
    /// Create a progress record for the current moment. Pages below 1 clamp to 1.
    pub fn new(file_id: FileId, last_page: u32, total_pages: Option<u32>) -> Self {
        Self::recorded_at(file_id, last_page, total_pages, now_ms())
    }

    /// Create a progress record with an explicit timestamp.
    pub fn recorded_at(
        file_id: FileId,
        last_page: u32,
        total_pages: Option<u32>,
        last_read_at: u64,
    ) -> Self {
        Self {
            file_id,
            last_page: last_page.max(1),
            total_pages,
            last_read_at,
        }
    }

    /// Whether this record should replace `other` for the same file.
    ///
    /// The store itself is last-write-wins; this guard protects the in-memory
    /// mirror from a slow completion clobbering a newer position. Equal
    /// timestamps accept the incoming record.
    pub fn supersedes(&self, other: &ReadingProgress) -> bool {
        self.last_read_at >= other.last_read_at
    }
}

/// Thread-safe file ID allocator.
///
/// Produces monotonically increasing ids starting from 1. The store seeds it
/// past the highest persisted id on open so ids stay unique across sessions.
#[derive(Debug)]
pub struct FileIdAllocator {
    next: AtomicU64,
}

impl FileIdAllocator {
    /// Create a new allocator that starts from ID 1.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Create an allocator that resumes from a given ID.
    pub fn starting_from(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start.max(1)),
        }
    }

    /// Allocate the next file ID.
    ///
    /// Returns an error if the ID space is exhausted (after 2^64 - 1 allocations).
    pub fn next_id(&self) -> Result<FileId, StoreError> {
        let raw = self.next.fetch_add(1, Ordering::Relaxed);
        FileId::new(raw).ok_or(StoreError::IdsExhausted)
    }

    /// Return the next ID that *would* be allocated, without consuming it.
    pub fn peek_next(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }

    /// Reset the counter to an arbitrary raw value, including 0.
    #[cfg(test)]
    pub(crate) fn set_next(&self, raw: u64) {
        self.next.store(raw, Ordering::Relaxed);
    }
}

impl Default for FileIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_id_niche_optimization() {
        // Option<FileId> should be the same size as FileId thanks to NonZeroU64.
        assert_eq!(
            std::mem::size_of::<Option<FileId>>(),
            std::mem::size_of::<FileId>()
        );
    }

    #[test]
    fn file_id_zero_is_none() {
        assert!(FileId::new(0).is_none());
        assert!(FileId::new(1).is_some());
        assert_eq!(FileId::new(42).unwrap().get(), 42);
    }

    #[test]
    fn file_id_display() {
        let id = FileId::new(7).unwrap();
        assert_eq!(id.to_string(), "file:7");
    }

    #[test]
    fn allocator_produces_sequential_ids() {
        let alloc = FileIdAllocator::new();
        let a = alloc.next_id().unwrap();
        let b = alloc.next_id().unwrap();
        let c = alloc.next_id().unwrap();
        assert_eq!(a.get(), 1);
        assert_eq!(b.get(), 2);
        assert_eq!(c.get(), 3);
    }

    #[test]
    fn allocator_starting_from() {
        let alloc = FileIdAllocator::starting_from(100);
        assert_eq!(alloc.next_id().unwrap().get(), 100);
        assert_eq!(alloc.next_id().unwrap().get(), 101);
    }

    #[test]
    fn allocator_starting_from_zero_clamps_to_one() {
        let alloc = FileIdAllocator::starting_from(0);
        assert_eq!(alloc.next_id().unwrap().get(), 1);
    }

    #[test]
    fn stored_file_records_size_and_path() {
        let id = FileId::new(1).unwrap();
        let file = StoredFile::new(id, "b.pdf", "Docs/b.pdf", 1024);
        assert_eq!(file.name, "b.pdf");
        assert_eq!(file.path, "Docs/b.pdf");
        assert_eq!(file.size_bytes, 1024);
        assert_eq!(file.mime_type, PDF_MIME);
        assert!(file.created_at > 0);
    }

    #[test]
    fn progress_clamps_page_to_one() {
        let id = FileId::new(1).unwrap();
        let p = ReadingProgress::new(id, 0, None);
        assert_eq!(p.last_page, 1);
    }

    #[test]
    fn progress_recorded_at_keeps_the_given_timestamp() {
        let id = FileId::new(1).unwrap();
        let p = ReadingProgress::recorded_at(id, 0, Some(4), 1_234);
        assert_eq!(p.last_page, 1);
        assert_eq!(p.last_read_at, 1_234);
    }

    #[test]
    fn progress_supersedes_by_timestamp() {
        let id = FileId::new(1).unwrap();
        let older = ReadingProgress {
            file_id: id,
            last_page: 3,
            total_pages: Some(10),
            last_read_at: 1_000,
        };
        let newer = ReadingProgress {
            file_id: id,
            last_page: 5,
            total_pages: Some(10),
            last_read_at: 2_000,
        };
        assert!(newer.supersedes(&older));
        assert!(!older.supersedes(&newer));
        // Equal timestamps accept the incoming record.
        assert!(newer.supersedes(&newer.clone()));
    }

    #[test]
    fn pdf_path_detection() {
        assert!(is_pdf_path("a.pdf"));
        assert!(is_pdf_path("Docs/Sub/c.PDF"));
        assert!(!is_pdf_path("notes.txt"));
        assert!(!is_pdf_path("pdf"));
        assert!(!is_pdf_path("archive.pdf.gz"));
    }

    #[test]
    fn records_roundtrip_bincode() {
        let id = FileId::new(9).unwrap();
        let file = StoredFile::new(id, "x.pdf", "x.pdf", 10);
        let bytes = bincode::serialize(&file).unwrap();
        let back: StoredFile = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, file);

        let progress = ReadingProgress::new(id, 4, Some(12));
        let bytes = bincode::serialize(&progress).unwrap();
        let back: ReadingProgress = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, progress);
    }
}
