//! Library facade: the one object the CLI and TUI talk to.
//!
//! Wraps the store with in-memory mirrors of the file and progress records so
//! reads (tree builds, sidebar refreshes, stats) never touch the database.
//! Mirrors are loaded once on open and updated in step with every successful
//! write; the store stays the source of truth across restarts.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{QuireResult, ShelfError};
use crate::model::{FileId, ReadingProgress, StoredFile, is_pdf_path, now_ms};
use crate::reader::{OpenBook, PagedText};
use crate::store::ShelfStore;
use crate::tree::{self, TreeNode};

/// Outcome of an import: what landed, what was passed over, what broke.
#[derive(Debug, Default)]
pub struct ImportReport {
    /// Records created, in import order.
    pub imported: Vec<StoredFile>,
    /// Entries skipped because they are not PDFs.
    pub skipped: usize,
    /// Entries that could not be read.
    pub failed: usize,
}

impl ImportReport {
    pub fn merge(&mut self, other: ImportReport) {
        self.imported.extend(other.imported);
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Aggregate numbers shown by `quire info` and the TUI header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LibraryStats {
    pub files: usize,
    pub folders: usize,
    pub total_bytes: u64,
    pub progress_records: usize,
}

/// The document library: persistent store plus live mirrors.
#[derive(Debug)]
pub struct Library {
    store: ShelfStore,
    files: Vec<StoredFile>,
    progress: HashMap<FileId, ReadingProgress>,
}

impl Library {
    /// Open the library in `data_dir`, loading the mirrors from the store.
    pub fn open(data_dir: &Path) -> Result<Self, ShelfError> {
        let store = ShelfStore::open(data_dir)?;
        let files = store.list_files()?;
        let progress: HashMap<FileId, ReadingProgress> = store
            .list_progress()?
            .into_iter()
            .map(|p| (p.file_id, p))
            .collect();
        debug!(
            files = files.len(),
            progress = progress.len(),
            "opened library"
        );
        Ok(Self {
            store,
            files,
            progress,
        })
    }

    /// All file records, ordered by creation time.
    pub fn files(&self) -> &[StoredFile] {
        &self.files
    }

    /// Look up one file record by id.
    pub fn file(&self, id: FileId) -> Option<&StoredFile> {
        self.files.iter().find(|f| f.id == id)
    }

    /// Import a file or a directory. Missing paths are an error; everything
    /// else is reported per entry.
    pub fn import_path(&mut self, path: &Path) -> Result<ImportReport, ShelfError> {
        if !path.exists() {
            return Err(ShelfError::Missing {
                path: path.display().to_string(),
            });
        }
        if path.is_dir() {
            self.import_dir(path)
        } else {
            let mut report = ImportReport::default();
            match self.import_file(path)? {
                Some(record) => report.imported.push(record),
                None => report.skipped += 1,
            }
            Ok(report)
        }
    }

    /// Import a single file at the library root.
    ///
    /// Returns `Ok(None)` when the file is not a PDF.
    pub fn import_file(&mut self, path: &Path) -> Result<Option<StoredFile>, ShelfError> {
        let name = match path.file_name() {
            Some(n) => n.to_string_lossy().to_string(),
            None => path.display().to_string(),
        };
        if !is_pdf_path(&name) {
            warn!(path = %path.display(), "not a PDF, skipping");
            return Ok(None);
        }
        let bytes = std::fs::read(path).map_err(|e| ShelfError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let record = self.store.save_file(&name, &name, &bytes)?;
        info!(file = %record.id, name = %record.name, "imported");
        self.files.push(record.clone());
        Ok(Some(record))
    }

    /// Recursively import every PDF under `dir`.
    ///
    /// Library paths are the directory's own name plus the path inside it, so
    /// importing `~/Papers` with `Sub/b.pdf` inside yields `Papers/Sub/b.pdf`.
    /// Entries that cannot be walked, read, or stored are logged and counted;
    /// the rest of the walk still imports.
    pub fn import_dir(&mut self, dir: &Path) -> Result<ImportReport, ShelfError> {
        let base = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut report = ImportReport::default();
        // Sorted traversal keeps id assignment stable for the same directory.
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "cannot walk entry, skipping");
                    report.failed += 1;
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if !is_pdf_path(&name) {
                report.skipped += 1;
                continue;
            }
            let bytes = match std::fs::read(entry.path()) {
                Ok(b) => b,
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "cannot read file, skipping");
                    report.failed += 1;
                    continue;
                }
            };

            let rel = entry.path().strip_prefix(dir).unwrap_or(entry.path());
            let mut segs: Vec<String> = Vec::new();
            if !base.is_empty() {
                segs.push(base.clone());
            }
            for comp in rel.components() {
                segs.push(comp.as_os_str().to_string_lossy().to_string());
            }
            let lib_path = segs.join("/");

            let record = match self.store.save_file(&name, &lib_path, &bytes) {
                Ok(r) => r,
                Err(e) => {
                    warn!(path = %lib_path, error = %e, "cannot store file, skipping");
                    report.failed += 1;
                    continue;
                }
            };
            info!(file = %record.id, path = %record.path, "imported");
            self.files.push(record.clone());
            report.imported.push(record);
        }
        Ok(report)
    }

    /// Delete one file and everything stored under its id.
    ///
    /// Returns whether the file existed.
    pub fn delete_file(&mut self, id: FileId) -> Result<bool, ShelfError> {
        let existed = self.store.delete_file(id)?;
        if existed {
            self.files.retain(|f| f.id != id);
            self.progress.remove(&id);
        }
        Ok(existed)
    }

    /// Delete every file at or under a folder path, returning how many went.
    ///
    /// Each file is its own transaction; a failure on one is logged and the
    /// rest still go. The folder itself vanishes from the tree once its last
    /// file is gone.
    pub fn delete_folder(&mut self, folder_path: &str) -> usize {
        let folder = tree::normalize_path(folder_path);
        let ids: Vec<FileId> = tree::files_under(&self.files, &folder)
            .iter()
            .map(|f| f.id)
            .collect();

        let mut deleted = 0;
        for id in ids {
            match self.delete_file(id) {
                Ok(true) => deleted += 1,
                Ok(false) => {}
                Err(e) => warn!(file = %id, error = %e, "delete failed, continuing"),
            }
        }
        info!(folder = %folder, deleted, "deleted folder");
        deleted
    }

    /// Record that the reader is on `page` of file `id`.
    ///
    /// The store write is last-write-wins; the mirror additionally refuses to
    /// step backwards in time, so a slow write completing late cannot clobber
    /// a newer position on screen.
    pub fn record_page(
        &mut self,
        id: FileId,
        page: u32,
        total_pages: Option<u32>,
    ) -> Result<ReadingProgress, ShelfError> {
        self.record_page_at(id, page, total_pages, now_ms())
    }

    /// `record_page` with an explicit timestamp.
    pub(crate) fn record_page_at(
        &mut self,
        id: FileId,
        page: u32,
        total_pages: Option<u32>,
        at_ms: u64,
    ) -> Result<ReadingProgress, ShelfError> {
        if self.file(id).is_none() {
            return Err(ShelfError::FileNotFound { id: id.get() });
        }
        let record = ReadingProgress::recorded_at(id, page, total_pages, at_ms);
        self.store.upsert_progress(&record)?;
        match self.progress.get(&id) {
            Some(existing) if !record.supersedes(existing) => {
                debug!(file = %id, "stale progress ignored by mirror");
            }
            _ => {
                self.progress.insert(id, record.clone());
            }
        }
        Ok(record)
    }

    /// Last-read position for one file, if any.
    pub fn progress_for(&self, id: FileId) -> Option<&ReadingProgress> {
        self.progress.get(&id)
    }

    /// All progress records, most recently read first.
    pub fn recent_progress(&self) -> Vec<&ReadingProgress> {
        let mut all: Vec<&ReadingProgress> = self.progress.values().collect();
        all.sort_by(|a, b| {
            b.last_read_at
                .cmp(&a.last_read_at)
                .then(a.file_id.cmp(&b.file_id))
        });
        all
    }

    /// The stored bytes for one file.
    pub fn content(&self, id: FileId) -> Result<Vec<u8>, ShelfError> {
        self.store
            .get_content(id)?
            .ok_or(ShelfError::FileNotFound { id: id.get() })
    }

    /// Project the current records into the folder tree.
    pub fn tree(&self) -> Vec<TreeNode> {
        tree::build_tree(&self.files)
    }

    /// Aggregate library numbers.
    pub fn stats(&self) -> LibraryStats {
        LibraryStats {
            files: self.files.len(),
            folders: tree::count_folders(&self.tree()),
            total_bytes: self.files.iter().map(|f| f.size_bytes).sum(),
            progress_records: self.progress.len(),
        }
    }

    /// Extract a file's text and open it at the saved position.
    pub fn open_book(&self, id: FileId, column_width: u16) -> QuireResult<OpenBook> {
        let file = self
            .file(id)
            .ok_or(ShelfError::FileNotFound { id: id.get() })?;
        let bytes = self.content(id)?;
        let text = PagedText::extract(&bytes)?;
        Ok(OpenBook::open(
            file,
            text,
            self.progress.get(&id),
            column_width,
        ))
    }
}

/// Render a byte count for humans, 1024-based.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
