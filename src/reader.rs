//! Paged text extraction and the reading cursor.
//!
//! `pdf-extract` returns the whole document as one string; pages are split
//! back apart on the form feeds it inserts between them. The cursor is
//! 1-based and clamps at both ends, reporting whether a move actually
//! changed the page so the caller knows when to record progress.

use tracing::debug;

use crate::error::ReaderError;
use crate::model::{FileId, ReadingProgress, StoredFile};

/// Default wrapped-text column width.
pub const DEFAULT_COLUMN_WIDTH: u16 = 80;
/// Narrowest allowed column.
pub const MIN_COLUMN_WIDTH: u16 = 24;
/// Widest allowed column.
pub const MAX_COLUMN_WIDTH: u16 = 120;

const WIDTH_STEP: u16 = 4;

/// Extracted document text, split into pages.
pub struct PagedText {
    /// First plausible heading line, when one exists.
    pub title: Option<String>,
    pages: Vec<String>,
}

impl PagedText {
    /// Extract and paginate the text of a PDF.
    pub fn extract(bytes: &[u8]) -> Result<Self, ReaderError> {
        let text = pdf_extract::extract_text_from_mem(bytes).map_err(|e| ReaderError::Extract {
            message: e.to_string(),
        })?;

        if text.trim().is_empty() {
            return Err(ReaderError::EmptyDocument);
        }

        let pages = split_pages(&text);
        if pages.is_empty() {
            return Err(ReaderError::EmptyDocument);
        }

        debug!(pages = pages.len(), "extracted document text");
        Ok(Self {
            title: first_line_title(&text),
            pages,
        })
    }

    /// Text of one page, 1-based. `None` when out of range.
    pub fn page(&self, number: u32) -> Option<&str> {
        let index = number.checked_sub(1)? as usize;
        self.pages.get(index).map(|p| p.as_str())
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    #[cfg(test)]
    pub(crate) fn from_pages(pages: Vec<String>) -> Self {
        Self { title: None, pages }
    }
}

/// Split extracted text into pages.
///
/// pdf-extract inserts form feeds between pages; when none are present
/// (older extractor output), blank-line runs are the best available break.
/// Trailing blank pages are dropped, interior blanks keep their numbering.
fn split_pages(text: &str) -> Vec<String> {
    let raw: Vec<&str> = if text.contains('\x0C') {
        text.split('\x0C').collect()
    } else {
        text.split("\n\n\n").collect()
    };

    let mut pages: Vec<String> = raw
        .iter()
        .map(|p| p.trim_start_matches('\n').trim_end().to_string())
        .collect();
    while pages.last().is_some_and(|p| p.trim().is_empty()) {
        pages.pop();
    }
    pages
}

/// First non-empty line short enough to plausibly be a title.
fn first_line_title(text: &str) -> Option<String> {
    text.lines()
        .map(|l| l.trim())
        .find(|l| !l.is_empty() && l.len() < 200)
        .map(|s| s.to_string())
}

/// Greedy word-wrap of one page into display lines of at most `width` chars.
///
/// Blank lines survive as paragraph breaks; words wider than the column are
/// hard-split rather than overflowing it.
pub fn wrap_page(text: &str, width: u16) -> Vec<String> {
    let width = width.max(8) as usize;
    let mut out = Vec::new();

    for raw in text.lines() {
        let line = raw.trim_end();
        if line.trim().is_empty() {
            out.push(String::new());
            continue;
        }

        let mut current = String::new();
        let mut current_len = 0usize;
        for word in line.split_whitespace() {
            let word_len = word.chars().count();

            if current_len > 0 && current_len + 1 + word_len > width {
                out.push(std::mem::take(&mut current));
                current_len = 0;
            }

            if current_len == 0 && word_len > width {
                let mut chunk = String::new();
                let mut chunk_len = 0usize;
                for ch in word.chars() {
                    chunk.push(ch);
                    chunk_len += 1;
                    if chunk_len == width {
                        out.push(std::mem::take(&mut chunk));
                        chunk_len = 0;
                    }
                }
                current = chunk;
                current_len = chunk_len;
                continue;
            }

            if current_len == 0 {
                current.push_str(word);
                current_len = word_len;
            } else {
                current.push(' ');
                current.push_str(word);
                current_len += 1 + word_len;
            }
        }
        if current_len > 0 {
            out.push(current);
        }
    }
    out
}

/// The page cursor over one open document.
pub struct OpenBook {
    pub file_id: FileId,
    pub title: String,
    text: PagedText,
    current: u32,
    column_width: u16,
}

impl OpenBook {
    /// Open a book, positioned at the persisted last page when progress
    /// exists (clamped to the page count), else page 1.
    pub fn open(
        file: &StoredFile,
        text: PagedText,
        resume: Option<&ReadingProgress>,
        column_width: u16,
    ) -> Self {
        let count = text.page_count();
        let current = resume.map(|p| p.last_page.clamp(1, count)).unwrap_or(1);
        let title = text.title.clone().unwrap_or_else(|| file.name.clone());
        debug!(file = %file.id, pages = count, start = current, "opened book");
        Self {
            file_id: file.id,
            title,
            text,
            current,
            column_width: column_width.clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH),
        }
    }

    pub fn current_page(&self) -> u32 {
        self.current
    }

    pub fn page_count(&self) -> u32 {
        self.text.page_count()
    }

    /// Move to a page, clamped into range. Returns whether the page changed.
    pub fn goto(&mut self, page: u32) -> bool {
        let clamped = page.clamp(1, self.page_count());
        if clamped == self.current {
            return false;
        }
        self.current = clamped;
        true
    }

    pub fn next_page(&mut self) -> bool {
        self.goto(self.current.saturating_add(1))
    }

    pub fn prev_page(&mut self) -> bool {
        self.goto(self.current.saturating_sub(1))
    }

    pub fn first_page(&mut self) -> bool {
        self.goto(1)
    }

    pub fn last_page(&mut self) -> bool {
        self.goto(self.page_count())
    }

    /// Widen the text column (zoom out), up to [`MAX_COLUMN_WIDTH`].
    pub fn widen(&mut self) {
        self.column_width = (self.column_width + WIDTH_STEP).min(MAX_COLUMN_WIDTH);
    }

    /// Narrow the text column (zoom in), down to [`MIN_COLUMN_WIDTH`].
    pub fn narrow(&mut self) {
        self.column_width = self
            .column_width
            .saturating_sub(WIDTH_STEP)
            .max(MIN_COLUMN_WIDTH);
    }

    pub fn column_width(&self) -> u16 {
        self.column_width
    }

    /// Raw text of the current page.
    pub fn page_text(&self) -> &str {
        self.text.page(self.current).unwrap_or("")
    }

    /// Current page wrapped to the column width.
    pub fn display_lines(&self) -> Vec<String> {
        wrap_page(self.page_text(), self.column_width)
    }
}
