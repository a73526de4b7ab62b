//! Rich diagnostic error types for the quire library core.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the quire library core.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, source spans) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum QuireError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Shelf(#[from] ShelfError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Reader(#[from] ReaderError),
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error: {source}")]
    #[diagnostic(
        code(quire::store::io),
        help(
            "A filesystem operation failed. Check that the data directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("redb transaction error: {message}")]
    #[diagnostic(
        code(quire::store::redb),
        help(
            "The embedded database encountered a transaction error. \
             This may indicate corruption; try running with a fresh data directory. \
             If the problem persists, file a bug report."
        )
    )]
    Redb { message: String },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(quire::store::serde),
        help(
            "Failed to serialize or deserialize a stored record. \
             This usually means the stored data format has changed between versions. \
             Try re-importing your documents."
        )
    )]
    Serialization { message: String },

    #[error("file id space exhausted: cannot allocate more than u64::MAX ids")]
    #[diagnostic(
        code(quire::store::ids_exhausted),
        help(
            "The file ID space is exhausted. This is extremely unlikely in \
             practice (requires 2^64 imports). If you see this error, check \
             for an import loop."
        )
    )]
    IdsExhausted,
}

// ---------------------------------------------------------------------------
// Shelf errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ShelfError {
    #[error("no such file in the library: {id}")]
    #[diagnostic(
        code(quire::shelf::not_found),
        help("List known files with `quire list` and use the numeric id shown there.")
    )]
    FileNotFound { id: u64 },

    #[error("import path does not exist: {path}")]
    #[diagnostic(
        code(quire::shelf::missing),
        help("Check the path for typos. Both files and directories can be imported.")
    )]
    Missing { path: String },

    #[error("failed to read {path}")]
    #[diagnostic(
        code(quire::shelf::read),
        help("Check that the file exists and you have read permissions.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Reader errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ReaderError {
    #[error("failed to extract text: {message}")]
    #[diagnostic(
        code(quire::reader::extract),
        help(
            "The document could not be parsed as a PDF. It may be corrupt, \
             encrypted, or scanned images without a text layer."
        )
    )]
    Extract { message: String },

    #[error("document contains no extractable text")]
    #[diagnostic(
        code(quire::reader::empty),
        help(
            "The PDF parsed but produced no text. Scanned documents without \
             an OCR text layer cannot be displayed."
        )
    )]
    EmptyDocument,
}

/// Convenience alias for functions returning quire results.
pub type QuireResult<T> = std::result::Result<T, QuireError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_converts_to_quire_error() {
        let err = StoreError::Serialization {
            message: "truncated record".into(),
        };
        let quire: QuireError = err.into();
        assert!(matches!(
            quire,
            QuireError::Store(StoreError::Serialization { .. })
        ));
    }

    #[test]
    fn shelf_error_wraps_store_error() {
        let store_err = StoreError::IdsExhausted;
        let shelf_err: ShelfError = store_err.into();
        assert!(matches!(shelf_err, ShelfError::Store(StoreError::IdsExhausted)));
    }

    #[test]
    fn reader_error_converts_to_quire_error() {
        let err = ReaderError::EmptyDocument;
        let quire: QuireError = err.into();
        assert!(matches!(quire, QuireError::Reader(ReaderError::EmptyDocument)));
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = ShelfError::FileNotFound { id: 42 };
        let msg = format!("{err}");
        assert!(msg.contains("42"));
    }
}
