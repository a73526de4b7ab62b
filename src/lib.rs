//! # quire
//!
//! A terminal PDF library and reader with an AI reading assistant.
//!
//! ## Architecture
//!
//! - **Records** (`model`): file and reading-progress records, niche-packed ids
//! - **Store** (`store`): redb-backed persistence, transactional, ids never reused
//! - **Shell** (`shell`): the library facade over store plus in-memory mirrors
//! - **Tree** (`tree`): the folder forest projected from flat file paths
//! - **Reader** (`reader`): page-split text extraction and the open-book cursor
//! - **Assistant** (`assistant`): blocking Ollama client, never-throws `ask`
//! - **TUI** (`tui`): three-pane ratatui app (sidebar, page view, chat)
//!
//! ## Library usage
//!
//! ```no_run
//! use quire::shell::Library;
//!
//! let mut library = Library::open(std::path::Path::new("/tmp/quire-data")).unwrap();
//! let report = library.import_path(std::path::Path::new("paper.pdf")).unwrap();
//! for file in &report.imported {
//!     println!("{}: {}", file.id, file.path);
//! }
//! for node in library.tree() {
//!     println!("{}", node.path());
//! }
//! ```

pub mod assistant;
pub mod chat;
pub mod config;
pub mod error;
pub mod model;
pub mod paths;
pub mod reader;
pub mod shell;
pub mod store;
pub mod tree;
pub mod tui;
