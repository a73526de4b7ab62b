//! Three-pane reading TUI: library sidebar, page view, assistant chat.
//!
//! One thread owns the terminal and all state. The only background work is
//! an in-flight assistant question, which runs on a spawned thread and hands
//! its reply back over a bounded channel drained by the event loop.

pub mod widgets;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, TryRecvError, bounded};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use miette::IntoDiagnostic;
use tracing::warn;

use crate::assistant::AssistantClient;
use crate::chat::Transcript;
use crate::config::AppConfig;
use crate::model::FileId;
use crate::reader::OpenBook;
use crate::shell::Library;
use crate::tree::TreeNode;

/// Which pane has keyboard focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Sidebar,
    Reader,
    Chat,
}

/// What a `d` press is about to delete, pending `y`/`n`.
#[derive(Debug, Clone)]
pub enum DeleteTarget {
    File { id: FileId, name: String },
    Folder { path: String },
}

impl DeleteTarget {
    pub fn describe(&self) -> String {
        match self {
            DeleteTarget::File { name, .. } => name.clone(),
            DeleteTarget::Folder { path } => format!("folder {path} and everything in it"),
        }
    }
}

/// One visible sidebar line, flattened from the tree plus expansion state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidebarRow {
    pub depth: usize,
    pub name: String,
    pub path: String,
    pub kind: RowKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowKind {
    Folder { expanded: bool },
    File { id: FileId },
}

/// Flatten the forest into the rows the sidebar shows, descending only into
/// expanded folders. Row order is the tree's order.
pub fn flatten_visible(nodes: &[TreeNode], expanded: &HashSet<String>) -> Vec<SidebarRow> {
    let mut rows = Vec::new();
    push_visible(nodes, expanded, 0, &mut rows);
    rows
}

fn push_visible(
    nodes: &[TreeNode],
    expanded: &HashSet<String>,
    depth: usize,
    out: &mut Vec<SidebarRow>,
) {
    for node in nodes {
        match node {
            TreeNode::Folder {
                name,
                path,
                children,
            } => {
                let is_open = expanded.contains(path);
                out.push(SidebarRow {
                    depth,
                    name: name.clone(),
                    path: path.clone(),
                    kind: RowKind::Folder { expanded: is_open },
                });
                if is_open {
                    push_visible(children, expanded, depth + 1, out);
                }
            }
            TreeNode::File { name, path, id, .. } => {
                out.push(SidebarRow {
                    depth,
                    name: name.clone(),
                    path: path.clone(),
                    kind: RowKind::File { id: *id },
                });
            }
        }
    }
}

fn collect_folder_paths(nodes: &[TreeNode], out: &mut HashSet<String>) {
    for node in nodes {
        if let TreeNode::Folder { path, children, .. } = node {
            out.insert(path.clone());
            collect_folder_paths(children, out);
        }
    }
}

/// TUI application state.
pub struct ReaderTui {
    pub(crate) library: Library,
    pub(crate) assistant: Arc<AssistantClient>,
    pub(crate) transcript: Transcript,
    attach_context: bool,
    pub(crate) focus: Focus,
    tree: Vec<TreeNode>,
    expanded: HashSet<String>,
    pub(crate) rows: Vec<SidebarRow>,
    pub(crate) selected: usize,
    pub(crate) book: Option<OpenBook>,
    pub(crate) page_scroll: u16,
    pub(crate) chat_input: String,
    pub(crate) chat_scroll: usize,
    pending_ask: Option<Receiver<String>>,
    pub(crate) pending_delete: Option<DeleteTarget>,
    pub(crate) notice: Option<String>,
    should_quit: bool,
    column_width: u16,
}

impl ReaderTui {
    pub fn new(library: Library, assistant: Arc<AssistantClient>, config: &AppConfig) -> Self {
        let tree = library.tree();
        let mut expanded = HashSet::new();
        collect_folder_paths(&tree, &mut expanded);
        let rows = flatten_visible(&tree, &expanded);

        let mut transcript = Transcript::default();
        transcript
            .push_notice("Tab cycles panes. Enter opens the selected file, d deletes, q quits.");
        if !assistant.is_available() {
            transcript.push_notice(format!(
                "Assistant offline: no Ollama reachable at {}. Questions will fail fast.",
                config.assistant.base_url
            ));
        } else if !assistant.has_model() {
            transcript.push_notice(format!(
                "Model \"{}\" is not pulled locally; asks may fail.",
                assistant.model()
            ));
        }

        Self {
            library,
            assistant,
            transcript,
            attach_context: config.reader.attach_page_context,
            focus: Focus::Sidebar,
            tree,
            expanded,
            rows,
            selected: 0,
            book: None,
            page_scroll: 0,
            chat_input: String::new(),
            chat_scroll: 0,
            pending_ask: None,
            pending_delete: None,
            notice: None,
            should_quit: false,
            column_width: config.reader.column_width,
        }
    }

    /// Run the TUI event loop.
    pub fn run(&mut self) -> miette::Result<()> {
        let mut terminal = ratatui::init();

        loop {
            self.poll_ask();

            terminal
                .draw(|frame| widgets::render(frame, self))
                .into_diagnostic()?;

            if self.should_quit {
                break;
            }

            if event::poll(Duration::from_millis(100)).into_diagnostic()? {
                if let Event::Key(key) = event::read().into_diagnostic()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    self.handle_key(key.code, key.modifiers);
                }
            }
        }

        ratatui::restore();
        Ok(())
    }

    /// Whether a question is out with the assistant right now.
    pub(crate) fn ask_pending(&self) -> bool {
        self.pending_ask.is_some()
    }

    /// Drain the assistant reply, if one has landed.
    fn poll_ask(&mut self) {
        // Take the receiver so the reply arm can drop it without aliasing self.
        let Some(rx) = self.pending_ask.take() else {
            return;
        };
        match rx.try_recv() {
            Ok(reply) => {
                self.transcript.push_assistant(reply);
                self.chat_scroll = 0;
            }
            Err(TryRecvError::Empty) => self.pending_ask = Some(rx),
            Err(TryRecvError::Disconnected) => {
                self.transcript
                    .push_notice("assistant worker exited without a reply");
            }
        }
    }

    /// Send the chat input to the assistant on a worker thread.
    ///
    /// Only one question can be in flight; the reply lands via `poll_ask`.
    fn send_ask(&mut self, prompt: String) {
        if self.pending_ask.is_some() {
            self.transcript
                .push_notice("still waiting on the previous question");
            return;
        }
        self.transcript.push_user(prompt.clone());
        self.chat_scroll = 0;

        let context = if self.attach_context {
            self.book.as_ref().map(|b| b.page_text().to_string())
        } else {
            None
        };

        let (tx, rx) = bounded(1);
        self.pending_ask = Some(rx);
        let client = Arc::clone(&self.assistant);
        std::thread::spawn(move || {
            let reply = client.ask(&prompt, context.as_deref(), None);
            // The UI may have quit; a dead receiver is fine.
            let _ = tx.send(reply);
        });
    }

    fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        self.notice = None;

        if code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        // A pending delete captures the next key: y confirms, anything else backs out.
        if self.pending_delete.is_some() {
            match code {
                KeyCode::Char('y') | KeyCode::Char('Y') => self.confirm_delete(),
                _ => {
                    self.pending_delete = None;
                    self.notice = Some("delete cancelled".to_string());
                }
            }
            return;
        }

        match code {
            KeyCode::Tab => {
                self.focus = match self.focus {
                    Focus::Sidebar => Focus::Reader,
                    Focus::Reader => Focus::Chat,
                    Focus::Chat => Focus::Sidebar,
                };
                return;
            }
            KeyCode::BackTab => {
                self.focus = match self.focus {
                    Focus::Sidebar => Focus::Chat,
                    Focus::Reader => Focus::Sidebar,
                    Focus::Chat => Focus::Reader,
                };
                return;
            }
            _ => {}
        }

        match self.focus {
            Focus::Sidebar => self.handle_sidebar_key(code),
            Focus::Reader => self.handle_reader_key(code),
            Focus::Chat => self.handle_chat_key(code),
        }
    }

    fn handle_sidebar_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < self.rows.len() {
                    self.selected += 1;
                }
            }
            KeyCode::Enter => self.open_selected(),
            KeyCode::Right => {
                if let Some(SidebarRow { path, kind, .. }) = self.rows.get(self.selected) {
                    if matches!(kind, RowKind::Folder { expanded: false }) {
                        let path = path.clone();
                        self.toggle_folder(&path);
                    }
                }
            }
            KeyCode::Left => {
                if let Some(SidebarRow { path, kind, .. }) = self.rows.get(self.selected) {
                    if matches!(kind, RowKind::Folder { expanded: true }) {
                        let path = path.clone();
                        self.toggle_folder(&path);
                    }
                }
            }
            KeyCode::Char('d') => self.request_delete(),
            _ => {}
        }
    }

    fn handle_reader_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Right | KeyCode::Char('l') | KeyCode::PageDown | KeyCode::Char(' ') => {
                self.turn_page(true);
            }
            KeyCode::Left | KeyCode::Char('h') | KeyCode::PageUp => {
                self.turn_page(false);
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.page_scroll = self.page_scroll.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if let Some(book) = &self.book {
                    let max = book.display_lines().len().saturating_sub(1) as u16;
                    self.page_scroll = (self.page_scroll + 1).min(max);
                }
            }
            KeyCode::Home => self.jump(true),
            KeyCode::End => self.jump(false),
            KeyCode::Char('+') | KeyCode::Char('=') => {
                if let Some(book) = self.book.as_mut() {
                    book.widen();
                    self.column_width = book.column_width();
                }
            }
            KeyCode::Char('-') => {
                if let Some(book) = self.book.as_mut() {
                    book.narrow();
                    self.column_width = book.column_width();
                }
            }
            _ => {}
        }
    }

    fn handle_chat_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => self.focus = Focus::Reader,
            KeyCode::Enter => {
                let prompt = self.chat_input.trim().to_string();
                self.chat_input.clear();
                if prompt.is_empty() {
                    return;
                }
                self.send_ask(prompt);
            }
            KeyCode::Char(c) => self.chat_input.push(c),
            KeyCode::Backspace => {
                self.chat_input.pop();
            }
            KeyCode::Up => self.chat_scroll += 1,
            KeyCode::Down => self.chat_scroll = self.chat_scroll.saturating_sub(1),
            KeyCode::PageUp => self.chat_scroll += 5,
            KeyCode::PageDown => self.chat_scroll = self.chat_scroll.saturating_sub(5),
            _ => {}
        }
    }

    fn open_selected(&mut self) {
        let Some(row) = self.rows.get(self.selected).cloned() else {
            return;
        };
        match row.kind {
            RowKind::Folder { .. } => self.toggle_folder(&row.path),
            RowKind::File { id } => self.open_file(id),
        }
    }

    /// Open a file in the reader pane, resuming at its saved position.
    pub fn open_file(&mut self, id: FileId) {
        match self.library.open_book(id, self.column_width) {
            Ok(book) => {
                // Opening counts as reading: it refreshes the recency list and
                // seeds progress for never-read files.
                if let Err(e) =
                    self.library
                        .record_page(id, book.current_page(), Some(book.page_count()))
                {
                    warn!(error = %e, "could not record progress on open");
                }
                self.page_scroll = 0;
                self.book = Some(book);
                self.focus = Focus::Reader;
            }
            Err(e) => {
                warn!(file = %id, error = %e, "open failed");
                self.notice = Some(format!("cannot open: {e}"));
            }
        }
    }

    fn turn_page(&mut self, forward: bool) {
        let Some(book) = self.book.as_mut() else {
            return;
        };
        let moved = if forward {
            book.next_page()
        } else {
            book.prev_page()
        };
        if !moved {
            return;
        }
        let (id, page, total) = (book.file_id, book.current_page(), book.page_count());
        self.page_scroll = 0;
        if let Err(e) = self.library.record_page(id, page, Some(total)) {
            warn!(error = %e, "could not record progress");
        }
    }

    fn jump(&mut self, to_first: bool) {
        let Some(book) = self.book.as_mut() else {
            return;
        };
        let moved = if to_first {
            book.first_page()
        } else {
            book.last_page()
        };
        if !moved {
            return;
        }
        let (id, page, total) = (book.file_id, book.current_page(), book.page_count());
        self.page_scroll = 0;
        if let Err(e) = self.library.record_page(id, page, Some(total)) {
            warn!(error = %e, "could not record progress");
        }
    }

    fn toggle_folder(&mut self, path: &str) {
        if !self.expanded.remove(path) {
            self.expanded.insert(path.to_string());
        }
        self.rows = flatten_visible(&self.tree, &self.expanded);
        self.clamp_selection();
    }

    fn request_delete(&mut self) {
        let Some(row) = self.rows.get(self.selected) else {
            return;
        };
        self.pending_delete = Some(match &row.kind {
            RowKind::File { id } => DeleteTarget::File {
                id: *id,
                name: row.name.clone(),
            },
            RowKind::Folder { .. } => DeleteTarget::Folder {
                path: row.path.clone(),
            },
        });
    }

    fn confirm_delete(&mut self) {
        let Some(target) = self.pending_delete.take() else {
            return;
        };
        match target {
            DeleteTarget::File { id, name } => match self.library.delete_file(id) {
                Ok(true) => {
                    self.close_if_open(id);
                    self.notice = Some(format!("deleted {name}"));
                }
                Ok(false) => {
                    self.notice = Some(format!("{name} was already gone"));
                }
                Err(e) => {
                    warn!(file = %id, error = %e, "delete failed");
                    self.notice = Some(format!("delete failed: {e}"));
                }
            },
            DeleteTarget::Folder { path } => {
                let open_id = self.book.as_ref().map(|b| b.file_id);
                let deleted = self.library.delete_folder(&path);
                if let Some(id) = open_id {
                    if self.library.file(id).is_none() {
                        self.book = None;
                    }
                }
                self.notice = Some(format!("deleted {deleted} file(s) under {path}"));
            }
        }
        self.refresh_tree();
    }

    fn close_if_open(&mut self, id: FileId) {
        if self.book.as_ref().is_some_and(|b| b.file_id == id) {
            self.book = None;
        }
    }

    /// Rebuild the tree and sidebar rows after the library changed.
    fn refresh_tree(&mut self) {
        self.tree = self.library.tree();
        self.expanded
            .retain(|path| tree_contains_folder(&self.tree, path));
        self.rows = flatten_visible(&self.tree, &self.expanded);
        self.clamp_selection();
    }

    fn clamp_selection(&mut self) {
        if self.selected >= self.rows.len() {
            self.selected = self.rows.len().saturating_sub(1);
        }
    }
}

fn tree_contains_folder(nodes: &[TreeNode], folder_path: &str) -> bool {
    nodes.iter().any(|n| match n {
        TreeNode::Folder { path, children, .. } => {
            path == folder_path || tree_contains_folder(children, folder_path)
        }
        TreeNode::File { .. } => false,
    })
}

/// Launch the TUI, optionally opening one file straight away.
pub fn launch(
    library: Library,
    assistant: AssistantClient,
    config: &AppConfig,
    open: Option<FileId>,
) -> miette::Result<()> {
    let mut tui = ReaderTui::new(library, Arc::new(assistant), config);
    if let Some(id) = open {
        tui.open_file(id);
    }
    tui.run()
}
