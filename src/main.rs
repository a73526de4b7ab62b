//! quire CLI: terminal PDF library and reader.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use quire::assistant::AssistantClient;
use quire::config::AppConfig;
use quire::model::{FileId, now_ms};
use quire::paths::QuirePaths;
use quire::shell::{ImportReport, Library, format_bytes};
use quire::tree::{TreeNode, normalize_path};
use quire::tui;

#[derive(Parser)]
#[command(
    name = "quire",
    version,
    about = "Terminal PDF library and reader with an AI reading assistant"
)]
struct Cli {
    /// Data directory for the document store.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import PDF files or directories into the library.
    Import {
        /// Files or directories to import.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Show the library as a folder tree.
    List {
        /// Emit the tree as JSON instead.
        #[arg(long)]
        json: bool,
    },

    /// Remove a file by id, or a whole folder.
    Rm {
        /// Numeric file id (see `quire list`).
        #[arg(required_unless_present = "folder", conflicts_with = "folder")]
        id: Option<u64>,

        /// Delete every file under this folder path instead.
        #[arg(long)]
        folder: Option<String>,
    },

    /// Open the reader TUI, optionally jumping straight into a file.
    Read {
        /// Numeric file id to open.
        id: Option<u64>,
    },

    /// Ask the assistant a one-shot question from the command line.
    Ask {
        /// The question.
        prompt: String,

        /// Attach a stored file's page text as context.
        #[arg(long)]
        file: Option<u64>,

        /// Which page to attach (defaults to the last-read page).
        #[arg(long, requires = "file")]
        page: Option<u32>,

        /// Attach an image file to the request.
        #[arg(long)]
        image: Option<PathBuf>,

        /// Do not attach any page context.
        #[arg(long)]
        no_context: bool,
    },

    /// List recent reading positions.
    Progress,

    /// Show library statistics and assistant status.
    Info,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    let cli = Cli::parse();

    let paths = QuirePaths::resolve().into_diagnostic()?;
    paths.ensure_dirs().into_diagnostic()?;
    // The TUI owns the terminal, so its logs go to a file instead of stderr.
    init_logging(matches!(cli.command, Commands::Read { .. }), &paths)?;

    let config = AppConfig::load_or_default(&paths.config_file()).into_diagnostic()?;
    let data_dir = cli
        .data_dir
        .clone()
        .or_else(|| config.data_dir.clone())
        .unwrap_or_else(|| paths.data_dir.clone());

    match cli.command {
        Commands::Import { paths: inputs } => {
            let mut library = Library::open(&data_dir).into_diagnostic()?;
            let mut total = ImportReport::default();
            for input in &inputs {
                total.merge(library.import_path(input).into_diagnostic()?);
            }
            for file in &total.imported {
                println!(
                    "  {:>4}  {}  ({})",
                    file.id.get(),
                    file.path,
                    format_bytes(file.size_bytes)
                );
            }
            println!(
                "Imported {} file(s); skipped {} non-PDF(s), {} unreadable.",
                total.imported.len(),
                total.skipped,
                total.failed
            );
        }

        Commands::List { json } => {
            let library = Library::open(&data_dir).into_diagnostic()?;
            let tree = library.tree();
            if json {
                println!("{}", serde_json::to_string_pretty(&tree).into_diagnostic()?);
            } else if tree.is_empty() {
                println!("Library is empty. Import PDFs with `quire import <path>`.");
            } else {
                print_tree(&library, &tree, 0);
                let stats = library.stats();
                println!(
                    "\n{} file(s) in {} folder(s), {}",
                    stats.files,
                    stats.folders,
                    format_bytes(stats.total_bytes)
                );
            }
        }

        Commands::Rm { id, folder } => {
            let mut library = Library::open(&data_dir).into_diagnostic()?;
            if let Some(folder) = folder {
                let deleted = library.delete_folder(&folder);
                println!(
                    "Deleted {deleted} file(s) under {}.",
                    normalize_path(&folder)
                );
            } else if let Some(raw) = id {
                let file_id = parse_file_id(raw)?;
                if library.delete_file(file_id).into_diagnostic()? {
                    println!("Deleted file {raw}.");
                } else {
                    println!("No file with id {raw}.");
                }
            }
        }

        Commands::Read { id } => {
            let library = Library::open(&data_dir).into_diagnostic()?;
            let open = match id {
                Some(raw) => {
                    let file_id = parse_file_id(raw)?;
                    if library.file(file_id).is_none() {
                        miette::bail!("no file with id {raw}; run `quire list` to see ids");
                    }
                    Some(file_id)
                }
                None => None,
            };
            let mut client = AssistantClient::new(config.assistant_config());
            client.probe();
            tui::launch(library, client, &config, open)?;
        }

        Commands::Ask {
            prompt,
            file,
            page,
            image,
            no_context,
        } => {
            let mut client = AssistantClient::new(config.assistant_config());
            if !client.probe() {
                miette::bail!(
                    "no Ollama server reachable at {}; is it running?",
                    config.assistant.base_url
                );
            }

            let context = match (file, no_context) {
                (Some(raw), false) => {
                    let library = Library::open(&data_dir).into_diagnostic()?;
                    let file_id = parse_file_id(raw)?;
                    let mut book = library
                        .open_book(file_id, config.reader.column_width)
                        .into_diagnostic()?;
                    if let Some(p) = page {
                        book.goto(p);
                    }
                    Some(book.page_text().to_string())
                }
                _ => None,
            };
            let image_bytes = match image {
                Some(path) => Some(std::fs::read(&path).into_diagnostic()?),
                None => None,
            };

            println!("{}", client.ask(&prompt, context.as_deref(), image_bytes.as_deref()));
        }

        Commands::Progress => {
            let library = Library::open(&data_dir).into_diagnostic()?;
            let recent = library.recent_progress();
            if recent.is_empty() {
                println!("Nothing read yet.");
            }
            for p in recent {
                let name = library
                    .file(p.file_id)
                    .map(|f| f.path.as_str())
                    .unwrap_or("(deleted)");
                let pages = match p.total_pages {
                    Some(total) => format!("{}/{}", p.last_page, total),
                    None => p.last_page.to_string(),
                };
                println!("  {:<44} page {:>9}  {}", name, pages, age(p.last_read_at));
            }
        }

        Commands::Info => {
            let library = Library::open(&data_dir).into_diagnostic()?;
            let stats = library.stats();
            println!("Data directory: {}", data_dir.display());
            println!("Config file:    {}", paths.config_file().display());
            println!("Files:          {}", stats.files);
            println!("Folders:        {}", stats.folders);
            println!("Stored bytes:   {}", format_bytes(stats.total_bytes));
            println!("Progress:       {} record(s)", stats.progress_records);

            let mut client = AssistantClient::new(config.assistant_config());
            if client.probe() {
                let model_note = if client.has_model() {
                    "pulled"
                } else {
                    "NOT pulled locally"
                };
                println!(
                    "Assistant:      online at {} (model {}, {})",
                    config.assistant.base_url,
                    client.model(),
                    model_note
                );
            } else {
                println!("Assistant:      offline ({})", config.assistant.base_url);
            }
        }
    }

    Ok(())
}

fn init_logging(to_file: bool, paths: &QuirePaths) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if to_file {
        let file = std::fs::File::options()
            .create(true)
            .append(true)
            .open(paths.log_file())
            .into_diagnostic()?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Arc::new(file))
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

fn parse_file_id(raw: u64) -> Result<FileId> {
    FileId::new(raw).ok_or_else(|| miette::miette!("0 is not a valid file id"))
}

fn print_tree(library: &Library, nodes: &[TreeNode], depth: usize) {
    let indent = "  ".repeat(depth);
    for node in nodes {
        match node {
            TreeNode::Folder { name, children, .. } => {
                println!("{indent}{name}/");
                print_tree(library, children, depth + 1);
            }
            TreeNode::File {
                name,
                id,
                size_bytes,
                ..
            } => {
                let position = library
                    .progress_for(*id)
                    .map(|p| match p.total_pages {
                        Some(total) => format!(", page {}/{}", p.last_page, total),
                        None => format!(", page {}", p.last_page),
                    })
                    .unwrap_or_default();
                println!(
                    "{indent}{name}  (id {}, {}{position})",
                    id.get(),
                    format_bytes(*size_bytes)
                );
            }
        }
    }
}

/// Coarse "how long ago" for the progress listing.
fn age(then_ms: u64) -> String {
    let secs = now_ms().saturating_sub(then_ms) / 1000;
    match secs {
        0..=59 => "just now".to_string(),
        60..=3_599 => format!("{}m ago", secs / 60),
        3_600..=86_399 => format!("{}h ago", secs / 3_600),
        _ => format!("{}d ago", secs / 86_400),
    }
}
