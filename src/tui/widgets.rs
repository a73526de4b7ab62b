//! TUI widget rendering: sidebar tree, page view, chat pane, status bar.

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use crate::chat::{ChatRole, ChatTurn};
use crate::shell::format_bytes;
use crate::tui::{Focus, ReaderTui, RowKind};

fn pane_block(title: &str, focused: bool) -> Block<'_> {
    let border_style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(format!(" {title} "))
}

/// Main TUI layout rendering.
pub fn render(frame: &mut Frame, tui: &ReaderTui) {
    let [header_area, body_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Fill(1),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    let [sidebar_area, reader_area, chat_area] = Layout::horizontal([
        Constraint::Length(32),
        Constraint::Fill(1),
        Constraint::Length(42),
    ])
    .areas(body_area);

    render_header(frame, header_area, tui);
    render_sidebar(frame, sidebar_area, tui);
    render_reader(frame, reader_area, tui);
    render_chat(frame, chat_area, tui);
    render_status(frame, status_area, tui);
}

fn render_header(frame: &mut Frame, area: Rect, tui: &ReaderTui) {
    let stats = tui.library.stats();
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            " quire ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(
            " {} files in {} folders, {} ",
            stats.files,
            stats.folders,
            format_bytes(stats.total_bytes)
        )),
    ]));
    frame.render_widget(header, area);
}

fn render_sidebar(frame: &mut Frame, area: Rect, tui: &ReaderTui) {
    let block = pane_block("library", tui.focus == Focus::Sidebar);
    let inner_height = area.height.saturating_sub(2) as usize;

    // Keep the selection on screen by starting the window at it when needed.
    let offset = tui.selected.saturating_sub(inner_height.saturating_sub(1));

    let mut lines: Vec<Line> = Vec::new();
    for (index, row) in tui.rows.iter().enumerate().skip(offset).take(inner_height) {
        let indent = "  ".repeat(row.depth);
        let (marker, color) = match &row.kind {
            RowKind::Folder { expanded: true } => ("v ", Color::Blue),
            RowKind::Folder { expanded: false } => ("> ", Color::Blue),
            RowKind::File { .. } => ("  ", Color::White),
        };
        let mut style = Style::default().fg(color);
        if index == tui.selected {
            style = style.bg(Color::DarkGray).add_modifier(Modifier::BOLD);
        }
        lines.push(Line::from(Span::styled(
            format!("{indent}{marker}{}", row.name),
            style,
        )));
    }
    if tui.rows.is_empty() {
        lines.push(Line::from(Span::styled(
            "empty: quire import <path>",
            Style::default().fg(Color::DarkGray),
        )));
    }

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_reader(frame: &mut Frame, area: Rect, tui: &ReaderTui) {
    let focused = tui.focus == Focus::Reader;
    match &tui.book {
        Some(book) => {
            let title = format!(
                "{} [{}/{}]",
                book.title,
                book.current_page(),
                book.page_count()
            );
            let body = book.display_lines().join("\n");
            let widget = Paragraph::new(body)
                .block(pane_block(&title, focused))
                .wrap(Wrap { trim: false })
                .scroll((tui.page_scroll, 0));
            frame.render_widget(widget, area);
        }
        None => {
            let widget = Paragraph::new(
                "\nNo book open.\n\nPick a file in the library and press Enter.",
            )
            .style(Style::default().fg(Color::DarkGray))
            .block(pane_block("reader", focused));
            frame.render_widget(widget, area);
        }
    }
}

fn turn_lines(turn: &ChatTurn, model: &str) -> Vec<Line<'static>> {
    let (label, color) = match turn.role {
        ChatRole::User => ("you".to_string(), Color::Green),
        ChatRole::Assistant => (model.to_string(), Color::Magenta),
        ChatRole::Notice => ("*".to_string(), Color::DarkGray),
    };
    let mut lines = Vec::new();
    for (i, text_line) in turn.text.lines().enumerate() {
        if i == 0 {
            lines.push(Line::from(vec![
                Span::styled(format!("[{label}] "), Style::default().fg(color)),
                Span::raw(text_line.to_string()),
            ]));
        } else {
            lines.push(Line::from(Span::raw(format!("  {text_line}"))));
        }
    }
    if turn.text.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("[{label}]"),
            Style::default().fg(color),
        )));
    }
    lines
}

fn render_chat(frame: &mut Frame, area: Rect, tui: &ReaderTui) {
    let focused = tui.focus == Focus::Chat;
    let [log_area, input_area] =
        Layout::vertical([Constraint::Fill(1), Constraint::Length(3)]).areas(area);

    let mut lines: Vec<Line> = Vec::new();
    for turn in tui.transcript.turns() {
        lines.extend(turn_lines(turn, tui.assistant.model()));
    }
    if tui.ask_pending() {
        lines.push(Line::from(Span::styled(
            "[thinking...]",
            Style::default().fg(Color::Yellow),
        )));
    }

    // chat_scroll counts lines back from the bottom; 0 pins to the latest.
    let height = log_area.height.saturating_sub(2) as usize;
    let end = lines.len().saturating_sub(tui.chat_scroll.min(lines.len()));
    let start = end.saturating_sub(height);
    let visible = lines[start..end].to_vec();

    let log = Paragraph::new(visible)
        .block(pane_block("assistant", focused))
        .wrap(Wrap { trim: false });
    frame.render_widget(log, log_area);

    let input_title = if tui.ask_pending() { "ask (busy)" } else { "ask" };
    let input = Paragraph::new(tui.chat_input.as_str())
        .block(pane_block(input_title, focused))
        .style(Style::default().fg(Color::White));
    frame.render_widget(input, input_area);
}

fn render_status(frame: &mut Frame, area: Rect, tui: &ReaderTui) {
    let line = if let Some(target) = &tui.pending_delete {
        Line::from(Span::styled(
            format!(" delete {}? y/n ", target.describe()),
            Style::default()
                .fg(Color::Black)
                .bg(Color::Red)
                .add_modifier(Modifier::BOLD),
        ))
    } else if let Some(notice) = &tui.notice {
        Line::from(Span::styled(
            format!(" {notice} "),
            Style::default().fg(Color::Yellow),
        ))
    } else {
        let assistant = if tui.assistant.is_available() {
            format!("{} online", tui.assistant.model())
        } else {
            "assistant offline".to_string()
        };
        let position = match &tui.book {
            Some(book) => format!("{} {}/{} | ", book.title, book.current_page(), book.page_count()),
            None => String::new(),
        };
        let hint = match tui.focus {
            Focus::Sidebar => "enter open | d delete | arrows move",
            Focus::Reader => "arrows/hl pages | +/- width | home/end",
            Focus::Chat => "enter send | esc back",
        };
        Line::from(vec![
            Span::styled(format!(" {position}"), Style::default().fg(Color::White)),
            Span::styled(format!("{assistant} "), Style::default().fg(Color::DarkGray)),
            Span::raw("| "),
            Span::styled(hint, Style::default().fg(Color::DarkGray)),
        ])
    };
    frame.render_widget(Paragraph::new(line), area);
}
