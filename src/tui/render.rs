use chrono::Local;
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph};

use crate::board::controller::Panel;
use crate::model::command::Severity;
use crate::model::row::Row;
use crate::sync::mode::ViewMode;
use crate::util::unicode::{fit_to_width, truncate_to_width};

use super::app::{App, Mode};

pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();
    let panel_count = app.panel_ids.len();

    // One slot per panel sized to its rows, last panel takes the remainder,
    // one status line at the bottom.
    let mut constraints: Vec<Constraint> = Vec::with_capacity(panel_count + 1);
    for (i, id) in app.panel_ids.iter().enumerate() {
        if i + 1 == panel_count {
            constraints.push(Constraint::Min(4));
        } else {
            let rows = app
                .controller
                .panel(id)
                .map(|p| p.display_rows().len())
                .unwrap_or(0)
                .clamp(1, 8) as u16;
            constraints.push(Constraint::Length(rows + 2));
        }
    }
    constraints.push(Constraint::Length(1));
    let slots = Layout::vertical(constraints).split(area);

    for (i, id) in app.panel_ids.iter().enumerate() {
        if let Some(panel) = app.controller.panel(id) {
            render_panel(frame, app, panel, i == app.focus, slots[i]);
        }
    }
    render_status_row(frame, app, slots[panel_count]);
}

fn render_panel(frame: &mut Frame, app: &App, panel: &Panel, focused: bool, area: Rect) {
    let theme = &app.theme;
    let border_style = if focused {
        Style::default().fg(theme.border_focused)
    } else {
        Style::default().fg(theme.border)
    };

    let title = panel_title(panel);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(border_style)
        .title(Span::styled(
            format!(" {} ", title),
            Style::default()
                .fg(if focused { theme.text_bright } else { theme.text })
                .add_modifier(Modifier::BOLD),
        ));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = panel.display_rows();
    if rows.is_empty() {
        let empty = Paragraph::new(Line::from(Span::styled(
            "  (empty)",
            Style::default().fg(theme.dim).add_modifier(Modifier::ITALIC),
        )));
        frame.render_widget(empty, inner);
        return;
    }

    let selected = panel.selection.selected_key();
    let visible = inner.height as usize;
    // Keep the selected row in view.
    let selected_index = selected
        .and_then(|k| rows.iter().position(|r| &r.key == k))
        .unwrap_or(0);
    let scroll = selected_index.saturating_sub(visible.saturating_sub(1));

    let mut lines = Vec::with_capacity(visible);
    for row in rows.iter().skip(scroll).take(visible) {
        let is_selected = selected == Some(&row.key);
        lines.push(row_line(app, row, is_selected, inner.width as usize));
    }
    frame.render_widget(Paragraph::new(lines), inner);
}

fn panel_title(panel: &Panel) -> String {
    match &panel.review {
        Some(review) if review.mode == ViewMode::ReviewPrevious => format!(
            "{} — last period review (Esc dismiss, a to start fresh)",
            panel.config.title
        ),
        _ => panel.config.title.clone(),
    }
}

fn row_line<'a>(app: &App, row: &'a Row, selected: bool, width: usize) -> Line<'a> {
    let theme = &app.theme;
    let today = Local::now().date_naive();

    let base = if selected {
        Style::default().bg(theme.selection_bg)
    } else {
        Style::default()
    };
    let text_style = if row.pending {
        base.fg(theme.dim)
    } else if row.fields.abandoned {
        base.fg(theme.dim).add_modifier(Modifier::CROSSED_OUT)
    } else {
        base.fg(theme.text)
    };

    let marker = if selected { "▌" } else { " " };
    let checkbox = if row.fields.done {
        "[x]"
    } else if row.fields.abandoned {
        "[-]"
    } else {
        "[ ]"
    };
    let overdue = if row.fields.is_overdue(today) { "!" } else { " " };
    let link = if row.fields.link().is_some() { "~" } else { " " };

    let mut right = String::new();
    if !row.fields.status.is_empty() {
        right.push_str(&format!(" {}", app.state_label(&row.fields.status)));
    }
    if let Some(due) = row.fields.due_date {
        right.push_str(&format!(" {}", due.format("%b %d")));
    }
    if let Some(time) = &row.fields.due_time {
        right.push_str(&format!(" {}", time));
    }
    if let Some(assignee) = &row.fields.assignee {
        right.push_str(&format!(" @{}", assignee));
    }
    if row.pending {
        right.push_str(" *");
    }

    let fixed = 1 + 1 + 3 + 1 + 1 + 1; // marker, overdue, checkbox, spaces, link
    let title_width = width.saturating_sub(fixed + right.chars().count() + 1);
    let title = fit_to_width(&row.fields.title, title_width);

    Line::from(vec![
        Span::styled(marker.to_string(), base.fg(theme.highlight)),
        Span::styled(overdue.to_string(), base.fg(theme.red)),
        Span::styled(format!("{} ", checkbox), text_style),
        Span::styled(format!("{} ", link), base.fg(theme.dim)),
        Span::styled(title, text_style),
        Span::styled(right, base.fg(theme.dim)),
    ])
}

fn render_status_row(frame: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;
    let width = area.width as usize;

    let line = match app.mode {
        Mode::Edit => {
            let mut spans = vec![
                Span::styled("new: ", Style::default().fg(theme.dim)),
                Span::styled(
                    app.edit.buffer.clone(),
                    Style::default().fg(theme.text_bright),
                ),
                Span::styled("\u{258C}", Style::default().fg(theme.highlight)),
            ];
            let hint = "Enter create  Esc cancel";
            pad_with_hint(&mut spans, hint, width, theme.dim);
            Line::from(spans)
        }
        Mode::Navigate => match &app.notice {
            Some((notice, _)) => {
                let color = match notice.severity {
                    Severity::Info => theme.green,
                    Severity::Warning => theme.yellow,
                    Severity::Error => theme.red,
                };
                Line::from(Span::styled(
                    truncate_to_width(&notice.text, width),
                    Style::default().fg(color),
                ))
            }
            None => Line::from(Span::styled(
                truncate_to_width(
                    "j/k move  Tab panel  a add  c complete  n defer  J/K reorder  z undo  r refresh  q quit",
                    width,
                ),
                Style::default().fg(theme.dim),
            )),
        },
    };

    frame.render_widget(Paragraph::new(line), area);
}

fn pad_with_hint(spans: &mut Vec<Span>, hint: &str, width: usize, dim: ratatui::style::Color) {
    let content_width: usize = spans.iter().map(|s| s.content.chars().count()).sum();
    let hint_width = hint.chars().count();
    if content_width + hint_width < width {
        let padding = width - content_width - hint_width;
        spans.push(Span::raw(" ".repeat(padding)));
        spans.push(Span::styled(hint.to_string(), Style::default().fg(dim)));
    }
}
