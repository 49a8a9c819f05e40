use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph},
};

use crate::toolkit::{GridRow, TermToolkit, Toolkit};

pub fn bordered_block(title: Option<&str>) -> Block<'_> {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    match title {
        Some(t) => block.title(t),
        None => block,
    }
}

pub fn section(title: &str) -> Line<'static> {
    Line::from(format!("── {title} ──").fg(Color::Cyan))
}

/// Flattens the last layout pass into text: one section per group and one
/// line per visible row, labels right-aligned within their group.
pub fn config_lines(tk: &TermToolkit) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for group in tk.layout() {
        if !lines.is_empty() {
            lines.push(Line::raw(""));
        }
        lines.push(section(tk.title(group.group)));

        let rows: Vec<_> = group
            .rows
            .iter()
            .filter(|r| tk.is_visible(r.value))
            .collect();
        let width = rows
            .iter()
            .map(|r| tk.text(r.label).chars().count())
            .max()
            .unwrap_or(0);
        lines.extend(rows.into_iter().map(|r| field_line(tk, r, width)));
    }
    lines
}

fn field_line(tk: &TermToolkit, row: &GridRow, width: usize) -> Line<'static> {
    let chars: Vec<char> = tk.text(row.value).chars().collect();
    let (start, end) = tk.text_selection(row.value);
    let base = if tk.focus() == Some(row.value) {
        Style::default().add_modifier(Modifier::UNDERLINED)
    } else {
        Style::default()
    };
    let part = |from: usize, to: usize| chars[from..to].iter().collect::<String>();

    let mut spans = vec![
        format!("{:>width$}", tk.text(row.label)).fg(Color::Yellow),
        " ".into(),
        Span::styled(part(0, start), base),
    ];
    if end > start {
        spans.push(Span::styled(
            part(start, end),
            base.add_modifier(Modifier::REVERSED),
        ));
    }
    spans.push(Span::styled(part(end, chars.len()), base));
    Line::from(spans)
}

pub fn render_help(f: &mut Frame) {
    let area = centered_rect(50, 60, f.area());
    f.render_widget(Clear, area);

    let keys = [
        ("j / ↓", "Scroll down"),
        ("k / ↑", "Scroll up"),
        ("g / G", "Top / Bottom"),
        ("Tab", "Focus next value"),
        ("S-Tab", "Focus previous value"),
        ("C-a", "Select value"),
        ("S-← / S-→", "Adjust selection"),
        ("r", "Reload now"),
        ("?", "Help"),
        ("q", "Quit"),
    ];

    let mut lines: Vec<Line> = vec![
        Line::from("Keyboard Shortcuts".fg(Color::Cyan).bold()),
        Line::raw(""),
    ];
    lines.extend(
        keys.iter()
            .map(|(k, d)| Line::from(vec![format!("  {k:<12}").fg(Color::Yellow), (*d).into()])),
    );
    lines.push(Line::raw(""));
    lines.push(Line::from(
        "Press any key to close".fg(Color::DarkGray).italic(),
    ));

    f.render_widget(
        Paragraph::new(Text::from(lines))
            .block(
                Block::default()
                    .title(" Help ")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            )
            .style(Style::default().bg(Color::Black)),
        area,
    );
}

pub fn centered_rect(w: u16, h: u16, area: Rect) -> Rect {
    let v = Layout::vertical([
        Constraint::Percentage((100 - h) / 2),
        Constraint::Percentage(h),
        Constraint::Percentage((100 - h) / 2),
    ])
    .split(area);

    Layout::horizontal([
        Constraint::Percentage((100 - w) / 2),
        Constraint::Percentage(w),
        Constraint::Percentage((100 - w) / 2),
    ])
    .split(v[1])[1]
}
