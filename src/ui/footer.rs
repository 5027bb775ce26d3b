use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::app::App;

/// Key bar: (key_label, description)
const KEYS: &[(&str, &str)] = &[
    ("?", "Help "),
    ("a", "Adapter "),
    ("+/-", "Interval "),
    ("g", "Graph "),
    ("Tab", "Usage "),
    ("q", "Quit "),
];

/// Draw the bottom key bar: key in black-on-cyan, description in
/// light-on-dark, then the latest status message
pub fn draw_footer(f: &mut Frame, app: &App, area: Rect) {
    let bg_fill = " ".repeat(area.width as usize);
    f.render_widget(
        Paragraph::new(bg_fill).style(Style::default().bg(Color::Indexed(234))),
        area,
    );

    let mut spans: Vec<Span> = Vec::new();
    for (key, desc) in KEYS {
        spans.push(Span::styled(
            key.to_string(),
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::styled(
            desc.to_string(),
            Style::default()
                .fg(Color::Indexed(252))
                .bg(Color::Indexed(234)),
        ));
    }

    spans.push(Span::styled(
        format!(" {} view, {} graph", app.usage_view.label(), app.graph_style.label()),
        Style::default().fg(Color::DarkGray).bg(Color::Indexed(234)),
    ));

    if let Some(status) = &app.status {
        spans.push(Span::styled(
            format!("  {}", status),
            Style::default().fg(Color::Yellow).bg(Color::Indexed(234)),
        ));
    }

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}
