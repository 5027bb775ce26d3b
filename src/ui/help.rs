use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

/// Draw the Help popup (? / F1)
pub fn draw_help(f: &mut Frame) {
    let area = centered_rect(60, 70, f.area());
    f.render_widget(Clear, area);

    let section = Style::default().add_modifier(Modifier::BOLD).fg(Color::Yellow);
    let help_text = vec![
        Line::from(Span::styled(
            " netspeed - live network throughput and data usage ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(" Sampling ", section)),
        Line::from("  a           Cycle adapter (All, then each interface)"),
        Line::from("  + / -       Sampling interval up/down by 100 ms (100-5000)"),
        Line::from(""),
        Line::from(Span::styled(" Display ", section)),
        Line::from("  g           Toggle line/bar graph"),
        Line::from("  Tab         Cycle usage view: hourly, daily, totals"),
        Line::from(""),
        Line::from(Span::styled(" General ", section)),
        Line::from("  ?/F1        Show this help"),
        Line::from("  q/Esc/F10   Quit (usage is saved first)"),
        Line::from("  Ctrl+C      Quit"),
        Line::from(""),
        Line::from(Span::styled(
            " Press any key to close ",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let help = Paragraph::new(help_text)
        .block(Block::default().borders(Borders::ALL).title(" Help "))
        .wrap(Wrap { trim: false });
    f.render_widget(help, area);
}

/// Helper to create a centered rect using percentage of the available area
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
