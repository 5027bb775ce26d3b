use chrono::{Datelike, Local, Timelike};
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Bar, BarChart, BarGroup, Block, Borders, Paragraph};

use netspeed::system::units::{bytes_to_mib, format_bytes};

use crate::app::{App, UsageView};
use crate::ui::{DOWNLOAD_COLOR, LABEL_COLOR, TEXT_COLOR, UPLOAD_COLOR};

/// Draw the usage panel for the active view (Tab cycles)
pub fn draw_usage(f: &mut Frame, app: &App, area: Rect) {
    let title = match app.usage_view {
        UsageView::Hourly => format!(" Hourly Data Usage {} (MB) ", app.usage.daily.date),
        UsageView::Daily => " Daily Data Usage, last 7 days (MB) ".to_string(),
        UsageView::Totals => format!(" Data Usage {} ", app.usage.daily.date),
    };
    let block = Block::default().borders(Borders::ALL).title(Span::styled(
        title,
        Style::default().fg(LABEL_COLOR).add_modifier(Modifier::BOLD),
    ));

    match app.usage_view {
        UsageView::Hourly => {
            let groups: Vec<(String, u64, u64)> = app
                .usage
                .hourly
                .iter()
                .map(|(hour, b)| (hour_label(hour), b.download_bytes, b.upload_bytes))
                .collect();
            draw_bar_groups(f, block, &groups, area);
        }
        UsageView::Daily => {
            let groups: Vec<(String, u64, u64)> = app
                .daily_series()
                .iter()
                .map(|d| (format!("{:02}", d.date.day()), d.download_bytes, d.upload_bytes))
                .collect();
            draw_bar_groups(f, block, &groups, area);
        }
        UsageView::Totals => draw_totals(f, app, block, area),
    }
}

/// One group per label, download bar then upload bar. Heights are
/// hundredths of a MB, so small hours still show.
fn draw_bar_groups(f: &mut Frame, block: Block, groups: &[(String, u64, u64)], area: Rect) {
    let inner_width = area.width.saturating_sub(2);
    let mut chart = BarChart::default()
        .block(block)
        .bar_width(bar_width(inner_width, groups.len()))
        .bar_gap(0)
        .group_gap(1)
        .label_style(Style::default().fg(TEXT_COLOR));

    for (label, down, up) in groups {
        let bars = [
            Bar::default()
                .value(bar_height(*down))
                .text_value(String::new())
                .style(Style::default().fg(DOWNLOAD_COLOR)),
            Bar::default()
                .value(bar_height(*up))
                .text_value(String::new())
                .style(Style::default().fg(UPLOAD_COLOR)),
        ];
        chart = chart.data(BarGroup::default().label(Line::from(label.clone())).bars(&bars));
    }

    f.render_widget(chart, area);
}

fn hour_label(hour: u32) -> String {
    format!("{:02}:00", hour)
}

fn bar_height(bytes: u64) -> u64 {
    (bytes_to_mib(bytes) * 100.0).round() as u64
}

/// Widest bar that still fits every two-bar group (plus its gap) in `width`
fn bar_width(width: u16, groups: usize) -> u16 {
    if groups == 0 {
        return 1;
    }
    let per_group = width / groups as u16;
    (per_group.saturating_sub(1) / 2).clamp(1, 3)
}

fn draw_totals(f: &mut Frame, app: &App, block: Block, area: Rect) {
    let daily = &app.usage.daily;
    let hour = Local::now().hour();
    let this_hour = app.usage.hourly.get(hour);

    let label = Style::default().fg(LABEL_COLOR).add_modifier(Modifier::BOLD);
    let lines = vec![
        Line::from(vec![
            Span::styled("Download: ", label),
            Span::styled(format_bytes(daily.download_bytes), Style::default().fg(DOWNLOAD_COLOR)),
        ]),
        Line::from(vec![
            Span::styled("Upload:   ", label),
            Span::styled(format_bytes(daily.upload_bytes), Style::default().fg(UPLOAD_COLOR)),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled(format!("{:02}:00    ", hour), label),
            Span::styled(format!("▼ {}", format_bytes(this_hour.download_bytes)), Style::default().fg(DOWNLOAD_COLOR)),
            Span::raw("  "),
            Span::styled(format!("▲ {}", format_bytes(this_hour.upload_bytes)), Style::default().fg(UPLOAD_COLOR)),
        ]),
    ];

    f.render_widget(Paragraph::new(lines).block(block), area);
}
