use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use netspeed::system::units::format_rate;

use crate::app::App;
use crate::ui::{DOWNLOAD_COLOR, LABEL_COLOR, TEXT_COLOR, UPLOAD_COLOR};

/// Draw: "NetSpeed [eth0]  ▼ 2.00 KB/s  ▲ 1.00 KB/s   every 1000 ms"
pub fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled("NetSpeed ", Style::default().fg(LABEL_COLOR).add_modifier(Modifier::BOLD)),
        Span::styled("[", Style::default().fg(LABEL_COLOR)),
        Span::styled(app.selection.label().to_string(), Style::default().fg(TEXT_COLOR).add_modifier(Modifier::BOLD)),
        Span::styled("]", Style::default().fg(LABEL_COLOR)),
    ];

    if app.fell_back {
        // Named adapter vanished; the sampler is reading the aggregate
        spans.push(Span::styled(" (unavailable, showing All)", Style::default().fg(Color::Yellow)));
    }

    spans.extend([
        Span::raw("  "),
        Span::styled(
            format!("▼ {}", format_rate(app.current().download_kbps)),
            Style::default().fg(DOWNLOAD_COLOR).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(
            format!("▲ {}", format_rate(app.current().upload_kbps)),
            Style::default().fg(UPLOAD_COLOR).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("   every {} ms", app.interval_ms), Style::default().fg(Color::DarkGray)),
    ]);

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}
