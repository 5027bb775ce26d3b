use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::symbols::Marker;
use ratatui::text::Span;
use ratatui::widgets::{Axis, Block, Borders, Chart, Dataset, GraphType};

use netspeed::config::GraphStyle;
use netspeed::system::units::format_rate;

use crate::app::App;
use crate::ui::{DOWNLOAD_COLOR, LABEL_COLOR, TEXT_COLOR, UPLOAD_COLOR};

/// Smallest y-axis ceiling (KB/s), so an idle link doesn't magnify noise
const MIN_Y_MAX: f64 = 1.0;

/// Draw the rolling download/upload graph from the rate buffer
pub fn draw_graph(f: &mut Frame, app: &App, area: Rect) {
    let samples = app.rates.snapshot();
    let download: Vec<(f64, f64)> = samples
        .iter()
        .enumerate()
        .map(|(i, s)| (i as f64, s.download_kbps))
        .collect();
    let upload: Vec<(f64, f64)> = samples
        .iter()
        .enumerate()
        .map(|(i, s)| (i as f64, s.upload_kbps))
        .collect();

    let graph_type = match app.graph_style {
        GraphStyle::Line => GraphType::Line,
        GraphStyle::Bar => GraphType::Bar,
    };

    let datasets = vec![
        Dataset::default()
            .name("Download")
            .marker(Marker::Braille)
            .graph_type(graph_type)
            .style(Style::default().fg(DOWNLOAD_COLOR))
            .data(&download),
        Dataset::default()
            .name("Upload")
            .marker(Marker::Braille)
            .graph_type(graph_type)
            .style(Style::default().fg(UPLOAD_COLOR))
            .data(&upload),
    ];

    let y_max = (app.rates.peak() * 1.1).max(MIN_Y_MAX);
    let x_max = (app.rates.capacity().saturating_sub(1)).max(1) as f64;
    let axis_style = Style::default().fg(TEXT_COLOR);

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(Span::styled(
                    " Network Speed Graph ",
                    Style::default().fg(LABEL_COLOR).add_modifier(Modifier::BOLD),
                )),
        )
        .x_axis(Axis::default().style(axis_style).bounds([0.0, x_max]))
        .y_axis(
            Axis::default()
                .style(axis_style)
                .bounds([0.0, y_max])
                .labels(vec![
                    "0".to_string(),
                    format_rate(y_max / 2.0),
                    format_rate(y_max),
                ]),
        );

    f.render_widget(chart, area);
}
