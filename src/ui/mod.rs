pub mod footer;
pub mod graph;
pub mod header;
pub mod help;
pub mod usage;

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::Color;

use crate::app::{App, AppMode};

/// Download series / text color
pub const DOWNLOAD_COLOR: Color = Color::Green;
/// Upload series / text color
pub const UPLOAD_COLOR: Color = Color::Red;
pub const LABEL_COLOR: Color = Color::Cyan;
pub const TEXT_COLOR: Color = Color::White;

/// Height of the usage panel (bars + axis labels + borders)
const USAGE_HEIGHT: u16 = 12;

/// Render the complete UI
pub fn draw(f: &mut Frame, app: &App) {
    let size = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),            // header (adapter + live rates)
            Constraint::Min(6),               // rolling rate graph
            Constraint::Length(USAGE_HEIGHT), // hourly / daily / totals
            Constraint::Length(1),            // footer (key bar)
        ])
        .split(size);

    header::draw_header(f, app, chunks[0]);
    graph::draw_graph(f, app, chunks[1]);
    usage::draw_usage(f, app, chunks[2]);
    footer::draw_footer(f, app, chunks[3]);

    if app.mode == AppMode::Help {
        help::draw_help(f);
    }
}
