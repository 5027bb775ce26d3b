use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use netspeed::system::engine::SamplerHandle;

use crate::app::{App, AppMode, INTERVAL_STEP_MS};

/// Handle a single key input event.
pub fn handle_input(app: &mut App, handle: &mut SamplerHandle, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.mode {
        AppMode::Normal => handle_normal_mode(app, handle, key),
        AppMode::Help => handle_help_mode(app, key),
    }
}

// ── Normal mode ─────────────────────────────────────────────────────────

fn handle_normal_mode(app: &mut App, handle: &mut SamplerHandle, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc | KeyCode::F(10) => app.should_quit = true,
        KeyCode::Char('?') | KeyCode::F(1) => app.mode = AppMode::Help,

        KeyCode::Char('a') => app.cycle_adapter(handle),
        KeyCode::Char('+') | KeyCode::Char('=') => app.change_interval(handle, INTERVAL_STEP_MS as i64),
        KeyCode::Char('-') => app.change_interval(handle, -(INTERVAL_STEP_MS as i64)),
        KeyCode::Char('g') => app.toggle_graph_style(),
        KeyCode::Tab => app.cycle_usage_view(),
        _ => {}
    }
}

// ── Help overlay ────────────────────────────────────────────────────────

fn handle_help_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        // Any other key closes help
        _ => app.mode = AppMode::Normal,
    }
}
