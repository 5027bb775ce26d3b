//! netspeed — live network throughput monitor for the terminal.
//!
//! Features:
//!   - Rolling download/upload graph (line or bar)
//!   - Per-adapter or all-adapter sampling, with fallback when an adapter disappears
//!   - Hourly and daily usage totals, persisted to CSV across restarts
//!   - Headless mode that logs every sample
//!
//! Keybindings: press '?' for help.

mod app;
mod cli;
mod input;
mod ui;

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{info, warn};

use netspeed::config::{default_config_path, NetspeedConfig, CONFIG_FILE};
use netspeed::logging::{init_logging, LogTarget};
use netspeed::system::counters::{list_adapters, SysinfoCounters};
use netspeed::system::engine::SamplerHandle;
use netspeed::system::store::CsvStore;
use netspeed::system::units::{format_bytes, format_rate};
use netspeed::system::usage::{UsageAggregator, UsageSnapshot};

use app::App;
use cli::Cli;

/// Log file name inside the data directory (TUI mode)
const LOG_FILE: &str = "netspeed.log";

/// Poll granularity for key events between refreshes
const INPUT_POLL_MS: u64 = 50;

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.list_adapters {
        for name in list_adapters(&mut SysinfoCounters::new()) {
            println!("{}", name);
        }
        return Ok(());
    }

    let config_path = cli
        .config
        .clone()
        .or_else(default_config_path)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    let (file_cfg, mut rejected) = NetspeedConfig::load(&config_path);
    let mut cfg = file_cfg.clone();
    rejected.extend(cli.apply_to(&mut cfg));

    let data_dir = cfg.data_dir(&config_path);
    let log_path = data_dir.join(LOG_FILE);
    let target = if cli.headless {
        LogTarget::Stderr
    } else {
        LogTarget::File(&log_path)
    };
    init_logging(&cli.log_level, cli.is_json_format(), target)
        .with_context(|| format!("cannot open log file {}", log_path.display()))?;

    for e in &rejected {
        warn!(error = %e, "config value rejected, keeping previous value");
    }
    info!(
        config = %config_path.display(),
        data_dir = %data_dir.display(),
        adapter = %cfg.adapter,
        interval_ms = cfg.update_interval_ms,
        "netspeed starting"
    );

    let store = CsvStore::new(&data_dir);
    let aggregator = UsageAggregator::open(store.clone(), Local::now().date_naive());
    let initial_usage = aggregator.snapshot();
    let mut handle = SamplerHandle::spawn(SysinfoCounters::new(), aggregator, cfg.sampler_settings())
        .context("failed to start sampler thread")?;

    if cli.headless {
        let refresh = Duration::from_millis(cfg.ui_refresh_ms);
        if let Some(usage) = run_headless(handle, refresh, cli.duration, stop_requests()) {
            info!(
                date = %usage.daily.date,
                download = %format_bytes(usage.daily.download_bytes),
                upload = %format_bytes(usage.daily.upload_bytes),
                "usage saved, exiting"
            );
        }
        return Ok(());
    }

    let mut app = App::new(&cfg, initial_usage, store, Box::new(SysinfoCounters::new()));

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    // Run the app
    let result = run_app(&mut terminal, &mut app, &mut handle, &cfg);

    // Final save happens on the sampler thread; wait for it before exiting.
    if let Some(usage) = handle.shutdown() {
        info!(
            date = %usage.daily.date,
            download = usage.daily.download_bytes,
            upload = usage.daily.upload_bytes,
            "usage saved"
        );
    }
    save_settings(&app.to_config(&file_cfg), &config_path);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Main application loop
fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    handle: &mut SamplerHandle,
    cfg: &NetspeedConfig,
) -> Result<()> {
    let refresh_rate = Duration::from_millis(cfg.ui_refresh_ms);
    let mut last_refresh = Instant::now();

    app.refresh(handle);

    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if app.should_quit {
            return Ok(());
        }

        // Wake up for keys often, but never sleep past the next refresh
        let timeout = refresh_rate
            .saturating_sub(last_refresh.elapsed())
            .min(Duration::from_millis(INPUT_POLL_MS));

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                // On Windows, crossterm fires Press and Release; only handle Press
                if key.kind == KeyEventKind::Press {
                    input::handle_input(app, handle, key);
                    if app.should_quit {
                        return Ok(());
                    }
                }
            }
        }

        if last_refresh.elapsed() >= refresh_rate {
            app.refresh(handle);
            last_refresh = Instant::now();
        }
    }
}

/// Stop requests for headless mode: `q` on stdin, Ctrl-C or SIGTERM
fn stop_requests() -> Receiver<()> {
    let (quit_tx, quit_rx) = mpsc::channel::<()>();

    let signal_tx = quit_tx.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = signal_tx.send(());
    }) {
        warn!(error = %e, "signal handler not installed, stop with 'q' or --duration");
    }

    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) if line.trim().eq_ignore_ascii_case("q") => {
                    let _ = quit_tx.send(());
                    return;
                }
                Ok(_) => {}
                Err(_) => return,
            }
        }
    });

    quit_rx
}

/// Log every sample until `stop` fires or `duration` seconds pass, then shut
/// the sampler down and return the usage it saved.
fn run_headless(
    handle: SamplerHandle,
    refresh: Duration,
    duration: Option<u64>,
    stop: Receiver<()>,
) -> Option<UsageSnapshot> {
    let deadline = duration.map(|secs| Instant::now() + Duration::from_secs(secs));

    info!("headless mode, enter 'q' or send SIGTERM to stop");
    loop {
        match stop.recv_timeout(refresh) {
            Ok(()) => break,
            Err(RecvTimeoutError::Timeout) => {}
            // Every stop source is gone: keep sampling until the deadline
            Err(RecvTimeoutError::Disconnected) => thread::sleep(refresh),
        }

        for tick in handle.drain() {
            info!(
                adapter = %tick.selection,
                fell_back = tick.fell_back,
                down = %format_rate(tick.rate.download_kbps),
                up = %format_rate(tick.rate.upload_kbps),
                today_down = %format_bytes(tick.usage.daily.download_bytes),
                today_up = %format_bytes(tick.usage.daily.upload_bytes),
                "sample"
            );
        }

        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
    }

    handle.shutdown()
}

fn save_settings(cfg: &NetspeedConfig, path: &Path) {
    if let Err(e) = cfg.save(path) {
        warn!(error = %e, path = %path.display(), "could not save settings");
    }
}
