use chrono::{Duration, NaiveDate};
use tracing::{info, warn};

use netspeed::config::{GraphStyle, NetspeedConfig};
use netspeed::system::counters::{list_adapters, CounterSource};
use netspeed::system::engine::{SamplerHandle, Tick, MAX_INTERVAL_MS, MIN_INTERVAL_MS};
use netspeed::system::rate_buffer::RateBuffer;
use netspeed::system::sampler::{AdapterSelection, RateSample};
use netspeed::system::store::{CsvStore, UsageStore};
use netspeed::system::usage::{DailyUsage, UsageSnapshot};

/// Days shown in the daily usage view, today included
pub const HISTORY_DAYS: i64 = 7;

/// Step for the +/- interval keys
pub const INTERVAL_STEP_MS: u64 = 100;

/// Which view/mode the app is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Normal,
    Help,
}

/// Bottom panel contents (Tab cycles)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageView {
    Hourly,
    Daily,
    Totals,
}

impl UsageView {
    pub fn next(self) -> Self {
        match self {
            Self::Hourly => Self::Daily,
            Self::Daily => Self::Totals,
            Self::Totals => Self::Hourly,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Hourly => "Hourly",
            Self::Daily => "Daily",
            Self::Totals => "Totals",
        }
    }
}

/// Front-end state. Owns the rate buffer; usage figures are copies taken
/// from the sampler's ticks.
pub struct App {
    pub mode: AppMode,
    pub should_quit: bool,

    // Live rates
    pub rates: RateBuffer,
    pub selection: AdapterSelection,
    pub fell_back: bool,
    pub interval_ms: u64,

    // Usage copied from the latest tick
    pub usage: UsageSnapshot,
    pub history: Vec<DailyUsage>,
    history_loaded_for: Option<NaiveDate>,

    // Display options
    pub graph_style: GraphStyle,
    pub usage_view: UsageView,

    /// One-line feedback shown in the footer (e.g. a rejected interval)
    pub status: Option<String>,

    adapters: Vec<String>,
    adapter_source: Box<dyn CounterSource>,
    store: CsvStore,
}

impl App {
    pub fn new(
        cfg: &NetspeedConfig,
        usage: UsageSnapshot,
        store: CsvStore,
        mut adapter_source: Box<dyn CounterSource>,
    ) -> Self {
        let adapters = list_adapters(adapter_source.as_mut());
        let mut app = Self {
            mode: AppMode::Normal,
            should_quit: false,
            rates: RateBuffer::new(cfg.graph_points),
            selection: cfg.adapter.clone(),
            fell_back: false,
            interval_ms: cfg.update_interval_ms,
            usage,
            history: Vec::new(),
            history_loaded_for: None,
            graph_style: cfg.graph_style,
            usage_view: UsageView::Hourly,
            status: None,
            adapters,
            adapter_source,
            store,
        };
        app.reload_history();
        app
    }

    /// Drain the sampler queue into the rate buffer and usage copy
    pub fn refresh(&mut self, handle: &SamplerHandle) {
        let generation = handle.generation();
        for tick in handle.drain() {
            self.apply_tick(tick, generation);
        }
        if self.history_loaded_for != Some(self.usage.daily.date) {
            self.reload_history();
        }
    }

    /// Take one tick. Ticks sampled before the latest adapter switch are
    /// dropped; returns whether the tick was used.
    pub fn apply_tick(&mut self, tick: Tick, generation: u64) -> bool {
        if tick.generation < generation {
            return false;
        }
        self.rates.push(tick.rate);
        self.fell_back = tick.fell_back;
        self.usage = tick.usage;
        true
    }

    /// Most recent rate, zero until the first tick lands
    pub fn current(&self) -> RateSample {
        self.rates.latest().unwrap_or_default()
    }

    pub fn adapters(&self) -> &[String] {
        &self.adapters
    }

    /// Move to the next adapter in the list (wrapping), rereading the list first
    pub fn cycle_adapter(&mut self, handle: &mut SamplerHandle) {
        self.adapters = list_adapters(self.adapter_source.as_mut());
        let next = next_adapter(&self.adapters, &self.selection);
        self.select_adapter(next, handle);
    }

    pub fn select_adapter(&mut self, selection: AdapterSelection, handle: &mut SamplerHandle) {
        // Rates from another interface are not comparable.
        self.rates.clear();
        self.fell_back = false;
        self.selection = selection.clone();
        handle.select_adapter(selection);
        self.status = Some(format!("Adapter: {}", self.selection));
    }

    /// Nudge the sampling interval by `delta_ms`, clamped to the valid range
    pub fn change_interval(&mut self, handle: &mut SamplerHandle, delta_ms: i64) {
        let target = (self.interval_ms as i64 + delta_ms)
            .clamp(MIN_INTERVAL_MS as i64, MAX_INTERVAL_MS as i64) as u64;
        match handle.set_interval_ms(target) {
            Ok(()) => {
                self.interval_ms = target;
                self.status = Some(format!("Interval: {} ms", target));
            }
            Err(e) => {
                warn!(error = %e, "interval change rejected");
                self.status = Some(e.to_string());
            }
        }
    }

    pub fn toggle_graph_style(&mut self) {
        self.graph_style = self.graph_style.toggled();
    }

    pub fn cycle_usage_view(&mut self) {
        self.usage_view = self.usage_view.next();
        if self.usage_view == UsageView::Daily {
            self.reload_history();
        }
    }

    pub fn reload_history(&mut self) {
        let today = self.usage.daily.date;
        let from = today - Duration::days(HISTORY_DAYS - 1);
        match self.store.load_history(from, today) {
            Ok(history) => self.history = history,
            Err(e) => {
                warn!(error = %e, "could not read usage history");
                self.history.clear();
            }
        }
        self.history_loaded_for = Some(today);
    }

    /// The last `HISTORY_DAYS` days, oldest first. Today comes from the live
    /// totals; days without a record read as zero.
    pub fn daily_series(&self) -> Vec<DailyUsage> {
        let today = self.usage.daily.date;
        (0..HISTORY_DAYS)
            .rev()
            .map(|back| {
                let date = today - Duration::days(back);
                if date == today {
                    self.usage.daily
                } else {
                    self.history
                        .iter()
                        .find(|d| d.date == date)
                        .copied()
                        .unwrap_or_else(|| DailyUsage::empty(date))
                }
            })
            .collect()
    }

    /// Settings to write back on exit
    pub fn to_config(&self, base: &NetspeedConfig) -> NetspeedConfig {
        info!(adapter = %self.selection, interval_ms = self.interval_ms, "saving settings");
        NetspeedConfig {
            update_interval_ms: self.interval_ms,
            adapter: self.selection.clone(),
            graph_style: self.graph_style,
            ..base.clone()
        }
    }
}

fn next_adapter(adapters: &[String], current: &AdapterSelection) -> AdapterSelection {
    let pos = adapters.iter().position(|a| a == current.label());
    let next = match pos {
        Some(i) => &adapters[(i + 1) % adapters.len()],
        None => match adapters.first() {
            Some(first) => first,
            None => return AdapterSelection::All,
        },
    };
    AdapterSelection::parse(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use netspeed::system::counters::{CounterReading, CounterTarget};
    use netspeed::system::usage::HourlyUsage;
    use netspeed::Result;
    use tempfile::TempDir;

    struct NoCounters;

    impl CounterSource for NoCounters {
        fn adapters(&mut self) -> Vec<String> {
            vec!["eth0".into(), "wlan0".into()]
        }

        fn read(&mut self, _target: &CounterTarget) -> Result<CounterReading> {
            Ok(CounterReading::default())
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, d).unwrap()
    }

    fn usage(date: NaiveDate, down: u64) -> UsageSnapshot {
        UsageSnapshot {
            daily: DailyUsage { date, download_bytes: down, upload_bytes: 0 },
            hourly: HourlyUsage::default(),
        }
    }

    fn app(dir: &TempDir, today: NaiveDate) -> App {
        App::new(
            &NetspeedConfig { graph_points: 3, ..Default::default() },
            usage(today, 0),
            CsvStore::new(dir.path()),
            Box::new(NoCounters),
        )
    }

    fn tick(kbps: f64, generation: u64) -> Tick {
        Tick {
            rate: RateSample { download_kbps: kbps, upload_kbps: kbps },
            usage: usage(day(10), 42),
            selection: AdapterSelection::All,
            fell_back: false,
            generation,
        }
    }

    #[test]
    fn test_stale_generation_ticks_are_dropped() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir, day(10));

        assert!(!app.apply_tick(tick(5.0, 0), 1));
        assert!(app.rates.is_empty());

        assert!(app.apply_tick(tick(7.0, 1), 1));
        assert_eq!(app.current().download_kbps, 7.0);
        assert_eq!(app.usage.daily.download_bytes, 42);
    }

    #[test]
    fn test_rate_buffer_uses_configured_capacity() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir, day(10));
        for n in 0..5 {
            app.apply_tick(tick(n as f64, 0), 0);
        }
        assert_eq!(app.rates.len(), 3);
        assert_eq!(app.rates.snapshot()[0].download_kbps, 2.0);
    }

    #[test]
    fn test_adapter_list_and_cycling_order() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir, day(10));
        assert_eq!(app.adapters(), &["All", "eth0", "wlan0"]);

        assert_eq!(next_adapter(app.adapters(), &AdapterSelection::All), AdapterSelection::Named("eth0".into()));
        assert_eq!(next_adapter(app.adapters(), &AdapterSelection::Named("wlan0".into())), AdapterSelection::All);
        assert_eq!(next_adapter(app.adapters(), &AdapterSelection::Named("gone0".into())), AdapterSelection::All);
        assert_eq!(next_adapter(&[], &AdapterSelection::All), AdapterSelection::All);
    }

    #[test]
    fn test_daily_series_merges_history_and_live_today() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::new(dir.path());
        store.save_daily(&DailyUsage { date: day(8), download_bytes: 80, upload_bytes: 8 }).unwrap();
        store.save_daily(&DailyUsage { date: day(10), download_bytes: 1, upload_bytes: 1 }).unwrap();

        let mut app = app(&dir, day(10));
        app.apply_tick(tick(1.0, 0), 0);

        let series = app.daily_series();
        assert_eq!(series.len(), HISTORY_DAYS as usize);
        assert_eq!(series[0].date, day(4));
        assert_eq!(series[4], DailyUsage { date: day(8), download_bytes: 80, upload_bytes: 8 });
        assert_eq!(series[5], DailyUsage::empty(day(9)));
        assert_eq!(series[6].download_bytes, 42);
    }

    #[test]
    fn test_usage_view_cycle_and_graph_toggle() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir, day(10));
        app.cycle_usage_view();
        assert_eq!(app.usage_view, UsageView::Daily);
        app.cycle_usage_view();
        app.cycle_usage_view();
        assert_eq!(app.usage_view, UsageView::Hourly);

        app.toggle_graph_style();
        assert_eq!(app.graph_style, GraphStyle::Bar);
        assert_eq!(app.to_config(&NetspeedConfig::default()).graph_style, GraphStyle::Bar);
    }
}
