//! The sampling thread and the queue between it and the front-end.
//!
//! The sampler thread owns the counter source and the usage aggregator. Each
//! tick it reads counters, accumulates the interval bytes, and sends a
//! [`Tick`] down an mpsc channel. The front-end drains that channel on its
//! own cadence without blocking. Control flows the other way on a second
//! channel; dropping the sending side of it is the shutdown signal.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::error::{NetError, Result};
use crate::system::counters::CounterSource;
use crate::system::sampler::{read_snapshot, sample, AdapterSelection, CounterSnapshot, RateSample};
use crate::system::store::UsageStore;
use crate::system::usage::{UsageAggregator, UsageSnapshot};

pub const MIN_INTERVAL_MS: u64 = 100;
pub const MAX_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_AUTOSAVE_SECS: u64 = 60;

/// Accept an update interval in `MIN_INTERVAL_MS..=MAX_INTERVAL_MS`.
pub fn validate_interval_ms(ms: u64) -> Result<u64> {
    if (MIN_INTERVAL_MS..=MAX_INTERVAL_MS).contains(&ms) {
        Ok(ms)
    } else {
        Err(NetError::invalid(
            "update_interval_ms",
            format!("{} is outside {}..={}", ms, MIN_INTERVAL_MS, MAX_INTERVAL_MS),
        ))
    }
}

#[derive(Debug, Clone)]
pub struct SamplerSettings {
    pub interval: Duration,
    pub selection: AdapterSelection,
    /// How often the aggregator is checkpointed to disk between rollovers
    pub autosave: Duration,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            selection: AdapterSelection::All,
            autosave: Duration::from_secs(DEFAULT_AUTOSAVE_SECS),
        }
    }
}

/// One sampling result as seen by the front-end.
#[derive(Debug, Clone)]
pub struct Tick {
    pub rate: RateSample,
    /// Aggregator state right after this tick was accumulated
    pub usage: UsageSnapshot,
    pub selection: AdapterSelection,
    /// The selected adapter was missing and the aggregate was sampled
    pub fell_back: bool,
    /// Adapter-switch generation the tick was sampled under
    pub generation: u64,
}

enum Command {
    SelectAdapter { selection: AdapterSelection, generation: u64 },
    SetInterval(Duration),
}

/// Front-end side of a running sampler.
pub struct SamplerHandle {
    commands: Option<Sender<Command>>,
    ticks: Receiver<Tick>,
    thread: Option<JoinHandle<UsageSnapshot>>,
    generation: u64,
    interval_ms: u64,
    selection: AdapterSelection,
}

impl SamplerHandle {
    /// Start the sampler thread.
    pub fn spawn<C, S>(source: C, aggregator: UsageAggregator<S>, settings: SamplerSettings) -> Result<Self>
    where
        C: CounterSource + 'static,
        S: UsageStore + Send + 'static,
    {
        Self::spawn_with_clock(source, aggregator, settings, local_now)
    }

    /// Like [`spawn`](Self::spawn) with an explicit wall clock.
    pub fn spawn_with_clock<C, S>(
        source: C,
        aggregator: UsageAggregator<S>,
        settings: SamplerSettings,
        clock: fn() -> NaiveDateTime,
    ) -> Result<Self>
    where
        C: CounterSource + 'static,
        S: UsageStore + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::channel();
        let (tick_tx, tick_rx) = mpsc::channel();

        let interval_ms = settings.interval.as_millis() as u64;
        let selection = settings.selection.clone();

        let sampler = Sampler {
            source,
            aggregator,
            selection: settings.selection,
            interval: settings.interval,
            pending_interval: None,
            skipped: Duration::ZERO,
            autosave: settings.autosave,
            generation: 0,
            fell_back: false,
            commands: command_rx,
            ticks: tick_tx,
            clock,
        };

        let thread = thread::Builder::new()
            .name("sampler".into())
            .spawn(move || sampler.run())?;

        Ok(Self {
            commands: Some(command_tx),
            ticks: tick_rx,
            thread: Some(thread),
            generation: 0,
            interval_ms,
            selection,
        })
    }

    /// Every tick queued since the last drain, oldest first. Never blocks.
    pub fn drain(&self) -> Vec<Tick> {
        self.ticks.try_iter().collect()
    }

    /// Switch adapters. Returns the new generation; ticks carrying an older
    /// generation were sampled from the previous adapter.
    pub fn select_adapter(&mut self, selection: AdapterSelection) -> u64 {
        self.generation += 1;
        info!(adapter = %selection, generation = self.generation, "adapter selected");
        self.selection = selection.clone();
        self.send(Command::SelectAdapter {
            selection,
            generation: self.generation,
        });
        self.generation
    }

    /// Change the sampling interval; out-of-range values are rejected and
    /// the current interval stays.
    pub fn set_interval_ms(&mut self, ms: u64) -> Result<()> {
        let ms = validate_interval_ms(ms)?;
        self.interval_ms = ms;
        self.send(Command::SetInterval(Duration::from_millis(ms)));
        Ok(())
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn selection(&self) -> &AdapterSelection {
        &self.selection
    }

    /// Stop the sampler and wait for its final flush. Returns the usage as it
    /// stood when the sampler exited, or `None` if the thread panicked.
    pub fn shutdown(mut self) -> Option<UsageSnapshot> {
        self.stop()
    }

    fn stop(&mut self) -> Option<UsageSnapshot> {
        // Closing the command channel wakes the sampler out of its wait.
        drop(self.commands.take());
        let handle = self.thread.take()?;
        match handle.join() {
            Ok(usage) => Some(usage),
            Err(_) => {
                warn!("sampler thread panicked");
                None
            }
        }
    }

    fn send(&self, command: Command) {
        if let Some(tx) = &self.commands {
            if tx.send(command).is_err() {
                warn!("sampler is not running, command dropped");
            }
        }
    }
}

impl Drop for SamplerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

struct Sampler<C, S: UsageStore> {
    source: C,
    aggregator: UsageAggregator<S>,
    selection: AdapterSelection,
    interval: Duration,
    /// Takes effect after the tick in progress, so each delta is divided by
    /// the interval it was actually measured over
    pending_interval: Option<Duration>,
    /// Time covered by failed ticks since the baseline was read
    skipped: Duration,
    autosave: Duration,
    generation: u64,
    fell_back: bool,
    commands: Receiver<Command>,
    ticks: Sender<Tick>,
    clock: fn() -> NaiveDateTime,
}

impl<C: CounterSource, S: UsageStore> Sampler<C, S> {
    fn run(mut self) -> UsageSnapshot {
        info!(
            adapter = %self.selection,
            interval_ms = self.interval.as_millis() as u64,
            "sampler started"
        );

        let mut previous = self.baseline();
        let mut next_tick = Instant::now() + self.interval;
        let mut last_save = Instant::now();

        loop {
            let wait = next_tick.saturating_duration_since(Instant::now());
            match self.commands.recv_timeout(wait) {
                Ok(Command::SelectAdapter { selection, generation }) => {
                    self.selection = selection;
                    self.generation = generation;
                    previous = self.baseline();
                    next_tick = Instant::now() + self.interval;
                }
                Ok(Command::SetInterval(interval)) => {
                    debug!(interval_ms = interval.as_millis() as u64, "interval change queued");
                    self.pending_interval = Some(interval);
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.tick(&mut previous);

                    if let Some(interval) = self.pending_interval.take() {
                        self.interval = interval;
                    }
                    // Schedule from now rather than catching up after a stall.
                    next_tick = (next_tick + self.interval).max(Instant::now());

                    if last_save.elapsed() >= self.autosave {
                        self.aggregator.flush();
                        last_save = Instant::now();
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        info!("sampler stopping, saving usage");
        self.aggregator.flush();
        self.aggregator.snapshot()
    }

    /// Fresh counter reading for the current selection, or `None` when the
    /// counters cannot be read right now.
    fn baseline(&mut self) -> Option<CounterSnapshot> {
        self.skipped = Duration::ZERO;
        match read_snapshot(&mut self.source, &self.selection, (self.clock)()) {
            Ok((snapshot, fell_back)) => {
                self.note_fallback(fell_back);
                Some(snapshot)
            }
            Err(e) => {
                warn!(error = %e, "counter baseline failed");
                None
            }
        }
    }

    fn tick(&mut self, previous: &mut Option<CounterSnapshot>) {
        let prev = match previous.clone() {
            Some(prev) => prev,
            None => {
                *previous = self.baseline();
                return;
            }
        };

        let now = (self.clock)();
        // The delta runs from the baseline, so it spans any skipped ticks too.
        let span = self.interval + self.skipped;
        let result = sample(&mut self.source, &prev, &self.selection, span, now);
        let sample = match result {
            Ok(sample) => sample,
            Err(e) => {
                warn!(error = %e, "tick skipped");
                self.skipped += self.interval;
                return;
            }
        };
        self.skipped = Duration::ZERO;

        self.note_fallback(sample.fell_back);
        self.aggregator.accumulate(sample.download_bytes, sample.upload_bytes, now);

        let tick = Tick {
            rate: sample.rate,
            usage: self.aggregator.snapshot(),
            selection: self.selection.clone(),
            fell_back: sample.fell_back,
            generation: self.generation,
        };
        // The front-end may already be gone during shutdown.
        let _ = self.ticks.send(tick);
        *previous = Some(sample.snapshot);
    }

    fn note_fallback(&mut self, fell_back: bool) {
        if fell_back && !self.fell_back {
            warn!(adapter = %self.selection, "selected adapter unavailable, sampling all adapters");
        } else if !fell_back && self.fell_back {
            info!(adapter = %self.selection, "selected adapter is back");
        }
        self.fell_back = fell_back;
    }
}
