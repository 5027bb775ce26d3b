//! Converts cumulative counters into per-interval rates and byte deltas.

use std::fmt;
use std::time::Duration;

use chrono::NaiveDateTime;
use tracing::debug;

use crate::error::{NetError, Result};
use crate::system::counters::{CounterReading, CounterSource, CounterTarget, ALL_ADAPTERS};

/// Which interface the user wants to watch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum AdapterSelection {
    #[default]
    All,
    Named(String),
}

impl AdapterSelection {
    /// "All" (any case) or an empty string select the aggregate.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case(ALL_ADAPTERS) {
            Self::All
        } else {
            Self::Named(value.to_string())
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::All => ALL_ADAPTERS,
            Self::Named(name) => name,
        }
    }

    /// Counter set to read before any fallback.
    pub fn target(&self) -> CounterTarget {
        match self {
            Self::All => CounterTarget::All,
            Self::Named(name) => CounterTarget::Interface(name.clone()),
        }
    }
}

impl fmt::Display for AdapterSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One counter read, kept as the baseline for the next delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub timestamp: NaiveDateTime,
    /// Counter set the bytes came from; deltas across different sets are meaningless
    pub target: CounterTarget,
}

/// Throughput over one interval, in KiB per second.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateSample {
    pub download_kbps: f64,
    pub upload_kbps: f64,
}

impl RateSample {
    /// `bytes / 1024 / seconds` for each direction. A zero interval yields zero.
    pub fn from_deltas(download_bytes: u64, upload_bytes: u64, interval: Duration) -> Self {
        let secs = interval.as_secs_f64();
        if secs <= 0.0 {
            return Self::default();
        }
        Self {
            download_kbps: download_bytes as f64 / 1024.0 / secs,
            upload_kbps: upload_bytes as f64 / 1024.0 / secs,
        }
    }
}

/// Result of one sampling tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub rate: RateSample,
    /// Baseline for the following tick
    pub snapshot: CounterSnapshot,
    pub download_bytes: u64,
    pub upload_bytes: u64,
    /// The named adapter was missing and the aggregate was read instead
    pub fell_back: bool,
}

/// Read the counters for `selection`, falling back to the aggregate when a
/// named adapter has disappeared. Returns the snapshot and whether the
/// fallback was taken.
pub fn read_snapshot(
    source: &mut dyn CounterSource,
    selection: &AdapterSelection,
    timestamp: NaiveDateTime,
) -> Result<(CounterSnapshot, bool)> {
    let target = selection.target();
    let (reading, target, fell_back) = match source.read(&target) {
        Ok(reading) => (reading, target, false),
        Err(NetError::AdapterUnavailable(name)) => {
            debug!(adapter = %name, "adapter missing, reading aggregate");
            (source.read(&CounterTarget::All)?, CounterTarget::All, true)
        }
        Err(e) => return Err(e),
    };

    Ok((snapshot_from(reading, target, timestamp), fell_back))
}

/// Take one tick: read the current counters and diff them against `previous`.
/// `interval` is the time the delta spans, which is longer than one tick when
/// reads in between failed.
///
/// Negative deltas (counter reset or wraparound) clamp to zero. When the
/// resolved counter set differs from the one `previous` was read from, the
/// delta is also zero and the new reading simply becomes the baseline.
pub fn sample(
    source: &mut dyn CounterSource,
    previous: &CounterSnapshot,
    selection: &AdapterSelection,
    interval: Duration,
    timestamp: NaiveDateTime,
) -> Result<Sample> {
    let (snapshot, fell_back) = read_snapshot(source, selection, timestamp)?;

    let (download_bytes, upload_bytes) = if snapshot.target == previous.target {
        (
            snapshot.bytes_received.saturating_sub(previous.bytes_received),
            snapshot.bytes_sent.saturating_sub(previous.bytes_sent),
        )
    } else {
        debug!(from = ?previous.target, to = ?snapshot.target, "counter set changed, rebaselining");
        (0, 0)
    };

    Ok(Sample {
        rate: RateSample::from_deltas(download_bytes, upload_bytes, interval),
        snapshot,
        download_bytes,
        upload_bytes,
        fell_back,
    })
}

fn snapshot_from(reading: CounterReading, target: CounterTarget, timestamp: NaiveDateTime) -> CounterSnapshot {
    CounterSnapshot {
        bytes_received: reading.bytes_received,
        bytes_sent: reading.bytes_sent,
        timestamp,
        target,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use std::collections::HashMap;

    /// Counter source with hand-set per-interface totals
    #[derive(Default)]
    struct FakeCounters {
        interfaces: HashMap<String, CounterReading>,
        fail: bool,
    }

    impl FakeCounters {
        fn set(&mut self, name: &str, rx: u64, tx: u64) {
            self.interfaces.insert(
                name.to_string(),
                CounterReading { bytes_received: rx, bytes_sent: tx },
            );
        }
    }

    impl CounterSource for FakeCounters {
        fn adapters(&mut self) -> Vec<String> {
            let mut names: Vec<String> = self.interfaces.keys().cloned().collect();
            names.sort();
            names
        }

        fn read(&mut self, target: &CounterTarget) -> Result<CounterReading> {
            if self.fail {
                return Err(NetError::CounterRead("device busy".into()));
            }
            match target {
                CounterTarget::All => Ok(self.interfaces.values().fold(CounterReading::default(), |acc, r| {
                    CounterReading {
                        bytes_received: acc.bytes_received + r.bytes_received,
                        bytes_sent: acc.bytes_sent + r.bytes_sent,
                    }
                })),
                CounterTarget::Interface(name) => self
                    .interfaces
                    .get(name)
                    .copied()
                    .ok_or_else(|| NetError::AdapterUnavailable(name.clone())),
            }
        }
    }

    fn at(secs: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(10, 0, secs)
            .unwrap()
    }

    fn snap(rx: u64, tx: u64, target: CounterTarget) -> CounterSnapshot {
        CounterSnapshot { bytes_received: rx, bytes_sent: tx, timestamp: at(0), target }
    }

    #[test]
    fn test_parse_selection() {
        assert_eq!(AdapterSelection::parse("All"), AdapterSelection::All);
        assert_eq!(AdapterSelection::parse(" all "), AdapterSelection::All);
        assert_eq!(AdapterSelection::parse(""), AdapterSelection::All);
        assert_eq!(AdapterSelection::parse("eth0"), AdapterSelection::Named("eth0".into()));
        assert_eq!(AdapterSelection::Named("wlan0".into()).to_string(), "wlan0");
    }

    #[test]
    fn test_two_ticks_on_named_adapter() {
        let mut source = FakeCounters::default();
        source.set("eth0", 10_000, 5_000);
        source.set("wlan0", 1, 1);
        let selection = AdapterSelection::Named("eth0".into());

        let (mut previous, fell_back) = read_snapshot(&mut source, &selection, at(0)).unwrap();
        assert!(!fell_back);

        for tick in 1..=2u64 {
            source.set("eth0", 10_000 + 2048 * tick, 5_000 + 1024 * tick);
            let s = sample(&mut source, &previous, &selection, Duration::from_secs(1), at(tick as u32)).unwrap();
            assert_eq!(s.rate, RateSample { download_kbps: 2.0, upload_kbps: 1.0 });
            assert_eq!((s.download_bytes, s.upload_bytes), (2048, 1024));
            previous = s.snapshot;
        }
        assert_eq!(previous.bytes_received, 10_000 + 4096);
    }

    #[test]
    fn test_counter_reset_clamps_to_zero() {
        let mut source = FakeCounters::default();
        source.set("eth0", 100, 900);
        let previous = snap(5_000, 800, CounterTarget::Interface("eth0".into()));

        let s = sample(
            &mut source,
            &previous,
            &AdapterSelection::Named("eth0".into()),
            Duration::from_secs(1),
            at(1),
        )
        .unwrap();

        assert_eq!(s.download_bytes, 0);
        assert_eq!(s.upload_bytes, 100);
        assert_eq!(s.rate.download_kbps, 0.0);
    }

    #[test]
    fn test_missing_adapter_falls_back_to_aggregate() {
        let mut source = FakeCounters::default();
        source.set("eth0", 3_000, 2_000);
        source.set("wlan0", 1_000, 1_000);
        let selection = AdapterSelection::Named("usb0".into());

        let (snapshot, fell_back) = read_snapshot(&mut source, &selection, at(0)).unwrap();
        assert!(fell_back);
        assert_eq!(snapshot.target, CounterTarget::All);
        assert_eq!((snapshot.bytes_received, snapshot.bytes_sent), (4_000, 3_000));
    }

    #[test]
    fn test_adapter_vanishing_mid_run_rebaselines() {
        let mut source = FakeCounters::default();
        source.set("eth0", 1_000, 1_000);
        source.set("wlan0", 50_000, 50_000);
        let selection = AdapterSelection::Named("eth0".into());
        let (previous, _) = read_snapshot(&mut source, &selection, at(0)).unwrap();

        source.interfaces.remove("eth0");
        let s = sample(&mut source, &previous, &selection, Duration::from_secs(1), at(1)).unwrap();

        assert!(s.fell_back);
        assert_eq!((s.download_bytes, s.upload_bytes), (0, 0));
        assert_eq!(s.snapshot.target, CounterTarget::All);
        assert_eq!(s.snapshot.bytes_received, 50_000);
    }

    #[test]
    fn test_read_failure_propagates() {
        let mut source = FakeCounters { fail: true, ..Default::default() };
        let previous = snap(0, 0, CounterTarget::All);
        let err = sample(&mut source, &previous, &AdapterSelection::All, Duration::from_secs(1), at(1)).unwrap_err();
        assert!(matches!(err, NetError::CounterRead(_)));
    }

    #[test]
    fn test_zero_interval_yields_zero_rate() {
        assert_eq!(RateSample::from_deltas(4096, 4096, Duration::ZERO), RateSample::default());
    }

    proptest! {
        #[test]
        fn prop_rate_matches_formula(
            old_rx in 0u64..1 << 40,
            old_tx in 0u64..1 << 40,
            d_rx in 0u64..1 << 30,
            d_tx in 0u64..1 << 30,
            interval_ms in 100u64..=5000,
        ) {
            let mut source = FakeCounters::default();
            source.set("eth0", old_rx + d_rx, old_tx + d_tx);
            let previous = snap(old_rx, old_tx, CounterTarget::All);
            let interval = Duration::from_millis(interval_ms);

            let s = sample(&mut source, &previous, &AdapterSelection::All, interval, at(1)).unwrap();

            let secs = interval_ms as f64 / 1000.0;
            prop_assert_eq!(s.download_bytes, d_rx);
            prop_assert_eq!(s.upload_bytes, d_tx);
            prop_assert!((s.rate.download_kbps - d_rx as f64 / 1024.0 / secs).abs() < 1e-6);
            prop_assert!((s.rate.upload_kbps - d_tx as f64 / 1024.0 / secs).abs() < 1e-6);
            prop_assert!(s.rate.download_kbps >= 0.0 && s.rate.upload_kbps >= 0.0);
        }

        #[test]
        fn prop_backwards_counters_never_negative(
            new_rx in 0u64..1 << 40,
            new_tx in 0u64..1 << 40,
            back_rx in 1u64..1 << 20,
            back_tx in 1u64..1 << 20,
        ) {
            let mut source = FakeCounters::default();
            source.set("eth0", new_rx, new_tx);
            let previous = snap(new_rx + back_rx, new_tx + back_tx, CounterTarget::All);

            let s = sample(&mut source, &previous, &AdapterSelection::All, Duration::from_secs(1), at(1)).unwrap();

            prop_assert_eq!(s.download_bytes, 0);
            prop_assert_eq!(s.upload_bytes, 0);
            prop_assert_eq!(s.rate, RateSample::default());
        }
    }
}
