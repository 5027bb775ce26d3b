//! Calendar-bucketed usage totals: one running day plus 24 hourly buckets.

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::system::store::UsageStore;

pub const HOURS_PER_DAY: usize = 24;

/// Bytes moved during one hour of the current day
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HourBucket {
    pub download_bytes: u64,
    pub upload_bytes: u64,
}

/// Hour-of-day (0-23) to bytes, for the current day only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HourlyUsage {
    buckets: [HourBucket; HOURS_PER_DAY],
}

impl HourlyUsage {
    /// Bucket for `hour`; hours past 23 read as empty.
    pub fn get(&self, hour: u32) -> HourBucket {
        self.buckets.get(hour as usize).copied().unwrap_or_default()
    }

    /// Overwrite one bucket. Returns false (and changes nothing) for hours past 23.
    pub fn set(&mut self, hour: u32, bucket: HourBucket) -> bool {
        match self.buckets.get_mut(hour as usize) {
            Some(slot) => {
                *slot = bucket;
                true
            }
            None => false,
        }
    }

    pub fn add(&mut self, hour: u32, download_bytes: u64, upload_bytes: u64) {
        if let Some(slot) = self.buckets.get_mut(hour as usize) {
            slot.download_bytes = slot.download_bytes.saturating_add(download_bytes);
            slot.upload_bytes = slot.upload_bytes.saturating_add(upload_bytes);
        }
    }

    pub fn clear(&mut self) {
        self.buckets = [HourBucket::default(); HOURS_PER_DAY];
    }

    /// `(hour, bucket)` for all 24 hours, midnight first
    pub fn iter(&self) -> impl Iterator<Item = (u32, HourBucket)> + '_ {
        self.buckets.iter().enumerate().map(|(h, b)| (h as u32, *b))
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|b| *b == HourBucket::default())
    }
}

/// Running totals for one calendar day. Also the row shape of the daily
/// and history CSV tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DailyUsage {
    pub date: NaiveDate,
    pub download_bytes: u64,
    pub upload_bytes: u64,
}

impl DailyUsage {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            download_bytes: 0,
            upload_bytes: 0,
        }
    }
}

/// Copy of the aggregator state handed to the front-end
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageSnapshot {
    pub daily: DailyUsage,
    pub hourly: HourlyUsage,
}

/// Accumulates interval byte deltas into today's totals and flushes them to
/// a [`UsageStore`]. Owned by the sampling thread; nobody else mutates it.
pub struct UsageAggregator<S: UsageStore> {
    store: S,
    daily: DailyUsage,
    hourly: HourlyUsage,
}

impl<S: UsageStore> UsageAggregator<S> {
    /// Restore today's totals from `store`.
    ///
    /// Prior data is only picked up when the stored daily record is for
    /// `today`; the hourly table is trusted only in that case. Anything
    /// else (missing file, corrupt rows, a record from another day, an I/O
    /// error) starts both tables at zero.
    pub fn open(store: S, today: NaiveDate) -> Self {
        let restored = match store.load_daily(today) {
            Ok(Some(daily)) if daily.date == today => Some(daily),
            Ok(Some(stale)) => {
                debug!(date = %stale.date, "stored usage is from another day, starting fresh");
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "could not load daily usage, starting at zero");
                None
            }
        };

        let (daily, hourly) = match restored {
            Some(daily) => {
                let hourly = store.load_hourly().unwrap_or_else(|e| {
                    warn!(error = %e, "could not load hourly usage, starting at zero");
                    HourlyUsage::default()
                });
                info!(
                    date = %daily.date,
                    download = daily.download_bytes,
                    upload = daily.upload_bytes,
                    "restored today's usage"
                );
                (daily, hourly)
            }
            None => (DailyUsage::empty(today), HourlyUsage::default()),
        };

        Self { store, daily, hourly }
    }

    /// Add one interval's bytes at `timestamp`.
    ///
    /// If `timestamp` falls on a different day than the running totals, the
    /// old day is saved (daily then hourly) before both tables are reset.
    /// Returns true when that rollover happened.
    pub fn accumulate(&mut self, download_bytes: u64, upload_bytes: u64, timestamp: NaiveDateTime) -> bool {
        let date = timestamp.date();
        let rolled_over = date != self.daily.date;
        if rolled_over {
            self.roll_over(date);
        }

        self.daily.download_bytes = self.daily.download_bytes.saturating_add(download_bytes);
        self.daily.upload_bytes = self.daily.upload_bytes.saturating_add(upload_bytes);
        self.hourly.add(timestamp.hour(), download_bytes, upload_bytes);
        rolled_over
    }

    fn roll_over(&mut self, date: NaiveDate) {
        info!(
            from = %self.daily.date,
            to = %date,
            download = self.daily.download_bytes,
            upload = self.daily.upload_bytes,
            "day rollover"
        );
        // Persist before reset: a crash right after this still has the old day on disk.
        self.flush();
        self.daily = DailyUsage::empty(date);
        self.hourly.clear();
    }

    /// Save the daily and hourly tables. Failures are logged and swallowed;
    /// returns false if either write failed.
    pub fn flush(&mut self) -> bool {
        let mut ok = true;
        if let Err(e) = self.store.save_daily(&self.daily) {
            warn!(error = %e, "failed to save daily usage");
            ok = false;
        }
        if let Err(e) = self.store.save_hourly(&self.hourly) {
            warn!(error = %e, "failed to save hourly usage");
            ok = false;
        }
        debug!(ok, "usage flushed");
        ok
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            daily: self.daily,
            hourly: self.hourly.clone(),
        }
    }

    pub fn daily(&self) -> &DailyUsage {
        &self.daily
    }

    pub fn hourly(&self) -> &HourlyUsage {
        &self.hourly
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NetError, Result};
    use mockall::{mock, predicate::eq, Sequence};
    use proptest::prelude::*;

    mock! {
        pub Store {}

        impl UsageStore for Store {
            fn load_daily(&self, date: NaiveDate) -> Result<Option<DailyUsage>>;
            fn save_daily(&self, usage: &DailyUsage) -> Result<()>;
            fn load_hourly(&self) -> Result<HourlyUsage>;
            fn save_hourly(&self, usage: &HourlyUsage) -> Result<()>;
            fn load_history(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailyUsage>>;
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    fn at(d: u32, hour: u32) -> NaiveDateTime {
        day(d).and_hms_opt(hour, 30, 0).unwrap()
    }

    fn empty_store() -> MockStore {
        let mut store = MockStore::new();
        store.expect_load_daily().returning(|_| Ok(None));
        store
    }

    fn write_error() -> NetError {
        NetError::PersistenceWrite { path: "data_usage.csv".into(), reason: "disk full".into() }
    }

    #[test]
    fn test_open_without_prior_data_starts_at_zero() {
        let aggregator = UsageAggregator::open(empty_store(), day(3));
        assert_eq!(*aggregator.daily(), DailyUsage::empty(day(3)));
        assert!(aggregator.hourly().is_empty());
    }

    #[test]
    fn test_open_restores_today_with_hourly() {
        let mut store = MockStore::new();
        store.expect_load_daily().with(eq(day(3))).returning(|date| {
            Ok(Some(DailyUsage { date, download_bytes: 500, upload_bytes: 50 }))
        });
        store.expect_load_hourly().times(1).returning(|| {
            let mut hourly = HourlyUsage::default();
            hourly.add(9, 500, 50);
            Ok(hourly)
        });

        let aggregator = UsageAggregator::open(store, day(3));
        assert_eq!(aggregator.daily().download_bytes, 500);
        assert_eq!(aggregator.hourly().get(9).upload_bytes, 50);
    }

    #[test]
    fn test_open_ignores_stale_day_and_skips_hourly() {
        let mut store = MockStore::new();
        store.expect_load_daily().returning(|_| {
            Ok(Some(DailyUsage { date: day(1), download_bytes: 999, upload_bytes: 999 }))
        });
        store.expect_load_hourly().never();

        let aggregator = UsageAggregator::open(store, day(3));
        assert_eq!(*aggregator.daily(), DailyUsage::empty(day(3)));
    }

    #[test]
    fn test_open_survives_read_failures() {
        let mut store = MockStore::new();
        store.expect_load_daily().returning(|_| {
            Err(NetError::PersistenceRead { path: "data_usage.csv".into(), reason: "bad row".into() })
        });
        let aggregator = UsageAggregator::open(store, day(3));
        assert_eq!(aggregator.daily().download_bytes, 0);

        let mut store = MockStore::new();
        store.expect_load_daily().returning(|date| {
            Ok(Some(DailyUsage { date, download_bytes: 10, upload_bytes: 20 }))
        });
        store.expect_load_hourly().returning(|| {
            Err(NetError::PersistenceRead { path: "hourly_usage.csv".into(), reason: "bad hour".into() })
        });
        let aggregator = UsageAggregator::open(store, day(3));
        assert_eq!(aggregator.daily().upload_bytes, 20);
        assert!(aggregator.hourly().is_empty());
    }

    #[test]
    fn test_accumulates_daily_and_hourly() {
        let mut aggregator = UsageAggregator::open(empty_store(), day(3));
        assert!(!aggregator.accumulate(2048, 1024, at(3, 8)));
        aggregator.accumulate(2048, 1024, at(3, 8));
        aggregator.accumulate(100, 0, at(3, 9));

        assert_eq!(aggregator.daily().download_bytes, 4196);
        assert_eq!(aggregator.daily().upload_bytes, 2048);
        assert_eq!(aggregator.hourly().get(8), HourBucket { download_bytes: 4096, upload_bytes: 2048 });
        assert_eq!(aggregator.hourly().get(9).download_bytes, 100);
    }

    #[test]
    fn test_rollover_saves_old_day_before_reset() {
        let mut store = empty_store();
        let mut seq = Sequence::new();
        store
            .expect_save_daily()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|d| *d == DailyUsage { date: day(3), download_bytes: 300, upload_bytes: 30 })
            .returning(|_| Ok(()));
        store
            .expect_save_hourly()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|h| h.get(23) == HourBucket { download_bytes: 300, upload_bytes: 30 } && h.get(0) == HourBucket::default())
            .returning(|_| Ok(()));

        let mut aggregator = UsageAggregator::open(store, day(3));
        aggregator.accumulate(300, 30, at(3, 23));
        assert!(aggregator.accumulate(7, 3, at(4, 0)));

        assert_eq!(*aggregator.daily(), DailyUsage { date: day(4), download_bytes: 7, upload_bytes: 3 });
        assert_eq!(aggregator.hourly().get(0), HourBucket { download_bytes: 7, upload_bytes: 3 });
        assert_eq!(aggregator.hourly().get(23), HourBucket::default());
    }

    #[test]
    fn test_save_failure_is_not_fatal() {
        let mut store = empty_store();
        store.expect_save_daily().returning(|_| Err(write_error()));
        store.expect_save_hourly().returning(|_| Ok(()));

        let mut aggregator = UsageAggregator::open(store, day(3));
        aggregator.accumulate(10, 10, at(3, 12));
        assert!(!aggregator.flush());

        aggregator.accumulate(10, 10, at(4, 1));
        assert_eq!(aggregator.daily().download_bytes, 10);
        assert_eq!(aggregator.daily().date, day(4));
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut aggregator = UsageAggregator::open(empty_store(), day(3));
        aggregator.accumulate(1, 2, at(3, 5));
        let snap = aggregator.snapshot();
        aggregator.accumulate(1, 2, at(3, 5));
        assert_eq!(snap.daily.download_bytes, 1);
        assert_eq!(snap.hourly.get(5).upload_bytes, 2);
    }

    #[test]
    fn test_hourly_bounds() {
        let mut hourly = HourlyUsage::default();
        assert!(!hourly.set(24, HourBucket { download_bytes: 1, upload_bytes: 1 }));
        hourly.add(24, 5, 5);
        assert!(hourly.is_empty());
        assert_eq!(hourly.get(99), HourBucket::default());
        assert_eq!(hourly.iter().count(), HOURS_PER_DAY);
    }

    proptest! {
        #[test]
        fn prop_integer_accumulation_is_exact(
            deltas in proptest::collection::vec((0u64..1 << 32, 0u64..1 << 32, 0u32..24), 0..300)
        ) {
            let mut aggregator = UsageAggregator::open(empty_store(), day(3));
            let mut down = 0u64;
            let mut up = 0u64;
            for (d, u, hour) in &deltas {
                aggregator.accumulate(*d, *u, at(3, *hour));
                down += d;
                up += u;
            }
            prop_assert_eq!(aggregator.daily().download_bytes, down);
            prop_assert_eq!(aggregator.daily().upload_bytes, up);
            let hourly_down: u64 = aggregator.hourly().iter().map(|(_, b)| b.download_bytes).sum();
            prop_assert_eq!(hourly_down, down);
        }
    }
}
