//! Flat CSV persistence for usage tables.
//!
//! Three files live in the data directory:
//!   - `data_usage.csv`     Date,DownloadBytes,UploadBytes (header + one row: the running day)
//!   - `hourly_usage.csv`   Hour,DownloadBytes,UploadBytes (header + 24 rows)
//!   - `usage_history.csv`  Date,DownloadBytes,UploadBytes (one row per day, oldest first)
//!
//! Every save rewrites the whole table through a temp file + rename.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{NetError, Result};
use crate::system::usage::{DailyUsage, HourBucket, HourlyUsage};

pub const DAILY_FILE: &str = "data_usage.csv";
pub const HOURLY_FILE: &str = "hourly_usage.csv";
pub const HISTORY_FILE: &str = "usage_history.csv";

/// Days of history kept in `usage_history.csv`
pub const HISTORY_RETENTION_DAYS: i64 = 366;

/// Durable home for the aggregator's tables.
pub trait UsageStore {
    /// The stored daily record if it is for `date`, `None` if absent or for another day.
    fn load_daily(&self, date: NaiveDate) -> Result<Option<DailyUsage>>;
    fn save_daily(&self, usage: &DailyUsage) -> Result<()>;
    /// The stored hourly table; a missing file reads as all zero.
    fn load_hourly(&self) -> Result<HourlyUsage>;
    fn save_hourly(&self, usage: &HourlyUsage) -> Result<()>;
    /// Recorded days in `from..=to`, oldest first.
    fn load_history(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailyUsage>>;
}

/// One row of `hourly_usage.csv`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HourRow {
    hour: u32,
    download_bytes: u64,
    upload_bytes: u64,
}

/// [`UsageStore`] over CSV files in one directory
#[derive(Debug, Clone)]
pub struct CsvStore {
    dir: PathBuf,
}

impl CsvStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    /// Every data row of `file` keyed by header name, or `None` if the file
    /// does not exist yet. Each row parses independently.
    fn read_rows<T: DeserializeOwned>(&self, file: &str) -> Result<Option<Vec<csv::Result<T>>>> {
        let path = self.path(file);
        let handle = match fs::File::open(&path) {
            Ok(handle) => handle,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(read_error(&path, e.to_string())),
        };
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(handle);
        Ok(Some(reader.deserialize().collect()))
    }

    /// Rows of `file`, failing on the first one that does not parse.
    fn read_strict<T: DeserializeOwned>(&self, file: &str) -> Result<Option<Vec<T>>> {
        let path = self.path(file);
        match self.read_rows(file)? {
            Some(rows) => rows
                .into_iter()
                .collect::<csv::Result<Vec<T>>>()
                .map(Some)
                .map_err(|e| read_error(&path, e.to_string())),
            None => Ok(None),
        }
    }

    /// Replace `file` with `rows` under a header: write a sibling temp file,
    /// then rename it over.
    fn write_rows<T: Serialize>(&self, file: &str, rows: impl IntoIterator<Item = T>) -> Result<()> {
        let path = self.path(file);
        let content = encode_rows(rows).map_err(|reason| write_error(&path, reason))?;

        let tmp = self.path(&format!("{}.tmp", file));
        let result = fs::create_dir_all(&self.dir)
            .and_then(|_| {
                let mut out = fs::File::create(&tmp)?;
                out.write_all(&content)?;
                out.sync_all()
            })
            .and_then(|_| fs::rename(&tmp, &path));

        result.map_err(|e| {
            let _ = fs::remove_file(&tmp);
            write_error(&path, e.to_string())
        })?;
        debug!(path = %path.display(), "table written");
        Ok(())
    }

    /// Every history row that parses. Bad rows are dropped with a warning
    /// and disappear on the next rewrite.
    fn read_history(&self) -> Result<BTreeMap<NaiveDate, DailyUsage>> {
        let Some(rows) = self.read_rows::<DailyUsage>(HISTORY_FILE)? else {
            return Ok(BTreeMap::new());
        };
        let mut history = BTreeMap::new();
        for row in rows {
            match row {
                Ok(day) => {
                    history.insert(day.date, day);
                }
                Err(e) => warn!(file = HISTORY_FILE, error = %e, "skipping unreadable history row"),
            }
        }
        Ok(history)
    }

    /// Insert or replace `usage` in the history file, trimming old days.
    fn record_history(&self, usage: &DailyUsage) -> Result<()> {
        let mut history = self.read_history()?;
        history.insert(usage.date, *usage);

        let cutoff = usage.date - Duration::days(HISTORY_RETENTION_DAYS);
        history.retain(|date, _| *date > cutoff);

        self.write_rows(HISTORY_FILE, history.values())
    }
}

impl UsageStore for CsvStore {
    fn load_daily(&self, date: NaiveDate) -> Result<Option<DailyUsage>> {
        let Some(rows) = self.read_strict::<DailyUsage>(DAILY_FILE)? else {
            debug!(file = DAILY_FILE, "no daily usage file yet");
            return Ok(None);
        };
        Ok(rows.into_iter().find(|d| d.date == date))
    }

    /// Also upserts the day into the history file. A history failure is
    /// logged but does not fail the daily save.
    fn save_daily(&self, usage: &DailyUsage) -> Result<()> {
        self.write_rows(DAILY_FILE, std::iter::once(usage))?;
        if let Err(e) = self.record_history(usage) {
            warn!(error = %e, "usage history not updated");
        }
        Ok(())
    }

    fn load_hourly(&self) -> Result<HourlyUsage> {
        let mut hourly = HourlyUsage::default();
        for row in self.read_strict::<HourRow>(HOURLY_FILE)?.unwrap_or_default() {
            let bucket = HourBucket {
                download_bytes: row.download_bytes,
                upload_bytes: row.upload_bytes,
            };
            if !hourly.set(row.hour, bucket) {
                return Err(read_error(
                    &self.path(HOURLY_FILE),
                    format!("{} is not an hour 0-23", row.hour),
                ));
            }
        }
        Ok(hourly)
    }

    fn save_hourly(&self, usage: &HourlyUsage) -> Result<()> {
        let rows = usage.iter().map(|(hour, bucket)| HourRow {
            hour,
            download_bytes: bucket.download_bytes,
            upload_bytes: bucket.upload_bytes,
        });
        self.write_rows(HOURLY_FILE, rows)
    }

    fn load_history(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailyUsage>> {
        Ok(self
            .read_history()?
            .range(from..=to)
            .map(|(_, d)| *d)
            .collect())
    }
}

fn encode_rows<T: Serialize>(rows: impl IntoIterator<Item = T>) -> std::result::Result<Vec<u8>, String> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    for row in rows {
        writer.serialize(row).map_err(|e| e.to_string())?;
    }
    writer.into_inner().map_err(|e| e.to_string())
}

fn read_error(path: &Path, reason: String) -> NetError {
    NetError::PersistenceRead {
        path: path.display().to_string(),
        reason,
    }
}

fn write_error(path: &Path, reason: String) -> NetError {
    NetError::PersistenceWrite {
        path: path.display().to_string(),
        reason,
    }
}
