//! netspeed configuration persistence (rc-style key=value format)
//!
//! Lives at `<data_local_dir>/netspeed/netspeedrc` unless `--config` says
//! otherwise. Usage CSV files go next to it by default.

use std::fs;
use std::io::Write;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::error::{NetError, Result};
use crate::system::engine::{
    validate_interval_ms, SamplerSettings, DEFAULT_AUTOSAVE_SECS, DEFAULT_INTERVAL_MS,
};
use crate::system::rate_buffer::DEFAULT_CAPACITY;
use crate::system::sampler::AdapterSelection;

pub const CONFIG_FILE: &str = "netspeedrc";

const UI_REFRESH_MS: RangeInclusive<u64> = 50..=5000;
const GRAPH_POINTS: RangeInclusive<u64> = 1..=1000;
const AUTOSAVE_SECS: RangeInclusive<u64> = 5..=3600;

/// Default config file path: <data_local_dir>/netspeed/netspeedrc
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("netspeed").join(CONFIG_FILE))
}

/// How the rolling rate graph is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GraphStyle {
    #[default]
    Line,
    Bar,
}

impl GraphStyle {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Line => "line",
            Self::Bar => "bar",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Line => Self::Bar,
            Self::Bar => Self::Line,
        }
    }
}

/// Persistable settings
#[derive(Debug, Clone, PartialEq)]
pub struct NetspeedConfig {
    pub update_interval_ms: u64,
    pub ui_refresh_ms: u64,
    pub graph_points: usize,
    pub adapter: AdapterSelection,
    pub graph_style: GraphStyle,
    pub autosave_secs: u64,
    /// Where the usage CSV files live; `None` means next to the config file
    pub data_dir: Option<PathBuf>,
}

impl Default for NetspeedConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: DEFAULT_INTERVAL_MS,
            ui_refresh_ms: 500,
            graph_points: DEFAULT_CAPACITY,
            adapter: AdapterSelection::All,
            graph_style: GraphStyle::Line,
            autosave_secs: DEFAULT_AUTOSAVE_SECS,
            data_dir: None,
        }
    }
}

impl NetspeedConfig {
    /// Load config from file, returning defaults if it doesn't exist.
    ///
    /// Rejected values are returned alongside the config (which keeps the
    /// default for those keys) so the caller can report them once logging
    /// is up.
    pub fn load(path: &Path) -> (Self, Vec<NetError>) {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(_) => (Self::default(), Vec::new()),
        }
    }

    pub fn parse(content: &str) -> (Self, Vec<NetError>) {
        let mut cfg = Self::default();
        let mut rejected = Vec::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                if let Err(e) = cfg.set(key.trim(), value.trim()) {
                    rejected.push(e);
                }
            }
        }

        (cfg, rejected)
    }

    /// Apply one `key=value` setting. Invalid values leave the current value in place.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "update_interval_ms" => {
                self.update_interval_ms = validate_interval_ms(parse_number(key, value)?)?;
            }
            "ui_refresh_ms" => self.ui_refresh_ms = parse_ranged(key, value, UI_REFRESH_MS)?,
            "graph_points" => self.graph_points = parse_ranged(key, value, GRAPH_POINTS)? as usize,
            "autosave_secs" => self.autosave_secs = parse_ranged(key, value, AUTOSAVE_SECS)?,
            "adapter" => self.adapter = AdapterSelection::parse(value),
            "graph_type" => {
                self.graph_style = match value.to_lowercase().as_str() {
                    "line" => GraphStyle::Line,
                    "bar" => GraphStyle::Bar,
                    _ => return Err(NetError::invalid(key, format!("'{}' is not line or bar", value))),
                }
            }
            "data_dir" => {
                self.data_dir = if value.is_empty() { None } else { Some(PathBuf::from(value)) };
            }
            _ => debug!(key, "ignoring unknown config key"),
        }
        Ok(())
    }

    /// Save config to file. Written to a sibling temp file and renamed over,
    /// so an interrupted save leaves the old file intact.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let result = fs::File::create(&tmp)
            .and_then(|mut file| {
                file.write_all(self.render().as_bytes())?;
                file.sync_all()
            })
            .and_then(|_| fs::rename(&tmp, path));
        if let Err(e) = result {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        debug!(path = %path.display(), "config saved");
        Ok(())
    }

    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        lines.push("# netspeed configuration file".to_string());
        lines.push("# Rewritten on exit; edit while netspeed is not running".to_string());
        lines.push(String::new());

        lines.push(format!("update_interval_ms={}", self.update_interval_ms));
        lines.push(format!("ui_refresh_ms={}", self.ui_refresh_ms));
        lines.push(format!("graph_points={}", self.graph_points));
        lines.push(format!("graph_type={}", self.graph_style.label()));
        lines.push(format!("adapter={}", self.adapter.label()));
        lines.push(format!("autosave_secs={}", self.autosave_secs));
        if let Some(dir) = &self.data_dir {
            lines.push(format!("data_dir={}", dir.display()));
        }

        lines.join("\n") + "\n"
    }

    /// Directory for the usage files, given where the config file lives
    pub fn data_dir(&self, config_path: &Path) -> PathBuf {
        match &self.data_dir {
            Some(dir) => dir.clone(),
            None => config_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }

    pub fn sampler_settings(&self) -> SamplerSettings {
        SamplerSettings {
            interval: Duration::from_millis(self.update_interval_ms),
            selection: self.adapter.clone(),
            autosave: Duration::from_secs(self.autosave_secs),
        }
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value
        .parse::<u64>()
        .map_err(|_| NetError::invalid(key, format!("'{}' is not a whole number", value)))
}

fn parse_ranged(key: &str, value: &str, range: RangeInclusive<u64>) -> Result<u64> {
    let n = parse_number(key, value)?;
    if range.contains(&n) {
        Ok(n)
    } else {
        Err(NetError::invalid(
            key,
            format!("{} is outside {}..={}", n, range.start(), range.end()),
        ))
    }
}
